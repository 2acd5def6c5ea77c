//! Engine configuration: defaults, optional YAML/JSON file, then
//! `IDLECOMBAT_*` environment overrides.

use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::combat::battle::AdvanceBudget;
use crate::combat::segment::FlushPolicy;
use crate::error::ConfigError;

pub const ENV_PREFIX: &str = "IDLECOMBAT_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Simulated seconds per wall-clock second.
    pub sim_speed: f64,
    /// Background driver period.
    pub tick_interval_ms: u64,
    pub max_events_per_tick: usize,
    pub max_sim_slice: f64,
    pub flush_max_events: u32,
    pub flush_max_span: f64,
    pub snapshot_interval_secs: u64,
    /// How long a finalized battle stays queryable before eviction.
    pub retention_secs: u64,
    /// Salt per-character seeds with wall-clock nanoseconds at creation.
    pub salt_seeds: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sim_speed: 1.0,
            tick_interval_ms: 250,
            max_events_per_tick: 5000,
            max_sim_slice: 30.0,
            flush_max_events: 50,
            flush_max_span: 5.0,
            snapshot_interval_secs: 30,
            retention_secs: 60,
            salt_seeds: false,
        }
    }
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Env {
        key: key.to_string(),
        value: value.to_string(),
    })
}

impl EngineConfig {
    /// `.yaml`/`.yml` parse as YAML, anything else as JSON. Missing fields keep
    /// their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml" | "yml") => Ok(serde_yaml::from_str(&raw)?),
            _ => Ok(serde_json::from_str(&raw)?),
        }
    }

    /// File (if any), then process environment, then validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(std::env::vars())?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `IDLECOMBAT_<FIELD>` overrides from `vars`. Unrelated keys are
    /// ignored; unknown `IDLECOMBAT_` keys are ignored too.
    pub fn apply_env<I>(&mut self, vars: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            let Some(field) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            match field {
                "SIM_SPEED" => self.sim_speed = parse_env(&key, &value)?,
                "TICK_INTERVAL_MS" => self.tick_interval_ms = parse_env(&key, &value)?,
                "MAX_EVENTS_PER_TICK" => self.max_events_per_tick = parse_env(&key, &value)?,
                "MAX_SIM_SLICE" => self.max_sim_slice = parse_env(&key, &value)?,
                "FLUSH_MAX_EVENTS" => self.flush_max_events = parse_env(&key, &value)?,
                "FLUSH_MAX_SPAN" => self.flush_max_span = parse_env(&key, &value)?,
                "SNAPSHOT_INTERVAL_SECS" => self.snapshot_interval_secs = parse_env(&key, &value)?,
                "RETENTION_SECS" => self.retention_secs = parse_env(&key, &value)?,
                "SALT_SEEDS" => {
                    self.salt_seeds = matches!(
                        value.trim().to_ascii_lowercase().as_str(),
                        "1" | "true" | "yes" | "on"
                    )
                }
                _ => {}
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = |name: &str, value: f64| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(ConfigError::Invalid(format!("{name} must be positive, got {value}")))
            }
        };
        positive("sim_speed", self.sim_speed)?;
        positive("max_sim_slice", self.max_sim_slice)?;
        if !(self.flush_max_span.is_finite() && self.flush_max_span >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "flush_max_span must be non-negative, got {}",
                self.flush_max_span
            )));
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid("tick_interval_ms must be positive".to_string()));
        }
        if self.max_events_per_tick == 0 {
            return Err(ConfigError::Invalid("max_events_per_tick must be positive".to_string()));
        }
        if self.flush_max_events == 0 {
            return Err(ConfigError::Invalid("flush_max_events must be positive".to_string()));
        }
        Ok(())
    }

    pub fn budget(&self) -> AdvanceBudget {
        AdvanceBudget {
            max_events: self.max_events_per_tick,
            max_sim_slice: self.max_sim_slice,
        }
    }

    pub fn flush_policy(&self) -> FlushPolicy {
        FlushPolicy {
            max_events: self.flush_max_events,
            max_span: self.flush_max_span,
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn snapshot_interval(&self) -> Duration {
        Duration::from_secs(self.snapshot_interval_secs)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }
}
