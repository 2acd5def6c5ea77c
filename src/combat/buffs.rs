//! Buff definitions and the active-buff tracker.
//!
//! Ticking the tracker only expires buffs whose `expires_at <= now` and
//! re-aggregates stats; it draws no randomness, so calling it at extra times
//! (slice boundaries) never changes the outcome of later events.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::combat::skills::{DamageType, ResourceAmount};
use crate::combat::stats::{StatModifier, StatSheet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuffTickDef {
    pub interval: f64,
    /// Damage per tick before power scaling; zero for non-damaging ticks.
    #[serde(default)]
    pub damage: i64,
    #[serde(default = "default_tick_damage_type")]
    pub damage_type: DamageType,
    #[serde(default)]
    pub resource: Option<ResourceAmount>,
}

fn default_tick_damage_type() -> DamageType {
    DamageType::Fire
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuffDef {
    pub id: String,
    /// `None` for a permanent (passive) buff.
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub tick: Option<BuffTickDef>,
    #[serde(default)]
    pub modifiers: Vec<StatModifier>,
}

#[derive(Debug, Clone, Default)]
pub struct BuffRegistry {
    defs: Vec<BuffDef>,
    by_id: BTreeMap<String, usize>,
}

impl BuffRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `def`; a later registration with the same id replaces it.
    pub fn register(&mut self, def: BuffDef) -> usize {
        if let Some(&index) = self.by_id.get(&def.id) {
            self.defs[index] = def;
            return index;
        }
        let index = self.defs.len();
        self.by_id.insert(def.id.clone(), index);
        self.defs.push(def);
        index
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    pub fn get(&self, index: usize) -> Option<&BuffDef> {
        self.defs.get(index)
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveBuff {
    pub def: usize,
    pub instance: u64,
    pub applied_at: f64,
    pub expires_at: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BuffApplication {
    /// A new instance; `first_tick` is when its periodic effect first fires.
    Started {
        instance: u64,
        first_tick: Option<f64>,
    },
    /// An existing instance had its expiry pushed out.
    Refreshed { instance: u64 },
}

#[derive(Debug, Clone)]
pub struct BuffTracker {
    registry: BuffRegistry,
    base: StatSheet,
    stats: StatSheet,
    active: Vec<ActiveBuff>,
    next_instance: u64,
}

impl BuffTracker {
    pub fn new(registry: BuffRegistry, base: StatSheet) -> Self {
        Self {
            registry,
            stats: base.clone(),
            base,
            active: Vec::new(),
            next_instance: 1,
        }
    }

    pub fn registry(&self) -> &BuffRegistry {
        &self.registry
    }

    /// Aggregated stats for the currently active buffs.
    pub fn stats(&self) -> &StatSheet {
        &self.stats
    }

    pub fn active(&self) -> &[ActiveBuff] {
        &self.active
    }

    pub fn instance(&self, instance: u64) -> Option<&ActiveBuff> {
        self.active.iter().find(|buff| buff.instance == instance)
    }

    pub fn def_for(&self, instance: u64) -> Option<&BuffDef> {
        self.instance(instance)
            .and_then(|buff| self.registry.get(buff.def))
    }

    /// Applies the buff registered as `id`. Unknown ids are ignored.
    pub fn apply(&mut self, id: &str, now: f64) -> Option<BuffApplication> {
        let def_index = self.registry.index_of(id)?;
        let def = self.registry.get(def_index)?;
        let expires_at = def.duration.map(|duration| now + duration);
        let first_tick = def.tick.as_ref().map(|tick| now + tick.interval);

        if let Some(existing) = self.active.iter_mut().find(|buff| buff.def == def_index) {
            existing.expires_at = match (existing.expires_at, expires_at) {
                (Some(old), Some(new)) => Some(old.max(new)),
                _ => None,
            };
            return Some(BuffApplication::Refreshed {
                instance: existing.instance,
            });
        }

        let instance = self.next_instance;
        self.next_instance += 1;
        self.active.push(ActiveBuff {
            def: def_index,
            instance,
            applied_at: now,
            expires_at,
        });
        self.recompute();
        Some(BuffApplication::Started {
            instance,
            first_tick,
        })
    }

    /// Expires buffs due at or before `now`. Returns how many expired.
    pub fn tick(&mut self, now: f64) -> usize {
        let before = self.active.len();
        self.active
            .retain(|buff| buff.expires_at.map_or(true, |expires_at| expires_at > now));
        let expired = before - self.active.len();
        if expired > 0 {
            self.recompute();
        }
        expired
    }

    fn recompute(&mut self) {
        let mut stats = self.base.clone();
        for buff in &self.active {
            if let Some(def) = self.registry.get(buff.def) {
                stats.add_many(&def.modifiers);
            }
        }
        self.stats = stats;
    }
}
