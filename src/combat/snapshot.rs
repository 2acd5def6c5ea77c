//! Compact resume snapshots.
//!
//! A snapshot only carries enemy health and provider counters. Player timers,
//! scheduler contents and RNG position are rebuilt by replaying the battle from
//! its seed to `snapshot_at_seconds`; the stored health is then reconciled into
//! the group that is active at that point.

use std::collections::BTreeSet;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::combat::battle::{BattleConfig, BattleDriver};
use crate::combat::encounter::EncounterGroup;
use crate::error::{EngineError, SnapshotError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnemyHealthState {
    pub slot: usize,
    pub template_id: String,
    pub current_hp: i64,
    pub max_hp: i64,
    pub is_dead: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleState {
    pub enemies: Vec<EnemyHealthState>,
    #[serde(default)]
    pub wave_index: usize,
    #[serde(default)]
    pub run_count: u32,
    pub snapshot_at_seconds: f64,
}

impl BattleState {
    pub fn encode(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(raw: &str) -> Result<Self, SnapshotError> {
        let state: Self = serde_json::from_str(raw)?;
        state.validate()?;
        Ok(state)
    }

    pub fn validate(&self) -> Result<(), SnapshotError> {
        if !(self.snapshot_at_seconds.is_finite() && self.snapshot_at_seconds >= 0.0) {
            return Err(SnapshotError::Invalid(format!(
                "snapshot_at_seconds must be finite and non-negative, got {}",
                self.snapshot_at_seconds
            )));
        }
        let mut slots = BTreeSet::new();
        for enemy in &self.enemies {
            if !slots.insert(enemy.slot) {
                return Err(SnapshotError::Invalid(format!("duplicate slot {}", enemy.slot)));
            }
            if enemy.max_hp <= 0 || !(0..=enemy.max_hp).contains(&enemy.current_hp) {
                return Err(SnapshotError::Invalid(format!(
                    "slot {} health {}/{} out of range",
                    enemy.slot, enemy.current_hp, enemy.max_hp
                )));
            }
        }
        Ok(())
    }
}

impl BattleDriver {
    /// Captures enemy health and provider counters at the current simulated time.
    pub fn capture(&self) -> BattleState {
        BattleState {
            enemies: self
                .provider
                .current()
                .members()
                .iter()
                .map(|enemy| EnemyHealthState {
                    slot: enemy.slot,
                    template_id: enemy.template_id.clone(),
                    current_hp: enemy.current_hp,
                    max_hp: enemy.max_hp,
                    is_dead: enemy.is_dead,
                })
                .collect(),
            wave_index: self.provider.wave_index(),
            run_count: self.provider.run_count(),
            snapshot_at_seconds: self.now(),
        }
    }

    /// Holds `snapshot` until [BattleDriver::fast_forward_to] reaches its time.
    pub fn restore(&mut self, snapshot: BattleState) -> Result<(), SnapshotError> {
        if self.now() > 0.0 || self.events_processed() > 0 || self.is_completed() {
            return Err(SnapshotError::DriverAlreadyAdvanced);
        }
        snapshot.validate()?;
        if snapshot.snapshot_at_seconds > self.config.target_duration {
            return Err(SnapshotError::Invalid(format!(
                "snapshot at {} is past the target duration {}",
                snapshot.snapshot_at_seconds, self.config.target_duration
            )));
        }
        self.pending_restore = Some(snapshot);
        Ok(())
    }

    /// Rebuilds a battle from its config and a snapshot, replaying to the
    /// snapshot time.
    pub fn resume(config: BattleConfig, snapshot: BattleState) -> Result<Self, EngineError> {
        let mut driver = Self::new(config)?;
        let at = snapshot.snapshot_at_seconds;
        driver.restore(snapshot)?;
        driver.fast_forward_to(at);
        Ok(driver)
    }

    /// Replays to `at` and restarts the active encounter at full health. Used
    /// when a stored snapshot cannot be applied.
    pub fn resume_fresh(config: BattleConfig, at: f64) -> Result<Self, EngineError> {
        let mut driver = Self::new(config)?;
        driver.fast_forward_to(at);
        if !driver.is_completed() {
            driver.restart_encounter(at);
        }
        Ok(driver)
    }

    pub(crate) fn finish_restore(&mut self, snapshot: BattleState) {
        if self.is_completed() {
            warn!(
                "snapshot for {} discarded: replay completed at {:.3} before snapshot time {:.3}",
                self.config.profile.character_id,
                self.now(),
                snapshot.snapshot_at_seconds
            );
            return;
        }
        if self.now() < snapshot.snapshot_at_seconds {
            // Not there yet; keep waiting.
            self.pending_restore = Some(snapshot);
            return;
        }
        let now = self.now();

        let counters_differ = self.provider.wave_index() != snapshot.wave_index
            || self.provider.run_count() != snapshot.run_count;
        if counters_differ {
            if !self
                .provider
                .restore_counters(snapshot.wave_index, snapshot.run_count)
            {
                self.discard_snapshot(&snapshot, "counters out of range");
                return;
            }
            self.epoch = self.epoch.wrapping_add(1);
            self.engage(now);
        }

        let group = self.provider.current();
        let mismatch = snapshot.enemies.iter().any(|enemy| {
            group
                .get(enemy.slot)
                .map_or(true, |member| member.template_id != enemy.template_id
                    || member.max_hp != enemy.max_hp)
        });
        if mismatch {
            self.discard_snapshot(&snapshot, "enemy composition does not match");
            return;
        }
        let revives = snapshot.enemies.iter().any(|enemy| {
            enemy.current_hp > 0 && group.get(enemy.slot).is_some_and(|member| member.is_dead)
        });
        if revives {
            self.discard_snapshot(&snapshot, "snapshot revives a dead enemy");
            return;
        }

        let group = self.provider.current_mut();
        for enemy in &snapshot.enemies {
            if let Some(member) = group.get_mut(enemy.slot) {
                member.seed_health(enemy.current_hp, now);
            }
        }
        if self.engaged && self.provider.current().all_dead() {
            self.on_group_cleared(now);
            self.mark_terminal_if_cleared();
        }
    }

    fn discard_snapshot(&mut self, snapshot: &BattleState, reason: &str) {
        warn!(
            "snapshot for {} at {:.3} discarded ({reason}); starting encounter at full health",
            self.config.profile.character_id, snapshot.snapshot_at_seconds
        );
        self.restart_encounter(self.now());
    }

    /// Brings the active group back to full health. Dead members are never
    /// revived: a group with casualties is replaced by a new generation and
    /// re-engaged.
    pub(crate) fn restart_encounter(&mut self, now: f64) {
        let group = self.provider.current();
        let casualties = group.members().iter().any(|member| member.is_dead);
        let generation = group.generation.wrapping_add(1);
        if !casualties {
            self.provider.current_mut().reset_health();
            return;
        }
        let fresh = EncounterGroup::from_templates(self.provider.templates(), generation);
        *self.provider.current_mut() = fresh;
        if self.engaged {
            self.epoch = self.epoch.wrapping_add(1);
            self.engage(now);
        }
    }
}
