//! Hostile units and the groups they fight in.
//!
//! An [EncounterGroup] owns its members in a flat arena addressed by slot index.
//! Death is terminal for an [Encounter]; a respawn builds a new group with a new
//! `generation` rather than reviving the old members.

use serde::{Deserialize, Serialize};

/// Timed enemy ability: every `check_interval` the enemy rolls `cast_chance`
/// and, on success, finishes a cast `cast_time` seconds later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnemySkill {
    pub name: String,
    pub check_interval: f64,
    pub cast_chance: f64,
    pub cast_time: f64,
    pub damage: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnemyTemplate {
    pub id: String,
    pub name: String,
    pub max_hp: i64,
    /// Fraction of physical damage absorbed, `0.0..=0.9`.
    #[serde(default)]
    pub armor: f64,
    #[serde(default)]
    pub skill: Option<EnemySkill>,
}

impl EnemyTemplate {
    pub fn new(id: &str, name: &str, max_hp: i64) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            max_hp,
            armor: 0.0,
            skill: None,
        }
    }

    /// Checks the fields that drive scheduling and damage.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_hp <= 0 {
            return Err(format!("enemy {} has non-positive max_hp", self.id));
        }
        if !self.armor.is_finite() {
            return Err(format!("enemy {} armor must be a number, got {}", self.id, self.armor));
        }
        let Some(skill) = &self.skill else {
            return Ok(());
        };
        if !(skill.check_interval.is_finite() && skill.check_interval > 0.0) {
            return Err(format!(
                "enemy {} skill {} check_interval must be positive, got {}",
                self.id, skill.name, skill.check_interval
            ));
        }
        if !(skill.cast_time.is_finite() && skill.cast_time >= 0.0) {
            return Err(format!(
                "enemy {} skill {} cast_time must be non-negative, got {}",
                self.id, skill.name, skill.cast_time
            ));
        }
        if !(0.0..=1.0).contains(&skill.cast_chance) {
            return Err(format!(
                "enemy {} skill {} cast_chance must be within 0..=1, got {}",
                self.id, skill.name, skill.cast_chance
            ));
        }
        if skill.damage < 0 {
            return Err(format!("enemy {} skill {} has negative damage", self.id, skill.name));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DamageOutcome {
    /// HP actually removed.
    pub dealt: i64,
    /// Damage beyond the remaining HP on a killing blow.
    pub overkill: i64,
    pub killed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Encounter {
    pub slot: usize,
    pub template_id: String,
    pub name: String,
    pub max_hp: i64,
    pub current_hp: i64,
    pub armor: f64,
    pub is_dead: bool,
    pub kill_time: Option<f64>,
    pub overkill: i64,
}

impl Encounter {
    fn from_template(slot: usize, template: &EnemyTemplate) -> Self {
        let max_hp = template.max_hp.max(1);
        Self {
            slot,
            template_id: template.id.clone(),
            name: template.name.clone(),
            max_hp,
            current_hp: max_hp,
            armor: template.armor.clamp(0.0, 0.9),
            is_dead: false,
            kill_time: None,
            overkill: 0,
        }
    }

    pub fn is_alive(&self) -> bool {
        !self.is_dead
    }

    /// Applies `amount` damage at simulated time `now`. A dead encounter absorbs
    /// nothing.
    pub fn apply_damage(&mut self, amount: i64, now: f64) -> DamageOutcome {
        if self.is_dead || amount <= 0 {
            return DamageOutcome::default();
        }
        let dealt = amount.min(self.current_hp);
        self.current_hp = (self.current_hp - amount).clamp(0, self.max_hp);
        if self.current_hp > 0 {
            return DamageOutcome {
                dealt,
                overkill: 0,
                killed: false,
            };
        }
        self.is_dead = true;
        self.kill_time = Some(now);
        self.overkill = amount - dealt;
        DamageOutcome {
            dealt,
            overkill: self.overkill,
            killed: true,
        }
    }

    /// Overwrites HP from a snapshot. Zero HP marks the encounter dead at `now`.
    /// A dead encounter keeps its death.
    pub fn seed_health(&mut self, hp: i64, now: f64) {
        if self.is_dead {
            return;
        }
        self.current_hp = hp.clamp(0, self.max_hp);
        if self.current_hp == 0 {
            self.is_dead = true;
            self.kill_time = Some(now);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EncounterGroup {
    pub generation: u32,
    members: Vec<Encounter>,
}

impl EncounterGroup {
    pub fn from_templates(templates: &[EnemyTemplate], generation: u32) -> Self {
        Self {
            generation,
            members: templates
                .iter()
                .enumerate()
                .map(|(slot, template)| Encounter::from_template(slot, template))
                .collect(),
        }
    }

    pub fn members(&self) -> &[Encounter] {
        &self.members
    }

    pub fn get(&self, slot: usize) -> Option<&Encounter> {
        self.members.get(slot)
    }

    pub fn get_mut(&mut self, slot: usize) -> Option<&mut Encounter> {
        self.members.get_mut(slot)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Lowest living slot; the focus-fire target.
    pub fn first_alive(&self) -> Option<usize> {
        self.members.iter().position(Encounter::is_alive)
    }

    pub fn all_dead(&self) -> bool {
        self.members.iter().all(|member| member.is_dead)
    }

    pub fn remaining_hp(&self) -> i64 {
        self.members.iter().map(|member| member.current_hp).sum()
    }

    /// Time the last member died, once the whole group is down.
    pub fn kill_time(&self) -> Option<f64> {
        if !self.all_dead() {
            return None;
        }
        self.members
            .iter()
            .filter_map(|member| member.kill_time)
            .reduce(f64::max)
    }

    /// Overkill of the blow that finished the group.
    pub fn overkill(&self) -> i64 {
        self.members
            .iter()
            .filter(|member| member.kill_time.is_some())
            .max_by(|a, b| {
                a.kill_time
                    .unwrap_or(0.0)
                    .total_cmp(&b.kill_time.unwrap_or(0.0))
                    .then(a.slot.cmp(&b.slot))
            })
            .map_or(0, |member| member.overkill)
    }

    /// Restores every living member to full HP.
    pub fn reset_health(&mut self) {
        for member in self.members.iter_mut().filter(|m| m.is_alive()) {
            member.current_hp = member.max_hp;
        }
    }
}
