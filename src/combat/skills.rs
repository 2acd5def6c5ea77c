//! Skill, proc and resource definitions supplied by profession modules, plus the
//! shared hit roll.

use serde::{Deserialize, Serialize};

use crate::combat::rng::RngStream;
use crate::combat::stats::StatSheet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Rage,
    Focus,
    Mana,
}

impl Resource {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rage => "rage",
            Self::Focus => "focus",
            Self::Mana => "mana",
        }
    }

    pub const fn cap(self) -> i64 {
        100
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageType {
    Physical,
    Fire,
    Arcane,
}

impl DamageType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Physical => "physical",
            Self::Fire => "fire",
            Self::Arcane => "arcane",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillKind {
    /// Fixed-interval attack; never waits on resources.
    Auto,
    /// Ability pulse gated by a resource cost.
    Special,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceAmount {
    pub resource: Resource,
    pub amount: i64,
}

impl ResourceAmount {
    pub const fn new(resource: Resource, amount: i64) -> Self {
        Self { resource, amount }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillDef {
    pub name: String,
    pub kind: SkillKind,
    pub damage_type: DamageType,
    /// Seconds between pulses before haste.
    pub interval: f64,
    /// Offset of the first pulse after the encounter engages.
    pub initial_delay: f64,
    pub min_damage: f64,
    pub max_damage: f64,
    #[serde(default)]
    pub cost: Option<ResourceAmount>,
    #[serde(default)]
    pub gain: Option<ResourceAmount>,
    #[serde(default)]
    pub applies_buff: Option<String>,
}

impl SkillDef {
    /// Delay before a resource-starved special tries again.
    pub fn retry_delay(&self) -> f64 {
        self.interval.min(1.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcDef {
    pub name: String,
    pub interval: f64,
    pub chance: f64,
    pub min_damage: f64,
    pub max_damage: f64,
    pub damage_type: DamageType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitRoll {
    pub amount: i64,
    pub crit: bool,
}

/// Rolls one hit: two draws (damage, crit). Physical damage is reduced by the
/// target's armor. Every landed hit deals at least 1.
pub fn roll_hit(
    rng: &mut RngStream,
    stats: &StatSheet,
    min_damage: f64,
    max_damage: f64,
    damage_type: DamageType,
    armor: f64,
) -> HitRoll {
    let raw = rng.range_f64(min_damage, max_damage) * stats.power();
    let crit = rng.chance(stats.crit_chance());
    let mut amount = if crit {
        raw * stats.crit_multiplier()
    } else {
        raw
    };
    if damage_type == DamageType::Physical {
        amount *= 1.0 - armor.clamp(0.0, 0.9);
    }
    HitRoll {
        amount: (amount.round() as i64).max(1),
        crit,
    }
}
