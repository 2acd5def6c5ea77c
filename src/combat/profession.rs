//! Pluggable profession modules. The battle driver only talks to
//! [ProfessionModule]; the concrete module is picked once from [Profession].

use serde::{Deserialize, Serialize};

use crate::combat::buffs::{BuffDef, BuffRegistry, BuffTickDef};
use crate::combat::skills::{DamageType, ProcDef, Resource, ResourceAmount, SkillDef, SkillKind};
use crate::combat::stats::{Stat, StatModifier, StatSheet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Profession {
    Warrior,
    Ranger,
    Arcanist,
}

impl Profession {
    pub fn module(self) -> &'static dyn ProfessionModule {
        match self {
            Self::Warrior => &WarriorModule,
            Self::Ranger => &RangerModule,
            Self::Arcanist => &ArcanistModule,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "warrior" => Some(Self::Warrior),
            "ranger" => Some(Self::Ranger),
            "arcanist" => Some(Self::Arcanist),
            _ => None,
        }
    }
}

fn default_power() -> f64 {
    1.0
}

fn default_crit_chance() -> f64 {
    0.05
}

fn default_crit_multiplier() -> f64 {
    1.5
}

/// Combat-relevant character numbers. Produced by the equipment layer; taken
/// as given here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterProfile {
    pub character_id: String,
    pub profession: Profession,
    #[serde(default = "default_power")]
    pub power: f64,
    #[serde(default = "default_crit_chance")]
    pub crit_chance: f64,
    #[serde(default = "default_crit_multiplier")]
    pub crit_multiplier: f64,
    #[serde(default)]
    pub haste: f64,
}

impl CharacterProfile {
    pub fn new(character_id: &str, profession: Profession) -> Self {
        Self {
            character_id: character_id.to_string(),
            profession,
            power: default_power(),
            crit_chance: default_crit_chance(),
            crit_multiplier: default_crit_multiplier(),
            haste: 0.0,
        }
    }

    pub fn base_stats(&self) -> StatSheet {
        StatSheet::with_base(&[
            (Stat::Power, self.power),
            (Stat::CritChance, self.crit_chance),
            (Stat::CritMultiplier, self.crit_multiplier),
            (Stat::Haste, self.haste),
        ])
    }
}

/// What a module sets up before the first event runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BattleStart {
    pub passive_buffs: Vec<String>,
    pub starting_resources: Vec<ResourceAmount>,
}

pub trait ProfessionModule: Send + Sync {
    fn name(&self) -> &'static str;
    fn build_skills(&self, profile: &CharacterProfile) -> Vec<SkillDef>;
    fn build_procs(&self, _profile: &CharacterProfile) -> Vec<ProcDef> {
        Vec::new()
    }
    fn register_buff_definitions(&self, registry: &mut BuffRegistry);
    fn on_battle_start(&self, profile: &CharacterProfile, start: &mut BattleStart);
}

fn skill(
    name: &str,
    kind: SkillKind,
    damage_type: DamageType,
    interval: f64,
    initial_delay: f64,
    damage: (f64, f64),
) -> SkillDef {
    SkillDef {
        name: name.to_string(),
        kind,
        damage_type,
        interval,
        initial_delay,
        min_damage: damage.0,
        max_damage: damage.1,
        cost: None,
        gain: None,
        applies_buff: None,
    }
}

pub struct WarriorModule;

impl ProfessionModule for WarriorModule {
    fn name(&self) -> &'static str {
        "warrior"
    }

    fn build_skills(&self, _profile: &CharacterProfile) -> Vec<SkillDef> {
        vec![
            SkillDef {
                gain: Some(ResourceAmount::new(Resource::Rage, 12)),
                ..skill("Slash", SkillKind::Auto, DamageType::Physical, 2.0, 0.0, (40.0, 60.0))
            },
            SkillDef {
                cost: Some(ResourceAmount::new(Resource::Rage, 30)),
                applies_buff: Some("bloodlust".to_string()),
                ..skill("Cleave", SkillKind::Special, DamageType::Physical, 6.0, 3.0, (110.0, 150.0))
            },
        ]
    }

    fn build_procs(&self, _profile: &CharacterProfile) -> Vec<ProcDef> {
        vec![ProcDef {
            name: "Deep Wounds".to_string(),
            interval: 3.0,
            chance: 0.2,
            min_damage: 20.0,
            max_damage: 30.0,
            damage_type: DamageType::Physical,
        }]
    }

    fn register_buff_definitions(&self, registry: &mut BuffRegistry) {
        registry.register(BuffDef {
            id: "battle_stance".to_string(),
            duration: None,
            tick: None,
            modifiers: vec![StatModifier::modifier(Stat::Power, 0.10)],
        });
        registry.register(BuffDef {
            id: "bloodlust".to_string(),
            duration: Some(8.0),
            tick: None,
            modifiers: vec![StatModifier::flat(Stat::Haste, 0.25)],
        });
    }

    fn on_battle_start(&self, _profile: &CharacterProfile, start: &mut BattleStart) {
        start.passive_buffs.push("battle_stance".to_string());
    }
}

pub struct RangerModule;

impl ProfessionModule for RangerModule {
    fn name(&self) -> &'static str {
        "ranger"
    }

    fn build_skills(&self, _profile: &CharacterProfile) -> Vec<SkillDef> {
        vec![
            SkillDef {
                gain: Some(ResourceAmount::new(Resource::Focus, 8)),
                ..skill("Shot", SkillKind::Auto, DamageType::Physical, 1.5, 0.0, (25.0, 35.0))
            },
            SkillDef {
                cost: Some(ResourceAmount::new(Resource::Focus, 40)),
                applies_buff: Some("quick_draw".to_string()),
                ..skill("Aimed Shot", SkillKind::Special, DamageType::Physical, 5.0, 2.0, (90.0, 120.0))
            },
        ]
    }

    fn build_procs(&self, _profile: &CharacterProfile) -> Vec<ProcDef> {
        vec![ProcDef {
            name: "Volley".to_string(),
            interval: 4.0,
            chance: 0.25,
            min_damage: 30.0,
            max_damage: 50.0,
            damage_type: DamageType::Physical,
        }]
    }

    fn register_buff_definitions(&self, registry: &mut BuffRegistry) {
        registry.register(BuffDef {
            id: "quick_draw".to_string(),
            duration: Some(6.0),
            tick: None,
            modifiers: vec![StatModifier::flat(Stat::Haste, 0.30)],
        });
        registry.register(BuffDef {
            id: "hunters_mark".to_string(),
            duration: None,
            tick: None,
            modifiers: vec![StatModifier::flat(Stat::CritChance, 0.05)],
        });
        registry.register(BuffDef {
            id: "steady_breathing".to_string(),
            duration: None,
            tick: Some(BuffTickDef {
                interval: 2.0,
                damage: 0,
                damage_type: DamageType::Physical,
                resource: Some(ResourceAmount::new(Resource::Focus, 4)),
            }),
            modifiers: vec![],
        });
    }

    fn on_battle_start(&self, _profile: &CharacterProfile, start: &mut BattleStart) {
        start.passive_buffs.push("hunters_mark".to_string());
        start.passive_buffs.push("steady_breathing".to_string());
        start
            .starting_resources
            .push(ResourceAmount::new(Resource::Focus, 50));
    }
}

pub struct ArcanistModule;

impl ProfessionModule for ArcanistModule {
    fn name(&self) -> &'static str {
        "arcanist"
    }

    fn build_skills(&self, _profile: &CharacterProfile) -> Vec<SkillDef> {
        vec![
            skill("Arcane Bolt", SkillKind::Auto, DamageType::Arcane, 2.5, 0.0, (55.0, 70.0)),
            SkillDef {
                cost: Some(ResourceAmount::new(Resource::Mana, 35)),
                applies_buff: Some("ignite_aura".to_string()),
                ..skill("Fireball", SkillKind::Special, DamageType::Fire, 8.0, 1.0, (150.0, 190.0))
            },
        ]
    }

    fn build_procs(&self, _profile: &CharacterProfile) -> Vec<ProcDef> {
        vec![ProcDef {
            name: "Arcane Echo".to_string(),
            interval: 5.0,
            chance: 0.3,
            min_damage: 40.0,
            max_damage: 60.0,
            damage_type: DamageType::Arcane,
        }]
    }

    fn register_buff_definitions(&self, registry: &mut BuffRegistry) {
        registry.register(BuffDef {
            id: "mana_font".to_string(),
            duration: None,
            tick: Some(BuffTickDef {
                interval: 1.0,
                damage: 0,
                damage_type: DamageType::Arcane,
                resource: Some(ResourceAmount::new(Resource::Mana, 3)),
            }),
            modifiers: vec![],
        });
        registry.register(BuffDef {
            id: "ignite_aura".to_string(),
            duration: Some(10.0),
            tick: Some(BuffTickDef {
                interval: 2.0,
                damage: 20,
                damage_type: DamageType::Fire,
                resource: None,
            }),
            modifiers: vec![],
        });
    }

    fn on_battle_start(&self, _profile: &CharacterProfile, start: &mut BattleStart) {
        start.passive_buffs.push("mana_font".to_string());
        start
            .starting_resources
            .push(ResourceAmount::new(Resource::Mana, 100));
    }
}
