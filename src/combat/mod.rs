pub mod battle;
pub mod buffs;
pub mod clock;
pub mod encounter;
pub mod event;
pub mod export_csv;
pub mod profession;
pub mod provider;
pub mod rng;
pub mod scheduler;
pub mod segment;
pub mod skills;
pub mod snapshot;
pub mod stats;

pub use battle::{
    AdvanceBudget, AdvanceReport, BattleConfig, BattleDriver, BattleOutcome, BattleStatus,
    EndReason,
};
pub use buffs::{BuffDef, BuffRegistry, BuffTickDef, BuffTracker};
pub use clock::SimClock;
pub use encounter::{EnemySkill, EnemyTemplate, Encounter, EncounterGroup};
pub use event::{EventKind, ScheduledEvent};
pub use export_csv::{segments_to_csv_string, write_segments_csv};
pub use profession::{CharacterProfile, Profession, ProfessionModule};
pub use provider::{
    ContinuousProvider, DungeonProvider, EncounterProvider, EncounterSpec, SingleProvider,
    Transition, WaveSpec,
};
pub use rng::{hash_label, seed_for_character, RngState, RngStream};
pub use scheduler::EventScheduler;
pub use segment::{FlushPolicy, Segment, SegmentCollector};
pub use skills::{DamageType, ProcDef, Resource, ResourceAmount, SkillDef, SkillKind};
pub use snapshot::{BattleState, EnemyHealthState};
pub use stats::{CategoryTotals, StackCategory, Stat, StatModifier, StatSheet};
