//! Discrete battle events. Each variant is dispatched through a single match in
//! the battle driver; handlers re-schedule their own successors.

use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Auto-attack or special ability pulse for one skill track.
    Skill { skill: usize, epoch: u32 },
    /// Periodic tick of an active buff instance.
    BuffTick { instance: u64 },
    /// Proc roll for one proc track.
    Proc { proc_index: usize, epoch: u32 },
    /// Enemy in `slot` decides whether to start casting.
    EnemySkillCheck { slot: usize, epoch: u32 },
    /// Enemy in `slot` finishes a cast.
    EnemyCast { slot: usize, epoch: u32 },
    /// Pending encounter group engages.
    Respawn { epoch: u32 },
}

impl EventKind {
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::Skill { .. } => "skill",
            Self::BuffTick { .. } => "buff_tick",
            Self::Proc { .. } => "proc",
            Self::EnemySkillCheck { .. } => "enemy_skill_check",
            Self::EnemyCast { .. } => "enemy_cast",
            Self::Respawn { .. } => "respawn",
        }
    }

    /// Encounter generation the event targets; `None` for epoch-independent
    /// events such as buff ticks.
    pub const fn epoch(&self) -> Option<u32> {
        match self {
            Self::Skill { epoch, .. }
            | Self::Proc { epoch, .. }
            | Self::EnemySkillCheck { epoch, .. }
            | Self::EnemyCast { epoch, .. }
            | Self::Respawn { epoch } => Some(*epoch),
            Self::BuffTick { .. } => None,
        }
    }
}

/// An event queued for a simulated time. Immutable once scheduled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledEvent {
    pub execute_at: f64,
    /// Insertion order; breaks ties FIFO.
    pub seq: u64,
    pub kind: EventKind,
}

impl ScheduledEvent {
    pub const fn event_type(&self) -> &'static str {
        self.kind.event_type()
    }
}

impl Eq for ScheduledEvent {}

// Reversed so that `BinaryHeap` (a max-heap) yields the earliest event first.
impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .execute_at
            .total_cmp(&self.execute_at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
