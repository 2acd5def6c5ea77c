//! Battle driver: one deterministic battle advanced either under a wall-clock
//! budget ([BattleDriver::advance]) or instantly ([BattleDriver::fast_forward_to]).
//!
//! Both modes share [BattleDriver::run_until], so any sequence of throttled
//! calls that reaches simulated time `T` leaves the battle in the same state as
//! a single fast-forward to `T`: same segments, same RNG index, same outcome.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::combat::buffs::{BuffApplication, BuffRegistry, BuffTracker};
use crate::combat::clock::SimClock;
use crate::combat::event::{EventKind, ScheduledEvent};
use crate::combat::profession::{BattleStart, CharacterProfile};
use crate::combat::provider::{EncounterProvider, EncounterSpec, Transition};
use crate::combat::rng::{RngState, RngStream};
use crate::combat::scheduler::EventScheduler;
use crate::combat::segment::{FlushPolicy, Segment, SegmentCollector};
use crate::combat::skills::{roll_hit, DamageType, ProcDef, Resource, SkillDef};
use crate::combat::snapshot::BattleState;
use crate::error::EngineError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleConfig {
    pub seed: u64,
    /// Simulated seconds after which the battle completes.
    pub target_duration: f64,
    pub profile: CharacterProfile,
    pub encounter: EncounterSpec,
    #[serde(default)]
    pub flush: FlushPolicy,
    /// Simulated seconds per wall-clock second in throttled mode.
    #[serde(default = "default_sim_speed")]
    pub sim_speed: f64,
}

fn default_sim_speed() -> f64 {
    1.0
}

impl BattleConfig {
    pub fn new(
        seed: u64,
        target_duration: f64,
        profile: CharacterProfile,
        encounter: EncounterSpec,
    ) -> Self {
        Self {
            seed,
            target_duration,
            profile,
            encounter,
            flush: FlushPolicy::default(),
            sim_speed: default_sim_speed(),
        }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if !(self.target_duration.is_finite() && self.target_duration > 0.0) {
            return Err(EngineError::InvalidRequest(format!(
                "target_duration must be positive, got {}",
                self.target_duration
            )));
        }
        if !(self.sim_speed.is_finite() && self.sim_speed > 0.0) {
            return Err(EngineError::InvalidRequest(format!(
                "sim_speed must be positive, got {}",
                self.sim_speed
            )));
        }
        if !(self.flush.max_span.is_finite() && self.flush.max_span >= 0.0) {
            return Err(EngineError::InvalidRequest(format!(
                "flush max_span must be a non-negative number, got {}",
                self.flush.max_span
            )));
        }
        if self.flush.max_events == 0 {
            return Err(EngineError::InvalidRequest(
                "flush max_events must be positive".to_string(),
            ));
        }
        self.encounter.validate()
    }
}

/// Per-call limits for throttled advancement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdvanceBudget {
    /// Safety valve on events executed in one call.
    pub max_events: usize,
    /// Cap on simulated seconds covered in one call.
    pub max_sim_slice: f64,
}

impl Default for AdvanceBudget {
    fn default() -> Self {
        Self {
            max_events: 5000,
            max_sim_slice: 30.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// The final encounter was cleared and nothing follows it.
    Killed,
    TargetReached,
    QueueEmpty,
    /// Sealed from outside by a force-stop.
    Stopped,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BattleOutcome {
    pub completed: bool,
    /// Sticky once any group has been cleared.
    pub killed: bool,
    /// Most recent clear.
    pub kill_time: Option<f64>,
    pub overkill: i64,
    pub kills: u32,
    pub end_reason: Option<EndReason>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AdvanceReport {
    pub events_processed: usize,
    pub segments_flushed: usize,
    pub simulated_seconds: f64,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BattleStatus {
    pub simulated_seconds: f64,
    pub completed: bool,
    pub killed: bool,
    pub kill_time: Option<f64>,
    pub kills: u32,
    pub total_damage: i64,
    pub dps: f64,
    pub segment_count: usize,
    pub rng_index_start: i64,
    pub rng_index_end: i64,
    pub wave_index: usize,
    pub run_count: u32,
    pub end_reason: Option<EndReason>,
}

pub struct BattleDriver {
    pub(crate) config: BattleConfig,
    skills: Arc<[SkillDef]>,
    procs: Arc<[ProcDef]>,
    buffs: BuffTracker,
    rng: RngStream,
    rng_index_start: i64,
    clock: SimClock,
    scheduler: EventScheduler,
    collector: SegmentCollector,
    pub(crate) provider: Box<dyn EncounterProvider>,
    pub(crate) segments: Vec<Segment>,
    resources: BTreeMap<Resource, i64>,
    pub(crate) epoch: u32,
    pub(crate) engaged: bool,
    outcome: BattleOutcome,
    total_damage: i64,
    events_processed: u64,
    wall_anchor: Option<Instant>,
    pub(crate) pending_restore: Option<BattleState>,
    terminal_clear: bool,
}

impl BattleDriver {
    pub fn new(config: BattleConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let module = config.profile.profession.module();

        let mut registry = BuffRegistry::new();
        module.register_buff_definitions(&mut registry);
        let skills: Arc<[SkillDef]> = module.build_skills(&config.profile).into();
        let procs: Arc<[ProcDef]> = module.build_procs(&config.profile).into();
        let buffs = BuffTracker::new(registry, config.profile.base_stats());
        let rng = RngStream::new(config.seed);
        let collector = SegmentCollector::new(config.flush, 0.0, rng.index());
        let provider = config.encounter.build_provider();

        let mut driver = Self {
            skills,
            procs,
            buffs,
            rng_index_start: rng.index(),
            rng,
            clock: SimClock::new(),
            scheduler: EventScheduler::new(),
            collector,
            provider,
            segments: Vec::new(),
            resources: BTreeMap::new(),
            epoch: 0,
            engaged: false,
            outcome: BattleOutcome::default(),
            total_damage: 0,
            events_processed: 0,
            wall_anchor: None,
            pending_restore: None,
            terminal_clear: false,
            config,
        };

        let mut start = BattleStart::default();
        module.on_battle_start(&driver.config.profile, &mut start);
        for amount in start.starting_resources {
            driver
                .resources
                .insert(amount.resource, amount.amount.clamp(0, amount.resource.cap()));
        }
        for buff in &start.passive_buffs {
            driver.apply_buff(buff, 0.0);
        }
        driver.engage(0.0);
        Ok(driver)
    }

    pub fn config(&self) -> &BattleConfig {
        &self.config
    }

    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    pub fn outcome(&self) -> &BattleOutcome {
        &self.outcome
    }

    pub fn is_completed(&self) -> bool {
        self.outcome.completed
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Flushed segments from position `since` onward.
    pub fn segments_since(&self, since: usize) -> &[Segment] {
        self.segments.get(since..).unwrap_or(&[])
    }

    pub fn total_damage(&self) -> i64 {
        self.total_damage
    }

    pub fn events_processed(&self) -> u64 {
        self.events_processed
    }

    pub fn scheduled_count(&self) -> usize {
        self.scheduler.count()
    }

    pub fn rng_state(&self) -> RngState {
        self.rng.state()
    }

    pub fn rng_index_start(&self) -> i64 {
        self.rng_index_start
    }

    pub fn provider(&self) -> &dyn EncounterProvider {
        self.provider.as_ref()
    }

    pub fn resource(&self, resource: Resource) -> i64 {
        self.resources.get(&resource).copied().unwrap_or(0)
    }

    pub fn dps(&self) -> f64 {
        let now = self.clock.now();
        if now > 0.0 {
            self.total_damage as f64 / now
        } else {
            0.0
        }
    }

    pub fn status(&self) -> BattleStatus {
        BattleStatus {
            simulated_seconds: self.clock.now(),
            completed: self.outcome.completed,
            killed: self.outcome.killed,
            kill_time: self.outcome.kill_time,
            kills: self.outcome.kills,
            total_damage: self.total_damage,
            dps: self.dps(),
            segment_count: self.segments.len(),
            rng_index_start: self.rng_index_start,
            rng_index_end: self.rng.index(),
            wave_index: self.provider.wave_index(),
            run_count: self.provider.run_count(),
            end_reason: self.outcome.end_reason,
        }
    }

    /// Sets the wall-clock reference the next throttled call measures from.
    pub fn anchor_wall_clock(&mut self, now: Instant) {
        self.wall_anchor = Some(now);
    }

    pub fn advance(&mut self, budget: AdvanceBudget) -> AdvanceReport {
        self.advance_at(Instant::now(), budget)
    }

    /// Throttled advance measured against `now`. The first call after
    /// construction only sets the anchor unless [Self::anchor_wall_clock] ran.
    pub fn advance_at(&mut self, now: Instant, budget: AdvanceBudget) -> AdvanceReport {
        if self.outcome.completed {
            return self.idle_report();
        }
        let Some(anchor) = self.wall_anchor else {
            self.wall_anchor = Some(now);
            return self.idle_report();
        };
        let wall_delta = now.saturating_duration_since(anchor);
        let allowed = (wall_delta.as_secs_f64() * self.config.sim_speed)
            .min(budget.max_sim_slice.max(0.0));
        let slice_end = (self.clock.now() + allowed).min(self.config.target_duration);
        let report = self.run_until(slice_end, Some(budget.max_events));
        self.wall_anchor = Some(now);
        report
    }

    /// Instant advance to simulated time `seconds` (capped at the target).
    /// Reads no wall clock.
    pub fn fast_forward_to(&mut self, seconds: f64) -> AdvanceReport {
        let report = self.run_until(seconds, None);
        if let Some(snapshot) = self.pending_restore.take() {
            self.finish_restore(snapshot);
        }
        report
    }

    /// Seals the battle at the current simulated time. Returns false when it
    /// was already complete.
    pub fn force_stop(&mut self) -> bool {
        if self.outcome.completed {
            return false;
        }
        self.seal(EndReason::Stopped);
        true
    }

    fn idle_report(&self) -> AdvanceReport {
        AdvanceReport {
            events_processed: 0,
            segments_flushed: 0,
            simulated_seconds: self.clock.now(),
            completed: self.outcome.completed,
        }
    }

    /// Shared step loop: executes events at or before `ceiling` (capped at the
    /// target duration), up to `max_events` of them.
    pub(crate) fn run_until(&mut self, ceiling: f64, max_events: Option<usize>) -> AdvanceReport {
        if self.outcome.completed {
            return self.idle_report();
        }
        let target = self.config.target_duration;
        let slice_end = ceiling.min(target).max(self.clock.now());
        let segments_before = self.segments.len();
        let mut processed = 0usize;

        loop {
            if max_events.is_some_and(|max| processed >= max) {
                break;
            }
            self.buffs.tick(self.clock.now());
            let Some(event) = self.scheduler.pop_next() else {
                break;
            };
            if event.execute_at > slice_end {
                self.scheduler.requeue(event);
                self.advance_clock(slice_end);
                break;
            }
            self.advance_clock(event.execute_at);
            self.buffs.tick(event.execute_at);
            if self.is_stale(&event) {
                continue;
            }
            self.execute(event);
            processed += 1;
            self.events_processed += 1;
            if let Some(full) = self
                .collector
                .flush_if_full(self.clock.now(), self.rng.index())
            {
                self.segments.push(full);
            }
            if self.terminal_clear {
                self.seal(EndReason::Killed);
                break;
            }
        }

        if !self.outcome.completed {
            if self.clock.now() >= target {
                self.seal(EndReason::TargetReached);
            } else if self.scheduler.is_empty() {
                self.seal(EndReason::QueueEmpty);
            }
        }

        AdvanceReport {
            events_processed: processed,
            segments_flushed: self.segments.len() - segments_before,
            simulated_seconds: self.clock.now(),
            completed: self.outcome.completed,
        }
    }

    fn advance_clock(&mut self, t: f64) {
        self.clock.advance_to(t);
        let closed = self.collector.close_expired(t, self.rng.index());
        self.segments.extend(closed);
    }

    fn is_stale(&self, event: &ScheduledEvent) -> bool {
        match event.kind {
            EventKind::BuffTick { instance } => self.buffs.instance(instance).is_none(),
            kind => kind.epoch().is_some_and(|epoch| epoch != self.epoch),
        }
    }

    fn seal(&mut self, reason: EndReason) {
        let now = self.clock.now();
        let closed = self.collector.close_expired(now, self.rng.index());
        self.segments.extend(closed);
        if let Some(tail) = self.collector.finish(now, self.rng.index()) {
            // Events at the end time belong to the segment that closes there.
            match self.segments.last_mut() {
                Some(last) if tail.duration() == 0.0 && last.end_time == tail.start_time => {
                    last.absorb(tail)
                }
                _ => self.segments.push(tail),
            }
        }
        self.outcome.completed = true;
        self.outcome.end_reason = Some(reason);
        info!(
            "battle sealed: character={} reason={reason:?} t={now:.3} killed={} kills={} damage={} segments={}",
            self.config.profile.character_id,
            self.outcome.killed,
            self.outcome.kills,
            self.total_damage,
            self.segments.len()
        );
    }

    fn execute(&mut self, event: ScheduledEvent) {
        let now = event.execute_at;
        self.collector.begin_event();
        match event.kind {
            EventKind::Skill { skill, epoch } => self.on_skill(skill, epoch, now),
            EventKind::BuffTick { instance } => self.on_buff_tick(instance, now),
            EventKind::Proc { proc_index, epoch } => self.on_proc(proc_index, epoch, now),
            EventKind::EnemySkillCheck { slot, epoch } => self.on_enemy_check(slot, epoch, now),
            EventKind::EnemyCast { slot, .. } => self.on_enemy_cast(slot),
            EventKind::Respawn { .. } => {
                self.collector.bump_tag("engage");
                self.engage(now);
            }
        }
    }

    /// Seeds player tracks and enemy skill checks against the current group.
    pub(crate) fn engage(&mut self, now: f64) {
        self.engaged = true;
        let epoch = self.epoch;
        for (skill, def) in self.skills.iter().enumerate() {
            self.scheduler
                .schedule(now + def.initial_delay.max(0.0), EventKind::Skill { skill, epoch });
        }
        for (proc_index, def) in self.procs.iter().enumerate() {
            self.scheduler
                .schedule(now + def.interval, EventKind::Proc { proc_index, epoch });
        }
        for (slot, template) in self.provider.templates().iter().enumerate() {
            if let Some(skill) = &template.skill {
                self.scheduler.schedule(
                    now + skill.check_interval,
                    EventKind::EnemySkillCheck { slot, epoch },
                );
            }
        }
    }

    fn apply_buff(&mut self, id: &str, now: f64) {
        if let Some(BuffApplication::Started {
            instance,
            first_tick: Some(at),
        }) = self.buffs.apply(id, now)
        {
            self.scheduler.schedule(at, EventKind::BuffTick { instance });
        }
    }

    fn gain_resource(&mut self, resource: Resource, amount: i64) {
        let current = self.resource(resource);
        let next = (current + amount).clamp(0, resource.cap());
        self.resources.insert(resource, next);
        if next != current {
            self.collector.add_resource(resource.as_str(), next - current);
        }
    }

    fn on_skill(&mut self, index: usize, epoch: u32, now: f64) {
        let skills = Arc::clone(&self.skills);
        let Some(skill) = skills.get(index) else {
            return;
        };
        let Some(target) = self.provider.current().first_alive() else {
            return;
        };

        if let Some(cost) = skill.cost {
            if self.resource(cost.resource) < cost.amount {
                self.collector.bump_tag("resource_starved");
                self.scheduler
                    .schedule(now + skill.retry_delay(), EventKind::Skill { skill: index, epoch });
                return;
            }
            self.gain_resource(cost.resource, -cost.amount);
        }

        let armor = self.provider.current().get(target).map_or(0.0, |e| e.armor);
        let hit = roll_hit(
            &mut self.rng,
            self.buffs.stats(),
            skill.min_damage,
            skill.max_damage,
            skill.damage_type,
            armor,
        );
        if hit.crit {
            self.collector.bump_tag("crit");
        }
        if let Some(gain) = skill.gain {
            self.gain_resource(gain.resource, gain.amount);
        }
        if let Some(buff) = &skill.applies_buff {
            self.apply_buff(buff, now);
            self.collector.bump_tag("buff_applied");
        }
        let haste = self.buffs.stats().haste_multiplier();
        self.deal_damage(&skill.name, skill.damage_type, target, hit.amount, now);

        if self.epoch == epoch {
            self.scheduler.schedule(
                now + skill.interval / haste,
                EventKind::Skill { skill: index, epoch },
            );
        }
    }

    fn on_proc(&mut self, index: usize, epoch: u32, now: f64) {
        let procs = Arc::clone(&self.procs);
        let Some(proc_def) = procs.get(index) else {
            return;
        };
        if self.rng.chance(proc_def.chance) {
            if let Some(target) = self.provider.current().first_alive() {
                let armor = self.provider.current().get(target).map_or(0.0, |e| e.armor);
                let hit = roll_hit(
                    &mut self.rng,
                    self.buffs.stats(),
                    proc_def.min_damage,
                    proc_def.max_damage,
                    proc_def.damage_type,
                    armor,
                );
                self.collector.bump_tag("proc");
                self.deal_damage(&proc_def.name, proc_def.damage_type, target, hit.amount, now);
            }
        }
        if self.epoch == epoch {
            self.scheduler
                .schedule(now + proc_def.interval, EventKind::Proc { proc_index: index, epoch });
        }
    }

    fn on_buff_tick(&mut self, instance: u64, now: f64) {
        let Some(def) = self.buffs.def_for(instance).cloned() else {
            return;
        };
        let Some(tick) = def.tick else {
            return;
        };
        if let Some(resource) = tick.resource {
            self.gain_resource(resource.resource, resource.amount);
        }
        if tick.damage > 0 && self.engaged {
            if let Some(target) = self.provider.current().first_alive() {
                let mut amount = tick.damage as f64 * self.buffs.stats().power();
                if tick.damage_type == DamageType::Physical {
                    let armor = self.provider.current().get(target).map_or(0.0, |e| e.armor);
                    amount *= 1.0 - armor;
                }
                let amount = (amount.round() as i64).max(1);
                self.deal_damage(&def.id, tick.damage_type, target, amount, now);
            }
        }
        self.scheduler
            .schedule(now + tick.interval, EventKind::BuffTick { instance });
    }

    fn on_enemy_check(&mut self, slot: usize, epoch: u32, now: f64) {
        let alive = self.provider.current().get(slot).is_some_and(|e| e.is_alive());
        let Some(skill) = self
            .provider
            .templates()
            .get(slot)
            .and_then(|t| t.skill.clone())
        else {
            return;
        };
        if !alive {
            return;
        }
        if self.rng.chance(skill.cast_chance) {
            self.collector.bump_tag("enemy_cast_started");
            self.scheduler
                .schedule(now + skill.cast_time, EventKind::EnemyCast { slot, epoch });
        }
        self.scheduler.schedule(
            now + skill.check_interval,
            EventKind::EnemySkillCheck { slot, epoch },
        );
    }

    fn on_enemy_cast(&mut self, slot: usize) {
        let alive = self.provider.current().get(slot).is_some_and(|e| e.is_alive());
        if !alive {
            self.collector.bump_tag("enemy_cast_interrupted");
            return;
        }
        let damage = self
            .provider
            .templates()
            .get(slot)
            .and_then(|t| t.skill.as_ref())
            .map_or(0, |skill| skill.damage);
        self.collector.add_resource("player_health", -damage);
        self.collector.bump_tag("enemy_cast");
    }

    fn deal_damage(&mut self, source: &str, damage_type: DamageType, slot: usize, amount: i64, now: f64) {
        let Some(member) = self.provider.current_mut().get_mut(slot) else {
            return;
        };
        let outcome = member.apply_damage(amount, now);
        self.total_damage += outcome.dealt;
        self.collector
            .add_damage(source, damage_type.as_str(), outcome.dealt);
        if outcome.killed {
            self.collector.bump_tag("kill");
            if self.provider.current().all_dead() {
                self.on_group_cleared(now);
            }
        }
    }

    pub(crate) fn on_group_cleared(&mut self, now: f64) {
        let group = self.provider.current();
        self.outcome.killed = true;
        self.outcome.kill_time = Some(group.kill_time().unwrap_or(now));
        self.outcome.overkill = group.overkill();
        self.outcome.kills += 1;
        self.engaged = false;
        self.epoch = self.epoch.wrapping_add(1);

        let transition = self.provider.advance();
        debug!(
            "group cleared: character={} t={now:.3} kills={} transition={transition:?}",
            self.config.profile.character_id, self.outcome.kills
        );
        match transition {
            Transition::Terminal => {
                self.terminal_clear = true;
                return;
            }
            Transition::Respawn { .. } => self.collector.bump_tag("respawn_pending"),
            Transition::NextWave { .. } => self.collector.bump_tag("wave_advance"),
            Transition::RunComplete { .. } => self.collector.bump_tag("run_complete"),
        }
        let delay = transition.delay().unwrap_or(0.0);
        if delay > 0.0 {
            self.scheduler
                .schedule(now + delay, EventKind::Respawn { epoch: self.epoch });
        } else {
            self.engage(now);
        }
    }

    pub(crate) fn mark_terminal_if_cleared(&mut self) {
        if self.terminal_clear && !self.outcome.completed {
            self.seal(EndReason::Killed);
        }
    }
}

impl std::fmt::Debug for BattleDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BattleDriver")
            .field("character_id", &self.config.profile.character_id)
            .field("now", &self.clock.now())
            .field("outcome", &self.outcome)
            .field("segments", &self.segments.len())
            .field("scheduled", &self.scheduler.count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::encounter::EnemyTemplate;
    use crate::combat::profession::Profession;

    fn dummy_config(target_duration: f64) -> BattleConfig {
        BattleConfig::new(
            42,
            target_duration,
            CharacterProfile::new("hero", Profession::Warrior),
            EncounterSpec::Single {
                enemies: vec![EnemyTemplate::new("training_dummy", "Training Dummy", 1500)],
            },
        )
    }

    #[test]
    fn first_throttled_call_only_sets_anchor() {
        let mut driver = BattleDriver::new(dummy_config(60.0)).expect("driver");
        let base = Instant::now();
        let report = driver.advance_at(base, AdvanceBudget::default());
        assert_eq!(report.events_processed, 0);
        assert_eq!(driver.now(), 0.0);
        assert_eq!(driver.events_processed(), 0);
        assert_eq!(driver.rng_state().index, 0);

        let report = driver.advance_at(base + Duration::from_secs(2), AdvanceBudget::default());
        assert!(report.events_processed > 0);
        assert_eq!(driver.now(), 2.0);
    }

    #[test]
    fn slice_is_capped_by_budget() {
        let mut driver = BattleDriver::new(dummy_config(60.0)).expect("driver");
        let base = Instant::now();
        driver.anchor_wall_clock(base);
        let budget = AdvanceBudget {
            max_events: 10_000,
            max_sim_slice: 1.5,
        };
        driver.advance_at(base + Duration::from_secs(30), budget);
        assert_eq!(driver.now(), 1.5);
    }

    #[test]
    fn max_events_stops_early_without_advancing_to_slice_end() {
        let mut driver = BattleDriver::new(dummy_config(60.0)).expect("driver");
        let base = Instant::now();
        driver.anchor_wall_clock(base);
        let report = driver.advance_at(
            base + Duration::from_secs(20),
            AdvanceBudget {
                max_events: 1,
                max_sim_slice: 30.0,
            },
        );
        assert_eq!(report.events_processed, 1);
        assert!(driver.now() < 20.0);
        assert!(!driver.is_completed());
    }

    #[test]
    fn single_target_kill_seals_battle() {
        let mut driver = BattleDriver::new(dummy_config(600.0)).expect("driver");
        let report = driver.fast_forward_to(600.0);
        assert!(report.completed);
        let outcome = driver.outcome();
        assert!(outcome.killed);
        assert_eq!(outcome.end_reason, Some(EndReason::Killed));
        assert_eq!(outcome.kill_time, Some(driver.now()));
        assert!(driver.now() < 600.0);
        assert_eq!(driver.total_damage(), 1500);
    }

    #[test]
    fn rejects_invalid_duration() {
        assert!(BattleDriver::new(dummy_config(0.0)).is_err());
        assert!(BattleDriver::new(dummy_config(f64::NAN)).is_err());
    }

    #[test]
    fn force_stop_is_idempotent() {
        let mut driver = BattleDriver::new(dummy_config(60.0)).expect("driver");
        driver.fast_forward_to(5.0);
        assert!(driver.force_stop());
        assert!(!driver.force_stop());
        assert_eq!(driver.outcome().end_reason, Some(EndReason::Stopped));
        assert_eq!(driver.segments().last().map(|s| s.end_time), Some(5.0));
    }
}
