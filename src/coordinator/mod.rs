//! Registry of running battles shared between the background driver and the
//! request path.
//!
//! The registry lock is only held to clone the entry list, insert or remove.
//! Each battle sits behind its own mutex: the driver `try_lock`s and skips busy
//! battles, while [Coordinator::stop_and_finalize] blocks on the lock. The
//! `persisted` flag inside the entry makes finalization happen at most once.

pub mod driver;
pub mod persistence;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, TryLockError, PoisonError};
use std::time::Instant;

use chrono::Utc;
use log::{debug, error, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::combat::battle::{BattleConfig, BattleDriver, BattleStatus};
use crate::combat::profession::CharacterProfile;
use crate::combat::rng::seed_for_character;
use crate::combat::segment::Segment;
use crate::combat::snapshot::BattleState;
use crate::config::EngineConfig;
use crate::data::catalog::{EncounterCatalog, EncounterRequest};
use crate::error::{EngineError, PersistError};
use crate::parallel::WorkerPool;

pub use driver::{spawn_driver, DriverHandle, DriverStats};
pub use persistence::{
    BattleRecord, BattleSink, JsonDirBattleSink, JsonDirSnapshotStore, MemoryBattleSink,
    MemorySnapshotStore, SegmentRow, SnapshotRecord, SnapshotStore,
};

/// Inbound request to start a battle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleRequest {
    pub profile: CharacterProfile,
    pub encounter: EncounterRequest,
    pub target_duration: f64,
    /// Explicit seed; derived from the character id when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Counters for one [Coordinator::advance_all] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub advanced: usize,
    pub events_processed: usize,
    pub finalized: usize,
    pub finalize_failures: usize,
    pub snapshots: usize,
    pub skipped_busy: usize,
    pub poisoned: usize,
    pub evicted: usize,
    pub cancelled: bool,
}

struct BattleEntry {
    id: Uuid,
    request: BattleRequest,
    driver: BattleDriver,
    persisted: bool,
    persisted_id: Option<String>,
    last_snapshot: Instant,
    finalized_at: Option<Instant>,
}

type SharedEntry = Arc<Mutex<BattleEntry>>;

pub struct Coordinator {
    config: EngineConfig,
    catalog: Arc<EncounterCatalog>,
    sink: Arc<dyn BattleSink>,
    snapshots: Arc<dyn SnapshotStore>,
    battles: RwLock<HashMap<Uuid, SharedEntry>>,
}

impl Coordinator {
    pub fn new(
        config: EngineConfig,
        catalog: Arc<EncounterCatalog>,
        sink: Arc<dyn BattleSink>,
        snapshots: Arc<dyn SnapshotStore>,
    ) -> Self {
        Self {
            config,
            catalog,
            sink,
            snapshots,
            battles: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn battle_config(&self, request: &BattleRequest, seed: u64) -> Result<BattleConfig, EngineError> {
        let encounter = self.catalog.resolve(&request.encounter)?;
        let mut config = BattleConfig::new(
            seed,
            request.target_duration,
            request.profile.clone(),
            encounter,
        );
        config.flush = self.config.flush_policy();
        config.sim_speed = self.config.sim_speed;
        Ok(config)
    }

    fn seed_for(&self, request: &BattleRequest) -> u64 {
        request.seed.unwrap_or_else(|| {
            let salt = self
                .config
                .salt_seeds
                .then(|| Utc::now().timestamp_nanos_opt().unwrap_or_default());
            seed_for_character(&request.profile.character_id, salt)
        })
    }

    fn insert(&self, entry: BattleEntry) -> Uuid {
        let id = entry.id;
        self.battles
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::new(Mutex::new(entry)));
        id
    }

    fn entry(&self, id: Uuid) -> Option<SharedEntry> {
        self.battles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    fn entries(&self) -> Vec<(Uuid, SharedEntry)> {
        let mut entries: Vec<_> = self
            .battles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, entry)| (*id, Arc::clone(entry)))
            .collect();
        entries.sort_by_key(|(id, _)| *id);
        entries
    }

    pub fn start(&self, request: BattleRequest) -> Result<Uuid, EngineError> {
        self.start_at(request, Instant::now())
    }

    /// Starts a battle whose wall-clock anchor is `now`.
    pub fn start_at(&self, mut request: BattleRequest, now: Instant) -> Result<Uuid, EngineError> {
        let seed = self.seed_for(&request);
        request.seed = Some(seed);
        let mut driver = BattleDriver::new(self.battle_config(&request, seed)?)?;
        driver.anchor_wall_clock(now);
        let id = Uuid::new_v4();
        info!(
            "battle {id} started: character={} seed={seed} target={}s encounter={}",
            request.profile.character_id,
            request.target_duration,
            driver.provider().descriptor()
        );
        Ok(self.insert(BattleEntry {
            id,
            request,
            driver,
            persisted: false,
            persisted_id: None,
            last_snapshot: now,
            finalized_at: None,
        }))
    }

    /// Rebuilds a battle from a snapshot row without registering it.
    fn rebuild(&self, record: &SnapshotRecord, now: Instant) -> Result<BattleEntry, EngineError> {
        let config = self.battle_config(&record.request, record.seed)?;
        let at = record.simulated_seconds.clamp(0.0, config.target_duration);
        let mut driver = match BattleState::decode(&record.battle_state) {
            Ok(state) => match BattleDriver::resume(config.clone(), state) {
                Ok(driver) => driver,
                Err(EngineError::Snapshot(err)) => {
                    warn!("battle {} snapshot rejected: {err}", record.battle_id);
                    BattleDriver::resume_fresh(config, at)?
                }
                Err(err) => return Err(err),
            },
            Err(err) => {
                warn!("battle {} snapshot unreadable: {err}", record.battle_id);
                BattleDriver::resume_fresh(config, at)?
            }
        };
        let replayed = driver.segments();
        let diverged = record.flushed_segments.len() > replayed.len()
            || record
                .flushed_segments
                .iter()
                .zip(replayed)
                .any(|(stored, replayed)| stored != replayed);
        if diverged {
            warn!(
                "battle {} replay does not reproduce its {} stored segments",
                record.battle_id,
                record.flushed_segments.len()
            );
        }
        driver.anchor_wall_clock(now);
        Ok(BattleEntry {
            id: record.battle_id,
            request: record.request.clone(),
            driver,
            persisted: false,
            persisted_id: None,
            last_snapshot: now,
            finalized_at: None,
        })
    }

    pub fn resume(&self, record: &SnapshotRecord) -> Result<Uuid, EngineError> {
        let entry = self.rebuild(record, Instant::now())?;
        info!(
            "battle {} resumed at {:.3}s",
            entry.id,
            entry.driver.now()
        );
        Ok(self.insert(entry))
    }

    /// Rebuilds many snapshots in parallel on `pool`. Results keep the input
    /// order.
    pub fn resume_all(
        &self,
        records: &[SnapshotRecord],
        pool: &WorkerPool,
    ) -> Vec<Result<Uuid, EngineError>> {
        let now = Instant::now();
        let rebuilt: Vec<Result<BattleEntry, EngineError>> =
            pool.install(|| records.par_iter().map(|r| self.rebuild(r, now)).collect());
        let results: Vec<_> = rebuilt
            .into_iter()
            .map(|entry| entry.map(|entry| self.insert(entry)))
            .collect();
        info!(
            "resumed {}/{} battles",
            results.iter().filter(|r| r.is_ok()).count(),
            records.len()
        );
        results
    }

    pub fn advance_all(&self, cancel: &AtomicBool) -> TickReport {
        self.advance_all_at(Instant::now(), cancel)
    }

    /// One driver pass measured against wall-clock `now`.
    pub fn advance_all_at(&self, now: Instant, cancel: &AtomicBool) -> TickReport {
        let mut report = TickReport::default();
        let mut evict = Vec::new();
        let budget = self.config.budget();

        for (id, shared) in self.entries() {
            if cancel.load(Ordering::Relaxed) {
                report.cancelled = true;
                break;
            }
            let mut entry = match shared.try_lock() {
                Ok(guard) => guard,
                Err(TryLockError::WouldBlock) => {
                    report.skipped_busy += 1;
                    continue;
                }
                Err(TryLockError::Poisoned(_)) => {
                    error!("battle {id} lock poisoned; skipping");
                    report.poisoned += 1;
                    continue;
                }
            };

            if !entry.driver.is_completed() {
                let advanced = entry.driver.advance_at(now, budget);
                report.advanced += 1;
                report.events_processed += advanced.events_processed;
            }

            if entry.driver.is_completed() {
                if !entry.persisted {
                    match self.finalize(&mut entry, now) {
                        Ok(_) => report.finalized += 1,
                        Err(err) => {
                            error!("battle {id} finalize failed, retrying next tick: {err}");
                            report.finalize_failures += 1;
                        }
                    }
                } else if entry
                    .finalized_at
                    .is_some_and(|at| now.saturating_duration_since(at) >= self.config.retention())
                {
                    evict.push(id);
                }
            } else if now.saturating_duration_since(entry.last_snapshot)
                >= self.config.snapshot_interval()
            {
                match self.checkpoint(&entry) {
                    Ok(()) => {
                        entry.last_snapshot = now;
                        report.snapshots += 1;
                    }
                    Err(err) => error!("battle {id} snapshot upsert failed: {err}"),
                }
            }
        }

        if !evict.is_empty() {
            let mut battles = self.battles.write().unwrap_or_else(PoisonError::into_inner);
            for id in &evict {
                battles.remove(id);
            }
            report.evicted = evict.len();
        }
        debug!("tick: {report:?}");
        report
    }

    fn snapshot_record(entry: &BattleEntry) -> Result<SnapshotRecord, EngineError> {
        let driver = &entry.driver;
        Ok(SnapshotRecord {
            battle_id: entry.id,
            character_id: entry.request.profile.character_id.clone(),
            seed: driver.config().seed,
            target_duration: driver.config().target_duration,
            simulated_seconds: driver.now(),
            request: entry.request.clone(),
            battle_state: driver.capture().encode()?,
            flushed_segments: driver.segments().to_vec(),
            captured_at: Utc::now(),
        })
    }

    fn checkpoint(&self, entry: &BattleEntry) -> Result<(), EngineError> {
        let record = Self::snapshot_record(entry)?;
        self.snapshots.upsert(&record)?;
        Ok(())
    }

    /// Upserts snapshots for every running battle that is not busy.
    pub fn checkpoint_all(&self) -> usize {
        let mut written = 0;
        for (id, shared) in self.entries() {
            let Ok(entry) = shared.try_lock() else {
                continue;
            };
            if entry.driver.is_completed() {
                continue;
            }
            match self.checkpoint(&entry) {
                Ok(()) => written += 1,
                Err(err) => error!("battle {id} snapshot upsert failed: {err}"),
            }
        }
        written
    }

    fn finalize(&self, entry: &mut BattleEntry, now: Instant) -> Result<String, EngineError> {
        let driver = &entry.driver;
        let outcome = driver.outcome();
        let status = driver.status();
        let record = BattleRecord {
            battle_id: entry.id,
            character_id: entry.request.profile.character_id.clone(),
            seed: driver.config().seed,
            rng_index_start: status.rng_index_start,
            rng_index_end: status.rng_index_end,
            enemy_descriptor: driver.provider().descriptor(),
            simulated_seconds: status.simulated_seconds,
            total_damage: status.total_damage,
            dps: status.dps,
            killed: outcome.killed,
            kill_time: outcome.kill_time,
            overkill: outcome.overkill,
            kills: outcome.kills,
            end_reason: outcome.end_reason,
            segment_count: status.segment_count,
            finalized_at: Utc::now(),
        };
        let rows = driver
            .segments()
            .iter()
            .map(|segment| SegmentRow::from_segment(entry.id, segment))
            .collect::<Result<Vec<_>, _>>()
            .map_err(PersistError::from)?;

        let persisted_id = self.sink.persist(&record, &rows)?;
        entry.persisted = true;
        entry.persisted_id = Some(persisted_id.clone());
        entry.finalized_at = Some(now);
        if let Err(err) = self.snapshots.remove(entry.id) {
            warn!("battle {} snapshot cleanup failed: {err}", entry.id);
        }
        info!(
            "battle {} finalized as {persisted_id}: reason={:?} damage={} segments={}",
            entry.id,
            record.end_reason,
            record.total_damage,
            rows.len()
        );
        Ok(persisted_id)
    }

    /// Force-stops and finalizes `id`. Safe to call repeatedly and while the
    /// driver is ticking; returns the same persisted id every time.
    pub fn stop_and_finalize(&self, id: Uuid) -> Result<String, EngineError> {
        let shared = self.entry(id).ok_or(EngineError::BattleNotFound(id))?;
        let mut entry = shared.lock().map_err(|_| EngineError::Poisoned(id))?;
        if let Some(persisted_id) = &entry.persisted_id {
            return Ok(persisted_id.clone());
        }
        entry.driver.force_stop();
        self.finalize(&mut entry, Instant::now())
    }

    pub fn get_status(&self, id: Uuid) -> Option<BattleStatus> {
        let shared = self.entry(id)?;
        let entry = shared.lock().ok()?;
        Some(entry.driver.status())
    }

    /// Segments flushed so far, starting at position `since`.
    pub fn get_segments(&self, id: Uuid, since: usize) -> Option<Vec<Segment>> {
        let shared = self.entry(id)?;
        let entry = shared.lock().ok()?;
        Some(entry.driver.segments_since(since).to_vec())
    }

    pub fn is_persisted(&self, id: Uuid) -> Option<bool> {
        let shared = self.entry(id)?;
        let entry = shared.lock().ok()?;
        Some(entry.persisted)
    }

    pub fn active_ids(&self) -> Vec<Uuid> {
        self.entries().into_iter().map(|(id, _)| id).collect()
    }

    pub fn len(&self) -> usize {
        self.battles.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::profession::Profession;

    fn coordinator() -> (Coordinator, Arc<MemoryBattleSink>, Arc<MemorySnapshotStore>) {
        let sink = Arc::new(MemoryBattleSink::new());
        let store = Arc::new(MemorySnapshotStore::new());
        let coordinator = Coordinator::new(
            EngineConfig::default(),
            Arc::new(EncounterCatalog::builtin()),
            sink.clone(),
            store.clone(),
        );
        (coordinator, sink, store)
    }

    fn request(seed: u64) -> BattleRequest {
        BattleRequest {
            profile: CharacterProfile::new("hero", Profession::Ranger),
            encounter: EncounterRequest::single("training_dummy"),
            target_duration: 120.0,
            seed: Some(seed),
        }
    }

    #[test]
    fn unknown_enemy_is_rejected_at_start() {
        let (coordinator, _, _) = coordinator();
        let mut bad = request(1);
        bad.encounter = EncounterRequest::single("dragon");
        assert!(matches!(coordinator.start(bad), Err(EngineError::UnknownEnemy(_))));
        assert!(coordinator.is_empty());
    }

    #[test]
    fn derived_seed_is_recorded_on_request() {
        let (coordinator, _, store) = coordinator();
        let mut unseeded = request(0);
        unseeded.seed = None;
        unseeded.encounter = EncounterRequest::single("ogre");
        let base = Instant::now();
        let id = coordinator.start_at(unseeded, base).expect("start");
        let cancel = AtomicBool::new(false);
        coordinator.advance_all_at(base + std::time::Duration::from_secs(31), &cancel);
        let record = store.get(id).expect("snapshot written");
        assert_eq!(record.request.seed, Some(seed_for_character("hero", None)));
    }

    #[test]
    fn stop_unknown_battle_is_not_found() {
        let (coordinator, _, _) = coordinator();
        assert!(matches!(
            coordinator.stop_and_finalize(Uuid::new_v4()),
            Err(EngineError::BattleNotFound(_))
        ));
    }
}
