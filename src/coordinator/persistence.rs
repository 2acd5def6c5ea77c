//! Outbound persistence: finalized battle records and resumable snapshots.
//!
//! The coordinator only sees the [BattleSink] and [SnapshotStore] traits;
//! in-memory and JSON-directory implementations live here.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::combat::battle::EndReason;
use crate::combat::segment::Segment;
use crate::coordinator::BattleRequest;
use crate::error::PersistError;

/// Totals of a completed battle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleRecord {
    pub battle_id: Uuid,
    pub character_id: String,
    pub seed: u64,
    pub rng_index_start: i64,
    pub rng_index_end: i64,
    pub enemy_descriptor: String,
    pub simulated_seconds: f64,
    pub total_damage: i64,
    pub dps: f64,
    pub killed: bool,
    pub kill_time: Option<f64>,
    pub overkill: i64,
    pub kills: u32,
    pub end_reason: Option<EndReason>,
    pub segment_count: usize,
    pub finalized_at: DateTime<Utc>,
}

/// One flushed segment as stored; the maps are JSON-encoded bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentRow {
    pub battle_id: Uuid,
    pub segment_index: u32,
    pub start_time: f64,
    pub end_time: f64,
    pub event_count: u32,
    pub total_damage: i64,
    pub rng_index_start: i64,
    pub rng_index_end: i64,
    pub damage_by_source: Vec<u8>,
    pub damage_by_type: Vec<u8>,
    pub resource_flow: Vec<u8>,
    pub tag_counters: Vec<u8>,
}

impl SegmentRow {
    pub fn from_segment(battle_id: Uuid, segment: &Segment) -> Result<Self, serde_json::Error> {
        Ok(Self {
            battle_id,
            segment_index: segment.index,
            start_time: segment.start_time,
            end_time: segment.end_time,
            event_count: segment.event_count,
            total_damage: segment.total_damage,
            rng_index_start: segment.rng_index_start,
            rng_index_end: segment.rng_index_end,
            damage_by_source: serde_json::to_vec(&segment.damage_by_source)?,
            damage_by_type: serde_json::to_vec(&segment.damage_by_type)?,
            resource_flow: serde_json::to_vec(&segment.resource_flow)?,
            tag_counters: serde_json::to_vec(&segment.tag_counters)?,
        })
    }

    /// Decodes the stored blobs back into a [Segment].
    pub fn to_segment(&self) -> Result<Segment, serde_json::Error> {
        Ok(Segment {
            index: self.segment_index,
            start_time: self.start_time,
            end_time: self.end_time,
            event_count: self.event_count,
            total_damage: self.total_damage,
            damage_by_source: serde_json::from_slice(&self.damage_by_source)?,
            damage_by_type: serde_json::from_slice(&self.damage_by_type)?,
            resource_flow: serde_json::from_slice(&self.resource_flow)?,
            tag_counters: serde_json::from_slice(&self.tag_counters)?,
            rng_index_start: self.rng_index_start,
            rng_index_end: self.rng_index_end,
        })
    }
}

/// Everything needed to rebuild a running battle after a restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub battle_id: Uuid,
    pub character_id: String,
    pub seed: u64,
    pub target_duration: f64,
    pub simulated_seconds: f64,
    pub request: BattleRequest,
    /// Encoded [crate::combat::snapshot::BattleState].
    pub battle_state: String,
    #[serde(default)]
    pub flushed_segments: Vec<Segment>,
    pub captured_at: DateTime<Utc>,
}

pub trait BattleSink: Send + Sync {
    /// Stores a finalized battle and its segments atomically. Returns the
    /// persisted id.
    fn persist(&self, record: &BattleRecord, segments: &[SegmentRow]) -> Result<String, PersistError>;
}

pub trait SnapshotStore: Send + Sync {
    /// One row per battle id; a later upsert replaces the earlier one.
    fn upsert(&self, record: &SnapshotRecord) -> Result<(), PersistError>;
    fn remove(&self, battle_id: Uuid) -> Result<(), PersistError>;
    fn load_all(&self) -> Result<Vec<SnapshotRecord>, PersistError>;
}

#[derive(Debug, Default)]
pub struct MemoryBattleSink {
    stored: Mutex<Vec<(BattleRecord, Vec<SegmentRow>)>>,
}

impl MemoryBattleSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<BattleRecord> {
        self.stored
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(record, _)| record.clone())
            .collect()
    }

    pub fn segments_for(&self, battle_id: Uuid) -> Vec<SegmentRow> {
        self.stored
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(record, _)| record.battle_id == battle_id)
            .flat_map(|(_, rows)| rows.iter().cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.stored.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BattleSink for MemoryBattleSink {
    fn persist(&self, record: &BattleRecord, segments: &[SegmentRow]) -> Result<String, PersistError> {
        self.stored
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((record.clone(), segments.to_vec()));
        Ok(record.battle_id.to_string())
    }
}

#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    rows: Mutex<HashMap<Uuid, SnapshotRecord>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, battle_id: Uuid) -> Option<SnapshotRecord> {
        self.rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&battle_id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn upsert(&self, record: &SnapshotRecord) -> Result<(), PersistError> {
        self.rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(record.battle_id, record.clone());
        Ok(())
    }

    fn remove(&self, battle_id: Uuid) -> Result<(), PersistError> {
        self.rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&battle_id);
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<SnapshotRecord>, PersistError> {
        let mut records: Vec<_> = self
            .rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        records.sort_by_key(|r| r.battle_id);
        Ok(records)
    }
}

/// One pretty-printed `<battle_id>.json` per battle.
#[derive(Debug, Clone)]
pub struct JsonDirSnapshotStore {
    dir: PathBuf,
}

impl JsonDirSnapshotStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, battle_id: Uuid) -> PathBuf {
        self.dir.join(format!("{battle_id}.json"))
    }
}

impl SnapshotStore for JsonDirSnapshotStore {
    fn upsert(&self, record: &SnapshotRecord) -> Result<(), PersistError> {
        fs::create_dir_all(&self.dir)?;
        let serialized = serde_json::to_string_pretty(record)?;
        // Replace the previous row only once the new one is fully written.
        let final_path = self.path_for(record.battle_id);
        let tmp_path = final_path.with_extension("json.tmp");
        fs::write(&tmp_path, serialized)?;
        fs::rename(tmp_path, final_path)?;
        Ok(())
    }

    fn remove(&self, battle_id: Uuid) -> Result<(), PersistError> {
        match fs::remove_file(self.path_for(battle_id)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn load_all(&self) -> Result<Vec<SnapshotRecord>, PersistError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut paths = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                paths.push(path);
            }
        }
        paths.sort();
        let mut records = Vec::with_capacity(paths.len());
        for path in paths {
            let raw = fs::read_to_string(&path)?;
            records.push(serde_json::from_str(&raw)?);
        }
        Ok(records)
    }
}

/// `<dir>/<battle_id>/record.json` plus `segments.csv`.
#[derive(Debug, Clone)]
pub struct JsonDirBattleSink {
    dir: PathBuf,
}

impl JsonDirBattleSink {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }
}

impl BattleSink for JsonDirBattleSink {
    fn persist(&self, record: &BattleRecord, segments: &[SegmentRow]) -> Result<String, PersistError> {
        let battle_dir = self.dir.join(record.battle_id.to_string());
        fs::create_dir_all(&battle_dir)?;
        fs::write(
            battle_dir.join("record.json"),
            serde_json::to_string_pretty(record)?,
        )?;
        let decoded = segments
            .iter()
            .map(SegmentRow::to_segment)
            .collect::<Result<Vec<_>, _>>()?;
        let file = fs::File::create(battle_dir.join("segments.csv"))?;
        crate::combat::export_csv::write_segments_csv(file, &decoded)?;
        Ok(record.battle_id.to_string())
    }
}
