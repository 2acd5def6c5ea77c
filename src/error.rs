//! Crate error types.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid battle request: {0}")]
    InvalidRequest(String),
    #[error("unknown enemy id: {0}")]
    UnknownEnemy(String),
    #[error("unknown dungeon id: {0}")]
    UnknownDungeon(String),
    #[error("battle {0} not found")]
    BattleNotFound(Uuid),
    #[error("battle {0} lock poisoned")]
    Poisoned(Uuid),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error(transparent)]
    Persist(#[from] PersistError),
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("malformed battle_state: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("invalid battle_state: {0}")]
    Invalid(String),
    #[error("restore requires a driver that has not advanced")]
    DriverAlreadyAdvanced,
}

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("sink rejected battle {battle_id}: {reason}")]
    Rejected { battle_id: Uuid, reason: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("failed to parse JSON config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid value for {key}: {value}")]
    Env { key: String, value: String },
    #[error("invalid config: {0}")]
    Invalid(String),
}
