pub mod cli;
pub mod combat;
pub mod config;
pub mod coordinator;
pub mod data;
pub mod error;
pub mod logging;
pub mod parallel;

pub use combat::{AdvanceBudget, BattleConfig, BattleDriver, BattleOutcome, EndReason};
pub use config::EngineConfig;
pub use coordinator::{BattleRequest, Coordinator, TickReport};
pub use error::{ConfigError, EngineError, PersistError, SnapshotError};
