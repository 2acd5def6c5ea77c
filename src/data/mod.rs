pub mod catalog;

pub use catalog::{DungeonDef, EncounterCatalog, EncounterRequest, WaveDef};
