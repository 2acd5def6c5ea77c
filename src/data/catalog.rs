//! Enemy and dungeon catalog. Requests name enemies and dungeons by id; the
//! catalog resolves them into a concrete [EncounterSpec].
//! Built-in content is always available; a JSON or YAML file can replace it.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::combat::encounter::{EnemySkill, EnemyTemplate};
use crate::combat::provider::{EncounterSpec, WaveSpec};
use crate::error::{ConfigError, EngineError};

/// Normalize an id for lookup: lowercase, spaces and dashes become underscores.
fn normalize_lookup(s: &str) -> String {
    s.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_whitespace() || c == '-' { '_' } else { c })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveDef {
    #[serde(default)]
    pub name: String,
    /// Enemy ids, one entry per slot.
    pub enemies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DungeonDef {
    pub id: String,
    pub name: String,
    pub waves: Vec<WaveDef>,
    #[serde(default)]
    pub wave_delay: f64,
}

/// What a battle request asks to fight, by catalog id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum EncounterRequest {
    Single {
        enemies: Vec<String>,
    },
    Continuous {
        enemies: Vec<String>,
        #[serde(default)]
        respawn_delay: f64,
    },
    Dungeon {
        dungeon_id: String,
        #[serde(default)]
        looping: bool,
    },
}

impl EncounterRequest {
    pub fn single(enemy_id: &str) -> Self {
        Self::Single {
            enemies: vec![enemy_id.to_string()],
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    enemies: Vec<EnemyTemplate>,
    #[serde(default)]
    dungeons: Vec<DungeonDef>,
}

#[derive(Debug, Clone, Default)]
pub struct EncounterCatalog {
    enemies: BTreeMap<String, EnemyTemplate>,
    dungeons: BTreeMap<String, DungeonDef>,
}

impl EncounterCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        catalog.insert_enemy(EnemyTemplate::new("training_dummy", "Training Dummy", 1500));
        catalog.insert_enemy(EnemyTemplate {
            armor: 0.1,
            ..EnemyTemplate::new("goblin", "Goblin", 400)
        });
        catalog.insert_enemy(EnemyTemplate {
            skill: Some(EnemySkill {
                name: "Howl".to_string(),
                check_interval: 5.0,
                cast_chance: 0.25,
                cast_time: 1.0,
                damage: 15,
            }),
            ..EnemyTemplate::new("wolf", "Wolf", 250)
        });
        catalog.insert_enemy(EnemyTemplate {
            armor: 0.25,
            skill: Some(EnemySkill {
                name: "Ground Slam".to_string(),
                check_interval: 4.0,
                cast_chance: 0.35,
                cast_time: 1.5,
                damage: 80,
            }),
            ..EnemyTemplate::new("ogre", "Ogre", 2200)
        });
        catalog.insert_dungeon(DungeonDef {
            id: "goblin_warren".to_string(),
            name: "Goblin Warren".to_string(),
            waves: vec![
                WaveDef {
                    name: "Tunnel".to_string(),
                    enemies: vec!["goblin".to_string(), "goblin".to_string()],
                },
                WaveDef {
                    name: "Den".to_string(),
                    enemies: vec!["ogre".to_string()],
                },
            ],
            wave_delay: 2.0,
        });
        catalog.insert_dungeon(DungeonDef {
            id: "wolf_den".to_string(),
            name: "Wolf Den".to_string(),
            waves: vec![
                WaveDef {
                    name: "Scouts".to_string(),
                    enemies: vec!["wolf".to_string(), "wolf".to_string()],
                },
                WaveDef {
                    name: "Pack".to_string(),
                    enemies: vec!["wolf".to_string(), "wolf".to_string(), "wolf".to_string()],
                },
                WaveDef {
                    name: "Alpha".to_string(),
                    enemies: vec!["ogre".to_string()],
                },
            ],
            wave_delay: 1.5,
        });
        catalog
    }

    /// Loads a catalog file. `.yaml`/`.yml` parse as YAML, anything else as JSON.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let file: CatalogFile = match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml" | "yml") => serde_yaml::from_str(&raw)?,
            _ => serde_json::from_str(&raw)?,
        };
        let mut catalog = Self::new();
        for enemy in file.enemies {
            enemy.validate().map_err(ConfigError::Invalid)?;
            catalog.insert_enemy(enemy);
        }
        for dungeon in file.dungeons {
            catalog.insert_dungeon(dungeon);
        }
        Ok(catalog)
    }

    pub fn insert_enemy(&mut self, template: EnemyTemplate) {
        self.enemies.insert(normalize_lookup(&template.id), template);
    }

    pub fn insert_dungeon(&mut self, dungeon: DungeonDef) {
        self.dungeons.insert(normalize_lookup(&dungeon.id), dungeon);
    }

    pub fn enemy(&self, id: &str) -> Option<&EnemyTemplate> {
        self.enemies.get(&normalize_lookup(id))
    }

    pub fn dungeon(&self, id: &str) -> Option<&DungeonDef> {
        self.dungeons.get(&normalize_lookup(id))
    }

    pub fn enemy_ids(&self) -> impl Iterator<Item = &str> {
        self.enemies.values().map(|t| t.id.as_str())
    }

    pub fn dungeon_ids(&self) -> impl Iterator<Item = &str> {
        self.dungeons.values().map(|d| d.id.as_str())
    }

    fn templates(&self, ids: &[String]) -> Result<Vec<EnemyTemplate>, EngineError> {
        ids.iter()
            .map(|id| {
                self.enemy(id)
                    .cloned()
                    .ok_or_else(|| EngineError::UnknownEnemy(id.clone()))
            })
            .collect()
    }

    pub fn resolve(&self, request: &EncounterRequest) -> Result<EncounterSpec, EngineError> {
        let spec = match request {
            EncounterRequest::Single { enemies } => EncounterSpec::Single {
                enemies: self.templates(enemies)?,
            },
            EncounterRequest::Continuous {
                enemies,
                respawn_delay,
            } => EncounterSpec::Continuous {
                enemies: self.templates(enemies)?,
                respawn_delay: *respawn_delay,
            },
            EncounterRequest::Dungeon {
                dungeon_id,
                looping,
            } => {
                let dungeon = self
                    .dungeon(dungeon_id)
                    .ok_or_else(|| EngineError::UnknownDungeon(dungeon_id.clone()))?;
                let waves = dungeon
                    .waves
                    .iter()
                    .map(|wave| {
                        Ok(WaveSpec {
                            name: wave.name.clone(),
                            enemies: self.templates(&wave.enemies)?,
                        })
                    })
                    .collect::<Result<Vec<_>, EngineError>>()?;
                EncounterSpec::Dungeon {
                    dungeon_id: dungeon.id.clone(),
                    waves,
                    looping: *looping,
                    wave_delay: dungeon.wave_delay,
                }
            }
        };
        spec.validate()?;
        Ok(spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_resolves_dungeon_waves() {
        let catalog = EncounterCatalog::builtin();
        let spec = catalog
            .resolve(&EncounterRequest::Dungeon {
                dungeon_id: "Wolf Den".to_string(),
                looping: true,
            })
            .expect("wolf den");
        let EncounterSpec::Dungeon { waves, looping, .. } = spec else {
            panic!("expected a dungeon spec");
        };
        assert!(looping);
        assert_eq!(waves.len(), 3);
        assert_eq!(waves[1].enemies.len(), 3);
    }

    #[test]
    fn unknown_ids_are_errors() {
        let catalog = EncounterCatalog::builtin();
        assert!(matches!(
            catalog.resolve(&EncounterRequest::single("dragon")),
            Err(EngineError::UnknownEnemy(id)) if id == "dragon"
        ));
        assert!(matches!(
            catalog.resolve(&EncounterRequest::Dungeon {
                dungeon_id: "nowhere".to_string(),
                looping: false
            }),
            Err(EngineError::UnknownDungeon(_))
        ));
    }

    #[test]
    fn empty_single_request_is_rejected() {
        let catalog = EncounterCatalog::builtin();
        assert!(matches!(
            catalog.resolve(&EncounterRequest::Single { enemies: vec![] }),
            Err(EngineError::InvalidRequest(_))
        ));
    }
}
