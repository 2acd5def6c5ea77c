//! Encounter/wave providers: what hostiles exist right now and what comes after
//! a group is cleared.
//!
//! State machine: group active -> group cleared -> (respawn pending | wave
//! advance | run complete) -> group active, or terminal for a single-run
//! dungeon or a single encounter.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::combat::encounter::{EncounterGroup, EnemyTemplate};
use crate::error::EngineError;

/// What follows a cleared group. Delays are simulated seconds the driver idles
/// before the next group engages.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transition {
    Respawn { delay: f64 },
    NextWave { wave_index: usize, delay: f64 },
    RunComplete { run_count: u32, delay: f64 },
    Terminal,
}

impl Transition {
    pub fn delay(&self) -> Option<f64> {
        match *self {
            Self::Respawn { delay }
            | Self::NextWave { delay, .. }
            | Self::RunComplete { delay, .. } => Some(delay),
            Self::Terminal => None,
        }
    }
}

pub trait EncounterProvider: Send + fmt::Debug {
    fn current(&self) -> &EncounterGroup;
    fn current_mut(&mut self) -> &mut EncounterGroup;

    /// Composition of the current group.
    fn templates(&self) -> &[EnemyTemplate];

    /// Called once the current group is cleared. Builds the next group, if any.
    fn advance(&mut self) -> Transition;

    fn try_advance(&mut self) -> bool {
        !matches!(self.advance(), Transition::Terminal)
    }

    fn is_terminal(&self) -> bool;

    fn wave_index(&self) -> usize {
        0
    }

    fn run_count(&self) -> u32 {
        0
    }

    /// Sets wave/run counters from a snapshot and rebuilds the matching group
    /// at full health. Returns false when the counters do not fit this provider.
    fn restore_counters(&mut self, wave_index: usize, run_count: u32) -> bool;

    /// Short human-readable description for persisted records.
    fn descriptor(&self) -> String;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveSpec {
    #[serde(default)]
    pub name: String,
    pub enemies: Vec<EnemyTemplate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum EncounterSpec {
    /// One group; clearing it ends the battle.
    Single { enemies: Vec<EnemyTemplate> },
    /// Same composition respawns `respawn_delay` seconds after every clear.
    Continuous {
        enemies: Vec<EnemyTemplate>,
        respawn_delay: f64,
    },
    /// Ordered waves; optionally loops back to the first wave after each run.
    Dungeon {
        dungeon_id: String,
        waves: Vec<WaveSpec>,
        looping: bool,
        #[serde(default)]
        wave_delay: f64,
    },
}

impl EncounterSpec {
    pub fn validate(&self) -> Result<(), EngineError> {
        let check_enemies = |enemies: &[EnemyTemplate]| {
            if enemies.is_empty() {
                return Err(EngineError::InvalidRequest(
                    "encounter needs at least one enemy".to_string(),
                ));
            }
            enemies
                .iter()
                .try_for_each(EnemyTemplate::validate)
                .map_err(EngineError::InvalidRequest)
        };
        match self {
            Self::Single { enemies } => check_enemies(enemies),
            Self::Continuous {
                enemies,
                respawn_delay,
            } => {
                if !(respawn_delay.is_finite() && *respawn_delay >= 0.0) {
                    return Err(EngineError::InvalidRequest(format!(
                        "respawn_delay must be a non-negative number, got {respawn_delay}"
                    )));
                }
                check_enemies(enemies)
            }
            Self::Dungeon {
                dungeon_id,
                waves,
                wave_delay,
                ..
            } => {
                if waves.is_empty() {
                    return Err(EngineError::InvalidRequest(format!(
                        "dungeon {dungeon_id} has no waves"
                    )));
                }
                if !(wave_delay.is_finite() && *wave_delay >= 0.0) {
                    return Err(EngineError::InvalidRequest(format!(
                        "wave_delay must be a non-negative number, got {wave_delay}"
                    )));
                }
                waves.iter().try_for_each(|wave| check_enemies(&wave.enemies))
            }
        }
    }

    pub fn build_provider(&self) -> Box<dyn EncounterProvider> {
        match self {
            Self::Single { enemies } => Box::new(SingleProvider::new(enemies.clone())),
            Self::Continuous {
                enemies,
                respawn_delay,
            } => Box::new(ContinuousProvider::new(enemies.clone(), *respawn_delay)),
            Self::Dungeon {
                dungeon_id,
                waves,
                looping,
                wave_delay,
            } => Box::new(DungeonProvider::new(
                dungeon_id.clone(),
                waves.clone(),
                *looping,
                *wave_delay,
            )),
        }
    }
}

fn describe(templates: &[EnemyTemplate]) -> String {
    templates
        .iter()
        .map(|t| t.id.as_str())
        .collect::<Vec<_>>()
        .join("+")
}

#[derive(Debug)]
pub struct SingleProvider {
    templates: Vec<EnemyTemplate>,
    group: EncounterGroup,
    terminal: bool,
}

impl SingleProvider {
    pub fn new(templates: Vec<EnemyTemplate>) -> Self {
        let group = EncounterGroup::from_templates(&templates, 0);
        Self {
            templates,
            group,
            terminal: false,
        }
    }
}

impl EncounterProvider for SingleProvider {
    fn current(&self) -> &EncounterGroup {
        &self.group
    }

    fn current_mut(&mut self) -> &mut EncounterGroup {
        &mut self.group
    }

    fn templates(&self) -> &[EnemyTemplate] {
        &self.templates
    }

    fn advance(&mut self) -> Transition {
        self.terminal = true;
        Transition::Terminal
    }

    fn is_terminal(&self) -> bool {
        self.terminal
    }

    fn restore_counters(&mut self, wave_index: usize, run_count: u32) -> bool {
        if wave_index != 0 || run_count != 0 {
            return false;
        }
        self.group = EncounterGroup::from_templates(&self.templates, 0);
        self.terminal = false;
        true
    }

    fn descriptor(&self) -> String {
        format!("single:{}", describe(&self.templates))
    }
}

#[derive(Debug)]
pub struct ContinuousProvider {
    templates: Vec<EnemyTemplate>,
    respawn_delay: f64,
    group: EncounterGroup,
}

impl ContinuousProvider {
    pub fn new(templates: Vec<EnemyTemplate>, respawn_delay: f64) -> Self {
        let group = EncounterGroup::from_templates(&templates, 0);
        Self {
            templates,
            respawn_delay: respawn_delay.max(0.0),
            group,
        }
    }

    pub fn respawn_delay(&self) -> f64 {
        self.respawn_delay
    }
}

impl EncounterProvider for ContinuousProvider {
    fn current(&self) -> &EncounterGroup {
        &self.group
    }

    fn current_mut(&mut self) -> &mut EncounterGroup {
        &mut self.group
    }

    fn templates(&self) -> &[EnemyTemplate] {
        &self.templates
    }

    fn advance(&mut self) -> Transition {
        let generation = self.group.generation.wrapping_add(1);
        self.group = EncounterGroup::from_templates(&self.templates, generation);
        Transition::Respawn {
            delay: self.respawn_delay,
        }
    }

    fn is_terminal(&self) -> bool {
        false
    }

    fn restore_counters(&mut self, wave_index: usize, run_count: u32) -> bool {
        if wave_index != 0 || run_count != 0 {
            return false;
        }
        let generation = self.group.generation;
        self.group = EncounterGroup::from_templates(&self.templates, generation);
        true
    }

    fn descriptor(&self) -> String {
        format!("continuous:{}", describe(&self.templates))
    }
}

#[derive(Debug)]
pub struct DungeonProvider {
    dungeon_id: String,
    waves: Vec<WaveSpec>,
    looping: bool,
    wave_delay: f64,
    wave_index: usize,
    run_count: u32,
    terminal: bool,
    group: EncounterGroup,
}

impl DungeonProvider {
    /// # Panics
    /// When `waves` is empty; [EncounterSpec::validate] rejects that earlier.
    pub fn new(dungeon_id: String, waves: Vec<WaveSpec>, looping: bool, wave_delay: f64) -> Self {
        assert!(!waves.is_empty(), "dungeon {dungeon_id} has no waves");
        let group = EncounterGroup::from_templates(&waves[0].enemies, 0);
        Self {
            dungeon_id,
            waves,
            looping,
            wave_delay: wave_delay.max(0.0),
            wave_index: 0,
            run_count: 0,
            terminal: false,
            group,
        }
    }

    pub fn wave_count(&self) -> usize {
        self.waves.len()
    }

    fn build_wave(&mut self) {
        let generation = self.group.generation.wrapping_add(1);
        self.group = EncounterGroup::from_templates(&self.waves[self.wave_index].enemies, generation);
    }
}

impl EncounterProvider for DungeonProvider {
    fn current(&self) -> &EncounterGroup {
        &self.group
    }

    fn current_mut(&mut self) -> &mut EncounterGroup {
        &mut self.group
    }

    fn templates(&self) -> &[EnemyTemplate] {
        &self.waves[self.wave_index].enemies
    }

    fn advance(&mut self) -> Transition {
        if self.terminal {
            return Transition::Terminal;
        }
        if self.wave_index + 1 < self.waves.len() {
            self.wave_index += 1;
            self.build_wave();
            return Transition::NextWave {
                wave_index: self.wave_index,
                delay: self.wave_delay,
            };
        }
        self.run_count += 1;
        if self.looping {
            self.wave_index = 0;
            self.build_wave();
            Transition::RunComplete {
                run_count: self.run_count,
                delay: self.wave_delay,
            }
        } else {
            self.terminal = true;
            Transition::Terminal
        }
    }

    fn is_terminal(&self) -> bool {
        self.terminal
    }

    fn wave_index(&self) -> usize {
        self.wave_index
    }

    fn run_count(&self) -> u32 {
        self.run_count
    }

    fn restore_counters(&mut self, wave_index: usize, run_count: u32) -> bool {
        if wave_index >= self.waves.len() || (!self.looping && run_count > 0) {
            return false;
        }
        self.wave_index = wave_index;
        self.run_count = run_count;
        self.terminal = false;
        self.build_wave();
        true
    }

    fn descriptor(&self) -> String {
        format!(
            "dungeon:{}:{}",
            self.dungeon_id,
            if self.looping { "loop" } else { "once" }
        )
    }
}
