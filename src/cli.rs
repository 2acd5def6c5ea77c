use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::combat::battle::{AdvanceBudget, BattleConfig, BattleDriver, BattleOutcome, BattleStatus};
use crate::combat::export_csv::write_segments_csv;
use crate::combat::profession::{CharacterProfile, Profession};
use crate::config::EngineConfig;
use crate::coordinator::{
    spawn_driver, BattleRequest, Coordinator, DriverStats, MemoryBattleSink, MemorySnapshotStore,
};
use crate::data::catalog::{EncounterCatalog, EncounterRequest};
use crate::error::{EngineError, PersistError};
use crate::parallel::{sweep_seeds, WorkerPool};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Simulate,
    Verify,
    Sweep,
    Export,
    Drive,
}

pub fn parse_command(args: &[String]) -> Option<Command> {
    match args.get(1).map(String::as_str) {
        Some("simulate") => Some(Command::Simulate),
        Some("verify") => Some(Command::Verify),
        Some("sweep") => Some(Command::Sweep),
        Some("export") => Some(Command::Export),
        Some("drive") => Some(Command::Drive),
        _ => None,
    }
}

pub fn run_with_args(args: &[String]) -> i32 {
    let positional: Vec<String> = args
        .iter()
        .filter(|arg| !arg.starts_with("--"))
        .cloned()
        .collect();
    let as_table = args.iter().any(|arg| arg == "--table");
    match parse_command(&positional) {
        Some(Command::Simulate) => handle_simulate(&positional, as_table),
        Some(Command::Verify) => handle_verify(&positional),
        Some(Command::Sweep) => handle_sweep(&positional),
        Some(Command::Export) => handle_export(&positional),
        Some(Command::Drive) => handle_drive(&positional),
        None => {
            eprintln!("usage: idlecombat <simulate|verify|sweep|export|drive>");
            2
        }
    }
}

/// `training_dummy`, `continuous:wolf`, `dungeon:wolf_den` or `dungeon:wolf_den:loop`.
fn parse_encounter(raw: &str) -> EncounterRequest {
    let parts: Vec<&str> = raw.split(':').collect();
    match parts.as_slice() {
        ["continuous", ids] => EncounterRequest::Continuous {
            enemies: ids.split('+').map(str::to_string).collect(),
            respawn_delay: 3.0,
        },
        ["dungeon", id] => EncounterRequest::Dungeon {
            dungeon_id: id.to_string(),
            looping: false,
        },
        ["dungeon", id, mode] => EncounterRequest::Dungeon {
            dungeon_id: id.to_string(),
            looping: *mode == "loop",
        },
        _ => EncounterRequest::Single {
            enemies: raw.split('+').map(str::to_string).collect(),
        },
    }
}

struct BattleArgs {
    profession: Profession,
    encounter: EncounterRequest,
    duration: f64,
}

fn parse_battle_args(args: &[String]) -> Result<BattleArgs, String> {
    let profession_raw = args.get(2).map(String::as_str).unwrap_or("warrior");
    let profession = Profession::parse(profession_raw)
        .ok_or_else(|| format!("unknown profession '{profession_raw}'"))?;
    let encounter = parse_encounter(args.get(3).map(String::as_str).unwrap_or("training_dummy"));
    let duration = parse_f64_arg(args.get(4), "duration", 120.0);
    Ok(BattleArgs {
        profession,
        encounter,
        duration,
    })
}

fn battle_config(args: &BattleArgs, seed: u64, engine: &EngineConfig) -> Result<BattleConfig, EngineError> {
    let catalog = EncounterCatalog::builtin();
    let mut config = BattleConfig::new(
        seed,
        args.duration,
        CharacterProfile::new("cli", args.profession),
        catalog.resolve(&args.encounter)?,
    );
    config.flush = engine.flush_policy();
    config.sim_speed = engine.sim_speed;
    Ok(config)
}

fn engine_config() -> Result<EngineConfig, i32> {
    EngineConfig::load(None).map_err(|err| {
        eprintln!("config error: {err}");
        1
    })
}

#[derive(Debug, Serialize)]
struct SimulateSummary {
    seed: u64,
    encounter: String,
    status: BattleStatus,
    outcome: BattleOutcome,
}

fn handle_simulate(args: &[String], as_table: bool) -> i32 {
    let battle = match parse_battle_args(args) {
        Ok(battle) => battle,
        Err(msg) => {
            eprintln!("{msg}");
            return 2;
        }
    };
    let seed = parse_u64_arg(args.get(5), "seed", 7);
    let engine = match engine_config() {
        Ok(engine) => engine,
        Err(code) => return code,
    };
    let mut driver = match battle_config(&battle, seed, &engine).and_then(BattleDriver::new) {
        Ok(driver) => driver,
        Err(err) => {
            eprintln!("simulate failed: {err}");
            return 1;
        }
    };
    driver.fast_forward_to(battle.duration);
    let summary = SimulateSummary {
        seed,
        encounter: driver.provider().descriptor(),
        status: driver.status(),
        outcome: driver.outcome().clone(),
    };

    if as_table {
        println!("seed\tsimulated_seconds\ttotal_damage\tdps\tkills\tsegments");
        println!(
            "{}\t{:.3}\t{}\t{:.3}\t{}\t{}",
            summary.seed,
            summary.status.simulated_seconds,
            summary.status.total_damage,
            summary.status.dps,
            summary.status.kills,
            summary.status.segment_count
        );
    } else {
        match serde_json::to_string_pretty(&summary) {
            Ok(payload) => println!("{payload}"),
            Err(err) => {
                eprintln!("failed to serialize simulation result: {err}");
                return 1;
            }
        }
    }
    0
}

#[derive(Debug, Serialize)]
struct VerifyReport {
    identical: bool,
    slice_seconds: f64,
    chunked_calls: usize,
    segments: usize,
    rng_index_end: i64,
    simulated_seconds: f64,
}

/// Runs the same battle throttled in `slice` steps and fast-forwarded in one
/// call, then compares the results.
fn handle_verify(args: &[String]) -> i32 {
    let battle = match parse_battle_args(args) {
        Ok(battle) => battle,
        Err(msg) => {
            eprintln!("{msg}");
            return 2;
        }
    };
    let seed = parse_u64_arg(args.get(5), "seed", 7);
    let slice = parse_f64_arg(args.get(6), "slice", 0.75);
    if !(slice.is_finite() && slice > 0.0) {
        eprintln!("slice must be positive");
        return 2;
    }
    let engine = match engine_config() {
        Ok(engine) => engine,
        Err(code) => return code,
    };
    let build = || battle_config(&battle, seed, &engine).and_then(BattleDriver::new);
    let (mut chunked, mut instant) = match (build(), build()) {
        (Ok(a), Ok(b)) => (a, b),
        (Err(err), _) | (_, Err(err)) => {
            eprintln!("verify failed: {err}");
            return 1;
        }
    };

    let base = Instant::now();
    chunked.anchor_wall_clock(base);
    let budget = AdvanceBudget {
        max_events: engine.max_events_per_tick,
        max_sim_slice: slice,
    };
    let mut calls = 0usize;
    let step = Duration::from_secs_f64(slice / engine.sim_speed);
    while !chunked.is_completed() {
        calls += 1;
        chunked.advance_at(base + step * calls as u32, budget);
    }
    instant.fast_forward_to(battle.duration);

    let identical = chunked.segments() == instant.segments()
        && chunked.rng_state() == instant.rng_state()
        && chunked.outcome() == instant.outcome();
    let report = VerifyReport {
        identical,
        slice_seconds: slice,
        chunked_calls: calls,
        segments: instant.segments().len(),
        rng_index_end: instant.rng_state().index,
        simulated_seconds: instant.now(),
    };
    match serde_json::to_string_pretty(&report) {
        Ok(payload) => println!("{payload}"),
        Err(err) => {
            eprintln!("failed to serialize verify report: {err}");
            return 1;
        }
    }
    if identical {
        0
    } else {
        1
    }
}

fn handle_sweep(args: &[String]) -> i32 {
    let battle = match parse_battle_args(args) {
        Ok(battle) => battle,
        Err(msg) => {
            eprintln!("{msg}");
            return 2;
        }
    };
    let count = parse_u64_arg(args.get(5), "count", 16);
    let workers = parse_u64_arg(args.get(6), "workers", 0) as usize;
    let engine = match engine_config() {
        Ok(engine) => engine,
        Err(code) => return code,
    };
    let seeds: Vec<u64> = (1..=count).collect();
    let result = battle_config(&battle, 0, &engine)
        .and_then(|template| sweep_seeds(&template, &seeds, &WorkerPool::with_workers(workers)));
    match result {
        Ok(summaries) => match serde_json::to_string_pretty(&summaries) {
            Ok(payload) => {
                println!("{payload}");
                0
            }
            Err(err) => {
                eprintln!("failed to serialize sweep result: {err}");
                1
            }
        },
        Err(err) => {
            eprintln!("sweep failed: {err}");
            1
        }
    }
}

fn handle_export(args: &[String]) -> i32 {
    let Some(path) = args.get(6) else {
        eprintln!("usage: idlecombat export <profession> <encounter> <duration> <seed> <out.csv>");
        return 2;
    };
    let battle = match parse_battle_args(args) {
        Ok(battle) => battle,
        Err(msg) => {
            eprintln!("{msg}");
            return 2;
        }
    };
    let seed = parse_u64_arg(args.get(5), "seed", 7);
    let engine = match engine_config() {
        Ok(engine) => engine,
        Err(code) => return code,
    };
    let mut driver = match battle_config(&battle, seed, &engine).and_then(BattleDriver::new) {
        Ok(driver) => driver,
        Err(err) => {
            eprintln!("export failed: {err}");
            return 1;
        }
    };
    driver.fast_forward_to(battle.duration);

    let written = File::create(Path::new(path))
        .map_err(PersistError::from)
        .and_then(|file| write_segments_csv(file, driver.segments()));
    match written {
        Ok(()) => {
            println!("exported {} segments to {path}", driver.segments().len());
            0
        }
        Err(err) => {
            eprintln!("export failed: {err}");
            1
        }
    }
}

#[derive(Debug, Serialize)]
struct DriveReport {
    wall_seconds: f64,
    battles: usize,
    ticks: u64,
    events_processed: u64,
    finalized: usize,
    persisted_records: usize,
}

/// Runs a coordinator with one battle per profession for `seconds` of wall
/// time, then stops and finalizes everything.
fn handle_drive(args: &[String]) -> i32 {
    let seconds = parse_f64_arg(args.get(2), "seconds", 2.0).max(0.0);
    let engine = match args.get(3) {
        Some(path) => EngineConfig::load(Some(Path::new(path))),
        None => EngineConfig::load(None),
    };
    let engine = match engine {
        Ok(engine) => engine,
        Err(err) => {
            eprintln!("config error: {err}");
            return 1;
        }
    };
    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("failed to start runtime: {err}");
            return 1;
        }
    };

    let sink = Arc::new(MemoryBattleSink::new());
    let coordinator = Arc::new(Coordinator::new(
        engine.clone(),
        Arc::new(EncounterCatalog::builtin()),
        sink.clone(),
        Arc::new(MemorySnapshotStore::new()),
    ));
    let encounters = [
        EncounterRequest::Dungeon {
            dungeon_id: "goblin_warren".to_string(),
            looping: true,
        },
        EncounterRequest::Continuous {
            enemies: vec!["wolf".to_string()],
            respawn_delay: 2.0,
        },
        EncounterRequest::single("training_dummy"),
    ];
    let professions = [Profession::Warrior, Profession::Ranger, Profession::Arcanist];
    let mut ids = Vec::new();
    for (n, (profession, encounter)) in professions.into_iter().zip(encounters).enumerate() {
        let request = BattleRequest {
            profile: CharacterProfile::new(&format!("drive-{n}"), profession),
            encounter,
            target_duration: 3600.0,
            seed: Some(n as u64 + 1),
        };
        match coordinator.start(request) {
            Ok(id) => ids.push(id),
            Err(err) => {
                eprintln!("drive failed to start battle: {err}");
                return 1;
            }
        }
    }

    let started = Instant::now();
    let stats: DriverStats = runtime.block_on(async {
        let handle = spawn_driver(Arc::clone(&coordinator), engine.tick_interval());
        tokio::time::sleep(Duration::from_secs_f64(seconds)).await;
        handle.shutdown().await
    });

    let mut finalized = 0;
    for id in &ids {
        match coordinator.stop_and_finalize(*id) {
            Ok(_) => finalized += 1,
            Err(err) => eprintln!("finalize {id} failed: {err}"),
        }
    }
    let report = DriveReport {
        wall_seconds: started.elapsed().as_secs_f64(),
        battles: ids.len(),
        ticks: stats.ticks,
        events_processed: stats.events_processed,
        finalized,
        persisted_records: sink.len(),
    };
    match serde_json::to_string_pretty(&report) {
        Ok(payload) => {
            println!("{payload}");
            if finalized == ids.len() {
                0
            } else {
                1
            }
        }
        Err(err) => {
            eprintln!("failed to serialize drive report: {err}");
            1
        }
    }
}

fn parse_u64_arg(raw: Option<&String>, name: &str, default: u64) -> u64 {
    raw.and_then(|value| value.parse::<u64>().ok())
        .unwrap_or_else(|| {
            if let Some(value) = raw {
                eprintln!("invalid {name} '{value}', defaulting to {default}");
            }
            default
        })
}

fn parse_f64_arg(raw: Option<&String>, name: &str, default: f64) -> f64 {
    raw.and_then(|value| value.parse::<f64>().ok())
        .unwrap_or_else(|| {
            if let Some(value) = raw {
                eprintln!("invalid {name} '{value}', defaulting to {default}");
            }
            default
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encounter_argument_forms() {
        assert_eq!(parse_encounter("goblin"), EncounterRequest::single("goblin"));
        assert_eq!(
            parse_encounter("dungeon:wolf_den:loop"),
            EncounterRequest::Dungeon {
                dungeon_id: "wolf_den".to_string(),
                looping: true
            }
        );
        assert!(matches!(
            parse_encounter("continuous:wolf+goblin"),
            EncounterRequest::Continuous { enemies, .. } if enemies.len() == 2
        ));
    }

    #[test]
    fn unknown_command_is_none() {
        let args = vec!["idlecombat".to_string(), "serve".to_string()];
        assert_eq!(parse_command(&args), None);
    }
}
