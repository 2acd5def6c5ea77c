use std::fs;
use std::path::PathBuf;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

fn bin() -> &'static str {
    env!("CARGO_BIN_EXE_idlecombat")
}

fn unique_temp_path(name: &str) -> PathBuf {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock should be after unix epoch")
        .as_nanos();
    std::env::temp_dir().join(format!("idlecombat-{name}-{stamp}.csv"))
}

#[test]
fn simulate_command_dispatches_and_emits_json() {
    let output = Command::new(bin())
        .args(["simulate", "warrior", "training_dummy", "600", "42"])
        .output()
        .expect("simulate should run");

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let payload: serde_json::Value =
        serde_json::from_str(&stdout).expect("simulate should emit json");
    assert_eq!(payload["seed"], 42);
    assert_eq!(payload["encounter"], "single:training_dummy");
    assert_eq!(payload["outcome"]["killed"], true);
    assert_eq!(payload["outcome"]["end_reason"], "killed");
    assert_eq!(payload["status"]["total_damage"], 1500);
}

#[test]
fn simulate_is_reproducible_across_runs() {
    let run = || {
        Command::new(bin())
            .args(["simulate", "ranger", "continuous:wolf", "90", "5"])
            .output()
            .expect("simulate should run")
            .stdout
    };
    assert_eq!(run(), run());
}

#[test]
fn simulate_table_flag_prints_tsv() {
    let output = Command::new(bin())
        .args(["simulate", "arcanist", "goblin", "60", "3", "--table"])
        .output()
        .expect("simulate should run");

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut lines = stdout.lines();
    assert_eq!(
        lines.next(),
        Some("seed\tsimulated_seconds\ttotal_damage\tdps\tkills\tsegments")
    );
    let row = lines.next().expect("data row");
    assert!(row.starts_with("3\t"));
    assert_eq!(row.split('\t').count(), 6);
}

#[test]
fn simulate_rejects_unknown_profession() {
    let output = Command::new(bin())
        .args(["simulate", "bard"])
        .output()
        .expect("simulate should run");
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown profession 'bard'"));
}

#[test]
fn simulate_reports_unknown_enemy() {
    let output = Command::new(bin())
        .args(["simulate", "warrior", "dragon"])
        .output()
        .expect("simulate should run");
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn verify_command_confirms_identical_histories() {
    let output = Command::new(bin())
        .args(["verify", "arcanist", "dungeon:wolf_den:loop", "120", "9", "0.4"])
        .output()
        .expect("verify should run");

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let payload: serde_json::Value =
        serde_json::from_str(&stdout).expect("verify should emit json");
    assert_eq!(payload["identical"], true);
    assert!(payload["chunked_calls"].as_u64().unwrap_or(0) >= 300);
    assert_eq!(payload["simulated_seconds"], 120.0);
}

#[test]
fn sweep_command_emits_one_summary_per_seed() {
    let output = Command::new(bin())
        .args(["sweep", "ranger", "goblin", "120", "6", "2"])
        .output()
        .expect("sweep should run");

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let payload: serde_json::Value =
        serde_json::from_str(&stdout).expect("sweep should emit json");
    let rows = payload.as_array().expect("array");
    assert_eq!(rows.len(), 6);
    let seeds: Vec<_> = rows.iter().filter_map(|r| r["seed"].as_u64()).collect();
    assert_eq!(seeds, vec![1, 2, 3, 4, 5, 6]);
}

#[test]
fn export_command_returns_usage_without_path() {
    let output = Command::new(bin())
        .args(["export", "warrior"])
        .output()
        .expect("export should run");

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("usage: idlecombat export"));
}

#[test]
fn export_command_writes_csv_file() {
    let path = unique_temp_path("export");
    let path_arg = path.to_string_lossy().to_string();
    let output = Command::new(bin())
        .args(["export", "warrior", "ogre", "30", "4", &path_arg])
        .output()
        .expect("export should run");

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("exported"));
    let csv = fs::read_to_string(&path).expect("csv written");
    assert!(csv.starts_with("index,start_time,end_time"));
    assert!(csv.lines().count() > 2);
    fs::remove_file(path).expect("cleanup");
}

#[test]
fn drive_command_finalizes_every_battle() {
    let output = Command::new(bin())
        .args(["drive", "0.3"])
        .output()
        .expect("drive should run");

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let payload: serde_json::Value =
        serde_json::from_str(&stdout).expect("drive should emit json");
    assert_eq!(payload["battles"], 3);
    assert_eq!(payload["finalized"], 3);
    assert_eq!(payload["persisted_records"], 3);
}

#[test]
fn missing_command_prints_usage() {
    let output = Command::new(bin()).output().expect("binary should run");
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("usage: idlecombat"));
}
