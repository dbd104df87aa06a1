use std::collections::BTreeMap;
use std::process::Command;

use gridgym_brain::QTable;

fn gridgym() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_gridgym"));
    cmd.env("GRIDGYM_HEADLESS", "1")
        .env("TERM", "xterm-256color")
        .env("RUST_LOG", "off");
    cmd
}

#[test]
fn headless_play_prints_the_final_frame() {
    let output = gridgym()
        .args(["play", "zzt", "--steps", "5", "--seed", "3"])
        .output()
        .expect("failed to run gridgym binary");
    assert!(output.status.success(), "headless play failed");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("gridgym -- rangers, lions and a diamond\n"));
    assert!(stdout.contains(">>> console <<<"));
}

#[test]
fn random_layouts_play_headless() {
    let output = gridgym()
        .args(["play", "lumberjack", "--random", "--steps", "3", "--seed", "8"])
        .output()
        .expect("failed to run gridgym binary");
    assert!(output.status.success(), "random layout play failed");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(">>> console <<<"));
}

#[test]
fn unknown_scenarios_are_rejected() {
    let status = gridgym()
        .args(["play", "chess", "--steps", "1"])
        .status()
        .expect("failed to run gridgym binary");
    assert!(!status.success());
}

#[test]
fn trained_tables_drive_a_play_session() {
    let dir = tempfile::tempdir().expect("tempdir");
    let tables = dir.path().join("goal-q.json");
    let status = gridgym()
        .args(["train", "goal", "--episodes", "5", "--max-steps", "20", "--seed", "4"])
        .arg("--output")
        .arg(&tables)
        .status()
        .expect("failed to run gridgym binary");
    assert!(status.success(), "training failed");

    let file = std::fs::File::open(&tables).expect("q-tables written");
    let loaded: BTreeMap<u64, QTable> = serde_json::from_reader(file).expect("q-tables parse");
    assert_eq!(loaded.len(), 1);
    assert!(loaded.values().all(|table| !table.entries.is_empty()));

    let status = gridgym()
        .args(["play", "goal", "--steps", "10", "--seed", "4", "--headless"])
        .arg("--policy")
        .arg(&tables)
        .status()
        .expect("failed to run gridgym binary");
    assert!(status.success(), "policy play failed");
}
