//! Shared application plumbing for the gridgym command line.

use anyhow::{Context, Result};
use gridgym_brain::QTable;
use gridgym_core::WorldConfig;
use std::{collections::BTreeMap, fs::File, io::BufReader, path::Path};

pub mod session;
pub mod terminal;

pub use session::Session;
pub use terminal::TerminalView;

/// Reads a JSON world configuration; missing fields keep their defaults.
pub fn load_world_config(path: &Path) -> Result<WorldConfig> {
    let file =
        File::open(path).with_context(|| format!("failed to open config {}", path.display()))?;
    let config: WorldConfig = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("failed to parse config {}", path.display()))?;
    config.validate().context("invalid world configuration")?;
    Ok(config)
}

/// Reads the per-agent q-tables written by `gridgym train`.
pub fn load_q_tables(path: &Path) -> Result<BTreeMap<u64, QTable>> {
    let file =
        File::open(path).with_context(|| format!("failed to open q-tables {}", path.display()))?;
    let tables: BTreeMap<u64, QTable> = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("failed to parse q-tables {}", path.display()))?;
    for (uid, table) in &tables {
        table
            .validate()
            .with_context(|| format!("q-table for agent {uid} in {}", path.display()))?;
    }
    Ok(tables)
}

/// Writes per-agent q-tables as one JSON object keyed by agent uid.
pub fn save_q_tables(path: &Path, tables: &BTreeMap<u64, QTable>) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(file, tables).context("failed to serialize q-tables")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridgym_core::Topology;

    #[test]
    fn partial_config_files_keep_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("world.json");
        std::fs::write(&path, r#"{"topology": "bounded", "rng_seed": 5}"#).expect("write");
        let config = load_world_config(&path).expect("config");
        assert_eq!(config.topology, Topology::Bounded);
        assert_eq!(config.rng_seed, Some(5));
        assert_eq!(config.agent_energy, WorldConfig::default().agent_energy);
        assert!(load_world_config(&dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn q_tables_round_trip_through_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested/q.json");
        let tables = BTreeMap::from([(
            3,
            QTable {
                actions: gridgym_brain::ACTION_COUNT,
                entries: Vec::new(),
            },
        )]);
        save_q_tables(&path, &tables).expect("save");
        assert_eq!(load_q_tables(&path).expect("load"), tables);
    }

    #[test]
    fn q_tables_with_wrong_row_width_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("q.json");
        std::fs::write(
            &path,
            r#"{"0": {"actions": 9, "entries": [{"state": [1.0], "values": [0.5, 0.5]}]}}"#,
        )
        .expect("write");
        let err = load_q_tables(&path).expect_err("short rows");
        assert!(format!("{err:#}").contains("action count mismatch"));
    }
}
