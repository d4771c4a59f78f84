use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::types::HistorySnapshot;

const SNAPSHOT_PREFIX: &str = "snapshot-";

/// Append-only store of per-window aggregation snapshots, one JSON file per
/// period end date.
///
/// Reading degrades, writing replaces: a corrupt entry is skipped instead of
/// failing the run, and re-running a window overwrites its own file rather
/// than producing a duplicate.
pub struct HistoryStore {
    dir: PathBuf,
}

impl HistoryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Load up to `n` most recent snapshots, oldest first.
    ///
    /// A missing directory is an empty history. An unreadable or malformed
    /// entry is skipped with a warning so one bad file cannot poison trend
    /// computation.
    pub fn load_recent(&self, n: usize) -> Vec<HistorySnapshot> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };

        let mut names: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|name| name.starts_with(SNAPSHOT_PREFIX) && name.ends_with(".json"))
            .collect();
        // ISO date keys in the filename sort chronologically.
        names.sort();

        let start = names.len().saturating_sub(n);
        names[start..]
            .iter()
            .filter_map(|name| self.read_snapshot(name))
            .collect()
    }

    /// Persist one snapshot, replacing any existing entry for the same
    /// period key.
    pub fn append(&self, snapshot: &HistorySnapshot) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create history dir: {}", self.dir.display()))?;

        let path = self
            .dir
            .join(format!("{}{}.json", SNAPSHOT_PREFIX, snapshot.period.end));
        let mut json = serde_json::to_string_pretty(snapshot)
            .context("Failed to serialize history snapshot")?;
        json.push('\n');

        fs::write(&path, json)
            .with_context(|| format!("Failed to write history snapshot: {}", path.display()))?;
        Ok(())
    }

    fn read_snapshot(&self, name: &str) -> Option<HistorySnapshot> {
        let path = self.dir.join(name);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "Skipping unreadable history entry");
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "Skipping malformed history entry");
                None
            }
        }
    }
}
