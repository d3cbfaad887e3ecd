//! Snapshot store — the durable baseline for the next reconciliation run.
//!
//! Persists a `PersistedSnapshot` JSON document at
//! `<home>/.sheetsync/snapshots/<job>.json`.
//! Writes use an atomic `.tmp` + rename pattern; the store is read once at
//! run start and written at most once at run end.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{io_err, SnapshotStoreError};
use crate::types::Record;

/// On-disk snapshot payload: one object holding the ordered record
/// sequence, plus the digest used for the snapshot-equality short-circuit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistedSnapshot {
    pub synced_at: DateTime<Utc>,
    pub digest: String,
    #[serde(default)]
    pub records: Vec<Record>,
}

/// Path to the snapshot JSON for a given job, rooted at `home`.
///
/// `~/.sheetsync/snapshots/<job>.json`
pub fn store_path_at(home: &Path, job: &str) -> PathBuf {
    home.join(".sheetsync")
        .join("snapshots")
        .join(format!("{job}.json"))
}

/// Load the persisted snapshot for `job`.
///
/// Returns `None` when no snapshot has been persisted yet (first run) —
/// absence is meaningful to the caller, which then baselines against the
/// downstream store instead.
pub fn load_at(home: &Path, job: &str) -> Result<Option<PersistedSnapshot>, SnapshotStoreError> {
    let path = store_path_at(home, job);
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    let snapshot = serde_json::from_str(&contents)?;
    Ok(Some(snapshot))
}

/// Save the snapshot for `job` atomically.
///
/// Writes to `<path>.tmp` then renames to `<path>`.
pub fn save_at(
    home: &Path,
    job: &str,
    snapshot: &PersistedSnapshot,
) -> Result<(), SnapshotStoreError> {
    let path = store_path_at(home, job);
    let Some(dir) = path.parent() else {
        return Err(io_err(path, std::io::Error::other("invalid snapshot path")));
    };

    std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

    let json = serde_json::to_string_pretty(snapshot)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, &path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(&path, e));
    }
    Ok(())
}
