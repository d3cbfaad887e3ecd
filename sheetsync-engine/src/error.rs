//! Error types for sheetsync-engine.

use thiserror::Error;

use sheetsync_core::error::{ConfigError, SnapshotStoreError};

use crate::fetch::FetchError;
use crate::store::StoreError;

/// All errors that abort a sync run.
///
/// Partial write failures are NOT here: the applier collects them in its
/// report so sibling operations continue.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Upstream fetch failed — the run aborts with the baseline untouched.
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// The downstream store could not be read for baseline seeding.
    #[error("store read failed: {0}")]
    StoreRead(#[from] StoreError),

    /// The snapshot store could not be loaded or saved.
    #[error("snapshot store error: {0}")]
    Snapshot(#[from] SnapshotStoreError),

    /// Invalid or missing job configuration.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}
