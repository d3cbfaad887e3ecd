//! sheetsync core library — domain types, schema, job config, snapshot store.
//!
//! Public API surface:
//! - [`types`] — field values, records, snapshots, change-sets
//! - [`schema`] — declared sheet schema and diffing knobs
//! - [`config`] — per-job YAML configuration
//! - [`snapshot_store`] — persisted baseline load / save
//! - [`error`] — [`ConfigError`], [`SnapshotStoreError`]

pub mod config;
pub mod error;
pub mod schema;
pub mod snapshot_store;
pub mod types;

pub use config::{DestinationConfig, JobConfig, JobName, SourceConfig};
pub use error::{ConfigError, SnapshotStoreError};
pub use schema::{FieldKind, FieldSpec, SheetSchema};
pub use snapshot_store::PersistedSnapshot;
pub use types::{ChangeSet, FieldName, FieldValue, Record, RecordId, RecordPatch, Snapshot};
