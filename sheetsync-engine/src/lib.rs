//! # sheetsync-engine
//!
//! The reconciliation core: normalize the fetched snapshot, diff it against
//! the baseline, apply the change-set, persist the new baseline.
//!
//! Call [`pipeline::run_sync`] for a full run, or [`pipeline::preview`] to
//! inspect the change-set a run would apply.

pub mod apply;
pub mod diff;
pub mod error;
pub mod fetch;
pub mod normalize;
pub mod pipeline;
pub mod store;

pub use apply::{ApplyOptions, ApplyReport};
pub use diff::{reconcile, snapshot_digest, ComparatorRegistry, DiffOptions};
pub use error::SyncError;
pub use fetch::{FetchError, FetchOutcome, SheetFetcher};
pub use pipeline::{run_sync, Preview, RunOptions, RunOutcome, RunSummary};
pub use store::{DownstreamStore, StoreError};
