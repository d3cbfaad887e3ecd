//! Downstream store seam.

use async_trait::async_trait;
use thiserror::Error;

use sheetsync_core::types::{FieldName, FieldValue, Record, RecordId};

/// All errors a downstream store operation can report.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Transport-level failure.
    #[error("store transport error: {0}")]
    Transport(String),

    /// The store rejected the request.
    #[error("store rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    /// A payload could not be built or parsed.
    #[error("store payload error: {0}")]
    Payload(String),

    /// The targeted record does not exist in the store.
    #[error("record '{id}' not found in store")]
    NotFound { id: RecordId },
}

/// Capability to read and mutate the downstream persistent store.
///
/// `insert_many` receives one already-bounded batch per call; batching is
/// the applier's concern. `update_one` carries only the changed fields so
/// concurrent edits to other columns are never clobbered.
#[async_trait]
pub trait DownstreamStore: Send + Sync {
    async fn select_all(&self) -> Result<Vec<Record>, StoreError>;

    async fn insert_many(&self, records: &[Record]) -> Result<(), StoreError>;

    async fn update_one(
        &self,
        id: &RecordId,
        fields: &[(FieldName, FieldValue)],
    ) -> Result<(), StoreError>;

    async fn delete_many(&self, ids: &[RecordId]) -> Result<(), StoreError>;
}
