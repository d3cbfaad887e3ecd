//! Source fetcher seam.
//!
//! The engine never talks to a spreadsheet API directly; it consumes a
//! [`SheetFetcher`] capability. The contract keeps "the source is empty"
//! and "the fetch failed" structurally distinct: an authoritative empty
//! source is `Ok(FetchOutcome::Empty)`, any transport or payload problem is
//! `Err(FetchError)`. Only the former may ever produce a full-delete
//! change-set downstream.

use async_trait::async_trait;
use thiserror::Error;

/// Result of one source fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Header row plus data rows. A cell is `None` when the source reported
    /// it as absent (short rows pad with `None` during normalization).
    Rows {
        headers: Vec<String>,
        rows: Vec<Vec<Option<String>>>,
    },
    /// The source itself holds zero rows — authoritative empty, not an
    /// error.
    Empty,
}

/// All errors that can arise from fetching the source snapshot.
///
/// Any of these aborts the run before a change-set is computed; the
/// baseline stays untouched.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport-level failure (connection, TLS, timeout upstream).
    #[error("fetch transport error: {0}")]
    Transport(String),

    /// The source answered with a non-success status.
    #[error("source returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The payload did not have the expected shape.
    #[error("source returned malformed payload: {0}")]
    Malformed(String),
}

/// Capability to retrieve the current tabular dataset.
#[async_trait]
pub trait SheetFetcher: Send + Sync {
    async fn fetch(&self) -> Result<FetchOutcome, FetchError>;
}
