//! Google Sheets values-API fetcher, plus a file-backed variant consuming
//! the same payload shape for offline runs and tests.
//!
//! The values endpoint returns `{"values": [[...], ...]}` with the header
//! in the first row. A 200 response with no `values` key means the range
//! is empty — that is the authoritative-empty signal, distinct from any
//! transport or status failure.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;

use sheetsync_core::error::ConfigError;
use sheetsync_engine::fetch::{FetchError, FetchOutcome, SheetFetcher};

const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

#[derive(Debug, Deserialize)]
struct ValuesPayload {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

/// Fetcher for one spreadsheet range via the Sheets values API.
pub struct SheetsFetcher {
    client: reqwest::Client,
    spreadsheet_id: String,
    range: String,
    token: String,
}

impl SheetsFetcher {
    pub fn new(spreadsheet_id: String, range: String, token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            spreadsheet_id,
            range,
            token,
        }
    }

    /// Build a fetcher taking the bearer token from `token_env`.
    ///
    /// Fails before any network interaction when the variable is unset.
    pub fn from_env(
        spreadsheet_id: String,
        range: String,
        token_env: &str,
    ) -> Result<Self, ConfigError> {
        let token = std::env::var(token_env).map_err(|_| ConfigError::MissingToken {
            var: token_env.to_owned(),
        })?;
        Ok(Self::new(spreadsheet_id, range, token))
    }
}

#[async_trait]
impl SheetFetcher for SheetsFetcher {
    async fn fetch(&self) -> Result<FetchOutcome, FetchError> {
        let url = format!(
            "{SHEETS_API_BASE}/{}/values/{}",
            self.spreadsheet_id, self.range
        );
        tracing::debug!(%url, "fetching sheet values");
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let payload: ValuesPayload = response
            .json()
            .await
            .map_err(|e| FetchError::Malformed(e.to_string()))?;
        Ok(values_to_outcome(payload.values))
    }
}

/// Fetcher reading the values-API payload from a local file.
pub struct ValuesFileFetcher {
    path: PathBuf,
}

impl ValuesFileFetcher {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl SheetFetcher for ValuesFileFetcher {
    async fn fetch(&self) -> Result<FetchOutcome, FetchError> {
        let contents = std::fs::read_to_string(&self.path)
            .map_err(|e| FetchError::Transport(format!("read {}: {e}", self.path.display())))?;
        let payload: ValuesPayload = serde_json::from_str(&contents)
            .map_err(|e| FetchError::Malformed(format!("{}: {e}", self.path.display())))?;
        Ok(values_to_outcome(payload.values))
    }
}

/// First row is the header; remaining rows are data. Zero data rows is the
/// authoritative empty state.
fn values_to_outcome(values: Vec<Vec<serde_json::Value>>) -> FetchOutcome {
    let mut rows_iter = values.into_iter();
    let Some(header_row) = rows_iter.next() else {
        return FetchOutcome::Empty;
    };
    let headers: Vec<String> = header_row
        .into_iter()
        .map(|cell| cell_to_string(cell).unwrap_or_default())
        .collect();
    let rows: Vec<Vec<Option<String>>> = rows_iter
        .map(|row| row.into_iter().map(cell_to_string).collect())
        .collect();
    if rows.is_empty() {
        return FetchOutcome::Empty;
    }
    FetchOutcome::Rows { headers, rows }
}

fn cell_to_string(cell: serde_json::Value) -> Option<String> {
    match cell {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}
