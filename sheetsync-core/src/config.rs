//! Per-job YAML configuration.
//!
//! # Storage layout
//!
//! ```text
//! ~/.sheetsync/
//!   jobs/
//!     <job>.yaml       (one file per sync job)
//!   snapshots/
//!     <job>.json       (persisted baselines — see snapshot_store)
//! ```
//!
//! # API pattern
//!
//! Every function has two forms:
//! - `fn_at(home: &Path, …)` — explicit home; used in tests with `TempDir`
//! - `fn(…)` — derives home from `dirs::home_dir()`, delegates to `_at`
//!
//! Tests must NEVER call the no-arg wrappers; always use `_at`.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::schema::SheetSchema;

/// A strongly-typed name for a sync job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobName(pub String);

impl fmt::Display for JobName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for JobName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Where the current snapshot is fetched from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceConfig {
    /// Google Sheets values API.
    Sheets {
        spreadsheet_id: String,
        /// A1-notation range, e.g. `Sheet1!A:J`.
        range: String,
        /// Environment variable holding the bearer token.
        #[serde(default = "default_sheets_token_env")]
        token_env: String,
    },
    /// A local file holding the values-API JSON payload
    /// (`{"values": [[...], ...]}`). Used for offline runs and tests.
    File { path: PathBuf },
}

fn default_sheets_token_env() -> String {
    "SHEETSYNC_SHEETS_TOKEN".to_owned()
}

/// Where the change-set is applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DestinationConfig {
    /// PostgREST-style relational endpoint (Supabase and compatible).
    Rest {
        /// Base URL, e.g. `https://xyz.supabase.co/rest/v1`.
        endpoint: String,
        table: String,
        /// Environment variable holding the service key.
        #[serde(default = "default_store_key_env")]
        key_env: String,
    },
    /// Local JSON document store.
    Jsonfile { path: PathBuf },
}

fn default_store_key_env() -> String {
    "SHEETSYNC_STORE_KEY".to_owned()
}

/// One sync job: source, destination, schema and apply knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    pub version: u32,
    pub job: JobName,
    pub source: SourceConfig,
    pub destination: DestinationConfig,
    pub schema: SheetSchema,
    /// Max records per insert batch (API payload limits).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Bound on the concurrent per-record update fan-out.
    #[serde(default = "default_update_concurrency")]
    pub update_concurrency: usize,
}

fn default_batch_size() -> usize {
    100
}

fn default_update_concurrency() -> usize {
    8
}

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

/// `<home>/.sheetsync/jobs/<job>.yaml` — pure, no I/O.
pub fn job_path_at(home: &Path, job: &str) -> PathBuf {
    home.join(".sheetsync")
        .join("jobs")
        .join(format!("{job}.yaml"))
}

/// Lists the names of all configured jobs under `<home>/.sheetsync/jobs/`.
pub fn list_jobs_at(home: &Path) -> Result<Vec<JobName>, ConfigError> {
    let dir = home.join(".sheetsync").join("jobs");
    if !dir.exists() {
        return Ok(vec![]);
    }
    let mut names: Vec<JobName> = std::fs::read_dir(&dir)?
        .filter_map(|e| e.ok())
        .filter_map(|e| {
            let path = e.path();
            let is_yaml = path.extension().is_some_and(|ext| ext == "yaml");
            let stem = path.file_stem()?.to_string_lossy().into_owned();
            is_yaml.then(|| JobName::from(stem))
        })
        .collect();
    names.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(names)
}

/// `list_jobs_at` convenience wrapper.
pub fn list_jobs() -> Result<Vec<JobName>, ConfigError> {
    list_jobs_at(&home()?)
}

// ---------------------------------------------------------------------------
// Load / save
// ---------------------------------------------------------------------------

/// Load and validate a job config from `<home>/.sheetsync/jobs/<job>.yaml`.
///
/// Returns `ConfigError::JobNotFound` if absent,
/// `ConfigError::Parse` (with path + line context) if malformed YAML.
pub fn load_job_at(home: &Path, job: &str) -> Result<JobConfig, ConfigError> {
    let path = job_path_at(home, job);
    if !path.exists() {
        return Err(ConfigError::JobNotFound { path });
    }
    let contents = std::fs::read_to_string(&path)?;
    let config: JobConfig =
        serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse { path, source: e })?;
    config.schema.validate()?;
    Ok(config)
}

/// `load_job_at` convenience wrapper.
pub fn load_job(job: &str) -> Result<JobConfig, ConfigError> {
    load_job_at(&home()?, job)
}

/// Save a job config to `<home>/.sheetsync/jobs/<job>.yaml`.
pub fn save_job_at(home: &Path, config: &JobConfig) -> Result<(), ConfigError> {
    config.schema.validate()?;
    let path = job_path_at(home, &config.job.0);
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(&path, yaml)?;
    Ok(())
}

fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
