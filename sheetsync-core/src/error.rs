//! Error types for sheetsync-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from job configuration handling.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure (file not found, permission denied, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization error (write/save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load — includes file path and line context.
    #[error("failed to parse job config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None` — cannot locate `~/.sheetsync/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// The job config file did not exist at the expected path.
    #[error("job config not found at {path}")]
    JobNotFound { path: PathBuf },

    /// Schema declares the same field twice.
    #[error("schema declares field '{field}' more than once")]
    DuplicateField { field: String },

    /// Schema identity field is not in the declared field list.
    #[error("identity field '{field}' is not declared in the schema")]
    IdentityNotDeclared { field: String },

    /// compare_fields names an undeclared field.
    #[error("compare field '{field}' is not declared in the schema")]
    UnknownCompareField { field: String },

    /// A required credential environment variable is unset. Checked before
    /// any network interaction.
    #[error("missing credential: environment variable {var} is not set")]
    MissingToken { var: String },
}

/// All errors that can arise from snapshot store operations.
#[derive(Debug, Error)]
pub enum SnapshotStoreError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error.
    #[error("snapshot JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience constructor for [`SnapshotStoreError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SnapshotStoreError {
    SnapshotStoreError::Io {
        path: path.into(),
        source,
    }
}
