//! # sheetsync-connectors
//!
//! Concrete collaborators behind the engine's seams: the Google Sheets
//! values-API fetcher, a PostgREST-style REST store, and a local JSON
//! document store. [`fetcher_for`] and [`store_for`] build the right
//! implementation from a job config, failing fast on missing credentials
//! before any network interaction.

pub mod jsonfile;
pub mod rest;
pub mod sheets;

use sheetsync_core::config::{DestinationConfig, SourceConfig};
use sheetsync_core::error::ConfigError;
use sheetsync_core::schema::SheetSchema;
use sheetsync_engine::fetch::SheetFetcher;
use sheetsync_engine::store::DownstreamStore;

pub use jsonfile::JsonFileStore;
pub use rest::RestStore;
pub use sheets::{SheetsFetcher, ValuesFileFetcher};

/// Build the fetcher for a job's source section.
pub fn fetcher_for(source: &SourceConfig) -> Result<Box<dyn SheetFetcher>, ConfigError> {
    match source {
        SourceConfig::Sheets {
            spreadsheet_id,
            range,
            token_env,
        } => Ok(Box::new(SheetsFetcher::from_env(
            spreadsheet_id.clone(),
            range.clone(),
            token_env,
        )?)),
        SourceConfig::File { path } => Ok(Box::new(ValuesFileFetcher::new(path.clone()))),
    }
}

/// Build the downstream store for a job's destination section.
pub fn store_for(
    destination: &DestinationConfig,
    schema: &SheetSchema,
) -> Result<Box<dyn DownstreamStore>, ConfigError> {
    match destination {
        DestinationConfig::Rest {
            endpoint,
            table,
            key_env,
        } => Ok(Box::new(RestStore::from_env(
            endpoint.clone(),
            table.clone(),
            key_env,
            schema.identity.clone(),
        )?)),
        DestinationConfig::Jsonfile { path } => Ok(Box::new(JsonFileStore::new(
            path.clone(),
            schema.identity.clone(),
        ))),
    }
}
