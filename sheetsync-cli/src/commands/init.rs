//! `sheetsync init` — write a starter job configuration.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;

use sheetsync_core::config::{
    self, DestinationConfig, JobConfig, JobName, SourceConfig,
};
use sheetsync_core::schema::{FieldKind, FieldSpec, SheetSchema};
use sheetsync_core::types::FieldName;

/// Arguments for `sheetsync init`.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Name for the new job.
    pub job: String,

    /// Google Sheets spreadsheet id. Omitted: a file-based source stub is
    /// written instead.
    #[arg(long)]
    pub spreadsheet_id: Option<String>,

    /// A1-notation range to fetch.
    #[arg(long, default_value = "Sheet1!A:J")]
    pub range: String,

    /// Overwrite an existing job config.
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let home: PathBuf = dirs::home_dir().context("could not determine home directory")?;
        let path = config::job_path_at(&home, &self.job);
        if path.exists() && !self.force {
            bail!(
                "job '{}' already exists at {} (use --force to overwrite)",
                self.job,
                path.display()
            );
        }

        let source = match self.spreadsheet_id {
            Some(spreadsheet_id) => SourceConfig::Sheets {
                spreadsheet_id,
                range: self.range,
                token_env: "SHEETSYNC_SHEETS_TOKEN".to_owned(),
            },
            None => SourceConfig::File {
                path: home
                    .join(".sheetsync")
                    .join("values")
                    .join(format!("{}.json", self.job)),
            },
        };

        let cfg = JobConfig {
            version: 1,
            job: JobName::from(self.job.clone()),
            source,
            destination: DestinationConfig::Jsonfile {
                path: home
                    .join(".sheetsync")
                    .join("data")
                    .join(format!("{}.json", self.job)),
            },
            schema: starter_schema(),
            batch_size: 100,
            update_concurrency: 8,
        };
        config::save_job_at(&home, &cfg)
            .with_context(|| format!("failed to write job config for '{}'", self.job))?;

        println!("✓ wrote {}", path.display());
        println!("Edit the schema to match your sheet, then run `sheetsync run {}`.", self.job);
        Ok(())
    }
}

fn starter_schema() -> SheetSchema {
    let field = |name: &str, kind: FieldKind| FieldSpec {
        name: FieldName::from(name),
        kind,
        order_sensitive: false,
    };
    SheetSchema {
        identity: FieldName::from("id"),
        fields: vec![
            field("id", FieldKind::Number),
            field("title", FieldKind::Text),
            field("price", FieldKind::Number),
            field("date", FieldKind::Timestamp),
            field("tags", FieldKind::Tags),
        ],
        strict: false,
        empty_tags_as_null: false,
        compare_fields: None,
    }
}
