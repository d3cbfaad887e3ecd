//! `sheetsync diff <job>` — show what a run would change.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use sheetsync_core::config;
use sheetsync_engine::diff::unified_snapshot_diff;
use sheetsync_engine::pipeline::preview;

/// Arguments for `sheetsync diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Job name to diff.
    pub job: String,

    /// Also print a unified diff of the snapshot JSON.
    #[arg(long)]
    pub unified: bool,
}

impl DiffArgs {
    pub async fn run(self) -> Result<()> {
        let home: PathBuf = dirs::home_dir().context("could not determine home directory")?;
        let cfg = config::load_job_at(&home, &self.job)
            .with_context(|| format!("failed to load job '{}'", self.job))?;

        let fetcher = sheetsync_connectors::fetcher_for(&cfg.source)?;
        let store = sheetsync_connectors::store_for(&cfg.destination, &cfg.schema)?;

        let result = preview(&home, &cfg, fetcher.as_ref(), store.as_ref())
            .await
            .with_context(|| format!("diff failed for '{}'", self.job))?;

        if result.change_set.is_empty() {
            println!("No differences for '{}'.", self.job);
            return Ok(());
        }

        println!(
            "'{}': {} insert(s), {} update(s), {} delete(s)",
            self.job,
            result.change_set.inserts.len(),
            result.change_set.updates.len(),
            result.change_set.deletes.len(),
        );
        for record in &result.change_set.inserts {
            println!("  + {}", record.id);
        }
        for patch in &result.change_set.updates {
            let fields: Vec<&str> = patch
                .fields
                .iter()
                .map(|(name, _)| name.0.as_str())
                .collect();
            println!("  ~ {} ({})", patch.id, fields.join(", "));
        }
        for id in &result.change_set.deletes {
            println!("  - {id}");
        }

        if self.unified {
            let diff = unified_snapshot_diff(&result.baseline, &result.current);
            print!("{diff}");
            if !diff.ends_with('\n') {
                println!();
            }
        }

        Ok(())
    }
}
