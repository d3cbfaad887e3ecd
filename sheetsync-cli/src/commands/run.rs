//! `sheetsync run` — fetch, reconcile and apply one job.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use sheetsync_core::config;
use sheetsync_engine::pipeline::{run_sync, RunOptions, RunOutcome, RunSummary};

/// Arguments for `sheetsync run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Name of the job to run.
    pub job: String,

    /// Compute and print the change-set without writing anything.
    #[arg(long)]
    pub dry_run: bool,
}

impl RunArgs {
    pub async fn run(self) -> Result<()> {
        let home: PathBuf = dirs::home_dir().context("could not determine home directory")?;
        let cfg = config::load_job_at(&home, &self.job)
            .with_context(|| format!("failed to load job '{}' — run `sheetsync init` first", self.job))?;

        let fetcher = sheetsync_connectors::fetcher_for(&cfg.source)?;
        let store = sheetsync_connectors::store_for(&cfg.destination, &cfg.schema)?;

        let summary = run_sync(
            &home,
            &cfg,
            fetcher.as_ref(),
            store.as_ref(),
            &RunOptions {
                dry_run: self.dry_run,
            },
        )
        .await
        .with_context(|| format!("sync failed for '{}'", self.job))?;

        print_summary(&summary, self.dry_run);
        Ok(())
    }
}

fn print_summary(summary: &RunSummary, dry_run: bool) {
    let prefix = if dry_run { "[dry-run] " } else { "" };
    if summary.rejected > 0 {
        println!(
            "{prefix}! {} of {} row(s) rejected during normalization",
            summary.rejected, summary.fetched
        );
    }
    match &summary.outcome {
        RunOutcome::NoChange => {
            println!("{prefix}✓ '{}' — no changes detected", summary.job);
        }
        RunOutcome::WouldApply { change_set } => {
            println!(
                "{prefix}✓ '{}' would apply {} change(s) ({} inserts, {} updates, {} deletes)",
                summary.job,
                change_set.total_ops(),
                change_set.inserts.len(),
                change_set.updates.len(),
                change_set.deletes.len(),
            );
        }
        RunOutcome::Applied {
            report,
            snapshot_persisted,
        } => {
            println!(
                "{prefix}✓ '{}' synced ({} inserted, {} updated, {} deleted)",
                summary.job,
                report.inserted.len(),
                report.updated.len(),
                report.deleted.len(),
            );
            for failure in &report.failed_insert_batches {
                println!(
                    "  ✗ insert batch {} failed ({} record(s)): {}",
                    failure.batch,
                    failure.ids.len(),
                    failure.error,
                );
            }
            for failure in &report.failed_updates {
                println!("  ✗ update '{}' failed: {}", failure.id, failure.error);
            }
            if let Some(failure) = &report.failed_delete {
                println!(
                    "  ✗ delete of {} record(s) failed: {}",
                    failure.ids.len(),
                    failure.error,
                );
            }
            if !snapshot_persisted {
                println!("  · snapshot not persisted (no confirmed changes)");
            }
        }
    }
}
