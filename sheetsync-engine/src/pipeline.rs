//! Shared sync pipeline entrypoint used by the CLI.
//!
//! One run: load baseline → fetch → normalize → reconcile → apply →
//! persist the confirmed snapshot. The snapshot store is read once at run
//! start and written at most once at run end; the digest gate skips all
//! per-record work (and the store write) when nothing changed.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use chrono::Utc;

use sheetsync_core::config::JobConfig;
use sheetsync_core::snapshot_store::{self, PersistedSnapshot};
use sheetsync_core::types::{ChangeSet, Record, RecordId};

use crate::apply::{apply, ApplyOptions, ApplyReport};
use crate::diff::{reconcile, snapshot_digest, DiffOptions};
use crate::error::SyncError;
use crate::fetch::{FetchOutcome, SheetFetcher};
use crate::normalize::{conform_record, normalize, Normalized};
use crate::store::DownstreamStore;

/// Options for one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Compute and report the change-set without writing anywhere.
    pub dry_run: bool,
}

/// What a run did.
#[derive(Debug)]
pub enum RunOutcome {
    /// Digest gate or reconciliation found nothing to do.
    NoChange,
    /// Dry-run: the change-set that would have been applied.
    WouldApply { change_set: ChangeSet },
    /// The change-set was applied (possibly partially).
    Applied {
        report: ApplyReport,
        snapshot_persisted: bool,
    },
}

/// Summary of one run, for callers to render.
#[derive(Debug)]
pub struct RunSummary {
    pub job: String,
    /// Raw data rows fetched (before normalization).
    pub fetched: usize,
    /// Rows rejected by the normalizer.
    pub rejected: usize,
    pub outcome: RunOutcome,
}

/// Dry inspection of what a run would change; used by `sheetsync diff`.
#[derive(Debug)]
pub struct Preview {
    pub change_set: ChangeSet,
    pub baseline: Vec<Record>,
    pub current: Vec<Record>,
    pub rejected: usize,
}

struct Prepared {
    persisted: Option<PersistedSnapshot>,
    baseline: Vec<Record>,
    normalized: Normalized,
    authoritative_empty: bool,
}

async fn prepare(
    home: &Path,
    config: &JobConfig,
    fetcher: &dyn SheetFetcher,
    store: &dyn DownstreamStore,
) -> Result<Prepared, SyncError> {
    let persisted = snapshot_store::load_at(home, &config.job.0)?;

    let (normalized, authoritative_empty) = match fetcher.fetch().await? {
        FetchOutcome::Empty => (Normalized::default(), true),
        FetchOutcome::Rows { headers, rows } => {
            if rows.is_empty() {
                // Headers with zero data rows: the source itself is empty.
                (Normalized::default(), true)
            } else {
                (normalize(&config.schema, &headers, &rows), false)
            }
        }
    };

    // Baseline: the persisted snapshot, or — on the first run — the
    // downstream store's current contents, so an already-populated table
    // is not re-inserted.
    let baseline: Vec<Record> = match &persisted {
        Some(snapshot) => snapshot
            .records
            .iter()
            .cloned()
            .map(|record| conform_record(&config.schema, record))
            .collect(),
        None => {
            tracing::info!(job = %config.job, "no persisted snapshot; baselining against store contents");
            store
                .select_all()
                .await?
                .into_iter()
                .map(|record| conform_record(&config.schema, record))
                .collect()
        }
    };

    Ok(Prepared {
        persisted,
        baseline,
        normalized,
        authoritative_empty,
    })
}

fn diff_options(config: &JobConfig, prepared: &Prepared) -> DiffOptions {
    let mut options = DiffOptions::for_schema(&config.schema);
    options.authoritative_empty = prepared.authoritative_empty;
    options.protected_ids = prepared.normalized.rejected_ids();
    options
}

/// Run the sync pipeline for one job.
///
/// This is the canonical entrypoint for `sheetsync run`.
pub async fn run_sync(
    home: &Path,
    config: &JobConfig,
    fetcher: &dyn SheetFetcher,
    store: &dyn DownstreamStore,
    options: &RunOptions,
) -> Result<RunSummary, SyncError> {
    let started_at = Utc::now();
    let prepared = prepare(home, config, fetcher, store).await?;
    let current = &prepared.normalized.records;
    let fetched = current.len() + prepared.normalized.rejected.len();
    let rejected = prepared.normalized.rejected.len();

    // Digest gate: identical snapshot ⇒ no diff, no writes, no timestamp
    // churn in the snapshot store.
    let current_digest = snapshot_digest(current);
    if let Some(persisted) = &prepared.persisted {
        if persisted.digest == current_digest {
            tracing::info!(job = %config.job, "snapshot unchanged; nothing to do");
            return Ok(RunSummary {
                job: config.job.0.clone(),
                fetched,
                rejected,
                outcome: RunOutcome::NoChange,
            });
        }
    }

    let diff_opts = diff_options(config, &prepared);
    let change_set = reconcile(&prepared.baseline, current, &diff_opts);
    tracing::info!(
        job = %config.job,
        inserts = change_set.inserts.len(),
        updates = change_set.updates.len(),
        deletes = change_set.deletes.len(),
        "reconciled"
    );

    if options.dry_run {
        return Ok(RunSummary {
            job: config.job.0.clone(),
            fetched,
            rejected,
            outcome: RunOutcome::WouldApply { change_set },
        });
    }

    if change_set.is_empty() && prepared.persisted.is_some() {
        return Ok(RunSummary {
            job: config.job.0.clone(),
            fetched,
            rejected,
            outcome: RunOutcome::NoChange,
        });
    }

    let apply_opts = ApplyOptions {
        batch_size: config.batch_size,
        update_concurrency: config.update_concurrency,
    };
    let report = apply(store, &change_set, &apply_opts).await;

    // Persist baseline ⊕ confirmed changes: failed inserts stay out (and
    // retry next run), failed updates and deletes keep the baseline record.
    let records = merge_confirmed(&prepared.baseline, current, &report);
    let persist = report.confirmed_ops() > 0 || prepared.persisted.is_none();
    if persist {
        let snapshot = PersistedSnapshot {
            synced_at: started_at,
            digest: snapshot_digest(&records),
            records,
        };
        snapshot_store::save_at(home, &config.job.0, &snapshot)?;
    }

    Ok(RunSummary {
        job: config.job.0.clone(),
        fetched,
        rejected,
        outcome: RunOutcome::Applied {
            report,
            snapshot_persisted: persist,
        },
    })
}

/// Compute and return the change-set a run would apply, without writing.
pub async fn preview(
    home: &Path,
    config: &JobConfig,
    fetcher: &dyn SheetFetcher,
    store: &dyn DownstreamStore,
) -> Result<Preview, SyncError> {
    let prepared = prepare(home, config, fetcher, store).await?;
    let diff_opts = diff_options(config, &prepared);
    let change_set = reconcile(&prepared.baseline, &prepared.normalized.records, &diff_opts);
    Ok(Preview {
        change_set,
        baseline: prepared.baseline,
        current: prepared.normalized.records,
        rejected: prepared.normalized.rejected.len(),
    })
}

/// The next baseline: current-snapshot records minus unconfirmed inserts,
/// with baseline records standing in wherever an update failed, plus every
/// baseline record whose deletion was not confirmed (failed, protected, or
/// never emitted).
fn merge_confirmed(baseline: &[Record], current: &[Record], report: &ApplyReport) -> Vec<Record> {
    let failed_inserts = report.failed_insert_ids();
    let failed_updates = report.failed_update_ids();
    let confirmed_deletes: HashSet<&RecordId> = report.deleted.iter().collect();
    let baseline_by_id: HashMap<&RecordId, &Record> =
        baseline.iter().map(|record| (&record.id, record)).collect();
    let current_ids: HashSet<&RecordId> = current.iter().map(|record| &record.id).collect();

    let mut records = Vec::with_capacity(current.len());
    for record in current {
        if failed_inserts.contains(&record.id) {
            continue;
        }
        if failed_updates.contains(&record.id) {
            if let Some(prior) = baseline_by_id.get(&record.id) {
                records.push((*prior).clone());
            }
            continue;
        }
        records.push(record.clone());
    }
    for record in baseline {
        if current_ids.contains(&record.id) || confirmed_deletes.contains(&record.id) {
            continue;
        }
        records.push(record.clone());
    }
    records
}
