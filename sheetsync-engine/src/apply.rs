//! Change applier — pushes a change-set to the downstream store.
//!
//! Per-collection semantics:
//! - inserts: bounded batches, issued sequentially; a failed batch is
//!   reported and does not roll back committed batches (at-least-once, no
//!   cross-batch atomicity);
//! - updates: one write per changed record, issued concurrently under a
//!   bounded fan-out and awaited jointly; one record's failure does not
//!   block the others;
//! - deletes: a single batched call keyed by identity.
//!
//! The three phases run sequentially relative to one another, so snapshot
//! persistence (the caller's final step) observes the outcome of all three.

use std::collections::HashSet;

use futures::stream::{self, StreamExt};

use sheetsync_core::types::{ChangeSet, FieldName, Record, RecordId};

use crate::store::{DownstreamStore, StoreError};

/// Apply-phase knobs.
#[derive(Debug, Clone)]
pub struct ApplyOptions {
    /// Max records per insert batch.
    pub batch_size: usize,
    /// Bound on the concurrent update fan-out.
    pub update_concurrency: usize,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            batch_size: 100,
            update_concurrency: 8,
        }
    }
}

/// A failed insert batch, with the identities it carried.
#[derive(Debug, Clone)]
pub struct InsertBatchFailure {
    pub batch: usize,
    pub ids: Vec<RecordId>,
    pub error: StoreError,
}

/// A failed per-record update, with the fields it attempted.
#[derive(Debug, Clone)]
pub struct UpdateFailure {
    pub id: RecordId,
    pub fields: Vec<FieldName>,
    pub error: StoreError,
}

/// The failed batched delete, when it failed.
#[derive(Debug, Clone)]
pub struct DeleteFailure {
    pub ids: Vec<RecordId>,
    pub error: StoreError,
}

/// Outcome of one apply pass: confirmed identities per collection plus
/// every failure with enough context to diagnose and replay.
#[derive(Debug, Clone, Default)]
pub struct ApplyReport {
    pub inserted: Vec<RecordId>,
    pub updated: Vec<RecordId>,
    pub deleted: Vec<RecordId>,
    pub failed_insert_batches: Vec<InsertBatchFailure>,
    pub failed_updates: Vec<UpdateFailure>,
    pub failed_delete: Option<DeleteFailure>,
}

impl ApplyReport {
    pub fn fully_applied(&self) -> bool {
        self.failed_insert_batches.is_empty()
            && self.failed_updates.is_empty()
            && self.failed_delete.is_none()
    }

    pub fn confirmed_ops(&self) -> usize {
        self.inserted.len() + self.updated.len() + self.deleted.len()
    }

    pub fn failed_ops(&self) -> usize {
        self.failed_insert_batches
            .iter()
            .map(|f| f.ids.len())
            .sum::<usize>()
            + self.failed_updates.len()
            + self.failed_delete.as_ref().map_or(0, |f| f.ids.len())
    }

    pub fn failed_insert_ids(&self) -> HashSet<RecordId> {
        self.failed_insert_batches
            .iter()
            .flat_map(|f| f.ids.iter().cloned())
            .collect()
    }

    pub fn failed_update_ids(&self) -> HashSet<RecordId> {
        self.failed_updates.iter().map(|f| f.id.clone()).collect()
    }

    pub fn failed_delete_ids(&self) -> HashSet<RecordId> {
        self.failed_delete
            .as_ref()
            .map(|f| f.ids.iter().cloned().collect())
            .unwrap_or_default()
    }
}

/// Apply `change_set` to `store`. Errors are collected, never propagated:
/// insert failures don't block updates or deletes and vice versa.
pub async fn apply(
    store: &dyn DownstreamStore,
    change_set: &ChangeSet,
    options: &ApplyOptions,
) -> ApplyReport {
    let mut report = ApplyReport::default();

    apply_inserts(store, &change_set.inserts, options, &mut report).await;
    apply_updates(store, change_set, options, &mut report).await;
    apply_deletes(store, &change_set.deletes, &mut report).await;

    report
}

async fn apply_inserts(
    store: &dyn DownstreamStore,
    inserts: &[Record],
    options: &ApplyOptions,
    report: &mut ApplyReport,
) {
    let batch_size = options.batch_size.max(1);
    for (batch, records) in inserts.chunks(batch_size).enumerate() {
        let ids: Vec<RecordId> = records.iter().map(|r| r.id.clone()).collect();
        match store.insert_many(records).await {
            Ok(()) => {
                tracing::info!(batch, count = records.len(), "inserted batch");
                report.inserted.extend(ids);
            }
            Err(error) => {
                tracing::error!(
                    batch,
                    first = %ids.first().map(|id| id.0.as_str()).unwrap_or("-"),
                    last = %ids.last().map(|id| id.0.as_str()).unwrap_or("-"),
                    %error,
                    "insert batch failed"
                );
                report
                    .failed_insert_batches
                    .push(InsertBatchFailure { batch, ids, error });
            }
        }
    }
}

async fn apply_updates(
    store: &dyn DownstreamStore,
    change_set: &ChangeSet,
    options: &ApplyOptions,
    report: &mut ApplyReport,
) {
    let concurrency = options.update_concurrency.max(1);
    let mut results: Vec<(usize, Result<(), StoreError>)> =
        stream::iter(change_set.updates.iter().enumerate().map(|(index, patch)| {
            async move { (index, store.update_one(&patch.id, &patch.fields).await) }
        }))
        .buffer_unordered(concurrency)
        .collect()
        .await;

    // Completion order is nondeterministic; report in change-set order.
    results.sort_by_key(|(index, _)| *index);
    for (index, result) in results {
        let patch = &change_set.updates[index];
        match result {
            Ok(()) => report.updated.push(patch.id.clone()),
            Err(error) => {
                let fields: Vec<FieldName> =
                    patch.fields.iter().map(|(name, _)| name.clone()).collect();
                tracing::error!(
                    id = %patch.id,
                    fields = ?fields.iter().map(|f| f.0.as_str()).collect::<Vec<_>>(),
                    attempted = %serde_json::to_string(&patch.fields).unwrap_or_default(),
                    %error,
                    "update failed"
                );
                report.failed_updates.push(UpdateFailure {
                    id: patch.id.clone(),
                    fields,
                    error,
                });
            }
        }
    }
    if !report.updated.is_empty() {
        tracing::info!(count = report.updated.len(), "updated records");
    }
}

async fn apply_deletes(
    store: &dyn DownstreamStore,
    deletes: &[RecordId],
    report: &mut ApplyReport,
) {
    if deletes.is_empty() {
        return;
    }
    match store.delete_many(deletes).await {
        Ok(()) => {
            tracing::info!(count = deletes.len(), "deleted records");
            report.deleted.extend(deletes.iter().cloned());
        }
        Err(error) => {
            tracing::error!(count = deletes.len(), %error, "batched delete failed");
            report.failed_delete = Some(DeleteFailure {
                ids: deletes.to_vec(),
                error,
            });
        }
    }
}
