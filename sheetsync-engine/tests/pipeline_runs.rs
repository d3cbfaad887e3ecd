//! End-to-end pipeline runs against in-memory collaborators.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use tempfile::TempDir;

use sheetsync_core::config::{DestinationConfig, JobConfig, JobName, SourceConfig};
use sheetsync_core::schema::{FieldKind, FieldSpec, SheetSchema};
use sheetsync_core::snapshot_store;
use sheetsync_core::types::{FieldName, FieldValue, Record, RecordId};
use sheetsync_engine::fetch::{FetchError, FetchOutcome, SheetFetcher};
use sheetsync_engine::pipeline::{preview, run_sync, RunOptions, RunOutcome};
use sheetsync_engine::store::{DownstreamStore, StoreError};

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

enum Scripted {
    Rows(Vec<Vec<&'static str>>),
    Empty,
    Fail,
}

struct FakeFetcher {
    script: Scripted,
}

impl FakeFetcher {
    fn rows(rows: Vec<Vec<&'static str>>) -> Self {
        Self {
            script: Scripted::Rows(rows),
        }
    }
}

#[async_trait]
impl SheetFetcher for FakeFetcher {
    async fn fetch(&self) -> Result<FetchOutcome, FetchError> {
        match &self.script {
            Scripted::Rows(rows) => Ok(FetchOutcome::Rows {
                headers: ["id", "title", "price", "tags"].map(String::from).to_vec(),
                rows: rows
                    .iter()
                    .map(|row| row.iter().map(|cell| Some((*cell).to_owned())).collect())
                    .collect(),
            }),
            Scripted::Empty => Ok(FetchOutcome::Empty),
            Scripted::Fail => Err(FetchError::Transport("connection refused".into())),
        }
    }
}

#[derive(Default)]
struct MemStore {
    records: Mutex<Vec<Record>>,
    fail_insert_ids: HashSet<RecordId>,
}

impl MemStore {
    fn seeded(records: Vec<Record>) -> Self {
        Self {
            records: Mutex::new(records),
            ..Self::default()
        }
    }

    fn ids(&self) -> Vec<String> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.id.0.clone())
            .collect()
    }

    fn field(&self, id: &str, name: &str) -> Option<FieldValue> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id.0 == id)
            .and_then(|r| r.get(&FieldName::from(name)).cloned())
    }
}

#[async_trait]
impl DownstreamStore for MemStore {
    async fn select_all(&self) -> Result<Vec<Record>, StoreError> {
        Ok(self.records.lock().unwrap().clone())
    }

    async fn insert_many(&self, records: &[Record]) -> Result<(), StoreError> {
        if records.iter().any(|r| self.fail_insert_ids.contains(&r.id)) {
            return Err(StoreError::Rejected {
                status: 500,
                body: "insert rejected".into(),
            });
        }
        let mut stored = self.records.lock().unwrap();
        for record in records {
            if stored.iter().any(|r| r.id == record.id) {
                return Err(StoreError::Payload(format!("duplicate id {}", record.id)));
            }
            stored.push(record.clone());
        }
        Ok(())
    }

    async fn update_one(
        &self,
        id: &RecordId,
        fields: &[(FieldName, FieldValue)],
    ) -> Result<(), StoreError> {
        let mut stored = self.records.lock().unwrap();
        let record = stored
            .iter_mut()
            .find(|r| &r.id == id)
            .ok_or_else(|| StoreError::NotFound { id: id.clone() })?;
        for (name, value) in fields {
            record.fields.insert(name.clone(), value.clone());
        }
        Ok(())
    }

    async fn delete_many(&self, ids: &[RecordId]) -> Result<(), StoreError> {
        let mut stored = self.records.lock().unwrap();
        stored.retain(|r| !ids.contains(&r.id));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn config(strict: bool) -> JobConfig {
    JobConfig {
        version: 1,
        job: JobName::from("jobs_board"),
        source: SourceConfig::File {
            path: PathBuf::from("unused"),
        },
        destination: DestinationConfig::Jsonfile {
            path: PathBuf::from("unused"),
        },
        schema: SheetSchema {
            identity: FieldName::from("id"),
            fields: vec![
                FieldSpec {
                    name: FieldName::from("id"),
                    kind: FieldKind::Number,
                    order_sensitive: false,
                },
                FieldSpec {
                    name: FieldName::from("title"),
                    kind: FieldKind::Text,
                    order_sensitive: false,
                },
                FieldSpec {
                    name: FieldName::from("price"),
                    kind: FieldKind::Number,
                    order_sensitive: false,
                },
                FieldSpec {
                    name: FieldName::from("tags"),
                    kind: FieldKind::Tags,
                    order_sensitive: false,
                },
            ],
            strict,
            empty_tags_as_null: false,
            compare_fields: None,
        },
        batch_size: 100,
        update_concurrency: 4,
    }
}

fn stored_record(id: i64, title: &str, price: f64) -> Record {
    let mut fields = BTreeMap::new();
    fields.insert(FieldName::from("id"), FieldValue::Number(id as f64));
    fields.insert(FieldName::from("title"), FieldValue::Text(title.to_owned()));
    fields.insert(FieldName::from("price"), FieldValue::Number(price));
    fields.insert(FieldName::from("tags"), FieldValue::Tags(vec![]));
    Record {
        id: RecordId::from(id.to_string()),
        fields,
    }
}

// ---------------------------------------------------------------------------
// Runs
// ---------------------------------------------------------------------------

#[tokio::test]
async fn first_run_inserts_everything_and_seeds_snapshot() {
    let home = TempDir::new().unwrap();
    let cfg = config(false);
    let fetcher = FakeFetcher::rows(vec![
        vec!["1", "Backend dev", "95000", "rust,remote"],
        vec!["2", "Data analyst", "70000", "sql"],
    ]);
    let store = MemStore::default();

    let summary = run_sync(home.path(), &cfg, &fetcher, &store, &RunOptions::default())
        .await
        .expect("run");

    assert_eq!(summary.fetched, 2);
    match &summary.outcome {
        RunOutcome::Applied {
            report,
            snapshot_persisted,
        } => {
            assert_eq!(report.inserted.len(), 2);
            assert!(report.fully_applied());
            assert!(*snapshot_persisted);
        }
        other => panic!("expected applied outcome, got {other:?}"),
    }
    assert_eq!(store.ids(), vec!["1", "2"]);

    let snapshot = snapshot_store::load_at(home.path(), "jobs_board")
        .unwrap()
        .expect("snapshot seeded");
    assert_eq!(snapshot.records.len(), 2);
}

#[tokio::test]
async fn unchanged_source_short_circuits_and_leaves_snapshot_untouched() {
    let home = TempDir::new().unwrap();
    let cfg = config(false);
    let fetcher = FakeFetcher::rows(vec![vec!["1", "Backend dev", "95000", "rust"]]);
    let store = MemStore::default();

    run_sync(home.path(), &cfg, &fetcher, &store, &RunOptions::default())
        .await
        .expect("first run");
    let first = snapshot_store::load_at(home.path(), "jobs_board")
        .unwrap()
        .expect("snapshot");

    let summary = run_sync(home.path(), &cfg, &fetcher, &store, &RunOptions::default())
        .await
        .expect("second run");
    assert!(matches!(summary.outcome, RunOutcome::NoChange));

    let second = snapshot_store::load_at(home.path(), "jobs_board")
        .unwrap()
        .expect("snapshot");
    assert_eq!(
        second.synced_at, first.synced_at,
        "no-change run must not advance synced_at"
    );
}

#[tokio::test]
async fn changed_and_new_rows_become_update_and_insert() {
    // baseline {id:1, price:10}; current {id:1, price:12}, {id:2, price:5}
    // ⇒ one update, one insert, no deletes.
    let home = TempDir::new().unwrap();
    let cfg = config(false);
    let store = MemStore::default();

    let fetcher = FakeFetcher::rows(vec![vec!["1", "t", "10", "a"]]);
    run_sync(home.path(), &cfg, &fetcher, &store, &RunOptions::default())
        .await
        .expect("first run");

    let fetcher = FakeFetcher::rows(vec![vec!["1", "t", "12", "a"], vec!["2", "u", "5", "b"]]);
    let summary = run_sync(home.path(), &cfg, &fetcher, &store, &RunOptions::default())
        .await
        .expect("second run");

    match &summary.outcome {
        RunOutcome::Applied { report, .. } => {
            assert_eq!(report.updated, vec![RecordId::from("1")]);
            assert_eq!(report.inserted, vec![RecordId::from("2")]);
            assert!(report.deleted.is_empty());
        }
        other => panic!("expected applied outcome, got {other:?}"),
    }
    assert_eq!(store.field("1", "price"), Some(FieldValue::Number(12.0)));
    assert_eq!(store.field("2", "price"), Some(FieldValue::Number(5.0)));
}

#[tokio::test]
async fn applied_run_then_rerun_is_no_change_round_trip() {
    let home = TempDir::new().unwrap();
    let cfg = config(false);
    let store = MemStore::default();

    let fetcher = FakeFetcher::rows(vec![
        vec!["1", "a", "1", "x"],
        vec!["2", "b", "2", "y,z"],
        vec!["3", "c", "3", ""],
    ]);
    run_sync(home.path(), &cfg, &fetcher, &store, &RunOptions::default())
        .await
        .expect("apply");

    let summary = run_sync(home.path(), &cfg, &fetcher, &store, &RunOptions::default())
        .await
        .expect("rerun");
    assert!(
        matches!(summary.outcome, RunOutcome::NoChange),
        "reconciling the persisted snapshot against itself must be empty"
    );
}

#[tokio::test]
async fn authoritative_empty_source_deletes_everything() {
    let home = TempDir::new().unwrap();
    let cfg = config(false);
    let store = MemStore::default();

    let fetcher = FakeFetcher::rows(vec![
        vec!["1", "a", "1", "x"],
        vec!["2", "b", "2", "y"],
        vec!["3", "c", "3", "z"],
    ]);
    run_sync(home.path(), &cfg, &fetcher, &store, &RunOptions::default())
        .await
        .expect("seed");

    let fetcher = FakeFetcher {
        script: Scripted::Empty,
    };
    let summary = run_sync(home.path(), &cfg, &fetcher, &store, &RunOptions::default())
        .await
        .expect("empty run");

    match &summary.outcome {
        RunOutcome::Applied { report, .. } => {
            assert_eq!(report.deleted.len(), 3);
            assert!(report.inserted.is_empty());
            assert!(report.updated.is_empty());
        }
        other => panic!("expected applied outcome, got {other:?}"),
    }
    assert!(store.ids().is_empty());
    let snapshot = snapshot_store::load_at(home.path(), "jobs_board")
        .unwrap()
        .expect("snapshot");
    assert!(snapshot.records.is_empty());
}

#[tokio::test]
async fn fetch_failure_aborts_with_baseline_untouched() {
    let home = TempDir::new().unwrap();
    let cfg = config(false);
    let store = MemStore::default();

    let fetcher = FakeFetcher::rows(vec![vec!["1", "a", "1", "x"]]);
    run_sync(home.path(), &cfg, &fetcher, &store, &RunOptions::default())
        .await
        .expect("seed");
    let before = snapshot_store::load_at(home.path(), "jobs_board")
        .unwrap()
        .expect("snapshot");

    let fetcher = FakeFetcher {
        script: Scripted::Fail,
    };
    let err = run_sync(home.path(), &cfg, &fetcher, &store, &RunOptions::default())
        .await
        .expect_err("fetch failure aborts");
    assert!(matches!(err, sheetsync_engine::SyncError::Fetch(_)));

    assert_eq!(store.ids(), vec!["1"], "store untouched");
    let after = snapshot_store::load_at(home.path(), "jobs_board")
        .unwrap()
        .expect("snapshot");
    assert_eq!(after, before, "baseline untouched");
}

#[tokio::test]
async fn rejected_row_causes_no_delete_and_no_insert() {
    let home = TempDir::new().unwrap();
    let cfg = config(true);
    let store = MemStore::default();

    let fetcher = FakeFetcher::rows(vec![
        vec!["1", "a", "1", "x"],
        vec!["2", "b", "2", "y"],
    ]);
    run_sync(home.path(), &cfg, &fetcher, &store, &RunOptions::default())
        .await
        .expect("seed");

    // Row 2 loses its price and is rejected under strict mode; row 1 is
    // unchanged. Nothing may be inserted, and id 2 must not be deleted.
    let fetcher = FakeFetcher::rows(vec![
        vec!["1", "a", "1", "x"],
        vec!["2", "b", "", "y"],
    ]);
    let summary = run_sync(home.path(), &cfg, &fetcher, &store, &RunOptions::default())
        .await
        .expect("run");

    assert_eq!(summary.rejected, 1);
    assert!(
        matches!(summary.outcome, RunOutcome::NoChange),
        "rejection alone produces no operations"
    );
    assert_eq!(store.ids(), vec!["1", "2"]);

    let snapshot = snapshot_store::load_at(home.path(), "jobs_board")
        .unwrap()
        .expect("snapshot");
    assert_eq!(
        snapshot.records.len(),
        2,
        "rejected identity stays in the baseline for next run"
    );
}

#[tokio::test]
async fn first_run_against_populated_store_does_not_reinsert() {
    let home = TempDir::new().unwrap();
    let cfg = config(false);
    let store = MemStore::seeded(vec![
        stored_record(1, "a", 1.0),
        stored_record(2, "b", 2.0),
    ]);

    let fetcher = FakeFetcher::rows(vec![
        vec!["1", "a", "1", ""],
        vec!["2", "b", "2", ""],
        vec!["3", "c", "3", ""],
    ]);
    let summary = run_sync(home.path(), &cfg, &fetcher, &store, &RunOptions::default())
        .await
        .expect("run");

    match &summary.outcome {
        RunOutcome::Applied { report, .. } => {
            assert_eq!(report.inserted, vec![RecordId::from("3")]);
            assert!(report.deleted.is_empty());
        }
        other => panic!("expected applied outcome, got {other:?}"),
    }
    assert_eq!(store.ids(), vec!["1", "2", "3"]);
}

#[tokio::test]
async fn failed_insert_is_retried_on_the_next_run() {
    let home = TempDir::new().unwrap();
    let cfg = config(false);

    let store = MemStore {
        fail_insert_ids: HashSet::from([RecordId::from("2")]),
        ..MemStore::default()
    };
    let fetcher = FakeFetcher::rows(vec![vec!["1", "a", "1", "x"], vec!["2", "b", "2", "y"]]);
    let summary = run_sync(home.path(), &cfg, &fetcher, &store, &RunOptions::default())
        .await
        .expect("run with failure");

    match &summary.outcome {
        RunOutcome::Applied { report, .. } => {
            assert!(!report.fully_applied());
            assert_eq!(report.failed_ops(), 2, "whole poisoned batch reported");
        }
        other => panic!("expected applied outcome, got {other:?}"),
    }
    let snapshot = snapshot_store::load_at(home.path(), "jobs_board")
        .unwrap()
        .expect("snapshot");
    assert!(
        snapshot.records.is_empty(),
        "unconfirmed inserts must not enter the baseline"
    );

    // Same source against a healthy store: the batch goes through now.
    let healthy = MemStore::default();
    let summary = run_sync(home.path(), &cfg, &fetcher, &healthy, &RunOptions::default())
        .await
        .expect("retry run");
    match &summary.outcome {
        RunOutcome::Applied { report, .. } => assert_eq!(report.inserted.len(), 2),
        other => panic!("expected applied outcome, got {other:?}"),
    }
}

#[tokio::test]
async fn dry_run_reports_without_writing() {
    let home = TempDir::new().unwrap();
    let cfg = config(false);
    let store = MemStore::default();
    let fetcher = FakeFetcher::rows(vec![vec!["1", "a", "1", "x"]]);

    let summary = run_sync(
        home.path(),
        &cfg,
        &fetcher,
        &store,
        &RunOptions { dry_run: true },
    )
    .await
    .expect("dry run");

    match &summary.outcome {
        RunOutcome::WouldApply { change_set } => {
            assert_eq!(change_set.inserts.len(), 1);
        }
        other => panic!("expected would-apply outcome, got {other:?}"),
    }
    assert!(store.ids().is_empty(), "dry-run must not write to the store");
    assert!(
        snapshot_store::load_at(home.path(), "jobs_board")
            .unwrap()
            .is_none(),
        "dry-run must not persist a snapshot"
    );
}

#[tokio::test]
async fn preview_exposes_baseline_and_current() {
    let home = TempDir::new().unwrap();
    let cfg = config(false);
    let store = MemStore::default();

    let fetcher = FakeFetcher::rows(vec![vec!["1", "a", "10", "x"]]);
    run_sync(home.path(), &cfg, &fetcher, &store, &RunOptions::default())
        .await
        .expect("seed");

    let fetcher = FakeFetcher::rows(vec![vec!["1", "a", "12", "x"]]);
    let p = preview(home.path(), &cfg, &fetcher, &store)
        .await
        .expect("preview");
    assert_eq!(p.baseline.len(), 1);
    assert_eq!(p.current.len(), 1);
    assert_eq!(p.change_set.updates.len(), 1);
    assert_eq!(
        p.change_set.updates[0].fields,
        vec![(FieldName::from("price"), FieldValue::Number(12.0))]
    );
}
