//! End-to-end CLI runs against file-based source and destination.

use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn sheetsync(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("sheetsync").expect("sheetsync binary");
    cmd.env("HOME", home.path()).env("USERPROFILE", home.path());
    cmd
}

fn write_values(home: &TempDir, body: &str) -> PathBuf {
    let path = home.path().join("values.json");
    std::fs::write(&path, body).expect("write values");
    path
}

fn write_job(home: &TempDir, job: &str, values: &PathBuf) -> PathBuf {
    let store = home.path().join("store.json");
    let yaml = format!(
        r#"version: 1
job: {job}
source:
  kind: file
  path: {values}
destination:
  kind: jsonfile
  path: {store}
schema:
  identity: id
  fields:
    - name: id
      kind: number
    - name: title
      kind: text
    - name: price
      kind: number
    - name: tags
      kind: tags
batch_size: 50
update_concurrency: 4
"#,
        values = values.display(),
        store = store.display(),
    );
    let path = home
        .path()
        .join(".sheetsync")
        .join("jobs")
        .join(format!("{job}.yaml"));
    std::fs::create_dir_all(path.parent().unwrap()).expect("jobs dir");
    std::fs::write(&path, yaml).expect("write job yaml");
    store
}

const TWO_ROWS: &str = r#"{"values":[
  ["id","title","price","tags"],
  ["1","Backend dev","95000","rust, remote"],
  ["2","Data analyst","70000","sql"]
]}"#;

#[test]
fn run_inserts_then_noops_then_updates() {
    let home = TempDir::new().unwrap();
    let values = write_values(&home, TWO_ROWS);
    let store = write_job(&home, "jobs_board", &values);

    sheetsync(&home)
        .args(["run", "jobs_board"])
        .assert()
        .success()
        .stdout(predicate::str::contains("synced (2 inserted, 0 updated, 0 deleted)"));
    let stored = std::fs::read_to_string(&store).expect("store written");
    assert!(stored.contains("Backend dev"));

    sheetsync(&home)
        .args(["run", "jobs_board"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no changes detected"));

    write_values(
        &home,
        &TWO_ROWS.replace("\"95000\"", "\"99000\""),
    );
    sheetsync(&home)
        .args(["run", "jobs_board"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(0 inserted, 1 updated, 0 deleted)"));
    let stored = std::fs::read_to_string(&store).expect("store");
    assert!(stored.contains("99000.0") || stored.contains("99000"));
}

#[test]
fn dry_run_reports_and_writes_nothing() {
    let home = TempDir::new().unwrap();
    let values = write_values(&home, TWO_ROWS);
    let store = write_job(&home, "jobs_board", &values);

    sheetsync(&home)
        .args(["run", "jobs_board", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[dry-run]"))
        .stdout(predicate::str::contains("would apply 2 change(s)"));

    assert!(!store.exists(), "dry-run must not write the store");
    assert!(
        !home.path().join(".sheetsync").join("snapshots").exists(),
        "dry-run must not persist a snapshot"
    );
}

#[test]
fn diff_shows_pending_changes() {
    let home = TempDir::new().unwrap();
    let values = write_values(&home, TWO_ROWS);
    write_job(&home, "jobs_board", &values);

    sheetsync(&home).args(["run", "jobs_board"]).assert().success();
    sheetsync(&home)
        .args(["diff", "jobs_board"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No differences"));

    write_values(&home, &TWO_ROWS.replace("\"95000\"", "\"99000\""));
    sheetsync(&home)
        .args(["diff", "jobs_board"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 update(s)"))
        .stdout(predicate::str::contains("~ 1 (price)"));

    sheetsync(&home)
        .args(["diff", "jobs_board", "--unified"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--- a/snapshot.json"))
        .stdout(predicate::str::contains("@@"));
}

#[test]
fn status_tracks_snapshot_freshness() {
    let home = TempDir::new().unwrap();
    let values = write_values(&home, TWO_ROWS);
    write_job(&home, "jobs_board", &values);

    sheetsync(&home)
        .args(["status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("jobs_board"))
        .stdout(predicate::str::contains("never"));

    sheetsync(&home).args(["run", "jobs_board"]).assert().success();
    sheetsync(&home)
        .args(["status", "jobs_board"])
        .assert()
        .success()
        .stdout(predicate::str::contains("jobs_board"))
        .stdout(predicate::str::contains("2"));

    sheetsync(&home)
        .args(["status", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"never_synced\": 0"));
}

#[test]
fn init_writes_starter_config_once() {
    let home = TempDir::new().unwrap();

    sheetsync(&home)
        .args(["init", "demo", "--spreadsheet-id", "abc123"])
        .assert()
        .success()
        .stdout(predicate::str::contains("demo.yaml"));
    assert!(home
        .path()
        .join(".sheetsync")
        .join("jobs")
        .join("demo.yaml")
        .exists());

    sheetsync(&home)
        .args(["init", "demo"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    sheetsync(&home)
        .args(["init", "demo", "--force"])
        .assert()
        .success();
}

#[test]
fn unknown_job_fails_with_context() {
    let home = TempDir::new().unwrap();
    sheetsync(&home)
        .args(["run", "ghost"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load job 'ghost'"));
}

#[test]
fn rejected_rows_are_reported() {
    let home = TempDir::new().unwrap();
    // Second row has no identity cell.
    let values = write_values(
        &home,
        r#"{"values":[["id","title","price","tags"],["1","a","5","x"],["","b","6","y"]]}"#,
    );
    write_job(&home, "jobs_board", &values);

    sheetsync(&home)
        .args(["run", "jobs_board"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 of 2 row(s) rejected"))
        .stdout(predicate::str::contains("(1 inserted, 0 updated, 0 deleted)"));
}
