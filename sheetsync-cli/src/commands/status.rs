//! `sheetsync status` — snapshot freshness and sync visibility.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use sheetsync_core::config;
use sheetsync_core::snapshot_store;

/// Arguments for `sheetsync status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Limit to a single job.
    pub job: Option<String>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let home: PathBuf = dirs::home_dir().context("could not determine home directory")?;

        let jobs = match &self.job {
            Some(job) => vec![config::JobName::from(job.clone())],
            None => config::list_jobs_at(&home).context("failed to list configured jobs")?,
        };

        let mut rows = Vec::new();
        for job in &jobs {
            rows.push(job_status(&home, &job.0)
                .with_context(|| format!("failed to load snapshot for '{job}'"))?);
        }

        if self.json {
            print_json(&rows)?;
            return Ok(());
        }
        print_table(rows);
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
struct JobStatus {
    job: String,
    records: usize,
    last_sync_at: Option<String>,
    last_sync_age: String,
    digest: String,
}

#[derive(Tabled)]
struct StatusTableRow {
    #[tabled(rename = "job")]
    job: String,
    #[tabled(rename = "records")]
    records: String,
    #[tabled(rename = "last sync")]
    last_sync: String,
    #[tabled(rename = "digest")]
    digest: String,
}

fn job_status(home: &Path, job: &str) -> Result<JobStatus> {
    let snapshot = snapshot_store::load_at(home, job)?;
    Ok(match snapshot {
        None => JobStatus {
            job: job.to_owned(),
            records: 0,
            last_sync_at: None,
            last_sync_age: "never".to_owned(),
            digest: "-".to_owned(),
        },
        Some(snapshot) => JobStatus {
            job: job.to_owned(),
            records: snapshot.records.len(),
            last_sync_at: Some(snapshot.synced_at.to_rfc3339()),
            last_sync_age: format_datetime_age(snapshot.synced_at),
            digest: short_digest(&snapshot.digest),
        },
    })
}

fn print_json(rows: &[JobStatus]) -> Result<()> {
    #[derive(Serialize)]
    struct StatusReportJson<'a> {
        summary: StatusSummaryJson,
        jobs: &'a [JobStatus],
    }

    #[derive(Serialize)]
    struct StatusSummaryJson {
        jobs: usize,
        never_synced: usize,
    }

    let payload = StatusReportJson {
        summary: StatusSummaryJson {
            jobs: rows.len(),
            never_synced: rows.iter().filter(|r| r.last_sync_at.is_none()).count(),
        },
        jobs: rows,
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to serialize status JSON")?
    );
    Ok(())
}

fn print_table(rows: Vec<JobStatus>) {
    let never_synced = rows.iter().filter(|r| r.last_sync_at.is_none()).count();
    println!(
        "sheetsync v{} | {} job(s) | {} never synced",
        env!("CARGO_PKG_VERSION"),
        rows.len(),
        never_synced,
    );

    if rows.is_empty() {
        println!("No jobs configured. Run `sheetsync init` first.");
        return;
    }

    let table_rows: Vec<StatusTableRow> = rows
        .into_iter()
        .map(|row| {
            let synced = row.last_sync_at.is_some();
            StatusTableRow {
                job: row.job,
                records: if synced {
                    row.records.to_string()
                } else {
                    "-".to_owned()
                },
                last_sync: if synced {
                    row.last_sync_age.green().to_string()
                } else {
                    row.last_sync_age.yellow().to_string()
                },
                digest: row.digest,
            }
        })
        .collect();
    let mut table = Table::new(table_rows);
    table.with(Style::rounded());
    println!("{table}");
}

fn short_digest(digest: &str) -> String {
    digest.chars().take(12).collect()
}

/// Compact age from the snapshot `synced_at` timestamp.
fn format_datetime_age(timestamp: DateTime<Utc>) -> String {
    let now = Utc::now();
    let age = now.signed_duration_since(timestamp).num_seconds().max(0) as u64;
    format_seconds(age)
}

fn format_seconds(seconds: u64) -> String {
    if seconds < 60 {
        return format!("{seconds}s");
    }
    if seconds < 60 * 60 {
        return format!("{}m", seconds / 60);
    }
    if seconds < 60 * 60 * 24 {
        return format!("{}h", seconds / (60 * 60));
    }
    format!("{}d", seconds / (60 * 60 * 24))
}
