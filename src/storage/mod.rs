//! Storage abstractions for scan results.
//!
//! ## Directory Structure
//!
//! ```text
//! storage/
//! ├── latest.json                 # Summary of the most recent run
//! └── runs/
//!     └── {run_id}/
//!         ├── run.json            # Run summary
//!         └── pages/
//!             └── {page_key}.json # One PageResult per scanned page
//! ```

pub mod local;

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{PageResult, ScreenshotQualityIssue, ViewportName};
use crate::utils::get_domain;

pub use local::LocalStorage;

/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        })
    }
}

/// Summary written once per run (and rewritten as it progresses).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub start_url: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub discovered: usize,
    #[serde(default)]
    pub clusters: usize,
    #[serde(default)]
    pub sampled: usize,
    #[serde(default)]
    pub pages_scanned: usize,
    #[serde(default)]
    pub pages_with_errors: usize,
    #[serde(default)]
    pub error: Option<String>,
}

impl RunSummary {
    pub fn start(start_url: impl Into<String>) -> Self {
        let start_url = start_url.into();
        let started_at = Utc::now();
        Self {
            run_id: new_run_id(&start_url, started_at),
            start_url,
            status: RunStatus::Running,
            started_at,
            finished_at: None,
            discovered: 0,
            clusters: 0,
            sampled: 0,
            pages_scanned: 0,
            pages_with_errors: 0,
            error: None,
        }
    }

    pub fn complete(&mut self) {
        self.status = RunStatus::Completed;
        self.finished_at = Some(Utc::now());
    }

    pub fn fail(&mut self, error: impl fmt::Display) {
        self.status = RunStatus::Failed;
        self.finished_at = Some(Utc::now());
        self.error = Some(error.to_string());
    }
}

/// Run ids sort chronologically: `20260101T120000Z_example.com`.
pub fn new_run_id(start_url: &str, at: DateTime<Utc>) -> String {
    let domain = get_domain(start_url).unwrap_or_else(|| "site".to_string());
    format!("{}_{}", at.format("%Y%m%dT%H%M%SZ"), domain)
}

/// Persistence for page results and run summaries.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Persist one page result, returning the key used for later patches.
    async fn save_page(&self, run_id: &str, result: &PageResult) -> Result<String>;

    /// Merge screenshot quality findings into an already saved page.
    async fn apply_quality(
        &self,
        run_id: &str,
        page_key: &str,
        quality: &BTreeMap<ViewportName, ScreenshotQualityIssue>,
    ) -> Result<()>;

    /// All pages saved for a run, in URL order.
    async fn load_run(&self, run_id: &str) -> Result<Vec<PageResult>>;

    async fn save_run_summary(&self, summary: &RunSummary) -> Result<()>;

    /// Summary of the most recent run, if any.
    async fn latest_run(&self) -> Result<Option<RunSummary>>;
}
