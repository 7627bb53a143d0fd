// src/pipeline/pipeline.rs

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::browser::BrowserDriver;
use crate::error::{AppError, Result};
use crate::models::{Config, PageResult, PageStatus};
use crate::progress::ProgressReporter;
use crate::services::{
    BrowserFingerprinter, LinkDiscovery, ScanOrchestrator, UrlRules, classifier,
};
use crate::storage::{ResultStore, RunSummary};
use crate::utils::http::create_async_client;

use super::classify::classify_pages;

const TOTAL_STEPS: usize = 4;

/// Outcome of a completed run.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub summary: RunSummary,
    pub results: Vec<PageResult>,
}

/// Discover, classify and scan a site end to end.
pub struct Pipeline {
    config: Arc<Config>,
    driver: Arc<dyn BrowserDriver>,
    store: Arc<dyn ResultStore>,
    progress: ProgressReporter,
}

impl Pipeline {
    pub fn new(
        config: Arc<Config>,
        driver: Arc<dyn BrowserDriver>,
        store: Arc<dyn ResultStore>,
        progress: ProgressReporter,
    ) -> Self {
        Self {
            config,
            driver,
            store,
            progress,
        }
    }

    /// Run every phase starting from the links found on `start_url`.
    pub async fn run(&self, start_url: &str) -> Result<PipelineOutcome> {
        let mut summary = RunSummary::start(start_url);
        self.progress
            .step(1, TOTAL_STEPS, format!("Discover - Collecting links from {start_url}"));

        let discovered = match self.discover(start_url).await {
            Ok(urls) => urls,
            Err(e) => return Err(self.fail(&mut summary, e).await),
        };
        self.scan_site(summary, discovered).await
    }

    /// Run classification and scanning over an already known page list.
    pub async fn run_with_pages(
        &self,
        start_url: &str,
        urls: Vec<String>,
    ) -> Result<PipelineOutcome> {
        let summary = RunSummary::start(start_url);
        self.progress.step(
            1,
            TOTAL_STEPS,
            format!("Discover - Using {} provided page(s)", urls.len()),
        );
        self.scan_site(summary, urls).await
    }

    async fn discover(&self, start_url: &str) -> Result<Vec<String>> {
        let client = create_async_client(&self.config.crawler)?;
        let rules = UrlRules::from_config(&self.config.classifier, &self.config.crawler)?;
        LinkDiscovery::new(client, rules, self.config.crawler.max_pages)
            .discover(start_url)
            .await
    }

    async fn scan_site(
        &self,
        mut summary: RunSummary,
        urls: Vec<String>,
    ) -> Result<PipelineOutcome> {
        summary.discovered = urls.len();
        self.save_summary(&summary).await;

        // One watchdog budget covers classification and scanning
        let started = Instant::now();
        let deadline = started + Duration::from_secs(self.config.scan.scan_timeout_secs);

        self.progress.step(
            2,
            TOTAL_STEPS,
            format!("Classify - Fingerprinting {} page(s)", urls.len()),
        );
        let (engine, sampler) = match classifier::from_config(&self.config) {
            Ok(parts) => parts,
            Err(e) => return Err(self.fail(&mut summary, e).await),
        };
        let fingerprinter = BrowserFingerprinter::new(Arc::clone(&self.driver), &self.config);
        let classified = tokio::time::timeout_at(
            deadline,
            classify_pages(
                &fingerprinter,
                &urls,
                self.config.classifier.extract_concurrency,
                &engine,
                &sampler,
            ),
        )
        .await;
        let classification = match classified {
            Ok(classification) => classification,
            Err(_) => return Err(self.expire(&mut summary, started).await),
        };
        summary.clusters = classification.clusters.len();
        summary.sampled = classification.sample.len();
        for cluster in &classification.clusters {
            log::info!(
                "Cluster #{} ({}): {} page(s), representative {}",
                cluster.id,
                cluster.category,
                cluster.len(),
                cluster.representative().url
            );
        }

        self.progress.step(
            3,
            TOTAL_STEPS,
            format!("Scan - {} sampled page(s) x 4 viewports", summary.sampled),
        );
        let orchestrator = ScanOrchestrator::new(
            Arc::clone(&self.driver),
            Arc::clone(&self.store),
            self.progress.clone(),
            Arc::clone(&self.config),
        );
        let remaining = deadline.saturating_duration_since(Instant::now());
        let scanned = orchestrator
            .scan_within(&summary.run_id, &classification.sample, remaining)
            .await;
        let results = match scanned {
            Ok(results) => results,
            Err(e) => {
                orchestrator.wait_for_quality().await;
                return Err(self.fail(&mut summary, e).await);
            }
        };

        self.progress
            .step(4, TOTAL_STEPS, "Finish - Waiting for screenshot analysis");
        orchestrator.wait_for_quality().await;

        summary.pages_scanned = results.len();
        summary.pages_with_errors = results
            .iter()
            .filter(|r| r.status() == PageStatus::Error)
            .count();
        summary.complete();
        self.save_summary(&summary).await;
        self.progress
            .finished(summary.pages_scanned, summary.pages_with_errors);

        log::info!(
            "Run {} complete: {} page(s) scanned, {} with errors",
            summary.run_id,
            summary.pages_scanned,
            summary.pages_with_errors
        );
        Ok(PipelineOutcome { summary, results })
    }

    /// Mark the run failed and hand the error back to the caller.
    async fn fail(&self, summary: &mut RunSummary, error: AppError) -> AppError {
        log::error!("Run {} failed: {}", summary.run_id, error);
        summary.fail(&error);
        self.save_summary(summary).await;
        // The watchdog reports its own failure event
        if !matches!(error, AppError::ScanTimeout { .. }) {
            self.progress.failed(error.to_string());
        }
        error
    }

    /// Stop a run whose watchdog fired before scanning began.
    async fn expire(&self, summary: &mut RunSummary, started: Instant) -> AppError {
        log::error!(
            "Scan watchdog fired during classification of run {}",
            summary.run_id
        );
        if let Err(e) = self.driver.close().await {
            log::warn!("Closing browser after watchdog failed: {}", e);
        }
        let error = AppError::ScanTimeout {
            elapsed_secs: started.elapsed().as_secs(),
            completed: 0,
        };
        self.progress.failed(error.to_string());
        self.fail(summary, error).await
    }

    async fn save_summary(&self, summary: &RunSummary) {
        if let Err(e) = self.store.save_run_summary(summary).await {
            log::warn!("Saving summary for run {} failed: {}", summary.run_id, e);
        }
    }
}

/// Run the full pipeline against `start_url`.
pub async fn run_pipeline(
    config: Arc<Config>,
    driver: Arc<dyn BrowserDriver>,
    store: Arc<dyn ResultStore>,
    progress: ProgressReporter,
    start_url: &str,
) -> Result<PipelineOutcome> {
    Pipeline::new(config, driver, store, progress)
        .run(start_url)
        .await
}
