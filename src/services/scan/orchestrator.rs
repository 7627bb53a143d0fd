// src/services/scan/orchestrator.rs

//! Scan orchestrator: four isolated viewport passes per sampled page.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::browser::{BrowserDriver, BrowserPage, ContextOptions, GotoOptions, WaitUntil};
use crate::error::{AppError, Result};
use crate::models::{
    Config, Issue, IssueType, PageResult, PageStatus, SampledPage, Severity, ViewportMode,
    ViewportName,
};
use crate::progress::ProgressReporter;
use crate::services::scan::{
    ErrorDetector, QualityAnalyzer, Readiness, ReadinessPolicies, ScreenshotCapture,
    ViewportChecker, force_reflow,
};
use crate::storage::ResultStore;
use crate::utils::get_domain;

const CLOSE_TIMEOUT: Duration = Duration::from_secs(10);

/// Hook run on the `pc_normal` page before it closes.
#[async_trait]
pub trait PageInspector: Send + Sync {
    async fn inspect(&self, page: &dyn BrowserPage, result: &mut PageResult) -> Result<()>;
}

/// Drives the browser through every sampled page.
pub struct ScanOrchestrator {
    driver: Arc<dyn BrowserDriver>,
    store: Arc<dyn ResultStore>,
    progress: ProgressReporter,
    config: Arc<Config>,
    viewports: Vec<ViewportMode>,
    readiness: ReadinessPolicies,
    viewport_checker: ViewportChecker,
    detector: ErrorDetector,
    capture: ScreenshotCapture,
    quality: QualityAnalyzer,
    quality_tasks: Mutex<JoinSet<()>>,
    inspector: Option<Arc<dyn PageInspector>>,
}

impl ScanOrchestrator {
    pub fn new(
        driver: Arc<dyn BrowserDriver>,
        store: Arc<dyn ResultStore>,
        progress: ProgressReporter,
        config: Arc<Config>,
    ) -> Self {
        Self {
            viewports: config.viewport_modes(),
            readiness: ReadinessPolicies::from_config(&config.scan),
            viewport_checker: ViewportChecker::new(),
            detector: ErrorDetector::new(&config.checks),
            capture: ScreenshotCapture::new(&config.scan),
            quality: QualityAnalyzer::new(config.quality.clone()),
            quality_tasks: Mutex::new(JoinSet::new()),
            inspector: None,
            driver,
            store,
            progress,
            config,
        }
    }

    pub fn with_inspector(mut self, inspector: Arc<dyn PageInspector>) -> Self {
        self.inspector = Some(inspector);
        self
    }

    /// Scan pages one at a time under the whole-scan watchdog.
    ///
    /// Each finished page is persisted before the next starts. When the
    /// watchdog fires the browser is closed and `ScanTimeout` is returned;
    /// pages saved so far stay saved.
    pub async fn scan(&self, run_id: &str, pages: &[SampledPage]) -> Result<Vec<PageResult>> {
        let limit = Duration::from_secs(self.config.scan.scan_timeout_secs);
        self.scan_within(run_id, pages, limit).await
    }

    /// Same as [`scan`](Self::scan) with the watchdog set to `limit`.
    pub async fn scan_within(
        &self,
        run_id: &str,
        pages: &[SampledPage],
        limit: Duration,
    ) -> Result<Vec<PageResult>> {
        let started = Instant::now();
        let mut results = Vec::with_capacity(pages.len());

        let scanned = tokio::time::timeout(limit, async {
            for (i, page) in pages.iter().enumerate() {
                log::info!("[{}/{}] Scanning {}", i + 1, pages.len(), page.url());
                let result = self.scan_page(page).await;
                self.persist(run_id, &result).await;
                results.push(result);
            }
        })
        .await;

        if scanned.is_err() {
            let completed = results.len();
            log::error!(
                "Scan watchdog fired after {}s with {}/{} page(s) done",
                limit.as_secs(),
                completed,
                pages.len()
            );
            if let Err(e) = self.driver.close().await {
                log::warn!("Closing browser after watchdog failed: {}", e);
            }
            let err = AppError::ScanTimeout {
                elapsed_secs: started.elapsed().as_secs(),
                completed,
            };
            self.progress.failed(err.to_string());
            return Err(err);
        }

        let with_errors = results
            .iter()
            .filter(|r| r.status() == PageStatus::Error)
            .count();
        log::info!(
            "Scanned {} page(s), {} with errors",
            results.len(),
            with_errors
        );
        Ok(results)
    }

    /// Run all four passes for one page. Never fails: every pass failure is
    /// recorded as an issue on its own viewport.
    pub async fn scan_page(&self, page: &SampledPage) -> PageResult {
        let url = page.url();
        let domain = get_domain(url).unwrap_or_default();
        let mut result = PageResult::new(url, domain, page.page_type, page.category);

        for mode in &self.viewports {
            self.progress
                .page_log(url, Some(mode.name), format!("{} pass", mode.name));
            if let Err(e) = self.run_pass(page, mode, &mut result).await {
                log::warn!("{} pass failed for {}: {}", mode.name, url, e);
                result.push_issue(pass_failure(mode.name, &e));
            }
        }

        self.progress.page_log(
            url,
            None,
            format!(
                "{} ({} error(s), {} warning(s))",
                match result.status() {
                    PageStatus::Success => "ok",
                    PageStatus::Error => "failed",
                },
                result.count_severity(Severity::Error),
                result.count_severity(Severity::Warning)
            ),
        );
        result
    }

    /// Wait for every outstanding screenshot quality task.
    pub async fn wait_for_quality(&self) {
        let mut tasks = std::mem::take(&mut *self.quality_tasks.lock().await);
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                log::warn!("Quality task did not finish: {}", e);
            }
        }
    }

    async fn run_pass(
        &self,
        page: &SampledPage,
        mode: &ViewportMode,
        result: &mut PageResult,
    ) -> Result<()> {
        let options = ContextOptions {
            viewport: mode.clone(),
            blocked_urls: self.config.scan.blocked_resources.clone(),
        };
        let budget = self.config.scan.pass_budget();
        let context = tokio::time::timeout(budget, self.driver.new_context(&options))
            .await
            .map_err(|_| AppError::PassTimeout(budget.as_secs()))??;

        let outcome = match tokio::time::timeout(budget, context.new_page()).await {
            Ok(Ok(tab)) => {
                let outcome =
                    tokio::time::timeout(budget, self.drive(tab.as_ref(), page, mode, result))
                        .await
                        .unwrap_or(Err(AppError::PassTimeout(budget.as_secs())));
                match tokio::time::timeout(CLOSE_TIMEOUT, tab.close()).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => log::debug!("Closing {} page failed: {}", mode.name, e),
                    Err(_) => log::debug!("Closing {} page timed out", mode.name),
                }
                outcome
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(AppError::PassTimeout(budget.as_secs())),
        };

        match tokio::time::timeout(CLOSE_TIMEOUT, context.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::debug!("Closing {} context failed: {}", mode.name, e),
            Err(_) => log::debug!("Closing {} context timed out", mode.name),
        }
        outcome
    }

    async fn drive(
        &self,
        tab: &dyn BrowserPage,
        page: &SampledPage,
        mode: &ViewportMode,
        result: &mut PageResult,
    ) -> Result<()> {
        let url = page.url();
        let viewport = mode.name;
        let checks = &self.config.checks;
        let timeout = Duration::from_secs(self.config.scan.navigation_timeout_secs);

        let started = Instant::now();
        let goto = GotoOptions {
            wait_until: WaitUntil::Load,
            timeout,
        };
        let response = tokio::time::timeout(timeout, tab.goto(url, &goto))
            .await
            .map_err(|_| AppError::Timeout(timeout.as_millis() as u64))??;

        if viewport == ViewportName::PcNormal {
            result.load_time_ms = Some(started.elapsed().as_millis() as u64);
            result.http_status = response.status;
            if let Some(status) = response.status.filter(|s| *s >= 400) {
                result.push_issue(
                    Issue::error(
                        IssueType::HttpError,
                        viewport,
                        format!("Server responded with HTTP {status}"),
                    )
                    .with_detail(json!({ "status": status })),
                );
            }
        }

        if let Readiness::NotReady(reason) =
            self.readiness.for_page_type(page.page_type).wait(tab).await
        {
            result.push_issue(Issue::warning(IssueType::ContentNotReady, viewport, reason));
        }

        if checks.viewport_overflow {
            match self.viewport_checker.check(tab, mode).await {
                Ok(Some(issue)) => result.push_issue(issue),
                Ok(None) => {}
                Err(e) => log::debug!("Viewport check failed on {} ({}): {}", url, viewport, e),
            }
        }

        let reflow_wait = Duration::from_millis(self.config.scan.reflow_wait_ms);
        if let Err(e) = force_reflow(tab, reflow_wait).await {
            log::debug!("Reflow failed on {} ({}): {}", url, viewport, e);
        }

        if checks.screenshots {
            match self.capture.capture(tab, url, mode).await {
                Ok(path) => {
                    result
                        .screenshots
                        .insert(viewport, path.display().to_string());
                }
                Err(e) => result.push_issue(Issue::error(
                    IssueType::ScreenshotFailed,
                    viewport,
                    e.to_string(),
                )),
            }
        }

        let request_id = self.detector.request_id(tab).await;
        if !viewport.is_spider() {
            let issues = self
                .detector
                .detect(tab, viewport, request_id.as_deref())
                .await;
            result.extend_issues(issues);
        }
        if let Some(id) = request_id {
            result.request_ids.insert(viewport, id);
        }

        if viewport == ViewportName::PcNormal {
            if let Some(inspector) = &self.inspector {
                if let Err(e) = inspector.inspect(tab, result).await {
                    log::warn!("Page inspector failed on {}: {}", url, e);
                }
            }
        }

        Ok(())
    }

    /// Save a finished page and queue its screenshot analysis.
    async fn persist(&self, run_id: &str, result: &PageResult) {
        let key = match self.store.save_page(run_id, result).await {
            Ok(key) => key,
            Err(e) => {
                log::error!("Failed to save result for {}: {}", result.url, e);
                return;
            }
        };

        if !self.config.checks.screenshot_quality || result.screenshots.is_empty() {
            return;
        }

        let analyzer = self.quality.clone();
        let store = Arc::clone(&self.store);
        let run_id = run_id.to_string();
        let url = result.url.clone();
        let screenshots = result.screenshots.clone();

        self.quality_tasks.lock().await.spawn(async move {
            let mut quality = BTreeMap::new();
            for (viewport, path) in screenshots {
                let issue = analyzer.analyze(path.into()).await;
                if issue.severity != Severity::Info {
                    log::warn!("{} ({}): {}", url, viewport, issue.message);
                }
                quality.insert(viewport, issue);
            }
            if let Err(e) = store.apply_quality(&run_id, &key, &quality).await {
                log::warn!("Failed to record screenshot quality for {}: {}", url, e);
            }
        });
    }
}

fn pass_failure(viewport: ViewportName, error: &AppError) -> Issue {
    let message = match error {
        AppError::Timeout(ms) => format!("Navigation timed out after {}s", ms / 1000),
        AppError::PassTimeout(secs) => format!("Pass timed out after {secs}s"),
        other => format!("Pass aborted: {other}"),
    };
    Issue::error(IssueType::Timeout, viewport, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::ConsoleMessage;
    use crate::browser::fake::{FakeDriver, FakePage};
    use crate::models::{DomFingerprint, PageCategory, PageType, QualityKind, ScanConfig};
    use crate::progress::ProgressEvent;
    use crate::storage::LocalStorage;
    use tempfile::TempDir;

    struct Harness {
        _tmp: TempDir,
        driver: Arc<FakeDriver>,
        store: Arc<LocalStorage>,
        orchestrator: ScanOrchestrator,
    }

    fn harness(driver: FakeDriver, tweak: impl FnOnce(&mut Config)) -> Harness {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.scan.output_dir = tmp.path().join("shots").display().to_string();
        tweak(&mut config);

        let driver = Arc::new(driver);
        let store = Arc::new(LocalStorage::new(tmp.path().join("storage")));
        let orchestrator = ScanOrchestrator::new(
            driver.clone(),
            store.clone(),
            ProgressReporter::default(),
            Arc::new(config),
        );
        Harness {
            _tmp: tmp,
            driver,
            store,
            orchestrator,
        }
    }

    fn sampled(url: &str, page_type: PageType) -> SampledPage {
        SampledPage {
            cluster_id: 0,
            category: PageCategory::Other,
            page_type,
            fingerprint: DomFingerprint::empty(url),
        }
    }

    fn types_for(result: &PageResult, viewport: ViewportName) -> Vec<IssueType> {
        result.issues_for(viewport).map(|i| i.issue_type).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_passes_run_in_fixed_order() {
        let h = harness(FakeDriver::new(FakePage::default()), |_| {});
        let result = h
            .orchestrator
            .scan_page(&sampled("https://example.com/a", PageType::Other))
            .await;

        let order: Vec<_> = h.driver.visits().into_iter().map(|(v, _)| v).collect();
        assert_eq!(order, ViewportName::ALL.to_vec());
        assert_eq!(h.driver.contexts_opened(), 4);
        assert_eq!(h.driver.contexts_closed(), 4);
        assert_eq!(h.driver.pages_closed(), 4);

        let options = h.driver.context_options();
        assert!(options[2].viewport.user_agent.contains("Googlebot"));
        assert!(options.iter().all(|o| o.blocked_urls.iter().any(|b| b.contains("woff"))));

        assert_eq!(result.status(), PageStatus::Success);
        assert_eq!(result.screenshots.len(), 4);
        assert!(result.issues().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_viewport_does_not_stop_others() {
        let driver = FakeDriver::new(FakePage::default())
            .with_viewport(ViewportName::MobileNormal, FakePage::default().failing_navigation());
        let h = harness(driver, |_| {});

        let result = h
            .orchestrator
            .scan_page(&sampled("https://example.com/a", PageType::Other))
            .await;

        assert_eq!(types_for(&result, ViewportName::MobileNormal), vec![IssueType::Timeout]);
        for viewport in [ViewportName::PcNormal, ViewportName::PcSpider, ViewportName::MobileSpider] {
            assert!(types_for(&result, viewport).is_empty());
            assert!(result.screenshots.contains_key(&viewport));
        }
        assert!(!result.screenshots.contains_key(&ViewportName::MobileNormal));
        assert_eq!(result.status(), PageStatus::Error);
        assert_eq!(h.driver.contexts_closed(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_navigation_times_out() {
        let driver = FakeDriver::new(FakePage::default())
            .with_viewport(ViewportName::PcSpider, FakePage::default().hanging_navigation());
        let h = harness(driver, |_| {});

        let result = h
            .orchestrator
            .scan_page(&sampled("https://example.com/a", PageType::Other))
            .await;

        let issues: Vec<_> = result.issues_for(ViewportName::PcSpider).collect();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].issue_type, IssueType::Timeout);
        assert_eq!(issues[0].message, "Navigation timed out after 30s");
        assert!(result.screenshots.contains_key(&ViewportName::MobileSpider));
    }

    #[tokio::test(start_paused = true)]
    async fn test_screenshot_retry_recovers() {
        let h = harness(
            FakeDriver::new(FakePage::default().failing_screenshots(2)),
            |_| {},
        );
        let result = h
            .orchestrator
            .scan_page(&sampled("https://example.com/a", PageType::Other))
            .await;

        assert_eq!(h.driver.screenshot_attempts(), 12);
        assert_eq!(result.screenshots.len(), 4);
        assert_eq!(result.status(), PageStatus::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_screenshot_failure_recorded_and_pass_continues() {
        let page = FakePage::default()
            .failing_screenshots(3)
            .with_console(vec![ConsoleMessage::error("Uncaught ReferenceError: foo")]);
        let h = harness(FakeDriver::new(page), |_| {});
        let result = h
            .orchestrator
            .scan_page(&sampled("https://example.com/a", PageType::Other))
            .await;

        assert_eq!(h.driver.screenshot_attempts(), 12);
        assert!(result.screenshots.is_empty());
        assert_eq!(
            types_for(&result, ViewportName::PcNormal),
            vec![IssueType::ScreenshotFailed, IssueType::JsError]
        );
        assert_eq!(result.status(), PageStatus::Error);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_screenshot_fails_attempts_and_scan_finishes() {
        let driver = FakeDriver::new(FakePage::default())
            .with_viewport(ViewportName::PcNormal, FakePage::default().hanging_screenshots());
        let h = harness(driver, |c| c.scan.scan_timeout_secs = 600);
        let pages = vec![
            sampled("https://example.com/a", PageType::Other),
            sampled("https://example.com/b", PageType::Other),
        ];

        let results = h.orchestrator.scan("run1", &pages).await.unwrap();

        assert_eq!(results.len(), 2);
        // Three stalled attempts on pc_normal plus one shot per other viewport
        assert_eq!(h.driver.screenshot_attempts(), 12);
        for result in &results {
            assert_eq!(
                types_for(result, ViewportName::PcNormal),
                vec![IssueType::ScreenshotFailed]
            );
            assert!(!result.screenshots.contains_key(&ViewportName::PcNormal));
            assert_eq!(result.screenshots.len(), 3);
            assert_eq!(result.status(), PageStatus::Error);
        }
        assert!(!h.driver.is_closed());
        assert_eq!(h.store.load_run("run1").await.unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_page_script_ends_only_its_pass() {
        let driver = FakeDriver::new(FakePage::default())
            .with_viewport(ViewportName::MobileNormal, FakePage::default().hanging_evaluate());
        let h = harness(driver, |_| {});
        let budget = ScanConfig::default().pass_budget();

        let started = Instant::now();
        let result = h
            .orchestrator
            .scan_page(&sampled("https://example.com/a", PageType::Other))
            .await;

        let issues: Vec<_> = result.issues_for(ViewportName::MobileNormal).collect();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].issue_type, IssueType::Timeout);
        assert_eq!(
            issues[0].message,
            format!("Pass timed out after {}s", budget.as_secs())
        );
        for viewport in [ViewportName::PcNormal, ViewportName::PcSpider, ViewportName::MobileSpider] {
            assert!(types_for(&result, viewport).is_empty());
            assert!(result.screenshots.contains_key(&viewport));
        }
        assert_eq!(h.driver.contexts_closed(), 4);
        assert_eq!(h.driver.pages_closed(), 4);

        let elapsed = started.elapsed();
        assert!(elapsed >= budget);
        assert!(elapsed < budget + Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_metrics_from_pc_normal_only() {
        let driver = FakeDriver::new(FakePage::default())
            .with_viewport(ViewportName::PcNormal, FakePage::default().with_status(404))
            .with_viewport(ViewportName::MobileNormal, FakePage::default().with_status(500));
        let h = harness(driver, |_| {});
        let result = h
            .orchestrator
            .scan_page(&sampled("https://example.com/a", PageType::Other))
            .await;

        assert_eq!(result.http_status, Some(404));
        // The fake navigation takes 120ms.
        let load = result.load_time_ms.unwrap();
        assert!((120..200).contains(&load));
        assert_eq!(types_for(&result, ViewportName::PcNormal), vec![IssueType::HttpError]);
        assert!(types_for(&result, ViewportName::MobileNormal).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_overflow_only_on_narrow_viewports() {
        let h = harness(FakeDriver::new(FakePage::default().with_scroll_width(500)), |_| {});
        let result = h
            .orchestrator
            .scan_page(&sampled("https://example.com/a", PageType::Other))
            .await;

        assert_eq!(
            types_for(&result, ViewportName::MobileNormal),
            vec![IssueType::HorizontalScroll]
        );
        assert_eq!(
            types_for(&result, ViewportName::MobileSpider),
            vec![IssueType::HorizontalScroll]
        );
        assert!(types_for(&result, ViewportName::PcNormal).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_detector_skips_spider_passes() {
        let page = FakePage::default()
            .with_console(vec![ConsoleMessage::error("Uncaught TypeError: boom")])
            .with_broken_images(&["https://example.com/missing.png"])
            .with_request_id("req-42")
            .with_body_text("Something went wrong");
        let h = harness(FakeDriver::new(page), |_| {});
        let result = h
            .orchestrator
            .scan_page(&sampled("https://example.com/a", PageType::Other))
            .await;

        let expected = vec![
            IssueType::JsError,
            IssueType::BrokenImage,
            IssueType::RequestId,
            IssueType::ErrorText,
        ];
        assert_eq!(types_for(&result, ViewportName::PcNormal), expected);
        assert_eq!(types_for(&result, ViewportName::MobileNormal), expected);
        assert!(types_for(&result, ViewportName::PcSpider).is_empty());
        assert!(types_for(&result, ViewportName::MobileSpider).is_empty());

        assert_eq!(result.request_ids.len(), 4);
        assert_eq!(result.request_ids[&ViewportName::PcSpider], "req-42");
    }

    #[tokio::test(start_paused = true)]
    async fn test_info_and_warnings_keep_success() {
        let page = FakePage::default()
            .with_request_id("req-1")
            .with_console(vec![ConsoleMessage::error("Uncaught TypeError: boom")]);
        let h = harness(FakeDriver::new(page), |_| {});
        let result = h
            .orchestrator
            .scan_page(&sampled("https://example.com/a", PageType::Other))
            .await;

        assert!(!result.issues().is_empty());
        assert_eq!(result.status(), PageStatus::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unfilled_list_warns() {
        let h = harness(FakeDriver::new(FakePage::default().list_never_ready()), |_| {});

        let list = h
            .orchestrator
            .scan_page(&sampled("https://example.com/category/a", PageType::List))
            .await;
        for viewport in ViewportName::ALL {
            assert_eq!(types_for(&list, viewport), vec![IssueType::ContentNotReady]);
        }
        assert_eq!(list.status(), PageStatus::Success);

        let detail = h
            .orchestrator
            .scan_page(&sampled("https://example.com/item/1", PageType::Detail))
            .await;
        assert!(detail.issues().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pc_screenshots_cropped() {
        let h = harness(FakeDriver::new(FakePage::default()), |_| {});
        let result = h
            .orchestrator
            .scan_page(&sampled("https://example.com/a", PageType::Other))
            .await;

        let width = |v: ViewportName| image::open(&result.screenshots[&v]).unwrap().width();
        assert_eq!(width(ViewportName::PcNormal), 1440);
        assert_eq!(width(ViewportName::PcSpider), 1440);
        assert_eq!(width(ViewportName::MobileNormal), 375);
        assert_eq!(width(ViewportName::MobileSpider), 412);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_persists_and_patches_quality() {
        let page = FakePage::default().with_screenshot_color([255, 255, 255]);
        let h = harness(FakeDriver::new(page), |_| {});
        let pages = vec![
            sampled("https://example.com/a", PageType::Other),
            sampled("https://example.com/b", PageType::Other),
        ];

        let results = h.orchestrator.scan("run1", &pages).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.screenshot_quality.is_empty()));

        h.orchestrator.wait_for_quality().await;

        let stored = h.store.load_run("run1").await.unwrap();
        assert_eq!(stored.len(), 2);
        for page in &stored {
            assert_eq!(page.screenshot_quality.len(), 4);
            assert!(
                page.screenshot_quality
                    .values()
                    .all(|q| q.kind == QualityKind::AllWhite)
            );
            // Quality findings are advisory and leave the status alone.
            assert_eq!(page.status(), PageStatus::Success);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_watchdog_closes_browser_and_keeps_finished_pages() {
        let driver = FakeDriver::new(FakePage::default())
            .with_url("https://example.com/slow", FakePage::default().hanging_navigation());
        let h = harness(driver, |c| c.scan.scan_timeout_secs = 60);
        let mut rx = h.orchestrator.progress.subscribe();
        let pages = vec![
            sampled("https://example.com/a", PageType::Other),
            sampled("https://example.com/slow", PageType::Other),
            sampled("https://example.com/c", PageType::Other),
        ];

        let err = h.orchestrator.scan("run1", &pages).await.unwrap_err();

        assert!(matches!(err, AppError::ScanTimeout { completed: 1, .. }));
        assert!(h.driver.is_closed());
        let stored = h.store.load_run("run1").await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].url, "https://example.com/a");

        let mut saw_failure = false;
        while let Ok(event) = rx.try_recv() {
            saw_failure |= matches!(event, ProgressEvent::Failed { .. });
        }
        assert!(saw_failure);
    }

    struct TitleInspector;

    #[async_trait]
    impl PageInspector for TitleInspector {
        async fn inspect(&self, _page: &dyn BrowserPage, result: &mut PageResult) -> Result<()> {
            result.push_issue(Issue::info(
                IssueType::RequestId,
                ViewportName::PcNormal,
                "inspected",
            ));
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_inspector_runs_once_on_pc_normal() {
        let h = harness(FakeDriver::new(FakePage::default()), |_| {});
        let orchestrator = h.orchestrator.with_inspector(Arc::new(TitleInspector));
        let result = orchestrator
            .scan_page(&sampled("https://example.com/a", PageType::Other))
            .await;

        let inspected: Vec<_> = result
            .issues()
            .iter()
            .filter(|i| i.message == "inspected")
            .collect();
        assert_eq!(inspected.len(), 1);
        assert_eq!(inspected[0].viewport, ViewportName::PcNormal);
    }
}
