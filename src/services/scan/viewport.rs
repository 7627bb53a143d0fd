// src/services/scan/viewport.rs

//! Horizontal overflow detection and forced reflow.

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;

use crate::browser::{BrowserPage, evaluate_as};
use crate::error::Result;
use crate::models::{Issue, IssueType, ViewportMode};
use crate::services::scan::scripts;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ViewportMetrics {
    scroll_width: u32,
    inner_width: u32,
}

/// Compares the document's scroll width with the configured viewport width.
#[derive(Debug, Clone, Copy, Default)]
pub struct ViewportChecker;

impl ViewportChecker {
    pub fn new() -> Self {
        Self
    }

    /// Returns a `horizontal_scroll` issue when the page overflows.
    pub async fn check(&self, page: &dyn BrowserPage, mode: &ViewportMode) -> Result<Option<Issue>> {
        let metrics: ViewportMetrics = evaluate_as(page, scripts::VIEWPORT_METRICS).await?;
        if metrics.scroll_width <= mode.width {
            return Ok(None);
        }

        let overflow = metrics.scroll_width - mode.width;
        log::debug!(
            "{}: scroll width {} exceeds viewport {} by {}px",
            mode.name,
            metrics.scroll_width,
            mode.width,
            overflow
        );
        let issue = Issue::error(
            IssueType::HorizontalScroll,
            mode.name,
            format!(
                "Page is {}px wider than the {}px viewport",
                overflow, mode.width
            ),
        )
        .with_detail(json!({
            "scrollWidth": metrics.scroll_width,
            "viewportWidth": mode.width,
            "innerWidth": metrics.inner_width,
            "overflowPx": overflow,
        }));
        Ok(Some(issue))
    }
}

/// Scroll to the bottom and back so lazy content lays itself out.
pub async fn force_reflow(page: &dyn BrowserPage, wait: Duration) -> Result<()> {
    page.evaluate(scripts::SCROLL_TO_BOTTOM).await?;
    tokio::time::sleep(wait).await;
    page.evaluate(scripts::SCROLL_TO_TOP).await?;
    tokio::time::sleep(wait).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::{FakeDriver, FakePage};
    use crate::browser::{BrowserDriver, ContextOptions};
    use crate::models::{Severity, ViewportName};

    async fn check(page: FakePage, name: ViewportName) -> Option<Issue> {
        let mode = ViewportMode::preset(name);
        let driver = FakeDriver::new(page);
        let context = driver
            .new_context(&ContextOptions {
                viewport: mode.clone(),
                blocked_urls: Vec::new(),
            })
            .await
            .unwrap();
        let tab = context.new_page().await.unwrap();
        ViewportChecker::new().check(tab.as_ref(), &mode).await.unwrap()
    }

    #[tokio::test]
    async fn test_fitting_page_has_no_issue() {
        assert!(check(FakePage::default(), ViewportName::MobileNormal).await.is_none());
    }

    #[tokio::test]
    async fn test_overflow_reports_pixels() {
        let issue = check(FakePage::default().with_scroll_width(500), ViewportName::MobileNormal)
            .await
            .unwrap();

        assert_eq!(issue.issue_type, IssueType::HorizontalScroll);
        assert_eq!(issue.severity, Severity::Error);
        assert_eq!(issue.viewport, ViewportName::MobileNormal);
        assert_eq!(issue.detail.unwrap()["overflowPx"], 125);
    }

    #[tokio::test]
    async fn test_narrow_page_fits_desktop() {
        let page = FakePage::default().with_scroll_width(500);
        assert!(check(page, ViewportName::PcNormal).await.is_none());
    }
}
