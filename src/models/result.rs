// src/models/result.rs

//! Scan results: issues, per-page results and screenshot quality flags.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{PageCategory, PageType, ViewportName};

/// Issue severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        })
    }
}

/// What a check found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    HorizontalScroll,
    ScreenshotFailed,
    JsError,
    BrokenImage,
    RequestId,
    ErrorText,
    Timeout,
    HttpError,
    ContentNotReady,
}

impl IssueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueType::HorizontalScroll => "horizontal_scroll",
            IssueType::ScreenshotFailed => "screenshot_failed",
            IssueType::JsError => "js_error",
            IssueType::BrokenImage => "broken_image",
            IssueType::RequestId => "request_id",
            IssueType::ErrorText => "error_text",
            IssueType::Timeout => "timeout",
            IssueType::HttpError => "http_error",
            IssueType::ContentNotReady => "content_not_ready",
        }
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single finding from one viewport pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    #[serde(rename = "type")]
    pub issue_type: IssueType,
    pub severity: Severity,
    pub message: String,
    pub viewport: ViewportName,
    /// Check-specific payload (overflow pixels, image source, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
}

impl Issue {
    pub fn new(
        issue_type: IssueType,
        severity: Severity,
        viewport: ViewportName,
        message: impl Into<String>,
    ) -> Self {
        Self {
            issue_type,
            severity,
            message: message.into(),
            viewport,
            detail: None,
        }
    }

    pub fn error(issue_type: IssueType, viewport: ViewportName, message: impl Into<String>) -> Self {
        Self::new(issue_type, Severity::Error, viewport, message)
    }

    pub fn warning(
        issue_type: IssueType,
        viewport: ViewportName,
        message: impl Into<String>,
    ) -> Self {
        Self::new(issue_type, Severity::Warning, viewport, message)
    }

    pub fn info(issue_type: IssueType, viewport: ViewportName, message: impl Into<String>) -> Self {
        Self::new(issue_type, Severity::Info, viewport, message)
    }

    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = Some(detail);
        self
    }
}

/// Overall page outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    Success,
    Error,
}

impl fmt::Display for PageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PageStatus::Success => "success",
            PageStatus::Error => "error",
        })
    }
}

/// Result of scanning one page under all four viewports.
///
/// Issues are append-only and `status` is recomputed on every append, so it
/// is `Error` exactly when some issue has error severity. A stored `status`
/// is ignored on load and derived from the issues again.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "StoredPageResult")]
pub struct PageResult {
    pub url: String,
    pub domain: String,
    pub page_type: PageType,
    pub category: PageCategory,
    status: PageStatus,
    #[serde(default)]
    pub screenshots: BTreeMap<ViewportName, String>,
    #[serde(default)]
    issues: Vec<Issue>,
    #[serde(default)]
    pub load_time_ms: Option<u64>,
    #[serde(default)]
    pub http_status: Option<u16>,
    #[serde(default)]
    pub request_ids: BTreeMap<ViewportName, String>,
    /// Filled in later by the quality analyzer
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub screenshot_quality: BTreeMap<ViewportName, ScreenshotQualityIssue>,
    pub scanned_at: DateTime<Utc>,
}

impl PageResult {
    pub fn new(
        url: impl Into<String>,
        domain: impl Into<String>,
        page_type: PageType,
        category: PageCategory,
    ) -> Self {
        Self {
            url: url.into(),
            domain: domain.into(),
            page_type,
            category,
            status: PageStatus::Success,
            screenshots: BTreeMap::new(),
            issues: Vec::new(),
            load_time_ms: None,
            http_status: None,
            request_ids: BTreeMap::new(),
            screenshot_quality: BTreeMap::new(),
            scanned_at: Utc::now(),
        }
    }

    pub fn status(&self) -> PageStatus {
        self.status
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn push_issue(&mut self, issue: Issue) {
        self.issues.push(issue);
        self.status = Self::derive_status(&self.issues);
    }

    pub fn extend_issues(&mut self, issues: impl IntoIterator<Item = Issue>) {
        self.issues.extend(issues);
        self.status = Self::derive_status(&self.issues);
    }

    /// Issues recorded for one viewport.
    pub fn issues_for(&self, viewport: ViewportName) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(move |i| i.viewport == viewport)
    }

    pub fn count_severity(&self, severity: Severity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }

    fn derive_status(issues: &[Issue]) -> PageStatus {
        if issues.iter().any(|i| i.severity == Severity::Error) {
            PageStatus::Error
        } else {
            PageStatus::Success
        }
    }
}

/// On-disk shape of a `PageResult`, without the derived status.
#[derive(Deserialize)]
struct StoredPageResult {
    url: String,
    domain: String,
    page_type: PageType,
    category: PageCategory,
    #[serde(default)]
    screenshots: BTreeMap<ViewportName, String>,
    #[serde(default)]
    issues: Vec<Issue>,
    #[serde(default)]
    load_time_ms: Option<u64>,
    #[serde(default)]
    http_status: Option<u16>,
    #[serde(default)]
    request_ids: BTreeMap<ViewportName, String>,
    #[serde(default)]
    screenshot_quality: BTreeMap<ViewportName, ScreenshotQualityIssue>,
    scanned_at: DateTime<Utc>,
}

impl From<StoredPageResult> for PageResult {
    fn from(stored: StoredPageResult) -> Self {
        Self {
            status: Self::derive_status(&stored.issues),
            url: stored.url,
            domain: stored.domain,
            page_type: stored.page_type,
            category: stored.category,
            screenshots: stored.screenshots,
            issues: stored.issues,
            load_time_ms: stored.load_time_ms,
            http_status: stored.http_status,
            request_ids: stored.request_ids,
            screenshot_quality: stored.screenshot_quality,
            scanned_at: stored.scanned_at,
        }
    }
}

/// Screenshot quality classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityKind {
    AllWhite,
    MostlyWhite,
    Blank,
    Error,
    Normal,
}

impl fmt::Display for QualityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            QualityKind::AllWhite => "all_white",
            QualityKind::MostlyWhite => "mostly_white",
            QualityKind::Blank => "blank",
            QualityKind::Error => "error",
            QualityKind::Normal => "normal",
        })
    }
}

/// Outcome of analyzing one screenshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenshotQualityIssue {
    #[serde(rename = "type")]
    pub kind: QualityKind,
    pub severity: Severity,
    pub message: String,
    pub white_percentage: f64,
}
