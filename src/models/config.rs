//! Application configuration structures.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

use regex::Regex;
use scraper::Selector;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{ViewportMode, ViewportName};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Clustering and sampling settings
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Link discovery and static fetching
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Browser pass timings and screenshot handling
    #[serde(default)]
    pub scan: ScanConfig,

    /// Enabled checks and their match lists
    #[serde(default)]
    pub checks: ChecksConfig,

    /// Blank-render detection thresholds
    #[serde(default)]
    pub quality: QualityConfig,

    /// Exactly one definition per viewport pass
    #[serde(default = "defaults::viewports")]
    pub viewports: Vec<ViewportMode>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        let threshold = self.classifier.similarity_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(AppError::validation(format!(
                "classifier.similarity_threshold must be within [0, 1], got {threshold}"
            )));
        }
        if self.classifier.max_per_category == 0 {
            return Err(AppError::validation(
                "classifier.max_per_category must be > 0",
            ));
        }
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.max_concurrent == 0 {
            return Err(AppError::validation("crawler.max_concurrent must be > 0"));
        }
        if self.scan.navigation_timeout_secs == 0 {
            return Err(AppError::validation(
                "scan.navigation_timeout_secs must be > 0",
            ));
        }
        if self.scan.scan_timeout_secs == 0 {
            return Err(AppError::validation("scan.scan_timeout_secs must be > 0"));
        }
        if self.scan.screenshot_timeout_secs == 0 {
            return Err(AppError::validation(
                "scan.screenshot_timeout_secs must be > 0",
            ));
        }
        if self.scan.screenshot_attempts == 0 {
            return Err(AppError::validation(
                "scan.screenshot_attempts must be > 0",
            ));
        }
        if self.scan.list_readiness.min_items == 0 {
            return Err(AppError::validation(
                "scan.list_readiness.min_items must be > 0",
            ));
        }
        if self.quality.mostly_white_percent > self.quality.all_white_percent {
            return Err(AppError::validation(
                "quality.mostly_white_percent must not exceed quality.all_white_percent",
            ));
        }

        self.validate_viewports()?;

        for pattern in self
            .classifier
            .detail_patterns
            .iter()
            .chain(&self.classifier.list_patterns)
            .chain(&self.crawler.exclude_patterns)
        {
            Regex::new(pattern)?;
        }

        for selector in &self.scan.list_readiness.container_selectors {
            Selector::parse(selector).map_err(|e| AppError::selector(selector, e))?;
        }

        Ok(())
    }

    fn validate_viewports(&self) -> Result<()> {
        if self.viewports.len() != ViewportName::ALL.len() {
            return Err(AppError::validation(format!(
                "exactly {} viewports required, found {}",
                ViewportName::ALL.len(),
                self.viewports.len()
            )));
        }

        let mut seen = HashSet::new();
        for mode in &self.viewports {
            if !seen.insert(mode.name) {
                return Err(AppError::validation(format!(
                    "viewport {} defined twice",
                    mode.name
                )));
            }
            if mode.width == 0 || mode.height == 0 {
                return Err(AppError::validation(format!(
                    "viewport {} has zero dimensions",
                    mode.name
                )));
            }
            if mode.user_agent.trim().is_empty() {
                return Err(AppError::validation(format!(
                    "viewport {} has an empty user_agent",
                    mode.name
                )));
            }
        }
        Ok(())
    }

    /// Viewport modes in scan order (pc_normal, mobile_normal, pc_spider, mobile_spider).
    pub fn viewport_modes(&self) -> Vec<ViewportMode> {
        ViewportName::ALL
            .iter()
            .map(|name| {
                self.viewports
                    .iter()
                    .find(|m| m.name == *name)
                    .cloned()
                    .unwrap_or_else(|| ViewportMode::preset(*name))
            })
            .collect()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            classifier: ClassifierConfig::default(),
            crawler: CrawlerConfig::default(),
            scan: ScanConfig::default(),
            checks: ChecksConfig::default(),
            quality: QualityConfig::default(),
            viewports: defaults::viewports(),
        }
    }
}

/// Clustering and sampling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Minimum average similarity to join an existing cluster
    #[serde(default = "defaults::similarity_threshold")]
    pub similarity_threshold: f64,

    /// Per-cluster sample bound before type backfill
    #[serde(default = "defaults::max_per_category")]
    pub max_per_category: usize,

    /// Minimum detail pages in the final sample, when available
    #[serde(default = "defaults::min_typed_pages")]
    pub min_detail_pages: usize,

    /// Minimum list pages in the final sample, when available
    #[serde(default = "defaults::min_typed_pages")]
    pub min_list_pages: usize,

    /// URL regexes marking a detail page
    #[serde(default = "defaults::detail_patterns")]
    pub detail_patterns: Vec<String>,

    /// URL regexes marking a list page
    #[serde(default = "defaults::list_patterns")]
    pub list_patterns: Vec<String>,

    /// In-flight fingerprint extractions
    #[serde(default = "defaults::extract_concurrency")]
    pub extract_concurrency: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: defaults::similarity_threshold(),
            max_per_category: defaults::max_per_category(),
            min_detail_pages: defaults::min_typed_pages(),
            min_list_pages: defaults::min_typed_pages(),
            detail_patterns: defaults::detail_patterns(),
            list_patterns: defaults::list_patterns(),
            extract_concurrency: defaults::extract_concurrency(),
        }
    }
}

/// Link discovery and static fetch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Upper bound on discovered pages
    #[serde(default = "defaults::max_pages")]
    pub max_pages: usize,

    /// Maximum concurrent requests
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// URL regexes never crawled
    #[serde(default = "defaults::exclude_patterns")]
    pub exclude_patterns: Vec<String>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            max_pages: defaults::max_pages(),
            max_concurrent: defaults::max_concurrent(),
            exclude_patterns: defaults::exclude_patterns(),
        }
    }
}

/// Browser pass settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Per-navigation timeout in seconds
    #[serde(default = "defaults::navigation_timeout")]
    pub navigation_timeout_secs: u64,

    /// Whole-scan watchdog in seconds
    #[serde(default = "defaults::scan_timeout")]
    pub scan_timeout_secs: u64,

    /// Fixed settle delay for non-list pages
    #[serde(default = "defaults::settle_delay")]
    pub settle_delay_ms: u64,

    /// Pause after the forced reflow scroll
    #[serde(default = "defaults::reflow_wait")]
    pub reflow_wait_ms: u64,

    #[serde(default = "defaults::screenshot_attempts")]
    pub screenshot_attempts: u32,

    #[serde(default = "defaults::screenshot_retry_delay")]
    pub screenshot_retry_delay_ms: u64,

    /// Limit on a single screenshot attempt
    #[serde(default = "defaults::screenshot_timeout")]
    pub screenshot_timeout_secs: u64,

    /// PC screenshots wider than this are center-cropped
    #[serde(default = "defaults::screenshot_max_width")]
    pub screenshot_max_width: u32,

    /// Directory screenshots are written to
    #[serde(default = "defaults::output_dir")]
    pub output_dir: String,

    /// URL patterns blocked in every context (fonts)
    #[serde(default = "defaults::blocked_resources")]
    pub blocked_resources: Vec<String>,

    #[serde(default)]
    pub list_readiness: ListReadinessConfig,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            navigation_timeout_secs: defaults::navigation_timeout(),
            scan_timeout_secs: defaults::scan_timeout(),
            settle_delay_ms: defaults::settle_delay(),
            reflow_wait_ms: defaults::reflow_wait(),
            screenshot_attempts: defaults::screenshot_attempts(),
            screenshot_retry_delay_ms: defaults::screenshot_retry_delay(),
            screenshot_timeout_secs: defaults::screenshot_timeout(),
            screenshot_max_width: defaults::screenshot_max_width(),
            output_dir: defaults::output_dir(),
            blocked_resources: defaults::blocked_resources(),
            list_readiness: ListReadinessConfig::default(),
        }
    }
}

impl ScanConfig {
    /// Upper bound on one viewport pass: navigation, settling, the page
    /// checks, reflow and every screenshot attempt.
    pub fn pass_budget(&self) -> Duration {
        let readiness = &self.list_readiness;
        let settle_ms = self.settle_delay_ms.max(
            readiness.load_idle_timeout_ms
                + readiness.poll_interval_ms * u64::from(readiness.max_polls),
        );
        let screenshot_ms = u64::from(self.screenshot_attempts.max(1))
            * (self.screenshot_timeout_secs * 1_000 + self.screenshot_retry_delay_ms);
        // Navigation is counted twice: once for `goto`, once for the in-page checks
        Duration::from_millis(
            self.navigation_timeout_secs * 2_000
                + settle_ms
                + self.reflow_wait_ms * 2
                + screenshot_ms,
        )
    }
}

/// Content-settling policy for list pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListReadinessConfig {
    /// Wait for network idle before polling
    #[serde(default = "defaults::load_idle_timeout")]
    pub load_idle_timeout_ms: u64,

    #[serde(default = "defaults::poll_interval")]
    pub poll_interval_ms: u64,

    #[serde(default = "defaults::max_polls")]
    pub max_polls: u32,

    /// Item-like children a container needs before it counts as populated
    #[serde(default = "defaults::min_items")]
    pub min_items: u32,

    /// Known listing container selectors
    #[serde(default = "defaults::container_selectors")]
    pub container_selectors: Vec<String>,
}

impl Default for ListReadinessConfig {
    fn default() -> Self {
        Self {
            load_idle_timeout_ms: defaults::load_idle_timeout(),
            poll_interval_ms: defaults::poll_interval(),
            max_polls: defaults::max_polls(),
            min_items: defaults::min_items(),
            container_selectors: defaults::container_selectors(),
        }
    }
}

/// Check toggles and match lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecksConfig {
    #[serde(default = "defaults::enabled")]
    pub viewport_overflow: bool,
    #[serde(default = "defaults::enabled")]
    pub js_errors: bool,
    #[serde(default = "defaults::enabled")]
    pub broken_images: bool,
    #[serde(default = "defaults::enabled")]
    pub error_text: bool,
    #[serde(default = "defaults::enabled")]
    pub request_id: bool,
    #[serde(default = "defaults::enabled")]
    pub screenshots: bool,
    #[serde(default = "defaults::enabled")]
    pub screenshot_quality: bool,

    /// Console error substrings that are never reported
    #[serde(default = "defaults::console_noise")]
    pub console_noise: Vec<String>,

    /// Visible-text phrases that mark an error page
    #[serde(default = "defaults::error_phrases")]
    pub error_phrases: Vec<String>,
}

impl Default for ChecksConfig {
    fn default() -> Self {
        Self {
            viewport_overflow: true,
            js_errors: true,
            broken_images: true,
            error_text: true,
            request_id: true,
            screenshots: true,
            screenshot_quality: true,
            console_noise: defaults::console_noise(),
            error_phrases: defaults::error_phrases(),
        }
    }
}

/// Blank-render thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityConfig {
    /// Every channel above this counts as near-white
    #[serde(default = "defaults::white_threshold")]
    pub white_threshold: u8,

    #[serde(default = "defaults::all_white_percent")]
    pub all_white_percent: f64,

    #[serde(default = "defaults::mostly_white_percent")]
    pub mostly_white_percent: f64,

    /// Share of pixels matching the mean color for a uniform render
    #[serde(default = "defaults::blank_percent")]
    pub blank_percent: f64,

    /// Longest side after downsampling
    #[serde(default = "defaults::sample_size")]
    pub sample_size: u32,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            white_threshold: defaults::white_threshold(),
            all_white_percent: defaults::all_white_percent(),
            mostly_white_percent: defaults::mostly_white_percent(),
            blank_percent: defaults::blank_percent(),
            sample_size: defaults::sample_size(),
        }
    }
}

mod defaults {
    use crate::models::{ViewportMode, ViewportName};

    pub fn enabled() -> bool {
        true
    }

    // Classifier defaults
    pub fn similarity_threshold() -> f64 {
        0.75
    }
    pub fn max_per_category() -> usize {
        3
    }
    pub fn min_typed_pages() -> usize {
        3
    }
    pub fn extract_concurrency() -> usize {
        8
    }
    pub fn detail_patterns() -> Vec<String> {
        vec![
            r"/(detail|details|item|items|product|products|article|articles|post|posts|view)/[^/]+".into(),
            r"/\d{3,}(\.html?)?/?$".into(),
            r"[?&](id|no|idx|seq|article_?no)=\w+".into(),
        ]
    }
    pub fn list_patterns() -> Vec<String> {
        vec![
            r"/(list|lists|category|categories|search|tag|tags|archive|archives)(/|$|\?)".into(),
            r"/page/\d+".into(),
            r"[?&](page|p|category|cat|sort)=".into(),
        ]
    }

    // Crawler defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; sitescan/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn max_pages() -> usize {
        200
    }
    pub fn max_concurrent() -> usize {
        5
    }
    pub fn exclude_patterns() -> Vec<String> {
        vec![
            r"/(login|logout|signin|signup|register|cart|checkout)(/|$|\?)".into(),
            r"/wp-admin/".into(),
            r"^mailto:".into(),
            r"^tel:".into(),
            r"^javascript:".into(),
        ]
    }

    // Scan defaults
    pub fn navigation_timeout() -> u64 {
        30
    }
    pub fn scan_timeout() -> u64 {
        15 * 60
    }
    pub fn settle_delay() -> u64 {
        2_000
    }
    pub fn reflow_wait() -> u64 {
        500
    }
    pub fn screenshot_attempts() -> u32 {
        3
    }
    pub fn screenshot_retry_delay() -> u64 {
        1_000
    }
    pub fn screenshot_timeout() -> u64 {
        30
    }
    pub fn screenshot_max_width() -> u32 {
        1440
    }
    pub fn output_dir() -> String {
        "screenshots".into()
    }
    pub fn blocked_resources() -> Vec<String> {
        vec![
            "*.woff".into(),
            "*.woff2".into(),
            "*.ttf".into(),
            "*.otf".into(),
            "*.eot".into(),
            "*fonts.googleapis.com*".into(),
            "*fonts.gstatic.com*".into(),
        ]
    }

    // List readiness defaults
    pub fn load_idle_timeout() -> u64 {
        10_000
    }
    pub fn poll_interval() -> u64 {
        500
    }
    pub fn max_polls() -> u32 {
        10
    }
    pub fn min_items() -> u32 {
        3
    }
    pub fn container_selectors() -> Vec<String> {
        vec![
            "ul.list".into(),
            ".list".into(),
            ".item-list".into(),
            ".product-list".into(),
            ".goods-list".into(),
            ".card-list".into(),
            ".grid".into(),
            "[class*='list']".into(),
            "table tbody".into(),
            "main ul".into(),
        ]
    }

    // Check defaults
    pub fn console_noise() -> Vec<String> {
        vec![
            "favicon.ico".into(),
            "ResizeObserver loop".into(),
            "net::ERR_BLOCKED_BY_CLIENT".into(),
            "net::ERR_FAILED".into(),
            "googletagmanager".into(),
            "google-analytics".into(),
            "doubleclick.net".into(),
            "third-party cookie".into(),
            "Download the React DevTools".into(),
            ".woff".into(),
            ".ttf".into(),
        ]
    }
    pub fn error_phrases() -> Vec<String> {
        vec![
            "404 Not Found".into(),
            "Page Not Found".into(),
            "500 Internal Server Error".into(),
            "Internal Server Error".into(),
            "502 Bad Gateway".into(),
            "503 Service Unavailable".into(),
            "504 Gateway Timeout".into(),
            "Application error".into(),
            "Something went wrong".into(),
            "This page isn't working".into(),
            "Access Denied".into(),
        ]
    }

    // Quality defaults
    pub fn white_threshold() -> u8 {
        245
    }
    pub fn all_white_percent() -> f64 {
        98.0
    }
    pub fn mostly_white_percent() -> f64 {
        90.0
    }
    pub fn blank_percent() -> f64 {
        99.0
    }
    pub fn sample_size() -> u32 {
        200
    }

    pub fn viewports() -> Vec<ViewportMode> {
        ViewportName::ALL
            .iter()
            .map(|name| ViewportMode::preset(*name))
            .collect()
    }
}
