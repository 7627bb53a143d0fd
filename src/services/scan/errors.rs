// src/services/scan/errors.rs

//! Script, asset and error-page detection for non-spider passes.

use std::collections::HashSet;

use serde_json::json;

use crate::browser::{BrowserPage, ConsoleLevel, evaluate_as};
use crate::models::{ChecksConfig, Issue, IssueType, ViewportName};
use crate::services::scan::scripts;
use crate::utils::text::{collapse_whitespace, truncate};

/// Longest message kept from a console error.
const MAX_MESSAGE_GRAPHEMES: usize = 300;
/// Console errors reported per pass; the rest are only counted in the log.
const MAX_JS_ERRORS: usize = 10;

/// Finds console errors, broken images, request ids and error-page text.
#[derive(Debug, Clone)]
pub struct ErrorDetector {
    js_errors: bool,
    broken_images: bool,
    error_text: bool,
    request_id: bool,
    console_noise: Vec<String>,
    error_phrases: Vec<String>,
}

impl ErrorDetector {
    pub fn new(checks: &ChecksConfig) -> Self {
        Self {
            js_errors: checks.js_errors,
            broken_images: checks.broken_images,
            error_text: checks.error_text,
            request_id: checks.request_id,
            console_noise: checks.console_noise.iter().map(|n| n.to_lowercase()).collect(),
            error_phrases: checks.error_phrases.clone(),
        }
    }

    /// Request identifier the server embedded in the page, if any.
    pub async fn request_id(&self, page: &dyn BrowserPage) -> Option<String> {
        if !self.request_id {
            return None;
        }
        match evaluate_as::<Option<String>>(page, scripts::REQUEST_ID).await {
            Ok(id) => id.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
            Err(e) => {
                log::debug!("Request id lookup failed: {}", e);
                None
            }
        }
    }

    /// Run every enabled check. `request_id` is the value already looked up
    /// for this pass.
    pub async fn detect(
        &self,
        page: &dyn BrowserPage,
        viewport: ViewportName,
        request_id: Option<&str>,
    ) -> Vec<Issue> {
        let mut issues = Vec::new();

        if self.js_errors {
            issues.extend(self.console_errors(page, viewport).await);
        }
        if self.broken_images {
            issues.extend(self.broken_images(page, viewport).await);
        }
        if let Some(id) = request_id {
            issues.push(
                Issue::info(IssueType::RequestId, viewport, format!("Request id: {id}"))
                    .with_detail(json!({ "requestId": id })),
            );
        }
        if self.error_text {
            issues.extend(self.error_text(page, viewport).await);
        }

        issues
    }

    fn is_noise(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.console_noise.iter().any(|n| lower.contains(n))
    }

    async fn console_errors(&self, page: &dyn BrowserPage, viewport: ViewportName) -> Vec<Issue> {
        let mut seen = HashSet::new();
        let errors: Vec<String> = page
            .console_messages()
            .await
            .into_iter()
            .filter(|m| m.level == ConsoleLevel::Error && !self.is_noise(&m.text))
            .map(|m| collapse_whitespace(&m.text))
            .filter(|text| seen.insert(text.clone()))
            .collect();

        if errors.len() > MAX_JS_ERRORS {
            log::debug!(
                "{}: {} console errors, reporting the first {}",
                viewport,
                errors.len(),
                MAX_JS_ERRORS
            );
        }

        errors
            .into_iter()
            .take(MAX_JS_ERRORS)
            .map(|text| {
                Issue::warning(
                    IssueType::JsError,
                    viewport,
                    format!("JavaScript error: {}", truncate(&text, MAX_MESSAGE_GRAPHEMES)),
                )
            })
            .collect()
    }

    async fn broken_images(&self, page: &dyn BrowserPage, viewport: ViewportName) -> Vec<Issue> {
        let srcs: Vec<String> = match evaluate_as(page, scripts::BROKEN_IMAGES).await {
            Ok(srcs) => srcs,
            Err(e) => {
                log::debug!("Broken image check failed: {}", e);
                return Vec::new();
            }
        };

        let mut seen = HashSet::new();
        srcs.into_iter()
            .filter(|src| seen.insert(src.clone()))
            .map(|src| {
                Issue::warning(
                    IssueType::BrokenImage,
                    viewport,
                    format!("Image failed to load: {}", truncate(&src, MAX_MESSAGE_GRAPHEMES)),
                )
                .with_detail(json!({ "src": src }))
            })
            .collect()
    }

    async fn error_text(&self, page: &dyn BrowserPage, viewport: ViewportName) -> Option<Issue> {
        let text: String = match evaluate_as(page, scripts::VISIBLE_TEXT).await {
            Ok(text) => text,
            Err(e) => {
                log::debug!("Visible text check failed: {}", e);
                return None;
            }
        };
        let haystack = text.to_lowercase();

        self.error_phrases
            .iter()
            .find(|phrase| haystack.contains(&phrase.to_lowercase()))
            .map(|phrase| {
                Issue::error(
                    IssueType::ErrorText,
                    viewport,
                    format!("Page shows error text \"{phrase}\""),
                )
                .with_detail(json!({ "phrase": phrase }))
            })
    }
}
