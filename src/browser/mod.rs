//! Browser automation driver boundary.
//!
//! The scanner only talks to these traits. A concrete backend lives behind a
//! feature flag:
//!
//! - `chromium`: headless Chromium over CDP (`ChromiumDriver`)
//!
//! Every scan pass opens its own `BrowserContext`, so cookies, storage and
//! emulation settings never leak between viewports.

#[cfg(feature = "chromium")]
pub mod chromium;
#[cfg(test)]
pub mod fake;

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::error::Result;
use crate::models::ViewportMode;

#[cfg(feature = "chromium")]
pub use chromium::ChromiumDriver;

/// Options for a fresh, isolated browser context.
#[derive(Debug, Clone)]
pub struct ContextOptions {
    /// Viewport size, device flags and user agent
    pub viewport: ViewportMode,
    /// URL glob patterns whose requests are aborted
    pub blocked_urls: Vec<String>,
}

/// Lifecycle point a navigation or wait resolves on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitUntil {
    DomContentLoaded,
    Load,
    NetworkIdle,
}

/// Navigation options.
#[derive(Debug, Clone)]
pub struct GotoOptions {
    pub wait_until: WaitUntil,
    pub timeout: Duration,
}

/// Main-document response of a navigation.
#[derive(Debug, Clone, Default)]
pub struct NavigationResponse {
    pub status: Option<u16>,
}

/// Screenshot options.
#[derive(Debug, Clone)]
pub struct ScreenshotOptions {
    pub full_page: bool,
}

impl Default for ScreenshotOptions {
    fn default() -> Self {
        Self { full_page: true }
    }
}

/// Console message severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleLevel {
    Debug,
    Log,
    Info,
    Warning,
    Error,
}

/// A console message or uncaught exception observed on a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleMessage {
    pub level: ConsoleLevel,
    pub text: String,
}

impl ConsoleMessage {
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: ConsoleLevel::Error,
            text: text.into(),
        }
    }
}

/// A launched browser.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Open an isolated context configured for one viewport pass.
    async fn new_context(&self, options: &ContextOptions) -> Result<Box<dyn BrowserContext>>;

    /// Close the browser and everything opened through it.
    async fn close(&self) -> Result<()>;
}

/// An isolated browsing context.
#[async_trait]
pub trait BrowserContext: Send + Sync {
    async fn new_page(&self) -> Result<Box<dyn BrowserPage>>;

    async fn close(&self) -> Result<()>;
}

/// A single tab.
#[async_trait]
pub trait BrowserPage: Send + Sync {
    /// Navigate and return the main-document response.
    async fn goto(&self, url: &str, options: &GotoOptions) -> Result<NavigationResponse>;

    /// Wait until the page reaches `state`, or fail with a timeout.
    async fn wait_for_load_state(&self, state: WaitUntil, timeout: Duration) -> Result<()>;

    /// Evaluate a script and return its JSON result.
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value>;

    /// Write a PNG screenshot to `path`.
    async fn screenshot(&self, path: &Path, options: &ScreenshotOptions) -> Result<()>;

    /// Console messages and uncaught exceptions collected since the page opened.
    async fn console_messages(&self) -> Vec<ConsoleMessage>;

    async fn close(&self) -> Result<()>;
}

/// Evaluate a script and deserialize its result.
pub async fn evaluate_as<T: DeserializeOwned>(page: &dyn BrowserPage, script: &str) -> Result<T> {
    let value = page.evaluate(script).await?;
    Ok(serde_json::from_value(value)?)
}
