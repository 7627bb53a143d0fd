//! Scriptable in-memory driver used by the scanner tests.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::{Rgb, RgbImage};
use serde_json::{Value, json};

use crate::browser::{
    BrowserContext, BrowserDriver, BrowserPage, ConsoleMessage, ContextOptions, GotoOptions,
    NavigationResponse, ScreenshotOptions, WaitUntil,
};
use crate::error::{AppError, Result};
use crate::models::{ViewportMode, ViewportName};
use crate::services::fingerprint::FINGERPRINT_SCRIPT;
use crate::services::scan::scripts;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NavBehavior {
    #[default]
    Ok,
    Fail,
    Hang,
}

/// What a page does when the scanner pokes at it.
#[derive(Debug, Clone)]
pub struct FakePage {
    pub status: Option<u16>,
    pub navigation: NavBehavior,
    pub load_idle: bool,
    pub fingerprint: Option<Value>,
    /// `None` renders exactly as wide as the viewport
    pub scroll_width: Option<u32>,
    pub broken_images: Vec<String>,
    pub request_id: Option<String>,
    pub body_text: String,
    pub console: Vec<ConsoleMessage>,
    /// Readiness polls before the list container fills; `None` never fills
    pub list_ready_after: Option<u32>,
    pub screenshot_failures: u32,
    /// Screenshot calls never resolve
    pub screenshot_hang: bool,
    /// In-page scripts never resolve
    pub evaluate_hang: bool,
    pub screenshot_color: [u8; 3],
    pub screenshot_height: u32,
}

impl Default for FakePage {
    fn default() -> Self {
        Self {
            status: Some(200),
            navigation: NavBehavior::Ok,
            load_idle: true,
            fingerprint: None,
            scroll_width: None,
            broken_images: Vec::new(),
            request_id: None,
            body_text: "Welcome".to_string(),
            console: Vec::new(),
            list_ready_after: Some(0),
            screenshot_failures: 0,
            screenshot_hang: false,
            evaluate_hang: false,
            screenshot_color: [90, 120, 200],
            screenshot_height: 40,
        }
    }
}

impl FakePage {
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn failing_navigation(mut self) -> Self {
        self.navigation = NavBehavior::Fail;
        self
    }

    pub fn hanging_navigation(mut self) -> Self {
        self.navigation = NavBehavior::Hang;
        self
    }

    pub fn without_load_idle(mut self) -> Self {
        self.load_idle = false;
        self
    }

    pub fn with_fingerprint(mut self, value: Value) -> Self {
        self.fingerprint = Some(value);
        self
    }

    pub fn with_scroll_width(mut self, width: u32) -> Self {
        self.scroll_width = Some(width);
        self
    }

    pub fn with_broken_images(mut self, srcs: &[&str]) -> Self {
        self.broken_images = srcs.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_request_id(mut self, id: &str) -> Self {
        self.request_id = Some(id.to_string());
        self
    }

    pub fn with_body_text(mut self, text: &str) -> Self {
        self.body_text = text.to_string();
        self
    }

    pub fn with_console(mut self, messages: Vec<ConsoleMessage>) -> Self {
        self.console = messages;
        self
    }

    pub fn list_ready_after(mut self, polls: u32) -> Self {
        self.list_ready_after = Some(polls);
        self
    }

    pub fn list_never_ready(mut self) -> Self {
        self.list_ready_after = None;
        self
    }

    pub fn failing_screenshots(mut self, attempts: u32) -> Self {
        self.screenshot_failures = attempts;
        self
    }

    pub fn hanging_screenshots(mut self) -> Self {
        self.screenshot_hang = true;
        self
    }

    pub fn hanging_evaluate(mut self) -> Self {
        self.evaluate_hang = true;
        self
    }

    pub fn with_screenshot_color(mut self, color: [u8; 3]) -> Self {
        self.screenshot_color = color;
        self
    }
}

#[derive(Default)]
struct FakeState {
    contexts_opened: AtomicUsize,
    contexts_closed: AtomicUsize,
    pages_closed: AtomicUsize,
    screenshot_attempts: AtomicUsize,
    closed: AtomicBool,
    visits: Mutex<Vec<(ViewportName, String)>>,
    contexts: Mutex<Vec<ContextOptions>>,
}

struct Shared {
    default: FakePage,
    by_viewport: HashMap<ViewportName, FakePage>,
    by_url: HashMap<String, FakePage>,
    state: FakeState,
}

impl Shared {
    fn resolve(&self, url: &str, viewport: ViewportName) -> FakePage {
        self.by_url
            .get(url)
            .or_else(|| self.by_viewport.get(&viewport))
            .unwrap_or(&self.default)
            .clone()
    }
}

/// Driver whose pages follow `FakePage` scripts.
pub struct FakeDriver {
    shared: Arc<Shared>,
}

impl FakeDriver {
    pub fn new(default: FakePage) -> Self {
        Self::build(default, HashMap::new(), HashMap::new())
    }

    /// Override the page script for one viewport.
    pub fn with_viewport(self, viewport: ViewportName, page: FakePage) -> Self {
        let mut by_viewport = self.shared.by_viewport.clone();
        by_viewport.insert(viewport, page);
        Self::build(self.shared.default.clone(), by_viewport, self.shared.by_url.clone())
    }

    /// Override the page script for one URL, whatever the viewport.
    pub fn with_url(self, url: &str, page: FakePage) -> Self {
        let mut by_url = self.shared.by_url.clone();
        by_url.insert(url.to_string(), page);
        Self::build(self.shared.default.clone(), self.shared.by_viewport.clone(), by_url)
    }

    fn build(
        default: FakePage,
        by_viewport: HashMap<ViewportName, FakePage>,
        by_url: HashMap<String, FakePage>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                default,
                by_viewport,
                by_url,
                state: FakeState::default(),
            }),
        }
    }

    pub fn contexts_opened(&self) -> usize {
        self.shared.state.contexts_opened.load(Ordering::SeqCst)
    }

    pub fn contexts_closed(&self) -> usize {
        self.shared.state.contexts_closed.load(Ordering::SeqCst)
    }

    pub fn pages_closed(&self) -> usize {
        self.shared.state.pages_closed.load(Ordering::SeqCst)
    }

    pub fn screenshot_attempts(&self) -> usize {
        self.shared.state.screenshot_attempts.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.shared.state.closed.load(Ordering::SeqCst)
    }

    pub fn visits(&self) -> Vec<(ViewportName, String)> {
        self.shared.state.visits.lock().unwrap().clone()
    }

    pub fn context_options(&self) -> Vec<ContextOptions> {
        self.shared.state.contexts.lock().unwrap().clone()
    }
}

#[async_trait]
impl BrowserDriver for FakeDriver {
    async fn new_context(&self, options: &ContextOptions) -> Result<Box<dyn BrowserContext>> {
        if self.is_closed() {
            return Err(AppError::browser("browser has been closed"));
        }
        self.shared.state.contexts_opened.fetch_add(1, Ordering::SeqCst);
        self.shared.state.contexts.lock().unwrap().push(options.clone());
        Ok(Box::new(FakeContext {
            shared: Arc::clone(&self.shared),
            viewport: options.viewport.clone(),
        }))
    }

    async fn close(&self) -> Result<()> {
        self.shared.state.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

struct FakeContext {
    shared: Arc<Shared>,
    viewport: ViewportMode,
}

#[async_trait]
impl BrowserContext for FakeContext {
    async fn new_page(&self) -> Result<Box<dyn BrowserPage>> {
        Ok(Box::new(FakeTab {
            shared: Arc::clone(&self.shared),
            viewport: self.viewport.clone(),
            script: Mutex::new(self.shared.default.clone()),
            polls: AtomicU32::new(0),
            screenshots: AtomicU32::new(0),
        }))
    }

    async fn close(&self) -> Result<()> {
        self.shared.state.contexts_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct FakeTab {
    shared: Arc<Shared>,
    viewport: ViewportMode,
    script: Mutex<FakePage>,
    polls: AtomicU32,
    screenshots: AtomicU32,
}

impl FakeTab {
    fn script(&self) -> FakePage {
        self.script.lock().unwrap().clone()
    }
}

#[async_trait]
impl BrowserPage for FakeTab {
    async fn goto(&self, url: &str, _options: &GotoOptions) -> Result<NavigationResponse> {
        let script = self.shared.resolve(url, self.viewport.name);
        *self.script.lock().unwrap() = script.clone();
        self.shared
            .state
            .visits
            .lock()
            .unwrap()
            .push((self.viewport.name, url.to_string()));

        match script.navigation {
            NavBehavior::Ok => {
                tokio::time::sleep(Duration::from_millis(120)).await;
                Ok(NavigationResponse {
                    status: script.status,
                })
            }
            NavBehavior::Fail => Err(AppError::navigation(url, "net::ERR_CONNECTION_REFUSED")),
            NavBehavior::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }

    async fn wait_for_load_state(&self, _state: WaitUntil, timeout: Duration) -> Result<()> {
        if self.script().load_idle {
            Ok(())
        } else {
            tokio::time::sleep(timeout).await;
            Err(AppError::Timeout(timeout.as_millis() as u64))
        }
    }

    async fn evaluate(&self, script: &str) -> Result<Value> {
        let page = self.script();
        if page.evaluate_hang {
            std::future::pending::<()>().await;
        }
        let value = if script == FINGERPRINT_SCRIPT {
            page.fingerprint.unwrap_or(Value::Null)
        } else if script == scripts::VIEWPORT_METRICS {
            json!({
                "scrollWidth": page.scroll_width.unwrap_or(self.viewport.width),
                "innerWidth": self.viewport.width,
            })
        } else if script == scripts::BROKEN_IMAGES {
            json!(page.broken_images)
        } else if script == scripts::REQUEST_ID {
            json!(page.request_id)
        } else if script == scripts::VISIBLE_TEXT {
            json!(page.body_text)
        } else if script.contains(scripts::COUNT_LIST_ITEMS_FN) {
            let poll = self.polls.fetch_add(1, Ordering::SeqCst);
            match page.list_ready_after {
                Some(after) if poll >= after => json!(12),
                _ => json!(1),
            }
        } else {
            Value::Null
        };
        Ok(value)
    }

    async fn screenshot(&self, path: &Path, _options: &ScreenshotOptions) -> Result<()> {
        self.shared
            .state
            .screenshot_attempts
            .fetch_add(1, Ordering::SeqCst);
        let page = self.script();
        if page.screenshot_hang {
            std::future::pending::<()>().await;
        }
        let attempt = self.screenshots.fetch_add(1, Ordering::SeqCst);
        if attempt < page.screenshot_failures {
            return Err(AppError::browser("capture failed: target crashed"));
        }

        let image = RgbImage::from_pixel(
            self.viewport.width,
            page.screenshot_height,
            Rgb(page.screenshot_color),
        );
        image.save(path)?;
        Ok(())
    }

    async fn console_messages(&self) -> Vec<ConsoleMessage> {
        self.script().console
    }

    async fn close(&self) -> Result<()> {
        self.shared.state.pages_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
