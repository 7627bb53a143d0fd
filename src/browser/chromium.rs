//! Headless Chromium backend over the DevTools protocol.
//!
//! Each `ChromiumContext` maps to a CDP browser context, so cookies and
//! storage are dropped when a pass ends. Emulation is per target and is
//! applied to every tab the context opens.

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::{
    SetDeviceMetricsOverrideParams, SetTouchEmulationEnabledParams, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventResponseReceived, ResourceType, SetBlockedUrLsParams,
};
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, EventLifecycleEvent, SetLifecycleEventsEnabledParams,
};
use chromiumoxide::cdp::browser_protocol::target::{
    BrowserContextId, CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::cdp::js_protocol::runtime::{
    ConsoleApiCalledType, EvaluateParams, EventConsoleApiCalled, EventExceptionThrown,
};
use chromiumoxide::error::CdpError;
use chromiumoxide::page::ScreenshotParams;
use futures::StreamExt;
use tokio::task::JoinHandle;

use crate::browser::{
    BrowserContext, BrowserDriver, BrowserPage, ConsoleLevel, ConsoleMessage, ContextOptions,
    GotoOptions, NavigationResponse, ScreenshotOptions, WaitUntil,
};
use crate::error::{AppError, Result};
use crate::models::ViewportMode;

const LOAD_STATE_POLL: Duration = Duration::from_millis(100);

fn cdp(e: CdpError) -> AppError {
    AppError::browser(e.to_string())
}

/// Browser process plus the task pumping its CDP handler.
pub struct ChromiumDriver {
    browser: Arc<tokio::sync::Mutex<Browser>>,
    handler: JoinHandle<()>,
    closed: AtomicBool,
}

impl ChromiumDriver {
    /// Launch a headless Chromium.
    pub async fn launch() -> Result<Self> {
        let config = BrowserConfig::builder()
            .no_sandbox()
            .build()
            .map_err(AppError::browser)?;
        let (browser, mut handler) = Browser::launch(config).await.map_err(cdp)?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    log::debug!("CDP handler stopped: {}", e);
                    break;
                }
            }
        });

        log::info!("Launched headless Chromium");
        Ok(Self {
            browser: Arc::new(tokio::sync::Mutex::new(browser)),
            handler,
            closed: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl BrowserDriver for ChromiumDriver {
    async fn new_context(&self, options: &ContextOptions) -> Result<Box<dyn BrowserContext>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(AppError::browser("browser already closed"));
        }

        let id = {
            let browser = self.browser.lock().await;
            browser
                .execute(CreateBrowserContextParams::default())
                .await
                .map_err(cdp)?
                .result
                .browser_context_id
        };

        Ok(Box::new(ChromiumContext {
            browser: Arc::clone(&self.browser),
            id,
            options: options.clone(),
        }))
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let mut browser = self.browser.lock().await;
        let result = browser.close().await;
        if let Err(e) = browser.wait().await {
            log::debug!("Chromium exit: {}", e);
        }
        self.handler.abort();
        result.map(|_| ()).map_err(cdp)
    }
}

struct ChromiumContext {
    browser: Arc<tokio::sync::Mutex<Browser>>,
    id: BrowserContextId,
    options: ContextOptions,
}

impl ChromiumContext {
    async fn emulate(&self, page: &Page) -> Result<()> {
        let mode = &self.options.viewport;
        page.execute(device_metrics(mode)?)
            .await
            .map_err(cdp)?;
        page.execute(SetTouchEmulationEnabledParams::new(mode.has_touch))
            .await
            .map_err(cdp)?;
        page.execute(SetUserAgentOverrideParams::new(mode.user_agent.clone()))
            .await
            .map_err(cdp)?;

        page.execute(EnableParams::default()).await.map_err(cdp)?;
        if !self.options.blocked_urls.is_empty() {
            page.execute(SetBlockedUrLsParams::new(self.options.blocked_urls.clone()))
                .await
                .map_err(cdp)?;
        }
        page.execute(SetLifecycleEventsEnabledParams::new(true))
            .await
            .map_err(cdp)?;
        Ok(())
    }
}

#[async_trait]
impl BrowserContext for ChromiumContext {
    async fn new_page(&self) -> Result<Box<dyn BrowserPage>> {
        let params = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(self.id.clone())
            .build()
            .map_err(AppError::browser)?;

        let page = {
            let browser = self.browser.lock().await;
            browser.new_page(params).await.map_err(cdp)?
        };
        self.emulate(&page).await?;

        let state = Arc::new(PageState::default());
        let listeners = spawn_listeners(&page, Arc::clone(&state)).await?;

        Ok(Box::new(ChromiumPage {
            page,
            state,
            listeners,
        }))
    }

    async fn close(&self) -> Result<()> {
        let browser = self.browser.lock().await;
        browser
            .execute(DisposeBrowserContextParams::new(self.id.clone()))
            .await
            .map_err(cdp)?;
        Ok(())
    }
}

/// Event-derived state shared with the listener tasks.
#[derive(Default)]
struct PageState {
    console: Mutex<Vec<ConsoleMessage>>,
    document_status: Mutex<Option<u16>>,
    lifecycle: Mutex<HashSet<String>>,
}

impl PageState {
    fn reset_navigation(&self) {
        if let Ok(mut status) = self.document_status.lock() {
            *status = None;
        }
        if let Ok(mut lifecycle) = self.lifecycle.lock() {
            lifecycle.clear();
        }
    }

    fn reached(&self, event: &str) -> bool {
        self.lifecycle
            .lock()
            .map(|l| l.contains(event))
            .unwrap_or(false)
    }
}

async fn spawn_listeners(page: &Page, state: Arc<PageState>) -> Result<Vec<JoinHandle<()>>> {
    let mut console = page
        .event_listener::<EventConsoleApiCalled>()
        .await
        .map_err(cdp)?;
    let mut exceptions = page
        .event_listener::<EventExceptionThrown>()
        .await
        .map_err(cdp)?;
    let mut responses = page
        .event_listener::<EventResponseReceived>()
        .await
        .map_err(cdp)?;
    let mut lifecycle = page
        .event_listener::<EventLifecycleEvent>()
        .await
        .map_err(cdp)?;

    let console_state = Arc::clone(&state);
    let console_task = tokio::spawn(async move {
        loop {
            let message = tokio::select! {
                Some(event) = console.next() => console_message(&event),
                Some(event) = exceptions.next() => {
                    let details = &event.exception_details;
                    let text = details
                        .exception
                        .as_ref()
                        .and_then(|e| e.description.clone())
                        .unwrap_or_else(|| details.text.clone());
                    ConsoleMessage::error(text)
                }
                else => break,
            };
            if let Ok(mut messages) = console_state.console.lock() {
                messages.push(message);
            }
        }
    });

    let response_state = Arc::clone(&state);
    let response_task = tokio::spawn(async move {
        while let Some(event) = responses.next().await {
            if event.r#type != ResourceType::Document {
                continue;
            }
            if let Ok(mut status) = response_state.document_status.lock() {
                if status.is_none() {
                    *status = Some(event.response.status as u16);
                }
            }
        }
    });

    let lifecycle_task = tokio::spawn(async move {
        while let Some(event) = lifecycle.next().await {
            if let Ok(mut reached) = state.lifecycle.lock() {
                if event.name == "init" {
                    reached.clear();
                }
                reached.insert(event.name.clone());
            }
        }
    });

    Ok(vec![console_task, response_task, lifecycle_task])
}

fn console_message(event: &EventConsoleApiCalled) -> ConsoleMessage {
    let level = match event.r#type {
        ConsoleApiCalledType::Error | ConsoleApiCalledType::Assert => ConsoleLevel::Error,
        ConsoleApiCalledType::Warning => ConsoleLevel::Warning,
        ConsoleApiCalledType::Info => ConsoleLevel::Info,
        ConsoleApiCalledType::Debug => ConsoleLevel::Debug,
        _ => ConsoleLevel::Log,
    };
    let text = event
        .args
        .iter()
        .map(|arg| match (&arg.value, &arg.description) {
            (Some(serde_json::Value::String(s)), _) => s.clone(),
            (Some(value), _) => value.to_string(),
            (None, Some(description)) => description.clone(),
            (None, None) => String::new(),
        })
        .collect::<Vec<_>>()
        .join(" ");
    ConsoleMessage { level, text }
}

fn device_metrics(mode: &ViewportMode) -> Result<SetDeviceMetricsOverrideParams> {
    SetDeviceMetricsOverrideParams::builder()
        .width(mode.width as i64)
        .height(mode.height as i64)
        .device_scale_factor(mode.device_scale_factor)
        .mobile(mode.is_mobile)
        .build()
        .map_err(AppError::browser)
}

fn lifecycle_event(state: WaitUntil) -> &'static str {
    match state {
        WaitUntil::DomContentLoaded => "DOMContentLoaded",
        WaitUntil::Load => "load",
        WaitUntil::NetworkIdle => "networkIdle",
    }
}

struct ChromiumPage {
    page: Page,
    state: Arc<PageState>,
    listeners: Vec<JoinHandle<()>>,
}

#[async_trait]
impl BrowserPage for ChromiumPage {
    async fn goto(&self, url: &str, options: &GotoOptions) -> Result<NavigationResponse> {
        self.state.reset_navigation();

        // `Page::goto` resolves on the load event
        match tokio::time::timeout(options.timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(AppError::navigation(url, e.to_string())),
            Err(_) => return Err(AppError::Timeout(options.timeout.as_millis() as u64)),
        }
        if options.wait_until == WaitUntil::NetworkIdle {
            self.wait_for_load_state(WaitUntil::NetworkIdle, options.timeout)
                .await?;
        }

        let status = self.state.document_status.lock().ok().and_then(|s| *s);
        Ok(NavigationResponse { status })
    }

    async fn wait_for_load_state(&self, state: WaitUntil, timeout: Duration) -> Result<()> {
        let event = lifecycle_event(state);
        let wait = async {
            while !self.state.reached(event) {
                tokio::time::sleep(LOAD_STATE_POLL).await;
            }
        };
        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| AppError::Timeout(timeout.as_millis() as u64))
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value> {
        let params = EvaluateParams::builder()
            .expression(script)
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(AppError::browser)?;
        let result = self.page.evaluate_expression(params).await.map_err(cdp)?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn screenshot(&self, path: &Path, options: &ScreenshotOptions) -> Result<()> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(options.full_page)
            .build();
        self.page
            .save_screenshot(params, path)
            .await
            .map_err(cdp)?;
        Ok(())
    }

    async fn console_messages(&self) -> Vec<ConsoleMessage> {
        self.state
            .console
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    async fn close(&self) -> Result<()> {
        for listener in &self.listeners {
            listener.abort();
        }
        self.page.clone().close().await.map_err(cdp)
    }
}
