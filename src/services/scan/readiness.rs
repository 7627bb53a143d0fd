// src/services/scan/readiness.rs

//! Content-readiness policies applied after navigation.
//!
//! - `ListReadiness`: waits for network idle, then polls until a listing
//!   container holds enough items
//! - `FixedDelay`: sleeps for the configured settle delay

use std::time::Duration;

use async_trait::async_trait;

use crate::browser::{BrowserPage, WaitUntil, evaluate_as};
use crate::models::{ListReadinessConfig, PageType, ScanConfig};
use crate::services::scan::scripts;

/// Outcome of a readiness wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    /// Content never settled; carries a human-readable reason
    NotReady(String),
}

/// Decides when a freshly navigated page is ready to be checked.
#[async_trait]
pub trait ContentReadiness: Send + Sync {
    async fn wait(&self, page: &dyn BrowserPage) -> Readiness;
}

/// Fixed settle delay.
#[derive(Debug, Clone)]
pub struct FixedDelay {
    delay: Duration,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl ContentReadiness for FixedDelay {
    async fn wait(&self, _page: &dyn BrowserPage) -> Readiness {
        tokio::time::sleep(self.delay).await;
        Readiness::Ready
    }
}

/// Bounded polling for a filled listing container.
#[derive(Debug, Clone)]
pub struct ListReadiness {
    load_idle_timeout: Duration,
    poll_interval: Duration,
    max_polls: u32,
    min_items: u32,
    count_script: String,
}

impl ListReadiness {
    pub fn new(config: &ListReadinessConfig) -> Self {
        Self {
            load_idle_timeout: Duration::from_millis(config.load_idle_timeout_ms),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            max_polls: config.max_polls,
            min_items: config.min_items,
            count_script: scripts::count_list_items(&config.container_selectors),
        }
    }
}

#[async_trait]
impl ContentReadiness for ListReadiness {
    async fn wait(&self, page: &dyn BrowserPage) -> Readiness {
        if let Err(e) = page
            .wait_for_load_state(WaitUntil::NetworkIdle, self.load_idle_timeout)
            .await
        {
            log::debug!("Network never went idle, polling anyway: {}", e);
        }

        let mut best = 0;
        for poll in 0..self.max_polls {
            match evaluate_as::<u32>(page, &self.count_script).await {
                Ok(count) if count >= self.min_items => {
                    log::debug!("List ready with {} item(s) after {} poll(s)", count, poll + 1);
                    return Readiness::Ready;
                }
                Ok(count) => best = best.max(count),
                Err(e) => log::debug!("List item count failed: {}", e),
            }
            if poll + 1 < self.max_polls {
                tokio::time::sleep(self.poll_interval).await;
            }
        }

        Readiness::NotReady(format!(
            "No list container reached {} items after {} polls (best: {})",
            self.min_items, self.max_polls, best
        ))
    }
}

/// One readiness policy per page type.
#[derive(Debug, Clone)]
pub struct ReadinessPolicies {
    list: ListReadiness,
    fixed: FixedDelay,
}

impl ReadinessPolicies {
    pub fn from_config(config: &ScanConfig) -> Self {
        Self {
            list: ListReadiness::new(&config.list_readiness),
            fixed: FixedDelay::new(Duration::from_millis(config.settle_delay_ms)),
        }
    }

    pub fn for_page_type(&self, page_type: PageType) -> &dyn ContentReadiness {
        match page_type {
            PageType::List => &self.list,
            PageType::Homepage | PageType::Detail | PageType::Other => &self.fixed,
        }
    }
}
