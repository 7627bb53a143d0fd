// src/progress.rs

//! Push-style progress reporting for a single run.
//!
//! A `ProgressReporter` is created per run and handed to whoever does the
//! work. Consumers call `subscribe()` and drop the receiver to unsubscribe.
//! Publishing never blocks and never fails, with or without subscribers.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::models::ViewportName;

const DEFAULT_CAPACITY: usize = 256;

/// Event published on the progress channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// A pipeline phase started.
    Step {
        index: usize,
        total: usize,
        message: String,
        percent: u8,
    },
    /// A line about one page.
    PageLog {
        url: String,
        viewport: Option<ViewportName>,
        message: String,
    },
    Finished {
        pages: usize,
        pages_with_errors: usize,
    },
    Failed {
        message: String,
    },
}

/// Broadcast hub for one run.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    tx: broadcast::Sender<ProgressEvent>,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ProgressReporter {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn publish(&self, event: ProgressEvent) {
        // No subscribers is not an error.
        let _ = self.tx.send(event);
    }

    /// Phase `index` of `total` (1-based).
    pub fn step(&self, index: usize, total: usize, message: impl Into<String>) {
        let percent = if total == 0 {
            100
        } else {
            (index.min(total) * 100 / total) as u8
        };
        self.publish(ProgressEvent::Step {
            index,
            total,
            message: message.into(),
            percent,
        });
    }

    pub fn page_log(
        &self,
        url: impl Into<String>,
        viewport: Option<ViewportName>,
        message: impl Into<String>,
    ) {
        self.publish(ProgressEvent::PageLog {
            url: url.into(),
            viewport,
            message: message.into(),
        });
    }

    pub fn finished(&self, pages: usize, pages_with_errors: usize) {
        self.publish(ProgressEvent::Finished {
            pages,
            pages_with_errors,
        });
    }

    pub fn failed(&self, message: impl Into<String>) {
        self.publish(ProgressEvent::Failed {
            message: message.into(),
        });
    }
}

/// Mirror progress events into the log until the channel closes.
pub async fn forward_to_log(mut rx: broadcast::Receiver<ProgressEvent>) {
    loop {
        match rx.recv().await {
            Ok(ProgressEvent::Step {
                index,
                total,
                message,
                percent,
            }) => log::info!("[{}/{}] {} ({}%)", index, total, message, percent),
            Ok(ProgressEvent::PageLog {
                url,
                viewport: Some(viewport),
                message,
            }) => log::debug!("{} [{}] {}", url, viewport, message),
            Ok(ProgressEvent::PageLog { url, message, .. }) => log::info!("{} {}", url, message),
            Ok(ProgressEvent::Finished {
                pages,
                pages_with_errors,
            }) => log::info!(
                "Scan finished: {} page(s), {} with errors",
                pages,
                pages_with_errors
            ),
            Ok(ProgressEvent::Failed { message }) => log::error!("Scan failed: {}", message),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                log::warn!("Progress log fell behind, skipped {} event(s)", skipped)
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_without_subscribers() {
        let reporter = ProgressReporter::default();
        reporter.step(1, 4, "Discover");
        reporter.failed("nobody is listening");
        assert_eq!(reporter.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_step_percent() {
        let reporter = ProgressReporter::default();
        let mut rx = reporter.subscribe();

        reporter.step(3, 4, "Scan");

        assert_eq!(
            rx.recv().await.unwrap(),
            ProgressEvent::Step {
                index: 3,
                total: 4,
                message: "Scan".into(),
                percent: 75,
            }
        );
    }

    #[tokio::test]
    async fn test_dropping_receiver_unsubscribes() {
        let reporter = ProgressReporter::default();
        let rx = reporter.subscribe();
        let mut other = reporter.subscribe();
        assert_eq!(reporter.subscriber_count(), 2);

        drop(rx);
        assert_eq!(reporter.subscriber_count(), 1);

        reporter.page_log("https://example.com/", None, "done");
        assert!(matches!(
            other.recv().await.unwrap(),
            ProgressEvent::PageLog { .. }
        ));
    }

    #[tokio::test]
    async fn test_forward_to_log_ends_when_reporter_dropped() {
        let reporter = ProgressReporter::new(4);
        let handle = tokio::spawn(forward_to_log(reporter.subscribe()));

        for i in 0..10 {
            reporter.page_log("https://example.com/", Some(ViewportName::PcNormal), format!("{i}"));
        }
        drop(reporter);

        handle.await.unwrap();
    }

    #[test]
    fn test_event_serialization() {
        let json = serde_json::to_value(ProgressEvent::Finished {
            pages: 3,
            pages_with_errors: 1,
        })
        .unwrap();
        assert_eq!(json["event"], "finished");
        assert_eq!(json["pages_with_errors"], 1);
    }
}
