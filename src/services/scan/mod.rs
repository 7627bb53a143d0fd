//! Scan orchestration and the per-pass checks it runs.
//!
//! - `ScanOrchestrator`: sequential viewport passes, watchdog, persistence
//! - `ContentReadiness`: how long to wait before checking a page
//! - `ViewportChecker`: horizontal overflow
//! - `ErrorDetector`: console errors, broken images, request ids, error text
//! - `ScreenshotCapture`: retrying capture with desktop center-crop
//! - `QualityAnalyzer`: white/blank screenshot detection off the critical path

mod errors;
mod orchestrator;
mod quality;
mod readiness;
mod screenshot;
pub(crate) mod scripts;
mod viewport;

pub use errors::ErrorDetector;
pub use orchestrator::{PageInspector, ScanOrchestrator};
pub use quality::QualityAnalyzer;
pub use readiness::{ContentReadiness, FixedDelay, ListReadiness, Readiness, ReadinessPolicies};
pub use screenshot::{ScreenshotCapture, center_crop};
pub use viewport::{ViewportChecker, force_reflow};
