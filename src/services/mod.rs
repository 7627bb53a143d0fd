//! Service layer for the scanner.
//!
//! This module contains the business logic for:
//! - Link discovery (`LinkDiscovery`)
//! - Fingerprint extraction (`HttpFingerprinter`, `BrowserFingerprinter`)
//! - Page classification (`ClusterEngine`, `Sampler`)
//! - Viewport scanning (`ScanOrchestrator`)

pub mod classifier;
mod discovery;
pub mod fingerprint;
pub mod scan;

pub use classifier::{ClusterEngine, Sampler, SimilarityCalculator, UrlRules};
pub use discovery::LinkDiscovery;
pub use fingerprint::{BrowserFingerprinter, FingerprintSource, HttpFingerprinter};
pub use scan::{QualityAnalyzer, ScanOrchestrator};
