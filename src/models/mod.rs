// src/models/mod.rs

//! Domain models for the scanner.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod cluster;
mod config;
mod fingerprint;
mod result;
mod viewport;

// Re-export all public types
pub use cluster::{PageCategory, PageCluster, SampledPage};
pub use config::{
    ChecksConfig, ClassifierConfig, Config, CrawlerConfig, ListReadinessConfig, QualityConfig,
    ScanConfig,
};
pub use fingerprint::{DomFingerprint, MAX_CLASS_PATTERNS, PageType, TypedFingerprint};
pub use result::{
    Issue, IssueType, PageResult, PageStatus, QualityKind, ScreenshotQualityIssue, Severity,
};
pub use viewport::{ViewportMode, ViewportName};
