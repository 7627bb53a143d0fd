// src/error.rs

//! Unified error handling for the scanner.

use std::fmt;

use thiserror::Error;

/// Result type alias for scanner operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// URL pattern failed to compile
    #[error("Invalid pattern: {0}")]
    Regex(#[from] regex::Error),

    /// Screenshot decoding or encoding failed
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Background task panicked or was cancelled
    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Browser driver failure
    #[error("Browser error: {0}")]
    Browser(String),

    /// Navigation to a page failed
    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    /// A bounded wait expired
    #[error("Timed out after {0} ms")]
    Timeout(u64),

    /// A whole viewport pass ran past its budget
    #[error("Viewport pass exceeded {0}s budget")]
    PassTimeout(u64),

    /// Fingerprint script returned something unusable
    #[error("Fingerprint extraction failed for {url}: {message}")]
    Extraction { url: String, message: String },

    /// Whole-scan watchdog fired
    #[error("Scan exceeded {elapsed_secs}s limit after {completed} page(s)")]
    ScanTimeout { elapsed_secs: u64, completed: usize },
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a browser driver error.
    pub fn browser(message: impl fmt::Display) -> Self {
        Self::Browser(message.to_string())
    }

    /// Create a navigation error with context.
    pub fn navigation(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Navigation {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Create an extraction error with context.
    pub fn extraction(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Extraction {
            url: url.into(),
            message: message.to_string(),
        }
    }
}
