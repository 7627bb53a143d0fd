// src/models/fingerprint.rs

//! Structural page fingerprints.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Maximum number of class tokens kept per fingerprint.
pub const MAX_CLASS_PATTERNS: usize = 50;

/// Structural summary of a rendered page.
///
/// Describes shape, never content: two pages with different text but the same
/// template produce near-identical fingerprints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomFingerprint {
    /// Page URL
    pub url: String,

    /// Ancestor tag names of the deepest element, root first
    #[serde(default)]
    pub tag_sequence: Vec<String>,

    /// Distinct class tokens seen on the page (at most 50)
    #[serde(default)]
    pub class_patterns: BTreeSet<String>,

    /// Longest ancestor chain
    #[serde(default)]
    pub depth: u32,

    /// Direct children of `<body>`
    #[serde(default)]
    pub breadth: u32,

    /// Total element count
    #[serde(default)]
    pub node_count: u32,
}

impl DomFingerprint {
    /// The all-zero record used when extraction fails.
    pub fn empty(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            tag_sequence: Vec::new(),
            class_patterns: BTreeSet::new(),
            depth: 0,
            breadth: 0,
            node_count: 0,
        }
    }

    /// Whether this is a degraded (empty) fingerprint.
    pub fn is_empty(&self) -> bool {
        self.tag_sequence.is_empty() && self.node_count == 0
    }
}

/// URL-derived page type, used for content settling and sample balancing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageType {
    Homepage,
    Detail,
    List,
    Other,
}

impl PageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageType::Homepage => "homepage",
            PageType::Detail => "detail",
            PageType::List => "list",
            PageType::Other => "other",
        }
    }
}

impl fmt::Display for PageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fingerprint annotated with its page type.
#[derive(Debug, Clone, Copy)]
pub struct TypedFingerprint<'a> {
    pub fingerprint: &'a DomFingerprint,
    pub page_type: PageType,
}
