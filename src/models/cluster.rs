// src/models/cluster.rs

//! Page clusters and sample entries.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::{DomFingerprint, PageType};

/// Inferred label for a cluster, fixed when the cluster is founded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageCategory {
    Homepage,
    Detail,
    List,
    About,
    Contact,
    Help,
    News,
    Complex,
    Simple,
    Other,
}

impl PageCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageCategory::Homepage => "homepage",
            PageCategory::Detail => "detail",
            PageCategory::List => "list",
            PageCategory::About => "about",
            PageCategory::Contact => "contact",
            PageCategory::Help => "help",
            PageCategory::News => "news",
            PageCategory::Complex => "complex",
            PageCategory::Simple => "simple",
            PageCategory::Other => "other",
        }
    }
}

impl fmt::Display for PageCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A group of structurally similar pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageCluster {
    /// Sequential id in creation order
    pub id: usize,

    /// Label inferred from the founding member
    pub category: PageCategory,

    /// Members in discovery order
    pub members: Vec<DomFingerprint>,

    /// Index into `members` of the most central page
    pub representative: usize,
}

impl PageCluster {
    /// Create a singleton cluster.
    pub fn new(id: usize, category: PageCategory, founder: DomFingerprint) -> Self {
        Self {
            id,
            category,
            members: vec![founder],
            representative: 0,
        }
    }

    /// The representative member.
    pub fn representative(&self) -> &DomFingerprint {
        &self.members[self.representative]
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// A page selected for scanning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampledPage {
    pub cluster_id: usize,
    pub category: PageCategory,
    pub page_type: PageType,
    pub fingerprint: DomFingerprint,
}

impl SampledPage {
    pub fn url(&self) -> &str {
        &self.fingerprint.url
    }
}
