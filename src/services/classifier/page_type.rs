// src/services/classifier/page_type.rs

//! URL pattern rules: page type, cluster category and crawl exclusion.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::error::Result;
use crate::models::{ClassifierConfig, CrawlerConfig, DomFingerprint, PageCategory, PageType};

static HOMEPAGE_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/?([a-z]{2}(-[a-z]{2})?/?)?(index\.(html?|php|jsp|aspx?))?$")
        .expect("static homepage pattern")
});

static KEYWORD_CATEGORIES: LazyLock<Vec<(PageCategory, Regex)>> = LazyLock::new(|| {
    [
        (PageCategory::About, r"(^|/|-|_)(about|company|intro|introduction|who-we-are)"),
        (PageCategory::Contact, r"(^|/|-|_)(contact|inquiry|enquiry)"),
        (PageCategory::Help, r"(^|/|-|_)(help|faq|support|guide)"),
        (PageCategory::News, r"(^|/|-|_)(news|blog|press|notice|announcement)"),
    ]
    .into_iter()
    .map(|(category, pattern)| (category, Regex::new(pattern).expect("static category pattern")))
    .collect()
});

/// Structural thresholds for pages no URL rule recognizes.
const COMPLEX_NODE_COUNT: u32 = 1500;
const COMPLEX_DEPTH: u32 = 25;
const SIMPLE_NODE_COUNT: u32 = 150;
const SIMPLE_BREADTH: u32 = 5;

/// Compiled URL rules, built once from validated configuration.
#[derive(Debug, Clone)]
pub struct UrlRules {
    detail: Vec<Regex>,
    list: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl UrlRules {
    /// Compile the detail, list and exclusion pattern lists.
    pub fn from_config(classifier: &ClassifierConfig, crawler: &CrawlerConfig) -> Result<Self> {
        Ok(Self {
            detail: compile(&classifier.detail_patterns)?,
            list: compile(&classifier.list_patterns)?,
            exclude: compile(&crawler.exclude_patterns)?,
        })
    }

    /// Classify a URL as homepage, detail, list or other.
    pub fn page_type(&self, url: &str) -> PageType {
        let (path, target) = path_and_target(url);

        if is_homepage(&path, &target) {
            PageType::Homepage
        } else if self.detail.iter().any(|re| re.is_match(&target)) {
            PageType::Detail
        } else if self.list.iter().any(|re| re.is_match(&target)) {
            PageType::List
        } else {
            PageType::Other
        }
    }

    /// Category for a cluster founded by `fp`.
    pub fn category(&self, fp: &DomFingerprint) -> PageCategory {
        match self.page_type(&fp.url) {
            PageType::Homepage => return PageCategory::Homepage,
            PageType::Detail => return PageCategory::Detail,
            PageType::List => return PageCategory::List,
            PageType::Other => {}
        }

        let (path, _) = path_and_target(&fp.url);
        let path = path.to_lowercase();
        if let Some((category, _)) = KEYWORD_CATEGORIES.iter().find(|(_, re)| re.is_match(&path)) {
            return *category;
        }

        structural_category(fp)
    }

    /// Whether a URL must never be crawled.
    pub fn is_excluded(&self, url: &str) -> bool {
        self.exclude.iter().any(|re| re.is_match(url))
    }
}

fn compile(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| Regex::new(p).map_err(Into::into))
        .collect()
}

/// Returns `(path, path + "?" + query)`, falling back to the raw string.
fn path_and_target(url: &str) -> (String, String) {
    match Url::parse(url) {
        Ok(parsed) => {
            let path = parsed.path().to_string();
            let target = match parsed.query() {
                Some(q) if !q.is_empty() => format!("{path}?{q}"),
                _ => path.clone(),
            };
            (path, target)
        }
        Err(_) => (url.to_string(), url.to_string()),
    }
}

fn is_homepage(path: &str, target: &str) -> bool {
    path == target && HOMEPAGE_PATH.is_match(&path.to_lowercase())
}

fn structural_category(fp: &DomFingerprint) -> PageCategory {
    if fp.is_empty() {
        return PageCategory::Other;
    }
    if fp.node_count >= COMPLEX_NODE_COUNT || fp.depth >= COMPLEX_DEPTH {
        PageCategory::Complex
    } else if fp.node_count <= SIMPLE_NODE_COUNT && fp.breadth <= SIMPLE_BREADTH {
        PageCategory::Simple
    } else {
        PageCategory::Other
    }
}
