// src/services/fingerprint.rs

//! DOM fingerprint extraction.
//!
//! Two sources produce the same `DomFingerprint` shape:
//! - `BrowserFingerprinter`: evaluates `FINGERPRINT_SCRIPT` in a rendered page
//! - `HttpFingerprinter`: fetches raw HTML and walks it with `scraper`

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use scraper::{ElementRef, Html};
use serde::Deserialize;

use crate::browser::{
    BrowserDriver, BrowserPage, ContextOptions, GotoOptions, WaitUntil, evaluate_as,
};
use crate::error::{AppError, Result};
use crate::models::{Config, DomFingerprint, MAX_CLASS_PATTERNS, ViewportMode, ViewportName};
use crate::utils::http::{create_async_client, fetch_text};

/// In-page fingerprint script. Mirrors `fingerprint_html`.
pub const FINGERPRINT_SCRIPT: &str = r#"(() => {
  const root = document.documentElement;
  if (!root) return null;
  const classes = [];
  const seen = new Set();
  let nodeCount = 0;
  let depth = 0;
  let deepest = root;
  const stack = [[root, 1]];
  while (stack.length) {
    const [el, d] = stack.pop();
    nodeCount++;
    if (d > depth) { depth = d; deepest = el; }
    for (const c of el.classList) {
      if (classes.length < 50 && !seen.has(c)) { seen.add(c); classes.push(c); }
    }
    for (let i = el.children.length - 1; i >= 0; i--) stack.push([el.children[i], d + 1]);
  }
  const tags = [];
  for (let el = deepest; el; el = el.parentElement) tags.unshift(el.tagName.toLowerCase());
  return {
    tagSequence: tags,
    classPatterns: classes,
    depth: depth,
    breadth: document.body ? document.body.children.length : 0,
    nodeCount: nodeCount
  };
})()"#;

/// Anything that can turn a URL into a structural fingerprint.
#[async_trait]
pub trait FingerprintSource: Send + Sync {
    async fn extract(&self, url: &str) -> Result<DomFingerprint>;
}

/// Extract a fingerprint, degrading to an empty one on any failure.
pub async fn extract_or_empty(source: &dyn FingerprintSource, url: &str) -> DomFingerprint {
    match source.extract(url).await {
        Ok(fp) => fp,
        Err(e) => {
            log::warn!("Fingerprint extraction failed for {}: {}", url, e);
            DomFingerprint::empty(url)
        }
    }
}

/// Raw script output, before the URL is attached.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScriptFingerprint {
    tag_sequence: Vec<String>,
    class_patterns: Vec<String>,
    depth: u32,
    breadth: u32,
    node_count: u32,
}

impl ScriptFingerprint {
    fn into_fingerprint(self, url: &str) -> DomFingerprint {
        DomFingerprint {
            url: url.to_string(),
            tag_sequence: self.tag_sequence,
            class_patterns: self
                .class_patterns
                .into_iter()
                .take(MAX_CLASS_PATTERNS)
                .collect(),
            depth: self.depth,
            breadth: self.breadth,
            node_count: self.node_count,
        }
    }
}

/// Run the fingerprint script on an already loaded page.
pub async fn fingerprint_page(page: &dyn BrowserPage, url: &str) -> Result<DomFingerprint> {
    let raw: Option<ScriptFingerprint> = evaluate_as(page, FINGERPRINT_SCRIPT)
        .await
        .map_err(|e| AppError::extraction(url, e))?;
    raw.map(|r| r.into_fingerprint(url))
        .ok_or_else(|| AppError::extraction(url, "document has no root element"))
}

/// Summarize an HTML document the same way the in-page script does.
pub fn fingerprint_html(url: &str, html: &str) -> DomFingerprint {
    let document = Html::parse_document(html);
    let root = document.root_element();

    let mut class_patterns = BTreeSet::new();
    let mut node_count = 0u32;
    let mut depth = 0u32;
    let mut deepest = root;

    for node in root.descendants() {
        let Some(el) = ElementRef::wrap(node) else {
            continue;
        };
        node_count += 1;

        let d = el.ancestors().filter(|a| a.value().is_element()).count() as u32 + 1;
        if d > depth {
            depth = d;
            deepest = el;
        }

        for class in el.value().classes() {
            if class_patterns.len() >= MAX_CLASS_PATTERNS {
                break;
            }
            class_patterns.insert(class.to_string());
        }
    }

    let mut tag_sequence: Vec<String> = deepest
        .ancestors()
        .filter_map(ElementRef::wrap)
        .map(|a| a.value().name().to_string())
        .collect();
    tag_sequence.reverse();
    tag_sequence.push(deepest.value().name().to_string());

    let breadth = root
        .children()
        .filter_map(ElementRef::wrap)
        .find(|c| c.value().name() == "body")
        .map(|body| body.children().filter_map(ElementRef::wrap).count() as u32)
        .unwrap_or(0);

    DomFingerprint {
        url: url.to_string(),
        tag_sequence,
        class_patterns,
        depth,
        breadth,
        node_count,
    }
}

/// Fingerprints pages from their server-rendered HTML.
pub struct HttpFingerprinter {
    client: reqwest::Client,
}

impl HttpFingerprinter {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            client: create_async_client(&config.crawler)?,
        })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FingerprintSource for HttpFingerprinter {
    async fn extract(&self, url: &str) -> Result<DomFingerprint> {
        let (_, body) = fetch_text(&self.client, url).await?;
        Ok(fingerprint_html(url, &body))
    }
}

/// Fingerprints pages after the browser has rendered them.
pub struct BrowserFingerprinter {
    driver: Arc<dyn BrowserDriver>,
    context: ContextOptions,
    timeout: Duration,
}

impl BrowserFingerprinter {
    pub fn new(driver: Arc<dyn BrowserDriver>, config: &Config) -> Self {
        let viewport = config
            .viewports
            .iter()
            .find(|v| v.name == ViewportName::PcNormal)
            .cloned()
            .unwrap_or_else(|| ViewportMode::preset(ViewportName::PcNormal));
        Self {
            driver,
            context: ContextOptions {
                viewport,
                blocked_urls: config.scan.blocked_resources.clone(),
            },
            timeout: Duration::from_secs(config.scan.navigation_timeout_secs),
        }
    }

    async fn extract_in(&self, page: &dyn BrowserPage, url: &str) -> Result<DomFingerprint> {
        let options = GotoOptions {
            wait_until: WaitUntil::DomContentLoaded,
            timeout: self.timeout,
        };
        tokio::time::timeout(self.timeout, page.goto(url, &options))
            .await
            .map_err(|_| AppError::Timeout(self.timeout.as_millis() as u64))??;
        tokio::time::timeout(self.timeout, fingerprint_page(page, url))
            .await
            .map_err(|_| AppError::Timeout(self.timeout.as_millis() as u64))?
    }
}

#[async_trait]
impl FingerprintSource for BrowserFingerprinter {
    async fn extract(&self, url: &str) -> Result<DomFingerprint> {
        let context = self.driver.new_context(&self.context).await?;
        let result = match context.new_page().await {
            Ok(page) => {
                let result = self.extract_in(page.as_ref(), url).await;
                if let Err(e) = page.close().await {
                    log::debug!("Closing fingerprint page for {} failed: {}", url, e);
                }
                result
            }
            Err(e) => Err(e),
        };
        if let Err(e) = context.close().await {
            log::debug!("Closing fingerprint context for {} failed: {}", url, e);
        }
        result
    }
}
