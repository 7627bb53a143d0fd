// src/services/discovery.rs

//! Same-domain link discovery from a start page.

use std::collections::HashSet;
use std::sync::LazyLock;

use reqwest::Client;
use scraper::{Html, Selector};
use url::Url;

use crate::error::Result;
use crate::services::UrlRules;
use crate::utils::http::fetch_text;
use crate::utils::url::{is_non_document, is_same_domain};
use crate::utils::{resolve_url, strip_fragment};

static ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("static anchor selector"));

/// Collects the pages linked from a start URL.
pub struct LinkDiscovery {
    client: Client,
    rules: UrlRules,
    max_pages: usize,
}

impl LinkDiscovery {
    pub fn new(client: Client, rules: UrlRules, max_pages: usize) -> Self {
        Self {
            client,
            rules,
            max_pages: max_pages.max(1),
        }
    }

    /// Fetch the start page and return it followed by its same-domain links.
    pub async fn discover(&self, start_url: &str) -> Result<Vec<String>> {
        let (final_url, body) = fetch_text(&self.client, start_url).await?;
        if final_url != start_url {
            log::debug!("{} redirected to {}", start_url, final_url);
        }
        let links = self.extract_links(&final_url, &body);
        log::info!("Discovered {} page(s) from {}", links.len(), start_url);
        Ok(links)
    }

    /// Start URL first, then every eligible anchor in document order.
    pub fn extract_links(&self, base_url: &str, html: &str) -> Vec<String> {
        let start = strip_fragment(base_url);
        let mut seen = HashSet::new();
        let mut links = Vec::new();
        seen.insert(start.clone());
        links.push(start.clone());

        let Ok(base) = Url::parse(&start) else {
            log::warn!("Cannot resolve links against {}", base_url);
            return links;
        };

        let document = Html::parse_document(html);
        for anchor in document.select(&ANCHOR) {
            if links.len() >= self.max_pages {
                log::debug!("Link cap of {} reached", self.max_pages);
                break;
            }

            let Some(href) = anchor.value().attr("href").map(str::trim) else {
                continue;
            };
            if href.is_empty() || href.starts_with('#') || self.rules.is_excluded(href) {
                continue;
            }

            let url = strip_fragment(&resolve_url(&base, href));
            if !(url.starts_with("http://") || url.starts_with("https://"))
                || !is_same_domain(&start, &url)
                || is_non_document(&url)
                || self.rules.is_excluded(&url)
            {
                continue;
            }

            if seen.insert(url.clone()) {
                links.push(url);
            }
        }

        links
    }
}
