// src/pipeline/classify.rs

//! Fingerprint fan-out followed by clustering and sampling.

use futures::stream::{self, StreamExt};

use crate::models::{DomFingerprint, PageCluster, SampledPage};
use crate::services::fingerprint::{FingerprintSource, extract_or_empty};
use crate::services::{ClusterEngine, Sampler};

/// Output of the classification phase.
#[derive(Debug, Clone)]
pub struct Classification {
    pub clusters: Vec<PageCluster>,
    pub sample: Vec<SampledPage>,
}

/// Fingerprint every URL with at most `concurrency` extractions in flight.
///
/// Results come back in input order; failed extractions yield empty
/// fingerprints instead of dropping the page.
pub async fn extract_all(
    source: &dyn FingerprintSource,
    urls: &[String],
    concurrency: usize,
) -> Vec<DomFingerprint> {
    stream::iter(urls)
        .map(|url| extract_or_empty(source, url))
        .buffered(concurrency.max(1))
        .collect()
        .await
}

/// Fingerprint, cluster and sample a set of discovered pages.
pub async fn classify_pages(
    source: &dyn FingerprintSource,
    urls: &[String],
    concurrency: usize,
    engine: &ClusterEngine,
    sampler: &Sampler,
) -> Classification {
    let fingerprints = extract_all(source, urls, concurrency).await;
    let empty = fingerprints.iter().filter(|fp| fp.node_count == 0).count();
    if empty > 0 {
        log::warn!("{} of {} page(s) produced no fingerprint", empty, urls.len());
    }

    let clusters = engine.cluster(fingerprints);
    let sample = sampler.sample(&clusters);
    Classification { clusters, sample }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, Result};
    use crate::models::Config;
    use crate::services::classifier;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::time::Duration;

    /// Serves canned fingerprints, with a per-URL delay to scramble completion order.
    struct CannedSource {
        pages: HashMap<String, (u64, DomFingerprint)>,
    }

    #[async_trait]
    impl FingerprintSource for CannedSource {
        async fn extract(&self, url: &str) -> Result<DomFingerprint> {
            let (delay, fp) = self
                .pages
                .get(url)
                .cloned()
                .ok_or_else(|| AppError::navigation(url, "connection refused"))?;
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok(fp)
        }
    }

    fn fp(url: &str, tags: &[&str], classes: &[&str], nodes: u32) -> DomFingerprint {
        DomFingerprint {
            url: url.to_string(),
            tag_sequence: tags.iter().map(|t| t.to_string()).collect(),
            class_patterns: classes.iter().map(|c| c.to_string()).collect(),
            depth: tags.len() as u32,
            breadth: 3,
            node_count: nodes,
        }
    }

    fn source() -> CannedSource {
        let article = ["html", "body", "main", "article", "p"];
        let grid = ["html", "body", "div", "ul", "li", "a", "img"];
        let pages = [
            (30, fp("https://example.com/a/1", &article, &["post", "content"], 120)),
            (10, fp("https://example.com/a/2", &article, &["post", "content"], 124)),
            (20, fp("https://example.com/a/3", &article, &["post", "content"], 118)),
            (5, fp("https://example.com/shop", &grid, &["grid", "tile"], 600)),
        ];
        CannedSource {
            pages: pages
                .into_iter()
                .map(|(delay, fp)| (fp.url.clone(), (delay, fp)))
                .collect(),
        }
    }

    fn urls(list: &[&str]) -> Vec<String> {
        list.iter().map(|u| u.to_string()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_extract_all_keeps_input_order() {
        let urls = urls(&[
            "https://example.com/a/1",
            "https://example.com/a/2",
            "https://example.com/missing",
            "https://example.com/shop",
        ]);
        let fps = extract_all(&source(), &urls, 2).await;

        let got: Vec<_> = fps.iter().map(|f| f.url.as_str()).collect();
        assert_eq!(got, urls.iter().map(String::as_str).collect::<Vec<_>>());
        assert_eq!(fps[2].node_count, 0);
        assert!(fps[2].tag_sequence.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_classify_groups_and_samples() {
        let (engine, sampler) = classifier::from_config(&Config::default()).unwrap();
        let urls = urls(&[
            "https://example.com/a/1",
            "https://example.com/a/2",
            "https://example.com/a/3",
            "https://example.com/shop",
        ]);

        let result = classify_pages(&source(), &urls, 4, &engine, &sampler).await;

        assert_eq!(result.clusters.len(), 2);
        assert_eq!(result.clusters[0].len(), 3);
        assert_eq!(result.clusters[1].len(), 1);
        assert_eq!(result.sample.len(), 4);
        assert_eq!(result.sample[0].url(), "https://example.com/a/1");
    }

    #[tokio::test]
    async fn test_classify_nothing() {
        let (engine, sampler) = classifier::from_config(&Config::default()).unwrap();
        let result = classify_pages(&source(), &[], 4, &engine, &sampler).await;
        assert!(result.clusters.is_empty());
        assert!(result.sample.is_empty());
    }
}
