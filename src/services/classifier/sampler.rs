// src/services/classifier/sampler.rs

//! Diverse, type-balanced sampling of clustered pages.

use std::collections::HashSet;

use crate::models::{DomFingerprint, PageCluster, PageType, SampledPage, TypedFingerprint};
use crate::services::classifier::{SimilarityCalculator, UrlRules};

/// Per-cluster sample before backfill.
#[derive(Debug, Clone)]
pub struct ClusterSample<'a> {
    pub cluster: &'a PageCluster,
    pub selected: Vec<&'a DomFingerprint>,
}

/// Picks which pages to actually scan.
#[derive(Debug, Clone)]
pub struct Sampler {
    max_per_category: usize,
    min_detail_pages: usize,
    min_list_pages: usize,
    similarity: SimilarityCalculator,
    rules: UrlRules,
}

impl Sampler {
    pub fn new(
        max_per_category: usize,
        min_detail_pages: usize,
        min_list_pages: usize,
        rules: UrlRules,
    ) -> Self {
        Self {
            max_per_category,
            min_detail_pages,
            min_list_pages,
            similarity: SimilarityCalculator::new(),
            rules,
        }
    }

    /// Full sampling: per-cluster diversity, then detail/list backfill,
    /// flattened and deduplicated by URL.
    pub fn sample(&self, clusters: &[PageCluster]) -> Vec<SampledPage> {
        let mut samples = self.sample_from_clusters(clusters);
        self.backfill(&mut samples, PageType::Detail, self.min_detail_pages);
        self.backfill(&mut samples, PageType::List, self.min_list_pages);

        let mut seen = HashSet::new();
        let mut pages = Vec::new();
        for sample in &samples {
            for fp in &sample.selected {
                if seen.insert(fp.url.as_str()) {
                    pages.push(SampledPage {
                        cluster_id: sample.cluster.id,
                        category: sample.cluster.category,
                        page_type: self.rules.page_type(&fp.url),
                        fingerprint: (*fp).clone(),
                    });
                }
            }
        }

        log::info!(
            "Sampled {} page(s) from {} cluster(s)",
            pages.len(),
            clusters.len()
        );
        pages
    }

    /// Per-cluster stage: at most `max_per_category` members each.
    pub fn sample_from_clusters<'a>(&self, clusters: &'a [PageCluster]) -> Vec<ClusterSample<'a>> {
        clusters
            .iter()
            .map(|cluster| ClusterSample {
                cluster,
                selected: self.select_diverse(&cluster.members),
            })
            .collect()
    }

    /// Greedy farthest-point selection seeded with the first member.
    fn select_diverse<'a>(&self, members: &'a [DomFingerprint]) -> Vec<&'a DomFingerprint> {
        if members.len() <= self.max_per_category {
            return members.iter().collect();
        }

        let mut selected: Vec<usize> = vec![0];
        while selected.len() < self.max_per_category {
            let mut best: Option<(usize, f64)> = None;
            for (i, candidate) in members.iter().enumerate() {
                if selected.contains(&i) {
                    continue;
                }
                let closest = selected
                    .iter()
                    .map(|&s| self.similarity.calculate(candidate, &members[s]))
                    .fold(f64::NEG_INFINITY, f64::max);
                if best.is_none_or(|(_, score)| closest < score) {
                    best = Some((i, closest));
                }
            }
            match best {
                Some((i, _)) => selected.push(i),
                None => break,
            }
        }

        selected.into_iter().map(|i| &members[i]).collect()
    }

    fn typed<'f>(&self, fp: &'f DomFingerprint) -> TypedFingerprint<'f> {
        TypedFingerprint {
            fingerprint: fp,
            page_type: self.rules.page_type(&fp.url),
        }
    }

    /// Pull unsampled pages of `page_type` until `minimum` are present.
    fn backfill(&self, samples: &mut [ClusterSample<'_>], page_type: PageType, minimum: usize) {
        let mut sampled_urls: HashSet<String> = samples
            .iter()
            .flat_map(|s| s.selected.iter().map(|fp| fp.url.clone()))
            .collect();
        let mut present = samples
            .iter()
            .flat_map(|s| s.selected.iter())
            .filter(|fp| self.typed(fp).page_type == page_type)
            .count();

        if present >= minimum {
            return;
        }

        for sample in samples.iter_mut() {
            if present >= minimum {
                break;
            }
            let cluster = sample.cluster;
            for fp in &cluster.members {
                if present >= minimum {
                    break;
                }
                if self.typed(fp).page_type != page_type || sampled_urls.contains(&fp.url) {
                    continue;
                }
                log::debug!(
                    "Backfilling {} page {} from cluster #{}",
                    page_type,
                    fp.url,
                    cluster.id
                );
                sampled_urls.insert(fp.url.clone());
                sample.selected.push(fp);
                present += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ClassifierConfig, CrawlerConfig, PageCategory};

    fn rules() -> UrlRules {
        UrlRules::from_config(&ClassifierConfig::default(), &CrawlerConfig::default()).unwrap()
    }

    fn sampler(max: usize) -> Sampler {
        Sampler::new(max, 3, 3, rules())
    }

    fn fp(url: &str, nodes: u32) -> DomFingerprint {
        DomFingerprint {
            url: url.to_string(),
            tag_sequence: vec!["html".into(), "body".into(), "div".into()],
            class_patterns: ["card".to_string()].into_iter().collect(),
            depth: 3,
            breadth: 4,
            node_count: nodes,
        }
    }

    fn cluster(id: usize, members: Vec<DomFingerprint>) -> PageCluster {
        let mut c = PageCluster::new(id, PageCategory::Other, members[0].clone());
        c.members = members;
        c
    }

    #[test]
    fn test_small_cluster_taken_whole() {
        let clusters = vec![cluster(0, vec![fp("https://e.com/a", 10), fp("https://e.com/b", 11)])];
        let samples = sampler(3).sample_from_clusters(&clusters);
        assert_eq!(samples[0].selected.len(), 2);
    }

    #[test]
    fn test_per_cluster_bound() {
        let members: Vec<_> = (0..10)
            .map(|i| fp(&format!("https://e.com/x{i}"), 100 + i * 20))
            .collect();
        let clusters = vec![cluster(0, members.clone()), cluster(1, members[..4].to_vec())];
        for max in 1..=5 {
            for sample in sampler(max).sample_from_clusters(&clusters) {
                assert!(sample.selected.len() <= max);
            }
        }
    }

    #[test]
    fn test_farthest_point_selection() {
        // Node counts 100, 110, 400, 105, 1000: after seeding with 100 the most
        // distant is 1000, then 400.
        let clusters = vec![cluster(
            0,
            vec![
                fp("https://e.com/a", 100),
                fp("https://e.com/b", 110),
                fp("https://e.com/c", 400),
                fp("https://e.com/d", 105),
                fp("https://e.com/e", 1000),
            ],
        )];
        let samples = sampler(3).sample_from_clusters(&clusters);
        let urls: Vec<_> = samples[0].selected.iter().map(|f| f.url.as_str()).collect();
        assert_eq!(urls, vec!["https://e.com/a", "https://e.com/e", "https://e.com/c"]);
    }

    #[test]
    fn test_detail_and_list_floor() {
        let details: Vec<_> = (0..5)
            .map(|i| fp(&format!("https://e.com/product/{i}"), 200))
            .collect();
        let lists: Vec<_> = (0..2)
            .map(|i| fp(&format!("https://e.com/category/c{i}"), 300))
            .collect();
        let clusters = vec![
            cluster(0, vec![fp("https://e.com/", 500)]),
            cluster(1, details),
            cluster(2, lists),
        ];

        let pages = sampler(1).sample(&clusters);
        let detail_count = pages.iter().filter(|p| p.page_type == PageType::Detail).count();
        let list_count = pages.iter().filter(|p| p.page_type == PageType::List).count();

        assert_eq!(detail_count, 3);
        // Only two list pages exist.
        assert_eq!(list_count, 2);
    }

    #[test]
    fn test_backfill_stays_with_its_cluster() {
        let clusters = vec![
            cluster(0, vec![fp("https://e.com/", 500), fp("https://e.com/item/1", 500)]),
            cluster(1, vec![fp("https://e.com/about", 900), fp("https://e.com/item/2", 900)]),
        ];
        let pages = sampler(1).sample(&clusters);
        let item2 = pages.iter().find(|p| p.url() == "https://e.com/item/2").unwrap();
        assert_eq!(item2.cluster_id, 1);
        let item1 = pages.iter().find(|p| p.url() == "https://e.com/item/1").unwrap();
        assert_eq!(item1.cluster_id, 0);
    }

    #[test]
    fn test_output_deduplicated_by_url() {
        let a = fp("https://e.com/dup", 100);
        let clusters = vec![cluster(0, vec![a.clone()]), cluster(1, vec![a])];
        let pages = sampler(3).sample(&clusters);
        assert_eq!(pages.len(), 1);
    }
}
