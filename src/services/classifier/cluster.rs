// src/services/classifier/cluster.rs

//! Single-pass greedy clustering.
//!
//! Fingerprints are processed in input order and join the first cluster (in
//! creation order) whose running average similarity reaches the threshold.
//! The result depends on input order and there is no merge step afterwards;
//! sampling relies on exactly this behavior.

use crate::models::{DomFingerprint, PageCluster};
use crate::services::classifier::{SimilarityCalculator, UrlRules};

/// Greedy agglomerative cluster engine.
#[derive(Debug, Clone)]
pub struct ClusterEngine {
    threshold: f64,
    similarity: SimilarityCalculator,
    rules: UrlRules,
}

impl ClusterEngine {
    pub fn new(threshold: f64, rules: UrlRules) -> Self {
        Self {
            threshold,
            similarity: SimilarityCalculator::new(),
            rules,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Partition fingerprints into clusters.
    pub fn cluster(&self, fingerprints: impl IntoIterator<Item = DomFingerprint>) -> Vec<PageCluster> {
        let mut clusters: Vec<PageCluster> = Vec::new();

        for fp in fingerprints {
            let target = clusters.iter().position(|c| {
                self.similarity.calculate_average_similarity(&fp, &c.members) >= self.threshold
            });

            match target {
                Some(idx) => {
                    let cluster = &mut clusters[idx];
                    cluster.members.push(fp);
                    cluster.representative = self.find_representative(&cluster.members);
                }
                None => {
                    let id = clusters.len();
                    let category = self.rules.category(&fp);
                    log::debug!("New cluster #{} ({}) founded by {}", id, category, fp.url);
                    clusters.push(PageCluster::new(id, category, fp));
                }
            }
        }

        log::info!(
            "Clustered into {} group(s) at threshold {:.2}",
            clusters.len(),
            self.threshold
        );
        clusters
    }

    /// Index of the member with the highest average similarity to the others.
    fn find_representative(&self, members: &[DomFingerprint]) -> usize {
        if members.len() < 2 {
            return 0;
        }

        let mut best = 0;
        let mut best_score = f64::NEG_INFINITY;
        for (i, candidate) in members.iter().enumerate() {
            let others = members
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, m)| m);
            let score = self.similarity.calculate_average_similarity(candidate, others);
            if score > best_score {
                best = i;
                best_score = score;
            }
        }
        best
    }
}
