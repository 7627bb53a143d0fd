//! Page classifier: similarity, clustering and sampling.
//!
//! - `SimilarityCalculator`: structural similarity between two fingerprints
//! - `ClusterEngine`: greedy single-pass clustering
//! - `Sampler`: diverse per-cluster selection with detail/list backfill
//! - `UrlRules`: URL-derived page types and cluster categories

mod cluster;
mod page_type;
mod sampler;
mod similarity;

pub use cluster::ClusterEngine;
pub use page_type::UrlRules;
pub use sampler::{ClusterSample, Sampler};
pub use similarity::{SimilarityCalculator, tag_sequence_similarity};

use crate::error::Result;
use crate::models::Config;

/// Build the cluster engine and sampler from validated configuration.
pub fn from_config(config: &Config) -> Result<(ClusterEngine, Sampler)> {
    let rules = UrlRules::from_config(&config.classifier, &config.crawler)?;
    let engine = ClusterEngine::new(config.classifier.similarity_threshold, rules.clone());
    let sampler = Sampler::new(
        config.classifier.max_per_category,
        config.classifier.min_detail_pages,
        config.classifier.min_list_pages,
        rules,
    );
    Ok((engine, sampler))
}
