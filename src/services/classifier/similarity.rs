// src/services/classifier/similarity.rs

//! Structural similarity between two fingerprints.
//!
//! `score = 0.6 * tag_sequence + 0.4 * structure`, where `structure` blends
//! depth (0.3), breadth (0.2) and node-count (0.2) closeness with the Jaccard
//! overlap of class tokens (0.3).

use crate::models::DomFingerprint;

const TAG_WEIGHT: f64 = 0.6;
const STRUCTURE_WEIGHT: f64 = 0.4;

const DEPTH_WEIGHT: f64 = 0.3;
const BREADTH_WEIGHT: f64 = 0.2;
const NODE_COUNT_WEIGHT: f64 = 0.2;
const CLASS_WEIGHT: f64 = 0.3;

/// Similarity calculator. Stateless; symmetric and reflexive.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimilarityCalculator;

impl SimilarityCalculator {
    pub fn new() -> Self {
        Self
    }

    /// Similarity in [0, 1].
    pub fn calculate(&self, a: &DomFingerprint, b: &DomFingerprint) -> f64 {
        let tags = tag_sequence_similarity(&a.tag_sequence, &b.tag_sequence);
        let structure = structural_similarity(a, b);
        (TAG_WEIGHT * tags + STRUCTURE_WEIGHT * structure).clamp(0.0, 1.0)
    }

    /// Mean similarity of `fp` to each member; 0 when there are no members.
    pub fn calculate_average_similarity<'a, I>(&self, fp: &DomFingerprint, members: I) -> f64
    where
        I: IntoIterator<Item = &'a DomFingerprint>,
    {
        let (sum, count) = members
            .into_iter()
            .fold((0.0, 0usize), |(sum, count), m| {
                (sum + self.calculate(fp, m), count + 1)
            });
        if count == 0 { 0.0 } else { sum / count as f64 }
    }
}

/// Normalized edit distance over tag names.
pub fn tag_sequence_similarity(a: &[String], b: &[String]) -> f64 {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => return 1.0,
        (true, false) | (false, true) => return 0.0,
        _ => {}
    }
    let distance = levenshtein(a, b);
    let longest = a.len().max(b.len());
    1.0 - distance as f64 / longest as f64
}

fn structural_similarity(a: &DomFingerprint, b: &DomFingerprint) -> f64 {
    let depth = closeness(a.depth, b.depth);
    let breadth = closeness(a.breadth, b.breadth);
    let nodes = closeness(a.node_count, b.node_count);
    let classes = class_jaccard(a, b);

    DEPTH_WEIGHT * depth + BREADTH_WEIGHT * breadth + NODE_COUNT_WEIGHT * nodes + CLASS_WEIGHT * classes
}

/// `1 - |x - y| / max(x, y)`; two zeros are identical.
fn closeness(x: u32, y: u32) -> f64 {
    let max = x.max(y);
    if max == 0 {
        return 1.0;
    }
    1.0 - x.abs_diff(y) as f64 / max as f64
}

fn class_jaccard(a: &DomFingerprint, b: &DomFingerprint) -> f64 {
    let intersection = a.class_patterns.intersection(&b.class_patterns).count();
    let union = a.class_patterns.len() + b.class_patterns.len() - intersection;
    if union == 0 {
        return 1.0;
    }
    intersection as f64 / union as f64
}

/// Unit-cost Levenshtein distance with a rolling row.
fn levenshtein<T: PartialEq>(a: &[T], b: &[T]) -> usize {
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, x) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, y) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(x != y);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}
