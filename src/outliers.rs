//! Disagreement outliers: pairs where the two metrics tell different
//! stories.
//!
//! One rule drives both groups. With `signed = semantic - structural`, a
//! pair lands in the semantic-over-structural group when `signed >=
//! threshold` and in the structural-over-semantic group when `-signed >=
//! threshold`, with a strict sign requirement so the groups stay disjoint
//! even at threshold 0. An exhaustive scan over the eligible pool, not a
//! heuristic: a pair either qualifies or it does not.

use std::cmp::Ordering;

use serde::Serialize;
use tracing::warn;

use crate::correlation::{SimilarityPair, evaluate_pair};
use crate::corpus::CorpusSnapshot;
use crate::{Error, Result};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// The two disagreement groups plus scan bookkeeping.
#[derive(Debug, Clone, Serialize)]
pub struct OutlierReport {
    pub threshold: f32,
    pub limit: usize,
    pub pairs_scanned: u64,
    /// Pairs dropped because a similarity failed to evaluate.
    pub skipped: usize,
    /// Semantically similar but structurally different:
    /// `semantic - structural >= threshold`.
    pub semantic_over_structural: Vec<SimilarityPair>,
    /// Structurally similar but semantically different:
    /// `structural - semantic >= threshold`.
    pub structural_over_semantic: Vec<SimilarityPair>,
}

/// Partition the eligible pair pool by metric disagreement.
///
/// A corpus with no qualifying pair yields two empty groups, not an
/// error. Each group holds at most `limit` pairs, sorted by descending
/// disagreement with canonical pair order breaking ties.
pub fn detect(corpus: &CorpusSnapshot, threshold: f32, limit: usize) -> Result<OutlierReport> {
    if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
        return Err(Error::ThresholdRange(threshold));
    }

    let pool = corpus.eligible();
    let m = pool.len() as u64;
    let pairs_scanned = m.saturating_sub(1) * m / 2;

    let (pairs, skipped) = scan_pairs(corpus, &pool);

    let mut semantic_over = Vec::new();
    let mut structural_over = Vec::new();
    for pair in pairs {
        let signed = pair.semantic - pair.structural;
        if signed > 0.0 && signed >= threshold {
            semantic_over.push(pair);
        } else if signed < 0.0 && -signed >= threshold {
            structural_over.push(pair);
        }
    }

    sort_group(&mut semantic_over, limit);
    sort_group(&mut structural_over, limit);

    Ok(OutlierReport {
        threshold,
        limit,
        pairs_scanned,
        skipped,
        semantic_over_structural: semantic_over,
        structural_over_semantic: structural_over,
    })
}

fn sort_group(group: &mut Vec<SimilarityPair>, limit: usize) {
    group.sort_by(|a, b| {
        b.disagreement
            .partial_cmp(&a.disagreement)
            .unwrap_or(Ordering::Equal)
            .then_with(|| {
                (a.entity_a.as_str(), a.entity_b.as_str())
                    .cmp(&(b.entity_a.as_str(), b.entity_b.as_str()))
            })
    });
    group.truncate(limit);
}

#[cfg(feature = "parallel")]
fn scan_pairs(corpus: &CorpusSnapshot, pool: &[&String]) -> (Vec<SimilarityPair>, usize) {
    let results: Vec<crate::Result<SimilarityPair>> = (0..pool.len())
        .into_par_iter()
        .flat_map_iter(|i| ((i + 1)..pool.len()).map(move |j| (i, j)))
        .map(|(i, j)| evaluate_pair(corpus, pool[i], pool[j]))
        .collect();

    let mut pairs = Vec::with_capacity(results.len());
    let mut skipped = 0usize;
    for result in results {
        match result {
            Ok(pair) => pairs.push(pair),
            Err(err) => {
                skipped += 1;
                warn!(%err, "pair skipped in outlier scan");
            }
        }
    }
    (pairs, skipped)
}

#[cfg(not(feature = "parallel"))]
fn scan_pairs(corpus: &CorpusSnapshot, pool: &[&String]) -> (Vec<SimilarityPair>, usize) {
    let mut pairs = Vec::new();
    let mut skipped = 0usize;
    for i in 0..pool.len() {
        for j in (i + 1)..pool.len() {
            match evaluate_pair(corpus, pool[i], pool[j]) {
                Ok(pair) => pairs.push(pair),
                Err(err) => {
                    skipped += 1;
                    warn!(%err, "pair skipped in outlier scan");
                }
            }
        }
    }
    (pairs, skipped)
}
