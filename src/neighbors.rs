//! Per-entity nearest neighbors under each metric, and how much the two
//! metrics agree about who the neighbors are.
//!
//! Scoring is a full scan over candidates holding the metric's datum,
//! sorted by descending similarity with ascending entity id breaking
//! ties. Candidates missing the datum are excluded rather than failing
//! the query; only the query entity itself must have comparable data.

use std::cmp::Ordering;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::corpus::{CorpusSnapshot, EntityId};
use crate::semantic::{cosine_similarity, unit_interval};
use crate::structural::structural_similarity;
use crate::Result;

/// Which similarity metric drives a neighbor query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Structural,
    Semantic,
}

impl Metric {
    pub fn name(self) -> &'static str {
        match self {
            Metric::Structural => "structural",
            Metric::Semantic => "semantic",
        }
    }
}

/// One ranked neighbor. Scores sit in [0, 1] under either metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Neighbor {
    pub entity_id: EntityId,
    pub score: f32,
    /// 1-based position in the list.
    pub rank: usize,
}

/// Top-K lists under both metrics plus their overlap.
#[derive(Debug, Clone, Serialize)]
pub struct NeighborComparison {
    pub entity_id: EntityId,
    pub requested_k: usize,
    pub structural: Vec<Neighbor>,
    pub semantic: Vec<Neighbor>,
    /// Entities appearing in both lists.
    pub overlap_count: usize,
    /// `overlap / |union|`, 0.0 when both lists are empty.
    pub jaccard: f32,
}

/// Top-K neighbors of `id` under `metric`, excluding `id` itself.
///
/// K is silently capped at the number of scorable candidates. Errors only
/// when the query entity is unknown or lacks the metric's datum.
pub fn neighbors(
    corpus: &CorpusSnapshot,
    id: &str,
    metric: Metric,
    k: usize,
) -> Result<Vec<Neighbor>> {
    let mut scored: Vec<(&EntityId, f32)> = match metric {
        Metric::Structural => {
            let query = corpus.code_of(id)?;
            corpus
                .coded()
                .filter(|(candidate, _)| candidate.as_str() != id)
                .map(|(candidate, code)| (candidate, structural_similarity(query, code)))
                .collect()
        }
        Metric::Semantic => {
            let query = corpus.embedding_of(id)?;
            let mut scored = Vec::new();
            for (candidate, embedding) in corpus.embedded() {
                if candidate.as_str() == id {
                    continue;
                }
                match cosine_similarity(query, embedding) {
                    Ok(cos) => scored.push((candidate, unit_interval(cos))),
                    Err(err) => {
                        warn!(candidate = %candidate, %err, "candidate skipped in neighbor scan");
                    }
                }
            }
            scored
        }
    };

    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(b.0))
    });
    if k > scored.len() {
        debug!(metric = metric.name(), k, available = scored.len(), "k capped");
    }
    scored.truncate(k);

    Ok(scored
        .into_iter()
        .enumerate()
        .map(|(i, (candidate, score))| Neighbor {
            entity_id: candidate.clone(),
            score,
            rank: i + 1,
        })
        .collect())
}

/// Both top-K lists for one entity, with overlap count and Jaccard index
/// over the two neighbor sets.
pub fn compare(corpus: &CorpusSnapshot, id: &str, k: usize) -> Result<NeighborComparison> {
    let structural = neighbors(corpus, id, Metric::Structural, k)?;
    let semantic = neighbors(corpus, id, Metric::Semantic, k)?;

    let s_set: HashSet<&str> = structural.iter().map(|n| n.entity_id.as_str()).collect();
    let t_set: HashSet<&str> = semantic.iter().map(|n| n.entity_id.as_str()).collect();
    let overlap_count = s_set.intersection(&t_set).count();
    let union = s_set.union(&t_set).count();
    let jaccard = if union == 0 {
        0.0
    } else {
        overlap_count as f32 / union as f32
    };

    Ok(NeighborComparison {
        entity_id: id.to_string(),
        requested_k: k,
        structural,
        semantic,
        overlap_count,
        jaccard,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode;
    use crate::corpus::CorpusBuilder;
    use crate::semantic::Embedding;
    use crate::Error;

    fn corpus() -> CorpusSnapshot {
        let mut b = CorpusBuilder::new();
        b.set_code("query", decode("FF000000").unwrap());
        b.set_embedding(Embedding::new("query", vec![1.0, 0.0])).unwrap();

        b.set_code("close", decode("FF000001").unwrap());
        b.set_embedding(Embedding::new("close", vec![0.9, 0.1])).unwrap();

        b.set_code("mid", decode("FF00FFFF").unwrap());
        b.set_embedding(Embedding::new("mid", vec![0.0, 1.0])).unwrap();

        b.set_code("far", decode("00FFFFFF").unwrap());
        b.set_embedding(Embedding::new("far", vec![-1.0, 0.0])).unwrap();

        // Only one datum each
        b.set_code("code_only", decode("FF000003").unwrap());
        b.set_embedding(Embedding::new("embed_only", vec![0.95, 0.05]))
            .unwrap();
        b.build()
    }

    #[test]
    fn test_structural_ranking_excludes_query() {
        let c = corpus();
        let top = neighbors(&c, "query", Metric::Structural, 10).unwrap();
        assert!(top.iter().all(|n| n.entity_id != "query"));
        // close (1 bit), code_only (2 bits), mid (16 bits), far (32 bits)
        let ids: Vec<&str> = top.iter().map(|n| n.entity_id.as_str()).collect();
        assert_eq!(ids, vec!["close", "code_only", "mid", "far"]);
        assert_eq!(top[0].rank, 1);
        assert_eq!(top[3].rank, 4);
        for window in top.windows(2) {
            assert!(window[0].score >= window[1].score);
        }
    }

    #[test]
    fn test_semantic_ranking() {
        let c = corpus();
        let top = neighbors(&c, "query", Metric::Semantic, 10).unwrap();
        let ids: Vec<&str> = top.iter().map(|n| n.entity_id.as_str()).collect();
        // embed_only and close are near-duplicates of the query direction
        assert_eq!(ids, vec!["embed_only", "close", "mid", "far"]);
        assert!((0.0..=1.0).contains(&top[0].score));
        assert!(top[3].score < 1e-6); // opposite direction maps to 0
    }

    #[test]
    fn test_k_truncates_and_caps() {
        let c = corpus();
        let top2 = neighbors(&c, "query", Metric::Structural, 2).unwrap();
        assert_eq!(top2.len(), 2);

        let capped = neighbors(&c, "query", Metric::Structural, 1000).unwrap();
        assert_eq!(capped.len(), 4); // everything scorable except the query
    }

    #[test]
    fn test_query_errors() {
        let c = corpus();
        assert!(matches!(
            neighbors(&c, "ghost", Metric::Structural, 3),
            Err(Error::UnknownEntity(_))
        ));
        assert!(matches!(
            neighbors(&c, "embed_only", Metric::Structural, 3),
            Err(Error::MissingCode(_))
        ));
        assert!(matches!(
            neighbors(&c, "code_only", Metric::Semantic, 3),
            Err(Error::MissingEmbedding(_))
        ));
    }

    #[test]
    fn test_comparison_overlap() {
        let c = corpus();
        let cmp = compare(&c, "query", 2).unwrap();
        // Structural top-2: close, code_only. Semantic top-2: embed_only, close.
        assert_eq!(cmp.overlap_count, 1);
        assert_eq!(cmp.structural.len(), 2);
        assert_eq!(cmp.semantic.len(), 2);
        // union = {close, code_only, embed_only}
        assert!((cmp.jaccard - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_comparison_on_lonely_corpus() {
        let mut b = CorpusBuilder::new();
        b.set_code("solo", decode("FF000000").unwrap());
        b.set_embedding(Embedding::new("solo", vec![1.0])).unwrap();
        let c = b.build();

        let cmp = compare(&c, "solo", 5).unwrap();
        assert!(cmp.structural.is_empty());
        assert!(cmp.semantic.is_empty());
        assert_eq!(cmp.overlap_count, 0);
        assert_eq!(cmp.jaccard, 0.0);
    }

    #[test]
    fn test_deterministic_tie_order() {
        let mut b = CorpusBuilder::new();
        b.set_code("q", decode("00000000").unwrap());
        // Both at Hamming distance 1 from q, so scores tie
        b.set_code("tie_b", decode("00000001").unwrap());
        b.set_code("tie_a", decode("00000002").unwrap());
        let c = b.build();

        let top = neighbors(&c, "q", Metric::Structural, 2).unwrap();
        assert_eq!(top[0].entity_id, "tie_a");
        assert_eq!(top[1].entity_id, "tie_b");
    }
}
