//! Seeded correlation sampling between the two metrics.
//!
//! Draws N unordered entity pairs uniformly without replacement from the
//! eligible pool (entities holding both a code and a usable embedding),
//! evaluates both similarities per pair, and reports the Pearson
//! correlation across the sample. A fixed seed reproduces the exact same
//! pairs and coefficient; every call builds its own RNG, so concurrent
//! samples never perturb each other.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::warn;

use crate::corpus::{CorpusSnapshot, EntityId};
use crate::semantic::{cosine_similarity, unit_interval};
use crate::structural::structural_similarity;
use crate::{Error, Result};

/// Both similarity readings for one unordered pair, unit interval, with
/// `entity_a < entity_b` (canonical pair order).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarityPair {
    pub entity_a: EntityId,
    pub entity_b: EntityId,
    pub structural: f32,
    pub semantic: f32,
    pub disagreement: f32,
}

/// One correlation sample and its headline statistic.
#[derive(Debug, Clone, Serialize)]
pub struct CorrelationReport {
    pub requested: usize,
    /// Pairs actually evaluated (after clipping and skips).
    pub sampled: usize,
    /// Total unordered pairs available in the eligible pool.
    pub population: u64,
    pub clipped: bool,
    /// Pairs dropped because a similarity failed to evaluate.
    pub skipped: usize,
    pub seed: u64,
    /// Pearson coefficient over (structural, semantic); 0.0 when either
    /// metric has no variance across the sample.
    pub correlation: f32,
    pub pairs: Vec<SimilarityPair>,
}

/// Draw a seeded correlation sample from the corpus.
pub fn sample(corpus: &CorpusSnapshot, requested: usize, seed: u64) -> Result<CorrelationReport> {
    if requested == 0 {
        return Err(Error::InvalidConfig(
            "sample size must be at least 1".to_string(),
        ));
    }

    let pool = corpus.eligible();
    if pool.len() < 2 {
        return Err(Error::EmptyCorpus {
            op: "correlation sample",
            min: 2,
            got: pool.len(),
        });
    }

    let m = pool.len() as u64;
    let population = m * (m - 1) / 2;
    let clipped = requested as u64 > population;
    if clipped {
        warn!(requested, population, "correlation sample clipped to population");
    }

    // Pair ranks in canonical row-major order, ascending
    let ranks: Vec<u64> = if clipped || requested as u64 == population {
        (0..population).collect()
    } else {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut picked: Vec<u64> = rand::seq::index::sample(&mut rng, population as usize, requested)
            .into_iter()
            .map(|r| r as u64)
            .collect();
        picked.sort_unstable();
        picked
    };

    let mut pairs = Vec::with_capacity(ranks.len());
    let mut skipped = 0usize;
    for rank in ranks {
        let (i, j) = pair_at_rank(m, rank);
        match evaluate_pair(corpus, pool[i], pool[j]) {
            Ok(pair) => pairs.push(pair),
            Err(err) => {
                skipped += 1;
                warn!(entity_a = %pool[i], entity_b = %pool[j], %err, "pair skipped in sample");
            }
        }
    }

    let correlation = pearson(&pairs);

    Ok(CorrelationReport {
        requested,
        sampled: pairs.len(),
        population,
        clipped,
        skipped,
        seed,
        correlation,
        pairs,
    })
}

/// Evaluate both metrics for one pair, unit interval, canonical order.
pub(crate) fn evaluate_pair(
    corpus: &CorpusSnapshot,
    a: &str,
    b: &str,
) -> Result<SimilarityPair> {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    let structural = structural_similarity(corpus.code_of(first)?, corpus.code_of(second)?);
    let cos = cosine_similarity(corpus.embedding_of(first)?, corpus.embedding_of(second)?)?;
    let semantic = unit_interval(cos);
    Ok(SimilarityPair {
        entity_a: first.to_string(),
        entity_b: second.to_string(),
        structural,
        semantic,
        disagreement: (semantic - structural).abs(),
    })
}

/// Invert the canonical rank: pairs (i, j), i < j over a pool of `m`,
/// enumerated row-major. `cum(i)` pairs precede row `i`, where
/// `cum(i) = i*(m-1) - i*(i-1)/2`; binary search finds the row exactly.
fn pair_at_rank(m: u64, rank: u64) -> (usize, usize) {
    let cum = |i: u64| i * (m - 1) - i.saturating_sub(1) * i / 2;
    let (mut lo, mut hi) = (0u64, m - 1);
    while lo < hi {
        let mid = (lo + hi + 1) / 2;
        if cum(mid) <= rank {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    let i = lo;
    let j = i + 1 + (rank - cum(i));
    (i as usize, j as usize)
}

/// Pearson over the sampled (structural, semantic) values. Degenerate
/// samples (fewer than 2 pairs, or zero variance in either metric) yield
/// 0.0 with a warning rather than NaN.
fn pearson(pairs: &[SimilarityPair]) -> f32 {
    if pairs.len() < 2 {
        warn!(sampled = pairs.len(), "sample too small for correlation");
        return 0.0;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.structural as f64).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.semantic as f64).sum::<f64>() / n;

    let mut cov = 0.0f64;
    let mut var_x = 0.0f64;
    let mut var_y = 0.0f64;
    for p in pairs {
        let dx = p.structural as f64 - mean_x;
        let dy = p.semantic as f64 - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        warn!("zero variance in sample, correlation degenerates to 0.0");
        return 0.0;
    }

    (cov / (var_x * var_y).sqrt()).clamp(-1.0, 1.0) as f32
}
