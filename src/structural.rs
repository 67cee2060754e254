//! Structural similarity: Hamming distance over the 32 trait bits.
//!
//! A code fits in a register, so the metric is one XOR and a popcount and
//! the corpus scan is an exact brute-force pass. No index structure earns
//! its keep at 32 bits.

use serde::Serialize;

use crate::codec::{StructuralCode, TraitVector};
use crate::corpus::{CorpusSnapshot, EntityId};
use crate::{Error, Result, TRAIT_BITS};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Hamming distance over all 32 trait bits. Symmetric.
#[inline]
pub fn hamming(a: TraitVector, b: TraitVector) -> u32 {
    (a.as_raw() ^ b.as_raw()).count_ones()
}

/// Distance split per layer, in code order. Components sum to `hamming`.
pub fn hamming_by_layer(a: TraitVector, b: TraitVector) -> [u32; 4] {
    TraitVector::from_raw(a.as_raw() ^ b.as_raw()).layer_activations()
}

/// Structural similarity `1 - hamming/32`, in [0, 1]. Exactly 1 for
/// identical codes, exactly 0 for complementary ones.
#[inline]
pub fn structural_similarity(a: TraitVector, b: TraitVector) -> f32 {
    1.0 - (hamming(a, b) as f32 / TRAIT_BITS as f32)
}

/// One hit from a threshold scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodeMatch {
    pub entity_id: EntityId,
    pub code: StructuralCode,
    pub hamming: u32,
    pub similarity: f32,
}

fn max_distance(min_matching_bits: u32) -> Result<u32> {
    if min_matching_bits as usize > TRAIT_BITS {
        return Err(Error::InvalidConfig(format!(
            "min_matching_bits {} exceeds {}",
            min_matching_bits, TRAIT_BITS
        )));
    }
    Ok(TRAIT_BITS as u32 - min_matching_bits)
}

/// Entities whose codes match `query` in at least `min_matching_bits`
/// positions. The bit floor becomes a Hamming ceiling exactly once, here:
/// `d <= 32 - min_matching_bits`. Results sorted by ascending distance,
/// ties by entity id.
#[cfg(feature = "parallel")]
pub fn similar_entities(
    corpus: &CorpusSnapshot,
    query: TraitVector,
    min_matching_bits: u32,
) -> Result<Vec<CodeMatch>> {
    let max_dist = max_distance(min_matching_bits)?;
    let coded: Vec<(&EntityId, TraitVector)> = corpus.coded().collect();
    let mut matches: Vec<CodeMatch> = coded
        .par_iter()
        .filter_map(|(id, code)| {
            let d = hamming(query, *code);
            if d <= max_dist {
                Some(CodeMatch {
                    entity_id: (*id).clone(),
                    code: code.code(),
                    hamming: d,
                    similarity: structural_similarity(query, *code),
                })
            } else {
                None
            }
        })
        .collect();
    matches.sort_by(|a, b| a.hamming.cmp(&b.hamming).then_with(|| a.entity_id.cmp(&b.entity_id)));
    Ok(matches)
}

#[cfg(not(feature = "parallel"))]
pub fn similar_entities(
    corpus: &CorpusSnapshot,
    query: TraitVector,
    min_matching_bits: u32,
) -> Result<Vec<CodeMatch>> {
    let max_dist = max_distance(min_matching_bits)?;
    let mut matches: Vec<CodeMatch> = corpus
        .coded()
        .filter_map(|(id, code)| {
            let d = hamming(query, code);
            if d <= max_dist {
                Some(CodeMatch {
                    entity_id: id.clone(),
                    code: code.code(),
                    hamming: d,
                    similarity: structural_similarity(query, code),
                })
            } else {
                None
            }
        })
        .collect();
    matches.sort_by(|a, b| a.hamming.cmp(&b.hamming).then_with(|| a.entity_id.cmp(&b.entity_id)));
    Ok(matches)
}
