//! Semantic similarity: cosine over entity embeddings.
//!
//! The raw signed cosine in [-1, 1] is the internal value everywhere; the
//! analytics that report unit-interval scores convert exactly once, at
//! their boundary, via [`unit_interval`]. A similarity here never comes
//! back NaN: degenerate inputs are errors instead.

use crate::corpus::EntityId;
use crate::{Error, Result};

/// One entity's embedding: owning entity id, vector, and the model that
/// produced it. The norm is fixed at construction so usability checks and
/// cosines never rescan the vector.
#[derive(Debug, Clone)]
pub struct Embedding {
    entity: EntityId,
    values: Vec<f32>,
    model: Option<String>,
    norm: f32,
}

impl Embedding {
    pub fn new(entity: impl Into<EntityId>, values: Vec<f32>) -> Self {
        let norm = values.iter().map(|x| x * x).sum::<f32>().sqrt();
        Self {
            entity: entity.into(),
            values,
            model: None,
            norm,
        }
    }

    /// Tag with the model identifier that produced the vector.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn norm(&self) -> f32 {
        self.norm
    }

    /// False when the vector cannot support a cosine: empty, zero norm,
    /// or a non-finite component poisoning the norm.
    #[inline]
    pub fn is_usable(&self) -> bool {
        self.norm.is_finite() && self.norm > 0.0
    }
}

/// Raw signed cosine in [-1, 1].
///
/// Dimension mismatches and unusable vectors are errors naming the
/// offending entity, never a NaN result.
pub fn cosine_similarity(a: &Embedding, b: &Embedding) -> Result<f32> {
    if a.dim() != b.dim() {
        return Err(Error::DimensionMismatch {
            left: a.dim(),
            right: b.dim(),
        });
    }
    if !a.is_usable() {
        return Err(Error::ZeroNormEmbedding(a.entity.clone()));
    }
    if !b.is_usable() {
        return Err(Error::ZeroNormEmbedding(b.entity.clone()));
    }

    let dot: f32 = a.values.iter().zip(&b.values).map(|(x, y)| x * y).sum();
    let value = dot / (a.norm * b.norm);
    if !value.is_finite() {
        return Err(Error::Computation(format!(
            "non-finite cosine between {} and {}",
            a.entity, b.entity
        )));
    }
    // Accumulated rounding can land a hair past ±1
    Ok(value.clamp(-1.0, 1.0))
}

/// Map a signed cosine onto [0, 1] for reporting: `(cos + 1) / 2`.
#[inline]
pub fn unit_interval(cosine: f32) -> f32 {
    ((cosine + 1.0) / 2.0).clamp(0.0, 1.0)
}
