//! Versioned, immutable corpus snapshots.
//!
//! A snapshot maps opaque entity ids to whatever structural and semantic
//! data upstream pipelines have produced so far. Refresh never mutates in
//! place: the owner builds a new snapshot aside and swaps the `Arc`, so a
//! long analytics pass reads one consistent corpus end to end and readers
//! never observe a half-applied refresh.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::codec::TraitVector;
use crate::semantic::Embedding;
use crate::{Error, Result};

/// Opaque entity identifier. Lexicographic order doubles as the
/// deterministic tie order everywhere.
pub type EntityId = String;

/// Everything the corpus knows about one entity. Either datum may lag the
/// other while upstream pipelines catch up.
#[derive(Debug, Clone, Default)]
pub struct EntityRecord {
    pub code: Option<TraitVector>,
    pub embedding: Option<Embedding>,
}

impl EntityRecord {
    /// Embedding fit for a cosine, if any. Absent and zero-norm both
    /// count as unavailable.
    pub fn usable_embedding(&self) -> Option<&Embedding> {
        self.embedding.as_ref().filter(|e| e.is_usable())
    }
}

/// Accumulates entity data, then freezes it into a [`CorpusSnapshot`].
#[derive(Debug, Default)]
pub struct CorpusBuilder {
    records: BTreeMap<EntityId, EntityRecord>,
    dim: Option<usize>,
}

impl CorpusBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an entity's trait vector.
    pub fn set_code(&mut self, id: impl Into<EntityId>, code: TraitVector) -> &mut Self {
        self.records.entry(id.into()).or_default().code = Some(code);
        self
    }

    /// Record an entity's embedding, keyed by the id the embedding carries.
    /// All embeddings in one corpus must agree on dimension.
    pub fn set_embedding(&mut self, embedding: Embedding) -> Result<()> {
        match self.dim {
            None => self.dim = Some(embedding.dim()),
            Some(dim) if dim != embedding.dim() => {
                return Err(Error::DimensionMismatch {
                    left: dim,
                    right: embedding.dim(),
                });
            }
            Some(_) => {}
        }
        let id = embedding.entity().to_string();
        self.records.entry(id).or_default().embedding = Some(embedding);
        Ok(())
    }

    /// Register an entity with no data yet (it still counts in totals).
    pub fn touch(&mut self, id: impl Into<EntityId>) -> &mut Self {
        self.records.entry(id.into()).or_default();
        self
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Freeze with version 0 (standalone use; the engine stamps real
    /// versions at publish time).
    pub fn build(self) -> CorpusSnapshot {
        self.build_versioned(0)
    }

    /// Freeze with an explicit version.
    pub fn build_versioned(self, version: u64) -> CorpusSnapshot {
        CorpusSnapshot {
            version,
            built_at: Utc::now(),
            dim: self.dim,
            records: self.records,
        }
    }
}

/// Immutable view of the corpus at one refresh. Published as
/// `Arc<CorpusSnapshot>` and replaced wholesale, never edited.
#[derive(Debug)]
pub struct CorpusSnapshot {
    version: u64,
    built_at: DateTime<Utc>,
    dim: Option<usize>,
    records: BTreeMap<EntityId, EntityRecord>,
}

impl CorpusSnapshot {
    /// Empty snapshot, version 0.
    pub fn empty() -> Self {
        CorpusBuilder::new().build()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    /// Uniform embedding dimension, once any embedding has been seen.
    pub fn embedding_dim(&self) -> Option<usize> {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&EntityRecord> {
        self.records.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    /// Record lookup that treats an unknown id as an error.
    pub fn record_of(&self, id: &str) -> Result<&EntityRecord> {
        self.records
            .get(id)
            .ok_or_else(|| Error::UnknownEntity(id.to_string()))
    }

    /// Trait vector for an entity, or why there is none.
    pub fn code_of(&self, id: &str) -> Result<TraitVector> {
        self.record_of(id)?
            .code
            .ok_or_else(|| Error::MissingCode(id.to_string()))
    }

    /// Usable embedding for an entity, or why there is none. Zero-norm
    /// vectors report as their own error so callers can tell a pipeline
    /// gap from a degenerate vector.
    pub fn embedding_of(&self, id: &str) -> Result<&Embedding> {
        let record = self.record_of(id)?;
        match &record.embedding {
            None => Err(Error::MissingEmbedding(id.to_string())),
            Some(e) if !e.is_usable() => Err(Error::ZeroNormEmbedding(id.to_string())),
            Some(e) => Ok(e),
        }
    }

    /// All records in ascending id order.
    pub fn records(&self) -> impl Iterator<Item = (&EntityId, &EntityRecord)> {
        self.records.iter()
    }

    /// Entities with a code, ascending id order.
    pub fn coded(&self) -> impl Iterator<Item = (&EntityId, TraitVector)> {
        self.records
            .iter()
            .filter_map(|(id, r)| r.code.map(|c| (id, c)))
    }

    /// Entities with a usable embedding, ascending id order.
    pub fn embedded(&self) -> impl Iterator<Item = (&EntityId, &Embedding)> {
        self.records
            .iter()
            .filter_map(|(id, r)| r.usable_embedding().map(|e| (id, e)))
    }

    /// Entities with both a code and a usable embedding, ascending. This
    /// is the pair pool for correlation and outlier scans.
    pub fn eligible(&self) -> Vec<&EntityId> {
        self.records
            .iter()
            .filter(|(_, r)| r.code.is_some() && r.usable_embedding().is_some())
            .map(|(id, _)| id)
            .collect()
    }

    pub fn stats(&self) -> CorpusStats {
        let mut stats = CorpusStats {
            version: self.version,
            total: self.records.len(),
            ..CorpusStats::default()
        };
        for record in self.records.values() {
            let coded = record.code.is_some();
            let embedded = record.usable_embedding().is_some();
            if coded {
                stats.with_code += 1;
            }
            if embedded {
                stats.with_embedding += 1;
            }
            if coded && embedded {
                stats.eligible += 1;
            }
        }
        stats
    }
}

/// Corpus coverage counts. `with_embedding` counts usable embeddings
/// only; zero-norm vectors are unavailable data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CorpusStats {
    pub version: u64,
    pub total: usize,
    pub with_code: usize,
    pub with_embedding: usize,
    pub eligible: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode;

    fn snapshot() -> CorpusSnapshot {
        let mut b = CorpusBuilder::new();
        b.set_code("both", decode("FF000000").unwrap());
        b.set_embedding(Embedding::new("both", vec![1.0, 0.0])).unwrap();
        b.set_code("code_only", decode("0000FFFF").unwrap());
        b.set_embedding(Embedding::new("embed_only", vec![0.0, 1.0]))
            .unwrap();
        b.set_code("husk", decode("12345678").unwrap());
        b.set_embedding(Embedding::new("husk", vec![0.0, 0.0])).unwrap();
        b.touch("bare");
        b.build_versioned(7)
    }

    #[test]
    fn test_stats_counts_usable_only() {
        let c = snapshot();
        let stats = c.stats();
        assert_eq!(stats.version, 7);
        assert_eq!(stats.total, 5);
        assert_eq!(stats.with_code, 3);
        assert_eq!(stats.with_embedding, 2); // husk's zero-norm excluded
        assert_eq!(stats.eligible, 1); // only "both"
    }

    #[test]
    fn test_lookup_errors() {
        let c = snapshot();
        assert!(matches!(c.record_of("ghost"), Err(Error::UnknownEntity(_))));
        assert!(matches!(c.code_of("embed_only"), Err(Error::MissingCode(_))));
        assert!(matches!(
            c.embedding_of("code_only"),
            Err(Error::MissingEmbedding(_))
        ));
        assert!(matches!(
            c.embedding_of("husk"),
            Err(Error::ZeroNormEmbedding(_))
        ));
        assert!(c.embedding_of("both").is_ok());
        assert!(c.code_of("both").is_ok());
    }

    #[test]
    fn test_iteration_is_ordered() {
        let c = snapshot();
        let ids: Vec<&str> = c.records().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["bare", "both", "code_only", "embed_only", "husk"]);

        let eligible: Vec<&str> = c.eligible().into_iter().map(|s| s.as_str()).collect();
        assert_eq!(eligible, vec!["both"]);
    }

    #[test]
    fn test_dimension_enforced_at_insert() {
        let mut b = CorpusBuilder::new();
        b.set_embedding(Embedding::new("a", vec![1.0, 2.0])).unwrap();
        let err = b.set_embedding(Embedding::new("b", vec![1.0, 2.0, 3.0]));
        assert!(matches!(
            err,
            Err(Error::DimensionMismatch { left: 2, right: 3 })
        ));
    }

    #[test]
    fn test_empty_snapshot() {
        let c = CorpusSnapshot::empty();
        assert!(c.is_empty());
        assert_eq!(c.version(), 0);
        assert_eq!(c.stats().eligible, 0);
    }
}
