//! Engine facade.
//!
//! One handle that owns the published corpus snapshot, the projection
//! store, and the configuration, and exposes every analytics operation as
//! a plain method. Transport layers (HTTP, RPC, CLI) wrap these methods;
//! nothing here knows about wire formats beyond serde derives on the
//! DTOs the operations return.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};

use crate::codec;
use crate::config::EngineConfig;
use crate::corpus::{CorpusBuilder, CorpusSnapshot, CorpusStats, EntityId};
use crate::correlation::{self, CorrelationReport};
use crate::neighbors::{self, Metric, Neighbor, NeighborComparison};
use crate::outliers::{self, OutlierReport};
use crate::projection::{
    ClusterReport, JobHandle, JobStatus, Method, ProjectionSnapshot, ProjectionStats,
    ProjectionStore, SubsetProjection,
};
use crate::structural::{self, CodeMatch};
use crate::Result;

pub struct SimilarityEngine {
    config: EngineConfig,
    corpus: RwLock<Arc<CorpusSnapshot>>,
    version: AtomicU64,
    store: ProjectionStore,
}

impl SimilarityEngine {
    /// Stand up an engine with an empty corpus. Fails on invalid
    /// configuration, never on anything else.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let store = ProjectionStore::new(config.projection.clone())?;
        info!(
            sampler_seed = config.sampler_seed,
            default_top_k = config.default_top_k,
            methods = config.projection.methods.len(),
            "similarity engine ready"
        );
        Ok(Self {
            config,
            corpus: RwLock::new(Arc::new(CorpusSnapshot::empty())),
            version: AtomicU64::new(0),
            store,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // === Corpus management ===

    /// Publish a freshly built corpus under the next version number.
    /// Operations already holding the previous snapshot finish on it;
    /// everything that starts afterwards sees the new one.
    pub fn replace_corpus(&self, builder: CorpusBuilder) -> CorpusStats {
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        let snapshot = Arc::new(builder.build_versioned(version));
        let stats = snapshot.stats();
        *self.corpus.write() = snapshot;
        info!(
            version,
            total = stats.total,
            with_code = stats.with_code,
            with_embedding = stats.with_embedding,
            "corpus replaced"
        );
        stats
    }

    /// Current snapshot as a cheap owned handle.
    pub fn corpus(&self) -> Arc<CorpusSnapshot> {
        Arc::clone(&self.corpus.read())
    }

    pub fn corpus_stats(&self) -> CorpusStats {
        self.corpus().stats()
    }

    // === Similarity operations ===

    /// Top-K neighbors of an entity under one metric, self excluded.
    pub fn entity_neighbors(&self, id: &str, metric: Metric, k: usize) -> Result<Vec<Neighbor>> {
        neighbors::neighbors(&self.corpus(), id, metric, k)
    }

    /// Neighbors with the configured default K.
    pub fn default_neighbors(&self, id: &str, metric: Metric) -> Result<Vec<Neighbor>> {
        self.entity_neighbors(id, metric, self.config.default_top_k)
    }

    /// Top-K under both metrics plus overlap and Jaccard agreement.
    pub fn neighbor_comparison(&self, id: &str, k: usize) -> Result<NeighborComparison> {
        neighbors::compare(&self.corpus(), id, k)
    }

    /// Seeded correlation sample with the configured default seed.
    pub fn correlation_sample(&self, requested: usize) -> Result<CorrelationReport> {
        self.correlation_sample_seeded(requested, self.config.sampler_seed)
    }

    /// Correlation sample with an explicit seed. Requests beyond the
    /// configured ceiling are clipped before sampling, so the report's
    /// `requested` reflects the clipped count.
    pub fn correlation_sample_seeded(
        &self,
        requested: usize,
        seed: u64,
    ) -> Result<CorrelationReport> {
        let capped = if requested > self.config.max_sample_pairs {
            warn!(
                requested,
                max = self.config.max_sample_pairs,
                "correlation sample clipped to configured ceiling"
            );
            self.config.max_sample_pairs
        } else {
            requested
        };
        correlation::sample(&self.corpus(), capped, seed)
    }

    /// Entities whose metrics disagree by at least `threshold`.
    pub fn outliers(&self, threshold: f32, limit: usize) -> Result<OutlierReport> {
        outliers::detect(&self.corpus(), threshold, limit)
    }

    /// Threshold query straight off a structural code: everything with at
    /// least `min_matching_bits` positions in common with `code`.
    pub fn similar_by_code(&self, code: &str, min_matching_bits: u32) -> Result<Vec<CodeMatch>> {
        let query = codec::decode(code)?;
        structural::similar_entities(&self.corpus(), query, min_matching_bits)
    }

    // === Projection operations ===

    /// Cluster summaries for one method at one resolution level.
    pub fn clusters(&self, method: Method, level: u32) -> Result<ClusterReport> {
        self.store.clusters(method, level)
    }

    /// Latest published snapshot for a method.
    pub fn projection_snapshot(&self, method: Method) -> Result<Arc<ProjectionSnapshot>> {
        self.store.snapshot(method)
    }

    /// Synchronous projection of a caller-chosen entity subset.
    pub fn subset_projection(&self, ids: &[EntityId], method: Method) -> Result<SubsetProjection> {
        self.store.compute_subset(&self.corpus(), ids, method)
    }

    /// Start (or join) a background recompute against the current corpus.
    pub fn trigger_recompute(&self, method: Method) -> Result<JobHandle> {
        self.store.trigger_recompute(self.corpus(), method)
    }

    /// Recompute every configured method against the current corpus.
    pub fn trigger_recompute_all(&self) -> Result<Vec<JobHandle>> {
        let corpus = self.corpus();
        self.config
            .projection
            .methods
            .iter()
            .map(|method| self.store.trigger_recompute(Arc::clone(&corpus), *method))
            .collect()
    }

    /// Status of the latest recompute for a method, if any was triggered.
    pub fn job_status(&self, method: Method) -> Option<JobStatus> {
        self.store.job_status(method)
    }

    pub fn projection_stats(&self) -> ProjectionStats {
        self.store.stats(&self.corpus())
    }
}

impl std::fmt::Debug for SimilarityEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimilarityEngine")
            .field("corpus_version", &self.corpus.read().version())
            .field("store", &self.store)
            .finish()
    }
}
