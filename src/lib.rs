//! # Traitspace
//!
//! Structural-semantic similarity engine: every entity carries a 32-bit
//! trait vector (4 layers of 8 canonical traits) rendered as an 8-character
//! hex structural code, plus a high-dimensional semantic embedding. This
//! crate is the codec between the two code forms, the two similarity
//! metrics (Hamming over trait bits, cosine over embeddings), and the
//! analytics that compare them: neighbor retrieval, correlation sampling,
//! disagreement outliers, and the 2D projection/cluster store.
//!
//! ## Quick Start
//! ```rust,ignore
//! use traitspace::{CorpusBuilder, Embedding, EngineConfig, Method, Metric, SimilarityEngine};
//!
//! // Encode 32 ordered trait judgments into a structural code
//! let (vector, code) = traitspace::codec::encode(&judgments)?;
//! assert_eq!(code.to_string().len(), 8); // e.g. "FF000000"
//!
//! // Build a corpus snapshot and stand up the engine
//! let mut corpus = CorpusBuilder::new();
//! corpus.set_code("entity-1", vector);
//! corpus.set_embedding(Embedding::new("entity-1", values))?;
//! let engine = SimilarityEngine::new(EngineConfig::default())?;
//! engine.replace_corpus(corpus);
//!
//! // Compare the two metrics
//! let neighbors = engine.entity_neighbors("entity-1", Metric::Structural, 10)?;
//! let comparison = engine.neighbor_comparison("entity-1", 10)?;
//! let report = engine.correlation_sample(500)?;
//! let outliers = engine.outliers(0.5, 20)?;
//!
//! // Projection snapshots for the exploratory map
//! let job = engine.trigger_recompute(Method::Pca)?;
//! let clusters = engine.clusters(Method::Pca, 1)?;
//! ```
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         TRAITSPACE                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │   Judgments → TraitVector (u32) ⇄ StructuralCode ("FF000000")   │
//! │   Structural → XOR + popcount over 32 bits (1 - d/32)           │
//! │   Semantic   → cosine over embeddings (signed inside,           │
//! │                unit interval at the boundary)                   │
//! │   Analytics  → neighbors · correlation sample · outliers        │
//! │   Store      → per-method 2D projections, density clusters,     │
//! │                atomic snapshot swap, background recompute       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

// === Core modules ===
pub mod codec;
pub mod config;
pub mod corpus;
pub mod correlation;
pub mod engine;
pub mod layer;
pub mod neighbors;
pub mod outliers;
pub mod projection;
pub mod semantic;
pub mod structural;

// === Re-exports for convenience ===

// Codec types
pub use crate::codec::{JudgmentAssembly, StructuralCode, TraitVector, decode, encode};

// Layers
pub use crate::layer::Layer;

// Corpus
pub use crate::corpus::{CorpusBuilder, CorpusSnapshot, CorpusStats, EntityRecord};

// Metrics
pub use crate::semantic::{Embedding, cosine_similarity, unit_interval};
pub use crate::structural::{hamming, hamming_by_layer, structural_similarity, CodeMatch};

// Analytics
pub use crate::correlation::{CorrelationReport, SimilarityPair};
pub use crate::neighbors::{Metric, Neighbor, NeighborComparison};
pub use crate::outliers::OutlierReport;

// Projection store
pub use crate::projection::{
    ClusterReport, JobHandle, JobStatus, Method, ProjectionPoint, ProjectionSnapshot,
    ProjectionStats, SubsetProjection,
};

// Engine facade
pub use crate::config::{EngineConfig, ProjectionConfig, ResolutionParams};
pub use crate::engine::SimilarityEngine;

// === Error types ===

/// Crate-level error type.
///
/// Variants fall into four families: validation (malformed caller input),
/// missing data (an entity lacks the datum an operation needs), capacity
/// (requests the corpus cannot serve at all), and computation (background
/// math that failed partway). Oversized-but-servable requests are clipped
/// with a log line instead of surfacing here.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("expected exactly {expected} trait judgments, got {got}")]
    TraitCount { expected: usize, got: usize },

    #[error("malformed structural code {code:?}: {reason}")]
    MalformedCode { code: String, reason: &'static str },

    #[error("trait index {0} out of range 1..=32")]
    TraitIndex(usize),

    #[error("judgment for trait {0} already recorded")]
    DuplicateJudgment(usize),

    #[error("threshold {0} outside [0, 1]")]
    ThresholdRange(f32),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("resolution level {0} is not configured")]
    UnknownResolution(u32),

    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    #[error("entity {0} has no embedding")]
    MissingEmbedding(String),

    #[error("entity {0} has no structural code")]
    MissingCode(String),

    #[error("embedding for {0} has zero norm")]
    ZeroNormEmbedding(String),

    #[error("embedding dimension mismatch: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },

    #[error("no projection snapshot for method {0}; trigger a recompute first")]
    SnapshotMissing(String),

    #[error("{op} needs at least {min} eligible entities, corpus has {got}")]
    EmptyCorpus {
        op: &'static str,
        min: usize,
        got: usize,
    },

    #[error("subset too small to project: {got} usable entities, need at least {min}")]
    SubsetTooSmall { got: usize, min: usize },

    #[error("computation failed: {0}")]
    Computation(String),

    #[error("projection job unavailable: {0}")]
    JobUnavailable(String),
}

pub type Result<T> = std::result::Result<T, Error>;

// === Constants ===

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Trait vector geometry (32 traits, one bit each; 4 layers × 8 traits)
pub const TRAIT_BITS: usize = 32;
pub const LAYER_COUNT: usize = 4;
pub const LAYER_BITS: usize = 8;

/// Structural code length in hex characters (2 per layer)
pub const CODE_CHARS: usize = 8;
