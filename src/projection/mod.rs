//! 2D projection and multi-resolution clustering.
//!
//! ```text
//!   embeddings ──► method::Reducer ──► points in [-1,1]²
//!                                        │
//!                                        ▼
//!                         cluster::dbscan per resolution level
//!                                        │
//!                                        ▼
//!                  store::ProjectionSnapshot (published atomically)
//! ```
//!
//! The store owns the published snapshots and the background jobs that
//! rebuild them; `method` holds the interchangeable reducers; `cluster`
//! turns one set of points into per-resolution cluster reports.

pub mod cluster;
pub mod method;
pub mod store;

use serde::Serialize;

use crate::corpus::EntityId;

pub use cluster::{ClusterAssignment, ClusterSummary, ResolutionClusters};
pub use method::{
    reducer_for, MdsReducer, Method, PcaReducer, RandomProjectionReducer, Reducer,
};
pub use store::{
    ClusterReport, JobHandle, JobStatus, MethodStats, ProjectionSnapshot, ProjectionStats,
    ProjectionStore, SubsetProjection,
};

/// One entity placed in a 2D snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectionPoint {
    pub entity_id: EntityId,
    pub method: Method,
    pub x: f32,
    pub y: f32,
}
