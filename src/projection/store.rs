//! Projection snapshot store.
//!
//! Snapshots are computed aside on a worker thread and published with one
//! map insert under a write lock, so readers either see the previous
//! snapshot whole or the new one whole. Each method has at most one job
//! in flight; triggering again while it runs hands back the same handle.
//! Cancellation is cooperative: the worker checks a flag between phases
//! and leaves the published snapshot untouched when it stops early.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle as ThreadHandle};
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::ProjectionConfig;
use crate::corpus::{CorpusSnapshot, EntityId};
use crate::{Error, Result};

use super::cluster::{cluster_points, ClusterSummary, ResolutionClusters};
use super::method::reducer_for;
use super::{Method, ProjectionPoint};

// === Snapshots and reports ===

/// One published projection: every embedded entity placed in 2D, plus the
/// clustering ladder computed from those placements.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectionSnapshot {
    pub method: Method,
    pub corpus_version: u64,
    pub computed_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub points: Vec<ProjectionPoint>,
    pub resolutions: Vec<ResolutionClusters>,
}

impl ProjectionSnapshot {
    pub fn resolution(&self, level: u32) -> Option<&ResolutionClusters> {
        self.resolutions.iter().find(|r| r.level == level)
    }
}

/// Cluster summaries for one method at one resolution level.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterReport {
    pub method: Method,
    pub level: u32,
    pub eps: f32,
    pub min_points: usize,
    pub corpus_version: u64,
    pub computed_at: DateTime<Utc>,
    pub point_count: usize,
    /// Points assigned to some cluster; `clustered_count + noise_count ==
    /// point_count`.
    pub clustered_count: usize,
    pub noise_count: usize,
    pub clusters: Vec<ClusterSummary>,
}

/// On-demand projection of a caller-chosen entity subset. Never touches
/// the published snapshots.
#[derive(Debug, Clone, Serialize)]
pub struct SubsetProjection {
    pub method: Method,
    /// Ids the caller passed, duplicates included.
    pub requested: usize,
    /// Distinct ids that had a usable embedding and were projected.
    pub projected: usize,
    /// Distinct ids dropped for missing or unusable embeddings.
    pub excluded: usize,
    pub elapsed_ms: u64,
    pub points: Vec<ProjectionPoint>,
    pub resolutions: Vec<ResolutionClusters>,
}

/// Latest computation metadata for one method's snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct MethodStats {
    pub method: Method,
    pub points: usize,
    pub corpus_version: u64,
    pub computed_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

/// Store-wide observability summary.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectionStats {
    pub total_entities: usize,
    pub with_embedding: usize,
    pub corpus_version: u64,
    pub configured: Vec<Method>,
    /// Computed snapshots only, in configured method order.
    pub methods: Vec<MethodStats>,
}

// === Jobs ===

/// Lifecycle of one background recompute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed { error: String },
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed { .. } | JobStatus::Cancelled
        )
    }
}

/// Shared handle to one recompute job. Cloning hands out another view of
/// the same job, not a new one.
#[derive(Clone)]
pub struct JobHandle {
    inner: Arc<JobInner>,
}

struct JobInner {
    method: Method,
    cancel: AtomicBool,
    status: RwLock<JobStatus>,
    thread: Mutex<Option<ThreadHandle<()>>>,
}

impl JobHandle {
    fn new(method: Method) -> Self {
        Self {
            inner: Arc::new(JobInner {
                method,
                cancel: AtomicBool::new(false),
                status: RwLock::new(JobStatus::Pending),
                thread: Mutex::new(None),
            }),
        }
    }

    #[inline]
    pub fn method(&self) -> Method {
        self.inner.method
    }

    pub fn status(&self) -> JobStatus {
        self.inner.status.read().clone()
    }

    pub fn is_finished(&self) -> bool {
        self.status().is_terminal()
    }

    /// Ask the worker to stop at its next checkpoint.
    pub fn cancel(&self) {
        self.inner.cancel.store(true, Ordering::Relaxed);
    }

    /// Block until the worker thread exits. Returns immediately if the
    /// thread already finished or another caller is waiting on it.
    pub fn wait(&self) {
        let handle = self.inner.thread.lock().take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }

    fn cancel_requested(&self) -> bool {
        self.inner.cancel.load(Ordering::Relaxed)
    }

    fn set_status(&self, status: JobStatus) {
        *self.inner.status.write() = status;
    }

    fn attach(&self, handle: ThreadHandle<()>) {
        *self.inner.thread.lock() = Some(handle);
    }
}

impl std::fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobHandle")
            .field("method", &self.inner.method)
            .field("status", &self.status())
            .finish()
    }
}

// === Store ===

pub struct ProjectionStore {
    config: ProjectionConfig,
    shared: Arc<Shared>,
}

struct Shared {
    snapshots: RwLock<HashMap<Method, Arc<ProjectionSnapshot>>>,
    jobs: Mutex<HashMap<Method, JobHandle>>,
}

impl ProjectionStore {
    pub fn new(config: ProjectionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            shared: Arc::new(Shared {
                snapshots: RwLock::new(HashMap::new()),
                jobs: Mutex::new(HashMap::new()),
            }),
        })
    }

    pub fn config(&self) -> &ProjectionConfig {
        &self.config
    }

    /// Kick off a background recompute for one method against the given
    /// corpus. If a job for that method is already pending or running,
    /// its handle is returned instead of starting another.
    pub fn trigger_recompute(
        &self,
        corpus: Arc<CorpusSnapshot>,
        method: Method,
    ) -> Result<JobHandle> {
        self.ensure_enabled(method)?;
        let mut jobs = self.shared.jobs.lock();
        if let Some(existing) = jobs.get(&method) {
            if !existing.is_finished() {
                debug!(%method, "recompute already in flight, reusing job");
                return Ok(existing.clone());
            }
        }

        let handle = JobHandle::new(method);
        let shared = Arc::clone(&self.shared);
        let config = self.config.clone();
        let job = handle.clone();
        let thread = thread::Builder::new()
            .name(format!("projection-{}", method))
            .spawn(move || run_recompute(shared, config, corpus, job))
            .map_err(|e| {
                Error::JobUnavailable(format!("failed to spawn projection worker: {}", e))
            })?;
        handle.attach(thread);
        jobs.insert(method, handle.clone());
        Ok(handle)
    }

    /// Status of the most recent job for a method, if one was ever
    /// triggered.
    pub fn job_status(&self, method: Method) -> Option<JobStatus> {
        self.shared.jobs.lock().get(&method).map(JobHandle::status)
    }

    /// Latest published snapshot for a method.
    pub fn snapshot(&self, method: Method) -> Result<Arc<ProjectionSnapshot>> {
        self.shared
            .snapshots
            .read()
            .get(&method)
            .cloned()
            .ok_or_else(|| Error::SnapshotMissing(method.to_string()))
    }

    /// Cluster summaries for one method at one resolution level.
    pub fn clusters(&self, method: Method, level: u32) -> Result<ClusterReport> {
        let snapshot = self.snapshot(method)?;
        let resolution = snapshot
            .resolution(level)
            .ok_or(Error::UnknownResolution(level))?;
        Ok(ClusterReport {
            method,
            level,
            eps: resolution.eps,
            min_points: resolution.min_points,
            corpus_version: snapshot.corpus_version,
            computed_at: snapshot.computed_at,
            point_count: snapshot.points.len(),
            clustered_count: snapshot.points.len() - resolution.noise_count,
            noise_count: resolution.noise_count,
            clusters: resolution.clusters.clone(),
        })
    }

    pub fn stats(&self, corpus: &CorpusSnapshot) -> ProjectionStats {
        let corpus_stats = corpus.stats();
        let snapshots = self.shared.snapshots.read();
        let methods = self
            .config
            .methods
            .iter()
            .filter_map(|method| {
                snapshots.get(method).map(|snap| MethodStats {
                    method: *method,
                    points: snap.points.len(),
                    corpus_version: snap.corpus_version,
                    computed_at: snap.computed_at,
                    elapsed_ms: snap.elapsed_ms,
                })
            })
            .collect();
        ProjectionStats {
            total_entities: corpus_stats.total,
            with_embedding: corpus_stats.with_embedding,
            corpus_version: corpus.version(),
            configured: self.config.methods.clone(),
            methods,
        }
    }

    /// Project a caller-chosen subset synchronously, clustering it at
    /// every configured resolution. Ids are deduplicated; unknown ids and
    /// ids without a usable embedding are dropped and counted.
    pub fn compute_subset(
        &self,
        corpus: &CorpusSnapshot,
        ids: &[EntityId],
        method: Method,
    ) -> Result<SubsetProjection> {
        self.ensure_enabled(method)?;
        let started = Instant::now();

        let distinct: BTreeSet<&EntityId> = ids.iter().collect();
        let distinct_count = distinct.len();
        let mut kept = Vec::new();
        let mut vectors = Vec::new();
        for id in distinct {
            if let Some(embedding) = corpus.get(id).and_then(|r| r.usable_embedding()) {
                kept.push(id.clone());
                vectors.push(embedding.values().to_vec());
            }
        }
        let excluded = distinct_count - kept.len();
        if kept.len() < 2 {
            return Err(Error::SubsetTooSmall {
                got: kept.len(),
                min: 2,
            });
        }

        let (points, resolutions) =
            match project_entities(&self.config, corpus, method, kept, &vectors, &|| false)? {
                Some(parts) => parts,
                None => {
                    return Err(Error::Computation(
                        "subset projection interrupted".to_string(),
                    ))
                }
            };
        let elapsed_ms = started.elapsed().as_millis() as u64;
        debug!(
            %method,
            requested = ids.len(),
            projected = points.len(),
            excluded,
            elapsed_ms,
            "subset projection computed"
        );
        Ok(SubsetProjection {
            method,
            requested: ids.len(),
            projected: points.len(),
            excluded,
            elapsed_ms,
            points,
            resolutions,
        })
    }

    fn ensure_enabled(&self, method: Method) -> Result<()> {
        if self.config.methods.contains(&method) {
            Ok(())
        } else {
            Err(Error::InvalidConfig(format!(
                "projection method {} is not enabled",
                method
            )))
        }
    }
}

impl std::fmt::Debug for ProjectionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshots = self.shared.snapshots.read();
        f.debug_struct("ProjectionStore")
            .field("configured", &self.config.methods)
            .field("snapshots", &snapshots.len())
            .finish()
    }
}

// === Worker ===

fn run_recompute(
    shared: Arc<Shared>,
    config: ProjectionConfig,
    corpus: Arc<CorpusSnapshot>,
    job: JobHandle,
) {
    let method = job.method();
    if job.cancel_requested() {
        info!(%method, "recompute cancelled before start");
        job.set_status(JobStatus::Cancelled);
        return;
    }
    job.set_status(JobStatus::Running);
    info!(
        %method,
        corpus_version = corpus.version(),
        "projection recompute started"
    );

    // A panicking reducer must not leave the job stuck in Running
    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        build_snapshot(&config, &corpus, method, &|| job.cancel_requested())
    }));
    match outcome {
        Ok(Ok(Some(snapshot))) => {
            let points = snapshot.points.len();
            let elapsed_ms = snapshot.elapsed_ms;
            shared.snapshots.write().insert(method, Arc::new(snapshot));
            job.set_status(JobStatus::Completed);
            info!(%method, points, elapsed_ms, "projection recompute completed");
        }
        Ok(Ok(None)) => {
            warn!(%method, "recompute cancelled, previous snapshot kept");
            job.set_status(JobStatus::Cancelled);
        }
        Ok(Err(e)) => {
            error!(%method, error = %e, "recompute failed, previous snapshot kept");
            job.set_status(JobStatus::Failed {
                error: e.to_string(),
            });
        }
        Err(_) => {
            error!(%method, "recompute panicked, previous snapshot kept");
            job.set_status(JobStatus::Failed {
                error: "projection worker panicked".to_string(),
            });
        }
    }
}

/// Full-corpus snapshot build. `Ok(None)` means the cancel flag fired at
/// a checkpoint.
fn build_snapshot(
    config: &ProjectionConfig,
    corpus: &CorpusSnapshot,
    method: Method,
    cancel: &dyn Fn() -> bool,
) -> Result<Option<ProjectionSnapshot>> {
    let started = Instant::now();
    let (ids, vectors): (Vec<EntityId>, Vec<Vec<f32>>) = corpus
        .embedded()
        .map(|(id, e)| (id.clone(), e.values().to_vec()))
        .unzip();

    let parts = project_entities(config, corpus, method, ids, &vectors, cancel)?;
    Ok(parts.map(|(points, resolutions)| ProjectionSnapshot {
        method,
        corpus_version: corpus.version(),
        computed_at: Utc::now(),
        elapsed_ms: started.elapsed().as_millis() as u64,
        points,
        resolutions,
    }))
}

/// Reduce one id-aligned vector batch to 2D and cluster it at every
/// configured resolution.
fn project_entities(
    config: &ProjectionConfig,
    corpus: &CorpusSnapshot,
    method: Method,
    ids: Vec<EntityId>,
    vectors: &[Vec<f32>],
    cancel: &dyn Fn() -> bool,
) -> Result<Option<(Vec<ProjectionPoint>, Vec<ResolutionClusters>)>> {
    let reducer = reducer_for(method, config);
    let coords = reducer.project(vectors)?;
    if cancel() {
        return Ok(None);
    }
    let points: Vec<ProjectionPoint> = ids
        .into_iter()
        .zip(coords)
        .map(|(entity_id, (x, y))| ProjectionPoint {
            entity_id,
            method,
            x,
            y,
        })
        .collect();

    let mut resolutions = Vec::with_capacity(config.resolutions.len());
    for params in &config.resolutions {
        if cancel() {
            return Ok(None);
        }
        resolutions.push(cluster_points(&points, corpus, *params));
    }
    Ok(Some((points, resolutions)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResolutionParams;
    use crate::corpus::CorpusBuilder;
    use crate::semantic::Embedding;

    fn test_corpus(version: u64) -> Arc<CorpusSnapshot> {
        let mut builder = CorpusBuilder::new();
        for i in 0..6 {
            let base = if i < 3 { 0.0 } else { 5.0 };
            let values = vec![base + i as f32 * 0.1, base, 1.0];
            builder
                .set_embedding(Embedding::new(format!("e{}", i), values))
                .unwrap();
        }
        builder.touch("bare");
        Arc::new(builder.build_versioned(version))
    }

    fn test_store() -> ProjectionStore {
        let config = ProjectionConfig::default()
            .with_resolutions(vec![ResolutionParams::new(1, 0.5, 2)])
            .with_iterations(32);
        ProjectionStore::new(config).unwrap()
    }

    #[test]
    fn test_trigger_completes_and_publishes() {
        let store = test_store();
        let corpus = test_corpus(1);
        let job = store.trigger_recompute(corpus.clone(), Method::Pca).unwrap();
        job.wait();
        assert_eq!(job.status(), JobStatus::Completed);

        let snapshot = store.snapshot(Method::Pca).unwrap();
        assert_eq!(snapshot.corpus_version, 1);
        assert_eq!(snapshot.points.len(), 6);
        assert_eq!(snapshot.resolutions.len(), 1);

        let report = store.clusters(Method::Pca, 1).unwrap();
        assert_eq!(report.point_count, 6);
        assert_eq!(report.clustered_count + report.noise_count, 6);
        assert_eq!(report.corpus_version, 1);
    }

    #[test]
    fn test_snapshot_swap_is_atomic_for_held_readers() {
        let store = test_store();
        let job = store.trigger_recompute(test_corpus(1), Method::Mds).unwrap();
        job.wait();
        let held = store.snapshot(Method::Mds).unwrap();

        let job = store.trigger_recompute(test_corpus(2), Method::Mds).unwrap();
        job.wait();
        assert_eq!(job.status(), JobStatus::Completed);

        // The old Arc is unchanged, the store serves the new version
        assert_eq!(held.corpus_version, 1);
        assert_eq!(store.snapshot(Method::Mds).unwrap().corpus_version, 2);
    }

    #[test]
    fn test_missing_snapshot_and_unknown_level() {
        let store = test_store();
        assert!(matches!(
            store.snapshot(Method::Pca),
            Err(Error::SnapshotMissing(_))
        ));

        let job = store.trigger_recompute(test_corpus(1), Method::Pca).unwrap();
        job.wait();
        assert!(matches!(
            store.clusters(Method::Pca, 9),
            Err(Error::UnknownResolution(9))
        ));
    }

    #[test]
    fn test_disabled_method_rejected() {
        let config = ProjectionConfig::default().with_methods(vec![Method::Pca]);
        let store = ProjectionStore::new(config).unwrap();
        assert!(matches!(
            store.trigger_recompute(test_corpus(1), Method::Mds),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_trigger_reuses_live_job() {
        let store = test_store();
        // A pending job that never runs stands in for an in-flight worker
        let stuck = JobHandle::new(Method::Pca);
        store
            .shared
            .jobs
            .lock()
            .insert(Method::Pca, stuck.clone());

        let reused = store.trigger_recompute(test_corpus(1), Method::Pca).unwrap();
        assert!(Arc::ptr_eq(&stuck.inner, &reused.inner));
    }

    #[test]
    fn test_precancelled_job_keeps_previous_snapshot() {
        let store = test_store();
        let job = store.trigger_recompute(test_corpus(1), Method::Pca).unwrap();
        job.wait();

        let cancelled = JobHandle::new(Method::Pca);
        cancelled.cancel();
        run_recompute(
            Arc::clone(&store.shared),
            store.config.clone(),
            test_corpus(2),
            cancelled.clone(),
        );
        assert_eq!(cancelled.status(), JobStatus::Cancelled);
        assert_eq!(store.snapshot(Method::Pca).unwrap().corpus_version, 1);
    }

    #[test]
    fn test_build_snapshot_cancel_checkpoint() {
        let config = ProjectionConfig::default();
        let corpus = test_corpus(1);
        let out = build_snapshot(&config, &corpus, Method::Pca, &|| true).unwrap();
        assert!(out.is_none());
    }

    #[test]
    fn test_subset_projection_counts() {
        let store = test_store();
        let corpus = test_corpus(1);
        let ids = vec![
            "e0".to_string(),
            "e1".to_string(),
            "e1".to_string(),
            "bare".to_string(),
            "ghost".to_string(),
        ];
        let subset = store
            .compute_subset(&corpus, &ids, Method::RandomProjection)
            .unwrap();
        assert_eq!(subset.requested, 5);
        assert_eq!(subset.projected, 2);
        assert_eq!(subset.excluded, 2);
        assert_eq!(subset.points.len(), 2);
        assert_eq!(subset.resolutions.len(), 1);
    }

    #[test]
    fn test_subset_too_small() {
        let store = test_store();
        let corpus = test_corpus(1);
        let err = store
            .compute_subset(&corpus, &["e0".to_string()], Method::Pca)
            .unwrap_err();
        assert!(matches!(err, Error::SubsetTooSmall { got: 1, min: 2 }));
    }

    #[test]
    fn test_stats_reports_configured_and_computed() {
        let store = test_store();
        let corpus = test_corpus(1);
        let before = store.stats(&corpus);
        assert_eq!(before.total_entities, 7);
        assert_eq!(before.with_embedding, 6);
        assert!(before.methods.is_empty());
        assert_eq!(before.configured.len(), 3);

        let job = store.trigger_recompute(corpus.clone(), Method::Pca).unwrap();
        job.wait();
        let after = store.stats(&corpus);
        assert_eq!(after.methods.len(), 1);
        assert_eq!(after.methods[0].points, 6);
    }

    #[test]
    fn test_job_status_serializes_with_state_tag() {
        let failed = JobStatus::Failed {
            error: "boom".to_string(),
        };
        let json = serde_json::to_string(&failed).unwrap();
        assert_eq!(json, r#"{"state":"failed","error":"boom"}"#);
        assert_eq!(
            serde_json::to_string(&JobStatus::Running).unwrap(),
            r#"{"state":"running"}"#
        );
    }
}
