//! Density clustering over projected points.
//!
//! Plain DBSCAN, run once per resolution level on the same 2D snapshot.
//! Scanning points in ascending entity id order makes cluster ids and
//! border attribution deterministic for a given snapshot.

use std::collections::VecDeque;

use serde::Serialize;
use tracing::debug;

use crate::config::ResolutionParams;
use crate::corpus::{CorpusSnapshot, EntityId};
use crate::layer::Layer;

use super::ProjectionPoint;

/// One entity's cluster membership; `None` marks noise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterAssignment {
    pub entity_id: EntityId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster: Option<u32>,
}

/// Aggregate view of one cluster at one resolution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterSummary {
    pub cluster: u32,
    pub size: usize,
    pub centroid_x: f32,
    pub centroid_y: f32,
    /// Layer with the highest mean active-trait count among coded
    /// members; `None` when no member carries a code. Ties break toward
    /// the lower layer index.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dominant_layer: Option<Layer>,
}

/// Full clustering outcome for one resolution level.
#[derive(Debug, Clone, Serialize)]
pub struct ResolutionClusters {
    pub level: u32,
    pub eps: f32,
    pub min_points: usize,
    pub assignments: Vec<ClusterAssignment>,
    /// Summaries in ascending cluster id order.
    pub clusters: Vec<ClusterSummary>,
    pub noise_count: usize,
}

impl ResolutionClusters {
    pub fn cluster_count(&self) -> usize {
        self.clusters.len()
    }
}

/// Cluster a projected snapshot at one resolution.
pub fn cluster_points(
    points: &[ProjectionPoint],
    corpus: &CorpusSnapshot,
    params: ResolutionParams,
) -> ResolutionClusters {
    let coords: Vec<(f32, f32)> = points.iter().map(|p| (p.x, p.y)).collect();
    let labels = dbscan(&coords, params.eps, params.min_points);

    let assignments: Vec<ClusterAssignment> = points
        .iter()
        .zip(&labels)
        .map(|(p, label)| ClusterAssignment {
            entity_id: p.entity_id.clone(),
            cluster: *label,
        })
        .collect();
    let noise_count = labels.iter().filter(|l| l.is_none()).count();

    let cluster_count = labels
        .iter()
        .filter_map(|l| *l)
        .map(|c| c as usize + 1)
        .max()
        .unwrap_or(0);
    let mut clusters = Vec::with_capacity(cluster_count);
    for cluster in 0..cluster_count as u32 {
        let members: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter_map(|(i, l)| (*l == Some(cluster)).then_some(i))
            .collect();
        let size = members.len();
        let centroid_x = members.iter().map(|&i| coords[i].0).sum::<f32>() / size as f32;
        let centroid_y = members.iter().map(|&i| coords[i].1).sum::<f32>() / size as f32;
        let dominant_layer = dominant_layer(points, &members, corpus);
        clusters.push(ClusterSummary {
            cluster,
            size,
            centroid_x,
            centroid_y,
            dominant_layer,
        });
    }

    debug!(
        level = params.level,
        clusters = clusters.len(),
        noise = noise_count,
        points = points.len(),
        "clustered resolution level"
    );

    ResolutionClusters {
        level: params.level,
        eps: params.eps,
        min_points: params.min_points,
        assignments,
        clusters,
        noise_count,
    }
}

/// DBSCAN labels in point order; `None` is noise. A neighborhood counts
/// the point itself toward `min_points`.
pub(crate) fn dbscan(points: &[(f32, f32)], eps: f32, min_points: usize) -> Vec<Option<u32>> {
    let n = points.len();
    let eps2 = eps * eps;
    let mut labels: Vec<Option<u32>> = vec![None; n];
    let mut visited = vec![false; n];
    let mut next_cluster = 0u32;

    let region = |p: usize| -> Vec<usize> {
        (0..n)
            .filter(|&q| {
                let dx = points[p].0 - points[q].0;
                let dy = points[p].1 - points[q].1;
                dx * dx + dy * dy <= eps2
            })
            .collect()
    };

    for p in 0..n {
        if visited[p] {
            continue;
        }
        visited[p] = true;
        let neighborhood = region(p);
        if neighborhood.len() < min_points {
            // Noise for now; a later core point may still absorb it as a
            // border member
            continue;
        }
        let cluster = next_cluster;
        next_cluster += 1;
        labels[p] = Some(cluster);

        let mut queue: VecDeque<usize> = neighborhood.into();
        while let Some(q) = queue.pop_front() {
            if labels[q].is_none() {
                labels[q] = Some(cluster);
            }
            if visited[q] {
                continue;
            }
            visited[q] = true;
            let reach = region(q);
            if reach.len() >= min_points {
                queue.extend(reach);
            }
        }
    }
    labels
}

fn dominant_layer(
    points: &[ProjectionPoint],
    members: &[usize],
    corpus: &CorpusSnapshot,
) -> Option<Layer> {
    let mut totals = [0u64; 4];
    let mut coded = 0u64;
    for &i in members {
        let code = corpus.get(&points[i].entity_id).and_then(|r| r.code);
        if let Some(code) = code {
            coded += 1;
            for (total, active) in totals.iter_mut().zip(code.layer_activations()) {
                *total += active as u64;
            }
        }
    }
    if coded == 0 {
        return None;
    }
    // Shared denominator, so comparing sums compares means
    let best = totals
        .iter()
        .enumerate()
        .max_by(|(ia, a), (ib, b)| a.cmp(b).then(ib.cmp(ia)))
        .map(|(i, _)| i)?;
    Layer::from_index(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::TraitVector;
    use crate::corpus::CorpusBuilder;
    use crate::projection::Method;

    fn point(id: &str, x: f32, y: f32) -> ProjectionPoint {
        ProjectionPoint {
            entity_id: id.to_string(),
            method: Method::Pca,
            x,
            y,
        }
    }

    fn blob_points() -> Vec<ProjectionPoint> {
        vec![
            point("a1", -0.80, -0.80),
            point("a2", -0.78, -0.81),
            point("a3", -0.79, -0.78),
            point("b1", 0.80, 0.80),
            point("b2", 0.81, 0.78),
            point("b3", 0.79, 0.81),
            point("lone", 0.0, 0.0),
        ]
    }

    #[test]
    fn test_dbscan_two_blobs_and_noise() {
        let points = blob_points();
        let corpus = CorpusBuilder::new().build();
        let out = cluster_points(&points, &corpus, ResolutionParams::new(1, 0.1, 3));

        assert_eq!(out.clusters.len(), 2);
        assert_eq!(out.noise_count, 1);
        assert_eq!(out.clusters[0].size, 3);
        assert_eq!(out.clusters[1].size, 3);
        // First cluster is seeded from the first point scanned
        assert!(out.clusters[0].centroid_x < -0.7);
        assert!(out.clusters[1].centroid_x > 0.7);
        let lone = out.assignments.iter().find(|a| a.entity_id == "lone");
        assert_eq!(lone.and_then(|a| a.cluster), None);
    }

    #[test]
    fn test_min_points_turns_sparse_into_noise() {
        let points = vec![point("a", 0.0, 0.0), point("b", 0.01, 0.0)];
        let corpus = CorpusBuilder::new().build();
        let out = cluster_points(&points, &corpus, ResolutionParams::new(1, 0.1, 3));
        assert_eq!(out.clusters.len(), 0);
        assert_eq!(out.noise_count, 2);
    }

    #[test]
    fn test_border_point_joins_first_cluster() {
        // c sits within eps of the a-blob edge but is not itself a core
        let points = vec![
            point("a1", 0.0, 0.0),
            point("a2", 0.05, 0.0),
            point("a3", 0.0, 0.05),
            point("c", 0.14, 0.0),
        ];
        let corpus = CorpusBuilder::new().build();
        let out = cluster_points(&points, &corpus, ResolutionParams::new(1, 0.1, 3));
        let border = out.assignments.iter().find(|a| a.entity_id == "c");
        assert_eq!(border.and_then(|a| a.cluster), Some(0));
        assert_eq!(out.clusters[0].size, 4);
    }

    #[test]
    fn test_dominant_layer_from_codes() {
        let mut builder = CorpusBuilder::new();
        // Physical-heavy codes for the a blob
        builder.set_code("a1", TraitVector::from_raw(0xFF00_0001));
        builder.set_code("a2", TraitVector::from_raw(0xFE00_0000));
        builder.set_code("a3", TraitVector::from_raw(0xF000_0000));
        // The b blob carries no codes at all
        let corpus = builder.build();

        let out = cluster_points(&blob_points(), &corpus, ResolutionParams::new(1, 0.1, 3));
        assert_eq!(out.clusters[0].dominant_layer, Some(Layer::Physical));
        assert_eq!(out.clusters[1].dominant_layer, None);
    }

    #[test]
    fn test_dominant_layer_tie_prefers_lower_layer() {
        let mut builder = CorpusBuilder::new();
        // Equal activation in Physical and Social
        builder.set_code("a1", TraitVector::from_raw(0xFF00_00FF));
        builder.set_code("a2", TraitVector::from_raw(0x0F00_000F));
        builder.set_code("a3", TraitVector::from_raw(0x3000_0003));
        let corpus = builder.build();
        let points = vec![
            point("a1", 0.0, 0.0),
            point("a2", 0.02, 0.0),
            point("a3", 0.0, 0.02),
        ];
        let out = cluster_points(&points, &corpus, ResolutionParams::new(2, 0.1, 2));
        assert_eq!(out.clusters[0].dominant_layer, Some(Layer::Physical));
    }

    #[test]
    fn test_deterministic_labels() {
        let points = blob_points();
        let corpus = CorpusBuilder::new().build();
        let params = ResolutionParams::new(3, 0.1, 3);
        let first = cluster_points(&points, &corpus, params);
        let second = cluster_points(&points, &corpus, params);
        assert_eq!(first.assignments, second.assignments);
        assert_eq!(first.clusters, second.clusters);
    }

    #[test]
    fn test_empty_input() {
        let corpus = CorpusBuilder::new().build();
        let out = cluster_points(&[], &corpus, ResolutionParams::new(1, 0.1, 3));
        assert!(out.assignments.is_empty());
        assert!(out.clusters.is_empty());
        assert_eq!(out.noise_count, 0);
    }
}
