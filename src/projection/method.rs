//! Dimensionality reducers behind one capability trait.
//!
//! Three interchangeable implementations, selected by configuration:
//! spectral PCA (power iteration with deflation over the covariance),
//! classical MDS (double-centered Gram matrix of pairwise distances, same
//! eigensolver), and a seeded sign-matrix random projection. All three
//! are deterministic for a fixed input (and fixed seed where one
//! applies), and all normalize output into [-1, 1] per axis so the
//! clustering eps ladder means the same thing under every method.

use std::fmt;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::config::ProjectionConfig;
use crate::{Error, Result};

/// Identifies a projection method across config, snapshots, and DTOs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    Pca,
    Mds,
    RandomProjection,
}

impl Method {
    pub const ALL: [Method; 3] = [Method::Pca, Method::Mds, Method::RandomProjection];

    pub fn name(self) -> &'static str {
        match self {
            Method::Pca => "pca",
            Method::Mds => "mds",
            Method::RandomProjection => "random_projection",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A reducer projects one row-major batch of embedding vectors onto 2D.
pub trait Reducer: Send + Sync {
    fn method(&self) -> Method;

    /// Project `vectors` (all the same dimension) onto 2D coordinates in
    /// [-1, 1] per axis, one output per input, order preserved.
    fn project(&self, vectors: &[Vec<f32>]) -> Result<Vec<(f32, f32)>>;
}

/// Reducer instance for a configured method.
pub fn reducer_for(method: Method, config: &ProjectionConfig) -> Box<dyn Reducer> {
    match method {
        Method::Pca => Box::new(PcaReducer {
            iterations: config.iterations,
        }),
        Method::Mds => Box::new(MdsReducer {
            iterations: config.iterations,
        }),
        Method::RandomProjection => Box::new(RandomProjectionReducer { seed: config.seed }),
    }
}

// === Spectral PCA ===

/// Covariance PCA via power iteration and one deflation step.
#[derive(Debug, Clone, Copy)]
pub struct PcaReducer {
    pub iterations: usize,
}

impl Reducer for PcaReducer {
    fn method(&self) -> Method {
        Method::Pca
    }

    fn project(&self, vectors: &[Vec<f32>]) -> Result<Vec<(f32, f32)>> {
        let n = vectors.len();
        if n <= 1 {
            return Ok(vec![(0.0, 0.0); n]);
        }
        let d = check_dims(vectors)?;

        let mut mean = vec![0.0f32; d];
        for v in vectors {
            for (m, x) in mean.iter_mut().zip(v) {
                *m += x;
            }
        }
        for m in &mut mean {
            *m /= n as f32;
        }

        // Upper triangle accumulated, then mirrored
        let mut cov = vec![vec![0.0f32; d]; d];
        let mut centered = vec![vec![0.0f32; d]; n];
        for (row, v) in centered.iter_mut().zip(vectors) {
            for j in 0..d {
                row[j] = v[j] - mean[j];
            }
        }
        for row in &centered {
            for i in 0..d {
                let ci = row[i];
                if ci == 0.0 {
                    continue;
                }
                for j in i..d {
                    cov[i][j] += ci * row[j];
                }
            }
        }
        let denom = (n - 1) as f32;
        for i in 0..d {
            for j in i..d {
                cov[i][j] /= denom;
                cov[j][i] = cov[i][j];
            }
        }

        let [(axis_x, _), (axis_y, _)] = top_two(cov, self.iterations);

        let coords = centered
            .iter()
            .map(|row| (dot(row, &axis_x), dot(row, &axis_y)))
            .collect();
        finish(coords)
    }
}

// === Classical MDS ===

/// Metric MDS: double-centered squared-distance Gram matrix, top two
/// eigenpairs, coordinates scaled by sqrt of the eigenvalues. Exact and
/// O(n^2); the store runs it in the background for a reason.
#[derive(Debug, Clone, Copy)]
pub struct MdsReducer {
    pub iterations: usize,
}

impl Reducer for MdsReducer {
    fn method(&self) -> Method {
        Method::Mds
    }

    fn project(&self, vectors: &[Vec<f32>]) -> Result<Vec<(f32, f32)>> {
        let n = vectors.len();
        if n <= 1 {
            return Ok(vec![(0.0, 0.0); n]);
        }
        check_dims(vectors)?;

        // Squared Euclidean distances
        let mut d2 = vec![vec![0.0f32; n]; n];
        for i in 0..n {
            for j in (i + 1)..n {
                let dist2: f32 = vectors[i]
                    .iter()
                    .zip(&vectors[j])
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum();
                d2[i][j] = dist2;
                d2[j][i] = dist2;
            }
        }

        // Double centering: b_ij = -(d2_ij - row_i - row_j + grand) / 2
        let row_mean: Vec<f32> = d2
            .iter()
            .map(|row| row.iter().sum::<f32>() / n as f32)
            .collect();
        let grand = row_mean.iter().sum::<f32>() / n as f32;
        let mut gram = vec![vec![0.0f32; n]; n];
        for i in 0..n {
            for j in 0..n {
                gram[i][j] = -0.5 * (d2[i][j] - row_mean[i] - row_mean[j] + grand);
            }
        }

        let [(axis_x, val_x), (axis_y, val_y)] = top_two(gram, self.iterations);
        let scale_x = val_x.max(0.0).sqrt();
        let scale_y = val_y.max(0.0).sqrt();

        let coords = (0..n)
            .map(|i| (axis_x[i] * scale_x, axis_y[i] * scale_y))
            .collect();
        finish(coords)
    }
}

// === Random projection ===

/// Seeded sign-matrix projection: entries ±1/√2 drawn from a ChaCha8
/// stream, so the same seed and dimension always produce the same map.
/// Near-linear cost; the fallback when the spectral methods are too
/// heavy for the corpus at hand.
#[derive(Debug, Clone, Copy)]
pub struct RandomProjectionReducer {
    pub seed: u64,
}

impl Reducer for RandomProjectionReducer {
    fn method(&self) -> Method {
        Method::RandomProjection
    }

    fn project(&self, vectors: &[Vec<f32>]) -> Result<Vec<(f32, f32)>> {
        let n = vectors.len();
        if n <= 1 {
            return Ok(vec![(0.0, 0.0); n]);
        }
        let d = check_dims(vectors)?;

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let scale = std::f32::consts::FRAC_1_SQRT_2;
        let matrix: Vec<(f32, f32)> = (0..d)
            .map(|_| {
                let x = if rng.gen::<bool>() { scale } else { -scale };
                let y = if rng.gen::<bool>() { scale } else { -scale };
                (x, y)
            })
            .collect();

        let coords = vectors
            .iter()
            .map(|v| {
                let mut x = 0.0f32;
                let mut y = 0.0f32;
                for (value, (rx, ry)) in v.iter().zip(&matrix) {
                    x += value * rx;
                    y += value * ry;
                }
                (x, y)
            })
            .collect();
        finish(coords)
    }
}

// === Shared internals ===

fn check_dims(vectors: &[Vec<f32>]) -> Result<usize> {
    let d = vectors[0].len();
    if d == 0 {
        return Err(Error::Computation(
            "cannot project zero-dimensional vectors".to_string(),
        ));
    }
    for v in vectors {
        if v.len() != d {
            return Err(Error::DimensionMismatch {
                left: d,
                right: v.len(),
            });
        }
    }
    Ok(d)
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Dominant eigenvector of a symmetric matrix by power iteration.
fn power_iteration(matrix: &[Vec<f32>], iterations: usize) -> (Vec<f32>, f32) {
    let k = matrix.len();
    let mut v = vec![1.0 / (k as f32).sqrt(); k];

    for _ in 0..iterations {
        let mut w = vec![0.0f32; k];
        for i in 0..k {
            for j in 0..k {
                w[i] += matrix[i][j] * v[j];
            }
        }
        let norm: f32 = w.iter().map(|&x| x * x).sum::<f32>().sqrt();
        if norm < 1e-10 {
            break;
        }
        for i in 0..k {
            v[i] = w[i] / norm;
        }
    }

    let mut eigenvalue = 0.0f32;
    for i in 0..k {
        let mut mv_i = 0.0f32;
        for j in 0..k {
            mv_i += matrix[i][j] * v[j];
        }
        eigenvalue += v[i] * mv_i;
    }
    (v, eigenvalue)
}

/// Top two eigenpairs: dominant, then dominant of the deflated matrix.
fn top_two(mut matrix: Vec<Vec<f32>>, iterations: usize) -> [(Vec<f32>, f32); 2] {
    let first = power_iteration(&matrix, iterations);
    let k = matrix.len();
    for i in 0..k {
        for j in 0..k {
            matrix[i][j] -= first.1 * first.0[i] * first.0[j];
        }
    }
    let second = power_iteration(&matrix, iterations);
    [first, second]
}

/// Normalize each axis into [-1, 1]; a degenerate axis collapses to 0.
/// Rejects non-finite coordinates instead of publishing them.
fn finish(coords: Vec<(f32, f32)>) -> Result<Vec<(f32, f32)>> {
    let normalize = |values: Vec<f32>| -> Vec<f32> {
        let min = values.iter().cloned().fold(f32::INFINITY, f32::min);
        let max = values.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let range = max - min;
        if range < 1e-10 {
            vec![0.0; values.len()]
        } else {
            values
                .iter()
                .map(|&v| ((v - min) / range) * 2.0 - 1.0)
                .collect()
        }
    };

    let xs = normalize(coords.iter().map(|c| c.0).collect());
    let ys = normalize(coords.iter().map(|c| c.1).collect());
    let out: Vec<(f32, f32)> = xs.into_iter().zip(ys).collect();
    if out.iter().any(|(x, y)| !x.is_finite() || !y.is_finite()) {
        return Err(Error::Computation(
            "projection produced non-finite coordinates".to_string(),
        ));
    }
    Ok(out)
}
