//! Engine and projection configuration.
//!
//! Builder setters do not clamp; `validate()` is the single gate and
//! fails fast with a message naming the offending field. Defaults are
//! viable out of the box.

use serde::{Deserialize, Serialize};

use crate::projection::Method;
use crate::{Error, Result};

/// Density clustering parameters for one resolution level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolutionParams {
    /// Caller-facing level id, coarse 1 to fine N by convention.
    pub level: u32,
    /// DBSCAN neighborhood radius in projected coordinates (reducers
    /// normalize points into [-1, 1] per axis).
    pub eps: f32,
    /// Points required to form a dense core.
    pub min_points: usize,
}

impl ResolutionParams {
    pub fn new(level: u32, eps: f32, min_points: usize) -> Self {
        Self {
            level,
            eps,
            min_points,
        }
    }
}

/// Projection and clustering configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectionConfig {
    /// Reduction methods the store maintains snapshots for.
    pub methods: Vec<Method>,
    /// Resolution ladder, each level clustered independently.
    pub resolutions: Vec<ResolutionParams>,
    /// Seed for the stochastic reducers.
    pub seed: u64,
    /// Power iteration rounds for the spectral reducers.
    pub iterations: usize,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            methods: vec![Method::Pca, Method::Mds, Method::RandomProjection],
            resolutions: vec![
                ResolutionParams::new(1, 0.25, 8),
                ResolutionParams::new(2, 0.12, 5),
                ResolutionParams::new(3, 0.06, 3),
            ],
            seed: 42,
            iterations: 64,
        }
    }
}

impl ProjectionConfig {
    pub fn with_methods(mut self, methods: Vec<Method>) -> Self {
        self.methods = methods;
        self
    }

    pub fn with_resolutions(mut self, resolutions: Vec<ResolutionParams>) -> Self {
        self.resolutions = resolutions;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Parameters for a configured resolution level.
    pub fn resolution(&self, level: u32) -> Option<&ResolutionParams> {
        self.resolutions.iter().find(|r| r.level == level)
    }

    pub fn validate(&self) -> Result<()> {
        if self.methods.is_empty() {
            return Err(Error::InvalidConfig(
                "at least one projection method must be enabled".to_string(),
            ));
        }
        for (i, method) in self.methods.iter().enumerate() {
            if self.methods[..i].contains(method) {
                return Err(Error::InvalidConfig(format!(
                    "projection method {} listed twice",
                    method
                )));
            }
        }
        if self.resolutions.is_empty() {
            return Err(Error::InvalidConfig(
                "at least one resolution level is required".to_string(),
            ));
        }
        for (i, r) in self.resolutions.iter().enumerate() {
            if self.resolutions[..i].iter().any(|prev| prev.level == r.level) {
                return Err(Error::InvalidConfig(format!(
                    "resolution level {} defined twice",
                    r.level
                )));
            }
            if !r.eps.is_finite() || r.eps <= 0.0 {
                return Err(Error::InvalidConfig(format!(
                    "eps must be positive and finite, got {} at level {}",
                    r.eps, r.level
                )));
            }
            if r.min_points < 2 {
                return Err(Error::InvalidConfig(format!(
                    "min_points must be at least 2, got {} at level {}",
                    r.min_points, r.level
                )));
            }
        }
        if self.iterations == 0 {
            return Err(Error::InvalidConfig(
                "iterations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Default seed for correlation sampling; explicit seeds override per
    /// call.
    pub sampler_seed: u64,
    /// Neighbor list length when the caller does not pick a K.
    pub default_top_k: usize,
    /// Ceiling on correlation sample size. Larger requests clip here with
    /// a warning before population clipping applies.
    pub max_sample_pairs: usize,
    pub projection: ProjectionConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sampler_seed: 42,
            default_top_k: 20,
            max_sample_pairs: 20_000,
            projection: ProjectionConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn with_sampler_seed(mut self, seed: u64) -> Self {
        self.sampler_seed = seed;
        self
    }

    pub fn with_default_top_k(mut self, k: usize) -> Self {
        self.default_top_k = k;
        self
    }

    pub fn with_max_sample_pairs(mut self, max: usize) -> Self {
        self.max_sample_pairs = max;
        self
    }

    pub fn with_projection(mut self, projection: ProjectionConfig) -> Self {
        self.projection = projection;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_top_k == 0 {
            return Err(Error::InvalidConfig(
                "default_top_k must be at least 1".to_string(),
            ));
        }
        if self.max_sample_pairs == 0 {
            return Err(Error::InvalidConfig(
                "max_sample_pairs must be at least 1".to_string(),
            ));
        }
        self.projection.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(EngineConfig::default().validate().is_ok());
        assert!(ProjectionConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_empty_methods() {
        let cfg = ProjectionConfig::default().with_methods(vec![]);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_duplicate_method() {
        let cfg = ProjectionConfig::default().with_methods(vec![Method::Pca, Method::Pca]);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_resolutions() {
        let dup = ProjectionConfig::default().with_resolutions(vec![
            ResolutionParams::new(1, 0.2, 4),
            ResolutionParams::new(1, 0.1, 4),
        ]);
        assert!(dup.validate().is_err());

        let zero_eps =
            ProjectionConfig::default().with_resolutions(vec![ResolutionParams::new(1, 0.0, 4)]);
        assert!(zero_eps.validate().is_err());

        let nan_eps = ProjectionConfig::default()
            .with_resolutions(vec![ResolutionParams::new(1, f32::NAN, 4)]);
        assert!(nan_eps.validate().is_err());

        let sparse =
            ProjectionConfig::default().with_resolutions(vec![ResolutionParams::new(1, 0.2, 1)]);
        assert!(sparse.validate().is_err());

        let none = ProjectionConfig::default().with_resolutions(vec![]);
        assert!(none.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_iterations_and_k() {
        assert!(ProjectionConfig::default().with_iterations(0).validate().is_err());
        assert!(EngineConfig::default().with_default_top_k(0).validate().is_err());
        assert!(EngineConfig::default().with_max_sample_pairs(0).validate().is_err());
    }

    #[test]
    fn test_resolution_lookup() {
        let cfg = ProjectionConfig::default();
        assert!(cfg.resolution(1).is_some());
        assert!(cfg.resolution(9).is_none());
    }
}
