//! Reconstruction configuration.
//!
//! Every section has a `Default` with the standard constants, and every
//! field may be omitted from YAML.

use std::fs::File;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::geometry::RansacConfig;

/// Order in which match sets are tried for bootstrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairOrder {
    /// Input order.
    #[default]
    Insertion,
    /// Most correspondences first; ties keep input order.
    LargestFirst,
}

/// What to do when no unregistered view reaches the minimum score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StallPolicy {
    /// Finish the reconstruction.
    #[default]
    Stop,
    /// Try the unregistered view with the most matches against registered
    /// views.
    MatchVolume,
}

/// Handling of tracks with several features in the same view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbiguityPolicy {
    /// Use the first feature found.
    #[default]
    FirstFound,
    /// Ignore the track for that view.
    SkipAmbiguous,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Pairs with fewer matches are never tried.
    pub min_correspondences: usize,
    pub pair_order: PairOrder,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            min_correspondences: 100,
            pair_order: PairOrder::Insertion,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NextViewConfig {
    /// Minimum number of visible map points for a view to be selected.
    pub min_score: usize,
    pub stall_policy: StallPolicy,
}

impl Default for NextViewConfig {
    fn default() -> Self {
        Self {
            min_score: 30,
            stall_policy: StallPolicy::Stop,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RegistrationConfig {
    /// Minimum 3D-2D correspondences before the pose solver is called.
    pub min_correspondences: usize,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            min_correspondences: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TriangulationConfig {
    pub ambiguity: AmbiguityPolicy,
    /// Reject points behind either camera.
    pub require_cheirality: bool,
    /// Maximum reprojection error in pixels, per view.
    pub max_reprojection_error: f64,
    /// Reject points farther than this along either principal axis.
    pub max_depth: Option<f64>,
}

impl Default for TriangulationConfig {
    fn default() -> Self {
        Self {
            ambiguity: AmbiguityPolicy::FirstFound,
            require_cheirality: true,
            max_reprojection_error: 4.0,
            max_depth: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Clustering distance for `combine_components`.
    pub combine_distance: f64,
    /// Nearest-neighbour bound for `merge`.
    pub merge_bound: f64,
    /// Fuse each step's new points into the map right away.
    pub fuse_after_step: bool,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            combine_distance: 1.0,
            merge_bound: crate::map::DEFAULT_MERGE_BOUND,
            fuse_after_step: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Percentile passed to `remove_outliers_by_error`; `None` disables it.
    pub outlier_percentile: Option<f64>,
    /// Ratio passed to `reduce_by_error`.
    pub reduce_ratio: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            outlier_percentile: Some(0.05),
            reduce_ratio: 1.0,
        }
    }
}

/// All reconstruction settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReconstructionConfig {
    pub bootstrap: BootstrapConfig,
    pub next_view: NextViewConfig,
    pub registration: RegistrationConfig,
    pub triangulation: TriangulationConfig,
    pub fusion: FusionConfig,
    pub filter: FilterConfig,
    pub solver: RansacConfig,
}

impl ReconstructionConfig {
    /// Load from a YAML file. Missing fields take their defaults.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
        let config: Self = serde_yaml::from_reader(file)
            .with_context(|| format!("Failed to parse {:?}", path))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml).context("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no stage can work with.
    pub fn validate(&self) -> Result<()> {
        if self.fusion.combine_distance < 0.0 || self.fusion.merge_bound < 0.0 {
            bail!("fusion distances must be non-negative");
        }
        if self.triangulation.max_reprojection_error <= 0.0 {
            bail!(
                "triangulation.max_reprojection_error must be positive, got {}",
                self.triangulation.max_reprojection_error
            );
        }
        if let Some(p) = self.filter.outlier_percentile {
            if !(0.0..=1.0).contains(&p) {
                bail!("filter.outlier_percentile must be in [0, 1], got {}", p);
            }
        }
        if !(0.0..=1.0).contains(&self.filter.reduce_ratio) {
            bail!(
                "filter.reduce_ratio must be in [0, 1], got {}",
                self.filter.reduce_ratio
            );
        }
        if self.solver.max_iterations == 0 {
            bail!("solver.max_iterations must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = ReconstructionConfig::default();
        assert_eq!(c.bootstrap.min_correspondences, 100);
        assert_eq!(c.next_view.min_score, 30);
        assert_eq!(c.registration.min_correspondences, 30);
        assert_eq!(c.fusion.merge_bound, 20.0);
        assert_eq!(c.triangulation.ambiguity, AmbiguityPolicy::FirstFound);
        assert_eq!(c.next_view.stall_policy, StallPolicy::Stop);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = "
bootstrap:
  min_correspondences: 40
  pair_order: largest_first
next_view:
  stall_policy: match_volume
triangulation:
  max_depth: 100.0
";
        let c = ReconstructionConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(c.bootstrap.min_correspondences, 40);
        assert_eq!(c.bootstrap.pair_order, PairOrder::LargestFirst);
        assert_eq!(c.next_view.stall_policy, StallPolicy::MatchVolume);
        assert_eq!(c.next_view.min_score, 30);
        assert_eq!(c.triangulation.max_depth, Some(100.0));
        assert!(c.triangulation.require_cheirality);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(ReconstructionConfig::from_yaml_str("filter:\n  reduce_ratio: 1.5\n").is_err());
        assert!(ReconstructionConfig::from_yaml_str("fusion:\n  merge_bound: -1.0\n").is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = ReconstructionConfig::from_yaml_file("/nonexistent/rust-sfm.yaml").unwrap_err();
        assert!(err.to_string().contains("Failed to open"));
    }
}
