//! Shared RANSAC parameters and sampling for the reference estimators.

use rand::rngs::StdRng;
use rand::seq::index;
use serde::Deserialize;

/// RANSAC settings. Deterministic for a fixed `seed`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RansacConfig {
    /// Maximum number of hypotheses.
    pub max_iterations: usize,
    /// Inlier threshold in pixels.
    pub threshold_px: f64,
    /// Minimum fraction of inliers for a model to be accepted.
    pub min_inlier_ratio: f64,
    /// RNG seed.
    pub seed: u64,
}

impl Default for RansacConfig {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            threshold_px: 2.0,
            min_inlier_ratio: 0.5,
            seed: 0x5f3d_2024,
        }
    }
}

impl RansacConfig {
    /// Inliers required out of `n` correspondences for a model of `minimal` points.
    pub fn required_inliers(&self, n: usize, minimal: usize) -> usize {
        let by_ratio = (self.min_inlier_ratio * n as f64).ceil() as usize;
        by_ratio.max(minimal)
    }
}

/// Draw `k` distinct indices out of `0..n`.
pub(crate) fn draw_sample(rng: &mut StdRng, n: usize, k: usize) -> Vec<usize> {
    index::sample(rng, n, k).into_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_sample_is_distinct_and_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let mut s = draw_sample(&mut rng, 20, 8);
            assert!(s.iter().all(|&i| i < 20));
            s.sort_unstable();
            s.dedup();
            assert_eq!(s.len(), 8);
        }
    }

    #[test]
    fn test_required_inliers_never_below_minimal() {
        let cfg = RansacConfig {
            min_inlier_ratio: 0.1,
            ..RansacConfig::default()
        };
        assert_eq!(cfg.required_inliers(10, 8), 8);
        assert_eq!(cfg.required_inliers(200, 8), 20);
    }
}
