//! Deterministic synthetic scenes for tests and the demo binary.
//!
//! Cameras look down +z from a grid of centres on the `z = 0` plane. Every
//! point is seen by every view, and each view stores its features in a
//! different order so feature indices are not shared across views.

use nalgebra::{Matrix3, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;

use crate::correspondence::MatchSet;
use crate::geometry::{Intrinsics, Keypoint, View, SE3};
use crate::map::ViewId;

/// Parameters of a synthetic scene.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub num_views: usize,
    pub num_points: usize,
    /// Spacing between neighbouring camera centres.
    pub baseline: f64,
    /// Points are drawn in `[-half_width, half_width]` on x and y.
    pub half_width: f64,
    /// Depth range of the points.
    pub min_depth: f64,
    pub max_depth: f64,
    /// Uniform per-axis pixel noise amplitude.
    pub noise_px: f64,
    pub intrinsics: Intrinsics,
    pub seed: u64,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            num_views: 4,
            num_points: 50,
            baseline: 1.0,
            half_width: 2.0,
            min_depth: 8.0,
            max_depth: 12.0,
            noise_px: 0.0,
            intrinsics: Intrinsics::new(800.0, 800.0, 320.0, 240.0),
            seed: 7,
        }
    }
}

/// Ground truth plus the inputs a reconstruction consumes.
#[derive(Debug, Clone)]
pub struct SyntheticScene {
    pub points: Vec<Vector3<f64>>,
    /// Ground-truth world-to-camera poses.
    pub poses: Vec<SE3>,
    pub views: Vec<View>,
    pub match_sets: Vec<MatchSet>,
}

impl SyntheticScene {
    pub fn generate(config: &SceneConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let n = config.num_points;

        let points: Vec<Vector3<f64>> = (0..n)
            .map(|_| {
                Vector3::new(
                    rng.gen_range(-config.half_width..=config.half_width),
                    rng.gen_range(-config.half_width..=config.half_width),
                    rng.gen_range(config.min_depth..=config.max_depth),
                )
            })
            .collect();
        let colors: Vec<Vector3<f32>> = (0..n)
            .map(|_| Vector3::new(rng.gen(), rng.gen(), rng.gen()))
            .collect();

        let cols = grid_columns(config.num_views);
        let poses: Vec<SE3> = (0..config.num_views)
            .map(|v| {
                let center = Vector3::new(
                    (v % cols) as f64 * config.baseline,
                    (v / cols) as f64 * config.baseline,
                    0.0,
                );
                SE3::from_rt(Matrix3::identity(), -center)
            })
            .collect();

        let views = poses
            .iter()
            .enumerate()
            .map(|(v, pose)| {
                let mut keypoints = vec![Keypoint::new(0.0, 0.0); n];
                for (i, p) in points.iter().enumerate() {
                    let px = config
                        .intrinsics
                        .project(&pose.transform_point(p))
                        .unwrap_or_else(|| nalgebra::Point2::new(config.intrinsics.cx, config.intrinsics.cy));
                    let (du, dv) = if config.noise_px > 0.0 {
                        (
                            rng.gen_range(-config.noise_px..=config.noise_px),
                            rng.gen_range(-config.noise_px..=config.noise_px),
                        )
                    } else {
                        (0.0, 0.0)
                    };
                    keypoints[feature_index(i, v, n)] =
                        Keypoint::new(px.x + du, px.y + dv).with_color(colors[i]);
                }
                View::new(config.intrinsics, keypoints)
            })
            .collect();

        let mut match_sets = Vec::new();
        for a in 0..config.num_views {
            for b in (a + 1)..config.num_views {
                let matches = (0..n)
                    .map(|i| (feature_index(i, a, n), feature_index(i, b, n)))
                    .collect();
                match_sets.push(MatchSet::new(ViewId::new(a), ViewId::new(b), matches));
            }
        }

        Self {
            points,
            poses,
            views,
            match_sets,
        }
    }
}

/// Index of point `i` among the features of view `v`.
pub fn feature_index(i: usize, v: usize, n: usize) -> usize {
    (i + 7 * v) % n
}

fn grid_columns(num_views: usize) -> usize {
    let mut cols = 1;
    while cols * cols < num_views {
        cols += 1;
    }
    cols
}
