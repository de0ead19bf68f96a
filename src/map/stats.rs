//! Summary statistics over a finished map.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::geometry::Camera;

use super::map::Map;

/// Number of bins in the default error histogram.
pub const DEFAULT_ERROR_BINS: usize = 20;

/// Point counts and the distribution of per-point errors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapStats {
    pub num_points: usize,
    /// `number of views -> number of points seen by that many views`.
    pub view_counts: BTreeMap<usize, usize>,
    pub min_error: f64,
    pub max_error: f64,
    pub mean_error: f64,
    /// Summed (not view-averaged) error over the whole map.
    pub total_error: f64,
    /// Equal-width histogram of per-point mean error over `[min, max]`.
    pub error_histogram: Vec<usize>,
}

impl MapStats {
    pub fn compute(map: &Map, cameras: &[Camera]) -> Self {
        Self::with_bins(map, cameras, DEFAULT_ERROR_BINS)
    }

    pub fn with_bins(map: &Map, cameras: &[Camera], bins: usize) -> Self {
        let mut view_counts = BTreeMap::new();
        for p in map {
            *view_counts.entry(p.num_views()).or_insert(0) += 1;
        }

        let errors = map.mean_point_errors(cameras);
        let finite: Vec<f64> = errors.iter().copied().filter(|e| e.is_finite()).collect();
        let (min_error, max_error, mean_error) = if finite.is_empty() {
            (0.0, 0.0, 0.0)
        } else {
            let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
            let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            (min, max, finite.iter().sum::<f64>() / finite.len() as f64)
        };

        let mut error_histogram = vec![0; bins];
        if bins > 0 {
            let width = (max_error - min_error) / bins as f64;
            for e in &finite {
                let idx = if width > 0.0 {
                    (((e - min_error) / width).floor() as usize).min(bins - 1)
                } else {
                    0
                };
                error_histogram[idx] += 1;
            }
        }

        Self {
            num_points: map.len(),
            view_counts,
            min_error,
            max_error,
            mean_error,
            total_error: map.total_error(cameras),
            error_histogram,
        }
    }
}

impl std::fmt::Display for MapStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "points: {}", self.num_points)?;
        for (views, count) in &self.view_counts {
            writeln!(f, "  seen by {views} views: {count}")?;
        }
        writeln!(
            f,
            "error min/mean/max: {:.6} / {:.6} / {:.6} (total {:.6})",
            self.min_error, self.mean_error, self.max_error, self.total_error
        )?;
        write!(f, "error histogram: {:?}", self.error_histogram)
    }
}
