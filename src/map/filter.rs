//! Error-based map filters.
//!
//! Both rank points by their mean reprojection error (summed error divided
//! by the number of views).

use tracing::debug;

use crate::geometry::Camera;

use super::map::Map;

impl Map {
    /// Drop points whose error is not below
    /// `min + (max - min) * (1 - percentile)`.
    ///
    /// Kept points stay in their relative order. Only errors strictly below
    /// the bound survive, so a map whose points all share one error is
    /// emptied. Nothing is removed when no error is finite. Returns the
    /// number of removed points.
    pub fn remove_outliers_by_error(&mut self, cameras: &[Camera], percentile: f64) -> usize {
        if self.is_empty() {
            return 0;
        }
        let errors = self.mean_point_errors(cameras);
        let Some(bound) = error_bound(&errors, percentile) else {
            return 0;
        };

        let before = self.len();
        let mut keep = errors.iter().map(|&e| e < bound);
        self.points_mut().retain(|_| keep.next().unwrap_or(false));

        let removed = before - self.len();
        debug!(bound, removed, kept = self.len(), "removed outliers by error");
        removed
    }

    /// A new map with the `floor(len * ratio)` points of smallest error, in
    /// ascending error order. Equal errors keep map order. `ratio >= 1.0`
    /// returns an unchanged copy.
    pub fn reduce_by_error(&self, cameras: &[Camera], ratio: f64) -> Map {
        if ratio >= 1.0 {
            return self.clone();
        }
        let errors = self.mean_point_errors(cameras);
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.sort_by(|&a, &b| errors[a].total_cmp(&errors[b]));

        let new_size = (self.len() as f64 * ratio.max(0.0)).floor() as usize;
        let reduced: Map = order
            .into_iter()
            .take(new_size)
            .map(|i| self.points()[i].clone())
            .collect();
        debug!(from = self.len(), to = reduced.len(), ratio, "reduced map by error");
        reduced
    }
}

/// `min + (max - min) * (1 - percentile)` over the finite errors, or `None`
/// when none is finite. With no spread the bound is `min`.
pub fn error_bound(errors: &[f64], percentile: f64) -> Option<f64> {
    let finite = errors.iter().copied().filter(|e| e.is_finite());
    let (min, max) = finite.fold(None, |acc: Option<(f64, f64)>, e| match acc {
        None => Some((e, e)),
        Some((lo, hi)) => Some((lo.min(e), hi.max(e))),
    })?;
    Some(min + (max - min) * (1.0 - percentile))
}
