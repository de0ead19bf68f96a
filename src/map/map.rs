//! Map - Ordered container of WorldPoints.
//!
//! The Map is the only owner of WorldPoints; other components refer to them
//! by index. It provides:
//! - insertion and bulk append
//! - reprojection error queries against a camera list
//! - signed depth of the points along a camera's principal axis
//!
//! Fusion and filtering live in `fusion.rs` and `filter.rs`.

use nalgebra::Vector3;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::geometry::Camera;

use super::world_point::WorldPoint;

/// The reconstructed 3D point map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Map {
    points: Vec<WorldPoint>,
}

impl Map {
    /// Create a new empty Map.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_points(points: Vec<WorldPoint>) -> Self {
        Self { points }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Point Management
    // ─────────────────────────────────────────────────────────────────────────

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Append a point and return its index.
    pub fn push(&mut self, point: WorldPoint) -> usize {
        self.points.push(point);
        self.points.len() - 1
    }

    /// Move all points of `other` to the end of this map.
    pub fn append(&mut self, other: Map) {
        self.points.extend(other.points);
    }

    pub fn get(&self, idx: usize) -> Option<&WorldPoint> {
        self.points.get(idx)
    }

    pub fn get_mut(&mut self, idx: usize) -> Option<&mut WorldPoint> {
        self.points.get_mut(idx)
    }

    pub fn points(&self) -> &[WorldPoint] {
        &self.points
    }

    pub(crate) fn points_mut(&mut self) -> &mut Vec<WorldPoint> {
        &mut self.points
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorldPoint> {
        self.points.iter()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reprojection Error
    // ─────────────────────────────────────────────────────────────────────────

    /// Summed error of every point (see [`point_error`]), in map order.
    pub fn reprojection_errors(&self, cameras: &[Camera]) -> Vec<f64> {
        self.points
            .par_iter()
            .map(|p| point_error(p, cameras))
            .collect()
    }

    /// Error of every point divided by its number of views, in map order.
    ///
    /// This is the per-point figure the outlier filters rank by.
    pub fn mean_point_errors(&self, cameras: &[Camera]) -> Vec<f64> {
        self.points
            .par_iter()
            .map(|p| mean_point_error(p, cameras))
            .collect()
    }

    /// Sum of all point errors.
    pub fn total_error(&self, cameras: &[Camera]) -> f64 {
        self.reprojection_errors(cameras).iter().sum()
    }

    /// Average of the per-point mean errors. Zero for an empty map.
    pub fn mean_error(&self, cameras: &[Camera]) -> f64 {
        if self.points.is_empty() {
            return 0.0;
        }
        self.mean_point_errors(cameras).iter().sum::<f64>() / self.points.len() as f64
    }

    /// Signed depth of every point along `camera`'s principal axis.
    pub fn depths(&self, camera: &Camera) -> Vec<f64> {
        self.points
            .iter()
            .map(|p| camera.depth_of(&p.position))
            .collect()
    }

    /// Centroid of all points, if any.
    pub fn centroid(&self) -> Option<Vector3<f64>> {
        if self.points.is_empty() {
            return None;
        }
        let sum: Vector3<f64> = self.points.iter().map(|p| p.position).sum();
        Some(sum / self.points.len() as f64)
    }
}

impl FromIterator<WorldPoint> for Map {
    fn from_iter<I: IntoIterator<Item = WorldPoint>>(iter: I) -> Self {
        Self::from_points(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Map {
    type Item = &'a WorldPoint;
    type IntoIter = std::slice::Iter<'a, WorldPoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

/// Sum over the point's views of `0.5 * |projected - observed|^2`, in pixels.
///
/// Views without a camera or keypoint are skipped. A point that cannot be
/// projected into one of its views (on the camera plane) has infinite error.
pub fn point_error(point: &WorldPoint, cameras: &[Camera]) -> f64 {
    let mut err = 0.0;
    for (view, &feature) in &point.views {
        let Some(camera) = cameras.get(view.index()) else {
            continue;
        };
        let Some(observed) = camera.keypoint(feature) else {
            continue;
        };
        match camera.project(&point.position) {
            Some(projected) => err += 0.5 * (projected - observed).norm_squared(),
            None => return f64::INFINITY,
        }
    }
    err
}

/// [`point_error`] divided by the number of views.
pub fn mean_point_error(point: &WorldPoint, cameras: &[Camera]) -> f64 {
    if point.views.is_empty() {
        return 0.0;
    }
    point_error(point, cameras) / point.views.len() as f64
}
