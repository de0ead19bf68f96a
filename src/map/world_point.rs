//! WorldPoint - A triangulated 3D point and the observations behind it.

use std::collections::BTreeMap;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use super::types::{Observation, TrackId, ViewId};

/// A 3D point of the reconstruction.
///
/// `views` maps each contributing view to the feature index seen there, so a
/// point holds at most one observation per view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldPoint {
    /// 3D position in world frame.
    pub position: Vector3<f64>,

    /// Track (connected component) this point was triangulated from.
    pub component_id: TrackId,

    /// Contributing observations, `view -> feature`.
    pub views: BTreeMap<ViewId, usize>,

    /// Mean RGB color of the contributing keypoints, when known.
    pub color: Option<Vector3<f32>>,
}

impl WorldPoint {
    pub fn new(position: Vector3<f64>, component_id: TrackId) -> Self {
        Self {
            position,
            component_id,
            views: BTreeMap::new(),
            color: None,
        }
    }

    /// Builder-style variant of [`add_observation`](Self::add_observation).
    pub fn with_observation(mut self, view: ViewId, feature: usize) -> Self {
        self.add_observation(view, feature);
        self
    }

    pub fn with_color(mut self, color: Option<Vector3<f32>>) -> Self {
        self.color = color;
        self
    }

    /// Add an observation. An existing entry for the view is kept.
    ///
    /// Returns true if the observation was inserted.
    pub fn add_observation(&mut self, view: ViewId, feature: usize) -> bool {
        match self.views.entry(view) {
            std::collections::btree_map::Entry::Occupied(_) => false,
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(feature);
                true
            }
        }
    }

    pub fn num_views(&self) -> usize {
        self.views.len()
    }

    pub fn observations(&self) -> impl Iterator<Item = Observation> + '_ {
        self.views
            .iter()
            .map(|(&view, &feature)| Observation::new(view, feature))
    }

    /// Fold `other` into this point: midpoint position, union of views
    /// (entries already here win) and averaged color.
    pub fn absorb(&mut self, other: &WorldPoint) {
        self.position = 0.5 * (self.position + other.position);
        self.absorb_views(other);
        self.color = match (self.color, other.color) {
            (Some(a), Some(b)) => Some(0.5 * (a + b)),
            (a, b) => a.or(b),
        };
    }

    /// Union `other`'s views into this point without moving it.
    pub fn absorb_views(&mut self, other: &WorldPoint) {
        for (&view, &feature) in &other.views {
            self.views.entry(view).or_insert(feature);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn v(i: usize) -> ViewId {
        ViewId::new(i)
    }

    #[test]
    fn test_one_observation_per_view() {
        let mut p = WorldPoint::new(Vector3::zeros(), TrackId(0));
        assert!(p.add_observation(v(1), 3));
        assert!(!p.add_observation(v(1), 8));
        assert_eq!(p.views[&v(1)], 3);
        assert_eq!(p.num_views(), 1);
    }

    #[test]
    fn test_absorb_midpoint_union_and_color() {
        let mut a = WorldPoint::new(Vector3::new(0.0, 0.0, 2.0), TrackId(4))
            .with_observation(v(0), 1)
            .with_observation(v(1), 2)
            .with_color(Some(Vector3::new(1.0, 0.0, 0.0)));
        let b = WorldPoint::new(Vector3::new(0.0, 0.0, 4.0), TrackId(4))
            .with_observation(v(1), 7)
            .with_observation(v(2), 5)
            .with_color(Some(Vector3::new(0.0, 1.0, 0.0)));

        a.absorb(&b);
        assert_relative_eq!(a.position, Vector3::new(0.0, 0.0, 3.0));
        assert_eq!(a.num_views(), 3);
        assert_eq!(a.views[&v(1)], 2);
        assert_eq!(a.color, Some(Vector3::new(0.5, 0.5, 0.0)));
    }

    #[test]
    fn test_observations_sorted_by_view() {
        let p = WorldPoint::new(Vector3::zeros(), TrackId(0))
            .with_observation(v(3), 0)
            .with_observation(v(1), 9);
        let obs: Vec<_> = p.observations().collect();
        assert_eq!(obs, vec![Observation::new(v(1), 9), Observation::new(v(3), 0)]);
    }
}
