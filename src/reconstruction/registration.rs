//! View registration: absolute pose from map points seen in the view.

use std::collections::HashMap;

use nalgebra::{Point2, Vector3};
use tracing::debug;

use crate::config::AmbiguityPolicy;
use crate::map::{TrackId, ViewId};

use super::reconstructor::Reconstruction;
use super::result::RegistrationFailure;

impl Reconstruction {
    /// 3D-2D pairs between map points and the features of `view` in the
    /// same track, in ascending track order.
    ///
    /// Each track contributes at most once: the first map point of the track
    /// and, for the feature, the first one found (or none under
    /// `SkipAmbiguous` when the view has several).
    pub fn correspondences_2d3d(&self, view: ViewId) -> (Vec<Vector3<f64>>, Vec<Point2<f64>>) {
        let mut first_point: HashMap<TrackId, usize> = HashMap::new();
        for (i, p) in self.map.iter().enumerate() {
            first_point.entry(p.component_id).or_insert(i);
        }

        let Some(camera) = self.cameras.get(view.index()) else {
            return (Vec::new(), Vec::new());
        };
        let ambiguity = self.config.triangulation.ambiguity;

        let mut points_3d = Vec::new();
        let mut points_2d = Vec::new();
        for (track, features) in self.tracks.tracks_in(view) {
            let Some(&idx) = first_point.get(&track) else {
                continue;
            };
            if features.len() > 1 && ambiguity == AmbiguityPolicy::SkipAmbiguous {
                continue;
            }
            let Some(pixel) = features.first().and_then(|&f| camera.keypoint(f)) else {
                continue;
            };
            points_3d.push(self.map.points()[idx].position);
            points_2d.push(*pixel);
        }
        (points_3d, points_2d)
    }

    /// Estimate the pose of `view` and mark it registered.
    pub(crate) fn register_view(&mut self, view: ViewId) -> Result<(), RegistrationFailure> {
        let (points_3d, points_2d) = self.correspondences_2d3d(view);
        let required = self.config.registration.min_correspondences;
        if points_3d.len() < required {
            return Err(RegistrationFailure::InsufficientCorrespondences {
                found: points_3d.len(),
                required,
            });
        }

        let intrinsics = self.cameras[view.index()].intrinsics;
        let pose = self
            .solvers
            .pose
            .estimate(&points_3d, &points_2d, &intrinsics)
            .map_err(RegistrationFailure::PoseSolverFailed)?;

        debug!(%view, correspondences = points_3d.len(), "pose estimated");
        self.cameras[view.index()].register(pose);
        self.mark_registered(view);
        Ok(())
    }
}
