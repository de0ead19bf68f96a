//! Bootstrap: pose the first camera pair and seed the map.

use nalgebra::Point2;
use tracing::{debug, info};

use crate::config::PairOrder;
use crate::correspondence::MatchSet;
use crate::error::ReconstructionError;
use crate::geometry::SE3;

use super::reconstructor::Reconstruction;
use super::state::ReconstructionState;

/// Indices of `match_sets` in the order they are tried.
pub fn bootstrap_order(match_sets: &[MatchSet], order: PairOrder) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..match_sets.len()).collect();
    if order == PairOrder::LargestFirst {
        indices.sort_by(|&a, &b| match_sets[b].len().cmp(&match_sets[a].len()));
    }
    indices
}

impl Reconstruction {
    /// Pose the first pair that has enough matches and for which the
    /// two-view estimator succeeds.
    ///
    /// The pair's first view is anchored at the identity, the second gets the
    /// estimated relative pose, and all tracks common to both are
    /// triangulated. Only one pair is ever bootstrapped.
    pub fn bootstrap(&mut self) -> Result<(), ReconstructionError> {
        if self.state != ReconstructionState::Init {
            return Err(ReconstructionError::AlreadyBootstrapped);
        }

        let floor = self.config.bootstrap.min_correspondences;
        let order = bootstrap_order(&self.match_sets, self.config.bootstrap.pair_order);
        let mut tried = 0usize;

        for idx in order {
            let set = &self.match_sets[idx];
            let (view_a, view_b) = (set.view_a, set.view_b);
            if set.len() < floor || view_a == view_b {
                debug!(%view_a, %view_b, matches = set.len(), floor, "pair below bootstrap floor");
                continue;
            }
            tried += 1;

            let cam_a = &self.cameras[view_a.index()];
            let cam_b = &self.cameras[view_b.index()];
            let (points_a, points_b): (Vec<Point2<f64>>, Vec<Point2<f64>>) = set
                .matches
                .iter()
                .filter_map(|&(fa, fb)| Some((*cam_a.keypoint(fa)?, *cam_b.keypoint(fb)?)))
                .unzip();

            let relative = match self.solvers.two_view.estimate(
                &points_a,
                &points_b,
                &cam_a.intrinsics,
                &cam_b.intrinsics,
            ) {
                Ok(pose) => pose,
                Err(e) => {
                    debug!(%view_a, %view_b, error = %e, "two-view estimation failed");
                    continue;
                }
            };

            self.cameras[view_a.index()].register(SE3::identity());
            self.cameras[view_b.index()].register(relative);
            self.mark_registered(view_a);
            self.mark_registered(view_b);

            let (mut seed_map, stats) = self.triangulate_pair(view_a, view_b);
            self.triangulation_stats += stats;
            let absorbed = seed_map.combine_components(self.config.fusion.combine_distance);
            self.map = seed_map;
            self.state = ReconstructionState::Bootstrapped;

            info!(
                %view_a,
                %view_b,
                matches = points_a.len(),
                points = self.map.len(),
                absorbed,
                "bootstrapped initial pair"
            );
            return Ok(());
        }

        Err(ReconstructionError::BootstrapFailed {
            tried,
            total: self.match_sets.len(),
        })
    }
}
