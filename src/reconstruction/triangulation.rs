//! Map building: triangulate the tracks two registered views share.

use nalgebra::Vector3;
use tracing::debug;

use crate::config::AmbiguityPolicy;
use crate::geometry::Camera;
use crate::map::{Map, ViewId, WorldPoint};

use super::reconstructor::Reconstruction;
use super::result::TriangulationStats;

/// Why a triangulated candidate was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    Cheirality,
    Reprojection,
    Depth,
}

impl Reconstruction {
    /// Triangulate every track observed in both `a` and `b`, in ascending
    /// track order, into a fresh map. Existing map points are not consulted.
    pub fn triangulate_pair(&self, a: ViewId, b: ViewId) -> (Map, TriangulationStats) {
        let mut stats = TriangulationStats::default();
        let mut local = Map::new();
        let (Some(cam_a), Some(cam_b)) = (self.cameras.get(a.index()), self.cameras.get(b.index()))
        else {
            return (local, stats);
        };
        let proj_a = cam_a.projection_matrix();
        let proj_b = cam_b.projection_matrix();
        let cfg = &self.config.triangulation;

        for (track, features_a, features_b) in self.tracks.common_tracks(a, b) {
            stats.candidates += 1;
            if features_a.len() > 1 || features_b.len() > 1 {
                stats.ambiguous_tracks += 1;
                if cfg.ambiguity == AmbiguityPolicy::SkipAmbiguous {
                    continue;
                }
            }
            let (Some(&fa), Some(&fb)) = (features_a.first(), features_b.first()) else {
                continue;
            };
            let (Some(pa), Some(pb)) = (cam_a.keypoint(fa), cam_b.keypoint(fb)) else {
                continue;
            };

            let Some(position) = self.solvers.triangulator.triangulate(&proj_a, &proj_b, pa, pb)
            else {
                stats.failed += 1;
                continue;
            };

            if let Some(reason) = self.reject(&position, [(cam_a, fa), (cam_b, fb)]) {
                match reason {
                    Rejection::Cheirality => stats.rejected_cheirality += 1,
                    Rejection::Reprojection => stats.rejected_reprojection += 1,
                    Rejection::Depth => stats.rejected_depth += 1,
                }
                continue;
            }

            let color = match (cam_a.keypoints[fa].color, cam_b.keypoints[fb].color) {
                (Some(ca), Some(cb)) => Some(0.5 * (ca + cb)),
                (ca, cb) => ca.or(cb),
            };
            local.push(
                WorldPoint::new(position, track)
                    .with_observation(a, fa)
                    .with_observation(b, fb)
                    .with_color(color),
            );
            stats.triangulated += 1;
        }

        debug!(
            %a,
            %b,
            candidates = stats.candidates,
            triangulated = stats.triangulated,
            ambiguous = stats.ambiguous_tracks,
            "triangulated pair"
        );
        (local, stats)
    }

    fn reject(&self, position: &Vector3<f64>, views: [(&Camera, usize); 2]) -> Option<Rejection> {
        let cfg = &self.config.triangulation;
        for (camera, feature) in views {
            let depth = camera.depth_of(position);
            if cfg.require_cheirality && depth <= 0.0 {
                return Some(Rejection::Cheirality);
            }
            if cfg.max_depth.is_some_and(|max| depth > max) {
                return Some(Rejection::Depth);
            }
            let error = match (camera.project(position), camera.keypoint(feature)) {
                (Some(projected), Some(observed)) => (projected - observed).norm(),
                _ => f64::INFINITY,
            };
            if error > cfg.max_reprojection_error {
                return Some(Rejection::Reprojection);
            }
        }
        None
    }

    /// Triangulate a newly registered view against every other registered
    /// view and add the result to the map.
    pub(crate) fn triangulate_new_view(&mut self, view: ViewId) -> TriangulationStats {
        let mut stats = TriangulationStats::default();
        let mut local = Map::new();
        for other in self.registered_sorted() {
            if other == view {
                continue;
            }
            let (pair_map, pair_stats) = self.triangulate_pair(view, other);
            local.append(pair_map);
            stats += pair_stats;
        }
        self.triangulation_stats += stats;

        if self.config.fusion.fuse_after_step {
            let absorbed = self
                .map
                .merge_and_combine(local, self.config.fusion.combine_distance);
            debug!(%view, absorbed, map_size = self.map.len(), "fused new points");
        } else {
            self.map.append(local);
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReconstructionConfig;
    use crate::correspondence::MatchSet;
    use crate::geometry::{Intrinsics, Keypoint, Solvers, View, SE3};
    use nalgebra::Matrix3;

    fn v(i: usize) -> ViewId {
        ViewId::new(i)
    }

    /// Two registered views one unit apart looking at points straight ahead.
    /// Track 0 is clean, track 1 has a second feature in view 1, track 2's
    /// feature in view 1 is 10 px off the epipolar line.
    fn setup(config: ReconstructionConfig) -> Reconstruction {
        let k = Intrinsics::new(500.0, 500.0, 320.0, 240.0);
        let pose_b = SE3::from_rt(Matrix3::identity(), Vector3::new(-1.0, 0.0, 0.0));
        let points = [
            Vector3::new(0.0, 0.0, 5.0),
            Vector3::new(0.5, 0.2, 6.0),
            Vector3::new(-0.5, 0.1, 4.0),
        ];
        let kp = |pose: &SE3, p: &Vector3<f64>| {
            let px = k.project(&pose.transform_point(p)).unwrap();
            Keypoint::new(px.x, px.y).with_color(Vector3::new(1.0, 0.0, 0.0))
        };
        let view_a: Vec<Keypoint> = points.iter().map(|p| kp(&SE3::identity(), p)).collect();
        let mut view_b: Vec<Keypoint> = points.iter().map(|p| kp(&pose_b, p)).collect();
        view_b[2].pt.y += 10.0;
        view_b.push(view_b[1]);

        let sets = vec![
            MatchSet::new(v(0), v(1), vec![(0, 0), (1, 1), (2, 2)]),
            MatchSet::new(v(0), v(1), vec![(1, 3)]),
        ];
        let mut r = Reconstruction::new(
            vec![View::new(k, view_a), View::new(k, view_b)],
            sets,
            config,
            Solvers::default(),
        )
        .unwrap();
        r.cameras[0].register(SE3::identity());
        r.cameras[1].register(pose_b);
        r
    }

    #[test]
    fn test_filters_and_first_found() {
        let r = setup(ReconstructionConfig::default());
        let (map, stats) = r.triangulate_pair(v(0), v(1));

        assert_eq!(stats.candidates, 3);
        assert_eq!(stats.ambiguous_tracks, 1);
        assert_eq!(stats.rejected_reprojection, 1);
        assert_eq!(stats.triangulated, 2);
        assert_eq!(map.len(), 2);

        let ambiguous = &map.points()[1];
        assert_eq!(ambiguous.views[&v(1)], 1);
        assert!((ambiguous.position - Vector3::new(0.5, 0.2, 6.0)).norm() < 1e-9);
        assert_eq!(ambiguous.color, Some(Vector3::new(1.0, 0.0, 0.0)));
    }

    #[test]
    fn test_skip_ambiguous_policy() {
        let mut config = ReconstructionConfig::default();
        config.triangulation.ambiguity = AmbiguityPolicy::SkipAmbiguous;
        let r = setup(config);
        let (map, stats) = r.triangulate_pair(v(0), v(1));
        assert_eq!(stats.ambiguous_tracks, 1);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_max_depth() {
        let mut config = ReconstructionConfig::default();
        config.triangulation.max_depth = Some(5.5);
        let r = setup(config);
        let (map, stats) = r.triangulate_pair(v(0), v(1));
        assert_eq!(stats.rejected_depth, 1);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_pair_order_does_not_matter() {
        let r = setup(ReconstructionConfig::default());
        let (ab, _) = r.triangulate_pair(v(0), v(1));
        let (ba, _) = r.triangulate_pair(v(1), v(0));
        assert_eq!(ab.len(), ba.len());
        for (p, q) in ab.iter().zip(ba.iter()) {
            assert_eq!(p.views, q.views);
            assert!((p.position - q.position).norm() < 1e-9);
        }
    }
}
