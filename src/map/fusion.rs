//! Map fusion: deduplicating points that belong to the same track.
//!
//! Two families of operations:
//! - `combine_components` clusters points of one map per component.
//! - `merge` / `merge_indexed` fold a local map into a global one, matching
//!   each local point against the nearest global point of its component.

use tracing::debug;

use crate::correspondence::CorrespondenceGraph;

use super::map::Map;
use super::types::{Observation, TrackId};
use super::world_point::WorldPoint;

/// Default distance below which a local point is folded into a global one.
pub const DEFAULT_MERGE_BOUND: f64 = 20.0;

/// Outcome of a merge of a local map into a global one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Local points whose views were folded into an existing point.
    pub absorbed: usize,
    /// Local points appended as new points.
    pub appended: usize,
}

/// Component of `point` as the graph currently sees it.
///
/// Falls back to the stored id when the point's first observation is not in
/// the graph.
fn canonical_component(point: &WorldPoint, graph: &CorrespondenceGraph<Observation>) -> TrackId {
    point
        .observations()
        .next()
        .and_then(|obs| graph.root(&obs))
        .unwrap_or(point.component_id)
}

impl Map {
    /// Cluster points of the same component lying closer than `threshold`.
    ///
    /// Points are stably sorted by `(component_id, |position|)` and scanned in
    /// order. A point close to the running cluster is absorbed into it
    /// (midpoint position, union of views, averaged color); otherwise the
    /// cluster is closed and the point starts a new one. Moving midpoints can
    /// bring closed clusters within `threshold` of each other, so passes repeat
    /// until one absorbs nothing. A second call is therefore a no-op.
    ///
    /// Returns the number of points absorbed.
    pub fn combine_components(&mut self, threshold: f64) -> usize {
        let mut points = std::mem::take(self.points_mut());
        let before = points.len();
        let mut passes = 0usize;
        loop {
            passes += 1;
            let len = points.len();
            points = combine_pass(points, threshold);
            if points.len() == len {
                break;
            }
        }

        let absorbed = before - points.len();
        *self.points_mut() = points;
        debug!(before, after = self.len(), absorbed, passes, "combined map components");
        absorbed
    }

    /// Fold `local` into this map with a linear scan per local point.
    ///
    /// For each local point the nearest point of this map in the same
    /// connected component is found. If it is closer than `bound` it takes
    /// over the local point's views; otherwise the local point is appended.
    /// Appended points are not matched against each other.
    pub fn merge(
        &mut self,
        local: &Map,
        graph: &CorrespondenceGraph<Observation>,
        bound: f64,
    ) -> MergeStats {
        let global_components: Vec<TrackId> = self
            .iter()
            .map(|p| canonical_component(p, graph))
            .collect();

        let mut stats = MergeStats::default();
        let mut appended: Vec<WorldPoint> = Vec::new();
        for lp in local {
            let component = canonical_component(lp, graph);
            let nearest = self
                .iter()
                .enumerate()
                .filter(|(i, _)| global_components[*i] == component)
                .map(|(i, wp)| (i, (wp.position - lp.position).norm()))
                .fold(None, nearer);

            match nearest {
                Some((i, dist)) if dist < bound => {
                    if let Some(wp) = self.get_mut(i) {
                        wp.absorb_views(lp);
                    }
                    stats.absorbed += 1;
                }
                _ => {
                    appended.push(lp.clone());
                    stats.appended += 1;
                }
            }
        }

        self.points_mut().extend(appended);
        debug!(
            absorbed = stats.absorbed,
            appended = stats.appended,
            "merged local map"
        );
        stats
    }

    /// Same result as [`merge`](Self::merge) (as a set of points), but this
    /// map is first stably sorted by component and each local point only
    /// scans its component's range, found by binary search.
    pub fn merge_indexed(
        &mut self,
        local: &Map,
        graph: &CorrespondenceGraph<Observation>,
        bound: f64,
    ) -> MergeStats {
        let mut keyed: Vec<(TrackId, WorldPoint)> = std::mem::take(self.points_mut())
            .into_iter()
            .map(|p| (canonical_component(&p, graph), p))
            .collect();
        keyed.sort_by_key(|(c, _)| *c);
        let (components, points): (Vec<TrackId>, Vec<WorldPoint>) = keyed.into_iter().unzip();
        *self.points_mut() = points;

        let mut stats = MergeStats::default();
        let mut appended: Vec<WorldPoint> = Vec::new();
        for lp in local {
            let component = canonical_component(lp, graph);
            let start = components.partition_point(|c| *c < component);
            let end = components.partition_point(|c| *c <= component);

            let nearest = self.points()[start..end]
                .iter()
                .enumerate()
                .map(|(off, wp)| (start + off, (wp.position - lp.position).norm()))
                .fold(None, nearer);

            match nearest {
                Some((i, dist)) if dist < bound => {
                    if let Some(wp) = self.get_mut(i) {
                        wp.absorb_views(lp);
                    }
                    stats.absorbed += 1;
                }
                _ => {
                    appended.push(lp.clone());
                    stats.appended += 1;
                }
            }
        }

        self.points_mut().extend(appended);
        debug!(
            absorbed = stats.absorbed,
            appended = stats.appended,
            "merged local map (indexed)"
        );
        stats
    }

    /// Append `local` and run [`combine_components`](Self::combine_components).
    pub fn merge_and_combine(&mut self, local: Map, threshold: f64) -> usize {
        self.append(local);
        self.combine_components(threshold)
    }
}

/// One sorted scan of [`Map::combine_components`].
fn combine_pass(points: Vec<WorldPoint>, threshold: f64) -> Vec<WorldPoint> {
    let mut keyed: Vec<(TrackId, f64, WorldPoint)> = points
        .into_iter()
        .map(|p| (p.component_id, p.position.norm(), p))
        .collect();
    keyed.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.total_cmp(&b.1)));

    let mut combined: Vec<WorldPoint> = Vec::with_capacity(keyed.len());
    for (_, _, point) in keyed {
        match combined.last_mut() {
            Some(cluster)
                if cluster.component_id == point.component_id
                    && (cluster.position - point.position).norm() < threshold =>
            {
                cluster.absorb(&point);
            }
            _ => combined.push(point),
        }
    }
    combined
}

/// Keep the strictly nearer candidate; ties keep the earlier one.
fn nearer(best: Option<(usize, f64)>, candidate: (usize, f64)) -> Option<(usize, f64)> {
    match best {
        Some(b) if b.1 <= candidate.1 => Some(b),
        _ => Some(candidate),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correspondence::MatchSet;
    use crate::map::ViewId;
    use nalgebra::Vector3;
    use std::collections::BTreeSet;

    fn v(i: usize) -> ViewId {
        ViewId::new(i)
    }

    fn point(x: f64, component: usize, views: &[(usize, usize)]) -> WorldPoint {
        views.iter().fold(
            WorldPoint::new(Vector3::new(x, 0.0, 5.0), TrackId(component)),
            |p, &(view, feature)| p.with_observation(v(view), feature),
        )
    }

    #[test]
    fn test_combine_absorbs_close_points_of_same_component() {
        let mut map = Map::from_points(vec![
            point(0.0, 1, &[(0, 0)]),
            point(0.2, 1, &[(1, 0)]),
            point(0.1, 2, &[(2, 0)]),
        ]);
        let absorbed = map.combine_components(1.0);
        assert_eq!(absorbed, 1);
        assert_eq!(map.len(), 2);
        let merged = &map.points()[0];
        assert_eq!(merged.component_id, TrackId(1));
        assert_eq!(merged.num_views(), 2);
        assert!((merged.position.x - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_combine_far_point_starts_new_cluster() {
        let mut map = Map::from_points(vec![
            point(0.0, 1, &[(0, 0)]),
            point(3.0, 1, &[(1, 0)]),
            point(3.5, 1, &[(2, 0)]),
        ]);
        map.combine_components(1.0);
        assert_eq!(map.len(), 2);
        assert_eq!(map.points()[1].num_views(), 2);
    }

    #[test]
    fn test_combine_is_idempotent() {
        let mut map = Map::from_points(vec![
            point(0.0, 0, &[(0, 0)]),
            point(0.3, 0, &[(1, 0)]),
            point(5.0, 0, &[(2, 0)]),
            point(1.0, 3, &[(0, 1)]),
            point(9.0, 3, &[(1, 1)]),
        ]);
        map.combine_components(1.0);
        let once = map.clone();
        assert_eq!(map.combine_components(1.0), 0);
        assert_eq!(map, once);
    }

    #[test]
    fn test_combine_repeats_until_stable() {
        // The second cluster's midpoint drifts within 1.0 of the first one.
        let p = |x: f64, y: f64, z: f64, view: usize| {
            WorldPoint::new(Vector3::new(x, y, z), TrackId(0)).with_observation(v(view), 0)
        };
        let mut map = Map::from_points(vec![
            p(1.0, 0.0, 0.0, 0),
            p(0.0, 1.05, 0.0, 1),
            p(0.9, 0.9, 0.0, 2),
            p(1.0, 0.9, 0.3, 3),
        ]);
        assert_eq!(map.combine_components(1.0), 3);
        assert_eq!(map.len(), 1);
        assert_eq!(map.points()[0].num_views(), 4);
        assert!((map.points()[0].position - Vector3::new(0.8625, 0.46875, 0.075)).norm() < 1e-12);
        assert_eq!(map.combine_components(1.0), 0);
    }

    fn graph() -> CorrespondenceGraph {
        CorrespondenceGraph::from_match_sets(&[
            MatchSet::new(v(0), v(1), vec![(0, 0), (1, 1)]),
            MatchSet::new(v(1), v(2), vec![(0, 0), (1, 1)]),
        ])
    }

    fn track(g: &CorrespondenceGraph, view: usize, feature: usize) -> usize {
        g.root(&Observation::new(v(view), feature)).unwrap().0
    }

    fn global_and_local(g: &CorrespondenceGraph) -> (Map, Map) {
        let t0 = track(g, 0, 0);
        let t1 = track(g, 0, 1);
        let global = Map::from_points(vec![
            point(0.0, t1, &[(0, 1), (1, 1)]),
            point(0.0, t0, &[(0, 0), (1, 0)]),
            point(50.0, t0, &[(0, 0), (1, 0)]),
        ]);
        let local = Map::from_points(vec![
            point(1.0, t0, &[(1, 0), (2, 0)]),
            point(100.0, t1, &[(1, 1), (2, 1)]),
        ]);
        (global, local)
    }

    #[test]
    fn test_merge_absorbs_near_and_appends_far() {
        let g = graph();
        let (mut global, local) = global_and_local(&g);
        let stats = global.merge(&local, &g, DEFAULT_MERGE_BOUND);

        assert_eq!(stats, MergeStats { absorbed: 1, appended: 1 });
        assert_eq!(global.len(), 4);
        assert_eq!(global.points()[1].num_views(), 3);
        assert_eq!(global.points()[1].position.x, 0.0);
        assert_eq!(global.points()[3].position.x, 100.0);
    }

    #[test]
    fn test_merge_indexed_matches_linear_merge() {
        let g = graph();
        let (mut linear, local) = global_and_local(&g);
        let (mut indexed, _) = global_and_local(&g);

        let a = linear.merge(&local, &g, DEFAULT_MERGE_BOUND);
        let b = indexed.merge_indexed(&local, &g, DEFAULT_MERGE_BOUND);
        assert_eq!(a, b);

        let as_set = |m: &Map| -> BTreeSet<String> {
            m.iter()
                .map(|p| format!("{:?}|{:?}", p.position, p.views))
                .collect()
        };
        assert_eq!(as_set(&linear), as_set(&indexed));
    }

    #[test]
    fn test_merge_into_empty_map_appends_everything() {
        let g = graph();
        let (_, local) = global_and_local(&g);
        let mut global = Map::new();
        let stats = global.merge_indexed(&local, &g, DEFAULT_MERGE_BOUND);
        assert_eq!(stats.appended, 2);
        assert_eq!(global, local);
    }

    #[test]
    fn test_merge_and_combine() {
        let mut map = Map::from_points(vec![point(0.0, 0, &[(0, 0)])]);
        let local = Map::from_points(vec![point(0.5, 0, &[(1, 0)]), point(0.0, 1, &[(2, 0)])]);
        let absorbed = map.merge_and_combine(local, 1.0);
        assert_eq!(absorbed, 1);
        assert_eq!(map.len(), 2);
    }
}
