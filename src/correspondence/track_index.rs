//! Per-view lookup of tracks, built once the graph is complete.

use std::collections::{BTreeMap, HashMap};

use crate::map::{Observation, TrackId, ViewId};

use super::union_find::CorrespondenceGraph;

/// `view -> track -> features of that view in the track`.
///
/// Feature lists keep the graph's registration order, so the first entry is
/// the first-found observation. Tracks iterate in ascending id order.
#[derive(Debug, Clone, Default)]
pub struct TrackIndex {
    by_view: HashMap<ViewId, BTreeMap<TrackId, Vec<usize>>>,
}

impl TrackIndex {
    pub fn build(graph: &CorrespondenceGraph<Observation>) -> Self {
        let mut by_view: HashMap<ViewId, BTreeMap<TrackId, Vec<usize>>> = HashMap::new();
        for (obs, track) in graph.iter_roots() {
            by_view
                .entry(obs.view)
                .or_default()
                .entry(track)
                .or_default()
                .push(obs.feature);
        }
        Self { by_view }
    }

    /// Tracks observed in `view`.
    pub fn tracks_in(&self, view: ViewId) -> impl Iterator<Item = (TrackId, &[usize])> + '_ {
        self.by_view
            .get(&view)
            .into_iter()
            .flat_map(|tracks| tracks.iter().map(|(&t, f)| (t, f.as_slice())))
    }

    /// Features of `view` belonging to `track`. Empty if none.
    pub fn features(&self, view: ViewId, track: TrackId) -> &[usize] {
        self.by_view
            .get(&view)
            .and_then(|tracks| tracks.get(&track))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn contains(&self, view: ViewId, track: TrackId) -> bool {
        !self.features(view, track).is_empty()
    }

    /// Number of distinct tracks seen in `view`.
    pub fn track_count(&self, view: ViewId) -> usize {
        self.by_view.get(&view).map_or(0, BTreeMap::len)
    }

    /// Tracks observed in both views, ascending by track id.
    pub fn common_tracks(&self, a: ViewId, b: ViewId) -> Vec<(TrackId, &[usize], &[usize])> {
        let (Some(ta), Some(tb)) = (self.by_view.get(&a), self.by_view.get(&b)) else {
            return Vec::new();
        };
        ta.iter()
            .filter_map(|(t, fa)| tb.get(t).map(|fb| (*t, fa.as_slice(), fb.as_slice())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correspondence::MatchSet;

    fn v(i: usize) -> ViewId {
        ViewId::new(i)
    }

    fn graph() -> CorrespondenceGraph {
        CorrespondenceGraph::from_match_sets(&[
            MatchSet::new(v(0), v(1), vec![(0, 0), (1, 1), (2, 2)]),
            MatchSet::new(v(1), v(2), vec![(0, 4), (2, 5)]),
            // Second feature of view 2 in the same track as 0#0.
            MatchSet::new(v(0), v(2), vec![(0, 9)]),
        ])
    }

    #[test]
    fn test_common_tracks_ascending() {
        let g = graph();
        let index = TrackIndex::build(&g);

        let common = index.common_tracks(v(0), v(1));
        assert_eq!(common.len(), 3);
        assert!(common.windows(2).all(|w| w[0].0 < w[1].0));

        let common_02 = index.common_tracks(v(0), v(2));
        assert_eq!(common_02.len(), 2);
    }

    #[test]
    fn test_ambiguous_track_keeps_first_found() {
        let g = graph();
        let index = TrackIndex::build(&g);
        let track = g.root(&Observation::new(v(0), 0)).unwrap();
        assert_eq!(index.features(v(2), track), &[4, 9]);
        assert!(index.contains(v(2), track));
        assert_eq!(index.track_count(v(2)), 2);
        assert!(index.features(v(7), track).is_empty());
    }
}
