//! Next-view selection.
//!
//! Primary criterion is visibility: how many map points belong to a track
//! the candidate view observes. The match-volume fallback only applies when
//! the stall policy asks for it.

use std::collections::HashSet;

use tracing::debug;

use crate::config::StallPolicy;
use crate::map::{Map, TrackId, ViewId};

use super::reconstructor::Reconstruction;

/// Why a view was selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewSelection {
    /// Enough map points are visible in the view.
    Visibility { view: ViewId, score: usize },
    /// Fallback: largest raw match volume against registered views.
    MatchVolume { view: ViewId, matches: usize },
}

impl ViewSelection {
    pub fn view(self) -> ViewId {
        match self {
            Self::Visibility { view, .. } | Self::MatchVolume { view, .. } => view,
        }
    }
}

impl Reconstruction {
    /// Number of map points whose track is observed in `view`.
    pub fn visibility_score(&self, view: ViewId) -> usize {
        let tracks: HashSet<TrackId> = self.tracks.tracks_in(view).map(|(t, _)| t).collect();
        count_visible(&self.map, &tracks)
    }

    /// Total matches between `view` and the registered views.
    pub fn match_volume(&self, view: ViewId) -> usize {
        self.registered
            .iter()
            .filter_map(|&r| self.pair_index.get(&(view, r)))
            .map(|&i| self.match_sets[i].len())
            .sum()
    }

    /// Unregistered views not skipped since the last registration, ascending.
    fn candidates(&self) -> impl Iterator<Item = ViewId> + '_ {
        self.cameras
            .iter()
            .filter(|c| !c.registered && !self.skipped.contains(&c.id))
            .map(|c| c.id)
    }

    /// Pick the next view to register, or `None` when none qualifies.
    ///
    /// The strictly highest visibility score wins, ties keep the lower id.
    pub fn select_next_view(&self) -> Option<ViewSelection> {
        let mut best: Option<(ViewId, usize)> = None;
        for view in self.candidates() {
            let score = self.visibility_score(view);
            debug!(%view, score, "next-view score");
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((view, score));
            }
        }

        let min_score = self.config.next_view.min_score;
        match best {
            Some((view, score)) if score >= min_score => {
                return Some(ViewSelection::Visibility { view, score });
            }
            Some((view, score)) => {
                debug!(%view, score, min_score, "best view below minimum score");
            }
            None => return None,
        }

        match self.config.next_view.stall_policy {
            StallPolicy::Stop => None,
            StallPolicy::MatchVolume => {
                let mut fallback: Option<(ViewId, usize)> = None;
                for view in self.candidates() {
                    let matches = self.match_volume(view);
                    if matches > 0 && fallback.map_or(true, |(_, m)| matches > m) {
                        fallback = Some((view, matches));
                    }
                }
                fallback.map(|(view, matches)| {
                    debug!(%view, matches, "falling back to match volume");
                    ViewSelection::MatchVolume { view, matches }
                })
            }
        }
    }
}

fn count_visible(map: &Map, tracks: &HashSet<TrackId>) -> usize {
    map.iter()
        .filter(|p| tracks.contains(&p.component_id))
        .count()
}
