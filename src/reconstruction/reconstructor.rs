//! The incremental reconstruction: owns the cameras, the map and the
//! correspondence graph, and drives the state machine.
//!
//! Bootstrap, view selection, registration and triangulation are split
//! over the sibling modules as further `impl Reconstruction` blocks.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::ReconstructionConfig;
use crate::correspondence::{CorrespondenceGraph, MatchSet, TrackIndex};
use crate::error::ReconstructionError;
use crate::geometry::{Camera, Solvers, View};
use crate::map::{Map, MapStats, MergeStats, ViewId};

use super::result::{StepOutcome, Summary, TriangulationStats};
use super::state::ReconstructionState;

/// Incremental multi-view reconstruction.
pub struct Reconstruction {
    pub(super) cameras: Vec<Camera>,
    pub(super) map: Map,
    pub(super) graph: CorrespondenceGraph,
    pub(super) tracks: TrackIndex,
    pub(super) match_sets: Vec<MatchSet>,
    /// `(a, b)` and `(b, a)` -> index into `match_sets`.
    pub(super) pair_index: HashMap<(ViewId, ViewId), usize>,
    /// Registered views in registration order.
    pub(super) registered: Vec<ViewId>,
    /// Views that failed to register since the last successful registration.
    pub(super) skipped: HashSet<ViewId>,
    pub(super) state: ReconstructionState,
    pub(super) config: ReconstructionConfig,
    pub(super) solvers: Solvers,
    pub(super) triangulation_stats: TriangulationStats,
    pub(super) skipped_registrations: usize,
}

impl std::fmt::Debug for Reconstruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconstruction")
            .field("views", &self.cameras.len())
            .field("registered", &self.registered)
            .field("map_size", &self.map.len())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Reconstruction {
    /// Create a reconstruction over `views` (view `i` gets `ViewId(i)`) and
    /// the pairwise `match_sets` between them.
    ///
    /// Every match must reference an existing view and keypoint. The
    /// correspondence graph is built here and not modified afterwards.
    pub fn new(
        views: Vec<View>,
        match_sets: Vec<MatchSet>,
        config: ReconstructionConfig,
        solvers: Solvers,
    ) -> Result<Self, ReconstructionError> {
        let cameras: Vec<Camera> = views
            .into_iter()
            .enumerate()
            .map(|(i, view)| Camera::new(ViewId::new(i), view))
            .collect();

        for set in &match_sets {
            validate_match_set(set, &cameras)?;
        }

        let mut pair_index = HashMap::new();
        for (i, set) in match_sets.iter().enumerate() {
            pair_index.entry((set.view_a, set.view_b)).or_insert(i);
            pair_index.entry((set.view_b, set.view_a)).or_insert(i);
        }

        let graph = CorrespondenceGraph::from_match_sets(&match_sets);
        let tracks = TrackIndex::build(&graph);
        tracing::debug!(
            views = cameras.len(),
            match_sets = match_sets.len(),
            observations = graph.len(),
            tracks = graph.component_count(),
            "correspondence graph built"
        );

        Ok(Self {
            cameras,
            map: Map::new(),
            graph,
            tracks,
            match_sets,
            pair_index,
            registered: Vec::new(),
            skipped: HashSet::new(),
            state: ReconstructionState::Init,
            config,
            solvers,
            triangulation_stats: TriangulationStats::default(),
            skipped_registrations: 0,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn state(&self) -> ReconstructionState {
        self.state
    }

    pub fn cameras(&self) -> &[Camera] {
        &self.cameras
    }

    pub fn camera(&self, view: ViewId) -> Result<&Camera, ReconstructionError> {
        self.cameras
            .get(view.index())
            .ok_or(ReconstructionError::UnknownView {
                view,
                num_views: self.cameras.len(),
            })
    }

    pub fn map(&self) -> &Map {
        &self.map
    }

    pub fn graph(&self) -> &CorrespondenceGraph {
        &self.graph
    }

    pub fn tracks(&self) -> &TrackIndex {
        &self.tracks
    }

    pub fn match_sets(&self) -> &[MatchSet] {
        &self.match_sets
    }

    pub fn config(&self) -> &ReconstructionConfig {
        &self.config
    }

    /// Registered views in registration order.
    pub fn registered_views(&self) -> &[ViewId] {
        &self.registered
    }

    pub fn is_registered(&self, view: ViewId) -> bool {
        self.cameras
            .get(view.index())
            .is_some_and(|c| c.registered)
    }

    pub fn unregistered_views(&self) -> Vec<ViewId> {
        self.cameras
            .iter()
            .filter(|c| !c.registered)
            .map(|c| c.id)
            .collect()
    }

    pub fn triangulation_stats(&self) -> TriangulationStats {
        self.triangulation_stats
    }

    pub(super) fn mark_registered(&mut self, view: ViewId) {
        if !self.registered.contains(&view) {
            self.registered.push(view);
        }
        self.skipped.clear();
    }

    /// Registered views in ascending id order.
    pub(super) fn registered_sorted(&self) -> BTreeSet<ViewId> {
        self.registered.iter().copied().collect()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Driving the state machine
    // ─────────────────────────────────────────────────────────────────────────

    /// Select, register and triangulate one view.
    ///
    /// Returns `Stalled` (and moves to `Done`) once no view qualifies.
    pub fn step(&mut self) -> Result<StepOutcome, ReconstructionError> {
        match self.state {
            ReconstructionState::Init => return Err(ReconstructionError::NotBootstrapped),
            ReconstructionState::Done => return Ok(StepOutcome::Stalled),
            _ => {}
        }

        self.state = ReconstructionState::SelectView;
        let Some(selection) = self.select_next_view() else {
            self.state = ReconstructionState::Done;
            tracing::info!(
                registered = self.registered.len(),
                total = self.cameras.len(),
                "no view qualifies, reconstruction done"
            );
            return Ok(StepOutcome::Stalled);
        };
        let view = selection.view();

        self.state = ReconstructionState::RegisterView;
        if let Err(reason) = self.register_view(view) {
            tracing::warn!(%view, %reason, "registration skipped");
            self.skipped.insert(view);
            self.skipped_registrations += 1;
            self.state = ReconstructionState::SelectView;
            return Ok(StepOutcome::Skipped { view, reason });
        }

        self.state = ReconstructionState::TriangulatePairs;
        let stats = self.triangulate_new_view(view);
        tracing::info!(
            %view,
            new_points = stats.triangulated,
            map_size = self.map.len(),
            "view registered"
        );

        self.state = ReconstructionState::SelectView;
        Ok(StepOutcome::Registered(view))
    }

    /// Bootstrap if needed, then step until no view qualifies.
    pub fn run_to_completion(&mut self) -> Result<Summary, ReconstructionError> {
        self.run_until_cancelled(&AtomicBool::new(false))
    }

    /// Like [`run_to_completion`](Self::run_to_completion), but checks
    /// `cancel` before every step and stops early once it is set.
    pub fn run_until_cancelled(&mut self, cancel: &AtomicBool) -> Result<Summary, ReconstructionError> {
        if self.state == ReconstructionState::Init {
            self.bootstrap()?;
        }
        while self.state != ReconstructionState::Done {
            if cancel.load(Ordering::Relaxed) {
                tracing::warn!(registered = self.registered.len(), "reconstruction cancelled");
                break;
            }
            self.step()?;
        }
        let summary = self.summary();
        tracing::info!(
            registered = summary.registered_views.len(),
            unregistered = summary.unregistered_views.len(),
            map_size = summary.map_size,
            mean_error = summary.mean_reprojection_error,
            "reconstruction finished"
        );
        Ok(summary)
    }

    pub fn summary(&self) -> Summary {
        Summary {
            registered_views: self.registered.clone(),
            unregistered_views: self.unregistered_views(),
            map_size: self.map.len(),
            skipped_registrations: self.skipped_registrations,
            triangulation: self.triangulation_stats,
            mean_reprojection_error: self.map.mean_error(&self.cameras),
            completed: self.state == ReconstructionState::Done,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Map maintenance
    // ─────────────────────────────────────────────────────────────────────────

    /// Fold a separately produced map (for example from another pass over
    /// the same views) into this one.
    pub fn merge_partial_map(&mut self, partial: &Map) -> MergeStats {
        self.map
            .merge_indexed(partial, &self.graph, self.config.fusion.merge_bound)
    }

    /// Cluster duplicate points with the configured combine distance.
    pub fn combine_map(&mut self) -> usize {
        self.map
            .combine_components(self.config.fusion.combine_distance)
    }

    /// Apply the configured outlier and size filters. Returns the number of
    /// points removed.
    pub fn filter_map(&mut self) -> usize {
        let before = self.map.len();
        if let Some(percentile) = self.config.filter.outlier_percentile {
            self.map.remove_outliers_by_error(&self.cameras, percentile);
        }
        if self.config.filter.reduce_ratio < 1.0 {
            self.map = self
                .map
                .reduce_by_error(&self.cameras, self.config.filter.reduce_ratio);
        }
        before - self.map.len()
    }

    pub fn map_stats(&self) -> MapStats {
        MapStats::compute(&self.map, &self.cameras)
    }
}

fn validate_match_set(set: &MatchSet, cameras: &[Camera]) -> Result<(), ReconstructionError> {
    for view in [set.view_a, set.view_b] {
        if view.index() >= cameras.len() {
            return Err(ReconstructionError::UnknownView {
                view,
                num_views: cameras.len(),
            });
        }
    }
    let (ka, kb) = (
        cameras[set.view_a.index()].keypoints.len(),
        cameras[set.view_b.index()].keypoints.len(),
    );
    for &(a, b) in &set.matches {
        if a >= ka {
            return Err(ReconstructionError::FeatureOutOfRange {
                view: set.view_a,
                feature: a,
                num_keypoints: ka,
            });
        }
        if b >= kb {
            return Err(ReconstructionError::FeatureOutOfRange {
                view: set.view_b,
                feature: b,
                num_keypoints: kb,
            });
        }
    }
    Ok(())
}
