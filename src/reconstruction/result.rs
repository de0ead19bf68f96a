//! Per-step outcomes and run summaries.
//!
//! These types describe what happened during a step or a whole run:
//! - which view was registered or skipped, and why
//! - how many triangulation candidates survived each filter
//! - the final registered set and map size

use std::ops::AddAssign;

use serde::Serialize;

use crate::geometry::SolverError;
use crate::map::ViewId;

/// Why a selected view could not be registered. Not fatal: the view is
/// skipped until another view registers.
#[derive(Debug, Clone, PartialEq)]
pub enum RegistrationFailure {
    InsufficientCorrespondences { found: usize, required: usize },
    PoseSolverFailed(SolverError),
}

impl std::fmt::Display for RegistrationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InsufficientCorrespondences { found, required } => write!(
                f,
                "insufficient 3D-2D correspondences ({found} < {required})"
            ),
            Self::PoseSolverFailed(e) => write!(f, "pose solver failed: {e}"),
        }
    }
}

/// Result of one `step`.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// The view was posed and triangulated against the registered views.
    Registered(ViewId),
    /// The view was selected but could not be registered.
    Skipped {
        view: ViewId,
        reason: RegistrationFailure,
    },
    /// No view qualifies; the reconstruction is done.
    Stalled,
}

/// Triangulation counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TriangulationStats {
    /// Tracks observed in both views of a pair.
    pub candidates: usize,
    /// Tracks with several features in one of the two views.
    pub ambiguous_tracks: usize,
    /// Points added to the map.
    pub triangulated: usize,
    /// The triangulator returned no point.
    pub failed: usize,
    pub rejected_cheirality: usize,
    pub rejected_reprojection: usize,
    pub rejected_depth: usize,
}

impl AddAssign for TriangulationStats {
    fn add_assign(&mut self, other: Self) {
        self.candidates += other.candidates;
        self.ambiguous_tracks += other.ambiguous_tracks;
        self.triangulated += other.triangulated;
        self.failed += other.failed;
        self.rejected_cheirality += other.rejected_cheirality;
        self.rejected_reprojection += other.rejected_reprojection;
        self.rejected_depth += other.rejected_depth;
    }
}

/// Summary of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    /// Registered views in registration order.
    pub registered_views: Vec<ViewId>,
    pub unregistered_views: Vec<ViewId>,
    pub map_size: usize,
    /// Registration attempts that ended in a skip.
    pub skipped_registrations: usize,
    pub triangulation: TriangulationStats,
    pub mean_reprojection_error: f64,
    /// False if the run was cancelled before the selector gave up.
    pub completed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_display() {
        let f = RegistrationFailure::InsufficientCorrespondences {
            found: 12,
            required: 30,
        };
        assert_eq!(
            f.to_string(),
            "insufficient 3D-2D correspondences (12 < 30)"
        );
        let f = RegistrationFailure::PoseSolverFailed(SolverError::Degenerate("planar"));
        assert!(f.to_string().contains("planar"));
    }

    #[test]
    fn test_stats_accumulate() {
        let mut total = TriangulationStats::default();
        total += TriangulationStats {
            candidates: 3,
            triangulated: 2,
            rejected_depth: 1,
            ..Default::default()
        };
        total += TriangulationStats {
            candidates: 1,
            failed: 1,
            ..Default::default()
        };
        assert_eq!(total.candidates, 4);
        assert_eq!(total.triangulated, 2);
        assert_eq!(total.failed, 1);
        assert_eq!(total.rejected_depth, 1);
    }
}
