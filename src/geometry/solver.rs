//! Narrow interfaces to the numeric services the reconstruction depends on.
//!
//! The orchestrator only talks to these traits. The crate ships linear
//! reference implementations ([`EssentialTwoViewEstimator`],
//! [`DltPoseEstimator`], [`LinearTriangulator`]); callers can inject their
//! own, and tests inject deterministic doubles.
//!
//! [`EssentialTwoViewEstimator`]: super::EssentialTwoViewEstimator
//! [`DltPoseEstimator`]: super::DltPoseEstimator
//! [`LinearTriangulator`]: super::LinearTriangulator

use nalgebra::{Matrix3x4, Point2, Vector3};
use thiserror::Error;

use super::{Intrinsics, SE3};

/// Failure of an external numeric solver.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SolverError {
    #[error("not enough correspondences: got {got}, need at least {need}")]
    NotEnoughPoints { got: usize, need: usize },

    #[error("input lengths differ: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },

    #[error("degenerate configuration: {0}")]
    Degenerate(&'static str),

    #[error("no model reached consensus ({inliers} inliers, need {need})")]
    NoConsensus { inliers: usize, need: usize },
}

/// Robust relative pose between two views from 2D-2D correspondences.
///
/// The returned pose maps points from the first camera's frame into the
/// second camera's frame (`x_b = R x_a + t`).
pub trait TwoViewEstimator {
    fn estimate(
        &self,
        points_a: &[Point2<f64>],
        points_b: &[Point2<f64>],
        intrinsics_a: &Intrinsics,
        intrinsics_b: &Intrinsics,
    ) -> Result<SE3, SolverError>;
}

/// Robust absolute pose (PnP) from 3D-2D correspondences.
///
/// Returns the world-to-camera pose.
pub trait PoseEstimator {
    fn estimate(
        &self,
        points_3d: &[Vector3<f64>],
        points_2d: &[Point2<f64>],
        intrinsics: &Intrinsics,
    ) -> Result<SE3, SolverError>;
}

/// Two-view point triangulation from pixel projection matrices.
pub trait PointTriangulator {
    fn triangulate(
        &self,
        proj_a: &Matrix3x4<f64>,
        proj_b: &Matrix3x4<f64>,
        point_a: &Point2<f64>,
        point_b: &Point2<f64>,
    ) -> Option<Vector3<f64>>;
}

/// The three services bundled for injection into a reconstruction.
pub struct Solvers {
    pub two_view: Box<dyn TwoViewEstimator>,
    pub pose: Box<dyn PoseEstimator>,
    pub triangulator: Box<dyn PointTriangulator>,
}

impl Solvers {
    pub fn new(
        two_view: impl TwoViewEstimator + 'static,
        pose: impl PoseEstimator + 'static,
        triangulator: impl PointTriangulator + 'static,
    ) -> Self {
        Self {
            two_view: Box::new(two_view),
            pose: Box::new(pose),
            triangulator: Box::new(triangulator),
        }
    }
}

impl std::fmt::Debug for Solvers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Solvers").finish_non_exhaustive()
    }
}
