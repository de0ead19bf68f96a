//! Geometry utilities: SE3 transforms, pinhole cameras and the reference
//! two-view, PnP and triangulation solvers.

pub mod camera;
pub mod essential;
pub mod pnp;
pub mod ransac;
pub mod se3;
pub mod solver;
pub mod triangulation;

pub use camera::{Camera, Intrinsics, Keypoint, View};
pub use essential::EssentialTwoViewEstimator;
pub use pnp::{DltPoseEstimator, PnPResult};
pub use ransac::RansacConfig;
pub use se3::SE3;
pub use solver::{PointTriangulator, PoseEstimator, SolverError, Solvers, TwoViewEstimator};
pub use triangulation::{triangulate_dlt, LinearTriangulator};

impl Default for Solvers {
    /// Linear reference solvers with default RANSAC settings.
    fn default() -> Self {
        Solvers::new(
            EssentialTwoViewEstimator::default(),
            DltPoseEstimator::default(),
            LinearTriangulator,
        )
    }
}

impl Solvers {
    /// Reference solvers sharing one RANSAC configuration.
    pub fn reference(ransac: &RansacConfig) -> Self {
        Solvers::new(
            EssentialTwoViewEstimator::new(ransac.clone()),
            DltPoseEstimator::new(ransac.clone()),
            LinearTriangulator,
        )
    }
}
