//! Fatal and misuse errors of the reconstruction.

use thiserror::Error;

use crate::map::ViewId;

/// Errors that stop the reconstruction or reject an invalid call.
///
/// Per-view registration problems are not errors; they are reported as
/// [`RegistrationFailure`](crate::reconstruction::RegistrationFailure) values.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ReconstructionError {
    #[error("no view pair could be bootstrapped ({tried} of {total} pairs tried)")]
    BootstrapFailed { tried: usize, total: usize },

    #[error("reconstruction has not been bootstrapped")]
    NotBootstrapped,

    #[error("reconstruction is already bootstrapped")]
    AlreadyBootstrapped,

    #[error("unknown view {view} ({num_views} views)")]
    UnknownView { view: ViewId, num_views: usize },

    #[error("feature {feature} out of range for view {view} ({num_keypoints} keypoints)")]
    FeatureOutOfRange {
        view: ViewId,
        feature: usize,
        num_keypoints: usize,
    },
}
