//! Incremental reconstruction: bootstrap, next-view selection, registration
//! and triangulation around a single owning [`Reconstruction`].

pub mod bootstrap;
pub mod next_view;
pub mod reconstructor;
pub mod registration;
pub mod result;
pub mod state;
pub mod triangulation;

pub use bootstrap::bootstrap_order;
pub use next_view::ViewSelection;
pub use reconstructor::Reconstruction;
pub use result::{RegistrationFailure, StepOutcome, Summary, TriangulationStats};
pub use state::ReconstructionState;
