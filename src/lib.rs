pub mod config;
pub mod correspondence;
pub mod error;
pub mod geometry;
pub mod map;
pub mod reconstruction;
pub mod synthetic;

pub use config::ReconstructionConfig;
pub use error::ReconstructionError;
pub use map::Map;
pub use reconstruction::{Reconstruction, StepOutcome, Summary};
