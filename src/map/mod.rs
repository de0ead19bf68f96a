//! The 3D point map: ids, points, fusion and error-based filtering.

pub mod filter;
pub mod fusion;
pub mod map;
pub mod stats;
pub mod types;
pub mod world_point;

pub use filter::error_bound;
pub use fusion::{MergeStats, DEFAULT_MERGE_BOUND};
pub use map::{mean_point_error, point_error, Map};
pub use stats::MapStats;
pub use types::{Observation, TrackId, ViewId};
pub use world_point::WorldPoint;
