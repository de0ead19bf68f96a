//! Correspondence graph: raw pairwise matches grouped into tracks.

pub mod match_set;
pub mod track_index;
pub mod union_find;

pub use match_set::MatchSet;
pub use track_index::TrackIndex;
pub use union_find::CorrespondenceGraph;
