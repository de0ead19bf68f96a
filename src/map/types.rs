//! Core ID types shared by the correspondence graph, the map and the
//! reconstruction loop.

use serde::{Deserialize, Serialize};

/// Identifier of an input view (and of the camera created for it).
///
/// ViewIds are the positions of the views in the input list, so they double
/// as indices into the reconstruction's camera list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ViewId(pub usize);

impl ViewId {
    /// Create a new ViewId with the given value.
    pub fn new(id: usize) -> Self {
        Self(id)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for ViewId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "V{}", self.0)
    }
}

/// Canonical identifier of a track (a connected component of observations).
///
/// Only meaningful for the correspondence graph that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TrackId(pub usize);

impl TrackId {
    pub fn new(id: usize) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for TrackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "T{}", self.0)
    }
}

/// A single feature in a single view.
///
/// Ordered by `(view, feature)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Observation {
    pub view: ViewId,
    pub feature: usize,
}

impl Observation {
    pub fn new(view: ViewId, feature: usize) -> Self {
        Self { view, feature }
    }
}

impl std::fmt::Display for Observation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.view, self.feature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observation_orders_by_view_then_feature() {
        let a = Observation::new(ViewId::new(0), 9);
        let b = Observation::new(ViewId::new(1), 0);
        let c = Observation::new(ViewId::new(1), 3);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_id_display() {
        assert_eq!(format!("{}", ViewId::new(3)), "V3");
        assert_eq!(format!("{}", TrackId::new(12)), "T12");
        assert_eq!(
            format!("{}", Observation::new(ViewId::new(2), 5)),
            "V2#5"
        );
    }

    #[test]
    fn test_observation_as_hashmap_key() {
        use std::collections::HashMap;

        let mut map: HashMap<Observation, &str> = HashMap::new();
        map.insert(Observation::new(ViewId::new(1), 4), "first");

        assert_eq!(map.get(&Observation::new(ViewId::new(1), 4)), Some(&"first"));
        assert_eq!(map.get(&Observation::new(ViewId::new(4), 1)), None);
    }
}
