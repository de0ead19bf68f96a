//! Pairwise feature matches handed over by the matching service.

use serde::{Deserialize, Serialize};

use crate::map::{Observation, ViewId};

/// Feature matches between two views: `(index in view_a, index in view_b)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSet {
    pub view_a: ViewId,
    pub view_b: ViewId,
    pub matches: Vec<(usize, usize)>,
}

impl MatchSet {
    pub fn new(view_a: ViewId, view_b: ViewId, matches: Vec<(usize, usize)>) -> Self {
        Self {
            view_a,
            view_b,
            matches,
        }
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Whether this set connects `view` to anything.
    pub fn involves(&self, view: ViewId) -> bool {
        self.view_a == view || self.view_b == view
    }

    /// The view on the other side of `view`, if `view` is part of this set.
    pub fn other(&self, view: ViewId) -> Option<ViewId> {
        if self.view_a == view {
            Some(self.view_b)
        } else if self.view_b == view {
            Some(self.view_a)
        } else {
            None
        }
    }

    /// Matches as observation pairs.
    pub fn observations(&self) -> impl Iterator<Item = (Observation, Observation)> + '_ {
        self.matches.iter().map(move |&(a, b)| {
            (
                Observation::new(self.view_a, a),
                Observation::new(self.view_b, b),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_other_side() {
        let set = MatchSet::new(ViewId::new(2), ViewId::new(5), vec![(0, 1)]);
        assert_eq!(set.other(ViewId::new(2)), Some(ViewId::new(5)));
        assert_eq!(set.other(ViewId::new(5)), Some(ViewId::new(2)));
        assert_eq!(set.other(ViewId::new(3)), None);
        assert!(set.involves(ViewId::new(5)));
    }

    #[test]
    fn test_observations() {
        let set = MatchSet::new(ViewId::new(0), ViewId::new(1), vec![(3, 7), (4, 8)]);
        let obs: Vec<_> = set.observations().collect();
        assert_eq!(
            obs[1],
            (
                Observation::new(ViewId::new(0), 4),
                Observation::new(ViewId::new(1), 8)
            )
        );
    }
}
