//! Union-find over observations.
//!
//! Elements get an arena slot the first time they are seen. `parent[i] == -1`
//! marks a root; `size[i]` is only meaningful on roots. Both `find` and
//! `union` are iterative.

use std::collections::HashMap;
use std::hash::Hash;

use crate::map::{Observation, TrackId};

use super::match_set::MatchSet;

/// Disjoint-set forest grouping observations into tracks.
#[derive(Debug, Clone)]
pub struct CorrespondenceGraph<E = Observation> {
    slots: HashMap<E, usize>,
    elements: Vec<E>,
    parent: Vec<i32>,
    size: Vec<i32>,
    components: usize,
}

impl<E> Default for CorrespondenceGraph<E> {
    fn default() -> Self {
        Self {
            slots: HashMap::new(),
            elements: Vec::new(),
            parent: Vec::new(),
            size: Vec::new(),
            components: 0,
        }
    }
}

/// Slot index as stored in `parent`.
///
/// # Panics
/// If the slot does not fit in an `i32`.
fn parent_link(slot: usize) -> i32 {
    i32::try_from(slot)
        .unwrap_or_else(|_| panic!("correspondence graph slot {slot} exceeds i32::MAX"))
}

impl<E: Clone + Eq + Hash> CorrespondenceGraph<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Number of live components.
    pub fn component_count(&self) -> usize {
        self.components
    }

    pub fn contains(&self, e: &E) -> bool {
        self.slots.contains_key(e)
    }

    /// Slot of `e`, registering it as a singleton component if unseen.
    fn slot(&mut self, e: &E) -> usize {
        if let Some(&s) = self.slots.get(e) {
            return s;
        }
        let s = self.elements.len();
        parent_link(s);
        self.slots.insert(e.clone(), s);
        self.elements.push(e.clone());
        self.parent.push(-1);
        self.size.push(1);
        self.components += 1;
        s
    }

    /// Root slot with path compression.
    fn find_slot(&mut self, s: usize) -> usize {
        let mut root = s;
        while self.parent[root] >= 0 {
            root = self.parent[root] as usize;
        }
        let mut cur = s;
        while self.parent[cur] >= 0 {
            let next = self.parent[cur] as usize;
            self.parent[cur] = parent_link(root);
            cur = next;
        }
        root
    }

    /// Root slot without mutation.
    fn root_slot(&self, s: usize) -> usize {
        let mut root = s;
        while self.parent[root] >= 0 {
            root = self.parent[root] as usize;
        }
        root
    }

    /// Canonical id of `e`'s component. Registers `e` if unseen.
    pub fn find(&mut self, e: &E) -> TrackId {
        let s = self.slot(e);
        TrackId(self.find_slot(s))
    }

    /// Canonical id of `e`'s component, or `None` if `e` was never registered.
    pub fn root(&self, e: &E) -> Option<TrackId> {
        self.slots.get(e).map(|&s| TrackId(self.root_slot(s)))
    }

    /// Merge the components of `a` and `b`. Returns true if two distinct
    /// components were merged.
    ///
    /// The smaller component goes under the larger; on a tie `b`'s root goes
    /// under `a`'s.
    pub fn union(&mut self, a: &E, b: &E) -> bool {
        if a == b {
            return false;
        }
        let sa = self.slot(a);
        let sb = self.slot(b);
        let ra = self.find_slot(sa);
        let rb = self.find_slot(sb);
        if ra == rb {
            return false;
        }

        let (big, small) = if self.size[rb] > self.size[ra] {
            (rb, ra)
        } else {
            (ra, rb)
        };
        self.parent[small] = parent_link(big);
        self.size[big] += self.size[small];
        self.components -= 1;
        true
    }

    pub fn connected(&self, a: &E, b: &E) -> bool {
        match (self.root(a), self.root(b)) {
            (Some(ra), Some(rb)) => ra == rb,
            _ => a == b,
        }
    }

    /// Canonical ids of all components, in slot order.
    pub fn component_ids(&self) -> Vec<TrackId> {
        (0..self.parent.len())
            .filter(|&s| self.parent[s] < 0)
            .map(TrackId)
            .collect()
    }

    /// Members of the component rooted at `root`, in registration order.
    pub fn elements_of(&self, root: TrackId) -> Vec<E> {
        (0..self.elements.len())
            .filter(|&s| self.root_slot(s) == root.0)
            .map(|s| self.elements[s].clone())
            .collect()
    }

    /// Size of the component containing `e`.
    pub fn component_size(&self, e: &E) -> usize {
        self.slots
            .get(e)
            .map(|&s| self.size[self.root_slot(s)] as usize)
            .unwrap_or(0)
    }

    /// All elements with their canonical ids, in registration order.
    pub fn iter_roots(&self) -> impl Iterator<Item = (&E, TrackId)> + '_ {
        self.elements
            .iter()
            .enumerate()
            .map(|(s, e)| (e, TrackId(self.root_slot(s))))
    }
}

impl CorrespondenceGraph<Observation> {
    /// Union every match of every set.
    pub fn from_match_sets(match_sets: &[MatchSet]) -> Self {
        let mut graph = Self::new();
        for set in match_sets {
            graph.add_match_set(set);
        }
        graph
    }

    pub fn add_match_set(&mut self, set: &MatchSet) {
        for (a, b) in set.observations() {
            self.union(&a, &b);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_link_in_range() {
        assert_eq!(parent_link(0), 0);
        assert_eq!(parent_link(i32::MAX as usize), i32::MAX);
    }

    #[test]
    #[should_panic(expected = "exceeds i32::MAX")]
    fn test_parent_link_overflow_panics() {
        parent_link(i32::MAX as usize + 1);
    }
    use crate::map::ViewId;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};
    use std::collections::BTreeSet;

    fn obs(view: usize, feature: usize) -> Observation {
        Observation::new(ViewId::new(view), feature)
    }

    #[test]
    fn test_union_joins_components() {
        let mut g = CorrespondenceGraph::new();
        let (a, b, c) = (obs(0, 1), obs(1, 4), obs(2, 0));

        assert!(g.union(&a, &b));
        assert_eq!(g.find(&a), g.find(&b));
        assert_ne!(g.find(&a), g.find(&c));
        assert!(g.connected(&a, &b));
        assert!(!g.connected(&a, &c));
        assert_eq!(g.component_count(), 2);
        assert_eq!(g.len(), 3);
    }

    #[test]
    fn test_union_with_self_is_noop() {
        let mut g: CorrespondenceGraph = CorrespondenceGraph::new();
        assert!(!g.union(&obs(0, 0), &obs(0, 0)));
        assert_eq!(g.len(), 0);
        assert_eq!(g.component_count(), 0);
    }

    #[test]
    fn test_component_count_drops_by_one_per_real_merge() {
        let mut g = CorrespondenceGraph::new();
        for i in 0..6 {
            g.find(&obs(0, i));
        }
        assert_eq!(g.component_count(), 6);

        assert!(g.union(&obs(0, 0), &obs(0, 1)));
        assert_eq!(g.component_count(), 5);
        assert!(!g.union(&obs(0, 1), &obs(0, 0)));
        assert_eq!(g.component_count(), 5);
        assert!(g.union(&obs(0, 2), &obs(0, 1)));
        assert_eq!(g.component_count(), 4);
    }

    #[test]
    fn test_tie_attaches_second_under_first() {
        let mut g = CorrespondenceGraph::new();
        let (a, b) = (obs(0, 0), obs(1, 0));
        g.union(&a, &b);
        let ra = g.root(&a).unwrap();
        assert_eq!(ra, TrackId(0));
        assert_eq!(g.root(&b), Some(ra));
    }

    #[test]
    fn test_smaller_goes_under_larger() {
        let mut g = CorrespondenceGraph::new();
        let single = obs(9, 9);
        g.find(&single);
        g.union(&obs(0, 0), &obs(1, 0));
        g.union(&obs(0, 0), &obs(2, 0));
        let big_root = g.find(&obs(0, 0));

        g.union(&single, &obs(2, 0));
        assert_eq!(g.find(&single), big_root);
        assert_eq!(g.component_size(&single), 4);
    }

    #[test]
    fn test_find_is_idempotent_and_root_agrees() {
        let mut g = CorrespondenceGraph::new();
        for i in 0..20 {
            g.union(&obs(0, i), &obs(0, i + 1));
        }
        let r = g.find(&obs(0, 20));
        assert_eq!(g.find(&obs(0, 20)), r);
        for i in 0..=20 {
            assert_eq!(g.root(&obs(0, i)), Some(r));
        }
        assert_eq!(g.root(&obs(5, 5)), None);
    }

    #[test]
    fn test_long_chain_does_not_recurse() {
        let mut g = CorrespondenceGraph::new();
        for i in 0..100_000 {
            g.union(&i, &(i + 1));
        }
        assert_eq!(g.component_count(), 1);
        assert_eq!(g.find(&0), g.find(&100_000));
    }

    #[test]
    fn test_elements_and_component_ids() {
        let mut g = CorrespondenceGraph::new();
        g.union(&obs(0, 0), &obs(1, 0));
        g.union(&obs(0, 1), &obs(1, 1));
        g.union(&obs(1, 1), &obs(2, 1));

        let ids = g.component_ids();
        assert_eq!(ids.len(), 2);
        let sizes: BTreeSet<usize> = ids.iter().map(|&r| g.elements_of(r).len()).collect();
        assert_eq!(sizes, BTreeSet::from([2, 3]));

        let root = g.find(&obs(2, 1));
        assert_eq!(
            g.elements_of(root),
            vec![obs(0, 1), obs(1, 1), obs(2, 1)]
        );
    }

    fn partition(g: &CorrespondenceGraph<usize>) -> BTreeSet<BTreeSet<usize>> {
        g.component_ids()
            .into_iter()
            .map(|r| g.elements_of(r).into_iter().collect())
            .collect()
    }

    #[test]
    fn test_union_order_does_not_change_partition() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut pairs: Vec<(usize, usize)> = (0..200)
            .map(|_| (rng.gen_range(0..120), rng.gen_range(0..120)))
            .collect();

        let mut forward = CorrespondenceGraph::new();
        for (a, b) in &pairs {
            forward.union(a, b);
        }

        pairs.shuffle(&mut rng);
        let mut shuffled = CorrespondenceGraph::new();
        for (a, b) in pairs.iter().rev() {
            shuffled.union(b, a);
        }

        assert_eq!(partition(&forward), partition(&shuffled));
        assert_eq!(forward.component_count(), shuffled.component_count());
    }

    #[test]
    fn test_from_match_sets() {
        let sets = vec![
            MatchSet::new(ViewId::new(0), ViewId::new(1), vec![(0, 0), (1, 1)]),
            MatchSet::new(ViewId::new(1), ViewId::new(2), vec![(0, 5)]),
        ];
        let g = CorrespondenceGraph::from_match_sets(&sets);
        assert_eq!(g.len(), 5);
        assert_eq!(g.component_count(), 2);
        assert!(g.connected(&obs(0, 0), &obs(2, 5)));
    }
}
