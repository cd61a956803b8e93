//! Priority-driven coarsening of histograms
//!
//! Coarsening repeatedly merges the lowest-priority *cherry* (a node whose
//! children are both leaves) into its parent, producing a sequence of ever
//! coarser histograms. The engine keeps two small structures:
//!
//! - a min-ordered queue of pending merges `(priority, parent, count)`;
//!   the label is always the secondary sort key, so ties are resolved
//!   deterministically no matter how the priority function behaves;
//! - a `waiting` map from the sibling label that would complete a cherry to
//!   the leaf already in place. When a merge creates a new leaf, one hash
//!   lookup decides whether a new cherry just formed.
//!
//! Leaf counts are never maintained incrementally: the original truncation
//! is kept aside, and materializing an intermediate histogram slices the
//! original count vector over each current leaf's subtree range. A single
//! pass therefore serves any number of checkpoints.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use num_traits::NumCast;
use ordered_float::OrderedFloat;
use tracing::debug;

use histree_core::{LeafMap, NodeLabel, Truncation};

use crate::histogram::Histogram;

/// Total-ordered merge priority: the cherry with the least value merges
/// first.
pub trait MergePriority {
    /// The ordered priority value.
    type Value: Ord + Clone;

    /// Priority of merging the cherry at `label`, whose children together
    /// hold `count` samples and whose cell has the given `volume`.
    fn evaluate(&self, label: &NodeLabel, count: u64, volume: f64) -> Self::Value;
}

/// The canonical coarsening priority `(1 - count/total) * volume`: cherries
/// whose mass nearly fills their cell merge first.
#[derive(Debug, Clone)]
pub struct ExcessMass {
    total_count: u64,
}

impl ExcessMass {
    /// Priority against an explicit total.
    pub fn new(total_count: u64) -> Self {
        Self { total_count }
    }

    /// Priority matched to a histogram's total count.
    pub fn for_histogram(hist: &Histogram) -> Self {
        Self::new(hist.total_count())
    }
}

impl MergePriority for ExcessMass {
    type Value = OrderedFloat<f64>;

    fn evaluate(&self, _label: &NodeLabel, count: u64, volume: f64) -> OrderedFloat<f64> {
        let c: f64 = NumCast::from(count).unwrap();
        let n: f64 = NumCast::from(self.total_count).unwrap();
        OrderedFloat((1.0 - c / n) * volume)
    }
}

type QueueEntry<V> = Reverse<(V, NodeLabel, u64)>;

struct MergeLoop<'a, P: MergePriority> {
    hist: &'a Histogram,
    prio: &'a P,
    queue: BinaryHeap<QueueEntry<P::Value>>,
    waiting: HashMap<NodeLabel, (NodeLabel, u64)>,
    /// Target truncation for fringe-bounded runs.
    target: Option<&'a Truncation>,
    /// Fringe roots reached so far (target runs only).
    completed: Vec<(NodeLabel, u64)>,
    /// Set when the root itself has been merged.
    at_root: bool,
}

impl<'a, P: MergePriority> MergeLoop<'a, P> {
    fn new(hist: &'a Histogram, prio: &'a P, target: Option<&'a Truncation>) -> Self {
        let mut state = MergeLoop {
            hist,
            prio,
            queue: BinaryHeap::new(),
            waiting: HashMap::new(),
            target,
            completed: Vec::new(),
            at_root: false,
        };

        let trunc = hist.truncation();
        let vals = hist.counts().vals();
        let mut in_cherry = vec![false; trunc.len()];
        for (parent, i) in trunc.cherries() {
            in_cherry[i] = true;
            in_cherry[i + 1] = true;
            let count = vals[i] + vals[i + 1];
            match target {
                Some(t) if t.covering_leaf(&parent).is_none() => {
                    // The merge would cross the target; both children must
                    // already be fringe roots.
                    state.complete_fringe(trunc.leaves()[i].clone(), vals[i]);
                    state.complete_fringe(trunc.leaves()[i + 1].clone(), vals[i + 1]);
                }
                _ => state.enqueue(parent, count),
            }
        }
        for (i, leaf) in trunc.iter().enumerate() {
            if in_cherry[i] {
                continue;
            }
            if let Some(t) = target {
                if t.contains(leaf) {
                    state.complete_fringe(leaf.clone(), vals[i]);
                    continue;
                }
            }
            if leaf.is_root() {
                // A single-leaf histogram at the root cannot coarsen.
                continue;
            }
            let sibling = leaf.sibling();
            if trunc.subtree(&sibling).is_empty() {
                // No leaf can ever appear beside this one; the merge into
                // the parent involves this child alone.
                state.enqueue(leaf.parent(), vals[i]);
            } else {
                state.waiting.insert(sibling, (leaf.clone(), vals[i]));
            }
        }
        state
    }

    fn enqueue(&mut self, label: NodeLabel, count: u64) {
        let volume = self.hist.tree().volume_at(&label);
        let value = self.prio.evaluate(&label, count, volume);
        self.queue.push(Reverse((value, label, count)));
    }

    fn complete_fringe(&mut self, label: NodeLabel, count: u64) {
        self.completed.push((label, count));
    }

    /// Execute one merge; `None` when nothing remains to merge.
    fn step(&mut self) -> Option<NodeLabel> {
        let Reverse((_, parent, count)) = self.queue.pop()?;
        if let Some(t) = self.target {
            if t.contains(&parent) {
                self.complete_fringe(parent.clone(), count);
                return Some(parent);
            }
        }
        if parent.is_root() {
            self.at_root = true;
            return Some(parent);
        }
        if let Some((_, sibling_count)) = self.waiting.remove(&parent) {
            // The new leaf completes a waiting cherry one level up.
            self.enqueue(parent.parent(), count + sibling_count);
        } else if self
            .hist
            .truncation()
            .subtree(&parent.sibling())
            .is_empty()
        {
            self.enqueue(parent.parent(), count);
        } else {
            self.waiting.insert(parent.sibling(), (parent.clone(), count));
        }
        Some(parent)
    }

    /// Realize the current truncation as a histogram, recomputing counts by
    /// slicing the original count vector.
    fn materialize(&self) -> Histogram {
        let original = self.hist.counts();
        if self.at_root {
            let counts = LeafMap::new(
                Truncation::from_sorted_unchecked(vec![NodeLabel::root()]),
                vec![self.hist.total_count()],
            )
            .expect("parallel vectors of length one");
            return Histogram {
                tree: self.hist.tree().clone(),
                total: self.hist.total_count(),
                counts,
            };
        }

        if self.queue.is_empty() && self.waiting.is_empty() && self.completed.is_empty() {
            // Nothing could merge: the histogram is a single root leaf.
            return self.hist.clone();
        }

        let mut leaves: Vec<NodeLabel> = Vec::new();
        for Reverse((_, parent, _)) in self.queue.iter() {
            let (left, right) = parent.children();
            for child in [left, right] {
                if !original.truncation().subtree(&child).is_empty() {
                    leaves.push(child);
                }
            }
        }
        for (leaf, _) in self.waiting.values() {
            leaves.push(leaf.clone());
        }
        for (leaf, _) in &self.completed {
            leaves.push(leaf.clone());
        }
        leaves.sort();

        let counts: Vec<u64> = leaves
            .iter()
            .map(|leaf| {
                let range = original.truncation().subtree(leaf);
                original.vals()[range].iter().sum()
            })
            .collect();
        let leaf_map = LeafMap::new(Truncation::from_sorted_unchecked(leaves), counts)
            .expect("one count per materialized leaf");
        Histogram {
            tree: self.hist.tree().clone(),
            total: self.hist.total_count(),
            counts: leaf_map,
        }
    }
}

impl Histogram {
    /// Coarsen by `num_steps` cherry merges and materialize the result.
    ///
    /// Runs of more steps than there are merges stop at the trivial
    /// root histogram.
    ///
    /// # Panics
    /// Panics when `num_steps` is 0; a zero-step coarsening is a
    /// programmer error.
    pub fn backtrack_num_steps<P: MergePriority>(&self, prio: &P, num_steps: usize) -> Histogram {
        assert!(num_steps > 0, "coarsening must take at least one step");
        debug!(
            "backtracking {} steps from {} leaves",
            num_steps,
            self.len()
        );
        let mut state = MergeLoop::new(self, prio, None);
        for _ in 0..num_steps {
            if state.step().is_none() || state.at_root {
                break;
            }
        }
        state.materialize()
    }

    /// One merge pass, materialized at each of the given step counts.
    ///
    /// `checkpoints` must be strictly increasing and positive. Checkpoints
    /// past the trivial histogram are clamped to it, so the result length
    /// always equals the number of checkpoints.
    ///
    /// # Panics
    /// Panics when `checkpoints` is empty, unsorted, or starts at 0.
    pub fn backtrack_trajectory<P: MergePriority>(
        &self,
        prio: &P,
        checkpoints: &[usize],
    ) -> Vec<Histogram> {
        assert!(!checkpoints.is_empty(), "no checkpoints requested");
        assert!(checkpoints[0] > 0, "coarsening must take at least one step");
        assert!(
            checkpoints.windows(2).all(|w| w[0] < w[1]),
            "checkpoints must be strictly increasing"
        );
        debug!(
            "backtracking to {} checkpoints from {} leaves",
            checkpoints.len(),
            self.len()
        );
        let mut state = MergeLoop::new(self, prio, None);
        let mut out = Vec::with_capacity(checkpoints.len());
        let mut steps = 0;
        for &stop in checkpoints {
            while steps < stop && !state.at_root {
                if state.step().is_none() {
                    break;
                }
                steps += 1;
            }
            out.push(state.materialize());
        }
        out
    }

    /// Merge until the leaves equal those of `target`, fringe by fringe,
    /// interleaved by global priority.
    ///
    /// # Panics
    /// Panics when `target` is not a refinement-predecessor of this
    /// histogram, i.e. when its leaves do not dominate every leaf here.
    pub fn backtrack_to_target<P: MergePriority>(
        &self,
        prio: &P,
        target: &Histogram,
    ) -> Histogram {
        let target_trunc = target.truncation();
        let covered: usize = target_trunc
            .iter()
            .map(|r| {
                let range = self.truncation().subtree(r);
                assert!(
                    !range.is_empty(),
                    "target leaf {r} has no leaves beneath it"
                );
                range.len()
            })
            .sum();
        assert_eq!(
            covered,
            self.len(),
            "target is not a refinement-predecessor of this histogram"
        );

        debug!(
            "backtracking from {} leaves to target of {}",
            self.len(),
            target.len()
        );
        let mut state = MergeLoop::new(self, prio, Some(target_trunc));
        while state.step().is_some() {}
        assert!(
            state.waiting.is_empty() && state.completed.len() == target_trunc.len(),
            "merge loop stalled before reaching the target"
        );
        state.materialize()
    }

    /// The complete merge order, for verifying coarsening laws in tests.
    ///
    /// Runs the loop to the trivial histogram and returns every merged
    /// label in execution order.
    pub fn backtrack_verification<P: MergePriority>(&self, prio: &P) -> Vec<NodeLabel> {
        let mut state = MergeLoop::new(self, prio, None);
        let mut order = Vec::new();
        while let Some(parent) = state.step() {
            order.push(parent);
        }
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rectangle;
    use crate::spatial::SpatialTree;

    fn lab(x: u64) -> NodeLabel {
        NodeLabel::from_u64(x).unwrap()
    }

    /// Merge the smallest combined count first; deterministic by label.
    struct ByCount;

    impl MergePriority for ByCount {
        type Value = u64;
        fn evaluate(&self, _label: &NodeLabel, count: u64, _volume: f64) -> u64 {
            count
        }
    }

    fn quadrants() -> Histogram {
        let tree = SpatialTree::cycle(
            Rectangle::new(vec![0.0, 0.0], vec![4.0, 4.0]).unwrap(),
        )
        .unwrap();
        Histogram::from_leaf_counts(
            tree,
            vec![lab(4), lab(5), lab(6), lab(7)],
            vec![1, 2, 3, 4],
        )
        .unwrap()
    }

    #[test]
    fn test_merge_order() {
        let h = quadrants();
        let order = h.backtrack_verification(&ByCount);
        // Cherry 2 holds 3 samples, cherry 3 holds 7; then the root.
        assert_eq!(order, vec![lab(2), lab(3), NodeLabel::root()]);
    }

    #[test]
    fn test_single_step_materialization() {
        let h = quadrants();
        let coarse = h.backtrack_num_steps(&ByCount, 1);
        assert_eq!(coarse.truncation().leaves(), &[lab(2), lab(6), lab(7)]);
        assert_eq!(coarse.counts().vals(), &[3, 3, 4]);
        assert_eq!(coarse.total_count(), 10);
    }

    #[test]
    fn test_runs_to_root() {
        let h = quadrants();
        let terminal = h.backtrack_num_steps(&ByCount, 3);
        assert_eq!(terminal.truncation().leaves(), &[NodeLabel::root()]);
        assert_eq!(terminal.counts().vals(), &[10]);
        // Extra steps are clamped at the trivial histogram.
        let clamped = h.backtrack_num_steps(&ByCount, 100);
        assert_eq!(clamped, terminal);
    }

    #[test]
    fn test_single_child_propagation() {
        // Leaf 7 has no sibling leaves anywhere under 6, so it must climb
        // on its own rather than wait forever.
        let tree = SpatialTree::cycle(
            Rectangle::new(vec![0.0, 0.0], vec![4.0, 4.0]).unwrap(),
        )
        .unwrap();
        let h = Histogram::from_leaf_counts(tree, vec![lab(2), lab(7)], vec![3, 5]).unwrap();
        let order = h.backtrack_verification(&ByCount);
        assert_eq!(order, vec![lab(3), NodeLabel::root()]);
    }

    #[test]
    #[should_panic(expected = "at least one step")]
    fn test_zero_steps_panics() {
        quadrants().backtrack_num_steps(&ByCount, 0);
    }

    #[test]
    fn test_target_guided() {
        let h = quadrants();
        let target = Histogram::from_leaf_counts(
            h.tree().clone(),
            vec![lab(2), lab(3)],
            vec![3, 7],
        )
        .unwrap();
        let reached = h.backtrack_to_target(&ByCount, &target);
        assert_eq!(reached.truncation(), target.truncation());
        assert_eq!(reached.counts().vals(), target.counts().vals());
    }

    #[test]
    fn test_target_can_be_trivial() {
        let h = quadrants();
        let root_hist = Histogram::from_leaf_counts(
            h.tree().clone(),
            vec![NodeLabel::root()],
            vec![10],
        )
        .unwrap();
        let reached = h.backtrack_to_target(&ByCount, &root_hist);
        assert_eq!(reached.truncation().leaves(), &[NodeLabel::root()]);
        assert_eq!(reached.counts().vals(), &[10]);
    }

    #[test]
    #[should_panic(expected = "refinement-predecessor")]
    fn test_target_must_dominate() {
        let h = quadrants();
        // 4 and 5 leave the right half of the box uncovered.
        let bad = Histogram::from_leaf_counts(
            h.tree().clone(),
            vec![lab(4), lab(5)],
            vec![1, 2],
        )
        .unwrap();
        h.backtrack_to_target(&ByCount, &bad);
    }
}
