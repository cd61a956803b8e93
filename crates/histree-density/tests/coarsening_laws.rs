//! Structural laws of the priority-driven cherry merge

use std::collections::HashSet;

use histree_density::{
    ExcessMass, Histogram, MergePriority, NodeLabel, Rectangle, SpatialTree,
};

fn lab(x: u64) -> NodeLabel {
    NodeLabel::from_u64(x).unwrap()
}

/// Smallest merged count first; the engine breaks ties by label.
struct ByCount;

impl MergePriority for ByCount {
    type Value = u64;
    fn evaluate(&self, _label: &NodeLabel, count: u64, _volume: f64) -> u64 {
        count
    }
}

fn line_tree() -> SpatialTree {
    SpatialTree::cycle(Rectangle::new(vec![0.0], vec![8.0]).unwrap()).unwrap()
}

/// Eight unit cells with counts 1..=8.
fn octaves() -> Histogram {
    Histogram::from_leaf_counts(
        line_tree(),
        (8..16).map(lab).collect(),
        (1..=8).collect(),
    )
    .unwrap()
}

/// An uneven truncation mixing depths: leaves 4, 10, 11, 24, 25, 13, 7.
fn uneven() -> Histogram {
    Histogram::from_leaf_counts(
        line_tree(),
        vec![lab(4), lab(10), lab(11), lab(24), lab(25), lab(13), lab(7)],
        vec![5, 1, 2, 3, 1, 4, 6],
    )
    .unwrap()
}

fn proper_ancestors(h: &Histogram) -> HashSet<NodeLabel> {
    let mut out = HashSet::new();
    for leaf in h.truncation().iter() {
        for anc in leaf.ancestors() {
            out.insert(anc);
        }
    }
    out
}

#[test]
fn visits_every_proper_ancestor_exactly_once() {
    for h in [octaves(), uneven()] {
        let order = h.backtrack_verification(&ByCount);
        let expected = proper_ancestors(&h);
        let seen: HashSet<NodeLabel> = order.iter().cloned().collect();
        assert_eq!(seen.len(), order.len(), "a label was merged twice");
        assert_eq!(seen, expected, "merge order misses or invents ancestors");
    }
}

#[test]
fn merge_order_respects_ancestry() {
    for h in [octaves(), uneven()] {
        let order = h.backtrack_verification(&ByCount);
        for i in 0..order.len() {
            for j in (i + 1)..order.len() {
                assert!(
                    !order[i].is_ancestor_of(&order[j]),
                    "{} merged before its descendant {}",
                    order[i],
                    order[j]
                );
            }
        }
    }
}

#[test]
fn completion_runs_to_the_trivial_histogram() {
    for h in [octaves(), uneven()] {
        let total_steps = h.backtrack_verification(&ByCount).len();
        let terminal = h.backtrack_num_steps(&ByCount, total_steps);
        assert_eq!(terminal.truncation().leaves(), &[NodeLabel::root()]);
        assert_eq!(terminal.counts().vals(), &[h.total_count()]);
    }
}

#[test]
fn intermediates_conserve_mass_and_shrink_by_one() {
    for h in [octaves(), uneven()] {
        let total_steps = h.backtrack_verification(&ByCount).len();
        let mut previous = h.clone();
        for k in 1..=total_steps {
            let current = h.backtrack_num_steps(&ByCount, k);
            let sum: u64 = current.counts().vals().iter().sum();
            assert_eq!(sum, h.total_count(), "step {k} lost samples");

            // Leaf diff: 1 or 2 removed, exactly 1 added, and the added
            // leaf is an ancestor-or-parent of everything removed.
            let prev: HashSet<NodeLabel> =
                previous.truncation().iter().cloned().collect();
            let cur: HashSet<NodeLabel> = current.truncation().iter().cloned().collect();
            let removed: Vec<&NodeLabel> = prev.difference(&cur).collect();
            let added: Vec<&NodeLabel> = cur.difference(&prev).collect();
            assert_eq!(added.len(), 1, "step {k} added {} leaves", added.len());
            assert!(
                (1..=2).contains(&removed.len()),
                "step {k} removed {} leaves",
                removed.len()
            );
            for r in &removed {
                assert!(
                    added[0].is_ancestor_of(r),
                    "step {k}: removed {r} not under added {}",
                    added[0]
                );
            }

            // The minimal completion shrinks by exactly one node per step.
            assert_eq!(
                previous.truncation().minimal_completion().len(),
                current.truncation().minimal_completion().len() + 1,
                "completion size at step {k}"
            );
            previous = current;
        }
    }
}

#[test]
fn trajectory_matches_repeated_runs() {
    let h = octaves();
    let checkpoints = [1usize, 2, 4, 6];
    let trajectory = h.backtrack_trajectory(&ByCount, &checkpoints);
    assert_eq!(trajectory.len(), checkpoints.len());
    for (k, snapshot) in checkpoints.iter().zip(trajectory.iter()) {
        let fresh = h.backtrack_num_steps(&ByCount, *k);
        assert_eq!(snapshot.truncation(), fresh.truncation(), "checkpoint {k}");
        assert_eq!(snapshot.counts().vals(), fresh.counts().vals());
    }
}

#[test]
fn excess_mass_priority_is_deterministic() {
    let h = uneven();
    let prio = ExcessMass::for_histogram(&h);
    let first = h.backtrack_verification(&prio);
    let second = h.backtrack_verification(&prio);
    assert_eq!(first, second);
    // It is a complete merge order too.
    assert_eq!(first.len(), proper_ancestors(&h).len());
}

#[test]
fn target_run_reproduces_an_intermediate() {
    let h = octaves();
    // Any intermediate of a backtrack is a refinement-predecessor.
    let target = h.backtrack_num_steps(&ByCount, 5);
    let reached = h.backtrack_to_target(&ByCount, &target);
    assert_eq!(reached.truncation(), target.truncation());
    assert_eq!(reached.counts().vals(), target.counts().vals());

    // Fringe decomposition with mixed depths.
    let wide = Histogram::from_leaf_counts(
        line_tree(),
        vec![lab(2), lab(6), lab(7)],
        vec![10, 11, 15],
    )
    .unwrap();
    let reached = octaves().backtrack_to_target(&ByCount, &wide);
    assert_eq!(reached.truncation().leaves(), wide.truncation().leaves());
    assert_eq!(reached.counts().vals(), &[10, 11, 15]);
}
