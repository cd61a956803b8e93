//! Finite antichains of node labels in canonical left-to-right order
//!
//! A [`Truncation`] is the leaf set of a finite subtree of the infinite
//! binary partition: a sequence of labels that is sorted in left/right order
//! and pairwise incomparable under ancestry. Keeping the leaves sorted makes
//! the descendants of any label a contiguous index range, so subtree lookups
//! are two binary searches and cherry detection is a linear scan over
//! adjacent pairs.

use std::fmt;
use std::ops::Range;

use crate::error::{Error, Result};
use crate::label::NodeLabel;

/// Sorted antichain of labels; the leaves of a finite subtree.
#[derive(Clone, PartialEq, Eq)]
pub struct Truncation {
    leaves: Vec<NodeLabel>,
}

impl Truncation {
    /// Build a truncation from an arbitrary leaf set.
    ///
    /// The labels are sorted into canonical left/right order; duplicates and
    /// ancestor/descendant pairs are rejected.
    pub fn from_leaf_set(mut leaves: Vec<NodeLabel>) -> Result<Self> {
        leaves.sort();
        for w in leaves.windows(2) {
            if w[0] == w[1] {
                return Err(Error::InvalidInput(format!("duplicate leaf {}", w[0])));
            }
            if w[0].is_ancestor_of(&w[1]) {
                return Err(Error::InvalidInput(format!(
                    "leaf {} is an ancestor of leaf {}",
                    w[0], w[1]
                )));
            }
        }
        Ok(Truncation { leaves })
    }

    /// Wrap a leaf vector that is already sorted and pairwise incomparable.
    ///
    /// Used on hot paths where the invariant holds by construction; callers
    /// are responsible for it.
    pub fn from_sorted_unchecked(leaves: Vec<NodeLabel>) -> Self {
        debug_assert!(leaves
            .windows(2)
            .all(|w| w[0] < w[1] && !w[0].is_ancestor_of(&w[1])));
        Truncation { leaves }
    }

    /// The leaves in canonical order.
    pub fn leaves(&self) -> &[NodeLabel] {
        &self.leaves
    }

    /// Number of leaves.
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    /// Whether the truncation has no leaves.
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Iterate over the leaves in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = &NodeLabel> {
        self.leaves.iter()
    }

    /// Whether `label` is one of the leaves.
    pub fn contains(&self, label: &NodeLabel) -> bool {
        self.leaves.binary_search(label).is_ok()
    }

    /// The half-open index range of leaves that are `label` or descendants
    /// of it.
    ///
    /// Because the leaves are in left/right order this range is contiguous;
    /// it is located with two binary searches.
    pub fn subtree(&self, label: &NodeLabel) -> Range<usize> {
        let start = self.leaves.partition_point(|x| x < label);
        let end = self
            .leaves
            .partition_point(|x| x <= label || label.is_ancestor_of(x));
        start..end
    }

    /// Index of the leaf that is `label` or an ancestor of it, if any.
    pub fn covering_leaf(&self, label: &NodeLabel) -> Option<usize> {
        let idx = self.leaves.partition_point(|x| x < label);
        if idx < self.leaves.len() && self.leaves[idx] == *label {
            return Some(idx);
        }
        if idx > 0 && self.leaves[idx - 1].is_ancestor_of(label) {
            return Some(idx - 1);
        }
        None
    }

    /// Whether both children of `label` appear as (necessarily consecutive)
    /// leaves.
    pub fn has_as_cherry(&self, label: &NodeLabel) -> bool {
        let left = label.left();
        let i = self.leaves.partition_point(|x| *x < left);
        i + 1 < self.leaves.len()
            && self.leaves[i] == left
            && self.leaves[i + 1] == label.right()
    }

    /// Iterate over cherries: internal nodes whose two children are both
    /// leaves, yielded as `(parent, index_of_left_child)`.
    pub fn cherries(&self) -> impl Iterator<Item = (NodeLabel, usize)> + '_ {
        self.leaves.windows(2).enumerate().filter_map(|(i, w)| {
            if w[0].is_left_child() && w[1] == w[0].sibling() {
                Some((w[0].parent(), i))
            } else {
                None
            }
        })
    }

    /// The smallest extension of the leaf set in which every internal node
    /// of the subtree has two descendant branches.
    ///
    /// Inserts the missing sibling subtree root wherever a node on the way
    /// from one leaf to the next (or from the tree boundary to the first and
    /// last leaves) has only one branch populated. The result is the leaf
    /// set of a finite complete binary subtree; an empty truncation
    /// completes to the root alone.
    pub fn minimal_completion(&self) -> Truncation {
        if self.leaves.is_empty() {
            return Truncation {
                leaves: vec![NodeLabel::root()],
            };
        }
        let mut out: Vec<NodeLabel> = Vec::with_capacity(2 * self.leaves.len());

        // Left boundary: siblings of right-child ancestors of the first
        // leaf, emitted root-down.
        let mut lead: Vec<NodeLabel> = Vec::new();
        let mut cur = self.leaves[0].clone();
        while !cur.is_root() {
            if cur.is_right_child() {
                lead.push(cur.sibling());
            }
            cur = cur.parent();
        }
        out.extend(lead.into_iter().rev());
        out.push(self.leaves[0].clone());

        // Gaps between consecutive leaves: climb from each side towards the
        // children of the join.
        for w in self.leaves.windows(2) {
            let (a, b) = (&w[0], &w[1]);
            let child_depth = a.join(b).depth() + 1;

            let mut cur = a.clone();
            while cur.depth() > child_depth {
                if cur.is_left_child() {
                    out.push(cur.sibling());
                }
                cur = cur.parent();
            }

            let mut fills: Vec<NodeLabel> = Vec::new();
            let mut cur = b.clone();
            while cur.depth() > child_depth {
                if cur.is_right_child() {
                    fills.push(cur.sibling());
                }
                cur = cur.parent();
            }
            out.extend(fills.into_iter().rev());
            out.push(b.clone());
        }

        // Right boundary: siblings of left-child ancestors of the last leaf.
        let mut cur = self.leaves[self.leaves.len() - 1].clone();
        while !cur.is_root() {
            if cur.is_left_child() {
                out.push(cur.sibling());
            }
            cur = cur.parent();
        }

        Truncation::from_sorted_unchecked(out)
    }
}

impl fmt::Debug for Truncation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.leaves.iter()).finish()
    }
}
