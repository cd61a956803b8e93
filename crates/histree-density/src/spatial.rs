//! Deterministic spatial trees over a root box
//!
//! A [`SpatialTree`] maps node labels to axis-aligned cells: the root label
//! owns the root box, and each step of a label's path halves the current
//! cell along a rule-determined axis. Nothing is stored per node; the cell
//! of any label is recomputed by replaying its path, and point descents
//! carry their cell incrementally.
//!
//! Because splits always happen at the midpoint, both children of a cell
//! have the same width vector, so the split axis depends only on depth. The
//! per-depth axis sequence (the *split order*) is what slicing uses to
//! project leaf paths onto a subset of axes.

use histree_core::{Error, NodeLabel, Result, Side};

use crate::geometry::Rectangle;

/// How the split axis is chosen at each depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitRule {
    /// Axis at depth `k` is `k mod d`.
    CycleAxes,
    /// Axis of greatest current width, ties to the lowest index.
    WidestSide,
}

/// A root box with a deterministic splitting rule.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialTree {
    root: Rectangle,
    rule: SplitRule,
}

impl SpatialTree {
    /// Create a tree over `root`, which must have strictly positive widths.
    pub fn new(root: Rectangle, rule: SplitRule) -> Result<Self> {
        for axis in 0..root.dimension() {
            if root.width(axis) <= 0.0 {
                return Err(Error::InvalidInput(format!(
                    "root box must have strictly positive widths, axis {axis} has {}",
                    root.width(axis)
                )));
            }
        }
        Ok(SpatialTree { root, rule })
    }

    /// Convenience constructor for the cycle-axes rule.
    pub fn cycle(root: Rectangle) -> Result<Self> {
        Self::new(root, SplitRule::CycleAxes)
    }

    /// Convenience constructor for the widest-side rule.
    pub fn widest(root: Rectangle) -> Result<Self> {
        Self::new(root, SplitRule::WidestSide)
    }

    /// The root box.
    pub fn root_box(&self) -> &Rectangle {
        &self.root
    }

    /// The splitting rule.
    pub fn rule(&self) -> SplitRule {
        self.rule
    }

    /// Number of axes.
    pub fn dimension(&self) -> usize {
        self.root.dimension()
    }

    pub(crate) fn axis_for(&self, depth: usize, cell: &Rectangle) -> usize {
        match self.rule {
            SplitRule::CycleAxes => depth % self.dimension(),
            SplitRule::WidestSide => cell.widest_axis(),
        }
    }

    /// The cell owned by `label`.
    pub fn cell_at(&self, label: &NodeLabel) -> Rectangle {
        unfold_tree(self.root.clone(), label, |cell, side, depth| {
            let axis = self.axis_for(depth, cell);
            match side {
                Side::Left => cell.split_left(axis),
                Side::Right => cell.split_right(axis),
            }
        })
    }

    /// The axis along which the cell at `label` would be split.
    pub fn axis_at(&self, label: &NodeLabel) -> usize {
        let depth = label.depth();
        self.axis_for(depth, &self.cell_at(label))
    }

    /// The volume of the cell at `label`.
    ///
    /// Midpoint splits halve the volume once per depth regardless of the
    /// rule, so no descent is needed.
    pub fn volume_at(&self, label: &NodeLabel) -> f64 {
        self.root.volume() * 0.5f64.powi(label.depth() as i32)
    }

    /// The split axis at each depth `0..depth`.
    pub fn split_order_to_depth(&self, depth: usize) -> Vec<usize> {
        match self.rule {
            SplitRule::CycleAxes => (0..depth).map(|k| k % self.dimension()).collect(),
            SplitRule::WidestSide => {
                let mut widths = self.root.widths();
                (0..depth)
                    .map(|_| {
                        let mut axis = 0;
                        for a in 1..widths.len() {
                            if widths[a] > widths[axis] {
                                axis = a;
                            }
                        }
                        widths[axis] *= 0.5;
                        axis
                    })
                    .collect()
            }
        }
    }

    /// First depth at which the widest side of a cell falls below
    /// `side_length`.
    pub fn finest_res_depth(&self, side_length: f64) -> Result<usize> {
        if !(side_length > 0.0 && side_length.is_finite()) {
            return Err(Error::InvalidParameter(format!(
                "finest resolution side length must be positive and finite, got {side_length}"
            )));
        }
        let mut widths = self.root.widths();
        let mut depth = 0;
        loop {
            let mut axis = 0;
            for a in 1..widths.len() {
                if widths[a] > widths[axis] {
                    axis = a;
                }
            }
            if widths[axis] < side_length {
                return Ok(depth);
            }
            // Halve what the rule would split; for cycle-axes the round-robin
            // reaches the widest side within d extra steps, so the widest
            // simulation bounds both rules.
            match self.rule {
                SplitRule::CycleAxes => {
                    let a = depth % self.dimension();
                    widths[a] *= 0.5;
                }
                SplitRule::WidestSide => widths[axis] *= 0.5,
            }
            depth += 1;
        }
    }

    /// Lazy label descent through the cells containing `point`, starting at
    /// the root. The iterator is infinite.
    pub fn descend_box<'a>(&'a self, point: &'a [f64]) -> impl Iterator<Item = NodeLabel> + 'a {
        self.descend_box_prime(point).map(|(label, _)| label)
    }

    /// Like [`SpatialTree::descend_box`], with each label's cell
    /// materialized alongside it.
    pub fn descend_box_prime<'a>(&'a self, point: &'a [f64]) -> BoxDescent<'a> {
        BoxDescent {
            tree: self,
            point,
            label: NodeLabel::root(),
            cell: self.root.clone(),
            depth: 0,
            primed: false,
        }
    }
}

/// Infinite iterator over `(label, cell)` pairs along a point descent.
///
/// The cell is carried incrementally, so each step costs one midpoint
/// comparison and one box update.
pub struct BoxDescent<'a> {
    tree: &'a SpatialTree,
    point: &'a [f64],
    label: NodeLabel,
    cell: Rectangle,
    depth: usize,
    primed: bool,
}

impl Iterator for BoxDescent<'_> {
    type Item = (NodeLabel, Rectangle);

    fn next(&mut self) -> Option<(NodeLabel, Rectangle)> {
        if !self.primed {
            self.primed = true;
            return Some((self.label.clone(), self.cell.clone()));
        }
        let axis = self.tree.axis_for(self.depth, &self.cell);
        if self.point[axis] < self.cell.mid(axis) {
            self.label = self.label.left();
            self.cell = self.cell.split_left(axis);
        } else {
            self.label = self.label.right();
            self.cell = self.cell.split_right(axis);
        }
        self.depth += 1;
        Some((self.label.clone(), self.cell.clone()))
    }
}

/// Replay a label's path over an arbitrary state: start from the root state
/// and apply `step` once per path bit.
///
/// [`SpatialTree::cell_at`] is this unfolding with boxes as the state; with
/// labels as the state and child steps as the transition it reproduces the
/// label itself.
pub fn unfold_tree<S>(
    root: S,
    label: &NodeLabel,
    mut step: impl FnMut(&S, Side, usize) -> S,
) -> S {
    let mut state = root;
    for (depth, side) in label.path().enumerate() {
        state = step(&state, side, depth);
    }
    state
}
