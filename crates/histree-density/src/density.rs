//! Normalized density histograms: slicing and sampling
//!
//! A [`DensityHistogram`] carries `(density, volume)` per leaf instead of
//! raw counts. Besides point queries it supports conditioning on a subset
//! of axes ([`DensityHistogram::quick_slice`]) and drawing samples.
//!
//! Slicing works on labels, not geometry: a leaf's path is projected onto
//! the non-conditioned axes by dropping every step taken along a
//! conditioned axis, provided the step agrees with the conditioning point's
//! side (a disagreeing leaf misses the slice entirely). Because midpoint
//! splits make the split axis a function of depth alone, the projected
//! paths are valid labels of the sliced tree.

use std::collections::BTreeMap;

use rand::Rng;
use rand_distr::{Distribution, Uniform};

use histree_core::{Error, LeafMap, NodeLabel, Result, Side, Truncation};

use crate::coverage::TailProbabilities;
use crate::spatial::SpatialTree;

/// Density and cell volume of one leaf.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DensityValue {
    /// Estimated density over the leaf cell.
    pub density: f64,
    /// Volume of the leaf cell.
    pub volume: f64,
}

/// A piecewise-constant density over the leaves of a spatial tree.
#[derive(Debug, Clone, PartialEq)]
pub struct DensityHistogram {
    pub(crate) tree: SpatialTree,
    pub(crate) densities: LeafMap<DensityValue>,
}

impl DensityHistogram {
    /// Pair a tree with per-leaf densities.
    pub fn new(tree: SpatialTree, densities: LeafMap<DensityValue>) -> Result<Self> {
        for (leaf, v) in densities.iter() {
            if !(v.density.is_finite() && v.volume.is_finite()) {
                return Err(Error::non_finite("leaf densities"));
            }
            if v.density < 0.0 || v.volume < 0.0 {
                return Err(Error::InvalidInput(format!(
                    "leaf {leaf} carries a negative density or volume"
                )));
            }
        }
        Ok(DensityHistogram { tree, densities })
    }

    /// The spatial tree.
    pub fn tree(&self) -> &SpatialTree {
        &self.tree
    }

    /// The per-leaf `(density, volume)` map.
    pub fn densities(&self) -> &LeafMap<DensityValue> {
        &self.densities
    }

    /// Number of leaves.
    pub fn len(&self) -> usize {
        self.densities.len()
    }

    /// Whether there are no leaves.
    pub fn is_empty(&self) -> bool {
        self.densities.is_empty()
    }

    /// Total mass `sum(density * volume)`; 1 after normalization.
    pub fn total_mass(&self) -> f64 {
        self.densities
            .vals()
            .iter()
            .map(|v| v.density * v.volume)
            .sum()
    }

    /// Rescale so the total mass is 1. A zero-mass histogram is returned
    /// unchanged.
    pub fn normalize(&self) -> DensityHistogram {
        let mass = self.total_mass();
        if mass <= 0.0 {
            return self.clone();
        }
        DensityHistogram {
            tree: self.tree.clone(),
            densities: self.densities.map_values(|_, v| DensityValue {
                density: v.density / mass,
                volume: v.volume,
            }),
        }
    }

    /// The density at a point; 0.0 outside the root box or off the leaf
    /// support.
    pub fn density_at(&self, point: &[f64]) -> f64 {
        if !self.tree.root_box().contains(point) {
            return 0.0;
        }
        let (_, val) = self.densities.query(self.tree.descend_box(point));
        val.map(|v| v.density).unwrap_or(0.0)
    }

    /// Condition on `axes` being fixed at `point`, producing the
    /// (unnormalized) density over the remaining axes.
    ///
    /// `split_order` must list the split axis per depth, covering at least
    /// the deepest leaf (see [`SpatialTree::split_order_to_depth`]).
    /// Returns `None` when the conditioning point lies outside the
    /// projected root box or when the slice carries no mass.
    pub fn quick_slice(
        &self,
        axes: &[usize],
        point: &[f64],
        split_order: &[usize],
    ) -> Result<Option<DensityHistogram>> {
        let dim = self.tree.dimension();
        if axes.is_empty() || axes.len() >= dim {
            return Err(Error::InvalidParameter(format!(
                "conditioning axes must be a proper non-empty subset of 0..{dim}"
            )));
        }
        if axes.windows(2).any(|w| w[0] >= w[1]) || *axes.last().unwrap() >= dim {
            return Err(Error::InvalidParameter(
                "conditioning axes must be strictly increasing and in range".to_string(),
            ));
        }
        if point.len() != axes.len() {
            return Err(Error::size_mismatch(axes.len(), point.len(), "slice point"));
        }
        if point.iter().any(|x| !x.is_finite()) {
            return Err(Error::non_finite("slice point"));
        }
        let max_depth = self
            .densities
            .truncation()
            .iter()
            .map(|l| l.depth())
            .max()
            .unwrap_or(0);
        if split_order.len() < max_depth {
            return Err(Error::InvalidParameter(format!(
                "split order covers depth {}, leaves reach depth {max_depth}",
                split_order.len()
            )));
        }

        let root = self.tree.root_box();
        // Position of each conditioned axis in `axes`, None for free axes.
        let mut cond_slot: Vec<Option<usize>> = vec![None; dim];
        for (slot, &axis) in axes.iter().enumerate() {
            cond_slot[axis] = Some(slot);
            let (lo, hi) = (root.low()[axis], root.high()[axis]);
            if point[slot] < lo || point[slot] > hi {
                return Ok(None);
            }
        }
        let free_axes: Vec<usize> = (0..dim).filter(|a| cond_slot[*a].is_none()).collect();

        // Project every leaf path, rejecting leaves on the wrong side of
        // the conditioning point; survivors accumulate mass per new label.
        let mut sliced: BTreeMap<NodeLabel, f64> = BTreeMap::new();
        for (leaf, val) in self.densities.iter() {
            let mut intervals: Vec<(f64, f64)> = axes
                .iter()
                .map(|&a| (root.low()[a], root.high()[a]))
                .collect();
            let mut projected: Vec<Side> = Vec::with_capacity(leaf.depth());
            let mut rejected = false;
            for (depth, side) in leaf.path().enumerate() {
                let axis = split_order[depth];
                match cond_slot[axis] {
                    Some(slot) => {
                        let (lo, hi) = intervals[slot];
                        let mid = 0.5 * (lo + hi);
                        let point_side = if point[slot] < mid {
                            Side::Left
                        } else {
                            Side::Right
                        };
                        if point_side != side {
                            rejected = true;
                            break;
                        }
                        intervals[slot] = match side {
                            Side::Left => (lo, mid),
                            Side::Right => (mid, hi),
                        };
                    }
                    None => projected.push(side),
                }
            }
            if rejected {
                continue;
            }
            let conditioned_width: f64 = intervals.iter().map(|(lo, hi)| hi - lo).product();
            let free_volume = val.volume / conditioned_width;
            let new_label = NodeLabel::from_path(projected);
            *sliced.entry(new_label).or_insert(0.0) += val.density * free_volume;
        }

        if sliced.is_empty() || sliced.values().all(|&mass| mass <= 0.0) {
            return Ok(None);
        }

        let sliced_tree = SpatialTree::new(root.project(&free_axes), self.tree.rule())?;
        let mut labels = Vec::with_capacity(sliced.len());
        let mut vals = Vec::with_capacity(sliced.len());
        for (label, mass) in sliced {
            let volume = sliced_tree.volume_at(&label);
            vals.push(DensityValue {
                density: mass / volume,
                volume,
            });
            labels.push(label);
        }
        let densities = LeafMap::new(Truncation::from_sorted_unchecked(labels), vals)?;
        Ok(Some(DensityHistogram {
            tree: sliced_tree,
            densities,
        }))
    }

    /// Per-leaf cumulative probabilities in density-descending order.
    pub fn tail_probabilities(&self) -> TailProbabilities {
        TailProbabilities::from_density(self)
    }

    /// Draw `n` points: a leaf with probability proportional to its mass,
    /// then a uniform point in the leaf's cell. Every sample lands where
    /// the density is positive.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R, n: usize) -> Vec<Vec<f64>> {
        let mut cumulative = Vec::with_capacity(self.len());
        let mut acc = 0.0;
        for v in self.densities.vals() {
            acc += v.density * v.volume;
            cumulative.push(acc);
        }
        if acc <= 0.0 {
            return Vec::new();
        }

        let leaves = self.densities.truncation().leaves();
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            let u = rng.gen_range(0.0..acc);
            let idx = cumulative.partition_point(|&c| c <= u).min(leaves.len() - 1);
            let cell = self.tree.cell_at(&leaves[idx]);
            let point: Vec<f64> = (0..cell.dimension())
                .map(|axis| {
                    Uniform::new(cell.low()[axis], cell.high()[axis]).sample(rng)
                })
                .collect();
            out.push(point);
        }
        out
    }
}
