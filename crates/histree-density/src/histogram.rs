//! Counted histograms over a spatial tree
//!
//! A [`Histogram`] pairs a [`SpatialTree`] with a total sample count and a
//! [`LeafMap`] of per-leaf counts. It is either handed a pre-aggregated
//! leaf/count map (the external aggregator contract) or built in memory by
//! [`Histogram::split_and_count_from`], which keeps splitting cells while a
//! user-supplied limit predicate says they are still too coarse.

use num_traits::NumCast;
use tracing::debug;

use histree_core::{Error, LeafMap, NodeLabel, Result, Truncation};

use crate::density::{DensityHistogram, DensityValue};
use crate::spatial::SpatialTree;

/// Decides whether a cell should be split further during counting.
pub trait SplitLimits {
    /// `true` when the cell at the given depth, with the given volume and
    /// sample count, is still too coarse.
    fn should_split(&self, depth: usize, volume: f64, count: u64) -> bool;
}

impl<F: Fn(usize, f64, u64) -> bool> SplitLimits for F {
    fn should_split(&self, depth: usize, volume: f64, count: u64) -> bool {
        self(depth, volume, count)
    }
}

/// The canonical splitting policy: split while a cell holds more than a
/// count limit, or while the mass-deficient volume is still large.
///
/// A cell is split when `count > count_limit` or when
/// `(1 - count/total_count) * volume > volume_fraction * total_volume`.
#[derive(Debug, Clone)]
pub struct CountAndVolumeLimits {
    total_count: u64,
    total_volume: f64,
    count_limit: u64,
    volume_fraction: f64,
}

impl CountAndVolumeLimits {
    /// Default policy: count limit `total_count / 2`, volume fraction 1e-3.
    pub fn new(total_count: u64, total_volume: f64) -> Self {
        Self {
            total_count,
            total_volume,
            count_limit: total_count / 2,
            volume_fraction: 1e-3,
        }
    }

    /// Override the count limit.
    pub fn with_count_limit(mut self, count_limit: u64) -> Self {
        self.count_limit = count_limit;
        self
    }

    /// Override the volume fraction.
    pub fn with_volume_fraction(mut self, volume_fraction: f64) -> Self {
        self.volume_fraction = volume_fraction;
        self
    }
}

impl SplitLimits for CountAndVolumeLimits {
    fn should_split(&self, _depth: usize, volume: f64, count: u64) -> bool {
        if count > self.count_limit {
            return true;
        }
        let c: f64 = NumCast::from(count).unwrap();
        let n: f64 = NumCast::from(self.total_count).unwrap();
        (1.0 - c / n) * volume > self.volume_fraction * self.total_volume
    }
}

/// A piecewise-constant sample-count histogram over a spatial tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    pub(crate) tree: SpatialTree,
    pub(crate) total: u64,
    pub(crate) counts: LeafMap<u64>,
}

impl Histogram {
    /// Wrap a pre-built leaf map.
    ///
    /// Every count must be positive and sum to `total`.
    pub fn new(tree: SpatialTree, total: u64, counts: LeafMap<u64>) -> Result<Self> {
        if counts.is_empty() {
            return Err(Error::empty_input("histogram construction"));
        }
        if total == 0 {
            return Err(Error::InvalidInput(
                "histogram total count must be positive".to_string(),
            ));
        }
        if let Some((leaf, _)) = counts.iter().find(|(_, &c)| c == 0) {
            return Err(Error::InvalidInput(format!(
                "leaf {leaf} carries a zero count"
            )));
        }
        let sum: u64 = counts.vals().iter().sum();
        if sum != total {
            return Err(Error::InvalidInput(format!(
                "leaf counts sum to {sum}, expected total {total}"
            )));
        }
        Ok(Histogram {
            tree,
            total,
            counts,
        })
    }

    /// Accept the external aggregator contract: labels in canonical order,
    /// pairwise incomparable, one positive count per label.
    ///
    /// The pairing between `labels` and `counts` is positional, so the
    /// labels are validated in place rather than re-sorted.
    pub fn from_leaf_counts(
        tree: SpatialTree,
        labels: Vec<NodeLabel>,
        counts: Vec<u64>,
    ) -> Result<Self> {
        if labels.len() != counts.len() {
            return Err(Error::size_mismatch(labels.len(), counts.len(), "leaf counts"));
        }
        for w in labels.windows(2) {
            if w[1] <= w[0] {
                return Err(Error::InvalidInput(format!(
                    "labels out of canonical order: {} before {}",
                    w[0], w[1]
                )));
            }
            if w[0].is_ancestor_of(&w[1]) {
                return Err(Error::InvalidInput(format!(
                    "label {} is an ancestor of label {}",
                    w[0], w[1]
                )));
            }
        }
        let total = counts.iter().sum();
        let leaf_map = LeafMap::new(Truncation::from_sorted_unchecked(labels), counts)?;
        Histogram::new(tree, total, leaf_map)
    }

    /// The spatial tree.
    pub fn tree(&self) -> &SpatialTree {
        &self.tree
    }

    /// Total number of samples.
    pub fn total_count(&self) -> u64 {
        self.total
    }

    /// The per-leaf counts.
    pub fn counts(&self) -> &LeafMap<u64> {
        &self.counts
    }

    /// The leaf antichain.
    pub fn truncation(&self) -> &Truncation {
        self.counts.truncation()
    }

    /// Number of leaves.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// A histogram always has at least one leaf; kept for symmetry with the
    /// usual container surface.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Maximum leaf depth.
    pub fn max_depth(&self) -> usize {
        self.truncation()
            .iter()
            .map(|l| l.depth())
            .max()
            .unwrap_or(0)
    }

    /// The estimated density at a point: `count / (total * volume)` of the
    /// leaf whose cell contains it, 0.0 outside the root box or off the
    /// leaf support.
    pub fn density_at(&self, point: &[f64]) -> f64 {
        if !self.tree.root_box().contains(point) {
            return 0.0;
        }
        let (label, val) = self.counts.query(self.tree.descend_box(point));
        match val {
            Some(&count) => {
                let c: f64 = NumCast::from(count).unwrap();
                let n: f64 = NumCast::from(self.total).unwrap();
                c / (n * self.tree.volume_at(&label))
            }
            None => 0.0,
        }
    }

    /// Cherries of the leaf antichain with their merged counts.
    pub fn cherries(&self) -> impl Iterator<Item = (NodeLabel, u64)> + '_ {
        let vals = self.counts.vals();
        self.truncation()
            .cherries()
            .map(move |(parent, i)| (parent, vals[i] + vals[i + 1]))
    }

    /// Convert counts to `(density, volume)` leaves; the densities
    /// integrate to 1 over the leaf support.
    pub fn normalize(&self) -> DensityHistogram {
        let n: f64 = NumCast::from(self.total).unwrap();
        let densities = self.counts.map_values(|label, &count| {
            let volume = self.tree.volume_at(label);
            let c: f64 = NumCast::from(count).unwrap();
            DensityValue {
                density: c / (n * volume),
                volume,
            }
        });
        DensityHistogram {
            tree: self.tree.clone(),
            densities,
        }
    }

    /// Build a histogram by recursive splitting, starting from the leaves of
    /// `start` and refining every cell for which `lims` still holds.
    ///
    /// Post-condition: every returned leaf fails `lims` and every proper
    /// ancestor of a returned leaf passes it. Cells that end up empty are
    /// dropped. Points must lie in the tree's root box and inside `start`.
    pub fn split_and_count_from<L: SplitLimits>(
        tree: SpatialTree,
        start: &Truncation,
        points: &[Vec<f64>],
        lims: &L,
    ) -> Result<Self> {
        if points.is_empty() {
            return Err(Error::empty_input("split and count"));
        }
        let dim = tree.dimension();
        for p in points {
            if p.len() != dim {
                return Err(Error::size_mismatch(dim, p.len(), "sample point"));
            }
            if !tree.root_box().contains(p) {
                return Err(Error::InvalidInput(format!(
                    "sample point {p:?} lies outside the root box"
                )));
            }
        }

        // Route every point to its starting leaf.
        let start_index =
            LeafMap::new(start.clone(), (0..start.len()).collect::<Vec<usize>>())?;
        let mut buckets: Vec<Vec<usize>> = vec![Vec::new(); start.len()];
        for (i, p) in points.iter().enumerate() {
            match start_index.query(tree.descend_box(p)).1 {
                Some(&slot) => buckets[slot].push(i),
                None => {
                    return Err(Error::InvalidInput(format!(
                        "sample point {p:?} is not covered by the starting truncation"
                    )))
                }
            }
        }

        debug!(
            "splitting {} points from {} starting cells",
            points.len(),
            start.len()
        );

        let mut stack: Vec<(NodeLabel, Vec<usize>)> = start
            .iter()
            .cloned()
            .zip(buckets)
            .collect();
        let mut out: Vec<(NodeLabel, u64)> = Vec::new();

        while let Some((label, members)) = stack.pop() {
            if members.is_empty() {
                continue;
            }
            let count = members.len() as u64;
            let cell = tree.cell_at(&label);
            if lims.should_split(label.depth(), cell.volume(), count) {
                let axis = tree.axis_for(label.depth(), &cell);
                let mid = cell.mid(axis);
                let (left, right): (Vec<usize>, Vec<usize>) =
                    members.into_iter().partition(|&i| points[i][axis] < mid);
                stack.push((label.left(), left));
                stack.push((label.right(), right));
            } else {
                out.push((label, count));
            }
        }

        out.sort_by(|a, b| a.0.cmp(&b.0));
        let (labels, counts): (Vec<NodeLabel>, Vec<u64>) = out.into_iter().unzip();
        Histogram::from_leaf_counts(tree, labels, counts)
    }
}
