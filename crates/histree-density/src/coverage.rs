//! Tail probabilities and coverage regions
//!
//! Sorting leaves by descending density and accumulating their masses turns
//! a density histogram into a map from points to level-set tail
//! probabilities: the value stored at a leaf is the probability of the
//! smallest coverage region that contains it. Points outside every leaf see
//! the sentinel 1.0, which is exact because uncovered regions carry no mass
//! and lie in the complement of every finite coverage region.

use std::cmp::Ordering;

use histree_core::{LeafMap, Result};

use crate::density::DensityHistogram;
use crate::spatial::SpatialTree;

/// Cumulative leaf probabilities in density-descending order.
#[derive(Debug, Clone)]
pub struct TailProbabilities {
    tree: SpatialTree,
    tails: LeafMap<f64>,
    /// The cumulative levels in accumulation order (ascending).
    levels: Vec<f64>,
}

impl TailProbabilities {
    pub(crate) fn from_density(density: &DensityHistogram) -> TailProbabilities {
        let map = density.densities();
        let leaves = map.truncation().leaves();
        let mut order: Vec<usize> = (0..map.len()).collect();
        order.sort_by(|&i, &j| {
            map.vals()[j]
                .density
                .partial_cmp(&map.vals()[i].density)
                .unwrap_or(Ordering::Equal)
                .then_with(|| leaves[i].cmp(&leaves[j]))
        });

        let mut tails = vec![0.0; map.len()];
        let mut levels = Vec::with_capacity(map.len());
        let mut acc = 0.0;
        for &idx in &order {
            let v = &map.vals()[idx];
            acc += v.density * v.volume;
            tails[idx] = acc;
            levels.push(acc);
        }
        let tails = LeafMap::new(map.truncation().clone(), tails)
            .expect("one tail probability per leaf");
        TailProbabilities {
            tree: density.tree().clone(),
            tails,
            levels,
        }
    }

    /// The spatial tree.
    pub fn tree(&self) -> &SpatialTree {
        &self.tree
    }

    /// Per-leaf cumulative probabilities, parallel to the leaf antichain.
    pub fn tails(&self) -> &LeafMap<f64> {
        &self.tails
    }

    /// Tail probability of the smallest coverage region containing `point`;
    /// 1.0 outside the root box or off the leaf support.
    pub fn query(&self, point: &[f64]) -> f64 {
        if !self.tree.root_box().contains(point) {
            return 1.0;
        }
        let (_, val) = self.tails.query(self.tree.descend_box(point));
        val.copied().unwrap_or(1.0)
    }

    /// The smallest stored coverage level at least `alpha`.
    ///
    /// Monotone non-decreasing in `alpha` and never below it while
    /// `alpha <= 1`.
    pub fn confidence_region(&self, alpha: f64) -> Result<f64> {
        if !(0.0..=1.0).contains(&alpha) {
            return Err(histree_core::Error::invalid_probability(alpha));
        }
        let idx = self.levels.partition_point(|&level| level < alpha);
        Ok(if idx < self.levels.len() {
            self.levels[idx]
        } else {
            // Unnormalized totals below alpha clamp to the full support.
            self.levels[self.levels.len() - 1]
        })
    }
}
