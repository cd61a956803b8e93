//! Adaptive histogram density estimation over binary space partitions
//!
//! This crate estimates multivariate densities as piecewise-constant step
//! functions over an adaptively refined, axis-aligned binary partition of a
//! bounding box. Sample points are counted into the leaves of a
//! [`SpatialTree`]; the resulting [`Histogram`] is then *backtracked*, a
//! greedy, priority-driven sequence of cherry merges trading resolution for
//! statistical stability, and a winner is picked from the trajectory by
//! held-out minimum-distance selection. Finished estimates answer density
//! queries, conditional slices along axis subsets, coverage-region tail
//! probabilities, and sampling.
//!
//! # Pipeline
//!
//! 1. [`partition::bounding_box`] to frame the data
//! 2. [`Histogram::split_and_count_from`] (or the external leaf/count
//!    contract via [`Histogram::from_leaf_counts`]) to build a fine
//!    histogram
//! 3. [`Histogram::backtrack_trajectory`] with a [`MergePriority`] to
//!    coarsen
//! 4. [`mde::select_min_distance`] to pick the estimate
//! 5. [`DensityHistogram`] for queries, slices, tails and samples
//!
//! # Example
//!
//! ```rust
//! use histree_density::{CountAndVolumeLimits, ExcessMass, Histogram, SpatialTree, Truncation};
//! use histree_density::{partition, NodeLabel};
//!
//! let points: Vec<Vec<f64>> = (0..256)
//!     .map(|i| {
//!         let t = i as f64 / 256.0;
//!         vec![t * t, 1.0 - t]
//!     })
//!     .collect();
//!
//! let root_box = partition::bounding_box(&points).unwrap();
//! let tree = SpatialTree::widest(root_box).unwrap();
//! let start = Truncation::from_leaf_set(vec![NodeLabel::root()]).unwrap();
//! let lims = CountAndVolumeLimits::new(points.len() as u64, tree.root_box().volume());
//! let fine = Histogram::split_and_count_from(tree, &start, &points, &lims).unwrap();
//!
//! let prio = ExcessMass::for_histogram(&fine);
//! let coarse = fine.backtrack_num_steps(&prio, 3);
//! let density = coarse.normalize();
//! assert!((density.total_mass() - 1.0).abs() < 1e-9);
//! ```

pub mod backtrack;
pub mod coverage;
pub mod density;
pub mod geometry;
pub mod histogram;
pub mod mde;
pub mod partition;
pub mod spatial;

pub use backtrack::{ExcessMass, MergePriority};
pub use coverage::TailProbabilities;
pub use density::{DensityHistogram, DensityValue};
pub use geometry::Rectangle;
pub use histogram::{CountAndVolumeLimits, Histogram, SplitLimits};
pub use spatial::{unfold_tree, BoxDescent, SpatialTree, SplitRule};

// The discrete layer, re-exported for one-import use.
pub use histree_core::{Error, LeafMap, NodeLabel, Result, Side, Truncation};
