//! Aggregation helpers on the boundary to external collaborators
//!
//! Everything a driver needs to turn raw sample points into the leaf/count
//! map the core consumes: bounding-box estimation, descent of points to a
//! fixed depth, and pre-aggregation of `(label, count)` pairs coming out of
//! a shuffle. All outputs satisfy the histogram input contract.

use std::collections::BTreeMap;

use tracing::debug;

use histree_core::{Error, NodeLabel, Result};

use crate::geometry::Rectangle;
use crate::histogram::Histogram;
use crate::spatial::SpatialTree;

/// The hull of a point set. Contains every input point; a single point
/// yields a degenerate box of volume 0.
pub fn bounding_box(points: &[Vec<f64>]) -> Result<Rectangle> {
    let mut iter = points.iter();
    let first = iter.next().ok_or_else(|| Error::empty_input("bounding box"))?;
    let mut hull = Rectangle::point(first)?;
    for p in iter {
        if p.len() != first.len() {
            return Err(Error::size_mismatch(first.len(), p.len(), "sample point"));
        }
        hull = hull.hull(&Rectangle::point(p)?);
    }
    Ok(hull)
}

/// Descend every point to `depth` and aggregate the visits into an ordered
/// leaf/count map.
pub fn label_points_at_depth(
    tree: &SpatialTree,
    points: &[Vec<f64>],
    depth: usize,
) -> Result<(Vec<NodeLabel>, Vec<u64>)> {
    if points.is_empty() {
        return Err(Error::empty_input("point labeling"));
    }
    let mut acc: BTreeMap<NodeLabel, u64> = BTreeMap::new();
    for p in points {
        if !tree.root_box().contains(p) {
            return Err(Error::InvalidInput(format!(
                "sample point {p:?} lies outside the root box"
            )));
        }
        let label = tree
            .descend_box(p)
            .nth(depth)
            .expect("point descents are unbounded");
        *acc.entry(label).or_insert(0) += 1;
    }
    debug!("labeled {} points into {} cells", points.len(), acc.len());
    Ok(acc.into_iter().unzip())
}

/// Sum duplicate labels and drop zero counts, returning the pairs in
/// canonical order. Used to pre-aggregate shuffled partial counts before
/// histogram construction.
pub fn aggregate_counts(
    pairs: impl IntoIterator<Item = (NodeLabel, u64)>,
) -> (Vec<NodeLabel>, Vec<u64>) {
    let mut acc: BTreeMap<NodeLabel, u64> = BTreeMap::new();
    for (label, count) in pairs {
        *acc.entry(label).or_insert(0) += count;
    }
    acc.retain(|_, &mut c| c > 0);
    acc.into_iter().unzip()
}

/// Convenience: bounding box, descent to `depth`, aggregation, histogram.
pub fn histogram_from_points(
    tree: SpatialTree,
    points: &[Vec<f64>],
    depth: usize,
) -> Result<Histogram> {
    let (labels, counts) = label_points_at_depth(&tree, points, depth)?;
    Histogram::from_leaf_counts(tree, labels, counts)
}
