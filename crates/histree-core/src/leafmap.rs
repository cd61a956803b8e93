//! Truncations paired with parallel value vectors
//!
//! A [`LeafMap`] attaches one value to each leaf of a [`Truncation`]. The
//! two vectors stay index-aligned, so slicing a subtree range slices both,
//! and point lookups reduce to descending the label chain until the subtree
//! range collapses.

use std::ops::Range;

use crate::error::{Error, Result};
use crate::label::NodeLabel;
use crate::truncation::Truncation;

/// A truncation with one value per leaf.
#[derive(Debug, Clone, PartialEq)]
pub struct LeafMap<V> {
    truncation: Truncation,
    vals: Vec<V>,
}

impl<V> LeafMap<V> {
    /// Pair a truncation with its value vector.
    pub fn new(truncation: Truncation, vals: Vec<V>) -> Result<Self> {
        if truncation.len() != vals.len() {
            return Err(Error::size_mismatch(
                truncation.len(),
                vals.len(),
                "leaf value vector",
            ));
        }
        Ok(LeafMap { truncation, vals })
    }

    /// The underlying truncation.
    pub fn truncation(&self) -> &Truncation {
        &self.truncation
    }

    /// The values, parallel to [`Truncation::leaves`].
    pub fn vals(&self) -> &[V] {
        &self.vals
    }

    /// Number of leaves.
    pub fn len(&self) -> usize {
        self.vals.len()
    }

    /// Whether the map holds no leaves.
    pub fn is_empty(&self) -> bool {
        self.vals.is_empty()
    }

    /// Iterate over `(leaf, value)` pairs in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (&NodeLabel, &V)> {
        self.truncation.iter().zip(self.vals.iter())
    }

    /// Walk a root-down label stream and return the deepest label that is a
    /// leaf or an ancestor of one, with its value when it is exactly a leaf.
    ///
    /// The stream may be infinite; the walk stops as soon as a label has no
    /// leaves below it.
    pub fn query<I>(&self, descent: I) -> (NodeLabel, Option<&V>)
    where
        I: IntoIterator<Item = NodeLabel>,
    {
        let mut best = NodeLabel::root();
        let mut val = None;
        for label in descent {
            let range = self.truncation.subtree(&label);
            if range.is_empty() {
                break;
            }
            val = if range.len() == 1 && self.truncation.leaves()[range.start] == label {
                Some(&self.vals[range.start])
            } else {
                None
            };
            best = label;
        }
        (best, val)
    }

    /// Value at the leaf that is `label` or an ancestor of it, if any.
    pub fn query_at(&self, label: &NodeLabel) -> Option<&V> {
        self.truncation
            .covering_leaf(label)
            .map(|idx| &self.vals[idx])
    }

    /// The parallel sub-map over a leaf index range.
    pub fn slice(&self, range: Range<usize>) -> LeafMap<V>
    where
        V: Clone,
    {
        LeafMap {
            truncation: Truncation::from_sorted_unchecked(
                self.truncation.leaves()[range.clone()].to_vec(),
            ),
            vals: self.vals[range].to_vec(),
        }
    }

    /// Concatenate with a map whose leaves all lie strictly to the right.
    pub fn concat(&self, other: &LeafMap<V>) -> Result<LeafMap<V>>
    where
        V: Clone,
    {
        if let (Some(last), Some(first)) = (
            self.truncation.leaves().last(),
            other.truncation.leaves().first(),
        ) {
            if !last.is_left_of(first) {
                return Err(Error::InvalidInput(format!(
                    "cannot concatenate: leaf {last} does not lie left of leaf {first}"
                )));
            }
        }
        let mut leaves = self.truncation.leaves().to_vec();
        leaves.extend_from_slice(other.truncation.leaves());
        let mut vals = self.vals.clone();
        vals.extend_from_slice(&other.vals);
        Ok(LeafMap {
            truncation: Truncation::from_sorted_unchecked(leaves),
            vals,
        })
    }

    /// Map the values, keeping the truncation.
    pub fn map_values<W>(&self, mut f: impl FnMut(&NodeLabel, &V) -> W) -> LeafMap<W> {
        LeafMap {
            truncation: self.truncation.clone(),
            vals: self.iter().map(|(l, v)| f(l, v)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lab(x: u64) -> NodeLabel {
        NodeLabel::from_u64(x).unwrap()
    }

    fn map(xs: &[(u64, u32)]) -> LeafMap<u32> {
        let leaves = xs.iter().map(|&(x, _)| lab(x)).collect();
        let vals = xs.iter().map(|&(_, v)| v).collect();
        LeafMap::new(Truncation::from_leaf_set(leaves).unwrap(), vals).unwrap()
    }

    #[test]
    fn test_length_mismatch() {
        let t = Truncation::from_leaf_set(vec![lab(2), lab(3)]).unwrap();
        assert!(LeafMap::new(t, vec![1u32]).is_err());
    }

    #[test]
    fn test_query_descent() {
        let m = map(&[(4, 10), (5, 20), (3, 30)]);

        // Descending to a leaf returns its value.
        let chain = vec![NodeLabel::root(), lab(2), lab(4), lab(8), lab(16)];
        let (found, val) = m.query(chain);
        assert_eq!(found, lab(4));
        assert_eq!(val, Some(&10));

        // Stopping above the leaves returns the deepest ancestor, no value.
        let (found, val) = m.query(vec![NodeLabel::root(), lab(2)]);
        assert_eq!(found, lab(2));
        assert_eq!(val, None);

        // Descending into an uncovered region stops at the last ancestor.
        let m2 = map(&[(4, 10), (3, 30)]);
        let (found, val) = m2.query(vec![NodeLabel::root(), lab(2), lab(5), lab(10)]);
        assert_eq!(found, lab(2));
        assert_eq!(val, None);
    }

    #[test]
    fn test_query_at() {
        let m = map(&[(4, 10), (5, 20), (3, 30)]);
        assert_eq!(m.query_at(&lab(4)), Some(&10));
        assert_eq!(m.query_at(&lab(9)), Some(&10), "descendant of a leaf");
        assert_eq!(m.query_at(&lab(13)), Some(&30));
        assert_eq!(m.query_at(&lab(2)), None, "strict ancestor of leaves");
    }

    #[test]
    fn test_slice_and_concat() {
        let m = map(&[(8, 1), (9, 2), (5, 3), (3, 4)]);
        let left = m.slice(0..2);
        assert_eq!(left.truncation().leaves(), &[lab(8), lab(9)]);
        assert_eq!(left.vals(), &[1, 2]);

        let right = m.slice(2..4);
        let back = left.concat(&right).unwrap();
        assert_eq!(back, m);

        // Out-of-order concatenation is rejected.
        assert!(right.concat(&left).is_err());
        // Overlapping halves are rejected too.
        let overlap = m.slice(1..3);
        assert!(left.concat(&overlap).is_err());
    }

    #[test]
    fn test_map_values() {
        let m = map(&[(4, 10), (5, 20)]);
        let doubled = m.map_values(|_, v| v * 2);
        assert_eq!(doubled.vals(), &[20, 40]);
        assert_eq!(doubled.truncation(), m.truncation());
    }
}
