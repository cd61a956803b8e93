//! Axis-aligned boxes
//!
//! The only geometry the estimator needs: rectangles with per-axis widths,
//! midpoint splits, hulls and containment. Degenerate boxes (zero width on
//! some axis) are allowed so that single points can seed bounding-box folds;
//! spatial trees reject them at construction.

use std::fmt;

use histree_core::{Error, Result};

/// An axis-aligned box given by its lower and upper corners.
#[derive(Debug, Clone, PartialEq)]
pub struct Rectangle {
    low: Vec<f64>,
    high: Vec<f64>,
}

impl Rectangle {
    /// Create a box from its corners.
    ///
    /// Corners must be finite, of equal positive dimension, and satisfy
    /// `low[i] <= high[i]` on every axis. Zero widths are permitted.
    pub fn new(low: Vec<f64>, high: Vec<f64>) -> Result<Self> {
        if low.is_empty() {
            return Err(Error::InvalidInput(
                "a box needs at least one axis".to_string(),
            ));
        }
        if low.len() != high.len() {
            return Err(Error::size_mismatch(low.len(), high.len(), "box corners"));
        }
        if low.iter().chain(high.iter()).any(|x| !x.is_finite()) {
            return Err(Error::non_finite("box corners"));
        }
        for (axis, (&l, &h)) in low.iter().zip(high.iter()).enumerate() {
            if l > h {
                return Err(Error::InvalidInput(format!(
                    "box is inverted on axis {axis}: {l} > {h}"
                )));
            }
        }
        Ok(Rectangle { low, high })
    }

    /// The degenerate box containing exactly one point; its volume is 0.
    pub fn point(x: &[f64]) -> Result<Self> {
        Rectangle::new(x.to_vec(), x.to_vec())
    }

    /// Number of axes.
    pub fn dimension(&self) -> usize {
        self.low.len()
    }

    /// Lower corner.
    pub fn low(&self) -> &[f64] {
        &self.low
    }

    /// Upper corner.
    pub fn high(&self) -> &[f64] {
        &self.high
    }

    /// Width along one axis.
    pub fn width(&self, axis: usize) -> f64 {
        self.high[axis] - self.low[axis]
    }

    /// Widths along all axes.
    pub fn widths(&self) -> Vec<f64> {
        self.low
            .iter()
            .zip(self.high.iter())
            .map(|(l, h)| h - l)
            .collect()
    }

    /// Product of all widths.
    pub fn volume(&self) -> f64 {
        self.low
            .iter()
            .zip(self.high.iter())
            .map(|(l, h)| h - l)
            .product()
    }

    /// The centre point.
    pub fn centre(&self) -> Vec<f64> {
        self.low
            .iter()
            .zip(self.high.iter())
            .map(|(l, h)| 0.5 * (l + h))
            .collect()
    }

    /// Midpoint along one axis.
    pub fn mid(&self, axis: usize) -> f64 {
        0.5 * (self.low[axis] + self.high[axis])
    }

    /// Whether the point lies in the box (boundaries included).
    pub fn contains(&self, point: &[f64]) -> bool {
        point.len() == self.dimension()
            && point
                .iter()
                .zip(self.low.iter().zip(self.high.iter()))
                .all(|(&x, (&l, &h))| l <= x && x <= h)
    }

    /// The axis of greatest width; ties go to the lowest index.
    pub fn widest_axis(&self) -> usize {
        let mut best = 0;
        let mut best_width = self.width(0);
        for axis in 1..self.dimension() {
            let w = self.width(axis);
            if w > best_width {
                best = axis;
                best_width = w;
            }
        }
        best
    }

    /// Lower half after a midpoint split along `axis`.
    pub fn split_left(&self, axis: usize) -> Rectangle {
        let mut high = self.high.clone();
        high[axis] = self.mid(axis);
        Rectangle {
            low: self.low.clone(),
            high,
        }
    }

    /// Upper half after a midpoint split along `axis`.
    pub fn split_right(&self, axis: usize) -> Rectangle {
        let mut low = self.low.clone();
        low[axis] = self.mid(axis);
        Rectangle {
            low,
            high: self.high.clone(),
        }
    }

    /// Smallest box containing both operands.
    pub fn hull(&self, other: &Rectangle) -> Rectangle {
        Rectangle {
            low: self
                .low
                .iter()
                .zip(other.low.iter())
                .map(|(a, b)| a.min(*b))
                .collect(),
            high: self
                .high
                .iter()
                .zip(other.high.iter())
                .map(|(a, b)| a.max(*b))
                .collect(),
        }
    }

    /// The box projected onto a subset of axes.
    pub fn project(&self, axes: &[usize]) -> Rectangle {
        Rectangle {
            low: axes.iter().map(|&a| self.low[a]).collect(),
            high: axes.iter().map(|&a| self.high[a]).collect(),
        }
    }
}

impl fmt::Display for Rectangle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rectangle(")?;
        for (i, (l, h)) in self.low.iter().zip(self.high.iter()).enumerate() {
            if i > 0 {
                write!(f, " x ")?;
            }
            write!(f, "[{l}, {h}]")?;
        }
        write!(f, ")")
    }
}
