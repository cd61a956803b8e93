//! Discrete structures for adaptively refined binary partitions
//!
//! This crate provides the address algebra underneath the histree density
//! estimation stack. Nodes of the infinite binary partition tree are
//! identified by integer path labels instead of allocated tree nodes, finite
//! subtrees are represented by their leaf antichains, and per-leaf data rides
//! in vectors parallel to those antichains.
//!
//! # Key pieces
//!
//! - [`NodeLabel`]: arbitrary-precision path address with parent/child,
//!   ancestry, ordering and join, all as bit manipulation
//! - [`Truncation`]: sorted antichain of labels with contiguous subtree
//!   ranges, cherry detection and minimal completion
//! - [`LeafMap`]: a truncation with one value per leaf, supporting descent
//!   queries, slicing and concatenation
//! - [`Error`]/[`Result`]: the unified error type shared by all histree
//!   crates
//!
//! # Example
//!
//! ```rust
//! use histree_core::{LeafMap, NodeLabel, Truncation};
//!
//! let leaves = vec![
//!     NodeLabel::from_u64(4).unwrap(),
//!     NodeLabel::from_u64(5).unwrap(),
//!     NodeLabel::from_u64(3).unwrap(),
//! ];
//! let truncation = Truncation::from_leaf_set(leaves).unwrap();
//! let counts = LeafMap::new(truncation, vec![7u64, 2, 11]).unwrap();
//!
//! // Descendants of node 2 occupy one contiguous range of leaves.
//! let range = counts.truncation().subtree(&NodeLabel::from_u64(2).unwrap());
//! assert_eq!(counts.vals()[range].iter().sum::<u64>(), 9);
//! ```

pub mod error;
pub mod label;
pub mod leafmap;
pub mod truncation;

pub use error::{Error, Result};
pub use label::{NodeLabel, Side};
pub use leafmap::LeafMap;
pub use truncation::Truncation;
