//! Canonical tree-ensemble representation used for inference.

/// Canonical node identifier.
///
/// Internally this is just an index into the tree's SoA arrays.
pub type NodeId = u32;

pub mod forest;
pub mod tree;

pub use forest::{Forest, ForestValidationError};
pub use tree::{Tree, TreeBuilder, TreeValidationError};
