//! Canonical tree representation (SoA) and a small construction API.
//!
//! This module provides:
//! - [`Tree`]: Immutable SoA tree storage for efficient traversal
//! - [`TreeBuilder`]: Append-only builder used by loaders and fixtures
//!
//! Nodes are addressed by [`NodeId`]; node 0 is the root. Leaves carry a
//! scalar score that is added into the output group of the owning tree.

use thiserror::Error;

use super::NodeId;

// ============================================================================
// TreeValidationError
// ============================================================================

/// Structural validation errors for [`Tree`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeValidationError {
    #[error("tree has no nodes")]
    EmptyTree,

    /// Parallel node arrays do not have the same length.
    #[error("{field} has {len} entries for {n_nodes} nodes")]
    ArrayLenMismatch {
        field: &'static str,
        len: usize,
        n_nodes: usize,
    },

    #[error("node {node} has {side} child {child} outside of {n_nodes} nodes")]
    ChildOutOfBounds {
        node: NodeId,
        side: &'static str,
        child: NodeId,
        n_nodes: usize,
    },

    #[error("node {node} references itself")]
    SelfLoop { node: NodeId },

    /// A node was reached by more than one path.
    #[error("node {node} is reachable twice")]
    DuplicateVisit { node: NodeId },

    #[error("cycle through node {node}")]
    CycleDetected { node: NodeId },

    /// A node exists in storage but is unreachable from the root.
    #[error("node {node} is unreachable")]
    UnreachableNode { node: NodeId },
}

// ============================================================================
// Tree
// ============================================================================

/// Structure-of-Arrays tree storage for efficient traversal.
///
/// Stores tree nodes in flat arrays for cache-friendly traversal.
/// Child indices are local to this tree (0 = root).
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    split_indices: Box<[u32]>,
    split_thresholds: Box<[f32]>,
    left_children: Box<[u32]>,
    right_children: Box<[u32]>,
    default_left: Box<[bool]>,
    is_leaf: Box<[bool]>,
    leaf_values: Box<[f32]>,
}

impl Tree {
    /// Create a new tree from parallel arrays.
    ///
    /// Lengths are not checked here; call [`Tree::validate`] on anything that
    /// did not come from a [`TreeBuilder`].
    pub fn new(
        split_indices: Vec<u32>,
        split_thresholds: Vec<f32>,
        left_children: Vec<u32>,
        right_children: Vec<u32>,
        default_left: Vec<bool>,
        is_leaf: Vec<bool>,
        leaf_values: Vec<f32>,
    ) -> Self {
        Self {
            split_indices: split_indices.into_boxed_slice(),
            split_thresholds: split_thresholds.into_boxed_slice(),
            left_children: left_children.into_boxed_slice(),
            right_children: right_children.into_boxed_slice(),
            default_left: default_left.into_boxed_slice(),
            is_leaf: is_leaf.into_boxed_slice(),
            leaf_values: leaf_values.into_boxed_slice(),
        }
    }

    /// Single-leaf tree that always yields `value`.
    pub fn constant(value: f32) -> Self {
        let mut builder = TreeBuilder::new();
        builder.add_leaf(value);
        builder.build()
    }

    /// Number of nodes in this tree.
    #[inline]
    pub fn n_nodes(&self) -> usize {
        self.is_leaf.len()
    }

    /// Check if a node is a leaf.
    #[inline]
    pub fn is_leaf(&self, node_idx: NodeId) -> bool {
        self.is_leaf[node_idx as usize]
    }

    /// Get split feature index for a node.
    #[inline]
    pub fn split_index(&self, node_idx: NodeId) -> u32 {
        self.split_indices[node_idx as usize]
    }

    /// Get split threshold for a node.
    #[inline]
    pub fn split_threshold(&self, node_idx: NodeId) -> f32 {
        self.split_thresholds[node_idx as usize]
    }

    /// Get left child index.
    #[inline]
    pub fn left_child(&self, node_idx: NodeId) -> NodeId {
        self.left_children[node_idx as usize]
    }

    /// Get right child index.
    #[inline]
    pub fn right_child(&self, node_idx: NodeId) -> NodeId {
        self.right_children[node_idx as usize]
    }

    /// Get default direction for missing values.
    #[inline]
    pub fn default_left(&self, node_idx: NodeId) -> bool {
        self.default_left[node_idx as usize]
    }

    /// Get leaf value for a node.
    #[inline]
    pub fn leaf_value(&self, node_idx: NodeId) -> f32 {
        self.leaf_values[node_idx as usize]
    }

    /// Highest feature index referenced by any split, if the tree has splits.
    pub fn max_split_index(&self) -> Option<u32> {
        self.split_indices
            .iter()
            .zip(self.is_leaf.iter())
            .filter(|&(_, &leaf)| !leaf)
            .map(|(&idx, _)| idx)
            .max()
    }

    // Raw array access for the storage layer.

    pub(crate) fn split_indices(&self) -> &[u32] {
        &self.split_indices
    }

    pub(crate) fn split_thresholds(&self) -> &[f32] {
        &self.split_thresholds
    }

    pub(crate) fn left_children(&self) -> &[u32] {
        &self.left_children
    }

    pub(crate) fn right_children(&self) -> &[u32] {
        &self.right_children
    }

    pub(crate) fn default_left_flags(&self) -> &[bool] {
        &self.default_left
    }

    pub(crate) fn leaf_flags(&self) -> &[bool] {
        &self.is_leaf
    }

    pub(crate) fn leaf_values(&self) -> &[f32] {
        &self.leaf_values
    }

    /// Traverse the tree to find the leaf index for given features.
    ///
    /// Features beyond the end of the row are treated as missing.
    pub fn traverse_to_leaf(&self, features: &[f32]) -> NodeId {
        let mut idx: NodeId = 0;

        while !self.is_leaf(idx) {
            let feat_idx = self.split_index(idx) as usize;
            let fvalue = features.get(feat_idx).copied().unwrap_or(f32::NAN);

            idx = if fvalue.is_nan() {
                if self.default_left(idx) {
                    self.left_child(idx)
                } else {
                    self.right_child(idx)
                }
            } else if fvalue < self.split_threshold(idx) {
                self.left_child(idx)
            } else {
                self.right_child(idx)
            };
        }

        idx
    }

    /// Traverse the tree and return the leaf value for given features.
    #[inline]
    pub fn predict_row(&self, features: &[f32]) -> f32 {
        self.leaf_value(self.traverse_to_leaf(features))
    }

    /// Validate basic structural invariants for this tree.
    ///
    /// Loaded trees must pass this before traversal, since traversal indexes
    /// the node arrays without bounds recovery.
    pub fn validate(&self) -> Result<(), TreeValidationError> {
        let n_nodes = self.n_nodes();
        if n_nodes == 0 {
            return Err(TreeValidationError::EmptyTree);
        }

        let lens = [
            ("split_indices", self.split_indices.len()),
            ("split_thresholds", self.split_thresholds.len()),
            ("left_children", self.left_children.len()),
            ("right_children", self.right_children.len()),
            ("default_left", self.default_left.len()),
            ("leaf_values", self.leaf_values.len()),
        ];
        for (field, len) in lens {
            if len != n_nodes {
                return Err(TreeValidationError::ArrayLenMismatch {
                    field,
                    len,
                    n_nodes,
                });
            }
        }

        // Iterative DFS with color marking.
        // 0 = unvisited, 1 = visiting, 2 = done
        let mut color = vec![0u8; n_nodes];
        let mut stack: Vec<(NodeId, u8)> = vec![(0, 0)];

        while let Some((node, phase)) = stack.pop() {
            let node_usize = node as usize;

            match phase {
                0 => {
                    match color[node_usize] {
                        0 => {}
                        1 => return Err(TreeValidationError::CycleDetected { node }),
                        _ => return Err(TreeValidationError::DuplicateVisit { node }),
                    }

                    color[node_usize] = 1;
                    stack.push((node, 1));

                    if !self.is_leaf(node) {
                        let left = self.left_child(node);
                        let right = self.right_child(node);

                        if left == node || right == node {
                            return Err(TreeValidationError::SelfLoop { node });
                        }
                        for (side, child) in [("left", left), ("right", right)] {
                            if child as usize >= n_nodes {
                                return Err(TreeValidationError::ChildOutOfBounds {
                                    node,
                                    side,
                                    child,
                                    n_nodes,
                                });
                            }
                        }

                        stack.push((right, 0));
                        stack.push((left, 0));
                    }
                }
                _ => {
                    color[node_usize] = 2;
                }
            }
        }

        if let Some(i) = color.iter().position(|&c| c == 0) {
            return Err(TreeValidationError::UnreachableNode { node: i as u32 });
        }

        Ok(())
    }
}

// ============================================================================
// TreeBuilder
// ============================================================================

/// Append-only tree builder.
///
/// Nodes are numbered in insertion order, so callers add the root first and
/// refer to children by the indices they will receive.
#[derive(Debug, Clone, Default)]
pub struct TreeBuilder {
    split_indices: Vec<u32>,
    split_thresholds: Vec<f32>,
    left_children: Vec<u32>,
    right_children: Vec<u32>,
    default_left: Vec<bool>,
    is_leaf: Vec<bool>,
    leaf_values: Vec<f32>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a split node. Returns the node index.
    pub fn add_split(
        &mut self,
        feature_index: u32,
        threshold: f32,
        default_left: bool,
        left_child: NodeId,
        right_child: NodeId,
    ) -> NodeId {
        let idx = self.split_indices.len() as NodeId;
        self.split_indices.push(feature_index);
        self.split_thresholds.push(threshold);
        self.left_children.push(left_child);
        self.right_children.push(right_child);
        self.default_left.push(default_left);
        self.is_leaf.push(false);
        self.leaf_values.push(0.0);
        idx
    }

    /// Add a leaf node. Returns the node index.
    pub fn add_leaf(&mut self, value: f32) -> NodeId {
        let idx = self.split_indices.len() as NodeId;
        self.split_indices.push(0);
        self.split_thresholds.push(0.0);
        self.left_children.push(0);
        self.right_children.push(0);
        self.default_left.push(false);
        self.is_leaf.push(true);
        self.leaf_values.push(value);
        idx
    }

    /// Build the tree storage.
    pub fn build(self) -> Tree {
        Tree::new(
            self.split_indices,
            self.split_thresholds,
            self.left_children,
            self.right_children,
            self.default_left,
            self.is_leaf,
            self.leaf_values,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a simple tree:
    ///        [0] feat0 < 0.5
    ///        /          \
    ///    [1] leaf=1.0   [2] feat1 < 0.3
    ///                    /          \
    ///               [3] leaf=2.0   [4] leaf=3.0
    fn build_test_tree() -> Tree {
        let mut builder = TreeBuilder::new();
        builder.add_split(0, 0.5, true, 1, 2);
        builder.add_leaf(1.0);
        builder.add_split(1, 0.3, false, 3, 4);
        builder.add_leaf(2.0);
        builder.add_leaf(3.0);
        builder.build()
    }

    #[test]
    fn traversal_follows_thresholds() {
        let tree = build_test_tree();
        assert_eq!(tree.predict_row(&[0.2, 0.9]), 1.0);
        assert_eq!(tree.predict_row(&[0.7, 0.1]), 2.0);
        assert_eq!(tree.predict_row(&[0.7, 0.3]), 3.0);
    }

    #[test]
    fn missing_values_use_default_direction() {
        let tree = build_test_tree();
        // Root defaults left.
        assert_eq!(tree.predict_row(&[f32::NAN, 0.0]), 1.0);
        // Node 2 defaults right; feature 1 is absent from the row.
        assert_eq!(tree.predict_row(&[0.9]), 3.0);
    }

    #[test]
    fn valid_tree_passes() {
        assert_eq!(build_test_tree().validate(), Ok(()));
        assert_eq!(Tree::constant(4.0).validate(), Ok(()));
    }

    #[test]
    fn empty_tree_rejected() {
        let tree = TreeBuilder::new().build();
        assert_eq!(tree.validate(), Err(TreeValidationError::EmptyTree));
    }

    #[test]
    fn out_of_bounds_child_rejected() {
        let mut builder = TreeBuilder::new();
        builder.add_split(0, 0.5, true, 1, 7);
        builder.add_leaf(1.0);
        let err = builder.build().validate().unwrap_err();
        assert!(matches!(
            err,
            TreeValidationError::ChildOutOfBounds { side: "right", child: 7, .. }
        ));
    }

    #[test]
    fn self_loop_rejected() {
        let mut builder = TreeBuilder::new();
        builder.add_split(0, 0.5, true, 0, 1);
        builder.add_leaf(1.0);
        assert_eq!(
            builder.build().validate(),
            Err(TreeValidationError::SelfLoop { node: 0 })
        );
    }

    #[test]
    fn shared_child_rejected() {
        let mut builder = TreeBuilder::new();
        builder.add_split(0, 0.5, true, 1, 1);
        builder.add_leaf(1.0);
        assert_eq!(
            builder.build().validate(),
            Err(TreeValidationError::DuplicateVisit { node: 1 })
        );
    }

    #[test]
    fn unreachable_node_rejected() {
        let mut builder = TreeBuilder::new();
        builder.add_split(0, 0.5, true, 1, 2);
        builder.add_leaf(1.0);
        builder.add_leaf(2.0);
        builder.add_leaf(3.0);
        assert_eq!(
            builder.build().validate(),
            Err(TreeValidationError::UnreachableNode { node: 3 })
        );
    }

    #[test]
    fn mismatched_arrays_rejected() {
        let tree = Tree::new(
            vec![0],
            vec![0.0],
            vec![0],
            vec![0],
            vec![false],
            vec![true],
            vec![],
        );
        assert!(matches!(
            tree.validate(),
            Err(TreeValidationError::ArrayLenMismatch { field: "leaf_values", .. })
        ));
    }

    #[test]
    fn max_split_index_ignores_leaves() {
        let tree = build_test_tree();
        assert_eq!(tree.max_split_index(), Some(1));
        assert_eq!(Tree::constant(0.0).max_split_index(), None);
    }
}
