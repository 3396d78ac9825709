//! Canonical forest representation (collection of trees).

use ndarray::ArrayView2;
use thiserror::Error;

use super::tree::{Tree, TreeValidationError};

/// Structural validation errors for [`Forest`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ForestValidationError {
    #[error("forest has no trees")]
    EmptyForest,
    #[error("forest has no output groups")]
    ZeroGroups,
    #[error("base score has {len} entries for {n_groups} groups")]
    BaseScoreLenMismatch { n_groups: u32, len: usize },
    #[error("{len} tree group assignments for {n_trees} trees")]
    TreeGroupsLenMismatch { n_trees: usize, len: usize },
    #[error("tree {tree_idx} targets group {group} of {n_groups}")]
    TreeGroupOutOfRange { tree_idx: usize, group: u32, n_groups: u32 },
    #[error("tree {tree_idx}: {error}")]
    InvalidTree {
        tree_idx: usize,
        #[source]
        error: TreeValidationError,
    },
}

/// Forest of decision trees.
///
/// Stores multiple trees with their group assignments for multi-class support.
#[derive(Debug, Clone, PartialEq)]
pub struct Forest {
    trees: Vec<Tree>,
    tree_groups: Vec<u32>,
    n_groups: u32,
    base_score: Vec<f32>,
}

impl Forest {
    /// Create a new forest with the given number of groups.
    pub fn new(n_groups: u32) -> Self {
        Self {
            trees: Vec::new(),
            tree_groups: Vec::new(),
            n_groups,
            base_score: vec![0.0; n_groups as usize],
        }
    }

    /// Reassemble a forest from stored parts without checking them.
    pub(crate) fn from_parts(
        trees: Vec<Tree>,
        tree_groups: Vec<u32>,
        n_groups: u32,
        base_score: Vec<f32>,
    ) -> Self {
        Self {
            trees,
            tree_groups,
            n_groups,
            base_score,
        }
    }

    /// Set the base score for all groups.
    pub fn with_base_score(mut self, base_score: Vec<f32>) -> Self {
        debug_assert_eq!(base_score.len(), self.n_groups as usize);
        self.base_score = base_score;
        self
    }

    /// Add a tree to the forest.
    pub fn push_tree(&mut self, tree: Tree, group: u32) {
        debug_assert!(group < self.n_groups, "group out of range");
        self.trees.push(tree);
        self.tree_groups.push(group);
    }

    /// Number of trees.
    #[inline]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Number of output groups.
    #[inline]
    pub fn n_groups(&self) -> u32 {
        self.n_groups
    }

    /// Get the base score for each group.
    #[inline]
    pub fn base_score(&self) -> &[f32] {
        &self.base_score
    }

    /// Get all tree group assignments as a slice.
    #[inline]
    pub fn tree_groups(&self) -> &[u32] {
        &self.tree_groups
    }

    /// Iterate over trees.
    pub fn trees(&self) -> impl Iterator<Item = &Tree> {
        self.trees.iter()
    }

    /// Iterate over trees with their group assignments.
    pub fn trees_with_groups(&self) -> impl Iterator<Item = (&Tree, u32)> {
        self.trees
            .iter()
            .zip(self.tree_groups.iter())
            .map(|(t, &g)| (t, g))
    }

    /// Number of features the trees can address (highest split index + 1).
    pub fn min_features(&self) -> usize {
        self.trees
            .iter()
            .filter_map(Tree::max_split_index)
            .max()
            .map_or(0, |idx| idx as usize + 1)
    }

    /// Validate structural invariants for this forest (trees, group assignments, base score).
    pub fn validate(&self) -> Result<(), ForestValidationError> {
        if self.n_groups == 0 {
            return Err(ForestValidationError::ZeroGroups);
        }
        if self.trees.is_empty() {
            return Err(ForestValidationError::EmptyForest);
        }
        if self.base_score.len() != self.n_groups as usize {
            return Err(ForestValidationError::BaseScoreLenMismatch {
                n_groups: self.n_groups,
                len: self.base_score.len(),
            });
        }
        if self.tree_groups.len() != self.trees.len() {
            return Err(ForestValidationError::TreeGroupsLenMismatch {
                n_trees: self.trees.len(),
                len: self.tree_groups.len(),
            });
        }

        for (i, &g) in self.tree_groups.iter().enumerate() {
            if g >= self.n_groups {
                return Err(ForestValidationError::TreeGroupOutOfRange {
                    tree_idx: i,
                    group: g,
                    n_groups: self.n_groups,
                });
            }
        }

        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate()
                .map_err(|e| ForestValidationError::InvalidTree { tree_idx: i, error: e })?;
        }

        Ok(())
    }

    /// Batch predict into a flat row-major output buffer.
    ///
    /// # Panics
    /// Panics if `output.len() != features.nrows() * self.n_groups()`.
    pub fn predict_into(&self, features: ArrayView2<'_, f32>, output: &mut [f32]) {
        let n_rows = features.nrows();
        let n_groups = self.n_groups as usize;
        assert_eq!(
            output.len(),
            n_rows * n_groups,
            "output buffer must have length n_rows * n_groups"
        );

        for (row_idx, row) in features.outer_iter().enumerate() {
            // Rows of a standard-layout matrix are contiguous; others get copied.
            let owned;
            let values = match row.as_slice() {
                Some(values) => values,
                None => {
                    owned = row.to_vec();
                    owned.as_slice()
                }
            };

            let out = &mut output[row_idx * n_groups..(row_idx + 1) * n_groups];
            out.copy_from_slice(&self.base_score);
            for (tree, group) in self.trees_with_groups() {
                out[group as usize] += tree.predict_row(values);
            }
        }
    }
}
