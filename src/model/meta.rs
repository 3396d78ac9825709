//! Model metadata.
//!
//! Shared metadata types for model introspection.

use serde::{Deserialize, Serialize};

/// Type of classification task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskKind {
    /// Binary classification (2 classes, one output group).
    BinaryClassification,
    /// Multi-class classification (3+ classes, one output group per class).
    MulticlassClassification {
        /// Number of classes.
        n_classes: usize,
    },
}

impl TaskKind {
    /// Pick the task kind for a given number of classes.
    pub fn for_classes(n_classes: usize) -> Self {
        if n_classes <= 2 {
            Self::BinaryClassification
        } else {
            Self::MulticlassClassification { n_classes }
        }
    }

    /// Returns the number of output groups for this task.
    pub fn n_groups(&self) -> usize {
        match self {
            Self::BinaryClassification => 1,
            Self::MulticlassClassification { n_classes } => *n_classes,
        }
    }

    /// Returns the number of classes this task distinguishes.
    pub fn n_classes(&self) -> usize {
        match self {
            Self::BinaryClassification => 2,
            Self::MulticlassClassification { n_classes } => *n_classes,
        }
    }
}

/// Shared metadata for a loaded classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMeta {
    /// Number of features.
    pub n_features: usize,
    /// Task type.
    pub task: TaskKind,
    /// Feature names (optional).
    pub feature_names: Option<Vec<String>>,
}

impl ModelMeta {
    /// Create metadata for binary classification.
    pub fn for_binary_classification(n_features: usize) -> Self {
        Self {
            n_features,
            task: TaskKind::BinaryClassification,
            feature_names: None,
        }
    }

    /// Create metadata for multi-class classification.
    pub fn for_multiclass(n_features: usize, n_classes: usize) -> Self {
        Self {
            n_features,
            task: TaskKind::MulticlassClassification { n_classes },
            feature_names: None,
        }
    }
}
