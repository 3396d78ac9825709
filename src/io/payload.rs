//! Payload types stored inside the native container.
//!
//! These types provide a stable serialization layout independent of the
//! runtime types in [`crate::repr`] and [`crate::model`]. The payload is
//! versioned as an enum so later layouts can be added without breaking
//! readers of older files.

use serde::{Deserialize, Serialize};

use crate::model::OutputTransform;

/// Versioned payload envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    V1(PayloadV1),
}

/// First payload layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadV1 {
    pub metadata: ModelMetadata,
    pub forest: ForestPayload,
}

/// Model-level metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Number of input features.
    pub num_features: u32,
    /// Class labels in class-index order.
    pub classes: Vec<i64>,
    /// Output transform for probability outputs.
    pub output_transform: OutputTransform,
    /// Feature names (optional).
    pub feature_names: Option<Vec<String>>,
    /// Free-form key/value attributes (training run, library version, ...).
    pub attributes: Vec<(String, String)>,
}

/// Forest layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestPayload {
    /// Number of output groups.
    pub num_groups: u32,
    /// Base score per group.
    pub base_scores: Vec<f32>,
    /// Output group of each tree.
    pub tree_groups: Vec<u32>,
    /// Trees in iteration order.
    pub trees: Vec<TreePayload>,
}

/// Tree layout (SoA, one entry per node).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreePayload {
    pub split_indices: Vec<u32>,
    pub thresholds: Vec<f32>,
    pub children_left: Vec<u32>,
    pub children_right: Vec<u32>,
    pub default_left: Vec<bool>,
    pub is_leaf: Vec<bool>,
    pub leaf_values: Vec<f32>,
}

impl Payload {
    /// Number of input features recorded in the payload.
    pub fn num_features(&self) -> u32 {
        match self {
            Payload::V1(v1) => v1.metadata.num_features,
        }
    }

    /// Number of output groups recorded in the payload.
    pub fn num_groups(&self) -> u32 {
        match self {
            Payload::V1(v1) => v1.forest.num_groups,
        }
    }
}
