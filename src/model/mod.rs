//! Inference-ready models.
//!
//! - [`Predictor`] - the capability request handlers depend on
//! - [`ForestClassifier`] - tree-ensemble implementation loaded from storage
//! - [`ModelHandle`] - set-once slot sharing the predictor across handlers

use ndarray::{Array1, ArrayView2};
use thiserror::Error;

pub mod classifier;
pub mod handle;
pub mod meta;
pub mod transform;

pub use classifier::{ForestClassifier, ModelError};
pub use handle::ModelHandle;
pub use meta::{ModelMeta, TaskKind};
pub use transform::OutputTransform;

/// Errors raised while predicting.
#[derive(Debug, Error)]
pub enum PredictError {
    /// Input matrix has the wrong number of columns.
    #[error("expected {expected} features, got {actual}")]
    FeatureCountMismatch { expected: usize, actual: usize },

    /// Input could not be arranged into a matrix.
    #[error("invalid input shape: {0}")]
    Shape(#[from] ndarray::ShapeError),

    /// The model produced no label for the input.
    #[error("model returned no prediction")]
    EmptyOutput,

    /// Failure raised by a predictor implementation.
    #[error("{0}")]
    Backend(String),
}

/// A model that maps rows of numeric features to discrete class labels.
///
/// Implementations are immutable after construction and shared between
/// concurrent request handlers.
pub trait Predictor: Send + Sync {
    /// Number of columns every input row must have.
    fn n_features(&self) -> usize;

    /// Predict one label per row of `features`.
    fn predict(&self, features: ArrayView2<'_, f32>) -> Result<Array1<i64>, PredictError>;
}
