//! Output transformation for inference.
//!
//! The [`OutputTransform`] enum defines how raw model outputs (margins)
//! are converted to class probabilities. It is persisted with the model
//! so that inference doesn't require the original training objective.

use serde::{Deserialize, Serialize};

/// Inference-time output transformation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputTransform {
    /// No transformation; output = margin.
    /// Used by forests whose leaves already hold class probabilities.
    #[default]
    Identity,

    /// Logistic sigmoid: output = 1 / (1 + exp(-margin)).
    Sigmoid,

    /// Softmax: output_i = exp(margin_i) / sum(exp(margin_j)).
    Softmax,
}

impl OutputTransform {
    /// Apply the transformation in-place to a row-major predictions buffer.
    ///
    /// `predictions` has shape `(n_rows, n_outputs)`. A trailing partial row is
    /// left untouched.
    pub fn transform_inplace(&self, predictions: &mut [f32], n_outputs: usize) {
        if n_outputs == 0 {
            return;
        }

        match self {
            OutputTransform::Identity => {}
            OutputTransform::Sigmoid => {
                for x in predictions.iter_mut() {
                    *x = sigmoid(*x);
                }
            }
            OutputTransform::Softmax => {
                for row in predictions.chunks_exact_mut(n_outputs) {
                    softmax_inplace(row);
                }
            }
        }
    }
}

/// Numerically stable sigmoid.
/// Clamps input to [-500, 500] to prevent overflow.
#[inline]
fn sigmoid(x: f32) -> f32 {
    let clamped = x.clamp(-500.0, 500.0);
    if clamped >= 0.0 {
        1.0 / (1.0 + (-clamped).exp())
    } else {
        let e = clamped.exp();
        e / (1.0 + e)
    }
}

/// Numerically stable softmax in-place.
#[inline]
fn softmax_inplace(row: &mut [f32]) {
    if row.is_empty() {
        return;
    }

    let max = row.iter().cloned().fold(f32::NEG_INFINITY, f32::max);

    let mut sum = 0.0f32;
    for x in row.iter_mut() {
        *x = (*x - max).exp();
        sum += *x;
    }

    if sum > 0.0 {
        for x in row.iter_mut() {
            *x /= sum;
        }
    }
}
