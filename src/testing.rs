//! Testing utilities for digits-api.
//!
//! Fixture predictors and models shared by unit tests and the integration
//! tests under `tests/`.
//!
//! ```ignore
//! use digits_api::testing::{digit_image, digits_classifier};
//!
//! let model = digits_classifier();
//! let row = digit_image(3);
//! ```

use ndarray::{Array1, ArrayView2};

use crate::model::{ForestClassifier, ModelMeta, OutputTransform, PredictError, Predictor};
use crate::repr::{Forest, TreeBuilder};

// =============================================================================
// Constants
// =============================================================================

/// Number of pixels in an 8x8 digit image.
pub const DIGIT_FEATURES: usize = 64;

/// Number of digit classes.
pub const DIGIT_CLASSES: usize = 10;

/// Pixel intensity of a lit pixel in [`digit_image`].
pub const LIT_PIXEL: f64 = 16.0;

// =============================================================================
// Fixture Predictors
// =============================================================================

/// Predictor that returns the same label for every row.
#[derive(Debug, Clone)]
pub struct ConstantPredictor {
    n_features: usize,
    label: i64,
}

impl ConstantPredictor {
    pub fn new(n_features: usize, label: i64) -> Self {
        Self { n_features, label }
    }
}

impl Predictor for ConstantPredictor {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict(&self, features: ArrayView2<'_, f32>) -> Result<Array1<i64>, PredictError> {
        if features.ncols() != self.n_features {
            return Err(PredictError::FeatureCountMismatch {
                expected: self.n_features,
                actual: features.ncols(),
            });
        }
        Ok(Array1::from_elem(features.nrows(), self.label))
    }
}

/// Predictor that fails every call with a fixed message.
#[derive(Debug, Clone)]
pub struct FailingPredictor {
    n_features: usize,
    message: String,
}

impl FailingPredictor {
    pub fn new(n_features: usize, message: impl Into<String>) -> Self {
        Self {
            n_features,
            message: message.into(),
        }
    }
}

impl Predictor for FailingPredictor {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict(&self, _features: ArrayView2<'_, f32>) -> Result<Array1<i64>, PredictError> {
        Err(PredictError::Backend(self.message.clone()))
    }
}

/// Predictor that returns no labels at all.
#[derive(Debug, Clone)]
pub struct EmptyPredictor {
    n_features: usize,
}

impl EmptyPredictor {
    pub fn new(n_features: usize) -> Self {
        Self { n_features }
    }
}

impl Predictor for EmptyPredictor {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict(&self, _features: ArrayView2<'_, f32>) -> Result<Array1<i64>, PredictError> {
        Ok(Array1::from_vec(Vec::new()))
    }
}

// =============================================================================
// Fixture Models
// =============================================================================

/// Pixel that votes for `class` in [`digits_classifier`].
pub fn class_pixel(class: usize) -> usize {
    class * 6
}

/// Ten-class forest over 64 pixels.
///
/// Class `k` owns one tree: a lit pixel [`class_pixel(k)`](class_pixel)
/// scores 2.0 for `k`, or 3.0 when the next pixel is lit too. Class 0 carries
/// a small base score so a blank image predicts 0.
pub fn digits_classifier() -> ForestClassifier {
    let mut base_score = vec![0.0; DIGIT_CLASSES];
    base_score[0] = 0.1;

    let mut forest = Forest::new(DIGIT_CLASSES as u32).with_base_score(base_score);
    for class in 0..DIGIT_CLASSES {
        let pixel = class_pixel(class) as u32;

        let mut builder = TreeBuilder::new();
        builder.add_split(pixel, 8.0, true, 1, 2);
        builder.add_leaf(0.0);
        builder.add_split(pixel + 1, 8.0, true, 3, 4);
        builder.add_leaf(2.0);
        builder.add_leaf(3.0);

        forest.push_tree(builder.build(), class as u32);
    }

    let meta = ModelMeta::for_multiclass(DIGIT_FEATURES, DIGIT_CLASSES);
    match ForestClassifier::with_index_labels(forest, meta, OutputTransform::Softmax) {
        Ok(model) => model,
        Err(e) => panic!("digits fixture is invalid: {e}"),
    }
}

/// [`digits_classifier`] in native `.bstr` form.
pub fn digits_classifier_bytes() -> Vec<u8> {
    match digits_classifier().to_bytes() {
        Ok(bytes) => bytes,
        Err(e) => panic!("digits fixture does not serialize: {e}"),
    }
}

/// A 64-pixel image that [`digits_classifier`] labels as `class`.
pub fn digit_image(class: usize) -> Vec<f64> {
    let mut pixels = vec![0.0; DIGIT_FEATURES];
    pixels[class_pixel(class)] = LIT_PIXEL;
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn as_row(pixels: &[f64]) -> Array2<f32> {
        Array2::from_shape_vec((1, pixels.len()), pixels.iter().map(|&v| v as f32).collect())
            .unwrap()
    }

    #[test]
    fn digit_images_predict_their_class() {
        let model = digits_classifier();
        for class in 0..DIGIT_CLASSES {
            let row = as_row(&digit_image(class));
            assert_eq!(model.predict(row.view()).unwrap()[0], class as i64);
        }
    }

    #[test]
    fn blank_image_predicts_zero() {
        let model = digits_classifier();
        let row = as_row(&[0.0; DIGIT_FEATURES]);
        assert_eq!(model.predict(row.view()).unwrap()[0], 0);
    }

    #[test]
    fn constant_predictor_checks_width() {
        let predictor = ConstantPredictor::new(4, 7);
        let narrow = Array2::<f32>::zeros((1, 3));
        assert!(matches!(
            predictor.predict(narrow.view()),
            Err(PredictError::FeatureCountMismatch { expected: 4, actual: 3 })
        ));
    }
}
