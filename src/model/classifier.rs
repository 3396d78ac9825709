//! Tree-ensemble classifier.
//!
//! [`ForestClassifier`] wraps a [`Forest`] with the metadata needed to turn
//! raw per-group scores into class labels. Construction validates the whole
//! model once, so prediction only has to check the input shape.

use ndarray::{Array1, Array2, ArrayView2};
use thiserror::Error;

use super::meta::{ModelMeta, TaskKind};
use super::transform::OutputTransform;
use super::{PredictError, Predictor};
use crate::repr::{Forest, ForestValidationError};

/// A loaded model that cannot be used for inference.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The forest violates a structural invariant.
    #[error("invalid forest: {0}")]
    InvalidForest(#[from] ForestValidationError),

    /// The model declares no input features.
    #[error("model declares zero input features")]
    ZeroFeatures,

    /// Output group count of the forest disagrees with the task.
    #[error("task expects {expected} output groups, forest has {actual}")]
    GroupMismatch { expected: usize, actual: usize },

    /// Number of class labels disagrees with the task.
    #[error("task has {expected} classes, model lists {actual} labels")]
    ClassCountMismatch { expected: usize, actual: usize },

    /// The same label is used for two classes.
    #[error("class label {0} appears more than once")]
    DuplicateClassLabel(i64),

    /// A split references a feature outside of the declared feature count.
    #[error("splits reference feature {max_index} but the model declares {n_features} features")]
    FeatureOutOfRange { max_index: usize, n_features: usize },

    /// Softmax over a single output group is constant.
    #[error("softmax needs at least two output groups")]
    SoftmaxOnBinary,

    /// A leaf or base score is NaN or infinite.
    #[error("non-finite score in {location}")]
    NonFiniteScore { location: String },
}

/// Gradient-boosted or bagged tree classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct ForestClassifier {
    forest: Forest,
    meta: ModelMeta,
    transform: OutputTransform,
    classes: Vec<i64>,
}

impl ForestClassifier {
    /// Assemble and validate a classifier.
    ///
    /// `classes` maps class indices to the labels returned by [`predict`](Self::predict).
    pub fn new(
        forest: Forest,
        meta: ModelMeta,
        transform: OutputTransform,
        classes: Vec<i64>,
    ) -> Result<Self, ModelError> {
        let model = Self {
            forest,
            meta,
            transform,
            classes,
        };
        model.validate()?;
        Ok(model)
    }

    /// Assemble a classifier whose labels are the class indices `0..n_classes`.
    pub fn with_index_labels(
        forest: Forest,
        meta: ModelMeta,
        transform: OutputTransform,
    ) -> Result<Self, ModelError> {
        let classes = (0..meta.task.n_classes() as i64).collect();
        Self::new(forest, meta, transform, classes)
    }

    fn validate(&self) -> Result<(), ModelError> {
        self.forest.validate()?;

        let n_features = self.meta.n_features;
        if n_features == 0 {
            return Err(ModelError::ZeroFeatures);
        }

        let expected_groups = self.meta.task.n_groups();
        let actual_groups = self.forest.n_groups() as usize;
        if expected_groups != actual_groups {
            return Err(ModelError::GroupMismatch {
                expected: expected_groups,
                actual: actual_groups,
            });
        }

        if self.transform == OutputTransform::Softmax
            && self.meta.task == TaskKind::BinaryClassification
        {
            return Err(ModelError::SoftmaxOnBinary);
        }

        let n_classes = self.meta.task.n_classes();
        if self.classes.len() != n_classes {
            return Err(ModelError::ClassCountMismatch {
                expected: n_classes,
                actual: self.classes.len(),
            });
        }
        for (i, label) in self.classes.iter().enumerate() {
            if self.classes[..i].contains(label) {
                return Err(ModelError::DuplicateClassLabel(*label));
            }
        }

        let min_features = self.forest.min_features();
        if min_features > n_features {
            return Err(ModelError::FeatureOutOfRange {
                max_index: min_features - 1,
                n_features,
            });
        }

        if self.forest.base_score().iter().any(|v| !v.is_finite()) {
            return Err(ModelError::NonFiniteScore {
                location: "base score".into(),
            });
        }
        for (tree_idx, tree) in self.forest.trees().enumerate() {
            let bad_leaf = tree
                .leaf_flags()
                .iter()
                .zip(tree.leaf_values())
                .position(|(&is_leaf, v)| is_leaf && !v.is_finite());
            if let Some(node) = bad_leaf {
                return Err(ModelError::NonFiniteScore {
                    location: format!("tree {tree_idx} node {node}"),
                });
            }
        }

        Ok(())
    }

    /// Get reference to the underlying forest.
    pub fn forest(&self) -> &Forest {
        &self.forest
    }

    /// Get reference to model metadata.
    pub fn meta(&self) -> &ModelMeta {
        &self.meta
    }

    /// Output transform applied before a class is picked.
    pub fn transform(&self) -> OutputTransform {
        self.transform
    }

    /// Class labels in class-index order.
    pub fn classes(&self) -> &[i64] {
        &self.classes
    }

    /// Number of classes.
    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    fn check_shape(&self, features: &ArrayView2<'_, f32>) -> Result<(), PredictError> {
        let expected = self.meta.n_features;
        let actual = features.ncols();
        if actual != expected {
            return Err(PredictError::FeatureCountMismatch { expected, actual });
        }
        Ok(())
    }

    /// Predict raw scores, shape `(n_rows, n_groups)`.
    pub fn predict_raw(&self, features: ArrayView2<'_, f32>) -> Result<Array2<f32>, PredictError> {
        self.check_shape(&features)?;

        let n_rows = features.nrows();
        let n_groups = self.forest.n_groups() as usize;
        let mut output = vec![0.0; n_rows * n_groups];
        self.forest.predict_into(features, &mut output);

        Ok(Array2::from_shape_vec((n_rows, n_groups), output)?)
    }

    /// Predict transformed scores, shape `(n_rows, n_groups)`.
    ///
    /// For binary models the single column is the positive-class score.
    pub fn predict_proba(
        &self,
        features: ArrayView2<'_, f32>,
    ) -> Result<Array2<f32>, PredictError> {
        let mut scores = self.predict_raw(features)?;
        let n_groups = scores.ncols();
        if let Some(values) = scores.as_slice_mut() {
            self.transform.transform_inplace(values, n_groups);
        }
        Ok(scores)
    }

    /// Predict one class label per row.
    ///
    /// Binary models pick class 1 when the transformed positive-class score
    /// is above 0.5. Multiclass models pick the first highest score.
    pub fn predict(&self, features: ArrayView2<'_, f32>) -> Result<Array1<i64>, PredictError> {
        let scores = self.predict_proba(features)?;

        let labels = scores
            .outer_iter()
            .map(|row| {
                let class_idx = match self.meta.task {
                    TaskKind::BinaryClassification => usize::from(row[0] > 0.5),
                    TaskKind::MulticlassClassification { .. } => argmax(row.iter().copied()),
                };
                self.classes[class_idx]
            })
            .collect();

        Ok(labels)
    }
}

impl Predictor for ForestClassifier {
    fn n_features(&self) -> usize {
        self.meta.n_features
    }

    fn predict(&self, features: ArrayView2<'_, f32>) -> Result<Array1<i64>, PredictError> {
        ForestClassifier::predict(self, features)
    }
}

/// Index of the first maximum value.
fn argmax(values: impl Iterator<Item = f32>) -> usize {
    let mut best_idx = 0;
    let mut best = f32::NEG_INFINITY;
    for (idx, value) in values.enumerate() {
        if value > best {
            best = value;
            best_idx = idx;
        }
    }
    best_idx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repr::{Tree, TreeBuilder};
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn stump(feature: u32, threshold: f32, left: f32, right: f32) -> Tree {
        let mut builder = TreeBuilder::new();
        builder.add_split(feature, threshold, true, 1, 2);
        builder.add_leaf(left);
        builder.add_leaf(right);
        builder.build()
    }

    fn binary_model() -> ForestClassifier {
        let mut forest = Forest::new(1);
        forest.push_tree(stump(0, 0.5, -2.0, 2.0), 0);
        ForestClassifier::with_index_labels(
            forest,
            ModelMeta::for_binary_classification(2),
            OutputTransform::Sigmoid,
        )
        .unwrap()
    }

    fn three_class_model() -> ForestClassifier {
        let mut forest = Forest::new(3);
        forest.push_tree(stump(0, 0.5, 1.0, 0.0), 0);
        forest.push_tree(stump(1, 0.5, 0.0, 1.0), 1);
        forest.push_tree(stump(0, 0.5, 0.0, 0.5), 2);
        ForestClassifier::new(
            forest,
            ModelMeta::for_multiclass(2, 3),
            OutputTransform::Softmax,
            vec![10, 20, 30],
        )
        .unwrap()
    }

    #[test]
    fn binary_predicts_on_margin_sign() {
        let model = binary_model();
        let labels = model.predict(array![[0.1f32, 0.0], [0.9, 0.0]].view()).unwrap();
        assert_eq!(labels.to_vec(), vec![0, 1]);
    }

    #[test]
    fn binary_identity_compares_probability_with_half() {
        let identity_model = |p: f32| {
            let mut forest = Forest::new(1);
            forest.push_tree(Tree::constant(p), 0);
            ForestClassifier::with_index_labels(
                forest,
                ModelMeta::for_binary_classification(1),
                OutputTransform::Identity,
            )
            .unwrap()
        };
        let row = array![[0.0f32]];

        assert_eq!(identity_model(0.2).predict(row.view()).unwrap()[0], 0);
        assert_eq!(identity_model(0.5).predict(row.view()).unwrap()[0], 0);
        assert_eq!(identity_model(0.7).predict(row.view()).unwrap()[0], 1);
    }

    #[test]
    fn binary_sigmoid_zero_margin_is_negative() {
        let mut forest = Forest::new(1);
        forest.push_tree(Tree::constant(0.0), 0);
        let model = ForestClassifier::with_index_labels(
            forest,
            ModelMeta::for_binary_classification(1),
            OutputTransform::Sigmoid,
        )
        .unwrap();
        assert_eq!(model.predict(array![[0.0f32]].view()).unwrap()[0], 0);
    }

    #[test]
    fn binary_softmax_is_rejected() {
        let mut forest = Forest::new(1);
        forest.push_tree(Tree::constant(0.0), 0);
        let err = ForestClassifier::with_index_labels(
            forest,
            ModelMeta::for_binary_classification(1),
            OutputTransform::Softmax,
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::SoftmaxOnBinary));
    }

    #[test]
    fn binary_proba_applies_sigmoid() {
        let model = binary_model();
        let proba = model.predict_proba(array![[0.1f32, 0.0]].view()).unwrap();
        assert_abs_diff_eq!(proba[[0, 0]], 0.119_202_92, epsilon = 1e-5);
    }

    #[test]
    fn multiclass_maps_argmax_to_labels() {
        let model = three_class_model();
        let features = array![[0.1f32, 0.1], [0.9, 0.9], [0.9, 0.1]];
        let labels = model.predict(features.view()).unwrap();
        assert_eq!(labels.to_vec(), vec![10, 20, 30]);
    }

    #[test]
    fn multiclass_ties_pick_lowest_index() {
        let mut forest = Forest::new(3);
        forest.push_tree(Tree::constant(1.0), 0);
        forest.push_tree(Tree::constant(1.0), 1);
        forest.push_tree(Tree::constant(1.0), 2);
        let model = ForestClassifier::with_index_labels(
            forest,
            ModelMeta::for_multiclass(1, 3),
            OutputTransform::Identity,
        )
        .unwrap();
        assert_eq!(model.predict(array![[0.0f32]].view()).unwrap()[0], 0);
    }

    #[test]
    fn proba_rows_sum_to_one() {
        let model = three_class_model();
        let proba = model.predict_proba(array![[0.3f32, 0.7]].view()).unwrap();
        assert_abs_diff_eq!(proba.row(0).sum(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn wrong_feature_count_is_rejected() {
        let model = three_class_model();
        let err = model.predict(array![[0.0f32, 0.0, 0.0]].view()).unwrap_err();
        assert!(matches!(
            err,
            PredictError::FeatureCountMismatch { expected: 2, actual: 3 }
        ));
    }

    #[test]
    fn group_mismatch_is_rejected() {
        let mut forest = Forest::new(2);
        forest.push_tree(Tree::constant(0.0), 0);
        let err = ForestClassifier::with_index_labels(
            forest,
            ModelMeta::for_multiclass(4, 3),
            OutputTransform::Identity,
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::GroupMismatch { expected: 3, actual: 2 }));
    }

    #[test]
    fn duplicate_labels_are_rejected() {
        let mut forest = Forest::new(1);
        forest.push_tree(Tree::constant(0.0), 0);
        let err = ForestClassifier::new(
            forest,
            ModelMeta::for_binary_classification(1),
            OutputTransform::Identity,
            vec![7, 7],
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::DuplicateClassLabel(7)));
    }

    #[test]
    fn out_of_range_split_is_rejected() {
        let mut forest = Forest::new(1);
        forest.push_tree(stump(5, 0.5, 0.0, 1.0), 0);
        let err = ForestClassifier::with_index_labels(
            forest,
            ModelMeta::for_binary_classification(3),
            OutputTransform::Identity,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ModelError::FeatureOutOfRange { max_index: 5, n_features: 3 }
        ));
    }

    #[test]
    fn non_finite_leaf_is_rejected() {
        let mut forest = Forest::new(1);
        forest.push_tree(stump(0, 0.5, 0.0, f32::INFINITY), 0);
        let err = ForestClassifier::with_index_labels(
            forest,
            ModelMeta::for_binary_classification(1),
            OutputTransform::Identity,
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::NonFiniteScore { .. }));
    }

    #[test]
    fn zero_features_is_rejected() {
        let mut forest = Forest::new(1);
        forest.push_tree(Tree::constant(0.0), 0);
        let err = ForestClassifier::with_index_labels(
            forest,
            ModelMeta::for_binary_classification(0),
            OutputTransform::Identity,
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::ZeroFeatures));
    }
}
