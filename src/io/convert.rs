//! Conversion between runtime classifiers and stored payloads.
//!
//! ```ignore
//! let bytes = classifier.to_bytes()?;
//! let restored = ForestClassifier::from_bytes(&bytes)?;
//! ```

use std::path::Path;

use crate::io::native::{self, DeserializeError, ModelType, SerializeError};
use crate::io::payload::{ForestPayload, ModelMetadata, Payload, PayloadV1, TreePayload};
use crate::model::{ForestClassifier, ModelMeta, TaskKind};
use crate::repr::{Forest, Tree};

// ============================================================================
// Classifier Serialization API
// ============================================================================

impl ForestClassifier {
    /// Serialize the classifier to bytes, header included.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SerializeError> {
        let payload = Payload::from_classifier(self);
        native::encode(
            ModelType::ForestClassifier,
            payload.num_features(),
            payload.num_groups(),
            &payload,
        )
    }

    /// Deserialize and validate a classifier from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DeserializeError> {
        let (header, payload): (_, Payload) = native::decode(bytes)?;

        if header.num_features != payload.num_features() || header.num_groups != payload.num_groups() {
            return Err(DeserializeError::CorruptPayload(format!(
                "header describes {}x{} model, payload {}x{}",
                header.num_features,
                header.num_groups,
                payload.num_features(),
                payload.num_groups()
            )));
        }

        payload.into_classifier()
    }

    /// Save the classifier to a file in native `.bstr` format.
    ///
    /// ```ignore
    /// classifier.save("model.bstr")?;
    /// ```
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SerializeError> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Load a classifier from a file in native `.bstr` format.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DeserializeError> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }
}

// ============================================================================
// Classifier <-> Payload
// ============================================================================

impl Payload {
    /// Create a payload from a classifier.
    pub fn from_classifier(model: &ForestClassifier) -> Self {
        let forest = model.forest();

        let metadata = ModelMetadata {
            num_features: model.meta().n_features as u32,
            classes: model.classes().to_vec(),
            output_transform: model.transform(),
            feature_names: model.meta().feature_names.clone(),
            attributes: Vec::new(),
        };

        let forest_payload = ForestPayload {
            num_groups: forest.n_groups(),
            base_scores: forest.base_score().to_vec(),
            tree_groups: forest.tree_groups().to_vec(),
            trees: forest.trees().map(tree_to_payload).collect(),
        };

        Payload::V1(PayloadV1 {
            metadata,
            forest: forest_payload,
        })
    }

    /// Convert the payload into a validated classifier.
    pub fn into_classifier(self) -> Result<ForestClassifier, DeserializeError> {
        let Payload::V1(v1) = self;
        let PayloadV1 { metadata, forest } = v1;

        let n_classes = metadata.classes.len();
        if n_classes < 2 {
            return Err(DeserializeError::CorruptPayload(format!(
                "classifier needs at least 2 classes, found {n_classes}"
            )));
        }

        let meta = ModelMeta {
            n_features: metadata.num_features as usize,
            task: TaskKind::for_classes(n_classes),
            feature_names: metadata.feature_names,
        };

        let trees = forest.trees.into_iter().map(payload_to_tree).collect();
        let forest = Forest::from_parts(trees, forest.tree_groups, forest.num_groups, forest.base_scores);

        Ok(ForestClassifier::new(
            forest,
            meta,
            metadata.output_transform,
            metadata.classes,
        )?)
    }
}

fn tree_to_payload(tree: &Tree) -> TreePayload {
    TreePayload {
        split_indices: tree.split_indices().to_vec(),
        thresholds: tree.split_thresholds().to_vec(),
        children_left: tree.left_children().to_vec(),
        children_right: tree.right_children().to_vec(),
        default_left: tree.default_left_flags().to_vec(),
        is_leaf: tree.leaf_flags().to_vec(),
        leaf_values: tree.leaf_values().to_vec(),
    }
}

fn payload_to_tree(payload: TreePayload) -> Tree {
    Tree::new(
        payload.split_indices,
        payload.thresholds,
        payload.children_left,
        payload.children_right,
        payload.default_left,
        payload.is_leaf,
        payload.leaf_values,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::native::FormatHeader;
    use crate::model::ModelError;
    use crate::testing;
    use ndarray::Array2;

    #[test]
    fn classifier_survives_storage() {
        let model = testing::digits_classifier();
        let bytes = model.to_bytes().unwrap();
        let restored = ForestClassifier::from_bytes(&bytes).unwrap();

        assert_eq!(restored, model);
    }

    #[test]
    fn header_mirrors_payload_shape() {
        let bytes = testing::digits_classifier().to_bytes().unwrap();
        let header = FormatHeader::parse(&bytes).unwrap();

        assert_eq!(header.model_type, ModelType::ForestClassifier);
        assert_eq!(header.num_features, 64);
        assert_eq!(header.num_groups, 10);
    }

    #[test]
    fn restored_model_predicts_like_original() {
        let model = testing::digits_classifier();
        let restored = ForestClassifier::from_bytes(&model.to_bytes().unwrap()).unwrap();

        let features = Array2::from_shape_fn((10, 64), |(r, c)| ((r * 7 + c) % 17) as f32);
        assert_eq!(
            restored.predict(features.view()).unwrap(),
            model.predict(features.view()).unwrap()
        );
    }

    #[test]
    fn header_payload_disagreement_is_corrupt() {
        let model = testing::digits_classifier();
        let payload = Payload::from_classifier(&model);
        let bytes =
            native::encode(ModelType::ForestClassifier, 32, payload.num_groups(), &payload).unwrap();

        assert!(matches!(
            ForestClassifier::from_bytes(&bytes),
            Err(DeserializeError::CorruptPayload(_))
        ));
    }

    #[test]
    fn structurally_broken_payload_is_invalid() {
        let model = testing::digits_classifier();
        let mut payload = Payload::from_classifier(&model);
        let Payload::V1(v1) = &mut payload;
        v1.forest.trees[0].children_left[0] = 10_000;

        assert!(matches!(
            payload.into_classifier(),
            Err(DeserializeError::InvalidModel(ModelError::InvalidForest(_)))
        ));
    }

    #[test]
    fn single_class_payload_is_corrupt() {
        let model = testing::digits_classifier();
        let mut payload = Payload::from_classifier(&model);
        let Payload::V1(v1) = &mut payload;
        v1.metadata.classes = vec![0];

        assert!(matches!(
            payload.into_classifier(),
            Err(DeserializeError::CorruptPayload(_))
        ));
    }

    #[test]
    fn garbage_is_not_a_model() {
        assert!(matches!(
            ForestClassifier::from_bytes(&[0x80; 64]),
            Err(DeserializeError::NotAModel)
        ));
    }
}
