//! Request and response bodies.

use serde::{Deserialize, Serialize};

/// Message reported by `GET /`.
pub const STATUS_ONLINE: &str = "API en ligne";

/// Body of `GET /`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub model_loaded: bool,
}

impl StatusResponse {
    pub fn online(model_loaded: bool) -> Self {
        Self {
            status: STATUS_ONLINE.to_owned(),
            model_loaded,
        }
    }
}

/// Body of `POST /predict`: one flattened 8x8 image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub data: Vec<f64>,
}

/// Predicted class label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub prediction: i64,
}

/// Error body shared by all failing responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}
