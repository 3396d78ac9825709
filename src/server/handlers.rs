//! Route handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use log::debug;
use ndarray::Array2;

use super::error::ApiError;
use super::types::{PredictionRequest, PredictionResponse, StatusResponse};
use super::AppState;
use crate::model::{PredictError, Predictor};

/// Number of values in a prediction request (an 8x8 image).
pub const INPUT_LEN: usize = 64;

/// `GET /`
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse::online(state.model.is_loaded()))
}

/// `POST /predict`
pub async fn predict(
    State(state): State<AppState>,
    body: Result<Json<PredictionRequest>, JsonRejection>,
) -> Result<Json<PredictionResponse>, ApiError> {
    let Json(request) = body.map_err(|rejection| ApiError::InvalidBody(rejection.body_text()))?;

    let predictor = state.model.get().ok_or(ApiError::ModelUnavailable)?;

    if request.data.len() != INPUT_LEN {
        return Err(ApiError::BadShape {
            expected: INPUT_LEN,
            actual: request.data.len(),
        });
    }

    let prediction = predict_one(predictor.as_ref(), &request.data)?;
    debug!("predicted {prediction}");
    Ok(Json(PredictionResponse { prediction }))
}

/// Fallback for unknown routes.
pub async fn not_found() -> ApiError {
    ApiError::NotFound
}

/// Run `predictor` on a single row.
pub fn predict_one(predictor: &dyn Predictor, row: &[f64]) -> Result<i64, PredictError> {
    let expected = predictor.n_features();
    if row.len() != expected {
        return Err(PredictError::FeatureCountMismatch {
            expected,
            actual: row.len(),
        });
    }

    let features = Array2::from_shape_vec((1, row.len()), row.iter().map(|&v| v as f32).collect())?;
    let labels = predictor.predict(features.view())?;
    labels.first().copied().ok_or(PredictError::EmptyOutput)
}
