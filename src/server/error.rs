//! Request-level errors and their HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use log::{error, warn};
use thiserror::Error;

use super::types::ErrorResponse;
use crate::model::PredictError;

/// Errors returned by request handlers. Each one only affects its own request.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No predictor has been published.
    #[error("Modèle non disponible.")]
    ModelUnavailable,

    /// Input vector has the wrong length.
    #[error("Les données d'entrée doivent contenir {expected} éléments.")]
    BadShape { expected: usize, actual: usize },

    /// Body is not a valid prediction request.
    #[error("{0}")]
    InvalidBody(String),

    /// The predictor failed.
    #[error("Erreur de prédiction : {0}")]
    Prediction(#[from] PredictError),

    /// No such route.
    #[error("Not Found")]
    NotFound,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::ModelUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::BadShape { .. } => StatusCode::BAD_REQUEST,
            Self::InvalidBody(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Prediction(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            Self::Prediction(e) => error!("prediction failed: {e}"),
            Self::BadShape { expected, actual } => {
                warn!("rejected input of {actual} values, expected {expected}")
            }
            Self::ModelUnavailable => warn!("prediction requested but no model is loaded"),
            Self::InvalidBody(reason) => warn!("rejected request body: {reason}"),
            Self::NotFound => {}
        }

        let body = ErrorResponse {
            detail: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
