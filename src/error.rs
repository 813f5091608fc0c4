use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

use crate::models::ErrorBody;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Model file not found at {0}")]
    NotFound(String),

    #[error("Inference backend not available")]
    BackendUnavailable,

    #[error("Failed to load model: {0}")]
    Load(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Unexpected model output: {0}")]
    UnexpectedOutput(String),
}

/// Errors returned to HTTP clients as `{"error": "..."}`.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Model not loaded")]
    ModelNotLoaded,

    #[error("Features array is required")]
    MissingFeatures,

    #[error("Expected {expected} features, got {actual}")]
    FeatureCount { expected: usize, actual: usize },

    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    #[error("Not found")]
    NotFound,

    #[error("{0}")]
    Internal(String),
}

impl From<ModelError> for ApiError {
    fn from(err: ModelError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::ModelNotLoaded => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::MissingFeatures
            | ApiError::FeatureCount { .. }
            | ApiError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: self.to_string(),
        })
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_count_message_names_both_counts() {
        let err = ApiError::FeatureCount {
            expected: 35,
            actual: 34,
        };
        assert_eq!(err.to_string(), "Expected 35 features, got 34");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn model_errors_become_internal() {
        let err: ApiError = ModelError::Inference("shape mismatch".into()).into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Inference failed: shape mismatch");
    }

    #[test]
    fn unavailable_model_is_503() {
        assert_eq!(
            ApiError::ModelNotLoaded.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
