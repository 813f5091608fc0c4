use actix_web::{web, HttpResponse};

use crate::error::{ApiError, Result};
use crate::inference::{AppState, INFERENCE_BACKEND_AVAILABLE};
use crate::models::{
    FeatureRecord, HealthResponse, HealthStatus, ModelInfo, PredictRequest, FEATURE_COUNT,
};

pub async fn index() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body("<h1>Hello, API is running 🚀</h1>")
}

pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    let model_loaded = state.model_loaded();
    let status = if model_loaded {
        HealthStatus::Ok
    } else {
        HealthStatus::Error
    };

    HttpResponse::Ok().json(HealthResponse {
        status,
        model_loaded,
        catboost_available: INFERENCE_BACKEND_AVAILABLE,
    })
}

pub async fn model_info() -> HttpResponse {
    HttpResponse::Ok().json(ModelInfo::current())
}

/// The model check runs before the body is looked at, so a missing model
/// answers 503 even for malformed requests.
pub async fn predict(
    state: web::Data<AppState>,
    body: std::result::Result<web::Json<PredictRequest>, actix_web::Error>,
) -> Result<HttpResponse> {
    if !state.model_loaded() {
        return Err(ApiError::ModelNotLoaded);
    }

    let request = body
        .map_err(|e| {
            tracing::debug!("Rejected predict body: {}", e);
            ApiError::InvalidBody(e.to_string())
        })?
        .into_inner();

    let features = request.features.ok_or(ApiError::MissingFeatures)?;
    let record = FeatureRecord::from_values(&features).ok_or_else(|| {
        tracing::debug!("Rejected feature vector of length {}", features.len());
        ApiError::FeatureCount {
            expected: FEATURE_COUNT,
            actual: features.len(),
        }
    })?;

    let classification = web::block(move || state.classify(&record))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(|e| {
            tracing::error!("Prediction error: {}", e);
            e
        })?;

    let response = classification.into_prediction().map_err(|e| {
        tracing::error!("Prediction error: {}", e);
        ApiError::from(e)
    })?;

    tracing::debug!("Predicted class: {}", response.prediction.label());
    Ok(HttpResponse::Ok().json(response))
}

pub async fn not_found() -> Result<HttpResponse> {
    Err(ApiError::NotFound)
}
