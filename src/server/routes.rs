//! Service-level route handlers: description, health, model info, moods.

use axum::{extract::State, http::StatusCode};

use crate::error::AppError;
use crate::mood::all_moods;
use crate::recommend::RecommenderService;
use crate::types::{HealthResponse, HealthStatus, ModelInfo, MoodsResponse, ServiceInfo};

use super::extractors::{Negotiated, WireFormat};
use super::AppState;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn model_info(service: &RecommenderService) -> ModelInfo {
    ModelInfo {
        n_users: service.n_users(),
        n_artists: service.n_artists(),
        n_trained_users: service.model().n_users(),
        factors: service.model().factors(),
        metadata: service.metadata().cloned(),
    }
}

/// GET /api/v1
pub async fn root(format: WireFormat) -> Negotiated<ServiceInfo> {
    format.respond(ServiceInfo {
        name: "Music Recommender API",
        version: VERSION,
        endpoints: vec![
            "GET /api/v1/health",
            "POST /api/v1/recommend",
            "POST /api/v1/similar",
            "GET /api/v1/charts",
            "GET /api/v1/moods",
            "GET /api/v1/model/info",
        ],
    })
}

/// Health check endpoint
///
/// GET /api/v1/health
///
/// Responds 503 while no model is loaded.
pub async fn health(
    State(state): State<AppState>,
    format: WireFormat,
) -> (StatusCode, Negotiated<HealthResponse>) {
    match state.recommender.as_deref() {
        Some(service) => (
            StatusCode::OK,
            format.respond(HealthResponse {
                status: HealthStatus::Healthy,
                model_loaded: true,
                model_info: Some(model_info(service)),
                uptime_seconds: state.uptime_seconds(),
            }),
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            format.respond(HealthResponse {
                status: HealthStatus::Unhealthy,
                model_loaded: false,
                model_info: None,
                uptime_seconds: state.uptime_seconds(),
            }),
        ),
    }
}

/// GET /api/v1/model/info
pub async fn model_info_handler(
    State(state): State<AppState>,
    format: WireFormat,
) -> Result<Negotiated<ModelInfo>, AppError> {
    let service = state.recommender()?;
    Ok(format.respond(model_info(&service)))
}

/// GET /api/v1/moods
///
/// Mood profiles are static, so this works without a model.
pub async fn list_moods(format: WireFormat) -> Negotiated<MoodsResponse> {
    format.respond(MoodsResponse {
        moods: all_moods().iter().map(|m| (m.key, m)).collect(),
    })
}
