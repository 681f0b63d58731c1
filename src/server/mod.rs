//! HTTP server setup and routing.

mod extractors;
mod recommend;
mod routes;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Instant;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::AppConfig;
use crate::error::AppError;
use crate::recommend::RecommenderService;

pub use extractors::{ApiBody, Negotiated, WireFormat};

/// Shared application state passed to all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    /// `None` until artifacts have been loaded; never mutated afterwards
    pub recommender: Option<Arc<RecommenderService>>,
    /// Server start time for uptime calculation
    pub started_at: Instant,
}

impl AppState {
    /// State without a model: only static routes answer successfully.
    pub fn new(config: AppConfig) -> Self {
        Self {
            config: Arc::new(config),
            recommender: None,
            started_at: Instant::now(),
        }
    }

    pub fn with_recommender(config: AppConfig, recommender: RecommenderService) -> Self {
        Self {
            config: Arc::new(config),
            recommender: Some(Arc::new(recommender)),
            started_at: Instant::now(),
        }
    }

    /// The loaded service, or `Unavailable`
    pub fn recommender(&self) -> Result<Arc<RecommenderService>, AppError> {
        self.recommender.clone().ok_or_else(|| {
            AppError::Unavailable("Model not loaded; run the training pipeline first".to_string())
        })
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

/// Creates the application router with all routes configured
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/", get(routes::root))
        .route("/health", get(routes::health))
        .route("/model/info", get(routes::model_info_handler))
        .route("/moods", get(routes::list_moods))
        .route("/recommend", post(recommend::recommend))
        .route("/similar", post(recommend::similar))
        .route("/charts", get(recommend::charts));

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
