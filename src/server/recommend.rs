//! Recommendation route handlers.
//!
//! Queries run on the blocking pool: scoring touches every item factor.

use axum::extract::{Query, State};

use crate::error::AppError;
use crate::recommend::RecommendError;
use crate::types::{
    ChartsQuery, ChartsResponse, RecommendKind, RecommendMetadata, RecommendRequest,
    RecommendResponse, SimilarRequest, SimilarResponse,
};

use super::extractors::{ApiBody, Negotiated, WireFormat};
use super::AppState;

/// Check `k` against `1..=max`, falling back to `default` when absent.
fn resolve_k(k: Option<usize>, default: usize, max: usize) -> Result<usize, AppError> {
    let k = k.unwrap_or(default);
    if k == 0 || k > max {
        return Err(AppError::BadRequest(format!(
            "k must be between 1 and {max}, got {k}"
        )));
    }
    Ok(k)
}

fn required(value: Option<String>, field: &str, kind: &str) -> Result<String, AppError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest(format!("{field} is required for type '{kind}'")))
}

async fn run_blocking<T, F>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, RecommendError> + Send + 'static,
    T: Send + 'static,
{
    let result = tokio::task::spawn_blocking(f).await?;
    Ok(result?)
}

/// POST /api/v1/recommend
pub async fn recommend(
    State(state): State<AppState>,
    format: WireFormat,
    ApiBody(req): ApiBody<RecommendRequest>,
) -> Result<Negotiated<RecommendResponse>, AppError> {
    let serving = &state.config.serving;
    let k = resolve_k(req.k, serving.default_k, serving.max_k)?;

    let response = match req.kind {
        RecommendKind::User => {
            let user_id = required(req.user_id, "user_id", "user")?;
            let service = state.recommender()?;
            let lookup = user_id.clone();
            let recommendations =
                run_blocking(move || service.recommend_for_user(&lookup, k)).await?;
            RecommendResponse {
                recommendations,
                kind: req.kind,
                metadata: RecommendMetadata::User { user_id },
            }
        }
        RecommendKind::Mood => {
            let mood = required(req.mood, "mood", "mood")?;
            let service = state.recommender()?;
            let result = run_blocking(move || service.recommend_for_mood(&mood, k)).await?;
            RecommendResponse {
                recommendations: result.items,
                kind: req.kind,
                metadata: RecommendMetadata::Mood {
                    mood: result.mood.key.to_string(),
                    mood_name: result.mood.name.to_string(),
                    seed_artists: result.seeds_used,
                    proxy_users: result.proxy_users,
                    failed_proxies: result.failed_proxies,
                },
            }
        }
        RecommendKind::Random => {
            let service = state.recommender()?;
            let result = run_blocking(move || {
                service.recommend_random_user(&mut rand::thread_rng(), k)
            })
            .await?;
            RecommendResponse {
                recommendations: result.items,
                kind: req.kind,
                metadata: RecommendMetadata::Random {
                    random_user: result.user_id,
                },
            }
        }
    };

    tracing::debug!(
        kind = ?response.kind,
        results = response.recommendations.len(),
        "Served recommendations"
    );
    Ok(format.respond(response))
}

/// POST /api/v1/similar
pub async fn similar(
    State(state): State<AppState>,
    format: WireFormat,
    ApiBody(req): ApiBody<SimilarRequest>,
) -> Result<Negotiated<SimilarResponse>, AppError> {
    let serving = &state.config.serving;
    let k = resolve_k(req.k, serving.default_k, serving.max_k)?;
    if req.artist_name.trim().is_empty() {
        return Err(AppError::BadRequest("artist_name must not be empty".to_string()));
    }

    let service = state.recommender()?;
    let result = run_blocking(move || service.similar_artists(&req.artist_name, k)).await?;
    Ok(format.respond(SimilarResponse {
        query_artist: result.query,
        similar_artists: result.items,
    }))
}

/// GET /api/v1/charts?k=20
///
/// Without `k`, `serving.default_chart_k` entries are returned.
pub async fn charts(
    State(state): State<AppState>,
    format: WireFormat,
    Query(query): Query<ChartsQuery>,
) -> Result<Negotiated<ChartsResponse>, AppError> {
    let serving = &state.config.serving;
    let k = resolve_k(query.k, serving.default_chart_k, serving.max_chart_k)?;
    let service = state.recommender()?;
    Ok(format.respond(ChartsResponse {
        charts: service.top_charts(k),
        total_artists: service.total_artists_charted(),
    }))
}
