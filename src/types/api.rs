//! API request and response types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::ModelMetadata;
use crate::mood::MoodProfile;
use crate::recommend::{ChartEntry, Recommendation};

/// Which recommendation mode a request asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendKind {
    User,
    Mood,
    Random,
}

/// Body of `POST /recommend`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendRequest {
    #[serde(rename = "type")]
    pub kind: RecommendKind,
    /// Required for `user`
    #[serde(default)]
    pub user_id: Option<String>,
    /// Required for `mood`
    #[serde(default)]
    pub mood: Option<String>,
    /// Number of results (default from serving config)
    #[serde(default)]
    pub k: Option<usize>,
}

/// Mode-specific details echoed back with recommendations
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum RecommendMetadata {
    User {
        user_id: String,
    },
    Mood {
        mood: String,
        mood_name: String,
        seed_artists: Vec<String>,
        proxy_users: usize,
        failed_proxies: usize,
    },
    Random {
        random_user: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct RecommendResponse {
    pub recommendations: Vec<Recommendation>,
    #[serde(rename = "type")]
    pub kind: RecommendKind,
    pub metadata: RecommendMetadata,
}

/// Body of `POST /similar`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarRequest {
    pub artist_name: String,
    #[serde(default)]
    pub k: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimilarResponse {
    pub query_artist: String,
    pub similar_artists: Vec<Recommendation>,
}

/// Query string of `GET /charts`
#[derive(Debug, Clone, Deserialize)]
pub struct ChartsQuery {
    /// Defaults to `serving.default_chart_k`
    #[serde(default)]
    pub k: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartsResponse {
    pub charts: Vec<ChartEntry>,
    pub total_artists: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct MoodsResponse {
    pub moods: BTreeMap<&'static str, &'static MoodProfile>,
}

/// Summary of the loaded model
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub n_users: usize,
    pub n_artists: usize,
    pub n_trained_users: usize,
    pub factors: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ModelMetadata>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub model_loaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_info: Option<ModelInfo>,
    pub uptime_seconds: u64,
}

/// Response of `GET /`
#[derive(Debug, Clone, Serialize)]
pub struct ServiceInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub endpoints: Vec<&'static str>,
}
