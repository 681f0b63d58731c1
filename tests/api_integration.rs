//! Integration tests for API endpoints.
//!
//! A small hand-built factor model stands in for a trained one so every
//! route can be exercised without running the pipeline.

use axum::http::{header::ACCEPT, HeaderValue, StatusCode};
use axum_test::TestServer;
use bytes::Bytes;
use ndarray::array;
use serde_json::{json, Value};

use music_recommender::config::AppConfig;
use music_recommender::model::FactorModel;
use music_recommender::preprocess::matrix::{build_mappings, build_matrix};
use music_recommender::server::{create_router, AppState};
use music_recommender::types::ConfidenceInteraction;
use music_recommender::RecommenderService;

fn row(user: &str, artist: &str, plays: u64) -> ConfidenceInteraction {
    ConfidenceInteraction {
        user_id: user.to_string(),
        artist_name: artist.to_string(),
        artist_mbid: None,
        play_count: plays,
        confidence: 1.0 + 40.0 * plays as f64,
        preference: 1,
    }
}

fn recommender() -> RecommenderService {
    let train = vec![
        row("alice", "radiohead", 12),
        row("alice", "bon iver", 4),
        row("bob", "radiohead", 3),
        row("bob", "daft punk", 9),
        row("carol", "daft punk", 20),
        row("carol", "avicii", 2),
        row("dave", "muse", 7),
    ];
    let (users, artists) = build_mappings(&train);
    let matrix = build_matrix(&train, &users, &artists).unwrap();
    // artists: radiohead, bon iver, daft punk, avicii, muse
    let model = FactorModel::new(
        array![[1.0, 0.1], [0.6, 0.6], [0.1, 1.0], [0.5, 0.5]],
        array![[1.0, 0.0], [0.9, 0.2], [0.0, 1.0], [0.1, 0.9], [0.6, 0.6]],
    )
    .unwrap();

    RecommenderService::from_parts(
        users,
        artists,
        matrix,
        &train,
        model,
        None,
        &AppConfig::default().serving,
    )
    .unwrap()
}

/// Create a test server with a loaded recommender
fn create_test_server() -> TestServer {
    let state = AppState::with_recommender(AppConfig::default(), recommender());
    TestServer::new(create_router(state)).unwrap()
}

/// Create a test server with no model loaded
fn create_empty_server() -> TestServer {
    TestServer::new(create_router(AppState::new(AppConfig::default()))).unwrap()
}

/// Helper to create msgpack bytes
fn msgpack_bytes<T: serde::Serialize>(value: &T) -> Bytes {
    Bytes::from(rmp_serde::to_vec_named(value).unwrap())
}

fn assert_ranked(items: &Value, k: usize) {
    let items = items.as_array().unwrap();
    assert!(items.len() <= k);
    for (i, item) in items.iter().enumerate() {
        assert_eq!(item["rank"], json!(i + 1));
    }
}

#[tokio::test]
async fn test_root_endpoint() {
    let server = create_test_server();

    let response = server.get("/api/v1").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert!(body["endpoints"].as_array().unwrap().len() >= 6);
}

#[tokio::test]
async fn test_health_endpoint() {
    let server = create_test_server();

    let response = server.get("/api/v1/health").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["model_loaded"], true);
    assert_eq!(body["model_info"]["n_artists"], 5);
}

#[tokio::test]
async fn test_health_without_model() {
    let server = create_empty_server();

    let response = server.get("/api/v1/health").await;

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = response.json();
    assert_eq!(body["model_loaded"], false);
}

#[tokio::test]
async fn test_health_msgpack() {
    let server = create_test_server();

    let response = server
        .get("/api/v1/health")
        .add_header(ACCEPT, HeaderValue::from_static("application/msgpack"))
        .await;

    response.assert_status_ok();
    let content_type = response.headers().get("content-type").unwrap();
    assert!(content_type.to_str().unwrap().contains("msgpack"));
    let body: Value = rmp_serde::from_slice(response.as_bytes()).unwrap();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_moods_endpoint() {
    let server = create_empty_server();

    let response = server.get("/api/v1/moods").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["moods"].as_object().unwrap().len(), 12);
    assert_eq!(body["moods"]["party"]["seed_artists"][0], "daft punk");
}

#[tokio::test]
async fn test_recommend_for_user() {
    let server = create_test_server();

    let response = server
        .post("/api/v1/recommend")
        .json(&json!({"type": "user", "user_id": "alice", "k": 2}))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["type"], "user");
    assert_eq!(body["metadata"]["user_id"], "alice");
    assert_ranked(&body["recommendations"], 2);
    let names: Vec<&str> = body["recommendations"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["artist_name"].as_str().unwrap())
        .collect();
    assert!(!names.contains(&"radiohead") && !names.contains(&"bon iver"));
    assert_eq!(names[0], "muse");
}

#[tokio::test]
async fn test_recommend_msgpack_request() {
    let server = create_test_server();

    let response = server
        .post("/api/v1/recommend")
        .content_type("application/msgpack")
        .bytes(msgpack_bytes(&json!({"type": "user", "user_id": "bob", "k": 3})))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_ranked(&body["recommendations"], 3);
}

#[tokio::test]
async fn test_recommend_unknown_user() {
    let server = create_test_server();

    let response = server
        .post("/api/v1/recommend")
        .json(&json!({"type": "user", "user_id": "mallory"}))
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_recommend_untrained_user_is_conflict() {
    let train = vec![row("alice", "radiohead", 12), row("bob", "muse", 7)];
    let (users, artists) = build_mappings(&train);
    let matrix = build_matrix(&train, &users, &artists).unwrap();
    // Only alice has a factor row
    let model = FactorModel::new(array![[1.0, 0.0]], array![[1.0, 0.0], [0.0, 1.0]]).unwrap();
    let service = RecommenderService::from_parts(
        users,
        artists,
        matrix,
        &train,
        model,
        None,
        &AppConfig::default().serving,
    )
    .unwrap();
    let state = AppState::with_recommender(AppConfig::default(), service);
    let server = TestServer::new(create_router(state)).unwrap();

    let response = server
        .post("/api/v1/recommend")
        .json(&json!({"type": "user", "user_id": "bob"}))
        .await;

    response.assert_status(StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "OUT_OF_RANGE");
}

#[tokio::test]
async fn test_recommend_missing_user_id() {
    let server = create_test_server();

    let response = server
        .post("/api/v1/recommend")
        .json(&json!({"type": "user"}))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_recommend_k_out_of_bounds() {
    let server = create_test_server();

    for k in [0, 51] {
        let response = server
            .post("/api/v1/recommend")
            .json(&json!({"type": "random", "k": k}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn test_recommend_for_mood() {
    let server = create_test_server();

    let response = server
        .post("/api/v1/recommend")
        .json(&json!({"type": "mood", "mood": "heartbreak", "k": 3}))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["metadata"]["mood"], "heartbreak");
    assert_eq!(body["metadata"]["mood_name"], "Heartbreak 💔");
    assert_eq!(body["metadata"]["seed_artists"], json!(["radiohead", "bon iver"]));
    assert_eq!(body["metadata"]["proxy_users"], 2);
    assert_ranked(&body["recommendations"], 3);
}

#[tokio::test]
async fn test_recommend_mood_without_known_seeds() {
    let server = create_test_server();

    let response = server
        .post("/api/v1/recommend")
        .json(&json!({"type": "mood", "mood": "jazz"}))
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_recommend_random() {
    let server = create_test_server();

    let response = server
        .post("/api/v1/recommend")
        .json(&json!({"type": "random", "k": 2}))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    let user = body["metadata"]["random_user"].as_str().unwrap();
    assert!(["alice", "bob", "carol", "dave"].contains(&user));
    assert_ranked(&body["recommendations"], 2);
}

#[tokio::test]
async fn test_recommend_without_model() {
    let server = create_empty_server();

    let response = server
        .post("/api/v1/recommend")
        .json(&json!({"type": "random"}))
        .await;

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_similar_excludes_query() {
    let server = create_test_server();

    let response = server
        .post("/api/v1/similar")
        .json(&json!({"artist_name": "Radiohead", "k": 10}))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["query_artist"], "radiohead");
    let similar = &body["similar_artists"];
    assert_ranked(similar, 10);
    assert_eq!(similar.as_array().unwrap().len(), 4);
    assert_eq!(similar[0]["artist_name"], "bon iver");
    assert!(similar
        .as_array()
        .unwrap()
        .iter()
        .all(|s| s["artist_name"] != "radiohead"));
}

#[tokio::test]
async fn test_similar_unknown_artist() {
    let server = create_test_server();

    let response = server
        .post("/api/v1/similar")
        .json(&json!({"artist_name": "nickelback"}))
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_charts_endpoint() {
    let server = create_test_server();

    let response = server.get("/api/v1/charts").add_query_param("k", 2).await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["total_artists"], 5);
    assert_eq!(body["charts"][0]["artist_name"], "daft punk");
    assert_eq!(body["charts"][0]["play_count"], 29);
    assert_eq!(body["charts"][0]["listener_count"], 2);
    assert_ranked(&body["charts"], 2);
}

#[tokio::test]
async fn test_charts_default_k_from_config() {
    let mut config = AppConfig::default();
    config.serving.default_chart_k = 3;
    let server = TestServer::new(create_router(AppState::with_recommender(config, recommender())))
        .unwrap();

    let response = server.get("/api/v1/charts").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["charts"].as_array().unwrap().len(), 3);
    assert_eq!(body["total_artists"], 5);
}

#[tokio::test]
async fn test_charts_k_too_large() {
    let server = create_test_server();

    let response = server.get("/api/v1/charts").add_query_param("k", 101).await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_model_info_without_model() {
    let server = create_empty_server();

    let response = server.get("/api/v1/model/info").await;

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "UNAVAILABLE");
}
