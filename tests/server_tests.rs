//! Integration tests for the HTTP server.
//!
//! Drives the router with `tower::ServiceExt::oneshot` against in-memory file
//! host and similarity provider mocks; no sockets are opened.
//!
//! Run with: cargo test --test server_tests --features server

#![cfg(feature = "server")]

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use spectral_graph::file_host::{synthetic_mgf, MockFileHost};
use spectral_graph::server::{create_router, create_router_with_config, AppState, CorsConfig, ServerConfig};
use spectral_graph::similarity::{MockSimilarityProvider, SpectrumMatch};
use spectral_graph::{EdgeDedup, ExpansionConfig};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

fn named(id: &str, score: f64, name: &str) -> SpectrumMatch {
    SpectrumMatch::new(id, score).with_metadata("Compound_name", name)
}

/// Host serving `root`, `b` and `c`.
fn test_host() -> MockFileHost {
    MockFileHost::new()
        .with_file("root", synthetic_mgf("root", 300.0))
        .with_file("b", synthetic_mgf("b", 310.0))
        .with_file("c", synthetic_mgf("c", 320.0))
}

fn test_provider() -> MockSimilarityProvider {
    MockSimilarityProvider::new()
        .with_matches("root", vec![named("b", 0.95, "Caffeine"), named("c", 0.7, "Theobromine")])
        .with_matches("b", vec![named("root", 0.95, "Paraxanthine"), named("d", 0.61234, "Theophylline")])
        .with_matches("c", vec![named("root", 0.7, "Paraxanthine")])
}

fn create_test_state(host: MockFileHost, provider: MockSimilarityProvider) -> Arc<AppState> {
    Arc::new(AppState::new(
        Arc::new(host),
        Arc::new(provider),
        ExpansionConfig::default(),
    ))
}

fn create_test_router(state: Arc<AppState>) -> axum::Router {
    create_router(state)
}

/// Helper to make GET request
async fn get(router: &axum::Router, path: &str) -> axum::response::Response {
    let request = Request::builder()
        .method(Method::GET)
        .uri(path)
        .body(Body::empty())
        .unwrap();

    router.clone().oneshot(request).await.unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn body_json(response: axum::response::Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

// ============ Health ============

#[tokio::test]
async fn test_health() {
    let router = create_test_router(create_test_state(test_host(), test_provider()));
    let response = get(&router, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert!(json["version"].is_string());
}

// ============ Index page ============

#[tokio::test]
async fn test_index_without_spectrum_shows_form() {
    let state = create_test_state(test_host(), test_provider());
    let router = create_test_router(state.clone());

    let response = get(&router, "/").await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("name=\"spectrum_id\""));
    assert!(!html.contains("fetch(\"/data\")"));
    assert_eq!(state.current_query_id().await, None);
}

#[tokio::test]
async fn test_index_uses_configured_title() {
    let state = Arc::new(
        AppState::new(Arc::new(test_host()), Arc::new(test_provider()), ExpansionConfig::default())
            .with_title("Caffeine & friends"),
    );
    let router = create_test_router(state);

    let html = body_text(get(&router, "/").await).await;
    assert!(html.contains("<title>Caffeine &amp; friends</title>"));
}

#[tokio::test]
async fn test_index_empty_spectrum_id_is_absent() {
    let state = create_test_state(test_host(), test_provider());
    let router = create_test_router(state.clone());

    let response = get(&router, "/?spectrum_id=").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!body_text(response).await.contains("fetch(\"/data\")"));
    assert_eq!(state.current_query_id().await, None);
}

#[tokio::test]
async fn test_index_with_spectrum_stores_query() {
    let state = create_test_state(test_host(), test_provider());
    let router = create_test_router(state.clone());

    let response = get(&router, "/?spectrum_id=root").await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("fetch(\"/data\")"));
    assert_eq!(state.current_query_id().await.as_deref(), Some("root"));
}

#[tokio::test]
async fn test_index_file_host_failure_is_bad_gateway() {
    let state = create_test_state(test_host(), test_provider());
    let router = create_test_router(state.clone());

    let response = get(&router, "/?spectrum_id=unknown").await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let html = body_text(response).await;
    assert!(html.contains("class=\"error\""));
    assert_eq!(state.current_query_id().await, None);
}

#[tokio::test]
async fn test_index_invalid_id_rejected() {
    let host = test_host();
    let state = create_test_state(host, test_provider());
    let router = create_test_router(state.clone());

    let response = get(&router, "/?spectrum_id=..%2Fsecret").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(state.current_query_id().await, None);
}

#[tokio::test]
async fn test_index_failure_keeps_previous_query() {
    let state = create_test_state(test_host(), test_provider());
    let router = create_test_router(state.clone());

    assert_eq!(get(&router, "/?spectrum_id=root").await.status(), StatusCode::OK);
    assert_eq!(get(&router, "/?spectrum_id=missing").await.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(state.current_query_id().await.as_deref(), Some("root"));
}

// ============ Data ============

#[tokio::test]
async fn test_data_without_query_conflicts() {
    let router = create_test_router(create_test_state(test_host(), test_provider()));

    let response = get(&router, "/data").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = body_json(response).await;
    assert_eq!(json["code"], "NO_QUERY");
    assert!(json["help"].as_str().unwrap().contains("spectrum_id"));
}

#[tokio::test]
async fn test_data_returns_graph_document() {
    let router = create_test_router(create_test_state(test_host(), test_provider()));
    assert_eq!(get(&router, "/?spectrum_id=root").await.status(), StatusCode::OK);

    let response = get(&router, "/data").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;

    let ids: Vec<&str> = json["nodes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["root", "b", "c", "d"]);

    let edges = json["edges"].as_array().unwrap();
    assert_eq!(edges.len(), 3);
    assert_eq!(edges[0]["source"], 0);
    assert_eq!(edges[0]["target"], 1);
    assert_eq!(edges[0]["similarity"], "0.95");
    assert_eq!(edges[2]["source"], 1);
    assert_eq!(edges[2]["target"], 3);
    assert_eq!(edges[2]["similarity"], "0.612");

    assert_eq!(json["idNames"]["b"], "Caffeine");
    assert_eq!(json["idNames"]["root"], "Paraxanthine");
    assert_eq!(json["idNames"]["d"], "Theophylline");
}

#[tokio::test]
async fn test_data_is_repeatable() {
    let router = create_test_router(create_test_state(test_host(), test_provider()));
    get(&router, "/?spectrum_id=root").await;

    let first = body_json(get(&router, "/data").await).await;
    let second = body_json(get(&router, "/data").await).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_data_provider_failure_is_bad_gateway() {
    let router = create_test_router(create_test_state(test_host(), MockSimilarityProvider::failing(503)));
    assert_eq!(get(&router, "/?spectrum_id=root").await.status(), StatusCode::OK);

    let response = get(&router, "/data").await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_json(response).await["code"], "SIMILARITY_PROVIDER_ERROR");
}

#[tokio::test]
async fn test_data_neighbour_fetch_failure_is_bad_gateway() {
    // The provider points at a neighbour the file host does not have.
    let provider = MockSimilarityProvider::new().with_matches("root", vec![SpectrumMatch::new("ghost", 0.9)]);
    let router = create_test_router(create_test_state(test_host(), provider));
    get(&router, "/?spectrum_id=root").await;

    let response = get(&router, "/data").await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_json(response).await["code"], "FILE_HOST_ERROR");
}

#[tokio::test]
async fn test_data_skips_neighbour_with_unusable_id() {
    let provider = MockSimilarityProvider::new()
        .with_matches("root", vec![SpectrumMatch::new("b", 0.9), SpectrumMatch::new("bad/id", 0.8)])
        .with_matches("b", vec![SpectrumMatch::new("root", 0.9)]);
    let router = create_test_router(create_test_state(test_host(), provider));
    get(&router, "/?spectrum_id=root").await;

    let response = get(&router, "/data").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["nodes"].as_array().unwrap().len(), 3);
    assert_eq!(json["nodes"][2]["id"], "bad/id");
}

#[tokio::test]
async fn test_data_no_matches_is_not_found() {
    let router = create_test_router(create_test_state(test_host(), MockSimilarityProvider::new()));
    get(&router, "/?spectrum_id=root").await;

    let response = get(&router, "/data").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "NO_MATCHES");
}

#[tokio::test]
async fn test_data_pair_dedup() {
    let provider = MockSimilarityProvider::new()
        .with_matches("root", vec![SpectrumMatch::new("b", 0.5)])
        .with_matches("b", vec![SpectrumMatch::new("root", 0.8)]);
    let state = Arc::new(AppState::new(
        Arc::new(test_host()),
        Arc::new(provider),
        ExpansionConfig::default().with_dedup(EdgeDedup::Pair),
    ));
    let router = create_test_router(state);
    get(&router, "/?spectrum_id=root").await;

    let json = body_json(get(&router, "/data").await).await;
    let edges = json["edges"].as_array().unwrap();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0]["similarity"], "0.8");
}

// ============ CORS ============

#[tokio::test]
async fn test_cors_allowed_origin() {
    let state = create_test_state(test_host(), test_provider());
    let config = ServerConfig::default().with_cors(CorsConfig::default());
    let router = create_router_with_config(state, &config);

    let request = Request::builder()
        .method(Method::GET)
        .uri("/health")
        .header(header::ORIGIN, "http://localhost:1338")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(
        response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "http://localhost:1338"
    );
}

#[tokio::test]
async fn test_cors_unlisted_origin_gets_no_header() {
    let state = create_test_state(test_host(), test_provider());
    let router = create_test_router(state);

    let request = Request::builder()
        .method(Method::GET)
        .uri("/health")
        .header(header::ORIGIN, "https://elsewhere.example.org")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();

    assert!(response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
}
