//! Integration tests for the lookup API.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use cpedict_core::{BuildInfo, CpeEntry, DictionaryConfig, FetchType, LATEST_SCHEMA_VERSION};
use cpedict_server::{AppState, create_router};
use serde_json::Value;
use tower::ServiceExt;

async fn router_with_seed_data() -> (axum::Router, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create tempdir");
    let config = DictionaryConfig::Sqlite {
        path: dir.path().join("cpe.sqlite3"),
        busy_timeout_secs: 5,
        log_queries: false,
    };
    let store = cpedict_dictionary::from_config(&config)
        .await
        .expect("Failed to open dictionary");

    let entries = vec![
        CpeEntry {
            vendor: "apache".to_string(),
            product: "http_server".to_string(),
            cpe_uri: "cpe:/a:apache:http_server:2.4".to_string(),
            deprecated: false,
            fetch_type: FetchType::Nvd,
        },
        CpeEntry {
            vendor: "apache".to_string(),
            product: "http_server".to_string(),
            cpe_uri: "cpe:/a:apache:http_server:1.3".to_string(),
            deprecated: true,
            fetch_type: FetchType::Nvd,
        },
    ];
    store
        .replace_generation(FetchType::Nvd, &entries, None)
        .await
        .expect("Failed to seed entries");

    let build = BuildInfo {
        revision: "test-revision".to_string(),
        schema_version: LATEST_SCHEMA_VERSION,
    };
    (create_router(AppState::new(store, build)), dir)
}

async fn get_json(router: &axum::Router, uri: &str) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri(uri)
                .body(Body::empty())
                .expect("Failed to build request"),
        )
        .await
        .expect("Request failed");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    let json = serde_json::from_slice(&bytes).expect("Body is not JSON");
    (status, json)
}

#[tokio::test]
async fn test_health() {
    let (router, _dir) = router_with_seed_data().await;
    let (status, body) = get_json(&router, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["revision"], "test-revision");
}

#[tokio::test]
async fn test_cpes_lookup_partitions_results() {
    let (router, _dir) = router_with_seed_data().await;
    let (status, body) = get_json(&router, "/cpes/apache/http_server").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["cpe_uris"],
        serde_json::json!(["cpe:/a:apache:http_server:2.4"])
    );
    assert_eq!(
        body["deprecated"],
        serde_json::json!(["cpe:/a:apache:http_server:1.3"])
    );
}

#[tokio::test]
async fn test_cpes_lookup_unknown_pair_is_empty() {
    let (router, _dir) = router_with_seed_data().await;
    let (status, body) = get_json(&router, "/cpes/unknown/unknown").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cpe_uris"], serde_json::json!([]));
    assert_eq!(body["deprecated"], serde_json::json!([]));
}

#[tokio::test]
async fn test_vendor_products_listing() {
    let (router, _dir) = router_with_seed_data().await;
    let (status, body) = get_json(&router, "/vendor-products").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!(["apache::http_server"]));
}

#[tokio::test]
async fn test_deprecated_point_lookup() {
    let (router, _dir) = router_with_seed_data().await;
    let (status, body) =
        get_json(&router, "/deprecated/cpe:%2Fa:apache:http_server:1.3").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deprecated"], serde_json::json!(true));
}
