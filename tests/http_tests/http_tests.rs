//! Tests for the HTTP API
//!
//! These tests verify:
//! - Routes, methods and response bodies
//! - Status codes for each error kind
//! - Backup download headers and contents

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use ruledb::http::{router, AppState};
use ruledb::{Config, Rule, RuleRepository, Store};

// =============================================================================
// Helper Functions
// =============================================================================

const MAX_BODY: usize = 64 * 1024;

fn setup_temp_app() -> (TempDir, Arc<Store>, Router) {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .db_path(temp_dir.path().join("api.db"))
        .lock_timeout(Duration::from_millis(100))
        .build();
    let store = Arc::new(Store::open(config).unwrap());
    let app = router(AppState::new(RuleRepository::new(Arc::clone(&store))), MAX_BODY);
    (temp_dir, store, app)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

async fn send_json(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let (status, bytes) = send(app, method, uri, body).await;
    (status, serde_json::from_slice(&bytes).unwrap())
}

// =============================================================================
// Create / List Tests
// =============================================================================

#[tokio::test]
async fn test_create_echoes_rule() {
    let (_temp, _store, app) = setup_temp_app();

    let (status, body) = send_json(
        &app,
        Method::POST,
        "/rules/ip/",
        Some(json!({"ip": "10.0.0.1", "isDrop": true, "orgId": "acme"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"ip": "10.0.0.1", "isDrop": true, "orgId": "acme"}));
}

#[tokio::test]
async fn test_list_returns_raw_entries() {
    let (_temp, _store, app) = setup_temp_app();
    send(&app, Method::POST, "/rules/ip", Some(json!({"ip": "10.0.0.2", "isDrop": false}))).await;
    send(&app, Method::POST, "/rules/ip", Some(json!({"ip": "10.0.0.1", "isDrop": true}))).await;

    let (status, body) = send_json(&app, Method::GET, "/rules/ip/", None).await;

    assert_eq!(status, StatusCode::OK);
    let entries = body.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    let raw = entries[0]["10.0.0.1"].as_str().unwrap();
    let stored: Value = serde_json::from_str(raw).unwrap();
    assert_eq!(stored, json!({"ip": "10.0.0.1", "isDrop": true}));
    assert!(entries[1].get("10.0.0.2").is_some());
}

#[tokio::test]
async fn test_list_empty() {
    let (_temp, _store, app) = setup_temp_app();

    let (status, body) = send_json(&app, Method::GET, "/rules/ip", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_create_blank_ip_is_bad_request() {
    let (_temp, store, app) = setup_temp_app();

    let (status, body) =
        send_json(&app, Method::POST, "/rules/ip/", Some(json!({"ip": "", "isDrop": true}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("ip"));
    assert_eq!(store.scan_all(ruledb::DEFAULT_BUCKET).unwrap().count(), 0);
}

#[tokio::test]
async fn test_malformed_body_is_rejected() {
    let (_temp, store, app) = setup_temp_app();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/rules/ip/")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"ip\": "))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert!(response.status().is_client_error());
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert!(!body["error"].as_str().unwrap().is_empty());
    assert_eq!(store.scan_all(ruledb::DEFAULT_BUCKET).unwrap().count(), 0);
}

#[tokio::test]
async fn test_wrong_body_shape_is_json_error() {
    let (_temp, _store, app) = setup_temp_app();

    let (status, body) =
        send_json(&app, Method::PATCH, "/rules/ip/", Some(json!({"ip": "10.0.0.1"}))).await;

    assert!(status.is_client_error());
    assert!(body["error"].is_string());
}

// =============================================================================
// Bulk Tests
// =============================================================================

#[tokio::test]
async fn test_bulk_echoes_rules() {
    let (_temp, store, app) = setup_temp_app();
    let batch = json!([
        {"ip": "10.0.0.1", "isDrop": true},
        {"ip": "10.0.0.2", "isDrop": false, "orgId": "acme"}
    ]);

    let (status, body) = send_json(&app, Method::PATCH, "/rules/ip/", Some(batch.clone())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, batch);
    let repo = RuleRepository::new(store);
    assert_eq!(
        repo.get("10.0.0.2").unwrap(),
        Some(Rule::new("10.0.0.2", false).with_org("acme"))
    );
}

#[tokio::test]
async fn test_bulk_with_invalid_rule_writes_nothing() {
    let (_temp, store, app) = setup_temp_app();
    let batch = json!([
        {"ip": "10.0.0.1", "isDrop": true},
        {"isDrop": true}
    ]);

    let (status, _) = send_json(&app, Method::PATCH, "/rules/ip", Some(batch)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(store.scan_all(ruledb::DEFAULT_BUCKET).unwrap().count(), 0);
}

// =============================================================================
// Delete Tests
// =============================================================================

#[tokio::test]
async fn test_delete_rule() {
    let (_temp, store, app) = setup_temp_app();
    send(&app, Method::POST, "/rules/ip/", Some(json!({"ip": "10.0.0.1", "isDrop": true}))).await;

    let (status, body) = send_json(&app, Method::DELETE, "/rules/ip/10.0.0.1/", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("Successfully deleted ip rule 10.0.0.1"));
    assert_eq!(store.get(ruledb::DEFAULT_BUCKET, b"10.0.0.1").unwrap(), None);
}

#[tokio::test]
async fn test_delete_missing_rule_succeeds() {
    let (_temp, _store, app) = setup_temp_app();

    let (status, _) = send_json(&app, Method::DELETE, "/rules/ip/10.0.0.1", None).await;

    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_delete_without_bucket_is_not_found() {
    let (_temp, store, _app) = setup_temp_app();
    let app = router(
        AppState::new(RuleRepository::with_bucket(store, "missingBucket")),
        MAX_BODY,
    );

    let (status, body) = send_json(&app, Method::DELETE, "/rules/ip/10.0.0.1/", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("missingBucket"));
}

// =============================================================================
// Backup Tests
// =============================================================================

#[tokio::test]
async fn test_backup_download() {
    let (temp, _store, app) = setup_temp_app();
    send(&app, Method::POST, "/rules/ip/", Some(json!({"ip": "10.0.0.1", "isDrop": true}))).await;

    let request = Request::builder()
        .uri("/rules/db/backup/")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers().clone();
    assert_eq!(headers[header::CONTENT_TYPE], "application/octet-stream");
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"ipfilters.db\""
    );

    let image = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let declared: usize = headers[header::CONTENT_LENGTH].to_str().unwrap().parse().unwrap();
    assert_eq!(declared, image.len());

    let restored_path = temp.path().join("restored.db");
    std::fs::write(&restored_path, &image).unwrap();
    let restored = RuleRepository::new(Arc::new(Store::open_path(&restored_path).unwrap()));
    assert_eq!(restored.get("10.0.0.1").unwrap(), Some(Rule::new("10.0.0.1", true)));
}

// =============================================================================
// Misc Tests
// =============================================================================

#[tokio::test]
async fn test_closed_store_is_unavailable() {
    let (_temp, store, app) = setup_temp_app();
    store.close().unwrap();

    let (status, _) = send_json(&app, Method::GET, "/rules/ip/", None).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_unknown_route() {
    let (_temp, _store, app) = setup_temp_app();

    let (status, body) = send_json(&app, Method::GET, "/nothing/here", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"error": "not found"}));
}
