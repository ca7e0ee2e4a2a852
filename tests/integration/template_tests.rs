//! Template endpoint integration tests.
//!
//! Tests verify:
//! - Creation responds 201 and publishes exactly one flat event
//! - A broker failure never changes the creation response
//! - Listing, updating and soft-deleting honour `deleted_at`

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use super::test_utils::{create_mbtiles, FailingPublisher, RecordingPublisher, TestApp};

async fn send(
    app: &TestApp,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

fn app_with(publisher: Arc<dyn cartobase::EventPublisher>) -> (TempDir, TestApp) {
    let dir = TempDir::new().unwrap();
    let app = TestApp::new(&create_mbtiles(&dir), publisher);
    (dir, app)
}

// =============================================================================
// Creation
// =============================================================================

#[tokio::test]
async fn test_create_publishes_one_event() {
    let publisher = Arc::new(RecordingPublisher::new());
    let (_dir, app) = app_with(publisher.clone());

    let (status, body) = send(
        &app,
        "POST",
        "/create",
        Some(serde_json::json!({"title": "Weekly report", "user_id": 7})),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Template created successfully");
    let id = body["id"].as_str().unwrap().to_string();

    app.drain().await;
    let messages = publisher.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].0, "template_created");
    assert_eq!(
        messages[0].1,
        serde_json::json!({"id": id, "title": "Weekly report", "user_id": 7})
    );
}

#[tokio::test]
async fn test_create_succeeds_with_broker_down() {
    let (_dir, app) = app_with(Arc::new(FailingPublisher));

    let (status, body) = send(
        &app,
        "POST",
        "/create",
        Some(serde_json::json!({"title": "Offline", "user_id": 1})),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert!(body["id"].is_string());

    app.drain().await;
    assert_eq!(app.templates.rows().len(), 1);
}

#[tokio::test]
async fn test_create_requires_fields() {
    let publisher = Arc::new(RecordingPublisher::new());
    let (_dir, app) = app_with(publisher.clone());

    let (status, body) = send(
        &app,
        "POST",
        "/create",
        Some(serde_json::json!({"title": "No owner"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_request");

    app.drain().await;
    assert!(publisher.messages().is_empty());
    assert!(app.templates.rows().is_empty());
}

#[tokio::test]
async fn test_create_rejects_zero_user_id() {
    let publisher = Arc::new(RecordingPublisher::new());
    let (_dir, app) = app_with(publisher.clone());

    let (status, body) = send(
        &app,
        "POST",
        "/create",
        Some(serde_json::json!({"title": "Orphan", "user_id": 0})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_request");

    app.drain().await;
    assert!(publisher.messages().is_empty());
    assert!(app.templates.rows().is_empty());
}

#[tokio::test]
async fn test_create_rejects_malformed_json() {
    let (_dir, app) = app_with(Arc::new(RecordingPublisher::new()));

    let request = Request::builder()
        .method("POST")
        .uri("/create")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// Listing, Update, Delete
// =============================================================================

#[tokio::test]
async fn test_list_update_delete_flow() {
    let (_dir, app) = app_with(Arc::new(RecordingPublisher::new()));

    let (_, created) = send(
        &app,
        "POST",
        "/create",
        Some(serde_json::json!({"title": "Draft", "user_id": 2})),
    )
    .await;
    let id = created["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        "PATCH",
        &format!("/template/{}", id),
        Some(serde_json::json!({"title": "Final"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Template updated successfully");

    let (status, list) = send(&app, "GET", "/all", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["title"], "Final");
    assert_eq!(list[0]["user_id"], 2);

    let (status, _) = send(&app, "DELETE", &format!("/template/{}", id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, list) = send(&app, "GET", "/all", None).await;
    assert!(list.as_array().unwrap().is_empty());

    // Soft-deleted rows are kept but no longer writable
    assert_eq!(app.templates.rows().len(), 1);
    let (status, _) = send(&app, "DELETE", &format!("/template/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_unknown_template_is_404() {
    let (_dir, app) = app_with(Arc::new(RecordingPublisher::new()));

    let (status, body) = send(
        &app,
        "PATCH",
        "/template/00000000-0000-0000-0000-000000000000",
        Some(serde_json::json!({"user_id": 9})),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn test_update_rejects_bad_input() {
    let (_dir, app) = app_with(Arc::new(RecordingPublisher::new()));

    let (status, _) = send(
        &app,
        "PATCH",
        "/template/not-a-uuid",
        Some(serde_json::json!({"title": "x"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "PATCH",
        "/template/00000000-0000-0000-0000-000000000000",
        Some(serde_json::json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_index_banner() {
    let (_dir, app) = app_with(Arc::new(RecordingPublisher::new()));

    let (status, body) = send(&app, "GET", "/", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "template service");
}
