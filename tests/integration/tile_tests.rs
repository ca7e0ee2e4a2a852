//! Tile endpoint integration tests.
//!
//! Tests verify:
//! - Blobs are served byte-for-byte with vector tile headers
//! - Slippy-map rows are flipped before the archive lookup
//! - Error cases map to structured 400/404/500 responses

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use super::test_utils::{create_mbtiles, RecordingPublisher, TestApp, GZIP_TILE};

async fn get(app: &TestApp, uri: &str) -> (StatusCode, axum::http::HeaderMap, bytes::Bytes) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, headers, body)
}

fn json(body: &[u8]) -> serde_json::Value {
    serde_json::from_slice(body).unwrap()
}

// =============================================================================
// Tile Retrieval
// =============================================================================

#[tokio::test]
async fn test_tile_served_unchanged() {
    let dir = TempDir::new().unwrap();
    let app = TestApp::new(&create_mbtiles(&dir), Arc::new(RecordingPublisher::new()));

    let (status, headers, body) = get(&app, "/tiles/5/10/24").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_ref(), GZIP_TILE);
    assert_eq!(headers.get("content-type").unwrap(), "application/x-protobuf");
    assert_eq!(headers.get("content-encoding").unwrap(), "gzip");
    assert_eq!(headers.get("cache-control").unwrap(), "public, max-age=600");
}

#[tokio::test]
async fn test_tile_extension_accepted() {
    let dir = TempDir::new().unwrap();
    let app = TestApp::new(&create_mbtiles(&dir), Arc::new(RecordingPublisher::new()));

    for uri in ["/tiles/5/10/24.pbf", "/tiles/5/10/24.mvt"] {
        let (status, _, body) = get(&app, uri).await;
        assert_eq!(status, StatusCode::OK, "{}", uri);
        assert_eq!(body.as_ref(), GZIP_TILE);
    }
}

#[tokio::test]
async fn test_archive_row_is_not_the_request_row() {
    let dir = TempDir::new().unwrap();
    let app = TestApp::new(&create_mbtiles(&dir), Arc::new(RecordingPublisher::new()));

    // Row 7 is the archive row; in slippy-map terms it is empty
    let (status, _, _) = get(&app, "/tiles/5/10/7").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Error Cases
// =============================================================================

#[tokio::test]
async fn test_missing_tile_is_404() {
    let dir = TempDir::new().unwrap();
    let app = TestApp::new(&create_mbtiles(&dir), Arc::new(RecordingPublisher::new()));

    let (status, _, body) = get(&app, "/tiles/5/11/24").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    let body = json(&body);
    assert_eq!(body["error"], "not_found");
    assert_eq!(body["status"], 404);
}

#[tokio::test]
async fn test_out_of_range_row_is_400() {
    let dir = TempDir::new().unwrap();
    let app = TestApp::new(&create_mbtiles(&dir), Arc::new(RecordingPublisher::new()));

    let (status, _, body) = get(&app, "/tiles/2/0/4").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json(&body)["error"], "invalid_address");
}

#[tokio::test]
async fn test_non_numeric_coordinate_is_400() {
    let dir = TempDir::new().unwrap();
    let app = TestApp::new(&create_mbtiles(&dir), Arc::new(RecordingPublisher::new()));

    let (status, _, body) = get(&app, "/tiles/five/10/24").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json(&body)["error"], "invalid_address");
}

#[tokio::test]
async fn test_foreign_extension_is_400() {
    let dir = TempDir::new().unwrap();
    let app = TestApp::new(&create_mbtiles(&dir), Arc::new(RecordingPublisher::new()));

    // The fixture archive holds pbf tiles; a raster extension is not an alias
    for uri in ["/tiles/5/10/24.png", "/tiles/5/10/24.webp"] {
        let (status, _, body) = get(&app, uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(json(&body)["error"], "invalid_address");
    }
}

#[tokio::test]
async fn test_negative_zoom_is_400() {
    let dir = TempDir::new().unwrap();
    let app = TestApp::new(&create_mbtiles(&dir), Arc::new(RecordingPublisher::new()));

    let (status, _, _) = get(&app, "/tiles/-1/0/0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_archive_is_500() {
    let dir = TempDir::new().unwrap();
    let app = TestApp::new(
        &dir.path().join("absent.mbtiles"),
        Arc::new(RecordingPublisher::new()),
    );

    let (status, _, body) = get(&app, "/tiles/0/0/0").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json(&body)["error"], "store_unavailable");
    assert!(!dir.path().join("absent.mbtiles").exists());
}

#[tokio::test]
async fn test_health_without_readiness() {
    let dir = TempDir::new().unwrap();
    let app = TestApp::new(&create_mbtiles(&dir), Arc::new(RecordingPublisher::new()));

    let (status, _, body) = get(&app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["status"], "healthy");
}
