//! Archive download integration tests.

use axum::http::StatusCode;
use http::header::CONTENT_LENGTH;

use mbtiles_gateway::server::{create_router, RouterConfig};

use super::test_utils::{body_bytes, body_text, gateway, get, router, MockRenderer, PLACEHOLDER};

#[tokio::test]
async fn test_download_streams_raw_archive() {
    let dir = tempfile::tempdir().unwrap();
    let data: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();
    std::fs::write(dir.path().join("world.v2.mbtiles"), &data).unwrap();

    let renderer = MockRenderer::new();
    let requests = renderer.requests();
    let response = get(router(gateway(&dir, renderer)), "/download/world.v2.mbtiles").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get(CONTENT_LENGTH).unwrap(), "4096");
    assert_eq!(body_bytes(response).await, data);
    assert!(requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_download_missing_tileset_returns_placeholder() {
    let dir = tempfile::tempdir().unwrap();
    let response = get(
        router(gateway(&dir, MockRenderer::new())),
        "/download/missing.mbtiles",
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_bytes(response).await, PLACEHOLDER);
}

#[tokio::test]
async fn test_download_disabled_falls_through() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("world.mbtiles"), b"archive").unwrap();

    let router = create_router(
        gateway(&dir, MockRenderer::new()),
        RouterConfig::new().with_tracing(false),
    );
    let response = get(router, "/download/world.mbtiles").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_text(response).await, "Not Found");
}

#[tokio::test]
async fn test_download_requires_mbtiles_suffix() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("world.mbtiles"), b"archive").unwrap();

    let response = get(router(gateway(&dir, MockRenderer::new())), "/download/world").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_text(response).await, "Not Found");
}
