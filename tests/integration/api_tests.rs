//! API integration tests for tiles, metadata and error handling.
//!
//! Tests verify:
//! - Tile retrieval and cache headers
//! - Placeholder responses for missing tilesets on every route
//! - Formatter and legend responses
//! - Header precedence, health check, fallback and request timeouts

use axum::http::{HeaderValue, StatusCode};
use http::header::{CACHE_CONTROL, CONTENT_TYPE, LAST_MODIFIED};
use std::time::{Duration, UNIX_EPOCH};

use mbtiles_gateway::error::RenderError;
use mbtiles_gateway::render::{RenderOutput, TileCoord, TileFormat};
use mbtiles_gateway::server::{create_router, RouterConfig};
use mbtiles_gateway::tileset::format_http_date;

use super::test_utils::{
    body_bytes, body_text, gateway, get, router, touch_tileset, MockRenderer, PLACEHOLDER,
};

fn png_tile() -> RenderOutput {
    RenderOutput::image(vec![0x89, b'P', b'N', b'G', 1, 2, 3], "image/png")
}

// =============================================================================
// Tile Retrieval
// =============================================================================

#[tokio::test]
async fn test_tile_retrieval_success() {
    let dir = tempfile::tempdir().unwrap();
    let path = touch_tileset(dir.path(), "world", 1024);
    let renderer = MockRenderer::new().with_result(TileFormat::Png, Ok(Some(png_tile())));
    let router = router(gateway(&dir, renderer));

    let response = get(router, "/1.0.0/world/2/1/1.png").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get(CONTENT_TYPE).unwrap(), "image/png");

    let meta = std::fs::metadata(&path).unwrap();
    let mtime = meta.modified().unwrap();
    let millis = mtime.duration_since(UNIX_EPOCH).unwrap().as_millis();
    assert_eq!(
        response.headers().get("e-tag").unwrap(),
        format!("1024-{}", millis).as_str()
    );
    assert_eq!(
        response.headers().get(LAST_MODIFIED).unwrap(),
        format_http_date(mtime).as_str()
    );

    let body = body_bytes(response).await;
    assert_eq!(body, vec![0x89, b'P', b'N', b'G', 1, 2, 3]);
}

#[tokio::test]
async fn test_jpeg_content_type() {
    let dir = tempfile::tempdir().unwrap();
    touch_tileset(dir.path(), "photo", 16);
    let renderer = MockRenderer::new().with_result(
        TileFormat::Jpeg,
        Ok(Some(RenderOutput::image(vec![0xff, 0xd8, 0xff, 0xd9], "image/jpeg"))),
    );

    for uri in ["/1.0.0/photo/0/0/0.jpg", "/1.0.0/photo/0/0/0.jpeg"] {
        let response = get(router(gateway(&dir, renderer.clone())), uri).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get(CONTENT_TYPE).unwrap(), "image/jpeg");
    }
}

#[tokio::test]
async fn test_negative_coordinates_pass_through() {
    let dir = tempfile::tempdir().unwrap();
    touch_tileset(dir.path(), "world", 8);
    let renderer = MockRenderer::new().with_result(TileFormat::Png, Ok(Some(png_tile())));
    let requests = renderer.requests();

    let response = get(router(gateway(&dir, renderer)), "/1.0.0/world/-1/-5/3.png").await;
    assert_eq!(response.status(), StatusCode::OK);

    let seen = requests.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].coord, Some(TileCoord::new(-1, -5, 3)));
    assert_eq!(seen[0].format, TileFormat::Png);
}

#[tokio::test]
async fn test_dotted_tileset_id() {
    let dir = tempfile::tempdir().unwrap();
    let path = touch_tileset(dir.path(), "world.light-v2", 8);
    let renderer = MockRenderer::new().with_result(TileFormat::Png, Ok(Some(png_tile())));
    let requests = renderer.requests();

    let response = get(router(gateway(&dir, renderer)), "/1.0.0/world.light-v2/3/2/1.png").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(requests.lock().unwrap()[0].path, path);
}

#[tokio::test]
async fn test_tile_errors_are_masked_as_placeholder() {
    let dir = tempfile::tempdir().unwrap();
    touch_tileset(dir.path(), "world", 8);

    for result in [
        Ok(None),
        Err(RenderError::EmptyRow),
        Err(RenderError::Sqlite("database disk image is malformed".to_string())),
    ] {
        let renderer = MockRenderer::new().with_result(TileFormat::Png, result);
        let response = get(router(gateway(&dir, renderer)), "/1.0.0/world/0/0/0.png").await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers().get(CONTENT_TYPE).unwrap(), "image/png");
        assert_eq!(body_bytes(response).await, PLACEHOLDER);
    }
}

// =============================================================================
// Missing Tilesets
// =============================================================================

#[tokio::test]
async fn test_missing_tileset_returns_placeholder_on_every_route() {
    let dir = tempfile::tempdir().unwrap();
    let renderer = MockRenderer::new();
    let requests = renderer.requests();
    let router = router(gateway(&dir, renderer));

    for uri in [
        "/1.0.0/nowhere/1/2/3.png",
        "/1.0.0/nowhere/1/2/3.grid.json",
        "/1.0.0/nowhere/1/2/3.grid.json?callback=cb",
        "/1.0.0/nowhere/formatter.json",
        "/1.0.0/nowhere/legend.json",
        "/download/nowhere.mbtiles",
    ] {
        let response = get(router.clone(), uri).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", uri);
        assert_eq!(response.headers().get(CONTENT_TYPE).unwrap(), "image/png");
        assert_eq!(body_bytes(response).await, PLACEHOLDER, "{}", uri);
    }

    assert!(requests.lock().unwrap().is_empty());
}

// =============================================================================
// Formatter and Legend
// =============================================================================

#[tokio::test]
async fn test_formatter_success() {
    let dir = tempfile::tempdir().unwrap();
    touch_tileset(dir.path(), "world", 8);
    let renderer = MockRenderer::new().with_result(
        TileFormat::FormatterJson,
        Ok(Some(RenderOutput::json(serde_json::json!(
            "function(options, data) { return data.NAME; }"
        )))),
    );

    let response = get(router(gateway(&dir, renderer)), "/1.0.0/world/formatter.json").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(CONTENT_TYPE).unwrap(),
        "text/javascript"
    );
    assert!(response.headers().contains_key("e-tag"));

    let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(
        body,
        serde_json::json!({"formatter": "function(options, data) { return data.NAME; }"})
    );
}

#[tokio::test]
async fn test_legend_not_found_and_failure() {
    let dir = tempfile::tempdir().unwrap();
    touch_tileset(dir.path(), "world", 8);

    for (result, status, text) in [
        (Ok(None), StatusCode::NOT_FOUND, "legend.json not found"),
        (
            Err(RenderError::EmptyRow),
            StatusCode::NOT_FOUND,
            "legend.json not found",
        ),
        (
            Err(RenderError::Sqlite("no such table: metadata".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR,
            "SQLite error: no such table: metadata",
        ),
    ] {
        let renderer = MockRenderer::new().with_result(TileFormat::LegendJson, result);
        let response = get(router(gateway(&dir, renderer)), "/1.0.0/world/legend.json").await;
        assert_eq!(response.status(), status);
        assert_eq!(body_text(response).await, text);
    }
}

#[tokio::test]
async fn test_formatter_not_found_text() {
    let dir = tempfile::tempdir().unwrap();
    touch_tileset(dir.path(), "world", 8);

    let response = get(
        router(gateway(&dir, MockRenderer::new())),
        "/1.0.0/world/formatter.json",
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_text(response).await, "formatter.json not found");
}

// =============================================================================
// Header Precedence
// =============================================================================

#[tokio::test]
async fn test_header_precedence() {
    let dir = tempfile::tempdir().unwrap();
    touch_tileset(dir.path(), "world", 8);

    let output = png_tile().with_header(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    let renderer = MockRenderer::new().with_result(TileFormat::Png, Ok(Some(output)));

    let mut defaults = http::HeaderMap::new();
    defaults.insert(CACHE_CONTROL, HeaderValue::from_static("max-age=3600"));
    defaults.insert("e-tag", HeaderValue::from_static("pinned"));
    defaults.insert("x-served-by", HeaderValue::from_static("gateway"));

    let gateway = gateway(&dir, renderer).with_header_defaults(defaults);
    let response = get(router(gateway), "/1.0.0/world/0/0/0.png").await;

    assert_eq!(response.status(), StatusCode::OK);
    // render > defaults
    assert_eq!(response.headers().get(CACHE_CONTROL).unwrap(), "no-store");
    // defaults > cache
    assert_eq!(response.headers().get("e-tag").unwrap(), "pinned");
    assert_eq!(response.headers().get("x-served-by").unwrap(), "gateway");
    assert!(response.headers().contains_key(LAST_MODIFIED));
}

// =============================================================================
// Router Surface
// =============================================================================

#[tokio::test]
async fn test_health() {
    let dir = tempfile::tempdir().unwrap();
    let response = get(router(gateway(&dir, MockRenderer::new())), "/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_unmatched_paths_fall_through() {
    let dir = tempfile::tempdir().unwrap();
    touch_tileset(dir.path(), "world", 8);
    let router = router(gateway(&dir, MockRenderer::new()));

    for uri in [
        "/",
        "/tiles/world/0/0/0.png",
        "/1.0.0/world/0/0/0.gif",
        "/1.0.0/world/0/0.png",
        "/1.0.0/world/0/0/0.png/extra",
    ] {
        let response = get(router.clone(), uri).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", uri);
        assert_eq!(body_text(response).await, "Not Found", "{}", uri);
    }
}

#[tokio::test]
async fn test_cors_headers() {
    let dir = tempfile::tempdir().unwrap();
    let router = router(gateway(&dir, MockRenderer::new()));

    let request = axum::http::Request::builder()
        .uri("/health")
        .header("origin", "https://maps.example.com")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = tower::ServiceExt::oneshot(router, request).await.unwrap();

    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .unwrap(),
        "*"
    );
}

// =============================================================================
// Request Deadline
// =============================================================================

#[tokio::test]
async fn test_slow_tile_times_out_to_placeholder() {
    let dir = tempfile::tempdir().unwrap();
    touch_tileset(dir.path(), "world", 8);
    let renderer = MockRenderer::new()
        .with_result(TileFormat::Png, Ok(Some(png_tile())))
        .with_delay(Duration::from_secs(5));

    let router = create_router(
        gateway(&dir, renderer),
        RouterConfig::new()
            .with_tracing(false)
            .with_request_timeout(Duration::from_millis(50)),
    );

    let response = get(router, "/1.0.0/world/0/0/0.png").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_bytes(response).await, PLACEHOLDER);
}

#[tokio::test]
async fn test_slow_metadata_times_out_with_504() {
    let dir = tempfile::tempdir().unwrap();
    touch_tileset(dir.path(), "world", 8);
    let renderer = MockRenderer::new().with_delay(Duration::from_secs(5));

    let router = create_router(
        gateway(&dir, renderer),
        RouterConfig::new()
            .with_tracing(false)
            .with_request_timeout(Duration::from_millis(50)),
    );

    let response = get(router, "/1.0.0/world/legend.json").await;
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body_text(response).await, "Request timed out");
}
