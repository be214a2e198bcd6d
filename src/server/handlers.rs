//! HTTP request handlers for the tile gateway.
//!
//! # Endpoints
//!
//! - `GET /1.0.0/...` - Tiles, grids, formatter and legend
//! - `GET /download/{tileset}.mbtiles` - Raw archive download (when enabled)
//! - `GET /health` - Health check endpoint
//!
//! Gateway paths are matched by [`PathMatcher`] rather than by axum route
//! parameters, so tileset ids containing dots are handled uniformly.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{Query, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::{debug, warn};

use crate::gateway::{GatewayResponse, ResponseEnvelope, TileGateway};
use crate::render::TileRenderer;

use super::matcher::PathMatcher;

/// Default per-request deadline.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// =============================================================================
// Application State
// =============================================================================

/// Shared application state containing the tile gateway.
///
/// This is passed to all handlers via Axum's State extractor.
pub struct AppState<R: TileRenderer> {
    /// The gateway running the request pipeline
    pub gateway: Arc<TileGateway<R>>,

    /// Route table for gateway paths
    pub matcher: PathMatcher,

    /// Deadline for a single gateway request
    pub request_timeout: Duration,
}

impl<R: TileRenderer> AppState<R> {
    /// Create application state with the download route disabled and the
    /// default request timeout.
    pub fn new(gateway: TileGateway<R>) -> Self {
        Self {
            gateway: Arc::new(gateway),
            matcher: PathMatcher::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Use the given path matcher.
    pub fn with_matcher(mut self, matcher: PathMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    /// Set the per-request deadline.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

impl<R: TileRenderer> Clone for AppState<R> {
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
            matcher: self.matcher,
            request_timeout: self.request_timeout,
        }
    }
}

// =============================================================================
// Request Parameters
// =============================================================================

/// Query parameters for gateway requests.
#[derive(Debug, Default, Deserialize)]
pub struct GatewayQueryParams {
    /// JSONP callback name (grid requests only)
    #[serde(default)]
    pub callback: Option<String>,
}

// =============================================================================
// Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle tile, grid, formatter, legend and download requests.
///
/// # Response
///
/// - `200 OK`: Tile bytes, grid body, metadata object or archive file
/// - `400 Bad Request`: Invalid JSONP callback
/// - `404 Not Found`: Placeholder PNG (missing tileset or failed tile), or a
///   plain-text message for empty grids and metadata
/// - `500 Internal Server Error`: Grid or metadata render failure
/// - `504 Gateway Timeout`: Non-image request exceeded the deadline
pub async fn gateway_handler<R: TileRenderer + 'static>(
    State(state): State<AppState<R>>,
    request: Request,
) -> Response {
    let query = Query::<GatewayQueryParams>::try_from_uri(request.uri())
        .map(|Query(params)| params)
        .unwrap_or_default();

    let Some(tile_request) = state
        .matcher
        .match_path(request.uri().path(), query.callback.as_deref())
    else {
        debug!(path = %request.uri().path(), "No gateway route matched");
        return not_found_handler().await.into_response();
    };

    let handled = tokio::time::timeout(
        state.request_timeout,
        state.gateway.handle(&tile_request),
    )
    .await;

    let response = match handled {
        Ok(response) => response,
        Err(_) => {
            warn!(
                tileset = %tile_request.tileset,
                kind = ?tile_request.route.kind(),
                timeout_ms = state.request_timeout.as_millis() as u64,
                "Request timed out"
            );
            state.gateway.timed_out(&tile_request).into()
        }
    };

    match response {
        GatewayResponse::Envelope(envelope) => {
            debug!(
                tileset = %tile_request.tileset,
                kind = ?tile_request.route.kind(),
                status = envelope.status.as_u16(),
                "Gateway response"
            );
            envelope.into_response()
        }
        GatewayResponse::File(path) => serve_file(path, request).await,
    }
}

/// Stream an archive file, with range and conditional request support.
async fn serve_file(path: PathBuf, request: Request) -> Response {
    debug!(path = %path.display(), "Serving archive download");
    match ServeFile::new(path).oneshot(request).await {
        Ok(response) => response.map(Body::new),
        Err(never) => match never {},
    }
}

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response
///
/// `200 OK` with JSON body:
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0"
/// }
/// ```
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Fallback for paths no route handles.
pub async fn not_found_handler() -> ResponseEnvelope {
    ResponseEnvelope::text(StatusCode::NOT_FOUND, "Not Found")
}

// =============================================================================
// Tests
// =============================================================================
