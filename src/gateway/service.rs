//! The request-to-response pipeline.

use std::path::PathBuf;

use http::header::{HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, StatusCode};
use serde_json::{Map, Value};
use tracing::{debug, error, warn};

use crate::render::{
    RenderDispatcher, RenderOutcome, RenderPayload, TileCoord, TileFormat, TileRenderer,
};
use crate::tileset::{Tileset, TilesetStore};

use super::grid::{compose_grid_response, is_valid_callback};
use super::placeholder::Placeholder;
use super::response::{merge_headers, overlay_headers, ResponseEnvelope};

// =============================================================================
// Request Types
// =============================================================================

/// Which kind of resource a request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteKind {
    Tile,
    Grid,
    Formatter,
    Legend,
    Download,
}

/// A matched route with its typed parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// `/1.0.0/<tileset>/<z>/<x>/<y>.(png|jpg|jpeg)`
    Tile { coord: TileCoord, format: TileFormat },

    /// `/1.0.0/<tileset>/<z>/<x>/<y>.grid.json`
    Grid { coord: TileCoord },

    /// `/1.0.0/<tileset>/formatter.json`
    Formatter,

    /// `/1.0.0/<tileset>/legend.json`
    Legend,

    /// `/download/<tileset>.mbtiles`
    Download,
}

impl Route {
    pub fn kind(&self) -> RouteKind {
        match self {
            Route::Tile { .. } => RouteKind::Tile,
            Route::Grid { .. } => RouteKind::Grid,
            Route::Formatter => RouteKind::Formatter,
            Route::Legend => RouteKind::Legend,
            Route::Download => RouteKind::Download,
        }
    }

    /// Format handed to the renderer; `None` for downloads.
    pub fn format(&self) -> Option<TileFormat> {
        match self {
            Route::Tile { format, .. } => Some(*format),
            Route::Grid { .. } => Some(TileFormat::GridJson),
            Route::Formatter => Some(TileFormat::FormatterJson),
            Route::Legend => Some(TileFormat::LegendJson),
            Route::Download => None,
        }
    }

    /// Tile coordinate, present for tile and grid routes only.
    pub fn coord(&self) -> Option<TileCoord> {
        match self {
            Route::Tile { coord, .. } | Route::Grid { coord } => Some(*coord),
            _ => None,
        }
    }
}

/// A parsed gateway request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileRequest {
    /// Tileset identifier, without the `.mbtiles` extension
    pub tileset: String,

    /// Matched route
    pub route: Route,

    /// JSONP callback name (grid requests only)
    pub callback: Option<String>,
}

impl TileRequest {
    pub fn new(tileset: impl Into<String>, route: Route) -> Self {
        Self {
            tileset: tileset.into(),
            route,
            callback: None,
        }
    }

    /// Attach a JSONP callback.
    pub fn with_callback(mut self, callback: impl Into<String>) -> Self {
        self.callback = Some(callback.into());
        self
    }
}

/// What the HTTP layer should send back.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayResponse {
    /// A fully composed response
    Envelope(ResponseEnvelope),

    /// Stream this archive file as-is
    File(PathBuf),
}

impl From<ResponseEnvelope> for GatewayResponse {
    fn from(envelope: ResponseEnvelope) -> Self {
        GatewayResponse::Envelope(envelope)
    }
}

// =============================================================================
// Tile Gateway
// =============================================================================

/// Turns a [`TileRequest`] into a response.
///
/// ```text
/// open tileset ─► validate callback ─► stat ─► render ─► compose
///      │                  │              │
/// 404 placeholder        400             └─ failure: no cache headers
/// ```
pub struct TileGateway<R: TileRenderer> {
    store: TilesetStore,
    dispatcher: RenderDispatcher<R>,
    placeholder: Placeholder,
    header_defaults: HeaderMap,
}

impl<R: TileRenderer> TileGateway<R> {
    /// Create a gateway with no deployment default headers.
    pub fn new(store: TilesetStore, renderer: R, placeholder: Placeholder) -> Self {
        Self {
            store,
            dispatcher: RenderDispatcher::new(renderer),
            placeholder,
            header_defaults: HeaderMap::new(),
        }
    }

    /// Set the deployment default headers merged into successful responses.
    pub fn with_header_defaults(mut self, headers: HeaderMap) -> Self {
        self.header_defaults = headers;
        self
    }

    /// Run the full pipeline for one request.
    pub async fn handle(&self, request: &TileRequest) -> GatewayResponse {
        let Some(tileset) = self.store.open(&request.tileset).await else {
            return self.placeholder_response().into();
        };

        self.respond(&tileset, request).await
    }

    /// Everything after the tileset lookup.
    async fn respond(&self, tileset: &Tileset, request: &TileRequest) -> GatewayResponse {
        if let Some(callback) = &request.callback {
            if !is_valid_callback(callback) {
                warn!(tileset = %request.tileset, "Rejected JSONP callback");
                return ResponseEnvelope::text(StatusCode::BAD_REQUEST, "Invalid callback").into();
            }
        }

        let envelope = match request.route {
            Route::Download => return GatewayResponse::File(tileset.path().to_path_buf()),
            Route::Tile { coord, format } => {
                let cache_headers = self.cache_headers(tileset).await;
                let outcome = self.dispatcher.dispatch(tileset, format, Some(coord)).await;
                self.tile_response(format, outcome, &cache_headers)
            }
            Route::Grid { coord } => {
                let cache_headers = self.cache_headers(tileset).await;
                let outcome = self
                    .dispatcher
                    .dispatch(tileset, TileFormat::GridJson, Some(coord))
                    .await;
                self.grid_response(outcome, request.callback.as_deref(), &cache_headers)
            }
            Route::Formatter | Route::Legend => {
                let format = match request.route {
                    Route::Legend => TileFormat::LegendJson,
                    _ => TileFormat::FormatterJson,
                };
                let cache_headers = self.cache_headers(tileset).await;
                let outcome = self.dispatcher.dispatch(tileset, format, None).await;
                self.metadata_response(format, outcome, &cache_headers)
            }
        };

        envelope.into()
    }

    /// Response sent when the request deadline passes.
    ///
    /// Image routes keep their placeholder contract; everything else gets
    /// `504 Gateway Timeout`.
    pub fn timed_out(&self, request: &TileRequest) -> ResponseEnvelope {
        match request.route.kind() {
            RouteKind::Tile => self.placeholder_response(),
            _ => ResponseEnvelope::text(StatusCode::GATEWAY_TIMEOUT, "Request timed out"),
        }
    }

    /// Cache headers for a tileset, empty when the stat fails.
    async fn cache_headers(&self, tileset: &Tileset) -> HeaderMap {
        self.store
            .cache_metadata(tileset)
            .await
            .map(|meta| meta.to_headers())
            .unwrap_or_default()
    }

    fn placeholder_response(&self) -> ResponseEnvelope {
        ResponseEnvelope::placeholder(&self.placeholder)
    }

    fn tile_response(
        &self,
        format: TileFormat,
        outcome: RenderOutcome,
        cache_headers: &HeaderMap,
    ) -> ResponseEnvelope {
        let output = match outcome {
            RenderOutcome::Success(output) => output,
            RenderOutcome::Empty => return self.placeholder_response(),
            RenderOutcome::Error(e) => {
                warn!(format = %format, "Tile render failed, serving placeholder: {}", e);
                return self.placeholder_response();
            }
        };

        let data = match &output.payload {
            RenderPayload::Image(data) => data.clone(),
            RenderPayload::Json(_) | RenderPayload::Grid { .. } => {
                warn!(format = %format, "Renderer returned a non-image payload");
                return self.placeholder_response();
            }
        };

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(format.content_type()));
        overlay_headers(
            &mut headers,
            &merge_headers(cache_headers, &self.header_defaults, &output.response_headers()),
        );

        ResponseEnvelope::new(StatusCode::OK, headers, data)
    }

    fn metadata_response(
        &self,
        format: TileFormat,
        outcome: RenderOutcome,
        cache_headers: &HeaderMap,
    ) -> ResponseEnvelope {
        let output = match outcome {
            RenderOutcome::Success(output) => output,
            RenderOutcome::Empty => {
                debug!(format = %format, "Metadata not found");
                return ResponseEnvelope::text(
                    StatusCode::NOT_FOUND,
                    format!("{} not found", format.as_str()),
                );
            }
            RenderOutcome::Error(e) => return server_error(e.to_string()),
        };

        let data = match output.payload {
            RenderPayload::Json(value) => value,
            RenderPayload::Image(_) | RenderPayload::Grid { .. } => {
                return server_error(format!("Unexpected payload for {}", format));
            }
        };

        // "formatter.json" -> "formatter"
        let key = format.as_str().split('.').next().unwrap_or_default();
        let mut object = Map::new();
        object.insert(key.to_string(), data);

        let body = match serde_json::to_vec(&Value::Object(object)) {
            Ok(body) => body,
            Err(e) => return server_error(e.to_string()),
        };

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(format.content_type()));
        overlay_headers(
            &mut headers,
            &merge_headers(cache_headers, &self.header_defaults, &HeaderMap::new()),
        );

        ResponseEnvelope::new(StatusCode::OK, headers, body)
    }

    fn grid_response(
        &self,
        outcome: RenderOutcome,
        callback: Option<&str>,
        cache_headers: &HeaderMap,
    ) -> ResponseEnvelope {
        let output = match outcome {
            RenderOutcome::Success(output) => output,
            RenderOutcome::Empty => {
                debug!("Grid not found");
                return ResponseEnvelope::text(StatusCode::NOT_FOUND, "Grid not found");
            }
            RenderOutcome::Error(e) => return server_error(e.to_string()),
        };

        let (compressed, data) = match &output.payload {
            RenderPayload::Grid { compressed, data } if !compressed.is_empty() => {
                (compressed, data)
            }
            RenderPayload::Grid { .. } => {
                return ResponseEnvelope::text(StatusCode::NOT_FOUND, "Grid not found");
            }
            RenderPayload::Image(_) | RenderPayload::Json(_) => {
                return server_error("Unexpected payload for grid.json".to_string());
            }
        };

        match compose_grid_response(
            compressed,
            data,
            callback,
            cache_headers,
            &self.header_defaults,
        ) {
            Ok(envelope) => envelope,
            Err(e) => server_error(e.to_string()),
        }
    }
}

fn server_error(message: String) -> ResponseEnvelope {
    error!(status = 500, "Server error: {}", message);
    ResponseEnvelope::text(StatusCode::INTERNAL_SERVER_ERROR, message)
}

// =============================================================================
// Tests
// =============================================================================
