//! Router configuration for the tile gateway.
//!
//! This module defines the HTTP routes and applies middleware for CORS and
//! request tracing.
//!
//! # Route Structure
//!
//! ```text
//! /health                                   - Health check
//! /1.0.0/{tileset}/{z}/{x}/{y}.{png|jpg}    - Tile
//! /1.0.0/{tileset}/{z}/{x}/{y}.grid.json    - Interaction grid (JSONP)
//! /1.0.0/{tileset}/{formatter|legend}.json  - Tileset metadata
//! /download/{tileset}.mbtiles               - Archive download (optional)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use mbtiles_gateway::gateway::{Placeholder, TileGateway};
//! use mbtiles_gateway::render::MbtilesRenderer;
//! use mbtiles_gateway::server::{create_router, RouterConfig};
//! use mbtiles_gateway::tileset::TilesetStore;
//!
//! let gateway = TileGateway::new(
//!     TilesetStore::new("/srv/tiles"),
//!     MbtilesRenderer::new(),
//!     Placeholder::generated()?,
//! );
//!
//! let config = RouterConfig::new()
//!     .with_download(true)
//!     .with_cors_origins(vec!["https://example.com".to_string()]);
//!
//! let router = create_router(gateway, config);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::time::Duration;

use axum::{routing::get, Router};
use http::header::CONTENT_TYPE;
use http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    gateway_handler, health_handler, not_found_handler, AppState, DEFAULT_REQUEST_TIMEOUT,
};
use super::matcher::PathMatcher;
use crate::gateway::TileGateway;
use crate::render::TileRenderer;

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Clone, Debug)]
pub struct RouterConfig {
    /// Whether the `/download` route is registered
    pub enable_download: bool,

    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Whether to enable request tracing
    pub enable_tracing: bool,

    /// Deadline for a single gateway request
    pub request_timeout: Duration,
}

impl RouterConfig {
    /// Create a new router configuration.
    ///
    /// By default:
    /// - The download route is disabled
    /// - CORS allows any origin
    /// - Tracing is enabled
    /// - Requests time out after 30 seconds
    pub fn new() -> Self {
        Self {
            enable_download: false,
            cors_origins: None,
            enable_tracing: true,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Enable or disable the archive download route.
    pub fn with_download(mut self, enabled: bool) -> Self {
        self.enable_download = enabled;
        self
    }

    /// Set specific allowed CORS origins.
    ///
    /// Pass an empty vec to disallow all cross-origin requests.
    /// Pass None (or don't call this method) to allow any origin.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    /// Allow any CORS origin.
    pub fn with_cors_any_origin(mut self) -> Self {
        self.cors_origins = None;
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }

    /// Set the per-request deadline.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the main application router.
///
/// This function builds the complete Axum router with:
/// - The health check
/// - The `/1.0.0` tile API
/// - The `/download` route, only when enabled
/// - A plain-text `404` fallback
/// - CORS configuration
/// - Request tracing (optional)
pub fn create_router<R>(gateway: TileGateway<R>, config: RouterConfig) -> Router
where
    R: TileRenderer + 'static,
{
    let app_state = AppState::new(gateway)
        .with_matcher(PathMatcher::new(config.enable_download))
        .with_request_timeout(config.request_timeout);

    let cors = build_cors_layer(&config);

    let mut router = Router::new()
        .route("/health", get(health_handler))
        .route("/1.0.0/{*path}", get(gateway_handler::<R>));

    if config.enable_download {
        router = router.route("/download/{*path}", get(gateway_handler::<R>));
    }

    let router = router
        .fallback(not_found_handler)
        .with_state(app_state)
        .layer(cors);

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(86400)); // 24 hours

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let parsed_origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed_origins)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
