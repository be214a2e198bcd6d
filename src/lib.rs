//! # MBTiles Gateway
//!
//! A read-only HTTP gateway for tilesets stored as MBTiles files on disk.
//!
//! Tiles, interaction grids ("UTFGrid") and per-tileset formatter/legend
//! metadata are served with cache-validation headers derived from the
//! archive file, so clients and proxies can hold on to them for a long time.
//!
//! ## Features
//!
//! - **Tile passthrough**: PNG/JPEG bytes are served exactly as stored
//! - **Grid splicing**: gzip-compressed grids are inflated and spliced into
//!   the response verbatim, optionally wrapped for JSONP
//! - **Uniform failure policy**: missing tilesets and failed tiles get a
//!   placeholder image, metadata and grid failures get plain-text bodies
//! - **Archive downloads**: optional `/download/<tileset>.mbtiles`
//!
//! ## Architecture
//!
//! - [`tileset`] - Tileset resolution and cache headers
//! - [`render`] - Renderer trait, outcome normalization, MBTiles renderer
//! - [`gateway`] - Request pipeline and response composition
//! - [`server`] - Axum router, handlers and path matching
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use mbtiles_gateway::{
//!     create_router, MbtilesRenderer, Placeholder, RouterConfig, TileGateway, TilesetStore,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let gateway = TileGateway::new(
//!         TilesetStore::new("/srv/tiles"),
//!         MbtilesRenderer::new(),
//!         Placeholder::generated()?,
//!     );
//!     let router = create_router(gateway, RouterConfig::new());
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(listener, router).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod gateway;
pub mod render;
pub mod server;
pub mod tileset;

// Re-export commonly used types
pub use config::Config;
pub use error::{GridError, PlaceholderError, RenderError};
pub use gateway::{
    compose_grid_response, grid_body, inflate_grid, is_valid_callback, merge_headers,
    GatewayResponse, GridBodyWriter, Placeholder, ResponseEnvelope, Route, RouteKind,
    TileGateway, TileRequest,
};
pub use render::{
    MbtilesRenderer, RenderDispatcher, RenderOutcome, RenderOutput, RenderPayload, RenderRequest,
    TileCoord, TileFormat, TileRenderer,
};
pub use server::{
    create_router, gateway_handler, health_handler, AppState, HealthResponse, PathMatcher,
    RouterConfig,
};
pub use tileset::{CacheMetadata, Tileset, TilesetStore, ETAG_HEADER};
