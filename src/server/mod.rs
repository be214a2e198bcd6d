//! HTTP server layer for the tile gateway.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │          GET /1.0.0/...          GET /download/...              │
//! │                                                                 │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────────┐  │
//! │  │  matcher    │  │  handlers   │  │        routes           │  │
//! │  │ (route tbl) │  │ (requests)  │  │  (router config)        │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//!                          TileGateway
//! ```

pub mod handlers;
pub mod matcher;
pub mod routes;

pub use handlers::{
    gateway_handler, health_handler, not_found_handler, AppState, GatewayQueryParams,
    HealthResponse, DEFAULT_REQUEST_TIMEOUT,
};
pub use matcher::{PathMatcher, DOWNLOAD_PREFIX, TILE_API_PREFIX};
pub use routes::{create_router, RouterConfig};
