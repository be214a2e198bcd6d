//! Tile gateway core.
//!
//! Everything between a matched route and a finished response lives here:
//! tileset validation, cache headers, render outcome handling and the two
//! response compositions (image passthrough and grid splicing).
//!
//! # Pipeline
//!
//! ```text
//! TileRequest
//!     │
//!     ▼
//! ┌───────────────┐  missing   ┌──────────────────────┐
//! │ TilesetStore  │──────────► │ 404 placeholder PNG  │
//! └──────┬────────┘            └──────────────────────┘
//!        │ Tileset
//!        ▼
//! ┌───────────────┐  stat failed: continue without cache headers
//! │ CacheMetadata │
//! └──────┬────────┘
//!        ▼
//! ┌────────────────────┐
//! │ RenderDispatcher   │ Success | Empty | Error
//! └──────┬─────────────┘
//!        ▼
//! ┌────────────────────┐   ┌──────────────────────┐
//! │ tile / metadata    │   │ compose_grid_response│
//! │ ResponseEnvelope   │   │ (inflate + JSONP)    │
//! └────────────────────┘   └──────────────────────┘
//! ```

mod grid;
mod placeholder;
mod response;
mod service;

pub use grid::{
    compose_grid_response, grid_body, inflate_grid, is_valid_callback, GridBodyWriter,
    MAX_CALLBACK_LEN, MAX_GRID_SIZE,
};
pub use placeholder::{Placeholder, PLACEHOLDER_TILE_SIZE};
pub use response::{merge_headers, ResponseEnvelope};
pub use service::{GatewayResponse, Route, RouteKind, TileGateway, TileRequest};
