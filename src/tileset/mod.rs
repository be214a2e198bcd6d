//! Tileset resolution and cache-validation metadata.
//!
//! A tileset is a single `<id>.mbtiles` file below the configured storage
//! root. Every request resolves its tileset afresh:
//!
//! ```text
//! ┌──────────────┐   exists?   ┌──────────────┐    stat    ┌───────────────┐
//! │ tileset id   │ ──────────▶ │   Tileset    │ ─────────▶ │ CacheMetadata │
//! │ "world.v2"   │             │ (id, path)   │            │ (mtime, etag) │
//! └──────────────┘             └──────────────┘            └───────────────┘
//! ```
//!
//! Nothing here is cached between requests, so replacing a file on disk is
//! picked up by the very next request.

mod store;

pub use store::{format_http_date, CacheMetadata, Tileset, TilesetStore, ETAG_HEADER, TILESET_EXTENSION};
