//! Tile rendering layer.
//!
//! Rendering is delegated to a [`TileRenderer`], an opaque datasource that
//! turns `(archive path, format, coordinate)` into a payload. The gateway
//! never looks inside the archive itself.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              HTTP Handlers              │
//! └────────────────────┬────────────────────┘
//!                      │ RenderRequest
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │            RenderDispatcher             │
//! │  Ok(Some) → Success                     │
//! │  Ok(None) | "empty row" → Empty         │
//! │  Err → Error                            │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │        TileRenderer (MbtilesRenderer)   │
//! └─────────────────────────────────────────┘
//! ```

mod dispatch;
mod mbtiles;

use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use http::HeaderMap;
use serde_json::Value;

use crate::error::RenderError;

pub use dispatch::{RenderDispatcher, RenderOutcome};
pub use mbtiles::{MbtilesRenderer, DEFAULT_CONNECTION_CACHE_CAPACITY};

// =============================================================================
// Request Types
// =============================================================================

/// A tile coordinate in the TMS scheme used by `/1.0.0/` URLs.
///
/// Coordinates are signed: the URL grammar accepts a leading minus sign and
/// the values are handed to the renderer untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    /// Zoom level
    pub z: i64,

    /// Column
    pub x: i64,

    /// Row
    pub y: i64,
}

impl TileCoord {
    pub fn new(z: i64, x: i64, y: i64) -> Self {
        Self { z, x, y }
    }
}

/// Formats a tileset can be asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TileFormat {
    Png,
    Jpeg,
    GridJson,
    FormatterJson,
    LegendJson,
}

impl TileFormat {
    /// Parse an image extension from a tile URL (`png`, `jpg`, `jpeg`).
    pub fn from_image_extension(ext: &str) -> Option<Self> {
        match ext {
            "png" => Some(TileFormat::Png),
            "jpg" | "jpeg" => Some(TileFormat::Jpeg),
            _ => None,
        }
    }

    /// Canonical name of the format.
    pub fn as_str(&self) -> &'static str {
        match self {
            TileFormat::Png => "png",
            TileFormat::Jpeg => "jpeg",
            TileFormat::GridJson => "grid.json",
            TileFormat::FormatterJson => "formatter.json",
            TileFormat::LegendJson => "legend.json",
        }
    }

    /// Content type of a successful response in this format.
    pub fn content_type(&self) -> &'static str {
        match self {
            TileFormat::Png => "image/png",
            TileFormat::Jpeg => "image/jpeg",
            TileFormat::GridJson | TileFormat::FormatterJson | TileFormat::LegendJson => {
                "text/javascript"
            }
        }
    }

    /// Whether the format is a raster image.
    pub fn is_image(&self) -> bool {
        matches!(self, TileFormat::Png | TileFormat::Jpeg)
    }
}

impl std::fmt::Display for TileFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters of a single render call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    /// Archive file of the tileset
    pub path: PathBuf,

    /// Requested format
    pub format: TileFormat,

    /// Tile coordinate, present for image and grid requests
    pub coord: Option<TileCoord>,
}

impl RenderRequest {
    pub fn new(path: impl Into<PathBuf>, format: TileFormat, coord: Option<TileCoord>) -> Self {
        Self {
            path: path.into(),
            format,
            coord,
        }
    }
}

// =============================================================================
// Render Output
// =============================================================================

/// What a renderer produced.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderPayload {
    /// Encoded image bytes, passed through as-is
    Image(Bytes),

    /// Arbitrary JSON data (formatter and legend)
    Json(Value),

    /// Gzip-compressed UTF-8 grid JSON plus its auxiliary key data
    Grid { compressed: Bytes, data: Value },
}

/// A successful render result.
#[derive(Debug, Clone)]
pub struct RenderOutput {
    /// The rendered data
    pub payload: RenderPayload,

    /// Content type reported by the renderer, if any
    pub content_type: Option<String>,

    /// Additional headers reported by the renderer
    pub headers: HeaderMap,
}

impl RenderOutput {
    /// An image payload with its content type.
    pub fn image(data: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        Self {
            payload: RenderPayload::Image(data.into()),
            content_type: Some(content_type.into()),
            headers: HeaderMap::new(),
        }
    }

    /// A JSON payload.
    pub fn json(value: Value) -> Self {
        Self {
            payload: RenderPayload::Json(value),
            content_type: None,
            headers: HeaderMap::new(),
        }
    }

    /// A compressed grid payload.
    pub fn grid(compressed: impl Into<Bytes>, data: Value) -> Self {
        Self {
            payload: RenderPayload::Grid {
                compressed: compressed.into(),
                data,
            },
            content_type: None,
            headers: HeaderMap::new(),
        }
    }

    /// Attach an extra response header.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Headers this render contributes to the response: the extra headers
    /// plus `Content-Type` when the renderer reported one.
    pub fn response_headers(&self) -> HeaderMap {
        let mut headers = self.headers.clone();
        if let Some(value) = self
            .content_type
            .as_deref()
            .and_then(|ct| HeaderValue::from_str(ct).ok())
        {
            headers.insert(CONTENT_TYPE, value);
        }
        headers
    }
}

// =============================================================================
// TileRenderer Trait
// =============================================================================

/// Datasource that renders tiles, grids and metadata from a tileset archive.
///
/// `Ok(None)` means the archive holds nothing for the request. Implementations
/// may also report that case as [`RenderError::EmptyRow`]; both are treated
/// as "not found" by the dispatcher.
#[async_trait]
pub trait TileRenderer: Send + Sync {
    async fn render(&self, request: &RenderRequest) -> Result<Option<RenderOutput>, RenderError>;
}

// =============================================================================
// Tests
// =============================================================================
