//! Interaction grid responses.
//!
//! Grids are stored as gzip-compressed, already-encoded UTF-8 JSON. The
//! inflated text is spliced into the response verbatim; only the auxiliary
//! `grid_data` value is serialized here. Running the grid through a JSON
//! encoder again would re-escape its multi-byte sequences.
//!
//! ```text
//! [callback(]{"grid":<inflated grid text>,"grid_data":<grid data JSON>}[);]
//! ```

use std::io::Read;

use bytes::Bytes;
use flate2::read::MultiGzDecoder;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, StatusCode};
use serde::Serialize;
use serde_json::Value;

use crate::error::GridError;

use super::response::{merge_headers, overlay_headers, ResponseEnvelope};

/// Longest JSONP callback name accepted.
pub const MAX_CALLBACK_LEN: usize = 128;

/// Largest inflated grid served.
pub const MAX_GRID_SIZE: usize = 16 * 1024 * 1024;

/// Inflate a gzip-compressed grid into UTF-8 text.
///
/// Every gzip member in the stream is decoded, as `gunzip` does.
pub fn inflate_grid(compressed: &[u8]) -> Result<String, GridError> {
    inflate_grid_bounded(compressed, MAX_GRID_SIZE)
}

fn inflate_grid_bounded(compressed: &[u8], limit: usize) -> Result<String, GridError> {
    let mut inflated = Vec::with_capacity(compressed.len().saturating_mul(4).min(limit));
    MultiGzDecoder::new(compressed)
        .take(limit as u64 + 1)
        .read_to_end(&mut inflated)
        .map_err(|e| GridError::Decompress(e.to_string()))?;

    if inflated.len() > limit {
        return Err(GridError::Decompress(format!(
            "grid exceeds {} bytes",
            limit
        )));
    }

    String::from_utf8(inflated).map_err(|_| GridError::Utf8)
}

/// Whether `callback` is safe to echo as a JSONP function name.
///
/// Accepts dotted JavaScript identifier paths such as `cb`, `$.jsonp_17` or
/// `window.grid.load`.
pub fn is_valid_callback(callback: &str) -> bool {
    if callback.is_empty() || callback.len() > MAX_CALLBACK_LEN {
        return false;
    }

    callback.split('.').all(|part| {
        let mut chars = part.chars();
        match chars.next() {
            Some(first) if first.is_ascii_alphabetic() || first == '_' || first == '$' => chars
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$'),
            _ => false,
        }
    })
}

// =============================================================================
// Grid Body Writer
// =============================================================================

/// Builds a response body from raw JSON fragments and serialized values.
///
/// Raw fragments are written byte-for-byte and must already be valid in
/// their position; values go through `serde_json`.
#[derive(Debug, Default)]
pub struct GridBodyWriter {
    buf: Vec<u8>,
}

impl GridBodyWriter {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Append a pre-encoded fragment verbatim.
    pub fn raw(&mut self, fragment: &str) -> &mut Self {
        self.buf.extend_from_slice(fragment.as_bytes());
        self
    }

    /// Append `value` serialized as JSON.
    pub fn value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<&mut Self, GridError> {
        serde_json::to_writer(&mut self.buf, value)
            .map_err(|e| GridError::Serialize(e.to_string()))?;
        Ok(self)
    }

    pub fn finish(self) -> Bytes {
        Bytes::from(self.buf)
    }
}

/// Assemble a grid body, JSONP-wrapped when `callback` is given.
pub fn grid_body(grid: &str, data: &Value, callback: Option<&str>) -> Result<Bytes, GridError> {
    let mut writer = GridBodyWriter::with_capacity(grid.len() + 64);

    if let Some(callback) = callback {
        writer.raw(callback).raw("(");
    }
    writer.raw("{\"grid\":").raw(grid).raw(",\"grid_data\":");
    writer.value(data)?;
    writer.raw("}");
    if callback.is_some() {
        writer.raw(");");
    }

    Ok(writer.finish())
}

/// Compose the `200` response for a rendered grid.
///
/// The grid is fully inflated before the envelope exists, so a corrupt
/// stream produces an error instead of a half-written body.
pub fn compose_grid_response(
    compressed: &[u8],
    data: &Value,
    callback: Option<&str>,
    cache_headers: &HeaderMap,
    header_defaults: &HeaderMap,
) -> Result<ResponseEnvelope, GridError> {
    let grid = inflate_grid(compressed)?;
    let body = grid_body(&grid, data, callback)?;

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/javascript"));
    overlay_headers(
        &mut headers,
        &merge_headers(cache_headers, header_defaults, &HeaderMap::new()),
    );

    Ok(ResponseEnvelope::new(StatusCode::OK, headers, body))
}

// =============================================================================
// Tests
// =============================================================================
