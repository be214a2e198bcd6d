//! The error placeholder tile.
//!
//! Loaded once before serving starts and shared read-only by every request
//! that ends in a missing tileset or a failed image render.

use std::io::Cursor;
use std::path::Path;

use bytes::Bytes;
use image::{ImageFormat, Rgba, RgbaImage};

use crate::error::PlaceholderError;

/// Edge length of the generated placeholder, in pixels.
pub const PLACEHOLDER_TILE_SIZE: u32 = 256;

/// Fill colour of the generated placeholder.
const PLACEHOLDER_FILL: Rgba<u8> = Rgba([0xee, 0xee, 0xee, 0xff]);

/// Immutable placeholder image bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    data: Bytes,
}

impl Placeholder {
    /// Content type the placeholder is always served with.
    pub const CONTENT_TYPE: &'static str = "image/png";

    /// Wrap already-loaded image bytes.
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    /// Read the placeholder from a PNG file.
    pub async fn load(path: &Path) -> Result<Self, PlaceholderError> {
        let data = tokio::fs::read(path)
            .await
            .map_err(|source| PlaceholderError::Read {
                path: path.display().to_string(),
                source,
            })?;

        if data.is_empty() {
            return Err(PlaceholderError::Empty(path.display().to_string()));
        }

        Ok(Self::from_bytes(data))
    }

    /// Encode a plain light-grey tile.
    pub fn generated() -> Result<Self, PlaceholderError> {
        let tile = RgbaImage::from_pixel(
            PLACEHOLDER_TILE_SIZE,
            PLACEHOLDER_TILE_SIZE,
            PLACEHOLDER_FILL,
        );

        let mut png = Cursor::new(Vec::new());
        tile.write_to(&mut png, ImageFormat::Png)
            .map_err(|e| PlaceholderError::Encode(e.to_string()))?;

        Ok(Self::from_bytes(png.into_inner()))
    }

    /// The image bytes.
    pub fn bytes(&self) -> &Bytes {
        &self.data
    }
}
