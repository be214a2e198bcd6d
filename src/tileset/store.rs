//! Filesystem-backed tileset store.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use http::header::{HeaderName, HeaderValue, LAST_MODIFIED};
use http::HeaderMap;
use tracing::{debug, warn};

/// File extension of tileset archives.
pub const TILESET_EXTENSION: &str = "mbtiles";

/// Name of the entity tag header sent with tileset responses.
///
/// Existing tile consumers read `E-Tag` rather than the standard `ETag`.
pub const ETAG_HEADER: HeaderName = HeaderName::from_static("e-tag");

// =============================================================================
// Tileset
// =============================================================================

/// A tileset whose archive was found on disk for the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tileset {
    id: String,
    path: PathBuf,
}

impl Tileset {
    pub(crate) fn new(id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
        }
    }

    /// Tileset identifier as requested by the client.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Path of the archive file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

// =============================================================================
// Cache Metadata
// =============================================================================

/// Cache-validation data derived from a tileset file's metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheMetadata {
    /// Modification time of the archive
    pub last_modified: SystemTime,

    /// `"<size>-<mtime in epoch milliseconds>"`
    pub etag: String,
}

impl CacheMetadata {
    /// Derive cache metadata from a file size and modification time.
    pub fn new(size: u64, modified: SystemTime) -> Self {
        Self {
            last_modified: modified,
            etag: format!("{}-{}", size, epoch_millis(modified)),
        }
    }

    /// Render as `Last-Modified` and `E-Tag` response headers.
    pub fn to_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&format_http_date(self.last_modified)) {
            headers.insert(LAST_MODIFIED, value);
        }
        if let Ok(value) = HeaderValue::from_str(&self.etag) {
            headers.insert(ETAG_HEADER, value);
        }
        headers
    }
}

/// Milliseconds since the Unix epoch, negative for earlier times.
fn epoch_millis(time: SystemTime) -> i128 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(elapsed) => elapsed.as_millis() as i128,
        Err(before) => -(before.duration().as_millis() as i128),
    }
}

/// Format a timestamp as an HTTP date (`Tue, 14 Nov 2023 22:13:20 GMT`).
pub fn format_http_date(time: SystemTime) -> String {
    DateTime::<Utc>::from(time)
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

// =============================================================================
// Tileset Store
// =============================================================================

/// Resolves tileset identifiers to archive files below a storage root.
#[derive(Debug, Clone)]
pub struct TilesetStore {
    root: PathBuf,
}

impl TilesetStore {
    /// Create a store rooted at the given directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Archive path for a tileset id: `<root>/<id>.mbtiles`.
    pub fn path_for(&self, id: &str) -> PathBuf {
        self.root.join(format!("{}.{}", id, TILESET_EXTENSION))
    }

    /// Look up a tileset, returning `None` when its archive does not exist.
    ///
    /// Errors while probing the file (permissions, broken links) are treated
    /// as "does not exist".
    pub async fn open(&self, id: &str) -> Option<Tileset> {
        let path = self.path_for(id);
        match tokio::fs::try_exists(&path).await {
            Ok(true) => Some(Tileset::new(id, path)),
            Ok(false) => {
                debug!(tileset = id, path = %path.display(), "Tileset not found");
                None
            }
            Err(e) => {
                debug!(tileset = id, path = %path.display(), "Tileset probe failed: {}", e);
                None
            }
        }
    }

    /// Stat a tileset archive and derive its cache metadata.
    ///
    /// Best-effort: a failed stat is logged and yields `None` so the request
    /// continues without cache headers.
    pub async fn cache_metadata(&self, tileset: &Tileset) -> Option<CacheMetadata> {
        let stat = tokio::fs::metadata(&tileset.path)
            .await
            .and_then(|meta| meta.modified().map(|mtime| (meta.len(), mtime)));

        match stat {
            Ok((size, modified)) => Some(CacheMetadata::new(size, modified)),
            Err(e) => {
                warn!(
                    tileset = tileset.id(),
                    path = %tileset.path.display(),
                    "Failed to stat tileset, omitting cache headers: {}",
                    e
                );
                None
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
