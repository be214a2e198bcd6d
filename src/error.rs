use thiserror::Error;

/// Errors reported by a tile renderer.
///
/// The `Display` text of these errors is what clients see in the body of a
/// `500` response on the formatter, legend and grid routes.
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    /// The archive has no row for the requested tile or metadata key
    #[error("empty row")]
    EmptyRow,

    /// The archive file could not be found when opening it
    #[error("Tileset not found: {0}")]
    NotFound(String),

    /// Error reported by SQLite while opening or querying the archive
    #[error("SQLite error: {0}")]
    Sqlite(String),

    /// Filesystem error while accessing the archive
    #[error("I/O error: {0}")]
    Io(String),

    /// The archive contains data that cannot be served
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// The caller stopped waiting and the query was aborted
    #[error("Render cancelled")]
    Cancelled,
}

impl RenderError {
    /// Whether this error means "nothing stored here" rather than a failure.
    pub fn is_empty_row(&self) -> bool {
        matches!(self, RenderError::EmptyRow)
    }
}

impl From<rusqlite::Error> for RenderError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::QueryReturnedNoRows => RenderError::EmptyRow,
            other => RenderError::Sqlite(other.to_string()),
        }
    }
}

impl From<std::io::Error> for RenderError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            RenderError::NotFound(err.to_string())
        } else {
            RenderError::Io(err.to_string())
        }
    }
}

/// Errors that can occur while inflating a stored interaction grid.
#[derive(Debug, Clone, Error)]
pub enum GridError {
    /// The gzip stream is corrupt or truncated
    #[error("Grid decompression failed: {0}")]
    Decompress(String),

    /// The inflated grid is not valid UTF-8 text
    #[error("Grid is not valid UTF-8")]
    Utf8,

    /// The grid data could not be serialized
    #[error("Grid data serialization failed: {0}")]
    Serialize(String),
}

/// Errors raised while preparing the error placeholder tile at startup.
#[derive(Debug, Error)]
pub enum PlaceholderError {
    /// The configured placeholder file could not be read
    #[error("Failed to read placeholder tile {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The configured placeholder file is empty
    #[error("Placeholder tile {0} is empty")]
    Empty(String),

    /// The built-in placeholder could not be encoded
    #[error("Failed to encode placeholder tile: {0}")]
    Encode(String),
}
