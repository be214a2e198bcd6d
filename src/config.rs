//! Configuration management for the MBTiles gateway.
//!
//! Configuration comes from:
//! - Command-line arguments via clap
//! - Environment variables with the `MBTILES_` prefix
//! - Defaults for everything except the tileset directory
//!
//! # Example
//!
//! ```ignore
//! use clap::Parser;
//! use mbtiles_gateway::config::Config;
//!
//! let config = Config::parse();
//! config.validate()?;
//! println!("Serving {} on {}", config.tiles.display(), config.bind_address());
//! ```
//!
//! # Environment Variables
//!
//! - `MBTILES_HOST` - Server bind address (default: 0.0.0.0)
//! - `MBTILES_PORT` - Server port (default: 3000)
//! - `MBTILES_TILES` - Directory holding `<tileset>.mbtiles` files (required)
//! - `MBTILES_ENABLE_DOWNLOAD` - Register the archive download route
//! - `MBTILES_HEADERS` - Default response headers, `;`-separated `Name: value`
//! - `MBTILES_ERROR_TILE` - PNG served for missing tiles
//! - `MBTILES_REQUEST_TIMEOUT` - Per-request deadline in seconds (default: 30)
//! - `MBTILES_CACHE_CONNECTIONS` - Open archives kept by the renderer (default: 64)
//! - `MBTILES_CORS_ORIGINS` - Allowed CORS origins, comma-separated

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use http::header::{HeaderName, HeaderValue};
use http::HeaderMap;

use crate::render::DEFAULT_CONNECTION_CACHE_CAPACITY;

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default response header sent with every successful response.
pub const DEFAULT_HEADER: &str = "Cache-Control: max-age=3600";

/// Default request deadline in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// CLI Arguments
// =============================================================================

/// MBTiles Gateway - serves tiles, grids and archives from MBTiles files.
///
/// Every `<name>.mbtiles` file in the tiles directory is published as the
/// tileset `<name>` under `/1.0.0/<name>/`.
#[derive(Parser, Debug, Clone)]
#[command(name = "mbtiles-gateway")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "MBTILES_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "MBTILES_PORT")]
    pub port: u16,

    /// Per-request deadline in seconds.
    #[arg(long, default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS, env = "MBTILES_REQUEST_TIMEOUT")]
    pub request_timeout: u64,

    // =========================================================================
    // Tileset Configuration
    // =========================================================================
    /// Directory containing `.mbtiles` tilesets.
    #[arg(short, long, env = "MBTILES_TILES")]
    pub tiles: PathBuf,

    /// Register `/download/<tileset>.mbtiles`.
    #[arg(long, default_value_t = false, env = "MBTILES_ENABLE_DOWNLOAD")]
    pub enable_download: bool,

    /// PNG served with every `404` on image routes.
    ///
    /// If not specified, a blank 256x256 tile is generated at startup.
    #[arg(long, env = "MBTILES_ERROR_TILE")]
    pub error_tile: Option<PathBuf>,

    /// Maximum number of archives the renderer keeps open.
    #[arg(long, default_value_t = DEFAULT_CONNECTION_CACHE_CAPACITY, env = "MBTILES_CACHE_CONNECTIONS")]
    pub cache_connections: usize,

    // =========================================================================
    // Response Headers
    // =========================================================================
    /// Default response header as `Name: value` (repeatable).
    ///
    /// Render-supplied headers override these; these override the derived
    /// `Last-Modified` and `E-Tag` headers.
    #[arg(
        long = "header",
        default_value = DEFAULT_HEADER,
        env = "MBTILES_HEADERS",
        value_delimiter = ';'
    )]
    pub headers: Vec<String>,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "MBTILES_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.tiles.as_os_str().is_empty() {
            return Err("Tiles directory is required. Set --tiles or MBTILES_TILES".to_string());
        }
        if !self.tiles.is_dir() {
            return Err(format!(
                "Tiles directory {} does not exist or is not a directory",
                self.tiles.display()
            ));
        }

        if self.cache_connections == 0 {
            return Err("cache_connections must be greater than 0".to_string());
        }

        if self.request_timeout == 0 {
            return Err("request_timeout must be greater than 0".to_string());
        }

        if let Some(path) = &self.error_tile {
            if !path.is_file() {
                return Err(format!("Error tile {} does not exist", path.display()));
            }
        }

        self.header_defaults().map(|_| ())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The request deadline.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    /// Parse the configured `Name: value` headers.
    ///
    /// Blank entries are skipped. A repeated name replaces the earlier value.
    pub fn header_defaults(&self) -> Result<HeaderMap, String> {
        let mut headers = HeaderMap::new();
        for entry in self.headers.iter().map(|h| h.trim()).filter(|h| !h.is_empty()) {
            let (name, value) = parse_header(entry)?;
            headers.insert(name, value);
        }
        Ok(headers)
    }
}

/// Parse one `Name: value` header entry.
fn parse_header(entry: &str) -> Result<(HeaderName, HeaderValue), String> {
    let (name, value) = entry
        .split_once(':')
        .ok_or_else(|| format!("Invalid header '{}': expected 'Name: value'", entry))?;

    let name = HeaderName::from_bytes(name.trim().as_bytes())
        .map_err(|e| format!("Invalid header name in '{}': {}", entry, e))?;
    let value = HeaderValue::from_str(value.trim())
        .map_err(|e| format!("Invalid header value in '{}': {}", entry, e))?;

    Ok((name, value))
}

// =============================================================================
// Tests
// =============================================================================
