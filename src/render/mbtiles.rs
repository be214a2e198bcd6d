//! MBTiles-backed renderer.
//!
//! Reads the standard MBTiles SQLite schema:
//!
//! | Table       | Columns                                                        |
//! |-------------|----------------------------------------------------------------|
//! | `tiles`     | `zoom_level`, `tile_column`, `tile_row`, `tile_data`           |
//! | `grids`     | `zoom_level`, `tile_column`, `tile_row`, `grid` (gzip)         |
//! | `grid_data` | `zoom_level`, `tile_column`, `tile_row`, `key_name`, `key_json`|
//! | `metadata`  | `name`, `value`                                                |
//!
//! Rows are addressed with TMS coordinates, which is what `/1.0.0/` URLs
//! carry, so coordinates are passed through unchanged.
//!
//! Opened connections are kept in an LRU cache keyed by archive path. An
//! entry is reopened whenever the file's size or modification time changes.
//!
//! Queries run on the blocking pool. When the awaiting render future is
//! dropped (for example by a request deadline) the running statement is
//! aborted through SQLite's progress handler, releasing the connection for
//! the next request.

use std::ffi::c_int;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use async_trait::async_trait;
use lru::LruCache;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::RenderError;

use super::{RenderOutput, RenderRequest, TileCoord, TileFormat, TileRenderer};

/// Default number of open archive connections to keep.
pub const DEFAULT_CONNECTION_CACHE_CAPACITY: usize = 64;

/// Virtual machine steps between cancellation checks.
const CANCEL_CHECK_INTERVAL: c_int = 1_000;

/// An open archive together with the file state it was opened against.
struct CachedConnection {
    connection: Arc<Mutex<Connection>>,
    size: u64,
    modified: Option<SystemTime>,
}

/// Renders tiles, grids and metadata straight out of `.mbtiles` archives.
pub struct MbtilesRenderer {
    connections: Arc<Mutex<LruCache<PathBuf, CachedConnection>>>,
}

impl MbtilesRenderer {
    /// Create a renderer with the default connection cache capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CONNECTION_CACHE_CAPACITY)
    }

    /// Create a renderer keeping at most `capacity` archives open.
    ///
    /// A capacity of zero is treated as one.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            connections: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }

    /// Number of archives currently open.
    pub fn open_connections(&self) -> usize {
        self.connections.lock().map(|cache| cache.len()).unwrap_or(0)
    }
}

impl Default for MbtilesRenderer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TileRenderer for MbtilesRenderer {
    async fn render(&self, request: &RenderRequest) -> Result<Option<RenderOutput>, RenderError> {
        let connections = Arc::clone(&self.connections);
        let request = request.clone();
        let cancel = CancelOnDrop::new();
        let cancelled = cancel.flag();

        tokio::task::spawn_blocking(move || {
            let connection = checkout(&connections, &request.path)?;
            let connection = connection
                .lock()
                .map_err(|_| RenderError::Io("archive connection lock poisoned".to_string()))?;
            with_cancellation(&connection, &cancelled, |conn| render_blocking(conn, &request))
        })
        .await
        .map_err(|e| RenderError::Io(format!("render task failed: {}", e)))?
    }
}

// =============================================================================
// Cancellation
// =============================================================================

/// Raises a shared flag when dropped.
///
/// Held by the render future; the blocking query polls the flag.
struct CancelOnDrop {
    flag: Arc<AtomicBool>,
}

impl CancelOnDrop {
    fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.flag.store(true, Ordering::Release);
    }
}

/// Run `query` on `connection`, aborting it once `cancelled` is raised.
///
/// A request abandoned while waiting for the connection never starts.
fn with_cancellation<T>(
    connection: &Connection,
    cancelled: &Arc<AtomicBool>,
    query: impl FnOnce(&Connection) -> Result<T, RenderError>,
) -> Result<T, RenderError> {
    if cancelled.load(Ordering::Acquire) {
        return Err(RenderError::Cancelled);
    }

    let flag = Arc::clone(cancelled);
    connection.progress_handler(
        CANCEL_CHECK_INTERVAL,
        Some(move || flag.load(Ordering::Acquire)),
    );
    let result = query(connection);
    connection.progress_handler(CANCEL_CHECK_INTERVAL, None::<fn() -> bool>);

    match result {
        Err(_) if cancelled.load(Ordering::Acquire) => {
            debug!("Archive query cancelled");
            Err(RenderError::Cancelled)
        }
        other => other,
    }
}

// =============================================================================
// Connection Cache
// =============================================================================

/// Fetch an open connection for `path`, (re)opening it when needed.
fn checkout(
    connections: &Mutex<LruCache<PathBuf, CachedConnection>>,
    path: &Path,
) -> Result<Arc<Mutex<Connection>>, RenderError> {
    let meta = std::fs::metadata(path)?;
    let size = meta.len();
    let modified = meta.modified().ok();

    {
        let mut cache = connections
            .lock()
            .map_err(|_| RenderError::Io("connection cache lock poisoned".to_string()))?;
        if let Some(entry) = cache.get(path) {
            if entry.size == size && entry.modified == modified {
                return Ok(Arc::clone(&entry.connection));
            }
        }
    }

    debug!(path = %path.display(), "Opening tileset archive");
    let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    let connection = Arc::new(Mutex::new(Connection::open_with_flags(path, flags)?));

    let mut cache = connections
        .lock()
        .map_err(|_| RenderError::Io("connection cache lock poisoned".to_string()))?;
    cache.put(
        path.to_path_buf(),
        CachedConnection {
            connection: Arc::clone(&connection),
            size,
            modified,
        },
    );

    Ok(connection)
}

// =============================================================================
// Queries
// =============================================================================

fn render_blocking(
    connection: &Connection,
    request: &RenderRequest,
) -> Result<Option<RenderOutput>, RenderError> {
    match request.format {
        TileFormat::Png | TileFormat::Jpeg => {
            let coord = require_coord(request)?;
            read_tile(connection, coord)
                .map(|data| data.map(|d| RenderOutput::image(d, request.format.content_type())))
        }
        TileFormat::GridJson => {
            let coord = require_coord(request)?;
            let Some(compressed) = read_grid(connection, coord)? else {
                return Ok(None);
            };
            let data = read_grid_data(connection, coord)?;
            Ok(Some(RenderOutput::grid(compressed, data)))
        }
        TileFormat::FormatterJson => read_metadata(connection, "formatter"),
        TileFormat::LegendJson => read_metadata(connection, "legend"),
    }
}

fn require_coord(request: &RenderRequest) -> Result<TileCoord, RenderError> {
    request.coord.ok_or_else(|| {
        RenderError::InvalidData(format!("{} requested without a coordinate", request.format))
    })
}

fn read_tile(connection: &Connection, coord: TileCoord) -> Result<Option<Vec<u8>>, RenderError> {
    let data: Option<Vec<u8>> = connection.query_row(
        "SELECT tile_data FROM tiles WHERE zoom_level = ?1 AND tile_column = ?2 AND tile_row = ?3",
        params![coord.z, coord.x, coord.y],
        |row| row.get(0),
    )?;
    Ok(data.filter(|d| !d.is_empty()))
}

fn read_grid(connection: &Connection, coord: TileCoord) -> Result<Option<Vec<u8>>, RenderError> {
    let grid: Option<Option<Vec<u8>>> = connection
        .query_row(
            "SELECT grid FROM grids WHERE zoom_level = ?1 AND tile_column = ?2 AND tile_row = ?3",
            params![coord.z, coord.x, coord.y],
            |row| row.get(0),
        )
        .optional()?;
    Ok(grid.flatten().filter(|g| !g.is_empty()))
}

/// Collect `grid_data` rows into `{key_name: key_json}`.
///
/// Archives without a `grid_data` table yield an empty object.
fn read_grid_data(connection: &Connection, coord: TileCoord) -> Result<Value, RenderError> {
    let mut data = Map::new();
    if !has_table(connection, "grid_data")? {
        return Ok(Value::Object(data));
    }

    let mut stmt = connection.prepare(
        "SELECT key_name, key_json FROM grid_data \
         WHERE zoom_level = ?1 AND tile_column = ?2 AND tile_row = ?3",
    )?;
    let rows = stmt.query_map(params![coord.z, coord.x, coord.y], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    for row in rows {
        let (key, json) = row?;
        let value = serde_json::from_str(&json).map_err(|e| {
            RenderError::InvalidData(format!("grid_data key {} is not valid JSON: {}", key, e))
        })?;
        data.insert(key, value);
    }

    Ok(Value::Object(data))
}

fn read_metadata(connection: &Connection, name: &str) -> Result<Option<RenderOutput>, RenderError> {
    let value: Option<String> = connection.query_row(
        "SELECT value FROM metadata WHERE name = ?1",
        params![name],
        |row| row.get(0),
    )?;
    Ok(value
        .filter(|v| !v.is_empty())
        .map(|v| RenderOutput::json(Value::String(v))))
}

fn has_table(connection: &Connection, name: &str) -> Result<bool, RenderError> {
    let found: Option<i64> = connection
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE name = ?1 AND type IN ('table', 'view')",
            params![name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

// =============================================================================
// Tests
// =============================================================================
