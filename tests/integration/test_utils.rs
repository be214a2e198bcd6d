//! Test utilities for integration tests.
//!
//! This module provides a mock renderer, MBTiles fixture builders and
//! helpers for driving the router.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use flate2::write::GzEncoder;
use flate2::Compression;
use http_body_util::BodyExt;
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

use mbtiles_gateway::error::RenderError;
use mbtiles_gateway::gateway::{Placeholder, TileGateway};
use mbtiles_gateway::render::{RenderOutput, RenderRequest, TileFormat, TileRenderer};
use mbtiles_gateway::server::{create_router, RouterConfig};
use mbtiles_gateway::tileset::TilesetStore;

/// Placeholder bytes used by every test gateway.
pub const PLACEHOLDER: &[u8] = b"\x89PNG\r\n\x1a\nplaceholder";

// =============================================================================
// Mock Renderer
// =============================================================================

type MockResult = Result<Option<RenderOutput>, RenderError>;

/// A renderer returning canned results per format and recording requests.
#[derive(Clone, Default)]
pub struct MockRenderer {
    results: HashMap<TileFormat, MockResult>,
    delay: Option<Duration>,
    requests: Arc<Mutex<Vec<RenderRequest>>>,
}

impl MockRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `result` for every request in `format`.
    pub fn with_result(mut self, format: TileFormat, result: MockResult) -> Self {
        self.results.insert(format, result);
        self
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Shared handle to the recorded requests.
    pub fn requests(&self) -> Arc<Mutex<Vec<RenderRequest>>> {
        Arc::clone(&self.requests)
    }
}

#[async_trait]
impl TileRenderer for MockRenderer {
    async fn render(&self, request: &RenderRequest) -> MockResult {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.results.get(&request.format).cloned().unwrap_or(Ok(None))
    }
}

// =============================================================================
// Fixtures
// =============================================================================

/// Gzip `text` the way grids are stored in MBTiles archives.
pub fn gzip(text: &str) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(text.as_bytes()).unwrap();
    encoder.finish().unwrap()
}

/// Write a dummy archive of `size` bytes; the mock renderer never opens it.
pub fn touch_tileset(dir: &Path, id: &str, size: usize) -> PathBuf {
    let path = dir.join(format!("{}.mbtiles", id));
    std::fs::write(&path, vec![0u8; size]).unwrap();
    path
}

/// Builder for real MBTiles archives.
pub struct MbtilesFixture {
    conn: Connection,
}

impl MbtilesFixture {
    pub fn create(path: &Path) -> Self {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(
            "CREATE TABLE metadata (name TEXT, value TEXT);
             CREATE TABLE tiles (zoom_level INTEGER, tile_column INTEGER, tile_row INTEGER, tile_data BLOB);
             CREATE TABLE grids (zoom_level INTEGER, tile_column INTEGER, tile_row INTEGER, grid BLOB);
             CREATE TABLE grid_data (zoom_level INTEGER, tile_column INTEGER, tile_row INTEGER, key_name TEXT, key_json TEXT);",
        )
        .unwrap();
        Self { conn }
    }

    /// Replace `tiles` with a view that scans a hundred million generated rows.
    pub fn slow_tiles(self) -> Self {
        self.conn
            .execute_batch(
                "DROP TABLE tiles;
                 CREATE VIEW tiles AS
                   WITH RECURSIVE n(i) AS (SELECT 0 UNION ALL SELECT i + 1 FROM n WHERE i < 100000000)
                   SELECT 0 AS zoom_level, 0 AS tile_column, i AS tile_row, zeroblob(4) AS tile_data FROM n;",
            )
            .unwrap();
        self
    }

    pub fn metadata(self, name: &str, value: &str) -> Self {
        self.conn
            .execute("INSERT INTO metadata VALUES (?1, ?2)", params![name, value])
            .unwrap();
        self
    }

    pub fn tile(self, z: i64, x: i64, y: i64, data: &[u8]) -> Self {
        self.conn
            .execute(
                "INSERT INTO tiles VALUES (?1, ?2, ?3, ?4)",
                params![z, x, y, data],
            )
            .unwrap();
        self
    }

    pub fn grid(self, z: i64, x: i64, y: i64, grid: &[u8]) -> Self {
        self.conn
            .execute(
                "INSERT INTO grids VALUES (?1, ?2, ?3, ?4)",
                params![z, x, y, grid],
            )
            .unwrap();
        self
    }

    pub fn grid_data(self, z: i64, x: i64, y: i64, key: &str, json: &str) -> Self {
        self.conn
            .execute(
                "INSERT INTO grid_data VALUES (?1, ?2, ?3, ?4, ?5)",
                params![z, x, y, key, json],
            )
            .unwrap();
        self
    }
}

// =============================================================================
// Router Helpers
// =============================================================================

/// Build a gateway over `dir` with the test placeholder.
pub fn gateway<R: TileRenderer>(dir: &TempDir, renderer: R) -> TileGateway<R> {
    TileGateway::new(
        TilesetStore::new(dir.path()),
        renderer,
        Placeholder::from_bytes(PLACEHOLDER),
    )
}

/// Router with tracing off and the download route enabled.
pub fn router<R: TileRenderer + 'static>(gateway: TileGateway<R>) -> Router {
    create_router(
        gateway,
        RouterConfig::new().with_download(true).with_tracing(false),
    )
}

/// Send a GET request and return the response.
pub async fn get(router: Router, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    router.oneshot(request).await.unwrap()
}

/// Collect a response body.
pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

/// Collect a response body as UTF-8 text.
pub async fn body_text(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}
