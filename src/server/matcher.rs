//! Declarative path matching for gateway routes.
//!
//! Each route is a fixed list of segment patterns checked against the
//! `/`-separated request path. A tileset id is always exactly one path
//! segment, so dots inside an id never reach into the coordinate or
//! format parts that follow it.
//!
//! | Route      | Pattern                                         |
//! |------------|-------------------------------------------------|
//! | Download   | `/download/<tileset>.mbtiles`                   |
//! | Tile       | `/1.0.0/<tileset>/<z>/<x>/<y>.(png\|jpg\|jpeg)` |
//! | Grid       | `/1.0.0/<tileset>/<z>/<x>/<y>.grid.json`        |
//! | Formatter  | `/1.0.0/<tileset>/formatter.json`               |
//! | Legend     | `/1.0.0/<tileset>/legend.json`                  |

use crate::gateway::{Route, RouteKind, TileRequest};
use crate::render::{TileCoord, TileFormat};

/// Version prefix of the tile API.
pub const TILE_API_PREFIX: &str = "1.0.0";

/// Path prefix of the download route.
pub const DOWNLOAD_PREFIX: &str = "download";

// =============================================================================
// Route Table
// =============================================================================

/// One element of a route pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment {
    /// Exact text
    Literal(&'static str),

    /// A tileset id
    Tileset,

    /// A tileset id followed by a fixed suffix
    TilesetWithSuffix(&'static str),

    /// A signed integer coordinate
    Coord,

    /// A signed integer coordinate followed by a fixed suffix
    CoordWithSuffix(&'static str),

    /// A signed integer coordinate followed by an image extension
    CoordWithImageExtension,
}

struct RoutePattern {
    kind: RouteKind,
    segments: &'static [Segment],
}

static DOWNLOAD_ROUTE: RoutePattern = RoutePattern {
    kind: RouteKind::Download,
    segments: &[
        Segment::Literal(DOWNLOAD_PREFIX),
        Segment::TilesetWithSuffix(".mbtiles"),
    ],
};

static TILE_ROUTES: [RoutePattern; 4] = [
    RoutePattern {
        kind: RouteKind::Formatter,
        segments: &[
            Segment::Literal(TILE_API_PREFIX),
            Segment::Tileset,
            Segment::Literal("formatter.json"),
        ],
    },
    RoutePattern {
        kind: RouteKind::Legend,
        segments: &[
            Segment::Literal(TILE_API_PREFIX),
            Segment::Tileset,
            Segment::Literal("legend.json"),
        ],
    },
    RoutePattern {
        kind: RouteKind::Grid,
        segments: &[
            Segment::Literal(TILE_API_PREFIX),
            Segment::Tileset,
            Segment::Coord,
            Segment::Coord,
            Segment::CoordWithSuffix(".grid.json"),
        ],
    },
    RoutePattern {
        kind: RouteKind::Tile,
        segments: &[
            Segment::Literal(TILE_API_PREFIX),
            Segment::Tileset,
            Segment::Coord,
            Segment::Coord,
            Segment::CoordWithImageExtension,
        ],
    },
];

/// Values pulled out of a path while matching a pattern.
#[derive(Debug, Default)]
struct Captures<'a> {
    tileset: Option<&'a str>,
    coords: Vec<i64>,
    format: Option<TileFormat>,
}

impl RoutePattern {
    fn capture<'a>(&self, parts: &[&'a str]) -> Option<Captures<'a>> {
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut captures = Captures::default();
        for (segment, part) in self.segments.iter().zip(parts) {
            match *segment {
                Segment::Literal(text) => {
                    if *part != text {
                        return None;
                    }
                }
                Segment::Tileset => {
                    captures.tileset = Some(parse_tileset(part)?);
                }
                Segment::TilesetWithSuffix(suffix) => {
                    captures.tileset = Some(parse_tileset(part.strip_suffix(suffix)?)?);
                }
                Segment::Coord => {
                    captures.coords.push(parse_coord(part)?);
                }
                Segment::CoordWithSuffix(suffix) => {
                    captures.coords.push(parse_coord(part.strip_suffix(suffix)?)?);
                }
                Segment::CoordWithImageExtension => {
                    let (coord, ext) = part.split_once('.')?;
                    captures.format = Some(TileFormat::from_image_extension(ext)?);
                    captures.coords.push(parse_coord(coord)?);
                }
            }
        }

        Some(captures)
    }

    fn route(&self, captures: &Captures<'_>) -> Option<Route> {
        let coord = match captures.coords.as_slice() {
            [z, x, y] => Some(TileCoord::new(*z, *x, *y)),
            _ => None,
        };

        Some(match self.kind {
            RouteKind::Tile => Route::Tile {
                coord: coord?,
                format: captures.format?,
            },
            RouteKind::Grid => Route::Grid { coord: coord? },
            RouteKind::Formatter => Route::Formatter,
            RouteKind::Legend => Route::Legend,
            RouteKind::Download => Route::Download,
        })
    }
}

/// A tileset id: one or more of `[A-Za-z0-9_.-]`.
fn parse_tileset(part: &str) -> Option<&str> {
    let valid = !part.is_empty()
        && part
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'-'));
    valid.then_some(part)
}

/// An integer with an optional leading minus sign.
fn parse_coord(part: &str) -> Option<i64> {
    let digits = part.strip_prefix('-').unwrap_or(part);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    part.parse().ok()
}

// =============================================================================
// Path Matcher
// =============================================================================

/// Classifies request paths into gateway requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathMatcher {
    download_enabled: bool,
}

impl PathMatcher {
    pub fn new(download_enabled: bool) -> Self {
        Self { download_enabled }
    }

    pub fn download_enabled(&self) -> bool {
        self.download_enabled
    }

    /// Match `path` against the route table.
    ///
    /// `callback` is the raw `callback` query value. It is attached to grid
    /// requests only; an empty value counts as absent.
    pub fn match_path(&self, path: &str, callback: Option<&str>) -> Option<TileRequest> {
        let parts: Vec<&str> = path.strip_prefix('/')?.split('/').collect();

        let download = self.download_enabled.then_some(&DOWNLOAD_ROUTE);
        let (pattern, captures) = download
            .into_iter()
            .chain(TILE_ROUTES.iter())
            .find_map(|pattern| pattern.capture(&parts).map(|c| (pattern, c)))?;

        let route = pattern.route(&captures)?;
        let mut request = TileRequest::new(captures.tileset?, route);

        if route.kind() == RouteKind::Grid {
            if let Some(callback) = callback.filter(|cb| !cb.is_empty()) {
                request = request.with_callback(callback);
            }
        }

        Some(request)
    }
}

// =============================================================================
// Tests
// =============================================================================
