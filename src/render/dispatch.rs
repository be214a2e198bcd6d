//! Render invocation and outcome normalization.

use std::sync::Arc;

use tracing::debug;

use crate::error::RenderError;
use crate::tileset::Tileset;

use super::{RenderOutput, RenderRequest, TileCoord, TileFormat, TileRenderer};

/// Normalized result of a render call.
#[derive(Debug, Clone)]
pub enum RenderOutcome {
    /// The renderer produced a payload
    Success(RenderOutput),

    /// The archive holds nothing for the request
    Empty,

    /// The renderer failed
    Error(RenderError),
}

impl RenderOutcome {
    /// Fold a raw renderer result into an outcome.
    ///
    /// An "empty row" error is the archive's way of saying "no data" and is
    /// reported as [`RenderOutcome::Empty`].
    pub fn from_result(result: Result<Option<RenderOutput>, RenderError>) -> Self {
        match result {
            Ok(Some(output)) => RenderOutcome::Success(output),
            Ok(None) => RenderOutcome::Empty,
            Err(e) if e.is_empty_row() => RenderOutcome::Empty,
            Err(e) => RenderOutcome::Error(e),
        }
    }
}

/// Invokes the configured renderer for validated tilesets.
pub struct RenderDispatcher<R: TileRenderer> {
    renderer: Arc<R>,
}

impl<R: TileRenderer> RenderDispatcher<R> {
    pub fn new(renderer: R) -> Self {
        Self {
            renderer: Arc::new(renderer),
        }
    }

    /// The underlying renderer.
    pub fn renderer(&self) -> &Arc<R> {
        &self.renderer
    }

    /// Render `format` (at `coord`, when given) from a tileset.
    pub async fn dispatch(
        &self,
        tileset: &Tileset,
        format: TileFormat,
        coord: Option<TileCoord>,
    ) -> RenderOutcome {
        let request = RenderRequest::new(tileset.path(), format, coord);
        let outcome = RenderOutcome::from_result(self.renderer.render(&request).await);

        match &outcome {
            RenderOutcome::Success(_) => {
                debug!(tileset = tileset.id(), format = %format, ?coord, "Rendered")
            }
            RenderOutcome::Empty => {
                debug!(tileset = tileset.id(), format = %format, ?coord, "Render returned no data")
            }
            RenderOutcome::Error(e) => {
                debug!(tileset = tileset.id(), format = %format, ?coord, "Render failed: {}", e)
            }
        }

        outcome
    }
}

impl<R: TileRenderer> Clone for RenderDispatcher<R> {
    fn clone(&self) -> Self {
        Self {
            renderer: Arc::clone(&self.renderer),
        }
    }
}
