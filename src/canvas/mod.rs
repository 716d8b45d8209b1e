//! Canvas: the shared board session the pipeline writes into.
//!
//! DESIGN
//! ======
//! The board is an external collaborator. The pipeline only needs a narrow
//! capability: place and finalize image placeholders, register scene
//! lists, switch the active scene and tool, and convert screen points into
//! world space. Implementations are injected once as `Arc<dyn Canvas>` and
//! are responsible for serializing concurrent calls from upload tasks.

pub mod frames;

use uuid::Uuid;

use crate::convert::Scene;
use crate::geometry::{Point, Size};

/// Name of the neutral interaction tool restored after an image drop.
pub const SELECTOR_TOOL: &str = "selector";

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CanvasError {
    #[error("canvas session closed")]
    Closed,
    #[error("unknown placeholder: {0}")]
    UnknownPlaceholder(Uuid),
}

impl crate::frame::ErrorCode for CanvasError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Closed => "E_CANVAS_CLOSED",
            Self::UnknownPlaceholder(_) => "E_UNKNOWN_PLACEHOLDER",
        }
    }
}

// =============================================================================
// CANVAS TRAIT
// =============================================================================

/// Board-session capability consumed by the ingestion pipeline.
#[async_trait::async_trait]
pub trait Canvas: Send + Sync {
    /// Insert a visible, content-less, unlocked image element keyed by `id`.
    async fn insert_placeholder(&self, id: Uuid, center: Point, size: Size) -> Result<(), CanvasError>;

    /// Attach the uploaded image `url` to the placeholder `id`.
    async fn finalize_placeholder(&self, id: Uuid, url: &str) -> Result<(), CanvasError>;

    /// Register `scenes` under the directory `path_prefix` (e.g. `/abc123`).
    async fn register_scenes(&self, path_prefix: &str, scenes: Vec<Scene>) -> Result<(), CanvasError>;

    async fn set_active_scene_path(&self, path: &str) -> Result<(), CanvasError>;

    async fn set_active_tool(&self, tool: &str) -> Result<(), CanvasError>;

    /// Convert a screen point using the board's current pan/zoom.
    fn screen_to_world(&self, point: Point) -> Point;

    /// Region hint forwarded verbatim to the conversion service.
    fn region(&self) -> String;
}

/// World-space position for a screen-space drop point.
///
/// Must be called right before the placeholder is inserted: the board may
/// have panned or zoomed while the file was being decoded.
pub fn world_center(canvas: &dyn Canvas, screen: Point) -> Point {
    let world = canvas.screen_to_world(screen);
    tracing::debug!(
        screen_x = screen.x,
        screen_y = screen.y,
        world_x = world.x,
        world_y = world.y,
        "mapped drop point"
    );
    world
}
