//! Frame-emitting canvas.
//!
//! Translates each canvas call into a board request frame and pushes it to
//! an outgoing `mpsc` queue, the same way a board session fans frames out
//! to connected clients. Whoever drains the queue (a websocket writer, or
//! the CLI's stdout printer) owns delivery.

use std::collections::HashSet;
use std::sync::Mutex;

use serde_json::json;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::{Canvas, CanvasError};
use crate::convert::Scene;
use crate::frame::{Data, Frame};
use crate::geometry::{Camera, Point, Size};

/// `from` value stamped on every emitted frame.
const FRAME_SOURCE: &str = "ingest";

pub struct FrameCanvas {
    tx: mpsc::Sender<Frame>,
    board_id: Option<Uuid>,
    parent_id: Option<Uuid>,
    region: String,
    camera: Mutex<Camera>,
    /// Placeholders inserted by this canvas and not yet finalized.
    pending: Mutex<HashSet<Uuid>>,
}

impl FrameCanvas {
    #[must_use]
    pub fn new(tx: mpsc::Sender<Frame>, region: impl Into<String>) -> Self {
        Self {
            tx,
            board_id: None,
            parent_id: None,
            region: region.into(),
            camera: Mutex::new(Camera::default()),
            pending: Mutex::new(HashSet::new()),
        }
    }

    #[must_use]
    pub fn with_board_id(mut self, board_id: Uuid) -> Self {
        self.board_id = Some(board_id);
        self
    }

    /// Correlate every emitted frame with a run-level request frame.
    #[must_use]
    pub fn with_parent_id(mut self, parent_id: Uuid) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Replace the pan/zoom used by `screen_to_world`.
    pub fn set_camera(&self, camera: Camera) {
        if let Ok(mut current) = self.camera.lock() {
            *current = camera;
        }
    }

    /// Number of placeholders still waiting for a URL.
    #[must_use]
    pub fn pending_placeholders(&self) -> usize {
        self.pending.lock().map_or(0, |p| p.len())
    }

    fn frame(&self, syscall: &str, data: Data) -> Frame {
        let mut frame = Frame::request(syscall, data).with_from(FRAME_SOURCE);
        if let Some(board_id) = self.board_id {
            frame = frame.with_board_id(board_id);
        }
        if let Some(parent_id) = self.parent_id {
            frame = frame.with_parent_id(parent_id);
        }
        frame
    }

    async fn emit(&self, frame: Frame) -> Result<(), CanvasError> {
        self.tx.send(frame).await.map_err(|_| CanvasError::Closed)
    }
}

#[async_trait::async_trait]
impl Canvas for FrameCanvas {
    async fn insert_placeholder(&self, id: Uuid, center: Point, size: Size) -> Result<(), CanvasError> {
        let mut data = Data::new();
        data.insert("id".into(), json!(id));
        data.insert("kind".into(), json!("image"));
        data.insert("x".into(), json!(center.x - size.width / 2.0));
        data.insert("y".into(), json!(center.y - size.height / 2.0));
        data.insert("width".into(), json!(size.width));
        data.insert("height".into(), json!(size.height));
        data.insert("props".into(), json!({ "src": null, "locked": false }));

        self.emit(self.frame("object:create", data)).await?;
        if let Ok(mut pending) = self.pending.lock() {
            pending.insert(id);
        }
        Ok(())
    }

    async fn finalize_placeholder(&self, id: Uuid, url: &str) -> Result<(), CanvasError> {
        let known = self.pending.lock().is_ok_and(|mut p| p.remove(&id));
        if !known {
            return Err(CanvasError::UnknownPlaceholder(id));
        }

        let mut data = Data::new();
        data.insert("id".into(), json!(id));
        data.insert("props".into(), json!({ "src": url, "locked": false }));
        self.emit(self.frame("object:update", data)).await
    }

    async fn register_scenes(&self, path_prefix: &str, scenes: Vec<Scene>) -> Result<(), CanvasError> {
        let mut data = Data::new();
        data.insert("path".into(), json!(path_prefix));
        data.insert("scenes".into(), json!(scenes));
        self.emit(self.frame("scene:put", data)).await
    }

    async fn set_active_scene_path(&self, path: &str) -> Result<(), CanvasError> {
        let mut data = Data::new();
        data.insert("path".into(), json!(path));
        self.emit(self.frame("scene:set", data)).await
    }

    async fn set_active_tool(&self, tool: &str) -> Result<(), CanvasError> {
        let mut data = Data::new();
        data.insert("tool".into(), json!(tool));
        self.emit(self.frame("tool:set", data)).await
    }

    fn screen_to_world(&self, point: Point) -> Point {
        self.camera
            .lock()
            .map_or(point, |camera| camera.screen_to_world(point))
    }

    fn region(&self) -> String {
        self.region.clone()
    }
}

#[cfg(test)]
#[path = "frames_test.rs"]
mod tests;
