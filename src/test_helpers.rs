//! Shared test fixtures: recording mocks for the canvas, object store, and
//! conversion service, plus small image builders.

use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use image::{DynamicImage, ImageFormat};
use uuid::Uuid;

use crate::canvas::{Canvas, CanvasError};
use crate::convert::{ConversionRequest, ConvertError, Converter, Scene};
use crate::geometry::{Camera, Point, Size};
use crate::progress::{ProgressEvent, ProgressSink};
use crate::storage::{ObjectStore, StorageError, UploadReceipt};

// =============================================================================
// IMAGES
// =============================================================================

/// Encode a blank RGB image of the given size as PNG.
pub fn png_bytes(width: u32, height: u32) -> Bytes {
    let mut out = Cursor::new(Vec::new());
    DynamicImage::new_rgb8(width, height)
        .write_to(&mut out, ImageFormat::Png)
        .expect("encode png");
    Bytes::from(out.into_inner())
}

/// Encode a blank RGB image of the given size as JPEG.
pub fn jpeg_bytes(width: u32, height: u32) -> Bytes {
    let mut out = Cursor::new(Vec::new());
    DynamicImage::new_rgb8(width, height)
        .write_to(&mut out, ImageFormat::Jpeg)
        .expect("encode jpeg");
    Bytes::from(out.into_inner())
}

pub fn scene(name: &str) -> Scene {
    Scene { name: name.into(), render_data: serde_json::json!({ "src": format!("https://render.test/{name}.png") }) }
}

// =============================================================================
// CANVAS
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum CanvasCall {
    Insert { id: Uuid, center: Point, size: Size },
    Finalize { id: Uuid, url: String },
    RegisterScenes { prefix: String, scenes: Vec<Scene> },
    SetScenePath(String),
    SetTool(String),
}

/// Canvas that records every call in order.
pub struct MockCanvas {
    calls: Mutex<Vec<CanvasCall>>,
    camera: Mutex<Camera>,
    region: String,
}

impl MockCanvas {
    pub fn new() -> Self {
        Self { calls: Mutex::new(Vec::new()), camera: Mutex::new(Camera::default()), region: "us-sv".into() }
    }

    pub fn with_camera(self, camera: Camera) -> Self {
        *self.camera.lock().unwrap() = camera;
        self
    }

    pub fn set_camera(&self, camera: Camera) {
        *self.camera.lock().unwrap() = camera;
    }

    pub fn calls(&self) -> Vec<CanvasCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn inserts(&self) -> Vec<(Uuid, Point, Size)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                CanvasCall::Insert { id, center, size } => Some((id, center, size)),
                _ => None,
            })
            .collect()
    }

    pub fn finalized(&self) -> Vec<(Uuid, String)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                CanvasCall::Finalize { id, url } => Some((id, url)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: CanvasCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait::async_trait]
impl Canvas for MockCanvas {
    async fn insert_placeholder(&self, id: Uuid, center: Point, size: Size) -> Result<(), CanvasError> {
        self.record(CanvasCall::Insert { id, center, size });
        Ok(())
    }

    async fn finalize_placeholder(&self, id: Uuid, url: &str) -> Result<(), CanvasError> {
        self.record(CanvasCall::Finalize { id, url: url.to_string() });
        Ok(())
    }

    async fn register_scenes(&self, path_prefix: &str, scenes: Vec<Scene>) -> Result<(), CanvasError> {
        self.record(CanvasCall::RegisterScenes { prefix: path_prefix.to_string(), scenes });
        Ok(())
    }

    async fn set_active_scene_path(&self, path: &str) -> Result<(), CanvasError> {
        self.record(CanvasCall::SetScenePath(path.to_string()));
        Ok(())
    }

    async fn set_active_tool(&self, tool: &str) -> Result<(), CanvasError> {
        self.record(CanvasCall::SetTool(tool.to_string()));
        Ok(())
    }

    fn screen_to_world(&self, point: Point) -> Point {
        self.camera.lock().unwrap().screen_to_world(point)
    }

    fn region(&self) -> String {
        self.region.clone()
    }
}

// =============================================================================
// OBJECT STORE
// =============================================================================

/// How the mock store answers one upload.
#[derive(Debug, Clone)]
pub struct UploadPlan {
    pub status: u16,
    pub delay: Duration,
    pub progress: Vec<f64>,
}

impl UploadPlan {
    pub fn ok() -> Self {
        Self { status: 200, delay: Duration::ZERO, progress: vec![0.5, 1.0] }
    }
}

type PlanFn = dyn Fn(&[u8]) -> UploadPlan + Send + Sync;

/// Object store that answers each upload according to a plan keyed on the
/// payload, and records every path it was asked to write.
pub struct MockStore {
    plan: Box<PlanFn>,
    paths: Mutex<Vec<String>>,
}

impl MockStore {
    pub fn ok() -> Self {
        Self::with_plan(|_| UploadPlan::ok())
    }

    pub fn with_plan(plan: impl Fn(&[u8]) -> UploadPlan + Send + Sync + 'static) -> Self {
        Self { plan: Box::new(plan), paths: Mutex::new(Vec::new()) }
    }

    pub fn paths(&self) -> Vec<String> {
        self.paths.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ObjectStore for MockStore {
    async fn multipart_upload(
        &self,
        path: &str,
        payload: Bytes,
        on_progress: &(dyn Fn(f64) + Send + Sync),
    ) -> Result<UploadReceipt, StorageError> {
        self.paths.lock().unwrap().push(path.to_string());
        let plan = (self.plan)(&payload);
        for fraction in plan.progress {
            on_progress(fraction);
        }
        if !plan.delay.is_zero() {
            tokio::time::sleep(plan.delay).await;
        }
        Ok(UploadReceipt { status: plan.status })
    }

    fn public_url(&self, path: &str) -> String {
        format!("https://cdn.test/{path}")
    }
}

// =============================================================================
// CONVERTER
// =============================================================================

pub enum ConvertOutcome {
    Scenes(Vec<Scene>),
    Fail(String),
}

/// Conversion service that reports fixed progress and returns a canned
/// outcome. Never reports 1.0 itself.
pub struct MockConverter {
    outcome: ConvertOutcome,
    progress: Vec<f64>,
    requests: Mutex<Vec<ConversionRequest>>,
}

impl MockConverter {
    pub fn scenes(scenes: Vec<Scene>) -> Self {
        Self { outcome: ConvertOutcome::Scenes(scenes), progress: vec![0.3, 0.6], requests: Mutex::new(Vec::new()) }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            outcome: ConvertOutcome::Fail(reason.to_string()),
            progress: vec![0.3],
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_progress(mut self, progress: Vec<f64>) -> Self {
        self.progress = progress;
        self
    }

    pub fn requests(&self) -> Vec<ConversionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Converter for MockConverter {
    async fn convert(
        &self,
        request: &ConversionRequest,
        on_progress: &(dyn Fn(f64) + Send + Sync),
    ) -> Result<Vec<Scene>, ConvertError> {
        self.requests.lock().unwrap().push(request.clone());
        for fraction in &self.progress {
            on_progress(*fraction);
        }
        match &self.outcome {
            ConvertOutcome::Scenes(scenes) => Ok(scenes.clone()),
            ConvertOutcome::Fail(reason) => Err(ConvertError::Failed { reason: reason.clone() }),
        }
    }
}

// =============================================================================
// PROGRESS
// =============================================================================

/// Sink that keeps every event it receives.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl ProgressSink for RecordingSink {
    fn on_progress(&self, event: ProgressEvent) {
        self.events.lock().unwrap().push(event);
    }
}
