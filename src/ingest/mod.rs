//! Ingestion orchestration: image drops and document conversions.
//!
//! DESIGN
//! ======
//! An image batch runs in three phases. Every file is decoded first (off
//! the runtime, failures skipped). Then one placeholder per surviving file
//! is inserted, all of them before any upload starts, so the user sees the
//! whole batch land at once. Finally the uploads run concurrently; each
//! task finalizes its own placeholder as soon as its upload finishes.
//!
//! The batch fails fast: the first upload error is returned immediately,
//! while sibling tasks keep running and still finalize their placeholders.
//! A failed upload leaves its placeholder on the board without content.
//!
//! A document conversion uploads the source into the document folder,
//! converts it, registers the scenes under a fresh `/{id}` directory, and
//! activates the first scene. Both flows report progress to a caller-owned
//! `ProgressSink`.

pub mod decode;
pub mod scheduler;

use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use tokio::task::JoinError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::canvas::{Canvas, CanvasError, SELECTOR_TOOL, world_center};
use crate::config::DEFAULT_DOCUMENT_FOLDER;
use crate::convert::{ConversionKind, ConvertError, DocumentConverter};
use crate::geometry::{Point, Size};
use crate::progress::{ProgressEvent, ProgressPhase, ProgressSink};
use crate::storage::{StorageError, Uploader, object_path};

/// Content types accepted by an image drop.
pub const ACCEPTED_IMAGE_TYPES: [&str; 2] = ["image/jpeg", "image/png"];

// =============================================================================
// TYPES
// =============================================================================

/// A file handed to the pipeline.
#[derive(Debug, Clone)]
pub struct AssetSource {
    pub file_name: String,
    pub content_type: String,
    pub payload: Bytes,
}

impl AssetSource {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, payload: Bytes) -> Self {
        Self { file_name: file_name.into(), content_type: content_type.into(), payload }
    }

    #[must_use]
    pub fn is_accepted_image(&self) -> bool {
        ACCEPTED_IMAGE_TYPES.contains(&self.content_type.as_str())
    }
}

/// A decoded image ready to be placed.
#[derive(Debug, Clone)]
pub struct ImageAsset {
    pub source: AssetSource,
    pub natural: Size,
    pub display: Size,
    /// Screen-space drop point; mapped to world space at insert time.
    pub drop_point: Point,
}

/// One image upload, keyed by the id shared with its placeholder.
#[derive(Debug, Clone)]
pub struct UploadTask {
    pub id: Uuid,
    pub asset: ImageAsset,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedImage {
    pub id: Uuid,
    pub file_name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConvertedDocument {
    pub id: Uuid,
    pub source_url: String,
    pub scene_prefix: String,
    pub active_scene_path: String,
    pub scene_count: usize,
}

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("cannot decode {file}: {reason}")]
    Decode { file: String, reason: String },

    #[error(transparent)]
    Upload(#[from] StorageError),

    #[error(transparent)]
    Conversion(#[from] ConvertError),

    #[error(transparent)]
    Canvas(#[from] CanvasError),

    #[error("document conversion is not configured")]
    ConverterUnavailable,

    #[error("ingest task aborted: {0}")]
    TaskAborted(String),
}

impl From<JoinError> for IngestError {
    fn from(e: JoinError) -> Self {
        Self::TaskAborted(e.to_string())
    }
}

impl crate::frame::ErrorCode for IngestError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Decode { .. } => "E_DECODE",
            Self::Upload(e) => e.error_code(),
            Self::Conversion(e) => e.error_code(),
            Self::Canvas(e) => e.error_code(),
            Self::ConverterUnavailable => "E_CONVERTER_UNAVAILABLE",
            Self::TaskAborted(_) => "E_TASK_ABORTED",
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Upload(e) => e.retryable(),
            Self::Conversion(e) => e.retryable(),
            _ => false,
        }
    }
}

// =============================================================================
// INGESTOR
// =============================================================================

/// Entry point for both ingestion flows.
pub struct Ingestor {
    canvas: Arc<dyn Canvas>,
    uploader: Uploader,
    converter: Option<DocumentConverter>,
    document_folder: String,
}

impl Ingestor {
    #[must_use]
    pub fn new(canvas: Arc<dyn Canvas>, uploader: Uploader) -> Self {
        Self { canvas, uploader, converter: None, document_folder: DEFAULT_DOCUMENT_FOLDER.to_string() }
    }

    #[must_use]
    pub fn with_converter(mut self, converter: DocumentConverter) -> Self {
        self.converter = Some(converter);
        self
    }

    #[must_use]
    pub fn with_document_folder(mut self, folder: impl Into<String>) -> Self {
        self.document_folder = folder.into();
        self
    }

    /// Place, upload, and finalize a batch of image files dropped at
    /// `drop_point` (screen space) in a viewport of `viewport` size.
    ///
    /// Returns the placed images in input order, minus files that could
    /// not be decoded. An empty or fully undecodable batch is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the first upload or canvas error. Other uploads in the batch
    /// keep running and finalize independently.
    pub async fn upload_image_files(
        &self,
        files: Vec<AssetSource>,
        drop_point: Point,
        viewport: Size,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<Vec<PlacedImage>, IngestError> {
        let assets = decode::decode_all(files, drop_point, viewport).await;
        if assets.is_empty() {
            debug!("image batch empty after decode");
            return Ok(Vec::new());
        }

        let tasks: Vec<UploadTask> = assets.into_iter().map(|asset| UploadTask { id: Uuid::new_v4(), asset }).collect();
        info!(files = tasks.len(), "image batch started");

        for task in &tasks {
            let center = world_center(self.canvas.as_ref(), task.asset.drop_point);
            self.canvas.insert_placeholder(task.id, center, task.asset.display).await?;
        }

        let jobs = tasks.into_iter().map(|task| {
            let canvas = Arc::clone(&self.canvas);
            let uploader = self.uploader.clone();
            let progress = Arc::clone(&progress);
            async move { upload_and_finalize(canvas, uploader, task, progress).await }
        });
        let placed = scheduler::run_all(jobs).await?;

        self.canvas.set_active_tool(SELECTOR_TOOL).await?;
        info!(files = placed.len(), "image batch finished");
        Ok(placed)
    }

    /// Drop handler: keeps JPEG and PNG files, ingests them, and restores
    /// the selector tool if the batch fails.
    ///
    /// # Errors
    ///
    /// Same as [`Ingestor::upload_image_files`].
    pub async fn handle_drop(
        &self,
        files: Vec<AssetSource>,
        drop_point: Point,
        viewport: Size,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<Vec<PlacedImage>, IngestError> {
        let (images, rejected): (Vec<_>, Vec<_>) = files.into_iter().partition(AssetSource::is_accepted_image);
        for file in &rejected {
            debug!(file = %file.file_name, content_type = %file.content_type, "ignoring dropped file");
        }

        match self.upload_image_files(images, drop_point, viewport, progress).await {
            Ok(placed) => Ok(placed),
            Err(e) => {
                warn!(error = %e, "image drop failed");
                if let Err(reset) = self.canvas.set_active_tool(SELECTOR_TOOL).await {
                    warn!(error = %reset, "failed to restore selector tool");
                }
                Err(e)
            }
        }
    }

    /// Upload a slide document, convert it, and make its first scene
    /// active.
    ///
    /// A final `Converting` event at 1.0 is emitted on success before the
    /// scenes are registered. On failure no scenes are registered.
    ///
    /// # Errors
    ///
    /// Returns `ConverterUnavailable` if no converter is configured, or the
    /// upload, conversion, or canvas error that stopped the flow.
    pub async fn convert_file(
        &self,
        source: AssetSource,
        kind: ConversionKind,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<ConvertedDocument, IngestError> {
        let converter = self.converter.as_ref().ok_or(IngestError::ConverterUnavailable)?;

        let id = Uuid::new_v4();
        let path = object_path(Some(&self.document_folder), id, &source.file_name);
        info!(file = %source.file_name, %path, %kind, "document ingest started");

        let on_upload = |fraction: f64| progress.on_progress(ProgressEvent::new(ProgressPhase::Uploading, fraction));
        let source_url = self.uploader.upload(&path, source.payload, &on_upload).await?;

        let region = self.canvas.region();
        let on_convert = |fraction: f64| progress.on_progress(ProgressEvent::new(ProgressPhase::Converting, fraction));
        let scenes = converter.convert(&source_url, kind, &region, &on_convert).await?;
        progress.on_progress(ProgressEvent::new(ProgressPhase::Converting, 1.0));

        let first = scenes.first().ok_or(ConvertError::NoScenes)?;
        let scene_prefix = format!("/{}", id.simple());
        let active_scene_path = format!("{scene_prefix}/{}", first.name);
        let scene_count = scenes.len();

        self.canvas.register_scenes(&scene_prefix, scenes).await?;
        self.canvas.set_active_scene_path(&active_scene_path).await?;

        info!(%scene_prefix, scenes = scene_count, "document ingest finished");
        Ok(ConvertedDocument { id, source_url, scene_prefix, active_scene_path, scene_count })
    }
}

async fn upload_and_finalize(
    canvas: Arc<dyn Canvas>,
    uploader: Uploader,
    task: UploadTask,
    progress: Arc<dyn ProgressSink>,
) -> Result<PlacedImage, IngestError> {
    let path = object_path(None, task.id, &task.asset.source.file_name);
    let on_upload = |fraction: f64| progress.on_progress(ProgressEvent::new(ProgressPhase::Uploading, fraction));

    let url = match uploader.upload(&path, task.asset.source.payload.clone(), &on_upload).await {
        Ok(url) => url,
        Err(e) => {
            warn!(id = %task.id, file = %task.asset.source.file_name, error = %e, "image upload failed");
            return Err(e.into());
        }
    };

    canvas.finalize_placeholder(task.id, &url).await?;
    debug!(id = %task.id, %url, "placeholder finalized");
    Ok(PlacedImage { id: task.id, file_name: task.asset.source.file_name, url })
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
