//! End-to-end ingestion against a fake object store and conversion service
//! served over loopback HTTP.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use board_ingest::canvas::frames::FrameCanvas;
use board_ingest::config::HttpTimeouts;
use board_ingest::convert::http::HttpConverter;
use board_ingest::convert::{ConversionKind, DocumentConverter};
use board_ingest::frame::Frame;
use board_ingest::geometry::{Point, Size};
use board_ingest::ingest::{AssetSource, IngestError, Ingestor};
use board_ingest::progress::{ProgressEvent, ProgressPhase, ProgressSink};
use board_ingest::storage::http::HttpObjectStore;
use board_ingest::storage::{StorageError, Uploader};
use bytes::Bytes;
use image::{DynamicImage, ImageFormat};
use serde_json::{Value, json};
use tokio::sync::mpsc;

const TIMEOUTS: HttpTimeouts = HttpTimeouts { request_secs: 10, connect_secs: 5 };

// =============================================================================
// FAKE SERVICES
// =============================================================================

#[derive(Default)]
struct Fake {
    next_upload: AtomicUsize,
    /// upload id -> (object path, received parts by number)
    uploads: Mutex<HashMap<String, (String, HashMap<usize, Vec<u8>>)>>,
    /// object path -> assembled bytes
    objects: Mutex<HashMap<String, Vec<u8>>>,
    reject_parts: AtomicBool,
    polls: AtomicUsize,
    conversions: Mutex<Vec<Value>>,
}

async fn initiate(State(fake): State<Arc<Fake>>, Json(body): Json<Value>) -> Json<Value> {
    let id = format!("up-{}", fake.next_upload.fetch_add(1, Ordering::SeqCst));
    let path = body["path"].as_str().unwrap_or_default().to_string();
    fake.uploads.lock().unwrap().insert(id.clone(), (path, HashMap::new()));
    Json(json!({ "upload_id": id }))
}

async fn put_part(
    State(fake): State<Arc<Fake>>,
    Path((id, number)): Path<(String, usize)>,
    body: Bytes,
) -> StatusCode {
    if fake.reject_parts.load(Ordering::SeqCst) {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    let mut uploads = fake.uploads.lock().unwrap();
    let Some((_, parts)) = uploads.get_mut(&id) else {
        return StatusCode::NOT_FOUND;
    };
    parts.insert(number, body.to_vec());
    StatusCode::OK
}

async fn complete(State(fake): State<Arc<Fake>>, Path(id): Path<String>, Json(body): Json<Value>) -> StatusCode {
    let Some((path, parts)) = fake.uploads.lock().unwrap().remove(&id) else {
        return StatusCode::NOT_FOUND;
    };
    let expected = usize::try_from(body["parts"].as_u64().unwrap_or(0)).unwrap();
    if parts.len() != expected {
        return StatusCode::BAD_REQUEST;
    }
    let mut assembled = Vec::new();
    for n in 1..=expected {
        assembled.extend_from_slice(&parts[&n]);
    }
    fake.objects.lock().unwrap().insert(path, assembled);
    StatusCode::OK
}

async fn create_task(State(fake): State<Arc<Fake>>, Json(body): Json<Value>) -> Json<Value> {
    fake.conversions.lock().unwrap().push(body);
    Json(json!({ "uuid": "task-1" }))
}

async fn poll_task(State(fake): State<Arc<Fake>>, Path(_id): Path<String>) -> Json<Value> {
    if fake.polls.fetch_add(1, Ordering::SeqCst) == 0 {
        return Json(json!({ "status": "Converting", "progress": { "convertedPercentage": 50 } }));
    }
    Json(json!({
        "status": "Finished",
        "progress": {
            "convertedPercentage": 100,
            "convertedFileList": [
                { "width": 1280, "height": 720, "conversionFileUrl": "https://render.test/1.png" },
                {
                    "width": 1280,
                    "height": 720,
                    "conversionFileUrl": "https://render.test/2.png",
                    "preview": "https://render.test/2-small.png"
                }
            ]
        }
    }))
}

async fn serve(fake: Arc<Fake>) -> String {
    let app = Router::new()
        .route("/uploads", post(initiate))
        .route("/uploads/{id}/parts/{number}", put(put_part))
        .route("/uploads/{id}/complete", post(complete))
        .route("/services/conversion/tasks", post(create_task))
        .route("/services/conversion/tasks/{id}", get(poll_task))
        .with_state(fake);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

// =============================================================================
// HARNESS
// =============================================================================

struct Harness {
    fake: Arc<Fake>,
    ingestor: Ingestor,
    rx: mpsc::Receiver<Frame>,
    progress: mpsc::UnboundedReceiver<ProgressEvent>,
    progress_tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl Harness {
    async fn start() -> Self {
        let fake = Arc::new(Fake::default());
        let base = serve(fake.clone()).await;

        let store = HttpObjectStore::new(base.clone(), format!("{base}/public"), None, 64, TIMEOUTS).unwrap();
        let converter =
            HttpConverter::new(base, Some("tok".into()), Duration::from_millis(10), TIMEOUTS).unwrap();

        let (tx, rx) = mpsc::channel(64);
        let canvas = Arc::new(FrameCanvas::new(tx, "us-sv"));
        let ingestor = Ingestor::new(canvas, Uploader::new(Arc::new(store)))
            .with_converter(DocumentConverter::new(Arc::new(converter)));

        let (progress_tx, progress) = mpsc::unbounded_channel();
        Self { fake, ingestor, rx, progress, progress_tx }
    }

    fn sink(&self) -> Arc<dyn ProgressSink> {
        Arc::new(self.progress_tx.clone())
    }

    fn frames(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.rx.try_recv() {
            frames.push(frame);
        }
        frames
    }

    fn events(&mut self) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.progress.try_recv() {
            events.push(event);
        }
        events
    }
}

fn png(name: &str, width: u32, height: u32) -> AssetSource {
    let mut out = Cursor::new(Vec::new());
    DynamicImage::new_rgb8(width, height).write_to(&mut out, ImageFormat::Png).unwrap();
    AssetSource::new(name, "image/png", Bytes::from(out.into_inner()))
}

fn syscalls(frames: &[Frame]) -> Vec<&str> {
    frames.iter().map(|f| f.syscall.as_str()).collect()
}

// =============================================================================
// TESTS
// =============================================================================

#[tokio::test]
async fn image_drop_uploads_in_parts_and_finalizes_placeholders() {
    let mut h = Harness::start().await;
    let files = vec![png("a.png", 64, 48), png("b.png", 1200, 300)];
    let originals: Vec<Bytes> = files.iter().map(|f| f.payload.clone()).collect();

    let placed = h
        .ingestor
        .handle_drop(files, Point::new(400.0, 300.0), Size::new(1920.0, 1080.0), h.sink())
        .await
        .unwrap();
    assert_eq!(placed.len(), 2);

    let objects = h.fake.objects.lock().unwrap().clone();
    for (image, original) in placed.iter().zip(&originals) {
        let path = format!("{}.png", image.id.simple());
        assert_eq!(objects[&path], original.to_vec());
        assert!(image.url.ends_with(&format!("/public/{path}")));
    }

    let frames = h.frames();
    assert_eq!(
        syscalls(&frames),
        ["object:create", "object:create", "object:update", "object:update", "tool:set"]
    );
    assert_eq!(frames.last().unwrap().data["tool"], "selector");

    let wide = &frames[1].data;
    assert_eq!(wide["width"], 960.0);
    assert_eq!(wide["height"], 240.0);
    assert_eq!(wide["x"], 400.0 - 480.0);
    assert_eq!(wide["props"]["src"], Value::Null);

    let events = h.events();
    assert!(events.iter().all(|e| e.phase == ProgressPhase::Uploading));
    assert!(events.iter().any(|e| (e.fraction - 1.0).abs() < f64::EPSILON));
}

#[tokio::test]
async fn rejected_parts_fail_the_drop_and_restore_selector() {
    let mut h = Harness::start().await;
    h.fake.reject_parts.store(true, Ordering::SeqCst);

    let err = h
        .ingestor
        .handle_drop(vec![png("a.png", 10, 10)], Point::new(0.0, 0.0), Size::new(800.0, 600.0), h.sink())
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::Upload(StorageError::UploadFailed { status: 500, .. })));

    let frames = h.frames();
    assert_eq!(syscalls(&frames), ["object:create", "tool:set"]);
    assert!(h.fake.objects.lock().unwrap().is_empty());
}

#[tokio::test]
async fn document_converts_into_scenes() {
    let mut h = Harness::start().await;
    let source = AssetSource::new("quarterly.pptx", "application/octet-stream", Bytes::from(vec![7u8; 200]));

    let doc = h.ingestor.convert_file(source, ConversionKind::Dynamic, h.sink()).await.unwrap();
    assert_eq!(doc.scene_count, 2);

    let stored_path = format!("documents/{}.pptx", doc.id.simple());
    assert_eq!(h.fake.objects.lock().unwrap()[&stored_path], vec![7u8; 200]);

    let conversions = h.fake.conversions.lock().unwrap().clone();
    assert_eq!(conversions.len(), 1);
    assert_eq!(conversions[0]["type"], "dynamic");
    assert_eq!(conversions[0]["region"], "us-sv");
    assert_eq!(conversions[0]["resource"], doc.source_url);

    let frames = h.frames();
    assert_eq!(syscalls(&frames), ["scene:put", "scene:set"]);
    assert_eq!(frames[0].data["path"], format!("/{}", doc.id.simple()));
    assert_eq!(frames[0].data["scenes"][0]["name"], "1");
    assert_eq!(frames[0].data["scenes"][1]["ppt"]["previewURL"], "https://render.test/2-small.png");
    assert_eq!(frames[1].data["path"], format!("/{}/1", doc.id.simple()));

    let converting: Vec<f64> =
        h.events().iter().filter(|e| e.phase == ProgressPhase::Converting).map(|e| e.fraction).collect();
    assert_eq!(converting.first().copied(), Some(0.5));
    assert_eq!(converting.last().copied(), Some(1.0));
}
