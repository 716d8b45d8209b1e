use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use board_ingest::canvas::frames::FrameCanvas;
use board_ingest::config::{ConfigError, IngestConfig};
use board_ingest::convert::http::HttpConverter;
use board_ingest::convert::{ConversionKind, DocumentConverter};
use board_ingest::frame::{Data, ErrorCode, Frame};
use board_ingest::geometry::{Camera, Point, Size};
use board_ingest::ingest::{AssetSource, IngestError, Ingestor};
use board_ingest::progress::{ProgressLog, ProgressSink};
use board_ingest::storage::http::HttpObjectStore;
use board_ingest::storage::{StorageError, Uploader};
use bytes::Bytes;
use clap::{Args, Parser, Subcommand};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Outgoing frame queue depth.
const FRAME_QUEUE: usize = 256;
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error("cannot read {path}: {source}")]
    Read { path: String, source: std::io::Error },
    #[error("frame output closed")]
    OutputClosed,
    #[error("frame encode failed: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("stdout write failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("frame writer aborted: {0}")]
    Writer(#[from] tokio::task::JoinError),
}

impl ErrorCode for CliError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Config(e) => e.error_code(),
            Self::Storage(e) => e.error_code(),
            Self::Ingest(e) => e.error_code(),
            Self::Read { .. } => "E_READ",
            Self::OutputClosed | Self::Io(_) | Self::Writer(_) => "E_OUTPUT",
            Self::Encode(_) => "E_ENCODE",
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Ingest(e) => e.retryable(),
            _ => false,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "ingest", about = "Upload images and slide documents onto a board")]
struct Cli {
    /// Board the emitted frames are addressed to.
    #[arg(long, env = "INGEST_BOARD_ID")]
    board_id: Option<Uuid>,

    /// Region hint for the conversion service; overrides `INGEST_REGION`.
    #[arg(long)]
    region: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Drop JPEG/PNG files onto the board.
    Images(ImagesArgs),
    /// Convert a slide document into board scenes.
    Convert(ConvertArgs),
}

#[derive(Args, Debug)]
struct ImagesArgs {
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Drop point, screen pixels.
    #[arg(long, default_value_t = 0.0)]
    x: f64,
    #[arg(long, default_value_t = 0.0)]
    y: f64,

    /// Viewport size as WIDTHxHEIGHT.
    #[arg(long, default_value = "1920x1080")]
    viewport: Size,

    #[arg(long, default_value_t = 0.0)]
    pan_x: f64,
    #[arg(long, default_value_t = 0.0)]
    pan_y: f64,
    #[arg(long, default_value_t = 1.0)]
    zoom: f64,
}

#[derive(Args, Debug)]
struct ConvertArgs {
    file: PathBuf,

    /// `static` or `dynamic`.
    #[arg(long, default_value = "static")]
    kind: ConversionKind,

    /// Storage folder for the source document; overrides `STORAGE_FOLDER`.
    #[arg(long)]
    folder: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let config = IngestConfig::from_env()?;
    let region = cli.region.unwrap_or_else(|| config.region.clone());

    let store = HttpObjectStore::new(
        config.storage.endpoint.clone(),
        config.storage.public_url.clone(),
        config.storage.token.clone(),
        config.storage.part_size,
        config.timeouts,
    )?;
    let uploader = Uploader::new(Arc::new(store));

    let syscall = match cli.command {
        Command::Images(_) => "ingest:images",
        Command::Convert(_) => "ingest:convert",
    };
    let mut root = Frame::request(syscall, Data::new()).with_from("ingest");
    if let Some(board_id) = cli.board_id {
        root = root.with_board_id(board_id);
    }

    let (tx, rx) = mpsc::channel::<Frame>(FRAME_QUEUE);
    let writer = tokio::spawn(write_frames(rx));
    tx.send(root.clone()).await.map_err(|_| CliError::OutputClosed)?;

    let mut canvas = FrameCanvas::new(tx.clone(), region).with_parent_id(root.id);
    if let Some(board_id) = cli.board_id {
        canvas = canvas.with_board_id(board_id);
    }
    let canvas = Arc::new(canvas);

    let mut ingestor =
        Ingestor::new(canvas.clone(), uploader).with_document_folder(config.storage.document_folder.clone());
    if let Some(converter) = build_converter(&config) {
        ingestor = ingestor.with_converter(converter);
    }
    if let Command::Convert(ConvertArgs { folder: Some(folder), .. }) = &cli.command {
        ingestor = ingestor.with_document_folder(folder.clone());
    }
    let progress: Arc<dyn ProgressSink> = Arc::new(ProgressLog::new());

    let outcome = match cli.command {
        Command::Images(args) => run_images(&ingestor, &canvas, args, progress).await,
        Command::Convert(args) => run_convert(&ingestor, args, progress).await,
    };

    let (replies, failure) = match outcome {
        Ok(result) => {
            let mut data = Data::new();
            data.insert("result".into(), result);
            (vec![root.item(data), root.done()], None)
        }
        Err(e) => {
            error!(error = %e, code = e.error_code(), "ingest failed");
            (vec![root.error_from(&e)], Some(e))
        }
    };
    for frame in replies {
        tx.send(frame).await.map_err(|_| CliError::OutputClosed)?;
    }

    // Uploads detached by a failed batch still hold the canvas; the writer
    // drains until the last of them finishes.
    drop(ingestor);
    drop(canvas);
    drop(tx);
    writer.await??;

    failure.map_or(Ok(()), Err)
}

async fn run_images(
    ingestor: &Ingestor,
    canvas: &FrameCanvas,
    args: ImagesArgs,
    progress: Arc<dyn ProgressSink>,
) -> Result<serde_json::Value, CliError> {
    canvas.set_camera(Camera { pan_x: args.pan_x, pan_y: args.pan_y, zoom: args.zoom });

    let mut files = Vec::with_capacity(args.files.len());
    for path in &args.files {
        files.push(read_source(path).await?);
    }
    info!(files = files.len(), viewport = %args.viewport, "dropping images");

    let placed = ingestor.handle_drop(files, Point::new(args.x, args.y), args.viewport, progress).await?;
    Ok(serde_json::to_value(placed)?)
}

async fn run_convert(
    ingestor: &Ingestor,
    args: ConvertArgs,
    progress: Arc<dyn ProgressSink>,
) -> Result<serde_json::Value, CliError> {
    let source = read_source(&args.file).await?;
    let document = ingestor.convert_file(source, args.kind, progress).await?;
    Ok(serde_json::to_value(document)?)
}

async fn read_source(path: &Path) -> Result<AssetSource, CliError> {
    let payload = tokio::fs::read(path)
        .await
        .map_err(|source| CliError::Read { path: path.display().to_string(), source })?;
    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("upload").to_string();
    let content_type = image::ImageFormat::from_path(path)
        .map_or_else(|_| FALLBACK_CONTENT_TYPE.to_string(), |format| format.to_mime_type().to_string());
    Ok(AssetSource::new(file_name, content_type, Bytes::from(payload)))
}

fn build_converter(config: &IngestConfig) -> Option<DocumentConverter> {
    let Some(cfg) = config.converter.as_ref() else {
        info!("CONVERTER_ENDPOINT not set; document conversion disabled");
        return None;
    };
    let poll = Duration::from_millis(cfg.poll_ms);
    match HttpConverter::new(cfg.endpoint.clone(), cfg.token.clone(), poll, config.timeouts) {
        Ok(converter) => Some(DocumentConverter::new(Arc::new(converter))),
        Err(e) => {
            warn!(error = %e, "document conversion disabled");
            None
        }
    }
}

/// Print every frame as one JSON line on stdout until all senders drop.
async fn write_frames(mut rx: mpsc::Receiver<Frame>) -> Result<(), CliError> {
    let mut stdout = tokio::io::stdout();
    while let Some(frame) = rx.recv().await {
        let mut line = serde_json::to_vec(&frame)?;
        line.push(b'\n');
        stdout.write_all(&line).await?;
    }
    stdout.flush().await?;
    Ok(())
}
