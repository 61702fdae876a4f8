use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use clap::Parser;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};

use facerange_core::detection::domain::face_detector::FaceDetector;
use facerange_core::detection::infrastructure::onnx_yunet_detector::{
    OnnxYunetDetector, DEFAULT_SCORE_THRESHOLD,
};
use facerange_core::measure::MeasureConfig;
use facerange_core::shared::constants::{YUNET_MODEL_NAME, YUNET_MODEL_URL};
use facerange_core::shared::model_resolver;

use crate::ws::{ws_handler, ServerContext};

mod gate;
mod protocol;
mod ws;

/// Live face distance measurement over WebSocket.
#[derive(Parser)]
#[command(name = "facerange")]
struct Cli {
    /// Address to bind.
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on.
    #[arg(long, default_value = "8000")]
    port: u16,

    /// Path to the YuNet ONNX model. Overrides cache lookup and download;
    /// the file must exist.
    #[arg(long)]
    model: Option<PathBuf>,

    /// Detection confidence required to accept a face (0.0-1.0).
    #[arg(long, default_value = "0.4")]
    confidence: f64,

    /// Real-world reference face width in meters.
    #[arg(long, default_value = "0.15")]
    known_face_width: f64,

    /// Calibration (arm's-length) distance in meters.
    #[arg(long, default_value = "0.7")]
    known_distance: f64,

    /// Target distance the reference box is drawn for, in meters.
    #[arg(long, default_value = "4.0")]
    target_distance: f64,

    /// Minimum interval between processed bare frames in milliseconds.
    #[arg(long, default_value = "50")]
    frame_interval_ms: u64,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    // The model must be available before we accept a single connection;
    // a missing artifact is a startup failure, never a runtime one
    let detector = build_detector(&cli)?;

    let config = MeasureConfig {
        known_face_width: cli.known_face_width,
        known_distance: cli.known_distance,
        target_distance: cli.target_distance,
        min_confidence: cli.confidence,
    };
    let state = Arc::new(ServerContext {
        detector: Mutex::new(detector),
        config,
        frame_interval: Duration::from_millis(cli.frame_interval_ms),
    });

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(serve(&cli.host, cli.port, state))
}

async fn serve(
    host: &str,
    port: u16,
    state: Arc<ServerContext>,
) -> Result<(), Box<dyn std::error::Error>> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/ws", get(ws_handler))
        .layer(cors)
        .with_state(state);

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("listening on {addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

fn build_detector(cli: &Cli) -> Result<Box<dyn FaceDetector>, Box<dyn std::error::Error>> {
    log::info!("Resolving model: {YUNET_MODEL_NAME}");
    let model_path = model_resolver::resolve(
        YUNET_MODEL_NAME,
        YUNET_MODEL_URL,
        cli.model.as_deref(),
        None,
        Some(Box::new(download_progress)),
    )?;
    eprintln!();

    Ok(Box::new(OnnxYunetDetector::new(
        &model_path,
        DEFAULT_SCORE_THRESHOLD,
    )?))
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !(0.0..=1.0).contains(&cli.confidence) {
        return Err(format!(
            "Confidence must be between 0.0 and 1.0, got {}",
            cli.confidence
        )
        .into());
    }
    if cli.known_face_width <= 0.0 {
        return Err(format!(
            "Known face width must be positive, got {}",
            cli.known_face_width
        )
        .into());
    }
    if cli.known_distance <= 0.0 {
        return Err(format!(
            "Known distance must be positive, got {}",
            cli.known_distance
        )
        .into());
    }
    if cli.target_distance <= 0.0 {
        return Err(format!(
            "Target distance must be positive, got {}",
            cli.target_distance
        )
        .into());
    }
    Ok(())
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading face detection model... {pct}%");
    } else {
        eprint!("\rDownloading face detection model... {downloaded} bytes");
    }
}
