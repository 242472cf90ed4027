// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! This module provides command-line functionality for:
//! - Scanning a camera or a looped set of images
//! - Decoding a single image file
//! - Listing supported formats
//!
//! Results and errors are printed as JSON lines on stdout; logs go to
//! stderr.

use chrono::{DateTime, Utc};
use codescan::backends::camera::raster::RasterSurface;
use codescan::backends::camera::still_image::load_image_as_frame;
use codescan::backends::camera::{MediaDevices, StillImageDevices, V4l2Devices, VideoSink};
use codescan::backends::decoders::{
    BackendId, BundledDecoders, Code39Reader, FormatSelection, RqrrReader, Symbology,
};
use codescan::engine::{Callbacks, ChainParts, DecoderChain, ResultMode, ScanEngine};
use codescan::{Config, ErrorKind};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

/// Command-line overrides for `scan`
pub struct ScanArgs {
    pub device: Option<String>,
    pub images: Vec<std::path::PathBuf>,
    pub formats: Option<Vec<Symbology>>,
    pub mode: Option<ResultMode>,
    pub key: Option<String>,
    pub fps: Option<u32>,
    pub facing: Option<codescan::FacingMode>,
    pub heartbeat: bool,
}

enum ScanEvent {
    Result { payload: String, backend: BackendId },
    Error { kind: ErrorKind, message: String },
}

/// Load the configuration from `path` or the default location
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    Ok(config)
}

/// Scan until a result (or until interrupted in continuous mode)
pub fn scan(mut config: Config, args: ScanArgs) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(device) = args.device {
        config.device_path = device;
    }
    if let Some(formats) = args.formats {
        config.formats = FormatSelection::only(formats);
    }
    if let Some(mode) = args.mode {
        config.mode = mode;
    }
    if args.key.is_some() {
        config.key = args.key;
    }
    if let Some(fps) = args.fps {
        config.target_fps = fps;
    }
    if let Some(facing) = args.facing {
        config.facing = facing;
    }
    config.heartbeat |= args.heartbeat;
    config.validate()?;

    let devices: Arc<dyn MediaDevices> = if args.images.is_empty() {
        Arc::new(V4l2Devices::new(&config.device_path))
    } else {
        Arc::new(StillImageDevices::from_paths(args.images.as_slice())?)
    };

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_scan(config, devices))
}

async fn run_scan(
    config: Config,
    devices: Arc<dyn MediaDevices>,
) -> Result<(), Box<dyn std::error::Error>> {
    let engine = ScanEngine::new(devices);
    let sink = VideoSink::new();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let result_tx = tx.clone();
    let error_tx = tx;
    let callbacks = Callbacks {
        on_result: Some(Arc::new(move |payload: &str, backend| {
            let _ = result_tx.send(ScanEvent::Result {
                payload: payload.to_string(),
                backend,
            });
        })),
        on_error: Some(Arc::new(move |kind, message: &str| {
            let _ = error_tx.send(ScanEvent::Error {
                kind,
                message: message.to_string(),
            });
        })),
        on_heartbeat: Some(Arc::new(|width: u32, height: u32, at: DateTime<Utc>| {
            println!(
                "{}",
                json!({ "event": "heartbeat", "width": width, "height": height, "timestamp": at.to_rfc3339() })
            );
        })),
        on_activity: None,
    };

    let mode = config.mode;
    let scan_config = config.to_scan_config(&sink, callbacks);
    if let Err(e) = engine.start(scan_config).await {
        // Already reported through the error callback
        drain_errors(&mut rx);
        return Err(e.into());
    }
    info!("Scanning; press Ctrl+C to stop");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                engine.stop();
                break;
            }
            event = rx.recv() => match event {
                Some(ScanEvent::Result { payload, backend }) => {
                    println!(
                        "{}",
                        json!({
                            "event": "result",
                            "payload": payload,
                            "backend": backend,
                            "timestamp": Utc::now().to_rfc3339(),
                        })
                    );
                    if mode != ResultMode::Continuous {
                        break;
                    }
                }
                Some(ScanEvent::Error { kind, message }) => {
                    print_error(kind, &message);
                    engine.stop();
                    return Err(message.into());
                }
                None => break,
            },
        }
    }

    engine.stop();
    Ok(())
}

fn drain_errors(rx: &mut mpsc::UnboundedReceiver<ScanEvent>) {
    while let Ok(event) = rx.try_recv() {
        if let ScanEvent::Error { kind, message } = event {
            print_error(kind, &message);
        }
    }
}

fn print_error(kind: ErrorKind, message: &str) {
    println!(
        "{}",
        json!({ "event": "error", "kind": kind.as_str(), "message": message })
    );
}

/// Run the decoder chain once over an image file
pub fn decode(
    config: &Config,
    path: &Path,
    formats: Option<Vec<Symbology>>,
) -> Result<(), Box<dyn std::error::Error>> {
    let camera_frame = load_image_as_frame(path)?;
    let frame = RasterSurface::new()
        .draw(&camera_frame)
        .ok_or("Image has no pixels")?;

    let selection = formats
        .map(FormatSelection::only)
        .unwrap_or_else(|| config.formats.clone());
    let chain = DecoderChain::build(
        &selection,
        &ChainParts {
            native: None,
            qr_reader: Arc::new(RqrrReader::new()),
            code39_reader: Arc::new(Code39Reader::new()),
            loader: Arc::new(BundledDecoders),
        },
    );

    let rt = tokio::runtime::Runtime::new()?;
    let result = rt.block_on(async {
        chain.prepare_all().await;
        chain.run(&frame, true).await
    });

    match result {
        Some(result) => {
            println!(
                "{}",
                json!({
                    "event": "result",
                    "payload": result.payload,
                    "backend": result.backend,
                    "timestamp": result.captured_at.to_rfc3339(),
                })
            );
            Ok(())
        }
        None => Err(format!("No code found in {}", path.display()).into()),
    }
}

/// List every symbology and the backends able to read it
pub fn list_formats() -> Result<(), Box<dyn std::error::Error>> {
    println!("Supported formats:");
    println!();
    for symbology in Symbology::ALL {
        println!("  {:<8} (native name: {})", symbology.as_str(), symbology.native_name());
        println!(
            "      Backends: {}, {}",
            BackendId::NativeDetector,
            BackendId::soft(symbology)
        );
    }
    Ok(())
}
