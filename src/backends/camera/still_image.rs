// SPDX-License-Identifier: GPL-3.0-only

//! Still-image capture source
//!
//! Streams a fixed set of image files into a sink as if they were a live
//! camera, cycling through them at roughly 30 fps. Used by the CLI to scan
//! files and by tests that need a reproducible feed.

use super::frame_loop::{CaptureLoopController, LoopAction};
use super::sink::VideoSink;
use super::types::{CameraFrame, FacingMode};
use super::{MediaDevices, MediaStream};
use crate::constants::{capture, file_formats};
use crate::errors::CameraError;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::path::Path;
use std::sync::Weak;
use std::time::Instant;
use tracing::{debug, info};

/// Load an image file as an RGBA camera frame
pub fn load_image_as_frame(path: &Path) -> Result<CameraFrame, CameraError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    if !file_formats::is_image_extension(&extension) {
        return Err(CameraError::DeviceUnavailable(format!(
            "Unsupported file format: {}",
            extension
        )));
    }

    info!(path = %path.display(), "Loading image file");

    let img = image::open(path).map_err(|e| {
        CameraError::DeviceUnavailable(format!("Failed to load image '{}': {}", path.display(), e))
    })?;

    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    debug!(width, height, "Image loaded successfully");

    Ok(CameraFrame::from_rgba(width, height, rgba.into_raw()))
}

/// Capture source backed by in-memory frames
#[derive(Debug, Clone)]
pub struct StillImageDevices {
    frames: Vec<CameraFrame>,
}

impl StillImageDevices {
    /// Use already decoded frames
    pub fn new(frames: Vec<CameraFrame>) -> Self {
        Self { frames }
    }

    /// Load every path up front so a bad file fails before scanning starts
    pub fn from_paths<P: AsRef<Path>>(paths: &[P]) -> Result<Self, CameraError> {
        let frames = paths
            .iter()
            .map(|p| load_image_as_frame(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(frames))
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl MediaDevices for StillImageDevices {
    fn name(&self) -> &str {
        "still-image"
    }

    fn open(
        &self,
        facing: FacingMode,
        sink: Weak<VideoSink>,
    ) -> BoxFuture<'_, Result<Box<dyn MediaStream>, CameraError>> {
        let frames = self.frames.clone();
        async move {
            if frames.is_empty() {
                return Err(CameraError::DeviceUnavailable("No images to stream".into()));
            }
            debug!(%facing, count = frames.len(), "Facing hint ignored for still images");

            let mut index = 0usize;
            let controller = CaptureLoopController::start_paced(
                "still-image",
                capture::IMAGE_STREAM_FRAME_DURATION,
                move || {
                    let Some(sink) = sink.upgrade() else {
                        return LoopAction::Stop;
                    };
                    let mut frame = frames[index % frames.len()].clone();
                    frame.captured_at = Instant::now();
                    sink.publish(frame);
                    index = index.wrapping_add(1);
                    LoopAction::Continue
                },
            );

            Ok(Box::new(StillImageStream { controller }) as Box<dyn MediaStream>)
        }
        .boxed()
    }
}

/// Active still-image stream
pub struct StillImageStream {
    controller: CaptureLoopController,
}

impl MediaStream for StillImageStream {
    fn label(&self) -> &str {
        "still-image"
    }

    fn stop(&mut self) {
        self.controller.stop();
    }
}
