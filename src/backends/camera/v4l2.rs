// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 capture source
//!
//! Opens a Video4Linux2 capture node, negotiates a packed YUV format and
//! streams memory-mapped buffers into the sink from a capture thread.

use super::frame_loop::{CaptureLoopController, LoopAction};
use super::sink::VideoSink;
use super::types::{CameraFrame, FacingMode, PixelFormat};
use super::{MediaDevices, MediaStream};
use crate::constants::capture;
use crate::errors::CameraError;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Weak;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info, warn};
use v4l::FourCC;
use v4l::buffer::Type;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;

/// V4L2 capture node
#[derive(Debug, Clone)]
pub struct V4l2Devices {
    path: PathBuf,
    width: u32,
    height: u32,
}

impl V4l2Devices {
    /// Capture from `path` at the default resolution
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            width: capture::DEFAULT_WIDTH,
            height: capture::DEFAULT_HEIGHT,
        }
    }

    /// Request a different capture resolution
    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }
}

impl MediaDevices for V4l2Devices {
    fn name(&self) -> &str {
        "v4l2"
    }

    fn open(
        &self,
        facing: FacingMode,
        sink: Weak<VideoSink>,
    ) -> BoxFuture<'_, Result<Box<dyn MediaStream>, CameraError>> {
        let path = self.path.clone();
        let (width, height) = (self.width, self.height);
        async move {
            // V4L2 nodes carry no facing metadata; the node path decides
            debug!(%facing, path = %path.display(), "Opening V4L2 node");

            let stream = tokio::task::spawn_blocking(move || open_stream(path, width, height, sink))
                .await
                .map_err(|e| CameraError::DeviceUnavailable(format!("Open task failed: {}", e)))??;
            Ok(Box::new(stream) as Box<dyn MediaStream>)
        }
        .boxed()
    }
}

/// Open the node, negotiate YUYV and start the capture thread
fn open_stream(
    path: PathBuf,
    width: u32,
    height: u32,
    sink: Weak<VideoSink>,
) -> Result<V4l2Stream, CameraError> {
    let dev = Device::with_path(&path)?;

    let caps = dev.query_caps()?;
    info!(card = %caps.card, driver = %caps.driver, path = %path.display(), "Opened V4L2 device");

    let mut format = dev.format()?;
    format.width = width;
    format.height = height;
    format.fourcc = FourCC::new(b"YUYV");

    let format = match dev.set_format(&format) {
        Ok(f) => f,
        Err(e) => {
            warn!(error = %e, "Could not set format, using current device format");
            dev.format()?
        }
    };

    let pixel_format = PixelFormat::from_fourcc(&format.fourcc.repr).ok_or_else(|| {
        CameraError::DeviceUnavailable(format!("Unsupported pixel format {}", format.fourcc))
    })?;
    let stride = if format.stride > 0 {
        format.stride
    } else {
        format.width * pixel_format.bytes_per_pixel()
    };
    info!(
        width = format.width,
        height = format.height,
        fourcc = %format.fourcc,
        stride,
        "Negotiated V4L2 format"
    );

    let mut stream = MmapStream::with_buffers(&dev, Type::VideoCapture, capture::MMAP_BUFFER_COUNT)?;
    // A stalled device must not pin the capture thread inside a dequeue
    stream.set_timeout(capture::DEQUEUE_TIMEOUT);
    let label = format!("v4l2:{}", path.display());
    let frame_counter = AtomicU64::new(0);
    let (frame_width, frame_height) = (format.width, format.height);

    let controller = CaptureLoopController::start(&label, move || {
        let Some(sink) = sink.upgrade() else {
            return LoopAction::Stop;
        };

        match stream.next() {
            Ok((buf, meta)) => {
                let frame_num = frame_counter.fetch_add(1, Ordering::Relaxed);
                if frame_num % capture::FRAME_LOG_INTERVAL == 0 {
                    debug!(frame = frame_num, sequence = meta.sequence, size = buf.len(), "Frame captured");
                }
                sink.publish(CameraFrame {
                    width: frame_width,
                    height: frame_height,
                    data: Arc::from(buf),
                    format: pixel_format,
                    stride,
                    captured_at: Instant::now(),
                });
            }
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                debug!(timeout = ?capture::DEQUEUE_TIMEOUT, "No frame from device");
            }
            Err(e) => {
                warn!(error = %e, "Failed to dequeue frame");
                std::thread::sleep(capture::RETRY_DELAY);
            }
        }
        LoopAction::Continue
    });

    Ok(V4l2Stream { controller, label })
}

/// Active V4L2 stream
pub struct V4l2Stream {
    controller: CaptureLoopController,
    label: String,
}

impl MediaStream for V4l2Stream {
    fn label(&self) -> &str {
        &self.label
    }

    fn stop(&mut self) {
        if !self.controller.stop_within(capture::STOP_TIMEOUT) {
            warn!(stream = %self.label, "Capture thread still busy, released without joining");
        }
    }
}
