// SPDX-License-Identifier: GPL-3.0-only

//! Camera session lifecycle
//!
//! A session owns at most one capture stream at a time. It renders into a
//! caller-owned [`VideoSink`] (held weakly) and samples the sink through its
//! own [`RasterSurface`] whenever the scheduler asks for a frame.

use super::raster::RasterSurface;
use super::sink::VideoSink;
use super::types::{FacingMode, FrameSample};
use super::{MediaDevices, MediaStream};
use crate::errors::CameraError;
use std::sync::{Arc, Weak};
use tracing::{debug, info};

/// Capture stream plus the raster surface used to sample it
pub struct CameraSession {
    devices: Arc<dyn MediaDevices>,
    sink: Weak<VideoSink>,
    facing: FacingMode,
    stream: Option<Box<dyn MediaStream>>,
    raster: RasterSurface,
}

impl CameraSession {
    /// Create an idle session bound to `sink`
    pub fn new(devices: Arc<dyn MediaDevices>, sink: &Arc<VideoSink>, facing: FacingMode) -> Self {
        Self {
            devices,
            sink: Arc::downgrade(sink),
            facing,
            stream: None,
            raster: RasterSurface::new(),
        }
    }

    /// Request the capture stream
    ///
    /// May wait on a platform permission prompt. A session that already holds
    /// a stream returns immediately without asking the platform again.
    pub async fn acquire(&mut self) -> Result<(), CameraError> {
        if self.stream.is_some() {
            debug!("Camera stream already acquired");
            return Ok(());
        }

        info!(devices = self.devices.name(), facing = %self.facing, "Acquiring camera stream");
        let stream = self.devices.open(self.facing, self.sink.clone()).await?;
        info!(stream = stream.label(), "Camera stream attached");
        self.stream = Some(stream);
        Ok(())
    }

    /// Sample the most recent frame through the raster surface
    pub fn current_frame(&mut self) -> FrameSample {
        if self.stream.is_none() {
            return FrameSample::NotReady;
        }
        let Some(sink) = self.sink.upgrade() else {
            return FrameSample::NotReady;
        };
        if !sink.has_enough_data() {
            return FrameSample::NotReady;
        }

        match sink.latest().and_then(|frame| self.raster.draw(&frame)) {
            Some(frame) => FrameSample::Ready(frame),
            None => FrameSample::NotReady,
        }
    }

    /// Stop all tracks and forget the stream; safe to call repeatedly
    pub fn release(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            info!(stream = stream.label(), "Releasing camera stream");
            stream.stop();
        }
        if let Some(sink) = self.sink.upgrade() {
            sink.clear();
        }
    }

    /// True while a stream is held
    pub fn is_active(&self) -> bool {
        self.stream.is_some()
    }

    /// Label of the active stream
    pub fn stream_label(&self) -> Option<&str> {
        self.stream.as_deref().map(|s| s.label())
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        if self.stream.is_some() {
            debug!("CameraSession dropped, releasing stream");
            self.release();
        }
    }
}

impl std::fmt::Debug for CameraSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraSession")
            .field("devices", &self.devices.name())
            .field("facing", &self.facing)
            .field("active", &self.is_active())
            .finish()
    }
}
