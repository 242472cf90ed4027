// SPDX-License-Identifier: GPL-3.0-only

//! Camera collaborators
//!
//! ```text
//! ┌──────────────────────┐
//! │      ScanEngine      │
//! └──────────┬───────────┘
//!            │ acquire / current_frame / release
//!            ▼
//! ┌──────────────────────┐      weak      ┌────────────┐
//! │    CameraSession     │ ─────────────► │ VideoSink  │
//! └──────────┬───────────┘                └─────▲──────┘
//!            │ open                             │ publish
//!            ▼                                  │
//! ┌──────────────────────┐   MediaStream  ┌─────┴──────┐
//! │ MediaDevices (trait) │ ─────────────► │  capture   │
//! └──────────────────────┘                │  thread    │
//!   V4L2 · still images                   └────────────┘
//! ```

pub mod frame_loop;
pub mod raster;
pub mod session;
pub mod sink;
pub mod still_image;
pub mod types;
pub mod v4l2;

pub use session::CameraSession;
pub use sink::VideoSink;
pub use still_image::StillImageDevices;
pub use types::*;
pub use v4l2::V4l2Devices;

use crate::errors::CameraError;
use futures::future::BoxFuture;
use std::sync::Weak;

/// Platform capture provider
///
/// Implementations open a stream that renders into the given sink. Opening
/// may wait on a user permission decision for an unbounded time.
pub trait MediaDevices: Send + Sync {
    /// Short provider name for logs
    fn name(&self) -> &str;

    /// Open a capture stream that publishes frames into `sink`
    ///
    /// # Returns
    /// * `Ok(stream)` - Stream started; frames may arrive later
    /// * `Err(CameraError::PermissionDenied)` - Access refused
    /// * `Err(CameraError::DeviceUnavailable)` - No usable device
    fn open(
        &self,
        facing: FacingMode,
        sink: Weak<VideoSink>,
    ) -> BoxFuture<'_, Result<Box<dyn MediaStream>, CameraError>>;
}

/// Handle to a running capture stream
pub trait MediaStream: Send {
    /// Human-readable stream label
    fn label(&self) -> &str;

    /// Stop every track of the stream; must tolerate repeated calls
    fn stop(&mut self);
}
