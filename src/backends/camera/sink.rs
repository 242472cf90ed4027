// SPDX-License-Identifier: GPL-3.0-only

//! Video sink
//!
//! The sink is the surface a capture stream renders into. Streams publish
//! their newest frame; the engine only reads from it. The caller owns the
//! sink and hands the engine a shared reference, which the camera session
//! downgrades to a weak one.

use super::types::CameraFrame;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Latest-frame slot shared between a capture stream and the engine
#[derive(Debug, Default)]
pub struct VideoSink {
    latest: Mutex<Option<CameraFrame>>,
    frames_published: AtomicU64,
}

impl VideoSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Replace the current frame (called from the capture side)
    pub fn publish(&self, frame: CameraFrame) {
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = Some(frame);
        self.frames_published.fetch_add(1, Ordering::Relaxed);
    }

    /// Drop the current frame, e.g. after the stream was stopped
    pub fn clear(&self) {
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Dimensions of the current frame, `(0, 0)` when empty
    pub fn dimensions(&self) -> (u32, u32) {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|f| (f.width, f.height))
            .unwrap_or((0, 0))
    }

    /// True once a frame with non-zero dimensions is available
    pub fn has_enough_data(&self) -> bool {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(CameraFrame::has_pixels)
    }

    /// Clone of the current frame (pixel data is reference counted)
    pub fn latest(&self) -> Option<CameraFrame> {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of frames published since creation
    pub fn frames_published(&self) -> u64 {
        self.frames_published.load(Ordering::Relaxed)
    }
}
