// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Sampling cadence constants
pub mod sampling {
    use super::Duration;

    /// Default software sampling rate (samples per second)
    pub const DEFAULT_TARGET_FPS: u32 = 10;

    /// Lowest software sampling rate; slower requests are raised to this
    pub const MIN_TARGET_FPS: u32 = 4;

    /// Shortest fixed interval between software ticks
    pub const MIN_SOFT_INTERVAL: Duration = Duration::from_millis(60);

    /// Render-synchronized cadence used while a native detector is active (~60Hz)
    pub const FRAME_SYNC_INTERVAL: Duration = Duration::from_millis(16);

    /// Code 39 software attempts run on one tick out of this many
    pub const CODE39_TICK_DIVISOR: u64 = 6;

    /// Fixed interval for a software-only loop at `fps` samples per second
    ///
    /// The rate is raised to [`MIN_TARGET_FPS`] and the resulting period is
    /// never shorter than [`MIN_SOFT_INTERVAL`].
    pub fn soft_interval(fps: u32) -> Duration {
        let fps = fps.max(MIN_TARGET_FPS) as u64;
        let period_ms = (1000 + fps / 2) / fps;
        Duration::from_millis(period_ms).max(MIN_SOFT_INTERVAL)
    }
}

/// Software decoder tuning
pub mod decoding {
    /// Frames larger than this are sampled down before QR detection
    pub const QR_MAX_DIMENSION: u32 = 640;

    /// Longest side of the Code 39 re-encode; larger frames are sampled down
    pub const CODE39_MAX_INPUT: u32 = 1280;
}

/// Capture device constants
pub mod capture {
    use super::Duration;

    /// Default V4L2 capture node
    pub const DEFAULT_DEVICE: &str = "/dev/video0";

    /// Requested capture resolution
    pub const DEFAULT_WIDTH: u32 = 1280;
    pub const DEFAULT_HEIGHT: u32 = 720;

    /// Memory-mapped buffers queued on the device
    pub const MMAP_BUFFER_COUNT: u32 = 4;

    /// Frame counter modulo for periodic logging
    pub const FRAME_LOG_INTERVAL: u64 = 60;

    /// Back-off after a failed dequeue
    pub const RETRY_DELAY: Duration = Duration::from_millis(10);

    /// Longest wait for one buffer before the capture thread re-checks
    /// its stop signal
    pub const DEQUEUE_TIMEOUT: Duration = Duration::from_millis(500);

    /// Longest time `stop()` waits for a capture thread to exit
    pub const STOP_TIMEOUT: Duration = Duration::from_secs(1);

    /// Frame period for still-image streams (~30fps)
    pub const IMAGE_STREAM_FRAME_DURATION: Duration = Duration::from_millis(33);
}

/// Supported file formats for still-image sources
pub mod file_formats {
    /// Supported image file extensions
    pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp"];

    /// Check if a file extension is a supported image format
    pub fn is_image_extension(ext: &str) -> bool {
        IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str())
    }
}
