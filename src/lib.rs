// SPDX-License-Identifier: GPL-3.0-only

//! codescan - live barcode scanning over a camera stream
//!
//! The engine samples frames from a capture stream, runs them through a
//! priority-ordered chain of decoders (a host detector when available, then
//! software QR and Code 39 readers) and reports payloads according to the
//! configured result mode.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`backends`]: Camera capture and decoder backends
//! - [`engine`]: Scan engine, decoder chain, scheduler and result policy
//! - [`config`]: User configuration handling
//! - [`constants`]: Timing and tuning constants
//! - [`errors`]: Error types
//!
//! # Example
//!
//! ```ignore
//! let engine = ScanEngine::new(Arc::new(V4l2Devices::new("/dev/video0")));
//! let sink = VideoSink::new();
//! engine.start(ScanConfig::with_sink(&sink)).await?;
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod engine;
pub mod errors;

// Re-export commonly used types
pub use backends::camera::{FacingMode, Frame, V4l2Devices, VideoSink};
pub use backends::decoders::{BackendId, FormatSelection, Symbology};
pub use config::Config;
pub use engine::{EngineState, ResultMode, ScanConfig, ScanEngine};
pub use errors::{ErrorKind, ScanError, ScanResult};
