// SPDX-License-Identifier: GPL-3.0-only

//! QR code reading
//!
//! Frames are converted to grayscale and sampled down to a bounded size
//! before grid detection, since QR codes in a camera view are usually large
//! enough to survive it.

use super::SymbolReader;
use crate::backends::camera::Frame;
use crate::constants::decoding;
use crate::errors::DecodeError;
use tracing::{debug, trace};

/// QR reader backed by `rqrr`
#[derive(Debug, Clone, Copy)]
pub struct RqrrReader {
    /// Maximum dimension for processing (frames are downscaled to this)
    max_dimension: u32,
}

impl Default for RqrrReader {
    fn default() -> Self {
        Self::new()
    }
}

impl RqrrReader {
    pub fn new() -> Self {
        Self {
            max_dimension: decoding::QR_MAX_DIMENSION,
        }
    }

    /// Reader with a custom processing size
    pub fn with_max_dimension(max_dimension: u32) -> Self {
        Self {
            max_dimension: max_dimension.max(1),
        }
    }
}

impl SymbolReader for RqrrReader {
    fn read(&self, frame: &Frame) -> Result<Option<String>, DecodeError> {
        let start = std::time::Instant::now();
        let (width, height) = (frame.width(), frame.height());

        let scale = (width.max(height) as f32 / self.max_dimension as f32).max(1.0);
        let proc_width = ((width as f32 / scale) as u32).max(1);
        let proc_height = ((height as f32 / scale) as u32).max(1);

        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
            proc_width as usize,
            proc_height as usize,
            |x, y| {
                let src_x = ((x as f32 * scale) as u32).min(width - 1);
                let src_y = ((y as f32 * scale) as u32).min(height - 1);
                frame.luma(src_x, src_y).unwrap_or(u8::MAX)
            },
        );

        let grids = prepared.detect_grids();
        trace!(
            proc_width,
            proc_height,
            scale,
            grids = grids.len(),
            elapsed_ms = start.elapsed().as_millis(),
            "QR grid detection complete"
        );

        if grids.is_empty() {
            return Ok(None);
        }

        let mut last_error = None;
        for grid in &grids {
            match grid.decode() {
                Ok((meta, content)) if !content.trim().is_empty() => {
                    debug!(version = meta.version.0, %content, "Decoded QR code");
                    return Ok(Some(content));
                }
                Ok(_) => last_error = Some(DecodeError::Malformed("empty QR payload".into())),
                Err(e) => {
                    debug!(error = %e, "Failed to decode QR grid");
                    last_error = Some(DecodeError::Failed(e.to_string()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| DecodeError::Failed("no decodable grid".into())))
    }
}
