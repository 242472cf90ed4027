// SPDX-License-Identifier: GPL-3.0-only

//! Shared types for camera sources and the frames they produce

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Which way the requested camera should face
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Rear camera, pointing away from the user
    #[default]
    Environment,
    /// Front camera, pointing at the user
    User,
}

impl std::fmt::Display for FacingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FacingMode::Environment => write!(f, "environment"),
            FacingMode::User => write!(f, "user"),
        }
    }
}

/// Pixel format of a captured camera frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// RGBA - 32-bit with alpha (4 bytes per pixel)
    /// This is the raster format handed to decoders
    RGBA,
    /// BGRA - 32-bit with alpha (B G R A byte order)
    BGRA,
    /// RGB24 - 24-bit RGB (3 bytes per pixel, no alpha)
    RGB24,
    /// Gray8 - 8-bit grayscale (single channel)
    Gray8,
    /// YUYV - Packed 4:2:2 (Y0 U Y1 V interleaved)
    /// Common raw format from webcam sensors
    YUYV,
    /// UYVY - Packed 4:2:2 (U Y0 V Y1 interleaved)
    UYVY,
}

impl PixelFormat {
    /// Bytes per pixel, averaged over a packed 4:2:2 pair
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            Self::RGBA | Self::BGRA => 4,
            Self::RGB24 => 3,
            Self::YUYV | Self::UYVY => 2,
            Self::Gray8 => 1,
        }
    }

    /// Parse a V4L2 FourCC code
    pub fn from_fourcc(code: &[u8; 4]) -> Option<Self> {
        match code {
            b"YUYV" => Some(Self::YUYV),
            b"UYVY" => Some(Self::UYVY),
            b"GREY" => Some(Self::Gray8),
            b"RGB3" => Some(Self::RGB24),
            b"AB24" => Some(Self::RGBA),
            b"AR24" => Some(Self::BGRA),
            _ => None,
        }
    }
}

/// A single frame as delivered by a capture stream
///
/// The buffer may carry row padding; `stride` is the number of bytes per row.
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub width: u32,
    pub height: u32,
    /// Raw pixel data in `format`
    pub data: Arc<[u8]>,
    /// Pixel format of the data
    pub format: PixelFormat,
    /// Row stride in bytes (may include padding)
    pub stride: u32,
    /// Timestamp when frame was captured
    pub captured_at: Instant,
}

impl CameraFrame {
    /// Build a tightly packed RGBA frame
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data: Arc::from(data.into_boxed_slice()),
            format: PixelFormat::RGBA,
            stride: width * 4,
            captured_at: Instant::now(),
        }
    }

    /// Build a tightly packed 8-bit grayscale frame
    pub fn from_gray(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data: Arc::from(data.into_boxed_slice()),
            format: PixelFormat::Gray8,
            stride: width,
            captured_at: Instant::now(),
        }
    }

    /// True when the frame has drawable content
    pub fn has_pixels(&self) -> bool {
        self.width > 0 && self.height > 0 && !self.data.is_empty()
    }
}

/// A decodable snapshot of the live stream
///
/// Produced by the camera session's raster surface once per tick. Pixels are
/// tightly packed RGBA; width and height are never zero.
#[derive(Debug, Clone)]
pub struct Frame {
    width: u32,
    height: u32,
    rgba: Arc<[u8]>,
    captured_at: DateTime<Utc>,
}

impl Frame {
    /// Wrap a packed RGBA raster; `None` if a dimension is zero or the
    /// buffer does not match the dimensions
    pub fn new(width: u32, height: u32, rgba: Arc<[u8]>) -> Option<Self> {
        if width == 0 || height == 0 || rgba.len() != (width as usize) * (height as usize) * 4 {
            return None;
        }
        Some(Self {
            width,
            height,
            rgba,
            captured_at: Utc::now(),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Packed RGBA pixels
    pub fn rgba(&self) -> &[u8] {
        &self.rgba
    }

    /// When the raster was drawn
    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// BT.601 luma of the pixel at (x, y); `None` outside the frame
    #[inline]
    pub fn luma(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = ((y as usize) * (self.width as usize) + x as usize) * 4;
        self.rgba.get(offset..offset + 4).map(bt601)
    }

    /// Whole frame as 8-bit luma, row-major
    pub fn to_luma(&self) -> Vec<u8> {
        self.rgba.chunks_exact(4).map(bt601).collect()
    }
}

#[inline]
fn bt601(px: &[u8]) -> u8 {
    ((px[0] as u32 * 299 + px[1] as u32 * 587 + px[2] as u32 * 114) / 1000) as u8
}

/// Outcome of sampling the stream for one tick
#[derive(Debug, Clone)]
pub enum FrameSample {
    /// A decodable frame
    Ready(Frame),
    /// The stream has not produced a usable frame yet
    NotReady,
}
