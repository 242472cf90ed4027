// SPDX-License-Identifier: GPL-3.0-only

//! Off-screen raster surface
//!
//! Camera streams deliver frames in whatever layout the device produces
//! (packed YUV, BGR orderings, padded rows). The raster surface redraws the
//! latest frame into a tightly packed RGBA buffer that decoders can read.
//! The buffer is reused between draws and belongs to a single session.

use super::types::{CameraFrame, Frame, PixelFormat};
use std::sync::Arc;
use tracing::trace;

/// Reusable RGBA drawing surface
#[derive(Debug, Default)]
pub struct RasterSurface {
    width: u32,
    height: u32,
    buffer: Vec<u8>,
}

impl RasterSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current surface dimensions
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Draw a camera frame and take a snapshot of the result
    ///
    /// Returns `None` when the frame has a zero dimension or its buffer is
    /// too short for the declared geometry.
    pub fn draw(&mut self, frame: &CameraFrame) -> Option<Frame> {
        if !frame.has_pixels() {
            return None;
        }

        let min_stride = frame.width * frame.format.bytes_per_pixel();
        if frame.stride < min_stride {
            trace!(stride = frame.stride, min_stride, "Frame stride smaller than row");
            return None;
        }
        let needed = (frame.stride as usize) * (frame.height as usize - 1) + min_stride as usize;
        if frame.data.len() < needed {
            trace!(len = frame.data.len(), needed, "Frame buffer shorter than geometry");
            return None;
        }

        // Resize the canvas to the frame, keeping the allocation
        self.width = frame.width;
        self.height = frame.height;
        self.buffer.clear();
        self.buffer
            .reserve((frame.width as usize) * (frame.height as usize) * 4);

        for y in 0..frame.height as usize {
            let row_start = y * frame.stride as usize;
            let row = &frame.data[row_start..row_start + min_stride as usize];
            draw_row(frame.format, row, &mut self.buffer);
        }

        let pixels: Arc<[u8]> = Arc::from(self.buffer.as_slice());
        Frame::new(self.width, self.height, pixels)
    }
}

/// Append one source row to `out` as RGBA
fn draw_row(format: PixelFormat, row: &[u8], out: &mut Vec<u8>) {
    match format {
        PixelFormat::RGBA => out.extend_from_slice(row),
        PixelFormat::BGRA => {
            for px in row.chunks_exact(4) {
                out.extend_from_slice(&[px[2], px[1], px[0], px[3]]);
            }
        }
        PixelFormat::RGB24 => {
            for px in row.chunks_exact(3) {
                out.extend_from_slice(&[px[0], px[1], px[2], 255]);
            }
        }
        PixelFormat::Gray8 => {
            for &v in row {
                out.extend_from_slice(&[v, v, v, 255]);
            }
        }
        // YUYV: Y0 U Y1 V - each 4-byte group encodes 2 pixels
        PixelFormat::YUYV => {
            for chunk in row.chunks_exact(4) {
                push_yuv(out, chunk[0], chunk[1], chunk[3]);
                push_yuv(out, chunk[2], chunk[1], chunk[3]);
            }
        }
        // UYVY: U Y0 V Y1
        PixelFormat::UYVY => {
            for chunk in row.chunks_exact(4) {
                push_yuv(out, chunk[1], chunk[0], chunk[2]);
                push_yuv(out, chunk[3], chunk[0], chunk[2]);
            }
        }
    }
}

/// Convert one YUV sample to RGBA (BT.601)
#[inline]
fn push_yuv(out: &mut Vec<u8>, y: u8, u: u8, v: u8) {
    let y = y as f32;
    let u = u as f32 - 128.0;
    let v = v as f32 - 128.0;

    let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
    let g = (y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8;
    let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;

    out.extend_from_slice(&[r, g, b, 255]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_draw_removes_stride_padding() {
        // 2x2 RGBA frame with 2 bytes of padding per row
        let data: Vec<u8> = vec![
            255, 0, 0, 255, // Red pixel
            0, 255, 0, 255, // Green pixel
            0, 0,           // stride padding
            0, 0, 255, 255, // Blue pixel
            255, 255, 255, 255, // White pixel
            0, 0,           // stride padding
        ];

        let frame = CameraFrame {
            width: 2,
            height: 2,
            data: Arc::from(data.as_slice()),
            format: PixelFormat::RGBA,
            stride: 10,
            captured_at: Instant::now(),
        };

        let mut surface = RasterSurface::new();
        let snapshot = surface.draw(&frame).expect("frame should draw");
        let rgba = snapshot.rgba();
        assert_eq!(rgba.len(), 16);
        assert_eq!(&rgba[0..4], &[255, 0, 0, 255]);
        assert_eq!(&rgba[8..12], &[0, 0, 255, 255]);
        assert_eq!(surface.dimensions(), (2, 2));
    }

    #[test]
    fn test_draw_gray_and_bgra() {
        let mut surface = RasterSurface::new();

        let gray = CameraFrame::from_gray(2, 1, vec![10, 200]);
        let snapshot = surface.draw(&gray).unwrap();
        assert_eq!(snapshot.rgba(), &[10, 10, 10, 255, 200, 200, 200, 255]);

        let bgra = CameraFrame {
            width: 1,
            height: 1,
            data: Arc::from(vec![1u8, 2, 3, 4].into_boxed_slice()),
            format: PixelFormat::BGRA,
            stride: 4,
            captured_at: Instant::now(),
        };
        assert_eq!(surface.draw(&bgra).unwrap().rgba(), &[3, 2, 1, 4]);
    }

    #[test]
    fn test_draw_yuyv_neutral_chroma() {
        // Two pixels, Y=100 and Y=200 with neutral chroma
        let frame = CameraFrame {
            width: 2,
            height: 1,
            data: Arc::from(vec![100u8, 128, 200, 128].into_boxed_slice()),
            format: PixelFormat::YUYV,
            stride: 4,
            captured_at: Instant::now(),
        };
        let snapshot = RasterSurface::new().draw(&frame).unwrap();
        assert_eq!(snapshot.luma(0, 0), Some(100));
        assert_eq!(snapshot.luma(1, 0), Some(200));
    }

    #[test]
    fn test_draw_rejects_empty_and_truncated() {
        let mut surface = RasterSurface::new();
        assert!(surface.draw(&CameraFrame::from_rgba(0, 0, Vec::new())).is_none());

        let truncated = CameraFrame {
            width: 4,
            height: 4,
            data: Arc::from(vec![0u8; 10].into_boxed_slice()),
            format: PixelFormat::RGBA,
            stride: 16,
            captured_at: Instant::now(),
        };
        assert!(surface.draw(&truncated).is_none());
    }
}
