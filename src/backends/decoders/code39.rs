// SPDX-License-Identifier: GPL-3.0-only

//! Code 39 reading
//!
//! Frames are re-encoded as grayscale (sampled down past the re-encode
//! bound) and handed to a `zedbar` scanner with only Code 39 enabled.

use super::SymbolReader;
use crate::backends::camera::Frame;
use crate::constants::decoding;
use crate::errors::DecodeError;
use image::GrayImage;
use image::imageops::{self, FilterType};
use tracing::{debug, trace};
use zedbar::config::*;
use zedbar::{DecoderConfig, Image, Scanner};

/// Code 39 reader backed by `zedbar`
#[derive(Debug, Clone, Copy, Default)]
pub struct Code39Reader {
    check_digit: bool,
}

impl Code39Reader {
    pub fn new() -> Self {
        Self { check_digit: false }
    }

    /// Reader that only accepts symbols carrying a valid mod-43 check
    /// character, which is stripped from the payload
    pub fn with_check_digit() -> Self {
        Self { check_digit: true }
    }

    fn scanner(&self) -> Scanner {
        let config = DecoderConfig::new()
            .enable(Code39)
            .set_checksum(Code39, self.check_digit, false)
            .disable(QrCode)
            .disable(Code128)
            .disable(Ean13)
            .disable(Ean8)
            .disable(Upca)
            .disable(Upce)
            .disable(Isbn10)
            .disable(Isbn13)
            .disable(Databar)
            .position_tracking(false);
        Scanner::with_config(config)
    }

    /// Grayscale copy of the frame, sampled down when its longer side
    /// exceeds the re-encode bound
    fn prepare(frame: &Frame) -> Result<GrayImage, DecodeError> {
        let (width, height) = (frame.width(), frame.height());
        let gray = GrayImage::from_raw(width, height, frame.to_luma())
            .ok_or_else(|| DecodeError::Failed("luma buffer size mismatch".into()))?;

        let longest = width.max(height);
        if longest <= decoding::CODE39_MAX_INPUT {
            return Ok(gray);
        }

        let scale = decoding::CODE39_MAX_INPUT as f32 / longest as f32;
        let new_width = ((width as f32 * scale).round() as u32).max(1);
        let new_height = ((height as f32 * scale).round() as u32).max(1);
        trace!(width, height, new_width, new_height, "Resizing frame for Code 39");
        Ok(imageops::resize(&gray, new_width, new_height, FilterType::Triangle))
    }
}

impl SymbolReader for Code39Reader {
    fn read(&self, frame: &Frame) -> Result<Option<String>, DecodeError> {
        let start = std::time::Instant::now();
        let gray = Self::prepare(frame)?;
        let (width, height) = gray.dimensions();

        let mut image = Image::from_gray(gray.as_raw(), width, height)
            .map_err(|e| DecodeError::Failed(format!("{:?}", e)))?;
        let symbols = self.scanner().scan(&mut image);

        for symbol in symbols {
            let Some(text) = symbol.data_string() else {
                continue;
            };
            if text.is_empty() {
                continue;
            }
            debug!(
                %text,
                elapsed_ms = start.elapsed().as_millis(),
                "Decoded Code 39"
            );
            return Ok(Some(text.to_string()));
        }

        trace!(width, height, elapsed_ms = start.elapsed().as_millis(), "No Code 39 found");
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const NARROW: u32 = 6;
    const WIDE: u32 = 15;
    const QUIET: u32 = 160;

    const ALPHABET: &str = "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ-. $/+%*";

    /// Bar/space widths per character, first element in the highest of nine
    /// bits (1 = wide)
    const PATTERNS: [u16; 44] = [
        0x034, 0x121, 0x061, 0x160, 0x031, 0x130, 0x070, 0x025, 0x124, 0x064, // 0-9
        0x109, 0x049, 0x148, 0x019, 0x118, 0x058, 0x00D, 0x10C, 0x04C, 0x01C, // A-J
        0x103, 0x043, 0x142, 0x013, 0x112, 0x052, 0x007, 0x106, 0x046, 0x016, // K-T
        0x181, 0x0C1, 0x1C0, 0x091, 0x190, 0x0D0, 0x085, 0x184, 0x0C4, 0x0A8, // U-$
        0x0A2, 0x08A, 0x02A, 0x094, // / + % *
    ];

    /// One row of a printed symbol: 0 = ink, 255 = paper
    fn render_row(message: &str) -> Vec<u8> {
        let mut row = vec![255u8; QUIET as usize];
        for (n, c) in message.chars().enumerate() {
            if n > 0 {
                row.extend(std::iter::repeat_n(255u8, NARROW as usize));
            }
            let bits = PATTERNS[ALPHABET.find(c).unwrap()];
            for element in 0..9 {
                let wide = bits & (1 << (8 - element)) != 0;
                let ink = if element % 2 == 0 { 0u8 } else { 255u8 };
                let width = if wide { WIDE } else { NARROW };
                row.extend(std::iter::repeat_n(ink, width as usize));
            }
        }
        row.extend(std::iter::repeat_n(255u8, QUIET as usize));
        row
    }

    fn frame_from_row(row: &[u8], height: u32) -> Frame {
        let mut rgba = Vec::with_capacity(row.len() * height as usize * 4);
        for _ in 0..height {
            for &v in row {
                rgba.extend_from_slice(&[v, v, v, 255]);
            }
        }
        Frame::new(row.len() as u32, height, Arc::from(rgba.into_boxed_slice())).unwrap()
    }

    #[test]
    fn test_reads_printed_symbol() {
        let frame = frame_from_row(&render_row("*X9*"), 40);
        assert_eq!(Code39Reader::new().read(&frame), Ok(Some("X9".to_string())));
    }

    #[test]
    fn test_reads_mirrored_symbol() {
        let mut row = render_row("*CODE-39*");
        row.reverse();
        let frame = frame_from_row(&row, 40);
        assert_eq!(
            Code39Reader::new().read(&frame),
            Ok(Some("CODE-39".to_string()))
        );
    }

    #[test]
    fn test_unguarded_symbol_is_ignored() {
        let frame = frame_from_row(&render_row("AB12"), 40);
        assert_eq!(Code39Reader::new().read(&frame), Ok(None));
    }

    #[test]
    fn test_check_digit_mode() {
        // A=10, 1=1: (10 + 1) mod 43 = 11 -> 'B'
        let frame = frame_from_row(&render_row("*A1B*"), 40);
        assert_eq!(
            Code39Reader::with_check_digit().read(&frame),
            Ok(Some("A1".to_string()))
        );

        let wrong = frame_from_row(&render_row("*A1C*"), 40);
        assert_eq!(Code39Reader::with_check_digit().read(&wrong), Ok(None));
    }

    #[test]
    fn test_oversized_frame_is_sampled_down() {
        // Doubling every pixel keeps the symbol readable after resizing
        let row: Vec<u8> = render_row("*A1*")
            .into_iter()
            .flat_map(|v| [v, v])
            .collect();
        assert!(row.len() as u32 > decoding::CODE39_MAX_INPUT);
        let frame = frame_from_row(&row, 40);
        assert_eq!(Code39Reader::new().read(&frame), Ok(Some("A1".to_string())));
    }

    #[test]
    fn test_flat_frame_has_no_code() {
        let frame = frame_from_row(&vec![128u8; 700], 40);
        assert_eq!(Code39Reader::new().read(&frame), Ok(None));
    }
}
