// SPDX-License-Identifier: GPL-3.0-only
//! Pixel format conversion utilities for camera backends
//!
//! Decoders only need luminance, so every conversion here ends in 8-bit gray.
//! Luma uses integer BT.601 weights.

use super::types::{CameraFrame, PixelFormat};
use image::ImageFormat;

/// Integer BT.601 luma of an RGB triple
#[inline]
pub fn rgb_luma(r: u8, g: u8, b: u8) -> u8 {
    ((299 * r as u32 + 587 * g as u32 + 114 * b as u32) / 1000) as u8
}

/// Luma of a single pixel in a frame, honouring stride
///
/// Caller must keep `x < width` and `y < height` on a complete frame.
#[inline]
pub fn luma_at(frame: &CameraFrame, x: u32, y: u32) -> u8 {
    let row = y as usize * frame.stride as usize;
    let data = &frame.data;
    match frame.format {
        PixelFormat::Gray8 => data[row + x as usize],
        // YUYV: Y0 U Y1 V, one Y byte per pixel at even offsets
        PixelFormat::YUYV => data[row + x as usize * 2],
        PixelFormat::RGB24 => {
            let i = row + x as usize * 3;
            rgb_luma(data[i], data[i + 1], data[i + 2])
        }
        PixelFormat::RGBA => {
            let i = row + x as usize * 4;
            rgb_luma(data[i], data[i + 1], data[i + 2])
        }
    }
}

/// Decode an MJPEG frame to gray
///
/// Returns the decoded dimensions alongside the pixels since drivers may pad
/// the JPEG relative to the negotiated format.
pub fn mjpeg_to_gray(data: &[u8]) -> Result<(u32, u32, Vec<u8>), String> {
    let img = image::load_from_memory_with_format(data, ImageFormat::Jpeg)
        .map_err(|e| format!("Failed to decode MJPEG frame: {}", e))?;
    let gray = img.to_luma8();
    let (width, height) = gray.dimensions();
    Ok((width, height, gray.into_raw()))
}
