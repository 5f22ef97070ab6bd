// SPDX-License-Identifier: GPL-3.0-only
//! Pixel format conversion to luminance
//!
//! QR decoding only needs brightness, so every supported camera format is
//! reduced to a tightly packed 8-bit grayscale image here.

use super::types::{BackendError, BackendResult, CameraFrame, PixelFormat};
use image::GrayImage;

/// Convert a camera frame into a grayscale image
pub fn frame_to_luma(frame: &CameraFrame) -> BackendResult<GrayImage> {
    let luma = match frame.format {
        PixelFormat::Gray8 => copy_rows_without_stride(frame, 1),
        PixelFormat::RGBA => rgba_to_luma(&copy_rows_without_stride(frame, 4)),
        PixelFormat::YUYV => yuyv_to_luma(frame),
        PixelFormat::MJPEG => {
            let decoded =
                image::load_from_memory_with_format(&frame.data, image::ImageFormat::Jpeg)
                    .map_err(|e| {
                        BackendError::FormatNotSupported(format!("MJPEG frame: {}", e))
                    })?;
            return Ok(decoded.to_luma8());
        }
    };

    GrayImage::from_raw(frame.width, frame.height, luma).ok_or_else(|| {
        BackendError::Other(format!(
            "frame buffer too small for {}x{} {:?}",
            frame.width, frame.height, frame.format
        ))
    })
}

/// Copy frame rows, dropping any stride padding
fn copy_rows_without_stride(frame: &CameraFrame, bytes_per_pixel: usize) -> Vec<u8> {
    let width = frame.width as usize;
    let height = frame.height as usize;
    let stride = (frame.stride as usize).max(width * bytes_per_pixel);

    let mut result = Vec::with_capacity(width * height * bytes_per_pixel);

    for y in 0..height {
        let row_start = y * stride;
        let row_end = row_start + width * bytes_per_pixel;
        if row_end <= frame.data.len() {
            result.extend_from_slice(&frame.data[row_start..row_end]);
        }
    }

    result
}

/// BT.601 luma from packed RGBA
fn rgba_to_luma(rgba: &[u8]) -> Vec<u8> {
    rgba.chunks_exact(4)
        .map(|px| {
            let r = px[0] as u32;
            let g = px[1] as u32;
            let b = px[2] as u32;
            ((299 * r + 587 * g + 114 * b) / 1000) as u8
        })
        .collect()
}

/// Extract the Y samples of packed YUYV (Y0 U Y1 V)
fn yuyv_to_luma(frame: &CameraFrame) -> Vec<u8> {
    copy_rows_without_stride(frame, 2)
        .chunks_exact(2)
        .map(|pair| pair[0])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    fn frame(width: u32, height: u32, stride: u32, format: PixelFormat, data: Vec<u8>) -> CameraFrame {
        CameraFrame {
            width,
            height,
            data: Arc::from(data.into_boxed_slice()),
            format,
            stride,
            captured_at: Instant::now(),
        }
    }

    #[test]
    fn test_gray_with_stride_padding() {
        let data = vec![
            10, 20, 0, 0, // row 0 + padding
            30, 40, 0, 0, // row 1 + padding
        ];
        let image = frame_to_luma(&frame(2, 2, 4, PixelFormat::Gray8, data)).unwrap();
        assert_eq!(image.into_raw(), vec![10, 20, 30, 40]);
    }

    #[test]
    fn test_rgba_luma() {
        let data = vec![
            255, 255, 255, 255, // White
            0, 0, 0, 255, // Black
        ];
        let image = frame_to_luma(&frame(2, 1, 8, PixelFormat::RGBA, data)).unwrap();
        assert_eq!(image.into_raw(), vec![255, 0]);
    }

    #[test]
    fn test_yuyv_takes_y_samples() {
        // Y0 U Y1 V for a 2x1 frame
        let data = vec![100, 128, 200, 128];
        let image = frame_to_luma(&frame(2, 1, 4, PixelFormat::YUYV, data)).unwrap();
        assert_eq!(image.into_raw(), vec![100, 200]);
    }

    #[test]
    fn test_truncated_frame_is_an_error() {
        let data = vec![1, 2, 3];
        assert!(frame_to_luma(&frame(2, 2, 2, PixelFormat::Gray8, data)).is_err());
    }

    #[test]
    fn test_invalid_mjpeg() {
        let data = vec![0xFF, 0xD8, 0x00];
        assert!(matches!(
            frame_to_luma(&frame(2, 2, 0, PixelFormat::MJPEG, data)),
            Err(BackendError::FormatNotSupported(_))
        ));
    }
}
