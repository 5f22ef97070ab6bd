// SPDX-License-Identifier: GPL-3.0-only

//! QR code detection task
//!
//! Converts camera frames to grayscale, crops the centre decode region,
//! downscales for speed and runs the rqrr decoder. When nothing is found a
//! second attempt is made on the mirrored image, since front cameras and
//! some drivers deliver flipped frames.

use crate::backends::camera::CameraFrame;
use crate::backends::camera::format_converters::frame_to_luma;
use crate::constants::DETECTOR_MAX_DIMENSION;
use crate::frame_processor::types::{Detection, FrameRegion};
use crate::frame_processor::{DecodeError, DecodeOptions, FrameDecoder};
use image::GrayImage;
use image::imageops::{self, FilterType};
use tracing::{debug, trace};

/// QR code detector
///
/// Optimized for real-time processing with frame downscaling.
#[derive(Debug, Clone)]
pub struct QrDetector {
    /// Maximum dimension for processing (frames are downscaled to this)
    max_dimension: u32,
}

impl Default for QrDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// Pixel rectangle within the full frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Crop {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

impl QrDetector {
    pub fn new() -> Self {
        Self {
            max_dimension: DETECTOR_MAX_DIMENSION,
        }
    }

    /// Create a QR detector with custom max dimension
    pub fn with_max_dimension(max_dimension: u32) -> Self {
        Self {
            max_dimension: max_dimension.max(1),
        }
    }

    /// Decode a grayscale image
    pub fn detect_luma(
        &self,
        luma: &GrayImage,
        options: &DecodeOptions,
    ) -> Result<Detection, DecodeError> {
        let start = std::time::Instant::now();
        let (frame_width, frame_height) = luma.dimensions();
        if frame_width == 0 || frame_height == 0 {
            return Err(DecodeError::Engine("empty frame".to_string()));
        }

        let crop = centre_crop(frame_width, frame_height, options);
        let region = imageops::crop_imm(luma, crop.x, crop.y, crop.width, crop.height).to_image();

        let (region, scale) = self.downscale(region);
        trace!(
            width = region.width(),
            height = region.height(),
            scale,
            "Prepared grayscale image for detection"
        );

        let mut outcome = decode_gray(&region);
        let mut flipped = false;
        if matches!(outcome, Err(DecodeError::NotFound)) && !options.disable_flip {
            outcome = decode_gray(&imageops::flip_horizontal(&region));
            flipped = true;
        }

        let (content, corners) = outcome?;

        // Map the code's corners back into full-frame pixels
        let (region_width, region_height) = region.dimensions();
        let xs = corners.iter().map(|&(x, _)| {
            let x = x.clamp(0, region_width as i32) as f32;
            if flipped { region_width as f32 - x } else { x }
        });
        let ys = corners
            .iter()
            .map(|&(_, y)| y.clamp(0, region_height as i32) as f32);
        let (min_x, max_x) = min_max(xs);
        let (min_y, max_y) = min_max(ys);

        let bounds = FrameRegion::from_pixels(
            crop.x + (min_x * scale) as u32,
            crop.y + (min_y * scale) as u32,
            ((max_x - min_x) * scale) as u32,
            ((max_y - min_y) * scale) as u32,
            frame_width,
            frame_height,
        );

        debug!(
            content = %content,
            flipped,
            x = bounds.x,
            y = bounds.y,
            total_ms = start.elapsed().as_millis() as u64,
            "Detected QR code"
        );

        Ok(Detection::new(content).with_bounds(bounds))
    }

    /// Shrink so neither side exceeds the max dimension
    ///
    /// Returns the image and the factor mapping it back to the input size.
    fn downscale(&self, image: GrayImage) -> (GrayImage, f32) {
        let (width, height) = image.dimensions();
        if width <= self.max_dimension && height <= self.max_dimension {
            return (image, 1.0);
        }

        let scale = (width as f32 / self.max_dimension as f32)
            .max(height as f32 / self.max_dimension as f32);
        let new_width = ((width as f32 / scale) as u32).max(1);
        let new_height = ((height as f32 / scale) as u32).max(1);

        let resized = imageops::resize(&image, new_width, new_height, FilterType::Triangle);
        (resized, scale)
    }
}

impl FrameDecoder for QrDetector {
    fn decode(
        &self,
        frame: &CameraFrame,
        options: &DecodeOptions,
    ) -> Result<Detection, DecodeError> {
        let luma = frame_to_luma(frame).map_err(|e| DecodeError::Engine(e.to_string()))?;
        self.detect_luma(&luma, options)
    }
}

/// Centre region of the frame, clamped to the frame size
fn centre_crop(frame_width: u32, frame_height: u32, options: &DecodeOptions) -> Crop {
    match options.qrbox {
        Some(qrbox) if qrbox.width > 0 && qrbox.height > 0 => {
            let width = qrbox.width.min(frame_width);
            let height = qrbox.height.min(frame_height);
            Crop {
                x: (frame_width - width) / 2,
                y: (frame_height - height) / 2,
                width,
                height,
            }
        }
        _ => Crop {
            x: 0,
            y: 0,
            width: frame_width,
            height: frame_height,
        },
    }
}

/// Run rqrr over a grayscale image
///
/// Returns the first readable code and its four corner points.
fn decode_gray(image: &GrayImage) -> Result<(String, [(i32, i32); 4]), DecodeError> {
    let (width, height) = image.dimensions();
    let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
        width as usize,
        height as usize,
        |x, y| image.get_pixel(x as u32, y as u32)[0],
    );

    let grids = prepared.detect_grids();
    if grids.is_empty() {
        return Err(DecodeError::NotFound);
    }

    let mut last_error = None;
    for grid in &grids {
        match grid.decode() {
            Ok((_meta, content)) => {
                let corners = grid.bounds.map(|point| (point.x, point.y));
                return Ok((content, corners));
            }
            Err(e) => {
                debug!("Grid decode failed: {:?}", e);
                last_error = Some(format!("{:?}", e));
            }
        }
    }

    Err(DecodeError::Engine(format!(
        "QR code located but unreadable: {}",
        last_error.unwrap_or_default()
    )))
}

fn min_max(values: impl Iterator<Item = f32>) -> (f32, f32) {
    values.fold((f32::MAX, f32::MIN), |(lo, hi), v| (lo.min(v), hi.max(v)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::config::QrBox;
    use image::Luma;

    #[test]
    fn test_centre_crop_clamps_to_frame() {
        let options = DecodeOptions {
            qrbox: Some(QrBox::square(250)),
            disable_flip: false,
        };
        assert_eq!(
            centre_crop(640, 480, &options),
            Crop {
                x: 195,
                y: 115,
                width: 250,
                height: 250
            }
        );
        assert_eq!(
            centre_crop(200, 100, &options),
            Crop {
                x: 0,
                y: 0,
                width: 200,
                height: 100
            }
        );
    }

    #[test]
    fn test_whole_frame_without_qrbox() {
        let crop = centre_crop(320, 240, &DecodeOptions::default());
        assert_eq!((crop.width, crop.height), (320, 240));
    }

    #[test]
    fn test_downscale_keeps_aspect() {
        let detector = QrDetector::with_max_dimension(100);
        let (image, scale) = detector.downscale(GrayImage::new(400, 200));
        assert_eq!(image.dimensions(), (100, 50));
        assert!((scale - 4.0).abs() < 0.001);

        let (image, scale) = detector.downscale(GrayImage::new(80, 60));
        assert_eq!(image.dimensions(), (80, 60));
        assert_eq!(scale, 1.0);
    }

    #[test]
    fn test_blank_frame_has_no_code() {
        let detector = QrDetector::new();
        let blank = GrayImage::from_pixel(320, 240, Luma([255]));
        assert_eq!(
            detector.detect_luma(&blank, &DecodeOptions::default()),
            Err(DecodeError::NotFound)
        );
    }

    /// White canvas with a QR code of `text` pasted at (`x`, `y`)
    fn frame_with_code(text: &str, width: u32, height: u32, x: i64, y: i64) -> GrayImage {
        let code = qrcode::QrCode::new(text.as_bytes())
            .unwrap()
            .render::<Luma<u8>>()
            .module_dimensions(4, 4)
            .build();
        let mut frame = GrayImage::from_pixel(width, height, Luma([255]));
        imageops::overlay(&mut frame, &code, x, y);
        frame
    }

    #[test]
    fn test_reads_code_and_maps_bounds() {
        let detector = QrDetector::new();
        let frame = frame_with_code("hello", 400, 300, 100, 50);

        let detection = detector
            .detect_luma(&frame, &DecodeOptions::default())
            .unwrap();
        assert_eq!(detection.content, "hello");

        // Version 1 code: 21 modules of 4px inside a 4 module quiet zone
        let bounds = detection.bounds.unwrap();
        assert!((bounds.x - 116.0 / 400.0).abs() < 0.03, "{:?}", bounds);
        assert!((bounds.y - 66.0 / 300.0).abs() < 0.03, "{:?}", bounds);
        assert!((bounds.width - 84.0 / 400.0).abs() < 0.03, "{:?}", bounds);
        assert!((bounds.height - 84.0 / 300.0).abs() < 0.03, "{:?}", bounds);
    }

    #[test]
    fn test_reads_code_inside_centre_region() {
        let detector = QrDetector::new();
        let frame = frame_with_code(r#"{"exam_id":"E1"}"#, 640, 480, 250, 170);
        let options = DecodeOptions {
            qrbox: Some(QrBox::square(250)),
            disable_flip: false,
        };

        let detection = detector.detect_luma(&frame, &options).unwrap();
        assert_eq!(detection.content, r#"{"exam_id":"E1"}"#);

        // Bounds are relative to the full frame, not the crop
        let bounds = detection.bounds.unwrap();
        assert!(bounds.x > 195.0 / 640.0 && bounds.x < 0.5, "{:?}", bounds);
    }

    #[test]
    fn test_reads_mirrored_code() {
        let detector = QrDetector::new();
        let mirrored = imageops::flip_horizontal(&frame_with_code("hello", 200, 200, 40, 40));

        for disable_flip in [false, true] {
            let options = DecodeOptions {
                qrbox: None,
                disable_flip,
            };
            let detection = detector.detect_luma(&mirrored, &options).unwrap();
            assert_eq!(detection.content, "hello");

            let bounds = detection.bounds.unwrap();
            assert!(bounds.x >= 0.0 && bounds.x + bounds.width <= 1.0, "{:?}", bounds);
        }
    }

    #[test]
    fn test_decodes_large_frames_after_downscale() {
        let detector = QrDetector::with_max_dimension(320);
        let code = qrcode::QrCode::new(b"scaled")
            .unwrap()
            .render::<Luma<u8>>()
            .module_dimensions(16, 16)
            .build();
        let mut frame = GrayImage::from_pixel(1280, 720, Luma([255]));
        imageops::overlay(&mut frame, &code, 400, 100);

        let detection = detector
            .detect_luma(&frame, &DecodeOptions::default())
            .unwrap();
        assert_eq!(detection.content, "scaled");
        let bounds = detection.bounds.unwrap();
        // 4 module quiet zone of 16px
        assert!((bounds.x - 464.0 / 1280.0).abs() < 0.03, "{:?}", bounds);
    }

    #[test]
    fn test_decode_camera_frame() {
        let detector = QrDetector::new();
        let frame = CameraFrame::gray(64, 48, vec![0; 64 * 48]);
        assert_eq!(
            detector.decode(&frame, &DecodeOptions::default()),
            Err(DecodeError::NotFound)
        );
    }
}
