// SPDX-License-Identifier: GPL-3.0-only

//! One-shot decoding of image files

use crate::constants::upload::MAX_UPLOAD_BYTES;
use crate::errors::{ScannerError, ScannerResult, UploadRejection};
use crate::frame_processor::types::ScanResult;
use crate::frame_processor::{DecodeError, DecodeOptions, QrDetector};
use image::ImageFormat;
use tracing::{debug, warn};

/// Check an upload before decoding it
///
/// Only JPEG, PNG and GIF up to 5 MiB are accepted. The type is sniffed from
/// the content, not taken from a file name.
pub fn check_upload(bytes: &[u8]) -> Result<(), UploadRejection> {
    match image::guess_format(bytes) {
        Ok(ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::Gif) => {}
        _ => return Err(UploadRejection::UnsupportedType),
    }

    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(UploadRejection::TooLarge {
            size: bytes.len(),
            max: MAX_UPLOAD_BYTES,
        });
    }

    Ok(())
}

/// Decode the first QR code in an encoded image
///
/// The whole image is searched. Runs on the blocking pool.
pub async fn decode_file(bytes: Vec<u8>) -> ScannerResult<ScanResult> {
    tokio::task::spawn_blocking(move || decode_file_sync(&bytes))
        .await
        .map_err(|e| {
            warn!(error = %e, "File decode task panicked");
            ScannerError::DecodeFailure(e.to_string())
        })?
}

fn decode_file_sync(bytes: &[u8]) -> ScannerResult<ScanResult> {
    let image = image::load_from_memory(bytes)
        .map_err(|e| ScannerError::DecodeFailure(format!("unreadable image: {}", e)))?;
    let luma = image.to_luma8();
    debug!(width = luma.width(), height = luma.height(), "Decoding image file");

    let detection = QrDetector::new()
        .detect_luma(&luma, &DecodeOptions::default())
        .map_err(|e| match e {
            DecodeError::NotFound => {
                ScannerError::DecodeFailure("no QR code found in image".to_string())
            }
            DecodeError::Engine(msg) => ScannerError::DecodeFailure(msg),
        })?;

    Ok(ScanResult::from_detection(detection, None))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_processor::ScanPayload;
    use image::{DynamicImage, GrayImage, Luma};
    use std::io::Cursor;

    fn encode(format: ImageFormat) -> Vec<u8> {
        // GIF has no grayscale mode
        let image = DynamicImage::ImageLuma8(GrayImage::from_pixel(16, 16, Luma([255])));
        let mut bytes = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(image.to_rgba8())
            .write_to(&mut bytes, format)
            .unwrap();
        bytes.into_inner()
    }

    #[test]
    fn test_accepts_png_and_gif() {
        assert_eq!(check_upload(&encode(ImageFormat::Png)), Ok(()));
        assert_eq!(check_upload(&encode(ImageFormat::Gif)), Ok(()));
    }

    #[test]
    fn test_rejects_other_types() {
        assert_eq!(
            check_upload(&encode(ImageFormat::Bmp)),
            Err(UploadRejection::UnsupportedType)
        );
        assert_eq!(
            check_upload(b"plain text"),
            Err(UploadRejection::UnsupportedType)
        );
    }

    #[test]
    fn test_rejects_oversized() {
        let mut bytes = encode(ImageFormat::Png);
        bytes.resize(MAX_UPLOAD_BYTES + 1, 0);
        assert!(matches!(
            check_upload(&bytes),
            Err(UploadRejection::TooLarge { max, .. }) if max == MAX_UPLOAD_BYTES
        ));
    }

    fn encode_code(text: &str, format: ImageFormat) -> Vec<u8> {
        let code = qrcode::QrCode::new(text.as_bytes())
            .unwrap()
            .render::<Luma<u8>>()
            .module_dimensions(6, 6)
            .build();
        let mut bytes = Cursor::new(Vec::new());
        DynamicImage::ImageLuma8(code)
            .write_to(&mut bytes, format)
            .unwrap();
        bytes.into_inner()
    }

    #[tokio::test]
    async fn test_exam_code_decodes_to_structured_payload() {
        let bytes = encode_code(r#"{"type":"exam","exam_id":"E1"}"#, ImageFormat::Png);
        assert_eq!(check_upload(&bytes), Ok(()));

        let result = decode_file(bytes).await.unwrap();
        assert_eq!(
            result.payload,
            ScanPayload::Structured(serde_json::json!({"type": "exam", "exam_id": "E1"}))
        );
        assert_eq!(result.raw_text, r#"{"type":"exam","exam_id":"E1"}"#);
        assert!(result.bounds.is_some());
        assert!(result.device_id.is_none());
    }

    #[tokio::test]
    async fn test_plain_text_code_decodes_to_raw_payload() {
        let result = decode_file(encode_code("ANSWER-SHEET-7", ImageFormat::Jpeg))
            .await
            .unwrap();
        assert_eq!(result.payload, ScanPayload::Raw("ANSWER-SHEET-7".to_string()));
    }

    #[tokio::test]
    async fn test_blank_image_is_decode_failure() {
        let result = decode_file(encode(ImageFormat::Png)).await;
        assert!(matches!(result, Err(ScannerError::DecodeFailure(_))));
    }

    #[tokio::test]
    async fn test_garbage_is_decode_failure() {
        let result = decode_file(vec![1, 2, 3]).await;
        assert!(matches!(result, Err(ScannerError::DecodeFailure(_))));
    }
}
