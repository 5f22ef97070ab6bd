// SPDX-License-Identifier: MPL-2.0

//! Frame processor module for QR decoding
//!
//! Camera frames and uploaded images both go through a [`FrameDecoder`].
//! The decoder only reports what it read; normalising the text into a
//! [`ScanPayload`] happens in the router and the file decoder.

pub mod file_decoder;
pub mod tasks;
pub mod types;

pub use file_decoder::{check_upload, decode_file};
pub use tasks::qr_detector::QrDetector;
pub use types::{Detection, FrameRegion, ScanPayload, ScanResult};

use crate::backends::camera::CameraFrame;
use crate::scanner::config::{QrBox, ScanConfig};
use std::fmt;

/// Per-frame decode settings derived from the scan configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecodeOptions {
    /// Centre region to decode; `None` decodes the whole frame
    pub qrbox: Option<QrBox>,
    /// Skip the mirrored attempt
    pub disable_flip: bool,
}

impl From<&ScanConfig> for DecodeOptions {
    fn from(config: &ScanConfig) -> Self {
        Self {
            qrbox: Some(config.qrbox),
            disable_flip: config.disable_flip,
        }
    }
}

/// Decode engine failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// No code in the frame; expected on most frames
    NotFound,
    /// A code was located but could not be read, or the frame was unusable
    Engine(String),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::NotFound => write!(f, "no QR code found"),
            DecodeError::Engine(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for DecodeError {}

/// A QR decode engine
pub trait FrameDecoder: Send + Sync {
    fn decode(&self, frame: &CameraFrame, options: &DecodeOptions)
    -> Result<Detection, DecodeError>;
}
