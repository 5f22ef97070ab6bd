// SPDX-License-Identifier: MPL-2.0

//! Error types for the scanner

use crate::backends::camera::types::{BackendError, CameraAccessError};
use crate::scanner::capability::UnsupportedReason;
use std::fmt;

/// Result type alias using ScannerError
pub type ScannerResult<T> = Result<T, ScannerError>;

/// Errors returned by scanner operations
///
/// Backend errors never cross the `Scanner` boundary unmapped.
#[derive(Debug, Clone, PartialEq)]
pub enum ScannerError {
    /// The environment cannot grant camera access at all
    Unsupported(UnsupportedReason),
    /// Camera access was requested and refused
    PermissionDenied(CameraAccessError),
    /// Permission was granted but the stream could not be opened
    Camera(CameraAccessError),
    /// No camera devices found
    NoCameraFound,
    /// The requested camera does not exist
    DeviceNotFound(String),
    /// Backend failure outside of stream opening
    Backend(BackendError),
    /// The decode engine found nothing usable
    DecodeFailure(String),
    /// An uploaded image failed the upload checks
    UploadRejected(UploadRejection),
    /// Configuration errors
    Config(String),
    /// Storage/filesystem errors
    Storage(String),
}

/// Advisory failure delivered to a scan session's error handler
///
/// These never stop a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    /// The decode engine failed for a reason other than "no code in frame"
    Decode(String),
    /// A frame could not be read or converted
    Frame(String),
}

/// Why an uploaded image was refused before decoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadRejection {
    /// File is larger than the upload limit
    TooLarge { size: usize, max: usize },
    /// File is not a JPEG, PNG or GIF image
    UnsupportedType,
}

impl fmt::Display for ScannerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScannerError::Unsupported(reason) => write!(f, "Scanner unsupported: {}", reason),
            ScannerError::PermissionDenied(e) => write!(f, "Camera permission denied: {}", e),
            ScannerError::Camera(e) => write!(f, "Camera error: {}", e),
            ScannerError::NoCameraFound => write!(f, "No camera devices found"),
            ScannerError::DeviceNotFound(id) => write!(f, "Camera not found: {}", id),
            ScannerError::Backend(e) => write!(f, "Backend error: {}", e),
            ScannerError::DecodeFailure(msg) => write!(f, "Decode failed: {}", msg),
            ScannerError::UploadRejected(e) => write!(f, "Upload rejected: {}", e),
            ScannerError::Config(msg) => write!(f, "Configuration error: {}", msg),
            ScannerError::Storage(msg) => write!(f, "Storage error: {}", msg),
        }
    }
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanError::Decode(msg) => write!(f, "Decode error: {}", msg),
            ScanError::Frame(msg) => write!(f, "Frame error: {}", msg),
        }
    }
}

impl fmt::Display for UploadRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadRejection::TooLarge { size, max } => {
                write!(f, "file is {} bytes, limit is {} bytes", size, max)
            }
            UploadRejection::UnsupportedType => {
                write!(f, "only JPEG, PNG and GIF images are accepted")
            }
        }
    }
}

impl std::error::Error for ScannerError {}
impl std::error::Error for ScanError {}
impl std::error::Error for UploadRejection {}

impl From<BackendError> for ScannerError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::DeviceNotFound(id) => ScannerError::DeviceNotFound(id),
            other => ScannerError::Backend(other),
        }
    }
}

impl From<UploadRejection> for ScannerError {
    fn from(err: UploadRejection) -> Self {
        ScannerError::UploadRejected(err)
    }
}

impl From<std::io::Error> for ScannerError {
    fn from(err: std::io::Error) -> Self {
        ScannerError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for ScannerError {
    fn from(err: serde_json::Error) -> Self {
        ScannerError::Config(err.to_string())
    }
}

impl From<BackendError> for ScanError {
    fn from(err: BackendError) -> Self {
        ScanError::Frame(err.to_string())
    }
}
