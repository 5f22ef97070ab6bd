// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera backend abstraction

//! Shared types for camera backends

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Camera backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CameraBackendType {
    /// Video4Linux2 capture devices (`/dev/video*`)
    #[default]
    V4l2,
    /// Virtual camera looping still images from disk
    Still,
}

impl std::fmt::Display for CameraBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraBackendType::V4l2 => write!(f, "v4l2"),
            CameraBackendType::Still => write!(f, "still"),
        }
    }
}

impl std::str::FromStr for CameraBackendType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "v4l2" | "v4l" => Ok(Self::V4l2),
            "still" | "image" | "file" => Ok(Self::Still),
            other => Err(format!("unknown camera backend '{}'", other)),
        }
    }
}

/// Device information from V4L2 capability
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Name of the device (V4L2 card)
    pub card: String,
    /// Driver name (V4L2 driver)
    pub driver: String,
    /// Device path (e.g., /dev/video0)
    pub path: String,
    /// Real device path (resolved symlinks)
    pub real_path: String,
}

/// A camera that can be opened by a backend
///
/// `id` is opaque to callers; only the backend that produced it knows how
/// to interpret it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraDevice {
    pub id: String,
    pub label: String,
    #[serde(skip)]
    pub device_info: Option<DeviceInfo>,
}

impl CameraDevice {
    /// Create a device, substituting a generic label when none is reported
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        let id = id.into();
        let label = label.into();
        let label = if label.trim().is_empty() {
            format!("Camera {}", id)
        } else {
            label
        };
        Self {
            id,
            label,
            device_info: None,
        }
    }

    pub fn with_device_info(mut self, info: DeviceInfo) -> Self {
        self.device_info = Some(info);
        self
    }
}

impl std::fmt::Display for CameraDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.label, self.id)
    }
}

/// Requested properties of the capture stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VideoConstraints {
    /// Preferred camera orientation ("environment" = rear, "user" = front)
    pub facing_mode: String,
    /// Ideal capture width in pixels
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    /// Ideal capture height in pixels
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

impl Default for VideoConstraints {
    fn default() -> Self {
        Self {
            facing_mode: crate::constants::DEFAULT_FACING_MODE.to_string(),
            width: None,
            height: None,
        }
    }
}

impl VideoConstraints {
    /// Whether the constraints ask for a rear-facing camera
    pub fn prefers_environment(&self) -> bool {
        self.facing_mode.eq_ignore_ascii_case("environment")
    }
}

/// Everything a backend needs to open a frame stream
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamRequest {
    /// Explicit device to bind to; `None` lets the backend pick its default
    pub device_id: Option<String>,
    pub constraints: VideoConstraints,
    pub aspect_ratio: Option<f32>,
    /// Options the scanner does not interpret itself
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl StreamRequest {
    pub fn for_device(device_id: Option<String>, constraints: VideoConstraints) -> Self {
        Self {
            device_id,
            constraints,
            ..Default::default()
        }
    }
}

/// Pixel format for camera frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 8-bit luminance, one byte per pixel
    Gray8,
    /// RGBA - 32-bit with alpha (4 bytes per pixel)
    RGBA,
    /// YUYV - Packed 4:2:2 (Y0 U Y1 V interleaved)
    YUYV,
    /// Motion JPEG, one compressed JPEG image per frame
    MJPEG,
}

impl PixelFormat {
    /// Bytes per pixel for uncompressed formats, `None` for MJPEG
    pub fn bytes_per_pixel(&self) -> Option<u32> {
        match self {
            PixelFormat::Gray8 => Some(1),
            PixelFormat::RGBA => Some(4),
            PixelFormat::YUYV => Some(2),
            PixelFormat::MJPEG => None,
        }
    }

    /// Map a V4L2 FourCC code to a supported pixel format
    pub fn from_fourcc(fourcc: &[u8; 4]) -> Option<Self> {
        match fourcc {
            b"GREY" => Some(PixelFormat::Gray8),
            b"YUYV" => Some(PixelFormat::YUYV),
            b"MJPG" => Some(PixelFormat::MJPEG),
            b"AB24" | b"RGBA" => Some(PixelFormat::RGBA),
            _ => None,
        }
    }
}

/// A single frame from the camera
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub width: u32,
    pub height: u32,
    pub data: Arc<[u8]>,
    pub format: PixelFormat,
    /// Row stride in bytes (may include padding); unused for MJPEG
    pub stride: u32,
    pub captured_at: Instant,
}

impl CameraFrame {
    /// Wrap a tightly packed luminance buffer
    pub fn gray(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data: Arc::from(data.into_boxed_slice()),
            format: PixelFormat::Gray8,
            stride: width,
            captured_at: Instant::now(),
        }
    }
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Error types for backend operations
#[derive(Debug, Clone, PartialEq)]
pub enum BackendError {
    /// Backend is not available on this system
    NotAvailable(String),
    /// Camera device not found
    DeviceNotFound(String),
    /// Format not supported
    FormatNotSupported(String),
    /// Device went away while streaming
    Disconnected(String),
    /// General I/O error
    IoError(String),
    /// Other errors
    Other(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::NotAvailable(msg) => write!(f, "Backend not available: {}", msg),
            BackendError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            BackendError::FormatNotSupported(msg) => write!(f, "Format not supported: {}", msg),
            BackendError::Disconnected(msg) => write!(f, "Device disconnected: {}", msg),
            BackendError::IoError(msg) => write!(f, "I/O error: {}", msg),
            BackendError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        BackendError::IoError(err.to_string())
    }
}

/// Why a camera could not be opened
///
/// The classification is advisory: it only exists so callers can show a
/// fitting message. Control flow never depends on the variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CameraAccessError {
    /// The OS refused access to the device
    NotAllowed,
    /// No matching camera exists
    NotFound,
    /// The device exists but cannot capture video
    NotSupported,
    /// Anything else
    Other(String),
}

impl CameraAccessError {
    /// Classify an I/O error raised while opening a device node
    pub fn from_io(err: &std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => CameraAccessError::NotAllowed,
            std::io::ErrorKind::NotFound => CameraAccessError::NotFound,
            std::io::ErrorKind::Unsupported => CameraAccessError::NotSupported,
            _ => match err.raw_os_error() {
                // EBUSY: another process holds the device
                Some(16) => CameraAccessError::Other("camera is busy".to_string()),
                // ENODEV / ENXIO
                Some(19) | Some(6) => CameraAccessError::NotFound,
                _ => CameraAccessError::Other(err.to_string()),
            },
        }
    }

    /// Message suitable for showing to a user
    pub fn user_message(&self) -> &'static str {
        match self {
            CameraAccessError::NotAllowed => {
                "Camera access denied. Check the device permissions."
            }
            CameraAccessError::NotFound => "No camera found.",
            CameraAccessError::NotSupported => "Camera not supported on this system.",
            CameraAccessError::Other(_) => "Error accessing the camera.",
        }
    }
}

impl std::fmt::Display for CameraAccessError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraAccessError::NotAllowed => write!(f, "camera access not allowed"),
            CameraAccessError::NotFound => write!(f, "no camera found"),
            CameraAccessError::NotSupported => write!(f, "camera not supported"),
            CameraAccessError::Other(msg) => write!(f, "camera error: {}", msg),
        }
    }
}

impl std::error::Error for CameraAccessError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_label_fallback() {
        let device = CameraDevice::new("/dev/video3", "  ");
        assert_eq!(device.label, "Camera /dev/video3");

        let device = CameraDevice::new("/dev/video0", "Integrated Camera");
        assert_eq!(device.label, "Integrated Camera");
    }

    #[test]
    fn test_access_error_classification() {
        let denied = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        assert_eq!(CameraAccessError::from_io(&denied), CameraAccessError::NotAllowed);

        let missing = std::io::Error::from(std::io::ErrorKind::NotFound);
        assert_eq!(CameraAccessError::from_io(&missing), CameraAccessError::NotFound);

        let busy = std::io::Error::from_raw_os_error(16);
        assert!(matches!(
            CameraAccessError::from_io(&busy),
            CameraAccessError::Other(_)
        ));
    }

    #[test]
    fn test_backend_type_parse() {
        assert_eq!("V4L2".parse::<CameraBackendType>(), Ok(CameraBackendType::V4l2));
        assert_eq!("still".parse::<CameraBackendType>(), Ok(CameraBackendType::Still));
        assert!("pipewire".parse::<CameraBackendType>().is_err());
    }

    #[test]
    fn test_fourcc_mapping() {
        assert_eq!(PixelFormat::from_fourcc(b"YUYV"), Some(PixelFormat::YUYV));
        assert_eq!(PixelFormat::from_fourcc(b"MJPG"), Some(PixelFormat::MJPEG));
        assert_eq!(PixelFormat::from_fourcc(b"H264"), None);
    }
}
