// SPDX-License-Identifier: GPL-3.0-only

//! Direct V4L2 capture backend
//!
//! Enumerates `/dev/video*` capture nodes and streams frames through
//! memory-mapped buffers using the v4l crate. Frames are handed out as
//! YUYV, MJPEG or GREY, whichever the device accepts first.

use super::types::*;
use super::{CameraBackend, FrameStream};
use crate::scanner::capability::ScannerCapability;
use crate::scanner::devices::select_default;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use v4l::buffer::Type;
use v4l::capability::Flags;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::{Format, FourCC};

/// sysfs class present when the kernel has video4linux support
const V4L2_SYSFS_CLASS: &str = "/sys/class/video4linux";

/// Formats requested from the device, in order of preference
const PREFERRED_FOURCCS: [&[u8; 4]; 3] = [b"YUYV", b"MJPG", b"GREY"];

/// Capture size when the constraints do not name one
const DEFAULT_CAPTURE_SIZE: (u32, u32) = (640, 480);

/// Number of memory-mapped buffers per stream
const STREAM_BUFFERS: u32 = 4;

/// V4L2 camera backend
#[derive(Debug, Default)]
pub struct V4l2Backend {
    capability_override: Option<ScannerCapability>,
}

impl V4l2Backend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report a fixed capability instead of inspecting the host
    pub fn with_capability(capability: ScannerCapability) -> Self {
        Self {
            capability_override: Some(capability),
        }
    }

    fn resolve_device(&self, request: &StreamRequest) -> Result<CameraDevice, CameraAccessError> {
        let cameras = self.enumerate_cameras().map_err(|e| {
            warn!(error = %e, "V4L2 enumeration failed while opening stream");
            CameraAccessError::NotFound
        })?;

        match &request.device_id {
            Some(id) => cameras
                .into_iter()
                .find(|camera| &camera.id == id)
                .ok_or(CameraAccessError::NotFound),
            None => {
                let chosen = if request.constraints.prefers_environment() {
                    select_default(&cameras)
                } else {
                    cameras.first()
                };
                chosen.cloned().ok_or(CameraAccessError::NotFound)
            }
        }
    }
}

impl CameraBackend for V4l2Backend {
    fn backend_type(&self) -> CameraBackendType {
        CameraBackendType::V4l2
    }

    fn capability(&self) -> ScannerCapability {
        if let Some(capability) = self.capability_override {
            return capability;
        }

        // A local process is its own trusted origin; only the kernel
        // interface can be missing.
        ScannerCapability {
            has_media_access_api: Path::new(V4L2_SYSFS_CLASS).is_dir(),
            is_secure_context: true,
            is_localhost: true,
        }
    }

    fn enumerate_cameras(&self) -> BackendResult<Vec<CameraDevice>> {
        let mut cameras = Vec::new();

        for node in v4l::context::enum_devices() {
            let path = node.path().to_string_lossy().to_string();

            let dev = match Device::with_path(node.path()) {
                Ok(dev) => dev,
                Err(e) => {
                    debug!(path = %path, error = %e, "Skipping unreadable V4L2 node");
                    continue;
                }
            };

            let caps = match dev.query_caps() {
                Ok(caps) => caps,
                Err(e) => {
                    debug!(path = %path, error = %e, "VIDIOC_QUERYCAP failed");
                    continue;
                }
            };

            // UVC cameras expose a second, metadata-only node per device
            if !caps.capabilities.contains(Flags::VIDEO_CAPTURE) {
                continue;
            }
            let has_formats = dev
                .enum_formats()
                .map(|formats| !formats.is_empty())
                .unwrap_or(false);
            if !has_formats {
                continue;
            }

            let real_path = std::fs::canonicalize(node.path())
                .map(|p| p.to_string_lossy().to_string())
                .unwrap_or_else(|_| path.clone());

            let device = CameraDevice::new(path.clone(), caps.card.clone()).with_device_info(
                DeviceInfo {
                    card: caps.card.clone(),
                    driver: caps.driver.clone(),
                    path: path.clone(),
                    real_path,
                },
            );

            debug!(path = %path, label = %device.label, "Found V4L2 capture device");
            cameras.push(device);
        }

        cameras.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(cameras)
    }

    fn open_stream(
        &self,
        request: &StreamRequest,
    ) -> Result<Box<dyn FrameStream>, CameraAccessError> {
        let device = self.resolve_device(request)?;

        let dev = Device::with_path(&device.id).map_err(|e| CameraAccessError::from_io(&e))?;
        let caps = dev.query_caps().map_err(|e| CameraAccessError::from_io(&e))?;
        if !caps.capabilities.contains(Flags::VIDEO_CAPTURE) {
            return Err(CameraAccessError::NotSupported);
        }

        let (width, height) = match (request.constraints.width, request.constraints.height) {
            (Some(w), Some(h)) => (w, h),
            (Some(w), None) => (w, height_for(w, request.aspect_ratio)),
            _ => DEFAULT_CAPTURE_SIZE,
        };

        let (format, pixel_format) = negotiate_format(&dev, width, height)?;

        let stream = Stream::with_buffers(&dev, Type::VideoCapture, STREAM_BUFFERS)
            .map_err(|e| CameraAccessError::from_io(&e))?;

        info!(
            device = %device.id,
            width = format.width,
            height = format.height,
            fourcc = %format.fourcc,
            "V4L2 stream opened"
        );

        Ok(Box::new(V4l2FrameStream {
            stream,
            _device: dev,
            device_id: device.id,
            width: format.width,
            height: format.height,
            stride: format.stride,
            pixel_format,
        }))
    }
}

/// Height matching a width for the requested aspect ratio (width / height)
fn height_for(width: u32, aspect_ratio: Option<f32>) -> u32 {
    match aspect_ratio {
        Some(ratio) if ratio > 0.0 => (width as f32 / ratio).round() as u32,
        _ => width * DEFAULT_CAPTURE_SIZE.1 / DEFAULT_CAPTURE_SIZE.0,
    }
}

/// Ask the device for each preferred format until one sticks
fn negotiate_format(
    dev: &Device,
    width: u32,
    height: u32,
) -> Result<(Format, PixelFormat), CameraAccessError> {
    for fourcc in PREFERRED_FOURCCS {
        let requested = Format::new(width, height, FourCC::new(fourcc));
        match dev.set_format(&requested) {
            Ok(actual) => {
                if let Some(pixel_format) = PixelFormat::from_fourcc(&actual.fourcc.repr) {
                    return Ok((actual, pixel_format));
                }
                debug!(fourcc = %actual.fourcc, "Device substituted an unsupported format");
            }
            Err(e) => debug!(error = %e, "set_format rejected"),
        }
    }
    Err(CameraAccessError::NotSupported)
}

/// Open V4L2 capture stream
struct V4l2FrameStream {
    stream: Stream<'static>,
    _device: Device,
    device_id: String,
    width: u32,
    height: u32,
    stride: u32,
    pixel_format: PixelFormat,
}

impl FrameStream for V4l2FrameStream {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn next_frame(&mut self) -> BackendResult<CameraFrame> {
        let (buf, meta) = self.stream.next().map_err(|e| match e.raw_os_error() {
            // ENODEV: unplugged while streaming
            Some(19) => BackendError::Disconnected(self.device_id.clone()),
            _ => BackendError::from(e),
        })?;

        let used = (meta.bytesused as usize).min(buf.len());
        let used = if used == 0 { buf.len() } else { used };

        Ok(CameraFrame {
            width: self.width,
            height: self.height,
            data: Arc::from(&buf[..used]),
            format: self.pixel_format,
            stride: self.stride,
            captured_at: Instant::now(),
        })
    }
}

impl Drop for V4l2FrameStream {
    fn drop(&mut self) {
        debug!(device = %self.device_id, "Releasing V4L2 stream");
    }
}
