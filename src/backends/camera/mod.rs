// SPDX-License-Identifier: GPL-3.0-only

//! Camera backend abstraction
//!
//! The scanner never talks to a camera API directly. It goes through the
//! [`CameraBackend`] trait, which covers exactly what QR scanning needs:
//!
//! ```text
//! ┌─────────────────────┐
//! │      Scanner        │  ← session state machine, decode loop
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │  CameraBackend Trait│  ← capability, enumeration, stream opening
//! └──────────┬──────────┘
//!            │
//!       ┌────┴─────┐
//!       ▼          ▼
//!   ┌──────┐   ┌───────┐
//!   │ V4L2 │   │ Still │
//!   └──────┘   └───────┘
//! ```
//!
//! A [`FrameStream`] holds the device open. Dropping it releases the camera,
//! so stream lifetime is the resource lifetime.

pub mod format_converters;
pub mod frame_loop;
pub mod types;
#[cfg(target_os = "linux")]
pub mod v4l2;

pub use frame_loop::{CaptureLoopController, LoopAction};
pub use types::*;

use crate::scanner::capability::ScannerCapability;
use std::path::Path;
use std::sync::Arc;

/// Camera backend trait
///
/// All methods may block (device I/O); async callers run them on the
/// blocking pool.
pub trait CameraBackend: Send + Sync {
    /// Get the backend type identifier
    fn backend_type(&self) -> CameraBackendType;

    /// Report whether this environment can grant camera access at all
    ///
    /// Must not open any device.
    fn capability(&self) -> ScannerCapability;

    /// Enumerate available cameras on this backend
    fn enumerate_cameras(&self) -> BackendResult<Vec<CameraDevice>>;

    /// Open a frame stream
    ///
    /// With `request.device_id == None` the backend chooses its default
    /// device, honouring the facing mode in the constraints.
    fn open_stream(&self, request: &StreamRequest)
    -> Result<Box<dyn FrameStream>, CameraAccessError>;
}

/// An open camera producing frames
///
/// The device stays claimed until the stream is dropped.
pub trait FrameStream: Send {
    /// Identifier of the device this stream is bound to
    fn device_id(&self) -> &str;

    /// Block until the next frame is available
    fn next_frame(&mut self) -> BackendResult<CameraFrame>;
}

/// Create a backend instance for the given type
///
/// `still_source` is only consulted for [`CameraBackendType::Still`].
pub fn get_backend(
    backend_type: CameraBackendType,
    still_source: Option<&Path>,
) -> BackendResult<Arc<dyn CameraBackend>> {
    match backend_type {
        #[cfg(target_os = "linux")]
        CameraBackendType::V4l2 => Ok(Arc::new(v4l2::V4l2Backend::new())),
        #[cfg(not(target_os = "linux"))]
        CameraBackendType::V4l2 => Err(BackendError::NotAvailable(
            "V4L2 is only available on Linux".to_string(),
        )),
        CameraBackendType::Still => {
            let source = still_source.ok_or_else(|| {
                BackendError::NotAvailable("still backend needs an image source".to_string())
            })?;
            Ok(Arc::new(crate::backends::still::StillImageBackend::from_path(
                source,
            )?))
        }
    }
}
