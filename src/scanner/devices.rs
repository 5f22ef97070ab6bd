// SPDX-License-Identifier: GPL-3.0-only

//! Camera enumeration and default selection

use crate::backends::camera::{CameraBackend, CameraDevice};
use crate::constants::REAR_CAMERA_HINTS;
use tracing::{debug, warn};

/// List the cameras a backend currently sees
///
/// Enumeration failures are logged and reported as an empty list.
pub fn list_cameras(backend: &dyn CameraBackend) -> Vec<CameraDevice> {
    match backend.enumerate_cameras() {
        Ok(cameras) => {
            debug!(count = cameras.len(), backend = %backend.backend_type(), "Enumerated cameras");
            cameras
        }
        Err(e) => {
            warn!(error = %e, "Failed to enumerate cameras");
            Vec::new()
        }
    }
}

/// Pick the camera to use when none was chosen
///
/// Prefers a rear-facing camera by label, otherwise the first one.
pub fn select_default(cameras: &[CameraDevice]) -> Option<&CameraDevice> {
    cameras
        .iter()
        .find(|camera| {
            let label = camera.label.to_lowercase();
            REAR_CAMERA_HINTS.iter().any(|hint| label.contains(hint))
        })
        .or_else(|| cameras.first())
}
