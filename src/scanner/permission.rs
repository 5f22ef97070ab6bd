// SPDX-License-Identifier: GPL-3.0-only

//! Camera permission negotiation
//!
//! Permission is obtained by opening a throwaway stream and dropping it straight
//! away. The outcome is binary; the failure classification is only kept so a
//! caller can explain a denial.

use crate::backends::camera::{CameraAccessError, CameraBackend, StreamRequest, VideoConstraints};
use std::sync::Mutex;
use tracing::{info, warn};

/// Recorded outcome of the last permission request
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PermissionState {
    #[default]
    Unknown,
    Granted,
    Denied(CameraAccessError),
}

impl PermissionState {
    pub fn is_granted(&self) -> bool {
        matches!(self, PermissionState::Granted)
    }
}

/// Requests camera access and remembers the answer
#[derive(Debug, Default)]
pub struct PermissionNegotiator {
    state: Mutex<PermissionState>,
}

impl PermissionNegotiator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open and immediately release a throwaway stream
    ///
    /// Blocks on device I/O. Never fails: every error becomes `false`.
    pub fn request(&self, backend: &dyn CameraBackend, constraints: &VideoConstraints) -> bool {
        let request = StreamRequest::for_device(None, constraints.clone());

        let state = match backend.open_stream(&request) {
            Ok(stream) => {
                info!(device = %stream.device_id(), "Camera permission granted");
                drop(stream);
                PermissionState::Granted
            }
            Err(e) => {
                warn!(error = %e, "Camera permission request failed");
                PermissionState::Denied(e)
            }
        };

        let granted = state.is_granted();
        self.set_state(state);
        granted
    }

    pub fn state(&self) -> PermissionState {
        self.state
            .lock()
            .map(|state| state.clone())
            .unwrap_or_default()
    }

    /// Classification of the last denial, if the last request was denied
    pub fn last_failure(&self) -> Option<CameraAccessError> {
        match self.state() {
            PermissionState::Denied(e) => Some(e),
            _ => None,
        }
    }

    fn set_state(&self, state: PermissionState) {
        match self.state.lock() {
            Ok(mut guard) => *guard = state,
            Err(poisoned) => *poisoned.into_inner() = state,
        }
    }
}
