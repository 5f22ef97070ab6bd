// SPDX-License-Identifier: GPL-3.0-only

//! Capability probing
//!
//! Decides whether camera access can be granted at all, without opening a
//! device. Nothing here is cached: every call asks the backend again.

use crate::backends::camera::CameraBackend;
use serde::Serialize;
use std::fmt;

/// What the environment offers for camera access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScannerCapability {
    /// A camera API is present (V4L2 on Linux)
    pub has_media_access_api: bool,
    /// The process runs in a trusted context
    pub is_secure_context: bool,
    /// The process runs on the local machine
    pub is_localhost: bool,
}

/// Per-requirement breakdown of a capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CapabilityRequirements {
    /// Secure context or local origin
    pub secure_origin: bool,
    /// Camera API present
    pub media_access: bool,
}

/// First unmet requirement of an unsupported environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnsupportedReason {
    InsecureContext,
    NoMediaApi,
}

impl fmt::Display for UnsupportedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnsupportedReason::InsecureContext => {
                write!(f, "camera access requires a secure context")
            }
            UnsupportedReason::NoMediaApi => write!(f, "no camera API available"),
        }
    }
}

impl ScannerCapability {
    pub fn is_supported(&self) -> bool {
        self.has_media_access_api && (self.is_secure_context || self.is_localhost)
    }

    pub fn requirements(&self) -> CapabilityRequirements {
        CapabilityRequirements {
            secure_origin: self.is_secure_context || self.is_localhost,
            media_access: self.has_media_access_api,
        }
    }

    /// Advisory reason, `None` when supported
    pub fn unsupported_reason(&self) -> Option<UnsupportedReason> {
        let requirements = self.requirements();
        if !requirements.secure_origin {
            Some(UnsupportedReason::InsecureContext)
        } else if !requirements.media_access {
            Some(UnsupportedReason::NoMediaApi)
        } else {
            None
        }
    }
}

/// Read a backend's capability without opening a device
pub fn detect_capability(backend: &dyn CameraBackend) -> ScannerCapability {
    let capability = backend.capability();
    tracing::debug!(
        backend = %backend.backend_type(),
        supported = capability.is_supported(),
        "Checked scanner capability"
    );
    capability
}
