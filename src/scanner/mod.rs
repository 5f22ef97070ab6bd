// SPDX-License-Identifier: GPL-3.0-only

//! QR scan orchestration
//!
//! Typical flow:
//!
//! ```text
//! detect_capability ─► request permission ─► list cameras ─► Scanner::start
//!                                                                  │
//!                                    handlers ◄── DecodeRouter ◄── decode loop
//! ```

pub mod capability;
pub mod config;
pub mod devices;
pub mod lifecycle;
pub mod permission;
pub mod router;
pub mod session;

pub use capability::{ScannerCapability, UnsupportedReason, detect_capability};
pub use config::{QrBox, ScanConfig};
pub use devices::{list_cameras, select_default};
pub use lifecycle::LifecycleEvent;
pub use permission::{PermissionNegotiator, PermissionState};
pub use router::{ScanEvent, ScanHandlers, ScanMode, result_stream};
pub use session::{Scanner, ScannerState};
