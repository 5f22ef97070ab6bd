// SPDX-License-Identifier: MPL-2.0

//! Exam Scanner - QR code scanning and exam payload validation
//!
//! Drives a camera, decodes QR codes from its frames and checks whether a
//! decoded code is a valid exam sheet code.
//!
//! # Architecture
//!
//! - [`backends`]: Camera access (V4L2, still images)
//! - [`frame_processor`]: QR decoding of frames and image files
//! - [`scanner`]: Capability, permission, devices and the scan session
//! - [`exam`]: Exam payload generation and validation
//! - [`history`] / [`stats`]: Bookkeeping over delivered scans
//! - [`config`]: User configuration handling
//! - [`storage`]: History export files
//!
//! # Example
//!
//! ```ignore
//! let backend = get_backend(CameraBackendType::V4l2, None)?;
//! let scanner = Scanner::new(backend);
//! let result = scanner.scan_once("exam-sheet", ScanConfig::default()).await?;
//! println!("{:?}", validate_exam_payload(&result.payload));
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod exam;
pub mod frame_processor;
pub mod history;
pub mod scanner;
pub mod stats;
pub mod storage;

// Re-export commonly used types
pub use backends::camera::{CameraBackend, CameraBackendType, CameraDevice, get_backend};
pub use config::Config;
pub use constants::ScanPreset;
pub use errors::{ScanError, ScannerError, ScannerResult};
pub use exam::{ValidationResult, validate_exam_payload};
pub use frame_processor::{ScanPayload, ScanResult, check_upload, decode_file};
pub use scanner::{ScanConfig, ScanHandlers, Scanner, ScannerState};
