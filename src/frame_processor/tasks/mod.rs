// SPDX-License-Identifier: GPL-3.0-only

//! Frame processing tasks

pub mod qr_detector;

pub use qr_detector::QrDetector;
