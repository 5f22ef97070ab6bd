// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Frames decoded per second during a live scan
pub const DEFAULT_FPS: u32 = 10;

/// Side length of the square decode region, in pixels
pub const DEFAULT_QRBOX_SIZE: u32 = 250;

/// Preview aspect ratio (width / height)
pub const DEFAULT_ASPECT_RATIO: f32 = 1.0;

/// Rear camera, the one pointed at a sheet of paper
pub const DEFAULT_FACING_MODE: &str = "environment";

/// Window during which a repeated code is not delivered again in continuous mode
pub const DEFAULT_COOLDOWN_MS: u64 = 2000;

/// Largest frame dimension handed to the QR detector; bigger frames are downscaled
pub const DETECTOR_MAX_DIMENSION: u32 = 640;

/// Labels identifying a rear-facing camera (matched case-insensitively)
pub const REAR_CAMERA_HINTS: [&str; 3] = ["back", "rear", "environment"];

/// Exam QR payload constants
pub mod exam_payload {
    /// `type` tag of exam payloads
    pub const EXAM_TYPE: &str = "exam";

    /// `type` tag of correction payloads
    pub const CORRECTION_TYPE: &str = "correction";

    /// Payloads older than this are reported as expired
    pub const MAX_AGE_DAYS: f64 = 30.0;
}

/// Upload limits for file decoding
pub mod upload {
    /// Maximum accepted image size in bytes (5 MiB)
    pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;
}

/// Scan history defaults
pub mod history {
    /// Number of entries kept before the oldest are dropped
    pub const DEFAULT_MAX_ITEMS: usize = 50;
}

/// File extension helpers
pub mod file_formats {
    /// Image file extensions the still camera will load
    pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp"];

    /// Check if a file extension is a supported image format
    pub fn is_image_extension(ext: &str) -> bool {
        IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str())
    }
}

/// Frame interval for a decode rate
///
/// A rate of zero is treated as one frame per second.
pub fn frame_interval(fps: u32) -> Duration {
    Duration::from_millis(1000 / u64::from(fps.max(1)))
}

/// Named scanner tuning presets
///
/// Trade decode rate against the size of the decode region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanPreset {
    /// 10 fps, 250px region
    #[default]
    Default,
    /// 20 fps, smaller 200px region
    Fast,
    /// 5 fps, larger 300px region
    Precise,
    /// 10 fps, 200px region, 1280x720 capture from the rear camera
    Mobile,
}

impl ScanPreset {
    /// Get all preset variants for iteration
    pub const ALL: [ScanPreset; 4] = [
        ScanPreset::Default,
        ScanPreset::Fast,
        ScanPreset::Precise,
        ScanPreset::Mobile,
    ];

    /// Get display name for the preset
    pub fn display_name(&self) -> &'static str {
        match self {
            ScanPreset::Default => "Default",
            ScanPreset::Fast => "Fast",
            ScanPreset::Precise => "Precise",
            ScanPreset::Mobile => "Mobile",
        }
    }

    /// Frames decoded per second
    pub fn fps(&self) -> u32 {
        match self {
            ScanPreset::Default | ScanPreset::Mobile => 10,
            ScanPreset::Fast => 20,
            ScanPreset::Precise => 5,
        }
    }

    /// Side length of the decode region
    pub fn qrbox_size(&self) -> u32 {
        match self {
            ScanPreset::Default => 250,
            ScanPreset::Fast | ScanPreset::Mobile => 200,
            ScanPreset::Precise => 300,
        }
    }

    /// Capture resolution requested by the preset, if any
    pub fn capture_size(&self) -> Option<(u32, u32)> {
        match self {
            ScanPreset::Mobile => Some((1280, 720)),
            _ => None,
        }
    }
}

impl std::fmt::Display for ScanPreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

impl std::str::FromStr for ScanPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ScanPreset::ALL
            .into_iter()
            .find(|preset| preset.display_name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown preset '{}'", s))
    }
}
