// SPDX-License-Identifier: GPL-3.0-only

//! Scan session configuration
//!
//! The JSON form uses the same camelCase keys a web scanner would accept, so
//! stored configs and CLI overrides can be written by hand. Unknown keys are
//! kept and forwarded to the backend untouched.

use crate::backends::camera::{StreamRequest, VideoConstraints};
use crate::constants::{
    DEFAULT_ASPECT_RATIO, DEFAULT_COOLDOWN_MS, DEFAULT_FPS, DEFAULT_QRBOX_SIZE, ScanPreset,
    frame_interval,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// Size of the centre region handed to the decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrBox {
    pub width: u32,
    pub height: u32,
}

impl QrBox {
    pub fn square(size: u32) -> Self {
        Self {
            width: size,
            height: size,
        }
    }
}

impl Default for QrBox {
    fn default() -> Self {
        Self::square(DEFAULT_QRBOX_SIZE)
    }
}

/// Scan tuning, merged over defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScanConfig {
    /// Decode attempts per second
    pub fps: u32,
    pub qrbox: QrBox,
    /// Preview aspect ratio (width / height)
    pub aspect_ratio: f32,
    /// Skip the mirrored decode attempt
    pub disable_flip: bool,
    pub video_constraints: VideoConstraints,
    /// Continuous-mode cooldown for repeated codes
    #[serde(rename = "cooldown")]
    pub cooldown_ms: u64,
    /// Keys the scanner does not interpret
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            fps: DEFAULT_FPS,
            qrbox: QrBox::default(),
            aspect_ratio: DEFAULT_ASPECT_RATIO,
            disable_flip: false,
            video_constraints: VideoConstraints::default(),
            cooldown_ms: DEFAULT_COOLDOWN_MS,
            extra: Map::new(),
        }
    }
}

impl ScanConfig {
    /// Configuration for a named preset
    pub fn preset(preset: ScanPreset) -> Self {
        let mut config = Self {
            fps: preset.fps(),
            qrbox: QrBox::square(preset.qrbox_size()),
            ..Self::default()
        };
        if let Some((width, height)) = preset.capture_size() {
            config.video_constraints.width = Some(width);
            config.video_constraints.height = Some(height);
        }
        config
    }

    /// Overlay JSON overrides onto this configuration
    ///
    /// The merge is shallow: a key present in `overrides` replaces the whole
    /// value of that key, nested objects included.
    pub fn merge_json(&self, overrides: &Value) -> Result<Self, serde_json::Error> {
        let mut merged = match serde_json::to_value(self)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        if let Value::Object(overrides) = overrides {
            for (key, value) in overrides {
                merged.insert(key.clone(), value.clone());
            }
        }
        serde_json::from_value(Value::Object(merged))
    }

    /// Defaults with JSON overrides applied
    pub fn from_overrides(overrides: &Value) -> Result<Self, serde_json::Error> {
        Self::default().merge_json(overrides)
    }

    /// Time budget of one decode iteration
    pub fn frame_interval(&self) -> Duration {
        frame_interval(self.fps)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    /// Stream request for this configuration
    pub fn stream_request(&self, device_id: Option<String>) -> StreamRequest {
        StreamRequest {
            device_id,
            constraints: self.video_constraints.clone(),
            aspect_ratio: Some(self.aspect_ratio),
            extra: self.extra.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let config = ScanConfig::default();
        assert_eq!(config.fps, 10);
        assert_eq!(config.qrbox, QrBox::square(250));
        assert_eq!(config.cooldown_ms, 2000);
        assert_eq!(config.video_constraints.facing_mode, "environment");
        assert!(!config.disable_flip);
    }

    #[test]
    fn test_overrides_are_shallow() {
        let config = ScanConfig::from_overrides(&json!({
            "fps": 5,
            "videoConstraints": { "facingMode": "user" },
            "cooldown": 500,
        }))
        .unwrap();

        assert_eq!(config.fps, 5);
        assert_eq!(config.video_constraints.facing_mode, "user");
        assert_eq!(config.video_constraints.width, None);
        assert_eq!(config.cooldown(), Duration::from_millis(500));
        assert_eq!(config.qrbox, QrBox::square(250));
    }

    #[test]
    fn test_unknown_keys_forwarded() {
        let config = ScanConfig::from_overrides(&json!({ "rememberLastUsedCamera": true })).unwrap();
        assert_eq!(config.extra.get("rememberLastUsedCamera"), Some(&json!(true)));

        let request = config.stream_request(None);
        assert_eq!(request.extra.get("rememberLastUsedCamera"), Some(&json!(true)));
        assert_eq!(request.aspect_ratio, Some(1.0));
    }

    #[test]
    fn test_mobile_preset_requests_hd() {
        let config = ScanConfig::preset(ScanPreset::Mobile);
        assert_eq!(config.qrbox, QrBox::square(200));
        assert_eq!(config.video_constraints.width, Some(1280));
        assert_eq!(config.video_constraints.height, Some(720));
    }

    #[test]
    fn test_zero_fps_still_paces() {
        let config = ScanConfig {
            fps: 0,
            ..ScanConfig::default()
        };
        assert_eq!(config.frame_interval(), Duration::from_secs(1));
    }
}
