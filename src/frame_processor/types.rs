// SPDX-License-Identifier: MPL-2.0

//! Core types for decode results
//!
//! Decoder output is normalised into a [`ScanPayload`] before anything else
//! sees it: text that parses as JSON becomes structured data, everything
//! else is passed through unchanged.

use serde::Serialize;
use serde_json::Value;

/// A rectangular region within a frame
///
/// Coordinates are normalized (0.0 to 1.0) relative to the frame dimensions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameRegion {
    /// Left edge (0.0 = left of frame, 1.0 = right of frame)
    pub x: f32,
    /// Top edge (0.0 = top of frame, 1.0 = bottom of frame)
    pub y: f32,
    /// Width as fraction of frame width
    pub width: f32,
    /// Height as fraction of frame height
    pub height: f32,
}

impl FrameRegion {
    /// Create a frame region from pixel coordinates
    pub fn from_pixels(
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        frame_width: u32,
        frame_height: u32,
    ) -> Self {
        let frame_width = frame_width.max(1) as f32;
        let frame_height = frame_height.max(1) as f32;
        Self {
            x: x as f32 / frame_width,
            y: y as f32 / frame_height,
            width: width as f32 / frame_width,
            height: height as f32 / frame_height,
        }
    }
}

/// What the decode engine read, before normalisation
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Decoded text
    pub content: String,
    /// Location of the code, if the engine reported one
    pub bounds: Option<FrameRegion>,
}

impl Detection {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            bounds: None,
        }
    }

    pub fn with_bounds(mut self, bounds: FrameRegion) -> Self {
        self.bounds = Some(bounds);
        self
    }
}

/// Decoded QR content
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ScanPayload {
    /// Text that parsed as JSON (any JSON value, not only objects)
    Structured(Value),
    /// Text that is not JSON, unchanged
    Raw(String),
}

impl ScanPayload {
    /// Parse as JSON, falling back to the raw text
    pub fn from_text(text: &str) -> Self {
        match serde_json::from_str::<Value>(text) {
            Ok(value) => ScanPayload::Structured(value),
            Err(_) => ScanPayload::Raw(text.to_string()),
        }
    }

    /// History category: `"text"` for JSON strings and raw text, `"object"` otherwise
    pub fn kind(&self) -> &'static str {
        match self {
            ScanPayload::Raw(_) | ScanPayload::Structured(Value::String(_)) => "text",
            ScanPayload::Structured(_) => "object",
        }
    }

    /// Flat text form, used for searching
    pub fn to_text(&self) -> String {
        match self {
            ScanPayload::Raw(text) | ScanPayload::Structured(Value::String(text)) => text.clone(),
            ScanPayload::Structured(value) => value.to_string(),
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            ScanPayload::Structured(value) => Some(value),
            ScanPayload::Raw(_) => None,
        }
    }
}

/// A delivered scan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanResult {
    pub payload: ScanPayload,
    /// Text exactly as decoded
    pub raw_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounds: Option<FrameRegion>,
    /// Camera the code was read from; `None` for file decodes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
}

impl ScanResult {
    /// Normalise a detection
    pub fn from_detection(detection: Detection, device_id: Option<String>) -> Self {
        Self {
            payload: ScanPayload::from_text(&detection.content),
            raw_text: detection.content,
            bounds: detection.bounds,
            device_id,
        }
    }
}
