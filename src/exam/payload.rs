// SPDX-License-Identifier: GPL-3.0-only

//! Exam QR payload wire format
//!
//! Exam sheets carry `{"type":"exam","exam_id":…,"version":…,"timestamp":…}`
//! with the timestamp in epoch milliseconds. Correction slips carry the
//! student's answer sheet id and name instead of a version.

use crate::constants::exam_payload::{CORRECTION_TYPE, EXAM_TYPE};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier as found in a payload: backends use numeric and string ids
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PayloadId {
    Number(serde_json::Number),
    Text(String),
}

impl fmt::Display for PayloadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadId::Number(n) => write!(f, "{}", n),
            PayloadId::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for PayloadId {
    fn from(id: &str) -> Self {
        PayloadId::Text(id.to_string())
    }
}

impl From<String> for PayloadId {
    fn from(id: String) -> Self {
        PayloadId::Text(id)
    }
}

impl From<u64> for PayloadId {
    fn from(id: u64) -> Self {
        PayloadId::Number(id.into())
    }
}

impl From<i64> for PayloadId {
    fn from(id: i64) -> Self {
        PayloadId::Number(id.into())
    }
}

/// Payload printed on an exam sheet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamQrPayload {
    #[serde(rename = "type")]
    pub kind: String,
    pub exam_id: PayloadId,
    pub version: u32,
    /// Epoch milliseconds
    pub timestamp: i64,
}

impl ExamQrPayload {
    pub fn new(exam_id: impl Into<PayloadId>, version: u32, issued_at: DateTime<Utc>) -> Self {
        Self {
            kind: EXAM_TYPE.to_string(),
            exam_id: exam_id.into(),
            version,
            timestamp: issued_at.timestamp_millis(),
        }
    }
}

/// Payload printed on a correction slip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionQrPayload {
    #[serde(rename = "type")]
    pub kind: String,
    pub exam_id: PayloadId,
    pub answer_id: PayloadId,
    pub student_name: String,
    pub timestamp: i64,
}

/// JSON text for an exam QR code, stamped with the current time
pub fn generate_exam_payload(exam_id: impl Into<PayloadId>, version: u32) -> String {
    generate_exam_payload_at(exam_id, version, Utc::now())
}

pub fn generate_exam_payload_at(
    exam_id: impl Into<PayloadId>,
    version: u32,
    issued_at: DateTime<Utc>,
) -> String {
    to_json(&ExamQrPayload::new(exam_id, version, issued_at))
}

/// JSON text for a correction QR code, stamped with the current time
pub fn generate_correction_payload(
    exam_id: impl Into<PayloadId>,
    answer_id: impl Into<PayloadId>,
    student_name: &str,
) -> String {
    to_json(&CorrectionQrPayload {
        kind: CORRECTION_TYPE.to_string(),
        exam_id: exam_id.into(),
        answer_id: answer_id.into(),
        student_name: student_name.to_string(),
        timestamp: Utc::now().timestamp_millis(),
    })
}

fn to_json<T: Serialize>(payload: &T) -> String {
    // Plain structs of strings and numbers always serialize
    serde_json::to_string(payload).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_exam_payload_wire_format() {
        let issued = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        assert_eq!(
            generate_exam_payload_at("E1", 2, issued),
            r#"{"type":"exam","exam_id":"E1","version":2,"timestamp":1700000000000}"#
        );
        assert_eq!(
            generate_exam_payload_at(42u64, 1, issued),
            r#"{"type":"exam","exam_id":42,"version":1,"timestamp":1700000000000}"#
        );
    }

    #[test]
    fn test_correction_payload_fields() {
        let json = generate_correction_payload(7u64, "A-3", "Ana Souza");
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "correction");
        assert_eq!(value["exam_id"], 7);
        assert_eq!(value["answer_id"], "A-3");
        assert_eq!(value["student_name"], "Ana Souza");
        assert!(value["timestamp"].as_i64().unwrap() > 0);
    }

    #[test]
    fn test_numeric_id_display() {
        assert_eq!(PayloadId::from(12u64).to_string(), "12");
        assert_eq!(PayloadId::from("X9").to_string(), "X9");
    }
}
