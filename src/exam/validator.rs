// SPDX-License-Identifier: GPL-3.0-only

//! Exam payload acceptance
//!
//! Checks run in a fixed order and the first failure wins:
//! parse, shape, exam id, type tag, age. Validation never fails as an
//! operation; rejections are values.

use crate::constants::exam_payload::{EXAM_TYPE, MAX_AGE_DAYS};
use crate::frame_processor::ScanPayload;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{Value, json};

pub const MALFORMED_PAYLOAD: &str = "malformed payload";
pub const INVALID_QR_CODE: &str = "invalid QR code";
pub const EXAM_ID_NOT_FOUND: &str = "exam id not found";
pub const NOT_AN_EXAM_CODE: &str = "QR code is not an exam code";
pub const QR_CODE_EXPIRED: &str = "QR code expired";

const MILLIS_PER_DAY: f64 = 1000.0 * 60.0 * 60.0 * 24.0;

/// Outcome of validating a scanned exam code
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationResult {
    Valid {
        /// Exam id as text; numeric ids in decimal
        exam_id: String,
        version: u64,
        /// Timestamp exactly as found in the payload
        timestamp: Option<Value>,
    },
    Invalid {
        error: String,
        /// Only set for expired codes
        warning: bool,
    },
}

impl ValidationResult {
    fn invalid(error: &str) -> Self {
        ValidationResult::Invalid {
            error: error.to_string(),
            warning: false,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid { .. })
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ValidationResult::Invalid { error, .. } => Some(error),
            ValidationResult::Valid { .. } => None,
        }
    }

    /// JSON report in the `{valid, examId, …}` / `{valid, error, warning}` shape
    pub fn to_json(&self) -> Value {
        match self {
            ValidationResult::Valid {
                exam_id,
                version,
                timestamp,
            } => json!({
                "valid": true,
                "examId": exam_id,
                "version": version,
                "timestamp": timestamp,
            }),
            ValidationResult::Invalid { error, warning } => json!({
                "valid": false,
                "error": error,
                "warning": warning,
            }),
        }
    }
}

/// Something that may hold an exam payload
#[derive(Debug, Clone, Copy)]
pub enum PayloadInput<'a> {
    /// Undecoded text, parsed as JSON first
    Text(&'a str),
    Value(&'a Value),
}

impl<'a> From<&'a str> for PayloadInput<'a> {
    fn from(text: &'a str) -> Self {
        PayloadInput::Text(text)
    }
}

impl<'a> From<&'a String> for PayloadInput<'a> {
    fn from(text: &'a String) -> Self {
        PayloadInput::Text(text)
    }
}

impl<'a> From<&'a Value> for PayloadInput<'a> {
    fn from(value: &'a Value) -> Self {
        match value {
            Value::String(text) => PayloadInput::Text(text),
            other => PayloadInput::Value(other),
        }
    }
}

impl<'a> From<&'a ScanPayload> for PayloadInput<'a> {
    fn from(payload: &'a ScanPayload) -> Self {
        match payload {
            ScanPayload::Raw(text) => PayloadInput::Text(text),
            ScanPayload::Structured(value) => PayloadInput::from(value),
        }
    }
}

/// Validate against the current time
pub fn validate_exam_payload<'a>(input: impl Into<PayloadInput<'a>>) -> ValidationResult {
    validate_exam_payload_at(input, Utc::now())
}

/// Validate with an explicit clock
pub fn validate_exam_payload_at<'a>(
    input: impl Into<PayloadInput<'a>>,
    now: DateTime<Utc>,
) -> ValidationResult {
    match input.into() {
        PayloadInput::Text(text) => match serde_json::from_str::<Value>(text) {
            Ok(value) => validate_value(&value, now),
            Err(_) => ValidationResult::invalid(MALFORMED_PAYLOAD),
        },
        PayloadInput::Value(value) => validate_value(value, now),
    }
}

fn validate_value(value: &Value, now: DateTime<Utc>) -> ValidationResult {
    let Value::Object(data) = value else {
        return ValidationResult::invalid(INVALID_QR_CODE);
    };

    let exam_id = match data.get("exam_id") {
        Some(id) if is_truthy(id) => id,
        _ => return ValidationResult::invalid(EXAM_ID_NOT_FOUND),
    };

    let kind = data.get("type").filter(|kind| is_truthy(kind));
    if kind.is_some_and(|kind| kind.as_str() != Some(EXAM_TYPE)) {
        return ValidationResult::invalid(NOT_AN_EXAM_CODE);
    }

    let timestamp = data.get("timestamp").filter(|ts| is_truthy(ts));
    let age_days = timestamp.and_then(|ts| age_in_days(ts, now));
    if age_days.is_some_and(|days| days > MAX_AGE_DAYS) {
        return ValidationResult::Invalid {
            error: QR_CODE_EXPIRED.to_string(),
            warning: true,
        };
    }

    let version = data
        .get("version")
        .and_then(Value::as_u64)
        .filter(|v| *v > 0)
        .unwrap_or(1);

    ValidationResult::Valid {
        exam_id: render_id(exam_id),
        version,
        timestamp: timestamp.cloned(),
    }
}

/// JSON values that count as present: not null, false, 0, NaN or ""
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn render_id(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Age of a timestamp in days; `None` when it cannot be read as a date
fn age_in_days(timestamp: &Value, now: DateTime<Utc>) -> Option<f64> {
    let issued_ms = match timestamp {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => parse_date(s)?.timestamp_millis() as f64,
        _ => return None,
    };
    Some((now.timestamp_millis() as f64 - issued_ms) / MILLIS_PER_DAY)
}

fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc3339(text) {
        return Some(date.with_timezone(&Utc));
    }
    // Date-only strings are midnight UTC
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_falsy_exam_ids_rejected() {
        for payload in [
            r#"{}"#,
            r#"{"exam_id":null}"#,
            r#"{"exam_id":false}"#,
            r#"{"exam_id":""}"#,
            r#"{"exam_id":0}"#,
        ] {
            assert_eq!(
                validate_exam_payload_at(payload, now()).error(),
                Some(EXAM_ID_NOT_FOUND),
                "{}",
                payload
            );
        }
    }

    #[test]
    fn test_non_objects_rejected() {
        for payload in ["[1,2]", "null", "42", r#""text""#] {
            assert_eq!(
                validate_exam_payload_at(payload, now()).error(),
                Some(INVALID_QR_CODE),
                "{}",
                payload
            );
        }
    }

    #[test]
    fn test_falsy_type_is_ignored() {
        let result = validate_exam_payload_at(r#"{"exam_id":"E1","type":""}"#, now());
        assert!(result.is_valid());
    }

    #[test]
    fn test_rfc3339_timestamp() {
        let old = (now() - Duration::days(40)).to_rfc3339();
        let payload = json!({"exam_id": "E1", "timestamp": old});
        assert_eq!(
            validate_exam_payload_at(&payload, now()),
            ValidationResult::Invalid {
                error: QR_CODE_EXPIRED.to_string(),
                warning: true
            }
        );
    }

    #[test]
    fn test_unreadable_timestamp_not_stale() {
        let payload = json!({"exam_id": "E1", "timestamp": "last tuesday"});
        assert!(validate_exam_payload_at(&payload, now()).is_valid());
    }

    #[test]
    fn test_version_falls_back_to_one() {
        for version in [json!(0), json!(-3), json!("2"), json!(1.5)] {
            let payload = json!({"exam_id": "E1", "version": version});
            match validate_exam_payload_at(&payload, now()) {
                ValidationResult::Valid { version, .. } => assert_eq!(version, 1),
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn test_report_shape() {
        let report = validate_exam_payload_at(r#"{"exam_id":7,"version":3}"#, now()).to_json();
        assert_eq!(report["valid"], true);
        assert_eq!(report["examId"], "7");
        assert_eq!(report["version"], 3);
    }
}
