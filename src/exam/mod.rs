// SPDX-License-Identifier: GPL-3.0-only

//! Exam QR payloads: generation and validation

pub mod payload;
pub mod validator;

pub use payload::{
    CorrectionQrPayload, ExamQrPayload, PayloadId, generate_correction_payload,
    generate_exam_payload, generate_exam_payload_at,
};
pub use validator::{
    PayloadInput, ValidationResult, validate_exam_payload, validate_exam_payload_at,
};
