// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for decode outcome routing

use exam_scanner::ScanPayload;
use exam_scanner::errors::ScanError;
use exam_scanner::frame_processor::{DecodeError, Detection};
use exam_scanner::scanner::router::{DecodeRouter, RouteOutcome};
use exam_scanner::scanner::{ScanEvent, ScanHandlers, ScanMode};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

fn continuous(cooldown_ms: u64) -> ScanMode {
    ScanMode::Continuous {
        cooldown: Duration::from_millis(cooldown_ms),
    }
}

#[test]
fn test_cooldown_suppresses_repeats() {
    let (handlers, mut events) = ScanHandlers::channel();
    let mut router = DecodeRouter::new(handlers, continuous(2000));
    let t0 = Instant::now();

    let at = |ms| t0 + Duration::from_millis(ms);
    assert_eq!(router.route(Ok(Detection::new("ABC")), at(0)), RouteOutcome::Delivered);
    assert_eq!(router.route(Ok(Detection::new("ABC")), at(500)), RouteOutcome::Suppressed);
    assert_eq!(router.route(Ok(Detection::new("ABC")), at(2100)), RouteOutcome::Delivered);

    let mut delivered = 0;
    while let Ok(event) = events.try_recv() {
        assert!(matches!(event, ScanEvent::Result(_)));
        delivered += 1;
    }
    assert_eq!(delivered, 2);
}

#[test]
fn test_distinct_codes_are_not_suppressed() {
    let (handlers, _events) = ScanHandlers::channel();
    let mut router = DecodeRouter::new(handlers, continuous(2000));
    let t0 = Instant::now();

    assert_eq!(router.route(Ok(Detection::new("A")), t0), RouteOutcome::Delivered);
    assert_eq!(
        router.route(Ok(Detection::new("B")), t0 + Duration::from_millis(10)),
        RouteOutcome::Delivered
    );
}

#[test]
fn test_standard_mode_delivers_every_read() {
    let (handlers, _events) = ScanHandlers::channel();
    let mut router = DecodeRouter::new(handlers, ScanMode::Standard);
    let now = Instant::now();

    for _ in 0..3 {
        assert_eq!(router.route(Ok(Detection::new("same")), now), RouteOutcome::Delivered);
    }
}

#[test]
fn test_payload_parse_fallback() {
    let (handlers, mut events) = ScanHandlers::channel();
    let mut router = DecodeRouter::new(handlers, ScanMode::Standard).with_device_id("cam0");
    let now = Instant::now();

    router.route(Ok(Detection::new("not-json")), now);
    router.route(Ok(Detection::new(r#"{"exam_id":"E1"}"#)), now);

    match events.try_recv().unwrap() {
        ScanEvent::Result(result) => {
            assert_eq!(result.payload, ScanPayload::Raw("not-json".to_string()));
            assert_eq!(result.device_id.as_deref(), Some("cam0"));
        }
        other => panic!("unexpected event {:?}", other),
    }
    match events.try_recv().unwrap() {
        ScanEvent::Result(result) => {
            assert_eq!(result.payload, ScanPayload::Structured(json!({"exam_id": "E1"})));
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[test]
fn test_no_code_never_reaches_error_handler() {
    let errors = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&errors);
    let handlers = ScanHandlers::new(|_| {}).with_error_handler(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let mut router = DecodeRouter::new(handlers, ScanMode::Standard);
    let now = Instant::now();

    for _ in 0..1000 {
        assert_eq!(router.route(Err(DecodeError::NotFound), now), RouteOutcome::NoCode);
    }
    assert_eq!(errors.load(Ordering::SeqCst), 0);

    router.route(Err(DecodeError::Engine("bad grid".to_string())), now);
    assert_eq!(errors.load(Ordering::SeqCst), 1);
}

#[test]
fn test_errors_without_handler_are_dropped() {
    let handlers = ScanHandlers::new(|_| {});
    assert!(!handlers.has_error_handler());

    let mut router = DecodeRouter::new(handlers, ScanMode::Standard);
    assert_eq!(
        router.route(Err(DecodeError::Engine("x".to_string())), Instant::now()),
        RouteOutcome::Failed
    );
}

#[test]
fn test_engine_error_is_forwarded_verbatim() {
    let (handlers, mut events) = ScanHandlers::channel();
    let mut router = DecodeRouter::new(handlers, ScanMode::Standard);

    router.route(Err(DecodeError::Engine("ECC failure".to_string())), Instant::now());
    assert_eq!(
        events.try_recv().unwrap(),
        ScanEvent::Error(ScanError::Decode("ECC failure".to_string()))
    );
}
