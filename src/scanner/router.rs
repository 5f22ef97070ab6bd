// SPDX-License-Identifier: GPL-3.0-only

//! Decode callback routing
//!
//! Sits between the decode engine and the caller's handlers:
//!
//! - decoded text is normalised into a [`ScanPayload`] (JSON or raw text);
//! - "no code in frame" results are dropped without a trace at the caller;
//! - other engine and frame failures go to the error handler, if any;
//! - in continuous mode, repeats inside the cooldown window are suppressed.

use crate::backends::camera::BackendError;
use crate::errors::ScanError;
use crate::frame_processor::{DecodeError, Detection, ScanResult};
use futures::Stream;
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

/// Callback receiving delivered scans
pub type ResultHandler = Arc<dyn Fn(ScanResult) + Send + Sync>;
/// Callback receiving advisory scan errors
pub type ErrorHandler = Arc<dyn Fn(ScanError) + Send + Sync>;

/// Caller-supplied handlers for a scan session
///
/// Handlers run on the decode thread and should return quickly.
#[derive(Clone)]
pub struct ScanHandlers {
    on_result: ResultHandler,
    on_error: Option<ErrorHandler>,
}

/// Event forwarded by channel-backed handlers
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    Result(ScanResult),
    Error(ScanError),
}

impl ScanHandlers {
    pub fn new<F>(on_result: F) -> Self
    where
        F: Fn(ScanResult) + Send + Sync + 'static,
    {
        Self {
            on_result: Arc::new(on_result),
            on_error: None,
        }
    }

    pub fn with_error_handler<F>(mut self, on_error: F) -> Self
    where
        F: Fn(ScanError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(on_error));
        self
    }

    /// Handlers that forward every event into a channel
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ScanEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let error_tx = tx.clone();

        let handlers = Self::new(move |result| {
            let _ = tx.send(ScanEvent::Result(result));
        })
        .with_error_handler(move |error| {
            let _ = error_tx.send(ScanEvent::Error(error));
        });

        (handlers, rx)
    }

    pub fn has_error_handler(&self) -> bool {
        self.on_error.is_some()
    }

    fn deliver(&self, result: ScanResult) {
        (self.on_result)(result);
    }

    fn report(&self, error: ScanError) -> bool {
        match &self.on_error {
            Some(on_error) => {
                on_error(error);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for ScanHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanHandlers")
            .field("has_error_handler", &self.has_error_handler())
            .finish_non_exhaustive()
    }
}

/// Stream of delivered scans from a handler channel
///
/// Errors are logged and skipped. The stream ends when the session that owns
/// the handlers is gone.
pub fn result_stream(
    mut events: mpsc::UnboundedReceiver<ScanEvent>,
) -> impl Stream<Item = ScanResult> {
    async_stream::stream! {
        while let Some(event) = events.recv().await {
            match event {
                ScanEvent::Result(result) => yield result,
                ScanEvent::Error(error) => debug!(error = %error, "Skipping scan error in result stream"),
            }
        }
    }
}

/// How decoded codes are delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanMode {
    /// Every decoded frame is delivered
    #[default]
    Standard,
    /// Repeats within the cooldown are suppressed
    Continuous { cooldown: Duration },
}

/// 32-bit string hash over UTF-16 code units (`h = h * 31 + unit`)
pub fn content_hash(text: &str) -> i32 {
    text.encode_utf16()
        .fold(0i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(i32::from(unit)))
}

/// Recently delivered codes in continuous mode
///
/// A code is suppressed only while it is still remembered AND the last
/// delivery of any code was less than one cooldown ago. Codes are forgotten
/// two cooldowns after they were delivered.
#[derive(Debug, Clone)]
pub struct DedupWindow {
    cooldown: Duration,
    seen: HashSet<i32>,
    /// Pending forgets, in firing order
    expiries: VecDeque<(i32, Instant)>,
    last_accepted: Option<Instant>,
}

impl DedupWindow {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            seen: HashSet::new(),
            expiries: VecDeque::new(),
            last_accepted: None,
        }
    }

    /// Decide whether `hash` seen at `now` should be delivered, recording it if so
    pub fn admit(&mut self, hash: i32, now: Instant) -> bool {
        self.expire(now);

        let within_cooldown = self
            .last_accepted
            .is_some_and(|last| now.saturating_duration_since(last) < self.cooldown);
        if within_cooldown && self.seen.contains(&hash) {
            return false;
        }

        self.seen.insert(hash);
        self.last_accepted = Some(now);
        self.expiries.push_back((hash, now + self.cooldown * 2));
        true
    }

    pub fn contains(&self, hash: i32) -> bool {
        self.seen.contains(&hash)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    fn expire(&mut self, now: Instant) {
        while let Some(&(hash, at)) = self.expiries.front() {
            if at > now {
                break;
            }
            // A forget removes the code even if it was delivered again since
            self.seen.remove(&hash);
            self.expiries.pop_front();
        }
    }
}

/// What the router did with one decode outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    Delivered,
    /// Repeat within the cooldown
    Suppressed,
    /// Nothing in the frame
    NoCode,
    /// Failure passed to the error handler (or dropped when there is none)
    Failed,
}

/// Routes decode outcomes to a session's handlers
#[derive(Debug)]
pub struct DecodeRouter {
    handlers: ScanHandlers,
    dedup: Option<DedupWindow>,
    device_id: Option<String>,
}

impl DecodeRouter {
    pub fn new(handlers: ScanHandlers, mode: ScanMode) -> Self {
        let dedup = match mode {
            ScanMode::Standard => None,
            ScanMode::Continuous { cooldown } => Some(DedupWindow::new(cooldown)),
        };
        Self {
            handlers,
            dedup,
            device_id: None,
        }
    }

    /// Tag delivered results with the camera they came from
    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    /// Route one decode outcome observed at `now`
    pub fn route(&mut self, outcome: Result<Detection, DecodeError>, now: Instant) -> RouteOutcome {
        match outcome {
            Ok(detection) => self.route_detection(detection, now),
            Err(DecodeError::NotFound) => {
                trace!("No QR code in frame");
                RouteOutcome::NoCode
            }
            Err(DecodeError::Engine(msg)) => self.forward(ScanError::Decode(msg)),
        }
    }

    /// Route a failure to obtain a frame
    pub fn route_frame_error(&mut self, error: &BackendError) -> RouteOutcome {
        self.forward(ScanError::Frame(error.to_string()))
    }

    fn route_detection(&mut self, detection: Detection, now: Instant) -> RouteOutcome {
        if let Some(dedup) = self.dedup.as_mut() {
            let hash = content_hash(&detection.content);
            if !dedup.admit(hash, now) {
                trace!(hash, "Suppressed repeated QR code");
                return RouteOutcome::Suppressed;
            }
        }

        let result = ScanResult::from_detection(detection, self.device_id.clone());
        debug!(kind = result.payload.kind(), "Delivering scan result");
        self.handlers.deliver(result);
        RouteOutcome::Delivered
    }

    fn forward(&self, error: ScanError) -> RouteOutcome {
        warn!(error = %error, "Scanner error");
        self.handlers.report(error);
        RouteOutcome::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_matches_reference_values() {
        assert_eq!(content_hash(""), 0);
        assert_eq!(content_hash("a"), 97);
        assert_eq!(content_hash("abc"), 96354);
        // Overflows wrap to negative values
        assert_eq!(content_hash("hello world"), 1794106052);
        assert_eq!(content_hash("polygenelubricants"), i32::MIN);
    }

    #[test]
    fn test_first_scan_always_admitted() {
        let mut window = DedupWindow::new(Duration::from_millis(2000));
        assert!(window.admit(1, Instant::now()));
    }

    #[test]
    fn test_entries_forgotten_after_two_cooldowns() {
        let t0 = Instant::now();
        let mut window = DedupWindow::new(Duration::from_millis(1000));
        assert!(window.admit(7, t0));
        assert!(window.contains(7));

        // Another code keeps the cooldown fresh, but 7 has been forgotten
        assert!(window.admit(8, t0 + Duration::from_millis(1900)));
        assert!(window.admit(7, t0 + Duration::from_millis(2000)));
    }

    #[test]
    fn test_any_delivery_refreshes_cooldown() {
        let t0 = Instant::now();
        let mut window = DedupWindow::new(Duration::from_millis(1000));
        assert!(window.admit(1, t0));
        assert!(window.admit(2, t0 + Duration::from_millis(900)));
        // 1 is still remembered and the last delivery was 200ms ago
        assert!(!window.admit(1, t0 + Duration::from_millis(1100)));
    }
}
