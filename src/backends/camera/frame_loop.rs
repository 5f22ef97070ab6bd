// SPDX-License-Identifier: GPL-3.0-only
//! Thread lifecycle management for decode loops
//!
//! Camera reads block, so each scan session runs its read-decode-route cycle
//! on a dedicated thread. The controller owns that thread: stopping it joins
//! the thread, and the loop state (including the open camera stream) is
//! dropped before the join returns.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Action returned by the loop callback to control loop behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    /// Continue running the loop
    Continue,
    /// Stop the loop gracefully
    Stop,
}

/// Controller for a paced loop running in a separate thread
///
/// # Example
///
/// ```ignore
/// let controller = CaptureLoopController::start(
///     "scan:preview",
///     Duration::from_millis(100),
///     stream,
///     |stream| {
///         let _ = stream.next_frame();
///         LoopAction::Continue
///     },
/// )?;
///
/// // Later: the stream is dropped before this returns
/// controller.stop();
/// ```
pub struct CaptureLoopController {
    /// Thread handle for joining
    thread_handle: Option<JoinHandle<()>>,
    /// Signal to stop the loop
    stop_signal: Arc<AtomicBool>,
    /// Name for logging
    name: String,
}

impl CaptureLoopController {
    /// Start a new loop in a separate thread
    ///
    /// `loop_fn` runs at most once per `pace`; the remainder of each period
    /// is slept in a way that [`stop`](Self::stop) can interrupt. `state` is
    /// moved into the thread and dropped when the thread exits.
    ///
    /// Fails only if the OS refuses to spawn the thread.
    pub fn start<S, F>(
        name: &str,
        pace: Duration,
        state: S,
        mut loop_fn: F,
    ) -> std::io::Result<Self>
    where
        S: Send + 'static,
        F: FnMut(&mut S) -> LoopAction + Send + 'static,
    {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let stop_signal_clone = Arc::clone(&stop_signal);
        let name_clone = name.to_string();

        info!(name = %name, pace_ms = pace.as_millis() as u64, "Starting decode loop");

        let thread_handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let mut state = state;
                debug!(name = %name_clone, "Decode loop thread started");

                loop {
                    if stop_signal_clone.load(Ordering::SeqCst) {
                        debug!(name = %name_clone, "Stop signal received");
                        break;
                    }

                    let started = Instant::now();
                    if loop_fn(&mut state) == LoopAction::Stop {
                        debug!(name = %name_clone, "Loop requested stop");
                        break;
                    }

                    let elapsed = started.elapsed();
                    if elapsed < pace && !stop_signal_clone.load(Ordering::SeqCst) {
                        thread::park_timeout(pace - elapsed);
                    }
                }

                drop(state);
                info!(name = %name_clone, "Decode loop thread exiting");
            })?;

        Ok(Self {
            thread_handle: Some(thread_handle),
            stop_signal,
            name: name.to_string(),
        })
    }

    /// Check if the loop is still running
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Signal the loop to stop (non-blocking)
    pub fn request_stop(&self) {
        debug!(name = %self.name, "Requesting decode loop stop");
        self.stop_signal.store(true, Ordering::SeqCst);
        if let Some(handle) = &self.thread_handle {
            handle.thread().unpark();
        }
    }

    /// Stop the loop and wait for the thread to finish
    pub fn stop(&mut self) {
        self.request_stop();
        self.join();
    }

    /// Wait for the thread to finish without sending stop signal
    pub fn join(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            debug!(name = %self.name, "Waiting for decode loop thread to finish");
            if let Err(e) = handle.join() {
                warn!(name = %self.name, "Decode loop thread panicked: {:?}", e);
            } else {
                debug!(name = %self.name, "Decode loop thread finished");
            }
        }
    }
}

impl Drop for CaptureLoopController {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            debug!(name = %self.name, "CaptureLoopController dropped, stopping loop");
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn test_loop_stops_itself() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);

        let mut controller =
            CaptureLoopController::start("test-loop", Duration::ZERO, (), move |_| {
                let count = counter_clone.fetch_add(1, Ordering::SeqCst);
                if count >= 10 {
                    LoopAction::Stop
                } else {
                    LoopAction::Continue
                }
            })
            .unwrap();

        controller.join();

        assert_eq!(counter.load(Ordering::SeqCst), 11); // 0-10 inclusive
    }

    #[test]
    fn test_stop_interrupts_pacing() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);

        // A one-minute pace would hang the test if stop could not wake the thread
        let mut controller =
            CaptureLoopController::start("test-pace", Duration::from_secs(60), (), move |_| {
                counter_clone.fetch_add(1, Ordering::SeqCst);
                LoopAction::Continue
            })
            .unwrap();

        thread::sleep(Duration::from_millis(50));
        let started = Instant::now();
        controller.stop();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(counter.load(Ordering::SeqCst) >= 1);
        assert!(!controller.is_running());
    }

    #[test]
    fn test_state_dropped_before_stop_returns() {
        struct Flag(Arc<AtomicBool>);
        impl Drop for Flag {
            fn drop(&mut self) {
                self.0.store(true, Ordering::SeqCst);
            }
        }

        let released = Arc::new(AtomicBool::new(false));
        let mut controller = CaptureLoopController::start(
            "test-release",
            Duration::from_millis(5),
            Flag(Arc::clone(&released)),
            |_| LoopAction::Continue,
        )
        .unwrap();

        thread::sleep(Duration::from_millis(20));
        controller.stop();
        assert!(released.load(Ordering::SeqCst));
    }

    #[test]
    fn test_is_running() {
        let controller =
            CaptureLoopController::start("test-running", Duration::from_millis(100), (), |_| {
                LoopAction::Continue
            })
            .unwrap();

        assert!(controller.is_running());

        // Drop will stop it
        drop(controller);
    }
}
