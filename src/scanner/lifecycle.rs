// SPDX-License-Identifier: GPL-3.0-only

//! Host lifecycle events that end a scan session

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Something happened to the host that must release the camera
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The owning view or process is going away
    Teardown,
    /// The user navigated elsewhere
    NavigateAway,
    /// The scanner is no longer visible
    Hidden,
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleEvent::Teardown => write!(f, "teardown"),
            LifecycleEvent::NavigateAway => write!(f, "navigate-away"),
            LifecycleEvent::Hidden => write!(f, "hidden"),
        }
    }
}

/// Set by Ctrl+C, polled by long-running commands
#[derive(Debug, Clone)]
pub struct InterruptFlag(Arc<AtomicBool>);

impl InterruptFlag {
    /// Install the process-wide Ctrl+C handler
    ///
    /// Can only be done once per process.
    pub fn install() -> Result<Self, ctrlc::Error> {
        let flag = Arc::new(AtomicBool::new(false));
        let flag_clone = Arc::clone(&flag);
        ctrlc::set_handler(move || {
            flag_clone.store(true, Ordering::SeqCst);
        })?;
        Ok(Self(flag))
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
