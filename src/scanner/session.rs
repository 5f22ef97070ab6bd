// SPDX-License-Identifier: GPL-3.0-only

//! Scan session state machine
//!
//! A [`Scanner`] owns at most one live session. A session is a camera stream
//! plus a decode loop thread feeding a [`DecodeRouter`]:
//!
//! ```text
//! Idle ──start──► Starting ──► Running ──stop──► Stopping ──► Idle
//!                    │
//!                    └── error ──► Idle
//! ```
//!
//! Start, stop and device switches are serialised by one async mutex, so a
//! start always waits for the previous session's stream to be released.

use super::capability::{ScannerCapability, detect_capability};
use super::config::ScanConfig;
use super::devices;
use super::lifecycle::LifecycleEvent;
use super::permission::{PermissionNegotiator, PermissionState};
use super::router::{DecodeRouter, ScanEvent, ScanHandlers, ScanMode};
use crate::backends::camera::{
    BackendError, CameraAccessError, CameraBackend, CameraDevice, CaptureLoopController,
    FrameStream, LoopAction,
};
use crate::errors::{ScannerError, ScannerResult};
use crate::frame_processor::{DecodeOptions, FrameDecoder, QrDetector, ScanResult};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, watch};
use tracing::{debug, error, info, warn};

/// Observable scanner state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScannerState {
    #[default]
    Idle,
    Starting,
    Running,
    Stopping,
}

/// Parameters a running session was started with, kept for restarts
#[derive(Debug, Clone)]
struct SessionParams {
    target_id: String,
    handlers: ScanHandlers,
    config: ScanConfig,
    mode: ScanMode,
    /// Survives device switches; identifies who started the session
    owner: u64,
}

struct ActiveSession {
    params: SessionParams,
    /// Device that was asked for; `None` = backend default
    requested_device: Option<String>,
    /// Device the stream is actually bound to
    bound_device: String,
    decode_loop: CaptureLoopController,
}

#[derive(Default)]
struct Inner {
    session: Option<ActiveSession>,
    preferred_device: Option<String>,
    /// The preference was restored from an earlier run and may be stale
    preferred_is_remembered: bool,
    next_owner: u64,
}

/// State moved onto the decode thread
///
/// Dropping it closes the camera.
struct DecodeLoopState {
    stream: Box<dyn FrameStream>,
    router: DecodeRouter,
    decoder: Arc<dyn FrameDecoder>,
    options: DecodeOptions,
    state_tx: watch::Sender<ScannerState>,
}

/// QR scan session manager
pub struct Scanner {
    backend: Arc<dyn CameraBackend>,
    decoder: Arc<dyn FrameDecoder>,
    permission: Arc<PermissionNegotiator>,
    inner: Mutex<Inner>,
    state_tx: watch::Sender<ScannerState>,
    last_error: std::sync::Mutex<Option<ScannerError>>,
}

impl Scanner {
    /// Scanner decoding with rqrr
    pub fn new(backend: Arc<dyn CameraBackend>) -> Self {
        Self::with_decoder(backend, Arc::new(QrDetector::new()))
    }

    pub fn with_decoder(backend: Arc<dyn CameraBackend>, decoder: Arc<dyn FrameDecoder>) -> Self {
        let (state_tx, _) = watch::channel(ScannerState::Idle);
        Self {
            backend,
            decoder,
            permission: Arc::new(PermissionNegotiator::new()),
            inner: Mutex::new(Inner::default()),
            state_tx,
            last_error: std::sync::Mutex::new(None),
        }
    }

    /// Remember a device to use for future default starts
    pub fn with_preferred_device(mut self, device_id: Option<String>) -> Self {
        let inner = self.inner.get_mut();
        inner.preferred_device = device_id;
        inner.preferred_is_remembered = false;
        self
    }

    /// Prefer a camera remembered from an earlier run
    ///
    /// Unlike [`with_preferred_device`](Self::with_preferred_device), a
    /// remembered camera that no longer exists is forgotten and the start
    /// falls back to the backend default.
    pub fn with_remembered_device(mut self, device_id: Option<String>) -> Self {
        let inner = self.inner.get_mut();
        inner.preferred_is_remembered = device_id.is_some();
        inner.preferred_device = device_id;
        self
    }

    pub fn state(&self) -> ScannerState {
        *self.state_tx.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ScannerState> {
        self.state_tx.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.state() == ScannerState::Running
    }

    /// Error of the last failed start, cleared by a successful one
    pub fn last_error(&self) -> Option<ScannerError> {
        self.last_error.lock().ok().and_then(|e| e.clone())
    }

    pub fn capability(&self) -> ScannerCapability {
        detect_capability(self.backend.as_ref())
    }

    pub fn permission_state(&self) -> PermissionState {
        self.permission.state()
    }

    /// Target of the running session
    pub async fn active_target(&self) -> Option<String> {
        let mut inner = self.inner.lock().await;
        reap_finished_session(&mut inner);
        inner.session.as_ref().map(|s| s.params.target_id.clone())
    }

    /// Camera the running session is bound to
    pub async fn active_device(&self) -> Option<String> {
        let mut inner = self.inner.lock().await;
        reap_finished_session(&mut inner);
        inner.session.as_ref().map(|s| s.bound_device.clone())
    }

    pub async fn preferred_device(&self) -> Option<String> {
        self.inner.lock().await.preferred_device.clone()
    }

    /// Ask for camera access by briefly opening a stream
    pub async fn request_permission(&self) -> bool {
        self.request_permission_with(&ScanConfig::default()).await
    }

    async fn request_permission_with(&self, config: &ScanConfig) -> bool {
        let backend = Arc::clone(&self.backend);
        let permission = Arc::clone(&self.permission);
        let constraints = config.video_constraints.clone();

        tokio::task::spawn_blocking(move || permission.request(backend.as_ref(), &constraints))
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "Permission request task failed");
                false
            })
    }

    /// Cameras currently visible to the backend
    pub async fn list_cameras(&self) -> Vec<CameraDevice> {
        let backend = Arc::clone(&self.backend);
        tokio::task::spawn_blocking(move || devices::list_cameras(backend.as_ref()))
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "Camera enumeration task failed");
                Vec::new()
            })
    }

    /// Start scanning on the preferred camera, or the backend's default
    ///
    /// Permission is requested first unless it is already granted. An earlier
    /// denial is not final: every start asks again.
    pub async fn start(
        &self,
        target_id: &str,
        handlers: ScanHandlers,
        config: ScanConfig,
    ) -> ScannerResult<()> {
        self.start_with_mode(target_id, handlers, config, ScanMode::Standard)
            .await
            .map(|_| ())
    }

    /// Start scanning on a specific camera
    pub async fn start_with_device(
        &self,
        target_id: &str,
        device_id: &str,
        handlers: ScanHandlers,
        config: ScanConfig,
    ) -> ScannerResult<()> {
        let mut inner = self.inner.lock().await;
        let owner = next_owner(&mut inner);
        let params = SessionParams {
            target_id: target_id.to_string(),
            handlers,
            config,
            mode: ScanMode::Standard,
            owner,
        };
        self.start_locked(&mut inner, params, Some(device_id.to_string()))
            .await
    }

    /// Start scanning, suppressing repeats within `config.cooldown_ms`
    pub async fn start_continuous(
        &self,
        target_id: &str,
        handlers: ScanHandlers,
        config: ScanConfig,
    ) -> ScannerResult<()> {
        let mode = ScanMode::Continuous {
            cooldown: config.cooldown(),
        };
        self.start_with_mode(target_id, handlers, config, mode)
            .await
            .map(|_| ())
    }

    /// Scan until the first code is read, then stop
    ///
    /// Fails if the session is stopped or replaced before a code is read.
    pub async fn scan_once(&self, target_id: &str, config: ScanConfig) -> ScannerResult<ScanResult> {
        let (handlers, mut events) = ScanHandlers::channel();
        let owner = self
            .start_with_mode(target_id, handlers, config, ScanMode::Standard)
            .await?;

        // A lost device ends the decode loop without closing the channel
        let mut state_rx = self.subscribe_state();
        let mut result = None;
        loop {
            tokio::select! {
                biased;
                event = events.recv() => match event {
                    Some(ScanEvent::Result(scan)) => {
                        result = Some(scan);
                        break;
                    }
                    Some(ScanEvent::Error(e)) => {
                        debug!(error = %e, "Ignoring scan error while waiting")
                    }
                    None => break,
                },
                _ = wait_until_idle(&mut state_rx) => {
                    // Idle is also passed through while switching cameras
                    if !self.owns_live_session(owner).await {
                        break;
                    }
                    tokio::task::yield_now().await;
                }
            }
        }

        self.stop_owned_by(owner).await;
        result.ok_or_else(|| {
            ScannerError::DecodeFailure("scan ended before a code was read".to_string())
        })
    }

    /// Stop the running session, if any
    ///
    /// Returns once the camera has been released.
    pub async fn stop(&self) {
        let mut inner = self.inner.lock().await;
        self.stop_locked(&mut inner).await;
    }

    /// Prefer `device_id` from now on, restarting a running session on it
    ///
    /// The restarted session keeps its target, handlers, config and mode.
    pub async fn switch_device(&self, device_id: &str) -> ScannerResult<()> {
        let mut inner = self.inner.lock().await;
        inner.preferred_device = Some(device_id.to_string());
        inner.preferred_is_remembered = false;

        let Some(params) = inner.session.as_ref().map(|s| s.params.clone()) else {
            debug!(device = %device_id, "Preferred camera updated");
            return Ok(());
        };

        info!(device = %device_id, target = %params.target_id, "Switching camera");
        self.stop_locked(&mut inner).await;
        self.start_locked(&mut inner, params, Some(device_id.to_string()))
            .await
    }

    /// React to a host lifecycle event
    pub async fn handle_lifecycle(&self, event: LifecycleEvent) {
        let mut inner = self.inner.lock().await;
        if inner.session.is_some() {
            info!(event = %event, "Stopping scanner on lifecycle event");
            self.stop_locked(&mut inner).await;
        } else {
            debug!(event = %event, "Lifecycle event with no active session");
        }
    }

    async fn start_with_mode(
        &self,
        target_id: &str,
        handlers: ScanHandlers,
        config: ScanConfig,
        mode: ScanMode,
    ) -> ScannerResult<u64> {
        let mut inner = self.inner.lock().await;
        let owner = next_owner(&mut inner);
        let params = SessionParams {
            target_id: target_id.to_string(),
            handlers,
            config,
            mode,
            owner,
        };
        let device = inner.preferred_device.clone();
        match self
            .start_locked(&mut inner, params.clone(), device)
            .await
        {
            Err(ScannerError::DeviceNotFound(stale)) if inner.preferred_is_remembered => {
                warn!(device = %stale, "Remembered camera is gone, using the default");
                inner.preferred_device = None;
                inner.preferred_is_remembered = false;
                self.start_locked(&mut inner, params, None).await?;
            }
            outcome => outcome?,
        }
        Ok(owner)
    }

    async fn start_locked(
        &self,
        inner: &mut Inner,
        params: SessionParams,
        device: Option<String>,
    ) -> ScannerResult<()> {
        // Unsupported environments never reach the camera
        let capability = self.capability();
        if let Some(reason) = capability.unsupported_reason() {
            warn!(reason = %reason, "Scanner not supported");
            return Err(self.record_error(ScannerError::Unsupported(reason)));
        }

        self.stop_locked(inner).await;
        self.state_tx.send_replace(ScannerState::Starting);

        match self.open_session(params, device).await {
            Ok(session) => {
                info!(
                    target = %session.params.target_id,
                    device = %session.bound_device,
                    "Scanner running"
                );
                inner.session = Some(session);
                self.clear_error();
                self.state_tx.send_replace(ScannerState::Running);
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Failed to start scanner");
                self.state_tx.send_replace(ScannerState::Idle);
                Err(self.record_error(e))
            }
        }
    }

    async fn open_session(
        &self,
        params: SessionParams,
        device: Option<String>,
    ) -> ScannerResult<ActiveSession> {
        if !self.permission.state().is_granted() && !self.request_permission_with(&params.config).await
        {
            return Err(match self.permission.last_failure() {
                Some(CameraAccessError::NotFound) => ScannerError::NoCameraFound,
                reason => {
                    ScannerError::PermissionDenied(reason.unwrap_or(CameraAccessError::NotAllowed))
                }
            });
        }

        let request = params.config.stream_request(device.clone());
        let backend = Arc::clone(&self.backend);
        let stream = tokio::task::spawn_blocking(move || backend.open_stream(&request))
            .await
            .map_err(|e| ScannerError::Backend(BackendError::Other(e.to_string())))?
            .map_err(|e| match (e, &device) {
                (CameraAccessError::NotFound, Some(id)) => ScannerError::DeviceNotFound(id.clone()),
                (CameraAccessError::NotFound, None) => ScannerError::NoCameraFound,
                (other, _) => ScannerError::Camera(other),
            })?;

        let bound_device = stream.device_id().to_string();
        let router =
            DecodeRouter::new(params.handlers.clone(), params.mode).with_device_id(&bound_device);
        let loop_state = DecodeLoopState {
            stream,
            router,
            decoder: Arc::clone(&self.decoder),
            options: DecodeOptions::from(&params.config),
            state_tx: self.state_tx.clone(),
        };

        let decode_loop = CaptureLoopController::start(
            &format!("scan:{}", params.target_id),
            params.config.frame_interval(),
            loop_state,
            decode_iteration,
        )
        .map_err(|e| ScannerError::Backend(BackendError::from(e)))?;

        Ok(ActiveSession {
            params,
            requested_device: device,
            bound_device,
            decode_loop,
        })
    }

    async fn stop_locked(&self, inner: &mut Inner) {
        let Some(session) = inner.session.take() else {
            return;
        };

        self.state_tx.send_replace(ScannerState::Stopping);
        debug!(
            target = %session.params.target_id,
            requested = ?session.requested_device,
            "Stopping scanner"
        );

        let mut decode_loop = session.decode_loop;
        if let Err(e) = tokio::task::spawn_blocking(move || decode_loop.stop()).await {
            warn!(error = %e, "Decode loop shutdown task failed");
        }

        self.state_tx.send_replace(ScannerState::Idle);
        info!(target = %session.params.target_id, "Scanner stopped");
    }

    async fn stop_owned_by(&self, owner: u64) {
        let mut inner = self.inner.lock().await;
        let owned = inner
            .session
            .as_ref()
            .is_some_and(|session| session.params.owner == owner);
        if owned {
            self.stop_locked(&mut inner).await;
        }
    }

    async fn owns_live_session(&self, owner: u64) -> bool {
        let inner = self.inner.lock().await;
        inner.session.as_ref().is_some_and(|session| {
            session.params.owner == owner && session.decode_loop.is_running()
        })
    }

    fn record_error(&self, error: ScannerError) -> ScannerError {
        if let Ok(mut last) = self.last_error.lock() {
            *last = Some(error.clone());
        }
        error
    }

    fn clear_error(&self) {
        if let Ok(mut last) = self.last_error.lock() {
            *last = None;
        }
    }
}

async fn wait_until_idle(state_rx: &mut watch::Receiver<ScannerState>) {
    let _ = state_rx
        .wait_for(|state| *state == ScannerState::Idle)
        .await;
}

/// Forget a session whose decode loop ended on its own (lost device)
fn reap_finished_session(inner: &mut Inner) {
    let finished = inner
        .session
        .as_ref()
        .is_some_and(|session| !session.decode_loop.is_running());
    if !finished {
        return;
    }
    if let Some(mut session) = inner.session.take() {
        // The thread has exited, so this does not block
        session.decode_loop.join();
        debug!(target = %session.params.target_id, "Cleared ended scan session");
    }
}

fn next_owner(inner: &mut Inner) -> u64 {
    inner.next_owner = inner.next_owner.wrapping_add(1);
    inner.next_owner
}

/// One read-decode-route cycle on the decode thread
fn decode_iteration(state: &mut DecodeLoopState) -> LoopAction {
    match state.stream.next_frame() {
        Ok(frame) => {
            let outcome = state.decoder.decode(&frame, &state.options);
            state.router.route(outcome, Instant::now());
            LoopAction::Continue
        }
        Err(e @ BackendError::Disconnected(_)) => {
            state.router.route_frame_error(&e);
            state.state_tx.send_replace(ScannerState::Idle);
            LoopAction::Stop
        }
        Err(e) => {
            state.router.route_frame_error(&e);
            LoopAction::Continue
        }
    }
}
