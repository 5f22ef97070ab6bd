// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for scanning
//!
//! This module provides command-line functionality for:
//! - Probing camera support and listing cameras
//! - Scanning codes from a camera, once or continuously
//! - Decoding image files
//! - Validating and generating exam payloads

use exam_scanner::backends::camera::{CameraBackend, get_backend};
use exam_scanner::config::Config;
use exam_scanner::exam::{self, ValidationResult};
use exam_scanner::history::ScanHistory;
use exam_scanner::scanner::lifecycle::{InterruptFlag, LifecycleEvent};
use exam_scanner::scanner::{PermissionState, ScanEvent, ScanHandlers, Scanner, select_default};
use exam_scanner::stats::ScanStats;
use exam_scanner::{CameraBackendType, ScanConfig, ScanPreset, ScanResult, storage};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Backend selection from the global flags
pub struct BackendChoice {
    pub backend: Option<CameraBackendType>,
    pub source: Option<PathBuf>,
}

/// Flags of the scan command
pub struct ScanOptions {
    pub camera: Option<String>,
    pub continuous: bool,
    pub validate: bool,
    pub preset: Option<ScanPreset>,
    pub duration: Option<u64>,
    pub target: String,
    /// `Some(None)`: export into the default folder
    pub export: Option<Option<PathBuf>>,
}

fn open_backend(
    choice: BackendChoice,
    config: &Config,
) -> Result<Arc<dyn CameraBackend>, Box<dyn std::error::Error>> {
    let backend_type = choice.backend.unwrap_or(config.backend);
    let source = choice.source.or_else(|| config.still_source.clone());
    Ok(get_backend(backend_type, source.as_deref())?)
}

/// Report capability and permission
pub fn check(choice: BackendChoice) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load();
    let backend = open_backend(choice, &config)?;
    let scanner = Scanner::new(backend);

    let capability = scanner.capability();
    let requirements = capability.requirements();

    println!("exam-scanner {}", env!("GIT_VERSION"));
    println!();
    println!("  Camera API:      {}", yes_no(requirements.media_access));
    println!("  Trusted context: {}", yes_no(requirements.secure_origin));
    println!("  Supported:       {}", yes_no(capability.is_supported()));

    if let Some(reason) = capability.unsupported_reason() {
        println!();
        println!("Scanning is not possible: {}", reason);
        return Ok(());
    }

    let runtime = tokio::runtime::Runtime::new()?;
    let granted = runtime.block_on(scanner.request_permission());
    println!("  Permission:      {}", if granted { "granted" } else { "denied" });
    if let PermissionState::Denied(failure) = scanner.permission_state() {
        println!("  {}", failure.user_message());
    }

    Ok(())
}

/// List all available cameras
pub fn list_cameras(choice: BackendChoice) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load();
    let backend = open_backend(choice, &config)?;
    let scanner = Scanner::new(backend);

    let runtime = tokio::runtime::Runtime::new()?;
    let cameras = runtime.block_on(scanner.list_cameras());

    if cameras.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    let default_id = select_default(&cameras).map(|camera| camera.id.clone());

    println!("Available cameras:");
    println!();
    for (index, camera) in cameras.iter().enumerate() {
        let marker = if Some(&camera.id) == default_id.as_ref() {
            " (default)"
        } else {
            ""
        };
        println!("  [{}] {}{}", index, camera.label, marker);
        println!("      Id: {}", camera.id);
        if let Some(info) = &camera.device_info {
            println!("      Driver: {}", info.driver);
        }
    }

    Ok(())
}

/// Scan codes from a camera
pub fn scan(choice: BackendChoice, options: ScanOptions) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::load();
    let backend = open_backend(choice, &config)?;

    // A camera remembered from an earlier run may have been unplugged
    let scanner = match &options.camera {
        Some(camera) => Scanner::new(backend).with_preferred_device(Some(camera.clone())),
        None => Scanner::new(backend).with_remembered_device(config.last_camera_id.clone()),
    };
    let scan_config = options
        .preset
        .map(ScanConfig::preset)
        .unwrap_or_else(|| config.scan.clone());

    let history_limit = config.history_limit;
    let interrupt = InterruptFlag::install()?;
    let runtime = tokio::runtime::Runtime::new()?;

    let used_device = runtime.block_on(async {
        let single_shot = !options.continuous && options.duration.is_none();
        let outcome = if single_shot {
            scan_single(&scanner, &options, scan_config, &interrupt).await
        } else {
            scan_session(&scanner, &options, scan_config, history_limit, &interrupt).await
        };

        // Whatever happened, the camera is released before we return
        scanner.handle_lifecycle(LifecycleEvent::Teardown).await;
        outcome
    })?;

    if let Some(device) = used_device {
        config.last_camera_id = Some(device);
        if let Err(e) = config.save() {
            tracing::warn!(error = %e, "Failed to save config");
        }
    }

    Ok(())
}

async fn scan_single(
    scanner: &Scanner,
    options: &ScanOptions,
    config: ScanConfig,
    interrupt: &InterruptFlag,
) -> Result<Option<String>, Box<dyn std::error::Error>> {
    println!("Scanning... (press Ctrl+C to stop)");

    let started = Instant::now();
    let result = tokio::select! {
        result = scanner.scan_once(&options.target, config) => result?,
        _ = wait_for_interrupt(interrupt, None) => {
            println!();
            println!("Stopped.");
            return Ok(None);
        }
    };

    print_result(&result, options.validate);
    println!("Read in {} ms", started.elapsed().as_millis());
    Ok(result.device_id)
}

async fn scan_session(
    scanner: &Scanner,
    options: &ScanOptions,
    config: ScanConfig,
    history_limit: usize,
    interrupt: &InterruptFlag,
) -> Result<Option<String>, Box<dyn std::error::Error>> {
    let (handlers, mut events) = ScanHandlers::channel();

    match (&options.camera, options.continuous) {
        (_, true) => {
            scanner
                .start_continuous(&options.target, handlers, config)
                .await?
        }
        (Some(camera), false) => {
            scanner
                .start_with_device(&options.target, camera, handlers, config)
                .await?
        }
        (None, false) => scanner.start(&options.target, handlers, config).await?,
    }

    let device = scanner.active_device().await;
    if let Some(device) = &device {
        println!("Scanning with {}... (press Ctrl+C to stop)", device);
    }

    let deadline = options
        .duration
        .map(|secs| Instant::now() + Duration::from_secs(secs));
    let mut history = ScanHistory::new(history_limit);
    let mut stats = ScanStats::new();
    let mut last_read = Instant::now();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(ScanEvent::Result(result)) => {
                    stats.record(true, Some(last_read.elapsed()), result.payload.kind());
                    last_read = Instant::now();
                    print_result(&result, options.validate);

                    let mut metadata = serde_json::Map::new();
                    if let Some(device) = &result.device_id {
                        metadata.insert("device".to_string(), device.clone().into());
                    }
                    history.add(result.payload, metadata);
                }
                Some(ScanEvent::Error(e)) => {
                    stats.record(false, None, "unknown");
                    eprintln!("Scanner error: {}", e);
                }
                None => break,
            },
            _ = wait_for_interrupt(interrupt, deadline) => break,
        }
    }

    scanner.stop().await;

    println!();
    println!(
        "{} scan(s), {:.0}% successful",
        stats.total_scans,
        stats.success_rate()
    );

    if let Some(destination) = &options.export {
        let destination = destination
            .clone()
            .unwrap_or_else(storage::default_export_dir);
        let path = storage::write_history_export(&history, &destination).await?;
        println!("History saved: {}", path.display());
    }

    Ok(device)
}

/// Resolve when Ctrl+C was pressed or the deadline passed
async fn wait_for_interrupt(interrupt: &InterruptFlag, deadline: Option<Instant>) {
    loop {
        if interrupt.is_set() || deadline.is_some_and(|d| Instant::now() >= d) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

/// Decode a QR code from an image file
pub fn decode_file(path: &Path, validate: bool) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = std::fs::read(path)?;
    exam_scanner::check_upload(&bytes).map_err(exam_scanner::ScannerError::from)?;

    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(exam_scanner::decode_file(bytes))?;

    print_result(&result, validate);
    Ok(())
}

/// Validate an exam payload
pub fn validate(payload: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = exam::validate_exam_payload(payload);
    println!("{}", serde_json::to_string_pretty(&result.to_json())?);
    Ok(())
}

/// Print an exam or correction payload
pub fn generate(
    exam_id: &str,
    version: u32,
    correction: Option<(String, String)>,
) -> Result<(), Box<dyn std::error::Error>> {
    let payload = match correction {
        Some((answer_id, student)) => {
            exam::generate_correction_payload(exam_id, answer_id, &student)
        }
        None => exam::generate_exam_payload(exam_id, version),
    };
    println!("{}", payload);
    Ok(())
}

fn print_result(result: &ScanResult, validate: bool) {
    println!();
    println!("QR code: {}", result.raw_text);
    println!("  Type: {}", result.payload.kind());

    if validate {
        match exam::validate_exam_payload(&result.payload) {
            ValidationResult::Valid {
                exam_id, version, ..
            } => println!("  Exam: {} (version {})", exam_id, version),
            ValidationResult::Invalid { error, warning } => {
                let label = if warning { "Warning" } else { "Invalid" };
                println!("  {}: {}", label, error);
            }
        }
    }
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}
