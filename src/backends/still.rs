// SPDX-License-Identifier: GPL-3.0-only

//! Still image camera
//!
//! A virtual camera that replays image files as a frame stream. Each image
//! file, or each directory of images, shows up as one camera device. Useful
//! on machines without a webcam and for scanning printed sheets that were
//! already photographed.

use crate::backends::camera::types::*;
use crate::backends::camera::{CameraBackend, FrameStream};
use crate::constants::file_formats;
use crate::scanner::capability::ScannerCapability;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Device id prefix for still image sources
const STILL_PREFIX: &str = "still:";

/// Backend serving frames from image files
#[derive(Debug, Clone)]
pub struct StillImageBackend {
    sources: Vec<PathBuf>,
}

impl StillImageBackend {
    /// Create a backend with one device per source path
    pub fn new(sources: Vec<PathBuf>) -> Self {
        Self { sources }
    }

    /// Create a backend from a single file or directory
    pub fn from_path(path: &Path) -> BackendResult<Self> {
        if !path.exists() {
            return Err(BackendError::DeviceNotFound(path.display().to_string()));
        }
        Ok(Self::new(vec![path.to_path_buf()]))
    }

    fn device_for(source: &Path) -> CameraDevice {
        let label = source
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        CameraDevice::new(format!("{}{}", STILL_PREFIX, source.display()), label)
    }
}

impl CameraBackend for StillImageBackend {
    fn backend_type(&self) -> CameraBackendType {
        CameraBackendType::Still
    }

    fn capability(&self) -> ScannerCapability {
        ScannerCapability {
            has_media_access_api: true,
            is_secure_context: true,
            is_localhost: true,
        }
    }

    fn enumerate_cameras(&self) -> BackendResult<Vec<CameraDevice>> {
        Ok(self
            .sources
            .iter()
            .filter(|source| source.exists())
            .map(|source| Self::device_for(source))
            .collect())
    }

    fn open_stream(
        &self,
        request: &StreamRequest,
    ) -> Result<Box<dyn FrameStream>, CameraAccessError> {
        let source = match &request.device_id {
            Some(id) => {
                let path = id.strip_prefix(STILL_PREFIX).unwrap_or(id);
                self.sources
                    .iter()
                    .find(|source| source.as_path() == Path::new(path))
                    .ok_or(CameraAccessError::NotFound)?
            }
            None => self.sources.first().ok_or(CameraAccessError::NotFound)?,
        };

        let frames = load_frames(source)?;
        info!(
            source = %source.display(),
            frames = frames.len(),
            "Still image stream opened"
        );

        Ok(Box::new(StillFrameStream {
            device_id: Self::device_for(source).id,
            frames,
            position: 0,
        }))
    }
}

/// List the image files making up a source, sorted by name
fn image_files(source: &Path) -> Result<Vec<PathBuf>, CameraAccessError> {
    if source.is_file() {
        return Ok(vec![source.to_path_buf()]);
    }

    let entries = std::fs::read_dir(source).map_err(|e| CameraAccessError::from_io(&e))?;
    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .map(|e| file_formats::is_image_extension(&e.to_lowercase()))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    Ok(files)
}

fn load_frames(source: &Path) -> Result<Vec<CameraFrame>, CameraAccessError> {
    let mut frames = Vec::new();

    for path in image_files(source)? {
        match image::open(&path) {
            Ok(img) => {
                let luma = img.to_luma8();
                let (width, height) = luma.dimensions();
                frames.push(CameraFrame::gray(width, height, luma.into_raw()));
                debug!(path = %path.display(), width, height, "Loaded still frame");
            }
            Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable image"),
        }
    }

    if frames.is_empty() {
        return Err(CameraAccessError::NotFound);
    }
    Ok(frames)
}

/// Cycles through the loaded frames forever
struct StillFrameStream {
    device_id: String,
    frames: Vec<CameraFrame>,
    position: usize,
}

impl FrameStream for StillFrameStream {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn next_frame(&mut self) -> BackendResult<CameraFrame> {
        let frame = self
            .frames
            .get(self.position % self.frames.len().max(1))
            .cloned()
            .ok_or_else(|| BackendError::Disconnected(self.device_id.clone()))?;
        self.position = self.position.wrapping_add(1);

        Ok(CameraFrame {
            captured_at: Instant::now(),
            ..frame
        })
    }
}
