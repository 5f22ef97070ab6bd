// SPDX-License-Identifier: GPL-3.0-only

use crate::backends::camera::CameraBackendType;
use crate::constants::history::DEFAULT_MAX_ITEMS;
use crate::errors::{ScannerError, ScannerResult};
use crate::scanner::config::ScanConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Application directory name under the platform config dir
const APP_DIR: &str = "exam-scanner";
const CONFIG_FILE: &str = "config.json";

/// Persistent scanner settings
///
/// Stored as JSON. Missing keys take their defaults, so older files keep
/// loading after new settings are added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Camera backend to use (V4L2 or still images)
    pub backend: CameraBackendType,
    /// Last used camera id
    pub last_camera_id: Option<String>,
    /// Image file or directory replayed by the still backend
    pub still_source: Option<PathBuf>,
    /// Scan settings used when no preset is requested
    pub scan: ScanConfig,
    /// Number of scans kept in history (values below one keep one)
    pub history_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: CameraBackendType::default(),
            last_camera_id: None,
            still_source: None,
            scan: ScanConfig::default(),
            history_limit: DEFAULT_MAX_ITEMS,
        }
    }
}

impl Config {
    /// Default location of the config file
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Load from the default location, falling back to defaults
    pub fn load() -> Self {
        let Some(path) = Self::path() else {
            return Self::default();
        };
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Using default config");
                Self::default()
            }
        }
    }

    /// Load from a file; a missing file gives the defaults
    pub fn load_from(path: &Path) -> ScannerResult<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| ScannerError::Config(e.to_string()))
    }

    /// Write to the default location
    pub fn save(&self) -> ScannerResult<()> {
        let path = Self::path()
            .ok_or_else(|| ScannerError::Config("no config directory".to_string()))?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> ScannerResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        debug!(path = %path.display(), "Saved config");
        Ok(())
    }
}
