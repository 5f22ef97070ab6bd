// SPDX-License-Identifier: MPL-2.0

//! Storage utilities for scan history exports

use crate::errors::{ScannerError, ScannerResult};
use crate::history::ScanHistory;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::info;

/// Directory exports go to when no path is given
pub fn default_export_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// `qr-scan-history-<epoch millis>.json`
pub fn export_file_name(at: DateTime<Utc>) -> String {
    format!("qr-scan-history-{}.json", at.timestamp_millis())
}

/// Write a history export
///
/// `destination` may be a directory, in which case a timestamped file name
/// is used inside it.
pub async fn write_history_export(
    history: &ScanHistory,
    destination: &Path,
) -> ScannerResult<PathBuf> {
    let now = Utc::now();
    let path = if tokio::fs::metadata(destination)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
    {
        destination.join(export_file_name(now))
    } else {
        destination.to_path_buf()
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let text = serde_json::to_string_pretty(&history.export_at(now))
        .map_err(|e| ScannerError::Storage(e.to_string()))?;
    tokio::fs::write(&path, text).await?;

    info!(path = %path.display(), count = history.len(), "Exported scan history");
    Ok(path)
}
