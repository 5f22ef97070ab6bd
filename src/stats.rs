// SPDX-License-Identifier: GPL-3.0-only

//! Scan statistics

use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Running totals over recorded scan attempts
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanStats {
    pub total_scans: u64,
    pub successful_scans: u64,
    pub failed_scans: u64,
    /// Mean time to a successful read, in milliseconds
    pub average_scan_time: f64,
    /// Epoch milliseconds of the last recorded attempt
    pub last_scan_time: Option<i64>,
    pub scans_by_type: BTreeMap<String, u64>,
}

impl ScanStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an attempt
    ///
    /// Only successful attempts with a duration move the average.
    pub fn record(&mut self, success: bool, scan_time: Option<Duration>, kind: &str) {
        let previous_successes = self.successful_scans;

        self.total_scans += 1;
        if success {
            self.successful_scans += 1;
        } else {
            self.failed_scans += 1;
        }
        self.last_scan_time = Some(Utc::now().timestamp_millis());
        *self.scans_by_type.entry(kind.to_string()).or_insert(0) += 1;

        if let Some(scan_time) = scan_time.filter(|t| success && !t.is_zero()) {
            let total = self.average_scan_time * previous_successes as f64;
            self.average_scan_time =
                (total + scan_time.as_secs_f64() * 1000.0) / self.successful_scans as f64;
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Percentage of successful attempts, 0 when nothing was recorded
    pub fn success_rate(&self) -> f64 {
        self.rate(self.successful_scans)
    }

    pub fn failure_rate(&self) -> f64 {
        self.rate(self.failed_scans)
    }

    fn rate(&self, count: u64) -> f64 {
        if self.total_scans == 0 {
            return 0.0;
        }
        count as f64 / self.total_scans as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rates() {
        let mut stats = ScanStats::new();
        assert_eq!(stats.success_rate(), 0.0);

        stats.record(true, None, "object");
        stats.record(true, None, "text");
        stats.record(true, None, "object");
        stats.record(false, None, "unknown");

        assert_eq!(stats.total_scans, 4);
        assert_eq!(stats.success_rate(), 75.0);
        assert_eq!(stats.failure_rate(), 25.0);
        assert_eq!(stats.scans_by_type.get("object"), Some(&2));
    }

    #[test]
    fn test_average_over_successes_only() {
        let mut stats = ScanStats::new();
        stats.record(true, Some(Duration::from_millis(100)), "text");
        stats.record(false, Some(Duration::from_millis(5000)), "text");
        stats.record(true, Some(Duration::from_millis(300)), "text");
        assert!((stats.average_scan_time - 200.0).abs() < 1e-9);

        stats.reset();
        assert_eq!(stats, ScanStats::default());
    }
}
