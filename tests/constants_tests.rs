// SPDX-License-Identifier: MPL-2.0

//! Integration tests for constants module

use exam_scanner::ScanPreset;
use exam_scanner::constants::{frame_interval, file_formats};
use std::time::Duration;

#[test]
fn test_scan_preset_values() {
    assert_eq!(ScanPreset::ALL.len(), 4);
    assert_eq!(ScanPreset::default(), ScanPreset::Default);
}

#[test]
fn test_scan_preset_tuning() {
    assert_eq!(ScanPreset::Default.fps(), 10);
    assert_eq!(ScanPreset::Default.qrbox_size(), 250);
    assert_eq!(ScanPreset::Fast.fps(), 20);
    assert_eq!(ScanPreset::Fast.qrbox_size(), 200);
    assert_eq!(ScanPreset::Precise.fps(), 5);
    assert_eq!(ScanPreset::Precise.qrbox_size(), 300);
    assert_eq!(ScanPreset::Mobile.capture_size(), Some((1280, 720)));
}

#[test]
fn test_faster_presets_use_smaller_regions() {
    // Decode rate goes up as the decode region shrinks
    let mut presets = ScanPreset::ALL.to_vec();
    presets.sort_by_key(|preset| preset.fps());
    for pair in presets.windows(2) {
        assert!(pair[0].qrbox_size() >= pair[1].qrbox_size());
    }
}

#[test]
fn test_scan_preset_display_names() {
    for preset in ScanPreset::ALL {
        let name = preset.display_name();
        assert!(!name.is_empty());
        assert_eq!(name.parse::<ScanPreset>(), Ok(preset));
        assert_eq!(name.to_lowercase().parse::<ScanPreset>(), Ok(preset));
    }
    assert!("turbo".parse::<ScanPreset>().is_err());
}

#[test]
fn test_frame_interval() {
    assert_eq!(frame_interval(10), Duration::from_millis(100));
    assert_eq!(frame_interval(0), Duration::from_secs(1));
}

#[test]
fn test_image_extensions() {
    assert!(file_formats::is_image_extension("PNG"));
    assert!(file_formats::is_image_extension("jpeg"));
    assert!(!file_formats::is_image_extension("txt"));
}
