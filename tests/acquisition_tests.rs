// SPDX-License-Identifier: GPL-3.0-only

//! Camera acquisition against a scripted platform

mod common;

use common::{FakePlatform, FakeSettings, device};
use kiosk_scanner::backends::camera::CameraPlatform;
use kiosk_scanner::backends::camera::types::*;
use kiosk_scanner::scanner::acquisition::{acquire, acquire_device};
use std::sync::atomic::Ordering;
use std::time::Duration;

fn all_continuous() -> TrackCapabilities {
    TrackCapabilities {
        focus_modes: vec![QualityMode::Manual, QualityMode::Continuous],
        exposure_modes: vec![QualityMode::Manual, QualityMode::Continuous],
        white_balance_modes: vec![QualityMode::Continuous],
    }
}

#[test]
fn test_configured_label_is_opened_exactly() {
    let platform = FakePlatform::new(FakeSettings {
        devices: vec![device("cam0", "Front Camera"), device("cam1", "Kiosk Scanner Cam")],
        ..Default::default()
    });

    let handle = acquire(platform.as_ref(), Some("Kiosk Scanner Cam"), Facing::User).unwrap();

    assert_eq!(handle.device().id, "cam1");
    assert_eq!(platform.open_count(), 1);
    assert_eq!(
        platform.requests()[0].selector,
        DeviceSelector::Exact("cam1".into())
    );
    assert_eq!(handle.devices().len(), 2);
}

#[test]
fn test_keyword_heuristic_without_label() {
    let platform = FakePlatform::new(FakeSettings {
        devices: vec![device("cam0", "HD Webcam"), device("cam1", "FaceTime HD Camera")],
        ..Default::default()
    });

    let handle = acquire(platform.as_ref(), None, Facing::User).unwrap();

    assert_eq!(handle.device().id, "cam1");
    assert_eq!(
        platform.requests()[0].selector,
        DeviceSelector::Exact("cam1".into())
    );
}

#[test]
fn test_facing_request_when_nothing_matches() {
    let platform = FakePlatform::new(FakeSettings {
        devices: vec![device("cam0", "HD Webcam")],
        ..Default::default()
    });

    acquire(platform.as_ref(), Some("Missing Cam"), Facing::Environment).unwrap();

    assert_eq!(
        platform.requests()[0].selector,
        DeviceSelector::Facing(Facing::Environment)
    );
}

#[test]
fn test_throwaway_stream_unlocks_labels() {
    let platform = FakePlatform::new(FakeSettings {
        devices: vec![device("cam0", ""), device("cam1", "")],
        devices_after_open: Some(vec![
            device("cam0", "Rear Camera"),
            device("cam1", "Kiosk Scanner Cam"),
        ]),
        ..Default::default()
    });

    let handle = acquire(platform.as_ref(), Some("Kiosk Scanner Cam"), Facing::User).unwrap();

    let requests = platform.requests();
    assert_eq!(platform.open_count(), 2);
    assert_eq!(requests[0].selector, DeviceSelector::Facing(Facing::User));
    assert_eq!(requests[1].selector, DeviceSelector::Exact("cam1".into()));
    assert_eq!(handle.device().label, "Kiosk Scanner Cam");
    // Throwaway stream is released before the real one is opened
    assert_eq!(platform.stop_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_enumeration_failure_falls_back_to_facing() {
    let platform = FakePlatform::new(FakeSettings {
        enumerate_fails: true,
        ..Default::default()
    });

    let handle = acquire(platform.as_ref(), Some("Kiosk Scanner Cam"), Facing::User).unwrap();

    assert_eq!(platform.open_count(), 1);
    assert_eq!(
        platform.requests()[0].selector,
        DeviceSelector::Facing(Facing::User)
    );
    assert!(handle.devices().is_empty());
}

#[test]
fn test_open_error_propagates() {
    let platform = FakePlatform::new(FakeSettings {
        open_error: Some(CameraError::PermissionDenied("denied".into())),
        ..Default::default()
    });

    let result = acquire(platform.as_ref(), None, Facing::User);

    assert!(matches!(result, Err(CameraError::PermissionDenied(_))));
    assert_eq!(platform.open_count(), 1);
}

#[test]
fn test_unadvertised_hints_are_never_sent() {
    let platform = FakePlatform::new(FakeSettings {
        capabilities: TrackCapabilities {
            focus_modes: Vec::new(),
            exposure_modes: vec![QualityMode::Continuous],
            white_balance_modes: vec![QualityMode::Manual],
        },
        ..Default::default()
    });

    let handle = acquire(platform.as_ref(), None, Facing::User).unwrap();

    assert_eq!(handle.applied_hints(), &[QualityHint::ContinuousExposure]);
    assert!(
        platform
            .applied()
            .iter()
            .flatten()
            .all(|hint| *hint == QualityHint::ContinuousExposure)
    );
}

#[test]
fn test_no_constraints_without_capabilities() {
    let platform = FakePlatform::new(FakeSettings::default());

    let handle = acquire(platform.as_ref(), None, Facing::User).unwrap();

    assert!(handle.applied_hints().is_empty());
    assert!(platform.applied().is_empty());
}

#[test]
fn test_rejected_batch_is_retried_per_hint() {
    let platform = FakePlatform::new(FakeSettings {
        capabilities: all_continuous(),
        reject_batches: true,
        rejected_hints: vec![QualityHint::ContinuousFocus],
        ..Default::default()
    });

    let handle = acquire(platform.as_ref(), None, Facing::User).unwrap();

    assert_eq!(
        handle.applied_hints(),
        &[
            QualityHint::ContinuousExposure,
            QualityHint::ContinuousWhiteBalance
        ]
    );
    let applied = platform.applied();
    assert_eq!(applied[0].len(), 3);
    assert_eq!(applied.len(), 4);
    // Acquisition still succeeds with a live track
    assert!(handle.is_live());
}

#[test]
fn test_acquire_specific_device() {
    let platform = FakePlatform::new(FakeSettings::default());
    let devices = platform.enumerate_devices().unwrap();

    let handle = acquire_device(platform.as_ref(), &devices[1], devices.clone()).unwrap();

    assert_eq!(handle.device().id, "cam1");
    assert_eq!(
        platform.requests()[0].selector,
        DeviceSelector::Exact("cam1".into())
    );
}

#[test]
fn test_release_stops_track() {
    let platform = FakePlatform::new(FakeSettings::default());
    let handle = acquire(platform.as_ref(), None, Facing::User).unwrap();
    let slot = handle.frame_slot();

    handle.release();

    assert_eq!(platform.stop_calls.load(Ordering::SeqCst), 1);
    let published = slot.published_count();
    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(slot.published_count(), published);
}
