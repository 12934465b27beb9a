// SPDX-License-Identifier: GPL-3.0-only

//! Camera acquisition
//!
//! Picks a device, opens a stream with the baseline constraints and applies
//! whichever continuous quality modes the live track advertises.

use crate::backends::camera::types::*;
use crate::backends::camera::{CameraPlatform, VideoTrack};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Exclusively owned live stream
pub struct CameraHandle {
    track: Box<dyn VideoTrack>,
    devices: Vec<CameraDevice>,
    applied_hints: Vec<QualityHint>,
}

impl CameraHandle {
    pub fn device(&self) -> &CameraDevice {
        self.track.device()
    }

    pub fn track(&self) -> &dyn VideoTrack {
        self.track.as_ref()
    }

    pub fn settings(&self) -> TrackSettings {
        self.track.settings()
    }

    pub fn capabilities(&self) -> TrackCapabilities {
        self.track.capabilities()
    }

    /// Quality hints the platform accepted
    pub fn applied_hints(&self) -> &[QualityHint] {
        &self.applied_hints
    }

    /// Devices known when this handle was acquired
    pub fn devices(&self) -> &[CameraDevice] {
        &self.devices
    }

    pub fn frame_slot(&self) -> Arc<FrameSlot> {
        self.track.frame_slot()
    }

    pub fn is_live(&self) -> bool {
        self.track.is_live()
    }

    /// Stop the track and release the device
    pub fn release(mut self) {
        info!(device = %self.track.device(), "Releasing camera");
        self.track.stop();
    }
}

impl Drop for CameraHandle {
    fn drop(&mut self) {
        self.track.stop();
    }
}

/// Choose what to ask the platform for
///
/// In priority order: a device whose label equals `camera_label`, then the
/// first device whose label carries one of the facing's keywords, then the
/// logical facing with no specific device.
pub fn select_device(
    devices: &[CameraDevice],
    camera_label: Option<&str>,
    facing: Facing,
) -> DeviceSelector {
    if let Some(label) = camera_label.map(str::trim).filter(|l| !l.is_empty())
        && let Some(device) = devices.iter().find(|d| d.label.trim() == label)
    {
        info!(device = %device, "Selected camera by exact label");
        return DeviceSelector::Exact(device.id.clone());
    }

    if let Some(device) = devices.iter().find(|d| facing.matches_label(&d.label)) {
        info!(device = %device, %facing, "Selected camera by label keyword");
        return DeviceSelector::Exact(device.id.clone());
    }

    info!(%facing, "No matching camera label, requesting by facing");
    DeviceSelector::Facing(facing)
}

/// Next device after `current_id`, wrapping around
pub fn next_device<'a>(devices: &'a [CameraDevice], current_id: Option<&str>) -> Option<&'a CameraDevice> {
    if devices.is_empty() {
        return None;
    }
    let next = current_id
        .and_then(|id| devices.iter().position(|d| d.id == id))
        .map(|index| (index + 1) % devices.len())
        .unwrap_or(0);
    devices.get(next)
}

/// Apply the continuous quality modes the track advertises
///
/// Hints the track does not advertise are never sent. If the platform
/// rejects the batch, each hint is retried alone and rejected ones are
/// dropped. Returns the hints that were applied.
pub fn apply_quality_hints(track: &mut dyn VideoTrack) -> Vec<QualityHint> {
    let hints = track.capabilities().supported_hints();
    if hints.is_empty() {
        debug!("Track advertises no continuous quality modes");
        return hints;
    }

    match track.apply_constraints(&hints) {
        Ok(()) => {
            debug!(count = hints.len(), "Applied quality hints");
            hints
        }
        Err(e) => {
            warn!(error = %e, "Quality hints rejected, retrying individually");
            hints
                .into_iter()
                .filter(|hint| match track.apply_constraints(&[*hint]) {
                    Ok(()) => true,
                    Err(e) => {
                        debug!(hint = hint.name(), error = %e, "Omitting quality hint");
                        false
                    }
                })
                .collect()
        }
    }
}

fn enumerate(platform: &dyn CameraPlatform) -> Option<Vec<CameraDevice>> {
    match platform.enumerate_devices() {
        Ok(devices) => Some(devices),
        Err(e) => {
            warn!(platform = platform.name(), error = %e, "Device enumeration failed");
            None
        }
    }
}

fn needs_label_unlock(devices: &[CameraDevice]) -> bool {
    !devices.is_empty() && devices.iter().all(|d| !d.has_label())
}

fn open(
    platform: &dyn CameraPlatform,
    request: StreamRequest,
    devices: Vec<CameraDevice>,
) -> CameraResult<CameraHandle> {
    let mut track = platform.open_stream(&request)?;
    info!(device = %track.device(), settings = %track.settings(), "Camera acquired");
    let applied_hints = apply_quality_hints(track.as_mut());
    Ok(CameraHandle {
        track,
        devices,
        applied_hints,
    })
}

/// Acquire a camera for scanning
pub fn acquire(
    platform: &dyn CameraPlatform,
    camera_label: Option<&str>,
    facing: Facing,
) -> CameraResult<CameraHandle> {
    let mut devices = enumerate(platform);

    if devices.as_deref().is_some_and(needs_label_unlock) {
        info!("Device labels withheld, opening a throwaway stream");
        let mut unlock = platform.open_stream(&StreamRequest::for_facing(facing))?;
        unlock.stop();
        drop(unlock);
        devices = enumerate(platform);
    }

    let selector = match &devices {
        Some(devices) => select_device(devices, camera_label, facing),
        None => DeviceSelector::Facing(facing),
    };

    let request = StreamRequest {
        selector,
        constraints: StreamConstraints::baseline(),
    };
    open(platform, request, devices.unwrap_or_default())
}

/// Acquire a specific device
pub fn acquire_device(
    platform: &dyn CameraPlatform,
    device: &CameraDevice,
    devices: Vec<CameraDevice>,
) -> CameraResult<CameraHandle> {
    info!(device = %device, "Acquiring camera");
    open(platform, StreamRequest::for_device(device.id.clone()), devices)
}
