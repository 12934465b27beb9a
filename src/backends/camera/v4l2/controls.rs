// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 camera control interface
//!
//! Maps the continuous focus, exposure and white-balance hints onto the
//! standard V4L2 auto controls. Only controls the driver reports (and does
//! not flag disabled) are advertised as track capabilities.

use crate::backends::camera::types::{
    CameraError, CameraResult, QualityHint, QualityMode, TrackCapabilities,
};
use std::fs::File;
use std::os::unix::io::AsRawFd;
use tracing::{debug, warn};

// ===== V4L2 Control Class Bases =====
const V4L2_CTRL_CLASS_USER: u32 = 0x00980000;
const V4L2_CTRL_CLASS_CAMERA: u32 = 0x009a0000;

const V4L2_CID_BASE: u32 = V4L2_CTRL_CLASS_USER | 0x900;
const V4L2_CID_CAMERA_CLASS_BASE: u32 = V4L2_CTRL_CLASS_CAMERA | 0x900;

/// Automatic white balance (boolean)
pub const V4L2_CID_AUTO_WHITE_BALANCE: u32 = V4L2_CID_BASE + 12;
/// Exposure mode: Auto, Manual, Shutter Priority, Aperture Priority
pub const V4L2_CID_EXPOSURE_AUTO: u32 = V4L2_CID_CAMERA_CLASS_BASE + 1;
/// Continuous auto focus (boolean)
pub const V4L2_CID_FOCUS_AUTO: u32 = V4L2_CID_CAMERA_CLASS_BASE + 12;

// ===== V4L2 Exposure Auto Menu Values =====

/// Automatic exposure time and iris
pub const V4L2_EXPOSURE_AUTO: i32 = 0;
/// Manual exposure time and iris
pub const V4L2_EXPOSURE_MANUAL: i32 = 1;
/// Manual exposure time, auto iris
pub const V4L2_EXPOSURE_SHUTTER_PRIORITY: i32 = 2;
/// Auto exposure time, manual iris (what most UVC webcams call "auto")
pub const V4L2_EXPOSURE_APERTURE_PRIORITY: i32 = 3;

// ===== V4L2 Control Types =====
const V4L2_CTRL_TYPE_INTEGER: u32 = 1;
const V4L2_CTRL_TYPE_BOOLEAN: u32 = 2;
const V4L2_CTRL_TYPE_MENU: u32 = 3;

// ===== V4L2 Control Flags =====
const V4L2_CTRL_FLAG_DISABLED: u32 = 0x0001;

// ===== V4L2 ioctl Numbers =====
// (dir << 30) | (size << 16) | ('V' << 8) | nr

/// Set control value (v4l2_control: 8 bytes)
const VIDIOC_S_CTRL: libc::c_ulong = 0xC008561C;
/// Query control info (v4l2_queryctrl: 68 bytes)
const VIDIOC_QUERYCTRL: libc::c_ulong = 0xC0445624;
/// Query menu item (v4l2_querymenu: 44 bytes)
const VIDIOC_QUERYMENU: libc::c_ulong = 0xC02C5625;

#[repr(C)]
struct V4l2Control {
    id: u32,
    value: i32,
}

#[repr(C)]
struct V4l2Queryctrl {
    id: u32,
    ctrl_type: u32,
    name: [u8; 32],
    minimum: i32,
    maximum: i32,
    step: i32,
    default_value: i32,
    flags: u32,
    reserved: [u32; 2],
}

#[repr(C)]
#[repr(packed)]
struct V4l2Querymenu {
    id: u32,
    index: u32,
    name: [u8; 32],
    reserved: u32,
}

/// V4L2 control type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlType {
    Integer,
    Boolean,
    Menu,
    Unknown(u32),
}

impl From<u32> for ControlType {
    fn from(value: u32) -> Self {
        match value {
            V4L2_CTRL_TYPE_INTEGER => ControlType::Integer,
            V4L2_CTRL_TYPE_BOOLEAN => ControlType::Boolean,
            V4L2_CTRL_TYPE_MENU => ControlType::Menu,
            other => ControlType::Unknown(other),
        }
    }
}

/// Information about a V4L2 control
#[derive(Debug, Clone)]
pub struct ControlInfo {
    pub id: u32,
    pub ctrl_type: ControlType,
    pub minimum: i32,
    pub maximum: i32,
    pub flags: u32,
}

impl ControlInfo {
    pub fn is_disabled(&self) -> bool {
        self.flags & V4L2_CTRL_FLAG_DISABLED != 0
    }
}

/// Query if a control exists and get its information
pub fn query_control(device_path: &str, control_id: u32) -> Option<ControlInfo> {
    let file = File::open(device_path).ok()?;
    let fd = file.as_raw_fd();

    let mut qctrl = V4l2Queryctrl {
        id: control_id,
        ctrl_type: 0,
        name: [0; 32],
        minimum: 0,
        maximum: 0,
        step: 0,
        default_value: 0,
        flags: 0,
        reserved: [0; 2],
    };

    let result = unsafe { libc::ioctl(fd, VIDIOC_QUERYCTRL as _, &mut qctrl as *mut V4l2Queryctrl) };
    if result < 0 {
        return None;
    }

    Some(ControlInfo {
        id: qctrl.id,
        ctrl_type: qctrl.ctrl_type.into(),
        minimum: qctrl.minimum,
        maximum: qctrl.maximum,
        flags: qctrl.flags,
    })
}

/// Indices a menu control accepts between `minimum` and `maximum`
pub fn query_menu_indices(device_path: &str, control_id: u32, info: &ControlInfo) -> Vec<i32> {
    let file = match File::open(device_path) {
        Ok(f) => f,
        Err(_) => return Vec::new(),
    };
    let fd = file.as_raw_fd();

    (info.minimum.max(0)..=info.maximum)
        .filter(|&index| {
            let mut qmenu = V4l2Querymenu {
                id: control_id,
                index: index as u32,
                name: [0; 32],
                reserved: 0,
            };
            unsafe { libc::ioctl(fd, VIDIOC_QUERYMENU as _, &mut qmenu as *mut V4l2Querymenu) >= 0 }
        })
        .collect()
}

/// Set value of a control
pub fn set_control(device_path: &str, control_id: u32, value: i32) -> Result<(), String> {
    let file = File::open(device_path).map_err(|e| format!("Failed to open device: {}", e))?;
    let fd = file.as_raw_fd();

    let mut ctrl = V4l2Control {
        id: control_id,
        value,
    };

    let result = unsafe { libc::ioctl(fd, VIDIOC_S_CTRL as _, &mut ctrl as *mut V4l2Control) };
    if result < 0 {
        let errno = std::io::Error::last_os_error();
        warn!(device_path, control_id, value, ?errno, "Failed to set V4L2 control");
        return Err(format!("Failed to set control: {}", errno));
    }

    if ctrl.value != value {
        debug!(
            device_path,
            control_id,
            requested = value,
            actual = ctrl.value,
            "V4L2 control value was clamped"
        );
    }

    Ok(())
}

fn boolean_modes(info: Option<ControlInfo>) -> Vec<QualityMode> {
    match info {
        Some(info) if !info.is_disabled() => vec![QualityMode::Manual, QualityMode::Continuous],
        _ => Vec::new(),
    }
}

/// Translate the exposure-auto menu into quality modes
pub fn exposure_modes(menu: &[i32]) -> Vec<QualityMode> {
    let mut modes = Vec::new();
    if menu.contains(&V4L2_EXPOSURE_MANUAL) || menu.contains(&V4L2_EXPOSURE_SHUTTER_PRIORITY) {
        modes.push(QualityMode::Manual);
    }
    if continuous_exposure_value(menu).is_some() {
        modes.push(QualityMode::Continuous);
    }
    modes
}

/// Menu value that gives continuous auto exposure, full auto preferred
pub fn continuous_exposure_value(menu: &[i32]) -> Option<i32> {
    [V4L2_EXPOSURE_AUTO, V4L2_EXPOSURE_APERTURE_PRIORITY]
        .into_iter()
        .find(|value| menu.contains(value))
}

fn exposure_menu(device_path: &str) -> Vec<i32> {
    match query_control(device_path, V4L2_CID_EXPOSURE_AUTO) {
        Some(info) if !info.is_disabled() && info.ctrl_type == ControlType::Menu => {
            query_menu_indices(device_path, V4L2_CID_EXPOSURE_AUTO, &info)
        }
        _ => Vec::new(),
    }
}

/// Quality modes the device at `device_path` advertises
pub fn track_capabilities(device_path: &str) -> TrackCapabilities {
    TrackCapabilities {
        focus_modes: boolean_modes(query_control(device_path, V4L2_CID_FOCUS_AUTO)),
        exposure_modes: exposure_modes(&exposure_menu(device_path)),
        white_balance_modes: boolean_modes(query_control(
            device_path,
            V4L2_CID_AUTO_WHITE_BALANCE,
        )),
    }
}

/// Apply one quality hint to the device
pub fn apply_hint(device_path: &str, hint: QualityHint) -> CameraResult<()> {
    let (control_id, value) = match hint {
        QualityHint::ContinuousFocus => (V4L2_CID_FOCUS_AUTO, 1),
        QualityHint::ContinuousWhiteBalance => (V4L2_CID_AUTO_WHITE_BALANCE, 1),
        QualityHint::ContinuousExposure => {
            let value = continuous_exposure_value(&exposure_menu(device_path)).ok_or_else(|| {
                CameraError::ConstraintRejected(format!("{}: no auto mode", hint.name()))
            })?;
            (V4L2_CID_EXPOSURE_AUTO, value)
        }
    };

    set_control(device_path, control_id, value)
        .map_err(|e| CameraError::ConstraintRejected(format!("{}: {}", hint.name(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_id_values() {
        assert_eq!(V4L2_CID_EXPOSURE_AUTO, 0x009a0901);
        assert_eq!(V4L2_CID_FOCUS_AUTO, 0x009a090c);
        assert_eq!(V4L2_CID_AUTO_WHITE_BALANCE, 0x0098090c);
    }

    #[test]
    fn test_control_type_conversion() {
        assert_eq!(ControlType::from(1), ControlType::Integer);
        assert_eq!(ControlType::from(2), ControlType::Boolean);
        assert_eq!(ControlType::from(3), ControlType::Menu);
        assert_eq!(ControlType::from(99), ControlType::Unknown(99));
    }

    #[test]
    fn test_exposure_modes_from_menu() {
        // Typical UVC webcam: manual and aperture priority only
        let uvc = [V4L2_EXPOSURE_MANUAL, V4L2_EXPOSURE_APERTURE_PRIORITY];
        assert_eq!(
            exposure_modes(&uvc),
            vec![QualityMode::Manual, QualityMode::Continuous]
        );
        assert_eq!(
            continuous_exposure_value(&uvc),
            Some(V4L2_EXPOSURE_APERTURE_PRIORITY)
        );

        let manual_only = [V4L2_EXPOSURE_MANUAL];
        assert_eq!(exposure_modes(&manual_only), vec![QualityMode::Manual]);
        assert_eq!(continuous_exposure_value(&manual_only), None);
    }

    #[test]
    fn test_missing_device_has_no_capabilities() {
        let caps = track_capabilities("/dev/nonexistent-video-device");
        assert_eq!(caps, TrackCapabilities::default());
    }
}
