// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera backend abstraction

//! Shared types for camera backends

use crate::constants::camera as camera_defaults;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::Notify;

pub use crate::errors::{CameraError, CameraResult};

/// Logical camera facing, as used when no specific device is requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    /// Front camera, pointing at the person using the kiosk
    #[default]
    User,
    /// Rear camera, pointing away from the person
    Environment,
}

impl Facing {
    /// Label keywords that suggest a device has this facing
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            Facing::User => camera_defaults::USER_FACING_KEYWORDS,
            Facing::Environment => camera_defaults::ENVIRONMENT_FACING_KEYWORDS,
        }
    }

    /// Check whether a device label contains one of this facing's keywords
    pub fn matches_label(&self, label: &str) -> bool {
        let label = label.to_lowercase();
        self.keywords().iter().any(|keyword| label.contains(keyword))
    }

    /// Guess the facing of a device from its label
    pub fn from_label(label: &str) -> Option<Self> {
        [Facing::User, Facing::Environment]
            .into_iter()
            .find(|facing| facing.matches_label(label))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Facing::User => "user",
            Facing::Environment => "environment",
        }
    }
}

impl std::fmt::Display for Facing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Facing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "user" | "front" => Ok(Facing::User),
            "environment" | "rear" | "back" => Ok(Facing::Environment),
            other => Err(format!("unknown facing '{}' (expected user or environment)", other)),
        }
    }
}

/// Device information from V4L2 capability
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Name of the device (V4L2 card)
    pub card: String,
    /// Driver name (V4L2 driver)
    pub driver: String,
    /// Device path (e.g., /dev/video0)
    pub path: String,
    /// Real device path (resolved symlinks)
    pub real_path: String,
}

/// Represents a camera device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraDevice {
    /// Stable identity (device path for V4L2, `file:` URI for the virtual camera)
    pub id: String,
    /// Human-readable label; empty until the platform grants access
    pub label: String,
    /// Facing reported by the platform or guessed from the label
    pub facing: Option<Facing>,
    /// V4L2 device information (card, driver, path, real_path)
    pub device_info: Option<DeviceInfo>,
}

impl CameraDevice {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        let label = label.into();
        let facing = Facing::from_label(&label);
        Self {
            id: id.into(),
            label,
            facing,
            device_info: None,
        }
    }

    /// Whether the platform has revealed this device's label
    pub fn has_label(&self) -> bool {
        !self.label.trim().is_empty()
    }
}

impl std::fmt::Display for CameraDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.has_label() {
            write!(f, "{} ({})", self.label, self.id)
        } else {
            write!(f, "{}", self.id)
        }
    }
}

/// Framerate as a fraction (numerator/denominator)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Framerate {
    pub num: u32,
    pub denom: u32,
}

impl Framerate {
    /// Create a new framerate from numerator and denominator
    pub fn new(num: u32, denom: u32) -> Self {
        Self {
            num,
            denom: if denom == 0 { 1 } else { denom },
        }
    }

    /// Create a framerate from an integer (e.g., 30 becomes 30/1)
    pub fn from_int(fps: u32) -> Self {
        Self { num: fps, denom: 1 }
    }

    /// Get the framerate as a floating point value
    pub fn as_f64(&self) -> f64 {
        self.num as f64 / self.denom as f64
    }
}

impl std::fmt::Display for Framerate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.denom != 1 {
            write!(f, "{:.2}", self.as_f64())
        } else {
            write!(f, "{}", self.num)
        }
    }
}

/// Which device a stream request targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceSelector {
    /// A specific device by stable id
    Exact(String),
    /// Whatever device the platform considers to have this facing
    Facing(Facing),
}

/// Baseline stream constraints sent with every stream request
#[derive(Debug, Clone, PartialEq)]
pub struct StreamConstraints {
    pub min_width: u32,
    pub min_height: u32,
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub max_width: u32,
    pub max_height: u32,
    pub max_frame_rate: u32,
    pub aspect_ratio: f64,
}

impl StreamConstraints {
    /// Constraints used for every scanner stream
    pub fn baseline() -> Self {
        Self {
            min_width: camera_defaults::MIN_WIDTH,
            min_height: camera_defaults::MIN_HEIGHT,
            ideal_width: camera_defaults::IDEAL_WIDTH,
            ideal_height: camera_defaults::IDEAL_HEIGHT,
            max_width: camera_defaults::MAX_WIDTH,
            max_height: camera_defaults::MAX_HEIGHT,
            max_frame_rate: camera_defaults::MAX_FRAME_RATE,
            aspect_ratio: camera_defaults::ASPECT_RATIO,
        }
    }

    /// Check a negotiated resolution against the floor and ceiling
    pub fn accepts(&self, width: u32, height: u32) -> bool {
        width >= self.min_width
            && height >= self.min_height
            && width <= self.max_width
            && height <= self.max_height
    }
}

impl Default for StreamConstraints {
    fn default() -> Self {
        Self::baseline()
    }
}

/// A request for a live stream
#[derive(Debug, Clone, PartialEq)]
pub struct StreamRequest {
    pub selector: DeviceSelector,
    pub constraints: StreamConstraints,
}

impl StreamRequest {
    pub fn for_device(device_id: impl Into<String>) -> Self {
        Self {
            selector: DeviceSelector::Exact(device_id.into()),
            constraints: StreamConstraints::baseline(),
        }
    }

    pub fn for_facing(facing: Facing) -> Self {
        Self {
            selector: DeviceSelector::Facing(facing),
            constraints: StreamConstraints::baseline(),
        }
    }
}

/// Automatic image-quality modes a track control can be put in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QualityMode {
    Manual,
    SingleShot,
    Continuous,
}

/// Best-effort image-quality settings applied after acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QualityHint {
    ContinuousFocus,
    ContinuousExposure,
    ContinuousWhiteBalance,
}

impl QualityHint {
    pub const ALL: [QualityHint; 3] = [
        QualityHint::ContinuousFocus,
        QualityHint::ContinuousExposure,
        QualityHint::ContinuousWhiteBalance,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            QualityHint::ContinuousFocus => "focusMode",
            QualityHint::ContinuousExposure => "exposureMode",
            QualityHint::ContinuousWhiteBalance => "whiteBalanceMode",
        }
    }
}

/// Quality modes a live track advertises
///
/// An empty list means the platform does not expose that control at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackCapabilities {
    pub focus_modes: Vec<QualityMode>,
    pub exposure_modes: Vec<QualityMode>,
    pub white_balance_modes: Vec<QualityMode>,
}

impl TrackCapabilities {
    /// Check whether the track advertises support for a hint
    pub fn supports(&self, hint: QualityHint) -> bool {
        let modes = match hint {
            QualityHint::ContinuousFocus => &self.focus_modes,
            QualityHint::ContinuousExposure => &self.exposure_modes,
            QualityHint::ContinuousWhiteBalance => &self.white_balance_modes,
        };
        modes.contains(&QualityMode::Continuous)
    }

    /// Hints this track can accept, in application order
    pub fn supported_hints(&self) -> Vec<QualityHint> {
        QualityHint::ALL
            .into_iter()
            .filter(|hint| self.supports(*hint))
            .collect()
    }
}

/// Settings a track actually negotiated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackSettings {
    pub device_id: String,
    pub width: u32,
    pub height: u32,
    pub framerate: Option<Framerate>,
    /// FourCC code of the capture format (e.g., "YUYV", "MJPG")
    pub pixel_format: String,
}

impl std::fmt::Display for TrackSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.framerate {
            Some(fps) => write!(
                f,
                "{}x{} @ {}fps ({})",
                self.width, self.height, fps, self.pixel_format
            ),
            None => write!(f, "{}x{} ({})", self.width, self.height, self.pixel_format),
        }
    }
}

/// Pixel format of a camera frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// RGBA - 32-bit with alpha (4 bytes per pixel)
    RGBA,
    /// RGB24 - 24-bit RGB (3 bytes per pixel, no alpha)
    RGB24,
    /// Gray8 - 8-bit grayscale (single channel)
    /// MJPEG frames are decoded to this on the capture thread
    Gray8,
    /// YUYV - Packed 4:2:2 (Y0 U Y1 V interleaved)
    /// Common raw format from webcam sensors
    YUYV,
}

impl PixelFormat {
    /// Bytes per pixel of the packed data
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            Self::RGBA => 4,
            Self::RGB24 => 3,
            Self::Gray8 => 1,
            Self::YUYV => 2,
        }
    }
}

/// A single frame from the camera
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub width: u32,
    pub height: u32,
    pub data: Arc<[u8]>,
    /// Pixel format of the data
    pub format: PixelFormat,
    /// Row stride in bytes (may include padding)
    pub stride: u32,
    /// Monotonic frame number assigned by the track
    pub sequence: u64,
    /// Timestamp when frame was captured
    pub captured_at: Instant,
}

impl CameraFrame {
    /// Build a tightly packed frame
    pub fn packed(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            stride: width * format.bytes_per_pixel(),
            data: Arc::from(data.into_boxed_slice()),
            format,
            sequence: 0,
            captured_at: Instant::now(),
        }
    }

    /// Check that the buffer is large enough for the advertised geometry
    pub fn is_complete(&self) -> bool {
        if self.width == 0 || self.height == 0 {
            return false;
        }
        let row_bytes = (self.width * self.format.bytes_per_pixel()) as usize;
        let needed = self.stride as usize * (self.height as usize - 1) + row_bytes;
        self.stride as usize >= row_bytes && self.data.len() >= needed
    }
}

/// Latest-frame mailbox shared between a capture thread and the scanner
///
/// The capture side overwrites the slot on every frame (latest wins) and wakes
/// one waiter; nothing is queued.
#[derive(Debug, Default)]
pub struct FrameSlot {
    latest: Mutex<Option<CameraFrame>>,
    notify: Notify,
    ended: AtomicBool,
    published: AtomicU64,
}

impl FrameSlot {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Replace the current frame and signal the frame callback
    pub fn publish(&self, mut frame: CameraFrame) {
        frame.sequence = self.published.fetch_add(1, Ordering::Relaxed);
        *self
            .latest
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(frame);
        self.notify.notify_one();
    }

    /// Most recent frame, if the track has produced one yet
    pub fn latest(&self) -> Option<CameraFrame> {
        self.latest
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Wait for the next published frame
    pub async fn frame_published(&self) {
        self.notify.notified().await;
    }

    /// Number of frames published so far
    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Mark the track as ended (device unplugged, capture thread died)
    pub fn end(&self) {
        self.ended.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    pub fn is_ended(&self) -> bool {
        self.ended.load(Ordering::SeqCst)
    }
}
