// SPDX-License-Identifier: GPL-3.0-only
// Camera backend with trait-based abstraction over the capture platform

//! Camera backend abstraction
//!
//! The scanner never talks to a device directly. It asks a [`CameraPlatform`]
//! for devices and streams and receives a [`VideoTrack`] it polls for frames.
//!
//! ```text
//! ┌─────────────────────┐
//! │      Scanner        │
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │ CameraPlatform Trait│  ← enumerate, open_stream, native_detector
//! └──────────┬──────────┘
//!            │
//!       ┌────┴────────┐
//!       ▼             ▼
//!   ┌──────┐   ┌────────────┐
//!   │ V4L2 │   │ File source│
//!   └──────┘   └────────────┘
//! ```

pub mod capture_loop;
pub mod file_source;
pub mod format_converters;
pub mod types;
pub mod v4l2;

pub use types::*;

use crate::scanner::decoder::NativeDetector;
use std::sync::Arc;

/// A source of camera devices and live streams
pub trait CameraPlatform: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// List video input devices
    ///
    /// Labels may be empty until the platform has granted access to at least
    /// one stream.
    fn enumerate_devices(&self) -> CameraResult<Vec<CameraDevice>>;

    /// Open a live stream for the requested device or facing
    fn open_stream(&self, request: &StreamRequest) -> CameraResult<Box<dyn VideoTrack>>;

    /// Platform barcode detector, if one exists
    fn native_detector(&self) -> Option<Arc<dyn NativeDetector>> {
        None
    }
}

/// A live video track opened by a [`CameraPlatform`]
pub trait VideoTrack: Send {
    /// Device this track was opened on
    fn device(&self) -> &CameraDevice;

    /// Settings the device actually negotiated
    fn settings(&self) -> TrackSettings;

    /// Quality modes this track advertises
    fn capabilities(&self) -> TrackCapabilities;

    /// Apply a batch of quality hints
    ///
    /// Fails with [`CameraError::ConstraintRejected`] when any hint is refused;
    /// hints applied before the failure stay applied.
    fn apply_constraints(&mut self, hints: &[QualityHint]) -> CameraResult<()>;

    /// Latest-frame slot the track publishes into
    fn frame_slot(&self) -> Arc<FrameSlot>;

    /// Whether the track signals each new frame through its slot
    fn supports_frame_callback(&self) -> bool;

    /// Whether the track is still producing frames
    fn is_live(&self) -> bool;

    /// Stop capture and release the device
    ///
    /// Idempotent. No frame is published after this returns.
    fn stop(&mut self);
}

/// Platform used when no source is configured
pub fn default_platform() -> Arc<dyn CameraPlatform> {
    Arc::new(v4l2::V4l2Platform::new())
}
