// SPDX-License-Identifier: GPL-3.0-only

//! Scanner-wide constants

use std::time::Duration;

/// Decode loop defaults
pub mod scanning {
    use super::Duration;

    /// Longest side of the raster handed to the decoders
    ///
    /// Frames above this size are downscaled (nearest neighbour) before decoding
    /// to cap per-frame decode cost.
    pub const MAX_FRAME_DIMENSION: u32 = 1920;

    /// Minimum time between two emissions of the same value
    pub const DEFAULT_DEBOUNCE_MS: u64 = 1200;

    /// Minimum time between the starts of two decode attempts (~12 per second)
    pub const DEFAULT_DECODE_INTERVAL_MS: u64 = 80;

    /// Tick used when the track cannot signal new frames (one display refresh at 60 Hz)
    pub const ANIMATION_FRAME_INTERVAL: Duration = Duration::from_millis(16);

    /// Longest wait for a frame callback before the loop re-checks the track
    pub const FRAME_CALLBACK_TIMEOUT: Duration = Duration::from_millis(250);

    /// Default threshold for the fixed-threshold binarization profile
    pub const DEFAULT_FIXED_THRESHOLD: u8 = 128;
}

/// Camera negotiation constants
pub mod camera {
    /// Resolution floor for the live stream
    pub const MIN_WIDTH: u32 = 640;
    pub const MIN_HEIGHT: u32 = 480;

    /// Resolution we ask for
    pub const IDEAL_WIDTH: u32 = 1280;
    pub const IDEAL_HEIGHT: u32 = 720;

    /// Resolution ceiling for the live stream
    pub const MAX_WIDTH: u32 = 1920;
    pub const MAX_HEIGHT: u32 = 1080;

    /// Frame rate ceiling
    pub const MAX_FRAME_RATE: u32 = 30;

    /// Preferred aspect ratio (16:9)
    pub const ASPECT_RATIO: f64 = 16.0 / 9.0;

    /// Label keywords that identify a user-facing (front) camera
    pub const USER_FACING_KEYWORDS: &[&str] = &["front", "user", "facetime", "truedepth"];

    /// Label keywords that identify an environment-facing (rear) camera
    pub const ENVIRONMENT_FACING_KEYWORDS: &[&str] = &["back", "rear", "environment", "world"];

    /// Number of mmap buffers requested from V4L2 drivers
    pub const CAPTURE_BUFFERS: u32 = 4;
}

/// Timing constants
pub mod timing {
    use super::Duration;

    /// Frame counter modulo for periodic logging
    pub const FRAME_LOG_INTERVAL: u64 = 30;

    /// Pause before retrying a failed buffer dequeue
    pub const CAPTURE_RETRY_DELAY: Duration = Duration::from_millis(10);

    /// Frame period of the file-backed virtual camera (~15fps)
    pub const FILE_SOURCE_FRAME_DURATION: Duration = Duration::from_millis(66);
}

/// Supported file formats for the file-backed virtual camera
pub mod file_formats {
    /// Supported image file extensions
    pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp"];

    /// Check if a file extension is a supported image format
    pub fn is_image_extension(ext: &str) -> bool {
        IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str())
    }
}

/// Application information utilities
pub mod app_info {
    /// Get the application version from build-time environment
    pub fn version() -> &'static str {
        env!("GIT_VERSION")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baseline_resolution_bounds_are_ordered() {
        assert!(camera::MIN_WIDTH <= camera::IDEAL_WIDTH);
        assert!(camera::IDEAL_WIDTH <= camera::MAX_WIDTH);
        assert!(camera::MIN_HEIGHT <= camera::IDEAL_HEIGHT);
        assert!(camera::IDEAL_HEIGHT <= camera::MAX_HEIGHT);
    }

    #[test]
    fn test_image_extensions() {
        assert!(file_formats::is_image_extension("PNG"));
        assert!(file_formats::is_image_extension("jpeg"));
        assert!(!file_formats::is_image_extension("mp4"));
    }
}
