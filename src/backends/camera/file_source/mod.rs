// SPDX-License-Identifier: GPL-3.0-only

//! File-backed virtual camera
//!
//! Serves the still images of one directory as a single camera device,
//! cycling through them at a fixed frame period. Used for kiosk demos and
//! for running the scanner on machines without a camera.

use super::capture_loop::{CaptureLoopController, LoopAction};
use super::types::*;
use super::{CameraPlatform, VideoTrack};
use crate::constants::{file_formats, timing};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

const DEVICE_PREFIX: &str = "file:";

/// Load an image file as an RGBA frame
pub fn load_image_as_frame(path: &Path) -> CameraResult<CameraFrame> {
    debug!(path = %path.display(), "Loading image file");

    let img = image::open(path).map_err(|e| {
        CameraError::Backend(format!("Failed to load image '{}': {}", path.display(), e))
    })?;

    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(CameraFrame::packed(width, height, PixelFormat::RGBA, rgba.into_raw()))
}

/// Image files in a directory, sorted by name
pub fn list_images(dir: &Path) -> CameraResult<Vec<PathBuf>> {
    let mut images: Vec<PathBuf> = std::fs::read_dir(dir)?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .map(file_formats::is_image_extension)
                .unwrap_or(false)
        })
        .collect();
    images.sort();
    Ok(images)
}

/// Camera platform serving a directory of images
#[derive(Debug, Clone)]
pub struct FileSourcePlatform {
    dir: PathBuf,
}

impl FileSourcePlatform {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn device(&self) -> CameraDevice {
        let name = self
            .dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.dir.display().to_string());
        CameraDevice::new(
            format!("{}{}", DEVICE_PREFIX, self.dir.display()),
            format!("File source ({})", name),
        )
    }
}

impl CameraPlatform for FileSourcePlatform {
    fn name(&self) -> &'static str {
        "file"
    }

    fn enumerate_devices(&self) -> CameraResult<Vec<CameraDevice>> {
        if self.dir.is_dir() {
            Ok(vec![self.device()])
        } else {
            Ok(Vec::new())
        }
    }

    fn open_stream(&self, request: &StreamRequest) -> CameraResult<Box<dyn VideoTrack>> {
        let device = self.device();
        if let DeviceSelector::Exact(id) = &request.selector
            && *id != device.id
        {
            return Err(CameraError::NoCameraAvailable);
        }

        let mut frames = Vec::new();
        for path in list_images(&self.dir)? {
            match load_image_as_frame(&path) {
                Ok(frame) => frames.push(frame),
                Err(e) => warn!(error = %e, "Skipping unreadable image"),
            }
        }
        if frames.is_empty() {
            return Err(CameraError::NoCameraAvailable);
        }

        info!(dir = %self.dir.display(), frames = frames.len(), "Opening file source");
        Ok(Box::new(FileSourceTrack::start(device, frames)))
    }
}

/// Track that cycles through preloaded frames
pub struct FileSourceTrack {
    device: CameraDevice,
    settings: TrackSettings,
    slot: Arc<FrameSlot>,
    controller: Option<CaptureLoopController>,
}

impl FileSourceTrack {
    fn start(device: CameraDevice, frames: Vec<CameraFrame>) -> Self {
        let settings = TrackSettings {
            device_id: device.id.clone(),
            width: frames[0].width,
            height: frames[0].height,
            framerate: Some(Framerate::new(
                1000,
                timing::FILE_SOURCE_FRAME_DURATION.as_millis() as u32,
            )),
            pixel_format: "RGBA".to_string(),
        };

        let slot = FrameSlot::new();
        let thread_slot = Arc::clone(&slot);
        let mut index = 0usize;

        let controller = CaptureLoopController::start("file-source", move || {
            let mut frame = frames[index % frames.len()].clone();
            frame.captured_at = Instant::now();
            thread_slot.publish(frame);
            index = index.wrapping_add(1);
            std::thread::sleep(timing::FILE_SOURCE_FRAME_DURATION);
            LoopAction::Continue
        });

        Self {
            device,
            settings,
            slot,
            controller: Some(controller),
        }
    }
}

impl VideoTrack for FileSourceTrack {
    fn device(&self) -> &CameraDevice {
        &self.device
    }

    fn settings(&self) -> TrackSettings {
        self.settings.clone()
    }

    fn capabilities(&self) -> TrackCapabilities {
        TrackCapabilities::default()
    }

    fn apply_constraints(&mut self, hints: &[QualityHint]) -> CameraResult<()> {
        match hints.first() {
            Some(hint) => Err(CameraError::ConstraintRejected(format!(
                "{} is not supported by file sources",
                hint.name()
            ))),
            None => Ok(()),
        }
    }

    fn frame_slot(&self) -> Arc<FrameSlot> {
        Arc::clone(&self.slot)
    }

    fn supports_frame_callback(&self) -> bool {
        false
    }

    fn is_live(&self) -> bool {
        self.controller
            .as_ref()
            .map(|c| c.is_running())
            .unwrap_or(false)
    }

    fn stop(&mut self) {
        if let Some(mut controller) = self.controller.take() {
            controller.stop();
            self.slot.end();
        }
    }
}

impl Drop for FileSourceTrack {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_png(dir: &Path, name: &str, width: u32, height: u32) {
        let img = image::GrayImage::from_pixel(width, height, image::Luma([200]));
        img.save(dir.join(name)).expect("save png");
    }

    #[test]
    fn test_list_images_filters_and_sorts() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_png(dir.path(), "b.png", 2, 2);
        write_png(dir.path(), "a.png", 2, 2);
        std::fs::write(dir.path().join("notes.txt"), b"not an image").expect("write");

        let images = list_images(dir.path()).expect("list");
        let names: Vec<_> = images
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.png", "b.png"]);
    }

    #[test]
    fn test_empty_directory_has_no_camera() {
        let dir = tempfile::tempdir().expect("tempdir");
        let platform = FileSourcePlatform::new(dir.path());
        let result = platform.open_stream(&StreamRequest::for_facing(Facing::User));
        assert!(matches!(result, Err(CameraError::NoCameraAvailable)));
    }

    #[test]
    fn test_track_publishes_frames() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_png(dir.path(), "frame.png", 8, 4);
        let platform = FileSourcePlatform::new(dir.path());

        let devices = platform.enumerate_devices().expect("enumerate");
        assert_eq!(devices.len(), 1);

        let mut track = platform
            .open_stream(&StreamRequest::for_device(devices[0].id.clone()))
            .expect("open");
        std::thread::sleep(timing::FILE_SOURCE_FRAME_DURATION * 2);

        let frame = track.frame_slot().latest().expect("frame published");
        assert_eq!((frame.width, frame.height), (8, 4));
        assert!(!track.supports_frame_callback());
        assert!(track.apply_constraints(&[QualityHint::ContinuousFocus]).is_err());

        track.stop();
        assert!(!track.is_live());
    }
}
