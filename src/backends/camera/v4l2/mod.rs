// SPDX-License-Identifier: GPL-3.0-only

//! Direct V4L2 capture backend
//!
//! Negotiates YUYV (falling back to MJPEG) near the ideal resolution and
//! streams memory-mapped buffers on a dedicated capture thread. YUYV frames
//! are published as-is since the Y plane is all the decoders need; MJPEG
//! frames are decoded to gray on the capture thread.

pub mod controls;
pub mod enumeration;

use super::capture_loop::{CaptureLoopController, StopSignal};
use super::format_converters::mjpeg_to_gray;
use super::types::*;
use super::{CameraPlatform, VideoTrack};
use crate::constants::{camera as camera_defaults, timing};
use crate::scanner::decoder::{NativeDetector, QrFastPath};
use std::sync::Arc;
use std::sync::mpsc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use v4l::buffer::Type;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::video::capture::Parameters;

/// Longest wait for the capture thread to bring the stream up
const STREAM_START_TIMEOUT: Duration = Duration::from_secs(5);

/// Capture formats in preference order
const PREFERRED_FOURCCS: [&[u8; 4]; 2] = [b"YUYV", b"MJPG"];

/// Camera platform backed by the kernel's V4L2 devices
#[derive(Debug, Default)]
pub struct V4l2Platform;

impl V4l2Platform {
    pub fn new() -> Self {
        Self
    }
}

impl CameraPlatform for V4l2Platform {
    fn name(&self) -> &'static str {
        "v4l2"
    }

    fn enumerate_devices(&self) -> CameraResult<Vec<CameraDevice>> {
        enumeration::enumerate_devices()
    }

    fn open_stream(&self, request: &StreamRequest) -> CameraResult<Box<dyn VideoTrack>> {
        let device = resolve_device(&request.selector)?;
        let track = V4l2Track::open(device, &request.constraints)?;
        Ok(Box::new(track))
    }

    fn native_detector(&self) -> Option<Arc<dyn NativeDetector>> {
        Some(Arc::new(QrFastPath::new()))
    }
}

/// Pick the device node for a stream request
///
/// V4L2 does not report which way a camera faces, so a facing request takes
/// the first labelled device matching the facing keywords, else the first
/// capture device.
fn resolve_device(selector: &DeviceSelector) -> CameraResult<CameraDevice> {
    match selector {
        DeviceSelector::Exact(id) => {
            let devices = enumeration::enumerate_devices().unwrap_or_default();
            Ok(devices
                .into_iter()
                .find(|d| &d.id == id)
                .unwrap_or_else(|| CameraDevice::new(id.clone(), "")))
        }
        DeviceSelector::Facing(facing) => {
            let devices = enumeration::enumerate_devices()?;
            let matched = devices.iter().position(|d| d.facing == Some(*facing));
            match matched {
                Some(index) => Ok(devices[index].clone()),
                None => devices
                    .into_iter()
                    .next()
                    .ok_or(CameraError::NoCameraAvailable),
            }
        }
    }
}

/// Negotiate a capture format within the constraints
fn negotiate_format(
    dev: &mut Device,
    constraints: &StreamConstraints,
) -> CameraResult<v4l::Format> {
    for fourcc in PREFERRED_FOURCCS {
        let fourcc = v4l::FourCC::new(fourcc);
        let mut format = dev.format()?;
        format.width = constraints.ideal_width;
        format.height = constraints.ideal_height;
        format.fourcc = fourcc;

        match dev.set_format(&format) {
            Ok(actual) if actual.fourcc == fourcc && constraints.accepts(actual.width, actual.height) => {
                info!(
                    width = actual.width,
                    height = actual.height,
                    fourcc = %actual.fourcc,
                    "Negotiated V4L2 format"
                );
                return Ok(actual);
            }
            Ok(actual) => {
                debug!(
                    requested = %fourcc,
                    got = %actual.fourcc,
                    width = actual.width,
                    height = actual.height,
                    "Driver offered a format outside the constraints"
                );
            }
            Err(e) => {
                debug!(requested = %fourcc, error = %e, "Driver refused format");
            }
        }
    }

    Err(CameraError::NegotiationFailed(format!(
        "no YUYV or MJPEG mode between {}x{} and {}x{}",
        constraints.min_width, constraints.min_height, constraints.max_width, constraints.max_height
    )))
}

/// Cap the frame rate; drivers without frame interval support keep theirs
fn negotiate_framerate(dev: &Device, max_fps: u32) -> Option<Framerate> {
    match dev.set_params(&Parameters::with_fps(max_fps)) {
        Ok(params) if params.interval.numerator > 0 => Some(Framerate::new(
            params.interval.denominator,
            params.interval.numerator,
        )),
        Ok(_) => None,
        Err(e) => {
            debug!(error = %e, "Could not set frame interval");
            None
        }
    }
}

/// Live V4L2 track
pub struct V4l2Track {
    device: CameraDevice,
    device_path: String,
    settings: TrackSettings,
    slot: Arc<FrameSlot>,
    controller: Option<CaptureLoopController>,
}

impl V4l2Track {
    fn open(device: CameraDevice, constraints: &StreamConstraints) -> CameraResult<Self> {
        let device_path = device
            .device_info
            .as_ref()
            .map(|info| info.path.clone())
            .unwrap_or_else(|| device.id.clone());

        info!(device_path = %device_path, "Opening V4L2 device");

        let mut dev = Device::with_path(&device_path)?;
        let format = negotiate_format(&mut dev, constraints)?;
        let framerate = negotiate_framerate(&dev, constraints.max_frame_rate);

        let settings = TrackSettings {
            device_id: device.id.clone(),
            width: format.width,
            height: format.height,
            framerate,
            pixel_format: format.fourcc.to_string(),
        };

        let slot = FrameSlot::new();
        let (ready_tx, ready_rx) = mpsc::channel();
        let thread_slot = Arc::clone(&slot);
        let name = format!("v4l2-capture:{}", device_path);

        let mut controller = CaptureLoopController::spawn(&name, move |stop| {
            capture_thread(dev, format, thread_slot, ready_tx, stop);
        });

        match ready_rx.recv_timeout(STREAM_START_TIMEOUT) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                controller.stop();
                return Err(e);
            }
            Err(_) => {
                controller.stop();
                return Err(CameraError::NegotiationFailed(
                    "capture stream did not start".to_string(),
                ));
            }
        }

        info!(device = %device, settings = %settings, "V4L2 stream started");

        Ok(Self {
            device,
            device_path,
            settings,
            slot,
            controller: Some(controller),
        })
    }
}

/// Body of the capture thread
///
/// The mmap stream borrows the device, so both live and die on this thread.
fn capture_thread(
    mut dev: Device,
    format: v4l::Format,
    slot: Arc<FrameSlot>,
    ready: mpsc::Sender<CameraResult<()>>,
    stop: StopSignal,
) {
    let mut stream = match MmapStream::with_buffers(
        &mut dev,
        Type::VideoCapture,
        camera_defaults::CAPTURE_BUFFERS,
    ) {
        Ok(stream) => {
            let _ = ready.send(Ok(()));
            stream
        }
        Err(e) => {
            error!(error = %e, "Failed to create V4L2 buffer stream");
            let _ = ready.send(Err(CameraError::from(e)));
            slot.end();
            return;
        }
    };

    let is_mjpeg = format.fourcc == v4l::FourCC::new(b"MJPG");
    let stride = if format.stride > 0 {
        format.stride
    } else {
        format.width * PixelFormat::YUYV.bytes_per_pixel()
    };
    let mut frame_num: u64 = 0;

    while !stop.is_set() {
        let frame_start = Instant::now();

        let (buf, meta) = match stream.next() {
            Ok(next) => next,
            Err(e) if e.raw_os_error() == Some(libc::ENODEV) => {
                warn!("V4L2 device disappeared");
                break;
            }
            Err(e) => {
                warn!(error = %e, "Failed to dequeue V4L2 buffer");
                std::thread::sleep(timing::CAPTURE_RETRY_DELAY);
                continue;
            }
        };

        let used = match meta.bytesused as usize {
            0 => buf.len(),
            n => n.min(buf.len()),
        };

        let frame = if is_mjpeg {
            match mjpeg_to_gray(&buf[..used]) {
                Ok((width, height, gray)) => CameraFrame::packed(width, height, PixelFormat::Gray8, gray),
                Err(e) => {
                    debug!(frame = frame_num, error = %e, "Dropping corrupt MJPEG frame");
                    continue;
                }
            }
        } else {
            CameraFrame {
                width: format.width,
                height: format.height,
                data: Arc::from(&buf[..used]),
                format: PixelFormat::YUYV,
                stride,
                sequence: 0,
                captured_at: frame_start,
            }
        };

        slot.publish(frame);
        frame_num += 1;

        if frame_num % timing::FRAME_LOG_INTERVAL == 0 {
            debug!(
                frame = frame_num,
                sequence = meta.sequence,
                size = used,
                elapsed_us = frame_start.elapsed().as_micros(),
                "V4L2 frame captured"
            );
        }
    }

    slot.end();
    info!(frames = frame_num, "V4L2 capture loop ended");
}

impl VideoTrack for V4l2Track {
    fn device(&self) -> &CameraDevice {
        &self.device
    }

    fn settings(&self) -> TrackSettings {
        self.settings.clone()
    }

    fn capabilities(&self) -> TrackCapabilities {
        controls::track_capabilities(&self.device_path)
    }

    fn apply_constraints(&mut self, hints: &[QualityHint]) -> CameraResult<()> {
        for hint in hints {
            controls::apply_hint(&self.device_path, *hint)?;
            debug!(device_path = %self.device_path, hint = hint.name(), "Applied quality hint");
        }
        Ok(())
    }

    fn frame_slot(&self) -> Arc<FrameSlot> {
        Arc::clone(&self.slot)
    }

    fn supports_frame_callback(&self) -> bool {
        true
    }

    fn is_live(&self) -> bool {
        self.controller
            .as_ref()
            .map(|c| c.is_running())
            .unwrap_or(false)
            && !self.slot.is_ended()
    }

    fn stop(&mut self) {
        if let Some(mut controller) = self.controller.take() {
            info!(device_path = %self.device_path, "Stopping V4L2 stream");
            controller.stop();
        }
    }
}

impl Drop for V4l2Track {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Query quality capabilities of a device without streaming from it
pub fn device_capabilities(device: &CameraDevice) -> TrackCapabilities {
    let path = device
        .device_info
        .as_ref()
        .map(|info| info.path.as_str())
        .unwrap_or(device.id.as_str());
    controls::track_capabilities(path)
}
