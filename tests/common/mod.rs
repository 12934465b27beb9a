// SPDX-License-Identifier: GPL-3.0-only

//! Scripted camera platform for integration tests

#![allow(dead_code)]

use kiosk_scanner::backends::camera::capture_loop::{CaptureLoopController, LoopAction};
use kiosk_scanner::backends::camera::types::*;
use kiosk_scanner::backends::camera::{CameraPlatform, VideoTrack};
use kiosk_scanner::errors::DecodeError;
use kiosk_scanner::scanner::decoder::{NativeDetector, ProfileDecoder, TuningProfile};
use kiosk_scanner::scanner::{RasterFrame, ScanEvent, Symbology};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn device(id: &str, label: &str) -> CameraDevice {
    CameraDevice::new(id, label)
}

/// Behaviour of a [`FakePlatform`]
pub struct FakeSettings {
    pub devices: Vec<CameraDevice>,
    /// Devices reported once any stream has been opened
    pub devices_after_open: Option<Vec<CameraDevice>>,
    pub enumerate_fails: bool,
    pub open_delay: Duration,
    pub open_error: Option<CameraError>,
    /// Device ids that report busy when opened
    pub busy_devices: Vec<String>,
    pub capabilities: TrackCapabilities,
    /// Reject any constraint batch with more than one hint
    pub reject_batches: bool,
    /// Hints rejected even when applied alone
    pub rejected_hints: Vec<QualityHint>,
    pub frame_period: Duration,
    pub frame_callback: bool,
    pub detector: Option<Arc<ScriptedDetector>>,
}

impl Default for FakeSettings {
    fn default() -> Self {
        Self {
            devices: vec![device("cam0", "Front Camera"), device("cam1", "USB Webcam")],
            devices_after_open: None,
            enumerate_fails: false,
            open_delay: Duration::ZERO,
            open_error: None,
            busy_devices: Vec::new(),
            capabilities: TrackCapabilities::default(),
            reject_batches: false,
            rejected_hints: Vec::new(),
            frame_period: Duration::from_millis(5),
            frame_callback: true,
            detector: None,
        }
    }
}

/// Camera platform whose devices and tracks are scripted by the test
pub struct FakePlatform {
    settings: FakeSettings,
    opened_any: Mutex<bool>,
    pub open_calls: AtomicUsize,
    pub stop_calls: Arc<AtomicUsize>,
    live_tracks: Arc<AtomicUsize>,
    pub max_live_tracks: Arc<AtomicUsize>,
    pub requests: Mutex<Vec<StreamRequest>>,
    pub applied: Arc<Mutex<Vec<Vec<QualityHint>>>>,
    slots: Mutex<Vec<Arc<FrameSlot>>>,
}

impl FakePlatform {
    pub fn new(settings: FakeSettings) -> Arc<Self> {
        Arc::new(Self {
            settings,
            opened_any: Mutex::new(false),
            open_calls: AtomicUsize::new(0),
            stop_calls: Arc::new(AtomicUsize::new(0)),
            live_tracks: Arc::new(AtomicUsize::new(0)),
            max_live_tracks: Arc::new(AtomicUsize::new(0)),
            requests: Mutex::new(Vec::new()),
            applied: Arc::new(Mutex::new(Vec::new())),
            slots: Mutex::new(Vec::new()),
        })
    }

    pub fn open_count(&self) -> usize {
        self.open_calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<StreamRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Ids of the devices requested by exact id, in order
    pub fn opened_ids(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .filter_map(|r| match r.selector {
                DeviceSelector::Exact(id) => Some(id),
                DeviceSelector::Facing(_) => None,
            })
            .collect()
    }

    /// Most tracks that were open at the same time
    pub fn max_live(&self) -> usize {
        self.max_live_tracks.load(Ordering::SeqCst)
    }

    pub fn applied(&self) -> Vec<Vec<QualityHint>> {
        self.applied.lock().unwrap().clone()
    }

    /// End the most recently opened track as if the device was unplugged
    pub fn disconnect_latest(&self) {
        if let Some(slot) = self.slots.lock().unwrap().last() {
            slot.end();
        }
    }

    fn current_devices(&self) -> Vec<CameraDevice> {
        let opened = *self.opened_any.lock().unwrap();
        match (&self.settings.devices_after_open, opened) {
            (Some(devices), true) => devices.clone(),
            _ => self.settings.devices.clone(),
        }
    }
}

impl CameraPlatform for FakePlatform {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn enumerate_devices(&self) -> CameraResult<Vec<CameraDevice>> {
        if self.settings.enumerate_fails {
            return Err(CameraError::EnumerationFailed("scripted failure".into()));
        }
        Ok(self.current_devices())
    }

    fn open_stream(&self, request: &StreamRequest) -> CameraResult<Box<dyn VideoTrack>> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        std::thread::sleep(self.settings.open_delay);

        if let Some(err) = &self.settings.open_error {
            return Err(err.clone());
        }

        let devices = self.current_devices();
        let device = match &request.selector {
            DeviceSelector::Exact(id) => devices
                .iter()
                .find(|d| &d.id == id)
                .cloned()
                .ok_or(CameraError::NoCameraAvailable)?,
            DeviceSelector::Facing(_) => devices
                .first()
                .cloned()
                .ok_or(CameraError::NoCameraAvailable)?,
        };
        if self.settings.busy_devices.contains(&device.id) {
            return Err(CameraError::Busy);
        }
        *self.opened_any.lock().unwrap() = true;
        let live = self.live_tracks.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_live_tracks.fetch_max(live, Ordering::SeqCst);

        let slot = FrameSlot::new();
        self.slots.lock().unwrap().push(Arc::clone(&slot));

        let publisher = Arc::clone(&slot);
        let period = self.settings.frame_period;
        let controller = CaptureLoopController::start("fake-capture", move || {
            publisher.publish(CameraFrame::packed(16, 16, PixelFormat::Gray8, vec![128; 256]));
            std::thread::sleep(period);
            LoopAction::Continue
        });

        Ok(Box::new(FakeTrack {
            device,
            slot,
            controller: Some(controller),
            capabilities: self.settings.capabilities.clone(),
            reject_batches: self.settings.reject_batches,
            rejected_hints: self.settings.rejected_hints.clone(),
            frame_callback: self.settings.frame_callback,
            applied: Arc::clone(&self.applied),
            stop_calls: Arc::clone(&self.stop_calls),
            live_tracks: Arc::clone(&self.live_tracks),
        }))
    }

    fn native_detector(&self) -> Option<Arc<dyn NativeDetector>> {
        self.settings
            .detector
            .as_ref()
            .map(|d| Arc::clone(d) as Arc<dyn NativeDetector>)
    }
}

pub struct FakeTrack {
    device: CameraDevice,
    slot: Arc<FrameSlot>,
    controller: Option<CaptureLoopController>,
    capabilities: TrackCapabilities,
    reject_batches: bool,
    rejected_hints: Vec<QualityHint>,
    frame_callback: bool,
    applied: Arc<Mutex<Vec<Vec<QualityHint>>>>,
    stop_calls: Arc<AtomicUsize>,
    live_tracks: Arc<AtomicUsize>,
}

impl VideoTrack for FakeTrack {
    fn device(&self) -> &CameraDevice {
        &self.device
    }

    fn settings(&self) -> TrackSettings {
        TrackSettings {
            device_id: self.device.id.clone(),
            width: 16,
            height: 16,
            framerate: None,
            pixel_format: "GREY".into(),
        }
    }

    fn capabilities(&self) -> TrackCapabilities {
        self.capabilities.clone()
    }

    fn apply_constraints(&mut self, hints: &[QualityHint]) -> CameraResult<()> {
        self.applied.lock().unwrap().push(hints.to_vec());
        if self.reject_batches && hints.len() > 1 {
            return Err(CameraError::ConstraintRejected("batch".into()));
        }
        if let Some(hint) = hints.iter().find(|h| self.rejected_hints.contains(h)) {
            return Err(CameraError::ConstraintRejected(hint.name().into()));
        }
        Ok(())
    }

    fn frame_slot(&self) -> Arc<FrameSlot> {
        Arc::clone(&self.slot)
    }

    fn supports_frame_callback(&self) -> bool {
        self.frame_callback
    }

    fn is_live(&self) -> bool {
        self.controller.is_some() && !self.slot.is_ended()
    }

    fn stop(&mut self) {
        if let Some(mut controller) = self.controller.take() {
            controller.stop();
            self.stop_calls.fetch_add(1, Ordering::SeqCst);
            self.live_tracks.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for FakeTrack {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Native detector returning scripted values and tracking concurrency
pub struct ScriptedDetector {
    script: Mutex<VecDeque<Option<String>>>,
    /// Returned once the script is exhausted
    fallback: Option<String>,
    delay: Duration,
    active: AtomicUsize,
    pub max_active: AtomicUsize,
    pub calls: AtomicUsize,
}

impl ScriptedDetector {
    pub fn new(script: Vec<Option<&str>>, fallback: Option<&str>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into_iter().map(|v| v.map(String::from)).collect()),
            fallback: fallback.map(String::from),
            delay,
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        })
    }

    /// Always returns `value`
    pub fn constant(value: &str, delay: Duration) -> Arc<Self> {
        Self::new(Vec::new(), Some(value), delay)
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

impl NativeDetector for ScriptedDetector {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn supports(&self, _symbology: Symbology) -> bool {
        true
    }

    fn detect(&self, _raster: &RasterFrame, _symbology: Symbology) -> Result<Option<String>, DecodeError> {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);

        std::thread::sleep(self.delay);
        let value = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(value)
    }
}

/// Software decoder that never finds anything
pub struct NullDecoder;

impl ProfileDecoder for NullDecoder {
    fn decode_profile(
        &self,
        _raster: &RasterFrame,
        _symbology: Symbology,
        _profile: &TuningProfile,
    ) -> Result<Option<String>, DecodeError> {
        Ok(None)
    }
}

/// Collects emitted scan events
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<ScanEvent>>>);

impl EventLog {
    pub fn callback(&self) -> impl Fn(ScanEvent) + Send + Sync + 'static {
        let events = Arc::clone(&self.0);
        move |event| events.lock().unwrap().push(event)
    }

    pub fn events(&self) -> Vec<ScanEvent> {
        self.0.lock().unwrap().clone()
    }

    pub fn values(&self) -> Vec<String> {
        self.0.lock().unwrap().iter().map(|e| e.value.clone()).collect()
    }
}
