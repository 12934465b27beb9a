// SPDX-License-Identifier: GPL-3.0-only

//! Scanner state machine
//!
//! ```text
//! idle ──start()──▶ requesting ──acquired──▶ scanning ──stop()──▶ idle
//!                        │                      │
//!                        └──failure──▶ error ◀──┘ track ended
//! ```
//!
//! While scanning, one tokio task samples frames and hands them to the decode
//! engine on the blocking pool. A single in-flight flag keeps decodes
//! serialised. Every run carries an epoch; results from an older epoch are
//! dropped, which is how `stop()` discards a decode that is still running.

pub mod acquisition;
pub mod decoder;
pub mod dedup;
pub mod event;
pub mod sampler;
pub mod scheduler;
pub mod status;

pub use acquisition::CameraHandle;
pub use decoder::{DecodeEngine, DecoderPath, DecoderStrategy, ProfileDecoder, Symbology};
pub use dedup::DebounceFilter;
pub use event::{ScanEvent, ScanStats, ScanStatsSnapshot};
pub use sampler::{FrameSampler, RasterFrame};
pub use scheduler::FrameScheduler;
pub use status::{ScannerStatus, StatusSnapshot};

use crate::backends::camera::types::{CameraError, CameraFrame, FrameSlot};
use crate::backends::camera::CameraPlatform;
use crate::config::ScannerConfig;
use crate::errors::{ScannerError, ScannerResult};
use decoder::{RxingDecoder, profile_chain};
use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Callback receiving validated scans
pub type ScanCallback = Arc<dyn Fn(ScanEvent) + Send + Sync>;

thread_local! {
    /// Scanner whose callback this thread is running, by address
    static EMITTING: Cell<usize> = const { Cell::new(0) };
}

/// Marks the current thread as inside a scanner's callback
struct EmitGuard;

impl EmitGuard {
    fn enter(shared: &Shared) -> Self {
        EMITTING.with(|e| e.set(shared as *const Shared as usize));
        EmitGuard
    }
}

impl Drop for EmitGuard {
    fn drop(&mut self) {
        EMITTING.with(|e| e.set(0));
    }
}

struct ScannerState {
    handle: Option<CameraHandle>,
    loop_task: Option<JoinHandle<()>>,
    dedup: DebounceFilter,
    /// Round-robin cursor: the device last opened or attempted
    current_device: Option<String>,
    /// A start or switch is opening a camera
    acquiring: bool,
}

struct Shared {
    config: ScannerConfig,
    platform: Arc<dyn CameraPlatform>,
    software: Arc<dyn ProfileDecoder>,
    on_scan: ScanCallback,
    status_tx: watch::Sender<StatusSnapshot>,
    state: Mutex<ScannerState>,
    /// Held while the scan callback runs so `stop()` can wait it out
    emit_lock: Mutex<()>,
    in_flight: AtomicBool,
    epoch: AtomicU64,
    stats: ScanStats,
}

/// Camera barcode scanner
///
/// Owns at most one live camera handle. All mutable state lives on the
/// instance.
pub struct Scanner {
    shared: Arc<Shared>,
}

impl Scanner {
    pub fn new(
        config: ScannerConfig,
        platform: Arc<dyn CameraPlatform>,
        on_scan: impl Fn(ScanEvent) + Send + Sync + 'static,
    ) -> Self {
        Self::with_software_decoder(config, platform, Arc::new(RxingDecoder::new()), on_scan)
    }

    /// Build a scanner around a specific software decoder
    pub fn with_software_decoder(
        config: ScannerConfig,
        platform: Arc<dyn CameraPlatform>,
        software: Arc<dyn ProfileDecoder>,
        on_scan: impl Fn(ScanEvent) + Send + Sync + 'static,
    ) -> Self {
        let (status_tx, _) = watch::channel(StatusSnapshot::default());
        let dedup = DebounceFilter::new(config.debounce_window());
        Self {
            shared: Arc::new(Shared {
                config,
                platform,
                software,
                on_scan: Arc::new(on_scan),
                status_tx,
                state: Mutex::new(ScannerState {
                    handle: None,
                    loop_task: None,
                    dedup,
                    current_device: None,
                    acquiring: false,
                }),
                emit_lock: Mutex::new(()),
                in_flight: AtomicBool::new(false),
                epoch: AtomicU64::new(0),
                stats: ScanStats::default(),
            }),
        }
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.shared.config
    }

    pub fn status(&self) -> ScannerStatus {
        self.shared.status_tx.borrow().status
    }

    pub fn error_message(&self) -> Option<String> {
        self.shared.status_tx.borrow().error_message.clone()
    }

    /// Watch status changes
    pub fn subscribe_status(&self) -> watch::Receiver<StatusSnapshot> {
        self.shared.status_tx.subscribe()
    }

    pub fn stats(&self) -> ScanStatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Most recent camera frame, for a preview surface
    pub fn latest_frame(&self) -> Option<CameraFrame> {
        let state = self.shared.lock_state();
        state.handle.as_ref().and_then(|h| h.frame_slot().latest())
    }

    /// Device currently streaming, if any
    pub fn active_device(&self) -> Option<String> {
        let state = self.shared.lock_state();
        state.handle.as_ref().map(|h| h.device().id.clone())
    }

    /// Acquire a camera and start scanning
    ///
    /// No-op while already requesting or scanning. On failure the scanner is
    /// left in `Error` with a user-facing message and the error is returned.
    pub async fn start(&self) -> ScannerResult<()> {
        let epoch = {
            let mut state = self.shared.lock_state();
            let status = self.status();
            if status.is_active() || state.acquiring {
                debug!(%status, "Start ignored, scanner already active");
                return Ok(());
            }
            state.acquiring = true;
            self.shared.set_status(StatusSnapshot::new(ScannerStatus::Requesting));
            self.shared.next_epoch()
        };

        info!(platform = self.shared.platform.name(), "Starting scanner");

        let platform = Arc::clone(&self.shared.platform);
        let label = self.shared.config.camera_label.clone();
        let facing = self.shared.config.facing;
        let result = tokio::task::spawn_blocking(move || {
            acquisition::acquire(platform.as_ref(), label.as_deref(), facing)
        })
        .await
        .unwrap_or_else(|e| Err(CameraError::Backend(format!("Acquisition task failed: {}", e))));

        match result {
            Ok(handle) => {
                Shared::begin_scanning(&self.shared, epoch, handle);
                Ok(())
            }
            Err(e) => {
                self.shared.fail_acquisition(epoch, &e);
                Err(e.into())
            }
        }
    }

    /// Stop scanning and release the camera
    ///
    /// A decode still running finishes on its own but its result is dropped.
    pub fn stop(&self) {
        let (handle, task) = {
            let mut state = self.shared.lock_state();
            self.shared.next_epoch();
            self.shared.in_flight.store(false, Ordering::SeqCst);
            state.acquiring = false;
            state.dedup.reset();
            self.shared.stats.reset();
            let previous = self.status();
            self.shared.set_status(StatusSnapshot::new(ScannerStatus::Idle));
            if previous != ScannerStatus::Idle {
                info!(%previous, "Scanner stopped");
            }
            (state.handle.take(), state.loop_task.take())
        };

        // A scan admitted before the epoch bump may still be in the callback
        self.shared.wait_for_emission();

        if let Some(task) = task {
            task.abort();
        }
        if let Some(handle) = handle {
            handle.release();
        }
    }

    /// Move to the next enumerated camera
    ///
    /// Valid while scanning or in error. The current track is released
    /// before the next one is opened; status stays `Scanning` on success.
    pub async fn switch_camera(&self) -> ScannerResult<()> {
        let (epoch, previous_device, known_devices, handle, task) = {
            let mut state = self.shared.lock_state();
            let status = self.status();
            if !status.can_switch_camera() {
                return Err(ScannerError::InvalidState(format!(
                    "cannot switch camera while {}",
                    status
                )));
            }
            if state.acquiring {
                return Err(ScannerError::InvalidState(
                    "camera acquisition already in progress".to_string(),
                ));
            }
            state.acquiring = true;
            let epoch = self.shared.next_epoch();
            self.shared.in_flight.store(false, Ordering::SeqCst);
            let handle = state.handle.take();
            let known_devices = handle
                .as_ref()
                .map(|h| h.devices().to_vec())
                .unwrap_or_default();
            (
                epoch,
                state.current_device.clone(),
                known_devices,
                handle,
                state.loop_task.take(),
            )
        };

        if let Some(task) = task {
            task.abort();
        }
        if let Some(handle) = handle {
            handle.release();
        }

        let platform = Arc::clone(&self.shared.platform);
        let (attempted, result) = tokio::task::spawn_blocking(move || {
            let devices = match platform.enumerate_devices() {
                Ok(devices) if !devices.is_empty() => devices,
                Ok(_) => known_devices,
                Err(e) => {
                    warn!(error = %e, "Enumeration failed, using last known devices");
                    known_devices
                }
            };
            let Some(next) = acquisition::next_device(&devices, previous_device.as_deref()).cloned()
            else {
                return (None, Err(CameraError::NoCameraAvailable));
            };
            info!(from = ?previous_device, to = %next, "Switching camera");
            let result = acquisition::acquire_device(platform.as_ref(), &next, devices);
            (Some(next.id), result)
        })
        .await
        .unwrap_or_else(|e| {
            (
                None,
                Err(CameraError::Backend(format!("Switch task failed: {}", e))),
            )
        });

        // The next switch moves past this device even if it failed to open
        if let Some(id) = attempted {
            self.shared.lock_state().current_device = Some(id);
        }

        match result {
            Ok(handle) => {
                Shared::begin_scanning(&self.shared, epoch, handle);
                Ok(())
            }
            Err(e) => {
                self.shared.fail_acquisition(epoch, &e);
                Err(e.into())
            }
        }
    }
}

impl Drop for Scanner {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, ScannerState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn set_status(&self, snapshot: StatusSnapshot) {
        self.status_tx.send_replace(snapshot);
    }

    fn status(&self) -> ScannerStatus {
        self.status_tx.borrow().status
    }

    fn current_epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    fn next_epoch(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Install a freshly acquired handle and spawn the decode loop
    fn begin_scanning(shared: &Arc<Self>, epoch: u64, handle: CameraHandle) {
        let mut state = shared.lock_state();
        if shared.current_epoch() != epoch {
            drop(state);
            info!("Scanner stopped during acquisition, releasing camera");
            handle.release();
            return;
        }
        state.acquiring = false;

        let strategy = DecoderStrategy::resolve(
            shared.platform.native_detector(),
            shared.config.symbology,
            shared.config.native_fast_path,
        );
        let engine = Arc::new(DecodeEngine::with_software_decoder(
            shared.config.symbology,
            strategy,
            profile_chain(shared.config.fallback_profiles, shared.config.fixed_threshold),
            Arc::clone(&shared.software),
        ));
        let scheduler = FrameScheduler::choose(handle.track());
        let slot = handle.frame_slot();

        info!(
            device = %handle.device(),
            settings = %handle.settings(),
            strategy = ?engine.strategy(),
            scheduler = scheduler.kind(),
            hints = handle.applied_hints().len(),
            "Scanning"
        );

        state.current_device = Some(handle.device().id.clone());
        state.handle = Some(handle);
        state.loop_task = Some(tokio::spawn(run_loop(
            Arc::clone(shared),
            epoch,
            engine,
            scheduler,
            slot,
        )));
        shared.set_status(StatusSnapshot::new(ScannerStatus::Scanning));
    }

    fn fail_acquisition(&self, epoch: u64, err: &CameraError) {
        let mut state = self.lock_state();
        if self.current_epoch() != epoch {
            debug!(error = %err, "Ignoring failure of a cancelled acquisition");
            return;
        }
        state.acquiring = false;
        error!(error = %err, "Camera acquisition failed");
        self.set_status(StatusSnapshot::error(err.user_message()));
    }

    /// Leave scanning for `Error` after the track died
    fn fail_run(&self, epoch: u64, err: CameraError) {
        let handle = {
            let mut state = self.lock_state();
            if self.current_epoch() != epoch {
                return;
            }
            self.next_epoch();
            self.in_flight.store(false, Ordering::SeqCst);
            error!(error = %err, "Camera track ended while scanning");
            self.set_status(StatusSnapshot::error(err.user_message()));
            state.loop_task = None;
            state.handle.take()
        };
        if let Some(handle) = handle {
            handle.release();
        }
    }

    /// Route a finished decode through the debounce filter
    fn finish_decode(&self, epoch: u64, attempt: decoder::DecodeAttempt) {
        let event = {
            let mut state = self.lock_state();
            if self.current_epoch() != epoch {
                debug!("Dropping result of a cancelled decode");
                return;
            }
            self.in_flight.store(false, Ordering::SeqCst);

            match attempt {
                None => {
                    self.stats.record_miss();
                    None
                }
                Some(_) if self.status() != ScannerStatus::Scanning => None,
                Some(symbol) => {
                    if state.dedup.admit(&symbol.text, Instant::now()) {
                        self.stats.record_emit();
                        Some(ScanEvent::from_symbol(symbol))
                    } else {
                        self.stats.record_duplicate();
                        debug!(value = %symbol.text, "Duplicate scan suppressed");
                        None
                    }
                }
            }
        };

        if let Some(event) = event {
            self.emit(epoch, event);
        }
    }

    /// Hand an admitted scan to the callback unless the run was stopped
    fn emit(&self, epoch: u64, event: ScanEvent) {
        let _emitting = self.emit_lock.lock().unwrap_or_else(|p| p.into_inner());
        if self.current_epoch() != epoch {
            debug!(value = %event.value, "Dropping scan admitted before stop");
            return;
        }
        info!(value = %event.value, decoder = %event.decoder, "Barcode scanned");
        let _guard = EmitGuard::enter(self);
        (self.on_scan)(event);
    }

    /// Block until no callback of this scanner is running
    ///
    /// Returns at once when called from inside the callback itself.
    fn wait_for_emission(&self) {
        let this = self as *const Shared as usize;
        if EMITTING.with(|e| e.get()) == this {
            return;
        }
        drop(self.emit_lock.lock().unwrap_or_else(|p| p.into_inner()));
    }
}

/// Sample/decode loop for one scanning run
async fn run_loop(
    shared: Arc<Shared>,
    epoch: u64,
    engine: Arc<DecodeEngine>,
    mut scheduler: FrameScheduler,
    slot: Arc<FrameSlot>,
) {
    let mut sampler = FrameSampler::new(shared.config.max_frame_dimension);
    let interval = shared.config.decode_interval();
    let mut last_start: Option<Instant> = None;

    loop {
        scheduler.next_sample().await;

        if shared.current_epoch() != epoch {
            break;
        }
        if slot.is_ended() {
            shared.fail_run(epoch, CameraError::Disconnected);
            break;
        }
        if shared.in_flight.load(Ordering::SeqCst)
            || last_start.is_some_and(|t| t.elapsed() < interval)
        {
            shared.stats.record_skip();
            continue;
        }

        let frame = slot.latest();
        let Some(raster) = sampler.sample(frame.as_ref()) else {
            shared.stats.record_skip();
            continue;
        };

        shared.stats.record_sample();
        shared.in_flight.store(true, Ordering::SeqCst);
        last_start = Some(Instant::now());

        let engine = Arc::clone(&engine);
        let decode_shared = Arc::clone(&shared);
        tokio::spawn(async move {
            let attempt = tokio::task::spawn_blocking(move || engine.decode(&raster))
                .await
                .unwrap_or_else(|e| {
                    warn!(error = %e, "Decode task panicked");
                    None
                });
            decode_shared.finish_decode(epoch, attempt);
        });
    }

    debug!(epoch, reallocations = sampler.reallocations(), "Decode loop exited");
}
