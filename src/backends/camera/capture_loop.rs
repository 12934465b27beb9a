// SPDX-License-Identifier: GPL-3.0-only
//! Thread lifecycle management for camera capture threads
//!
//! Every live track owns exactly one capture thread. The controller hands the
//! thread a stop flag and guarantees the thread is joined before the track
//! reports itself stopped, so no frame is published after `stop()` returns.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Action returned by a per-iteration capture callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    /// Keep capturing
    Continue,
    /// Leave the loop (end of stream, unrecoverable device error)
    Stop,
}

/// Stop flag shared between a controller and its capture thread
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Controller for a capture thread
pub struct CaptureLoopController {
    thread_handle: Option<JoinHandle<()>>,
    stop_signal: StopSignal,
    name: String,
}

impl CaptureLoopController {
    /// Run `loop_fn` repeatedly on a new thread until it returns
    /// `LoopAction::Stop` or the controller is stopped
    pub fn start<F>(name: &str, mut loop_fn: F) -> Self
    where
        F: FnMut() -> LoopAction + Send + 'static,
    {
        Self::spawn(name, move |stop| {
            while !stop.is_set() {
                if loop_fn() == LoopAction::Stop {
                    break;
                }
            }
        })
    }

    /// Run `body` once on a new thread, handing it the stop signal
    ///
    /// Used when the thread must own resources that cannot leave it, such as
    /// a memory-mapped V4L2 stream.
    pub fn spawn<F>(name: &str, body: F) -> Self
    where
        F: FnOnce(StopSignal) + Send + 'static,
    {
        let stop_signal = StopSignal::default();
        let thread_signal = stop_signal.clone();
        let thread_name = name.to_string();

        info!(name = %name, "Starting capture thread");

        let thread_handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                debug!(name = %thread_name, "Capture thread started");
                body(thread_signal);
                info!(name = %thread_name, "Capture thread exiting");
            });

        let thread_handle = match thread_handle {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!(name = %name, error = %e, "Failed to spawn capture thread");
                None
            }
        };

        Self {
            thread_handle,
            stop_signal,
            name: name.to_string(),
        }
    }

    /// Check if the thread is still running
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Signal the thread to stop without waiting
    pub fn request_stop(&self) {
        debug!(name = %self.name, "Requesting capture thread stop");
        self.stop_signal.set();
    }

    /// Stop the thread and wait for it to finish
    pub fn stop(&mut self) {
        self.request_stop();
        self.join();
    }

    /// Wait for the thread to finish without sending the stop signal
    pub fn join(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            if let Err(e) = handle.join() {
                warn!(name = %self.name, "Capture thread panicked: {:?}", e);
            } else {
                debug!(name = %self.name, "Capture thread finished");
            }
        }
    }
}

impl Drop for CaptureLoopController {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            self.stop();
        }
    }
}
