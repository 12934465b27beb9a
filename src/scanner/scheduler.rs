// SPDX-License-Identifier: GPL-3.0-only

//! Sample scheduling
//!
//! Tracks that signal each new frame drive the loop directly. Others are
//! polled on a fixed tick at display refresh rate. The choice is made once
//! per scanning run so the loop itself never branches on the platform.

use crate::backends::camera::VideoTrack;
use crate::backends::camera::types::FrameSlot;
use crate::constants::scanning;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior};

/// When the decode loop wakes up to consider a sample
pub enum FrameScheduler {
    /// Wake on each published frame, re-checking at least every `timeout`
    FrameCallback { slot: Arc<FrameSlot>, timeout: Duration },
    /// Wake on a fixed tick
    AnimationTick(Interval),
}

impl FrameScheduler {
    /// Pick the scheduler for a track
    ///
    /// Must be called within a tokio runtime.
    pub fn choose(track: &dyn VideoTrack) -> Self {
        if track.supports_frame_callback() {
            Self::frame_callback(track.frame_slot())
        } else {
            Self::animation_tick(scanning::ANIMATION_FRAME_INTERVAL)
        }
    }

    pub fn frame_callback(slot: Arc<FrameSlot>) -> Self {
        FrameScheduler::FrameCallback {
            slot,
            timeout: scanning::FRAME_CALLBACK_TIMEOUT,
        }
    }

    pub fn animation_tick(period: Duration) -> Self {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        FrameScheduler::AnimationTick(interval)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            FrameScheduler::FrameCallback { .. } => "frame-callback",
            FrameScheduler::AnimationTick(_) => "animation-tick",
        }
    }

    /// Wait until the next sample should be considered
    pub async fn next_sample(&mut self) {
        match self {
            FrameScheduler::FrameCallback { slot, timeout } => {
                // A timeout still wakes the loop so it can notice an ended track
                let _ = tokio::time::timeout(*timeout, slot.frame_published()).await;
            }
            FrameScheduler::AnimationTick(interval) => {
                interval.tick().await;
            }
        }
    }
}
