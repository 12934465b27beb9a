// SPDX-License-Identifier: GPL-3.0-only

//! Debounce filter for decoded values
//!
//! A barcode held in front of the camera decodes on every sampled frame.
//! The filter lets the first decode through and drops repeats of the same
//! value until the debounce window has passed.

use std::time::{Duration, Instant};

/// The most recently emitted value and when it was emitted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastScanRecord {
    pub value: String,
    pub admitted_at: Instant,
}

/// Suppresses repeated emission of the same value within a window
#[derive(Debug, Clone)]
pub struct DebounceFilter {
    window: Duration,
    last: Option<LastScanRecord>,
}

impl DebounceFilter {
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    /// Decide whether `value` seen at `now` should be emitted
    ///
    /// Returns false only for the last admitted value seen again before the
    /// window has elapsed. Admitting a value records it as the last scan.
    pub fn admit(&mut self, value: &str, now: Instant) -> bool {
        if let Some(last) = &self.last
            && last.value == value
            && now.saturating_duration_since(last.admitted_at) < self.window
        {
            return false;
        }

        self.last = Some(LastScanRecord {
            value: value.to_string(),
            admitted_at: now,
        });
        true
    }

    /// Forget the last scan
    pub fn reset(&mut self) {
        self.last = None;
    }

    pub fn last(&self) -> Option<&LastScanRecord> {
        self.last.as_ref()
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}
