// SPDX-License-Identifier: GPL-3.0-only

//! Scan events and loop counters

use super::decoder::{DecodedSymbol, DecoderPath, Symbology};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// A validated barcode value handed to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanEvent {
    /// Trimmed, non-empty decoded text
    pub value: String,
    pub symbology: Symbology,
    pub decoder: DecoderPath,
    /// RFC 3339 local time of emission
    pub scanned_at: String,
}

impl ScanEvent {
    pub fn from_symbol(symbol: DecodedSymbol) -> Self {
        Self {
            value: symbol.text,
            symbology: symbol.symbology,
            decoder: symbol.path,
            scanned_at: chrono::Local::now().to_rfc3339(),
        }
    }
}

/// Counters for one scanning run
#[derive(Debug, Default)]
pub struct ScanStats {
    ticks_skipped: AtomicU64,
    frames_sampled: AtomicU64,
    decode_misses: AtomicU64,
    duplicates_suppressed: AtomicU64,
    scans_emitted: AtomicU64,
}

/// Point-in-time copy of [`ScanStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanStatsSnapshot {
    pub ticks_skipped: u64,
    pub frames_sampled: u64,
    pub decode_misses: u64,
    pub duplicates_suppressed: u64,
    pub scans_emitted: u64,
}

impl ScanStats {
    pub fn record_skip(&self) {
        self.ticks_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sample(&self) {
        self.frames_sampled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.decode_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_duplicate(&self) {
        self.duplicates_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_emit(&self) {
        self.scans_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ScanStatsSnapshot {
        ScanStatsSnapshot {
            ticks_skipped: self.ticks_skipped.load(Ordering::Relaxed),
            frames_sampled: self.frames_sampled.load(Ordering::Relaxed),
            decode_misses: self.decode_misses.load(Ordering::Relaxed),
            duplicates_suppressed: self.duplicates_suppressed.load(Ordering::Relaxed),
            scans_emitted: self.scans_emitted.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.ticks_skipped,
            &self.frames_sampled,
            &self.decode_misses,
            &self.duplicates_suppressed,
            &self.scans_emitted,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}
