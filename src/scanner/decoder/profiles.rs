// SPDX-License-Identifier: GPL-3.0-only

//! Software decoder tuning profiles
//!
//! Profiles are tried in order until one yields a symbol. Each fallback is
//! more permissive than the one before it. Thresholds are tunable.

use crate::constants::scanning;

/// How the luminance image is turned into black and white modules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binarizer {
    /// Local block averages (hybrid binarizer); best for uneven lighting
    LocalAverage,
    /// One threshold from the global luminance histogram
    GlobalHistogram,
    /// One fixed luminance threshold
    FixedThreshold(u8),
}

/// A named set of software decoder options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TuningProfile {
    pub name: &'static str,
    /// Spend more time looking for a symbol
    pub try_harder: bool,
    /// Retry with the image rotated by 90 degrees
    pub try_rotate: bool,
    /// Also look for light-on-dark symbols
    pub try_invert: bool,
    /// Shrink the raster before decoding
    pub downscale: bool,
    pub binarizer: Binarizer,
}

impl TuningProfile {
    /// First profile tried on every frame
    pub fn primary() -> Self {
        Self {
            name: "primary",
            try_harder: true,
            try_rotate: true,
            try_invert: true,
            downscale: false,
            binarizer: Binarizer::LocalAverage,
        }
    }

    /// Primary options with downscale-before-decode
    pub fn downscaled() -> Self {
        Self {
            name: "downscaled",
            downscale: true,
            ..Self::primary()
        }
    }

    pub fn global_histogram() -> Self {
        Self {
            name: "global-histogram",
            downscale: true,
            binarizer: Binarizer::GlobalHistogram,
            ..Self::primary()
        }
    }

    pub fn fixed_threshold(threshold: u8) -> Self {
        Self {
            name: "fixed-threshold",
            downscale: true,
            binarizer: Binarizer::FixedThreshold(threshold),
            ..Self::primary()
        }
    }
}

/// Profiles in the order the engine tries them
///
/// With `fallbacks` disabled only the primary profile is used.
pub fn profile_chain(fallbacks: bool, fixed_threshold: u8) -> Vec<TuningProfile> {
    let mut chain = vec![TuningProfile::primary()];
    if fallbacks {
        chain.push(TuningProfile::downscaled());
        chain.push(TuningProfile::global_histogram());
        chain.push(TuningProfile::fixed_threshold(fixed_threshold));
    }
    chain
}

/// Default chain with every fallback enabled
pub fn default_profiles() -> Vec<TuningProfile> {
    profile_chain(true, scanning::DEFAULT_FIXED_THRESHOLD)
}
