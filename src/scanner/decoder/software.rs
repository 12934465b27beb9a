// SPDX-License-Identifier: GPL-3.0-only

//! Software barcode decoder backed by rxing

use super::profiles::{Binarizer, TuningProfile};
use super::{ProfileDecoder, Symbology};
use crate::errors::DecodeError;
use crate::scanner::sampler::RasterFrame;
use rxing::common::{GlobalHistogramBinarizer, HybridBinarizer};
use rxing::{
    BinaryBitmap, DecodeHintType, DecodeHintValue, DecodingHintDictionary, Exceptions,
    Luma8LuminanceSource, MultiFormatReader, Reader,
};
use std::collections::HashSet;
use tracing::{debug, trace};

/// Longest side a downscaling profile decodes at
const DOWNSCALE_TARGET: u32 = 800;

/// rxing-based implementation of [`ProfileDecoder`]
#[derive(Debug, Default, Clone, Copy)]
pub struct RxingDecoder;

impl RxingDecoder {
    pub fn new() -> Self {
        Self
    }
}

fn hints_for(symbology: Symbology, profile: &TuningProfile) -> DecodingHintDictionary {
    let mut hints = DecodingHintDictionary::new();
    hints.insert(
        DecodeHintType::POSSIBLE_FORMATS,
        DecodeHintValue::PossibleFormats(HashSet::from([symbology.barcode_format()])),
    );
    hints.insert(
        DecodeHintType::TRY_HARDER,
        DecodeHintValue::TryHarder(profile.try_harder),
    );
    hints.insert(
        DecodeHintType::ALSO_INVERTED,
        DecodeHintValue::AlsoInverted(profile.try_invert),
    );
    hints
}

/// Box-filter shrink by an integer factor
pub fn downscale_luma(width: u32, height: u32, luma: &[u8], factor: u32) -> (u32, u32, Vec<u8>) {
    if factor <= 1 {
        return (width, height, luma.to_vec());
    }
    let out_w = (width / factor).max(1);
    let out_h = (height / factor).max(1);
    let mut out = Vec::with_capacity(out_w as usize * out_h as usize);

    for oy in 0..out_h {
        for ox in 0..out_w {
            let mut sum = 0u32;
            let mut count = 0u32;
            for y in oy * factor..((oy + 1) * factor).min(height) {
                let row = y as usize * width as usize;
                for x in ox * factor..((ox + 1) * factor).min(width) {
                    sum += luma[row + x as usize] as u32;
                    count += 1;
                }
            }
            out.push((sum / count.max(1)) as u8);
        }
    }

    (out_w, out_h, out)
}

/// Rotate a luma image 90 degrees clockwise
pub fn rotate_luma(width: u32, height: u32, luma: &[u8]) -> (u32, u32, Vec<u8>) {
    let (w, h) = (width as usize, height as usize);
    let mut out = vec![0u8; w * h];
    for y in 0..h {
        for x in 0..w {
            // (x, y) lands at column h-1-y of row x
            out[x * h + (h - 1 - y)] = luma[y * w + x];
        }
    }
    (height, width, out)
}

fn apply_threshold(luma: &mut [u8], threshold: u8) {
    for px in luma.iter_mut() {
        *px = if *px < threshold { 0 } else { 255 };
    }
}

fn decode_luma(
    width: u32,
    height: u32,
    luma: Vec<u8>,
    binarizer: Binarizer,
    hints: &DecodingHintDictionary,
) -> Result<Option<String>, DecodeError> {
    let source = Luma8LuminanceSource::new(luma, width, height);
    let mut reader = MultiFormatReader::default();

    let result = match binarizer {
        Binarizer::LocalAverage => {
            let mut bitmap = BinaryBitmap::new(HybridBinarizer::new(source));
            reader.decode_with_hints(&mut bitmap, hints)
        }
        // A pre-thresholded image is bimodal, so the global binarizer keeps it as-is
        Binarizer::GlobalHistogram | Binarizer::FixedThreshold(_) => {
            let mut bitmap = BinaryBitmap::new(GlobalHistogramBinarizer::new(source));
            reader.decode_with_hints(&mut bitmap, hints)
        }
    };

    match result {
        Ok(found) => Ok(Some(found.getText().to_string())),
        Err(Exceptions::NotFoundException(_)) => Ok(None),
        Err(e) => Err(DecodeError::Decoder(e.to_string())),
    }
}

impl ProfileDecoder for RxingDecoder {
    fn decode_profile(
        &self,
        raster: &RasterFrame,
        symbology: Symbology,
        profile: &TuningProfile,
    ) -> Result<Option<String>, DecodeError> {
        let longest = raster.width.max(raster.height);
        let factor = if profile.downscale {
            longest.div_ceil(DOWNSCALE_TARGET)
        } else {
            1
        };
        let (width, height, mut luma) =
            downscale_luma(raster.width, raster.height, &raster.data, factor);

        if let Binarizer::FixedThreshold(threshold) = profile.binarizer {
            apply_threshold(&mut luma, threshold);
        }

        trace!(profile = profile.name, width, height, "Running software decoder");

        let hints = hints_for(symbology, profile);
        let rotated = profile
            .try_rotate
            .then(|| rotate_luma(width, height, &luma));

        let upright = decode_luma(width, height, luma, profile.binarizer, &hints);
        with_rotated_retry(
            profile.name,
            upright,
            rotated.map(|(rw, rh, rluma)| {
                move || decode_luma(rw, rh, rluma, profile.binarizer, &hints)
            }),
        )
    }
}

/// Fall back to the rotated pass unless the upright pass found a symbol
///
/// An upright decoder error is only reported when the rotated pass finds
/// nothing either.
fn with_rotated_retry<F>(
    profile: &str,
    upright: Result<Option<String>, DecodeError>,
    rotated: Option<F>,
) -> Result<Option<String>, DecodeError>
where
    F: FnOnce() -> Result<Option<String>, DecodeError>,
{
    let Some(rotated) = rotated else {
        return upright;
    };
    match upright {
        Ok(Some(text)) => Ok(Some(text)),
        Ok(None) => rotated(),
        Err(e) => {
            debug!(profile, error = %e, "Upright pass failed, trying rotated");
            match rotated() {
                Ok(None) => Err(e),
                other => other,
            }
        }
    }
}
