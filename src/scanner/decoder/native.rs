// SPDX-License-Identifier: GPL-3.0-only

//! Platform barcode detectors
//!
//! A platform may offer a faster detector for some symbologies. The engine
//! only uses it for symbologies the detector reports as supported.

use super::Symbology;
use crate::errors::DecodeError;
use crate::scanner::sampler::RasterFrame;
use tracing::trace;

/// A barcode detector offered by the camera platform
pub trait NativeDetector: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the detector can find this symbology
    fn supports(&self, symbology: Symbology) -> bool;

    /// Look for one symbol in the raster
    fn detect(&self, raster: &RasterFrame, symbology: Symbology)
    -> Result<Option<String>, DecodeError>;
}

/// QR fast path backed by rqrr
#[derive(Debug, Default, Clone, Copy)]
pub struct QrFastPath;

impl QrFastPath {
    pub fn new() -> Self {
        Self
    }
}

impl NativeDetector for QrFastPath {
    fn name(&self) -> &'static str {
        "rqrr"
    }

    fn supports(&self, symbology: Symbology) -> bool {
        symbology == Symbology::QrCode
    }

    fn detect(
        &self,
        raster: &RasterFrame,
        _symbology: Symbology,
    ) -> Result<Option<String>, DecodeError> {
        let width = raster.width as usize;
        let mut prepared =
            rqrr::PreparedImage::prepare_from_greyscale(width, raster.height as usize, |x, y| {
                raster.data[y * width + x]
            });

        let grids = prepared.detect_grids();
        trace!(grids = grids.len(), "QR grids detected");

        let mut last_error = None;
        for grid in grids {
            match grid.decode() {
                Ok((_meta, content)) => return Ok(Some(content)),
                Err(e) => last_error = Some(e),
            }
        }

        match last_error {
            Some(e) => Err(DecodeError::Decoder(e.to_string())),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rxing::{BarcodeFormat, MultiFormatWriter, Writer};

    #[test]
    fn test_supports_only_qr() {
        let detector = QrFastPath::new();
        assert!(detector.supports(Symbology::QrCode));
        assert!(!detector.supports(Symbology::Code128));
        assert!(!detector.supports(Symbology::Ean13));
    }

    #[test]
    fn test_detects_qr_code() {
        let matrix = MultiFormatWriter::default()
            .encode("STUDENT-0042", &BarcodeFormat::QR_CODE, 200, 200)
            .expect("encode qr");
        let (w, h) = (matrix.getWidth(), matrix.getHeight());
        let mut data = vec![255u8; (w * h) as usize];
        for y in 0..h {
            for x in 0..w {
                if matrix.get(x, y) {
                    data[(y * w + x) as usize] = 0;
                }
            }
        }
        let raster = RasterFrame::new(w, h, data);

        let result = QrFastPath::new()
            .detect(&raster, Symbology::QrCode)
            .expect("detect");
        assert_eq!(result.as_deref(), Some("STUDENT-0042"));
    }

    #[test]
    fn test_empty_frame_has_no_grid() {
        let raster = RasterFrame::new(32, 32, vec![255; 32 * 32]);
        assert!(matches!(
            QrFastPath::new().detect(&raster, Symbology::QrCode),
            Ok(None)
        ));
    }
}
