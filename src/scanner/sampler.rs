// SPDX-License-Identifier: GPL-3.0-only

//! Frame sampling
//!
//! Copies the current camera frame into a reusable luminance raster, scaled
//! so the longest side stays within the configured maximum. Scaling is
//! nearest neighbour so bar edges stay sharp.

use crate::backends::camera::format_converters::luma_at;
use crate::backends::camera::types::CameraFrame;
use std::sync::Arc;
use tracing::trace;

/// 8-bit luminance raster handed to the decoders
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RasterFrame {
    pub width: u32,
    pub height: u32,
    /// Row-major luma, `width * height` bytes
    pub data: Vec<u8>,
}

impl RasterFrame {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data,
        }
    }

    fn blank(width: u32, height: u32) -> Self {
        Self::new(width, height, vec![0; width as usize * height as usize])
    }

    /// Whether the buffer matches the advertised dimensions
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0 && self.data.len() == self.width as usize * self.height as usize
    }
}

/// Dimensions of a `width` x `height` frame scaled to fit `max_dimension`
///
/// Aspect ratio is preserved; frames already within the bound are unchanged.
pub fn scaled_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= max_dimension || longest == 0 {
        return (width, height);
    }
    let scale = |side: u32| -> u32 {
        let scaled = (side as u64 * max_dimension as u64 + longest as u64 / 2) / longest as u64;
        (scaled as u32).max(1)
    };
    (scale(width), scale(height))
}

/// Samples camera frames into a reusable raster
#[derive(Debug)]
pub struct FrameSampler {
    max_dimension: u32,
    raster: Arc<RasterFrame>,
    reallocations: u64,
}

impl FrameSampler {
    pub fn new(max_dimension: u32) -> Self {
        Self {
            max_dimension: max_dimension.max(1),
            raster: Arc::new(RasterFrame::default()),
            reallocations: 0,
        }
    }

    /// Copy `frame` into the raster
    ///
    /// Returns `None` while the track has not produced a usable frame. The
    /// returned raster is overwritten in place on the next call once the
    /// previous holder has dropped it.
    pub fn sample(&mut self, frame: Option<&CameraFrame>) -> Option<Arc<RasterFrame>> {
        let frame = frame.filter(|f| f.is_complete())?;
        let (width, height) = scaled_dimensions(frame.width, frame.height, self.max_dimension);

        if self.raster.width != width || self.raster.height != height {
            trace!(width, height, "Resizing raster target");
            self.raster = Arc::new(RasterFrame::blank(width, height));
            self.reallocations += 1;
        }

        let raster = Arc::make_mut(&mut self.raster);
        let src_width = frame.width as u64;
        let src_height = frame.height as u64;

        for y in 0..height {
            let sy = (y as u64 * src_height / height as u64) as u32;
            let row = &mut raster.data[y as usize * width as usize..(y as usize + 1) * width as usize];
            for (x, out) in row.iter_mut().enumerate() {
                let sx = (x as u64 * src_width / width as u64) as u32;
                *out = luma_at(frame, sx, sy);
            }
        }

        Some(Arc::clone(&self.raster))
    }

    /// Number of times the raster buffer was reallocated
    pub fn reallocations(&self) -> u64 {
        self.reallocations
    }

    pub fn max_dimension(&self) -> u32 {
        self.max_dimension
    }
}
