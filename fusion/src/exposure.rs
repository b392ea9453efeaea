//! Exposure layers consumed by the stack.
//!
//! An [`Exposure`] is one capture of the scene: a `u16` sample array plus the
//! annotations the fusion engine needs to trust or reject its data. Layers are
//! addressed in canvas coordinates; the alignment [`Offset`] maps a layer's
//! local pixel grid onto the shared canvas:
//!
//! ```text
//! canvas_x = local_x + dx
//! canvas_y = local_y + dy
//! ```
//!
//! # Saturation policy
//!
//! A sample is saturated when it reaches `saturation_threshold` (full scale of
//! the bit depth by default). The anti-halo guard used during automatic layer
//! selection treats a pixel as "saturated around" when any sample of the layer
//! inside the `(2r + 1) x (2r + 1)` square window centered on it is saturated,
//! with `r = saturation_radius` (default 1, a 3x3 window). The window is
//! clipped to the layer's own pixels.

use crate::error::StackError;
use crate::image_size::ImageSize;
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use std::ops::Add;
use std::path::{Path, PathBuf};

/// Default anti-halo neighbourhood radius in pixels
pub const DEFAULT_SATURATION_RADIUS: usize = 1;

/// Integer translation from a layer's local grid to the canvas
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Offset {
    pub dx: i32,
    pub dy: i32,
}

impl Offset {
    pub const ZERO: Offset = Offset { dx: 0, dy: 0 };

    pub fn new(dx: i32, dy: i32) -> Self {
        Self { dx, dy }
    }
}

impl Add for Offset {
    type Output = Offset;

    fn add(self, rhs: Offset) -> Offset {
        Offset::new(self.dx + rhs.dx, self.dy + rhs.dy)
    }
}

/// Capture settings used to order layers from most to least exposed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExposureInfo {
    /// Shutter time in seconds
    pub exposure_time: f64,
    /// Sensor gain as ISO speed
    pub iso: f64,
    /// Aperture f-number
    pub aperture: f64,
}

impl ExposureInfo {
    pub fn new(exposure_time: f64, iso: f64, aperture: f64) -> Self {
        Self {
            exposure_time,
            iso,
            aperture,
        }
    }

    /// Shorthand for a capture at ISO 100, f/1
    pub fn from_exposure_time(exposure_time: f64) -> Self {
        Self::new(exposure_time, 100.0, 1.0)
    }

    /// Exposure in stops relative to 1s at ISO 100, f/1. Larger is brighter.
    pub fn log_exposure(&self) -> f64 {
        (self.exposure_time * self.iso / (100.0 * self.aperture * self.aperture)).log2()
    }
}

impl Default for ExposureInfo {
    fn default() -> Self {
        Self::from_exposure_time(1.0)
    }
}

/// One aligned, saturation-annotated exposure layer
#[derive(Debug, Clone)]
pub struct Exposure {
    pixels: Array2<u16>,
    bits_per_sample: u8,
    saturation_threshold: u16,
    saturation_radius: usize,
    info: ExposureInfo,
    offset: Offset,
    relative_exposure: f64,
    source: Option<PathBuf>,
}

impl Exposure {
    /// Create a layer from raw samples
    ///
    /// # Arguments
    /// * `pixels` - Samples with shape (height, width)
    /// * `bits_per_sample` - Significant bits per sample, 1..=16
    /// * `info` - Capture settings
    ///
    /// # Errors
    /// * `StackError::InvalidBitDepth` - bit depth outside 1..=16
    /// * `StackError::EmptyFrame` - zero width or height
    pub fn new(
        pixels: Array2<u16>,
        bits_per_sample: u8,
        info: ExposureInfo,
    ) -> Result<Self, StackError> {
        if bits_per_sample == 0 || bits_per_sample > 16 {
            return Err(StackError::InvalidBitDepth(bits_per_sample));
        }
        if ImageSize::of_array(&pixels).is_empty() {
            return Err(StackError::EmptyFrame);
        }

        let full_scale = (((1u32 << bits_per_sample) - 1) as u16).max(1);
        Ok(Self {
            pixels,
            bits_per_sample,
            saturation_threshold: full_scale,
            saturation_radius: DEFAULT_SATURATION_RADIUS,
            info,
            offset: Offset::ZERO,
            relative_exposure: 1.0,
            source: None,
        })
    }

    /// Record the file this layer was decoded from
    pub fn with_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = Some(path.into());
        self
    }

    /// Override the sample value at which data counts as saturated
    pub fn with_saturation_threshold(mut self, threshold: u16) -> Self {
        self.saturation_threshold = threshold;
        self
    }

    /// Override the anti-halo neighbourhood radius
    pub fn with_saturation_radius(mut self, radius: usize) -> Self {
        self.saturation_radius = radius;
        self
    }

    /// Local dimensions of the sample grid
    pub fn size(&self) -> ImageSize {
        ImageSize::of_array(&self.pixels)
    }

    pub fn bits_per_sample(&self) -> u8 {
        self.bits_per_sample
    }

    pub fn saturation_threshold(&self) -> u16 {
        self.saturation_threshold
    }

    pub fn saturation_radius(&self) -> usize {
        self.saturation_radius
    }

    pub fn info(&self) -> &ExposureInfo {
        &self.info
    }

    pub fn log_exposure(&self) -> f64 {
        self.info.log_exposure()
    }

    pub fn offset(&self) -> Offset {
        self.offset
    }

    pub fn set_offset(&mut self, offset: Offset) {
        self.offset = offset;
    }

    /// Translate the layer on the canvas
    pub fn displace(&mut self, dx: i32, dy: i32) {
        self.offset = self.offset + Offset::new(dx, dy);
    }

    /// Multiplicative factor bringing samples into the reference radiance scale
    pub fn relative_exposure(&self) -> f64 {
        self.relative_exposure
    }

    pub fn set_relative_exposure(&mut self, factor: f64) {
        self.relative_exposure = factor;
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Raw samples in local coordinates
    pub fn pixels(&self) -> ArrayView2<'_, u16> {
        self.pixels.view()
    }

    /// Region covered on the canvas as (x0, y0, x1, y1), end-exclusive
    pub fn canvas_bounds(&self) -> (i64, i64, i64, i64) {
        let size = self.size();
        let x0 = self.offset.dx as i64;
        let y0 = self.offset.dy as i64;
        (x0, y0, x0 + size.width as i64, y0 + size.height as i64)
    }

    fn to_local(&self, x: usize, y: usize) -> Option<(usize, usize)> {
        let lx = x as i64 - self.offset.dx as i64;
        let ly = y as i64 - self.offset.dy as i64;
        let (height, width) = self.pixels.dim();
        if lx < 0 || ly < 0 || lx >= width as i64 || ly >= height as i64 {
            return None;
        }
        Some((lx as usize, ly as usize))
    }

    /// True when the canvas pixel falls inside this layer
    pub fn contains(&self, x: usize, y: usize) -> bool {
        self.to_local(x, y).is_some()
    }

    /// Raw sample at a canvas pixel
    pub fn sample(&self, x: usize, y: usize) -> Option<u16> {
        self.to_local(x, y).map(|(lx, ly)| self.pixels[[ly, lx]])
    }

    /// Sample scaled into the reference radiance scale
    pub fn exposure_at(&self, x: usize, y: usize) -> Option<f64> {
        self.sample(x, y)
            .map(|v| v as f64 * self.relative_exposure)
    }

    /// True when the sample at a canvas pixel is saturated.
    ///
    /// Pixels outside the layer are reported as not saturated; containment is
    /// a separate predicate.
    pub fn is_saturated(&self, x: usize, y: usize) -> bool {
        self.sample(x, y)
            .is_some_and(|v| v >= self.saturation_threshold)
    }

    /// True when any sample in the anti-halo window around a canvas pixel is
    /// saturated
    pub fn is_saturated_around(&self, x: usize, y: usize) -> bool {
        let Some((lx, ly)) = self.to_local(x, y) else {
            return false;
        };
        let (height, width) = self.pixels.dim();
        let r = self.saturation_radius;
        let rows = ly.saturating_sub(r)..ly.saturating_add(r).saturating_add(1).min(height);
        let cols = lx.saturating_sub(r)..lx.saturating_add(r).saturating_add(1).min(width);

        rows.into_iter().any(|row| {
            cols.clone()
                .any(|col| self.pixels[[row, col]] >= self.saturation_threshold)
        })
    }
}
