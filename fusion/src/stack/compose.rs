//! Radiance composition and display previews

use super::ImageStack;
use crate::error::StackError;
use crate::mask::NO_LAYER;
use crate::progress::{NoProgress, ProgressIndicator, Stage};
use image::GrayImage;
use log::debug;
use ndarray::Array2;
use rayon::prelude::*;

impl ImageStack {
    /// Composed radiance at a canvas pixel.
    ///
    /// The selected layer's raw sample scaled by its relative exposure, or 0.0
    /// where no layer covers the pixel.
    pub fn value(&self, x: usize, y: usize) -> Result<f64, StackError> {
        let index = self.image_at(x, y)?;
        Ok(self.radiance_at(x, y, index))
    }

    fn radiance_at(&self, x: usize, y: usize, index: u8) -> f64 {
        if index == NO_LAYER {
            return 0.0;
        }
        self.layers
            .get(index as usize)
            .and_then(|layer| layer.exposure_at(x, y))
            .unwrap_or(0.0)
    }

    /// Scaled sample usable for feathering: contained and not clipped
    fn blend_sample(&self, layer: usize, x: usize, y: usize) -> Option<f64> {
        let layer = &self.layers[layer];
        if layer.is_saturated(x, y) {
            return None;
        }
        layer.exposure_at(x, y)
    }

    /// Fill a row-major canvas buffer with the composed radiance
    pub fn compose(&self, dst: &mut [f32]) -> Result<(), StackError> {
        self.compose_with_progress(dst, &mut NoProgress)
    }

    /// Fill a row-major canvas buffer, reporting progress per block of rows.
    ///
    /// The result depends only on the current mask and layers. A cancelled
    /// call leaves `dst` partially written and the stack untouched.
    ///
    /// # Errors
    /// * `StackError::EmptyStack` - no layers
    /// * `StackError::BufferSize` - `dst` does not match the canvas
    /// * `StackError::Cancelled` - cancelled between row blocks
    pub fn compose_with_progress(
        &self,
        dst: &mut [f32],
        progress: &mut dyn ProgressIndicator,
    ) -> Result<(), StackError> {
        self.ensure_not_empty()?;
        let expected = self.size.pixel_count();
        if dst.len() != expected {
            return Err(StackError::BufferSize {
                expected,
                found: dst.len(),
            });
        }

        let width = self.size.width;
        let rows_per_chunk = self.config.rows_per_chunk.clamp(1, self.size.height.max(1));
        let chunks = self.size.height.div_ceil(rows_per_chunk);
        let mask = self.mask.as_slice();

        for (chunk_index, chunk) in dst.chunks_mut(rows_per_chunk * width).enumerate() {
            if progress.is_cancelled() {
                return Err(StackError::Cancelled);
            }
            let first_row = chunk_index * rows_per_chunk;
            chunk
                .par_chunks_mut(width)
                .enumerate()
                .for_each(|(r, row)| {
                    let y = first_row + r;
                    for (x, out) in row.iter_mut().enumerate() {
                        *out = self.radiance_at(x, y, mask[y * width + x]) as f32;
                    }
                });
            progress.advance(chunk_index + 1, chunks, Stage::Compose);
        }

        debug!("Composed {} canvas in {chunks} row blocks", self.size);
        Ok(())
    }

    /// Composed radiance as an owned (height, width) array
    pub fn compose_array(&self) -> Result<Array2<f32>, StackError> {
        self.compose_array_with_progress(&mut NoProgress)
    }

    fn compose_array_with_progress(
        &self,
        progress: &mut dyn ProgressIndicator,
    ) -> Result<Array2<f32>, StackError> {
        self.ensure_not_empty()?;
        let mut radiance = self.size.empty_radiance();
        match radiance.as_slice_mut() {
            Some(dst) => self.compose_with_progress(dst, progress)?,
            None => {
                let mut dst = vec![0.0; self.size.pixel_count()];
                self.compose_with_progress(&mut dst, progress)?;
                radiance.iter_mut().zip(dst).for_each(|(out, v)| *out = v);
            }
        }
        Ok(radiance)
    }

    /// Compose with seams between layers softened.
    ///
    /// The mask index map is box-blurred with the given radius and each pixel
    /// blends the two adjacent layers around its blurred index, skipping
    /// samples that are clipped. Uncovered pixels do not take part in the
    /// blur. A radius of 0 is plain `compose`.
    pub fn compose_feathered(
        &self,
        radius: usize,
        progress: &mut dyn ProgressIndicator,
    ) -> Result<Array2<f32>, StackError> {
        if radius == 0 {
            return self.compose_array_with_progress(progress);
        }
        self.ensure_not_empty()?;

        let (width, height) = self.size.to_tuple();
        // windows wider than the canvas already cover every pixel
        let radius = radius.min(width.max(height));
        let mask = self.mask.as_slice();
        let mut sums = vec![0.0f32; mask.len()];
        let mut counts = vec![0.0f32; mask.len()];
        for (i, &index) in mask.iter().enumerate() {
            if index != NO_LAYER {
                sums[i] = index as f32;
                counts[i] = 1.0;
            }
        }

        if progress.is_cancelled() {
            return Err(StackError::Cancelled);
        }
        box_blur_rows(&mut sums, width, radius);
        box_blur_rows(&mut counts, width, radius);
        progress.advance(1, 3, Stage::Compose);

        if progress.is_cancelled() {
            return Err(StackError::Cancelled);
        }
        box_blur_columns(&mut sums, width, height, radius);
        box_blur_columns(&mut counts, width, height, radius);
        progress.advance(2, 3, Stage::Compose);

        if progress.is_cancelled() {
            return Err(StackError::Cancelled);
        }
        let last = self.layers.len() - 1;
        let mut radiance = vec![0.0f32; mask.len()];
        radiance
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, out) in row.iter_mut().enumerate() {
                    let i = y * width + x;
                    if mask[i] == NO_LAYER || counts[i] <= 0.0 {
                        *out = 0.0;
                        continue;
                    }
                    let blurred = (sums[i] / counts[i]).clamp(0.0, last as f32);
                    let lower = (blurred.floor() as usize).min(last);
                    let upper = (lower + 1).min(last);
                    let t = (blurred - lower as f32) as f64;

                    let value = match (
                        self.blend_sample(lower, x, y),
                        self.blend_sample(upper, x, y),
                    ) {
                        (Some(a), Some(b)) => a * (1.0 - t) + b * t,
                        (Some(a), None) => a,
                        (None, Some(b)) => b,
                        (None, None) => self.radiance_at(x, y, mask[i]),
                    };
                    *out = value as f32;
                }
            });
        progress.advance(3, 3, Stage::Compose);

        debug!("Composed {} canvas with feather radius {radius}", self.size);
        Array2::from_shape_vec((height, width), radiance).map_err(|_| StackError::BufferSize {
            expected: width * height,
            found: mask.len(),
        })
    }

    /// Tone-mapped composite as (height, width) display bytes
    pub fn preview(&self) -> Result<Array2<u8>, StackError> {
        let radiance = self.compose_array()?;
        Ok(radiance.mapv(|v| self.tone_map(v as f64)))
    }

    /// Tone-mapped composite as an 8-bit grayscale image
    pub fn preview_image(&self) -> Result<GrayImage, StackError> {
        let preview = self.preview()?;
        let (height, width) = preview.dim();
        let (raw, _) = preview.into_raw_vec_and_offset();
        GrayImage::from_raw(width as u32, height as u32, raw).ok_or(StackError::BufferSize {
            expected: width * height,
            found: 0,
        })
    }
}

/// Mean over a clipped `2r + 1` window along each row
fn box_blur_rows(values: &mut [f32], width: usize, radius: usize) {
    values.par_chunks_mut(width).for_each(|row| {
        let source = row.to_vec();
        let mut prefix = vec![0.0f32; width + 1];
        for (i, v) in source.iter().enumerate() {
            prefix[i + 1] = prefix[i] + v;
        }
        for (x, out) in row.iter_mut().enumerate() {
            let lo = x.saturating_sub(radius);
            let hi = x.saturating_add(radius).saturating_add(1).min(width);
            *out = (prefix[hi] - prefix[lo]) / (hi - lo) as f32;
        }
    });
}

/// Mean over a clipped `2r + 1` window along each column
fn box_blur_columns(values: &mut [f32], width: usize, height: usize, radius: usize) {
    let source = values.to_vec();
    values.par_chunks_mut(width).enumerate().for_each(|(y, row)| {
        let lo = y.saturating_sub(radius);
        let hi = y.saturating_add(radius).saturating_add(1).min(height);
        let n = (hi - lo) as f32;
        for (x, out) in row.iter_mut().enumerate() {
            let sum: f32 = (lo..hi).map(|yy| source[yy * width + x]).sum();
            *out = sum / n;
        }
    });
}
