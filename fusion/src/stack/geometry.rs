//! Alignment and cropping

use super::ImageStack;
use crate::align::Aligner;
use crate::area::Area;
use crate::error::{StackError, StackWarning};
use crate::exposure::Offset;
use crate::image_size::ImageSize;
use crate::progress::{ProgressIndicator, Stage};
use log::{debug, info, warn};

impl ImageStack {
    /// Register every layer against its brighter neighbour.
    ///
    /// Offsets are chained from layer 0, which stays at the origin, and the
    /// canvas returns to layer 0's full frame, undoing any earlier crop. A pair
    /// the aligner cannot register is left at zero relative offset and
    /// reported as a warning. Nothing is applied if the operation is cancelled.
    ///
    /// # Errors
    /// * `StackError::EmptyStack` - no layers
    /// * `StackError::Cancelled` - cancelled between pairs; offsets unchanged
    pub fn align(
        &mut self,
        aligner: &dyn Aligner,
        progress: &mut dyn ProgressIndicator,
    ) -> Result<Vec<StackWarning>, StackError> {
        self.ensure_not_empty()?;

        let pairs = self.layers.len() - 1;
        let mut offsets = vec![Offset::ZERO; self.layers.len()];
        let mut warnings = Vec::new();

        for i in 1..self.layers.len() {
            if progress.is_cancelled() {
                return Err(StackError::Cancelled);
            }

            let relative = match aligner.estimate_offset(&self.layers[i - 1], &self.layers[i]) {
                Ok(offset) => offset,
                Err(e) => {
                    warn!("Could not align layer {i} against layer {}: {e}", i - 1);
                    warnings.push(StackWarning::AlignmentFailed {
                        reference: i - 1,
                        moving: i,
                        reason: e.to_string(),
                    });
                    Offset::ZERO
                }
            };
            offsets[i] = offsets[i - 1] + relative;
            debug!("Layer {i} offset {:?} (pair {:?})", offsets[i], relative);
            progress.advance(i, pairs, Stage::Align);
        }

        if progress.is_cancelled() {
            return Err(StackError::Cancelled);
        }

        for (layer, offset) in self.layers.iter_mut().zip(offsets) {
            layer.set_offset(offset);
        }
        self.size = self.layers[0].size();
        info!(
            "Aligned {} layers with {} failed pairs",
            self.layers.len(),
            warnings.len()
        );

        self.generate_mask()?;
        Ok(warnings)
    }

    /// Shrink the canvas to the region every layer covers.
    ///
    /// Layers are shifted so the common region starts at the origin. Returns
    /// the kept rectangle in the canvas coordinates from before the crop.
    /// Calling it again without changes keeps the same canvas and offsets.
    ///
    /// # Errors
    /// * `StackError::EmptyStack` - no layers
    /// * `StackError::EmptyIntersection` - layers share no pixel
    /// * `StackError::Cancelled` - cancelled before committing
    pub fn crop(&mut self, progress: &mut dyn ProgressIndicator) -> Result<Area, StackError> {
        self.ensure_not_empty()?;
        if progress.is_cancelled() {
            return Err(StackError::Cancelled);
        }

        let (mut x0, mut y0) = (0i64, 0i64);
        let (mut x1, mut y1) = (self.size.width as i64, self.size.height as i64);
        for layer in &self.layers {
            let (lx0, ly0, lx1, ly1) = layer.canvas_bounds();
            x0 = x0.max(lx0);
            y0 = y0.max(ly0);
            x1 = x1.min(lx1);
            y1 = y1.min(ly1);
        }

        if x1 <= x0 || y1 <= y0 {
            warn!("Layers share no common region, crop skipped");
            return Err(StackError::EmptyIntersection);
        }

        let kept = Area::new(
            x0 as usize,
            y0 as usize,
            (x1 - x0) as usize,
            (y1 - y0) as usize,
        );
        progress.advance(1, 1, Stage::Crop);
        if progress.is_cancelled() {
            return Err(StackError::Cancelled);
        }

        for layer in &mut self.layers {
            layer.displace(-(x0 as i32), -(y0 as i32));
        }
        self.size = ImageSize::from_width_height(kept.width, kept.height);
        info!("Cropped canvas to {} at ({}, {})", self.size, kept.x, kept.y);

        self.generate_mask()?;
        Ok(kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::{AlignError, FixedAligner};
    use crate::progress::{NoProgress, RecordingProgress};
    use crate::test_util::constant_exposure;

    fn three_layer_stack() -> ImageStack {
        let mut stack = ImageStack::new();
        for (i, time) in [1.0, 0.5, 0.25].into_iter().enumerate() {
            stack
                .add_image(constant_exposure(20, 10, 100, time).with_source(format!("{i}.raw")))
                .unwrap();
        }
        stack
    }

    #[test]
    fn test_align_chains_offsets() {
        let mut stack = three_layer_stack();
        let aligner = FixedAligner::new()
            .with_offset("1.raw", Offset::new(2, 1))
            .with_offset("2.raw", Offset::new(1, -3));

        let warnings = stack.align(&aligner, &mut NoProgress).unwrap();
        assert!(warnings.is_empty());

        let offsets: Vec<Offset> = stack.layers().iter().map(|l| l.offset()).collect();
        assert_eq!(
            offsets,
            vec![Offset::ZERO, Offset::new(2, 1), Offset::new(3, -2)]
        );
    }

    #[test]
    fn test_align_failure_is_local() {
        let mut stack = three_layer_stack();
        let aligner = FixedAligner::new().with_offset("2.raw", Offset::new(1, 1));

        let warnings = stack.align(&aligner, &mut NoProgress).unwrap();
        assert_eq!(
            warnings,
            vec![StackWarning::AlignmentFailed {
                reference: 0,
                moving: 1,
                reason: AlignError::Unknown("1.raw".into()).to_string(),
            }]
        );
        assert_eq!(stack.layer(1).unwrap().offset(), Offset::ZERO);
        assert_eq!(stack.layer(2).unwrap().offset(), Offset::new(1, 1));
    }

    #[test]
    fn test_cancelled_align_keeps_offsets() {
        let mut stack = three_layer_stack();
        let aligner = FixedAligner::new()
            .with_offset("1.raw", Offset::new(2, 1))
            .with_offset("2.raw", Offset::new(1, 1));

        let mut progress = RecordingProgress::cancelling_after(1);
        assert!(matches!(
            stack.align(&aligner, &mut progress),
            Err(StackError::Cancelled)
        ));
        assert!(stack.layers().iter().all(|l| l.offset() == Offset::ZERO));
    }

    #[test]
    fn test_crop_intersects_regions() {
        let mut stack = three_layer_stack();
        let aligner = FixedAligner::new()
            .with_offset("1.raw", Offset::new(2, 1))
            .with_offset("2.raw", Offset::new(1, -3));
        stack.align(&aligner, &mut NoProgress).unwrap();

        let kept = stack.crop(&mut NoProgress).unwrap();
        // x: [0,20) & [2,22) & [3,23); y: [0,10) & [1,11) & [-2,8)
        assert_eq!(kept, Area::new(3, 1, 17, 7));
        assert_eq!(stack.size(), ImageSize::from_width_height(17, 7));

        for layer in stack.layers() {
            let (x0, y0, x1, y1) = layer.canvas_bounds();
            assert!(x0 <= 0 && y0 <= 0);
            assert!(x1 >= 17 && y1 >= 7);
        }
    }

    #[test]
    fn test_crop_is_idempotent() {
        let mut stack = three_layer_stack();
        let aligner = FixedAligner::new()
            .with_offset("1.raw", Offset::new(-4, 2))
            .with_offset("2.raw", Offset::new(1, 1));
        stack.align(&aligner, &mut NoProgress).unwrap();

        stack.crop(&mut NoProgress).unwrap();
        let size = stack.size();
        let bounds: Vec<_> = stack.layers().iter().map(|l| l.canvas_bounds()).collect();

        let second = stack.crop(&mut NoProgress).unwrap();
        assert_eq!(second, Area::new(0, 0, size.width, size.height));
        assert_eq!(stack.size(), size);
        let again: Vec<_> = stack.layers().iter().map(|l| l.canvas_bounds()).collect();
        assert_eq!(bounds, again);
    }

    #[test]
    fn test_align_after_crop_restores_full_canvas() {
        let mut stack = three_layer_stack();
        let aligner = FixedAligner::new()
            .with_offset("1.raw", Offset::new(2, 1))
            .with_offset("2.raw", Offset::new(1, -3));
        stack.align(&aligner, &mut NoProgress).unwrap();
        let first = stack.crop(&mut NoProgress).unwrap();
        assert_eq!(stack.size(), ImageSize::from_width_height(17, 7));

        stack.align(&aligner, &mut NoProgress).unwrap();
        assert_eq!(stack.size(), ImageSize::from_width_height(20, 10));
        let offsets: Vec<Offset> = stack.layers().iter().map(|l| l.offset()).collect();
        assert_eq!(
            offsets,
            vec![Offset::ZERO, Offset::new(2, 1), Offset::new(3, -2)]
        );
        assert_eq!(stack.image_at(19, 9).unwrap(), 0);

        assert_eq!(stack.crop(&mut NoProgress).unwrap(), first);
        assert_eq!(stack.size(), ImageSize::from_width_height(17, 7));
    }

    #[test]
    fn test_crop_rejects_disjoint_layers() {
        let mut stack = three_layer_stack();
        let aligner = FixedAligner::new()
            .with_offset("1.raw", Offset::new(25, 0))
            .with_offset("2.raw", Offset::ZERO);
        stack.align(&aligner, &mut NoProgress).unwrap();
        let before = stack.size();

        assert!(matches!(
            stack.crop(&mut NoProgress),
            Err(StackError::EmptyIntersection)
        ));
        assert_eq!(stack.size(), before);
    }

    #[test]
    fn test_cancelled_crop_changes_nothing() {
        let mut stack = three_layer_stack();
        let mut progress = RecordingProgress::cancelling_after(0);
        assert!(matches!(
            stack.crop(&mut progress),
            Err(StackError::Cancelled)
        ));
        assert_eq!(stack.size(), ImageSize::from_width_height(20, 10));
    }
}
