//! Editable layer-assignment mask
//!
//! Stores, for every canvas pixel, the index of the layer whose data is
//! authoritative there. The mask is regenerated wholesale by automatic
//! selection and afterwards edited with paint actions:
//!
//! ```text
//!            start_action                paint_pixels (any number)
//!   Idle  ----------------->  Painting  -------------------------.
//!    ^                           |  ^                            |
//!    |  end_action / undo /      |  '----------------------------'
//!    |  redo / start_action      |
//!    '---------------------------'   (closing pushes onto the undo stack)
//! ```
//!
//! Starting an action discards the redo stack, so history stays linear. Each
//! action keeps only the pixels it changed, so memory grows with the size of
//! the edits rather than the canvas.

mod action;

use crate::area::Area;
use crate::error::StackError;
use crate::image_size::ImageSize;
use action::{ClosedAction, OpenAction};
use ndarray::Array2;
use rayon::prelude::*;

/// Mask value for pixels that no layer covers
pub const NO_LAYER: u8 = u8::MAX;

/// Layer geometry and selection policy the mask consults while generating
/// and painting
pub trait LayerCoverage {
    /// Number of layers
    fn layer_count(&self) -> usize;

    /// True when `layer` exists and contains the canvas pixel
    fn is_valid_at(&self, layer: usize, x: usize, y: usize) -> bool;

    /// Best trustworthy layer at the pixel, scanning from `start` towards the
    /// least exposed layer
    fn best_layer_at(&self, x: usize, y: usize, start: usize) -> usize;
}

/// Per-pixel layer indices with undoable paint actions
#[derive(Debug, Default)]
pub struct EditableMask {
    size: ImageSize,
    layers: Vec<u8>,
    current: Option<OpenAction>,
    undo: Vec<ClosedAction>,
    redo: Vec<ClosedAction>,
}

impl EditableMask {
    /// Create a mask with every pixel unassigned
    pub fn new(size: ImageSize) -> Self {
        Self {
            size,
            layers: vec![NO_LAYER; size.pixel_count()],
            ..Default::default()
        }
    }

    pub fn size(&self) -> ImageSize {
        self.size
    }

    /// Layer indices in row-major order
    pub fn as_slice(&self) -> &[u8] {
        &self.layers
    }

    /// Copy of the mask as a (height, width) array
    pub fn to_array(&self) -> Array2<u8> {
        Array2::from_shape_fn((self.size.height, self.size.width), |(y, x)| {
            self.layers[self.size.index_of(x, y)]
        })
    }

    /// Current layer index at a pixel, including strokes of an open action
    pub fn image_at(&self, x: usize, y: usize) -> Option<u8> {
        if !self.size.contains(x, y) {
            return None;
        }
        Some(self.layers[self.size.index_of(x, y)])
    }

    /// Rebuild the mask from automatic selection.
    ///
    /// Every pixel receives `best_layer_at(x, y, 0)`. Where that layer does not
    /// contain the pixel the darkest layer that does is used, and `NO_LAYER`
    /// only where nothing covers it. Clears the open action and both history
    /// stacks.
    pub fn generate_from<C>(&mut self, coverage: &C, size: ImageSize)
    where
        C: LayerCoverage + Sync + ?Sized,
    {
        self.size = size;
        self.layers = vec![NO_LAYER; size.pixel_count()];
        self.current = None;
        self.undo.clear();
        self.redo.clear();

        if size.is_empty() || coverage.layer_count() == 0 {
            return;
        }

        self.layers
            .par_chunks_mut(size.width)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, cell) in row.iter_mut().enumerate() {
                    *cell = auto_select(coverage, x, y);
                }
            });
    }

    /// Open a new paint action, closing any previous one.
    ///
    /// With `add` set, painted pixels are assigned to `layer`. Otherwise
    /// painted pixels currently assigned to `layer` fall back to the next best
    /// layer below it.
    pub fn start_action(&mut self, add: bool, layer: u8) {
        self.close_action();
        self.redo.clear();
        self.current = Some(OpenAction::new(add, layer));
    }

    /// Close the open action, if any
    pub fn end_action(&mut self) {
        self.close_action();
    }

    /// True while a paint action is open
    pub fn is_editing(&self) -> bool {
        self.current.is_some()
    }

    /// Apply the open action to every pixel within `radius` of (x, y).
    ///
    /// Returns the region whose values changed with this stroke.
    ///
    /// # Errors
    /// * `StackError::OutOfBounds` - (x, y) is not on the canvas
    /// * `StackError::NoActiveAction` - no action is open
    pub fn paint_pixels<C>(
        &mut self,
        coverage: &C,
        x: usize,
        y: usize,
        radius: usize,
    ) -> Result<Area, StackError>
    where
        C: LayerCoverage + ?Sized,
    {
        let size = self.size;
        if !size.contains(x, y) {
            return Err(StackError::OutOfBounds { x, y, size });
        }
        let action = self.current.as_mut().ok_or(StackError::NoActiveAction)?;

        let layer = action.layer as usize;
        let last = coverage.layer_count().saturating_sub(1);
        let radius_sq = radius.saturating_mul(radius);
        let mut changed = Area::empty();

        let rows = y.saturating_sub(radius)..=y.saturating_add(radius).min(size.height - 1);
        let cols = x.saturating_sub(radius)..=x.saturating_add(radius).min(size.width - 1);

        for row in rows {
            for col in cols.clone() {
                let (dx, dy) = (col.abs_diff(x), row.abs_diff(y));
                if dx * dx + dy * dy > radius_sq {
                    continue;
                }

                let index = size.index_of(col, row);
                let current = self.layers[index];
                let target = if action.add {
                    if coverage.is_valid_at(layer, col, row) {
                        action.layer
                    } else {
                        current
                    }
                } else if current as usize == layer && layer < last {
                    let next = coverage.best_layer_at(col, row, layer + 1);
                    if coverage.is_valid_at(next, col, row) {
                        next as u8
                    } else {
                        current
                    }
                } else {
                    current
                };

                if target != current {
                    action.record(index, current);
                    self.layers[index] = target;
                    changed.expand_to_include(col, row);
                }
            }
        }

        action.area = action.area.merge(&changed);
        Ok(changed)
    }

    /// Revert the most recent action and return the region it covered
    pub fn undo(&mut self) -> Area {
        self.close_action();
        match self.undo.pop() {
            Some(mut action) => {
                action.swap_into(&mut self.layers);
                let area = action.area;
                self.redo.push(action);
                area
            }
            None => Area::empty(),
        }
    }

    /// Reapply the most recently undone action and return its region
    pub fn redo(&mut self) -> Area {
        self.close_action();
        match self.redo.pop() {
            Some(mut action) => {
                action.swap_into(&mut self.layers);
                let area = action.area;
                self.undo.push(action);
                area
            }
            None => Area::empty(),
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty() || self.current.as_ref().is_some_and(|a| !a.touched.is_empty())
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    fn close_action(&mut self) {
        if let Some(closed) = self.current.take().and_then(OpenAction::close) {
            self.undo.push(closed);
        }
    }
}

fn auto_select<C>(coverage: &C, x: usize, y: usize) -> u8
where
    C: LayerCoverage + ?Sized,
{
    let best = coverage.best_layer_at(x, y, 0);
    if coverage.is_valid_at(best, x, y) {
        return best as u8;
    }
    (0..coverage.layer_count())
        .rev()
        .find(|&layer| coverage.is_valid_at(layer, x, y))
        .map_or(NO_LAYER, |layer| layer as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Layers covering the whole canvas; layer `l` is unusable for x < cutoffs[l]
    struct Bands {
        cutoffs: Vec<usize>,
    }

    impl LayerCoverage for Bands {
        fn layer_count(&self) -> usize {
            self.cutoffs.len()
        }

        fn is_valid_at(&self, layer: usize, _x: usize, _y: usize) -> bool {
            layer < self.cutoffs.len()
        }

        fn best_layer_at(&self, x: usize, _y: usize, start: usize) -> usize {
            let mut i = start;
            while i + 1 < self.cutoffs.len() && x < self.cutoffs[i] {
                i += 1;
            }
            i
        }
    }

    fn generated(cutoffs: Vec<usize>, width: usize, height: usize) -> (EditableMask, Bands) {
        let bands = Bands { cutoffs };
        let mut mask = EditableMask::new(ImageSize::from_width_height(width, height));
        mask.generate_from(&bands, ImageSize::from_width_height(width, height));
        (mask, bands)
    }

    #[test]
    fn test_generate_scans_layers_top_down() {
        let (mask, _) = generated(vec![4, 2, 0], 6, 2);
        let row: Vec<u8> = (0..6).map(|x| mask.image_at(x, 1).unwrap()).collect();
        assert_eq!(row, vec![2, 2, 1, 1, 0, 0]);
    }

    #[test]
    fn test_image_at_out_of_range() {
        let (mask, _) = generated(vec![0], 3, 3);
        assert_eq!(mask.image_at(3, 0), None);
        assert_eq!(mask.image_at(0, 3), None);
    }

    #[test]
    fn test_paint_requires_action() {
        let (mut mask, bands) = generated(vec![0, 0], 4, 4);
        assert!(matches!(
            mask.paint_pixels(&bands, 1, 1, 1),
            Err(StackError::NoActiveAction)
        ));
    }

    #[test]
    fn test_paint_rejects_out_of_range_center() {
        let (mut mask, bands) = generated(vec![0, 0], 4, 4);
        mask.start_action(true, 1);
        assert!(matches!(
            mask.paint_pixels(&bands, 4, 0, 1),
            Err(StackError::OutOfBounds { x: 4, y: 0, .. })
        ));
    }

    #[test]
    fn test_paint_disc_and_undo() {
        let (mut mask, bands) = generated(vec![0, 0], 7, 7);
        let before = mask.as_slice().to_vec();

        mask.start_action(true, 1);
        let stroke = mask.paint_pixels(&bands, 3, 3, 1).unwrap();
        assert_eq!(stroke, Area::new(2, 2, 3, 3));
        assert_eq!(mask.image_at(3, 3), Some(1));
        assert_eq!(mask.image_at(2, 3), Some(1));
        // corners lie outside the radius
        assert_eq!(mask.image_at(2, 2), Some(0));

        let area = mask.undo();
        assert_eq!(area, Area::new(2, 2, 3, 3));
        assert_eq!(mask.as_slice(), before.as_slice());
    }

    #[test]
    fn test_repeated_strokes_record_first_value_only() {
        let (mut mask, bands) = generated(vec![0, 0, 0], 5, 5);
        let before = mask.as_slice().to_vec();

        mask.start_action(true, 1);
        mask.paint_pixels(&bands, 2, 2, 1).unwrap();
        mask.paint_pixels(&bands, 2, 2, 1).unwrap();
        mask.start_action(true, 2);
        mask.paint_pixels(&bands, 2, 2, 0).unwrap();

        mask.undo();
        assert_eq!(mask.image_at(2, 2), Some(1));
        mask.undo();
        assert_eq!(mask.as_slice(), before.as_slice());
    }

    #[test]
    fn test_remove_falls_back_to_next_layer() {
        let (mut mask, bands) = generated(vec![0, 0, 0], 3, 1);
        mask.start_action(false, 0);
        mask.paint_pixels(&bands, 0, 0, 0).unwrap();
        assert_eq!(mask.image_at(0, 0), Some(1));

        // the last layer cannot be removed
        mask.start_action(false, 2);
        mask.start_action(true, 2);
        mask.paint_pixels(&bands, 1, 0, 0).unwrap();
        mask.start_action(false, 2);
        let stroke = mask.paint_pixels(&bands, 1, 0, 0).unwrap();
        assert!(stroke.is_empty());
        assert_eq!(mask.image_at(1, 0), Some(2));
    }

    #[test]
    fn test_undo_redo_round_trip() {
        let (mut mask, bands) = generated(vec![0, 0], 8, 8);
        mask.start_action(true, 1);
        mask.paint_pixels(&bands, 4, 4, 2).unwrap();
        mask.end_action();
        let painted = mask.as_slice().to_vec();

        mask.undo();
        assert!(mask.can_redo());
        let area = mask.redo();
        assert!(!area.is_empty());
        assert_eq!(mask.as_slice(), painted.as_slice());
    }

    #[test]
    fn test_new_action_discards_redo() {
        let (mut mask, bands) = generated(vec![0, 0], 8, 1);
        mask.start_action(true, 1);
        mask.paint_pixels(&bands, 1, 0, 0).unwrap();
        mask.undo();

        mask.start_action(true, 1);
        mask.paint_pixels(&bands, 6, 0, 0).unwrap();
        assert!(mask.redo().is_empty());

        assert_eq!(mask.image_at(1, 0), Some(0));
        assert_eq!(mask.image_at(6, 0), Some(1));
    }

    #[test]
    fn test_empty_history_is_noop() {
        let (mut mask, _) = generated(vec![0], 2, 2);
        assert!(mask.undo().is_empty());
        assert!(mask.redo().is_empty());
        assert!(!mask.can_undo());
    }

    #[test]
    fn test_empty_action_is_not_recorded() {
        let (mut mask, _) = generated(vec![0, 0], 2, 2);
        mask.start_action(true, 1);
        mask.end_action();
        assert!(!mask.can_undo());
    }

    #[test]
    fn test_generate_resets_history() {
        let (mut mask, bands) = generated(vec![0, 0], 4, 4);
        mask.start_action(true, 1);
        mask.paint_pixels(&bands, 0, 0, 3).unwrap();
        assert!(mask.can_undo());

        mask.generate_from(&bands, ImageSize::from_width_height(4, 4));
        assert!(!mask.can_undo());
        assert!(!mask.is_editing());
        assert!(mask.as_slice().iter().all(|&l| l == 0));
    }
}
