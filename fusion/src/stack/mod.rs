//! Exposure stack: ordered layers, layer mask and tone curve.
//!
//! The stack owns its layers exclusively, ordered from most to least exposed.
//! That order is the scan priority of automatic selection: for every canvas
//! pixel the brightest layer whose data is trustworthy there wins, and the
//! least exposed layer is the fallback. The mask records the winner as a plain
//! index into the layer list; composition reads those indices back and scales
//! each sample by its layer's relative exposure.
//!
//! Operations are split by concern:
//! - `geometry` - alignment and cropping
//! - `calibration` - relative exposure estimation
//! - `compose` - radiance composition and previews
//! - `persist` - load/save orchestration
//! - `naming` - output filename templating

mod calibration;
mod compose;
mod geometry;
mod naming;
mod persist;

pub use persist::LoadReport;

use crate::area::Area;
use crate::config::MergeConfig;
use crate::error::StackError;
use crate::exposure::Exposure;
use crate::image_size::ImageSize;
use crate::mask::{EditableMask, LayerCoverage, NO_LAYER};
use crate::tone_curve::ToneCurve;
use log::{debug, info};

/// Largest stack the u8 mask can index; `NO_LAYER` takes the last value
pub const MAX_LAYERS: usize = NO_LAYER as usize;

/// Stack of exposures merged into one extended dynamic range image
#[derive(Debug)]
pub struct ImageStack {
    /// Layers, from most to least exposed
    layers: Vec<Exposure>,
    mask: EditableMask,
    size: ImageSize,
    tone_curve: ToneCurve,
    config: MergeConfig,
}

impl Default for ImageStack {
    fn default() -> Self {
        Self {
            layers: Vec::new(),
            mask: EditableMask::default(),
            size: ImageSize::default(),
            tone_curve: ToneCurve::default(),
            config: MergeConfig::default(),
        }
    }
}

impl ImageStack {
    /// Empty stack with the default gamma of 2.2
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty stack using the given configuration
    ///
    /// # Errors
    /// * `StackError::InvalidGamma` - `config.gamma` is not a valid gamma
    pub fn with_config(config: MergeConfig) -> Result<Self, StackError> {
        let tone_curve = ToneCurve::new(config.gamma)?;
        Ok(Self {
            tone_curve,
            config,
            ..Default::default()
        })
    }

    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn size(&self) -> ImageSize {
        self.size
    }

    pub fn width(&self) -> usize {
        self.size.width
    }

    pub fn height(&self) -> usize {
        self.size.height
    }

    pub fn layer(&self, index: usize) -> Option<&Exposure> {
        self.layers.get(index)
    }

    /// Layers from most to least exposed
    pub fn layers(&self) -> &[Exposure] {
        &self.layers
    }

    pub fn mask(&self) -> &EditableMask {
        &self.mask
    }

    pub(crate) fn ensure_not_empty(&self) -> Result<(), StackError> {
        if self.layers.is_empty() {
            return Err(StackError::EmptyStack);
        }
        Ok(())
    }

    /// Insert a layer in exposure-descending order and return its index.
    ///
    /// The first layer fixes the canvas size and bit depth; later layers must
    /// match both. The layer takes the anti-halo radius of the stack's
    /// configuration. The mask is regenerated after a successful insert.
    ///
    /// # Errors
    /// * `StackError::IncompatibleLayer` - size or bit depth differs from the
    ///   first layer
    /// * `StackError::TooManyLayers` - the stack already holds `MAX_LAYERS`
    pub fn add_image(&mut self, exposure: Exposure) -> Result<usize, StackError> {
        let index = self.insert_layer(exposure)?;
        self.generate_mask()?;
        Ok(index)
    }

    pub(crate) fn insert_layer(&mut self, exposure: Exposure) -> Result<usize, StackError> {
        if self.layers.len() >= MAX_LAYERS {
            return Err(StackError::TooManyLayers(MAX_LAYERS));
        }

        if let Some(first) = self.layers.first() {
            if first.size() != exposure.size()
                || first.bits_per_sample() != exposure.bits_per_sample()
            {
                return Err(StackError::IncompatibleLayer {
                    expected: format!("{} @ {} bits", first.size(), first.bits_per_sample()),
                    found: format!(
                        "{} @ {} bits",
                        exposure.size(),
                        exposure.bits_per_sample()
                    ),
                });
            }
        } else {
            self.size = exposure.size();
        }

        let exposure = exposure.with_saturation_radius(self.config.saturation_radius);
        let log_exposure = exposure.log_exposure();
        let index = self
            .layers
            .iter()
            .position(|layer| layer.log_exposure() < log_exposure)
            .unwrap_or(self.layers.len());

        info!(
            "Adding layer {} ({:+.2} EV) at position {}",
            exposure
                .source()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "<memory>".to_string()),
            log_exposure,
            index
        );
        self.layers.insert(index, exposure);
        Ok(index)
    }

    /// Best trustworthy layer at a canvas pixel, scanning from layer `start`.
    ///
    /// Advances past layers that do not contain the pixel, are saturated at it
    /// or are saturated in its neighbourhood, stopping at the last layer
    /// regardless.
    pub fn best_layer_at(&self, x: usize, y: usize, start: usize) -> usize {
        self.layers.as_slice().best_layer_at(x, y, start)
    }

    /// True when `layer` exists and contains the canvas pixel
    pub fn is_valid_at(&self, layer: usize, x: usize, y: usize) -> bool {
        self.layers.as_slice().is_valid_at(layer, x, y)
    }

    /// Rebuild the mask by automatic selection. Resets edit history.
    pub fn generate_mask(&mut self) -> Result<(), StackError> {
        self.ensure_not_empty()?;
        self.mask.generate_from(self.layers.as_slice(), self.size);
        debug!("Generated {} mask over {} layers", self.size, self.layers.len());
        Ok(())
    }

    /// Layer index selected at a canvas pixel
    pub fn image_at(&self, x: usize, y: usize) -> Result<u8, StackError> {
        self.mask.image_at(x, y).ok_or(StackError::OutOfBounds {
            x,
            y,
            size: self.size,
        })
    }

    /// Open a paint action assigning (`add`) or removing `layer`
    pub fn start_edit_action(&mut self, add: bool, layer: usize) -> Result<(), StackError> {
        if layer >= self.layers.len() {
            return Err(StackError::InvalidLayer {
                layer,
                count: self.layers.len(),
            });
        }
        self.mask.start_action(add, layer as u8);
        Ok(())
    }

    /// Close the open paint action, if any
    pub fn end_edit_action(&mut self) {
        self.mask.end_action();
    }

    /// Paint the open action over the disc of `radius` around (x, y)
    pub fn edit_pixels(&mut self, x: usize, y: usize, radius: usize) -> Result<Area, StackError> {
        self.mask
            .paint_pixels(self.layers.as_slice(), x, y, radius)
    }

    pub fn undo(&mut self) -> Area {
        self.mask.undo()
    }

    pub fn redo(&mut self) -> Area {
        self.mask.redo()
    }

    pub fn can_undo(&self) -> bool {
        self.mask.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.mask.can_redo()
    }

    /// Rebuild the preview tone curve for a new display gamma
    pub fn set_gamma(&mut self, gamma: f32) -> Result<(), StackError> {
        self.tone_curve = ToneCurve::new(gamma)?;
        self.config.gamma = gamma;
        Ok(())
    }

    pub fn gamma(&self) -> f32 {
        self.tone_curve.gamma()
    }

    /// Display byte for a linear radiance value
    pub fn tone_map(&self, value: f64) -> u8 {
        self.tone_curve.map(value)
    }
}

impl LayerCoverage for [Exposure] {
    fn layer_count(&self) -> usize {
        self.len()
    }

    fn is_valid_at(&self, layer: usize, x: usize, y: usize) -> bool {
        self.get(layer).is_some_and(|l| l.contains(x, y))
    }

    fn best_layer_at(&self, x: usize, y: usize, start: usize) -> usize {
        let last = self.len().saturating_sub(1);
        let mut i = start.min(last);
        while i < last
            && (!self[i].contains(x, y)
                || self[i].is_saturated(x, y)
                || self[i].is_saturated_around(x, y))
        {
            i += 1;
        }
        i
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exposure::ExposureInfo;
    use crate::test_util::{constant_exposure, exposure_from_fn};

    #[test]
    fn test_add_orders_by_exposure() {
        let mut stack = ImageStack::new();
        stack.add_image(constant_exposure(8, 8, 100, 1.0 / 60.0)).unwrap();
        let bright = stack.add_image(constant_exposure(8, 8, 400, 1.0 / 15.0)).unwrap();
        let middle = stack.add_image(constant_exposure(8, 8, 200, 1.0 / 30.0)).unwrap();

        assert_eq!(bright, 0);
        assert_eq!(middle, 1);
        let times: Vec<f64> = stack
            .layers()
            .iter()
            .map(|l| l.info().exposure_time)
            .collect();
        assert_eq!(times, vec![1.0 / 15.0, 1.0 / 30.0, 1.0 / 60.0]);
    }

    #[test]
    fn test_equal_exposures_keep_insertion_order() {
        let mut stack = ImageStack::new();
        stack.add_image(constant_exposure(4, 4, 1, 0.5)).unwrap();
        let second = stack.add_image(constant_exposure(4, 4, 2, 0.5)).unwrap();
        assert_eq!(second, 1);
        assert_eq!(stack.layer(1).unwrap().sample(0, 0), Some(2));
    }

    #[test]
    fn test_first_layer_sets_canvas() {
        let mut stack = ImageStack::new();
        assert_eq!(stack.size(), ImageSize::default());
        stack.add_image(constant_exposure(12, 5, 0, 1.0)).unwrap();
        assert_eq!((stack.width(), stack.height()), (12, 5));
    }

    #[test]
    fn test_rejects_incompatible_layers() {
        let mut stack = ImageStack::new();
        stack.add_image(constant_exposure(8, 8, 0, 1.0)).unwrap();

        let wrong_size = constant_exposure(8, 9, 0, 0.5);
        assert!(matches!(
            stack.add_image(wrong_size),
            Err(StackError::IncompatibleLayer { .. })
        ));

        let wrong_depth = Exposure::new(
            ndarray::Array2::zeros((8, 8)),
            14,
            ExposureInfo::from_exposure_time(0.5),
        )
        .unwrap();
        assert!(matches!(
            stack.add_image(wrong_depth),
            Err(StackError::IncompatibleLayer { .. })
        ));
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn test_empty_stack_preconditions() {
        let mut stack = ImageStack::new();
        assert!(matches!(stack.generate_mask(), Err(StackError::EmptyStack)));
        assert!(matches!(stack.image_at(0, 0), Err(StackError::OutOfBounds { .. })));
    }

    #[test]
    fn test_best_layer_skips_saturated_and_neighbourhood() {
        let mut stack = ImageStack::new();
        stack
            .add_image(exposure_from_fn(10, 1, 1.0, |x, _| if x == 4 { 4095 } else { 500 }))
            .unwrap();
        stack.add_image(constant_exposure(10, 1, 100, 0.25)).unwrap();

        assert_eq!(stack.best_layer_at(4, 0, 0), 1);
        assert_eq!(stack.best_layer_at(3, 0, 0), 1);
        assert_eq!(stack.best_layer_at(5, 0, 0), 1);
        assert_eq!(stack.best_layer_at(2, 0, 0), 0);
        assert_eq!(stack.best_layer_at(2, 0, 1), 1);
        // start past the end clamps to the last layer
        assert_eq!(stack.best_layer_at(2, 0, 9), 1);
    }

    #[test]
    fn test_configured_saturation_radius_applies_to_added_layers() {
        let config = MergeConfig {
            saturation_radius: 2,
            ..Default::default()
        };
        let mut stack = ImageStack::with_config(config).unwrap();
        stack
            .add_image(exposure_from_fn(10, 1, 1.0, |x, _| if x == 4 { 4095 } else { 500 }))
            .unwrap();
        stack.add_image(constant_exposure(10, 1, 100, 0.25)).unwrap();

        assert!(stack.layers().iter().all(|l| l.saturation_radius() == 2));
        assert_eq!(stack.image_at(2, 0).unwrap(), 1);
        assert_eq!(stack.image_at(6, 0).unwrap(), 1);
        assert_eq!(stack.image_at(1, 0).unwrap(), 0);
        assert_eq!(stack.image_at(7, 0).unwrap(), 0);
    }

    #[test]
    fn test_unbounded_saturation_radius_selects_darkest_layer() {
        let config = MergeConfig {
            saturation_radius: usize::MAX,
            ..Default::default()
        };
        let mut stack = ImageStack::with_config(config).unwrap();
        stack
            .add_image(exposure_from_fn(10, 3, 1.0, |x, y| if (x, y) == (0, 0) { 4095 } else { 500 }))
            .unwrap();
        stack.add_image(constant_exposure(10, 3, 100, 0.25)).unwrap();

        assert_eq!(stack.best_layer_at(9, 2, 0), 1);
        assert!(stack.mask().as_slice().iter().all(|&index| index == 1));
    }

    #[test]
    fn test_is_valid_at_range_checks_layer() {
        let mut stack = ImageStack::new();
        stack.add_image(constant_exposure(3, 3, 0, 1.0)).unwrap();
        assert!(stack.is_valid_at(0, 2, 2));
        assert!(!stack.is_valid_at(0, 3, 2));
        assert!(!stack.is_valid_at(1, 0, 0));
    }

    #[test]
    fn test_start_edit_rejects_unknown_layer() {
        let mut stack = ImageStack::new();
        stack.add_image(constant_exposure(3, 3, 0, 1.0)).unwrap();
        assert!(matches!(
            stack.start_edit_action(true, 1),
            Err(StackError::InvalidLayer { layer: 1, count: 1 })
        ));
    }

    #[test]
    fn test_gamma_updates_config_and_curve() {
        let mut stack = ImageStack::new();
        assert_eq!(stack.gamma(), 2.2);
        stack.set_gamma(1.0).unwrap();
        assert_eq!(stack.config().gamma, 1.0);
        assert_eq!(stack.tone_map(65535.0), 255);
        assert!(stack.set_gamma(0.0).is_err());
        assert_eq!(stack.gamma(), 1.0);
    }

    #[test]
    fn test_with_config_rejects_bad_gamma() {
        let config = MergeConfig {
            gamma: -2.0,
            ..Default::default()
        };
        assert!(matches!(
            ImageStack::with_config(config),
            Err(StackError::InvalidGamma(_))
        ));
    }
}
