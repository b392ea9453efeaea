//! Relative exposure estimation
//!
//! Adjacent layers are compared over the canvas pixels both contain and
//! neither saturates. The ratio of their sample sums is the brightness step
//! between them; chaining the steps from layer 0 gives every layer a factor
//! into layer 0's radiance scale.

use super::ImageStack;
use crate::error::{StackError, StackWarning};
use crate::exposure::Exposure;
use crate::progress::{ProgressIndicator, Stage};
use log::{debug, info, warn};
use rayon::prelude::*;

/// Sample sums of a brighter/darker pair over their usable pixels
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct PairSums {
    brighter: f64,
    darker: f64,
    count: usize,
}

impl PairSums {
    fn combine(self, other: PairSums) -> PairSums {
        PairSums {
            brighter: self.brighter + other.brighter,
            darker: self.darker + other.darker,
            count: self.count + other.count,
        }
    }

    /// Multiplicative step from the darker layer to the brighter one
    fn ratio(&self) -> Option<f64> {
        if self.count == 0 || self.darker <= 0.0 {
            return None;
        }
        Some(self.brighter / self.darker)
    }
}

fn pair_sums(brighter: &Exposure, darker: &Exposure, width: usize, height: usize) -> PairSums {
    (0..height)
        .into_par_iter()
        .map(|y| {
            let mut sums = PairSums::default();
            for x in 0..width {
                let (Some(a), Some(b)) = (brighter.sample(x, y), darker.sample(x, y)) else {
                    continue;
                };
                if a >= brighter.saturation_threshold() || b >= darker.saturation_threshold() {
                    continue;
                }
                sums.brighter += a as f64;
                sums.darker += b as f64;
                sums.count += 1;
            }
            sums
        })
        .reduce(PairSums::default, PairSums::combine)
}

impl ImageStack {
    /// Estimate every layer's factor into the reference radiance scale.
    ///
    /// Layer 0 is the reference with factor 1.0. A pair without usable pixels
    /// keeps a step of 1.0 and is reported as a warning. Factors are only
    /// written once every pair has been measured.
    ///
    /// # Errors
    /// * `StackError::EmptyStack` - no layers
    /// * `StackError::Cancelled` - cancelled between pairs; factors unchanged
    pub fn compute_rel_exposures(
        &mut self,
        progress: &mut dyn ProgressIndicator,
    ) -> Result<Vec<StackWarning>, StackError> {
        self.ensure_not_empty()?;

        let pairs = self.layers.len() - 1;
        let mut factors = vec![1.0; self.layers.len()];
        let mut warnings = Vec::new();

        for i in 1..self.layers.len() {
            if progress.is_cancelled() {
                return Err(StackError::Cancelled);
            }

            let sums = pair_sums(
                &self.layers[i - 1],
                &self.layers[i],
                self.size.width,
                self.size.height,
            );
            let step = match sums.ratio() {
                Some(ratio) => ratio,
                None => {
                    warn!(
                        "No unsaturated overlap between layers {} and {i}, assuming equal exposure",
                        i - 1
                    );
                    warnings.push(StackWarning::NoCalibrationPixels {
                        brighter: i - 1,
                        darker: i,
                    });
                    1.0
                }
            };
            factors[i] = factors[i - 1] * step;
            debug!(
                "Layer {i}: step {step:.4} over {} pixels, factor {:.4}",
                sums.count, factors[i]
            );
            progress.advance(i, pairs, Stage::Calibrate);
        }

        if progress.is_cancelled() {
            return Err(StackError::Cancelled);
        }

        for (layer, factor) in self.layers.iter_mut().zip(factors) {
            layer.set_relative_exposure(factor);
        }
        info!("Computed relative exposures for {} layers", self.layers.len());
        Ok(warnings)
    }
}
