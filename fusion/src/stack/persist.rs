//! Load and save orchestration over the frame collaborators

use super::ImageStack;
use crate::align::Aligner;
use crate::area::Area;
use crate::config::{LoadOptions, SaveOptions};
use crate::error::{StackError, StackWarning};
use crate::io::{FrameLoader, FrameWriter};
use crate::mask::NO_LAYER;
use crate::progress::{ProgressIndicator, Stage};
use log::info;
use ndarray::Array2;
use std::path::PathBuf;

/// Outcome of a successful [`ImageStack::load`]
#[derive(Debug, Clone, PartialEq)]
pub struct LoadReport {
    /// Layers in the new stack
    pub layers: usize,
    /// Recovered partial-data conditions from alignment and calibration
    pub warnings: Vec<StackWarning>,
    /// Kept rectangle when cropping ran
    pub crop: Option<Area>,
}

impl ImageStack {
    /// Replace this stack with one built from `options.file_names`.
    ///
    /// Frames are decoded, ordered, optionally aligned and cropped, calibrated
    /// and auto-masked on a staging stack. `self` is only replaced once every
    /// step has succeeded; any error leaves it exactly as it was.
    pub fn load(
        &mut self,
        options: &LoadOptions,
        loader: &dyn FrameLoader,
        aligner: &dyn Aligner,
        progress: &mut dyn ProgressIndicator,
    ) -> Result<LoadReport, StackError> {
        if options.file_names.is_empty() {
            return Err(StackError::EmptyStack);
        }

        let mut staged = ImageStack::with_config(self.config.clone())?;
        let total = options.file_names.len();
        for (i, path) in options.file_names.iter().enumerate() {
            if progress.is_cancelled() {
                return Err(StackError::Cancelled);
            }
            let frame = loader.load_frame(path)?.with_source(path);
            staged.insert_layer(frame)?;
            progress.advance(i + 1, total, Stage::Load);
        }

        let mut warnings = Vec::new();
        if options.align {
            warnings.extend(staged.align(aligner, progress)?);
        }
        let crop = if options.crop {
            Some(staged.crop(progress)?)
        } else {
            None
        };
        warnings.extend(staged.compute_rel_exposures(progress)?);
        staged.generate_mask()?;

        info!(
            "Loaded {} layers into a {} canvas with {} warnings",
            staged.len(),
            staged.size(),
            warnings.len()
        );
        *self = staged;
        Ok(LoadReport {
            layers: self.len(),
            warnings,
            crop,
        })
    }

    /// Compose and hand the result to `writer`, returning the output path.
    ///
    /// An empty `options.file_name` selects [`ImageStack::build_output_file_name`]
    /// with the extension of `options.format`; otherwise the name is expanded
    /// with [`ImageStack::replace_arguments`]. The mask path template may refer
    /// to the resolved output through the `%o` codes.
    pub fn save(
        &self,
        options: &SaveOptions,
        writer: &mut dyn FrameWriter,
        progress: &mut dyn ProgressIndicator,
    ) -> Result<PathBuf, StackError> {
        self.ensure_not_empty()?;

        let output = if options.file_name.is_empty() {
            self.build_output_file_name()
                .with_extension(options.format.extension())
        } else {
            PathBuf::from(self.replace_arguments(
                &options.file_name,
                &options.mask_file_name,
                "",
            ))
        };

        let radiance = self.compose_feathered(self.config.feather_radius, progress)?;
        if progress.is_cancelled() {
            return Err(StackError::Cancelled);
        }
        writer.write_radiance(&output, &radiance, options)?;

        if options.save_mask {
            let mask_path = PathBuf::from(self.replace_arguments(
                &options.mask_file_name,
                "",
                &output.to_string_lossy(),
            ));
            writer.write_mask(&mask_path, &self.mask_image())?;
            info!("Saved layer mask to {}", mask_path.display());
        }

        progress.advance(1, 1, Stage::Save);
        info!("Saved {} merge to {}", self.size, output.display());
        Ok(output)
    }

    /// Mask indices spread over 0..=255 for viewing.
    ///
    /// Uncovered pixels are written as 255.
    pub fn mask_image(&self) -> Array2<u8> {
        let steps = self.layers.len().saturating_sub(1).max(1);
        self.mask.to_array().mapv(|index| {
            if index == NO_LAYER {
                u8::MAX
            } else {
                (index as usize * 255 / steps) as u8
            }
        })
    }
}
