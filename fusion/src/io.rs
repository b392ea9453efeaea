//! Persistence seams
//!
//! Decoding source captures and encoding merged results belong to external
//! collaborators. The stack drives them through these traits: it asks a
//! [`FrameLoader`] for each input during [`ImageStack::load`] and hands the
//! composed radiance and mask images to a [`FrameWriter`] during
//! [`ImageStack::save`].
//!
//! [`ImageStack::load`]: crate::stack::ImageStack::load
//! [`ImageStack::save`]: crate::stack::ImageStack::save

use crate::config::SaveOptions;
use crate::exposure::Exposure;
use ndarray::Array2;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised by loaders and writers
#[derive(Error, Debug)]
pub enum FrameIoError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to decode {path}: {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error("Failed to encode {path}: {reason}")]
    Encode { path: PathBuf, reason: String },
}

/// Produces one exposure layer per input path
pub trait FrameLoader {
    fn load_frame(&self, path: &Path) -> Result<Exposure, FrameIoError>;
}

/// Receives the merged outputs
pub trait FrameWriter {
    /// Write the composed linear radiance image
    fn write_radiance(
        &mut self,
        path: &Path,
        radiance: &Array2<f32>,
        options: &SaveOptions,
    ) -> Result<(), FrameIoError>;

    /// Write the layer mask as an 8-bit image
    fn write_mask(&mut self, path: &Path, mask: &Array2<u8>) -> Result<(), FrameIoError>;
}
