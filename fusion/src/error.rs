//! Error and warning types for stack operations

use crate::image_size::ImageSize;
use crate::io::FrameIoError;
use thiserror::Error;

/// Errors that reject a stack operation.
///
/// A rejected operation never leaves the stack or its mask half-updated.
#[derive(Error, Debug)]
pub enum StackError {
    #[error("Operation requires at least one exposure layer")]
    EmptyStack,

    #[error("Layer {found} is incompatible with the stack format {expected}")]
    IncompatibleLayer { expected: String, found: String },

    #[error("Stack already holds the maximum of {0} layers")]
    TooManyLayers(usize),

    #[error("Pixel ({x}, {y}) is outside the {size} canvas")]
    OutOfBounds { x: usize, y: usize, size: ImageSize },

    #[error("Layer index {layer} is out of range for a stack of {count} layers")]
    InvalidLayer { layer: usize, count: usize },

    #[error("Bits per sample must be within 1..=16, got {0}")]
    InvalidBitDepth(u8),

    #[error("Exposure frame has no pixels")]
    EmptyFrame,

    #[error("No mask edit action is in progress")]
    NoActiveAction,

    #[error("Destination buffer holds {found} values but the canvas needs {expected}")]
    BufferSize { expected: usize, found: usize },

    #[error("Gamma must be finite and positive, got {0}")]
    InvalidGamma(f32),

    #[error("Layers do not share a common region")]
    EmptyIntersection,

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Frame I/O failed: {0}")]
    Frame(#[from] FrameIoError),
}

/// Partial-data conditions that were recovered with a documented default.
#[derive(Debug, Clone, PartialEq)]
pub enum StackWarning {
    /// The pair could not be registered and was left at zero relative offset
    AlignmentFailed {
        reference: usize,
        moving: usize,
        reason: String,
    },
    /// The pair had no overlapping unsaturated pixels; ratio defaulted to 1.0
    NoCalibrationPixels { brighter: usize, darker: usize },
}

impl std::fmt::Display for StackWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            StackWarning::AlignmentFailed {
                reference,
                moving,
                reason,
            } => write!(
                f,
                "alignment of layer {moving} against layer {reference} failed: {reason}"
            ),
            StackWarning::NoCalibrationPixels { brighter, darker } => write!(
                f,
                "no usable pixels to calibrate layer {darker} against layer {brighter}"
            ),
        }
    }
}
