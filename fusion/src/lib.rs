//! FUSION - exposure stack merging engine
//!
//! Merges differently exposed captures of one scene into a single extended
//! dynamic range radiance image. Every output pixel comes from exactly one
//! layer, chosen automatically (brightest layer that is not clipped nearby)
//! and editable by hand with undo/redo.
//!
//! Pipeline: load -> align -> crop -> calibrate -> mask -> compose -> save

pub mod align;
pub mod area;
pub mod config;
pub mod error;
pub mod exposure;
pub mod image_size;
pub mod io;
pub mod mask;
pub mod progress;
pub mod stack;
pub mod test_util;
pub mod tone_curve;

pub use align::{AlignError, Aligner, FixedAligner, IdentityAligner};
pub use area::Area;
pub use config::{LoadOptions, MergeConfig, OutputFormat, SaveOptions};
pub use error::{StackError, StackWarning};
pub use exposure::{Exposure, ExposureInfo, Offset};
pub use image_size::ImageSize;
pub use io::{FrameIoError, FrameLoader, FrameWriter};
pub use mask::{EditableMask, LayerCoverage, NO_LAYER};
pub use progress::{BarProgress, CancelToken, NoProgress, ProgressIndicator, Stage};
pub use stack::{ImageStack, LoadReport, MAX_LAYERS};
pub use tone_curve::ToneCurve;
