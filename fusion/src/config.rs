//! Merge, load and save configuration.
//!
//! All option structs are plain serde types with sensible defaults so that a
//! batch run can be described in a JSON file and reloaded later.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::exposure::DEFAULT_SATURATION_RADIUS;
use crate::tone_curve::DEFAULT_GAMMA;

/// Engine tuning shared by every stack operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Display gamma of the preview tone curve
    pub gamma: f32,
    /// Anti-halo neighbourhood radius applied to loaded layers
    pub saturation_radius: usize,
    /// Box radius used to feather layer seams when saving (0 disables)
    pub feather_radius: usize,
    /// Rows composed between progress updates and cancellation checks
    pub rows_per_chunk: usize,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            gamma: DEFAULT_GAMMA,
            saturation_radius: DEFAULT_SATURATION_RADIUS,
            feather_radius: 0,
            rows_per_chunk: 64,
        }
    }
}

impl MergeConfig {
    /// Save to JSON file
    pub fn save_to_file(&self, path: &Path) -> Result<(), std::io::Error> {
        save_json(self, path)
    }

    /// Load from JSON file
    pub fn load_from_file(path: &Path) -> Result<Self, std::io::Error> {
        load_json(path)
    }
}

/// Which inputs to merge and which geometry steps to run on them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    /// Input captures, in any order
    pub file_names: Vec<PathBuf>,
    /// Register adjacent exposures against each other
    pub align: bool,
    /// Shrink the canvas to the region every layer covers
    pub crop: bool,
}

impl LoadOptions {
    pub fn new<I, P>(file_names: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            file_names: file_names.into_iter().map(Into::into).collect(),
            align: true,
            crop: true,
        }
    }
}

/// Container format requested from the writer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Dng,
    Tiff,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Dng => "dng",
            OutputFormat::Tiff => "tif",
        }
    }
}

/// Where and how to write the merged result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveOptions {
    /// Output path pattern; empty selects the default name built from inputs
    pub file_name: String,
    pub format: OutputFormat,
    /// Bits per sample of the written radiance image (16, 24 or 32)
    pub bits_per_sample: u8,
    /// Also write the layer mask
    pub save_mask: bool,
    /// Mask path pattern, may reference the output name through `%o*`
    pub mask_file_name: String,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            file_name: String::new(),
            format: OutputFormat::Dng,
            bits_per_sample: 16,
            save_mask: false,
            mask_file_name: "%od/%on_mask.png".to_string(),
        }
    }
}

impl SaveOptions {
    /// Save to JSON file
    pub fn save_to_file(&self, path: &Path) -> Result<(), std::io::Error> {
        save_json(self, path)
    }

    /// Load from JSON file
    pub fn load_from_file(path: &Path) -> Result<Self, std::io::Error> {
        load_json(path)
    }
}

fn save_json<T: Serialize>(value: &T, path: &Path) -> Result<(), std::io::Error> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    std::fs::write(path, json)
}

fn load_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, std::io::Error> {
    let json = std::fs::read_to_string(path)?;
    serde_json::from_str(&json).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}
