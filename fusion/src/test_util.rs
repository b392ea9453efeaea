//! Synthetic exposures and in-memory collaborators for tests and demos

use crate::config::SaveOptions;
use crate::exposure::{Exposure, ExposureInfo};
use crate::io::{FrameIoError, FrameLoader, FrameWriter};
use ndarray::Array2;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Bit depth of every synthetic exposure
pub const SYNTHETIC_BITS: u8 = 12;

/// 12-bit exposure filled with one value
pub fn constant_exposure(width: usize, height: usize, value: u16, exposure_time: f64) -> Exposure {
    exposure_from_fn(width, height, exposure_time, |_, _| value)
}

/// 12-bit exposure whose sample at (x, y) is `f(x, y)`
pub fn exposure_from_fn<F>(width: usize, height: usize, exposure_time: f64, f: F) -> Exposure
where
    F: Fn(usize, usize) -> u16,
{
    let pixels = Array2::from_shape_fn((height, width), |(y, x)| f(x, y));
    Exposure::new(
        pixels,
        SYNTHETIC_BITS,
        ExposureInfo::from_exposure_time(exposure_time),
    )
    .expect("Synthetic exposure must have a valid shape")
}

/// Serves exposures registered up front, keyed by path
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    frames: HashMap<PathBuf, Exposure>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_frame(mut self, path: impl Into<PathBuf>, exposure: Exposure) -> Self {
        self.frames.insert(path.into(), exposure);
        self
    }
}

impl FrameLoader for MemoryLoader {
    fn load_frame(&self, path: &Path) -> Result<Exposure, FrameIoError> {
        self.frames
            .get(path)
            .cloned()
            .ok_or_else(|| FrameIoError::Decode {
                path: path.to_path_buf(),
                reason: "no such frame".to_string(),
            })
    }
}

/// Keeps every written image in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryWriter {
    pub radiance: Vec<(PathBuf, Array2<f32>)>,
    pub masks: Vec<(PathBuf, Array2<u8>)>,
}

impl MemoryWriter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameWriter for MemoryWriter {
    fn write_radiance(
        &mut self,
        path: &Path,
        radiance: &Array2<f32>,
        _options: &SaveOptions,
    ) -> Result<(), FrameIoError> {
        self.radiance.push((path.to_path_buf(), radiance.clone()));
        Ok(())
    }

    fn write_mask(&mut self, path: &Path, mask: &Array2<u8>) -> Result<(), FrameIoError> {
        self.masks.push((path.to_path_buf(), mask.clone()));
        Ok(())
    }
}
