//! Canvas dimensions shared by layers, the mask and composed output

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Canvas dimensions
///
/// Represents the width and height of an exposure layer or of the common
/// output canvas. Arrays created from it follow ndarray's row-major
/// convention: shape is (height, width).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageSize {
    /// Width in pixels
    pub width: usize,
    /// Height in pixels
    pub height: usize,
}

impl ImageSize {
    /// Create a new ImageSize
    pub fn from_width_height(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    /// Size of a (height, width) shaped array
    pub fn of_array<T>(array: &Array2<T>) -> Self {
        let (height, width) = array.dim();
        Self { width, height }
    }

    /// Create a zeroed f32 radiance array with this size
    pub fn empty_radiance(&self) -> Array2<f32> {
        Array2::zeros((self.height, self.width))
    }

    /// Get total number of pixels
    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    /// True when either dimension is zero
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// True when (x, y) lies on the canvas
    pub fn contains(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height
    }

    /// Row-major linear index of (x, y)
    pub fn index_of(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    /// Convert to tuple (width, height)
    pub fn to_tuple(&self) -> (usize, usize) {
        (self.width, self.height)
    }
}

impl From<(usize, usize)> for ImageSize {
    fn from(dimensions: (usize, usize)) -> Self {
        Self::from_width_height(dimensions.0, dimensions.1)
    }
}

impl From<ImageSize> for (usize, usize) {
    fn from(size: ImageSize) -> Self {
        size.to_tuple()
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_shape_convention() {
        let array = Array2::<u16>::zeros((3, 5));
        let size = ImageSize::of_array(&array);
        assert_eq!(size, ImageSize::from_width_height(5, 3));
        assert_eq!(size.empty_radiance().dim(), (3, 5));
    }

    #[test]
    fn test_index_and_bounds() {
        let size = ImageSize::from((4, 2));
        assert_eq!(size.index_of(3, 1), 7);
        assert!(size.contains(3, 1));
        assert!(!size.contains(4, 0));
        assert!(!size.contains(0, 2));
        assert_eq!(size.to_string(), "4x2");
    }
}
