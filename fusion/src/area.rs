//! Rectangular canvas regions returned by edits, undo and crop

use serde::{Deserialize, Serialize};

/// Axis-aligned region of the canvas
///
/// Used to tell the caller which part of the preview needs redrawing after a
/// mask edit, and which rectangle survived a crop. A zero width or height
/// means the region is empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Area {
    /// Left column
    pub x: usize,
    /// Top row
    pub y: usize,
    /// Width of the region
    pub width: usize,
    /// Height of the region
    pub height: usize,
}

impl Area {
    /// Create a new area
    pub fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The empty area
    pub fn empty() -> Self {
        Self::default()
    }

    /// True when the area covers no pixel
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// One past the right-most column
    pub fn x_end(&self) -> usize {
        self.x + self.width
    }

    /// One past the bottom row
    pub fn y_end(&self) -> usize {
        self.y + self.height
    }

    pub fn contains(&self, x: usize, y: usize) -> bool {
        x >= self.x && x < self.x_end() && y >= self.y && y < self.y_end()
    }

    /// Grow the area so that it covers (x, y)
    pub fn expand_to_include(&mut self, x: usize, y: usize) {
        if self.is_empty() {
            *self = Area::new(x, y, 1, 1);
            return;
        }
        let x_min = self.x.min(x);
        let y_min = self.y.min(y);
        let x_end = self.x_end().max(x + 1);
        let y_end = self.y_end().max(y + 1);
        *self = Area::new(x_min, y_min, x_end - x_min, y_end - y_min);
    }

    /// Smallest area covering both
    pub fn merge(&self, other: &Area) -> Area {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let x_min = self.x.min(other.x);
        let y_min = self.y.min(other.y);
        let x_end = self.x_end().max(other.x_end());
        let y_end = self.y_end().max(other.y_end());
        Area::new(x_min, y_min, x_end - x_min, y_end - y_min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_from_empty() {
        let mut area = Area::empty();
        assert!(area.is_empty());
        area.expand_to_include(4, 7);
        assert_eq!(area, Area::new(4, 7, 1, 1));
        area.expand_to_include(2, 9);
        assert_eq!(area, Area::new(2, 7, 3, 3));
        assert!(area.contains(3, 8));
        assert!(!area.contains(5, 8));
    }

    #[test]
    fn test_merge_ignores_empty() {
        let a = Area::new(1, 1, 2, 2);
        assert_eq!(a.merge(&Area::empty()), a);
        assert_eq!(Area::empty().merge(&a), a);
        assert_eq!(a.merge(&Area::new(5, 0, 1, 1)), Area::new(1, 0, 5, 3));
    }
}
