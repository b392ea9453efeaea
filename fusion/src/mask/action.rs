//! Paint actions recorded for undo and redo

use crate::area::Area;
use std::collections::HashMap;

/// An action still receiving strokes
#[derive(Debug)]
pub(crate) struct OpenAction {
    pub add: bool,
    pub layer: u8,
    /// Prior value of every pixel this action changed, keyed by linear index
    pub touched: HashMap<usize, u8>,
    pub area: Area,
}

impl OpenAction {
    pub fn new(add: bool, layer: u8) -> Self {
        Self {
            add,
            layer,
            touched: HashMap::new(),
            area: Area::empty(),
        }
    }

    /// Remember a pixel's value before its first change in this action
    pub fn record(&mut self, index: usize, previous: u8) {
        self.touched.entry(index).or_insert(previous);
    }

    pub fn close(self) -> Option<ClosedAction> {
        if self.touched.is_empty() {
            return None;
        }
        let mut pixels: Vec<(usize, u8)> = self.touched.into_iter().collect();
        pixels.sort_unstable_by_key(|&(index, _)| index);
        Some(ClosedAction {
            pixels,
            area: self.area,
        })
    }
}

/// A committed action on the undo or redo stack.
///
/// `pixels` holds the value each pixel does NOT currently have: the prior
/// value while the action sits on the undo stack, the painted value while it
/// sits on the redo stack. Swapping it with the mask flips between the two.
#[derive(Debug, Clone)]
pub(crate) struct ClosedAction {
    pub pixels: Vec<(usize, u8)>,
    pub area: Area,
}

impl ClosedAction {
    pub fn swap_into(&mut self, mask: &mut [u8]) {
        for (index, value) in self.pixels.iter_mut() {
            std::mem::swap(&mut mask[*index], value);
        }
    }
}
