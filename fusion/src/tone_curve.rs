//! Gamma tone curve for 8-bit previews.
//!
//! The curve is a 65536-entry lookup table indexed by the floor of a linear
//! radiance value, so mapping a pixel is a single table read. Each entry is
//!
//! ```text
//! table[v] = round(255 * (v / 65535) ^ (1 / gamma)),  clamped to [0, 255]
//! ```
//!
//! which is monotonically non-decreasing for any positive gamma.

use crate::error::StackError;

/// Number of entries in the lookup table
pub const TONE_CURVE_SIZE: usize = 65536;

/// Default display gamma
pub const DEFAULT_GAMMA: f32 = 2.2;

/// Precomputed radiance-to-display lookup table
#[derive(Debug, Clone, PartialEq)]
pub struct ToneCurve {
    gamma: f32,
    table: Vec<u8>,
}

impl ToneCurve {
    /// Build the table for a display gamma
    ///
    /// # Errors
    /// * `StackError::InvalidGamma` - gamma is not finite or not positive
    pub fn new(gamma: f32) -> Result<Self, StackError> {
        if !gamma.is_finite() || gamma <= 0.0 {
            return Err(StackError::InvalidGamma(gamma));
        }

        Ok(Self {
            gamma,
            table: build_table(gamma),
        })
    }

    pub fn gamma(&self) -> f32 {
        self.gamma
    }

    /// Map a linear value to a display byte.
    ///
    /// Negative and NaN values clamp to the first entry, values at or above
    /// the table size clamp to the last.
    pub fn map(&self, value: f64) -> u8 {
        if value.is_nan() || value <= 0.0 {
            return self.table[0];
        }
        let index = value.floor();
        if index >= (TONE_CURVE_SIZE - 1) as f64 {
            return self.table[TONE_CURVE_SIZE - 1];
        }
        self.table[index as usize]
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.table
    }
}

impl Default for ToneCurve {
    fn default() -> Self {
        Self {
            gamma: DEFAULT_GAMMA,
            table: build_table(DEFAULT_GAMMA),
        }
    }
}

fn build_table(gamma: f32) -> Vec<u8> {
    let max_value = (TONE_CURVE_SIZE - 1) as f64;
    let exponent = 1.0 / gamma as f64;
    (0..TONE_CURVE_SIZE)
        .map(|v| {
            let display = 255.0 * (v as f64 / max_value).powf(exponent);
            display.round().clamp(0.0, 255.0) as u8
        })
        .collect()
}
