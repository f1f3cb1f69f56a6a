//! Types for the binary pixel blocks referenced by each image section

use crate::error::{Result, SpmError};
use crate::types::descriptor::{COLS_KEY, ROWS_KEY};
use serde::Serialize;
use std::fmt;

/// Byte width of a stored pixel. Pixels are little-endian signed integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PixelWidth {
    Two,
    Four,
    Eight,
}

impl PixelWidth {
    /// Infer the width from the byte length of the block and the pixel count.
    ///
    /// The declared `Bytes/pixel` header field is not consulted: the block length
    /// is the authority.
    pub fn infer(data_length: usize, pixels: usize) -> Result<Self> {
        let error = SpmError::PixelWidth {
            data_length,
            pixels,
        };
        if pixels == 0 || data_length % pixels != 0 {
            return Err(error);
        }
        Self::from_bytes(data_length / pixels).ok_or(error)
    }

    pub fn from_bytes(bytes: usize) -> Option<Self> {
        match bytes {
            2 => Some(PixelWidth::Two),
            4 => Some(PixelWidth::Four),
            8 => Some(PixelWidth::Eight),
            _ => None,
        }
    }

    pub fn bytes(self) -> usize {
        match self {
            PixelWidth::Two => 2,
            PixelWidth::Four => 4,
            PixelWidth::Eight => 8,
        }
    }

    pub fn bits(self) -> u32 {
        self.bytes() as u32 * 8
    }

    /// Number of representable levels, `2^(8 * bytes)`
    pub fn levels(self) -> f64 {
        2f64.powi(self.bits() as i32)
    }
}

/// `rows * cols`, rejecting header counts whose product does not fit in `usize`
pub fn pixel_count(rows: usize, cols: usize) -> Result<usize> {
    rows.checked_mul(cols).ok_or_else(|| SpmError::InvalidField {
        field: format!("{ROWS_KEY} x {COLS_KEY}"),
        reason: format!("{rows} x {cols} pixels overflows"),
    })
}

impl fmt::Display for PixelWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bytes", self.bytes())
    }
}
