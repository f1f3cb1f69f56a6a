//! Conversion of raw counts and pixel indices into physical units

use crate::config::{ASPECT_RATIO_KEY, SCAN_SIZE_KEY};
use crate::error::{Result, SpmError};
use crate::processing::resolver::Resolver;
use crate::types::parameter::ValueParameter;
use crate::types::pixel_data::PixelWidth;
use crate::types::quantity::Quantity;
use crate::types::value::Value;
use ndarray::{Array1, Array2};
use serde::Serialize;
use winnow::{
    Parser,
    ascii::{float, space0},
    combinator::{delimited, separated_pair},
};

/// `x:y` aspect ratio, normalized so that the smaller component is 1
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AspectRatio {
    pub x: f64,
    pub y: f64,
}

fn ratio(input: &mut &str) -> winnow::Result<(f64, f64)> {
    separated_pair(float, delimited(space0, ':', space0), float).parse_next(input)
}

impl AspectRatio {
    fn normalized(x: f64, y: f64) -> Option<Self> {
        let valid = |v: f64| v.is_finite() && v > 0.0;
        if !valid(x) || !valid(y) {
            return None;
        }
        let min = x.min(y);
        Some(Self {
            x: x / min,
            y: y / min,
        })
    }

    /// Parses `"x:y"`, e.g. `"1:2"`
    pub fn parse(text: &str) -> Option<Self> {
        let (x, y) = ratio.parse(text.trim()).ok()?;
        Self::normalized(x, y)
    }

    /// Ratio implied by the pixel counts: the longer pixel axis spans the full
    /// scan size
    pub fn from_pixels(rows: usize, cols: usize) -> Self {
        let longest = rows.max(cols).max(1) as f64;
        Self {
            x: longest / cols.max(1) as f64,
            y: longest / rows.max(1) as f64,
        }
    }
}

/// Z calibration: `hard_value * soft_scale / 2^(8 * width)`.
///
/// Units multiply, so a hard value in `V` and a soft scale in `nm/V` give `nm`.
pub fn z_scale_factor(
    z_scale: &ValueParameter,
    soft_scale: &Quantity<f64>,
    width: PixelWidth,
) -> Result<Quantity<f64>> {
    let hard_value = z_scale
        .hard_value
        .as_quantity()
        .ok_or_else(|| SpmError::InvalidField {
            field: z_scale.name.clone(),
            reason: format!("hard value '{}' is not numeric", z_scale.hard_value),
        })?;
    Ok(hard_value.scale(soft_scale) / width.levels())
}

/// Multiply every raw count by the Z factor
pub fn calibrate(raw: &Array2<i64>, z_factor: &Quantity<f64>) -> Quantity<Array2<f64>> {
    Quantity::dimensionless(raw.mapv(|v| v as f64)).scale(z_factor)
}

/// Physical extents, pixel spacing and coordinate axes of an image
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PixelGeometry {
    pub aspect_ratio: AspectRatio,
    pub width: Quantity<f64>,
    pub height: Quantity<f64>,
    pub pixel_size_x: Quantity<f64>,
    pub pixel_size_y: Quantity<f64>,
    pub x: Quantity<Array1<f64>>,
    pub y: Quantity<Array1<f64>>,
}

impl PixelGeometry {
    /// `width = scan_size / aspect.x`, `height = scan_size / aspect.y`; spacing is
    /// extent over pixel count and axes run from 0 to the extent
    pub fn new(scan_size: &Quantity<f64>, aspect_ratio: AspectRatio, rows: usize, cols: usize) -> Self {
        let width = scan_size.clone() / aspect_ratio.x;
        let height = scan_size.clone() / aspect_ratio.y;
        let axis = |extent: &Quantity<f64>, n: usize| {
            Quantity::new(Array1::linspace(0.0, *extent.magnitude(), n), extent.unit().clone())
        };

        Self {
            aspect_ratio,
            pixel_size_x: width.clone() / cols.max(1) as f64,
            pixel_size_y: height.clone() / rows.max(1) as f64,
            x: axis(&width, cols),
            y: axis(&height, rows),
            width,
            height,
        }
    }

    /// Resolves `Scan Size` and `Aspect Ratio` for an image and builds its geometry
    pub fn resolve(resolver: &Resolver<'_>, rows: usize, cols: usize) -> Result<Self> {
        let scan_size = scan_size(resolver)?;
        let aspect_ratio = match resolver.field(ASPECT_RATIO_KEY).and_then(|e| e.value()) {
            Some(value) => value
                .as_str()
                .and_then(AspectRatio::parse)
                .ok_or_else(|| SpmError::InvalidField {
                    field: ASPECT_RATIO_KEY.to_string(),
                    reason: format!("expected 'x:y', got '{value}'"),
                })?,
            None => AspectRatio::from_pixels(rows, cols),
        };
        Ok(Self::new(&scan_size, aspect_ratio, rows, cols))
    }

    /// `[0, width, 0, height]`, the extent expected by image plotting tools
    pub fn extent(&self) -> [f64; 4] {
        [0.0, *self.width.magnitude(), 0.0, *self.height.magnitude()]
    }
}

/// The scalar scan size. Files listing one size per axis give the longest one.
fn scan_size(resolver: &Resolver<'_>) -> Result<Quantity<f64>> {
    let value = resolver
        .field(SCAN_SIZE_KEY)
        .and_then(|e| e.value())
        .ok_or_else(|| SpmError::MissingField {
            field: SCAN_SIZE_KEY.to_string(),
            section: "image or scan section".to_string(),
        })?;

    let size = match value {
        Value::QuantityList(sizes) => sizes
            .magnitude()
            .iter()
            .copied()
            .reduce(f64::max)
            .map(|longest| Quantity::new(longest, sizes.unit().clone())),
        other => other.as_quantity(),
    };
    size.ok_or_else(|| SpmError::InvalidField {
        field: SCAN_SIZE_KEY.to_string(),
        reason: format!("expected a length, got '{value}'"),
    })
}
