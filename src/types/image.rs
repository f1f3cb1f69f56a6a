use crate::processing::scaler::PixelGeometry;
use crate::types::header::{HeaderEntry, HeaderSection};
use crate::types::pixel_data::PixelWidth;
use crate::types::quantity::Quantity;
use bon::Builder;
use ndarray::{Array1, Array2};
use serde::Serialize;
use std::fmt;

/// A decoded and calibrated image.
///
/// Immutable once built. Arithmetic between images goes through
/// [`Quantity::try_add`] and friends on [`CiaoImage::data`] and yields new values.
#[derive(Debug, Clone, PartialEq, Serialize, Builder)]
pub struct CiaoImage {
    #[builder(into)]
    title: String,
    metadata: HeaderSection,
    #[serde(skip)]
    raw: Array2<i64>,
    pixel_width: PixelWidth,
    soft_scale: Quantity<f64>,
    z_factor: Quantity<f64>,
    #[serde(skip)]
    data: Quantity<Array2<f64>>,
    geometry: PixelGeometry,
}

impl CiaoImage {
    /// Image metadata by key; falls back to matching without group numbers
    pub fn get(&self, key: &str) -> Option<&HeaderEntry> {
        self.metadata.lookup(key)
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn metadata(&self) -> &HeaderSection {
        &self.metadata
    }

    /// Raw counts, rows in display order (top row first)
    pub fn raw(&self) -> &Array2<i64> {
        &self.raw
    }

    /// Calibrated values
    pub fn data(&self) -> &Quantity<Array2<f64>> {
        &self.data
    }

    pub fn pixel_width(&self) -> PixelWidth {
        self.pixel_width
    }

    /// Resolved soft scale of the Z scale parameter
    pub fn soft_scale(&self) -> &Quantity<f64> {
        &self.soft_scale
    }

    /// Factor converting one raw count into the calibrated unit
    pub fn z_factor(&self) -> &Quantity<f64> {
        &self.z_factor
    }

    pub fn geometry(&self) -> &PixelGeometry {
        &self.geometry
    }

    pub fn width(&self) -> &Quantity<f64> {
        &self.geometry.width
    }

    pub fn height(&self) -> &Quantity<f64> {
        &self.geometry.height
    }

    pub fn pixel_size_x(&self) -> &Quantity<f64> {
        &self.geometry.pixel_size_x
    }

    pub fn pixel_size_y(&self) -> &Quantity<f64> {
        &self.geometry.pixel_size_y
    }

    pub fn x(&self) -> &Quantity<Array1<f64>> {
        &self.geometry.x
    }

    pub fn y(&self) -> &Quantity<Array1<f64>> {
        &self.geometry.y
    }

    /// Coordinate grids for plotting: `X[[i, j]] = x[j]` and `Y[[i, j]] = y[i]`,
    /// both shaped `(rows, cols)`
    pub fn meshgrid(&self) -> (Quantity<Array2<f64>>, Quantity<Array2<f64>>) {
        let (x, y) = (self.x(), self.y());
        let shape = (y.magnitude().len(), x.magnitude().len());
        let grid_x = Array2::from_shape_fn(shape, |(_, j)| x.magnitude()[j]);
        let grid_y = Array2::from_shape_fn(shape, |(i, _)| y.magnitude()[i]);
        (
            Quantity::new(grid_x, x.unit().clone()),
            Quantity::new(grid_y, y.unit().clone()),
        )
    }

    /// `[0, width, 0, height]`
    pub fn extent(&self) -> [f64; 4] {
        self.geometry.extent()
    }

    /// `(rows, cols)`
    pub fn shape(&self) -> (usize, usize) {
        self.raw.dim()
    }
}

impl fmt::Display for CiaoImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data_type = self
            .get("Data type")
            .and_then(HeaderEntry::text)
            .unwrap_or("Unknown");
        let (rows, cols) = self.shape();
        write!(
            f,
            "{data_type} image \"{}\" [{}], ({rows}, {cols}) px = ({:.1}, {:.1}) {}",
            self.title,
            self.data.unit(),
            self.height().magnitude(),
            self.width().magnitude(),
            self.pixel_size_x().unit(),
        )
    }
}
