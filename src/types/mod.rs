//! Type definitions for the CIAO file format

pub mod descriptor;
pub mod header;
pub mod image;
pub mod parameter;
pub mod pixel_data;
pub mod quantity;
pub mod value;

// Re-export the main types for convenience
pub use descriptor::ImageDescriptor;
pub use header::{Header, HeaderEntry, HeaderSection};
pub use image::CiaoImage;
pub use parameter::{CiaoParameter, ScaleParameter, SelectParameter, SoftScale, ValueParameter};
pub use pixel_data::PixelWidth;
pub use quantity::{Dimension, Magnitude, Quantity, Unit, UnitDefinition, UnitRegistry};
pub use value::Value;
