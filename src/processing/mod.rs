//! From header sections and raw bytes to calibrated images

pub mod decode;
pub mod resolver;
pub mod scaler;

pub use decode::{decode_image, decode_images};
pub use resolver::Resolver;
pub use scaler::{AspectRatio, PixelGeometry};
