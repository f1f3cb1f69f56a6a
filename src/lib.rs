//! Decoder for the CIAO file format written by NanoScope scanning probe microscopes.
//!
//! A file starts with a Latin-1 text header between `\*File list` and
//! `\*File list end`, followed by binary pixel blocks. Each `\*Ciao image list`
//! section of the header describes one image: where its block lives, its pixel
//! counts and the `Z scale` parameter that converts raw counts into physical
//! units.
//!
//! ```ignore
//! use ciao_spm::SpmFile;
//!
//! let file = SpmFile::open("sample.spm")?;
//! for image in file.images() {
//!     println!("{image}");
//! }
//! let height = file.image_by_title("Height").unwrap();
//! println!("{}", height.pixel_size_x());
//! ```

pub mod config;
pub mod error;
pub mod parser;
pub mod processing;
pub mod spm_file;
pub mod types;
pub mod utils;

pub use config::DecodeOptions;
pub use error::{ParameterError, Result, SpmError, UnitError};
pub use spm_file::SpmFile;
pub use types::{
    CiaoImage, CiaoParameter, Header, HeaderEntry, HeaderSection, PixelWidth, Quantity, Unit,
    UnitRegistry, Value,
};
