//! CIAO header and pixel parsing functionality

pub mod header_parser;
pub mod parameter_parser;
pub mod pixel_parser;
pub mod value_parser;

// Re-export the parsing functions
pub use header_parser::{HeaderBuilder, header_lines, parse_header};
pub use parameter_parser::parse_parameter;
pub use pixel_parser::{extract_pixel_block, parse_pixels};
pub use value_parser::parse_value;
