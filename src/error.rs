use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, SpmError>;

/// Errors raised while decoding a CIAO file
#[derive(Debug, Error)]
pub enum SpmError {
    /// I/O error while reading or mapping the file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The header start or end sentinel line is missing
    #[error("Header boundary missing: no `{missing}` line found")]
    FormatBoundary { missing: &'static str },

    /// A `@` line failed the parameter grammar
    #[error("Parameter error: {0}")]
    Parameter(#[from] ParameterError),

    /// A plain header line without a `key: value` separator
    #[error("Malformed header line in section '{section}': {line:?}")]
    MalformedLine { section: String, line: String },

    /// A soft-scale reference that is neither in the image nor the scan section
    #[error("Unresolved reference '{name}': not found in image section or '{scan_section}'")]
    UnresolvedReference { name: String, scan_section: String },

    /// A soft-scale reference that points at something non-numeric
    #[error("Invalid reference '{name}': {reason}")]
    InvalidReference { name: String, reason: String },

    /// A field required for decoding is absent
    #[error("Missing field '{field}' in {section}")]
    MissingField { field: String, section: String },

    /// A field is present but cannot be used
    #[error("Invalid field '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    /// Pixel byte width derived from the data length is not 2, 4 or 8
    #[error(
        "Cannot infer pixel width: {data_length} bytes for {pixels} pixels (expected 2, 4 or 8 bytes per pixel)"
    )]
    PixelWidth { data_length: usize, pixels: usize },

    /// The declared pixel range does not fit in the file
    #[error("Data range out of bounds: {length} bytes at offset {offset}, file size is {size}")]
    DataOutOfBounds {
        offset: usize,
        length: usize,
        size: usize,
    },

    /// Binary pixel decoding failed
    #[error("Failed to decode pixel data: {0}")]
    Decode(String),

    /// Requested image does not exist
    #[error("Image index {index} out of range: {}", valid_range(.count))]
    ImageIndex { index: usize, count: usize },

    /// Quantity arithmetic failed
    #[error("Unit error: {0}")]
    Unit(#[from] UnitError),

    /// Metadata export failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn valid_range(count: &usize) -> String {
    let count = *count;
    if count == 0 {
        "file contains no images".to_string()
    } else {
        format!("valid range is 0..{count} (0 to {})", count - 1)
    }
}

/// Errors raised by the CIAO parameter grammar
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParameterError {
    /// The line does not match `[group:]name: TYPE ...`
    #[error("Not a recognized CIAO parameter: {line:?}")]
    Unrecognized { line: String },

    /// The type tag is not one of V, C or S
    #[error("Not a recognized CIAO parameter type: '{tag}' (allowed types: V, C, S) in {line:?}")]
    UnknownType { tag: char, line: String },

    /// Value and scale parameters need a hard value
    #[error("Parameter has no hard value: {line:?}")]
    MissingHardValue { line: String },

    /// Scale parameters name the parameter they scale
    #[error("Scale parameter has no soft scale: {line:?}")]
    MissingSoftScale { line: String },
}

/// Errors raised by quantity arithmetic
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UnitError {
    /// Addition or conversion between dimensionally different units
    #[error("Cannot convert from '{from}' to '{to}': incompatible dimensions")]
    Incompatible { from: String, to: String },

    /// Element-wise arithmetic on arrays of different shape
    #[error("Shape mismatch: {left:?} vs {right:?}")]
    ShapeMismatch { left: Vec<usize>, right: Vec<usize> },
}
