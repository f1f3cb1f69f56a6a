//! Typed view over the fields of one `Ciao image list` section

use crate::config::DecodeOptions;
use crate::error::{Result, SpmError};
use crate::types::header::{HeaderSection, IMAGE_SECTION};
use crate::types::parameter::{CiaoParameter, ValueParameter};
use crate::types::pixel_data::pixel_count;
use crate::types::value::Value;
use bon::Builder;

pub const DATA_OFFSET_KEY: &str = "Data offset";
pub const DATA_LENGTH_KEY: &str = "Data length";
pub const ROWS_KEY: &str = "Number of lines";
pub const COLS_KEY: &str = "Samps/line";

/// The fields of an image section the decoder needs
#[derive(Debug, Clone, PartialEq, Builder)]
pub struct ImageDescriptor<'a> {
    pub section: &'a HeaderSection,
    pub data_offset: usize,
    pub data_length: usize,
    /// `Number of lines`
    pub rows: usize,
    /// `Samps/line`
    pub cols: usize,
    pub z_scale: &'a ValueParameter,
    /// Internal designation of the `Image Data` select parameter
    pub title: Option<String>,
}

impl<'a> ImageDescriptor<'a> {
    pub fn from_section(section: &'a HeaderSection, options: &DecodeOptions) -> Result<Self> {
        let z_scale = match section.lookup(&options.z_scale_key) {
            Some(entry) => match entry.as_parameter() {
                Some(CiaoParameter::Value(param)) => param,
                _ => {
                    return Err(SpmError::InvalidField {
                        field: options.z_scale_key.clone(),
                        reason: "expected a value (V) parameter".to_string(),
                    });
                }
            },
            None => return Err(missing(&options.z_scale_key)),
        };

        let title = section
            .lookup(&options.title_key)
            .and_then(|entry| entry.as_parameter())
            .and_then(CiaoParameter::as_select)
            .map(|select| select.internal_designation.clone());

        Ok(Self::builder()
            .section(section)
            .data_offset(count_field(section, DATA_OFFSET_KEY)?)
            .data_length(count_field(section, DATA_LENGTH_KEY)?)
            .rows(count_field(section, ROWS_KEY)?)
            .cols(count_field(section, COLS_KEY)?)
            .z_scale(z_scale)
            .maybe_title(title)
            .build())
    }

    /// `rows * cols`; an overflowing product is an `InvalidField` error
    pub fn pixel_count(&self) -> Result<usize> {
        pixel_count(self.rows, self.cols)
    }
}

fn missing(field: &str) -> SpmError {
    SpmError::MissingField {
        field: field.to_string(),
        section: IMAGE_SECTION.to_string(),
    }
}

/// A non-negative integer field; integral floats are accepted
fn count_field(section: &HeaderSection, key: &str) -> Result<usize> {
    let value = section
        .lookup(key)
        .and_then(|entry| entry.value())
        .ok_or_else(|| missing(key))?;

    let invalid = |reason: &str| SpmError::InvalidField {
        field: key.to_string(),
        reason: format!("{reason}, got {value}"),
    };
    let count = match value {
        Value::Integer(v) => *v,
        Value::Float(v) if v.fract() == 0.0 => *v as i64,
        _ => return Err(invalid("expected an integer")),
    };
    usize::try_from(count).map_err(|_| invalid("expected a non-negative integer"))
}
