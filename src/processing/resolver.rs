use crate::error::{Result, SpmError};
use crate::types::header::{HeaderEntry, HeaderSection};
use crate::types::parameter::SoftScale;
use crate::types::quantity::Quantity;

/// Looks up fields and soft-scale references for one image: the image section
/// first, then the scan-wide section.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    image: &'a HeaderSection,
    scan: Option<&'a HeaderSection>,
    scan_name: &'a str,
}

impl<'a> Resolver<'a> {
    /// `scan` is `None` when the file has no section named `scan_name`
    pub fn new(image: &'a HeaderSection, scan: Option<&'a HeaderSection>, scan_name: &'a str) -> Self {
        Self {
            image,
            scan,
            scan_name,
        }
    }

    /// Exact key, then group-less name; image section before scan section
    pub fn field(&self, key: &str) -> Option<&'a HeaderEntry> {
        self.image
            .lookup(key)
            .or_else(|| self.scan.and_then(|scan| scan.lookup(key)))
    }

    /// Numeric value of a soft scale.
    ///
    /// Literal soft scales are their own value. References name another
    /// parameter whose hard value (or plain value) is the calibration.
    pub fn resolve_soft_scale(&self, soft_scale: &SoftScale) -> Result<Quantity<f64>> {
        match soft_scale {
            SoftScale::Literal(value) => {
                value.as_quantity().ok_or_else(|| SpmError::InvalidReference {
                    name: value.to_string(),
                    reason: "literal soft scale is not numeric".to_string(),
                })
            }
            SoftScale::Reference(name) => {
                let entry = self
                    .field(name)
                    .ok_or_else(|| SpmError::UnresolvedReference {
                        name: name.clone(),
                        scan_section: self.scan_name.to_string(),
                    })?;
                entry.quantity().ok_or_else(|| SpmError::InvalidReference {
                    name: name.clone(),
                    reason: match entry.value() {
                        Some(value) => format!("referenced value '{value}' is not numeric"),
                        None => "referenced entry has no value".to_string(),
                    },
                })
            }
        }
    }
}
