//! CIAO parameters: the typed `\@` lines of a NanoScope header.
//!
//! After the optional group number and the name, a single letter selects the
//! variant:
//! - `V` (Value): `[soft-scale] (hard-scale) hard-value`
//! - `C` (Scale): `[soft-scale] (hard-scale) hard-value`, the soft scale names
//!   the parameter being scaled
//! - `S` (Select): `[internal designation] "external designation"`

use crate::types::value::Value;
use bon::Builder;
use serde::Serialize;
use std::fmt;

/// Soft scale of a value or scale parameter. Usually the name of another
/// parameter holding the calibration (e.g. `Sens. Zsens`), occasionally an
/// inline number.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SoftScale {
    Reference(String),
    Literal(Value),
}

impl SoftScale {
    /// Name of the referenced parameter, if this is a reference
    pub fn reference(&self) -> Option<&str> {
        match self {
            SoftScale::Reference(name) => Some(name),
            SoftScale::Literal(_) => None,
        }
    }
}

impl fmt::Display for SoftScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SoftScale::Reference(name) if needs_quotes(name) => write!(f, "\"{name}\""),
            SoftScale::Reference(name) => write!(f, "{name}"),
            SoftScale::Literal(value) => write!(f, "{value}"),
        }
    }
}

/// `V` parameter: a hard value (what a voltmeter inside the electronics would
/// read) plus the scales converting it into user-facing units
#[derive(Debug, Clone, PartialEq, Serialize, Builder)]
pub struct ValueParameter {
    #[builder(into)]
    pub name: String,
    pub group: Option<u32>,
    pub soft_scale: Option<SoftScale>,
    /// Nominal LSB-to-hard-value conversion
    pub hard_scale: Option<Value>,
    pub hard_value: Value,
}

/// `C` parameter: a scaled version of another parameter
#[derive(Debug, Clone, PartialEq, Serialize, Builder)]
pub struct ScaleParameter {
    #[builder(into)]
    pub name: String,
    pub group: Option<u32>,
    pub soft_scale: SoftScale,
    pub hard_scale: Option<Value>,
    pub hard_value: Value,
}

/// `S` parameter: a selection made in the acquisition software
#[derive(Debug, Clone, PartialEq, Serialize, Builder)]
pub struct SelectParameter {
    #[builder(into)]
    pub name: String,
    pub group: Option<u32>,
    #[builder(into)]
    pub internal_designation: String,
    #[builder(into)]
    pub external_designation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum CiaoParameter {
    Value(ValueParameter),
    Scale(ScaleParameter),
    Select(SelectParameter),
}

impl CiaoParameter {
    pub fn name(&self) -> &str {
        match self {
            CiaoParameter::Value(p) => &p.name,
            CiaoParameter::Scale(p) => &p.name,
            CiaoParameter::Select(p) => &p.name,
        }
    }

    pub fn group(&self) -> Option<u32> {
        match self {
            CiaoParameter::Value(p) => p.group,
            CiaoParameter::Scale(p) => p.group,
            CiaoParameter::Select(p) => p.group,
        }
    }

    /// Key under which the parameter is stored in its section: `name`, or
    /// `group:name` when a group number is present
    pub fn key(&self) -> String {
        match self.group() {
            Some(group) => format!("{group}:{}", self.name()),
            None => self.name().to_string(),
        }
    }

    /// The single-letter type tag
    pub fn type_tag(&self) -> char {
        match self {
            CiaoParameter::Value(_) => 'V',
            CiaoParameter::Scale(_) => 'C',
            CiaoParameter::Select(_) => 'S',
        }
    }

    /// Hard value of value and scale parameters
    pub fn hard_value(&self) -> Option<&Value> {
        match self {
            CiaoParameter::Value(p) => Some(&p.hard_value),
            CiaoParameter::Scale(p) => Some(&p.hard_value),
            CiaoParameter::Select(_) => None,
        }
    }

    pub fn soft_scale(&self) -> Option<&SoftScale> {
        match self {
            CiaoParameter::Value(p) => p.soft_scale.as_ref(),
            CiaoParameter::Scale(p) => Some(&p.soft_scale),
            CiaoParameter::Select(_) => None,
        }
    }

    pub fn as_value(&self) -> Option<&ValueParameter> {
        match self {
            CiaoParameter::Value(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_scale(&self) -> Option<&ScaleParameter> {
        match self {
            CiaoParameter::Scale(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_select(&self) -> Option<&SelectParameter> {
        match self {
            CiaoParameter::Select(p) => Some(p),
            _ => None,
        }
    }
}

fn group_prefix(group: Option<u32>) -> String {
    group.map(|g| format!("{g}:")).unwrap_or_default()
}

/// Text that would come back as another value, or as nothing, unless quoted
fn needs_quotes(text: &str) -> bool {
    text.is_empty()
        || text != text.trim()
        || text.starts_with(|c: char| c.is_ascii_digit() || matches!(c, '+' | '-' | '"' | '[' | '('))
        || text.ends_with('"')
}

/// A value as written on a parameter line
struct LineValue<'a>(&'a Value);

impl fmt::Display for LineValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Value::Text(text) if needs_quotes(text) => write!(f, "\"{text}\""),
            value => write!(f, "{value}"),
        }
    }
}

/// Formats the parameter back into its header line form
impl fmt::Display for CiaoParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\\@{}{}: {}", group_prefix(self.group()), self.name(), self.type_tag())?;
        match self {
            CiaoParameter::Value(p) => {
                if let Some(soft) = &p.soft_scale {
                    write!(f, " [{soft}]")?;
                }
                if let Some(hard) = &p.hard_scale {
                    write!(f, " ({})", LineValue(hard))?;
                }
                write!(f, " {}", LineValue(&p.hard_value))
            }
            CiaoParameter::Scale(p) => {
                write!(f, " [{}]", p.soft_scale)?;
                if let Some(hard) = &p.hard_scale {
                    write!(f, " ({})", LineValue(hard))?;
                }
                write!(f, " {}", LineValue(&p.hard_value))
            }
            CiaoParameter::Select(p) => write!(
                f,
                " [{}] \"{}\"",
                p.internal_designation, p.external_designation
            ),
        }
    }
}
