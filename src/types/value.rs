//! Decoded header values

use crate::types::quantity::{Quantity, format_float};
use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;

/// Layout of timestamps in the header, e.g. `02:34:11 PM Wed May 24 2023`
pub const DATE_FORMAT: &str = "%I:%M:%S %p %a %b %d %Y";

/// A value from the right-hand side of a header line
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Quantity(Quantity<f64>),
    List(Vec<f64>),
    QuantityList(Quantity<Vec<f64>>),
    Timestamp(NaiveDateTime),
    Text(String),
}

impl Value {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Plain numbers only; quantities keep their unit and are not returned here
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Any scalar numeric value as a quantity; bare numbers are dimensionless
    pub fn as_quantity(&self) -> Option<Quantity<f64>> {
        match self {
            Value::Integer(v) => Some(Quantity::dimensionless(*v as f64)),
            Value::Float(v) => Some(Quantity::dimensionless(*v)),
            Value::Quantity(q) => Some(q.clone()),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<&NaiveDateTime> {
        match self {
            Value::Timestamp(t) => Some(t),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Value::Integer(_) | Value::Float(_) | Value::Quantity(_)
        )
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{}", format_float(*v)),
            Value::Quantity(q) => write!(f, "{q}"),
            Value::List(values) => {
                let joined: Vec<String> = values.iter().map(|v| format_float(*v)).collect();
                write!(f, "{}", joined.join(" "))
            }
            Value::QuantityList(q) => write!(f, "{q}"),
            Value::Timestamp(t) => write!(f, "{}", t.format(DATE_FORMAT)),
            Value::Text(s) => write!(f, "{s}"),
        }
    }
}
