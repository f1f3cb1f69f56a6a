//! Grammar for CIAO parameter lines:
//! `[\][@][group:]name: TYPE [soft-scale] (hard-scale) value`

use crate::error::ParameterError;
use crate::parser::value_parser::parse_value;
use crate::types::parameter::{
    CiaoParameter, ScaleParameter, SelectParameter, SoftScale, ValueParameter,
};
use crate::types::quantity::UnitRegistry;
use crate::types::value::Value;
use crate::utils::strip_quotes;
use winnow::{
    Parser,
    ascii::{digit1, space0, space1},
    combinator::{alt, delimited, eof, fail, opt, terminated},
    token::{any, rest, take, take_until},
};

/// The raw pieces of a parameter line before interpretation
#[derive(Debug, Clone, PartialEq)]
struct ParameterLine<'s> {
    group: Option<u32>,
    name: &'s str,
    tag: char,
    soft_scale: Option<&'s str>,
    hard_scale: Option<&'s str>,
    value: &'s str,
}

/// Content of a balanced `( ... )`, so that units such as `log(Pa)` survive
fn parenthesized<'s>(input: &mut &'s str) -> winnow::Result<&'s str> {
    '('.parse_next(input)?;
    let mut depth = 1usize;
    let mut closing = None;
    for (i, c) in input.chars().enumerate() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    closing = Some(i);
                    break;
                }
            }
            _ => {}
        }
    }
    match closing {
        Some(count) => terminated(take(count), ')').parse_next(input),
        None => fail.parse_next(input),
    }
}

fn type_tag(input: &mut &str) -> winnow::Result<char> {
    terminated(
        any.verify(|c: &char| c.is_alphanumeric() || *c == '_'),
        alt((space1.void(), eof.void())),
    )
    .parse_next(input)
}

fn parameter_line<'s>(input: &mut &'s str) -> winnow::Result<ParameterLine<'s>> {
    opt('\\').parse_next(input)?;
    opt('@').parse_next(input)?;
    let group = opt(terminated(digit1.parse_to::<u32>(), ':')).parse_next(input)?;
    let name = terminated(take_until(1.., ": "), ": ").parse_next(input)?;
    let tag = type_tag.parse_next(input)?;
    let soft_scale =
        opt(terminated(delimited('[', take_until(0.., ']'), ']'), space0)).parse_next(input)?;
    let hard_scale = opt(terminated(parenthesized, space0)).parse_next(input)?;
    let value = rest.parse_next(input)?;

    Ok(ParameterLine {
        group,
        name,
        tag,
        soft_scale,
        hard_scale,
        value: value.trim(),
    })
}

/// A soft scale naming another parameter stays a reference; anything that
/// parses to a number becomes a literal
fn parse_soft_scale(text: &str, units: &UnitRegistry) -> Option<SoftScale> {
    match parse_value(text, units)? {
        Value::Text(name) => Some(SoftScale::Reference(name)),
        literal => Some(SoftScale::Literal(literal)),
    }
}

/// Parses one `@` line into a [`CiaoParameter`].
///
/// # Errors
///
/// Returns a [`ParameterError`] carrying the offending line when the grammar does
/// not match, the type tag is unknown, or a field mandatory for the type is absent.
/// Select parameters may leave the internal designation empty.
pub fn parse_parameter(line: &str, units: &UnitRegistry) -> Result<CiaoParameter, ParameterError> {
    let parts = parameter_line
        .parse(line.trim_end())
        .map_err(|_| ParameterError::Unrecognized {
            line: line.to_string(),
        })?;

    let hard_value = || {
        parse_value(parts.value, units).ok_or_else(|| ParameterError::MissingHardValue {
            line: line.to_string(),
        })
    };

    match parts.tag {
        'V' => Ok(CiaoParameter::Value(
            ValueParameter::builder()
                .name(parts.name)
                .maybe_group(parts.group)
                .maybe_soft_scale(parts.soft_scale.and_then(|s| parse_soft_scale(s, units)))
                .maybe_hard_scale(parts.hard_scale.and_then(|h| parse_value(h, units)))
                .hard_value(hard_value()?)
                .build(),
        )),
        'C' => {
            let soft_scale = parts
                .soft_scale
                .and_then(|s| parse_soft_scale(s, units))
                .ok_or_else(|| ParameterError::MissingSoftScale {
                    line: line.to_string(),
                })?;
            Ok(CiaoParameter::Scale(
                ScaleParameter::builder()
                    .name(parts.name)
                    .maybe_group(parts.group)
                    .soft_scale(soft_scale)
                    .maybe_hard_scale(parts.hard_scale.and_then(|h| parse_value(h, units)))
                    .hard_value(hard_value()?)
                    .build(),
            ))
        }
        'S' => {
            let internal = parts.soft_scale.map(|s| strip_quotes(s.trim())).unwrap_or_default();
            Ok(CiaoParameter::Select(
                SelectParameter::builder()
                    .name(parts.name)
                    .maybe_group(parts.group)
                    .internal_designation(internal)
                    .external_designation(strip_quotes(parts.value))
                    .build(),
            ))
        }
        tag => Err(ParameterError::UnknownType {
            tag,
            line: line.to_string(),
        }),
    }
}
