use crate::types::quantity::{Quantity, UnitRegistry};
use crate::types::value::{DATE_FORMAT, Value};
use crate::utils::strip_quotes;
use chrono::NaiveDateTime;
use tracing::warn;
use winnow::{
    Parser,
    ascii::{digit0, digit1, space1},
    combinator::{opt, preceded, separated},
    token::{one_of, rest},
};

/// Parses a number token: `[+-]digits[.digits][(e|E)[+-]digits]`
fn number<'s>(input: &mut &'s str) -> winnow::Result<&'s str> {
    (
        opt(one_of(['+', '-'])),
        digit1,
        opt(('.', digit0)),
        opt((one_of(['e', 'E']), opt(one_of(['+', '-'])), digit1)),
    )
        .take()
        .parse_next(input)
}

/// `<number>[ <unit>]`
fn single_number<'s>(input: &mut &'s str) -> winnow::Result<(&'s str, Option<&'s str>)> {
    (number, opt(preceded(space1, rest))).parse_next(input)
}

/// Two or more numbers with an optional trailing unit shared by all of them
fn number_list<'s>(input: &mut &'s str) -> winnow::Result<(Vec<&'s str>, Option<&'s str>)> {
    (
        separated(2.., number, space1),
        opt(preceded(space1, rest)),
    )
        .parse_next(input)
}

/// Unit text has no `:` and no digits, apart from a leading `1` in `1/s` and
/// exponents such as `m^2`
fn is_unit_text(text: &str) -> bool {
    let body = match text.strip_prefix('1') {
        Some(tail) if tail.starts_with('/') => tail,
        _ => text,
    };
    if body.is_empty() || body.contains(':') {
        return false;
    }

    let mut parts = body.split('^');
    let head_ok = parts
        .next()
        .is_some_and(|head| !head.chars().any(|c| c.is_ascii_digit()));
    head_ok
        && parts.all(|part| {
            let part = part.strip_prefix('-').unwrap_or(part);
            let tail = part.trim_start_matches(|c: char| c.is_ascii_digit());
            tail.len() < part.len() && !tail.chars().any(|c| c.is_ascii_digit())
        })
}

/// Rewrites unit transforms to registry symbols: `log(Pa)` becomes `log_Pa`,
/// and the `~m` spelling of micrometres becomes `µm`
fn normalize_unit(unit: &str) -> String {
    if unit == "~m" {
        return "µm".to_string();
    }
    unit.replace('(', "_").replace(')', "")
}

fn parse_scalar(token: &str) -> Value {
    if !token.contains(['.', 'e', 'E']) {
        if let Ok(v) = token.parse::<i64>() {
            return Value::Integer(v);
        }
    }
    // the grammar only admits valid float syntax
    Value::Float(token.parse::<f64>().unwrap_or(f64::NAN))
}

/// Parses the raw right-hand side of a header line.
///
/// Tried in order:
/// 1. empty input -> `None`
/// 2. a single number with an optional unit -> integer, float or quantity
/// 3. two or more numbers with an optional shared unit -> list or quantity list
/// 4. a `%I:%M:%S %p %a %b %d %Y` timestamp
/// 5. anything else -> text, surrounding double quotes removed
///
/// A unit the registry does not know is never an error: a warning is emitted and
/// the whole value is kept as text.
pub fn parse_value(raw: &str, units: &UnitRegistry) -> Option<Value> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok((token, unit)) = single_number.parse(text) {
        match unit {
            None => return Some(parse_scalar(token)),
            Some(unit) if is_unit_text(unit) => {
                let magnitude = parse_scalar(token).as_f64().unwrap_or(f64::NAN);
                let symbol = normalize_unit(unit);
                return Some(match units.parse_unit(&symbol) {
                    Some(unit) => Value::Quantity(Quantity::new(magnitude, unit)),
                    None => {
                        warn!(unit = %symbol, "Unrecognized unit, keeping value as text: {}", text);
                        Value::Text(text.to_string())
                    }
                });
            }
            Some(_) => {}
        }
    }

    if let Ok((tokens, unit)) = number_list.parse(text) {
        let magnitudes: Vec<f64> = tokens
            .iter()
            .map(|t| t.parse::<f64>().unwrap_or(f64::NAN))
            .collect();
        match unit {
            None => return Some(Value::List(magnitudes)),
            Some(unit) if is_unit_text(unit) => {
                let symbol = normalize_unit(unit);
                return Some(match units.parse_unit(&symbol) {
                    Some(unit) => Value::QuantityList(Quantity::new(magnitudes, unit)),
                    None => {
                        warn!(unit = %symbol, "Unrecognized unit, keeping value as text: {}", text);
                        Value::Text(text.to_string())
                    }
                });
            }
            Some(_) => {}
        }
    }

    if let Ok(timestamp) = NaiveDateTime::parse_from_str(text, DATE_FORMAT) {
        return Some(Value::Timestamp(timestamp));
    }

    Some(Value::Text(strip_quotes(text).to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    fn parse(raw: &str) -> Option<Value> {
        parse_value(raw, &UnitRegistry::default())
    }

    #[test]
    fn test_empty_is_absent() {
        assert_eq!(parse(""), None);
        assert_eq!(parse("   "), None);
    }

    #[test]
    fn test_plain_numbers() {
        assert_eq!(parse("5"), Some(Value::Integer(5)));
        assert_eq!(parse("-512"), Some(Value::Integer(-512)));
        assert_eq!(parse("1.5"), Some(Value::Float(1.5)));
        assert_eq!(parse("2e-3"), Some(Value::Float(0.002)));
        assert_eq!(parse("+7."), Some(Value::Float(7.0)));
    }

    #[test]
    fn test_number_with_unit() {
        let value = parse("1.5 V").unwrap();
        let q = value.as_quantity().unwrap();
        assert_eq!(q.unit().to_string(), "V");
        assert!((q.magnitude() - 1.5).abs() < 1e-12);

        let sens = parse("5.0 nm/V").unwrap();
        assert_eq!(sens.to_string(), "5.0 nm/V");

        let rate = parse("0.5 1/s").unwrap();
        assert_eq!(rate.as_quantity().unwrap().unit().to_string(), "1/s");

        // Latin-1 ordinal indicator used for degrees
        let angle = parse("90 º").unwrap();
        assert_eq!(angle.as_quantity().unwrap().unit().to_string(), "°");
    }

    #[test]
    fn test_log_units_normalized() {
        let value = parse("3.2 log(Pa)").unwrap();
        assert_eq!(value.as_quantity().unwrap().unit().to_string(), "log_Pa");
    }

    #[test]
    fn test_any_unit_transform_normalized() {
        use crate::types::quantity::{Dimension, UnitDefinition};

        let units = UnitRegistry::empty()
            .with_unit("log_A", UnitDefinition::new(1.0, Dimension::NONE, false));
        let value = parse_value("2 log(A)", &units).unwrap();
        let q = value.as_quantity().unwrap();
        assert_eq!(q.unit().to_string(), "log_A");
        assert!((q.magnitude() - 2.0).abs() < 1e-12);

        assert_eq!(normalize_unit("log(V)"), "log_V");
        assert_eq!(normalize_unit("nm"), "nm");
        assert_eq!(
            parse_value("2 log(B)", &units),
            Some(Value::Text("2 log(B)".to_string()))
        );
    }

    #[test]
    fn test_unknown_unit_passes_through() {
        assert_eq!(parse("3 FooBar"), Some(Value::Text("3 FooBar".to_string())));
    }

    #[test]
    fn test_lists() {
        assert_eq!(parse("0 0 0 5"), Some(Value::List(vec![0.0, 0.0, 0.0, 5.0])));

        let value = parse("1.0 2.0 3.0 µm").unwrap();
        match value {
            Value::QuantityList(q) => {
                assert_eq!(q.magnitude(), &vec![1.0, 2.0, 3.0]);
                assert_eq!(q.unit().to_string(), "µm");
            }
            other => panic!("expected a quantity list, got {other:?}"),
        }

        let tilde = parse("10 20 ~m").unwrap();
        assert_eq!(tilde.to_string(), "10.0 20.0 µm");
    }

    #[test]
    fn test_timestamp() {
        let value = parse("02:34:11 PM Wed May 24 2023").unwrap();
        let ts = value.as_timestamp().unwrap();
        assert_eq!((ts.year(), ts.month(), ts.day()), (2023, 5, 24));
        assert_eq!((ts.hour(), ts.minute(), ts.second()), (14, 34, 11));
        assert_eq!(value.to_string(), "02:34:11 PM Wed May 24 2023");
    }

    #[test]
    fn test_text_fallback() {
        assert_eq!(parse("\"Height\""), Some(Value::Text("Height".to_string())));
        assert_eq!(parse("Sens. Zsens"), Some(Value::Text("Sens. Zsens".to_string())));
        assert_eq!(parse("1:2"), Some(Value::Text("1:2".to_string())));
        assert_eq!(parse("0x09200201"), Some(Value::Text("0x09200201".to_string())));
    }

    #[test]
    fn test_unit_text_rules() {
        assert!(is_unit_text("nm"));
        assert!(is_unit_text("1/s"));
        assert!(is_unit_text("µm^2"));
        assert!(!is_unit_text("2.0 3.0 µm"));
        assert!(!is_unit_text("a:b"));
        assert!(!is_unit_text("m^"));
    }
}
