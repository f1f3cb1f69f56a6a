//! Physical quantities and the unit registry used while parsing header values.
//!
//! A [`Unit`] is a product of registered symbols raised to integer powers. Equal
//! symbols cancel, so `V * nm/V` yields `nm`. The [`UnitRegistry`] is a plain value:
//! build one, hand it to the parsers, and nothing global is ever touched.

use crate::error::UnitError;
use ndarray::{Array1, Array2};
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};
use std::f64::consts::PI;
use std::fmt;
use std::ops::{Add, Div, Mul, Sub};
use winnow::{
    Parser,
    ascii::digit1,
    combinator::{alt, opt, peek, preceded, repeat, terminated},
    token::{one_of, take_while},
};

/// Exponents of the SI base dimensions:
/// length, mass, time, current, temperature, amount, luminous intensity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Dimension([i8; 7]);

impl Dimension {
    pub const NONE: Dimension = Dimension([0; 7]);
    pub const LENGTH: Dimension = Dimension([1, 0, 0, 0, 0, 0, 0]);
    pub const MASS: Dimension = Dimension([0, 1, 0, 0, 0, 0, 0]);
    pub const TIME: Dimension = Dimension([0, 0, 1, 0, 0, 0, 0]);
    pub const CURRENT: Dimension = Dimension([0, 0, 0, 1, 0, 0, 0]);
    pub const TEMPERATURE: Dimension = Dimension([0, 0, 0, 0, 1, 0, 0]);
    pub const AMOUNT: Dimension = Dimension([0, 0, 0, 0, 0, 1, 0]);
    pub const LUMINOSITY: Dimension = Dimension([0, 0, 0, 0, 0, 0, 1]);

    /// Dimension from explicit base exponents
    pub const fn new(exponents: [i8; 7]) -> Self {
        Self(exponents)
    }

    pub fn is_dimensionless(&self) -> bool {
        *self == Self::NONE
    }

    /// Raise every base exponent by `power`
    pub fn powi(self, power: i32) -> Self {
        let mut out = self.0;
        for e in out.iter_mut() {
            *e = (*e as i32 * power) as i8;
        }
        Self(out)
    }

    fn combine(self, other: Self, sign: i8) -> Self {
        let mut out = self.0;
        for (e, o) in out.iter_mut().zip(other.0) {
            *e += sign * o;
        }
        Self(out)
    }
}

impl Mul for Dimension {
    type Output = Dimension;

    fn mul(self, rhs: Self) -> Self {
        self.combine(rhs, 1)
    }
}

impl Div for Dimension {
    type Output = Dimension;

    fn div(self, rhs: Self) -> Self {
        self.combine(rhs, -1)
    }
}

/// Definition of a registered unit symbol
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitDefinition {
    /// Multiplier converting one of this unit into the SI-coherent unit of its dimension
    pub factor: f64,
    pub dimension: Dimension,
    /// Whether SI prefixes (`n`, `µ`, `k`, ...) may be attached
    pub prefixable: bool,
}

impl UnitDefinition {
    pub const fn new(factor: f64, dimension: Dimension, prefixable: bool) -> Self {
        Self {
            factor,
            dimension,
            prefixable,
        }
    }
}

/// A compound unit: registered symbols with integer exponents
#[derive(Debug, Clone)]
pub struct Unit {
    terms: BTreeMap<String, i32>,
    factor: f64,
    dimension: Dimension,
}

impl Unit {
    /// The unit of a bare number
    pub fn dimensionless() -> Self {
        Self {
            terms: BTreeMap::new(),
            factor: 1.0,
            dimension: Dimension::NONE,
        }
    }

    /// A unit made of a single symbol
    pub fn single(symbol: impl Into<String>, factor: f64, dimension: Dimension) -> Self {
        let mut terms = BTreeMap::new();
        terms.insert(symbol.into(), 1);
        Self {
            terms,
            factor,
            dimension,
        }
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }

    pub fn dimension(&self) -> Dimension {
        self.dimension
    }

    pub fn is_dimensionless(&self) -> bool {
        self.terms.is_empty()
    }

    /// Whether a quantity in `self` can be expressed in `other`
    pub fn is_compatible(&self, other: &Unit) -> bool {
        self.dimension == other.dimension
    }

    /// Factor converting magnitudes in `self` into magnitudes in `target`
    pub fn conversion_factor(&self, target: &Unit) -> Result<f64, UnitError> {
        if !self.is_compatible(target) {
            return Err(UnitError::Incompatible {
                from: self.to_string(),
                to: target.to_string(),
            });
        }
        Ok(self.factor / target.factor)
    }

    pub fn powi(&self, power: i32) -> Unit {
        let terms = self
            .terms
            .iter()
            .filter(|_| power != 0)
            .map(|(symbol, exp)| (symbol.clone(), exp * power))
            .collect();
        Unit {
            terms,
            factor: self.factor.powi(power),
            dimension: self.dimension.powi(power),
        }
    }

    fn combine(&self, other: &Unit, sign: i32) -> Unit {
        let mut terms = self.terms.clone();
        for (symbol, exp) in &other.terms {
            let entry = terms.entry(symbol.clone()).or_insert(0);
            *entry += sign * exp;
        }
        terms.retain(|_, exp| *exp != 0);

        let (factor, dimension) = if sign > 0 {
            (self.factor * other.factor, self.dimension * other.dimension)
        } else {
            (self.factor / other.factor, self.dimension / other.dimension)
        };
        Unit {
            terms,
            factor,
            dimension,
        }
    }
}

impl PartialEq for Unit {
    fn eq(&self, other: &Self) -> bool {
        self.terms == other.terms
    }
}

impl Mul for &Unit {
    type Output = Unit;

    fn mul(self, rhs: &Unit) -> Unit {
        self.combine(rhs, 1)
    }
}

impl Div for &Unit {
    type Output = Unit;

    fn div(self, rhs: &Unit) -> Unit {
        self.combine(rhs, -1)
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn write_term(f: &mut fmt::Formatter<'_>, symbol: &str, exp: i32) -> fmt::Result {
            if exp == 1 {
                write!(f, "{symbol}")
            } else {
                write!(f, "{symbol}^{exp}")
            }
        }

        let mut numerator = self.terms.iter().filter(|(_, exp)| **exp > 0).peekable();
        if numerator.peek().is_none() && !self.terms.is_empty() {
            write!(f, "1")?;
        }
        for (i, (symbol, exp)) in numerator.enumerate() {
            if i > 0 {
                write!(f, "*")?;
            }
            write_term(f, symbol, *exp)?;
        }
        for (symbol, exp) in self.terms.iter().filter(|(_, exp)| **exp < 0) {
            write!(f, "/")?;
            write_term(f, symbol, -exp)?;
        }
        Ok(())
    }
}

impl Serialize for Unit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// SI prefixes in lookup order (two-letter prefixes first).
/// Each entry is (written form, canonical form, factor).
const PREFIXES: &[(&str, &str, f64)] = &[
    ("da", "da", 1e1),
    ("Y", "Y", 1e24),
    ("Z", "Z", 1e21),
    ("E", "E", 1e18),
    ("P", "P", 1e15),
    ("T", "T", 1e12),
    ("G", "G", 1e9),
    ("M", "M", 1e6),
    ("k", "k", 1e3),
    ("h", "h", 1e2),
    ("d", "d", 1e-1),
    ("c", "c", 1e-2),
    ("m", "m", 1e-3),
    ("µ", "µ", 1e-6),
    ("μ", "µ", 1e-6),
    ("u", "µ", 1e-6),
    ("n", "n", 1e-9),
    ("p", "p", 1e-12),
    ("f", "f", 1e-15),
    ("a", "a", 1e-18),
    ("z", "z", 1e-21),
    ("y", "y", 1e-24),
];

#[derive(Debug, Clone)]
struct RegisteredUnit {
    canonical: String,
    definition: UnitDefinition,
}

/// Immutable lookup table from unit symbols to definitions.
///
/// `UnitRegistry::default()` knows the SI base and derived units, the usual
/// non-SI lengths and angles, and the instrument pseudo-units found in NanoScope
/// headers (`LSB`, `Arb`, `log_V`, ...). Tests can start from
/// [`UnitRegistry::empty`] to control exactly which symbols resolve.
#[derive(Debug, Clone)]
pub struct UnitRegistry {
    units: HashMap<String, RegisteredUnit>,
}

impl UnitRegistry {
    /// A registry that knows no units at all
    pub fn empty() -> Self {
        Self {
            units: HashMap::new(),
        }
    }

    /// Register a symbol
    pub fn with_unit(mut self, symbol: impl Into<String>, definition: UnitDefinition) -> Self {
        let symbol = symbol.into();
        self.units.insert(
            symbol.clone(),
            RegisteredUnit {
                canonical: symbol,
                definition,
            },
        );
        self
    }

    /// Register `alias` as another spelling of the already registered `target`.
    /// Unknown targets are ignored.
    pub fn with_alias(mut self, alias: impl Into<String>, target: &str) -> Self {
        if let Some(registered) = self.units.get(target).cloned() {
            self.units.insert(alias.into(), registered);
        }
        self
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.lookup(symbol).is_some()
    }

    /// Resolve a single symbol, allowing an SI prefix on prefixable units
    pub fn lookup(&self, symbol: &str) -> Option<Unit> {
        if let Some(registered) = self.units.get(symbol) {
            let def = registered.definition;
            return Some(Unit::single(
                registered.canonical.clone(),
                def.factor,
                def.dimension,
            ));
        }

        PREFIXES.iter().find_map(|(written, canonical, scale)| {
            let base = symbol.strip_prefix(written)?;
            let registered = self.units.get(base)?;
            let def = registered.definition;
            def.prefixable.then(|| {
                Unit::single(
                    format!("{canonical}{}", registered.canonical),
                    scale * def.factor,
                    def.dimension,
                )
            })
        })
    }

    /// Resolve a compound unit expression such as `nm/V`, `V/LSB`, `1/s` or `m^2`.
    /// Returns `None` if any symbol is unknown or the expression is malformed.
    pub fn parse_unit(&self, text: &str) -> Option<Unit> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let (first, rest) = unit_terms.parse(text).ok()?;

        let mut unit = Unit::dimensionless();
        if let Some((symbol, exp)) = first {
            unit = &unit * &self.lookup(symbol)?.powi(exp);
        }
        for (op, (symbol, exp)) in rest {
            let term = self.lookup(symbol)?.powi(exp);
            unit = if op == '/' { &unit / &term } else { &unit * &term };
        }
        Some(unit)
    }
}

impl Default for UnitRegistry {
    fn default() -> Self {
        let d = Dimension::new;
        Self::empty()
            // SI base units
            .with_unit("m", UnitDefinition::new(1.0, Dimension::LENGTH, true))
            .with_unit("g", UnitDefinition::new(1e-3, Dimension::MASS, true))
            .with_unit("s", UnitDefinition::new(1.0, Dimension::TIME, true))
            .with_unit("A", UnitDefinition::new(1.0, Dimension::CURRENT, true))
            .with_unit("K", UnitDefinition::new(1.0, Dimension::TEMPERATURE, true))
            .with_unit("mol", UnitDefinition::new(1.0, Dimension::AMOUNT, true))
            .with_unit("cd", UnitDefinition::new(1.0, Dimension::LUMINOSITY, true))
            // derived units
            .with_unit("Hz", UnitDefinition::new(1.0, d([0, 0, -1, 0, 0, 0, 0]), true))
            .with_unit("N", UnitDefinition::new(1.0, d([1, 1, -2, 0, 0, 0, 0]), true))
            .with_unit("Pa", UnitDefinition::new(1.0, d([-1, 1, -2, 0, 0, 0, 0]), true))
            .with_unit("J", UnitDefinition::new(1.0, d([2, 1, -2, 0, 0, 0, 0]), true))
            .with_unit("W", UnitDefinition::new(1.0, d([2, 1, -3, 0, 0, 0, 0]), true))
            .with_unit("C", UnitDefinition::new(1.0, d([0, 0, 1, 1, 0, 0, 0]), true))
            .with_unit("V", UnitDefinition::new(1.0, d([2, 1, -3, -1, 0, 0, 0]), true))
            .with_unit("Ω", UnitDefinition::new(1.0, d([2, 1, -3, -2, 0, 0, 0]), true))
            .with_alias("ohm", "Ω")
            .with_unit("S", UnitDefinition::new(1.0, d([-2, -1, 3, 2, 0, 0, 0]), true))
            .with_unit("F", UnitDefinition::new(1.0, d([-2, -1, 4, 2, 0, 0, 0]), true))
            .with_unit("T", UnitDefinition::new(1.0, d([0, 1, -2, -1, 0, 0, 0]), true))
            // non-SI units that show up in scan parameters
            .with_unit("Å", UnitDefinition::new(1e-10, Dimension::LENGTH, false))
            .with_unit("min", UnitDefinition::new(60.0, Dimension::TIME, false))
            .with_unit("h", UnitDefinition::new(3600.0, Dimension::TIME, false))
            .with_unit("rad", UnitDefinition::new(1.0, Dimension::NONE, true))
            .with_unit("°", UnitDefinition::new(PI / 180.0, Dimension::NONE, false))
            .with_alias("º", "°")
            .with_alias("deg", "°")
            .with_alias("degree", "°")
            .with_unit("%", UnitDefinition::new(0.01, Dimension::NONE, false))
            // instrument pseudo-units
            .with_unit("LSB", UnitDefinition::new(1.0, Dimension::NONE, false))
            .with_unit("Arb", UnitDefinition::new(1.0, Dimension::NONE, false))
            .with_unit("log_Arb", UnitDefinition::new(1.0, Dimension::NONE, false))
            .with_unit("log_V", UnitDefinition::new(1.0, Dimension::NONE, false))
            .with_unit("log_Pa", UnitDefinition::new(1.0, Dimension::NONE, false))
    }
}

type Term<'s> = (&'s str, i32);

fn unit_symbol<'s>(input: &mut &'s str) -> winnow::Result<&'s str> {
    take_while(1.., |c: char| !matches!(c, '*' | '/' | '·' | '^' | ' ')).parse_next(input)
}

fn unit_exponent(input: &mut &str) -> winnow::Result<i32> {
    preceded('^', (opt('-'), digit1).take().parse_to()).parse_next(input)
}

fn unit_term<'s>(input: &mut &'s str) -> winnow::Result<Term<'s>> {
    (unit_symbol, opt(unit_exponent))
        .map(|(symbol, exp)| (symbol, exp.unwrap_or(1)))
        .parse_next(input)
}

/// `1/s` style expressions start with a bare `1` that contributes nothing
fn unit_terms<'s>(input: &mut &'s str) -> winnow::Result<(Option<Term<'s>>, Vec<(char, Term<'s>)>)> {
    let first = alt((terminated("1", peek('/')).value(None), unit_term.map(Some)))
        .parse_next(input)?;
    let rest = repeat(0.., (one_of(['*', '/', '·']), unit_term)).parse_next(input)?;
    Ok((first, rest))
}

/// Element type usable as the magnitude of a [`Quantity`]
pub trait Magnitude:
    Clone
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Mul<f64, Output = Self>
{
    /// Shape used to validate element-wise arithmetic; empty for scalars
    fn shape_vec(&self) -> Vec<usize>;
}

impl Magnitude for f64 {
    fn shape_vec(&self) -> Vec<usize> {
        Vec::new()
    }
}

impl Magnitude for Array1<f64> {
    fn shape_vec(&self) -> Vec<usize> {
        self.shape().to_vec()
    }
}

impl Magnitude for Array2<f64> {
    fn shape_vec(&self) -> Vec<usize> {
        self.shape().to_vec()
    }
}

/// A magnitude paired with a unit.
///
/// The same type carries scalar header values (`Quantity<f64>`), coordinate axes
/// (`Quantity<Array1<f64>>`) and calibrated images (`Quantity<Array2<f64>>`), so the
/// arithmetic below is written once for all of them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quantity<T> {
    magnitude: T,
    unit: Unit,
}

impl<T> Quantity<T> {
    pub fn new(magnitude: T, unit: Unit) -> Self {
        Self { magnitude, unit }
    }

    pub fn dimensionless(magnitude: T) -> Self {
        Self::new(magnitude, Unit::dimensionless())
    }

    pub fn magnitude(&self) -> &T {
        &self.magnitude
    }

    pub fn unit(&self) -> &Unit {
        &self.unit
    }

    pub fn into_parts(self) -> (T, Unit) {
        (self.magnitude, self.unit)
    }

    /// Transform the magnitude, keeping the unit
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Quantity<U> {
        Quantity::new(f(self.magnitude), self.unit)
    }
}

impl<T: Magnitude> Quantity<T> {
    /// Express this quantity in `unit`
    pub fn to(&self, unit: &Unit) -> Result<Self, UnitError> {
        let factor = self.unit.conversion_factor(unit)?;
        Ok(Self::new(self.magnitude.clone() * factor, unit.clone()))
    }

    /// Sum in the unit of `self`; `other` is converted first
    pub fn try_add(&self, other: &Self) -> Result<Self, UnitError> {
        let rhs = self.aligned(other)?;
        Ok(Self::new(self.magnitude.clone() + rhs, self.unit.clone()))
    }

    /// Difference in the unit of `self`; `other` is converted first
    pub fn try_sub(&self, other: &Self) -> Result<Self, UnitError> {
        let rhs = self.aligned(other)?;
        Ok(Self::new(self.magnitude.clone() - rhs, self.unit.clone()))
    }

    /// Element-wise product, units multiply
    pub fn try_mul(&self, other: &Self) -> Result<Self, UnitError> {
        self.check_shape(other)?;
        Ok(Self::new(
            self.magnitude.clone() * other.magnitude.clone(),
            &self.unit * &other.unit,
        ))
    }

    /// Element-wise ratio, units divide
    pub fn try_div(&self, other: &Self) -> Result<Self, UnitError> {
        self.check_shape(other)?;
        Ok(Self::new(
            self.magnitude.clone() / other.magnitude.clone(),
            &self.unit / &other.unit,
        ))
    }

    /// Multiply by a scalar quantity; the result carries the product unit
    pub fn scale(&self, factor: &Quantity<f64>) -> Self {
        Self::new(
            self.magnitude.clone() * factor.magnitude,
            &self.unit * &factor.unit,
        )
    }

    fn aligned(&self, other: &Self) -> Result<T, UnitError> {
        self.check_shape(other)?;
        let factor = other.unit.conversion_factor(&self.unit)?;
        Ok(other.magnitude.clone() * factor)
    }

    fn check_shape(&self, other: &Self) -> Result<(), UnitError> {
        let (left, right) = (self.magnitude.shape_vec(), other.magnitude.shape_vec());
        if left != right {
            return Err(UnitError::ShapeMismatch { left, right });
        }
        Ok(())
    }
}

impl<T: Magnitude> Mul<f64> for Quantity<T> {
    type Output = Quantity<T>;

    fn mul(self, rhs: f64) -> Self::Output {
        Quantity::new(self.magnitude * rhs, self.unit)
    }
}

impl<T: Magnitude> Div<f64> for Quantity<T> {
    type Output = Quantity<T>;

    fn div(self, rhs: f64) -> Self::Output {
        Quantity::new(self.magnitude * rhs.recip(), self.unit)
    }
}

/// Shortest representation that always reads back as a float (`5.0`, `1e-7`)
pub(crate) fn format_float(value: f64) -> String {
    format!("{value:?}")
}

impl fmt::Display for Quantity<f64> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format_float(self.magnitude))?;
        if !self.unit.is_dimensionless() {
            write!(f, " {}", self.unit)?;
        }
        Ok(())
    }
}

impl fmt::Display for Quantity<Vec<f64>> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, value) in self.magnitude.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", format_float(*value))?;
        }
        if !self.unit.is_dimensionless() {
            write!(f, " {}", self.unit)?;
        }
        Ok(())
    }
}
