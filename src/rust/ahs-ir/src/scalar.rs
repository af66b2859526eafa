// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Scalar expressions.
//!
//! A [`Scalar`] is an immutable expression over decimal literals and named
//! variables. All constructors go through the canonicalizing helpers below, so
//! every tree observed by a client is already in normal form.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::decimal::Decimal;
use crate::error::{Error, Result};
use crate::params::{Assignments, ParamValue, scalar_value};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scalar {
    Literal(Decimal),
    Variable(String),
    Negative(Arc<Scalar>),
    Add(Arc<Scalar>, Arc<Scalar>),
    Mul(Arc<Scalar>, Arc<Scalar>),
    Div(Arc<Scalar>, Arc<Scalar>),
    Min(BTreeSet<Scalar>),
    Max(BTreeSet<Scalar>),
    Slice(Arc<Scalar>, Interval),
}

/// Half-open pair of optional bounds. At least one bound is present.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Interval {
    start: Option<Arc<Scalar>>,
    stop: Option<Arc<Scalar>>,
}

impl Interval {
    pub fn new(start: Option<Scalar>, stop: Option<Scalar>) -> Result<Self> {
        if start.is_none() && stop.is_none() {
            return Err(Error::InvalidInput(
                "An interval requires a start or a stop bound.".to_string(),
            ));
        }
        Ok(Interval {
            start: start.map(Arc::new),
            stop: stop.map(Arc::new),
        })
    }

    pub fn range(start: Scalar, stop: Scalar) -> Self {
        Interval {
            start: Some(Arc::new(start)),
            stop: Some(Arc::new(stop)),
        }
    }

    pub fn start(&self) -> Option<&Scalar> {
        self.start.as_deref()
    }

    pub fn stop(&self) -> Option<&Scalar> {
        self.stop.as_deref()
    }

    /// Apply `f` to both bounds.
    pub fn try_map<E>(
        &self,
        mut f: impl FnMut(&Scalar) -> std::result::Result<Scalar, E>,
    ) -> std::result::Result<Interval, E> {
        Ok(Interval {
            start: self.start.as_deref().map(&mut f).transpose()?.map(Arc::new),
            stop: self.stop.as_deref().map(&mut f).transpose()?.map(Arc::new),
        })
    }

    pub fn assign(&self, assignments: &Assignments) -> Result<Interval> {
        self.try_map(|s| s.assign(assignments))
    }

    pub fn canonicalize(&self) -> Interval {
        Interval {
            start: self.start.as_ref().map(|s| Arc::new(s.canonicalize())),
            stop: self.stop.as_ref().map(|s| Arc::new(s.canonicalize())),
        }
    }

    fn collect_variables(&self, out: &mut BTreeSet<String>) {
        if let Some(start) = &self.start {
            start.collect_variables(out);
        }
        if let Some(stop) = &self.stop {
            stop.collect_variables(out);
        }
    }

    /// Resolve the bounds against a total length, validating them.
    pub fn resolve(&self, length: &Decimal, assignments: &Assignments) -> Result<(Decimal, Decimal)> {
        let start = match &self.start {
            Some(s) => s.eval(assignments)?,
            None => Decimal::zero(),
        };
        let stop = match &self.stop {
            Some(s) => s.eval(assignments)?,
            None => length.clone(),
        };
        check_bounds(&start, &stop, length)?;
        Ok((start, stop))
    }
}

fn check_bounds(start: &Decimal, stop: &Decimal, length: &Decimal) -> Result<()> {
    if start.is_negative() {
        return Err(Error::Bounds(format!(
            "Slice start {start} is negative."
        )));
    }
    if stop > length {
        return Err(Error::Bounds(format!(
            "Slice stop {stop} is beyond the duration {length}."
        )));
    }
    if stop < start {
        return Err(Error::Bounds(format!(
            "Slice stop {stop} is before start {start}."
        )));
    }
    Ok(())
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(start) = &self.start {
            write!(f, "{start}")?;
        }
        write!(f, ":")?;
        if let Some(stop) = &self.stop {
            write!(f, "{stop}")?;
        }
        Ok(())
    }
}

pub fn is_valid_variable_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl Scalar {
    pub fn literal(value: impl Into<Decimal>) -> Scalar {
        Scalar::Literal(value.into())
    }

    pub fn zero() -> Scalar {
        Scalar::Literal(Decimal::zero())
    }

    pub fn one() -> Scalar {
        Scalar::Literal(Decimal::one())
    }

    /// Create a variable, validating its name.
    pub fn var(name: impl Into<String>) -> Result<Scalar> {
        let name = name.into();
        if !is_valid_variable_name(&name) {
            return Err(Error::InvalidInput(format!(
                "'{name}' is not a valid variable name."
            )));
        }
        Ok(Scalar::Variable(name))
    }

    pub fn as_literal(&self) -> Option<&Decimal> {
        match self {
            Scalar::Literal(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_literal_zero(&self) -> bool {
        self.as_literal().is_some_and(Decimal::is_zero)
    }

    pub fn negate(value: Scalar) -> Scalar {
        match value {
            Scalar::Literal(v) => Scalar::Literal(-v),
            Scalar::Negative(inner) => Arc::unwrap_or_clone(inner),
            other => Scalar::Negative(Arc::new(other)),
        }
    }

    pub fn sum(lhs: Scalar, rhs: Scalar) -> Scalar {
        match (&lhs, &rhs) {
            (Scalar::Literal(a), Scalar::Literal(b)) => Scalar::Literal(a + b),
            (Scalar::Literal(a), _) if a.is_zero() => rhs,
            (_, Scalar::Literal(b)) if b.is_zero() => lhs,
            (_, Scalar::Negative(inner)) if **inner == lhs => Scalar::zero(),
            (Scalar::Negative(inner), _) if **inner == rhs => Scalar::zero(),
            _ => Scalar::Add(Arc::new(lhs), Arc::new(rhs)),
        }
    }

    pub fn product(lhs: Scalar, rhs: Scalar) -> Scalar {
        match (&lhs, &rhs) {
            (Scalar::Literal(a), Scalar::Literal(b)) => Scalar::Literal(a * b),
            (Scalar::Literal(a), _) | (_, Scalar::Literal(a)) if a.is_zero() => Scalar::zero(),
            (Scalar::Literal(a), _) if a.is_one() => rhs,
            (_, Scalar::Literal(b)) if b.is_one() => lhs,
            (Scalar::Literal(a), _) if (-a).is_one() => Scalar::negate(rhs),
            (_, Scalar::Literal(b)) if (-b).is_one() => Scalar::negate(lhs),
            _ => Scalar::Mul(Arc::new(lhs), Arc::new(rhs)),
        }
    }

    pub fn quotient(lhs: Scalar, rhs: Scalar) -> Scalar {
        match (&lhs, &rhs) {
            (_, Scalar::Literal(b)) if b.is_one() => lhs,
            (Scalar::Literal(a), Scalar::Literal(b)) if !b.is_zero() => {
                Scalar::Literal(a.checked_div(b).unwrap_or_default())
            }
            _ => Scalar::Div(Arc::new(lhs), Arc::new(rhs)),
        }
    }

    /// N-ary minimum. Structurally equal operands collapse.
    pub fn min_of(values: impl IntoIterator<Item = Scalar>) -> Result<Scalar> {
        Self::extremum(values, true)
    }

    /// N-ary maximum. Structurally equal operands collapse.
    pub fn max_of(values: impl IntoIterator<Item = Scalar>) -> Result<Scalar> {
        Self::extremum(values, false)
    }

    /// Maximum of two operands.
    pub fn max_pair(lhs: Scalar, rhs: Scalar) -> Scalar {
        match Self::extremum([lhs, rhs], false) {
            Ok(value) => value,
            Err(_) => Scalar::zero(),
        }
    }

    fn extremum(values: impl IntoIterator<Item = Scalar>, is_min: bool) -> Result<Scalar> {
        let mut operands = BTreeSet::new();
        let mut literal: Option<Decimal> = None;
        let mut push = |value: Scalar, operands: &mut BTreeSet<Scalar>| match value {
            Scalar::Literal(v) => {
                literal = Some(match literal.take() {
                    None => v,
                    Some(current) if is_min => current.min(v),
                    Some(current) => current.max(v),
                });
            }
            other => {
                operands.insert(other);
            }
        };
        for value in values {
            match value {
                Scalar::Min(inner) if is_min => inner.into_iter().for_each(|v| push(v, &mut operands)),
                Scalar::Max(inner) if !is_min => inner.into_iter().for_each(|v| push(v, &mut operands)),
                other => push(other, &mut operands),
            }
        }
        if let Some(v) = literal {
            operands.insert(Scalar::Literal(v));
        }
        match operands.len() {
            0 => Err(Error::InvalidInput(
                "min/max requires at least one operand.".to_string(),
            )),
            1 => Ok(operands.into_iter().next().unwrap_or_else(Scalar::zero)),
            _ if is_min => Ok(Scalar::Min(operands)),
            _ => Ok(Scalar::Max(operands)),
        }
    }

    /// Length of `interval` applied to an expression of total length `self`.
    pub fn slice(expr: Scalar, interval: Interval) -> Scalar {
        if let Some(length) = expr.as_literal() {
            let start = match interval.start() {
                None => Some(Decimal::zero()),
                Some(s) => s.as_literal().cloned(),
            };
            let stop = match interval.stop() {
                None => Some(length.clone()),
                Some(s) => s.as_literal().cloned(),
            };
            if let (Some(start), Some(stop)) = (start, stop) {
                if check_bounds(&start, &stop, length).is_ok() {
                    return Scalar::Literal(stop - start);
                }
            }
        }
        Scalar::Slice(Arc::new(expr), interval)
    }

    /// Rebuild the tree through the canonicalizing constructors.
    pub fn canonicalize(&self) -> Scalar {
        match self {
            Scalar::Literal(_) | Scalar::Variable(_) => self.clone(),
            Scalar::Negative(x) => Scalar::negate(x.canonicalize()),
            Scalar::Add(a, b) => Scalar::sum(a.canonicalize(), b.canonicalize()),
            Scalar::Mul(a, b) => Scalar::product(a.canonicalize(), b.canonicalize()),
            Scalar::Div(a, b) => Scalar::quotient(a.canonicalize(), b.canonicalize()),
            Scalar::Min(values) => Scalar::min_of(values.iter().map(Scalar::canonicalize))
                .unwrap_or_else(|_| self.clone()),
            Scalar::Max(values) => Scalar::max_of(values.iter().map(Scalar::canonicalize))
                .unwrap_or_else(|_| self.clone()),
            Scalar::Slice(expr, interval) => {
                Scalar::slice(expr.canonicalize(), interval.canonicalize())
            }
        }
    }

    /// Evaluate with exact arithmetic.
    pub fn eval(&self, assignments: &Assignments) -> Result<Decimal> {
        match self {
            Scalar::Literal(v) => Ok(v.clone()),
            Scalar::Variable(name) => scalar_value(assignments, name).cloned(),
            Scalar::Negative(x) => Ok(-x.eval(assignments)?),
            Scalar::Add(a, b) => Ok(a.eval(assignments)? + b.eval(assignments)?),
            Scalar::Mul(a, b) => Ok(a.eval(assignments)? * b.eval(assignments)?),
            Scalar::Div(a, b) => {
                let denominator = b.eval(assignments)?;
                a.eval(assignments)?.checked_div(&denominator).ok_or_else(|| {
                    Error::InvalidInput(format!("Division by zero in '{self}'."))
                })
            }
            Scalar::Min(values) => values
                .iter()
                .map(|v| v.eval(assignments))
                .try_fold(None, |acc: Option<Decimal>, v| {
                    let v = v?;
                    Ok::<_, Error>(Some(match acc {
                        None => v,
                        Some(a) => a.min(v),
                    }))
                })?
                .ok_or_else(|| Error::new("Empty min expression.")),
            Scalar::Max(values) => values
                .iter()
                .map(|v| v.eval(assignments))
                .try_fold(None, |acc: Option<Decimal>, v| {
                    let v = v?;
                    Ok::<_, Error>(Some(match acc {
                        None => v,
                        Some(a) => a.max(v),
                    }))
                })?
                .ok_or_else(|| Error::new("Empty max expression.")),
            Scalar::Slice(expr, interval) => {
                let length = expr.eval(assignments)?;
                let (start, stop) = interval.resolve(&length, assignments)?;
                Ok(stop - start)
            }
        }
    }

    /// Substitute assigned variables with literals, leaving the others untouched.
    pub fn assign(&self, assignments: &Assignments) -> Result<Scalar> {
        Ok(match self {
            Scalar::Literal(_) => self.clone(),
            Scalar::Variable(name) => match assignments.get(name) {
                Some(ParamValue::Scalar(v)) => Scalar::Literal(v.clone()),
                Some(ParamValue::Vector(_)) => {
                    return Err(Error::InvalidInput(format!(
                        "Variable '{name}' is bound to a vector where a scalar is expected."
                    )));
                }
                None => self.clone(),
            },
            Scalar::Negative(x) => Scalar::negate(x.assign(assignments)?),
            Scalar::Add(a, b) => Scalar::sum(a.assign(assignments)?, b.assign(assignments)?),
            Scalar::Mul(a, b) => Scalar::product(a.assign(assignments)?, b.assign(assignments)?),
            Scalar::Div(a, b) => Scalar::quotient(a.assign(assignments)?, b.assign(assignments)?),
            Scalar::Min(values) => Scalar::min_of(
                values
                    .iter()
                    .map(|v| v.assign(assignments))
                    .collect::<Result<Vec<_>>>()?,
            )?,
            Scalar::Max(values) => Scalar::max_of(
                values
                    .iter()
                    .map(|v| v.assign(assignments))
                    .collect::<Result<Vec<_>>>()?,
            )?,
            Scalar::Slice(expr, interval) => {
                Scalar::slice(expr.assign(assignments)?, interval.assign(assignments)?)
            }
        })
    }

    pub(crate) fn collect_variables(&self, out: &mut BTreeSet<String>) {
        match self {
            Scalar::Literal(_) => {}
            Scalar::Variable(name) => {
                out.insert(name.clone());
            }
            Scalar::Negative(x) => x.collect_variables(out),
            Scalar::Add(a, b) | Scalar::Mul(a, b) | Scalar::Div(a, b) => {
                a.collect_variables(out);
                b.collect_variables(out);
            }
            Scalar::Min(values) | Scalar::Max(values) => {
                values.iter().for_each(|v| v.collect_variables(out))
            }
            Scalar::Slice(expr, interval) => {
                expr.collect_variables(out);
                interval.collect_variables(out);
            }
        }
    }

    /// Names of all variables in the expression.
    pub fn free_variables(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_variables(&mut out);
        out
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Literal(v) => write!(f, "{v}"),
            Scalar::Variable(name) => write!(f, "{name}"),
            Scalar::Negative(x) => write!(f, "-{x}"),
            Scalar::Add(a, b) => match &**b {
                Scalar::Negative(inner) => write!(f, "({a} - {inner})"),
                Scalar::Literal(v) if v.is_negative() => write!(f, "({a} - {})", v.abs()),
                _ => write!(f, "({a} + {b})"),
            },
            Scalar::Mul(a, b) => write!(f, "({a} * {b})"),
            Scalar::Div(a, b) => write!(f, "({a} / {b})"),
            Scalar::Min(values) | Scalar::Max(values) => {
                let name = if matches!(self, Scalar::Min(_)) { "min" } else { "max" };
                let items: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(f, "{name}({})", items.join(", "))
            }
            Scalar::Slice(expr, interval) => write!(f, "{expr}[{interval}]"),
        }
    }
}

macro_rules! impl_scalar_op {
    ($op:ident, $method:ident, $ctor:path) => {
        impl std::ops::$op for Scalar {
            type Output = Scalar;

            fn $method(self, rhs: Scalar) -> Scalar {
                $ctor(self, rhs)
            }
        }

        impl std::ops::$op<&Scalar> for &Scalar {
            type Output = Scalar;

            fn $method(self, rhs: &Scalar) -> Scalar {
                $ctor(self.clone(), rhs.clone())
            }
        }
    };
}

fn difference(lhs: Scalar, rhs: Scalar) -> Scalar {
    Scalar::sum(lhs, Scalar::negate(rhs))
}

impl_scalar_op!(Add, add, Scalar::sum);
impl_scalar_op!(Sub, sub, difference);
impl_scalar_op!(Mul, mul, Scalar::product);
impl_scalar_op!(Div, div, Scalar::quotient);

impl std::ops::Neg for Scalar {
    type Output = Scalar;

    fn neg(self) -> Scalar {
        Scalar::negate(self)
    }
}

impl std::ops::Neg for &Scalar {
    type Output = Scalar;

    fn neg(self) -> Scalar {
        Scalar::negate(self.clone())
    }
}

impl From<Decimal> for Scalar {
    fn from(value: Decimal) -> Self {
        Scalar::Literal(value)
    }
}

/// Conversion of user input into a [`Scalar`].
///
/// Numbers become literals, strings become variables and scalars pass through.
pub trait Cast {
    fn cast(self) -> Result<Scalar>;
}

impl Cast for Scalar {
    fn cast(self) -> Result<Scalar> {
        Ok(self)
    }
}

impl Cast for &Scalar {
    fn cast(self) -> Result<Scalar> {
        Ok(self.clone())
    }
}

impl Cast for Decimal {
    fn cast(self) -> Result<Scalar> {
        Ok(Scalar::Literal(self))
    }
}

impl Cast for f64 {
    fn cast(self) -> Result<Scalar> {
        Ok(Scalar::Literal(Decimal::try_from(self)?))
    }
}

impl Cast for i64 {
    fn cast(self) -> Result<Scalar> {
        Ok(Scalar::literal(self))
    }
}

impl Cast for i32 {
    fn cast(self) -> Result<Scalar> {
        Ok(Scalar::literal(self))
    }
}

impl Cast for usize {
    fn cast(self) -> Result<Scalar> {
        Ok(Scalar::literal(self))
    }
}

impl Cast for &str {
    fn cast(self) -> Result<Scalar> {
        Scalar::var(self)
    }
}

impl Cast for String {
    fn cast(self) -> Result<Scalar> {
        Scalar::var(self)
    }
}

pub fn cast(value: impl Cast) -> Result<Scalar> {
    value.cast()
}

/// Cast every element of a sequence.
pub fn cast_all<T: Cast>(values: impl IntoIterator<Item = T>) -> Result<Vec<Scalar>> {
    values.into_iter().map(Cast::cast).collect()
}
