// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Exact decimal numbers.
//!
//! Every numeric parameter in the IR is kept as an exact rational so that the
//! generated hardware schedules are identical between runs, independent of
//! the order in which floating point operations would have been performed.

use std::fmt;
use std::str::FromStr;

use num_bigint::BigInt;
use num_integer::Integer;
use num_rational::BigRational;
use num_traits::{One, Signed, ToPrimitive, Zero};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// Significant digits emitted for values without a terminating expansion.
const SIGNIFICANT_DIGITS: usize = 40;
/// Upper bound for fraction digits of a terminating expansion.
const MAX_FRACTION_DIGITS: usize = 1024;
const MAX_EXPONENT: u32 = 4096;

#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Decimal(BigRational);

fn pow10(exp: u32) -> BigInt {
    num_traits::pow(BigInt::from(10), exp as usize)
}

impl Decimal {
    pub fn zero() -> Self {
        Decimal(BigRational::zero())
    }

    pub fn one() -> Self {
        Decimal(BigRational::one())
    }

    pub fn from_integer(value: i64) -> Self {
        Decimal(BigRational::from_integer(BigInt::from(value)))
    }

    /// Creates a decimal from the shortest string that round-trips the float.
    ///
    /// `0.1` therefore becomes exactly one tenth, not the binary approximation.
    /// Returns `None` for NaN and infinities.
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        format!("{value}").parse().ok()
    }

    /// Converts to the nearest `f64`.
    pub fn to_f64(&self) -> f64 {
        self.expansion().0.parse::<f64>().unwrap_or(f64::NAN)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_one(&self) -> bool {
        self.0.is_one()
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_negative()
    }

    pub fn is_integer(&self) -> bool {
        self.0.is_integer()
    }

    pub fn abs(&self) -> Self {
        Decimal(self.0.abs())
    }

    pub fn checked_div(&self, rhs: &Decimal) -> Option<Decimal> {
        if rhs.is_zero() {
            None
        } else {
            Some(Decimal(&self.0 / &rhs.0))
        }
    }

    pub fn powi(&self, exp: u32) -> Decimal {
        let mut result = BigRational::one();
        for _ in 0..exp {
            result = result * &self.0;
        }
        Decimal(result)
    }

    pub fn floor(&self) -> Decimal {
        Decimal(self.0.floor())
    }

    pub fn ceil(&self) -> Decimal {
        Decimal(self.0.ceil())
    }

    /// Returns the value as `usize` if it is a non-negative integer.
    pub fn to_usize(&self) -> Option<usize> {
        if !self.is_integer() || self.is_negative() {
            return None;
        }
        self.0.numer().to_usize()
    }

    pub fn min(self, other: Decimal) -> Decimal {
        if other < self { other } else { self }
    }

    pub fn max(self, other: Decimal) -> Decimal {
        if other > self { other } else { self }
    }

    /// Number of fraction digits of the decimal expansion, if it terminates.
    fn terminating_digits(&self) -> Option<usize> {
        let mut denom = self.0.denom().clone();
        let two = BigInt::from(2);
        let five = BigInt::from(5);
        let mut twos = 0;
        let mut fives = 0;
        while (&denom % &two).is_zero() {
            denom /= &two;
            twos += 1;
        }
        while (&denom % &five).is_zero() {
            denom /= &five;
            fives += 1;
        }
        if denom.is_one() {
            Some(usize::max(twos, fives))
        } else {
            None
        }
    }

    /// Decimal expansion of the value and whether it is exact.
    fn expansion(&self) -> (String, bool) {
        let negative = self.0.is_negative();
        let abs = self.0.abs();
        let denom = abs.denom().clone();
        let (int_part, mut rem) = abs.numer().div_rem(&denom);
        let mut out = String::new();
        if negative {
            out.push('-');
        }
        out.push_str(&int_part.to_string());
        if rem.is_zero() {
            return (out, true);
        }
        let limit = match self.terminating_digits() {
            Some(digits) if digits <= MAX_FRACTION_DIGITS => digits,
            _ => MAX_FRACTION_DIGITS,
        };
        out.push('.');
        let ten = BigInt::from(10);
        let mut significant = if int_part.is_zero() {
            0
        } else {
            int_part.to_string().len()
        };
        let mut fraction_digits = 0;
        while !rem.is_zero() && fraction_digits < limit && significant < SIGNIFICANT_DIGITS {
            rem *= &ten;
            let (digit, next) = rem.div_rem(&denom);
            if significant > 0 || !digit.is_zero() {
                significant += 1;
            }
            out.push_str(&digit.to_string());
            rem = next;
            fraction_digits += 1;
        }
        (out, rem.is_zero())
    }

    /// Lossless textual form: a decimal string when the expansion terminates,
    /// `numer/denom` otherwise.
    pub fn to_exact_string(&self) -> String {
        let (expansion, exact) = self.expansion();
        if exact {
            expansion
        } else {
            format!("{}/{}", self.0.numer(), self.0.denom())
        }
    }
}

impl FromStr for Decimal {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidInput(format!("'{s}' is not a valid decimal number."));
        let text = s.trim();
        if let Some((numer, denom)) = text.split_once('/') {
            let numer: BigInt = numer.trim().parse().map_err(|_| invalid())?;
            let denom: BigInt = denom.trim().parse().map_err(|_| invalid())?;
            if denom.is_zero() {
                return Err(invalid());
            }
            return Ok(Decimal(BigRational::new(numer, denom)));
        }
        let (mantissa, exponent) = match text.find(['e', 'E']) {
            Some(pos) => (
                &text[..pos],
                text[pos + 1..].parse::<i32>().map_err(|_| invalid())?,
            ),
            None => (text, 0),
        };
        if exponent.unsigned_abs() > MAX_EXPONENT {
            return Err(invalid());
        }
        let (negative, digits) = match mantissa.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, mantissa.strip_prefix('+').unwrap_or(mantissa)),
        };
        let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }
        if !int_part
            .chars()
            .chain(frac_part.chars())
            .all(|c| c.is_ascii_digit())
        {
            return Err(invalid());
        }
        let numer: BigInt = format!("{int_part}{frac_part}")
            .parse()
            .map_err(|_| invalid())?;
        let scale = exponent - frac_part.len() as i32;
        let value = if scale >= 0 {
            BigRational::from_integer(numer * pow10(scale as u32))
        } else {
            BigRational::new(numer, pow10(scale.unsigned_abs()))
        };
        Ok(Decimal(if negative { -value } else { value }))
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expansion().0)
    }
}

impl fmt::Debug for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Decimal({})", self.to_exact_string())
    }
}

macro_rules! impl_binary_op {
    ($op:ident, $method:ident) => {
        impl std::ops::$op<&Decimal> for &Decimal {
            type Output = Decimal;

            fn $method(self, rhs: &Decimal) -> Decimal {
                Decimal(std::ops::$op::$method(&self.0, &rhs.0))
            }
        }

        impl std::ops::$op for Decimal {
            type Output = Decimal;

            fn $method(self, rhs: Decimal) -> Decimal {
                Decimal(std::ops::$op::$method(self.0, rhs.0))
            }
        }
    };
}

impl_binary_op!(Add, add);
impl_binary_op!(Sub, sub);
impl_binary_op!(Mul, mul);

impl std::ops::Neg for Decimal {
    type Output = Decimal;

    fn neg(self) -> Decimal {
        Decimal(-self.0)
    }
}

impl std::ops::Neg for &Decimal {
    type Output = Decimal;

    fn neg(self) -> Decimal {
        Decimal(-self.0.clone())
    }
}

impl std::iter::Sum for Decimal {
    fn sum<I: Iterator<Item = Decimal>>(iter: I) -> Self {
        iter.fold(Decimal::zero(), |acc, x| acc + x)
    }
}

impl From<i64> for Decimal {
    fn from(value: i64) -> Self {
        Decimal::from_integer(value)
    }
}

impl From<i32> for Decimal {
    fn from(value: i32) -> Self {
        Decimal::from_integer(value.into())
    }
}

impl From<u32> for Decimal {
    fn from(value: u32) -> Self {
        Decimal::from_integer(value.into())
    }
}

impl From<usize> for Decimal {
    fn from(value: usize) -> Self {
        Decimal(BigRational::from_integer(BigInt::from(value)))
    }
}

impl TryFrom<f64> for Decimal {
    type Error = Error;

    fn try_from(value: f64) -> Result<Self> {
        Decimal::from_f64(value)
            .ok_or_else(|| Error::InvalidInput(format!("{value} is not a finite number.")))
    }
}

impl Serialize for Decimal {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_exact_string())
    }
}

struct DecimalVisitor;

impl Visitor<'_> for DecimalVisitor {
    type Value = Decimal;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a decimal number or its string representation")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Decimal, E> {
        v.parse().map_err(E::custom)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Decimal, E> {
        Decimal::try_from(v).map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Decimal, E> {
        Ok(Decimal::from(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Decimal, E> {
        Ok(Decimal(BigRational::from_integer(BigInt::from(v))))
    }
}

impl<'de> Deserialize<'de> for Decimal {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(DecimalVisitor)
    }
}
