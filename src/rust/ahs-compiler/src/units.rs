// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Conversion between device units and SI units.
//!
//! Programs are written in device units: positions in µm, times in µs,
//! frequencies in rad/µs. Task specifications and capabilities use SI units.

use ahs_ir::{Decimal, Result};

/// Device unit to SI unit conversion factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    /// µm to m.
    Length,
    /// µs to s.
    Time,
    /// rad/µs to rad/s.
    Frequency,
    /// Dimensionless quantities such as phases and site coefficients.
    Unitless,
}

impl Unit {
    /// Exponent of ten of the conversion factor.
    fn exponent(&self) -> i32 {
        match self {
            Unit::Length | Unit::Time => -6,
            Unit::Frequency => 6,
            Unit::Unitless => 0,
        }
    }

    fn factor(&self) -> Decimal {
        let magnitude = Decimal::from_integer(10).powi(self.exponent().unsigned_abs());
        if self.exponent() >= 0 {
            magnitude
        } else {
            Decimal::one()
                .checked_div(&magnitude)
                .unwrap_or_else(Decimal::one)
        }
    }

    pub fn to_si(&self, value: &Decimal) -> Decimal {
        value * &self.factor()
    }

    pub fn from_si(&self, value: &Decimal) -> Result<Decimal> {
        value.checked_div(&self.factor()).ok_or_else(|| {
            ahs_ir::Error::new(format!("Cannot convert {value} from SI units."))
        })
    }

    pub fn all_to_si(&self, values: &[Decimal]) -> Vec<Decimal> {
        values.iter().map(|v| self.to_si(v)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(text: &str) -> Decimal {
        text.parse().unwrap()
    }

    #[test]
    fn test_conversion_is_exact() {
        assert_eq!(Unit::Time.to_si(&d("0.5")), d("0.5e-6"));
        assert_eq!(Unit::Frequency.to_si(&d("1")), d("1e6"));
        assert_eq!(Unit::Length.from_si(&d("7.5e-5")).unwrap(), d("75"));
        assert_eq!(Unit::Unitless.to_si(&d("0.3")), d("0.3"));
    }
}
