// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Discretization of waveforms into hardware breakpoint series.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use ahs_ir::waveform::sample_times;
use ahs_ir::{Assignments, Decimal, Error, Interpolation, Result, Scalar, Waveform};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PiecewiseKind {
    /// Values are interpolated linearly between breakpoints.
    Linear,
    /// `values[i]` holds on `[times[i], times[i + 1])`. The last value
    /// repeats the one before it.
    Constant,
}

impl fmt::Display for PiecewiseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PiecewiseKind::Linear => write!(f, "piecewise linear"),
            PiecewiseKind::Constant => write!(f, "piecewise constant"),
        }
    }
}

/// Breakpoint series starting at time zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Piecewise {
    pub kind: PiecewiseKind,
    pub times: Vec<Decimal>,
    pub values: Vec<Decimal>,
}

impl Piecewise {
    fn flat(kind: PiecewiseKind, value: Decimal, duration: Decimal) -> Piecewise {
        Piecewise {
            kind,
            times: vec![Decimal::zero(), duration],
            values: vec![value.clone(), value],
        }
    }

    pub fn duration(&self) -> Decimal {
        self.times.last().cloned().unwrap_or_default()
    }

    /// Value at `t`, zero outside the series.
    ///
    /// Breakpoints without a matching value read as zero.
    pub fn value_at(&self, t: &Decimal) -> Decimal {
        let (Some(first), Some(last)) = (self.times.first(), self.times.last()) else {
            return Decimal::zero();
        };
        if t < first || t > last {
            return Decimal::zero();
        }
        let index = self.times.partition_point(|time| time <= t);
        if index >= self.times.len() {
            return self.values.get(index - 1).cloned().unwrap_or_default();
        }
        let (t0, t1) = (&self.times[index - 1], &self.times[index]);
        let (Some(v0), Some(v1)) = (self.values.get(index - 1), self.values.get(index)) else {
            return Decimal::zero();
        };
        match self.kind {
            PiecewiseKind::Constant => v0.clone(),
            PiecewiseKind::Linear => {
                let offset = ((v1 - v0) * (t - t0)).checked_div(&(t1 - t0));
                v0 + &offset.unwrap_or_default()
            }
        }
    }

    /// Value held from `t` on. Zero from the end of the series.
    fn holding_value(&self, t: &Decimal) -> Decimal {
        if *t >= self.duration() {
            return Decimal::zero();
        }
        self.value_at(t)
    }

    fn map_values(mut self, f: impl Fn(&Decimal) -> Decimal) -> Piecewise {
        self.values = self.values.iter().map(f).collect();
        self
    }

    fn append(self, other: Piecewise) -> Result<Piecewise> {
        let offset = self.duration();
        let shifted = other.times.iter().map(|t| &offset + t);
        let mut times = self.times;
        let mut values = self.values;
        match self.kind {
            PiecewiseKind::Linear => {
                let left = values.last().cloned().unwrap_or_default();
                let right = other.values.first().cloned().unwrap_or_default();
                if left != right {
                    return Err(Error::Discontinuity {
                        time: offset.to_string(),
                        jump: (&right - &left).abs().to_string(),
                        left: left.to_string(),
                        right: right.to_string(),
                    });
                }
                times.extend(shifted.skip(1));
                values.extend(other.values.into_iter().skip(1));
            }
            PiecewiseKind::Constant => {
                times.pop();
                values.pop();
                times.extend(shifted);
                values.extend(other.values);
            }
        }
        Ok(Piecewise {
            kind: self.kind,
            times,
            values,
        })
    }

    fn add(self, other: Piecewise) -> Result<Piecewise> {
        let end = self.duration().max(other.duration());
        if self.kind == PiecewiseKind::Linear {
            for series in [&self, &other] {
                let last = series.values.last().cloned().unwrap_or_default();
                if series.duration() < end && !last.is_zero() {
                    return Err(Error::Discontinuity {
                        time: series.duration().to_string(),
                        jump: last.abs().to_string(),
                        left: last.to_string(),
                        right: Decimal::zero().to_string(),
                    });
                }
            }
        }
        let times: Vec<Decimal> = self
            .times
            .iter()
            .chain(&other.times)
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let values = match self.kind {
            PiecewiseKind::Linear => times
                .iter()
                .map(|t| self.value_at(t) + other.value_at(t))
                .collect(),
            PiecewiseKind::Constant => {
                let mut values: Vec<Decimal> = times[..times.len() - 1]
                    .iter()
                    .map(|t| self.holding_value(t) + other.holding_value(t))
                    .collect();
                values.push(values.last().cloned().unwrap_or_default());
                values
            }
        };
        Ok(Piecewise {
            kind: self.kind,
            times,
            values,
        })
    }

    /// Restrict to `[start, stop]` and shift to start at zero.
    fn restrict(&self, start: &Decimal, stop: &Decimal) -> Piecewise {
        let mut times = vec![start.clone()];
        times.extend(
            self.times
                .iter()
                .filter(|t| *t > start && *t < stop)
                .cloned(),
        );
        if stop > start {
            times.push(stop.clone());
        }
        let values = match self.kind {
            PiecewiseKind::Linear => times.iter().map(|t| self.value_at(t)).collect(),
            PiecewiseKind::Constant => {
                let mut values: Vec<Decimal> = times[..times.len() - 1]
                    .iter()
                    .map(|t| self.value_at(t))
                    .collect();
                let last = values
                    .last()
                    .cloned()
                    .unwrap_or_else(|| self.value_at(stop));
                values.push(last);
                values
            }
        };
        Piecewise {
            kind: self.kind,
            times: times.iter().map(|t| t - start).collect(),
            values,
        }
    }
}

/// Lower `waveform` into a piecewise linear series.
pub fn piecewise_linear(waveform: &Waveform, assignments: &Assignments) -> Result<Piecewise> {
    Discretizer::new(PiecewiseKind::Linear, assignments).lower(waveform)
}

/// Lower `waveform` into a piecewise constant series.
pub fn piecewise_constant(waveform: &Waveform, assignments: &Assignments) -> Result<Piecewise> {
    Discretizer::new(PiecewiseKind::Constant, assignments).lower(waveform)
}

/// Whether the waveform only consists of held values.
///
/// A sampled waveform is judged by its interpolation alone.
pub fn is_step_waveform(waveform: &Waveform) -> bool {
    match waveform {
        Waveform::Constant { .. } => true,
        Waveform::Linear { start, stop, .. } => start == stop,
        Waveform::Poly { coeffs, .. } => coeffs.iter().skip(1).all(Scalar::is_literal_zero),
        Waveform::UserFn(_) | Waveform::Smooth { .. } => false,
        Waveform::Sample { interpolation, .. } => *interpolation == Interpolation::Constant,
        Waveform::Append(children) => children.iter().all(is_step_waveform),
        Waveform::Add(lhs, rhs) => is_step_waveform(lhs) && is_step_waveform(rhs),
        Waveform::Negative(waveform)
        | Waveform::Scale { waveform, .. }
        | Waveform::Slice { waveform, .. }
        | Waveform::Record { waveform, .. }
        | Waveform::Aligned { waveform, .. } => is_step_waveform(waveform),
    }
}

struct Discretizer<'a> {
    kind: PiecewiseKind,
    assignments: &'a Assignments,
}

impl<'a> Discretizer<'a> {
    fn new(kind: PiecewiseKind, assignments: &'a Assignments) -> Self {
        Discretizer { kind, assignments }
    }

    fn unsupported(&self, reason: impl Into<String>) -> Error {
        Error::discretization(self.kind.to_string(), reason)
    }

    fn lower(&self, waveform: &Waveform) -> Result<Piecewise> {
        let a = self.assignments;
        match waveform {
            Waveform::Constant { value, duration } => Ok(Piecewise::flat(
                self.kind,
                value.eval(a)?,
                duration.eval(a)?,
            )),
            Waveform::Linear {
                start,
                stop,
                duration,
            } => {
                let (start, stop) = (start.eval(a)?, stop.eval(a)?);
                match self.kind {
                    PiecewiseKind::Linear => Ok(Piecewise {
                        kind: self.kind,
                        times: vec![Decimal::zero(), duration.eval(a)?],
                        values: vec![start, stop],
                    }),
                    PiecewiseKind::Constant if start == stop => {
                        Ok(Piecewise::flat(self.kind, start, duration.eval(a)?))
                    }
                    PiecewiseKind::Constant => Err(self.unsupported(format!(
                        "linear segment from {start} to {stop} is not constant"
                    ))),
                }
            }
            Waveform::Poly { coeffs, duration } => {
                let mut coeffs = coeffs
                    .iter()
                    .map(|c| c.eval(a))
                    .collect::<Result<Vec<_>>>()?;
                while coeffs.last().is_some_and(Decimal::is_zero) {
                    coeffs.pop();
                }
                let duration = duration.eval(a)?;
                let degree = coeffs.len().saturating_sub(1);
                let max_degree = match self.kind {
                    PiecewiseKind::Linear => 1,
                    PiecewiseKind::Constant => 0,
                };
                if degree > max_degree {
                    return Err(self.unsupported(format!("polynomial of degree {degree}")));
                }
                let start = coeffs.first().cloned().unwrap_or_default();
                let slope = coeffs.get(1).cloned().unwrap_or_default();
                let stop = &start + &(slope * duration.clone());
                Ok(Piecewise {
                    kind: self.kind,
                    times: vec![Decimal::zero(), duration],
                    values: vec![start, stop],
                })
            }
            Waveform::UserFn(function) => Err(self.unsupported(format!(
                "function '{}' must be sampled first",
                function.name()
            ))),
            Waveform::Smooth { .. } => {
                Err(self.unsupported("smoothed waveforms must be sampled first"))
            }
            Waveform::Append(children) => {
                let mut out: Option<Piecewise> = None;
                for child in children {
                    let lowered = self.lower(child)?;
                    out = Some(match out {
                        Some(acc) => acc.append(lowered)?,
                        None => lowered,
                    });
                }
                Ok(out.unwrap_or_else(|| Piecewise::flat(self.kind, Decimal::zero(), Decimal::zero())))
            }
            Waveform::Add(lhs, rhs) => self.lower(lhs)?.add(self.lower(rhs)?),
            Waveform::Negative(inner) => Ok(self.lower(inner)?.map_values(|v| -v)),
            Waveform::Scale { factor, waveform } => {
                let factor = factor.eval(a)?;
                Ok(self.lower(waveform)?.map_values(|v| v * &factor))
            }
            Waveform::Slice { waveform, interval } => {
                let inner = self.lower(waveform)?;
                let (start, stop) = interval.resolve(&waveform.duration().eval(a)?, a)?;
                Ok(inner.restrict(&start, &stop))
            }
            Waveform::Record { waveform, .. } | Waveform::Aligned { waveform, .. } => {
                self.lower(waveform)
            }
            Waveform::Sample {
                waveform,
                interpolation,
                dt,
            } => {
                let expected = match interpolation {
                    Interpolation::Linear => PiecewiseKind::Linear,
                    Interpolation::Constant => PiecewiseKind::Constant,
                };
                if expected != self.kind {
                    return Err(self.unsupported(format!(
                        "waveform is sampled with {expected} interpolation"
                    )));
                }
                let times = sample_times(&dt.eval(a)?, &waveform.duration().eval(a)?)?;
                let mut values = times
                    .iter()
                    .map(|t| waveform.eval(t, a))
                    .collect::<Result<Vec<_>>>()?;
                if self.kind == PiecewiseKind::Constant && values.len() > 1 {
                    let held = values[values.len() - 2].clone();
                    values.pop();
                    values.push(held);
                }
                Ok(Piecewise {
                    kind: self.kind,
                    times,
                    values,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ahs_ir::SmoothingKernel;
    use proptest::prelude::*;

    fn d(text: &str) -> Decimal {
        text.parse().unwrap()
    }

    fn ds(values: &[&str]) -> Vec<Decimal> {
        values.iter().map(|v| d(v)).collect()
    }

    fn empty() -> Assignments {
        Assignments::new()
    }

    #[test]
    fn test_primitives() {
        let linear = Waveform::linear(0.5, 2, 3).unwrap();
        let series = piecewise_linear(&linear, &empty()).unwrap();
        assert_eq!(series.times, ds(&["0", "3"]));
        assert_eq!(series.values, ds(&["0.5", "2"]));

        let constant = Waveform::constant(4, 2).unwrap();
        let series = piecewise_constant(&constant, &empty()).unwrap();
        assert_eq!(series.times, ds(&["0", "2"]));
        assert_eq!(series.values, ds(&["4", "4"]));

        assert!(matches!(
            piecewise_constant(&linear, &empty()),
            Err(Error::Discretization { .. })
        ));
        let quadratic = Waveform::poly([1, 0, 2], 1).unwrap();
        assert!(matches!(
            piecewise_linear(&quadratic, &empty()),
            Err(Error::Discretization { .. })
        ));
        let affine = Waveform::poly([1, 2, 0], 1).unwrap();
        let series = piecewise_linear(&affine, &empty()).unwrap();
        assert_eq!(series.values, ds(&["1", "3"]));
    }

    #[test]
    fn test_append_discontinuity_names_jump() {
        let waveform = Waveform::linear(0, 1, 1)
            .unwrap()
            .append(Waveform::constant(0.3, 1).unwrap());
        let err = piecewise_linear(&waveform, &empty()).unwrap_err();
        assert!(matches!(err, Error::Discontinuity { ref jump, .. } if jump == "0.7"));
        assert!(err.to_string().contains("0.7"));
    }

    #[test]
    fn test_append_continuous() {
        let waveform = Waveform::linear(0, 1, 1)
            .unwrap()
            .append(Waveform::constant(1, 1).unwrap());
        let series = piecewise_linear(&waveform, &empty()).unwrap();
        assert_eq!(series.times, ds(&["0", "1", "2"]));
        assert_eq!(series.values, ds(&["0", "1", "1"]));
    }

    #[test]
    fn test_piecewise_constant_append_holds_new_value() {
        let waveform = Waveform::piecewise_constant([0.5, 0.5], [0, 1]).unwrap();
        assert!(is_step_waveform(&waveform));
        let series = piecewise_constant(&waveform, &empty()).unwrap();
        assert_eq!(series.times, ds(&["0", "0.5", "1"]));
        assert_eq!(series.values, ds(&["0", "1", "1"]));
    }

    #[test]
    fn test_add_and_scale() {
        let waveform = Waveform::linear(0, 2, 2).unwrap()
            + Waveform::piecewise_linear([1, 1], [0, 1, 0]).unwrap();
        let series = piecewise_linear(&waveform.scale(2).unwrap(), &empty()).unwrap();
        assert_eq!(series.times, ds(&["0", "1", "2"]));
        assert_eq!(series.values, ds(&["0", "4", "4"]));

        let shorter = Waveform::constant(1, 1).unwrap() + Waveform::constant(2, 2).unwrap();
        assert!(matches!(
            piecewise_linear(&shorter, &empty()),
            Err(Error::Discontinuity { .. })
        ));
        let series = piecewise_constant(&shorter, &empty()).unwrap();
        assert_eq!(series.times, ds(&["0", "1", "2"]));
        assert_eq!(series.values, ds(&["3", "2", "2"]));
    }

    #[test]
    fn test_slice() {
        let waveform = Waveform::piecewise_linear([1, 1], [0, 2, 0])
            .unwrap()
            .slice(Some(Scalar::Literal(d("0.5"))), Some(Scalar::Literal(d("1.5"))))
            .unwrap();
        let series = piecewise_linear(&waveform, &empty()).unwrap();
        assert_eq!(series.times, ds(&["0", "0.5", "1"]));
        assert_eq!(series.values, ds(&["1", "2", "1"]));

        let steps = Waveform::piecewise_constant([1, 1], [3, 4])
            .unwrap()
            .slice(Some(Scalar::Literal(d("0.5"))), None)
            .unwrap();
        let series = piecewise_constant(&steps, &empty()).unwrap();
        assert_eq!(series.times, ds(&["0", "0.5", "1.5"]));
        assert_eq!(series.values, ds(&["3", "4", "4"]));
    }

    #[test]
    fn test_sampled_waveforms() {
        let smooth = Waveform::linear(0, 1, 1)
            .unwrap()
            .smooth(0.1, SmoothingKernel::Gaussian)
            .unwrap();
        assert!(piecewise_linear(&smooth, &empty()).is_err());
        let quadratic = Waveform::poly([0, 0, 1], 1).unwrap();
        let sampled = quadratic
            .clone()
            .sample(0.5, Interpolation::Linear)
            .unwrap();
        let series = piecewise_linear(&sampled, &empty()).unwrap();
        assert_eq!(series.times, ds(&["0", "0.5", "1"]));
        assert_eq!(series.values, ds(&["0", "0.25", "1"]));
        assert!(piecewise_constant(&sampled, &empty()).is_err());
        assert!(!is_step_waveform(&sampled));

        let held = quadratic.sample(0.5, Interpolation::Constant).unwrap();
        assert!(is_step_waveform(&held));
        let series = piecewise_constant(&held, &empty()).unwrap();
        assert_eq!(series.values, ds(&["0", "0.25", "0.25"]));
    }

    #[test]
    fn test_value_at_with_missing_values() {
        let series = Piecewise {
            kind: PiecewiseKind::Linear,
            times: ds(&["0", "1", "2"]),
            values: ds(&["4"]),
        };
        assert_eq!(series.value_at(&d("0.5")), d("0"));
        assert_eq!(series.value_at(&d("2")), d("0"));
        assert_eq!(series.value_at(&d("3")), d("0"));
        let series = Piecewise {
            kind: PiecewiseKind::Constant,
            times: ds(&["0", "1"]),
            values: ds(&["4", "4"]),
        };
        assert_eq!(series.value_at(&d("1")), d("4"));
    }

    proptest! {
        #[test]
        fn test_linear_series_matches_waveform(
            values in proptest::collection::vec(-50i64..50, 2..6),
            t in 0u32..=100,
        ) {
            let durations = vec![1; values.len() - 1];
            let waveform = Waveform::piecewise_linear(durations, values.clone()).unwrap();
            let series = piecewise_linear(&waveform, &empty()).unwrap();
            let time = Decimal::from(t as i64)
                .checked_div(&Decimal::from(100))
                .unwrap()
                * Decimal::from((values.len() - 1) as i64);
            prop_assert_eq!(series.value_at(&time), waveform.eval(&time, &empty()).unwrap());
        }
    }
}
