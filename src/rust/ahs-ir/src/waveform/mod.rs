// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Time-domain waveform expressions.
//!
//! A [`Waveform`] is defined on `[0, duration]` and evaluates to zero outside
//! that range. Durations are [`Scalar`] expressions derived from the children
//! on demand.

pub mod function;
pub mod smooth;

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use function::{UserFunction, WaveformCallable};
pub use smooth::SmoothingKernel;

use crate::decimal::Decimal;
use crate::error::{Error, Result};
use crate::params::Assignments;
use crate::scalar::{Cast, Interval, Scalar, is_valid_variable_name};

/// Upper bound on the number of points produced by sampling a waveform.
pub const MAX_SAMPLES: usize = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordSide {
    Start,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    Linear,
    Constant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    Left,
    Right,
}

/// Value used to fill the gap when an aligned waveform is padded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignedValue {
    /// Value of the waveform at its start.
    LeftValue,
    /// Value of the waveform at its end.
    RightValue,
    Value(Scalar),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Waveform {
    Constant {
        value: Scalar,
        duration: Scalar,
    },
    Linear {
        start: Scalar,
        stop: Scalar,
        duration: Scalar,
    },
    /// Polynomial with coefficients in ascending order.
    Poly {
        coeffs: Vec<Scalar>,
        duration: Scalar,
    },
    UserFn(UserFunction),
    Append(Vec<Waveform>),
    Add(Arc<Waveform>, Arc<Waveform>),
    Negative(Arc<Waveform>),
    Scale {
        factor: Scalar,
        waveform: Arc<Waveform>,
    },
    Slice {
        waveform: Arc<Waveform>,
        interval: Interval,
    },
    Smooth {
        kernel: SmoothingKernel,
        radius: Scalar,
        waveform: Arc<Waveform>,
    },
    Record {
        waveform: Arc<Waveform>,
        variable: String,
        side: RecordSide,
    },
    Sample {
        waveform: Arc<Waveform>,
        interpolation: Interpolation,
        dt: Scalar,
    },
    Aligned {
        waveform: Arc<Waveform>,
        alignment: Alignment,
        value: AlignedValue,
    },
}

impl Waveform {
    pub fn constant(value: impl Cast, duration: impl Cast) -> Result<Waveform> {
        Ok(Waveform::Constant {
            value: value.cast()?,
            duration: duration.cast()?,
        })
    }

    pub fn linear(start: impl Cast, stop: impl Cast, duration: impl Cast) -> Result<Waveform> {
        Ok(Waveform::Linear {
            start: start.cast()?,
            stop: stop.cast()?,
            duration: duration.cast()?,
        })
    }

    pub fn poly<T: Cast>(coeffs: impl IntoIterator<Item = T>, duration: impl Cast) -> Result<Waveform> {
        Ok(Waveform::Poly {
            coeffs: coeffs.into_iter().map(Cast::cast).collect::<Result<_>>()?,
            duration: duration.cast()?,
        })
    }

    pub fn user_fn(function: UserFunction) -> Waveform {
        Waveform::UserFn(function)
    }

    /// Linear segments through `values`, one segment per duration.
    pub fn piecewise_linear<D: Cast, V: Cast>(
        durations: impl IntoIterator<Item = D>,
        values: impl IntoIterator<Item = V>,
    ) -> Result<Waveform> {
        let durations = crate::scalar::cast_all(durations)?;
        let values = crate::scalar::cast_all(values)?;
        if values.len() != durations.len() + 1 {
            return Err(Error::shape(
                "piecewise_linear values",
                durations.len() + 1,
                values.len(),
            ));
        }
        let segments = durations
            .into_iter()
            .zip(values.windows(2))
            .map(|(duration, pair)| Waveform::Linear {
                start: pair[0].clone(),
                stop: pair[1].clone(),
                duration,
            })
            .collect();
        Ok(Waveform::join(segments))
    }

    /// Constant segments, one value per duration.
    pub fn piecewise_constant<D: Cast, V: Cast>(
        durations: impl IntoIterator<Item = D>,
        values: impl IntoIterator<Item = V>,
    ) -> Result<Waveform> {
        let durations = crate::scalar::cast_all(durations)?;
        let values = crate::scalar::cast_all(values)?;
        if values.len() != durations.len() {
            return Err(Error::shape(
                "piecewise_constant values",
                durations.len(),
                values.len(),
            ));
        }
        let segments = durations
            .into_iter()
            .zip(values)
            .map(|(duration, value)| Waveform::Constant { value, duration })
            .collect();
        Ok(Waveform::join(segments))
    }

    /// Concatenate waveforms in time.
    ///
    /// Nested appends are flattened, zero-length children dropped and a
    /// single remaining child is returned as is.
    pub fn join(children: Vec<Waveform>) -> Waveform {
        let mut flat = Vec::with_capacity(children.len());
        for child in children {
            match child {
                Waveform::Append(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        flat.retain(|child| !child.duration().is_literal_zero());
        if flat.len() == 1 {
            return flat.pop().unwrap_or(Waveform::Append(Vec::new()));
        }
        Waveform::Append(flat)
    }

    pub fn sum(lhs: Waveform, rhs: Waveform) -> Waveform {
        if lhs.duration().is_literal_zero() {
            return rhs;
        }
        if rhs.duration().is_literal_zero() {
            return lhs;
        }
        if lhs == rhs {
            return Waveform::scaled(Scalar::literal(2), lhs);
        }
        Waveform::Add(Arc::new(lhs), Arc::new(rhs))
    }

    pub fn negate(waveform: Waveform) -> Waveform {
        match waveform {
            Waveform::Negative(inner) => Arc::unwrap_or_clone(inner),
            other => Waveform::Negative(Arc::new(other)),
        }
    }

    pub fn scaled(factor: Scalar, waveform: Waveform) -> Waveform {
        match waveform {
            Waveform::Scale {
                factor: inner,
                waveform,
            } => Waveform::scaled(factor * inner, Arc::unwrap_or_clone(waveform)),
            other if factor.as_literal().is_some_and(Decimal::is_one) => other,
            other => Waveform::Scale {
                factor,
                waveform: Arc::new(other),
            },
        }
    }

    pub fn append(self, other: Waveform) -> Waveform {
        Waveform::join(vec![self, other])
    }

    pub fn scale(self, factor: impl Cast) -> Result<Waveform> {
        Ok(Waveform::scaled(factor.cast()?, self))
    }

    /// Restrict to `[start, stop]` and re-base time to the start.
    pub fn slice(self, start: Option<Scalar>, stop: Option<Scalar>) -> Result<Waveform> {
        Ok(Waveform::Slice {
            waveform: Arc::new(self),
            interval: Interval::new(start, stop)?,
        })
    }

    pub fn smooth(self, radius: impl Cast, kernel: SmoothingKernel) -> Result<Waveform> {
        Ok(Waveform::Smooth {
            kernel,
            radius: radius.cast()?,
            waveform: Arc::new(self),
        })
    }

    pub fn record(self, variable: impl Into<String>, side: RecordSide) -> Result<Waveform> {
        let variable = variable.into();
        if !is_valid_variable_name(&variable) {
            return Err(Error::InvalidInput(format!(
                "'{variable}' is not a valid variable name."
            )));
        }
        Ok(Waveform::Record {
            waveform: Arc::new(self),
            variable,
            side,
        })
    }

    pub fn sample(self, dt: impl Cast, interpolation: Interpolation) -> Result<Waveform> {
        Ok(Waveform::Sample {
            waveform: Arc::new(self),
            interpolation,
            dt: dt.cast()?,
        })
    }

    pub fn align(self, alignment: Alignment, value: AlignedValue) -> Waveform {
        let waveform = match self {
            Waveform::Aligned { waveform, .. } => waveform,
            other => Arc::new(other),
        };
        Waveform::Aligned {
            waveform,
            alignment,
            value,
        }
    }

    pub fn duration(&self) -> Scalar {
        match self {
            Waveform::Constant { duration, .. }
            | Waveform::Linear { duration, .. }
            | Waveform::Poly { duration, .. } => duration.clone(),
            Waveform::UserFn(function) => function.duration().clone(),
            Waveform::Append(children) => children
                .iter()
                .fold(Scalar::zero(), |acc, child| acc + child.duration()),
            Waveform::Add(lhs, rhs) => Scalar::max_pair(lhs.duration(), rhs.duration()),
            Waveform::Slice { waveform, interval } => {
                Scalar::slice(waveform.duration(), interval.clone())
            }
            Waveform::Negative(waveform)
            | Waveform::Scale { waveform, .. }
            | Waveform::Smooth { waveform, .. }
            | Waveform::Record { waveform, .. }
            | Waveform::Sample { waveform, .. }
            | Waveform::Aligned { waveform, .. } => waveform.duration(),
        }
    }

    /// Value at local time `t`. Zero outside `[0, duration]` and for
    /// zero-length waveforms.
    pub fn eval(&self, t: &Decimal, assignments: &Assignments) -> Result<Decimal> {
        let duration = self.duration().eval(assignments)?;
        if t.is_negative() || *t > duration || duration.is_zero() {
            return Ok(Decimal::zero());
        }
        self.eval_inside(t, &duration, assignments)
    }

    fn eval_inside(&self, t: &Decimal, duration: &Decimal, assignments: &Assignments) -> Result<Decimal> {
        match self {
            Waveform::Constant { value, .. } => value.eval(assignments),
            Waveform::Linear { start, stop, .. } => {
                let start = start.eval(assignments)?;
                if duration.is_zero() {
                    return Ok(start);
                }
                let stop = stop.eval(assignments)?;
                let slope = (stop - start.clone()).checked_div(duration).unwrap_or_default();
                Ok(start + slope * t.clone())
            }
            Waveform::Poly { coeffs, .. } => coeffs.iter().rev().try_fold(Decimal::zero(), |acc, c| {
                Ok(acc * t.clone() + c.eval(assignments)?)
            }),
            Waveform::UserFn(function) => function.call(t, assignments),
            Waveform::Append(children) => {
                let mut elapsed = Decimal::zero();
                for child in children {
                    let length = child.duration().eval(assignments)?;
                    let end = &elapsed + &length;
                    if *t <= end && !length.is_zero() {
                        return child.eval(&(t - &elapsed), assignments);
                    }
                    elapsed = end;
                }
                Ok(Decimal::zero())
            }
            Waveform::Add(lhs, rhs) => Ok(lhs.eval(t, assignments)? + rhs.eval(t, assignments)?),
            Waveform::Negative(waveform) => Ok(-waveform.eval(t, assignments)?),
            Waveform::Scale { factor, waveform } => {
                Ok(factor.eval(assignments)? * waveform.eval(t, assignments)?)
            }
            Waveform::Slice { waveform, interval } => {
                let length = waveform.duration().eval(assignments)?;
                let (start, _) = interval.resolve(&length, assignments)?;
                waveform.eval(&(t + &start), assignments)
            }
            Waveform::Smooth {
                kernel,
                radius,
                waveform,
            } => {
                let radius = radius.eval(assignments)?.to_f64();
                let end = duration.to_f64();
                let failure = RefCell::new(None);
                let signal = |s: f64| {
                    let clamped = Decimal::from_f64(s.clamp(0.0, end)).unwrap_or_default();
                    match waveform.eval(&clamped, assignments) {
                        Ok(value) => value.to_f64(),
                        Err(error) => {
                            failure.borrow_mut().get_or_insert(error);
                            0.0
                        }
                    }
                };
                let value = smooth::convolve(*kernel, radius, t.to_f64(), signal);
                if let Some(error) = failure.into_inner() {
                    return Err(error);
                }
                Decimal::try_from(value)
            }
            Waveform::Record { waveform, .. } | Waveform::Aligned { waveform, .. } => {
                waveform.eval(t, assignments)
            }
            Waveform::Sample {
                waveform,
                interpolation,
                dt,
            } => {
                let times = sample_times(&dt.eval(assignments)?, duration)?;
                let index = times
                    .windows(2)
                    .position(|pair| *t < pair[1])
                    .unwrap_or(times.len().saturating_sub(1));
                let left = &times[index];
                if *t == *left || index + 1 == times.len() {
                    return waveform.eval(t, assignments);
                }
                let left_value = waveform.eval(left, assignments)?;
                match interpolation {
                    Interpolation::Constant => Ok(left_value),
                    Interpolation::Linear => {
                        let right = &times[index + 1];
                        let right_value = waveform.eval(right, assignments)?;
                        let slope = (right_value - left_value.clone())
                            .checked_div(&(right - left))
                            .unwrap_or_default();
                        Ok(left_value + slope * (t - left))
                    }
                }
            }
        }
    }

    /// Rebuild the tree with `f` applied to every scalar.
    pub fn try_map_scalars<E>(
        &self,
        f: &mut impl FnMut(&Scalar) -> std::result::Result<Scalar, E>,
    ) -> std::result::Result<Waveform, E> {
        Ok(match self {
            Waveform::Constant { value, duration } => Waveform::Constant {
                value: f(value)?,
                duration: f(duration)?,
            },
            Waveform::Linear {
                start,
                stop,
                duration,
            } => Waveform::Linear {
                start: f(start)?,
                stop: f(stop)?,
                duration: f(duration)?,
            },
            Waveform::Poly { coeffs, duration } => Waveform::Poly {
                coeffs: coeffs.iter().map(&mut *f).collect::<std::result::Result<_, E>>()?,
                duration: f(duration)?,
            },
            Waveform::UserFn(function) => Waveform::UserFn(function.with_duration(f(function.duration())?)),
            Waveform::Append(children) => Waveform::join(
                children
                    .iter()
                    .map(|c| c.try_map_scalars(f))
                    .collect::<std::result::Result<_, E>>()?,
            ),
            Waveform::Add(lhs, rhs) => Waveform::sum(lhs.try_map_scalars(f)?, rhs.try_map_scalars(f)?),
            Waveform::Negative(waveform) => Waveform::negate(waveform.try_map_scalars(f)?),
            Waveform::Scale { factor, waveform } => Waveform::scaled(f(factor)?, waveform.try_map_scalars(f)?),
            Waveform::Slice { waveform, interval } => Waveform::Slice {
                waveform: Arc::new(waveform.try_map_scalars(f)?),
                interval: interval.try_map(&mut *f)?,
            },
            Waveform::Smooth {
                kernel,
                radius,
                waveform,
            } => Waveform::Smooth {
                kernel: *kernel,
                radius: f(radius)?,
                waveform: Arc::new(waveform.try_map_scalars(f)?),
            },
            Waveform::Record {
                waveform,
                variable,
                side,
            } => Waveform::Record {
                waveform: Arc::new(waveform.try_map_scalars(f)?),
                variable: variable.clone(),
                side: *side,
            },
            Waveform::Sample {
                waveform,
                interpolation,
                dt,
            } => Waveform::Sample {
                waveform: Arc::new(waveform.try_map_scalars(f)?),
                interpolation: *interpolation,
                dt: f(dt)?,
            },
            Waveform::Aligned {
                waveform,
                alignment,
                value,
            } => Waveform::Aligned {
                waveform: Arc::new(waveform.try_map_scalars(f)?),
                alignment: *alignment,
                value: match value {
                    AlignedValue::Value(v) => AlignedValue::Value(f(v)?),
                    other => other.clone(),
                },
            },
        })
    }

    /// Substitute assigned variables.
    pub fn assign(&self, assignments: &Assignments) -> Result<Waveform> {
        self.try_map_scalars(&mut |s| s.assign(assignments))
    }

    pub fn canonicalize(&self) -> Waveform {
        let result: std::result::Result<Waveform, Infallible> =
            self.try_map_scalars(&mut |s| Ok(s.canonicalize()));
        match result {
            Ok(waveform) => waveform,
            Err(never) => match never {},
        }
    }

    /// Pre-order traversal.
    pub fn visit<'a>(&'a self, f: &mut impl FnMut(&'a Waveform)) {
        f(self);
        match self {
            Waveform::Constant { .. }
            | Waveform::Linear { .. }
            | Waveform::Poly { .. }
            | Waveform::UserFn(_) => {}
            Waveform::Append(children) => children.iter().for_each(|c| c.visit(f)),
            Waveform::Add(lhs, rhs) => {
                lhs.visit(f);
                rhs.visit(f);
            }
            Waveform::Negative(waveform)
            | Waveform::Scale { waveform, .. }
            | Waveform::Slice { waveform, .. }
            | Waveform::Smooth { waveform, .. }
            | Waveform::Record { waveform, .. }
            | Waveform::Sample { waveform, .. }
            | Waveform::Aligned { waveform, .. } => waveform.visit(f),
        }
    }

    pub fn free_variables(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        let mut collect = |s: &Scalar| {
            out.extend(s.free_variables());
            Ok::<_, Infallible>(s.clone())
        };
        let _ = self.try_map_scalars(&mut collect);
        self.visit(&mut |w| {
            if let Waveform::UserFn(function) = w {
                out.extend(function.parameters().iter().cloned());
            }
        });
        out
    }

    /// Pad to `duration` according to the alignment of the waveform.
    ///
    /// Waveforms without alignment are left aligned and padded with zero.
    /// Boundary values are evaluated against `assignments`.
    pub fn pad_to(&self, duration: &Scalar, assignments: &Assignments) -> Result<Waveform> {
        let gap = duration.clone() - self.duration();
        if gap.is_literal_zero() {
            return Ok(self.clone());
        }
        if gap.as_literal().is_some_and(Decimal::is_negative) {
            return Err(Error::Bounds(format!(
                "Cannot pad a waveform of duration {} to the shorter duration {duration}.",
                self.duration()
            )));
        }
        let (alignment, value) = match self {
            Waveform::Aligned {
                alignment, value, ..
            } => (*alignment, value.clone()),
            _ => (Alignment::Left, AlignedValue::Value(Scalar::zero())),
        };
        let fill = match value {
            AlignedValue::Value(v) => v,
            AlignedValue::LeftValue => Scalar::Literal(self.eval(&Decimal::zero(), assignments)?),
            AlignedValue::RightValue => {
                let end = self.duration().eval(assignments)?;
                Scalar::Literal(self.eval(&end, assignments)?)
            }
        };
        let pad = Waveform::Constant {
            value: fill,
            duration: gap,
        };
        Ok(match alignment {
            Alignment::Left => Waveform::join(vec![self.clone(), pad]),
            Alignment::Right => Waveform::join(vec![pad, self.clone()]),
        })
    }
}

/// Sample points `0, dt, 2dt, ...` with the last one clipped to `duration`.
pub fn sample_times(dt: &Decimal, duration: &Decimal) -> Result<Vec<Decimal>> {
    if dt.is_negative() || dt.is_zero() {
        return Err(Error::InvalidInput(format!(
            "Sampling step must be positive, got {dt}."
        )));
    }
    let steps = duration
        .checked_div(dt)
        .map(|n| n.floor())
        .and_then(|n| n.to_usize())
        .ok_or_else(|| Error::InvalidInput(format!("Cannot sample duration {duration}.")))?;
    if steps >= MAX_SAMPLES {
        return Err(Error::InvalidInput(format!(
            "Sampling {duration} with step {dt} exceeds {MAX_SAMPLES} points."
        )));
    }
    let mut times: Vec<Decimal> = (0..=steps).map(|k| dt * &Decimal::from(k)).collect();
    if times.last().is_some_and(|last| last < duration) {
        times.push(duration.clone());
    }
    Ok(times)
}

impl std::ops::Add for Waveform {
    type Output = Waveform;

    fn add(self, rhs: Waveform) -> Waveform {
        Waveform::sum(self, rhs)
    }
}

impl std::ops::Neg for Waveform {
    type Output = Waveform;

    fn neg(self) -> Waveform {
        Waveform::negate(self)
    }
}

impl fmt::Display for RecordSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordSide::Start => write!(f, "start"),
            RecordSide::End => write!(f, "end"),
        }
    }
}

impl fmt::Display for Interpolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interpolation::Linear => write!(f, "linear"),
            Interpolation::Constant => write!(f, "constant"),
        }
    }
}

impl fmt::Display for Waveform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Waveform::Constant { value, duration } => write!(f, "constant({value}, {duration})"),
            Waveform::Linear {
                start,
                stop,
                duration,
            } => write!(f, "linear({start}, {stop}, {duration})"),
            Waveform::Poly { coeffs, duration } => {
                let coeffs: Vec<String> = coeffs.iter().map(|c| c.to_string()).collect();
                write!(f, "poly([{}], {duration})", coeffs.join(", "))
            }
            Waveform::UserFn(function) => write!(
                f,
                "{}(t, {}; {})",
                function.name(),
                function.parameters().join(", "),
                function.duration()
            ),
            Waveform::Append(children) => {
                let children: Vec<String> = children.iter().map(|c| c.to_string()).collect();
                write!(f, "append({})", children.join(", "))
            }
            Waveform::Add(lhs, rhs) => write!(f, "({lhs} + {rhs})"),
            Waveform::Negative(waveform) => write!(f, "-{waveform}"),
            Waveform::Scale { factor, waveform } => write!(f, "{factor} * {waveform}"),
            Waveform::Slice { waveform, interval } => write!(f, "{waveform}[{interval}]"),
            Waveform::Smooth {
                kernel,
                radius,
                waveform,
            } => write!(f, "smooth({kernel:?}, {radius}, {waveform})"),
            Waveform::Record {
                waveform,
                variable,
                side,
            } => write!(f, "record({waveform}, {variable}, {side})"),
            Waveform::Sample {
                waveform,
                interpolation,
                dt,
            } => write!(f, "sample({waveform}, {interpolation}, {dt})"),
            Waveform::Aligned {
                waveform,
                alignment,
                value,
            } => write!(f, "aligned({waveform}, {alignment:?}, {value:?})"),
        }
    }
}
