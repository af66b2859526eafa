// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Checks of the lowered program against device limits.

use ahs_ir::{Decimal, Error, Result};

use crate::capabilities::DeviceLimits;
use crate::codegen::AhsCodegenResult;
use crate::passes::piecewise::Piecewise;

/// Validate a lowered program. All quantities are in device units.
pub(crate) fn validate(result: &AhsCodegenResult, limits: &DeviceLimits) -> Result<()> {
    if !limits.number_shots.contains(&result.shots) {
        return Err(Error::Bounds(format!(
            "Number of shots {} is outside of [{}, {}].",
            result.shots,
            limits.number_shots.start(),
            limits.number_shots.end()
        )));
    }
    validate_lattice(result, limits)?;

    let zero = Decimal::zero();
    let series = SeriesCheck { limits };
    series.timing("rabi_frequency_amplitude", &result.rabi_amplitude)?;
    series.range(
        "rabi_frequency_amplitude",
        &result.rabi_amplitude,
        &zero,
        &limits.rabi_frequency_max,
    )?;
    series.starts_and_ends_at_zero("rabi_frequency_amplitude", &result.rabi_amplitude)?;
    series.timing("rabi_frequency_phase", &result.rabi_phase)?;
    series.range(
        "rabi_frequency_phase",
        &result.rabi_phase,
        &limits.phase_min,
        &limits.phase_max,
    )?;
    series.timing("detuning", &result.detuning)?;
    series.range(
        "detuning",
        &result.detuning,
        &limits.detuning_min,
        &limits.detuning_max,
    )?;
    if let Some(local) = &result.local_detuning {
        series.timing("local detuning", &local.series)?;
        series.range(
            "local detuning",
            &local.series,
            &zero,
            &limits.local_detuning_max,
        )?;
        if let Some(coefficient) = local.site_coefficients.iter().find(|c| {
            **c < limits.site_coefficient_min || **c > limits.site_coefficient_max
        }) {
            return Err(Error::Bounds(format!(
                "Site coefficient {coefficient} is outside of [{}, {}].",
                limits.site_coefficient_min, limits.site_coefficient_max
            )));
        }
    }
    Ok(())
}

fn validate_lattice(result: &AhsCodegenResult, limits: &DeviceLimits) -> Result<()> {
    if result.sites.len() > limits.number_sites_max {
        return Err(Error::Bounds(format!(
            "Register has {} sites, the device supports at most {}.",
            result.sites.len(),
            limits.number_sites_max
        )));
    }
    let zero = Decimal::zero();
    let outside = result.sites.iter().find(|(x, y)| {
        *x < zero || *y < zero || *x > limits.width || *y > limits.height
    });
    if let Some((x, y)) = outside {
        return Err(Error::Bounds(format!(
            "Site ({x}, {y}) is outside of the {} x {} working area.",
            limits.width, limits.height
        )));
    }
    Ok(())
}

struct SeriesCheck<'a> {
    limits: &'a DeviceLimits,
}

impl SeriesCheck<'_> {
    fn timing(&self, channel: &str, series: &Piecewise) -> Result<()> {
        let duration = series.duration();
        if duration > self.limits.time_max {
            return Err(Error::Bounds(format!(
                "Duration {duration} of {channel} exceeds the maximum of {}.",
                self.limits.time_max
            )));
        }
        for window in series.times.windows(2) {
            let step = &window[1] - &window[0];
            if !step.is_zero() && step < self.limits.time_delta_min {
                return Err(Error::Bounds(format!(
                    "Time step {step} of {channel} at {} is below the minimum of {}.",
                    window[0], self.limits.time_delta_min
                )));
            }
        }
        Ok(())
    }

    fn range(&self, channel: &str, series: &Piecewise, min: &Decimal, max: &Decimal) -> Result<()> {
        match series.values.iter().find(|v| *v < min || *v > max) {
            Some(value) => Err(Error::Bounds(format!(
                "Value {value} of {channel} is outside of [{min}, {max}]."
            ))),
            None => Ok(()),
        }
    }

    fn starts_and_ends_at_zero(&self, channel: &str, series: &Piecewise) -> Result<()> {
        let ends = [series.values.first(), series.values.last()];
        if ends.into_iter().flatten().any(|value| !value.is_zero()) {
            return Err(Error::Bounds(format!(
                "{channel} must start and end at 0."
            )));
        }
        Ok(())
    }
}
