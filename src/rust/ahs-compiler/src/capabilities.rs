// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Device limits in SI units, laid out like the QuEra capability document.

use serde::{Deserialize, Serialize};

use ahs_ir::{Decimal, Result};

use crate::units::Unit;

const AQUILA_CAPABILITIES: &str = include_str!("aquila_capabilities.json");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskCapabilities {
    pub number_shots_min: usize,
    pub number_shots_max: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaCapabilities {
    pub width: Decimal,
    pub height: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryCapabilities {
    pub spacing_radial_min: Decimal,
    pub spacing_vertical_min: Decimal,
    pub position_resolution: Decimal,
    pub number_sites_max: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatticeCapabilities {
    pub area: AreaCapabilities,
    pub geometry: GeometryCapabilities,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalCapabilities {
    pub rabi_frequency_min: Decimal,
    pub rabi_frequency_max: Decimal,
    pub rabi_frequency_resolution: Decimal,
    pub rabi_frequency_slope_max: Decimal,
    pub detuning_min: Decimal,
    pub detuning_max: Decimal,
    pub detuning_resolution: Decimal,
    pub detuning_slope_max: Decimal,
    pub phase_min: Decimal,
    pub phase_max: Decimal,
    pub phase_resolution: Decimal,
    pub time_min: Decimal,
    pub time_max: Decimal,
    pub time_resolution: Decimal,
    pub time_delta_min: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalCapabilities {
    pub detuning_min: Decimal,
    pub detuning_max: Decimal,
    pub detuning_slope_max: Decimal,
    pub site_coefficient_min: Decimal,
    pub site_coefficient_max: Decimal,
    pub number_local_detuning_sites: usize,
    pub spacing_radial_min: Decimal,
    pub time_resolution: Decimal,
    pub time_delta_min: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RydbergCapabilities {
    pub c6_coefficient: Decimal,
    pub global: GlobalCapabilities,
    pub local: LocalCapabilities,
}

/// Capabilities of an analog device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capabilities {
    pub version: String,
    pub task: TaskCapabilities,
    pub lattice: LatticeCapabilities,
    pub rydberg: RydbergCapabilities,
}

impl Capabilities {
    /// Capabilities of QuEra's Aquila device.
    pub fn aquila() -> Result<Capabilities> {
        Capabilities::from_json(AQUILA_CAPABILITIES)
    }

    pub fn from_json(text: &str) -> Result<Capabilities> {
        ahs_ir::serialize::loads(text)
    }

    /// Limits in the units programs are written in.
    pub fn device_limits(&self) -> Result<DeviceLimits> {
        let global = &self.rydberg.global;
        let local = &self.rydberg.local;
        Ok(DeviceLimits {
            width: Unit::Length.from_si(&self.lattice.area.width)?,
            height: Unit::Length.from_si(&self.lattice.area.height)?,
            number_sites_max: self.lattice.geometry.number_sites_max,
            number_shots: self.task.number_shots_min..=self.task.number_shots_max,
            time_max: Unit::Time.from_si(&global.time_max)?,
            time_delta_min: Unit::Time.from_si(&global.time_delta_min)?,
            rabi_frequency_max: Unit::Frequency.from_si(&global.rabi_frequency_max)?,
            detuning_min: Unit::Frequency.from_si(&global.detuning_min)?,
            detuning_max: Unit::Frequency.from_si(&global.detuning_max)?,
            phase_min: global.phase_min.clone(),
            phase_max: global.phase_max.clone(),
            local_detuning_max: Unit::Frequency.from_si(&local.detuning_max)?,
            site_coefficient_min: local.site_coefficient_min.clone(),
            site_coefficient_max: local.site_coefficient_max.clone(),
        })
    }
}

/// Subset of [`Capabilities`] the compiler checks against, in device units
/// (µm, µs, rad/µs).
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceLimits {
    pub width: Decimal,
    pub height: Decimal,
    pub number_sites_max: usize,
    pub number_shots: std::ops::RangeInclusive<usize>,
    pub time_max: Decimal,
    pub time_delta_min: Decimal,
    pub rabi_frequency_max: Decimal,
    pub detuning_min: Decimal,
    pub detuning_max: Decimal,
    pub phase_min: Decimal,
    pub phase_max: Decimal,
    pub local_detuning_max: Decimal,
    pub site_coefficient_min: Decimal,
    pub site_coefficient_max: Decimal,
}
