// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Backend independent code generation result and its emitters.

pub mod braket;
mod floats;
pub mod quera;

use ahs_ir::{Assignments, Decimal, Error, Result, Scalar, SiteFilling, Waveform};

use crate::passes::channels::{ChannelPlan, FieldConfig};
use crate::passes::lattice::site_coefficients;
use crate::passes::piecewise::{Piecewise, is_step_waveform, piecewise_constant, piecewise_linear};
use crate::passes::tiling::{ParallelDecoder, TiledRegister};

/// Local detuning channel.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalDetuning {
    pub series: Piecewise,
    /// One coefficient per emitted site.
    pub site_coefficients: Vec<Decimal>,
}

/// Lowered program in device units (µm, µs, rad/µs).
///
/// Every backend encoding is derived from this structure.
#[derive(Debug, Clone, PartialEq)]
pub struct AhsCodegenResult {
    pub shots: usize,
    pub sites: Vec<(Decimal, Decimal)>,
    pub filling: Vec<SiteFilling>,
    pub rabi_amplitude: Piecewise,
    pub rabi_phase: Piecewise,
    pub detuning: Piecewise,
    pub local_detuning: Option<LocalDetuning>,
    pub decoder: ParallelDecoder,
}

impl AhsCodegenResult {
    /// Filling as `1` for atoms and `0` for vacancies.
    pub fn filling_flags(&self) -> Vec<u8> {
        self.filling
            .iter()
            .map(|filling| u8::from(filling.is_filled()))
            .collect()
    }
}

/// Lower the analyzed channels of a flattened program.
pub(crate) fn generate(
    plan: &ChannelPlan,
    duration: &Decimal,
    register: TiledRegister,
    n_cluster_sites: usize,
    shots: usize,
    assignments: &Assignments,
) -> Result<AhsCodegenResult> {
    if plan.is_empty() {
        return Err(Error::InvalidInput(
            "No fields specified in the program.".to_string(),
        ));
    }
    let lower = ChannelLowering {
        duration: Scalar::Literal(duration.clone()),
        assignments,
    };
    let rabi_amplitude = lower.drive("rabi_frequency_amplitude", plan.rabi_amplitude.as_ref())?;
    let rabi_phase = lower.phase(plan.rabi_phase.as_ref())?;
    let (detuning, local_detuning) = match &plan.detuning {
        None => (lower.drive("detuning", None)?, None),
        Some(FieldConfig::Global(waveform)) => (lower.drive("detuning", Some(waveform))?, None),
        Some(FieldConfig::Local {
            modulation,
            waveform,
        }) => (
            lower.drive("detuning", None)?,
            Some((modulation, waveform)),
        ),
        Some(FieldConfig::Mixed {
            global,
            modulation,
            local,
        }) => (lower.drive("detuning", Some(global))?, Some((modulation, local))),
    };
    let local_detuning = match local_detuning {
        Some((modulation, waveform)) => {
            let cluster = site_coefficients(modulation, n_cluster_sites, assignments)?;
            Some(LocalDetuning {
                series: lower.drive("local detuning", Some(waveform))?,
                site_coefficients: register
                    .decoder
                    .sites()
                    .iter()
                    .map(|site| cluster[site.local].clone())
                    .collect(),
            })
        }
        None => None,
    };
    Ok(AhsCodegenResult {
        shots,
        sites: register.sites,
        filling: register.filling,
        rabi_amplitude,
        rabi_phase,
        detuning,
        local_detuning,
        decoder: register.decoder,
    })
}

struct ChannelLowering<'a> {
    duration: Scalar,
    assignments: &'a Assignments,
}

impl ChannelLowering<'_> {
    fn padded(&self, channel: &str, waveform: Option<&Waveform>) -> Result<Waveform> {
        match waveform {
            Some(waveform) => waveform.pad_to(&self.duration, self.assignments),
            None => {
                ahs_log::diagnostic!("Channel {} is not driven, filling with zero", channel);
                Ok(Waveform::Constant {
                    value: Scalar::zero(),
                    duration: self.duration.clone(),
                })
            }
        }
    }

    /// Amplitude and detuning channels: held steps stay piecewise constant,
    /// everything else is piecewise linear.
    fn drive(&self, channel: &str, waveform: Option<&Waveform>) -> Result<Piecewise> {
        let waveform = self.padded(channel, waveform)?;
        if waveform.duration().is_literal_zero() || !is_step_waveform(&waveform) {
            return piecewise_linear(&waveform, self.assignments);
        }
        piecewise_constant(&waveform, self.assignments)
    }

    fn phase(&self, waveform: Option<&Waveform>) -> Result<Piecewise> {
        let waveform = self.padded("rabi_frequency_phase", waveform)?;
        piecewise_constant(&waveform, self.assignments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::piecewise::PiecewiseKind;
    use ahs_ir::{AtomArrangement, BravaisLattice, SpatialModulation};

    fn d(text: &str) -> Decimal {
        text.parse().unwrap()
    }

    fn register(n: usize) -> TiledRegister {
        let arrangement = AtomArrangement::from(BravaisLattice::chain(n, 5, false).unwrap());
        TiledRegister::single(&arrangement, &Assignments::new()).unwrap()
    }

    #[test]
    fn test_missing_channels_are_zero_filled() {
        let plan = ChannelPlan {
            detuning: Some(FieldConfig::Global(Waveform::linear(0, 1, 2).unwrap())),
            ..ChannelPlan::default()
        };
        let result = generate(&plan, &d("2"), register(1), 1, 10, &Assignments::new()).unwrap();
        assert_eq!(result.detuning.kind, PiecewiseKind::Linear);
        assert_eq!(result.rabi_amplitude.times, vec![d("0"), d("2")]);
        assert_eq!(result.rabi_amplitude.values, vec![d("0"), d("0")]);
        assert_eq!(result.rabi_phase.kind, PiecewiseKind::Constant);
        assert!(result.local_detuning.is_none());
        assert_eq!(result.filling_flags(), vec![1]);
    }

    #[test]
    fn test_local_detuning_coefficients() {
        let plan = ChannelPlan {
            detuning: Some(FieldConfig::Local {
                modulation: SpatialModulation::scaled_locations([(1, Scalar::literal(1))]),
                waveform: Waveform::constant(2, 1).unwrap(),
            }),
            ..ChannelPlan::default()
        };
        let result = generate(&plan, &d("1"), register(2), 2, 10, &Assignments::new()).unwrap();
        let local = result.local_detuning.unwrap();
        assert_eq!(local.site_coefficients, vec![d("0"), d("1")]);
        assert_eq!(local.series.values, vec![d("2"), d("2")]);
        assert_eq!(result.detuning.values, vec![d("0"), d("0")]);
    }

    #[test]
    fn test_empty_plan_fails() {
        let err = generate(
            &ChannelPlan::default(),
            &d("1"),
            register(1),
            1,
            10,
            &Assignments::new(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("No fields specified"));
    }
}
