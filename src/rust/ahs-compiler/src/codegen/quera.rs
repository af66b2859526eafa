// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! QuEra task specification, in SI units.

use serde::{Deserialize, Serialize};

use ahs_ir::Decimal;

use super::floats;
use super::{AhsCodegenResult, LocalDetuning};
use crate::passes::piecewise::Piecewise;
use crate::units::Unit;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuEraTaskSpecification {
    pub nshots: usize,
    pub lattice: Lattice,
    pub effective_hamiltonian: EffectiveHamiltonian,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lattice {
    #[serde(with = "floats::pairs")]
    pub sites: Vec<(Decimal, Decimal)>,
    pub filling: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectiveHamiltonian {
    pub rydberg: RydbergHamiltonian,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RydbergHamiltonian {
    pub rabi_frequency_amplitude: GlobalField,
    pub rabi_frequency_phase: GlobalField,
    pub detuning: DetuningField,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalField {
    pub global: TimeSeries,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetuningField {
    pub global: TimeSeries,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local: Option<LocalField>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    #[serde(with = "floats::seq")]
    pub times: Vec<Decimal>,
    #[serde(with = "floats::seq")]
    pub values: Vec<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalField {
    #[serde(with = "floats::seq")]
    pub times: Vec<Decimal>,
    #[serde(with = "floats::seq")]
    pub values: Vec<Decimal>,
    #[serde(with = "floats::seq")]
    pub lattice_site_coefficients: Vec<Decimal>,
}

impl TimeSeries {
    pub(crate) fn from_piecewise(series: &Piecewise, unit: Unit) -> Self {
        TimeSeries {
            times: Unit::Time.all_to_si(&series.times),
            values: unit.all_to_si(&series.values),
        }
    }
}

impl From<&LocalDetuning> for LocalField {
    fn from(local: &LocalDetuning) -> Self {
        let TimeSeries { times, values } =
            TimeSeries::from_piecewise(&local.series, Unit::Frequency);
        LocalField {
            times,
            values,
            lattice_site_coefficients: local.site_coefficients.clone(),
        }
    }
}

impl From<&AhsCodegenResult> for QuEraTaskSpecification {
    fn from(result: &AhsCodegenResult) -> Self {
        QuEraTaskSpecification {
            nshots: result.shots,
            lattice: Lattice {
                sites: result
                    .sites
                    .iter()
                    .map(|(x, y)| (Unit::Length.to_si(x), Unit::Length.to_si(y)))
                    .collect(),
                filling: result.filling_flags(),
            },
            effective_hamiltonian: EffectiveHamiltonian {
                rydberg: RydbergHamiltonian {
                    rabi_frequency_amplitude: GlobalField {
                        global: TimeSeries::from_piecewise(&result.rabi_amplitude, Unit::Frequency),
                    },
                    rabi_frequency_phase: GlobalField {
                        global: TimeSeries::from_piecewise(&result.rabi_phase, Unit::Unitless),
                    },
                    detuning: DetuningField {
                        global: TimeSeries::from_piecewise(&result.detuning, Unit::Frequency),
                        local: result.local_detuning.as_ref().map(LocalField::from),
                    },
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::piecewise::PiecewiseKind;
    use crate::passes::tiling::ParallelDecoder;
    use ahs_ir::SiteFilling;

    fn d(text: &str) -> Decimal {
        text.parse().unwrap()
    }

    fn series(kind: PiecewiseKind, times: &[&str], values: &[&str]) -> Piecewise {
        Piecewise {
            kind,
            times: times.iter().map(|t| d(t)).collect(),
            values: values.iter().map(|v| d(v)).collect(),
        }
    }

    fn result() -> AhsCodegenResult {
        AhsCodegenResult {
            shots: 100,
            sites: vec![(d("0"), d("0")), (d("5"), d("0"))],
            filling: vec![SiteFilling::Filled, SiteFilling::Vacant],
            rabi_amplitude: series(PiecewiseKind::Linear, &["0", "1"], &["0", "0"]),
            rabi_phase: series(PiecewiseKind::Constant, &["0", "1"], &["0.5", "0.5"]),
            detuning: series(PiecewiseKind::Linear, &["0", "1"], &["1", "2"]),
            local_detuning: Some(LocalDetuning {
                series: series(PiecewiseKind::Constant, &["0", "1"], &["3", "3"]),
                site_coefficients: vec![d("1"), d("0")],
            }),
            decoder: ParallelDecoder::identity(2),
        }
    }

    #[test]
    fn test_units_are_converted() {
        let spec = QuEraTaskSpecification::from(&result());
        assert_eq!(spec.lattice.sites[1], (d("5e-6"), d("0")));
        assert_eq!(spec.lattice.filling, vec![1, 0]);
        let rydberg = &spec.effective_hamiltonian.rydberg;
        assert_eq!(rydberg.detuning.global.times, vec![d("0"), d("1e-6")]);
        assert_eq!(rydberg.detuning.global.values, vec![d("1e6"), d("2e6")]);
        assert_eq!(rydberg.rabi_frequency_phase.global.values, vec![d("0.5"), d("0.5")]);
        let local = rydberg.detuning.local.as_ref().unwrap();
        assert_eq!(local.values, vec![d("3e6"), d("3e6")]);
        assert_eq!(local.lattice_site_coefficients, vec![d("1"), d("0")]);
    }

    #[test]
    fn test_json_layout() {
        let mut result = result();
        result.local_detuning = None;
        let json = serde_json::to_value(QuEraTaskSpecification::from(&result)).unwrap();
        assert_eq!(json["nshots"], 100);
        assert_eq!(json["lattice"]["sites"][1], serde_json::json!([5e-6, 0.0]));
        let detuning = &json["effective_hamiltonian"]["rydberg"]["detuning"];
        assert_eq!(detuning["global"]["values"], serde_json::json!([1e6, 2e6]));
        assert!(detuning.get("local").is_none());
    }
}
