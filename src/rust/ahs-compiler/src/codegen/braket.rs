// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Braket analog Hamiltonian simulation program, in SI units.

use serde::{Deserialize, Serialize};

use ahs_ir::Decimal;

use super::floats;
use super::{AhsCodegenResult, LocalDetuning};
use crate::passes::piecewise::Piecewise;
use crate::units::Unit;

const SCHEMA_NAME: &str = "braket.ir.ahs.program";
const SCHEMA_VERSION: &str = "1";
const UNIFORM: &str = "uniform";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BraketSchemaHeader {
    pub name: String,
    pub version: String,
}

impl Default for BraketSchemaHeader {
    fn default() -> Self {
        BraketSchemaHeader {
            name: SCHEMA_NAME.to_string(),
            version: SCHEMA_VERSION.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BraketAhsProgram {
    pub braket_schema_header: BraketSchemaHeader,
    pub setup: Setup,
    pub hamiltonian: Hamiltonian,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Setup {
    pub ahs_register: AhsRegister,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AhsRegister {
    #[serde(with = "floats::pairs")]
    pub sites: Vec<(Decimal, Decimal)>,
    pub filling: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hamiltonian {
    pub driving_fields: Vec<DrivingField>,
    pub local_detuning: Vec<LocalDetuningField>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrivingField {
    pub amplitude: PhysicalField,
    pub phase: PhysicalField,
    pub detuning: PhysicalField,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalDetuningField {
    pub magnitude: PhysicalField,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicalField {
    pub time_series: TimeSeries,
    pub pattern: Pattern,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    #[serde(with = "floats::seq")]
    pub values: Vec<Decimal>,
    #[serde(with = "floats::seq")]
    pub times: Vec<Decimal>,
}

/// Spatial pattern of a field: the keyword `"uniform"` or one coefficient
/// per site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Pattern {
    Named(String),
    Values(#[serde(with = "floats::seq")] Vec<Decimal>),
}

impl Pattern {
    pub fn uniform() -> Self {
        Pattern::Named(UNIFORM.to_string())
    }
}

impl PhysicalField {
    fn uniform(series: &Piecewise, unit: Unit) -> Self {
        PhysicalField {
            time_series: TimeSeries {
                values: unit.all_to_si(&series.values),
                times: Unit::Time.all_to_si(&series.times),
            },
            pattern: Pattern::uniform(),
        }
    }
}

impl From<&LocalDetuning> for LocalDetuningField {
    fn from(local: &LocalDetuning) -> Self {
        let mut magnitude = PhysicalField::uniform(&local.series, Unit::Frequency);
        magnitude.pattern = Pattern::Values(local.site_coefficients.clone());
        LocalDetuningField { magnitude }
    }
}

/// Program together with the number of shots it is submitted with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BraketTaskSpecification {
    pub nshots: usize,
    pub program: BraketAhsProgram,
}

impl From<&AhsCodegenResult> for BraketTaskSpecification {
    fn from(result: &AhsCodegenResult) -> Self {
        let program = BraketAhsProgram {
            braket_schema_header: BraketSchemaHeader::default(),
            setup: Setup {
                ahs_register: AhsRegister {
                    sites: result
                        .sites
                        .iter()
                        .map(|(x, y)| (Unit::Length.to_si(x), Unit::Length.to_si(y)))
                        .collect(),
                    filling: result.filling_flags(),
                },
            },
            hamiltonian: Hamiltonian {
                driving_fields: vec![DrivingField {
                    amplitude: PhysicalField::uniform(&result.rabi_amplitude, Unit::Frequency),
                    phase: PhysicalField::uniform(&result.rabi_phase, Unit::Unitless),
                    detuning: PhysicalField::uniform(&result.detuning, Unit::Frequency),
                }],
                local_detuning: result
                    .local_detuning
                    .iter()
                    .map(LocalDetuningField::from)
                    .collect(),
            },
        };
        BraketTaskSpecification {
            nshots: result.shots,
            program,
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

    fn series(values: [&str; 2]) -> Piecewise {
        Piecewise {
            kind: PiecewiseKind::Linear,
            times: vec![d("0"), d("2")],
            values: values.iter().map(|v| d(v)).collect(),
        }
    }

    fn result(local: bool) -> AhsCodegenResult {
        AhsCodegenResult {
            shots: 10,
            sites: vec![(d("0"), d("0")), (d("0"), d("6"))],
            filling: vec![SiteFilling::Filled, SiteFilling::Filled],
            rabi_amplitude: series(["0", "0"]),
            rabi_phase: series(["0", "0"]),
            detuning: series(["-1", "1"]),
            local_detuning: local.then(|| LocalDetuning {
                series: series(["2", "2"]),
                site_coefficients: vec![d("0.5"), d("1")],
            }),
            decoder: ParallelDecoder::identity(2),
        }
    }

    #[test]
    fn test_program_layout() {
        let spec = BraketTaskSpecification::from(&result(true));
        let json = serde_json::to_value(&spec.program).unwrap();
        assert_eq!(json["braketSchemaHeader"]["name"], "braket.ir.ahs.program");
        assert_eq!(json["setup"]["ahs_register"]["sites"][1], serde_json::json!([0.0, 6e-6]));
        let driving = &json["hamiltonian"]["drivingFields"][0];
        assert_eq!(driving["detuning"]["pattern"], "uniform");
        assert_eq!(
            driving["detuning"]["time_series"]["values"],
            serde_json::json!([-1e6, 1e6])
        );
        let local = &json["hamiltonian"]["localDetuning"][0]["magnitude"];
        assert_eq!(local["pattern"], serde_json::json!([0.5, 1.0]));
    }

    #[test]
    fn test_without_local_detuning() {
        let spec = BraketTaskSpecification::from(&result(false));
        assert!(spec.program.hamiltonian.local_detuning.is_empty());
        let text = serde_json::to_string(&spec).unwrap();
        let parsed: BraketTaskSpecification = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.program.hamiltonian.driving_fields[0].amplitude.pattern, Pattern::uniform());
    }
}
