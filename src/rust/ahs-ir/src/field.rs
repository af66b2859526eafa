// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::decimal::Decimal;
use crate::error::{Error, Result};
use crate::params::{Assignments, ParamValue};
use crate::scalar::{Scalar, is_valid_variable_name};
use crate::waveform::Waveform;

/// Per-site scaling pattern applied to a waveform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpatialModulation {
    /// Scale one on every site.
    Uniform,
    /// Explicit coefficients, unlisted sites are zero.
    ScaledLocations(BTreeMap<usize, Scalar>),
    /// Named vector bound at assignment time, one entry per site.
    RunTimeVector(String),
    AssignedRunTimeVector { name: String, values: Vec<Decimal> },
}

impl SpatialModulation {
    pub fn scaled_locations(
        locations: impl IntoIterator<Item = (usize, Scalar)>,
    ) -> SpatialModulation {
        SpatialModulation::ScaledLocations(locations.into_iter().collect())
    }

    pub fn run_time_vector(name: impl Into<String>) -> Result<SpatialModulation> {
        let name = name.into();
        if !is_valid_variable_name(&name) {
            return Err(Error::InvalidInput(format!(
                "'{name}' is not a valid variable name."
            )));
        }
        Ok(SpatialModulation::RunTimeVector(name))
    }

    pub fn is_uniform(&self) -> bool {
        matches!(self, SpatialModulation::Uniform)
    }

    pub fn assign(&self, assignments: &Assignments) -> Result<SpatialModulation> {
        Ok(match self {
            SpatialModulation::Uniform | SpatialModulation::AssignedRunTimeVector { .. } => {
                self.clone()
            }
            SpatialModulation::ScaledLocations(locations) => SpatialModulation::ScaledLocations(
                locations
                    .iter()
                    .map(|(site, scale)| Ok((*site, scale.assign(assignments)?)))
                    .collect::<Result<_>>()?,
            ),
            SpatialModulation::RunTimeVector(name) => match assignments.get(name) {
                Some(ParamValue::Vector(values)) => SpatialModulation::AssignedRunTimeVector {
                    name: name.clone(),
                    values: values.clone(),
                },
                Some(ParamValue::Scalar(_)) => {
                    return Err(Error::InvalidInput(format!(
                        "Variable '{name}' is bound to a scalar where a vector is expected."
                    )));
                }
                None => self.clone(),
            },
        })
    }

    pub fn canonicalize(&self) -> SpatialModulation {
        match self {
            SpatialModulation::ScaledLocations(locations) => SpatialModulation::ScaledLocations(
                locations
                    .iter()
                    .map(|(site, scale)| (*site, scale.canonicalize()))
                    .collect(),
            ),
            _ => self.clone(),
        }
    }

    pub fn free_variables(&self) -> BTreeSet<String> {
        match self {
            SpatialModulation::ScaledLocations(locations) => locations
                .values()
                .flat_map(Scalar::free_variables)
                .collect(),
            SpatialModulation::RunTimeVector(name) => BTreeSet::from([name.clone()]),
            _ => BTreeSet::new(),
        }
    }
}

impl fmt::Display for SpatialModulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpatialModulation::Uniform => write!(f, "uniform"),
            SpatialModulation::ScaledLocations(locations) => {
                let items: Vec<String> = locations
                    .iter()
                    .map(|(site, scale)| format!("{site}: {scale}"))
                    .collect();
                write!(f, "locations({{{}}})", items.join(", "))
            }
            SpatialModulation::RunTimeVector(name) => write!(f, "var({name})"),
            SpatialModulation::AssignedRunTimeVector { name, values } => {
                write!(f, "var({name} = {})", ParamValue::Vector(values.clone()))
            }
        }
    }
}

/// Waveforms keyed by spatial modulation, driving one channel.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "FieldRepr", into = "FieldRepr")]
pub struct Field {
    drives: IndexMap<SpatialModulation, Waveform>,
}

#[derive(Serialize, Deserialize)]
struct Drive {
    modulation: SpatialModulation,
    waveform: Waveform,
}

#[derive(Serialize, Deserialize)]
struct FieldRepr {
    drives: Vec<Drive>,
}

impl From<FieldRepr> for Field {
    fn from(repr: FieldRepr) -> Self {
        repr.drives
            .into_iter()
            .fold(Field::default(), |field, drive| {
                field.with_drive(drive.modulation, drive.waveform)
            })
    }
}

impl From<Field> for FieldRepr {
    fn from(field: Field) -> Self {
        FieldRepr {
            drives: field
                .drives
                .into_iter()
                .map(|(modulation, waveform)| Drive {
                    modulation,
                    waveform,
                })
                .collect(),
        }
    }
}

impl Field {
    pub fn new(modulation: SpatialModulation, waveform: Waveform) -> Self {
        Field::default().with_drive(modulation, waveform)
    }

    /// Add a drive, summing with an existing waveform on the same modulation.
    pub fn with_drive(mut self, modulation: SpatialModulation, waveform: Waveform) -> Self {
        let merged = match self.drives.shift_remove(&modulation) {
            Some(existing) => existing + waveform,
            None => waveform,
        };
        self.drives.insert(modulation, merged);
        self
    }

    pub fn drives(&self) -> &IndexMap<SpatialModulation, Waveform> {
        &self.drives
    }

    pub fn is_empty(&self) -> bool {
        self.drives.is_empty()
    }

    pub fn add(&self, other: &Field) -> Field {
        other
            .drives
            .iter()
            .fold(self.clone(), |field, (modulation, waveform)| {
                field.with_drive(modulation.clone(), waveform.clone())
            })
    }

    pub fn duration(&self) -> Scalar {
        Scalar::max_of(self.drives.values().map(Waveform::duration)).unwrap_or_else(|_| Scalar::zero())
    }

    pub fn assign(&self, assignments: &Assignments) -> Result<Field> {
        self.drives
            .iter()
            .try_fold(Field::default(), |field, (modulation, waveform)| {
                Ok(field.with_drive(modulation.assign(assignments)?, waveform.assign(assignments)?))
            })
    }

    pub fn canonicalize(&self) -> Field {
        self.drives
            .iter()
            .fold(Field::default(), |field, (modulation, waveform)| {
                field.with_drive(modulation.canonicalize(), waveform.canonicalize())
            })
    }

    pub fn free_variables(&self) -> BTreeSet<String> {
        self.drives
            .iter()
            .flat_map(|(modulation, waveform)| {
                modulation
                    .free_variables()
                    .into_iter()
                    .chain(waveform.free_variables())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_merges_same_modulation() {
        let a = Field::new(
            SpatialModulation::Uniform,
            Waveform::constant(1, 1).unwrap(),
        );
        let b = Field::new(
            SpatialModulation::Uniform,
            Waveform::linear(0, 1, 2).unwrap(),
        )
        .with_drive(
            SpatialModulation::scaled_locations([(0, Scalar::literal(2))]),
            Waveform::constant(1, 1).unwrap(),
        );
        let merged = a.add(&b);
        assert_eq!(merged.drives().len(), 2);
        assert_eq!(merged.duration(), Scalar::literal(2));
        let uniform = &merged.drives()[&SpatialModulation::Uniform];
        let value = uniform.eval(&"0.5".parse().unwrap(), &Assignments::new()).unwrap();
        assert_eq!(value, "1.25".parse().unwrap());
    }

    #[test]
    fn test_assign_run_time_vector() {
        let field = Field::new(
            SpatialModulation::run_time_vector("mask").unwrap(),
            Waveform::constant(1, 1).unwrap(),
        );
        assert!(field.free_variables().contains("mask"));
        let mut assignments = Assignments::new();
        assignments.insert(
            "mask".to_string(),
            ParamValue::Vector(vec![Decimal::one(), Decimal::zero()]),
        );
        let assigned = field.assign(&assignments).unwrap();
        assert!(assigned.free_variables().is_empty());
        assert!(matches!(
            assigned.drives().keys().next(),
            Some(SpatialModulation::AssignedRunTimeVector { values, .. }) if values.len() == 2
        ));
        let mut wrong = Assignments::new();
        wrong.insert("mask".to_string(), ParamValue::Scalar(Decimal::one()));
        assert!(field.assign(&wrong).is_err());
    }

    #[test]
    fn test_serde_uses_drive_list() {
        let field = Field::new(
            SpatialModulation::scaled_locations([(1, Scalar::literal(3))]),
            Waveform::constant(1, 1).unwrap(),
        );
        let json = serde_json::to_string(&field).unwrap();
        assert!(json.starts_with("{\"drives\":["));
        let back: Field = serde_json::from_str(&json).unwrap();
        assert_eq!(back, field);
    }
}
