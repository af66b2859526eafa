// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeSet;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::field::Field;
use crate::params::Assignments;
use crate::scalar::Scalar;
use crate::waveform::Waveform;

/// Hamiltonian channel driven by a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldName {
    RabiFrequencyAmplitude,
    RabiFrequencyPhase,
    Detuning,
}

impl FieldName {
    pub const ALL: [FieldName; 3] = [
        FieldName::RabiFrequencyAmplitude,
        FieldName::RabiFrequencyPhase,
        FieldName::Detuning,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldName::RabiFrequencyAmplitude => "rabi_frequency_amplitude",
            FieldName::RabiFrequencyPhase => "rabi_frequency_phase",
            FieldName::Detuning => "detuning",
        }
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields running concurrently, keyed by channel.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Pulse {
    fields: IndexMap<FieldName, Field>,
}

impl Pulse {
    pub fn new() -> Self {
        Pulse::default()
    }

    /// Add a field, merging with an existing field on the same channel.
    pub fn with_field(mut self, name: FieldName, field: Field) -> Self {
        let merged = match self.fields.get(&name) {
            Some(existing) => existing.add(&field),
            None => field,
        };
        self.fields.insert(name, merged);
        self
    }

    pub fn fields(&self) -> &IndexMap<FieldName, Field> {
        &self.fields
    }

    pub fn field(&self, name: FieldName) -> Option<&Field> {
        self.fields.get(&name)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.values().all(Field::is_empty)
    }

    pub fn merge(&self, other: &Pulse) -> Pulse {
        other
            .fields
            .iter()
            .fold(self.clone(), |pulse, (name, field)| {
                pulse.with_field(*name, field.clone())
            })
    }

    /// Longest field duration. Shorter fields are implicitly zero padded.
    pub fn duration(&self) -> Scalar {
        Scalar::max_of(self.fields.values().map(Field::duration)).unwrap_or_else(|_| Scalar::zero())
    }

    pub fn try_map_fields(&self, mut f: impl FnMut(FieldName, &Field) -> Result<Field>) -> Result<Pulse> {
        self.fields
            .iter()
            .try_fold(Pulse::new(), |pulse, (name, field)| {
                Ok(pulse.with_field(*name, f(*name, field)?))
            })
    }

    pub fn assign(&self, assignments: &Assignments) -> Result<Pulse> {
        self.try_map_fields(|_, field| field.assign(assignments))
    }

    pub fn canonicalize(&self) -> Pulse {
        self.fields
            .iter()
            .fold(Pulse::new(), |pulse, (name, field)| {
                pulse.with_field(*name, field.canonicalize())
            })
    }

    pub fn free_variables(&self) -> BTreeSet<String> {
        self.fields.values().flat_map(Field::free_variables).collect()
    }

    pub fn waveforms(&self) -> impl Iterator<Item = &Waveform> {
        self.fields.values().flat_map(|field| field.drives().values())
    }
}
