// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::location::{AtomArrangement, ParallelRegister};
use crate::params::Assignments;
use crate::sequence::Sequence;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Register {
    Arrangement(AtomArrangement),
    Parallel(ParallelRegister),
}

impl Register {
    /// The arrangement of a single cluster.
    pub fn arrangement(&self) -> &AtomArrangement {
        match self {
            Register::Arrangement(arrangement) => arrangement,
            Register::Parallel(parallel) => parallel.register(),
        }
    }

    pub fn assign(&self, assignments: &Assignments) -> Result<Register> {
        Ok(match self {
            Register::Arrangement(arrangement) => {
                Register::Arrangement(arrangement.assign(assignments)?)
            }
            Register::Parallel(parallel) => Register::Parallel(parallel.assign(assignments)?),
        })
    }

    pub fn free_variables(&self) -> BTreeSet<String> {
        match self {
            Register::Arrangement(arrangement) => arrangement.free_variables(),
            Register::Parallel(parallel) => parallel.free_variables(),
        }
    }
}

impl From<AtomArrangement> for Register {
    fn from(arrangement: AtomArrangement) -> Self {
        Register::Arrangement(arrangement)
    }
}

/// A register driven by a sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalogCircuit {
    register: Register,
    sequence: Sequence,
}

impl AnalogCircuit {
    pub fn new(register: impl Into<Register>, sequence: Sequence) -> Self {
        AnalogCircuit {
            register: register.into(),
            sequence,
        }
    }

    pub fn register(&self) -> &Register {
        &self.register
    }

    pub fn sequence(&self) -> &Sequence {
        &self.sequence
    }

    pub fn n_atoms(&self) -> usize {
        self.register.arrangement().n_atoms()
    }

    pub fn assign(&self, assignments: &Assignments) -> Result<AnalogCircuit> {
        Ok(AnalogCircuit {
            register: self.register.assign(assignments)?,
            sequence: self.sequence.assign(assignments)?,
        })
    }

    pub fn canonicalize(&self) -> AnalogCircuit {
        AnalogCircuit {
            register: self.register.clone(),
            sequence: self.sequence.canonicalize(),
        }
    }

    pub fn free_variables(&self) -> BTreeSet<String> {
        let mut out = self.register.free_variables();
        out.extend(self.sequence.free_variables());
        out
    }
}
