// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use serde::{Deserialize, Serialize};

use ahs_ir::{AnalogCircuit, Assignments, ParamValue, Result};

use crate::params::Params;

/// Execution target selected at the end of a builder chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendTarget {
    QueraAquila,
    QueraMock,
    BraketAquila,
    BraketLocalEmulator,
}

impl BackendTarget {
    pub fn is_quera(&self) -> bool {
        matches!(self, BackendTarget::QueraAquila | BackendTarget::QueraMock)
    }
}

impl fmt::Display for BackendTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackendTarget::QueraAquila => "quera.aquila",
            BackendTarget::QueraMock => "quera.mock",
            BackendTarget::BraketAquila => "braket.aquila",
            BackendTarget::BraketLocalEmulator => "braket.local_emulator",
        };
        f.write_str(name)
    }
}

/// A parsed program: circuit, parameter bindings and execution target.
#[derive(Debug, Clone, PartialEq)]
pub struct Routine {
    pub circuit: AnalogCircuit,
    pub params: Params,
    pub target: Option<BackendTarget>,
}

impl Routine {
    /// Bindings of every batch element, see [`Params::batch_assignments`].
    pub fn assignments(&self, args: &[ParamValue]) -> Result<Vec<Assignments>> {
        self.params.batch_assignments(args)
    }
}
