// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Batch compilation of routines into backend task specifications.

use serde::{Deserialize, Serialize};

use ahs_builder::{BackendTarget, Routine};
use ahs_ir::{AnalogCircuit, Assignments, IntoParamValue, ParamValue, Register, Result};

use crate::capabilities::{Capabilities, DeviceLimits};
use crate::codegen::braket::BraketTaskSpecification;
use crate::codegen::quera::QuEraTaskSpecification;
use crate::codegen::{AhsCodegenResult, generate};
use crate::passes::assignment::{assign_circuit, check_assigned};
use crate::passes::channels::analyze_channels;
use crate::passes::flatten::flatten_sequence;
use crate::passes::tiling::{ParallelDecoder, TiledRegister, tile};
use crate::passes::validate::validate;

/// Arguments of a compilation.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileOptions {
    pub shots: usize,
    pub capabilities: Capabilities,
    /// Values of the flattened arguments, in declaration order.
    pub args: Vec<ParamValue>,
}

impl CompileOptions {
    /// Options for the Aquila device without run-time arguments.
    pub fn new(shots: usize) -> Result<Self> {
        Ok(CompileOptions {
            shots,
            capabilities: Capabilities::aquila()?,
            args: Vec::new(),
        })
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_args<V: IntoParamValue>(mut self, args: impl IntoIterator<Item = V>) -> Result<Self> {
        self.args = args
            .into_iter()
            .map(IntoParamValue::into_param_value)
            .collect::<Result<_>>()?;
        Ok(self)
    }
}

/// Backend encoding of one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskSpecification {
    Quera(QuEraTaskSpecification),
    Braket(BraketTaskSpecification),
}

impl TaskSpecification {
    fn encode(result: &AhsCodegenResult, target: BackendTarget) -> Self {
        if target.is_quera() {
            TaskSpecification::Quera(QuEraTaskSpecification::from(result))
        } else {
            TaskSpecification::Braket(BraketTaskSpecification::from(result))
        }
    }

    pub fn shots(&self) -> usize {
        match self {
            TaskSpecification::Quera(spec) => spec.nshots,
            TaskSpecification::Braket(spec) => spec.nshots,
        }
    }

    pub fn filling(&self) -> &[u8] {
        match self {
            TaskSpecification::Quera(spec) => &spec.lattice.filling,
            TaskSpecification::Braket(spec) => &spec.program.setup.ahs_register.filling,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// One element of a compiled batch.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledTask {
    pub spec: TaskSpecification,
    /// Parameter values the task was compiled with.
    pub metadata: Assignments,
    pub decoder: ParallelDecoder,
}

/// Compile every batch element of `routine`.
///
/// Without a device target the QuEra encoding is produced. Programs for the
/// local emulator are not checked against device limits.
pub fn compile(routine: &Routine, options: &CompileOptions) -> Result<Vec<CompiledTask>> {
    let target = routine.target.unwrap_or(BackendTarget::QueraAquila);
    let limits = options.capabilities.device_limits()?;
    let circuit = routine.circuit.canonicalize();
    let tasks = routine
        .assignments(&options.args)?
        .into_iter()
        .map(|assignments| {
            let result = lower_circuit(&circuit, &assignments, options.shots, &limits)?;
            if target != BackendTarget::BraketLocalEmulator {
                validate(&result, &limits)?;
            }
            Ok(CompiledTask {
                spec: TaskSpecification::encode(&result, target),
                metadata: assignments,
                decoder: result.decoder,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    ahs_log::info!("Compiled {} tasks for {}", tasks.len(), target);
    Ok(tasks)
}

fn lower_circuit(
    circuit: &AnalogCircuit,
    assignments: &Assignments,
    shots: usize,
    limits: &DeviceLimits,
) -> Result<AhsCodegenResult> {
    let (circuit, bindings) = assign_circuit(circuit, assignments)?;
    check_assigned(&circuit)?;
    let flat = flatten_sequence(circuit.sequence(), &bindings)?;
    let plan = analyze_channels(&flat)?;
    let register = match circuit.register() {
        Register::Arrangement(arrangement) => TiledRegister::single(arrangement, &bindings)?,
        Register::Parallel(parallel) => tile(
            parallel.register(),
            &parallel.cluster_spacing().eval(&bindings)?,
            limits,
            &bindings,
        )?,
    };
    generate(
        &plan,
        &flat.duration,
        register,
        circuit.register().arrangement().n_sites(),
        shots,
        &bindings,
    )
}
