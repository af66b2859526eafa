// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use ahs_ir::{
    AtomArrangement, Interpolation, ParamValue, RecordSide, Scalar, Sequence, Waveform,
};

use crate::routine::BackendTarget;

/// Payload of one builder call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Register(AtomArrangement),
    Apply(Sequence),
    Rydberg,
    Hyperfine,
    Detuning,
    Rabi,
    RabiAmplitude,
    RabiPhase,
    Uniform,
    Location {
        labels: Vec<usize>,
        scales: Option<Vec<Scalar>>,
    },
    LocationScale(Scalar),
    Var(String),
    Waveform(Waveform),
    Slice {
        start: Option<Scalar>,
        stop: Option<Scalar>,
    },
    Record {
        variable: String,
        side: RecordSide,
    },
    Sample {
        dt: Scalar,
        interpolation: Interpolation,
    },
    WaveformScale(Scalar),
    Assign(IndexMap<String, ParamValue>),
    BatchAssign(IndexMap<String, Vec<ParamValue>>),
    Flatten(Vec<String>),
    Parallelize(Scalar),
    Device(BackendTarget),
}

/// Discriminant of [`Step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
    Register,
    Apply,
    Rydberg,
    Hyperfine,
    Detuning,
    Rabi,
    RabiAmplitude,
    RabiPhase,
    Uniform,
    Location,
    LocationScale,
    Var,
    Waveform,
    Slice,
    Record,
    Sample,
    WaveformScale,
    Assign,
    BatchAssign,
    Flatten,
    Parallelize,
    Device,
}

impl Step {
    pub fn kind(&self) -> StepKind {
        match self {
            Step::Register(_) => StepKind::Register,
            Step::Apply(_) => StepKind::Apply,
            Step::Rydberg => StepKind::Rydberg,
            Step::Hyperfine => StepKind::Hyperfine,
            Step::Detuning => StepKind::Detuning,
            Step::Rabi => StepKind::Rabi,
            Step::RabiAmplitude => StepKind::RabiAmplitude,
            Step::RabiPhase => StepKind::RabiPhase,
            Step::Uniform => StepKind::Uniform,
            Step::Location { .. } => StepKind::Location,
            Step::LocationScale(_) => StepKind::LocationScale,
            Step::Var(_) => StepKind::Var,
            Step::Waveform(_) => StepKind::Waveform,
            Step::Slice { .. } => StepKind::Slice,
            Step::Record { .. } => StepKind::Record,
            Step::Sample { .. } => StepKind::Sample,
            Step::WaveformScale(_) => StepKind::WaveformScale,
            Step::Assign(_) => StepKind::Assign,
            Step::BatchAssign(_) => StepKind::BatchAssign,
            Step::Flatten(_) => StepKind::Flatten,
            Step::Parallelize(_) => StepKind::Parallelize,
            Step::Device(_) => StepKind::Device,
        }
    }
}

/// Arena entry. `parent` indexes into the same arena.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuilderNode {
    pub parent: Option<usize>,
    pub step: Step,
}
