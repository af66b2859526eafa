// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Call sequencing rules of the fluent builder.
//!
//! The position of a chain is determined by its last step. Each position
//! admits a fixed set of next calls.

use std::fmt;

use ahs_ir::{Error, Result};

use crate::node::StepKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Position {
    ProgramStart,
    Applied,
    LevelCoupling,
    Rabi,
    Field,
    Location,
    LocationScale,
    SpatialModulation,
    Waveform,
    Assigned,
    BatchAssigned,
    Flattened,
    Parallelized,
    Device,
}

/// A fluent method, as seen by the sequencing rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Call {
    Apply,
    Rydberg,
    Hyperfine,
    Detuning,
    Rabi,
    Amplitude,
    Phase,
    Uniform,
    Location,
    Scale,
    Var,
    Waveform,
    Slice,
    Record,
    Sample,
    Assign,
    BatchAssign,
    Flatten,
    Parallelize,
    Device,
    Parse,
}

const PRAGMAS: [Call; 5] = [
    Call::Assign,
    Call::BatchAssign,
    Call::Flatten,
    Call::Parallelize,
    Call::Device,
];

impl Position {
    pub fn of(kind: StepKind) -> Position {
        match kind {
            StepKind::Register => Position::ProgramStart,
            StepKind::Apply => Position::Applied,
            StepKind::Rydberg | StepKind::Hyperfine => Position::LevelCoupling,
            StepKind::Rabi => Position::Rabi,
            StepKind::Detuning | StepKind::RabiAmplitude | StepKind::RabiPhase => Position::Field,
            StepKind::Location => Position::Location,
            StepKind::LocationScale => Position::LocationScale,
            StepKind::Uniform | StepKind::Var => Position::SpatialModulation,
            StepKind::Waveform
            | StepKind::Slice
            | StepKind::Record
            | StepKind::Sample
            | StepKind::WaveformScale => Position::Waveform,
            StepKind::Assign => Position::Assigned,
            StepKind::BatchAssign => Position::BatchAssigned,
            StepKind::Flatten => Position::Flattened,
            StepKind::Parallelize => Position::Parallelized,
            StepKind::Device => Position::Device,
        }
    }

    /// Calls accepted at this position.
    pub fn legal_calls(&self) -> &'static [Call] {
        use Call::*;
        match self {
            Position::ProgramStart => &[Rydberg, Hyperfine, Apply, Parse],
            Position::Applied => &[Assign, BatchAssign, Flatten, Parallelize, Device, Parse],
            Position::LevelCoupling => &[Detuning, Rabi],
            Position::Rabi => &[Amplitude, Phase],
            Position::Field => &[Uniform, Location, Var],
            Position::Location => &[Location, Scale, Waveform],
            Position::LocationScale => &[Location, Waveform],
            Position::SpatialModulation => &[Waveform],
            Position::Waveform => &[
                Waveform,
                Slice,
                Record,
                Sample,
                Scale,
                Uniform,
                Location,
                Var,
                Detuning,
                Rabi,
                Rydberg,
                Hyperfine,
                Assign,
                BatchAssign,
                Flatten,
                Parallelize,
                Device,
                Parse,
            ],
            Position::Assigned => &[BatchAssign, Flatten, Parallelize, Device, Parse],
            Position::BatchAssigned => &[Flatten, Parallelize, Device, Parse],
            Position::Flattened => &[Parallelize, Device, Parse],
            Position::Parallelized => &[Device, Parse],
            Position::Device => &[Parse],
        }
    }

    pub fn allows(&self, call: Call) -> bool {
        self.legal_calls().contains(&call)
    }

    /// Fail with a sequencing error unless `call` is legal here.
    pub fn check(&self, call: Call) -> Result<()> {
        if self.allows(call) {
            return Ok(());
        }
        let expected: Vec<String> = self.legal_calls().iter().map(Call::to_string).collect();
        Err(Error::BuilderSequence {
            call: call.to_string(),
            position: self.to_string(),
            expected: expected.join(", "),
        })
    }

    pub fn is_pragma(call: Call) -> bool {
        PRAGMAS.contains(&call)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Position::ProgramStart => "program start",
            Position::Applied => "applied sequence",
            Position::LevelCoupling => "level coupling",
            Position::Rabi => "rabi",
            Position::Field => "field",
            Position::Location => "location",
            Position::LocationScale => "location scale",
            Position::SpatialModulation => "spatial modulation",
            Position::Waveform => "waveform",
            Position::Assigned => "assign",
            Position::BatchAssigned => "batch_assign",
            Position::Flattened => "flatten",
            Position::Parallelized => "parallelize",
            Position::Device => "device",
        };
        f.write_str(name)
    }
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Call::Apply => "apply",
            Call::Rydberg => "rydberg",
            Call::Hyperfine => "hyperfine",
            Call::Detuning => "detuning",
            Call::Rabi => "rabi",
            Call::Amplitude => "amplitude",
            Call::Phase => "phase",
            Call::Uniform => "uniform",
            Call::Location => "location",
            Call::Scale => "scale",
            Call::Var => "var",
            Call::Waveform => "waveform",
            Call::Slice => "slice",
            Call::Record => "record",
            Call::Sample => "sample",
            Call::Assign => "assign",
            Call::BatchAssign => "batch_assign",
            Call::Flatten => "flatten",
            Call::Parallelize => "parallelize",
            Call::Device => "device",
            Call::Parse => "parse",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_requires_location_or_waveform() {
        assert!(Position::Location.allows(Call::Scale));
        assert!(Position::Waveform.allows(Call::Scale));
        assert!(!Position::Field.allows(Call::Scale));
        assert!(!Position::SpatialModulation.allows(Call::Scale));
    }

    #[test]
    fn test_pragmas_are_ordered() {
        assert!(Position::Assigned.allows(Call::BatchAssign));
        assert!(!Position::BatchAssigned.allows(Call::Assign));
        assert!(!Position::Device.allows(Call::Parallelize));
        assert!(PRAGMAS.iter().all(|call| Position::is_pragma(*call)));
    }

    #[test]
    fn test_error_lists_expected_calls() {
        let err = Position::LevelCoupling.check(Call::Uniform).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot call `uniform` at builder position `level coupling`. Expected one of: detuning, rabi."
        );
    }
}
