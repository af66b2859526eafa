// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

pub mod circuit;
pub mod decimal;
pub mod error;
pub mod field;
pub mod location;
pub mod params;
pub mod pulse;
pub mod scalar;
pub mod sequence;
pub mod serialize;
pub mod waveform;

pub use crate::circuit::{AnalogCircuit, Register};
pub use crate::decimal::Decimal;
pub use crate::error::{Error, Result};
pub use crate::field::{Field, SpatialModulation};
pub use crate::location::{
    AtomArrangement, BravaisLattice, LatticeKind, LocationInfo, ParallelRegister, SiteFilling,
};
pub use crate::params::{Assignments, IntoParamValue, ParamValue};
pub use crate::pulse::{FieldName, Pulse};
pub use crate::scalar::{Cast, Interval, Scalar, cast, cast_all};
pub use crate::sequence::{LevelCoupling, Sequence};
pub use crate::waveform::{
    AlignedValue, Alignment, Interpolation, RecordSide, SmoothingKernel, UserFunction, Waveform,
    WaveformCallable,
};
