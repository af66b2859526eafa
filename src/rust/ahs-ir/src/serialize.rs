// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! JSON encoding of IR trees.
//!
//! Every node is tagged by its snake_case variant name. Trees holding user
//! functions cannot be encoded.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::Result;

pub fn dumps<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

pub fn loads<T: DeserializeOwned>(text: &str) -> Result<T> {
    Ok(serde_json::from_str(text)?)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::circuit::AnalogCircuit;
    use crate::error::Error;
    use crate::field::{Field, SpatialModulation};
    use crate::location::{AtomArrangement, BravaisLattice, ParallelRegister};
    use crate::pulse::{FieldName, Pulse};
    use crate::scalar::Scalar;
    use crate::sequence::{LevelCoupling, Sequence};
    use crate::waveform::{
        AlignedValue, Alignment, Interpolation, RecordSide, SmoothingKernel, UserFunction, Waveform,
    };

    fn circuit() -> AnalogCircuit {
        let detuning = Waveform::piecewise_linear([0.1, 3.8, 0.1], ["d0", "d0", "d1", "d1"])
            .unwrap()
            .record("d_end", RecordSide::End)
            .unwrap();
        let amplitude = Waveform::linear(0, 15.8, 1)
            .unwrap()
            .smooth(0.1, SmoothingKernel::Biweight)
            .unwrap()
            .sample(0.05, Interpolation::Linear)
            .unwrap()
            .align(Alignment::Left, AlignedValue::RightValue);
        let pulse = Pulse::new()
            .with_field(
                FieldName::Detuning,
                Field::new(SpatialModulation::Uniform, detuning).with_drive(
                    SpatialModulation::scaled_locations([(0, Scalar::literal(1)), (2, Scalar::var("s").unwrap())]),
                    Waveform::constant(1, 4).unwrap(),
                ),
            )
            .with_field(
                FieldName::RabiFrequencyAmplitude,
                Field::new(SpatialModulation::Uniform, amplitude),
            );
        let sequence = Sequence::from_pulse(LevelCoupling::Rydberg, pulse)
            .slice(None, Some(Scalar::literal(3)))
            .unwrap()
            .named("main");
        let register = ParallelRegister::new(
            AtomArrangement::lattice(BravaisLattice::kagome(2, 2, 5.5).unwrap()).unwrap(),
            24,
        )
        .unwrap();
        AnalogCircuit::new(crate::circuit::Register::Parallel(register), sequence)
    }

    #[test]
    fn test_round_trip() {
        let circuit = circuit();
        let text = dumps(&circuit).unwrap();
        let back: AnalogCircuit = loads(&text).unwrap();
        assert_eq!(back, circuit);
    }

    #[test]
    fn test_decimal_encoding_is_exact() {
        let text = dumps(&(Scalar::literal(1) / Scalar::literal(3))).unwrap();
        assert_eq!(text, "{\"literal\":\"1/3\"}");
        let text = dumps(&Waveform::constant(0.1, 2).unwrap()).unwrap();
        assert_eq!(
            text,
            "{\"constant\":{\"value\":{\"literal\":\"0.1\"},\"duration\":{\"literal\":\"2\"}}}"
        );
    }

    #[test]
    fn test_user_function_is_rejected() {
        let function = UserFunction::new(
            "pulse",
            Arc::new(|t: f64, _: &[f64]| t.sin()),
            Vec::new(),
            Scalar::literal(1),
        )
        .unwrap();
        let err = dumps(&Waveform::user_fn(function)).unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
        let err = loads::<Waveform>("{\"user_fn\":{}}").unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
