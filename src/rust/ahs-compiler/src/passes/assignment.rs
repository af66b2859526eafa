// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Variable assignment, including values recorded from waveforms.

use ahs_ir::{AnalogCircuit, Assignments, Decimal, Error, ParamValue, RecordSide, Result, Waveform};

/// Substitute `assignments` into the circuit.
///
/// Record nodes are resolved in program order: the value of the recorded
/// waveform at the requested side is bound to the record variable and is
/// visible to every later waveform. Returns the assigned circuit and the
/// complete binding, recorded values included.
pub(crate) fn assign_circuit(
    circuit: &AnalogCircuit,
    assignments: &Assignments,
) -> Result<(AnalogCircuit, Assignments)> {
    warn_unused(circuit, assignments);
    let mut bindings = assignments.clone();
    for (variable, waveform, side) in records(circuit) {
        let value = recorded_value(&waveform, side, &bindings)?;
        if bindings.contains_key(&variable) {
            return Err(Error::InvalidInput(format!(
                "Recorded variable '{variable}' is already assigned."
            )));
        }
        bindings.insert(variable, ParamValue::Scalar(value));
    }
    Ok((circuit.assign(&bindings)?, bindings))
}

/// Fail with the first variable that is still free after assignment.
pub(crate) fn check_assigned(circuit: &AnalogCircuit) -> Result<()> {
    match circuit.free_variables().into_iter().next() {
        Some(name) => Err(Error::unassigned(name)),
        None => Ok(()),
    }
}

fn records(circuit: &AnalogCircuit) -> Vec<(String, Waveform, RecordSide)> {
    let mut out = Vec::new();
    circuit.sequence().visit_pulses(&mut |_, pulse| {
        for waveform in pulse.waveforms() {
            waveform.visit(&mut |node| {
                if let Waveform::Record {
                    waveform,
                    variable,
                    side,
                } = node
                {
                    out.push((variable.clone(), waveform.as_ref().clone(), *side));
                }
            });
        }
    });
    out
}

fn recorded_value(waveform: &Waveform, side: RecordSide, bindings: &Assignments) -> Result<Decimal> {
    let waveform = waveform.assign(bindings)?;
    let time = match side {
        RecordSide::Start => Decimal::zero(),
        RecordSide::End => waveform.duration().eval(bindings)?,
    };
    waveform.eval(&time, bindings)
}

fn warn_unused(circuit: &AnalogCircuit, assignments: &Assignments) {
    let used = circuit.free_variables();
    let unused: Vec<&str> = assignments
        .keys()
        .filter(|name| !used.contains(*name))
        .map(String::as_str)
        .collect();
    if !unused.is_empty() {
        ahs_log::warn!(
            "Assigned variables do not appear in the program: {}",
            unused.join(", ")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ahs_ir::{
        AtomArrangement, BravaisLattice, Field, FieldName, IntoParamValue, LevelCoupling, Pulse,
        Sequence, SpatialModulation,
    };

    fn circuit(waveform: Waveform) -> AnalogCircuit {
        let pulse = Pulse::new().with_field(
            FieldName::Detuning,
            Field::new(SpatialModulation::Uniform, waveform),
        );
        AnalogCircuit::new(
            AtomArrangement::from(BravaisLattice::square(1, 1, 1).unwrap()),
            Sequence::from_pulse(LevelCoupling::Rydberg, pulse),
        )
    }

    #[test]
    fn test_record_binds_later_waveforms() {
        let waveform = Waveform::linear(0, "top", 1)
            .unwrap()
            .record("level", RecordSide::End)
            .unwrap()
            .append(Waveform::constant("level", 1).unwrap());
        let program = circuit(waveform);
        let assignments = Assignments::from([("top".to_string(), 3.into_param_value().unwrap())]);
        let (assigned, bindings) = assign_circuit(&program, &assignments).unwrap();
        assert_eq!(bindings["level"], 3.into_param_value().unwrap());
        check_assigned(&assigned).unwrap();
    }

    #[test]
    fn test_missing_variable_is_named() {
        let program = circuit(Waveform::constant("a", "b").unwrap());
        let assignments = Assignments::from([("a".to_string(), 1.into_param_value().unwrap())]);
        let (assigned, _) = assign_circuit(&program, &assignments).unwrap();
        assert!(matches!(
            check_assigned(&assigned),
            Err(Error::UnassignedVariable { name }) if name == "b"
        ));
    }
}
