// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use std::collections::{BTreeMap, BTreeSet};

use ahs_ir::{
    AnalogCircuit, Assignments, AtomArrangement, Error, Field, FieldName, LevelCoupling,
    ParallelRegister, Pulse, Register, Result, Scalar, Sequence, SpatialModulation, Waveform,
};

use crate::builder::Builder;
use crate::grammar::Call;
use crate::node::{Step, StepKind};
use crate::params::{Params, check_unique, zip_batch};
use crate::routine::{BackendTarget, Routine};
use crate::stream::BuilderStream;

const MODULATION_HEADS: [StepKind; 3] = [StepKind::Uniform, StepKind::Location, StepKind::Var];
const LOCATION_RUN: [StepKind; 2] = [StepKind::Location, StepKind::LocationScale];
const WAVEFORM_RUN: [StepKind; 5] = [
    StepKind::Waveform,
    StepKind::Slice,
    StepKind::Record,
    StepKind::Sample,
    StepKind::WaveformScale,
];

/// Reconstruct the program described by a builder chain.
pub fn parse(builder: &Builder) -> Result<Routine> {
    builder.position()?.check(Call::Parse)?;
    let mut stream = BuilderStream::new(builder)?;
    let register = read_register(&mut stream)?;
    let sequence = read_sequence(&mut stream)?;
    let mut parser = PragmaParser::default();
    for (_, step) in stream.all() {
        parser.visit(step)?;
    }
    let register = match parser.cluster_spacing {
        Some(spacing) => Register::Parallel(ParallelRegister::new(register, spacing)?),
        None => Register::Arrangement(register),
    };
    Ok(Routine {
        circuit: AnalogCircuit::new(register, sequence),
        params: Params::new(parser.static_params, parser.batch_params, parser.args),
        target: parser.target,
    })
}

fn read_register(stream: &mut BuilderStream<'_>) -> Result<AtomArrangement> {
    let head = stream.all().next().map(|(_, step)| step);
    match head {
        Some(Step::Register(register)) => {
            stream.read_next(&[StepKind::Register]);
            Ok(register.clone())
        }
        _ => Err(Error::InvalidInput(
            "Builder chain does not start with a register.".to_string(),
        )),
    }
}

fn read_sequence(stream: &mut BuilderStream<'_>) -> Result<Sequence> {
    let applied = stream.all().find_map(|(_, step)| match step {
        Step::Apply(sequence) => Some(sequence),
        _ => None,
    });
    if let Some(sequence) = applied {
        return Ok(sequence.clone());
    }
    let mut sequence = Sequence::new();
    while let Some(head) = stream.read_next(&MODULATION_HEADS) {
        let modulation = read_modulation(stream, head)?;
        let (field_name, field_node) = enclosing_field(stream, head)?;
        let coupling = enclosing_coupling(stream, field_node)?;
        let waveform = read_waveform(stream)?;
        let pulse = Pulse::new().with_field(field_name, Field::new(modulation, waveform));
        sequence = sequence.with_pulse(coupling, pulse);
    }
    Ok(sequence)
}

fn read_modulation(stream: &mut BuilderStream<'_>, head: usize) -> Result<SpatialModulation> {
    match stream.step(head) {
        Step::Uniform => Ok(SpatialModulation::Uniform),
        Step::Var(name) => SpatialModulation::run_time_vector(name.clone()),
        Step::Location { .. } => {
            let mut locations: BTreeMap<usize, Scalar> = BTreeMap::new();
            let mut last_labels: Vec<usize> = Vec::new();
            let run = std::iter::once(head).chain(stream.eat(&LOCATION_RUN, &[]));
            for index in run {
                match stream.step(index) {
                    Step::Location { labels, scales } => {
                        for (position, label) in labels.iter().enumerate() {
                            let scale = scales
                                .as_ref()
                                .and_then(|scales| scales.get(position).cloned())
                                .unwrap_or_else(Scalar::one);
                            locations.insert(*label, scale);
                        }
                        last_labels = labels.clone();
                    }
                    Step::LocationScale(factor) => {
                        for label in &last_labels {
                            if let Some(scale) = locations.get_mut(label) {
                                *scale = Scalar::product(scale.clone(), factor.clone());
                            }
                        }
                    }
                    _ => {}
                }
            }
            Ok(SpatialModulation::ScaledLocations(locations))
        }
        step => Err(Error::InvalidInput(format!(
            "Builder node {head} is not a spatial modulation: {:?}.",
            step.kind()
        ))),
    }
}

/// Nearest field node above `index`.
fn enclosing_field(stream: &BuilderStream<'_>, index: usize) -> Result<(FieldName, usize)> {
    let mut current = stream.parent(index);
    while let Some(node) = current {
        match stream.step(node) {
            Step::Detuning => return Ok((FieldName::Detuning, node)),
            Step::RabiAmplitude => return Ok((FieldName::RabiFrequencyAmplitude, node)),
            Step::RabiPhase => return Ok((FieldName::RabiFrequencyPhase, node)),
            Step::Register(_) => break,
            _ => current = stream.parent(node),
        }
    }
    Err(Error::InvalidInput(format!(
        "Spatial modulation at builder node {index} has no enclosing field."
    )))
}

/// Nearest level coupling above `index`.
fn enclosing_coupling(stream: &BuilderStream<'_>, index: usize) -> Result<LevelCoupling> {
    let mut current = stream.parent(index);
    while let Some(node) = current {
        match stream.step(node) {
            Step::Rydberg => return Ok(LevelCoupling::Rydberg),
            Step::Hyperfine => return Ok(LevelCoupling::Hyperfine),
            Step::Register(_) => break,
            _ => current = stream.parent(node),
        }
    }
    Err(Error::InvalidInput(format!(
        "Field at builder node {index} has no enclosing level coupling."
    )))
}

fn read_waveform(stream: &mut BuilderStream<'_>) -> Result<Waveform> {
    let run = stream.eat(&WAVEFORM_RUN, &[]);
    let mut waveform: Option<Waveform> = None;
    for index in run {
        let step = stream.step(index);
        waveform = Some(match (waveform, step) {
            (None, Step::Waveform(first)) => first.clone(),
            (Some(current), Step::Waveform(next)) => current.append(next.clone()),
            (Some(current), Step::Slice { start, stop }) => {
                current.slice(start.clone(), stop.clone())?
            }
            (Some(current), Step::Record { variable, side }) => {
                current.record(variable.clone(), *side)?
            }
            (Some(current), Step::Sample { dt, interpolation }) => {
                current.sample(dt.clone(), *interpolation)?
            }
            (Some(current), Step::WaveformScale(factor)) => current.scale(factor.clone())?,
            _ => {
                return Err(Error::InvalidInput(format!(
                    "Builder node {index} modifies a waveform that was never given."
                )));
            }
        });
    }
    waveform.ok_or_else(|| {
        Error::InvalidInput("Spatial modulation is not followed by a waveform.".to_string())
    })
}

#[derive(Default)]
struct PragmaParser {
    static_params: Assignments,
    batch_params: Vec<Assignments>,
    args: Vec<String>,
    cluster_spacing: Option<Scalar>,
    target: Option<BackendTarget>,
}

impl PragmaParser {
    fn bound(&self) -> BTreeSet<String> {
        let mut out: BTreeSet<String> = self.static_params.keys().cloned().collect();
        for batch in &self.batch_params {
            out.extend(batch.keys().cloned());
        }
        out.extend(self.args.iter().cloned());
        out
    }

    fn visit(&mut self, step: &Step) -> Result<()> {
        match step {
            Step::Assign(values) => {
                check_unique(values.keys(), &self.bound(), "assign")?;
                self.static_params
                    .extend(values.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            Step::BatchAssign(values) => {
                check_unique(values.keys(), &self.bound(), "batch_assign")?;
                self.batch_params = zip_batch(values)?;
            }
            Step::Flatten(names) => {
                check_unique(names, &self.bound(), "flatten")?;
                self.args.extend(names.iter().cloned());
            }
            Step::Parallelize(spacing) => self.cluster_spacing = Some(spacing.clone()),
            Step::Device(target) => self.target = Some(*target),
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ahs_ir::{BravaisLattice, Decimal, IntoParamValue, ParamValue, RecordSide};

    use crate::builder::ProgramStart;

    fn d(text: &str) -> Decimal {
        text.parse().unwrap()
    }

    fn register() -> AtomArrangement {
        AtomArrangement::from(BravaisLattice::chain(3, 5, false).unwrap())
    }

    #[test]
    fn test_parse_uniform_detuning() {
        let routine = register()
            .rydberg()
            .and_then(Builder::detuning)
            .and_then(Builder::uniform)
            .and_then(|b| b.piecewise_constant([0.5, 0.5], [0, 1]))
            .and_then(|b| b.parse())
            .unwrap();
        let Sequence::Pulses(pulses) = routine.circuit.sequence() else {
            panic!("expected a leaf sequence");
        };
        let pulse = &pulses[&LevelCoupling::Rydberg];
        let field = pulse.field(FieldName::Detuning).unwrap();
        assert_eq!(field.drives().len(), 1);
        assert!(field.drives().contains_key(&SpatialModulation::Uniform));
        assert_eq!(routine.circuit.sequence().duration(), Scalar::literal(1));
        assert_eq!(routine.params.batch_params.len(), 1);
        assert_eq!(routine.target, None);
    }

    #[test]
    fn test_parse_mixed_fields_and_couplings() {
        let routine = register()
            .rydberg()
            .and_then(Builder::detuning)
            .and_then(Builder::uniform)
            .and_then(|b| b.constant(1, 2))
            .and_then(|b| b.location([0, 2]))
            .and_then(|b| b.scale(3))
            .and_then(|b| b.location([1]))
            .and_then(|b| b.linear(0, 1, 2))
            .and_then(Builder::rabi)
            .and_then(Builder::amplitude)
            .and_then(Builder::uniform)
            .and_then(|b| b.constant(10, 1))
            .and_then(|b| b.constant(10, 1))
            .and_then(|b| b.record("omega_end", RecordSide::End))
            .and_then(Builder::hyperfine)
            .and_then(Builder::detuning)
            .and_then(|b| b.var("mask"))
            .and_then(|b| b.constant(2, 1))
            .and_then(|b| b.parse())
            .unwrap();
        let Sequence::Pulses(pulses) = routine.circuit.sequence() else {
            panic!("expected a leaf sequence");
        };
        let rydberg = &pulses[&LevelCoupling::Rydberg];
        let detuning = rydberg.field(FieldName::Detuning).unwrap();
        let expected = SpatialModulation::scaled_locations([
            (0, Scalar::literal(3)),
            (1, Scalar::literal(1)),
            (2, Scalar::literal(3)),
        ]);
        assert!(detuning.drives().contains_key(&expected));
        let amplitude = rydberg.field(FieldName::RabiFrequencyAmplitude).unwrap();
        assert_eq!(amplitude.duration(), Scalar::literal(2));
        let hyperfine = pulses[&LevelCoupling::Hyperfine]
            .field(FieldName::Detuning)
            .unwrap();
        assert!(
            hyperfine
                .drives()
                .contains_key(&SpatialModulation::RunTimeVector("mask".to_string()))
        );
    }

    #[test]
    fn test_parse_waveform_modifiers() {
        let routine = register()
            .rydberg()
            .and_then(Builder::detuning)
            .and_then(Builder::uniform)
            .and_then(|b| b.linear(0, 4, 4))
            .and_then(|b| b.slice(Some(Scalar::literal(1)), None))
            .and_then(|b| b.scale(2))
            .and_then(|b| b.parse())
            .unwrap();
        let Sequence::Pulses(pulses) = routine.circuit.sequence() else {
            panic!("expected a leaf sequence");
        };
        let waveform = &pulses[&LevelCoupling::Rydberg]
            .field(FieldName::Detuning)
            .unwrap()
            .drives()[&SpatialModulation::Uniform];
        assert_eq!(waveform.duration(), Scalar::literal(3));
        let value = waveform.eval(&d("0"), &Assignments::new()).unwrap();
        assert_eq!(value, d("2"));
    }

    #[test]
    fn test_parse_batch_output() {
        let routine = register()
            .rydberg()
            .and_then(Builder::detuning)
            .and_then(Builder::uniform)
            .and_then(|b| b.constant("a", "b"))
            .and_then(|b| b.batch_assign([("a", vec![1, 2]), ("b", vec![3, 4])]))
            .and_then(|b| b.flatten(["c"]))
            .and_then(|b| b.parallelize(20))
            .and_then(Builder::quera_aquila)
            .and_then(|b| b.parse())
            .unwrap();
        let batch = &routine.params.batch_params;
        assert_eq!(batch.len(), 2);
        let scalar = |v: i64| v.into_param_value().unwrap();
        assert_eq!(batch[0]["a"], scalar(1));
        assert_eq!(batch[0]["b"], scalar(3));
        assert_eq!(batch[1]["a"], scalar(2));
        assert_eq!(batch[1]["b"], scalar(4));
        assert_eq!(routine.params.args, vec!["c".to_string()]);
        assert!(matches!(routine.circuit.register(), Register::Parallel(_)));
        assert_eq!(routine.target, Some(BackendTarget::QueraAquila));
        let merged = routine.assignments(&[ParamValue::Scalar(d("7"))]).unwrap();
        assert_eq!(merged[1]["c"], scalar(7));
    }

    #[test]
    fn test_parse_applied_sequence() {
        let pulse = Pulse::new().with_field(
            FieldName::Detuning,
            Field::new(SpatialModulation::Uniform, Waveform::constant(1, 1).unwrap()),
        );
        let sequence = Sequence::from_pulse(LevelCoupling::Rydberg, pulse);
        let routine = register()
            .apply(sequence.clone())
            .and_then(|b| b.assign([("x", 1)]))
            .and_then(|b| b.parse())
            .unwrap();
        assert_eq!(routine.circuit.sequence(), &sequence);
        assert_eq!(routine.params.static_params.len(), 1);
    }

    #[test]
    fn test_parse_rejects_incomplete_chain() {
        let err = register()
            .rydberg()
            .and_then(Builder::detuning)
            .and_then(|b| b.parse())
            .unwrap_err();
        assert!(matches!(err, Error::BuilderSequence { .. }));
    }
}
