// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeSet;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use ahs_ir::{
    AnalogCircuit, AtomArrangement, BravaisLattice, Cast, Error, Interpolation, IntoParamValue,
    ParamValue, RecordSide, Result, Scalar, Sequence, UserFunction, Waveform, WaveformCallable,
};

use crate::grammar::{Call, Position};
use crate::node::{BuilderNode, Step};
use crate::params::{check_unique, zip_batch};
use crate::parser;
use crate::routine::{BackendTarget, Routine};

/// Immutable fluent program builder.
///
/// Every call returns a new builder whose tail node points back at the
/// previous tail. Nodes live in a shared append-only arena.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Builder {
    nodes: Arc<Vec<BuilderNode>>,
    tail: usize,
}

impl Builder {
    pub fn start(register: AtomArrangement) -> Builder {
        Builder {
            nodes: Arc::new(vec![BuilderNode {
                parent: None,
                step: Step::Register(register),
            }]),
            tail: 0,
        }
    }

    pub fn nodes(&self) -> &[BuilderNode] {
        &self.nodes
    }

    fn node(&self, index: usize) -> Result<&BuilderNode> {
        self.nodes.get(index).ok_or_else(|| {
            Error::InvalidInput(format!("Builder node {index} is out of range."))
        })
    }

    pub fn position(&self) -> Result<Position> {
        Ok(Position::of(self.node(self.tail)?.step.kind()))
    }

    /// Arena indices of the chain, oldest first.
    pub fn chain(&self) -> Result<Vec<usize>> {
        let mut out = Vec::new();
        let mut current = Some(self.tail);
        while let Some(index) = current {
            current = self.node(index)?.parent;
            out.push(index);
        }
        out.reverse();
        Ok(out)
    }

    fn push(mut self, call: Call, step: Step) -> Result<Builder> {
        self.position()?.check(call)?;
        let parent = Some(self.tail);
        let nodes = Arc::make_mut(&mut self.nodes);
        nodes.push(BuilderNode { parent, step });
        self.tail = nodes.len() - 1;
        Ok(self)
    }

    pub fn rydberg(self) -> Result<Builder> {
        self.push(Call::Rydberg, Step::Rydberg)
    }

    pub fn hyperfine(self) -> Result<Builder> {
        self.push(Call::Hyperfine, Step::Hyperfine)
    }

    /// Use a prebuilt sequence instead of building one.
    pub fn apply(self, sequence: Sequence) -> Result<Builder> {
        self.push(Call::Apply, Step::Apply(sequence))
    }

    pub fn detuning(self) -> Result<Builder> {
        self.push(Call::Detuning, Step::Detuning)
    }

    pub fn rabi(self) -> Result<Builder> {
        self.push(Call::Rabi, Step::Rabi)
    }

    pub fn amplitude(self) -> Result<Builder> {
        self.push(Call::Amplitude, Step::RabiAmplitude)
    }

    pub fn phase(self) -> Result<Builder> {
        self.push(Call::Phase, Step::RabiPhase)
    }

    pub fn uniform(self) -> Result<Builder> {
        self.push(Call::Uniform, Step::Uniform)
    }

    /// Address the given sites with scale one.
    pub fn location(self, labels: impl IntoIterator<Item = usize>) -> Result<Builder> {
        let labels: Vec<usize> = labels.into_iter().collect();
        if labels.is_empty() {
            return Err(Error::InvalidInput(
                "location requires at least one site label.".to_string(),
            ));
        }
        self.push(
            Call::Location,
            Step::Location {
                labels,
                scales: None,
            },
        )
    }

    /// Address the given sites, one scale per site.
    pub fn location_scaled<T: Cast>(
        self,
        labels: impl IntoIterator<Item = usize>,
        scales: impl IntoIterator<Item = T>,
    ) -> Result<Builder> {
        let labels: Vec<usize> = labels.into_iter().collect();
        let scales = ahs_ir::cast_all(scales)?;
        if labels.len() != scales.len() {
            return Err(Error::shape("location scales", labels.len(), scales.len()));
        }
        self.push(
            Call::Location,
            Step::Location {
                labels,
                scales: Some(scales),
            },
        )
    }

    /// Scale the preceding locations, or the waveform built so far.
    pub fn scale(self, factor: impl Cast) -> Result<Builder> {
        let factor = factor.cast()?;
        let step = match self.position()? {
            Position::Location => Step::LocationScale(factor),
            _ => Step::WaveformScale(factor),
        };
        self.push(Call::Scale, step)
    }

    /// Site coefficients bound later through a vector variable.
    pub fn var(self, name: impl Into<String>) -> Result<Builder> {
        let name = name.into();
        if !ahs_ir::scalar::is_valid_variable_name(&name) {
            return Err(Error::InvalidInput(format!(
                "'{name}' is not a valid variable name."
            )));
        }
        self.push(Call::Var, Step::Var(name))
    }

    /// Add a waveform. Consecutive waveforms are appended in time.
    pub fn waveform(self, waveform: Waveform) -> Result<Builder> {
        self.push(Call::Waveform, Step::Waveform(waveform))
    }

    pub fn linear(self, start: impl Cast, stop: impl Cast, duration: impl Cast) -> Result<Builder> {
        let waveform = Waveform::linear(start, stop, duration)?;
        self.waveform(waveform)
    }

    pub fn constant(self, value: impl Cast, duration: impl Cast) -> Result<Builder> {
        let waveform = Waveform::constant(value, duration)?;
        self.waveform(waveform)
    }

    pub fn poly<T: Cast>(self, coeffs: impl IntoIterator<Item = T>, duration: impl Cast) -> Result<Builder> {
        let waveform = Waveform::poly(coeffs, duration)?;
        self.waveform(waveform)
    }

    pub fn piecewise_linear<D: Cast, V: Cast>(
        self,
        durations: impl IntoIterator<Item = D>,
        values: impl IntoIterator<Item = V>,
    ) -> Result<Builder> {
        let waveform = Waveform::piecewise_linear(durations, values)?;
        self.waveform(waveform)
    }

    pub fn piecewise_constant<D: Cast, V: Cast>(
        self,
        durations: impl IntoIterator<Item = D>,
        values: impl IntoIterator<Item = V>,
    ) -> Result<Builder> {
        let waveform = Waveform::piecewise_constant(durations, values)?;
        self.waveform(waveform)
    }

    pub fn fn_(
        self,
        name: impl Into<String>,
        callable: WaveformCallable,
        parameters: Vec<String>,
        duration: impl Cast,
    ) -> Result<Builder> {
        let function = UserFunction::new(name, callable, parameters, duration.cast()?)?;
        self.waveform(Waveform::user_fn(function))
    }

    pub fn slice(self, start: Option<Scalar>, stop: Option<Scalar>) -> Result<Builder> {
        if start.is_none() && stop.is_none() {
            return Err(Error::InvalidInput(
                "slice requires a start or a stop.".to_string(),
            ));
        }
        self.push(Call::Slice, Step::Slice { start, stop })
    }

    pub fn record(self, variable: impl Into<String>, side: RecordSide) -> Result<Builder> {
        let variable = variable.into();
        if !ahs_ir::scalar::is_valid_variable_name(&variable) {
            return Err(Error::InvalidInput(format!(
                "'{variable}' is not a valid variable name."
            )));
        }
        self.push(Call::Record, Step::Record { variable, side })
    }

    pub fn sample(self, dt: impl Cast, interpolation: Interpolation) -> Result<Builder> {
        let dt = dt.cast()?;
        self.push(Call::Sample, Step::Sample { dt, interpolation })
    }

    /// Names bound by earlier pragma steps.
    fn bound_names(&self) -> Result<BTreeSet<String>> {
        let mut out = BTreeSet::new();
        for index in self.chain()? {
            match &self.node(index)?.step {
                Step::Assign(values) => out.extend(values.keys().cloned()),
                Step::BatchAssign(values) => out.extend(values.keys().cloned()),
                Step::Flatten(names) => out.extend(names.iter().cloned()),
                _ => {}
            }
        }
        Ok(out)
    }

    /// Bind variables to values shared by every task.
    pub fn assign<K: Into<String>, V: IntoParamValue>(
        self,
        values: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Builder> {
        let values = values
            .into_iter()
            .map(|(name, value)| Ok((name.into(), value.into_param_value()?)))
            .collect::<Result<Vec<(String, ParamValue)>>>()?;
        check_unique(values.iter().map(|(name, _)| name), &self.bound_names()?, "assign")?;
        self.push(Call::Assign, Step::Assign(values.into_iter().collect()))
    }

    /// Bind variables to lists of values, one task per list element.
    pub fn batch_assign<K: Into<String>, V: IntoParamValue>(
        self,
        values: impl IntoIterator<Item = (K, Vec<V>)>,
    ) -> Result<Builder> {
        let values = values
            .into_iter()
            .map(|(name, list)| {
                let list = list
                    .into_iter()
                    .map(IntoParamValue::into_param_value)
                    .collect::<Result<Vec<_>>>()?;
                Ok((name.into(), list))
            })
            .collect::<Result<Vec<(String, Vec<ParamValue>)>>>()?;
        check_unique(
            values.iter().map(|(name, _)| name),
            &self.bound_names()?,
            "batch_assign",
        )?;
        let values: IndexMap<String, Vec<ParamValue>> = values.into_iter().collect();
        zip_batch(&values)?;
        self.push(Call::BatchAssign, Step::BatchAssign(values))
    }

    /// Declare variables supplied positionally at run time.
    pub fn flatten<S: Into<String>>(self, names: impl IntoIterator<Item = S>) -> Result<Builder> {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        check_unique(&names, &self.bound_names()?, "flatten")?;
        self.push(Call::Flatten, Step::Flatten(names))
    }

    /// Replicate the register over the device with the given cluster spacing.
    pub fn parallelize(self, cluster_spacing: impl Cast) -> Result<Builder> {
        let spacing = cluster_spacing.cast()?;
        self.push(Call::Parallelize, Step::Parallelize(spacing))
    }

    pub fn device(self, target: BackendTarget) -> Result<Builder> {
        self.push(Call::Device, Step::Device(target))
    }

    pub fn quera_aquila(self) -> Result<Builder> {
        self.device(BackendTarget::QueraAquila)
    }

    pub fn quera_mock(self) -> Result<Builder> {
        self.device(BackendTarget::QueraMock)
    }

    pub fn braket_aquila(self) -> Result<Builder> {
        self.device(BackendTarget::BraketAquila)
    }

    pub fn braket_local_emulator(self) -> Result<Builder> {
        self.device(BackendTarget::BraketLocalEmulator)
    }

    pub fn parse(&self) -> Result<Routine> {
        parser::parse(self)
    }

    pub fn parse_circuit(&self) -> Result<AnalogCircuit> {
        Ok(self.parse()?.circuit)
    }

    pub fn to_json(&self) -> Result<String> {
        ahs_ir::serialize::dumps(self)
    }

    /// Decode a builder, checking that parents precede their children.
    pub fn from_json(text: &str) -> Result<Builder> {
        let builder: Builder = ahs_ir::serialize::loads(text)?;
        builder.node(builder.tail)?;
        for (index, node) in builder.nodes.iter().enumerate() {
            if node.parent.is_some_and(|parent| parent >= index) {
                return Err(Error::Serialization(format!(
                    "Builder node {index} does not point to an earlier node."
                )));
            }
        }
        Ok(builder)
    }
}

/// Entry points of the fluent chain on a register.
pub trait ProgramStart: Sized {
    fn builder(self) -> Builder;

    fn rydberg(self) -> Result<Builder> {
        self.builder().rydberg()
    }

    fn hyperfine(self) -> Result<Builder> {
        self.builder().hyperfine()
    }

    fn apply(self, sequence: Sequence) -> Result<Builder> {
        self.builder().apply(sequence)
    }
}

impl ProgramStart for AtomArrangement {
    fn builder(self) -> Builder {
        Builder::start(self)
    }
}

impl ProgramStart for BravaisLattice {
    fn builder(self) -> Builder {
        Builder::start(AtomArrangement::from(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register() -> AtomArrangement {
        AtomArrangement::from(BravaisLattice::square(1, 1, 1).unwrap())
    }

    #[test]
    fn test_sequencing_errors_are_immediate() {
        let err = register().rydberg().unwrap().uniform().unwrap_err();
        assert!(matches!(
            err,
            Error::BuilderSequence { ref call, ref position, .. }
                if call == "uniform" && position == "level coupling"
        ));
        let err = register()
            .rydberg()
            .and_then(Builder::detuning)
            .and_then(|b| b.scale(2))
            .unwrap_err();
        assert!(matches!(err, Error::BuilderSequence { .. }));
        assert!(register().builder().constant(1, 1).is_err());
    }

    #[test]
    fn test_scale_depends_on_position() {
        let builder = register()
            .rydberg()
            .and_then(Builder::detuning)
            .and_then(|b| b.location([0]))
            .and_then(|b| b.scale(0.5))
            .and_then(|b| b.constant(1, 1))
            .and_then(|b| b.scale(2))
            .unwrap();
        let steps: Vec<&Step> = builder
            .chain()
            .unwrap()
            .into_iter()
            .map(|i| &builder.nodes()[i].step)
            .collect();
        assert!(matches!(steps[4], Step::LocationScale(_)));
        assert!(matches!(steps[6], Step::WaveformScale(_)));
    }

    #[test]
    fn test_branches_do_not_share_tails() {
        let field = register().rydberg().and_then(Builder::detuning).unwrap();
        let a = field.clone().uniform().unwrap();
        let b = field.clone().var("mask").unwrap();
        assert_eq!(field.chain().unwrap().len(), 3);
        assert_eq!(a.chain().unwrap().len(), 4);
        assert_eq!(b.chain().unwrap().len(), 4);
        assert_eq!(field.position().unwrap(), Position::Field);
    }

    #[test]
    fn test_duplicate_names_are_rejected() {
        let base = register()
            .rydberg()
            .and_then(Builder::detuning)
            .and_then(Builder::uniform)
            .and_then(|b| b.constant("a", "t"))
            .unwrap();
        let assigned = base.clone().assign([("a", 1.0)]).unwrap();
        assert!(assigned.clone().batch_assign([("a", vec![1.0, 2.0])]).is_err());
        assert!(assigned.clone().flatten(["a"]).is_err());
        assert!(assigned.clone().flatten(["t", "t"]).is_err());
        assert!(assigned.flatten(["t"]).is_ok());
        assert!(base.assign([("a", 1.0), ("a", 2.0)]).is_err());
    }

    #[test]
    fn test_batch_assign_arity_is_checked_at_call() {
        let base = register()
            .rydberg()
            .and_then(Builder::detuning)
            .and_then(Builder::uniform)
            .and_then(|b| b.constant("a", 1))
            .unwrap();
        let err = base
            .clone()
            .batch_assign([("a", vec![1.0, 2.0, 3.0]), ("b", vec![1.0, 2.0])])
            .unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
        let err = base
            .batch_assign([("a", Vec::<f64>::new())])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_json_round_trip() {
        let builder = register()
            .rydberg()
            .and_then(Builder::rabi)
            .and_then(Builder::amplitude)
            .and_then(Builder::uniform)
            .and_then(|b| b.piecewise_linear([0.1, 1.0, 0.1], [0, 15, 15, 0]))
            .and_then(|b| b.assign([("x", 1)]))
            .and_then(Builder::quera_mock)
            .unwrap();
        let text = builder.to_json().unwrap();
        let back = Builder::from_json(&text).unwrap();
        assert_eq!(back, builder);
        assert!(Builder::from_json("{\"nodes\":[],\"tail\":0}").is_err());
    }

    #[test]
    fn test_scaled_locations_and_sampled_function() {
        let callable: WaveformCallable = Arc::new(|t: f64, params: &[f64]| params[0] * t);
        let circuit = AtomArrangement::from(BravaisLattice::chain(3, 5, false).unwrap())
            .rydberg()
            .and_then(Builder::detuning)
            .and_then(|b| b.location_scaled([0, 2], [0.5, 1.0]))
            .and_then(|b| b.fn_("ramp", callable, vec!["slope".to_string()], 1))
            .and_then(|b| b.sample(0.25, Interpolation::Linear))
            .and_then(|b| b.assign([("slope", 2)]))
            .and_then(|b| b.parse_circuit())
            .unwrap();
        let Sequence::Pulses(pulses) = circuit.sequence() else {
            panic!("expected a leaf sequence");
        };
        let field = pulses[&ahs_ir::LevelCoupling::Rydberg]
            .field(ahs_ir::FieldName::Detuning)
            .unwrap();
        let (modulation, waveform) = field.drives().iter().next().unwrap();
        let ahs_ir::SpatialModulation::ScaledLocations(locations) = modulation else {
            panic!("expected scaled locations");
        };
        assert_eq!(locations.keys().copied().collect::<Vec<_>>(), vec![0, 2]);
        let half = locations[&0].eval(&ahs_ir::Assignments::new()).unwrap();
        assert_eq!(half, "0.5".parse::<ahs_ir::Decimal>().unwrap());
        assert!(matches!(waveform, Waveform::Sample { .. }));
    }
}
