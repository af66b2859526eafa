// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Lowering of composite sequences into one waveform per channel.

use indexmap::{IndexMap, IndexSet};

use ahs_ir::{
    Assignments, Decimal, FieldName, LevelCoupling, Result, Scalar, Sequence, SpatialModulation,
    Waveform,
};

pub(crate) type ChannelKey = (LevelCoupling, FieldName, SpatialModulation);

/// Sequence lowered to concurrent channels of equal time origin.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FlatSequence {
    pub channels: IndexMap<ChannelKey, Waveform>,
    pub duration: Decimal,
}

impl FlatSequence {
    /// Waveform of `key` padded to the full duration, zero when absent.
    pub fn segment(&self, key: &ChannelKey, assignments: &Assignments) -> Result<Waveform> {
        let duration = Scalar::Literal(self.duration.clone());
        match self.channels.get(key) {
            Some(waveform) => waveform.pad_to(&duration, assignments),
            None => Ok(Waveform::Constant {
                value: Scalar::zero(),
                duration,
            }),
        }
    }
}

/// Flatten appends, slices and names of an assigned sequence.
pub(crate) fn flatten_sequence(sequence: &Sequence, assignments: &Assignments) -> Result<FlatSequence> {
    match sequence {
        Sequence::Pulses(pulses) => {
            let mut channels = IndexMap::new();
            for (coupling, pulse) in pulses {
                for (name, field) in pulse.fields() {
                    for (modulation, waveform) in field.drives() {
                        channels.insert((*coupling, *name, modulation.clone()), waveform.clone());
                    }
                }
            }
            Ok(FlatSequence {
                channels,
                duration: sequence.duration().eval(assignments)?,
            })
        }
        Sequence::Append(children) => {
            let parts = children
                .iter()
                .map(|child| flatten_sequence(child, assignments))
                .collect::<Result<Vec<_>>>()?;
            let keys: IndexSet<ChannelKey> = parts
                .iter()
                .flat_map(|part| part.channels.keys().cloned())
                .collect();
            let mut channels = IndexMap::with_capacity(keys.len());
            for key in keys {
                let segments = parts
                    .iter()
                    .map(|part| part.segment(&key, assignments))
                    .collect::<Result<Vec<_>>>()?;
                channels.insert(key, Waveform::join(segments));
            }
            Ok(FlatSequence {
                channels,
                duration: parts.iter().map(|part| part.duration.clone()).sum(),
            })
        }
        Sequence::Slice { sequence, interval } => {
            let inner = flatten_sequence(sequence, assignments)?;
            let (start, stop) = interval.resolve(&inner.duration, assignments)?;
            let channels = inner
                .channels
                .keys()
                .map(|key| {
                    let sliced = inner.segment(key, assignments)?.slice(
                        Some(Scalar::Literal(start.clone())),
                        Some(Scalar::Literal(stop.clone())),
                    )?;
                    Ok((key.clone(), sliced))
                })
                .collect::<Result<_>>()?;
            Ok(FlatSequence {
                channels,
                duration: stop - start,
            })
        }
        Sequence::Named { sequence, .. } => flatten_sequence(sequence, assignments),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ahs_ir::{Field, Pulse};

    fn d(text: &str) -> Decimal {
        text.parse().unwrap()
    }

    fn detuning(waveform: Waveform) -> Sequence {
        Sequence::from_pulse(
            LevelCoupling::Rydberg,
            Pulse::new().with_field(
                FieldName::Detuning,
                Field::new(SpatialModulation::Uniform, waveform),
            ),
        )
    }

    fn amplitude(waveform: Waveform) -> Sequence {
        Sequence::from_pulse(
            LevelCoupling::Rydberg,
            Pulse::new().with_field(
                FieldName::RabiFrequencyAmplitude,
                Field::new(SpatialModulation::Uniform, waveform),
            ),
        )
    }

    #[test]
    fn test_append_pads_missing_channels() {
        let sequence = detuning(Waveform::constant(1, 2).unwrap())
            .append(amplitude(Waveform::constant(5, 1).unwrap()));
        let empty = Assignments::new();
        let flat = flatten_sequence(&sequence, &empty).unwrap();
        assert_eq!(flat.duration, d("3"));
        assert_eq!(flat.channels.len(), 2);
        let key = (
            LevelCoupling::Rydberg,
            FieldName::RabiFrequencyAmplitude,
            SpatialModulation::Uniform,
        );
        let waveform = &flat.channels[&key];
        assert_eq!(waveform.duration().eval(&empty).unwrap(), d("3"));
        assert_eq!(waveform.eval(&d("1"), &empty).unwrap(), d("0"));
        assert_eq!(waveform.eval(&d("2.5"), &empty).unwrap(), d("5"));
    }

    #[test]
    fn test_slice_of_appended_sequence() {
        let sequence = detuning(Waveform::linear(0, 2, 2).unwrap())
            .append(detuning(Waveform::constant(2, 2).unwrap()))
            .slice(Some(Scalar::literal(1)), Some(Scalar::literal(3)))
            .unwrap()
            .named("middle");
        let empty = Assignments::new();
        let flat = flatten_sequence(&sequence, &empty).unwrap();
        assert_eq!(flat.duration, d("2"));
        let waveform = flat.channels.values().next().unwrap();
        assert_eq!(waveform.eval(&d("0"), &empty).unwrap(), d("1"));
        assert_eq!(waveform.eval(&d("2"), &empty).unwrap(), d("2"));
    }
}
