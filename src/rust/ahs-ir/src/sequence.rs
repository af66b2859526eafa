// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::params::Assignments;
use crate::pulse::Pulse;
use crate::scalar::{Interval, Scalar};

/// Atomic transition addressed by a pulse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelCoupling {
    Rydberg,
    Hyperfine,
}

impl fmt::Display for LevelCoupling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LevelCoupling::Rydberg => write!(f, "rydberg"),
            LevelCoupling::Hyperfine => write!(f, "hyperfine"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sequence {
    Pulses(IndexMap<LevelCoupling, Pulse>),
    Append(Vec<Sequence>),
    Slice {
        sequence: Arc<Sequence>,
        interval: Interval,
    },
    Named {
        sequence: Arc<Sequence>,
        name: String,
    },
}

impl Default for Sequence {
    fn default() -> Self {
        Sequence::Pulses(IndexMap::new())
    }
}

impl Sequence {
    pub fn new() -> Self {
        Sequence::default()
    }

    pub fn from_pulse(coupling: LevelCoupling, pulse: Pulse) -> Self {
        Sequence::Pulses(IndexMap::from([(coupling, pulse)]))
    }

    /// Merge a pulse into a leaf sequence.
    ///
    /// Composite sequences are appended with a new leaf holding the pulse.
    pub fn with_pulse(self, coupling: LevelCoupling, pulse: Pulse) -> Self {
        match self {
            Sequence::Pulses(mut pulses) => {
                let merged = match pulses.get(&coupling) {
                    Some(existing) => existing.merge(&pulse),
                    None => pulse,
                };
                pulses.insert(coupling, merged);
                Sequence::Pulses(pulses)
            }
            other => other.append(Sequence::from_pulse(coupling, pulse)),
        }
    }

    pub fn append(self, other: Sequence) -> Sequence {
        let mut children = Vec::new();
        for child in [self, other] {
            match child {
                Sequence::Append(inner) => children.extend(inner),
                other if other.is_empty() => {}
                other => children.push(other),
            }
        }
        match children.len() {
            0 => Sequence::new(),
            1 => children.pop().unwrap_or_default(),
            _ => Sequence::Append(children),
        }
    }

    pub fn slice(self, start: Option<Scalar>, stop: Option<Scalar>) -> Result<Sequence> {
        Ok(Sequence::Slice {
            sequence: Arc::new(self),
            interval: Interval::new(start, stop)?,
        })
    }

    pub fn named(self, name: impl Into<String>) -> Sequence {
        Sequence::Named {
            sequence: Arc::new(self),
            name: name.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Sequence::Pulses(pulses) => pulses.values().all(Pulse::is_empty),
            Sequence::Append(children) => children.iter().all(Sequence::is_empty),
            Sequence::Slice { sequence, .. } | Sequence::Named { sequence, .. } => {
                sequence.is_empty()
            }
        }
    }

    pub fn duration(&self) -> Scalar {
        match self {
            Sequence::Pulses(pulses) => Scalar::max_of(pulses.values().map(Pulse::duration))
                .unwrap_or_else(|_| Scalar::zero()),
            Sequence::Append(children) => children
                .iter()
                .fold(Scalar::zero(), |acc, child| acc + child.duration()),
            Sequence::Slice { sequence, interval } => {
                Scalar::slice(sequence.duration(), interval.clone())
            }
            Sequence::Named { sequence, .. } => sequence.duration(),
        }
    }

    /// Rebuild the tree with `f` applied to every pulse.
    pub fn try_map_pulses(
        &self,
        f: &mut impl FnMut(LevelCoupling, &Pulse) -> Result<Pulse>,
    ) -> Result<Sequence> {
        Ok(match self {
            Sequence::Pulses(pulses) => Sequence::Pulses(
                pulses
                    .iter()
                    .map(|(coupling, pulse)| Ok((*coupling, f(*coupling, pulse)?)))
                    .collect::<Result<_>>()?,
            ),
            Sequence::Append(children) => Sequence::Append(
                children
                    .iter()
                    .map(|child| child.try_map_pulses(f))
                    .collect::<Result<_>>()?,
            ),
            Sequence::Slice { sequence, interval } => Sequence::Slice {
                sequence: Arc::new(sequence.try_map_pulses(f)?),
                interval: interval.clone(),
            },
            Sequence::Named { sequence, name } => Sequence::Named {
                sequence: Arc::new(sequence.try_map_pulses(f)?),
                name: name.clone(),
            },
        })
    }

    pub fn assign(&self, assignments: &Assignments) -> Result<Sequence> {
        let mapped = self.try_map_pulses(&mut |_, pulse| pulse.assign(assignments))?;
        Ok(match mapped {
            Sequence::Slice { sequence, interval } => Sequence::Slice {
                sequence,
                interval: interval.assign(assignments)?,
            },
            other => other,
        })
    }

    pub fn canonicalize(&self) -> Sequence {
        match self {
            Sequence::Pulses(pulses) => Sequence::Pulses(
                pulses
                    .iter()
                    .map(|(coupling, pulse)| (*coupling, pulse.canonicalize()))
                    .collect(),
            ),
            Sequence::Append(children) => children
                .iter()
                .map(Sequence::canonicalize)
                .fold(Sequence::new(), Sequence::append),
            Sequence::Slice { sequence, interval } => Sequence::Slice {
                sequence: Arc::new(sequence.canonicalize()),
                interval: interval.canonicalize(),
            },
            Sequence::Named { sequence, name } => Sequence::Named {
                sequence: Arc::new(sequence.canonicalize()),
                name: name.clone(),
            },
        }
    }

    /// Level couplings used anywhere in the sequence.
    pub fn level_couplings(&self) -> BTreeSet<LevelCoupling> {
        let mut out = BTreeSet::new();
        self.visit_pulses(&mut |coupling, _| {
            out.insert(coupling);
        });
        out
    }

    /// Visit every pulse in time order.
    pub fn visit_pulses<'a>(&'a self, f: &mut impl FnMut(LevelCoupling, &'a Pulse)) {
        match self {
            Sequence::Pulses(pulses) => pulses.iter().for_each(|(c, p)| f(*c, p)),
            Sequence::Append(children) => children.iter().for_each(|c| c.visit_pulses(f)),
            Sequence::Slice { sequence, .. } | Sequence::Named { sequence, .. } => {
                sequence.visit_pulses(f)
            }
        }
    }

    pub fn free_variables(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.visit_pulses(&mut |_, pulse| out.extend(pulse.free_variables()));
        self.visit_intervals(&mut |interval| {
            for bound in [interval.start(), interval.stop()].into_iter().flatten() {
                out.extend(bound.free_variables());
            }
        });
        out
    }

    fn visit_intervals(&self, f: &mut impl FnMut(&Interval)) {
        match self {
            Sequence::Pulses(_) => {}
            Sequence::Append(children) => children.iter().for_each(|c| c.visit_intervals(f)),
            Sequence::Slice { sequence, interval } => {
                f(interval);
                sequence.visit_intervals(f);
            }
            Sequence::Named { sequence, .. } => sequence.visit_intervals(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{Field, SpatialModulation};
    use crate::pulse::FieldName;
    use crate::waveform::Waveform;

    fn detuning(duration: i64) -> Sequence {
        Sequence::from_pulse(
            LevelCoupling::Rydberg,
            Pulse::new().with_field(
                FieldName::Detuning,
                Field::new(
                    SpatialModulation::Uniform,
                    Waveform::constant("delta", duration).unwrap(),
                ),
            ),
        )
    }

    #[test]
    fn test_append_sums_durations() {
        let seq = detuning(1).append(detuning(2)).append(Sequence::new());
        assert!(matches!(&seq, Sequence::Append(children) if children.len() == 2));
        assert_eq!(seq.duration(), Scalar::literal(3));
        let named = seq.clone().named("ramp");
        assert_eq!(named.duration(), Scalar::literal(3));
        let sliced = named.slice(Some(Scalar::one()), None).unwrap();
        assert_eq!(sliced.duration(), Scalar::literal(2));
    }

    #[test]
    fn test_assign_and_variables() {
        let seq = detuning(1)
            .slice(None, Some(Scalar::var("t_end").unwrap()))
            .unwrap();
        assert_eq!(
            seq.free_variables(),
            BTreeSet::from(["delta".to_string(), "t_end".to_string()])
        );
        let mut assignments = Assignments::new();
        assignments.insert(
            "t_end".to_string(),
            crate::params::ParamValue::Scalar(crate::decimal::Decimal::one()),
        );
        let assigned = seq.assign(&assignments).unwrap();
        assert_eq!(assigned.free_variables(), BTreeSet::from(["delta".to_string()]));
        assert_eq!(assigned.level_couplings(), BTreeSet::from([LevelCoupling::Rydberg]));
    }

    #[test]
    fn test_with_pulse_merges_couplings() {
        let seq = detuning(1).with_pulse(LevelCoupling::Hyperfine, Pulse::new());
        assert!(matches!(&seq, Sequence::Pulses(pulses) if pulses.len() == 2));
    }
}
