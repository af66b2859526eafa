// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Classification of the spatial modulations driving each channel.

use indexmap::IndexMap;

use ahs_ir::{Error, FieldName, LevelCoupling, Result, SpatialModulation, Waveform};

use crate::passes::flatten::FlatSequence;

/// Spatial layout of one field.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FieldConfig {
    Global(Waveform),
    Local {
        modulation: SpatialModulation,
        waveform: Waveform,
    },
    Mixed {
        global: Waveform,
        modulation: SpatialModulation,
        local: Waveform,
    },
}

impl FieldConfig {
    fn classify(name: FieldName, drives: Vec<(SpatialModulation, Waveform)>) -> Result<FieldConfig> {
        let (uniform, local): (Vec<_>, Vec<_>) =
            drives.into_iter().partition(|(modulation, _)| modulation.is_uniform());
        let config = match (uniform.into_iter().next(), local.as_slice()) {
            (Some((_, global)), []) => FieldConfig::Global(global),
            (None, [(modulation, waveform)]) => FieldConfig::Local {
                modulation: modulation.clone(),
                waveform: waveform.clone(),
            },
            (Some((_, global)), [(modulation, waveform)]) => FieldConfig::Mixed {
                global,
                modulation: modulation.clone(),
                local: waveform.clone(),
            },
            (_, locals) => {
                let names: Vec<String> = locals.iter().map(|(m, _)| m.to_string()).collect();
                return Err(Error::UnsupportedConfiguration(format!(
                    "{name} has more than one non-uniform spatial modulation: {}.",
                    names.join(" and ")
                )));
            }
        };
        if name != FieldName::Detuning && !matches!(config, FieldConfig::Global(_)) {
            return Err(Error::UnsupportedConfiguration(format!(
                "{name} must be driven by a uniform spatial modulation only."
            )));
        }
        Ok(config)
    }
}

/// Fields of the Rydberg coupling. Absent fields are `None`.
#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) struct ChannelPlan {
    pub detuning: Option<FieldConfig>,
    pub rabi_amplitude: Option<Waveform>,
    pub rabi_phase: Option<Waveform>,
}

impl ChannelPlan {
    pub fn is_empty(&self) -> bool {
        self.detuning.is_none() && self.rabi_amplitude.is_none() && self.rabi_phase.is_none()
    }
}

pub(crate) fn analyze_channels(flat: &FlatSequence) -> Result<ChannelPlan> {
    let mut grouped: IndexMap<FieldName, Vec<(SpatialModulation, Waveform)>> = IndexMap::new();
    for ((coupling, name, modulation), waveform) in &flat.channels {
        if *coupling != LevelCoupling::Rydberg {
            return Err(Error::UnsupportedConfiguration(format!(
                "{coupling} coupling is not supported by analog hardware."
            )));
        }
        grouped
            .entry(*name)
            .or_default()
            .push((modulation.clone(), waveform.clone()));
    }
    let mut plan = ChannelPlan::default();
    for (name, drives) in grouped {
        let config = FieldConfig::classify(name, drives)?;
        match (name, config) {
            (FieldName::Detuning, config) => plan.detuning = Some(config),
            (FieldName::RabiFrequencyAmplitude, FieldConfig::Global(w)) => {
                plan.rabi_amplitude = Some(w)
            }
            (FieldName::RabiFrequencyPhase, FieldConfig::Global(w)) => plan.rabi_phase = Some(w),
            _ => {}
        }
    }
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ahs_ir::{Decimal, Scalar};

    fn flat(entries: Vec<(LevelCoupling, FieldName, SpatialModulation)>) -> FlatSequence {
        FlatSequence {
            channels: entries
                .into_iter()
                .map(|key| (key, Waveform::constant(1, 1).unwrap()))
                .collect(),
            duration: Decimal::one(),
        }
    }

    fn site(label: usize) -> SpatialModulation {
        SpatialModulation::scaled_locations([(label, Scalar::one())])
    }

    #[test]
    fn test_mixed_detuning_is_accepted() {
        let plan = analyze_channels(&flat(vec![
            (LevelCoupling::Rydberg, FieldName::Detuning, SpatialModulation::Uniform),
            (LevelCoupling::Rydberg, FieldName::Detuning, site(0)),
            (
                LevelCoupling::Rydberg,
                FieldName::RabiFrequencyAmplitude,
                SpatialModulation::Uniform,
            ),
        ]))
        .unwrap();
        assert!(matches!(plan.detuning, Some(FieldConfig::Mixed { .. })));
        assert!(plan.rabi_amplitude.is_some());
        assert!(plan.rabi_phase.is_none());
    }

    #[test]
    fn test_unsupported_configurations() {
        let err = analyze_channels(&flat(vec![
            (LevelCoupling::Rydberg, FieldName::Detuning, site(0)),
            (LevelCoupling::Rydberg, FieldName::Detuning, site(1)),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::UnsupportedConfiguration(ref m) if m.contains(" and ")));
        let err = analyze_channels(&flat(vec![(
            LevelCoupling::Rydberg,
            FieldName::RabiFrequencyPhase,
            site(0),
        )]))
        .unwrap_err();
        assert!(matches!(err, Error::UnsupportedConfiguration(_)));
        let err = analyze_channels(&flat(vec![(
            LevelCoupling::Hyperfine,
            FieldName::Detuning,
            SpatialModulation::Uniform,
        )]))
        .unwrap_err();
        assert!(matches!(err, Error::UnsupportedConfiguration(_)));
    }
}
