// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Serde adapters writing exact decimals as JSON numbers.

use serde::de::{self, Deserialize, Deserializer};
use serde::ser::Serializer;

use ahs_ir::Decimal;

pub(crate) mod seq {
    use super::*;

    pub(crate) fn serialize<S: Serializer>(values: &[Decimal], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(values.iter().map(Decimal::to_f64))
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Decimal>, D::Error> {
        Vec::<f64>::deserialize(deserializer)?
            .into_iter()
            .map(|value| Decimal::try_from(value).map_err(de::Error::custom))
            .collect()
    }
}

pub(crate) mod pairs {
    use super::*;

    pub(crate) fn serialize<S: Serializer>(
        values: &[(Decimal, Decimal)],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(values.iter().map(|(x, y)| [x.to_f64(), y.to_f64()]))
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<(Decimal, Decimal)>, D::Error> {
        Vec::<[f64; 2]>::deserialize(deserializer)?
            .into_iter()
            .map(|[x, y]| {
                Ok((
                    Decimal::try_from(x).map_err(de::Error::custom)?,
                    Decimal::try_from(y).map_err(de::Error::custom)?,
                ))
            })
            .collect()
    }
}
