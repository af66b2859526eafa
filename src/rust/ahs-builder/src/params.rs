// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use ahs_ir::{Assignments, Error, ParamValue, Result};

/// Parameter bindings collected from the pragma steps of a program.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Params {
    /// Values shared by every task.
    pub static_params: Assignments,
    /// One binding per batch element. Never empty.
    pub batch_params: Vec<Assignments>,
    /// Names supplied positionally at run time, in order.
    pub args: Vec<String>,
}

/// Zip equal-length value lists into one binding per batch element.
///
/// Empty value lists are rejected, a batch always has at least one element.
pub fn zip_batch(values: &IndexMap<String, Vec<ParamValue>>) -> Result<Vec<Assignments>> {
    let Some(expected) = values.values().next().map(Vec::len) else {
        return Ok(Vec::new());
    };
    if let Some((name, _)) = values.iter().find(|(_, list)| list.is_empty()) {
        return Err(Error::InvalidInput(format!(
            "batch_assign of '{name}' has no values."
        )));
    }
    if let Some((name, list)) = values.iter().find(|(_, list)| list.len() != expected) {
        return Err(Error::shape(
            format!("batch_assign of '{name}'"),
            expected,
            list.len(),
        ));
    }
    Ok((0..expected)
        .map(|index| {
            values
                .iter()
                .map(|(name, list)| (name.clone(), list[index].clone()))
                .collect()
        })
        .collect())
}

/// Fail if `names` repeats or if any name is in `taken`.
pub fn check_unique<'a>(
    names: impl IntoIterator<Item = &'a String>,
    taken: &BTreeSet<String>,
    context: &str,
) -> Result<()> {
    let mut seen = BTreeSet::new();
    let mut duplicates = BTreeSet::new();
    for name in names {
        if taken.contains(name) || !seen.insert(name.clone()) {
            duplicates.insert(name.clone());
        }
    }
    if duplicates.is_empty() {
        return Ok(());
    }
    let duplicates: Vec<String> = duplicates.into_iter().collect();
    Err(Error::InvalidInput(format!(
        "{context} repeats already bound names: {}.",
        duplicates.join(", ")
    )))
}

impl Params {
    pub fn new(
        static_params: Assignments,
        batch_params: Vec<Assignments>,
        args: Vec<String>,
    ) -> Self {
        let batch_params = if batch_params.is_empty() {
            vec![Assignments::new()]
        } else {
            batch_params
        };
        Params {
            static_params,
            batch_params,
            args,
        }
    }

    /// Bind the run-time arguments by position.
    pub fn parse_args(&self, values: &[ParamValue]) -> Result<Assignments> {
        if values.len() != self.args.len() {
            return Err(Error::shape("flattened arguments", self.args.len(), values.len()));
        }
        Ok(self.args.iter().cloned().zip(values.iter().cloned()).collect())
    }

    /// Full binding of every batch element: static values, then batch values,
    /// then run-time arguments.
    pub fn batch_assignments(&self, args: &[ParamValue]) -> Result<Vec<Assignments>> {
        let args = self.parse_args(args)?;
        Ok(self
            .batch_params
            .iter()
            .map(|batch| {
                let mut merged = self.static_params.clone();
                merged.extend(batch.iter().map(|(k, v)| (k.clone(), v.clone())));
                merged.extend(args.iter().map(|(k, v)| (k.clone(), v.clone())));
                merged
            })
            .collect())
    }

    pub fn names(&self) -> BTreeSet<String> {
        let mut out: BTreeSet<String> = self.static_params.keys().cloned().collect();
        for batch in &self.batch_params {
            out.extend(batch.keys().cloned());
        }
        out.extend(self.args.iter().cloned());
        out
    }
}
