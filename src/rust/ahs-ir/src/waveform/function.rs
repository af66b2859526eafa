// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::sync::Arc;

use serde::de::Error as _;
use serde::ser::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::decimal::Decimal;
use crate::error::{Error, Result};
use crate::params::{Assignments, scalar_value};
use crate::scalar::{Scalar, is_valid_variable_name};

pub type WaveformCallable = Arc<dyn Fn(f64, &[f64]) -> f64 + Send + Sync>;

/// Waveform backed by a user supplied callable.
///
/// The callable receives the local time and the values of `parameters`, in
/// order. Two functions compare equal only when they share the callable.
#[derive(Clone)]
pub struct UserFunction {
    name: String,
    callable: WaveformCallable,
    parameters: Vec<String>,
    duration: Scalar,
}

impl UserFunction {
    pub fn new(
        name: impl Into<String>,
        callable: WaveformCallable,
        parameters: Vec<String>,
        duration: Scalar,
    ) -> Result<Self> {
        if let Some(bad) = parameters.iter().find(|p| !is_valid_variable_name(p)) {
            return Err(Error::InvalidInput(format!(
                "'{bad}' is not a valid parameter name."
            )));
        }
        Ok(UserFunction {
            name: name.into(),
            callable,
            parameters,
            duration,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    pub fn duration(&self) -> &Scalar {
        &self.duration
    }

    pub(crate) fn with_duration(&self, duration: Scalar) -> Self {
        UserFunction {
            duration,
            ..self.clone()
        }
    }

    pub fn call(&self, t: &Decimal, assignments: &Assignments) -> Result<Decimal> {
        let args = self
            .parameters
            .iter()
            .map(|name| scalar_value(assignments, name).map(Decimal::to_f64))
            .collect::<Result<Vec<_>>>()?;
        let value = (self.callable)(t.to_f64(), &args);
        Decimal::from_f64(value).ok_or_else(|| {
            Error::InvalidInput(format!(
                "Function '{}' returned {value} at t={t}.",
                self.name
            ))
        })
    }
}

impl PartialEq for UserFunction {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.callable, &other.callable)
            && self.name == other.name
            && self.parameters == other.parameters
            && self.duration == other.duration
    }
}

impl Eq for UserFunction {}

impl fmt::Debug for UserFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserFunction")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .field("duration", &self.duration)
            .finish_non_exhaustive()
    }
}

impl Serialize for UserFunction {
    fn serialize<S: Serializer>(&self, _serializer: S) -> std::result::Result<S::Ok, S::Error> {
        Err(S::Error::custom(format!(
            "user function '{}' cannot be serialized",
            self.name
        )))
    }
}

impl<'de> Deserialize<'de> for UserFunction {
    fn deserialize<D: Deserializer<'de>>(_deserializer: D) -> std::result::Result<Self, D::Error> {
        Err(D::Error::custom("user functions cannot be deserialized"))
    }
}
