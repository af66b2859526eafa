// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::decimal::Decimal;
use crate::error::{Error, Result};

/// Value bound to a program variable.
///
/// Scalar variables appear inside expressions, vector variables back
/// run-time spatial modulations (one coefficient per site).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamValue {
    Scalar(Decimal),
    Vector(Vec<Decimal>),
}

/// Variable name to value mapping used by evaluation and assignment.
pub type Assignments = IndexMap<String, ParamValue>;

impl std::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamValue::Scalar(v) => write!(f, "{v}"),
            ParamValue::Vector(values) => {
                let items: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", items.join(", "))
            }
        }
    }
}

/// Look up a scalar variable.
pub fn scalar_value<'a>(assignments: &'a Assignments, name: &str) -> Result<&'a Decimal> {
    match assignments.get(name) {
        Some(ParamValue::Scalar(v)) => Ok(v),
        Some(ParamValue::Vector(_)) => Err(Error::InvalidInput(format!(
            "Variable '{name}' is bound to a vector where a scalar is expected."
        ))),
        None => Err(Error::unassigned(name)),
    }
}

/// Conversion of user values into [`ParamValue`].
pub trait IntoParamValue {
    fn into_param_value(self) -> Result<ParamValue>;
}

impl IntoParamValue for ParamValue {
    fn into_param_value(self) -> Result<ParamValue> {
        Ok(self)
    }
}

impl IntoParamValue for Decimal {
    fn into_param_value(self) -> Result<ParamValue> {
        Ok(ParamValue::Scalar(self))
    }
}

impl IntoParamValue for f64 {
    fn into_param_value(self) -> Result<ParamValue> {
        Ok(ParamValue::Scalar(Decimal::try_from(self)?))
    }
}

impl IntoParamValue for i64 {
    fn into_param_value(self) -> Result<ParamValue> {
        Ok(ParamValue::Scalar(Decimal::from(self)))
    }
}

impl IntoParamValue for i32 {
    fn into_param_value(self) -> Result<ParamValue> {
        Ok(ParamValue::Scalar(Decimal::from(self)))
    }
}

impl IntoParamValue for Vec<Decimal> {
    fn into_param_value(self) -> Result<ParamValue> {
        Ok(ParamValue::Vector(self))
    }
}

impl IntoParamValue for Vec<f64> {
    fn into_param_value(self) -> Result<ParamValue> {
        let values = self
            .into_iter()
            .map(Decimal::try_from)
            .collect::<Result<Vec<_>>>()?;
        Ok(ParamValue::Vector(values))
    }
}

impl IntoParamValue for &[f64] {
    fn into_param_value(self) -> Result<ParamValue> {
        self.to_vec().into_param_value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_value_lookup() {
        let mut assignments = Assignments::new();
        assignments.insert("a".to_string(), 1.5_f64.into_param_value().unwrap());
        assignments.insert(
            "v".to_string(),
            vec![1.0_f64, 2.0].into_param_value().unwrap(),
        );
        assert_eq!(
            scalar_value(&assignments, "a").unwrap(),
            &"1.5".parse::<Decimal>().unwrap()
        );
        assert!(matches!(
            scalar_value(&assignments, "b"),
            Err(Error::UnassignedVariable { name }) if name == "b"
        ));
        assert!(matches!(
            scalar_value(&assignments, "v"),
            Err(Error::InvalidInput(_))
        ));
        assert!(f64::NAN.into_param_value().is_err());
    }
}
