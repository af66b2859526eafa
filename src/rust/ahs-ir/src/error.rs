// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use std::fmt::Display;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Variable '{name}' is not assigned.")]
    UnassignedVariable { name: String },

    #[error("Length mismatch for {context}: expected {expected}, found {found}.")]
    ShapeMismatch {
        context: String,
        expected: usize,
        found: usize,
    },

    #[error("Unsupported field configuration: {0}")]
    UnsupportedConfiguration(String),

    #[error("Cannot compile waveform to {target}: {reason}")]
    Discretization { target: String, reason: String },

    #[error(
        "Discontinuity at t={time} while appending waveforms: jump of {jump} between {left} and {right}."
    )]
    Discontinuity {
        time: String,
        jump: String,
        left: String,
        right: String,
    },

    #[error("Out of bounds: {0}")]
    Bounds(String),

    #[error("Cannot call `{call}` at builder position `{position}`. Expected one of: {expected}.")]
    BuilderSequence {
        call: String,
        position: String,
        expected: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    pub fn new<T>(msg: T) -> Self
    where
        T: Display,
    {
        Error::Anyhow(anyhow::anyhow!(msg.to_string()))
    }

    pub fn unassigned(name: impl Into<String>) -> Self {
        Error::UnassignedVariable { name: name.into() }
    }

    pub fn shape(context: impl Into<String>, expected: usize, found: usize) -> Self {
        Error::ShapeMismatch {
            context: context.into(),
            expected,
            found,
        }
    }

    pub fn discretization(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Discretization {
            target: target.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Serialization(error.to_string())
    }
}
