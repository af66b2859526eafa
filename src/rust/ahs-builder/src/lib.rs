// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

pub mod builder;
pub mod grammar;
pub mod node;
pub mod params;
mod parser;
pub mod routine;
mod stream;

pub use crate::builder::{Builder, ProgramStart};
pub use crate::grammar::{Call, Position};
pub use crate::node::{BuilderNode, Step, StepKind};
pub use crate::params::Params;
pub use crate::routine::{BackendTarget, Routine};
pub use ahs_ir::{Error, Result};
