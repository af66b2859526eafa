// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

pub(crate) mod assignment;
pub(crate) mod channels;
pub(crate) mod flatten;
pub mod lattice;
pub mod piecewise;
pub mod tiling;
pub(crate) mod validate;
