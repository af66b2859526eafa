// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

pub mod capabilities;
pub mod codegen;
pub mod compile;
pub mod passes;
pub mod task;
pub mod units;

pub use crate::capabilities::{Capabilities, DeviceLimits};
pub use crate::codegen::AhsCodegenResult;
pub use crate::codegen::braket::BraketTaskSpecification;
pub use crate::codegen::quera::QuEraTaskSpecification;
pub use crate::compile::{CompileOptions, CompiledTask, TaskSpecification, compile};
pub use crate::passes::tiling::{ClusterIndex, ParallelDecoder};
pub use crate::task::{LocalBackend, ShotResult, TaskBackend, TaskId, TaskResult, TaskStatus};
pub use ahs_ir::{Error, Result};

/// Create a formatted error message.
pub fn create_error_message<T: Into<Error>>(error: T) -> String {
    let error = error.into();
    let mut causes = Vec::new();
    let mut source = std::error::Error::source(&error);
    while let Some(cause) = source {
        causes.push(cause.to_string());
        source = cause.source();
    }
    if causes.is_empty() {
        return format!("{error}");
    }
    // Reverse to show highest-level cause first
    causes.reverse();
    let msg = format!("Caused by:\n  {:}", causes.join("\n  "));
    format!("{error}\n{msg}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_error_message_with_causes() {
        let error = Err::<(), _>(anyhow::anyhow!("site 3 is out of range"))
            .context("while tiling the register")
            .context("compilation failed")
            .unwrap_err();
        assert_eq!(
            create_error_message(error),
            "compilation failed\nCaused by:\n  site 3 is out of range\n  while tiling the register"
        );
    }

    #[test]
    fn test_error_message_without_causes() {
        assert_eq!(
            create_error_message(Error::unassigned("x")),
            Error::unassigned("x").to_string()
        );
    }
}
