// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Logging macros of the AHS crates.
//!
//! Records go to the `log` facade with the target `ahs.rust::<module path>`.
//! Installing a logger is left to the application.

use std::sync::atomic::{AtomicBool, Ordering};

#[doc(hidden)]
pub use log as _log;

#[doc(hidden)]
#[macro_export]
macro_rules! __emit {
    ($level:ident, $msg:literal $(, $arg:expr)* $(,)?) => {
        $crate::_log::$level!(target: concat!("ahs.rust::", module_path!()), $msg $(, $arg)*)
    };
}

#[macro_export]
macro_rules! info {
    ($msg:literal $(, $arg:expr)* $(,)?) => {
        $crate::__emit!(info, $msg $(, $arg)*)
    };
}

#[macro_export]
macro_rules! warn {
    ($msg:literal $(, $arg:expr)* $(,)?) => {
        $crate::__emit!(warn, $msg $(, $arg)*)
    };
}

/// Compiler internals (tiling, zero-filled channels), logged at info level
/// only when enabled through [`init_logging`].
#[macro_export]
macro_rules! diagnostic {
    ($msg:literal $(, $arg:expr)* $(,)?) => {
        if $crate::is_diagnostics_enabled() {
            $crate::__emit!(info, $msg $(, $arg)*)
        }
    };
}

static DIAGNOSTICS: AtomicBool = AtomicBool::new(false);

#[inline]
pub fn is_diagnostics_enabled() -> bool {
    DIAGNOSTICS.load(Ordering::Acquire)
}

/// Enable or disable diagnostic records.
pub fn init_logging(with_diagnostics: bool) {
    DIAGNOSTICS.store(with_diagnostics, Ordering::Release);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostics_flag() {
        init_logging(true);
        assert!(is_diagnostics_enabled());
        diagnostic!("tiled {} clusters", 4);
        init_logging(false);
        assert!(!is_diagnostics_enabled());
        info!("compiled {} tasks for {}", 2, "quera.aquila");
        warn!("unused assignment");
    }
}
