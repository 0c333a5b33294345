#![deny(missing_docs)]
//! Shared logging bootstrap for the record-extraction workspace.
//!
//! The engine logs through the `log` facade only; this crate wires a
//! concrete terminal logger for tests and for embedding applications
//! that do not bring their own `log` implementation.

use log::LevelFilter;
use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

/// Initializes a terminal logger at the given level.
///
/// Safely no-ops if another logger has already been installed.
pub fn initialize_terminal(level: LevelFilter) {
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}

/// Initializes a terminal logger for use in unit tests.
///
/// Uses debug level in debug builds, info in release builds. Ignores
/// the error if a logger was already set by another test.
pub fn initialize_for_tests() {
    let level = if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    initialize_terminal(level);
}
