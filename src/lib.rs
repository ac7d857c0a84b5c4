//! tsblender - Time-series control file interpreter
//!
//! Reads TSPROC-style control files (START/END blocks of keyword lines),
//! runs the selected blocks in order against an in-memory store of series
//! and result tables, and writes reports and PEST calibration inputs.
//!
//! ## Call Chain
//! Control file -> Tokenize -> Unroll -> Plan (context, registry) -> Execute
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! let report = tsblender::run("tsproc.in", None).unwrap();
//! println!("ran under context {}", report.context);
//! ```
//!
//! Keep an [`Engine`] when the store is needed after the run:
//!
//! ```rust,no_run
//! use tsblender::Engine;
//!
//! let mut engine = Engine::new(".").with_context(Some("calibration".into()));
//! let report = engine.run_file("tsproc.in").unwrap();
//! println!("{} blocks executed", report.executed.len());
//! ```

// Core error handling
pub mod error;

// Configuration for the command line front end
pub mod config;

// Dates, times and report number formatting
pub mod datetime;
pub mod format;

// Control file language
pub mod parser;
pub mod registry;

// Entity store and the series equation language
pub mod equation;
pub mod store;

// Data file readers
pub mod readers;

// Built-in numeric routines
pub mod toolbox;

// Command handlers and the engine that dispatches them
pub mod commands;
pub mod engine;

// Public re-exports
pub use config::RunConfig;
pub use engine::{Engine, RunReport};
pub use error::{TsError, TsResult};
pub use parser::{parse_control_file, parse_control_str, ParsedControl};
pub use registry::{CommandDef, COMMAND_REGISTRY};
pub use ts_types::{EntityKind, Invocation, Notice, NoticeKind, ParamValue};

/// Run a control file once with a fresh store.
///
/// `running_context` overrides the SETTINGS block's CONTEXT. Relative data
/// paths resolve against the control file's directory.
pub fn run(
    control_file: impl AsRef<std::path::Path>,
    running_context: Option<String>,
) -> TsResult<RunReport> {
    Engine::new(".")
        .with_context(running_context)
        .run_file(control_file)
}
