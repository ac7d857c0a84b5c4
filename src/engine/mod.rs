//! Execution Engine
//!
//! Runs a parsed control file against one [`Session`]. A run is planned
//! before anything executes:
//!
//! ```text
//! ParsedControl ──► run context ──► plan (filter, resolve, validate) ──► execute in order
//! ```
//!
//! ## Guidelines
//!
//! 1. A block runs when its CONTEXT is exactly the run context or `all`;
//!    SETTINGS blocks always run
//! 2. Every selected block is checked against the registry before the first
//!    one executes, so a typo late in the file costs no partial run
//! 3. The first failing block aborts the run; its error carries the block
//!    name and START line
//! 4. Warnings are logged and also returned as [`Notice`]s in the report

pub mod command;
pub mod params;

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};
use ts_types::{BlockOrigin, Invocation, Notice, NoticeKind};

use crate::commands::{Plotter, Session};
use crate::error::{TsError, TsResult};
use crate::parser::{parse_control_file, parse_control_str, ParsedControl};
use crate::readers::BinarySeriesReader;
use crate::registry::COMMAND_REGISTRY;
use crate::store::StoreSummary;

pub use command::Command;
pub use params::BlockParams;

/// Accepted for compatibility, superseded by other keywords
const IGNORED_KEYWORDS: [(&str, &str, &str); 2] = [
    ("WRITE_PEST_FILES", "automatic_user_intervention", "set DOAUI to aui, auid or noaui instead"),
    ("WRITE_PEST_FILES", "truncated_svd", "set EIGTHRESH to a small positive value instead"),
];

// ============================================================================
// REPORT
// ============================================================================

/// Outcome of one completed run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub context: String,
    /// One entry per executed invocation, in execution order
    pub executed: Vec<BlockOrigin>,
    pub skipped: Vec<BlockOrigin>,
    pub notices: Vec<Notice>,
    /// Store contents at the end of a debug run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store: Option<StoreSummary>,
}

// ============================================================================
// PLAN
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Step {
    Run(BlockParams),
    Skip(BlockOrigin),
}

struct Plan {
    steps: Vec<Step>,
    notices: Vec<Notice>,
}

fn selected(block_context: &str, run_context: &str) -> bool {
    block_context == "all" || block_context == run_context
}

fn plan(invocations: &[Invocation], run_context: &str) -> TsResult<Plan> {
    let mut steps = Vec::with_capacity(invocations.len());
    let mut notices = Vec::new();
    for inv in invocations {
        let block_context = inv.context().ok_or_else(|| TsError::MissingContext {
            command: inv.command.clone(),
            line: inv.start_line,
        })?;
        let is_settings = inv.command.eq_ignore_ascii_case("SETTINGS");
        if !is_settings && !selected(block_context, run_context) {
            steps.push(Step::Skip(inv.origin()));
            continue;
        }

        let def = COMMAND_REGISTRY
            .get(&inv.command)
            .ok_or_else(|| TsError::UnknownCommand {
                command: inv.command.clone(),
                line: inv.start_line,
            })?;
        if let Some(hint) = def.deprecated {
            let notice = Notice::new(
                NoticeKind::Deprecated,
                inv.origin(),
                format!("{} is deprecated: {hint}", def.name),
            );
            warn!(command = def.name, line = inv.start_line, "{hint}");
            notices.push(notice);
        }
        for (command, keyword, hint) in IGNORED_KEYWORDS {
            if def.name == command && inv.get(keyword).is_some() {
                let message = format!("{} has no effect; {hint}", keyword.to_uppercase());
                warn!(command, line = inv.start_line, "{message}");
                notices.push(Notice::new(NoticeKind::IgnoredKeyword, inv.origin(), message));
            }
        }
        steps.push(Step::Run(BlockParams::resolve(def, inv)?));
    }
    Ok(Plan { steps, notices })
}

// ============================================================================
// ENGINE
// ============================================================================

/// One interpreter instance; owns the session its runs mutate
pub struct Engine {
    session: Session,
    context: Option<String>,
    debug: bool,
}

impl Engine {
    /// Relative data file names resolve against `base_dir`
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            session: Session::new(base_dir),
            context: None,
            debug: false,
        }
    }

    /// Run context; overrides the SETTINGS block's CONTEXT
    pub fn with_context(mut self, context: Option<String>) -> Self {
        self.context = context.filter(|c| !c.trim().is_empty());
        self
    }

    /// Log parameter maps and report the store contents
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_binary_reader(mut self, reader: Box<dyn BinarySeriesReader>) -> Self {
        self.session = self.session.with_binary_reader(reader);
        self
    }

    pub fn with_plotter(mut self, plotter: Box<dyn Plotter>) -> Self {
        self.session = self.session.with_plotter(plotter);
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn into_session(self) -> Session {
        self.session
    }

    /// Parse and run a control file. Relative names inside it resolve
    /// against the file's own directory.
    pub fn run_file(&mut self, path: impl AsRef<Path>) -> TsResult<RunReport> {
        let path = path.as_ref();
        let parsed = parse_control_file(path)?;
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            self.session.base_dir = dir.to_path_buf();
        }
        info!(file = %path.display(), blocks = parsed.blocks.len(), "parsed control file");
        self.run_parsed(parsed)
    }

    pub fn run_str(&mut self, source: &str) -> TsResult<RunReport> {
        let parsed = parse_control_str(source)?;
        self.run_parsed(parsed)
    }

    pub fn run_parsed(&mut self, parsed: ParsedControl) -> TsResult<RunReport> {
        let context = match (&self.context, parsed.settings_context()) {
            (Some(explicit), _) => explicit.clone(),
            (None, Some(settings)) => settings.to_string(),
            (None, None) => return Err(TsError::NoRunContext),
        };
        info!(context = %context, "run context");

        let Plan { steps, notices } = plan(&parsed.invocations, &context)?;
        let mut report = RunReport {
            context,
            executed: Vec::new(),
            skipped: Vec::new(),
            notices: parsed.notices,
            store: None,
        };
        report.notices.extend(notices);

        for step in steps {
            match step {
                Step::Skip(origin) => {
                    info!(command = %origin.command, line = origin.line, "SKIPPING");
                    report.skipped.push(origin);
                }
                Step::Run(params) => {
                    info!(command = %params.command(), line = params.line(), "RUNNING");
                    if self.debug {
                        debug!(
                            command = %params.command(),
                            params = %serde_json::to_string(params.values()).unwrap_or_default(),
                            "resolved parameters"
                        );
                    }
                    let origin = BlockOrigin::new(params.command(), params.line());
                    Command::build(&params, &self.session.date_format)
                        .and_then(|cmd| cmd.execute(&mut self.session))
                        .map_err(|e| e.in_block(&origin.command, origin.line))?;
                    report.executed.push(origin);
                }
            }
        }

        if self.debug {
            let summary = self.session.store.summary();
            debug!(
                store = %serde_json::to_string_pretty(&summary).unwrap_or_default(),
                "entity store at end of run"
            );
            report.store = Some(summary);
        }
        Ok(report)
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("session", &self.session)
            .field("context", &self.context)
            .field("debug", &self.debug)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const UNIFORM: &str = "\
START SETTINGS
 CONTEXT calib
END SETTINGS

START NEW_SERIES_UNIFORM
 CONTEXT all
 NEW_SERIES_NAME ones
 DATE_1 2020-01-01
 TIME_1 00:00:00
 DATE_2 2020-01-05
 TIME_2 00:00:00
 TIME_INTERVAL 1
 TIME_UNIT day
 NEW_SERIES_VALUE 1.0
END NEW_SERIES_UNIFORM

START SERIES_EQUATION
 CONTEXT VERIFY
 NEW_SERIES_NAME twos
 EQUATION ones * 2
END SERIES_EQUATION
";

    #[test]
    fn test_context_filtering() {
        let mut engine = Engine::new(".");
        let report = engine.run_str(UNIFORM).unwrap();
        assert_eq!(report.context, "calib");
        let executed: Vec<&str> = report.executed.iter().map(|o| o.command.as_str()).collect();
        assert_eq!(executed, vec!["SETTINGS", "NEW_SERIES_UNIFORM"]);
        assert_eq!(report.skipped, vec![BlockOrigin::new("SERIES_EQUATION", 17)]);
        assert!(engine.session().store.has_series(&"ONES".into()));
    }

    #[test]
    fn test_explicit_context_overrides_settings() {
        let mut engine = Engine::new(".").with_context(Some("VERIFY".into()));
        let report = engine.run_str(UNIFORM).unwrap();
        assert_eq!(report.executed.len(), 3);
        assert!(engine.session().store.has_series(&"TWOS".into()));
    }

    #[test]
    fn test_context_match_is_case_sensitive() {
        let src = "\
START NEW_SERIES_UNIFORM
 CONTEXT c1
 NEW_SERIES_NAME lower
 DATE_1 2020-01-01
 TIME_1 00:00:00
 DATE_2 2020-01-03
 TIME_2 00:00:00
 TIME_INTERVAL 1
 TIME_UNIT day
 NEW_SERIES_VALUE 1.0
END NEW_SERIES_UNIFORM
START ERASE_ENTITY
 CONTEXT ALL
 SERIES_NAME nothing_here
END ERASE_ENTITY
START NEW_SERIES_UNIFORM
 CONTEXT C1
 NEW_SERIES_NAME upper
 DATE_1 2020-01-01
 TIME_1 00:00:00
 DATE_2 2020-01-03
 TIME_2 00:00:00
 TIME_INTERVAL 1
 TIME_UNIT day
 NEW_SERIES_VALUE 1.0
END NEW_SERIES_UNIFORM
";
        let mut engine = Engine::new(".").with_context(Some("C1".into()));
        let report = engine.run_str(src).unwrap();
        assert_eq!(
            report.skipped,
            vec![
                BlockOrigin::new("NEW_SERIES_UNIFORM", 1),
                BlockOrigin::new("ERASE_ENTITY", 12),
            ]
        );
        assert_eq!(report.executed, vec![BlockOrigin::new("NEW_SERIES_UNIFORM", 16)]);
        assert!(!engine.session().store.has_series(&"LOWER".into()));
        assert!(engine.session().store.has_series(&"UPPER".into()));
    }

    #[test]
    fn test_no_run_context() {
        let src = "START ERASE_ENTITY\n CONTEXT all\n SERIES_NAME a\nEND ERASE_ENTITY\n";
        assert!(matches!(Engine::new(".").run_str(src), Err(TsError::NoRunContext)));
    }

    #[test]
    fn test_missing_block_context() {
        let src = "START ERASE_ENTITY\n SERIES_NAME a\nEND ERASE_ENTITY\n";
        let err = Engine::new(".")
            .with_context(Some("x".into()))
            .run_str(src)
            .unwrap_err();
        assert!(matches!(err, TsError::MissingContext { line: 1, .. }));
    }

    #[test]
    fn test_validation_precedes_execution() {
        // the first block would fail at run time, the second is malformed
        let src = "\
START ERASE_ENTITY
 CONTEXT all
 SERIES_NAME nothing_here
END ERASE_ENTITY
START COPY
 CONTEXT all
 SERIES_NAME a
 NEW_ENTITY_NAME b
 BOGUS_KEYWORD 1
END COPY
";
        let err = Engine::new(".")
            .with_context(Some("x".into()))
            .run_str(src)
            .unwrap_err();
        assert!(matches!(err, TsError::UnexpectedArgument { line: 5, .. }));
    }

    #[test]
    fn test_handler_error_names_block() {
        let src = "START ERASE_ENTITY\n CONTEXT all\n SERIES_NAME nothing_here\nEND ERASE_ENTITY\n";
        let err = Engine::new(".")
            .with_context(Some("x".into()))
            .run_str(src)
            .unwrap_err();
        assert_eq!(err.line(), Some(1));
        assert!(matches!(err.root_cause(), TsError::MissingEntity { .. }));
    }

    #[test]
    fn test_unknown_command_in_skipped_block_is_ignored() {
        let src = "START NOT_A_COMMAND\n CONTEXT other\nEND NOT_A_COMMAND\n";
        let report = Engine::new(".")
            .with_context(Some("x".into()))
            .run_str(src)
            .unwrap();
        assert_eq!(report.skipped.len(), 1);

        let src = "START NOT_A_COMMAND\n CONTEXT all\nEND NOT_A_COMMAND\n";
        let err = Engine::new(".")
            .with_context(Some("x".into()))
            .run_str(src)
            .unwrap_err();
        assert!(matches!(err, TsError::UnknownCommand { line: 1, .. }));
    }

    #[test]
    fn test_debug_reports_store() {
        let mut engine = Engine::new(".").with_debug(true);
        let report = engine.run_str(UNIFORM).unwrap();
        let store = report.store.unwrap();
        assert_eq!(store.series.len(), 1);
        assert_eq!(store.series[0].name, "ONES");
    }
}
