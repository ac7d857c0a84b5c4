//! Error handling for tsblender
//!
//! One `thiserror` enum covers parse, validation, store and handler failures.
//! Handler errors are wrapped in [`TsError::Block`] so callers always learn
//! which block (and which `START` line) failed.

use std::path::PathBuf;

use thiserror::Error;
use ts_types::EntityKind;

/// Main error type for control-file processing
#[derive(Error, Debug)]
pub enum TsError {
    #[error("Structure error at line {line}: {message}")]
    Structure { line: usize, message: String },

    #[error("Block '{command}' starting at line {line} is never closed with END {command}")]
    TruncatedBlock { command: String, line: usize },

    #[error("Unknown command '{command}' at line {line}")]
    UnknownCommand { command: String, line: usize },

    #[error("{command} at line {line} is missing required keyword(s): {}", .missing.join(", "))]
    MissingArgument {
        command: String,
        line: usize,
        missing: Vec<String>,
    },

    #[error("{command} at line {line} does not accept keyword(s): {}", .unexpected.join(", "))]
    UnexpectedArgument {
        command: String,
        line: usize,
        unexpected: Vec<String>,
    },

    #[error("{name} is already a named {kind}")]
    DuplicateEntity { kind: EntityKind, name: String },

    #[error("{name} is not a named {kind}")]
    MissingEntity { kind: EntityKind, name: String },

    #[error("Ordering error at line {line}: {message}")]
    Ordering { line: usize, message: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{command} at line {line} has no CONTEXT keyword")]
    MissingContext { command: String, line: usize },

    #[error("No run context: pass one explicitly or set CONTEXT in a SETTINGS block")]
    NoRunContext,

    #[error("Invalid value '{value}' for {keyword}: {reason}")]
    InvalidValue {
        keyword: String,
        value: String,
        reason: String,
    },

    #[error("Equation error: {0}")]
    Equation(String),

    #[error("Cannot read {path}: {message}")]
    Reader { path: PathBuf, message: String },

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("{command} (line {line}) failed: {source}")]
    Block {
        command: String,
        line: usize,
        #[source]
        source: Box<TsError>,
    },
}

/// Result alias used across the crate
pub type TsResult<T> = Result<T, TsError>;

impl TsError {
    pub fn structure(line: usize, message: impl Into<String>) -> Self {
        TsError::Structure {
            line,
            message: message.into(),
        }
    }

    pub fn invalid(keyword: &str, value: impl Into<String>, reason: impl Into<String>) -> Self {
        TsError::InvalidValue {
            keyword: keyword.to_uppercase(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TsError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn reader(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        TsError::Reader {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Attach block name and START line to a handler failure.
    /// Errors that already carry a block location are returned unchanged.
    pub fn in_block(self, command: &str, line: usize) -> Self {
        match self {
            TsError::Block { .. } => self,
            other => TsError::Block {
                command: command.to_string(),
                line,
                source: Box::new(other),
            },
        }
    }

    /// Innermost error, unwrapping any [`TsError::Block`] layers
    pub fn root_cause(&self) -> &TsError {
        let mut current = self;
        while let TsError::Block { source, .. } = current {
            current = source;
        }
        current
    }

    /// Source line of the failing block, when known
    pub fn line(&self) -> Option<usize> {
        match self {
            TsError::Structure { line, .. }
            | TsError::TruncatedBlock { line, .. }
            | TsError::UnknownCommand { line, .. }
            | TsError::MissingArgument { line, .. }
            | TsError::UnexpectedArgument { line, .. }
            | TsError::Ordering { line, .. }
            | TsError::MissingContext { line, .. }
            | TsError::Block { line, .. } => Some(*line),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_cause_unwraps_block_layers() {
        let err = TsError::MissingEntity {
            kind: EntityKind::Series,
            name: "FLOW".to_string(),
        }
        .in_block("COPY", 12);
        assert_eq!(err.line(), Some(12));
        assert!(matches!(err.root_cause(), TsError::MissingEntity { .. }));
        assert_eq!(
            err.to_string(),
            "COPY (line 12) failed: FLOW is not a named series"
        );
    }

    #[test]
    fn test_in_block_does_not_double_wrap() {
        let err = TsError::Validation("x".into())
            .in_block("COPY", 3)
            .in_block("MOVE", 9);
        assert_eq!(err.line(), Some(3));
    }

    #[test]
    fn test_missing_argument_lists_keywords() {
        let err = TsError::MissingArgument {
            command: "COPY".into(),
            line: 4,
            missing: vec!["NEW_ENTITY_NAME".into()],
        };
        assert_eq!(
            err.to_string(),
            "COPY at line 4 is missing required keyword(s): NEW_ENTITY_NAME"
        );
    }
}
