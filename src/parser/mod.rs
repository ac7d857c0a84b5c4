//! Control-file parser
//!
//! Text goes through three stages before the engine sees it:
//!
//! 1. [`normalizer`] strips comments and rewrites legacy spellings
//! 2. [`tokenizer`] groups lines into `START ... END` blocks
//! 3. [`unroller`] expands multi-valued blocks into single invocations
//!
//! Block ordering rules (WRITE_PEST_FILES after LIST_OUTPUT) are checked on
//! the raw blocks, before anything runs.

pub mod normalizer;
pub mod tokenizer;
pub mod unroller;

use std::path::Path;

use serde::Serialize;
use tracing::debug;
use ts_types::{Invocation, Notice, RawBlock};

use crate::error::{TsError, TsResult};

pub use tokenizer::{tokenize, BlockTokenizer};
pub use unroller::{check_ordering, unroll, Unrolled};

/// A fully parsed control file
#[derive(Debug, Clone, Default, Serialize)]
pub struct ParsedControl {
    /// Blocks as written, in file order
    pub blocks: Vec<RawBlock>,
    /// Unrolled invocations, in file order
    pub invocations: Vec<Invocation>,
    /// Warnings raised while unrolling
    pub notices: Vec<Notice>,
}

impl ParsedControl {
    /// CONTEXT of the first SETTINGS block, if any
    pub fn settings_context(&self) -> Option<&str> {
        self.invocations
            .iter()
            .find(|inv| inv.command == "SETTINGS")
            .and_then(Invocation::context)
    }
}

pub fn parse_control_str(source: &str) -> TsResult<ParsedControl> {
    let blocks = tokenize(source)?;
    check_ordering(&blocks)?;

    let mut parsed = ParsedControl::default();
    for block in &blocks {
        let Unrolled {
            invocations,
            notices,
        } = unroll(block)?;
        debug!(
            command = %block.command.to_uppercase(),
            line = block.start_line,
            invocations = invocations.len(),
            "unrolled block"
        );
        parsed.invocations.extend(invocations);
        parsed.notices.extend(notices);
    }
    parsed.blocks = blocks;
    Ok(parsed)
}

pub fn parse_control_file(path: impl AsRef<Path>) -> TsResult<ParsedControl> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path).map_err(|e| TsError::io(path, e))?;
    parse_control_str(&source)
}
