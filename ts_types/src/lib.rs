//! TS Types - Foundation Types for Control-File Processing
//!
//! This crate contains the plain data structures shared by every layer of
//! tsblender: the tokenizer produces [`RawBlock`]s, the unroller turns them
//! into [`Invocation`]s, and the engine reports [`Notice`]s against a
//! [`BlockOrigin`].
//!
//! ## Rules
//!
//! 1. **NO BUSINESS LOGIC** - only data structures, constructors and accessors
//! 2. **NO WORKSPACE DEPENDENCIES** - this crate sits at the bottom of the graph
//! 3. **SERIALIZABLE** - everything derives serde so run reports can be dumped

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// SOURCE LOCATION
// ============================================================================

/// Where a block came from: its command name and the 1-based line number of
/// its `START` line. Every unrolled invocation of a block shares its origin.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockOrigin {
    /// Command name, uppercased
    pub command: String,
    /// Line number (1-based) of the `START` line
    pub line: usize,
}

impl BlockOrigin {
    pub fn new(command: impl Into<String>, line: usize) -> Self {
        Self {
            command: command.into(),
            line,
        }
    }
}

impl fmt::Display for BlockOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ line {}", self.command, self.line)
    }
}

// ============================================================================
// TOKENIZED LINES AND BLOCKS
// ============================================================================

/// One whitespace-tokenized control-file line.
///
/// The keyword is lowercased by the tokenizer; values keep their original case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenLine {
    pub keyword: String,
    pub values: Vec<String>,
}

impl TokenLine {
    pub fn new(keyword: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            keyword: keyword.into(),
            values,
        }
    }

    pub fn is_start(&self) -> bool {
        self.keyword == "start"
    }

    pub fn is_end(&self) -> bool {
        self.keyword == "end"
    }

    /// First value, if any
    pub fn first_value(&self) -> Option<&str> {
        self.values.first().map(String::as_str)
    }

    /// Value at `index`, falling back to the last value when the line is
    /// shorter than `index + 1`.
    pub fn value_or_last(&self, index: usize) -> Option<&str> {
        self.values
            .get(index)
            .or_else(|| self.values.last())
            .map(String::as_str)
    }

    /// Number of tokens on the line, keyword included
    pub fn width(&self) -> usize {
        self.values.len() + 1
    }

    /// Values rejoined with single spaces
    pub fn joined_values(&self) -> String {
        self.values.join(" ")
    }
}

/// A complete `START ... END` block as tokenized from the control file.
///
/// `lines` keeps both the `start` line and the `end` line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawBlock {
    /// Command name, lowercased
    pub command: String,
    /// 1-based line number of the `START` line
    pub start_line: usize,
    pub lines: Vec<TokenLine>,
}

impl RawBlock {
    /// All lines except a trailing `end` line
    pub fn body(&self) -> &[TokenLine] {
        match self.lines.last() {
            Some(last) if last.is_end() => &self.lines[..self.lines.len() - 1],
            _ => &self.lines,
        }
    }

    pub fn origin(&self) -> BlockOrigin {
        BlockOrigin::new(self.command.to_uppercase(), self.start_line)
    }
}

// ============================================================================
// PARAMETER VALUES
// ============================================================================

/// The value bound to one keyword after unrolling: a single string, or a list
/// when the command keeps repeated or multi-token keywords together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Scalar(String),
    List(Vec<String>),
}

impl ParamValue {
    pub fn scalar(value: impl Into<String>) -> Self {
        ParamValue::Scalar(value.into())
    }

    /// First entry (the scalar itself for `Scalar`)
    pub fn first(&self) -> Option<&str> {
        match self {
            ParamValue::Scalar(s) => Some(s.as_str()),
            ParamValue::List(items) => items.first().map(String::as_str),
        }
    }

    /// Entries exactly as stored
    pub fn entries(&self) -> Vec<&str> {
        match self {
            ParamValue::Scalar(s) => vec![s.as_str()],
            ParamValue::List(items) => items.iter().map(String::as_str).collect(),
        }
    }

    /// Entries split on whitespace and flattened
    pub fn tokens(&self) -> Vec<&str> {
        self.entries()
            .into_iter()
            .flat_map(str::split_whitespace)
            .collect()
    }

    /// Entries joined with `sep`
    pub fn joined(&self, sep: &str) -> String {
        self.entries().join(sep)
    }

    /// True when the value carries no non-blank text
    pub fn is_empty(&self) -> bool {
        self.entries().iter().all(|e| e.trim().is_empty())
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.joined(" "))
    }
}

/// One executable unit after unrolling: a command name plus its keyword
/// entries (the `start` and `end` lines are not part of `entries`).
///
/// Entries may repeat a keyword for commands that keep duplicate lines
/// positionally; consumers honor the first occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
    /// Command name, uppercased
    pub command: String,
    /// 1-based line number of the originating `START` line
    pub start_line: usize,
    pub entries: Vec<(String, ParamValue)>,
}

impl Invocation {
    pub fn new(command: impl Into<String>, start_line: usize) -> Self {
        Self {
            command: command.into(),
            start_line,
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, keyword: impl Into<String>, value: ParamValue) {
        self.entries.push((keyword.into(), value));
    }

    /// First value bound to `keyword`
    pub fn get(&self, keyword: &str) -> Option<&ParamValue> {
        self.entries
            .iter()
            .find(|(k, _)| k == keyword)
            .map(|(_, v)| v)
    }

    /// Value of the `context` keyword
    pub fn context(&self) -> Option<&str> {
        self.get("context").and_then(ParamValue::first)
    }

    /// Keywords in first-seen order, without repeats
    pub fn keywords(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for (k, _) in &self.entries {
            if !seen.contains(&k.as_str()) {
                seen.push(k.as_str());
            }
        }
        seen
    }

    pub fn origin(&self) -> BlockOrigin {
        BlockOrigin::new(self.command.clone(), self.start_line)
    }
}

// ============================================================================
// NOTICES
// ============================================================================

/// Category of a non-fatal condition raised while parsing or running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    /// Command name is a deprecated alias
    Deprecated,
    /// Block has multi-valued keywords but the command cannot be unrolled
    NotUnrolled,
    /// A `*_weights_min_max` entry was synthesized in WRITE_PEST_FILES
    SynthesizedMinMax,
    /// A keyword is accepted for compatibility but has no effect
    IgnoredKeyword,
}

impl NoticeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoticeKind::Deprecated => "deprecated",
            NoticeKind::NotUnrolled => "not-unrolled",
            NoticeKind::SynthesizedMinMax => "synthesized-min-max",
            NoticeKind::IgnoredKeyword => "ignored-keyword",
        }
    }
}

/// A warning attached to a block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub origin: BlockOrigin,
    pub message: String,
}

impl Notice {
    pub fn new(kind: NoticeKind, origin: BlockOrigin, message: impl Into<String>) -> Self {
        Self {
            kind,
            origin,
            message: message.into(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind.as_str(), self.origin, self.message)
    }
}

// ============================================================================
// ENTITY KINDS
// ============================================================================

/// The six named-entity namespaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Series,
    CTable,
    STable,
    VTable,
    ETable,
    GTable,
}

impl EntityKind {
    pub fn all() -> [EntityKind; 6] {
        [
            EntityKind::Series,
            EntityKind::CTable,
            EntityKind::STable,
            EntityKind::VTable,
            EntityKind::ETable,
            EntityKind::GTable,
        ]
    }

    /// Human-readable name, as used in messages
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Series => "series",
            EntityKind::CTable => "c_table",
            EntityKind::STable => "s_table",
            EntityKind::VTable => "v_table",
            EntityKind::ETable => "e_table",
            EntityKind::GTable => "g_table",
        }
    }

    /// Keyword naming an existing entity of this kind (`SERIES_NAME`, ...)
    pub fn name_keyword(&self) -> &'static str {
        match self {
            EntityKind::Series => "series_name",
            EntityKind::CTable => "c_table_name",
            EntityKind::STable => "s_table_name",
            EntityKind::VTable => "v_table_name",
            EntityKind::ETable => "e_table_name",
            EntityKind::GTable => "g_table_name",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_or_last_pads_short_lines() {
        let line = TokenLine::new("file", vec!["data.csv".to_string()]);
        assert_eq!(line.value_or_last(0), Some("data.csv"));
        assert_eq!(line.value_or_last(3), Some("data.csv"));
    }

    #[test]
    fn test_raw_block_body_drops_end() {
        let block = RawBlock {
            command: "copy".to_string(),
            start_line: 4,
            lines: vec![
                TokenLine::new("start", vec!["COPY".to_string()]),
                TokenLine::new("context", vec!["all".to_string()]),
                TokenLine::new("end", vec!["COPY".to_string()]),
            ],
        };
        assert_eq!(block.body().len(), 2);
        assert_eq!(block.origin().to_string(), "COPY @ line 4");
    }

    #[test]
    fn test_param_value_tokens_flatten() {
        let value = ParamValue::List(vec!["1 2".to_string(), "3".to_string()]);
        assert_eq!(value.tokens(), vec!["1", "2", "3"]);
        assert_eq!(value.first(), Some("1 2"));
        assert!(!value.is_empty());
        assert!(ParamValue::scalar("  ").is_empty());
    }

    #[test]
    fn test_invocation_first_occurrence_wins() {
        let mut inv = Invocation::new("SERIES_EQUATION", 10);
        inv.push("context", ParamValue::scalar("all"));
        inv.push("equation", ParamValue::scalar("a"));
        inv.push("equation", ParamValue::scalar("b"));
        assert_eq!(inv.get("equation"), Some(&ParamValue::scalar("a")));
        assert_eq!(inv.keywords(), vec!["context", "equation"]);
        assert_eq!(inv.context(), Some("all"));
    }

    #[test]
    fn test_param_value_serializes_untagged() {
        let json = serde_json::to_string(&ParamValue::List(vec!["a".into()])).unwrap();
        assert_eq!(json, r#"["a"]"#);
    }
}
