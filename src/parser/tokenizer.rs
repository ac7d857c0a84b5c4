//! Block tokenizer
//!
//! Turns comment-stripped control-file lines into [`RawBlock`]s. The state
//! machine has two states, outside and inside a block:
//!
//! ```text
//!   outside --START name--> inside --keyword values--> inside
//!   inside  --END name----> outside (yields the block)
//! ```
//!
//! Keywords are lowercased, values keep their case.

use tracing::debug;
use ts_types::{RawBlock, TokenLine};

use super::normalizer::{normalize_line, strip_comment};
use crate::error::{TsError, TsResult};

#[derive(Debug, Default)]
pub struct BlockTokenizer {
    current: Option<RawBlock>,
}

impl BlockTokenizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one raw source line (1-based `line_no`). Returns a block when the
    /// line closes one.
    pub fn feed(&mut self, line_no: usize, raw: &str) -> TsResult<Option<RawBlock>> {
        let Some(code) = strip_comment(raw) else {
            return Ok(None);
        };
        let code = normalize_line(code);
        let mut words = code.split_whitespace();
        let Some(first) = words.next() else {
            return Ok(None);
        };
        let keyword = first.to_lowercase();
        let values: Vec<String> = words.map(str::to_string).collect();

        match (keyword.as_str(), self.current.as_mut()) {
            ("start", Some(open)) => Err(TsError::structure(
                line_no,
                format!(
                    "START found while block '{}' from line {} is still open",
                    open.command.to_uppercase(),
                    open.start_line
                ),
            )),
            ("start", None) => {
                let Some(name) = values.first() else {
                    return Err(TsError::structure(line_no, "START without a block name"));
                };
                self.current = Some(RawBlock {
                    command: name.to_lowercase(),
                    start_line: line_no,
                    lines: vec![TokenLine::new(keyword, values)],
                });
                Ok(None)
            }
            ("end", None) => Err(TsError::structure(
                line_no,
                "END found outside of any START block",
            )),
            ("end", Some(open)) => {
                let name = values.first().map(|v| v.to_lowercase()).unwrap_or_default();
                if name != open.command {
                    return Err(TsError::structure(
                        line_no,
                        format!(
                            "the block name '{}' in the END line does not match the block name '{}' in the START line",
                            values.first().map(String::as_str).unwrap_or(""),
                            open.command.to_uppercase()
                        ),
                    ));
                }
                open.lines.push(TokenLine::new(keyword, values));
                Ok(self.current.take())
            }
            (_, Some(open)) => {
                if values.is_empty() {
                    return Err(TsError::structure(
                        line_no,
                        format!("keyword '{}' has no value", keyword.to_uppercase()),
                    ));
                }
                open.lines.push(TokenLine::new(keyword, values));
                Ok(None)
            }
            (_, None) => {
                debug!(line = line_no, "ignoring text outside of any block");
                Ok(None)
            }
        }
    }

    /// Call at end of input; an open block is an error
    pub fn finish(self) -> TsResult<()> {
        match self.current {
            Some(open) => Err(TsError::TruncatedBlock {
                command: open.command.to_uppercase(),
                line: open.start_line,
            }),
            None => Ok(()),
        }
    }
}

/// Tokenize a whole control file
pub fn tokenize(source: &str) -> TsResult<Vec<RawBlock>> {
    let mut tokenizer = BlockTokenizer::new();
    let mut blocks = Vec::new();
    for (index, line) in source.lines().enumerate() {
        if let Some(block) = tokenizer.feed(index + 1, line)? {
            blocks.push(block);
        }
    }
    tokenizer.finish()?;
    Ok(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_block_with_comments_and_blank_lines() {
        let src = "# header\n\nSTART Copy   # trailing\n  context All\n  series_name Flow\nEND COPY\n";
        let blocks = tokenize(src).unwrap();
        assert_eq!(blocks.len(), 1);
        let b = &blocks[0];
        assert_eq!(b.command, "copy");
        assert_eq!(b.start_line, 3);
        assert_eq!(
            b.lines,
            vec![
                TokenLine::new("start", vec!["Copy".into()]),
                TokenLine::new("context", vec!["All".into()]),
                TokenLine::new("series_name", vec!["Flow".into()]),
                TokenLine::new("end", vec!["COPY".into()]),
            ]
        );
    }

    #[test]
    fn test_mismatched_end_is_structure_error() {
        let err = tokenize("START COPY\n CONTEXT all\nEND MOVE\n").unwrap_err();
        assert!(matches!(err, TsError::Structure { line: 3, .. }));
    }

    #[test]
    fn test_truncated_block() {
        let err = tokenize("START COPY\n CONTEXT all\n").unwrap_err();
        assert!(matches!(err, TsError::TruncatedBlock { line: 1, .. }));
    }

    #[test]
    fn test_nested_start_and_orphan_end() {
        assert!(matches!(
            tokenize("START COPY\nSTART MOVE\n"),
            Err(TsError::Structure { line: 2, .. })
        ));
        assert!(matches!(
            tokenize("END COPY\n"),
            Err(TsError::Structure { line: 1, .. })
        ));
    }

    #[test]
    fn test_keyword_without_value() {
        assert!(matches!(
            tokenize("START COPY\n CONTEXT\nEND COPY\n"),
            Err(TsError::Structure { line: 2, .. })
        ));
    }

    #[test]
    fn test_legacy_spellings_normalized() {
        let blocks =
            tokenize("START EXCEEDENCE_TIME\n CONTEXT all\n NEW_TABLE_NAME x\nEND EXCEEDENCE_TIME\n")
                .unwrap();
        assert_eq!(blocks[0].command, "exceedance_time");
        assert_eq!(blocks[0].lines[2].keyword, "new_g_table_name");
    }
}
