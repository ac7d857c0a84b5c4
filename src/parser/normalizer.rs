//! Line normalization
//!
//! Legacy spellings are rewritten on the raw text before it is split into
//! tokens, so the tokenizer and the registry only ever see canonical names:
//!
//! - `EXCEEDENCE` becomes `EXCEEDANCE` on START/END lines and at the start of
//!   keyword lines (`EXCEEDENCE_TIME`, `EXCEEDENCE_PROBABILITIES`, ...)
//! - a leading `NEW_TABLE_NAME` becomes `NEW_G_TABLE_NAME`

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

static EXCEEDENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(^start +|^end +|^ *)exceedence").expect("static regex")
});

static NEW_TABLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^ *new_table_name").expect("static regex"));

/// Remove the `#` comment and surrounding whitespace. `None` for lines with
/// nothing left.
pub fn strip_comment(line: &str) -> Option<&str> {
    let code = match line.find('#') {
        Some(pos) => &line[..pos],
        None => line,
    };
    let code = code.trim();
    (!code.is_empty()).then_some(code)
}

/// Apply the spelling rewrites to one comment-stripped line
pub fn normalize_line(line: &str) -> Cow<'_, str> {
    let line = EXCEEDENCE_RE.replace(line, "${1}EXCEEDANCE");
    if NEW_TABLE_RE.is_match(&line) {
        Cow::Owned(NEW_TABLE_RE.replace(&line, "NEW_G_TABLE_NAME").into_owned())
    } else {
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_comment() {
        assert_eq!(strip_comment("  CONTEXT all  # run everywhere"), Some("CONTEXT all"));
        assert_eq!(strip_comment("# whole line"), None);
        assert_eq!(strip_comment("   "), None);
    }

    #[test]
    fn test_exceedence_spellings() {
        assert_eq!(normalize_line("START EXCEEDENCE_TIME"), "START EXCEEDANCE_TIME");
        assert_eq!(normalize_line("end   exceedence_time"), "end   EXCEEDANCE_time");
        assert_eq!(
            normalize_line("exceedence_probabilities 1 2"),
            "EXCEEDANCE_probabilities 1 2"
        );
        // values are left alone
        assert_eq!(
            normalize_line("NEW_E_TABLE_NAME exceedence"),
            "NEW_E_TABLE_NAME exceedence"
        );
    }

    #[test]
    fn test_new_table_name_alias() {
        assert_eq!(normalize_line("NEW_TABLE_NAME fd1"), "NEW_G_TABLE_NAME fd1");
        assert_eq!(normalize_line("SERIES_NAME new_table_name"), "SERIES_NAME new_table_name");
    }
}
