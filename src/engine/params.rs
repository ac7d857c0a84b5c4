//! Parameter resolution
//!
//! One place turns an [`Invocation`] into the parameter map a handler sees:
//! registry defaults first, block values on top, `start`/`context` dropped,
//! empty values dropped. Typed accessors then coerce single values, lists and
//! date windows so handlers never inspect raw strings themselves.

use std::str::FromStr;

use chrono::NaiveDateTime;
use indexmap::IndexMap;
use serde::Serialize;
use ts_types::{Invocation, ParamValue};

use crate::datetime::{combine, DateFormat, DateWindow};
use crate::error::{TsError, TsResult};
use crate::registry::{CommandDef, DefaultValue};
use crate::store::EntityName;

/// Resolved keyword values of one invocation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockParams {
    command: String,
    line: usize,
    values: IndexMap<String, ParamValue>,
}

impl BlockParams {
    /// Validate an invocation against its descriptor and merge defaults.
    ///
    /// Every required keyword must be present and every supplied keyword must
    /// be declared by the command (directly or through a keyword pattern).
    pub fn resolve(def: &CommandDef, inv: &Invocation) -> TsResult<Self> {
        let supplied = inv.keywords();

        let missing: Vec<String> = def
            .args
            .iter()
            .filter(|a| **a != "context" && !supplied.contains(a))
            .map(|a| a.to_uppercase())
            .collect();
        if !missing.is_empty() {
            return Err(TsError::MissingArgument {
                command: def.name.to_string(),
                line: inv.start_line,
                missing,
            });
        }

        let unexpected: Vec<String> = supplied
            .iter()
            .filter(|k| !def.accepts(k))
            .map(|k| k.to_uppercase())
            .collect();
        if !unexpected.is_empty() {
            return Err(TsError::UnexpectedArgument {
                command: def.name.to_string(),
                line: inv.start_line,
                unexpected,
            });
        }

        let mut values = IndexMap::new();
        for kwd in def.kwds {
            match kwd.default {
                DefaultValue::Unset => {}
                DefaultValue::Scalar(v) => {
                    values.insert(kwd.name.to_string(), ParamValue::scalar(v));
                }
                DefaultValue::List(items) => {
                    values.insert(
                        kwd.name.to_string(),
                        ParamValue::List(items.iter().map(|s| s.to_string()).collect()),
                    );
                }
            }
        }
        for keyword in supplied {
            if keyword == "context" {
                continue;
            }
            if let Some(value) = inv.get(keyword) {
                values.insert(keyword.to_lowercase(), value.clone());
            }
        }
        values.retain(|_, v| !v.is_empty());

        Ok(Self {
            command: def.name.to_string(),
            line: inv.start_line,
            values,
        })
    }

    /// Build directly from keyword/value pairs, no validation
    pub fn from_pairs<'a>(
        command: &str,
        line: usize,
        pairs: impl IntoIterator<Item = (&'a str, ParamValue)>,
    ) -> Self {
        Self {
            command: command.to_uppercase(),
            line,
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.to_lowercase(), v))
                .filter(|(_, v)| !v.is_empty())
                .collect(),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn values(&self) -> &IndexMap<String, ParamValue> {
        &self.values
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    // ------------------------------------------------------------------------
    // Text
    // ------------------------------------------------------------------------

    /// First value of a required keyword
    pub fn text(&self, key: &str) -> TsResult<&str> {
        self.opt_text(key).ok_or_else(|| TsError::MissingArgument {
            command: self.command.clone(),
            line: self.line,
            missing: vec![key.to_uppercase()],
        })
    }

    pub fn opt_text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(ParamValue::first)
    }

    /// All tokens of a keyword joined with single spaces
    pub fn joined(&self, key: &str) -> Option<String> {
        self.get(key).map(|v| v.tokens().join(" "))
    }

    /// Whitespace-separated tokens across all entries; empty when absent
    pub fn tokens(&self, key: &str) -> Vec<&str> {
        self.get(key).map(ParamValue::tokens).unwrap_or_default()
    }

    /// Entries as stored (one per repeated keyword line); empty when absent
    pub fn entries(&self, key: &str) -> Vec<&str> {
        self.get(key).map(ParamValue::entries).unwrap_or_default()
    }

    /// Lowercased first value checked against a closed set of choices
    pub fn choice(&self, key: &str, choices: &[&str]) -> TsResult<String> {
        let raw = self.text(key)?;
        let lower = raw.to_lowercase();
        if choices.contains(&lower.as_str()) {
            Ok(lower)
        } else {
            Err(TsError::invalid(
                key,
                raw,
                format!("expected one of {}", choices.join(", ")),
            ))
        }
    }

    pub fn opt_choice(&self, key: &str, choices: &[&str]) -> TsResult<Option<String>> {
        if self.contains(key) {
            self.choice(key, choices).map(Some)
        } else {
            Ok(None)
        }
    }

    // ------------------------------------------------------------------------
    // Numbers and flags
    // ------------------------------------------------------------------------

    pub fn parse<T: FromStr>(&self, key: &str) -> TsResult<T> {
        let raw = self.text(key)?;
        parse_value(key, raw)
    }

    pub fn opt_parse<T: FromStr>(&self, key: &str) -> TsResult<Option<T>> {
        self.opt_text(key).map(|raw| parse_value(key, raw)).transpose()
    }

    pub fn f64(&self, key: &str) -> TsResult<f64> {
        self.parse(key)
    }

    pub fn opt_f64(&self, key: &str) -> TsResult<Option<f64>> {
        self.opt_parse(key)
    }

    /// Every token parsed as a number
    pub fn f64_list(&self, key: &str) -> TsResult<Vec<f64>> {
        self.tokens(key)
            .into_iter()
            .map(|t| parse_value(key, t))
            .collect()
    }

    /// yes/no style flag; absent means false
    pub fn flag(&self, key: &str) -> TsResult<bool> {
        match self.opt_text(key) {
            None => Ok(false),
            Some(raw) => parse_flag(raw).ok_or_else(|| {
                TsError::invalid(key, raw, "expected yes/no, y/n or true/false")
            }),
        }
    }

    // ------------------------------------------------------------------------
    // Entities and dates
    // ------------------------------------------------------------------------

    pub fn entity(&self, key: &str) -> TsResult<EntityName> {
        self.text(key).map(EntityName::new)
    }

    pub fn opt_entity(&self, key: &str) -> Option<EntityName> {
        self.opt_text(key).map(EntityName::new)
    }

    /// One entity name per token
    pub fn entities(&self, key: &str) -> Vec<EntityName> {
        self.tokens(key).into_iter().map(EntityName::new).collect()
    }

    /// DATE_1/TIME_1/DATE_2/TIME_2 window
    pub fn window(&self, format: &DateFormat) -> TsResult<DateWindow> {
        DateWindow::from_parts(
            self.opt_text("date_1"),
            self.opt_text("time_1"),
            self.opt_text("date_2"),
            self.opt_text("time_2"),
            format,
        )
    }

    /// Timestamp from a date keyword and an optional time keyword
    pub fn timestamp(
        &self,
        date_key: &str,
        time_key: &str,
        format: &DateFormat,
    ) -> TsResult<NaiveDateTime> {
        combine(self.text(date_key)?, self.opt_text(time_key), format)
    }

    /// Values of pattern keywords such as `minmean_7`, as `(7, value)`
    pub fn numbered(&self, prefix: &str) -> Vec<(usize, &ParamValue)> {
        let mut out: Vec<(usize, &ParamValue)> = self
            .values
            .iter()
            .filter_map(|(k, v)| {
                k.strip_prefix(prefix)
                    .and_then(|n| n.parse::<usize>().ok())
                    .map(|n| (n, v))
            })
            .collect();
        out.sort_by_key(|(n, _)| *n);
        out
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> TsResult<T> {
    raw.trim().parse::<T>().map_err(|_| {
        TsError::invalid(
            key,
            raw,
            format!("expected {}", std::any::type_name::<T>()),
        )
    })
}

/// Interpret yes/no style control-file flags
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "y" | "yes" | "true" | "t" | "1" => Some(true),
        "n" | "no" | "false" | "f" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{COPY, FLOW_DURATION, SERIES_STATISTICS};
    use pretty_assertions::assert_eq;

    fn inv(command: &str, pairs: &[(&str, &str)]) -> Invocation {
        let mut inv = Invocation::new(command, 7);
        for (k, v) in pairs {
            inv.push(*k, ParamValue::scalar(*v));
        }
        inv
    }

    #[test]
    fn test_defaults_merged_and_context_dropped() {
        let params = BlockParams::resolve(
            &COPY,
            &inv(
                "COPY",
                &[("context", "all"), ("series_name", "a"), ("new_entity_name", "b")],
            ),
        )
        .unwrap();
        assert!(!params.contains("context"));
        assert_eq!(params.opt_text("overwrite"), Some("no"));
        assert!(!params.flag("overwrite").unwrap());
        assert_eq!(params.entity("series_name").unwrap().as_str(), "A");
        assert_eq!(params.line(), 7);
    }

    #[test]
    fn test_missing_required_keyword() {
        let err =
            BlockParams::resolve(&COPY, &inv("COPY", &[("context", "all"), ("series_name", "a")]))
                .unwrap_err();
        match err {
            TsError::MissingArgument { missing, line, .. } => {
                assert_eq!(missing, vec!["NEW_ENTITY_NAME"]);
                assert_eq!(line, 7);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_well_formed_block_is_accepted() {
        // Every supplied keyword is declared: this must pass
        let ok = BlockParams::resolve(
            &COPY,
            &inv(
                "COPY",
                &[
                    ("context", "all"),
                    ("series_name", "a"),
                    ("new_entity_name", "b"),
                    ("overwrite", "yes"),
                ],
            ),
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn test_undeclared_keyword_rejected() {
        let err = BlockParams::resolve(
            &COPY,
            &inv(
                "COPY",
                &[("context", "all"), ("new_entity_name", "b"), ("colour", "red")],
            ),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            TsError::UnexpectedArgument { ref unexpected, .. } if unexpected == &vec!["COLOUR".to_string()]
        ));
    }

    #[test]
    fn test_pattern_keywords_and_list_defaults() {
        let params = BlockParams::resolve(
            &SERIES_STATISTICS,
            &inv(
                "SERIES_STATISTICS",
                &[
                    ("context", "all"),
                    ("series_name", "q"),
                    ("new_s_table_name", "s"),
                    ("maxmean_30", "yes"),
                    ("minmean_7", "yes"),
                ],
            ),
        )
        .unwrap();
        let numbered: Vec<usize> = params.numbered("minmean_").iter().map(|(n, _)| *n).collect();
        assert_eq!(numbered, vec![7]);

        let fd = BlockParams::resolve(
            &FLOW_DURATION,
            &inv("FLOW_DURATION", &[("context", "all"), ("series_name", "q")]),
        )
        .unwrap();
        assert_eq!(fd.f64_list("exceedance_probabilities").unwrap().len(), 13);
    }

    #[test]
    fn test_typed_accessors() {
        let params = BlockParams::from_pairs(
            "x",
            1,
            [
                ("n", ParamValue::scalar("3")),
                ("bad", ParamValue::scalar("three")),
                ("flag", ParamValue::scalar("Y")),
                ("kind", ParamValue::scalar("Fixed")),
            ],
        );
        assert_eq!(params.parse::<usize>("n").unwrap(), 3);
        assert!(matches!(
            params.f64("bad"),
            Err(TsError::InvalidValue { .. })
        ));
        assert!(params.flag("flag").unwrap());
        assert_eq!(params.choice("kind", &["fixed", "local"]).unwrap(), "fixed");
        assert!(params.choice("kind", &["sliding"]).is_err());
        assert!(matches!(
            params.text("absent"),
            Err(TsError::MissingArgument { .. })
        ));
    }
}
