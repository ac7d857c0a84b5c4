//! Block unroller
//!
//! A block whose keywords carry several values expands into one invocation
//! per value position. Short lines repeat their last value, so one-shot
//! keywords such as `FILE` apply to every repetition:
//!
//! ```text
//! START GET_SERIES_CSV              GET_SERIES_CSV  file=a.csv new_series_name=Q1 usecol=2
//!  FILE a.csv                  =>   GET_SERIES_CSV  file=a.csv new_series_name=Q2 usecol=3
//!  NEW_SERIES_NAME Q1 Q2
//!  USECOL 2 3
//! END GET_SERIES_CSV
//! ```
//!
//! Commands whose keywords are inherently multi-valued are never unrolled.
//! For some of them repeated keyword lines are merged into one list.

use tracing::warn;
use ts_types::{Invocation, Notice, NoticeKind, ParamValue, RawBlock, TokenLine};

use crate::error::{TsError, TsResult};

/// Non-rollable commands that merge repeated keyword lines into one list
pub const DUPLICATE_KEYWORD_COMMANDS: &[&str] = &[
    "exceedance_time",
    "flow_duration",
    "get_mul_series_gsflow_gage",
    "get_mul_series_plotgen",
    "get_mul_series_ssf",
    "get_mul_series_statvar",
    "hydrologic_indices",
    "list_output",
    "plot",
    "write_pest_files",
];

/// Non-rollable commands that keep multi-token lines as they are
pub const MULTIPLE_ENTRY_COMMANDS: &[&str] = &["hydrologic_indices", "series_equation"];

/// Non-rollable commands for which multi-valued lines are expected
const MULTI_VALUE_EXPECTED: &[&str] = &[
    "flow_duration",
    "hydrologic_indices",
    "series_equation",
    "write_pest_files",
];

/// Keyword families of WRITE_PEST_FILES observation groups
pub const WEIGHT_FAMILIES: &[&str] = &["series", "s_table", "v_table", "e_table", "g_table"];

pub fn is_rollable(command: &str) -> bool {
    !DUPLICATE_KEYWORD_COMMANDS.contains(&command) && !MULTIPLE_ENTRY_COMMANDS.contains(&command)
}

pub fn allows_duplicates(command: &str) -> bool {
    DUPLICATE_KEYWORD_COMMANDS.contains(&command)
}

/// Invocations produced from one block plus any warnings raised on the way
#[derive(Debug, Clone, Default)]
pub struct Unrolled {
    pub invocations: Vec<Invocation>,
    pub notices: Vec<Notice>,
}

pub fn unroll(block: &RawBlock) -> TsResult<Unrolled> {
    let mut notices = Vec::new();
    let origin = block.origin();

    let body: Vec<TokenLine> = if block.command == "write_pest_files" {
        let (lines, synthesized) = insert_weight_bounds(block)?;
        notices.extend(synthesized);
        lines
    } else {
        block.body().to_vec()
    };

    let maxl = if block.command == "settings" {
        2
    } else {
        body.iter().map(TokenLine::width).max().unwrap_or(2).max(2)
    };

    let mut invocations = Vec::new();
    if is_rollable(&block.command) {
        for position in 0..maxl - 1 {
            let mut inv = Invocation::new(origin.command.clone(), block.start_line);
            for line in body.iter().skip(1) {
                if let Some(value) = line.value_or_last(position) {
                    inv.push(line.keyword.clone(), ParamValue::scalar(value));
                }
            }
            invocations.push(inv);
        }
    } else {
        let mut inv = Invocation::new(origin.command.clone(), block.start_line);
        if allows_duplicates(&block.command) {
            for line in body.iter().skip(1) {
                let joined = line.joined_values();
                match inv.entries.iter_mut().find(|(k, _)| *k == line.keyword) {
                    Some((_, ParamValue::List(items))) => items.push(joined),
                    Some((_, existing)) => {
                        *existing = ParamValue::List(vec![existing.to_string(), joined])
                    }
                    None => inv.push(line.keyword.clone(), ParamValue::List(vec![joined])),
                }
            }
        } else {
            for line in body.iter().skip(1) {
                let value = match line.values.as_slice() {
                    [single] => ParamValue::scalar(single.clone()),
                    many => ParamValue::List(many.to_vec()),
                };
                inv.push(line.keyword.clone(), value);
            }
        }
        if maxl > 2 && !MULTI_VALUE_EXPECTED.contains(&block.command.as_str()) {
            let mut multi: Vec<String> = Vec::new();
            for line in body.iter().skip(1).filter(|line| line.width() > 2) {
                let keyword = line.keyword.to_uppercase();
                if !multi.contains(&keyword) {
                    multi.push(keyword);
                }
            }
            let notice = Notice::new(
                NoticeKind::NotUnrolled,
                origin.clone(),
                format!(
                    "block is not unrolled because it allows duplicate keywords; \
                     all values of {} are passed to a single run",
                    multi.join(", ")
                ),
            );
            warn!(line = block.start_line, command = %origin.command, "{}", notice.message);
            notices.push(notice);
        }
        invocations.push(inv);
    }

    Ok(Unrolled {
        invocations,
        notices,
    })
}

/// WRITE_PEST_FILES observation entries come in runs of
/// `observation_<k>_name`, `model_<k>_name`, `<k>_weights_equation` and an
/// optional `<k>_weights_min_max`. A missing min/max is synthesized as
/// `0 f64::MAX`.
fn insert_weight_bounds(block: &RawBlock) -> TsResult<(Vec<TokenLine>, Vec<Notice>)> {
    let body = block.body();
    let mut lines = Vec::with_capacity(body.len());
    let mut notices = Vec::new();
    let keyword_at = |i: usize| body.get(i).map(|l| l.keyword.as_str());

    for (i, line) in body.iter().enumerate() {
        lines.push(line.clone());
        let Some(family) = WEIGHT_FAMILIES
            .iter()
            .find(|k| line.keyword == format!("observation_{k}_name"))
        else {
            continue;
        };
        let model = format!("model_{family}_name");
        let equation = format!("{family}_weights_equation");
        let min_max = format!("{family}_weights_min_max");
        if keyword_at(i + 1) != Some(model.as_str()) {
            return Err(TsError::structure(
                block.start_line,
                format!(
                    "WRITE_PEST_FILES needs {} immediately after {}",
                    model.to_uppercase(),
                    line.keyword.to_uppercase()
                ),
            ));
        }
        if keyword_at(i + 2) != Some(equation.as_str()) {
            return Err(TsError::structure(
                block.start_line,
                format!(
                    "WRITE_PEST_FILES needs {} immediately after {}",
                    equation.to_uppercase(),
                    model.to_uppercase()
                ),
            ));
        }
        if keyword_at(i + 3) != Some(min_max.as_str()) {
            // pushed after the equation line once the loop reaches it
            let notice = Notice::new(
                NoticeKind::SynthesizedMinMax,
                block.origin(),
                format!(
                    "no {} after {}; using 0 {:e}",
                    min_max.to_uppercase(),
                    equation.to_uppercase(),
                    f64::MAX
                ),
            );
            warn!(line = block.start_line, "{}", notice.message);
            notices.push(notice);
        }
    }

    // Second pass: put each synthesized min/max right after its equation
    let mut out = Vec::with_capacity(lines.len() + notices.len());
    for (i, line) in lines.iter().enumerate() {
        out.push(line.clone());
        if let Some(family) = WEIGHT_FAMILIES
            .iter()
            .find(|k| line.keyword == format!("{k}_weights_equation"))
        {
            let min_max = format!("{family}_weights_min_max");
            let follows = lines.get(i + 1).map(|l| l.keyword.as_str()) == Some(min_max.as_str());
            if !follows {
                out.push(TokenLine::new(
                    min_max,
                    vec!["0".to_string(), format!("{:e}", f64::MAX)],
                ));
            }
        }
    }
    Ok((out, notices))
}

/// WRITE_PEST_FILES must come right after a LIST_OUTPUT block
pub fn check_ordering(blocks: &[RawBlock]) -> TsResult<()> {
    let mut last_list_output = None;
    for (index, block) in blocks.iter().enumerate() {
        match block.command.as_str() {
            "list_output" => last_list_output = Some(index),
            "write_pest_files" if index == 0 || last_list_output != Some(index - 1) => {
                return Err(TsError::Ordering {
                    line: block.start_line,
                    message: "the WRITE_PEST_FILES block must be immediately preceded by a \
                              LIST_OUTPUT block listing the simulated values in the same order"
                        .to_string(),
                });
            }
            _ => {}
        }
    }
    Ok(())
}
