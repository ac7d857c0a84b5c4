//! GSFLOW gage files
//!
//! Line 1 is a title. Line 2 names the columns after a leading tag
//! (`"DATA:" Time Stage Flow ...`); quotes are dropped and names uppercased.
//! The first named column is model time in units of
//! `1 day / time_units_per_day`, counted from 1 at the model reference time.

use std::path::Path;

use chrono::{Duration, NaiveDateTime};

use crate::error::{TsError, TsResult};

use super::{columns_from_rows, number, read_text, SeriesTable};

pub fn read(path: &Path, reference: NaiveDateTime, units_per_day: u32) -> TsResult<SeriesTable> {
    parse(&read_text(path)?, path, reference, units_per_day)
}

pub fn parse(
    text: &str,
    path: &Path,
    reference: NaiveDateTime,
    units_per_day: u32,
) -> TsResult<SeriesTable> {
    if units_per_day == 0 {
        return Err(TsError::invalid("time_units_per_day", "0", "must be greater than zero"));
    }
    let mut lines = text.lines();
    let _title = lines.next();
    let header = lines
        .next()
        .ok_or_else(|| TsError::reader(path, "missing column header line"))?;
    let names: Vec<String> = header
        .replace('"', "")
        .split_whitespace()
        .skip(1)
        .map(str::to_uppercase)
        .collect();
    if names.len() < 2 {
        return Err(TsError::reader(path, "header names no data columns"));
    }
    let labels = names[1..].to_vec();
    let step_ms = 86_400_000 / i64::from(units_per_day);

    let mut rows = Vec::new();
    for (idx, line) in lines.enumerate() {
        let line_no = idx + 3;
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }
        let time = number(path, line_no, fields[0])?;
        let ts = reference + Duration::milliseconds(((time - 1.0) * step_ms as f64).round() as i64);
        let values = fields[1..]
            .iter()
            .map(|v| number(path, line_no, v).map(Some))
            .collect::<TsResult<Vec<_>>>()?;
        rows.push((ts, values));
    }
    columns_from_rows(&labels, rows, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn reference() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2000, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_time_offsets_and_headers() {
        let text = "\
Gage 1 in segment 3
\"DATA:\" \"Time\" \"Stage\" \"Flow\"
1 1.0 10.0
2 1.5 11.0
";
        let table = parse(text, Path::new("g.out"), reference(), 1).unwrap();
        assert_eq!(table.keys().collect::<Vec<_>>(), vec!["STAGE", "FLOW"]);
        let flow = &table["FLOW"];
        assert_eq!(flow.index()[0], reference());
        assert_eq!(flow.index()[1], reference() + Duration::days(1));
        assert_eq!(flow.valid_values(), vec![10.0, 11.0]);
    }

    #[test]
    fn test_sub_daily_units() {
        let text = "t\n\"DATA:\" Time Flow\n1 1\n2 2\n";
        let table = parse(text, Path::new("g.out"), reference(), 24).unwrap();
        assert_eq!(table["FLOW"].index()[1], reference() + Duration::hours(1));
    }
}
