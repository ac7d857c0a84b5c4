//! PRMS STATVAR files
//!
//! ```text
//! 2                      number of variables
//! basin_cfs 1            variable name and location id, one per variable
//! runoff 3
//! 1 1990 10 1 0 0 0  12.5 3.0    step, Y M D h m s, one value per variable
//! ```
//!
//! Columns are labeled `<name>_<id>`.

use std::path::Path;

use chrono::NaiveDate;

use crate::error::{TsError, TsResult};

use super::{columns_from_rows, number, read_text, SeriesTable};

pub fn read(path: &Path) -> TsResult<SeriesTable> {
    parse(&read_text(path)?, path)
}

pub fn parse(text: &str, path: &Path) -> TsResult<SeriesTable> {
    let mut lines = text.lines().enumerate().filter(|(_, l)| !l.trim().is_empty());

    let count = match lines.next() {
        Some((_, first)) => first
            .trim()
            .parse::<usize>()
            .map_err(|_| TsError::reader(path, "first line must be the number of variables"))?,
        None => return Err(TsError::reader(path, "empty file")),
    };

    let mut labels = Vec::with_capacity(count);
    for _ in 0..count {
        let Some((idx, line)) = lines.next() else {
            return Err(TsError::reader(
                path,
                format!("expected {count} variable lines"),
            ));
        };
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.is_empty() {
            return Err(TsError::reader(path, format!("line {}: empty variable line", idx + 1)));
        }
        labels.push(parts.join("_"));
    }

    let mut rows = Vec::new();
    for (idx, line) in lines {
        let line_no = idx + 1;
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 7 + count {
            return Err(TsError::reader(
                path,
                format!(
                    "line {line_no}: expected step, 6 date fields and {count} values"
                ),
            ));
        }
        let int = |i: usize| -> TsResult<u32> {
            fields[i].parse::<u32>().map_err(|_| {
                TsError::reader(path, format!("line {line_no}: bad date field '{}'", fields[i]))
            })
        };
        let (year, month, day) = (int(1)?, int(2)?, int(3)?);
        let (hour, minute, second) = (int(4)?, int(5)?, int(6)?);
        let ts = NaiveDate::from_ymd_opt(year as i32, month, day)
            .and_then(|d| d.and_hms_opt(hour, minute, second))
            .ok_or_else(|| TsError::reader(path, format!("line {line_no}: invalid date")))?;
        let values = fields[7..7 + count]
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

    #[test]
    fn test_labels_and_values() {
        let text = "\
2
basin_cfs 1
runoff 3
1 1990 10 1 0 0 0 12.5 3.0
2 1990 10 2 0 0 0 13.5 4.0
";
        let table = parse(text, Path::new("s.statvar")).unwrap();
        assert_eq!(table.keys().collect::<Vec<_>>(), vec!["basin_cfs_1", "runoff_3"]);
        assert_eq!(table["runoff_3"].valid_values(), vec![3.0, 4.0]);
    }

    #[test]
    fn test_short_data_row() {
        let text = "1\nq 1\n1 1990 10 1 0 0 0\n";
        assert!(parse(text, Path::new("s.statvar")).is_err());
    }
}
