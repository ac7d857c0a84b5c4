//! Comma separated files
//!
//! First row holds column names, first column holds timestamps. Empty cells
//! are missing values.

use std::path::Path;

use crate::datetime::{parse_timestamp, DateFormat};
use crate::error::{TsError, TsResult};

use super::{columns_from_rows, number, read_text, SeriesTable};

pub fn read(path: &Path, dates: &DateFormat) -> TsResult<SeriesTable> {
    parse(&read_text(path)?, path, dates)
}

pub fn parse(text: &str, path: &Path, dates: &DateFormat) -> TsResult<SeriesTable> {
    let mut reader = ::csv::ReaderBuilder::new()
        .trim(::csv::Trim::All)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| TsError::reader(path, e.to_string()))?
        .clone();
    let labels: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();
    if labels.is_empty() {
        return Err(TsError::reader(path, "no data columns after the date column"));
    }

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let line = idx + 2;
        let record = record.map_err(|e| TsError::reader(path, format!("line {line}: {e}")))?;
        let Some(stamp) = record.get(0).filter(|s| !s.is_empty()) else {
            continue;
        };
        let ts = parse_timestamp(stamp, dates)
            .map_err(|e| TsError::reader(path, format!("line {line}: {e}")))?;
        let values = record
            .iter()
            .skip(1)
            .map(|cell| {
                if cell.is_empty() || cell.eq_ignore_ascii_case("nan") {
                    Ok(None)
                } else {
                    number(path, line, cell).map(Some)
                }
            })
            .collect::<TsResult<Vec<_>>>()?;
        rows.push((ts, values));
    }
    columns_from_rows(&labels, rows, path)
}

/// Resolve USECOL: a 1-based data column number (the date column is not
/// counted) or a column name. Without USECOL the first data column is used.
pub fn column_label(table: &SeriesTable, usecol: Option<&str>, path: &Path) -> TsResult<String> {
    let Some(usecol) = usecol else {
        return table
            .keys()
            .next()
            .cloned()
            .ok_or_else(|| TsError::reader(path, "no data columns"));
    };
    match usecol.parse::<usize>() {
        Ok(n) => table
            .get_index(n.wrapping_sub(1))
            .map(|(label, _)| label.clone())
            .ok_or_else(|| {
                TsError::reader(
                    path,
                    format!("USECOL {n} is out of range, the file has {} data columns", table.len()),
                )
            }),
        Err(_) => Ok(usecol.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: &str = "Datetime,Flow,Stage\n2020-01-01,1.5,3\n2020-01-02,,4\n2020-01-03 12:00,2.5,5\n";

    #[test]
    fn test_columns_and_missing_cells() {
        let table = parse(TEXT, Path::new("t.csv"), &DateFormat::default()).unwrap();
        assert_eq!(table.keys().collect::<Vec<_>>(), vec!["Flow", "Stage"]);
        assert_eq!(table["Flow"].values(), &[Some(1.5), None, Some(2.5)]);
        assert_eq!(table["Stage"].len(), 3);
    }

    #[test]
    fn test_usecol_by_number_or_name() {
        let path = Path::new("t.csv");
        let table = parse(TEXT, path, &DateFormat::default()).unwrap();
        assert_eq!(column_label(&table, None, path).unwrap(), "Flow");
        assert_eq!(column_label(&table, Some("2"), path).unwrap(), "Stage");
        assert_eq!(column_label(&table, Some("Stage"), path).unwrap(), "Stage");
        assert!(column_label(&table, Some("3"), path).is_err());
        assert!(column_label(&table, Some("0"), path).is_err());
    }

    #[test]
    fn test_bad_number_reports_line() {
        let err = parse("d,q\n2020-01-01,abc\n", Path::new("t.csv"), &DateFormat::default())
            .unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}
