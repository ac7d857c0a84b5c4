//! HSPF PLOTGEN files
//!
//! The header carries a curve table introduced by a line starting with
//! `Label` and ending at the first blank line; each row is the curve label
//! followed by five attribute columns (LINTYP INTEQ COLCOD TRAN TRANCOD).
//! Data lines follow the `Date/time` line:
//!
//! ```text
//! RCH100    1988  10  01  24  00   0.000000E+00   1.250000E+01
//! ```
//!
//! i.e. a tag, year, month, day, hour (24 allowed), minute and one value per
//! curve. Values at or below -1.0E30 are missing.

use std::path::Path;

use crate::datetime::{combine, DateFormat};
use crate::error::{TsError, TsResult};

use super::{columns_from_rows, number, read_text, SeriesTable};

const MISSING: f64 = -1.0e30;

pub fn read(path: &Path) -> TsResult<SeriesTable> {
    parse(&read_text(path)?, path)
}

pub fn parse(text: &str, path: &Path) -> TsResult<SeriesTable> {
    let lines: Vec<&str> = text.lines().collect();

    let label_at = lines
        .iter()
        .position(|l| l.trim_start().starts_with("Label"))
        .ok_or_else(|| TsError::reader(path, "no curve label table"))?;
    let mut labels = Vec::new();
    let mut cursor = label_at + 1;
    while let Some(line) = lines.get(cursor) {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.is_empty() {
            break;
        }
        if tokens.len() < 6 {
            return Err(TsError::reader(
                path,
                format!("line {}: malformed curve label row", cursor + 1),
            ));
        }
        labels.push(tokens[..tokens.len() - 5].join(" "));
        cursor += 1;
    }
    if labels.is_empty() {
        return Err(TsError::reader(path, "curve label table is empty"));
    }

    let data_at = lines[cursor..]
        .iter()
        .position(|l| l.trim_start().starts_with("Date/time"))
        .map(|p| p + cursor + 1)
        .ok_or_else(|| TsError::reader(path, "no Date/time data section"))?;

    let dates = DateFormat::default();
    let mut rows = Vec::new();
    for (idx, line) in lines.iter().enumerate().skip(data_at) {
        let line_no = idx + 1;
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }
        if fields.len() < 6 + labels.len() {
            return Err(TsError::reader(
                path,
                format!("line {line_no}: expected a date and {} values", labels.len()),
            ));
        }
        let date = format!("{}-{}-{}", fields[1], fields[2], fields[3]);
        let time = format!("{}:{}", fields[4], fields[5]);
        let ts = combine(&date, Some(&time), &dates)
            .map_err(|e| TsError::reader(path, format!("line {line_no}: {e}")))?;
        let values = fields[6..6 + labels.len()]
            .iter()
            .map(|v| number(path, line_no, v).map(|x| (x > MISSING).then_some(x)))
            .collect::<TsResult<Vec<_>>>()?;
        rows.push((ts, values));
    }
    columns_from_rows(&labels, rows, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const TEXT: &str = "\
HSPF FILE FOR DRIVING SEPARATE PLOT PROGRAM
Time interval: 1440 mins          Last month in printout year:  9
Data for each curve (Point-valued first, then mean-valued):
Label                   LINTYP     INTEQ    COLCOD      TRAN   TRANCOD
SIM FLOW                     1         4         1   SUM           1
OBS                          1         4         1   SUM           1

Date/time                      Values

RCH100    1988  10  01  24  00   1.000000E+00  -1.000000E+30
RCH100    1988  10  02  24  00   2.000000E+00   5.000000E+00
";

    #[test]
    fn test_labels_dates_and_missing() {
        let table = parse(TEXT, Path::new("p.plt")).unwrap();
        assert_eq!(table.keys().collect::<Vec<_>>(), vec!["SIM FLOW", "OBS"]);
        let sim = &table["SIM FLOW"];
        assert_eq!(
            sim.index()[0],
            NaiveDate::from_ymd_opt(1988, 10, 2)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        );
        assert_eq!(table["OBS"].values(), &[None, Some(5.0)]);
    }

    #[test]
    fn test_missing_label_table() {
        assert!(parse("nothing here\n", Path::new("p.plt")).is_err());
    }
}
