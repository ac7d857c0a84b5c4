//! Site sample files
//!
//! Whitespace separated `site date time value` lines, one observation per
//! line, any number of sites interleaved. Each site becomes one column.

use std::path::Path;

use indexmap::IndexMap;

use crate::datetime::{combine, DateFormat};
use crate::error::{TsError, TsResult};
use crate::store::TimeSeries;

use super::{number, read_text, SeriesTable};

pub fn read(path: &Path, dates: &DateFormat) -> TsResult<SeriesTable> {
    parse(&read_text(path)?, path, dates)
}

pub fn parse(text: &str, path: &Path, dates: &DateFormat) -> TsResult<SeriesTable> {
    let mut sites: IndexMap<String, Vec<_>> = IndexMap::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = idx + 1;
        let fields: Vec<&str> = raw.split_whitespace().collect();
        match fields.as_slice() {
            [] => continue,
            [site, date, time, value, ..] => {
                let ts = combine(date, Some(time), dates)
                    .map_err(|e| TsError::reader(path, format!("line {line}: {e}")))?;
                let value = number(path, line, value)?;
                sites.entry(site.to_string()).or_default().push((ts, Some(value)));
            }
            _ => {
                return Err(TsError::reader(
                    path,
                    format!("line {line}: expected 'site date time value'"),
                ))
            }
        }
    }

    let mut table = SeriesTable::new();
    for (site, points) in sites {
        let series = TimeSeries::from_points(points).map_err(|e| {
            TsError::reader(path, format!("site {site}: duplicate or unordered timestamps ({e})"))
        })?;
        table.insert(site, series);
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sites_are_pivoted() {
        let text = "\
S1 01/01/2000 00:00:00 1.0
S2 01/01/2000 00:00:00 10.0
S1 01/02/2000 00:00:00 2.0

S2 01/02/2000 12:00:00 20.0
";
        let table = parse(text, Path::new("o.ssf"), &DateFormat::default()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table["S1"].valid_values(), vec![1.0, 2.0]);
        assert_eq!(table["S2"].valid_values(), vec![10.0, 20.0]);
    }

    #[test]
    fn test_duplicate_timestamps_rejected() {
        let text = "S1 01/01/2000 00:00:00 1.0\nS1 01/01/2000 00:00:00 2.0\n";
        let err = parse(text, Path::new("o.ssf"), &DateFormat::default()).unwrap_err();
        assert!(matches!(err, TsError::Reader { .. }));
    }

    #[test]
    fn test_short_line() {
        assert!(parse("S1 01/01/2000 1.0\n", Path::new("o.ssf"), &DateFormat::default()).is_err());
    }
}
