//! UFORE hydrology output
//!
//! First line is the number of values, followed by one value per line.
//! Timestamps start at the model reference time and step by a fixed
//! increment.

use std::path::Path;

use chrono::{Duration, NaiveDateTime};

use crate::error::{TsError, TsResult};
use crate::store::TimeSeries;

use super::{number, read_text};

pub fn read(path: &Path, start: NaiveDateTime, step: Duration) -> TsResult<TimeSeries> {
    parse(&read_text(path)?, path, start, step)
}

pub fn parse(text: &str, path: &Path, start: NaiveDateTime, step: Duration) -> TsResult<TimeSeries> {
    let mut lines = text
        .lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty());
    let count = match lines.next() {
        Some((_, first)) => first
            .trim()
            .parse::<usize>()
            .map_err(|_| TsError::reader(path, "first line must be the number of values"))?,
        None => return Err(TsError::reader(path, "empty file")),
    };

    let mut points = Vec::with_capacity(count);
    let mut ts = start;
    for _ in 0..count {
        let Some((idx, line)) = lines.next() else {
            return Err(TsError::reader(
                path,
                format!("expected {count} values, found {}", points.len()),
            ));
        };
        points.push((ts, number(path, idx + 1, line)?));
        ts += step;
    }
    TimeSeries::from_values(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_values_step_from_reference() {
        let start = NaiveDate::from_ymd_opt(2005, 6, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let series = parse("3\n0.1\n0.2\n0.3\n", Path::new("u.txt"), start, Duration::hours(1))
            .unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.index()[2], start + Duration::hours(2));
        assert_eq!(series.frequency().code(), "H");
    }

    #[test]
    fn test_truncated_file() {
        let start = NaiveDate::from_ymd_opt(2005, 6, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert!(parse("3\n0.1\n", Path::new("u.txt"), start, Duration::hours(1)).is_err());
    }
}
