//! Date and time normalization
//!
//! Control files spell dates and times loosely: `HH`, `HH:MM` or `HH:MM:SS`,
//! `24:00:00` for midnight at the end of a day, ISO or slash dates. Everything
//! is normalized to `chrono::NaiveDateTime` here, once, at the boundary.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::{TsError, TsResult};

/// Output and slash-date parsing style selected by `SETTINGS DATE_FORMAT`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateFormat {
    /// strftime pattern used when writing dates
    pub pattern: String,
    /// Slash dates (`a/b/yyyy`) are read day first
    pub day_first: bool,
}

impl Default for DateFormat {
    fn default() -> Self {
        Self {
            pattern: "%Y-%m-%d".to_string(),
            day_first: false,
        }
    }
}

impl DateFormat {
    /// Interpret a `DATE_FORMAT` value.
    ///
    /// `dd/mm/yyyy` and `mm/dd/yyyy` are the classic TSPROC spellings; anything
    /// else is taken as a strftime pattern.
    pub fn from_setting(value: &str) -> TsResult<Self> {
        let trimmed = value.trim();
        match trimmed.to_lowercase().as_str() {
            "dd/mm/yyyy" => Ok(Self {
                pattern: "%d/%m/%Y".to_string(),
                day_first: true,
            }),
            "mm/dd/yyyy" => Ok(Self {
                pattern: "%m/%d/%Y".to_string(),
                day_first: false,
            }),
            "" => Err(TsError::invalid("date_format", value, "empty date format")),
            _ if trimmed.contains('%') => Ok(Self {
                pattern: trimmed.to_string(),
                day_first: matches!(
                    (trimmed.find("%d"), trimmed.find("%m")),
                    (Some(d), Some(m)) if d < m
                ),
            }),
            _ => Err(TsError::invalid(
                "date_format",
                value,
                "expected dd/mm/yyyy, mm/dd/yyyy or a strftime pattern",
            )),
        }
    }

    pub fn format_date(&self, ts: &NaiveDateTime) -> String {
        ts.format(&self.pattern).to_string()
    }
}

/// Split a time of day into hours, minutes and seconds. Hours may be 24.
pub fn parse_time_parts(time: &str) -> TsResult<(u32, u32, u32)> {
    let parts: Vec<&str> = time.trim().split(':').collect();
    let num = |s: &str| -> TsResult<u32> {
        s.trim()
            .parse::<u32>()
            .map_err(|_| TsError::invalid("time", time, "expected HH, HH:MM or HH:MM:SS"))
    };
    let (h, m, s) = match parts.as_slice() {
        [h] => (num(h)?, 0, 0),
        [h, m] => (num(h)?, num(m)?, 0),
        [h, m, s] => (num(h)?, num(m)?, num(s)?),
        _ => {
            return Err(TsError::invalid(
                "time",
                time,
                "expected HH, HH:MM or HH:MM:SS",
            ))
        }
    };
    if h > 24 || m > 59 || s > 59 || (h == 24 && (m > 0 || s > 0)) {
        return Err(TsError::invalid("time", time, "time of day out of range"));
    }
    Ok((h, m, s))
}

/// Parse a calendar date in any of the accepted spellings
pub fn parse_date(date: &str, format: &DateFormat) -> TsResult<NaiveDate> {
    let date = date.trim();
    if let Ok(d) = NaiveDate::parse_from_str(date, &format.pattern) {
        return Ok(d);
    }
    let slash = if format.day_first {
        "%d/%m/%Y"
    } else {
        "%m/%d/%Y"
    };
    for pattern in ["%Y-%m-%d", "%Y/%m/%d", slash, "%Y%m%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(date, pattern) {
            return Ok(d);
        }
    }
    Err(TsError::invalid("date", date, "unrecognized date"))
}

/// Combine a date and an optional time into a timestamp; `24:00:00` rolls to
/// midnight of the following day.
pub fn combine(date: &str, time: Option<&str>, format: &DateFormat) -> TsResult<NaiveDateTime> {
    let day = parse_date(date, format)?;
    let (h, m, s) = match time {
        Some(t) if !t.trim().is_empty() => parse_time_parts(t)?,
        _ => (0, 0, 0),
    };
    let (h, extra) = if h == 24 { (0, 1) } else { (h, 0) };
    let tod = NaiveTime::from_hms_opt(h, m, s)
        .ok_or_else(|| TsError::invalid("time", format!("{h}:{m}:{s}"), "invalid time"))?;
    Ok(day.and_time(tod) + Duration::days(extra))
}

/// Parse a timestamp as found in data files: a date optionally followed by a
/// time, separated by a space or `T`.
pub fn parse_timestamp(text: &str, format: &DateFormat) -> TsResult<NaiveDateTime> {
    let text = text.trim();
    let (date, time) = match text.split_once(['T', ' ']) {
        Some((d, t)) => (d, Some(t.trim())),
        None => (text, None),
    };
    combine(date, time, format)
}

/// Parse a time step such as `1D`, `15min`, `1 hour`, `3600s` or `01:00:00`
pub fn parse_duration(text: &str) -> TsResult<Duration> {
    let trimmed = text.trim();
    if trimmed.contains(':') {
        let (h, m, s) = parse_time_parts(trimmed)?;
        return Ok(Duration::seconds(i64::from(h * 3600 + m * 60 + s)));
    }
    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);
    let amount: f64 = if number.is_empty() {
        1.0
    } else {
        number
            .parse()
            .map_err(|_| TsError::invalid("time_increment", text, "expected a number and a unit"))?
    };
    let seconds = match unit.trim() {
        "s" | "S" | "sec" | "secs" | "second" | "seconds" => 1.0,
        "T" | "min" | "mins" | "minute" | "minutes" => 60.0,
        "h" | "H" | "hr" | "hrs" | "hour" | "hours" => 3_600.0,
        "" | "d" | "D" | "day" | "days" => 86_400.0,
        "w" | "W" | "week" | "weeks" => 604_800.0,
        other => {
            return Err(TsError::invalid(
                "time_increment",
                text,
                format!("unknown time unit '{other}'"),
            ))
        }
    };
    let total = (amount * seconds).round() as i64;
    if total <= 0 {
        return Err(TsError::invalid("time_increment", text, "must be positive"));
    }
    Ok(Duration::seconds(total))
}

/// Optional inclusive `[start, end]` window built from DATE_1/TIME_1/DATE_2/TIME_2
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

impl DateWindow {
    pub fn from_parts(
        date_1: Option<&str>,
        time_1: Option<&str>,
        date_2: Option<&str>,
        time_2: Option<&str>,
        format: &DateFormat,
    ) -> TsResult<Self> {
        let start = date_1.map(|d| combine(d, time_1, format)).transpose()?;
        let end = date_2.map(|d| combine(d, time_2, format)).transpose()?;
        if let (Some(s), Some(e)) = (start, end) {
            if s > e {
                return Err(TsError::Validation(format!(
                    "DATE_1/TIME_1 ({s}) is after DATE_2/TIME_2 ({e})"
                )));
            }
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, ts: &NaiveDateTime) -> bool {
        self.start.map_or(true, |s| *ts >= s) && self.end.map_or(true, |e| *ts <= e)
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(y: i32, mo: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_midnight_24_rolls_forward() {
        let fmt = DateFormat::default();
        assert_eq!(
            combine("2020-01-31", Some("24:00:00"), &fmt).unwrap(),
            ts(2020, 2, 1, 0)
        );
    }

    #[test]
    fn test_short_time_forms() {
        assert_eq!(parse_time_parts("7").unwrap(), (7, 0, 0));
        assert_eq!(parse_time_parts("07:30").unwrap(), (7, 30, 0));
        assert!(parse_time_parts("25:00").is_err());
    }

    #[test]
    fn test_slash_dates_follow_setting() {
        let us = DateFormat::default();
        let eu = DateFormat::from_setting("dd/mm/yyyy").unwrap();
        assert_eq!(
            parse_date("02/01/2020", &us).unwrap(),
            NaiveDate::from_ymd_opt(2020, 2, 1).unwrap()
        );
        assert_eq!(
            parse_date("02/01/2020", &eu).unwrap(),
            NaiveDate::from_ymd_opt(2020, 1, 2).unwrap()
        );
    }

    #[test]
    fn test_strftime_setting() {
        let fmt = DateFormat::from_setting("%Y.%m.%d").unwrap();
        assert_eq!(fmt.format_date(&ts(2021, 3, 4, 0)), "2021.03.04");
        assert!(DateFormat::from_setting("garbage").is_err());
    }

    #[test]
    fn test_window_contains_is_inclusive() {
        let fmt = DateFormat::default();
        let w = DateWindow::from_parts(
            Some("2020-01-01"),
            None,
            Some("2020-01-03"),
            Some("12"),
            &fmt,
        )
        .unwrap();
        assert!(w.contains(&ts(2020, 1, 1, 0)));
        assert!(w.contains(&ts(2020, 1, 3, 12)));
        assert!(!w.contains(&ts(2020, 1, 3, 13)));
    }

    #[test]
    fn test_durations() {
        assert_eq!(parse_duration("1D").unwrap(), Duration::days(1));
        assert_eq!(parse_duration("15min").unwrap(), Duration::minutes(15));
        assert_eq!(parse_duration("2 hours").unwrap(), Duration::hours(2));
        assert_eq!(parse_duration("01:30:00").unwrap(), Duration::minutes(90));
        assert!(parse_duration("3 fortnights").is_err());
        assert!(parse_duration("0s").is_err());
    }

    #[test]
    fn test_parse_timestamp_with_t_separator() {
        let fmt = DateFormat::default();
        assert_eq!(
            parse_timestamp("2020-05-06T03:00:00", &fmt).unwrap(),
            ts(2020, 5, 6, 3)
        );
        assert_eq!(parse_timestamp("2020-05-06", &fmt).unwrap(), ts(2020, 5, 6, 0));
    }
}
