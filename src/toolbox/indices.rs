//! Hydrologic indices of daily streamflow (Olden and Poff, 2003)
//!
//! A built-in subset of the magnitude, duration and rate-of-change indices.
//! Years are water years (October through September). Indices marked
//! "mean or median" switch aggregate when `use_median` is set.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDateTime};

use crate::error::{TsError, TsResult};
use crate::store::TimeSeries;

use super::{max, mean, median, min, std_dev};

/// Index groups accepted as HYDROLOGIC_INDICES keywords
pub const GROUPS: [&str; 11] = ["ma", "ml", "mh", "fl", "fh", "dl", "dh", "ta", "tl", "th", "ra"];

const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

const DURATIONS: [usize; 5] = [1, 3, 7, 30, 90];

/// Stream classes; each selects every supported index
pub const STREAM_CLASSES: [&str; 9] = [
    "all_streams",
    "harsh_intermittent",
    "flashy_intermittent",
    "snowmelt_perennial",
    "snow_rain_perennial",
    "groundwater_perennial",
    "flashy_perennial",
    "all_intermittent",
    "all_perennial",
];

/// Flow component name to the index group it selects
pub const FLOW_COMPONENTS: [(&str, &str); 6] = [
    ("average_magnitude", "ma"),
    ("low_flow_magnitude", "ml"),
    ("high_flow_magnitude", "mh"),
    ("low_flow_duration", "dl"),
    ("high_flow_duration", "dh"),
    ("rate_of_change", "ra"),
];

/// Names of every supported index, in report order
pub fn supported() -> Vec<String> {
    let mut names: Vec<String> = [1, 2, 3, 5].iter().map(|n| format!("MA{n}")).collect();
    names.extend((12..=23).map(|n| format!("MA{n}")));
    names.extend((1..=12).map(|n| format!("ML{n}")));
    names.extend((1..=12).map(|n| format!("MH{n}")));
    names.extend((1..=5).map(|n| format!("DL{n}")));
    names.extend((1..=5).map(|n| format!("DH{n}")));
    names.extend(["RA1".to_string(), "RA3".to_string()]);
    names
}

/// One-line definition, for `CURRENT_DEFINITIONS yes`
pub fn definition(name: &str) -> Option<String> {
    let (group, number) = split_name(name)?;
    let month = |n: usize| MONTHS.get(n.checked_sub(1)?).copied();
    let text = match (group.as_str(), number) {
        ("MA", 1) => "Mean of the daily mean flow values for the entire record".to_string(),
        ("MA", 2) => "Median of the daily mean flow values for the entire record".to_string(),
        ("MA", 3) => "Mean (or median) of the coefficients of variation of daily flows per year".to_string(),
        ("MA", 5) => "Skewness of daily flows: mean divided by median".to_string(),
        ("MA", n @ 12..=23) => format!("Mean (or median) of {} monthly mean flows", month(n - 11)?),
        ("ML", n @ 1..=12) => format!("Mean (or median) of minimum {} flows", month(n)?),
        ("MH", n @ 1..=12) => format!("Mean (or median) of maximum {} flows", month(n)?),
        ("DL", n @ 1..=5) => format!(
            "Mean (or median) of annual minima of {}-day moving average flows",
            DURATIONS[n - 1]
        ),
        ("DH", n @ 1..=5) => format!(
            "Mean (or median) of annual maxima of {}-day moving average flows",
            DURATIONS[n - 1]
        ),
        ("RA", 1) => "Mean (or median) of positive day-to-day changes in flow".to_string(),
        ("RA", 3) => "Mean (or median) of negative day-to-day changes in flow".to_string(),
        _ => return None,
    };
    Some(text)
}

fn split_name(name: &str) -> Option<(String, usize)> {
    let upper = name.trim().to_uppercase();
    let digits = upper.find(|c: char| c.is_ascii_digit())?;
    let number = upper[digits..].parse().ok()?;
    Some((upper[..digits].to_string(), number))
}

/// Expand `1 2 12-23` (or `all`) for one group into index names
pub fn expand_group(group: &str, tokens: &[String]) -> TsResult<Vec<String>> {
    let prefix = group.to_uppercase();
    let available: Vec<String> = supported()
        .into_iter()
        .filter(|n| split_name(n).is_some_and(|(g, _)| g == prefix))
        .collect();
    let mut names = Vec::new();
    for token in tokens {
        if token.eq_ignore_ascii_case("all") {
            names.extend(available.iter().cloned());
            continue;
        }
        let numbers: Vec<usize> = match token.split_once('-') {
            Some((a, b)) => {
                let (a, b) = (parse_number(group, a)?, parse_number(group, b)?);
                (a..=b).collect()
            }
            None => vec![parse_number(group, token)?],
        };
        names.extend(numbers.into_iter().map(|n| format!("{prefix}{n}")));
    }
    for name in &names {
        if !available.contains(name) {
            return Err(TsError::Unsupported(format!(
                "hydrologic index {name} is not available; supported {prefix} indices: {}",
                if available.is_empty() {
                    "none".to_string()
                } else {
                    available.join(" ")
                }
            )));
        }
    }
    Ok(names)
}

fn parse_number(group: &str, token: &str) -> TsResult<usize> {
    token
        .trim()
        .parse()
        .map_err(|_| TsError::invalid(group, token, "expected index numbers such as 1 2 12-23"))
}

pub fn component_group(component: &str) -> TsResult<&'static str> {
    let lower = component.trim().to_lowercase();
    FLOW_COMPONENTS
        .iter()
        .find(|(name, _)| *name == lower)
        .map(|(_, group)| *group)
        .ok_or_else(|| {
            TsError::invalid(
                "flow_component",
                component,
                format!(
                    "expected one of {}",
                    FLOW_COMPONENTS.map(|(n, _)| n).join(", ")
                ),
            )
        })
}

pub fn check_stream_class(class: &str) -> TsResult<()> {
    if STREAM_CLASSES.contains(&class.trim().to_lowercase().as_str()) {
        Ok(())
    } else {
        Err(TsError::invalid(
            "stream_classification",
            class,
            format!("expected one of {}", STREAM_CLASSES.join(", ")),
        ))
    }
}

// ============================================================================
// COMPUTATION
// ============================================================================

fn water_year(ts: &NaiveDateTime) -> i32 {
    if ts.month() >= 10 {
        ts.year() + 1
    } else {
        ts.year()
    }
}

struct IndicesCalculator {
    all: Vec<f64>,
    by_year: BTreeMap<i32, Vec<f64>>,
    /// (water year, month) -> values
    by_month: BTreeMap<(i32, u32), Vec<f64>>,
    use_median: bool,
}

impl IndicesCalculator {
    fn new(series: &TimeSeries, use_median: bool) -> Self {
        let mut by_year: BTreeMap<i32, Vec<f64>> = BTreeMap::new();
        let mut by_month: BTreeMap<(i32, u32), Vec<f64>> = BTreeMap::new();
        for (ts, v) in series.valid() {
            by_year.entry(water_year(&ts)).or_default().push(v);
            by_month.entry((water_year(&ts), ts.month())).or_default().push(v);
        }
        Self {
            all: series.valid_values(),
            by_year,
            by_month,
            use_median,
        }
    }

    fn central(&self, values: &[f64]) -> Option<f64> {
        if self.use_median {
            median(values)
        } else {
            mean(values)
        }
    }

    fn monthly(&self, month: u32, reduce: fn(&[f64]) -> Option<f64>) -> Option<f64> {
        let per_year: Vec<f64> = self
            .by_month
            .iter()
            .filter(|((_, m), _)| *m == month)
            .filter_map(|(_, v)| reduce(v))
            .collect();
        self.central(&per_year)
    }

    fn moving(&self, days: usize, reduce: fn(&[f64]) -> Option<f64>) -> Option<f64> {
        let per_year: Vec<f64> = self
            .by_year
            .values()
            .filter(|v| v.len() >= days)
            .filter_map(|v| {
                let averages: Vec<f64> = v.windows(days).filter_map(mean).collect();
                reduce(&averages)
            })
            .collect();
        self.central(&per_year)
    }

    fn changes(&self, rising: bool) -> Option<f64> {
        let picked: Vec<f64> = self
            .all
            .windows(2)
            .map(|w| w[1] - w[0])
            .filter(|d| if rising { *d > 0.0 } else { *d < 0.0 })
            .collect();
        self.central(&picked)
    }

    fn index(&self, name: &str) -> Option<f64> {
        let (group, n) = split_name(name)?;
        match (group.as_str(), n) {
            ("MA", 1) => mean(&self.all),
            ("MA", 2) => median(&self.all),
            ("MA", 3) => {
                let cvs: Vec<f64> = self
                    .by_year
                    .values()
                    .filter_map(|v| Some(std_dev(v)? / mean(v)? * 100.0))
                    .collect();
                self.central(&cvs)
            }
            ("MA", 5) => Some(mean(&self.all)? / median(&self.all)?),
            ("MA", n @ 12..=23) => self.monthly((n - 11) as u32, mean),
            ("ML", n @ 1..=12) => self.monthly(n as u32, min),
            ("MH", n @ 1..=12) => self.monthly(n as u32, max),
            ("DL", n @ 1..=5) => self.moving(DURATIONS[n - 1], min),
            ("DH", n @ 1..=5) => self.moving(DURATIONS[n - 1], max),
            ("RA", 1) => self.changes(true),
            ("RA", 3) => self.changes(false),
            _ => None,
        }
    }
}

/// Compute `names` over a daily series; indices without enough data are
/// reported as errors naming the index
pub fn compute(series: &TimeSeries, names: &[String], use_median: bool) -> TsResult<Vec<(String, f64)>> {
    if !series.frequency().is_daily() {
        return Err(TsError::Validation(format!(
            "hydrologic indices need a daily series, found frequency {}",
            series.frequency().code()
        )));
    }
    let calculator = IndicesCalculator::new(series, use_median);
    names
        .iter()
        .map(|name| {
            calculator
                .index(name)
                .filter(|v| v.is_finite())
                .map(|v| (name.clone(), v))
                .ok_or_else(|| {
                    TsError::Validation(format!("not enough data to compute {name}"))
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn daily(start: (i32, u32, u32), values: &[f64]) -> TimeSeries {
        let start = NaiveDate::from_ymd_opt(start.0, start.1, start.2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        TimeSeries::from_values(
            values
                .iter()
                .enumerate()
                .map(|(i, v)| (start + Duration::days(i as i64), *v))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_expand_groups() {
        let names = expand_group("ma", &["1".into(), "12-14".into()]).unwrap();
        assert_eq!(names, vec!["MA1", "MA12", "MA13", "MA14"]);
        assert_eq!(expand_group("dl", &["all".into()]).unwrap().len(), 5);
        let err = expand_group("fh", &["1".into()]).unwrap_err();
        assert!(err.to_string().contains("FH1"));
        assert!(expand_group("ma", &["x".into()]).is_err());
    }

    #[test]
    fn test_magnitude_and_rates() {
        let series = daily((2020, 1, 1), &[1.0, 3.0, 2.0, 6.0]);
        let names: Vec<String> = ["MA1", "MA2", "RA1", "RA3", "ML1", "MH1", "DH2"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let got = compute(&series, &names, false).unwrap();
        let value = |n: &str| got.iter().find(|(k, _)| k == n).unwrap().1;
        assert_eq!(value("MA1"), 3.0);
        assert_eq!(value("MA2"), 2.5);
        assert_eq!(value("RA1"), 3.0);
        assert_eq!(value("RA3"), -1.0);
        assert_eq!(value("ML1"), 1.0);
        assert_eq!(value("MH1"), 6.0);
        assert_eq!(value("DH2"), (3.0 + 2.0 + 6.0) / 3.0);
    }

    #[test]
    fn test_requires_daily_and_data() {
        let series = daily((2020, 1, 1), &[1.0, 2.0]);
        assert!(compute(&series, &["DL5".to_string()], false).is_err());
        assert!(compute(&series, &["ML2".to_string()], false).is_err());
    }

    #[test]
    fn test_definitions_and_components() {
        assert!(definition("MA12").unwrap().contains("January"));
        assert!(definition("DL3").unwrap().contains("7-day"));
        assert_eq!(component_group("Low_Flow_Duration").unwrap(), "dl");
        assert!(check_stream_class("flashy_perennial").is_ok());
        assert!(check_stream_class("rocky").is_err());
    }
}
