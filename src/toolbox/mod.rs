//! Numeric collaborators
//!
//! Built-in versions of the hydrology and statistics routines the commands
//! delegate to. Each submodule works on value slices or
//! [`TimeSeries`](crate::store::TimeSeries) and never touches the entity store.

pub mod duration;
pub mod events;
pub mod filters;
pub mod gof;
pub mod hysep;
pub mod indices;

use serde::Serialize;

use crate::error::{TsError, TsResult};

// ============================================================================
// SUMMARY STATISTICS
// ============================================================================

/// Statistic names shared by SERIES_STATISTICS and PERIOD_STATISTICS
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Statistic {
    Sum,
    Mean,
    Median,
    StdDev,
    Maximum,
    Minimum,
    Range,
}

impl Statistic {
    pub const ALL: [Statistic; 7] = [
        Statistic::Sum,
        Statistic::Mean,
        Statistic::Median,
        Statistic::StdDev,
        Statistic::Maximum,
        Statistic::Minimum,
        Statistic::Range,
    ];

    pub fn keyword(&self) -> &'static str {
        match self {
            Statistic::Sum => "sum",
            Statistic::Mean => "mean",
            Statistic::Median => "median",
            Statistic::StdDev => "std_dev",
            Statistic::Maximum => "maximum",
            Statistic::Minimum => "minimum",
            Statistic::Range => "range",
        }
    }

    pub fn parse(text: &str) -> TsResult<Statistic> {
        let lower = text.trim().to_lowercase();
        Statistic::ALL
            .into_iter()
            .find(|s| s.keyword() == lower)
            .ok_or_else(|| {
                TsError::invalid(
                    "statistic",
                    text,
                    "expected mean, std_dev, median, sum, maximum, minimum or range",
                )
            })
    }

    /// `None` for an empty slice (and for `StdDev` with fewer than 2 values)
    pub fn apply(&self, values: &[f64]) -> Option<f64> {
        match self {
            Statistic::Sum => (!values.is_empty()).then(|| values.iter().sum()),
            Statistic::Mean => mean(values),
            Statistic::Median => median(values),
            Statistic::StdDev => std_dev(values),
            Statistic::Maximum => max(values),
            Statistic::Minimum => min(values),
            Statistic::Range => Some(max(values)? - min(values)?),
        }
    }
}

pub fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

pub fn median(values: &[f64]) -> Option<f64> {
    quantile(values, 0.5)
}

/// Sample standard deviation (n - 1 denominator)
pub fn std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some((ss / (values.len() - 1) as f64).sqrt())
}

pub fn max(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::max)
}

pub fn min(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::min)
}

/// Linear-interpolated quantile, `q` in `[0, 1]`
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64))
}

/// Means of consecutive blocks of `size` positions, skipping missing values;
/// the last block may be short and all-missing blocks are dropped
pub fn block_means(values: &[Option<f64>], size: usize) -> Vec<f64> {
    if size == 0 {
        return Vec::new();
    }
    values
        .chunks(size)
        .filter_map(|chunk| mean(&chunk.iter().flatten().copied().collect::<Vec<_>>()))
        .collect()
}

// ============================================================================
// TIME UNITS
// ============================================================================

/// Time units accepted by EXCEEDANCE_TIME and VOLUME_CALCULATION
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Year,
    Month,
    Day,
    Hour,
    Min,
    Sec,
}

impl TimeUnit {
    /// 365 days 6 hours 9 minutes 9 seconds
    const YEAR_SECONDS: f64 = 31_558_149.0;

    pub fn parse(text: &str) -> TsResult<TimeUnit> {
        let lower = text.trim().to_lowercase();
        match lower.strip_suffix('s').unwrap_or(&lower) {
            "year" => Ok(TimeUnit::Year),
            "month" => Ok(TimeUnit::Month),
            "day" => Ok(TimeUnit::Day),
            "hour" => Ok(TimeUnit::Hour),
            "min" | "minute" => Ok(TimeUnit::Min),
            "sec" | "second" => Ok(TimeUnit::Sec),
            _ => Err(TsError::invalid(
                "time_units",
                text,
                "expected year, month, day, hour, min or sec",
            )),
        }
    }

    pub fn seconds(&self) -> f64 {
        match self {
            TimeUnit::Year => Self::YEAR_SECONDS,
            TimeUnit::Month => Self::YEAR_SECONDS / 12.0,
            TimeUnit::Day => 86_400.0,
            TimeUnit::Hour => 3_600.0,
            TimeUnit::Min => 60.0,
            TimeUnit::Sec => 1.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeUnit::Year => "years",
            TimeUnit::Month => "months",
            TimeUnit::Day => "days",
            TimeUnit::Hour => "hours",
            TimeUnit::Min => "mins",
            TimeUnit::Sec => "secs",
        }
    }
}
