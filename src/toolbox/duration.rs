//! Flow duration and exceedance time

use chrono::NaiveDateTime;

use crate::error::{TsError, TsResult};
use crate::store::{Direction, TimeSeries};

use super::quantile;

/// Flow equalled or exceeded `p` percent of the time, for each `p`
pub fn flow_duration(values: &[f64], exceedance_percents: &[f64]) -> TsResult<Vec<(f64, f64)>> {
    if values.is_empty() {
        return Err(TsError::Validation(
            "flow duration needs at least one value".into(),
        ));
    }
    exceedance_percents
        .iter()
        .map(|&p| {
            if !(0.0..=100.0).contains(&p) {
                return Err(TsError::invalid(
                    "exceedance_probabilities",
                    p.to_string(),
                    "must be between 0 and 100",
                ));
            }
            let flow = quantile(values, 1.0 - p / 100.0).ok_or_else(|| {
                TsError::Validation("flow duration needs at least one value".into())
            })?;
            Ok((p, flow))
        })
        .collect()
}

/// Seconds spent beyond `threshold` in each excursion, with the value
/// linearly interpolated between samples
pub fn excursions(series: &TimeSeries, threshold: f64, direction: Direction) -> Vec<f64> {
    let beyond = |v: f64| match direction {
        Direction::Over => v > threshold,
        Direction::Under => v < threshold,
    };
    let points: Vec<(NaiveDateTime, f64)> = series.valid().collect();
    let mut found = Vec::new();
    let mut current = 0.0;
    let mut open = false;
    for pair in points.windows(2) {
        let ((t0, v0), (t1, v1)) = (pair[0], pair[1]);
        let span = (t1 - t0).num_milliseconds() as f64 / 1000.0;
        let crossing = |from: f64, to: f64| (threshold - from) / (to - from) * span;
        match (beyond(v0), beyond(v1)) {
            (true, true) => {
                current += span;
                open = true;
            }
            (true, false) => {
                current += crossing(v0, v1);
                found.push(current);
                current = 0.0;
                open = false;
            }
            (false, true) => {
                current = span - crossing(v0, v1);
                open = true;
            }
            (false, false) => {}
        }
    }
    if open {
        found.push(current);
    }
    found
}

/// Total time beyond `threshold` after discounting `delay_seconds` from the
/// start of each excursion
pub fn exceedance_seconds(
    series: &TimeSeries,
    threshold: f64,
    delay_seconds: f64,
    direction: Direction,
) -> f64 {
    excursions(series, threshold, direction)
        .into_iter()
        .map(|d| (d - delay_seconds).max(0.0))
        .sum()
}
