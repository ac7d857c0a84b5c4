//! Storm event extraction
//!
//! A peak is a value at or above `min_peak` that is the largest value within
//! `window` positions on either side (ties go to the earliest point). Each
//! event keeps the peak plus `rise_lag` points before and `fall_lag` points
//! after it; everything else becomes missing.

use crate::error::{TsError, TsResult};
use crate::store::TimeSeries;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventSettings {
    pub rise_lag: usize,
    pub fall_lag: usize,
    pub window: usize,
    pub min_peak: f64,
}

/// Positions of peaks in `values`
pub fn peaks(values: &[Option<f64>], window: usize, min_peak: f64) -> Vec<usize> {
    let len = values.len();
    (0..len)
        .filter(|&i| {
            let Some(v) = values[i] else {
                return false;
            };
            if v < min_peak {
                return false;
            }
            let lo = i.saturating_sub(window);
            let hi = (i + window + 1).min(len);
            (lo..hi).all(|j| match values[j] {
                None => true,
                Some(other) if j < i => v > other,
                Some(other) => v >= other,
            })
        })
        .collect()
}

pub fn storm_events(series: &TimeSeries, settings: &EventSettings) -> TsResult<TimeSeries> {
    if settings.window == 0 {
        return Err(TsError::invalid("window", "0", "must be at least 1"));
    }
    let values = series.values();
    let mut keep = vec![false; values.len()];
    for peak in peaks(values, settings.window, settings.min_peak) {
        let lo = peak.saturating_sub(settings.rise_lag);
        let hi = (peak + settings.fall_lag + 1).min(values.len());
        keep[lo..hi].iter_mut().for_each(|k| *k = true);
    }
    let masked = values
        .iter()
        .zip(keep)
        .map(|(v, k)| if k { *v } else { None })
        .collect();
    series.with_values(masked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn daily(values: &[f64]) -> TimeSeries {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1)
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
    fn test_peaks_respect_window_and_threshold() {
        let v: Vec<Option<f64>> = [1.0, 5.0, 2.0, 1.0, 3.0, 1.0, 8.0, 8.0, 1.0]
            .iter()
            .map(|x| Some(*x))
            .collect();
        assert_eq!(peaks(&v, 1, 0.0), vec![1, 4, 6]);
        assert_eq!(peaks(&v, 2, 0.0), vec![1, 6]);
        assert_eq!(peaks(&v, 1, 4.0), vec![1, 6]);
    }

    #[test]
    fn test_events_keep_lags_only() {
        let series = daily(&[1.0, 2.0, 9.0, 3.0, 2.0, 1.0, 1.0]);
        let events = storm_events(
            &series,
            &EventSettings {
                rise_lag: 1,
                fall_lag: 2,
                window: 2,
                min_peak: 5.0,
            },
        )
        .unwrap();
        assert_eq!(
            events.values(),
            &[None, Some(2.0), Some(9.0), Some(3.0), Some(2.0), None, None]
        );
    }

    #[test]
    fn test_zero_lags_keep_only_peaks() {
        let series = daily(&[1.0, 4.0, 1.0, 6.0, 1.0]);
        let settings = EventSettings {
            rise_lag: 0,
            fall_lag: 0,
            window: 1,
            min_peak: 0.0,
        };
        let events = storm_events(&series, &settings).unwrap();
        assert_eq!(events.valid_values(), vec![4.0, 6.0]);
    }
}
