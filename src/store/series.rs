//! Time series values and sampling frequencies

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::datetime::DateWindow;
use crate::error::{TsError, TsResult};

const MONTHS: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];

/// Sampling frequency of a series, inferred from its timestamps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Frequency {
    /// Fixed step in seconds
    Seconds(i64),
    /// Last day of every month
    MonthEnd,
    /// First day of every month
    MonthStart,
    /// Last day of `month` every year
    Annual { month: u32 },
    /// First day of `month` every year
    AnnualStart { month: u32 },
    Irregular,
}

impl Frequency {
    pub fn infer(index: &[NaiveDateTime]) -> Frequency {
        if index.len() < 2 {
            return Frequency::Irregular;
        }
        // Fixed steps with gaps still count as regular: every step must be a
        // multiple of the smallest one.
        let steps: Vec<i64> = index
            .windows(2)
            .map(|w| (w[1] - w[0]).num_seconds())
            .collect();
        let smallest = steps.iter().copied().min().unwrap_or(0);
        if smallest > 0 && steps.iter().all(|s| s % smallest == 0) {
            let month_like = smallest >= 28 * 86_400;
            if !month_like {
                return Frequency::Seconds(smallest);
            }
        }
        let candidates = [
            Frequency::MonthEnd,
            Frequency::MonthStart,
            Frequency::Annual {
                month: index[0].month(),
            },
            Frequency::AnnualStart {
                month: index[0].month(),
            },
        ];
        candidates
            .into_iter()
            .find(|freq| {
                freq.is_anchor(&index[0])
                    && index.windows(2).all(|w| freq.next(&w[0]) == Some(w[1]))
            })
            .unwrap_or(Frequency::Irregular)
    }

    /// Pandas-style frequency code, used to group series into tables
    pub fn code(&self) -> String {
        match self {
            Frequency::Seconds(s) => {
                let (n, unit) = if s % 86_400 == 0 {
                    (s / 86_400, "D")
                } else if s % 3_600 == 0 {
                    (s / 3_600, "H")
                } else if s % 60 == 0 {
                    (s / 60, "T")
                } else {
                    (*s, "S")
                };
                if n == 1 {
                    unit.to_string()
                } else {
                    format!("{n}{unit}")
                }
            }
            Frequency::MonthEnd => "M".to_string(),
            Frequency::MonthStart => "MS".to_string(),
            Frequency::Annual { month } => format!("A-{}", month_abbrev(*month)),
            Frequency::AnnualStart { month } => format!("AS-{}", month_abbrev(*month)),
            Frequency::Irregular => "IRREG".to_string(),
        }
    }

    pub fn is_daily(&self) -> bool {
        *self == Frequency::Seconds(86_400)
    }

    /// Samples per day, for filters specified in cycles per day
    pub fn samples_per_day(&self) -> Option<f64> {
        match self {
            Frequency::Seconds(s) => Some(86_400.0 / *s as f64),
            Frequency::MonthEnd | Frequency::MonthStart => Some(1.0 / 30.5),
            Frequency::Annual { .. } | Frequency::AnnualStart { .. } => Some(1.0 / 365.25),
            Frequency::Irregular => None,
        }
    }

    /// Timestamp following `ts` on this frequency's grid
    pub fn next(&self, ts: &NaiveDateTime) -> Option<NaiveDateTime> {
        let time = ts.time();
        match self {
            Frequency::Seconds(s) => Some(*ts + Duration::seconds(*s)),
            Frequency::MonthEnd => {
                let (y, m) = add_month(ts.year(), ts.month());
                Some(last_day_of_month(y, m)?.and_time(time))
            }
            Frequency::MonthStart => {
                let (y, m) = add_month(ts.year(), ts.month());
                Some(NaiveDate::from_ymd_opt(y, m, 1)?.and_time(time))
            }
            Frequency::Annual { month } => {
                Some(last_day_of_month(ts.year() + 1, *month)?.and_time(time))
            }
            Frequency::AnnualStart { month } => {
                Some(NaiveDate::from_ymd_opt(ts.year() + 1, *month, 1)?.and_time(time))
            }
            Frequency::Irregular => None,
        }
    }

    fn is_anchor(&self, ts: &NaiveDateTime) -> bool {
        let is_last = last_day_of_month(ts.year(), ts.month()).map(|d| d == ts.date());
        match self {
            Frequency::MonthEnd => is_last == Some(true),
            Frequency::MonthStart => ts.day() == 1,
            Frequency::Annual { month } => ts.month() == *month && is_last == Some(true),
            Frequency::AnnualStart { month } => ts.month() == *month && ts.day() == 1,
            _ => true,
        }
    }
}

fn month_abbrev(month: u32) -> &'static str {
    MONTHS
        .get(month.saturating_sub(1) as usize)
        .copied()
        .unwrap_or("DEC")
}

fn add_month(year: i32, month: u32) -> (i32, u32) {
    if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}

pub fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let (y, m) = add_month(year, month);
    NaiveDate::from_ymd_opt(y, m, 1)?.pred_opt()
}

/// A time-indexed sequence of nullable values, strictly increasing in time
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TimeSeries {
    index: Vec<NaiveDateTime>,
    values: Vec<Option<f64>>,
}

impl TimeSeries {
    pub fn new(index: Vec<NaiveDateTime>, values: Vec<Option<f64>>) -> TsResult<Self> {
        if index.len() != values.len() {
            return Err(TsError::Validation(format!(
                "series index has {} entries but {} values",
                index.len(),
                values.len()
            )));
        }
        if let Some(w) = index.windows(2).find(|w| w[1] <= w[0]) {
            return Err(TsError::Validation(format!(
                "series timestamps must be unique and increasing ({} then {})",
                w[0], w[1]
            )));
        }
        Ok(Self { index, values })
    }

    /// Build from unordered points; sorts them and rejects duplicate timestamps
    pub fn from_points(mut points: Vec<(NaiveDateTime, Option<f64>)>) -> TsResult<Self> {
        points.sort_by_key(|(ts, _)| *ts);
        let (index, values) = points.into_iter().unzip();
        Self::new(index, values)
    }

    pub fn from_values(points: Vec<(NaiveDateTime, f64)>) -> TsResult<Self> {
        Self::from_points(points.into_iter().map(|(t, v)| (t, Some(v))).collect())
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn index(&self) -> &[NaiveDateTime] {
        &self.index
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDateTime, Option<f64>)> + '_ {
        self.index.iter().copied().zip(self.values.iter().copied())
    }

    /// Non-null points only
    pub fn valid(&self) -> impl Iterator<Item = (NaiveDateTime, f64)> + '_ {
        self.iter().filter_map(|(t, v)| v.map(|v| (t, v)))
    }

    pub fn valid_values(&self) -> Vec<f64> {
        self.values.iter().flatten().copied().collect()
    }

    pub fn valid_count(&self) -> usize {
        self.values.iter().flatten().count()
    }

    pub fn first_valid(&self) -> Option<NaiveDateTime> {
        self.valid().next().map(|(t, _)| t)
    }

    pub fn last_valid(&self) -> Option<NaiveDateTime> {
        self.values
            .iter()
            .rposition(Option::is_some)
            .map(|i| self.index[i])
    }

    pub fn frequency(&self) -> Frequency {
        Frequency::infer(&self.index)
    }

    pub fn value_at(&self, ts: &NaiveDateTime) -> Option<f64> {
        self.index
            .binary_search(ts)
            .ok()
            .and_then(|i| self.values[i])
    }

    /// Points within the inclusive window
    pub fn window(&self, window: &DateWindow) -> TimeSeries {
        self.filter(|t| window.contains(t))
    }

    pub fn between(&self, start: NaiveDateTime, end: NaiveDateTime) -> TimeSeries {
        self.filter(|t| *t >= start && *t <= end)
    }

    fn filter(&self, keep: impl Fn(&NaiveDateTime) -> bool) -> TimeSeries {
        let (index, values) = self.iter().filter(|(t, _)| keep(t)).unzip();
        TimeSeries { index, values }
    }

    /// Drop leading and trailing nulls
    pub fn trimmed(&self) -> TimeSeries {
        match (self.first_valid(), self.last_valid()) {
            (Some(s), Some(e)) => self.between(s, e),
            _ => TimeSeries::default(),
        }
    }

    /// Series with all nulls removed
    pub fn dropna(&self) -> TimeSeries {
        let (index, values) = self
            .valid()
            .map(|(t, v)| (t, Some(v)))
            .unzip();
        TimeSeries { index, values }
    }

    /// Fill the gaps of a regular series with nulls so every grid step exists
    pub fn regularized(&self, frequency: Frequency) -> TimeSeries {
        let (Some(first), Some(last)) = (self.index.first(), self.index.last()) else {
            return self.clone();
        };
        if frequency == Frequency::Irregular {
            return self.clone();
        }
        let mut index = Vec::with_capacity(self.len());
        let mut values = Vec::with_capacity(self.len());
        let mut current = Some(*first);
        while let Some(ts) = current {
            if ts > *last {
                break;
            }
            index.push(ts);
            values.push(self.value_at(&ts));
            current = frequency.next(&ts);
        }
        TimeSeries { index, values }
    }

    pub fn map_values(&self, f: impl Fn(f64) -> f64) -> TimeSeries {
        TimeSeries {
            index: self.index.clone(),
            values: self.values.iter().map(|v| v.map(&f)).collect(),
        }
    }

    /// Replace the values, keeping the index
    pub fn with_values(&self, values: Vec<Option<f64>>) -> TsResult<TimeSeries> {
        TimeSeries::new(self.index.clone(), values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_infer_daily_and_hourly() {
        let daily: Vec<_> = (1..=5).map(|d| day(2020, 1, d)).collect();
        assert_eq!(Frequency::infer(&daily).code(), "D");
        let hourly: Vec<_> = (0..4)
            .map(|h| day(2020, 1, 1) + Duration::hours(h))
            .collect();
        assert_eq!(Frequency::infer(&hourly).code(), "H");
        let quarter: Vec<_> = (0..4)
            .map(|h| day(2020, 1, 1) + Duration::minutes(15 * h))
            .collect();
        assert_eq!(Frequency::infer(&quarter).code(), "15T");
    }

    #[test]
    fn test_infer_month_end_and_annual() {
        let months = vec![day(2020, 1, 31), day(2020, 2, 29), day(2020, 3, 31)];
        assert_eq!(Frequency::infer(&months), Frequency::MonthEnd);
        let years = vec![day(2019, 9, 30), day(2020, 9, 30), day(2021, 9, 30)];
        assert_eq!(Frequency::infer(&years).code(), "A-SEP");
        let starts = vec![day(2020, 1, 1), day(2020, 2, 1), day(2020, 3, 1)];
        assert_eq!(Frequency::infer(&starts), Frequency::MonthStart);
    }

    #[test]
    fn test_infer_daily_with_gaps() {
        let gappy = vec![day(2020, 1, 1), day(2020, 1, 2), day(2020, 1, 5)];
        assert_eq!(Frequency::infer(&gappy), Frequency::Seconds(86_400));
    }

    #[test]
    fn test_infer_irregular() {
        let odd = vec![day(2020, 1, 1), day(2020, 1, 3), day(2020, 1, 6)];
        assert_eq!(Frequency::infer(&odd), Frequency::Irregular);
        assert_eq!(Frequency::infer(&odd[..1]), Frequency::Irregular);
    }

    #[test]
    fn test_from_points_rejects_duplicates() {
        let err = TimeSeries::from_values(vec![(day(2020, 1, 1), 1.0), (day(2020, 1, 1), 2.0)]);
        assert!(err.is_err());
    }

    #[test]
    fn test_regularized_fills_gaps() {
        let s = TimeSeries::from_values(vec![(day(2020, 1, 1), 1.0), (day(2020, 1, 4), 4.0)])
            .unwrap();
        let r = s.regularized(Frequency::Seconds(86_400));
        assert_eq!(r.len(), 4);
        assert_eq!(r.values()[1], None);
        assert_eq!(r.valid_count(), 2);
    }

    #[test]
    fn test_trimmed_drops_edge_nulls() {
        let s = TimeSeries::from_points(vec![
            (day(2020, 1, 1), None),
            (day(2020, 1, 2), Some(2.0)),
            (day(2020, 1, 3), None),
            (day(2020, 1, 4), Some(4.0)),
            (day(2020, 1, 5), None),
        ])
        .unwrap();
        let t = s.trimmed();
        assert_eq!(t.len(), 3);
        assert_eq!(t.first_valid(), Some(day(2020, 1, 2)));
    }
}
