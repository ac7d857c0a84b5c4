//! Series transforms
//!
//! NEW_SERIES_UNIFORM, NEW_TIME_BASE, REDUCE_TIME_SPAN, SERIES_CLEAN,
//! SERIES_DIFFERENCE, SERIES_DISPLACE, SERIES_BASE_LEVEL, SERIES_EQUATION and
//! V_TABLE_TO_SERIES. Each reads existing series by name and joins exactly
//! one new series.

use chrono::{Duration, Months, NaiveDateTime};
use tracing::info;

use crate::datetime::{DateFormat, DateWindow};
use crate::engine::params::BlockParams;
use crate::equation::{parse_equation, Evaluator, Expr, Operand};
use crate::error::{TsError, TsResult};
use crate::store::{EntityName, TimeSeries};

use super::{BlockCommand, Session};

// ============================================================================
// NEW_SERIES_UNIFORM
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Fixed(Duration),
    Months(u32),
}

impl Step {
    fn parse(unit: &str, interval: u32) -> TsResult<Step> {
        if interval == 0 {
            return Err(TsError::invalid("time_interval", "0", "must be at least 1"));
        }
        let n = i64::from(interval);
        match unit.trim().to_lowercase().trim_end_matches('s') {
            "second" | "sec" => Ok(Step::Fixed(Duration::seconds(n))),
            "minute" | "min" => Ok(Step::Fixed(Duration::minutes(n))),
            "hour" => Ok(Step::Fixed(Duration::hours(n))),
            "day" => Ok(Step::Fixed(Duration::days(n))),
            "month" => Ok(Step::Months(interval)),
            "year" => Ok(Step::Months(interval * 12)),
            _ => Err(TsError::invalid(
                "time_unit",
                unit,
                "expected seconds, minutes, hours, days, months or years",
            )),
        }
    }

    fn advance(&self, start: NaiveDateTime, count: u32) -> Option<NaiveDateTime> {
        match self {
            Step::Fixed(d) => start.checked_add_signed(*d * i32::try_from(count).ok()?),
            Step::Months(m) => start.checked_add_months(Months::new(m.checked_mul(count)?)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewSeriesUniform {
    pub name: EntityName,
    pub value: f64,
    pub step: Step,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl BlockCommand for NewSeriesUniform {
    fn from_params(params: &BlockParams, dates: &DateFormat) -> TsResult<Self> {
        let start = params.timestamp("date_1", "time_1", dates)?;
        let end = params.timestamp("date_2", "time_2", dates)?;
        if start > end {
            return Err(TsError::Validation(format!(
                "DATE_1/TIME_1 ({start}) is after DATE_2/TIME_2 ({end})"
            )));
        }
        Ok(Self {
            name: params.entity("new_series_name")?,
            value: params.f64("new_series_value")?,
            step: Step::parse(params.text("time_unit")?, params.parse("time_interval")?)?,
            start,
            end,
        })
    }

    fn execute(self, session: &mut Session) -> TsResult<()> {
        let mut points = Vec::new();
        let mut count = 0;
        while let Some(ts) = self.step.advance(self.start, count) {
            if ts > self.end {
                break;
            }
            points.push((ts, self.value));
            count += 1;
        }
        info!(series = %self.name, points = points.len(), "uniform series");
        session
            .store
            .join_series(&self.name, TimeSeries::from_values(points)?)
    }
}

// ============================================================================
// NEW_TIME_BASE
// ============================================================================

/// Linear-in-time interpolation of `series` at `at`, holding the first and
/// last valid values constant outside their range
pub fn interpolate_at(series: &TimeSeries, at: &[NaiveDateTime]) -> Vec<Option<f64>> {
    let points: Vec<(NaiveDateTime, f64)> = series.valid().collect();
    if points.is_empty() {
        return vec![None; at.len()];
    }
    at.iter()
        .map(|ts| {
            let right = points.partition_point(|(t, _)| t < ts);
            let value = if right == 0 {
                points[0].1
            } else if right == points.len() {
                points[points.len() - 1].1
            } else if points[right].0 == *ts {
                points[right].1
            } else {
                let (t0, v0) = points[right - 1];
                let (t1, v1) = points[right];
                let frac = (*ts - t0).num_milliseconds() as f64 / (t1 - t0).num_milliseconds() as f64;
                v0 + (v1 - v0) * frac
            };
            Some(value)
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewTimeBase {
    pub source: EntityName,
    pub time_base: EntityName,
    pub name: EntityName,
}

impl BlockCommand for NewTimeBase {
    fn from_params(params: &BlockParams, _dates: &DateFormat) -> TsResult<Self> {
        Ok(Self {
            source: params.entity("series_name")?,
            time_base: params.entity("tb_series_name")?,
            name: params.entity("new_series_name")?,
        })
    }

    fn execute(self, session: &mut Session) -> TsResult<()> {
        let base = session.store.series(&self.time_base)?.dropna();
        let source = session.store.series(&self.source)?;
        let values = interpolate_at(&source, base.index());
        session.store.join_series(&self.name, base.with_values(values)?)
    }
}

// ============================================================================
// REDUCE_TIME_SPAN
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ReduceTimeSpan {
    pub source: EntityName,
    pub name: EntityName,
    pub window: DateWindow,
}

impl BlockCommand for ReduceTimeSpan {
    fn from_params(params: &BlockParams, dates: &DateFormat) -> TsResult<Self> {
        Ok(Self {
            source: params.entity("series_name")?,
            name: params.entity("new_series_name")?,
            window: params.window(dates)?,
        })
    }

    fn execute(self, session: &mut Session) -> TsResult<()> {
        let series = session.store.series(&self.source)?.window(&self.window);
        session.store.join_series(&self.name, series)
    }
}

// ============================================================================
// SERIES_CLEAN
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesClean {
    pub source: EntityName,
    pub name: EntityName,
    /// `None` deletes the matching values
    pub substitute: Option<f64>,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

impl SeriesClean {
    /// Both bounds: erase inside `[lower, upper]`. One bound: erase at or
    /// above `lower`, or at or below `upper`.
    fn matches(&self, v: f64) -> bool {
        match (self.lower, self.upper) {
            (Some(lo), Some(hi)) => v >= lo && v <= hi,
            (Some(lo), None) => v >= lo,
            (None, Some(hi)) => v <= hi,
            (None, None) => false,
        }
    }
}

impl BlockCommand for SeriesClean {
    fn from_params(params: &BlockParams, _dates: &DateFormat) -> TsResult<Self> {
        let substitute = match params.text("substitute_value")? {
            raw if raw.eq_ignore_ascii_case("delete") => None,
            _ => Some(params.f64("substitute_value")?),
        };
        let lower = params.opt_f64("lower_erase_boundary")?;
        let upper = params.opt_f64("upper_erase_boundary")?;
        if lower.is_none() && upper.is_none() {
            return Err(TsError::Validation(
                "SERIES_CLEAN needs LOWER_ERASE_BOUNDARY, UPPER_ERASE_BOUNDARY or both".into(),
            ));
        }
        if let (Some(lo), Some(hi)) = (lower, upper) {
            if lo > hi {
                return Err(TsError::Validation(format!(
                    "LOWER_ERASE_BOUNDARY {lo} is above UPPER_ERASE_BOUNDARY {hi}"
                )));
            }
        }
        Ok(Self {
            source: params.entity("series_name")?,
            name: params.entity("new_series_name")?,
            substitute,
            lower,
            upper,
        })
    }

    fn execute(self, session: &mut Session) -> TsResult<()> {
        let series = session.store.series(&self.source)?;
        let values = series
            .values()
            .iter()
            .map(|v| match v {
                Some(x) if self.matches(*x) => self.substitute,
                other => *other,
            })
            .collect();
        session.store.join_series(&self.name, series.with_values(values)?)
    }
}

// ============================================================================
// SERIES_DIFFERENCE / SERIES_DISPLACE
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesDifference {
    pub source: EntityName,
    pub name: EntityName,
}

impl BlockCommand for SeriesDifference {
    fn from_params(params: &BlockParams, _dates: &DateFormat) -> TsResult<Self> {
        Ok(Self {
            source: params.entity("series_name")?,
            name: params.entity("new_series_name")?,
        })
    }

    fn execute(self, session: &mut Session) -> TsResult<()> {
        let series = session.store.series(&self.source)?;
        let values = series.values();
        let diffs = std::iter::once(None)
            .chain(values.windows(2).map(|w| Some(w[1]? - w[0]?)))
            .collect();
        session.store.join_series(&self.name, series.with_values(diffs)?)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesDisplace {
    pub source: EntityName,
    pub name: EntityName,
    /// Positive lags move values later in time
    pub lag: i64,
    pub fill: Option<f64>,
}

impl BlockCommand for SeriesDisplace {
    fn from_params(params: &BlockParams, _dates: &DateFormat) -> TsResult<Self> {
        let fill: f64 = params.f64("fill_value")?;
        Ok(Self {
            source: params.entity("series_name")?,
            name: params.entity("new_series_name")?,
            lag: params.parse("lag_increment")?,
            fill: fill.is_finite().then_some(fill),
        })
    }

    fn execute(self, session: &mut Session) -> TsResult<()> {
        let series = session.store.series(&self.source)?;
        let values = series.values();
        let len = values.len() as i64;
        let shifted = (0..len)
            .map(|i| {
                let from = i - self.lag;
                if (0..len).contains(&from) {
                    values[from as usize]
                } else {
                    self.fill
                }
            })
            .collect();
        session.store.join_series(&self.name, series.with_values(shifted)?)
    }
}

// ============================================================================
// SERIES_BASE_LEVEL
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesBaseLevel {
    pub source: EntityName,
    pub name: EntityName,
    pub base: EntityName,
    pub at: NaiveDateTime,
    pub negate: bool,
    /// Replace the source series instead of creating `name`
    pub substitute: bool,
}

impl BlockCommand for SeriesBaseLevel {
    fn from_params(params: &BlockParams, dates: &DateFormat) -> TsResult<Self> {
        Ok(Self {
            source: params.entity("series_name")?,
            name: params.entity("new_series_name")?,
            base: params.entity("base_level_series_name")?,
            at: params.timestamp("base_level_date", "base_level_time", dates)?,
            negate: params.flag("negate")?,
            substitute: params.flag("substitute")?,
        })
    }

    fn execute(self, session: &mut Session) -> TsResult<()> {
        let base = session.store.series(&self.base)?;
        let level = base.value_at(&self.at).ok_or_else(|| {
            TsError::Validation(format!(
                "base level series {} has no value at {}",
                self.base, self.at
            ))
        })?;
        let sign = if self.negate { -1.0 } else { 1.0 };
        let leveled = session
            .store
            .series(&self.source)?
            .map_values(|v| sign * (v - level));
        let target = if self.substitute {
            session.store.erase_series(&self.source)?;
            &self.source
        } else {
            &self.name
        };
        session.store.join_series(target, leveled)
    }
}

// ============================================================================
// SERIES_EQUATION
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesEquation {
    pub name: EntityName,
    pub source: String,
    pub expr: Expr,
}

impl BlockCommand for SeriesEquation {
    fn from_params(params: &BlockParams, _dates: &DateFormat) -> TsResult<Self> {
        let source = params.joined("equation").unwrap_or_default();
        Ok(Self {
            name: params.entity("new_series_name")?,
            expr: parse_equation(&source)?,
            source,
        })
    }

    fn execute(self, session: &mut Session) -> TsResult<()> {
        info!(series = %self.name, equation = %self.source, "evaluating equation");
        match Evaluator::new(&session.store).evaluate(&self.expr)? {
            Operand::Series(series) => session.store.join_series(&self.name, series),
            _ => Err(TsError::Equation(format!(
                "'{}' does not produce a time series; reference at least one series",
                self.source
            ))),
        }
    }
}

// ============================================================================
// V_TABLE_TO_SERIES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Abscissa {
    Start,
    End,
    Center,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VTableToSeries {
    pub table: EntityName,
    pub name: EntityName,
    pub abscissa: Abscissa,
}

impl BlockCommand for VTableToSeries {
    fn from_params(params: &BlockParams, _dates: &DateFormat) -> TsResult<Self> {
        let abscissa = match params
            .choice("time_abscissa", &["start", "end", "center", "centre", "middle"])?
            .as_str()
        {
            "start" => Abscissa::Start,
            "end" => Abscissa::End,
            _ => Abscissa::Center,
        };
        Ok(Self {
            table: params.entity("v_table_name")?,
            name: params.entity("new_series_name")?,
            abscissa,
        })
    }

    fn execute(self, session: &mut Session) -> TsResult<()> {
        let table = session.store.v_tables.get(&self.table)?;
        let points = table
            .rows
            .iter()
            .map(|row| {
                let ts = match self.abscissa {
                    Abscissa::Start => row.start,
                    Abscissa::End => row.end,
                    Abscissa::Center => row.start + (row.end - row.start) / 2,
                };
                (ts, row.volume)
            })
            .collect();
        let series = TimeSeries::from_values(points)?;
        session.store.join_series(&self.name, series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use ts_types::ParamValue;

    fn day(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 1, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn params(command: &str, pairs: &[(&str, &str)]) -> BlockParams {
        BlockParams::from_pairs(
            command,
            1,
            pairs.iter().map(|(k, v)| (*k, ParamValue::scalar(*v))),
        )
    }

    fn session_with(name: &str, values: &[Option<f64>]) -> Session {
        let mut session = Session::new(".");
        let points = values
            .iter()
            .enumerate()
            .map(|(i, v)| (day(i as u32 + 1), *v))
            .collect();
        session
            .store
            .join_series(&name.into(), TimeSeries::from_points(points).unwrap())
            .unwrap();
        session
    }

    fn run<C: BlockCommand>(session: &mut Session, p: &BlockParams) -> TsResult<()> {
        C::from_params(p, &DateFormat::default())?.execute(session)
    }

    #[test]
    fn test_uniform_monthly_steps() {
        let mut session = Session::new(".");
        let p = params(
            "NEW_SERIES_UNIFORM",
            &[
                ("new_series_name", "m"),
                ("new_series_value", "2"),
                ("time_interval", "1"),
                ("time_unit", "months"),
                ("date_1", "2020-01-31"),
                ("time_1", "00:00:00"),
                ("date_2", "2020-04-30"),
                ("time_2", "00:00:00"),
            ],
        );
        run::<NewSeriesUniform>(&mut session, &p).unwrap();
        let series = session.store.series(&"M".into()).unwrap();
        assert_eq!(series.len(), 4);
        assert_eq!(series.index()[1].date(), NaiveDate::from_ymd_opt(2020, 2, 29).unwrap());
    }

    #[test]
    fn test_time_base_interpolates_and_holds_ends() {
        let mut session = session_with("SRC", &[Some(0.0), None, Some(4.0)]);
        let hours = [day(1) - Duration::hours(12), day(2), day(3) + Duration::hours(6)];
        let base = TimeSeries::from_values(hours.iter().map(|t| (*t, 0.0)).collect()).unwrap();
        session.store.join_series(&"TB".into(), base).unwrap();
        let p = params(
            "NEW_TIME_BASE",
            &[("series_name", "src"), ("tb_series_name", "tb"), ("new_series_name", "out")],
        );
        run::<NewTimeBase>(&mut session, &p).unwrap();
        let out = session.store.series(&"OUT".into()).unwrap();
        assert_eq!(out.valid_values(), vec![0.0, 2.0, 4.0]);
    }

    #[test]
    fn test_clean_inside_bounds() {
        let mut session = session_with("S", &[Some(1.0), Some(5.0), Some(9.0), Some(2.0)]);
        let p = params(
            "SERIES_CLEAN",
            &[
                ("series_name", "s"),
                ("new_series_name", "c"),
                ("substitute_value", "delete"),
                ("lower_erase_boundary", "4"),
                ("upper_erase_boundary", "10"),
            ],
        );
        run::<SeriesClean>(&mut session, &p).unwrap();
        let clean = session.store.series(&"C".into()).unwrap();
        assert_eq!(clean.values(), &[Some(1.0), None, None, Some(2.0)]);
    }

    #[test]
    fn test_difference_and_displace() {
        let mut session = session_with("S", &[Some(1.0), Some(4.0), Some(9.0)]);
        run::<SeriesDifference>(
            &mut session,
            &params("SERIES_DIFFERENCE", &[("series_name", "s"), ("new_series_name", "d")]),
        )
        .unwrap();
        assert_eq!(
            session.store.series(&"D".into()).unwrap().valid_values(),
            vec![3.0, 5.0]
        );
        run::<SeriesDisplace>(
            &mut session,
            &params(
                "SERIES_DISPLACE",
                &[
                    ("series_name", "s"),
                    ("new_series_name", "lagged"),
                    ("lag_increment", "1"),
                    ("fill_value", "0"),
                ],
            ),
        )
        .unwrap();
        assert_eq!(
            session.store.series(&"LAGGED".into()).unwrap().valid_values(),
            vec![0.0, 1.0, 4.0]
        );
    }

    #[test]
    fn test_base_level_substitute_replaces_source() {
        let mut session = session_with("S", &[Some(10.0), Some(12.0), Some(15.0)]);
        let p = params(
            "SERIES_BASE_LEVEL",
            &[
                ("series_name", "s"),
                ("substitute", "yes"),
                ("new_series_name", "ignored"),
                ("base_level_series_name", "s"),
                ("base_level_date", "2020-01-02"),
                ("base_level_time", "00:00:00"),
                ("negate", "yes"),
            ],
        );
        run::<SeriesBaseLevel>(&mut session, &p).unwrap();
        assert!(!session.store.has_series(&"IGNORED".into()));
        assert_eq!(
            session.store.series(&"S".into()).unwrap().valid_values(),
            vec![2.0, -0.0, -3.0]
        );
    }

    #[test]
    fn test_equation_needs_a_series() {
        let mut session = session_with("FLOW", &[Some(1.0), Some(2.0)]);
        let p = params("SERIES_EQUATION", &[("new_series_name", "e"), ("equation", "flow * 2 + 1")]);
        run::<SeriesEquation>(&mut session, &p).unwrap();
        assert_eq!(
            session.store.series(&"E".into()).unwrap().valid_values(),
            vec![3.0, 5.0]
        );
        let scalar = params("SERIES_EQUATION", &[("new_series_name", "k"), ("equation", "2 + 2")]);
        assert!(matches!(
            run::<SeriesEquation>(&mut session, &scalar),
            Err(TsError::Equation(_))
        ));
    }
}
