//! SERIES_STATISTICS, PERIOD_STATISTICS and SERIES_COMPARE
//!
//! All three read their inputs through [`Transform::prepare`]: restrict to
//! the block's date window, put the gaps of a regular series back as
//! missing values, apply LOG or POWER, then trim to the valid range.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use tracing::debug;

use crate::datetime::{DateFormat, DateWindow};
use crate::engine::params::BlockParams;
use crate::error::{TsError, TsResult};
use crate::store::series::last_day_of_month;
use crate::store::{CTable, EntityName, STable, TimeSeries};
use crate::toolbox::gof::{check_exponent, FitStatistic, Paired};
use crate::toolbox::{block_means, Statistic};

use super::{BlockCommand, Session};

// ============================================================================
// SERIES PREPARATION
// ============================================================================

/// Window and value transform applied before any statistic
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    pub window: DateWindow,
    pub log: bool,
    pub power: f64,
}

impl Transform {
    /// LOG and POWER are exclusive; `block_stats` marks blocks that also ask
    /// for MINMEAN_n/MAXMEAN_n, which exclude both
    pub fn from_params(params: &BlockParams, dates: &DateFormat, block_stats: bool) -> TsResult<Self> {
        let log = params.flag("log")?;
        let power = params.opt_f64("power")?.unwrap_or(1.0);
        if power <= 0.0 {
            return Err(TsError::invalid("power", power.to_string(), "must be greater than zero"));
        }
        let powered = power != 1.0;
        if log && powered {
            return Err(TsError::Validation("only one of LOG or POWER may be given".into()));
        }
        if block_stats && (log || powered) {
            return Err(TsError::Validation(
                "LOG and POWER cannot be combined with MINMEAN_n or MAXMEAN_n".into(),
            ));
        }
        Ok(Self {
            window: params.window(dates)?,
            log,
            power,
        })
    }

    pub fn plain(window: DateWindow) -> Self {
        Self {
            window,
            log: false,
            power: 1.0,
        }
    }

    pub fn prepare(&self, series: &TimeSeries) -> TimeSeries {
        let windowed = series.window(&self.window);
        let mut out = windowed.regularized(windowed.frequency());
        if self.log {
            out = out.map_values(f64::log10);
        }
        if self.power != 1.0 {
            out = out.map_values(|v| v.powf(self.power));
        }
        // log10 of zero or a negative value is not a usable number
        let values = out
            .values()
            .iter()
            .map(|v| v.filter(|x| x.is_finite()))
            .collect();
        out.with_values(values).map(|s| s.trimmed()).unwrap_or_default()
    }
}

fn empty_after_prepare(name: &EntityName) -> TsError {
    TsError::Validation(format!("series {name} has no values in the requested window"))
}

// ============================================================================
// SERIES_STATISTICS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockExtreme {
    MinMean,
    MaxMean,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesStatistics {
    pub source: EntityName,
    pub name: EntityName,
    pub stats: Vec<Statistic>,
    /// `(kind, block size)` in the order requested
    pub block_stats: Vec<(BlockExtreme, usize)>,
    pub transform: Transform,
}

impl BlockCommand for SeriesStatistics {
    fn from_params(params: &BlockParams, dates: &DateFormat) -> TsResult<Self> {
        let mut stats = Vec::new();
        for stat in Statistic::ALL {
            if params.flag(stat.keyword())? {
                stats.push(stat);
            }
        }
        let mut block_stats = Vec::new();
        for (prefix, kind) in [("minmean_", BlockExtreme::MinMean), ("maxmean_", BlockExtreme::MaxMean)] {
            for (size, _) in params.numbered(prefix) {
                let key = format!("{prefix}{size}");
                if size == 0 {
                    return Err(TsError::invalid(&key, "0", "block size must be at least 1"));
                }
                if params.flag(&key)? {
                    block_stats.push((kind, size));
                }
            }
        }
        if stats.is_empty() && block_stats.is_empty() {
            return Err(TsError::Validation(
                "SERIES_STATISTICS requests no statistic".into(),
            ));
        }
        Ok(Self {
            source: params.entity("series_name")?,
            name: params.entity("new_s_table_name")?,
            transform: Transform::from_params(params, dates, !block_stats.is_empty())?,
            stats,
            block_stats,
        })
    }

    fn execute(self, session: &mut Session) -> TsResult<()> {
        let series = self.transform.prepare(&session.store.series(&self.source)?);
        let (Some(start), Some(end)) = (series.first_valid(), series.last_valid()) else {
            return Err(empty_after_prepare(&self.source));
        };
        debug!(series = %self.source, points = series.len(), "prepared for statistics");
        let values = series.valid_values();
        let mut stats = IndexMap::new();
        for stat in &self.stats {
            let value = stat.apply(&values).ok_or_else(|| {
                TsError::Validation(format!(
                    "{} of {} needs more values",
                    stat.keyword(),
                    self.source
                ))
            })?;
            stats.insert(stat.keyword().to_string(), value);
        }
        for (kind, size) in &self.block_stats {
            let means = block_means(series.values(), *size);
            let (key, value) = match kind {
                BlockExtreme::MinMean => (format!("minmean_{size}"), crate::toolbox::min(&means)),
                BlockExtreme::MaxMean => (format!("maxmean_{size}"), crate::toolbox::max(&means)),
            };
            let value = value.ok_or_else(|| empty_after_prepare(&self.source))?;
            stats.insert(key, value);
        }
        session.store.s_tables.insert(
            &self.name,
            STable {
                stats,
                source_name: self.source.to_string(),
                start,
                end,
                log_transformed: self.transform.log,
                exponent: self.transform.power,
            },
        )
    }
}

// ============================================================================
// PERIOD_STATISTICS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    /// One value per calendar month of the record
    MonthMany,
    /// One value per month of the year, pooled over all years
    MonthOne,
    /// One value per year ending in `end_month`
    Year { end_month: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodAbscissa {
    Start,
    /// Pandas-style `middle`: stamped like `End`
    Middle,
    End,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PeriodStatistics {
    pub source: EntityName,
    pub name: EntityName,
    pub statistic: Statistic,
    pub period: Period,
    pub abscissa: PeriodAbscissa,
    pub transform: Transform,
}

fn month_start(year: i32, month: u32) -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(year, month, 1)?.and_hms_opt(0, 0, 0)
}

fn month_end(year: i32, month: u32) -> Option<NaiveDateTime> {
    last_day_of_month(year, month)?.and_hms_opt(0, 0, 0)
}

impl Period {
    /// Sortable key of the period containing `ts`: `(year, month)` for
    /// months, `(ending year, end month)` for years
    fn key(&self, ts: &NaiveDateTime) -> (i32, u32) {
        match self {
            Period::MonthMany => (ts.year(), ts.month()),
            Period::MonthOne => (1900, ts.month()),
            Period::Year { end_month } => {
                if ts.month() <= *end_month {
                    (ts.year(), *end_month)
                } else {
                    (ts.year() + 1, *end_month)
                }
            }
        }
    }

    fn next_key(&self, (year, month): (i32, u32)) -> (i32, u32) {
        match self {
            Period::Year { .. } => (year + 1, month),
            _ if month == 12 => (year + 1, 1),
            _ => (year, month + 1),
        }
    }

    fn stamp(&self, (year, month): (i32, u32), abscissa: PeriodAbscissa) -> Option<NaiveDateTime> {
        match (self, abscissa) {
            (Period::MonthOne, _) => month_end(year, month),
            (Period::MonthMany, PeriodAbscissa::Start) => month_start(year, month),
            (Period::MonthMany, _) => month_end(year, month),
            (Period::Year { end_month }, PeriodAbscissa::Start) => {
                if *end_month == 12 {
                    month_start(year, 1)
                } else {
                    month_start(year - 1, end_month + 1)
                }
            }
            (Period::Year { .. }, _) => month_end(year, month),
        }
    }
}

impl BlockCommand for PeriodStatistics {
    fn from_params(params: &BlockParams, dates: &DateFormat) -> TsResult<Self> {
        let period = match params.choice("period", &["month_many", "month_one", "year"])?.as_str() {
            "month_many" => Period::MonthMany,
            "month_one" => Period::MonthOne,
            _ => {
                let year_type = params
                    .opt_choice("year_type", &["water_high", "water_low", "calendar"])?
                    .unwrap_or_else(|| "water_high".to_string());
                let end_month = match year_type.as_str() {
                    "water_high" => 9,
                    "water_low" => 3,
                    _ => 12,
                };
                Period::Year { end_month }
            }
        };
        let abscissa = match params.choice("time_abscissa", &["start", "middle", "end"])?.as_str() {
            "start" => PeriodAbscissa::Start,
            "middle" => PeriodAbscissa::Middle,
            _ => PeriodAbscissa::End,
        };
        Ok(Self {
            source: params.entity("series_name")?,
            name: params.entity("new_series_name")?,
            statistic: Statistic::parse(params.text("statistic")?)?,
            period,
            abscissa,
            transform: Transform::from_params(params, dates, false)?,
        })
    }

    fn execute(self, session: &mut Session) -> TsResult<()> {
        let series = self.transform.prepare(&session.store.series(&self.source)?);
        let mut groups: IndexMap<(i32, u32), Vec<f64>> = IndexMap::new();
        for (ts, value) in series.valid() {
            groups.entry(self.period.key(&ts)).or_default().push(value);
        }
        groups.sort_keys();
        let (Some(first), Some(last)) = (groups.first().map(|(k, _)| *k), groups.last().map(|(k, _)| *k)) else {
            return Err(empty_after_prepare(&self.source));
        };

        // resampled periods keep empty periods as gaps; pooled months don't
        let keys: Vec<(i32, u32)> = if self.period == Period::MonthOne {
            groups.keys().copied().collect()
        } else {
            let mut keys = vec![first];
            while let Some(&key) = keys.last() {
                if key >= last {
                    break;
                }
                keys.push(self.period.next_key(key));
            }
            keys
        };

        let mut points = Vec::with_capacity(keys.len());
        for key in keys {
            let ts = self.period.stamp(key, self.abscissa).ok_or_else(|| {
                TsError::Validation(format!("period {}-{:02} is out of range", key.0, key.1))
            })?;
            let value = groups
                .get(&key)
                .and_then(|values| self.statistic.apply(values));
            points.push((ts, value));
        }
        session
            .store
            .join_series(&self.name, TimeSeries::from_points(points)?)
    }
}

// ============================================================================
// SERIES_COMPARE
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesCompare {
    pub sim: EntityName,
    pub obs: EntityName,
    pub base: Option<EntityName>,
    pub name: EntityName,
    pub stats: Vec<FitStatistic>,
    pub exponent: u32,
    pub window: DateWindow,
}

impl BlockCommand for SeriesCompare {
    fn from_params(params: &BlockParams, dates: &DateFormat) -> TsResult<Self> {
        let mut stats = Vec::new();
        for stat in FitStatistic::ALL {
            if params.flag(stat.keyword())? {
                stats.push(stat);
            }
        }
        if stats.is_empty() {
            return Err(TsError::Validation(
                "SERIES_COMPARE requests no comparison statistic".into(),
            ));
        }
        Ok(Self {
            sim: params.entity("series_name_sim")?,
            obs: params.entity("series_name_obs")?,
            base: params.opt_entity("series_name_base"),
            name: params.entity("new_c_table_name")?,
            stats,
            exponent: check_exponent(params.opt_f64("exponent")?.unwrap_or(1.0))?,
            window: params.window(dates)?,
        })
    }

    fn execute(self, session: &mut Session) -> TsResult<()> {
        let transform = Transform::plain(self.window);
        let sim = transform.prepare(&session.store.series(&self.sim)?);
        let obs = transform.prepare(&session.store.series(&self.obs)?);
        let base = match &self.base {
            Some(name) => Some(transform.prepare(&session.store.series(name)?)),
            None => None,
        };
        let (Some(start), Some(end)) = (sim.first_valid(), sim.last_valid()) else {
            return Err(empty_after_prepare(&self.sim));
        };

        let mut pairs = Paired {
            base: base.as_ref().map(|_| Vec::new()),
            ..Paired::default()
        };
        for (ts, s) in sim.valid() {
            let Some(o) = obs.value_at(&ts) else { continue };
            if let Some(base) = &base {
                let Some(b) = base.value_at(&ts) else { continue };
                if let Some(values) = pairs.base.as_mut() {
                    values.push(b);
                }
            }
            pairs.sim.push(s);
            pairs.obs.push(o);
        }

        let mut stats = IndexMap::new();
        for stat in &self.stats {
            stats.insert(stat.label().to_string(), stat.compute(&pairs, self.exponent)?);
        }
        session.store.c_tables.insert(
            &self.name,
            CTable {
                stats,
                obs_name: self.obs.to_string(),
                sim_name: self.sim.to_string(),
                start,
                end,
                num_terms: sim.valid_count().min(obs.valid_count()),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use ts_types::ParamValue;

    fn params(command: &str, pairs: &[(&str, &str)]) -> BlockParams {
        BlockParams::from_pairs(
            command,
            1,
            pairs.iter().map(|(k, v)| (*k, ParamValue::scalar(*v))),
        )
    }

    fn daily(start: NaiveDate, values: &[f64]) -> TimeSeries {
        TimeSeries::from_values(
            values
                .iter()
                .enumerate()
                .map(|(i, v)| {
                    let d = start + chrono::Duration::days(i as i64);
                    (d.and_hms_opt(0, 0, 0).unwrap(), *v)
                })
                .collect(),
        )
        .unwrap()
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn run<C: BlockCommand>(session: &mut Session, p: &BlockParams) -> TsResult<()> {
        C::from_params(p, &DateFormat::default())?.execute(session)
    }

    #[test]
    fn test_series_statistics_rows_in_order() {
        let mut session = Session::new(".");
        let s = daily(ymd(2020, 1, 1), &[1.0, 2.0, 3.0, 4.0, 10.0]);
        session.store.join_series(&"Q".into(), s).unwrap();
        let p = params(
            "SERIES_STATISTICS",
            &[
                ("series_name", "q"),
                ("new_s_table_name", "st"),
                ("maximum", "yes"),
                ("mean", "yes"),
                ("maxmean_2", "yes"),
            ],
        );
        run::<SeriesStatistics>(&mut session, &p).unwrap();
        let table = session.store.s_tables.get(&"ST".into()).unwrap();
        let keys: Vec<&str> = table.stats.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["mean", "maximum", "maxmean_2"]);
        assert_eq!(table.stats["mean"], 4.0);
        assert_eq!(table.stats["maxmean_2"], 10.0);
    }

    #[test]
    fn test_log_excludes_power_and_block_means() {
        let base = [("series_name", "q"), ("new_s_table_name", "st"), ("mean", "yes")];
        let mut with_power = base.to_vec();
        with_power.extend([("log", "yes"), ("power", "2")]);
        assert!(matches!(
            SeriesStatistics::from_params(&params("SERIES_STATISTICS", &with_power), &DateFormat::default()),
            Err(TsError::Validation(_))
        ));
        let mut with_block = base.to_vec();
        with_block.extend([("log", "yes"), ("minmean_3", "yes")]);
        assert!(matches!(
            SeriesStatistics::from_params(&params("SERIES_STATISTICS", &with_block), &DateFormat::default()),
            Err(TsError::Validation(_))
        ));
    }

    #[test]
    fn test_water_year_totals() {
        let mut session = Session::new(".");
        // 2020-09-29 .. 2020-10-02 straddles the water year boundary
        let s = daily(ymd(2020, 9, 29), &[1.0, 2.0, 3.0, 4.0]);
        session.store.join_series(&"Q".into(), s).unwrap();
        let p = params(
            "PERIOD_STATISTICS",
            &[
                ("series_name", "q"),
                ("new_series_name", "annual"),
                ("statistic", "sum"),
                ("period", "year"),
                ("time_abscissa", "end"),
            ],
        );
        run::<PeriodStatistics>(&mut session, &p).unwrap();
        let out = session.store.series(&"ANNUAL".into()).unwrap();
        assert_eq!(out.valid_values(), vec![3.0, 7.0]);
        assert_eq!(out.index()[0].date(), ymd(2020, 9, 30));
        assert_eq!(out.index()[1].date(), ymd(2021, 9, 30));
    }

    #[test]
    fn test_month_many_start_abscissa() {
        let mut session = Session::new(".");
        let s = daily(ymd(2020, 1, 30), &[2.0, 4.0, 6.0]);
        session.store.join_series(&"Q".into(), s).unwrap();
        let p = params(
            "PERIOD_STATISTICS",
            &[
                ("series_name", "q"),
                ("new_series_name", "monthly"),
                ("statistic", "mean"),
                ("period", "month_many"),
                ("time_abscissa", "start"),
            ],
        );
        run::<PeriodStatistics>(&mut session, &p).unwrap();
        let out = session.store.series(&"MONTHLY".into()).unwrap();
        assert_eq!(out.valid_values(), vec![3.0, 6.0]);
        assert_eq!(out.index()[1].date(), ymd(2020, 2, 1));
    }

    #[test]
    fn test_compare_uses_common_valid_points() {
        let mut session = Session::new(".");
        session
            .store
            .join_series(&"SIM".into(), daily(ymd(2020, 1, 1), &[1.0, 2.0, 3.0, 4.0]))
            .unwrap();
        session
            .store
            .join_series(&"OBS".into(), daily(ymd(2020, 1, 2), &[1.0, 2.0, 3.0]))
            .unwrap();
        let p = params(
            "SERIES_COMPARE",
            &[
                ("series_name_sim", "sim"),
                ("series_name_obs", "obs"),
                ("new_c_table_name", "fit"),
                ("bias", "yes"),
                ("nash_sutcliffe", "yes"),
            ],
        );
        run::<SeriesCompare>(&mut session, &p).unwrap();
        let table = session.store.c_tables.get(&"FIT".into()).unwrap();
        assert_eq!(table.stats["Bias:"], 1.0);
        assert_eq!(table.num_terms, 3);
        assert_eq!(table.sim_name, "SIM");
    }
}
