//! Hydrology commands
//!
//! DIGITAL_FILTER, HYDRO_PEAKS, HYDRO_EVENTS, USGS_HYSEP, FLOW_DURATION,
//! EXCEEDANCE_TIME, HYDROLOGIC_INDICES and VOLUME_CALCULATION. The numeric
//! work lives in `toolbox`; these handlers parse blocks, pick the input
//! values and shape the results into series or tables.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use tracing::{debug, info};

use crate::datetime::{combine, DateFormat, DateWindow};
use crate::engine::params::BlockParams;
use crate::error::{TsError, TsResult};
use crate::readers::read_text;
use crate::store::{
    Direction, ETable, EntityName, ExceedanceRow, GKey, GTable, GTableKind, TimeSeries, VTable,
    VolumeRow,
};
use crate::toolbox::duration::{exceedance_seconds, flow_duration};
use crate::toolbox::events::{storm_events, EventSettings};
use crate::toolbox::filters::{Butterworth, Chapman, Pass};
use crate::toolbox::hysep::{separate, HysepMethod};
use crate::toolbox::{indices, TimeUnit};

use super::series_ops::interpolate_at;
use super::{BlockCommand, Session};

/// Run `f` over the valid values of `series` and put the results back at the
/// same timestamps
fn on_valid(
    series: &TimeSeries,
    f: impl FnOnce(&[f64]) -> TsResult<Vec<f64>>,
) -> TsResult<TimeSeries> {
    let (index, values): (Vec<NaiveDateTime>, Vec<f64>) = series.valid().unzip();
    let out = f(&values)?;
    TimeSeries::new(index, out.into_iter().map(Some).collect())
}

fn windowed(session: &Session, name: &EntityName, window: &DateWindow) -> TsResult<TimeSeries> {
    let series = session.store.series(name)?.window(window).trimmed();
    if series.valid_count() == 0 {
        return Err(TsError::Validation(format!(
            "series {name} has no values in the requested window"
        )));
    }
    Ok(series)
}

// ============================================================================
// DIGITAL_FILTER
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum FilterKind {
    Butterworth(Butterworth),
    BaseflowSeparation(Chapman),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DigitalFilter {
    pub source: EntityName,
    pub name: EntityName,
    pub filter: FilterKind,
}

impl BlockCommand for DigitalFilter {
    fn from_params(params: &BlockParams, _dates: &DateFormat) -> TsResult<Self> {
        let filter = match params
            .choice("filter_type", &["butterworth", "baseflow_separation"])?
            .as_str()
        {
            "butterworth" => {
                let pass = Pass::parse(params.text("filter_pass")?)?;
                let cutoff = match pass {
                    Pass::Band => (
                        params.f64("cutoff_frequency_1")?,
                        Some(params.f64("cutoff_frequency_2")?),
                    ),
                    Pass::Low | Pass::High => (params.f64("cutoff_frequency")?, None),
                };
                let stages: usize = params.opt_parse("stages")?.unwrap_or(1);
                if !(1..=3).contains(&stages) {
                    return Err(TsError::invalid("stages", stages.to_string(), "must be 1, 2 or 3"));
                }
                FilterKind::Butterworth(Butterworth {
                    pass,
                    cutoff,
                    stages,
                    reverse_second_stage: params.flag("reverse_second_stage")?,
                })
            }
            _ => {
                let defaults = Chapman::default();
                FilterKind::BaseflowSeparation(Chapman {
                    alpha: params.opt_f64("alpha")?.unwrap_or(defaults.alpha),
                    passes: params.opt_parse("passes")?.unwrap_or(defaults.passes),
                    clip_input: params.flag("clip_input")?,
                    clip_zero: params.flag("clip_zero")?,
                })
            }
        };
        Ok(Self {
            source: params.entity("series_name")?,
            name: params.entity("new_series_name")?,
            filter,
        })
    }

    fn execute(self, session: &mut Session) -> TsResult<()> {
        let series = session.store.series(&self.source)?;
        let filtered = match &self.filter {
            FilterKind::Butterworth(butterworth) => {
                let rate = series.frequency().samples_per_day().ok_or_else(|| {
                    TsError::Validation(format!(
                        "series {} has no regular time step to filter",
                        self.source
                    ))
                })?;
                debug!(series = %self.source, samples_per_day = rate, "butterworth filter");
                on_valid(&series, |values| butterworth.apply(values, rate))?
            }
            FilterKind::BaseflowSeparation(chapman) => {
                on_valid(&series, |values| chapman.apply(values))?
            }
        };
        session.store.join_series(&self.name, filtered)
    }
}

// ============================================================================
// HYDRO_PEAKS / HYDRO_EVENTS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct HydroEvents {
    pub source: EntityName,
    pub name: EntityName,
    pub settings: EventSettings,
    pub window: DateWindow,
}

impl HydroEvents {
    fn build(params: &BlockParams, dates: &DateFormat, lags: bool) -> TsResult<Self> {
        let min_peak = params.opt_f64("min_peak")?.unwrap_or(0.0);
        if min_peak < 0.0 {
            return Err(TsError::invalid("min_peak", min_peak.to_string(), "must not be negative"));
        }
        let (rise_lag, fall_lag) = if lags {
            (params.parse("rise_lag")?, params.parse("fall_lag")?)
        } else {
            (0, 0)
        };
        Ok(Self {
            source: params.entity("series_name")?,
            name: params.entity("new_series_name")?,
            settings: EventSettings {
                rise_lag,
                fall_lag,
                window: params.opt_parse("window")?.unwrap_or(1),
                min_peak,
            },
            window: params.window(dates)?,
        })
    }

    fn run(self, session: &mut Session) -> TsResult<()> {
        let series = windowed(session, &self.source, &self.window)?;
        let events = storm_events(&series, &self.settings)?;
        info!(
            series = %self.name,
            kept = events.valid_count(),
            of = series.valid_count(),
            "storm events"
        );
        session.store.join_series(&self.name, events)
    }
}

impl BlockCommand for HydroEvents {
    fn from_params(params: &BlockParams, dates: &DateFormat) -> TsResult<Self> {
        Self::build(params, dates, true)
    }

    fn execute(self, session: &mut Session) -> TsResult<()> {
        self.run(session)
    }
}

/// Peaks only: an event with no rising or falling limb
#[derive(Debug, Clone, PartialEq)]
pub struct HydroPeaks(pub HydroEvents);

impl BlockCommand for HydroPeaks {
    fn from_params(params: &BlockParams, dates: &DateFormat) -> TsResult<Self> {
        HydroEvents::build(params, dates, false).map(HydroPeaks)
    }

    fn execute(self, session: &mut Session) -> TsResult<()> {
        self.0.run(session)
    }
}

// ============================================================================
// USGS_HYSEP
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct UsgsHysep {
    pub source: EntityName,
    pub name: EntityName,
    pub method: HysepMethod,
    pub interval: usize,
    pub window: DateWindow,
}

impl BlockCommand for UsgsHysep {
    fn from_params(params: &BlockParams, dates: &DateFormat) -> TsResult<Self> {
        if let Some(area) = params.opt_text("area") {
            debug!(area, "USGS_HYSEP drainage area is not used by the separation");
        }
        Ok(Self {
            source: params.entity("series_name")?,
            name: params.entity("new_series_name")?,
            method: HysepMethod::parse(params.text("hysep_type")?)?,
            interval: params.parse("time_interval")?,
            window: params.window(dates)?,
        })
    }

    fn execute(self, session: &mut Session) -> TsResult<()> {
        let series = windowed(session, &self.source, &self.window)?;
        let baseflow = on_valid(&series, |flow| separate(flow, self.method, self.interval))?;
        session.store.join_series(&self.name, baseflow)
    }
}

// ============================================================================
// FLOW_DURATION
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct FlowDuration {
    pub source: EntityName,
    pub name: EntityName,
    /// Exceedance probabilities in percent
    pub percents: Vec<f64>,
    pub window: DateWindow,
}

impl BlockCommand for FlowDuration {
    fn from_params(params: &BlockParams, dates: &DateFormat) -> TsResult<Self> {
        Ok(Self {
            source: params.entity("series_name")?,
            name: params.entity("new_g_table_name")?,
            percents: params.f64_list("exceedance_probabilities")?,
            window: params.window(dates)?,
        })
    }

    fn execute(self, session: &mut Session) -> TsResult<()> {
        let series = windowed(session, &self.source, &self.window)?;
        let curve = flow_duration(&series.valid_values(), &self.percents)?;
        let (Some(start), Some(end)) = (series.first_valid(), series.last_valid()) else {
            return Err(TsError::Validation(format!("series {} is empty", self.source)));
        };
        session.store.g_tables.insert(
            &self.name,
            GTable {
                rows: curve
                    .into_iter()
                    .map(|(p, flow)| (GKey::Probability(p / 100.0), flow))
                    .collect(),
                source_name: self.source.to_string(),
                kind: GTableKind::FlowDuration,
                start,
                end,
            },
        )
    }
}

// ============================================================================
// EXCEEDANCE_TIME
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ExceedanceTime {
    pub source: EntityName,
    pub name: EntityName,
    pub units: TimeUnit,
    pub direction: Direction,
    /// `(threshold, delay in units)`
    pub thresholds: Vec<(f64, f64)>,
}

impl BlockCommand for ExceedanceTime {
    fn from_params(params: &BlockParams, _dates: &DateFormat) -> TsResult<Self> {
        let direction = match params.opt_text("under_over") {
            None => Direction::Over,
            Some(raw) => Direction::parse(raw)
                .ok_or_else(|| TsError::invalid("under_over", raw, "expected over or under"))?,
        };
        let flows = params.f64_list("flow")?;
        if flows.is_empty() {
            return Err(TsError::Validation(
                "EXCEEDANCE_TIME needs at least one FLOW threshold".into(),
            ));
        }
        let mut delays = params.f64_list("delay")?;
        if delays.is_empty() {
            delays = vec![0.0; flows.len()];
        }
        if delays.len() != flows.len() {
            return Err(TsError::Validation(format!(
                "EXCEEDANCE_TIME lists {} FLOW values but {} DELAY values",
                flows.len(),
                delays.len()
            )));
        }
        Ok(Self {
            source: params.entity("series_name")?,
            name: params.entity("new_e_table_name")?,
            units: TimeUnit::parse(params.text("exceedance_time_units")?)?,
            direction,
            thresholds: flows.into_iter().zip(delays).collect(),
        })
    }

    fn execute(self, session: &mut Session) -> TsResult<()> {
        let series = session.store.series(&self.source)?;
        let (Some(start), Some(end)) = (series.first_valid(), series.last_valid()) else {
            return Err(TsError::Validation(format!("series {} is empty", self.source)));
        };
        let unit = self.units.seconds();
        let total = (end - start).num_milliseconds() as f64 / 1000.0 / unit;
        let rows = self
            .thresholds
            .iter()
            .map(|&(threshold, delay)| {
                let seconds = exceedance_seconds(&series, threshold, delay * unit, self.direction);
                let duration = seconds / unit;
                ExceedanceRow {
                    threshold,
                    delay,
                    duration,
                    fraction: if total > 0.0 { duration / total } else { 0.0 },
                }
            })
            .collect();
        session.store.e_tables.insert(
            &self.name,
            ETable {
                rows,
                source_name: self.source.to_string(),
                units: self.units.as_str().to_string(),
                direction: self.direction,
            },
        )
    }
}

// ============================================================================
// HYDROLOGIC_INDICES
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct HydrologicIndices {
    pub source: EntityName,
    pub name: EntityName,
    pub names: Vec<String>,
    pub use_median: bool,
    pub current_definitions: bool,
    pub window: DateWindow,
}

impl BlockCommand for HydrologicIndices {
    fn from_params(params: &BlockParams, dates: &DateFormat) -> TsResult<Self> {
        let mut names: Vec<String> = Vec::new();
        let mut push = |found: Vec<String>| {
            for name in found {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        };
        for group in indices::GROUPS {
            let tokens: Vec<String> = params.tokens(group).into_iter().map(str::to_string).collect();
            if !tokens.is_empty() {
                push(indices::expand_group(group, &tokens)?);
            }
        }
        for component in params.tokens("flow_component") {
            let group = indices::component_group(component)?;
            push(indices::expand_group(group, &["all".to_string()])?);
        }
        for class in params.tokens("stream_classification") {
            indices::check_stream_class(class)?;
            push(indices::supported());
        }
        if names.is_empty() {
            return Err(TsError::Validation(
                "HYDROLOGIC_INDICES selects no index; give an index group, FLOW_COMPONENT or STREAM_CLASSIFICATION".into(),
            ));
        }
        if let Some(area) = params.opt_text("drainage_area") {
            debug!(area, "drainage area is not used by the built-in indices");
        }
        Ok(Self {
            source: params.entity("series_name")?,
            name: params.entity("new_g_table_name")?,
            names,
            use_median: params.flag("use_median")?,
            current_definitions: params.flag("current_definitions")?,
            window: params.window(dates)?,
        })
    }

    fn execute(self, session: &mut Session) -> TsResult<()> {
        let series = windowed(session, &self.source, &self.window)?;
        let values = indices::compute(&series, &self.names, self.use_median)?;
        if self.current_definitions {
            for (name, value) in &values {
                let text = indices::definition(name).unwrap_or_default();
                info!(index = %name, value, "{text}");
            }
        }
        let (Some(start), Some(end)) = (series.first_valid(), series.last_valid()) else {
            return Err(TsError::Validation(format!("series {} is empty", self.source)));
        };
        session.store.g_tables.insert(
            &self.name,
            GTable {
                rows: values
                    .into_iter()
                    .map(|(name, value)| (GKey::Label(name), value))
                    .collect(),
                source_name: self.source.to_string(),
                kind: GTableKind::HydrologicIndices,
                start,
                end,
            },
        )
    }
}

// ============================================================================
// VOLUME_CALCULATION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoDates {
    Year,
    Month,
    Day,
}

impl AutoDates {
    /// First period start at or after `ts`
    fn first_start(&self, ts: NaiveDateTime) -> Option<NaiveDateTime> {
        let date = ts.date();
        let floor = match self {
            AutoDates::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1)?,
            AutoDates::Month => NaiveDate::from_ymd_opt(date.year(), date.month(), 1)?,
            AutoDates::Day => date,
        }
        .and_hms_opt(0, 0, 0)?;
        if floor == ts {
            Some(floor)
        } else {
            self.next(floor)
        }
    }

    fn next(&self, start: NaiveDateTime) -> Option<NaiveDateTime> {
        match self {
            AutoDates::Year => start.checked_add_months(chrono::Months::new(12)),
            AutoDates::Month => start.checked_add_months(chrono::Months::new(1)),
            AutoDates::Day => start.checked_add_signed(Duration::days(1)),
        }
    }

    /// Periods whose start falls within `[first, last]`, each ending just
    /// before the next one starts
    pub fn periods(&self, first: NaiveDateTime, last: NaiveDateTime) -> Vec<(NaiveDateTime, NaiveDateTime)> {
        let mut out = Vec::new();
        let mut current = self.first_start(first);
        while let Some(start) = current.filter(|s| *s <= last) {
            let next = self.next(start);
            if let Some(next) = next {
                out.push((start, next - Duration::nanoseconds(1)));
            }
            current = next;
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum VolumeDates {
    File(String),
    Automatic(AutoDates),
}

#[derive(Debug, Clone, PartialEq)]
pub struct VolumeCalculation {
    pub source: EntityName,
    pub name: EntityName,
    pub dates: VolumeDates,
    pub flow_units: TimeUnit,
    pub factor: f64,
    pub date_format: DateFormat,
}

/// `date_1 time_1 date_2 time_2` per line; `#` starts a comment
fn read_date_file(text: &str, dates: &DateFormat) -> TsResult<Vec<(NaiveDateTime, NaiveDateTime)>> {
    let mut out = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.split('#').next().unwrap_or_default().trim();
        if line.is_empty() {
            continue;
        }
        let words: Vec<&str> = line.split_whitespace().collect();
        if words.len() < 4 {
            return Err(TsError::Validation(format!(
                "DATE_FILE line {}: expected date_1 time_1 date_2 time_2",
                idx + 1
            )));
        }
        let start = combine(words[0], Some(words[1]), dates)?;
        let end = combine(words[2], Some(words[3]), dates)?;
        if end < start {
            return Err(TsError::Validation(format!(
                "DATE_FILE line {}: period ends before it starts",
                idx + 1
            )));
        }
        out.push((start, end));
    }
    Ok(out)
}

/// Trapezoid integral of `series` over `[start, end]` in value-seconds, with
/// the end values interpolated
pub fn integrate(series: &TimeSeries, start: NaiveDateTime, end: NaiveDateTime) -> f64 {
    let edges = interpolate_at(series, &[start, end]);
    let mut points: Vec<(NaiveDateTime, f64)> = Vec::new();
    if let Some(v) = edges[0] {
        points.push((start, v));
    }
    points.extend(series.valid().filter(|(t, _)| *t > start && *t < end));
    if let Some(v) = edges[1] {
        points.push((end, v));
    }
    points
        .windows(2)
        .map(|w| {
            let dt = (w[1].0 - w[0].0).num_milliseconds() as f64 / 1000.0;
            (w[0].1 + w[1].1) / 2.0 * dt
        })
        .sum()
}

impl BlockCommand for VolumeCalculation {
    fn from_params(params: &BlockParams, dates: &DateFormat) -> TsResult<Self> {
        let volume_dates = match (params.opt_text("date_file"), params.opt_text("automatic_dates")) {
            (Some(file), None) => VolumeDates::File(file.to_string()),
            (None, Some(_)) => {
                let auto = match params.choice("automatic_dates", &["year", "month", "day"])?.as_str() {
                    "year" => AutoDates::Year,
                    "month" => AutoDates::Month,
                    _ => AutoDates::Day,
                };
                VolumeDates::Automatic(auto)
            }
            _ => {
                return Err(TsError::Validation(
                    "VOLUME_CALCULATION needs exactly one of DATE_FILE or AUTOMATIC_DATES".into(),
                ))
            }
        };
        Ok(Self {
            source: params.entity("series_name")?,
            name: params.entity("new_v_table_name")?,
            dates: volume_dates,
            flow_units: TimeUnit::parse(params.text("flow_time_units")?)?,
            factor: params.opt_f64("factor")?.unwrap_or(1.0),
            date_format: dates.clone(),
        })
    }

    fn execute(self, session: &mut Session) -> TsResult<()> {
        let series = session.store.series(&self.source)?.dropna();
        let (Some(first), Some(last)) = (series.first_valid(), series.last_valid()) else {
            return Err(TsError::Validation(format!("series {} is empty", self.source)));
        };
        let periods = match &self.dates {
            VolumeDates::File(file) => {
                let path = session.resolve_path(file);
                read_date_file(&read_text(&path)?, &self.date_format)?
            }
            VolumeDates::Automatic(auto) => auto.periods(first, last),
        };
        if periods.is_empty() {
            return Err(TsError::Validation(format!(
                "no volume periods fall within series {}",
                self.source
            )));
        }
        let unit = self.flow_units.seconds();
        let rows = periods
            .into_iter()
            .map(|(start, end)| VolumeRow {
                start,
                end,
                volume: integrate(&series, start, end) / unit * self.factor,
            })
            .collect();
        session.store.v_tables.insert(
            &self.name,
            VTable {
                rows,
                source_name: self.source.to_string(),
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

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn daily_session(name: &str, start: NaiveDateTime, values: &[f64]) -> Session {
        let mut session = Session::new(".");
        let points = values
            .iter()
            .enumerate()
            .map(|(i, v)| (start + Duration::days(i as i64), *v))
            .collect();
        session
            .store
            .join_series(&name.into(), TimeSeries::from_values(points).unwrap())
            .unwrap();
        session
    }

    fn run<C: BlockCommand>(session: &mut Session, p: &BlockParams) -> TsResult<()> {
        C::from_params(p, &DateFormat::default())?.execute(session)
    }

    #[test]
    fn test_baseflow_separation_stays_below_flow() {
        let mut session = daily_session("Q", at(2020, 1, 1), &[10.0, 40.0, 25.0, 12.0, 11.0]);
        let p = params(
            "DIGITAL_FILTER",
            &[
                ("series_name", "q"),
                ("new_series_name", "base"),
                ("filter_type", "baseflow_separation"),
                ("clip_input", "yes"),
            ],
        );
        run::<DigitalFilter>(&mut session, &p).unwrap();
        let base = session.store.series(&"BASE".into()).unwrap();
        let flow = session.store.series(&"Q".into()).unwrap();
        assert_eq!(base.len(), flow.len());
        assert!(base
            .valid_values()
            .iter()
            .zip(flow.valid_values())
            .all(|(b, q)| *b <= q));
    }

    #[test]
    fn test_butterworth_needs_cutoff() {
        let p = params(
            "DIGITAL_FILTER",
            &[
                ("series_name", "q"),
                ("new_series_name", "f"),
                ("filter_type", "butterworth"),
                ("filter_pass", "low"),
            ],
        );
        assert!(DigitalFilter::from_params(&p, &DateFormat::default()).is_err());
    }

    #[test]
    fn test_peaks_keep_only_maxima() {
        let mut session = daily_session("Q", at(2020, 1, 1), &[1.0, 5.0, 2.0, 1.0, 7.0, 3.0]);
        let p = params(
            "HYDRO_PEAKS",
            &[("series_name", "q"), ("new_series_name", "pk"), ("window", "1")],
        );
        run::<HydroPeaks>(&mut session, &p).unwrap();
        let peaks = session.store.series(&"PK".into()).unwrap();
        assert_eq!(peaks.valid_values(), vec![5.0, 7.0]);
    }

    #[test]
    fn test_flow_duration_table_keys() {
        let values: Vec<f64> = (1..=101).map(f64::from).collect();
        let mut session = daily_session("Q", at(2020, 1, 1), &values);
        let p = BlockParams::from_pairs(
            "FLOW_DURATION",
            1,
            [
                ("series_name", ParamValue::scalar("q")),
                ("new_g_table_name", ParamValue::scalar("fd")),
                (
                    "exceedance_probabilities",
                    ParamValue::List(vec!["50".into(), "10".into()]),
                ),
            ],
        );
        run::<FlowDuration>(&mut session, &p).unwrap();
        let table = session.store.g_tables.get(&"FD".into()).unwrap();
        assert_eq!(table.rows[0].0, GKey::Probability(0.5));
        assert!((table.rows[1].1 - 91.0).abs() < 1e-9);
        assert_eq!(table.kind, GTableKind::FlowDuration);
    }

    #[test]
    fn test_exceedance_delays_default_to_zero() {
        let p = BlockParams::from_pairs(
            "EXCEEDANCE_TIME",
            1,
            [
                ("series_name", ParamValue::scalar("q")),
                ("new_e_table_name", ParamValue::scalar("et")),
                ("exceedance_time_units", ParamValue::scalar("days")),
                ("flow", ParamValue::List(vec!["1".into(), "2".into()])),
            ],
        );
        let cmd = ExceedanceTime::from_params(&p, &DateFormat::default()).unwrap();
        assert_eq!(cmd.thresholds, vec![(1.0, 0.0), (2.0, 0.0)]);
        assert_eq!(cmd.direction, Direction::Over);
    }

    #[test]
    fn test_exceedance_duration_in_days() {
        let mut session = daily_session("Q", at(2020, 1, 1), &[0.0, 10.0, 10.0, 0.0, 0.0]);
        let p = params(
            "EXCEEDANCE_TIME",
            &[
                ("series_name", "q"),
                ("new_e_table_name", "et"),
                ("exceedance_time_units", "days"),
                ("flow", "5"),
            ],
        );
        run::<ExceedanceTime>(&mut session, &p).unwrap();
        let table = session.store.e_tables.get(&"ET".into()).unwrap();
        assert!((table.rows[0].duration - 2.0).abs() < 1e-9);
        assert!((table.rows[0].fraction - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_monthly_volumes() {
        // constant 1 unit per day over January and February
        let mut session = daily_session("Q", at(2021, 1, 1), &[1.0; 59]);
        let p = params(
            "VOLUME_CALCULATION",
            &[
                ("series_name", "q"),
                ("new_v_table_name", "vol"),
                ("flow_time_units", "days"),
                ("automatic_dates", "month"),
            ],
        );
        run::<VolumeCalculation>(&mut session, &p).unwrap();
        let table = session.store.v_tables.get(&"VOL".into()).unwrap();
        assert_eq!(table.rows.len(), 2);
        assert!((table.rows[0].volume - 31.0).abs() < 1e-6);
        assert_eq!(table.rows[1].start, at(2021, 2, 1));
    }

    #[test]
    fn test_volume_needs_one_date_source() {
        let p = params(
            "VOLUME_CALCULATION",
            &[
                ("series_name", "q"),
                ("new_v_table_name", "vol"),
                ("flow_time_units", "days"),
            ],
        );
        assert!(matches!(
            VolumeCalculation::from_params(&p, &DateFormat::default()),
            Err(TsError::Validation(_))
        ));
    }

    #[test]
    fn test_indices_selection_dedupes() {
        let p = params(
            "HYDROLOGIC_INDICES",
            &[
                ("series_name", "q"),
                ("new_g_table_name", "hi"),
                ("ma", "1"),
                ("flow_component", "average_magnitude"),
            ],
        );
        let cmd = HydrologicIndices::from_params(&p, &DateFormat::default()).unwrap();
        assert_eq!(cmd.names[0], "MA1");
        assert_eq!(cmd.names.iter().filter(|n| *n == "MA1").count(), 1);
    }
}
