//! LIST_OUTPUT
//!
//! Renders named entities into a fixed-column report. The report is first
//! laid out as a [`Listing`]: every line of text plus, for lines that carry
//! an observation value, the observation name and its column span. The
//! report file and the PEST instruction file written later by
//! WRITE_PEST_FILES are both produced from that one layout.
//!
//! ## Guidelines
//!
//! 1. Sections appear in a fixed order: series, s_tables, c_tables,
//!    v_tables, e_tables, g_tables
//! 2. Observation names are the lowercased entity name followed by the
//!    1-based row number
//! 3. Column spans come from the record writer, never from hand counting

use std::path::PathBuf;
use std::sync::LazyLock;

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::info;
use ts_types::EntityKind;

use crate::datetime::DateFormat;
use crate::engine::params::BlockParams;
use crate::error::{TsError, TsResult};
use crate::format::{Field, Record, RecordFormat};
use crate::store::{EntityName, EntityStore, GKey, GTable, GTableKind};

use super::{BlockCommand, Session};

// ============================================================================
// RECORD FORMATS
// ============================================================================

struct Formats {
    table_row: RecordFormat,
    series_long: RecordFormat,
    series_short: RecordFormat,
    series_ssf: RecordFormat,
    v_table_row: RecordFormat,
    e_table_header: RecordFormat,
    e_table_row: RecordFormat,
    g_table_header: RecordFormat,
    g_table_row: RecordFormat,
}

fn format(spec: &str) -> RecordFormat {
    RecordFormat::parse(spec).expect("static record format")
}

static FORMATS: LazyLock<Formats> = LazyLock::new(|| Formats {
    table_row: format("(t5, a, t55, 1PG14.7)"),
    series_long: format("(1x, a, t20, a10, 3x, a8, 3x, g16.9)"),
    series_short: format("(4x, g16.9)"),
    series_ssf: format("(1x, a, t20, a10, 3x, a8, 3x, g16.9)"),
    v_table_row: format("(t5, 'From ', a10, ' ', a8, ' to ', a10, ' ', a8, '  volume = ', G18.12)"),
    e_table_header: format(
        "(t4, 'Flow', t19, 'Time delay (', a, ')', t40, 'Time ', a, ' (', a, ')', t60, 'Fraction of time ', a, ' threshold')",
    ),
    e_table_row: format("(t2, g14.7, t20, g14.7, t40, g14.7, t63, g14.7)"),
    g_table_header: format("(t4, a, ' for ', a, ' ', a, ':', a, t85, 'Value')"),
    g_table_row: format("(t4, a, t82, g14.7)"),
});

// ============================================================================
// LAYOUT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesFormat {
    Long,
    Short,
    Ssf,
}

/// Observation carried by one report line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    pub name: String,
    /// 1-based inclusive column range of the value
    pub columns: (usize, usize),
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportLine {
    pub text: String,
    pub observation: Option<Observation>,
}

impl ReportLine {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            observation: None,
        }
    }
}

/// Observation names produced for one listed entity, in report order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListedEntity {
    pub kind: EntityKind,
    pub name: EntityName,
    pub observations: Vec<String>,
}

/// What LIST_OUTPUT wrote, kept on the session for WRITE_PEST_FILES
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Listing {
    pub file: PathBuf,
    pub lines: Vec<ReportLine>,
    pub entities: Vec<ListedEntity>,
}

impl Listing {
    pub fn report(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(line.text.trim_end());
            out.push('\n');
        }
        out
    }

    /// PEST instruction file reading every observation of the report
    pub fn instructions(&self) -> String {
        let mut out = String::from("pif $\n");
        let mut last = 0;
        for (idx, line) in self.lines.iter().enumerate() {
            if let Some(obs) = &line.observation {
                let line_no = idx + 1;
                out.push_str(&format!(
                    "l{} [{}]{}:{}\n",
                    line_no - last,
                    obs.name,
                    obs.columns.0,
                    obs.columns.1
                ));
                last = line_no;
            }
        }
        out
    }

    pub fn observations_of(&self, kind: EntityKind, name: &EntityName) -> Option<&[String]> {
        self.entities
            .iter()
            .find(|e| e.kind == kind && e.name == *name)
            .map(|e| e.observations.as_slice())
    }

    pub fn observation_count(&self) -> usize {
        self.entities.iter().map(|e| e.observations.len()).sum()
    }
}

/// Builds a [`Listing`] one section at a time
struct LayoutBuilder<'a> {
    dates: &'a DateFormat,
    lines: Vec<ReportLine>,
    entities: Vec<ListedEntity>,
}

impl<'a> LayoutBuilder<'a> {
    fn new(dates: &'a DateFormat) -> Self {
        Self {
            dates,
            lines: Vec::new(),
            entities: Vec::new(),
        }
    }

    fn heading(&mut self, kind: &str, name: &EntityName) {
        self.lines.push(ReportLine::text(""));
        self.lines
            .push(ReportLine::text(format!(" {kind} \"{}\" ---->", name.lower())));
    }

    fn text(&mut self, text: impl Into<String>) {
        self.lines.push(ReportLine::text(text));
    }

    fn date(&self, ts: &NaiveDateTime) -> String {
        self.dates.format_date(ts)
    }

    fn begin(&mut self, kind: EntityKind, name: &EntityName) {
        self.entities.push(ListedEntity {
            kind,
            name: name.clone(),
            observations: Vec::new(),
        });
    }

    /// Push a record whose field `value_field` is an observation
    fn observed(&mut self, record: Record, value_field: usize, value: f64) -> TsResult<()> {
        let entity = self
            .entities
            .last_mut()
            .ok_or_else(|| TsError::Validation("observation outside an entity section".into()))?;
        let columns = record.spans.get(value_field).copied().ok_or_else(|| {
            TsError::Validation(format!("report record for {} has no value column", entity.name))
        })?;
        let name = format!("{}{}", entity.name.lower(), entity.observations.len() + 1);
        entity.observations.push(name.clone());
        self.lines.push(ReportLine {
            text: record.text,
            observation: Some(Observation {
                name,
                columns,
                value,
            }),
        });
        Ok(())
    }

    fn series(&mut self, store: &EntityStore, name: &EntityName, format: SeriesFormat) -> TsResult<()> {
        let series = store.series(name)?;
        let daily = series.frequency().is_daily();
        self.heading("TIME_SERIES", name);
        self.begin(EntityKind::Series, name);
        for (ts, value) in series.valid() {
            let time = if daily {
                "12:00:00".to_string()
            } else {
                ts.format("%H:%M:%S").to_string()
            };
            let (record, field) = match format {
                SeriesFormat::Long => (
                    FORMATS.series_long.write(&[
                        Field::from(name.lower()),
                        Field::from(self.date(&ts)),
                        Field::from(time),
                        Field::from(value),
                    ])?,
                    3,
                ),
                SeriesFormat::Short => (FORMATS.series_short.write(&[Field::from(value)])?, 0),
                SeriesFormat::Ssf => (
                    FORMATS.series_ssf.write(&[
                        Field::from(name.as_str()),
                        Field::from(self.date(&ts)),
                        Field::from(time),
                        Field::from(value),
                    ])?,
                    3,
                ),
            };
            self.observed(record, field, value)?;
        }
        Ok(())
    }

    fn s_table(&mut self, store: &EntityStore, name: &EntityName) -> TsResult<()> {
        let table = store.s_tables.get(name)?;
        self.heading("S_TABLE", name);
        self.text(format!(
            "     Series for which data calculated:                 \"{}\"",
            table.source_name.to_lowercase()
        ));
        self.text(format!(
            "     Starting date for data accumulation:              {}",
            self.date(&table.start)
        ));
        self.text(format!(
            "     Ending date for data accumulation:                {}",
            self.date(&table.end)
        ));
        self.text(format!(
            "     Logarithmic transformation of series?             {}",
            if table.log_transformed { "yes" } else { "no" }
        ));
        self.text(format!(
            "     Exponent in power transformation:                 {}",
            table.exponent
        ));
        self.begin(EntityKind::STable, name);
        for (label, value) in &table.stats {
            let record = FORMATS
                .table_row
                .write(&[Field::from(label.as_str()), Field::from(*value)])?;
            self.observed(record, 1, *value)?;
        }
        Ok(())
    }

    fn c_table(&mut self, store: &EntityStore, name: &EntityName) -> TsResult<()> {
        let table = store.c_tables.get(name)?;
        self.heading("C_TABLE", name);
        self.text(format!(
            "    Observation time series name:                     \"{}\"",
            table.obs_name.to_lowercase()
        ));
        self.text(format!(
            "    Simulation time series name:                      \"{}\"",
            table.sim_name.to_lowercase()
        ));
        self.text(format!(
            "    Beginning date of series comparison:              {}",
            self.date(&table.start)
        ));
        self.text(format!(
            "    Beginning time of series comparison:              {}",
            table.start.format("%H:%M:%S")
        ));
        self.text(format!(
            "    Finishing date of series comparison:              {}",
            self.date(&table.end)
        ));
        self.text(format!(
            "    Finishing time of series comparison:              {}",
            table.end.format("%H:%M:%S")
        ));
        self.text(format!(
            "    Number of series terms in this interval:          {}",
            table.num_terms
        ));
        self.begin(EntityKind::CTable, name);
        for (label, value) in &table.stats {
            let record = FORMATS
                .table_row
                .write(&[Field::from(label.as_str()), Field::from(*value)])?;
            self.observed(record, 1, *value)?;
        }
        Ok(())
    }

    fn v_table(&mut self, store: &EntityStore, name: &EntityName) -> TsResult<()> {
        let table = store.v_tables.get(name)?;
        self.heading("V_TABLE", name);
        self.text(format!(
            "     Volumes calculated from series \"{}\" are as follows:-",
            table.source_name.to_lowercase()
        ));
        self.begin(EntityKind::VTable, name);
        for row in &table.rows {
            let record = FORMATS.v_table_row.write(&[
                Field::from(self.date(&row.start)),
                Field::from(row.start.format("%H:%M:%S").to_string()),
                Field::from(self.date(&row.end)),
                Field::from(row.end.format("%H:%M:%S").to_string()),
                Field::from(row.volume),
            ])?;
            self.observed(record, 4, row.volume)?;
        }
        Ok(())
    }

    fn e_table(&mut self, store: &EntityStore, name: &EntityName) -> TsResult<()> {
        let table = store.e_tables.get(name)?;
        let direction = table.direction.describe();
        self.heading("E_TABLE", name);
        let header = FORMATS.e_table_header.line(&[
            Field::from(table.units.as_str()),
            Field::from(direction),
            Field::from(table.units.as_str()),
            Field::from(direction),
        ])?;
        self.text(header);
        self.begin(EntityKind::ETable, name);
        for row in &table.rows {
            let record = FORMATS.e_table_row.write(&[
                Field::from(row.threshold),
                Field::from(row.delay),
                Field::from(row.duration),
                Field::from(row.fraction),
            ])?;
            self.observed(record, 2, row.duration)?;
        }
        Ok(())
    }

    fn g_table(&mut self, store: &EntityStore, name: &EntityName) -> TsResult<()> {
        let table = store.g_tables.get(name)?;
        self.heading("G_TABLE", name);
        let title = match table.kind {
            GTableKind::FlowDuration => "Flow duration curve",
            GTableKind::HydrologicIndices => "Hydrologic index",
        };
        let header = FORMATS.g_table_header.line(&[
            Field::from(title),
            Field::from(table.source_name.to_lowercase()),
            Field::from(table.start.format("%m/%d/%Y").to_string()),
            Field::from(table.end.format("%m/%d/%Y").to_string()),
        ])?;
        self.text(header);

        self.begin(EntityKind::GTable, name);
        for (key, value) in report_rows(table) {
            let label = match key {
                GKey::Probability(p) => format!("{:>6.2}% of flows exceed:", p * 100.0),
                GKey::Label(l) => format!("{l}:"),
            };
            let record = FORMATS
                .g_table_row
                .write(&[Field::from(label), Field::from(*value)])?;
            self.observed(record, 1, *value)?;
        }
        Ok(())
    }

    fn finish(self, file: PathBuf) -> Listing {
        Listing {
            file,
            lines: self.lines,
            entities: self.entities,
        }
    }
}

/// G_TABLE rows in report order
fn report_rows(table: &GTable) -> Vec<&(GKey, f64)> {
    let mut rows: Vec<&(GKey, f64)> = table.rows.iter().collect();
    match table.kind {
        // highest exceedance probability first
        GTableKind::FlowDuration => rows.sort_by(|a, b| probability(&b.0).total_cmp(&probability(&a.0))),
        GTableKind::HydrologicIndices => rows.sort_by_key(|(key, _)| natural_key(&key.label())),
    }
    rows
}

/// Values of an entity in the order LIST_OUTPUT reports them
pub fn report_values(store: &EntityStore, kind: EntityKind, name: &EntityName) -> TsResult<Vec<f64>> {
    Ok(match kind {
        EntityKind::Series => store.series(name)?.valid_values(),
        EntityKind::STable => store.s_tables.get(name)?.stats.values().copied().collect(),
        EntityKind::CTable => store.c_tables.get(name)?.stats.values().copied().collect(),
        EntityKind::VTable => store.v_tables.get(name)?.rows.iter().map(|r| r.volume).collect(),
        EntityKind::ETable => store.e_tables.get(name)?.rows.iter().map(|r| r.duration).collect(),
        EntityKind::GTable => report_rows(store.g_tables.get(name)?)
            .into_iter()
            .map(|(_, v)| *v)
            .collect(),
    })
}

fn probability(key: &GKey) -> f64 {
    match key {
        GKey::Probability(p) => *p,
        GKey::Label(_) => f64::NEG_INFINITY,
    }
}

/// `MA12` sorts after `MA2`
fn natural_key(label: &str) -> (String, u64) {
    let split = label
        .find(|c: char| c.is_ascii_digit())
        .unwrap_or(label.len());
    let (prefix, digits) = label.split_at(split);
    (prefix.to_uppercase(), digits.parse().unwrap_or(0))
}

// ============================================================================
// COMMAND
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ListOutput {
    pub file: String,
    pub series_format: Option<SeriesFormat>,
    /// Entity names per kind, in the order given
    pub entities: Vec<(EntityKind, Vec<EntityName>)>,
}

impl ListOutput {
    /// Lay out the report without writing anything
    pub fn layout(&self, session: &Session) -> TsResult<Listing> {
        let mut builder = LayoutBuilder::new(&session.date_format);
        for kind in [
            EntityKind::Series,
            EntityKind::STable,
            EntityKind::CTable,
            EntityKind::VTable,
            EntityKind::ETable,
            EntityKind::GTable,
        ] {
            let names = self
                .entities
                .iter()
                .filter(|(k, _)| *k == kind)
                .flat_map(|(_, names)| names);
            for name in names {
                let store = &session.store;
                match kind {
                    EntityKind::Series => {
                        let format = self.series_format.unwrap_or(SeriesFormat::Long);
                        builder.series(store, name, format)?
                    }
                    EntityKind::STable => builder.s_table(store, name)?,
                    EntityKind::CTable => builder.c_table(store, name)?,
                    EntityKind::VTable => builder.v_table(store, name)?,
                    EntityKind::ETable => builder.e_table(store, name)?,
                    EntityKind::GTable => builder.g_table(store, name)?,
                }
            }
        }
        Ok(builder.finish(session.resolve_path(&self.file)))
    }
}

impl BlockCommand for ListOutput {
    fn from_params(params: &BlockParams, _dates: &DateFormat) -> TsResult<Self> {
        let series_format = params
            .opt_choice("series_format", &["long", "short", "ssf"])?
            .map(|f| match f.as_str() {
                "short" => SeriesFormat::Short,
                "ssf" => SeriesFormat::Ssf,
                _ => SeriesFormat::Long,
            });
        let entities: Vec<(EntityKind, Vec<EntityName>)> = EntityKind::all()
            .into_iter()
            .map(|kind| (kind, params.entities(kind.name_keyword())))
            .filter(|(_, names)| !names.is_empty())
            .collect();
        if entities.is_empty() {
            return Err(TsError::Validation("LIST_OUTPUT names no entity to list".into()));
        }
        let lists_series = entities.iter().any(|(k, _)| *k == EntityKind::Series);
        if lists_series && series_format.is_none() {
            return Err(TsError::Validation(
                "SERIES_FORMAT (long, short or ssf) is required when listing series".into(),
            ));
        }
        Ok(Self {
            file: params.text("file")?.to_string(),
            series_format,
            entities,
        })
    }

    fn execute(self, session: &mut Session) -> TsResult<()> {
        let listing = self.layout(session)?;
        std::fs::write(&listing.file, listing.report()).map_err(|e| TsError::io(&listing.file, e))?;
        info!(
            file = %listing.file.display(),
            lines = listing.lines.len(),
            observations = listing.observation_count(),
            "wrote listing"
        );
        session.last_listing = Some(listing);
        Ok(())
    }
}
