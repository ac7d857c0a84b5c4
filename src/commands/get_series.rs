//! GET_SERIES_* (and the deprecated GET_MUL_SERIES_* aliases)
//!
//! Text formats are read here through `readers`; binary model files are
//! handed to the session's [`BinarySeriesReader`](crate::readers::BinarySeriesReader).
//! Multi-series readers take parallel lists: the n-th label is stored under
//! the n-th new series name.

use chrono::{Duration, NaiveDateTime};
use indexmap::IndexMap;
use tracing::info;

use crate::datetime::{parse_duration, DateFormat, DateWindow};
use crate::engine::params::BlockParams;
use crate::error::{TsError, TsResult};
use crate::readers::{self, BinaryFormat, BinaryRequest, SeriesTable};
use crate::store::EntityName;

use super::{BlockCommand, Session};

#[derive(Debug, Clone, PartialEq)]
pub enum TextFormat {
    Csv { usecol: Option<String> },
    Ssf,
    Plotgen,
    Statvar,
    GsflowGage {
        reference: NaiveDateTime,
        units_per_day: u32,
    },
    UforeHydro {
        start: NaiveDateTime,
        step: Duration,
    },
}

/// Read labeled columns from a text data file
#[derive(Debug, Clone, PartialEq)]
pub struct GetSeries {
    pub format: TextFormat,
    pub file: String,
    /// `(column label, new series name)`
    pub picks: Vec<(String, EntityName)>,
    pub window: DateWindow,
    pub dates: DateFormat,
}

/// Pair two parallel keyword lists
fn parallel(params: &BlockParams, labels: Vec<String>, names_key: &str) -> TsResult<Vec<(String, EntityName)>> {
    let names = params.entities(names_key);
    if labels.len() != names.len() {
        return Err(TsError::Validation(format!(
            "{} lists {} source labels but {} {} values",
            params.command(),
            labels.len(),
            names.len(),
            names_key.to_uppercase()
        )));
    }
    Ok(labels.into_iter().zip(names).collect())
}

fn owned(tokens: Vec<&str>) -> Vec<String> {
    tokens.into_iter().map(str::to_string).collect()
}

/// Format name with the GET_SERIES_/GET_MUL_SERIES_ prefix removed
fn format_suffix(command: &str) -> &str {
    command
        .strip_prefix("GET_MUL_SERIES_")
        .or_else(|| command.strip_prefix("GET_SERIES_"))
        .unwrap_or(command)
}

impl BlockCommand for GetSeries {
    fn from_params(params: &BlockParams, dates: &DateFormat) -> TsResult<Self> {
        let window = params.window(dates)?;
        let (format, picks) = match format_suffix(params.command()) {
            "CSV" => (
                TextFormat::Csv {
                    usecol: params.opt_text("usecol").map(str::to_string),
                },
                vec![(String::new(), params.entity("new_series_name")?)],
            ),
            "SSF" => (TextFormat::Ssf, parallel(params, owned(params.tokens("site")), "new_series_name")?),
            "PLOTGEN" => (
                TextFormat::Plotgen,
                parallel(params, params.entries("label").iter().map(|s| s.to_string()).collect(), "new_series_name")?,
            ),
            "STATVAR" => {
                let variables = params.tokens("variable_name");
                let locations = params.tokens("location_id");
                if variables.len() != locations.len() {
                    return Err(TsError::Validation(format!(
                        "{} lists {} VARIABLE_NAME values but {} LOCATION_ID values",
                        params.command(),
                        variables.len(),
                        locations.len()
                    )));
                }
                let labels = variables
                    .iter()
                    .zip(&locations)
                    .map(|(v, l)| format!("{v}_{l}"))
                    .collect();
                (TextFormat::Statvar, parallel(params, labels, "new_series_name")?)
            }
            "GSFLOW_GAGE" => {
                let units_per_day: u32 = params.parse("time_units_per_day")?;
                if units_per_day == 0 {
                    return Err(TsError::invalid(
                        "time_units_per_day",
                        "0",
                        "must be greater than zero",
                    ));
                }
                (
                    TextFormat::GsflowGage {
                        reference: params.timestamp(
                            "model_reference_date",
                            "model_reference_time",
                            dates,
                        )?,
                        units_per_day,
                    },
                    parallel(
                        params,
                        params.tokens("data_type").iter().map(|t| t.to_uppercase()).collect(),
                        "new_series_name",
                    )?,
                )
            }
            "UFORE_HYDRO" => (
                TextFormat::UforeHydro {
                    start: params.timestamp("model_reference_date", "model_reference_time", dates)?,
                    step: parse_duration(params.text("time_increment")?)?,
                },
                vec![(String::new(), params.entity("new_series_name")?)],
            ),
            other => {
                return Err(TsError::Unsupported(format!(
                    "no text reader for GET_SERIES_{other}"
                )))
            }
        };
        Ok(Self {
            format,
            file: params.text("file")?.to_string(),
            picks,
            window,
            dates: dates.clone(),
        })
    }

    fn execute(self, session: &mut Session) -> TsResult<()> {
        let path = session.resolve_path(&self.file);
        info!(file = %path.display(), series = self.picks.len(), "reading series");
        let table: SeriesTable = match &self.format {
            TextFormat::Csv { .. } => readers::csv::read(&path, &self.dates)?,
            TextFormat::Ssf => readers::ssf::read(&path, &self.dates)?,
            TextFormat::Plotgen => readers::plotgen::read(&path)?,
            TextFormat::Statvar => readers::statvar::read(&path)?,
            TextFormat::GsflowGage {
                reference,
                units_per_day,
            } => readers::gsflow::read(&path, *reference, *units_per_day)?,
            TextFormat::UforeHydro { start, step } => {
                let series = readers::ufore::read(&path, *start, *step)?;
                let (_, name) = &self.picks[0];
                return session.store.join_series(name, series.window(&self.window));
            }
        };
        for (label, name) in &self.picks {
            let label = match &self.format {
                TextFormat::Csv { usecol } => {
                    readers::csv::column_label(&table, usecol.as_deref(), &path)?
                }
                _ => label.clone(),
            };
            let series = readers::pick(&table, &label, &self.window, &path)?;
            session.store.join_series(name, series)?;
        }
        Ok(())
    }
}

/// Read one series through the binary reader seam
#[derive(Debug, Clone, PartialEq)]
pub struct GetBinarySeries {
    pub file: Option<String>,
    pub new_series_name: EntityName,
    pub request: BinaryRequest,
}

const NOT_SELECTORS: [&str; 7] = [
    "file",
    "new_series_name",
    "series_name",
    "date_1",
    "time_1",
    "date_2",
    "time_2",
];

impl BlockCommand for GetBinarySeries {
    fn from_params(params: &BlockParams, dates: &DateFormat) -> TsResult<Self> {
        let format = match format_suffix(params.command()) {
            "WDM" => BinaryFormat::Wdm,
            "HSPFBIN" => BinaryFormat::HspfBin,
            "XLSX" => BinaryFormat::Xlsx,
            "TETRAD" => BinaryFormat::Tetrad,
            "SWMMBIN" => BinaryFormat::SwmmBin,
            other => {
                return Err(TsError::Unsupported(format!(
                    "no binary reader for GET_SERIES_{other}"
                )))
            }
        };
        let new_series_name = params
            .opt_entity("new_series_name")
            .or_else(|| params.opt_entity("series_name"))
            .ok_or_else(|| TsError::MissingArgument {
                command: params.command().to_string(),
                line: params.line(),
                missing: vec!["NEW_SERIES_NAME".to_string()],
            })?;
        let selectors: IndexMap<String, String> = params
            .values()
            .iter()
            .filter(|(k, _)| !NOT_SELECTORS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.joined(" ")))
            .collect();
        Ok(Self {
            file: params.opt_text("file").map(str::to_string),
            new_series_name,
            request: BinaryRequest {
                format,
                path: None,
                selectors,
                window: params.window(dates)?,
            },
        })
    }

    fn execute(mut self, session: &mut Session) -> TsResult<()> {
        self.request.path = self.file.as_deref().map(|f| session.resolve_path(f));
        info!(format = %self.request.format, series = %self.new_series_name, "reading binary series");
        let series = session.binary.read(&self.request)?;
        session
            .store
            .join_series(&self.new_series_name, series.window(&self.request.window))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::readers::BinarySeriesReader;
    use crate::store::TimeSeries;
    use chrono::NaiveDate;
    use ts_types::ParamValue;

    fn params(command: &str, pairs: &[(&str, &str)]) -> BlockParams {
        BlockParams::from_pairs(
            command,
            7,
            pairs.iter().map(|(k, v)| (*k, ParamValue::scalar(*v))),
        )
    }

    #[test]
    fn test_csv_reads_usecol_in_window() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("flow.csv"),
            "date,a,b\n2020-01-01,1,10\n2020-01-02,2,20\n2020-01-03,3,30\n",
        )
        .unwrap();
        let p = params(
            "GET_SERIES_CSV",
            &[
                ("file", "flow.csv"),
                ("new_series_name", "b_flow"),
                ("usecol", "2"),
                ("date_1", "2020-01-02"),
            ],
        );
        let mut session = Session::new(dir.path());
        GetSeries::from_params(&p, &DateFormat::default())
            .unwrap()
            .execute(&mut session)
            .unwrap();
        let series = session.store.series(&"B_FLOW".into()).unwrap();
        assert_eq!(series.valid_values(), vec![20.0, 30.0]);
    }

    #[test]
    fn test_parallel_lists_must_match() {
        let p = BlockParams::from_pairs(
            "GET_MUL_SERIES_SSF",
            2,
            [
                ("file", ParamValue::scalar("s.ssf")),
                ("site", ParamValue::List(vec!["A".into(), "B".into()])),
                ("new_series_name", ParamValue::scalar("ONLY")),
            ],
        );
        assert!(matches!(
            GetSeries::from_params(&p, &DateFormat::default()),
            Err(TsError::Validation(_))
        ));
    }

    struct Fixed;

    impl BinarySeriesReader for Fixed {
        fn read(&self, request: &BinaryRequest) -> TsResult<TimeSeries> {
            assert_eq!(request.selectors.get("dsn").map(String::as_str), Some("101"));
            assert!(request.path.as_ref().is_some_and(|p| p.ends_with("model.wdm")));
            let t = NaiveDate::from_ymd_opt(2021, 5, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap();
            TimeSeries::from_values(vec![(t, 4.5)])
        }
    }

    #[test]
    fn test_binary_request_goes_through_reader() {
        let p = params(
            "GET_SERIES_WDM",
            &[("file", "model.wdm"), ("new_series_name", "q"), ("dsn", "101")],
        );
        let cmd = GetBinarySeries::from_params(&p, &DateFormat::default()).unwrap();
        assert!(!cmd.request.selectors.contains_key("file"));
        let mut session = Session::new("/data").with_binary_reader(Box::new(Fixed));
        cmd.execute(&mut session).unwrap();
        assert!(session.store.has_series(&"Q".into()));

        let mut plain = Session::new("/data");
        let err = GetBinarySeries::from_params(&p, &DateFormat::default())
            .unwrap()
            .execute(&mut plain)
            .unwrap_err();
        assert!(matches!(err, TsError::Unsupported(_)));
    }
}
