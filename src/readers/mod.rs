//! Data file readers
//!
//! Every text reader turns a file into a [`SeriesTable`]: labeled columns of
//! time series sharing the file's timestamps. The GET_SERIES_* handlers pick
//! columns out of it by label. Binary formats (WDM, HSPF binary, XLSX,
//! TETRAD, SWMM) go through the [`BinarySeriesReader`] seam instead.

pub mod csv;
pub mod gsflow;
pub mod plotgen;
pub mod ssf;
pub mod statvar;
pub mod ufore;

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use indexmap::IndexMap;
use serde::Serialize;

use crate::datetime::DateWindow;
use crate::error::{TsError, TsResult};
use crate::store::TimeSeries;

/// Labeled columns read from one file, in file order
pub type SeriesTable = IndexMap<String, TimeSeries>;

pub(crate) fn read_text(path: &Path) -> TsResult<String> {
    std::fs::read_to_string(path).map_err(|e| TsError::io(path, e))
}

/// Column `label` (case-insensitive), restricted to `window`. A missing label
/// is a reader error listing what the file does contain.
pub fn pick(
    table: &SeriesTable,
    label: &str,
    window: &DateWindow,
    path: &Path,
) -> TsResult<TimeSeries> {
    table
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(label))
        .map(|(_, series)| series.window(window))
        .ok_or_else(|| {
            let available: Vec<&str> = table.keys().map(String::as_str).collect();
            TsError::reader(
                path,
                format!(
                    "the time-series \"{label}\" is not available; the available time-series are {}",
                    available.join(", ")
                ),
            )
        })
}

/// Parse one numeric field of a data file
pub(crate) fn number(path: &Path, line: usize, token: &str) -> TsResult<f64> {
    token.trim().parse::<f64>().map_err(|_| {
        TsError::reader(path, format!("line {line}: '{token}' is not a number"))
    })
}

/// Build columns from row-major data
pub(crate) fn columns_from_rows(
    labels: &[String],
    rows: Vec<(NaiveDateTime, Vec<Option<f64>>)>,
    path: &Path,
) -> TsResult<SeriesTable> {
    let mut table = SeriesTable::new();
    for (col, label) in labels.iter().enumerate() {
        let points = rows
            .iter()
            .map(|(t, values)| (*t, values.get(col).copied().flatten()))
            .collect();
        let series = TimeSeries::from_points(points)
            .map_err(|e| TsError::reader(path, format!("column {label}: {e}")))?;
        table.insert(label.clone(), series);
    }
    Ok(table)
}

// ============================================================================
// BINARY FORMATS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinaryFormat {
    Wdm,
    HspfBin,
    Xlsx,
    Tetrad,
    SwmmBin,
}

impl BinaryFormat {
    pub fn command(&self) -> &'static str {
        match self {
            BinaryFormat::Wdm => "GET_SERIES_WDM",
            BinaryFormat::HspfBin => "GET_SERIES_HSPFBIN",
            BinaryFormat::Xlsx => "GET_SERIES_XLSX",
            BinaryFormat::Tetrad => "GET_SERIES_TETRAD",
            BinaryFormat::SwmmBin => "GET_SERIES_SWMMBIN",
        }
    }
}

impl fmt::Display for BinaryFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.command())
    }
}

/// One binary read: the file plus the format-specific selector keywords
/// (`dsn`, `sheet`, `operationtype`, ...) as written in the block
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinaryRequest {
    pub format: BinaryFormat,
    pub path: Option<PathBuf>,
    pub selectors: IndexMap<String, String>,
    pub window: DateWindow,
}

/// Source of series stored in binary model files
pub trait BinarySeriesReader {
    fn read(&self, request: &BinaryRequest) -> TsResult<TimeSeries>;
}

/// Reader used when no binary backend is linked in
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedBinaryReader;

impl BinarySeriesReader for UnsupportedBinaryReader {
    fn read(&self, request: &BinaryRequest) -> TsResult<TimeSeries> {
        Err(TsError::Unsupported(format!(
            "{} needs a binary reader, none is configured",
            request.format
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_pick_lists_available_columns() {
        let t = NaiveDate::from_ymd_opt(2020, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let mut table = SeriesTable::new();
        table.insert(
            "Flow".to_string(),
            TimeSeries::from_values(vec![(t, 1.0)]).unwrap(),
        );
        let path = Path::new("x.csv");
        assert!(pick(&table, "FLOW", &DateWindow::default(), path).is_ok());
        let err = pick(&table, "stage", &DateWindow::default(), path).unwrap_err();
        assert!(err.to_string().contains("available time-series are Flow"));
    }

    #[test]
    fn test_unsupported_binary_reader() {
        let request = BinaryRequest {
            format: BinaryFormat::Wdm,
            path: Some(PathBuf::from("a.wdm")),
            selectors: IndexMap::new(),
            window: DateWindow::default(),
        };
        assert!(matches!(
            UnsupportedBinaryReader.read(&request),
            Err(TsError::Unsupported(_))
        ));
    }
}
