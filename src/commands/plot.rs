//! PLOT
//!
//! Collects the windowed series and the figure options into a
//! [`PlotRequest`] and hands it to the session's [`Plotter`]. No rendering
//! backend ships with the crate; the default plotter reports `Unsupported`.

use std::path::PathBuf;

use serde::Serialize;
use tracing::info;

use crate::datetime::{DateFormat, DateWindow};
use crate::engine::params::BlockParams;
use crate::error::{TsError, TsResult};
use crate::store::{EntityName, TimeSeries};

use super::{BlockCommand, Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlotKind {
    Line,
    Area,
    Bar,
    Barh,
    Hist,
    Kde,
    Density,
    Box,
}

impl PlotKind {
    const CHOICES: [&'static str; 8] = ["line", "area", "bar", "barh", "hist", "kde", "density", "box"];

    fn from_choice(choice: &str) -> PlotKind {
        match choice {
            "area" => PlotKind::Area,
            "bar" => PlotKind::Bar,
            "barh" => PlotKind::Barh,
            "hist" => PlotKind::Hist,
            "kde" => PlotKind::Kde,
            "density" => PlotKind::Density,
            "box" => PlotKind::Box,
            _ => PlotKind::Line,
        }
    }
}

/// Figure options as given in the block
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotOptions {
    pub kind: PlotKind,
    pub title: String,
    pub xlabel: String,
    pub ylabel: String,
    /// Inches
    pub figsize: (f64, f64),
    pub legend: bool,
    pub legend_names: Vec<String>,
    pub style: Vec<String>,
    pub logx: bool,
    pub logy: bool,
    pub xlim: (Option<f64>, Option<f64>),
    pub ylim: (Option<f64>, Option<f64>),
    pub secondary_y: Vec<EntityName>,
    pub mark_right: bool,
    pub grid: bool,
}

/// Everything a plotting backend needs for one figure
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotRequest {
    pub file: PathBuf,
    pub series: Vec<(EntityName, TimeSeries)>,
    pub options: PlotOptions,
}

/// Renders a figure to `request.file`
pub trait Plotter {
    fn plot(&self, request: &PlotRequest) -> TsResult<()>;
}

/// Plotter used when no rendering backend is linked in
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedPlotter;

impl Plotter for UnsupportedPlotter {
    fn plot(&self, request: &PlotRequest) -> TsResult<()> {
        Err(TsError::Unsupported(format!(
            "PLOT to {} needs a plotting backend, none is configured",
            request.file.display()
        )))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Plot {
    pub series: Vec<EntityName>,
    pub file: String,
    pub window: DateWindow,
    pub options: PlotOptions,
}

impl BlockCommand for Plot {
    fn from_params(params: &BlockParams, dates: &DateFormat) -> TsResult<Self> {
        let series = params.entities("series_name");
        if series.is_empty() {
            return Err(TsError::Validation("PLOT needs at least one SERIES_NAME".into()));
        }
        let secondary_y = params.entities("secondary_y");
        if let Some(extra) = secondary_y.iter().find(|s| !series.contains(s)) {
            return Err(TsError::invalid(
                "secondary_y",
                extra.as_str(),
                "must be one of the plotted series",
            ));
        }
        let kind = params
            .opt_choice("kind", &PlotKind::CHOICES)?
            .map_or(PlotKind::Line, |k| PlotKind::from_choice(&k));
        let text = |key: &str| params.joined(key).unwrap_or_default();
        let options = PlotOptions {
            kind,
            title: text("title"),
            xlabel: text("xlabel"),
            ylabel: text("ylabel"),
            figsize: (
                params.opt_f64("figsize_width")?.unwrap_or(10.0),
                params.opt_f64("figsize_height")?.unwrap_or(6.0),
            ),
            legend: params.contains("legend").then(|| params.flag("legend")).transpose()?.unwrap_or(true),
            legend_names: params.tokens("legend_names").into_iter().map(String::from).collect(),
            style: params.tokens("style").into_iter().map(String::from).collect(),
            logx: params.flag("logx")?,
            logy: params.flag("logy")?,
            xlim: (params.opt_f64("xlim_min")?, params.opt_f64("xlim_max")?),
            ylim: (params.opt_f64("ylim_min")?, params.opt_f64("ylim_max")?),
            secondary_y,
            mark_right: params
                .contains("mark_right")
                .then(|| params.flag("mark_right"))
                .transpose()?
                .unwrap_or(true),
            grid: params.flag("grid")?,
        };
        if !options.legend_names.is_empty() && options.legend_names.len() != series.len() {
            return Err(TsError::Validation(format!(
                "{} LEGEND_NAMES for {} series",
                options.legend_names.len(),
                series.len()
            )));
        }
        Ok(Self {
            series,
            file: params.text("file")?.to_string(),
            window: params.window(dates)?,
            options,
        })
    }

    fn execute(self, session: &mut Session) -> TsResult<()> {
        let series = self
            .series
            .iter()
            .map(|name| Ok((name.clone(), session.store.series(name)?.window(&self.window))))
            .collect::<TsResult<Vec<_>>>()?;
        let request = PlotRequest {
            file: session.resolve_path(&self.file),
            series,
            options: self.options,
        };
        session.plotter.plot(&request)?;
        info!(file = %request.file.display(), series = request.series.len(), "plotted");
        Ok(())
    }
}
