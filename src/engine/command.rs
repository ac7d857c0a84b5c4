//! Closed command set
//!
//! Every control-file command maps to exactly one variant. Building a
//! variant does all keyword coercion; executing it touches the session.

use crate::commands::entity_ops::{CopyEntity, EraseEntity, MoveEntity};
use crate::commands::get_series::{GetBinarySeries, GetSeries};
use crate::commands::hydrology::{
    DigitalFilter, ExceedanceTime, FlowDuration, HydroEvents, HydroPeaks, HydrologicIndices,
    UsgsHysep, VolumeCalculation,
};
use crate::commands::list_output::ListOutput;
use crate::commands::pest::WritePestFiles;
use crate::commands::plot::Plot;
use crate::commands::series_ops::{
    NewSeriesUniform, NewTimeBase, ReduceTimeSpan, SeriesBaseLevel, SeriesClean,
    SeriesDifference, SeriesDisplace, SeriesEquation, VTableToSeries,
};
use crate::commands::settings::Settings;
use crate::commands::statistics::{PeriodStatistics, SeriesCompare, SeriesStatistics};
use crate::commands::{BlockCommand, Session};
use crate::datetime::DateFormat;
use crate::error::{TsError, TsResult};

use super::params::BlockParams;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Settings(Settings),
    GetSeries(GetSeries),
    GetBinarySeries(GetBinarySeries),
    Copy(CopyEntity),
    Move(MoveEntity),
    EraseEntity(EraseEntity),
    NewSeriesUniform(NewSeriesUniform),
    NewTimeBase(NewTimeBase),
    ReduceTimeSpan(ReduceTimeSpan),
    SeriesClean(SeriesClean),
    SeriesDifference(SeriesDifference),
    SeriesDisplace(SeriesDisplace),
    SeriesBaseLevel(SeriesBaseLevel),
    SeriesEquation(SeriesEquation),
    VTableToSeries(VTableToSeries),
    SeriesStatistics(SeriesStatistics),
    PeriodStatistics(PeriodStatistics),
    SeriesCompare(SeriesCompare),
    DigitalFilter(DigitalFilter),
    HydroEvents(HydroEvents),
    HydroPeaks(HydroPeaks),
    UsgsHysep(UsgsHysep),
    FlowDuration(FlowDuration),
    ExceedanceTime(ExceedanceTime),
    HydrologicIndices(HydrologicIndices),
    VolumeCalculation(VolumeCalculation),
    ListOutput(ListOutput),
    WritePestFiles(WritePestFiles),
    Plot(Plot),
}

fn build<C: BlockCommand>(
    params: &BlockParams,
    dates: &DateFormat,
    wrap: fn(C) -> Command,
) -> TsResult<Command> {
    C::from_params(params, dates).map(wrap)
}

impl Command {
    /// Typed command for a resolved parameter map. `dates` is the date
    /// format in force when the block runs.
    pub fn build(params: &BlockParams, dates: &DateFormat) -> TsResult<Command> {
        let p = params;
        let d = dates;
        match params.command() {
            "SETTINGS" => build(p, d, Command::Settings),
            "GET_SERIES_CSV" | "GET_SERIES_SSF" | "GET_SERIES_PLOTGEN" | "GET_SERIES_STATVAR"
            | "GET_SERIES_GSFLOW_GAGE" | "GET_SERIES_UFORE_HYDRO" | "GET_MUL_SERIES_SSF"
            | "GET_MUL_SERIES_PLOTGEN" | "GET_MUL_SERIES_STATVAR" | "GET_MUL_SERIES_GSFLOW_GAGE" => {
                build(p, d, Command::GetSeries)
            }
            "GET_SERIES_WDM" | "GET_SERIES_HSPFBIN" | "GET_SERIES_XLSX" | "GET_SERIES_TETRAD"
            | "GET_SERIES_SWMMBIN" => build(p, d, Command::GetBinarySeries),
            "COPY" => build(p, d, Command::Copy),
            "MOVE" => build(p, d, Command::Move),
            "ERASE_ENTITY" => build(p, d, Command::EraseEntity),
            "NEW_SERIES_UNIFORM" => build(p, d, Command::NewSeriesUniform),
            "NEW_TIME_BASE" => build(p, d, Command::NewTimeBase),
            "REDUCE_TIME_SPAN" => build(p, d, Command::ReduceTimeSpan),
            "SERIES_CLEAN" => build(p, d, Command::SeriesClean),
            "SERIES_DIFFERENCE" => build(p, d, Command::SeriesDifference),
            "SERIES_DISPLACE" => build(p, d, Command::SeriesDisplace),
            "SERIES_BASE_LEVEL" => build(p, d, Command::SeriesBaseLevel),
            "SERIES_EQUATION" => build(p, d, Command::SeriesEquation),
            "V_TABLE_TO_SERIES" => build(p, d, Command::VTableToSeries),
            "SERIES_STATISTICS" => build(p, d, Command::SeriesStatistics),
            "PERIOD_STATISTICS" => build(p, d, Command::PeriodStatistics),
            "SERIES_COMPARE" => build(p, d, Command::SeriesCompare),
            "DIGITAL_FILTER" => build(p, d, Command::DigitalFilter),
            "HYDRO_EVENTS" => build(p, d, Command::HydroEvents),
            "HYDRO_PEAKS" => build(p, d, Command::HydroPeaks),
            "USGS_HYSEP" => build(p, d, Command::UsgsHysep),
            "FLOW_DURATION" => build(p, d, Command::FlowDuration),
            "EXCEEDANCE_TIME" => build(p, d, Command::ExceedanceTime),
            "HYDROLOGIC_INDICES" => build(p, d, Command::HydrologicIndices),
            "VOLUME_CALCULATION" => build(p, d, Command::VolumeCalculation),
            "LIST_OUTPUT" => build(p, d, Command::ListOutput),
            "WRITE_PEST_FILES" => build(p, d, Command::WritePestFiles),
            "PLOT" => build(p, d, Command::Plot),
            other => Err(TsError::UnknownCommand {
                command: other.to_string(),
                line: params.line(),
            }),
        }
    }

    pub fn execute(self, session: &mut Session) -> TsResult<()> {
        match self {
            Command::Settings(c) => c.execute(session),
            Command::GetSeries(c) => c.execute(session),
            Command::GetBinarySeries(c) => c.execute(session),
            Command::Copy(c) => c.execute(session),
            Command::Move(c) => c.execute(session),
            Command::EraseEntity(c) => c.execute(session),
            Command::NewSeriesUniform(c) => c.execute(session),
            Command::NewTimeBase(c) => c.execute(session),
            Command::ReduceTimeSpan(c) => c.execute(session),
            Command::SeriesClean(c) => c.execute(session),
            Command::SeriesDifference(c) => c.execute(session),
            Command::SeriesDisplace(c) => c.execute(session),
            Command::SeriesBaseLevel(c) => c.execute(session),
            Command::SeriesEquation(c) => c.execute(session),
            Command::VTableToSeries(c) => c.execute(session),
            Command::SeriesStatistics(c) => c.execute(session),
            Command::PeriodStatistics(c) => c.execute(session),
            Command::SeriesCompare(c) => c.execute(session),
            Command::DigitalFilter(c) => c.execute(session),
            Command::HydroEvents(c) => c.execute(session),
            Command::HydroPeaks(c) => c.execute(session),
            Command::UsgsHysep(c) => c.execute(session),
            Command::FlowDuration(c) => c.execute(session),
            Command::ExceedanceTime(c) => c.execute(session),
            Command::HydrologicIndices(c) => c.execute(session),
            Command::VolumeCalculation(c) => c.execute(session),
            Command::ListOutput(c) => c.execute(session),
            Command::WritePestFiles(c) => c.execute(session),
            Command::Plot(c) => c.execute(session),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::COMMAND_REGISTRY;
    use ts_types::ParamValue;

    #[test]
    fn test_every_registered_command_has_a_variant() {
        for def in COMMAND_REGISTRY.iter() {
            let params = BlockParams::from_pairs(def.name, 1, Vec::<(&str, ParamValue)>::new());
            let result = Command::build(&params, &DateFormat::default());
            assert!(
                !matches!(result, Err(TsError::UnknownCommand { .. })),
                "{} has no Command variant",
                def.name
            );
        }
    }

    #[test]
    fn test_unknown_command() {
        let params = BlockParams::from_pairs("SERIES_SMOOTH", 7, Vec::<(&str, ParamValue)>::new());
        assert!(matches!(
            Command::build(&params, &DateFormat::default()),
            Err(TsError::UnknownCommand { line: 7, .. })
        ));
    }

    #[test]
    fn test_mul_alias_builds_text_reader() {
        let params = BlockParams::from_pairs(
            "GET_MUL_SERIES_SSF",
            2,
            [
                ("file", ParamValue::scalar("obs.ssf")),
                ("site", ParamValue::scalar("s1")),
                ("new_series_name", ParamValue::scalar("a")),
            ],
        );
        assert!(matches!(
            Command::build(&params, &DateFormat::default()),
            Ok(Command::GetSeries(_))
        ));
    }
}
