//! Command Registry
//!
//! Static descriptor table for every control-file command: the keywords a
//! block must carry, the optional keywords with their defaults, and keyword
//! patterns accepted by a few commands (`MINMEAN_<n>`, `ABSPARMAX_<n>`).
//! Keyword names are stored lowercase, the form the engine compares against.
//!
//! The table is pure data. Typed conversion of the values happens in
//! `engine::command`.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use serde::Serialize;

// ============================================================================
// DESCRIPTOR TYPES
// ============================================================================

/// Default bound to an optional keyword
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DefaultValue {
    /// No default; the keyword is simply absent when not given
    Unset,
    Scalar(&'static str),
    List(&'static [&'static str]),
}

/// An optional keyword and its default
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct KwdSpec {
    pub name: &'static str,
    pub default: DefaultValue,
}

const fn kwd(name: &'static str, default: DefaultValue) -> KwdSpec {
    KwdSpec { name, default }
}

const fn opt(name: &'static str) -> KwdSpec {
    KwdSpec {
        name,
        default: DefaultValue::Unset,
    }
}

const fn def(name: &'static str, value: &'static str) -> KwdSpec {
    KwdSpec {
        name,
        default: DefaultValue::Scalar(value),
    }
}

/// Command descriptor
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CommandDef {
    /// Uppercase command name as written after START
    pub name: &'static str,
    /// Required keywords; `context` is always among them
    pub args: &'static [&'static str],
    /// Optional keywords with defaults
    pub kwds: &'static [KwdSpec],
    /// Keyword prefixes followed by an integer (`minmean_` matches `minmean_7`)
    pub patterns: &'static [&'static str],
    /// Replacement hint for deprecated names
    pub deprecated: Option<&'static str>,
    pub description: &'static str,
}

impl CommandDef {
    pub fn is_required(&self, keyword: &str) -> bool {
        self.args.contains(&keyword)
    }

    pub fn kwd(&self, keyword: &str) -> Option<&KwdSpec> {
        self.kwds.iter().find(|k| k.name == keyword)
    }

    /// True for keywords this command declares, directly or by pattern
    pub fn accepts(&self, keyword: &str) -> bool {
        self.is_required(keyword) || self.kwd(keyword).is_some() || self.matches_pattern(keyword)
    }

    pub fn matches_pattern(&self, keyword: &str) -> bool {
        self.patterns.iter().any(|prefix| {
            keyword
                .strip_prefix(prefix)
                .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
        })
    }
}

const DEPRECATED_MUL: &str =
    "Use multiple GET_SERIES_X blocks or a rolled up GET_SERIES_X block instead.";

const WINDOW: [KwdSpec; 4] = [opt("date_1"), opt("time_1"), opt("date_2"), opt("time_2")];

const ENTITY_NAMES: [KwdSpec; 6] = [
    opt("series_name"),
    opt("c_table_name"),
    opt("s_table_name"),
    opt("v_table_name"),
    opt("e_table_name"),
    opt("g_table_name"),
];

const DEFAULT_PROBABILITIES: &[&str] = &[
    "99.5", "99", "98", "95", "90", "75", "50", "25", "10", "5", "2", "1", "0.5",
];

// ============================================================================
// COMMAND TABLE
// ============================================================================

pub static SETTINGS: CommandDef = CommandDef {
    name: "SETTINGS",
    args: &["context"],
    kwds: &[opt("date_format")],
    patterns: &[],
    deprecated: None,
    description: "Set the run context and the date format",
};

const COPY_DEF: CommandDef = CommandDef {
    name: "COPY",
    args: &["context", "new_entity_name"],
    kwds: &[
        ENTITY_NAMES[0],
        ENTITY_NAMES[1],
        ENTITY_NAMES[2],
        ENTITY_NAMES[3],
        ENTITY_NAMES[4],
        ENTITY_NAMES[5],
        def("overwrite", "no"),
    ],
    patterns: &[],
    deprecated: None,
    description: "Copy one entity under a new name",
};

pub static COPY: CommandDef = COPY_DEF;

pub static MOVE: CommandDef = CommandDef {
    name: "MOVE",
    description: "Rename one entity",
    ..COPY_DEF
};

pub static ERASE_ENTITY: CommandDef = CommandDef {
    name: "ERASE_ENTITY",
    args: &["context"],
    kwds: &ENTITY_NAMES,
    patterns: &[],
    deprecated: None,
    description: "Delete entities by name",
};

pub static DIGITAL_FILTER: CommandDef = CommandDef {
    name: "DIGITAL_FILTER",
    args: &["context", "series_name", "new_series_name", "filter_type"],
    kwds: &[
        opt("filter_pass"),
        opt("cutoff_frequency"),
        opt("cutoff_frequency_1"),
        opt("cutoff_frequency_2"),
        def("stages", "1"),
        opt("alpha"),
        def("passes", "1"),
        def("reverse_second_stage", "no"),
        def("clip_input", "no"),
        def("clip_zero", "no"),
    ],
    patterns: &[],
    deprecated: None,
    description: "Butterworth filtering or baseflow separation",
};

pub static EXCEEDANCE_TIME: CommandDef = CommandDef {
    name: "EXCEEDANCE_TIME",
    args: &[
        "context",
        "series_name",
        "new_e_table_name",
        "exceedance_time_units",
    ],
    kwds: &[def("under_over", "over"), opt("flow"), opt("delay")],
    patterns: &[],
    deprecated: None,
    description: "Time spent above or below flow thresholds",
};

pub static FLOW_DURATION: CommandDef = CommandDef {
    name: "FLOW_DURATION",
    args: &["context", "series_name"],
    kwds: &[
        opt("new_g_table_name"),
        kwd(
            "exceedance_probabilities",
            DefaultValue::List(DEFAULT_PROBABILITIES),
        ),
        WINDOW[0],
        WINDOW[1],
        WINDOW[2],
        WINDOW[3],
    ],
    patterns: &[],
    deprecated: None,
    description: "Flow duration curve at exceedance probabilities",
};

const GET_SERIES_GSFLOW_GAGE_DEF: CommandDef = CommandDef {
    name: "GET_SERIES_GSFLOW_GAGE",
    args: &[
        "context",
        "file",
        "data_type",
        "new_series_name",
        "model_reference_date",
        "model_reference_time",
    ],
    kwds: &[
        def("time_units_per_day", "1"),
        WINDOW[0],
        WINDOW[1],
        WINDOW[2],
        WINDOW[3],
    ],
    patterns: &[],
    deprecated: None,
    description: "Read series from a GSFLOW gage file",
};

pub static GET_SERIES_GSFLOW_GAGE: CommandDef = GET_SERIES_GSFLOW_GAGE_DEF;

pub static GET_MUL_SERIES_GSFLOW_GAGE: CommandDef = CommandDef {
    name: "GET_MUL_SERIES_GSFLOW_GAGE",
    deprecated: Some(DEPRECATED_MUL),
    ..GET_SERIES_GSFLOW_GAGE_DEF
};

pub static GET_SERIES_CSV: CommandDef = CommandDef {
    name: "GET_SERIES_CSV",
    args: &["context", "file", "new_series_name"],
    kwds: &[WINDOW[0], WINDOW[1], WINDOW[2], WINDOW[3], opt("usecol")],
    patterns: &[],
    deprecated: None,
    description: "Read one column of a CSV file",
};

pub static GET_SERIES_HSPFBIN: CommandDef = CommandDef {
    name: "GET_SERIES_HSPFBIN",
    args: &[
        "context",
        "file",
        "new_series_name",
        "interval",
        "operationtype",
        "id",
        "variable",
    ],
    kwds: &WINDOW,
    patterns: &[],
    deprecated: None,
    description: "Read a series from an HSPF binary output file",
};

const GET_SERIES_PLOTGEN_DEF: CommandDef = CommandDef {
    name: "GET_SERIES_PLOTGEN",
    args: &["context", "file", "label", "new_series_name"],
    kwds: &WINDOW,
    patterns: &[],
    deprecated: None,
    description: "Read curves from an HSPF PLOTGEN file",
};

pub static GET_SERIES_PLOTGEN: CommandDef = GET_SERIES_PLOTGEN_DEF;

pub static GET_MUL_SERIES_PLOTGEN: CommandDef = CommandDef {
    name: "GET_MUL_SERIES_PLOTGEN",
    deprecated: Some(DEPRECATED_MUL),
    ..GET_SERIES_PLOTGEN_DEF
};

const GET_SERIES_SSF_DEF: CommandDef = CommandDef {
    name: "GET_SERIES_SSF",
    args: &["context", "file", "site", "new_series_name"],
    kwds: &WINDOW,
    patterns: &[],
    deprecated: None,
    description: "Read sites from a site sample file",
};

pub static GET_SERIES_SSF: CommandDef = GET_SERIES_SSF_DEF;

pub static GET_MUL_SERIES_SSF: CommandDef = CommandDef {
    name: "GET_MUL_SERIES_SSF",
    deprecated: Some(DEPRECATED_MUL),
    ..GET_SERIES_SSF_DEF
};

const GET_SERIES_STATVAR_DEF: CommandDef = CommandDef {
    name: "GET_SERIES_STATVAR",
    args: &[
        "context",
        "file",
        "variable_name",
        "location_id",
        "new_series_name",
    ],
    kwds: &WINDOW,
    patterns: &[],
    deprecated: None,
    description: "Read variables from a PRMS STATVAR file",
};

pub static GET_SERIES_STATVAR: CommandDef = GET_SERIES_STATVAR_DEF;

pub static GET_MUL_SERIES_STATVAR: CommandDef = CommandDef {
    name: "GET_MUL_SERIES_STATVAR",
    deprecated: Some(DEPRECATED_MUL),
    ..GET_SERIES_STATVAR_DEF
};

pub static GET_SERIES_SWMMBIN: CommandDef = CommandDef {
    name: "GET_SERIES_SWMMBIN",
    args: &["context"],
    kwds: &[opt("series_name")],
    patterns: &[],
    deprecated: None,
    description: "Read a series from a SWMM binary output file",
};

pub static GET_SERIES_TETRAD: CommandDef = CommandDef {
    name: "GET_SERIES_TETRAD",
    args: &[
        "context",
        "file",
        "new_series_name",
        "well_name",
        "object_name",
        "model_reference_date",
        "model_reference_time",
    ],
    kwds: &WINDOW,
    patterns: &[],
    deprecated: None,
    description: "Read a well series from a TETRAD output file",
};

pub static GET_SERIES_UFORE_HYDRO: CommandDef = CommandDef {
    name: "GET_SERIES_UFORE_HYDRO",
    args: &[
        "context",
        "file",
        "new_series_name",
        "model_reference_date",
        "model_reference_time",
        "time_increment",
    ],
    kwds: &WINDOW,
    patterns: &[],
    deprecated: None,
    description: "Read a UFORE hydrology output file",
};

pub static GET_SERIES_WDM: CommandDef = CommandDef {
    name: "GET_SERIES_WDM",
    args: &["context", "new_series_name", "file", "dsn"],
    kwds: &[
        WINDOW[0],
        WINDOW[1],
        WINDOW[2],
        WINDOW[3],
        def("def_time", "00:00:00"),
        opt("filter"),
    ],
    patterns: &[],
    deprecated: None,
    description: "Read a dataset from a WDM file",
};

pub static GET_SERIES_XLSX: CommandDef = CommandDef {
    name: "GET_SERIES_XLSX",
    args: &["context", "new_series_name", "file"],
    kwds: &[
        def("sheet", "1"),
        def("column", "1"),
        WINDOW[0],
        WINDOW[1],
        WINDOW[2],
        WINDOW[3],
    ],
    patterns: &[],
    deprecated: None,
    description: "Read a column from a spreadsheet",
};

pub static HYDRO_EVENTS: CommandDef = CommandDef {
    name: "HYDRO_EVENTS",
    args: &[
        "context",
        "series_name",
        "new_series_name",
        "rise_lag",
        "fall_lag",
    ],
    kwds: &[
        def("window", "1"),
        def("min_peak", "0"),
        WINDOW[0],
        WINDOW[1],
        WINDOW[2],
        WINDOW[3],
    ],
    patterns: &[],
    deprecated: None,
    description: "Keep storm hydrographs around peaks",
};

pub static HYDRO_PEAKS: CommandDef = CommandDef {
    name: "HYDRO_PEAKS",
    args: &["context", "series_name", "new_series_name"],
    kwds: &[
        def("window", "1"),
        def("min_peak", "0"),
        WINDOW[0],
        WINDOW[1],
        WINDOW[2],
        WINDOW[3],
    ],
    patterns: &[],
    deprecated: None,
    description: "Keep local peaks",
};

pub static HYDROLOGIC_INDICES: CommandDef = CommandDef {
    name: "HYDROLOGIC_INDICES",
    args: &["context", "series_name", "new_g_table_name"],
    kwds: &[
        def("use_median", "no"),
        def("drainage_area", "1"),
        opt("stream_classification"),
        opt("flow_component"),
        opt("ma"),
        opt("ml"),
        opt("mh"),
        opt("fl"),
        opt("fh"),
        opt("dl"),
        opt("dh"),
        opt("ta"),
        opt("tl"),
        opt("th"),
        opt("ra"),
        WINDOW[0],
        WINDOW[1],
        WINDOW[2],
        WINDOW[3],
        def("current_definitions", "no"),
    ],
    patterns: &[],
    deprecated: None,
    description: "Hydrologic indices of a daily flow series",
};

pub static LIST_OUTPUT: CommandDef = CommandDef {
    name: "LIST_OUTPUT",
    args: &["context", "file"],
    kwds: &[
        opt("series_format"),
        ENTITY_NAMES[0],
        ENTITY_NAMES[1],
        ENTITY_NAMES[2],
        ENTITY_NAMES[3],
        ENTITY_NAMES[4],
        ENTITY_NAMES[5],
    ],
    patterns: &[],
    deprecated: None,
    description: "Write entities to a fixed-column report",
};

pub static NEW_SERIES_UNIFORM: CommandDef = CommandDef {
    name: "NEW_SERIES_UNIFORM",
    args: &[
        "context",
        "new_series_name",
        "new_series_value",
        "time_interval",
        "time_unit",
        "date_1",
        "time_1",
        "date_2",
        "time_2",
    ],
    kwds: &[],
    patterns: &[],
    deprecated: None,
    description: "Constant-valued regular series",
};

pub static NEW_TIME_BASE: CommandDef = CommandDef {
    name: "NEW_TIME_BASE",
    args: &["context", "series_name", "new_series_name", "tb_series_name"],
    kwds: &[],
    patterns: &[],
    deprecated: None,
    description: "Interpolate a series onto another series' time base",
};

pub static PERIOD_STATISTICS: CommandDef = CommandDef {
    name: "PERIOD_STATISTICS",
    args: &[
        "context",
        "series_name",
        "new_series_name",
        "statistic",
        "period",
        "time_abscissa",
    ],
    kwds: &[
        def("year_type", "water_high"),
        def("log", "no"),
        def("power", "1"),
        WINDOW[0],
        WINDOW[1],
        WINDOW[2],
        WINDOW[3],
    ],
    patterns: &[],
    deprecated: None,
    description: "Statistic per month or year",
};

pub static PLOT: CommandDef = CommandDef {
    name: "PLOT",
    args: &["context", "series_name", "file"],
    kwds: &[
        def("kind", "line"),
        def("xlabel", ""),
        def("ylabel", ""),
        def("title", ""),
        def("figsize_width", "10"),
        def("figsize_height", "6.0"),
        def("legend", "yes"),
        opt("legend_names"),
        opt("style"),
        def("logx", "no"),
        def("logy", "no"),
        opt("xlim_min"),
        opt("xlim_max"),
        opt("ylim_min"),
        opt("ylim_max"),
        opt("secondary_y"),
        def("mark_right", "yes"),
        def("grid", "no"),
        WINDOW[0],
        WINDOW[1],
        WINDOW[2],
        WINDOW[3],
    ],
    patterns: &[],
    deprecated: None,
    description: "Plot series to an image file",
};

pub static REDUCE_TIME_SPAN: CommandDef = CommandDef {
    name: "REDUCE_TIME_SPAN",
    args: &["context", "series_name", "new_series_name"],
    kwds: &WINDOW,
    patterns: &[],
    deprecated: None,
    description: "Restrict a series to a date window",
};

pub static SERIES_BASE_LEVEL: CommandDef = CommandDef {
    name: "SERIES_BASE_LEVEL",
    args: &[
        "context",
        "series_name",
        "substitute",
        "new_series_name",
        "base_level_series_name",
        "base_level_date",
        "base_level_time",
    ],
    kwds: &[def("negate", "no")],
    patterns: &[],
    deprecated: None,
    description: "Subtract the value of a base series at a date",
};

pub static SERIES_CLEAN: CommandDef = CommandDef {
    name: "SERIES_CLEAN",
    args: &[
        "context",
        "series_name",
        "new_series_name",
        "substitute_value",
    ],
    kwds: &[opt("lower_erase_boundary"), opt("upper_erase_boundary")],
    patterns: &[],
    deprecated: None,
    description: "Erase or replace values inside bounds",
};

pub static SERIES_COMPARE: CommandDef = CommandDef {
    name: "SERIES_COMPARE",
    args: &[
        "context",
        "series_name_sim",
        "series_name_obs",
        "new_c_table_name",
    ],
    kwds: &[
        opt("series_name_base"),
        def("bias", "no"),
        def("standard_error", "no"),
        def("relative_bias", "no"),
        def("relative_standard_error", "no"),
        def("nash_sutcliffe", "no"),
        def("coefficient_of_efficiency", "no"),
        def("index_of_agreement", "no"),
        def("volumetric_efficiency", "no"),
        def("exponent", "1"),
        WINDOW[0],
        WINDOW[1],
        WINDOW[2],
        WINDOW[3],
    ],
    patterns: &[],
    deprecated: None,
    description: "Goodness of fit between simulated and observed series",
};

pub static SERIES_DIFFERENCE: CommandDef = CommandDef {
    name: "SERIES_DIFFERENCE",
    args: &["context", "series_name", "new_series_name"],
    kwds: &[],
    patterns: &[],
    deprecated: None,
    description: "First differences of a series",
};

pub static SERIES_DISPLACE: CommandDef = CommandDef {
    name: "SERIES_DISPLACE",
    args: &[
        "context",
        "series_name",
        "new_series_name",
        "lag_increment",
        "fill_value",
    ],
    kwds: &[],
    patterns: &[],
    deprecated: None,
    description: "Shift a series by whole time steps",
};

pub static SERIES_EQUATION: CommandDef = CommandDef {
    name: "SERIES_EQUATION",
    args: &["context", "new_series_name", "equation"],
    kwds: &[],
    patterns: &[],
    deprecated: None,
    description: "Evaluate an arithmetic expression over series",
};

pub static SERIES_STATISTICS: CommandDef = CommandDef {
    name: "SERIES_STATISTICS",
    args: &["context", "series_name", "new_s_table_name"],
    kwds: &[
        def("sum", "no"),
        def("mean", "no"),
        def("median", "no"),
        def("std_dev", "no"),
        def("maximum", "no"),
        def("minimum", "no"),
        def("range", "no"),
        def("log", "no"),
        def("power", "1"),
        WINDOW[0],
        WINDOW[1],
        WINDOW[2],
        WINDOW[3],
    ],
    patterns: &["minmean_", "maxmean_"],
    deprecated: None,
    description: "Summary statistics of a series",
};

pub static USGS_HYSEP: CommandDef = CommandDef {
    name: "USGS_HYSEP",
    args: &[
        "context",
        "series_name",
        "new_series_name",
        "hysep_type",
        "time_interval",
    ],
    kwds: &[
        def("area", "1.0"),
        WINDOW[0],
        WINDOW[1],
        WINDOW[2],
        WINDOW[3],
    ],
    patterns: &[],
    deprecated: None,
    description: "HYSEP baseflow separation",
};

pub static V_TABLE_TO_SERIES: CommandDef = CommandDef {
    name: "V_TABLE_TO_SERIES",
    args: &[
        "context",
        "new_series_name",
        "v_table_name",
        "time_abscissa",
    ],
    kwds: &[],
    patterns: &[],
    deprecated: None,
    description: "Turn a volume table into a series",
};

pub static VOLUME_CALCULATION: CommandDef = CommandDef {
    name: "VOLUME_CALCULATION",
    args: &[
        "context",
        "series_name",
        "new_v_table_name",
        "flow_time_units",
    ],
    kwds: &[
        opt("date_file"),
        opt("automatic_dates"),
        def("factor", "1.0"),
    ],
    patterns: &[],
    deprecated: None,
    description: "Integrate flow over date intervals",
};

pub static WRITE_PEST_FILES: CommandDef = CommandDef {
    name: "WRITE_PEST_FILES",
    args: &["context", "new_pest_control_file", "new_instruction_file"],
    kwds: &[
        opt("series_name"),
        opt("template_file"),
        opt("model_input_file"),
        opt("parameter_data_file"),
        opt("parameter_group_file"),
        opt("observation_series_name"),
        opt("model_series_name"),
        opt("series_weights_equation"),
        opt("series_weights_min_max"),
        opt("observation_s_table_name"),
        opt("model_s_table_name"),
        opt("s_table_weights_equation"),
        opt("s_table_weights_min_max"),
        opt("observation_v_table_name"),
        opt("model_v_table_name"),
        opt("v_table_weights_equation"),
        opt("v_table_weights_min_max"),
        opt("observation_e_table_name"),
        opt("model_e_table_name"),
        opt("e_table_weights_equation"),
        opt("e_table_weights_min_max"),
        opt("observation_g_table_name"),
        opt("model_g_table_name"),
        opt("g_table_weights_equation"),
        opt("g_table_weights_min_max"),
        opt("automatic_user_intervention"),
        opt("truncated_svd"),
        opt("model_command_line"),
        // PEST control variables; defaults depend on EIGTHRESH, see commands::pest
        opt("rstfle"),
        opt("pestmode"),
        opt("maxcompdim"),
        opt("derzerolim"),
        opt("precis"),
        opt("dpoint"),
        opt("numcom"),
        opt("jacfile"),
        opt("messfile"),
        opt("obsreref"),
        opt("rlambda1"),
        opt("rlamfac"),
        opt("phiratsuf"),
        opt("phiredlam"),
        opt("numlam"),
        opt("jacupdate"),
        opt("lamforgive"),
        opt("derforgive"),
        opt("relparmax"),
        opt("facparmax"),
        opt("facorig"),
        opt("iboundstick"),
        opt("upvecbend"),
        opt("phiredswh"),
        opt("noptswitch"),
        opt("splitswh"),
        opt("doaui"),
        opt("dosenreuse"),
        opt("boundscale"),
        opt("noptmax"),
        opt("phiredstp"),
        opt("nphistp"),
        opt("nphinored"),
        opt("relparstp"),
        opt("nrelpar"),
        opt("phistopthresh"),
        opt("lastrun"),
        opt("phiabandon"),
        opt("icov"),
        opt("icor"),
        opt("ieig"),
        opt("ires"),
        opt("jcosave"),
        opt("verboserec"),
        opt("jcosaveitn"),
        opt("reisaveitn"),
        opt("parsaveitn"),
        opt("parsaverun"),
        opt("svdmode"),
        opt("maxsing"),
        opt("eigthresh"),
        opt("eigwrite"),
        opt("lsqrmode"),
        opt("lsqr_atol"),
        opt("lsqr_btol"),
        opt("lsqr_conlim"),
        opt("lsqr_itnlim"),
        opt("lsqrwrite"),
    ],
    patterns: &["absparmax_"],
    deprecated: None,
    description: "Write a PEST control file and instruction file",
};

/// Every command, in alphabetical order
pub static COMMANDS: &[&CommandDef] = &[
    &COPY,
    &DIGITAL_FILTER,
    &ERASE_ENTITY,
    &EXCEEDANCE_TIME,
    &FLOW_DURATION,
    &GET_MUL_SERIES_GSFLOW_GAGE,
    &GET_MUL_SERIES_PLOTGEN,
    &GET_MUL_SERIES_SSF,
    &GET_MUL_SERIES_STATVAR,
    &GET_SERIES_CSV,
    &GET_SERIES_GSFLOW_GAGE,
    &GET_SERIES_HSPFBIN,
    &GET_SERIES_PLOTGEN,
    &GET_SERIES_SSF,
    &GET_SERIES_STATVAR,
    &GET_SERIES_SWMMBIN,
    &GET_SERIES_TETRAD,
    &GET_SERIES_UFORE_HYDRO,
    &GET_SERIES_WDM,
    &GET_SERIES_XLSX,
    &HYDROLOGIC_INDICES,
    &HYDRO_EVENTS,
    &HYDRO_PEAKS,
    &LIST_OUTPUT,
    &MOVE,
    &NEW_SERIES_UNIFORM,
    &NEW_TIME_BASE,
    &PERIOD_STATISTICS,
    &PLOT,
    &REDUCE_TIME_SPAN,
    &SERIES_BASE_LEVEL,
    &SERIES_CLEAN,
    &SERIES_COMPARE,
    &SERIES_DIFFERENCE,
    &SERIES_DISPLACE,
    &SERIES_EQUATION,
    &SERIES_STATISTICS,
    &SETTINGS,
    &USGS_HYSEP,
    &V_TABLE_TO_SERIES,
    &VOLUME_CALCULATION,
    &WRITE_PEST_FILES,
];

// ============================================================================
// REGISTRY
// ============================================================================

pub struct CommandRegistry {
    by_name: BTreeMap<&'static str, &'static CommandDef>,
}

pub static COMMAND_REGISTRY: LazyLock<CommandRegistry> = LazyLock::new(|| CommandRegistry {
    by_name: COMMANDS.iter().map(|c| (c.name, *c)).collect(),
});

impl CommandRegistry {
    /// Look up a command, case-insensitively
    pub fn get(&self, name: &str) -> Option<&'static CommandDef> {
        self.by_name.get(name.to_uppercase().as_str()).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static CommandDef> + '_ {
        self.by_name.values().copied()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Known commands sharing the longest `_`-separated prefix with `name`
    pub fn suggest(&self, name: &str) -> Vec<&'static str> {
        let upper = name.to_uppercase();
        let parts: Vec<&str> = upper.split('_').collect();
        for keep in (1..=parts.len()).rev() {
            let prefix = parts[..keep].join("_");
            let hits: Vec<&'static str> = self
                .by_name
                .keys()
                .copied()
                .filter(|k| k.starts_with(&prefix))
                .collect();
            if !hits.is_empty() {
                return hits;
            }
        }
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_command_requires_context() {
        for cmd in COMMAND_REGISTRY.iter() {
            assert!(cmd.is_required("context"), "{} lacks context", cmd.name);
        }
        assert_eq!(COMMAND_REGISTRY.len(), COMMANDS.len());
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let cmd = COMMAND_REGISTRY.get("flow_duration").unwrap();
        assert_eq!(cmd.name, "FLOW_DURATION");
        assert_eq!(
            cmd.kwd("exceedance_probabilities").unwrap().default,
            DefaultValue::List(DEFAULT_PROBABILITIES)
        );
        assert!(COMMAND_REGISTRY.get("NOT_A_COMMAND").is_none());
    }

    #[test]
    fn test_deprecated_aliases_share_keywords() {
        let alias = COMMAND_REGISTRY.get("GET_MUL_SERIES_SSF").unwrap();
        assert_eq!(alias.args, GET_SERIES_SSF.args);
        assert_eq!(alias.deprecated, Some(DEPRECATED_MUL));
        assert!(GET_SERIES_SSF.deprecated.is_none());
    }

    #[test]
    fn test_patterns() {
        assert!(SERIES_STATISTICS.accepts("minmean_7"));
        assert!(SERIES_STATISTICS.accepts("maxmean_30"));
        assert!(!SERIES_STATISTICS.accepts("minmean_"));
        assert!(!SERIES_STATISTICS.accepts("minmean_x"));
        assert!(WRITE_PEST_FILES.accepts("absparmax_2"));
        assert!(!COPY.accepts("minmean_7"));
    }

    #[test]
    fn test_suggest() {
        let hits = COMMAND_REGISTRY.suggest("GET_SERIES_CVS");
        assert!(hits.contains(&"GET_SERIES_CSV"));
    }
}
