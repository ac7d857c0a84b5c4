//! WRITE_PEST_FILES
//!
//! Turns the most recent LIST_OUTPUT layout into a PEST instruction file and
//! writes the matching control file. Everything is read and validated first
//! (template files, parameter group/data files, observation weights); the
//! two output files are only written once the whole control file exists in
//! memory.
//!
//! ## Guidelines
//!
//! 1. Observation names always come from the listing so instruction file and
//!    control file agree
//! 2. Weights are clipped to `[max(min, 0), max]`
//! 3. EIGTHRESH > 0 switches on the SVD section and needs DOAUI `noaui`

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::{debug, info, warn};
use ts_types::EntityKind;

use crate::datetime::DateFormat;
use crate::engine::params::BlockParams;
use crate::equation::{parse_equation, Evaluator, Expr, Operand};
use crate::error::{TsError, TsResult};
use crate::store::{EntityName, EntityStore};

use super::list_output::{report_values, Listing};
use super::{BlockCommand, Session};

/// Observation families in control-file order
const FAMILIES: [(EntityKind, &str); 5] = [
    (EntityKind::Series, "series"),
    (EntityKind::STable, "s_table"),
    (EntityKind::VTable, "v_table"),
    (EntityKind::ETable, "e_table"),
    (EntityKind::GTable, "g_table"),
];

// ============================================================================
// OBSERVATION WEIGHTS
// ============================================================================

/// One `observation_*`/`model_*`/`*_weights_*` run
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedPair {
    pub kind: EntityKind,
    pub observation: EntityName,
    pub model: EntityName,
    pub equation: Expr,
    pub lower: f64,
    pub upper: Option<f64>,
}

impl WeightedPair {
    fn parse_bounds(raw: Option<&str>) -> TsResult<(f64, Option<f64>)> {
        let Some(raw) = raw else {
            return Ok((0.0, None));
        };
        let words: Vec<&str> = raw.split_whitespace().collect();
        if words.len() != 2 {
            return Err(TsError::invalid(
                "weights_min_max",
                raw,
                "expected a minimum and a maximum",
            ));
        }
        let parse = |w: &str| {
            w.parse::<f64>()
                .map_err(|_| TsError::invalid("weights_min_max", raw, "bounds must be numbers"))
        };
        let (min, max) = (parse(words[0])?, parse(words[1])?);
        if min > max {
            return Err(TsError::Validation(format!(
                "the minimum weight {min} is greater than the maximum weight {max}"
            )));
        }
        Ok((min.max(0.0), Some(max)))
    }

    fn collect(params: &BlockParams) -> TsResult<Vec<WeightedPair>> {
        let mut pairs = Vec::new();
        for (kind, family) in FAMILIES {
            let observations = params.entries(&format!("observation_{family}_name"));
            let models = params.entries(&format!("model_{family}_name"));
            let equations = params.entries(&format!("{family}_weights_equation"));
            let bounds = params.entries(&format!("{family}_weights_min_max"));
            if models.len() != observations.len() || equations.len() != observations.len() {
                return Err(TsError::Validation(format!(
                    "{} observation, {} model and {} weight equation entries for {family}s; \
                     each observation needs a model name and a weight equation",
                    observations.len(),
                    models.len(),
                    equations.len()
                )));
            }
            for (i, obs) in observations.iter().enumerate() {
                let (lower, upper) = Self::parse_bounds(bounds.get(i).copied())?;
                pairs.push(WeightedPair {
                    kind,
                    observation: EntityName::new(obs),
                    model: EntityName::new(models[i]),
                    equation: parse_equation(equations[i])?,
                    lower,
                    upper,
                });
            }
        }
        Ok(pairs)
    }

    /// Weight of one observed value
    fn weight(&self, store: &EntityStore, value: f64) -> TsResult<f64> {
        match Evaluator::new(store)
            .with_abs_value(value.abs())
            .evaluate(&self.equation)?
        {
            Operand::Scalar(w) => {
                let w = w.max(self.lower);
                Ok(self.upper.map_or(w, |u| w.min(u)))
            }
            _ => Err(TsError::Equation(format!(
                "weight equation for {} must evaluate to a number",
                self.observation
            ))),
        }
    }

    /// `* observation data` lines for this pair
    fn observation_lines(&self, store: &EntityStore, listing: &Listing) -> TsResult<Vec<String>> {
        let names = listing.observations_of(self.kind, &self.model).ok_or_else(|| {
            TsError::Validation(format!(
                "model {} {} is not part of the preceding LIST_OUTPUT",
                self.kind, self.model
            ))
        })?;
        let values = report_values(store, self.kind, &self.observation)?;
        if values.len() != names.len() {
            return Err(TsError::Validation(format!(
                "observation {} {} has {} values but model {} was listed with {}",
                self.kind,
                self.observation,
                values.len(),
                self.model,
                names.len()
            )));
        }
        let group = self.model.lower();
        names
            .iter()
            .zip(values)
            .map(|(name, value)| {
                let weight = self.weight(store, value)?;
                Ok(format!("{name:<20} {value:>15.6} {weight:>15.6} {group:<20}"))
            })
            .collect()
    }
}

// ============================================================================
// PARAMETER FILES
// ============================================================================

/// Strip `#` comments and blank lines, keeping 1-based line numbers
fn data_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines().enumerate().filter_map(|(i, line)| {
        let line = line.split('#').next().unwrap_or("").trim();
        (!line.is_empty()).then_some((i + 1, line))
    })
}

fn read_file(path: &Path) -> TsResult<String> {
    std::fs::read_to_string(path).map_err(|e| TsError::io(path, e))
}

fn one_of(path: &Path, line: usize, what: &str, value: &str, choices: &[&str]) -> TsResult<String> {
    let lower = value.to_lowercase();
    if choices.contains(&lower.as_str()) {
        Ok(lower)
    } else {
        Err(TsError::reader(
            path,
            format!(
                "line {line}: {what} must be one of {}, not \"{value}\"",
                choices.join(", ")
            ),
        ))
    }
}

fn float(path: &Path, line: usize, what: &str, value: &str) -> TsResult<f64> {
    value
        .parse::<f64>()
        .map_err(|_| TsError::reader(path, format!("line {line}: {what} \"{value}\" is not a number")))
}

/// Parsed parameter group file
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParameterGroups {
    pub names: Vec<String>,
    pub lines: Vec<String>,
}

impl ParameterGroups {
    pub fn parse(text: &str, path: &Path) -> TsResult<Self> {
        let mut groups = ParameterGroups::default();
        for (line_no, line) in data_lines(text) {
            let words: Vec<&str> = line.split_whitespace().collect();
            if words.len() != 7 && words.len() != 10 {
                return Err(TsError::reader(
                    path,
                    format!(
                        "line {line_no} has {} items; it must have either 7 or 10 items",
                        words.len()
                    ),
                ));
            }
            let name = words[0].to_lowercase();
            if groups.names.contains(&name) {
                return Err(TsError::reader(
                    path,
                    format!("line {line_no}: duplicate parameter group name \"{}\"", words[0]),
                ));
            }
            let inctyp = one_of(path, line_no, "INCTYP", words[1], &["relative", "absolute", "rel_to_max"])?;
            let derinc = float(path, line_no, "DERINC", words[2])?;
            let derinclb = float(path, line_no, "DERINCLB", words[3])?;
            let forcen = one_of(
                path,
                line_no,
                "FORCEN",
                words[4],
                &["always_2", "always_3", "always_5", "switch", "switch_5"],
            )?;
            let derincmul = float(path, line_no, "DERINCMUL", words[5])?;
            let dermthd = one_of(
                path,
                line_no,
                "DERMTHD",
                words[6],
                &["parabolic", "best_fit", "outside_pts", "minvar", "maxprec"],
            )?;
            let splits = if words.len() == 10 {
                format!("{:>10} {:>10} {:>10}", words[7], words[8], words[9])
            } else {
                String::new()
            };
            groups.lines.push(
                format!(
                    "{:<12} {inctyp:>10} {derinc:>10} {derinclb:>10} {forcen:>10} {derincmul:>10} {dermthd:>11} {splits}",
                    words[0]
                )
                .trim_end()
                .to_string(),
            );
            groups.names.push(name);
        }
        Ok(groups)
    }
}

/// Parsed parameter data file
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParameterData {
    pub names: Vec<String>,
    pub lines: Vec<String>,
    /// `(parameter, parent)` for tied parameters
    pub tied: Vec<(String, String)>,
    pub equations: Vec<String>,
    pub secondary: BTreeSet<String>,
}

impl ParameterData {
    pub fn parse(text: &str, path: &Path, groups: &ParameterGroups) -> TsResult<Self> {
        let mut data = ParameterData::default();
        for (line_no, line) in data_lines(text) {
            if let Some((lhs, rhs)) = line.split_once('=') {
                let lhs = lhs.trim();
                data.secondary.insert(lhs.to_lowercase());
                let rhs: String = rhs.split_whitespace().collect();
                data.equations.push(format!("{lhs:<15} = {rhs}"));
                continue;
            }
            let words: Vec<&str> = line.split_whitespace().collect();
            let [parnme, partrans, parchglim, parval1, parlbnd, parubnd, pargp, scale, offset, dercom] =
                words.as_slice()
            else {
                return Err(TsError::reader(
                    path,
                    format!("line {line_no} has {} items; parameter lines have 10", words.len()),
                ));
            };
            let name = parnme.to_lowercase();
            if name.len() > 12 {
                return Err(TsError::reader(
                    path,
                    format!("line {line_no}: parameter name \"{parnme}\" is longer than 12 characters"),
                ));
            }
            if name == "none" {
                return Err(TsError::reader(path, format!("line {line_no}: a parameter cannot be named \"none\"")));
            }
            let trans = partrans.to_lowercase();
            let trans = match trans.strip_prefix("tied_") {
                Some(parent) if !parent.is_empty() => {
                    data.tied.push((name.clone(), parent.to_string()));
                    "tied".to_string()
                }
                _ => one_of(path, line_no, "PARTRANS", partrans, &["fixed", "log", "none"])?,
            };
            let chglim = parchglim.to_lowercase();
            if !["factor", "relative", "absolute"].iter().any(|p| chglim.starts_with(p)) {
                return Err(TsError::reader(
                    path,
                    format!(
                        "line {line_no}: PARCHGLIM must be factor, relative or absolute(N), not \"{parchglim}\""
                    ),
                ));
            }
            if !groups.names.contains(&pargp.to_lowercase()) {
                return Err(TsError::reader(
                    path,
                    format!("line {line_no}: parameter group \"{pargp}\" is not in the parameter group file"),
                ));
            }
            let value = float(path, line_no, "PARVAL1", parval1)?;
            let lower = float(path, line_no, "PARLBND", parlbnd)?;
            let upper = float(path, line_no, "PARUBND", parubnd)?;
            if value < lower || value > upper {
                return Err(TsError::reader(
                    path,
                    format!("line {line_no}: {parnme} value {value} is outside [{lower}, {upper}]"),
                ));
            }
            data.lines.push(format!(
                "{name:<15} {trans:>10} {chglim:>15} {value:>15.6} {lower:>15.6} {upper:>15.6} {pargp:>10} {scale:>10} {offset:>10} {dercom:>10}"
            ));
            data.names.push(name);
        }
        for (child, parent) in &data.tied {
            if !data.names.contains(parent) {
                return Err(TsError::reader(
                    path,
                    format!("parameter {child} is tied to unknown parameter {parent}"),
                ));
            }
        }
        Ok(data)
    }

    pub fn count(&self) -> usize {
        self.names.len()
    }
}

/// Parameter names between `marker` pairs in a PEST template file
pub fn template_parameters(text: &str, path: &Path) -> TsResult<BTreeSet<String>> {
    let mut lines = text.lines();
    let header: Vec<&str> = lines.next().unwrap_or("").split_whitespace().collect();
    let [ptf, marker] = header.as_slice() else {
        return Err(TsError::reader(path, "template files start with \"ptf <marker>\""));
    };
    if !ptf.eq_ignore_ascii_case("ptf") || marker.chars().count() != 1 {
        return Err(TsError::reader(path, "template files start with \"ptf <marker>\""));
    }
    let marker = regex::escape(marker);
    let pattern = Regex::new(&format!("{marker}([^{marker}]+?){marker}"))
        .map_err(|e| TsError::reader(path, format!("bad template marker: {e}")))?;
    Ok(lines
        .flat_map(|line| {
            pattern
                .captures_iter(line)
                .filter_map(|c| c.get(1).map(|m| m.as_str().trim().to_lowercase()))
                .collect::<Vec<_>>()
        })
        .collect())
}

// ============================================================================
// CONTROL DATA
// ============================================================================

/// PEST control variables with their defaults
#[derive(Debug, Clone, PartialEq)]
pub struct ControlData {
    pub rstfle: String,
    pub pestmode: String,
    pub maxcompdim: String,
    pub derzerolim: String,
    pub precis: String,
    pub dpoint: String,
    pub numcom: i64,
    pub jacfile: i64,
    pub messfile: i64,
    pub obsreref: String,
    pub rlambda1: f64,
    pub rlamfac: f64,
    pub phiratsuf: f64,
    pub phiredlam: f64,
    pub numlam: i64,
    pub jacupdate: i64,
    pub lamforgive: String,
    pub derforgive: String,
    pub relparmax: f64,
    pub facparmax: f64,
    pub facorig: f64,
    pub absparmax: Vec<(usize, String)>,
    pub iboundstick: i64,
    pub upvecbend: i64,
    pub phiredswh: f64,
    pub noptswitch: i64,
    pub splitswh: i64,
    pub doaui: String,
    pub dosenreuse: String,
    pub boundscale: String,
    pub noptmax: i64,
    pub phiredstp: f64,
    pub nphistp: i64,
    pub nphinored: i64,
    pub relparstp: f64,
    pub nrelpar: i64,
    pub phistopthresh: f64,
    pub lastrun: i64,
    pub phiabandon: f64,
    pub icov: i64,
    pub icor: i64,
    pub ieig: i64,
    pub ires: i64,
    pub jcosave: String,
    pub verboserec: String,
    pub jcosaveitn: String,
    pub reisaveitn: String,
    pub parsaveitn: String,
    pub parsaverun: String,
    pub svdmode: i64,
    pub maxsing: Option<i64>,
    pub eigthresh: f64,
    pub eigwrite: i64,
    pub lsqrmode: i64,
    pub lsqr_atol: f64,
    pub lsqr_btol: f64,
    pub lsqr_conlim: f64,
    pub lsqr_itnlim: Option<i64>,
    pub lsqrwrite: i64,
}

/// Counts the control data section needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlCounts {
    pub npar: usize,
    pub nobs: usize,
    pub npargp: usize,
    pub nobsgp: usize,
    pub ntplfle: usize,
    pub nparsec: usize,
    pub nequation: usize,
}

fn word(params: &BlockParams, key: &str, default: &str, choices: &[&str]) -> TsResult<String> {
    Ok(params
        .opt_choice(key, choices)?
        .unwrap_or_else(|| default.to_string()))
}

impl ControlData {
    pub fn from_params(params: &BlockParams) -> TsResult<Self> {
        let doaui = word(params, "doaui", "aui", &["aui", "auid", "noaui"])?;
        let eigthresh = params.opt_f64("eigthresh")?.unwrap_or(0.0);
        if eigthresh > 0.0 && doaui != "noaui" {
            return Err(TsError::Validation(
                "a positive EIGTHRESH turns on truncated SVD, which needs DOAUI noaui".into(),
            ));
        }
        let svd = eigthresh > 0.0;
        let int = |key: &str, default: i64| -> TsResult<i64> {
            Ok(params.opt_parse::<i64>(key)?.unwrap_or(default))
        };
        let real = |key: &str, default: f64| -> TsResult<f64> {
            Ok(params.opt_f64(key)?.unwrap_or(default))
        };
        Ok(Self {
            rstfle: word(params, "rstfle", "restart", &["restart", "norestart"])?,
            pestmode: word(
                params,
                "pestmode",
                "estimation",
                &["estimation", "pareto", "prediction", "regularization"],
            )?,
            maxcompdim: params.opt_text("maxcompdim").unwrap_or("").to_string(),
            derzerolim: params.opt_text("derzerolim").unwrap_or("").to_string(),
            precis: word(params, "precis", "single", &["single", "double"])?,
            dpoint: word(params, "dpoint", "point", &["point", "nopoint"])?,
            numcom: int("numcom", 1)?,
            jacfile: int("jacfile", 0)?,
            messfile: int("messfile", 0)?,
            obsreref: word(params, "obsreref", "noobsreref", &["obsreref", "noobsreref"])?,
            rlambda1: real("rlambda1", 10.0)?,
            rlamfac: real("rlamfac", if svd { -3.0 } else { 2.0 })?,
            phiratsuf: real("phiratsuf", 0.3)?,
            phiredlam: real("phiredlam", 0.03)?,
            numlam: int("numlam", if svd { 1 } else { 10 })?,
            jacupdate: int("jacupdate", 999)?,
            lamforgive: word(params, "lamforgive", "nolamforgive", &["lamforgive", "nolamforgive"])?,
            derforgive: word(params, "derforgive", "noderforgive", &["derforgive", "noderforgive"])?,
            relparmax: real("relparmax", 5.0)?,
            facparmax: real("facparmax", 5.0)?,
            facorig: real("facorig", 1.0e-3)?,
            absparmax: params
                .numbered("absparmax_")
                .into_iter()
                .filter_map(|(n, v)| v.first().map(|s| (n, s.to_string())))
                .collect(),
            iboundstick: int("iboundstick", 0)?,
            upvecbend: int("upvecbend", 0)?,
            phiredswh: real("phiredswh", 0.1)?,
            noptswitch: int("noptswitch", 1)?,
            splitswh: int("splitswh", 0)?,
            doaui,
            dosenreuse: word(params, "dosenreuse", "nosenreuse", &["senreuse", "nosenreuse"])?,
            boundscale: word(params, "boundscale", "boundscale", &["boundscale", "noboundscale"])?,
            noptmax: int("noptmax", 30)?,
            phiredstp: real("phiredstp", 0.005)?,
            nphistp: int("nphistp", 4)?,
            nphinored: int("nphinored", 4)?,
            relparstp: real("relparstp", 0.005)?,
            nrelpar: int("nrelpar", 4)?,
            phistopthresh: real("phistopthresh", 0.0)?,
            lastrun: int("lastrun", 1)?,
            phiabandon: real("phiabandon", -1.0)?,
            icov: int("icov", 1)?,
            icor: int("icor", 1)?,
            ieig: int("ieig", 1)?,
            ires: int("ires", 0)?,
            jcosave: word(params, "jcosave", "jcosave", &["jcosave", "nojcosave"])?,
            verboserec: word(params, "verboserec", "verboserec", &["verboserec", "noverboserec"])?,
            jcosaveitn: word(params, "jcosaveitn", "nojcosaveitn", &["jcosaveitn", "nojcosaveitn"])?,
            reisaveitn: word(params, "reisaveitn", "reisaveitn", &["reisaveitn", "noreisaveitn"])?,
            parsaveitn: word(params, "parsaveitn", "noparsaveitn", &["parsaveitn", "noparsaveitn"])?,
            parsaverun: word(params, "parsaverun", "noparsaverun", &["parsaverun", "noparsaverun"])?,
            svdmode: int("svdmode", 1)?,
            maxsing: params.opt_parse::<i64>("maxsing")?,
            eigthresh,
            eigwrite: int("eigwrite", 1)?,
            lsqrmode: int("lsqrmode", 1)?,
            lsqr_atol: real("lsqr_atol", 1.0e-4)?,
            lsqr_btol: real("lsqr_btol", 1.0e-4)?,
            lsqr_conlim: real("lsqr_conlim", 1000.0)?,
            lsqr_itnlim: params.opt_parse::<i64>("lsqr_itnlim")?,
            lsqrwrite: int("lsqrwrite", 0)?,
        })
    }

    /// `pcf` header through the LSQR section
    pub fn render(&self, counts: &ControlCounts) -> String {
        let c = counts;
        let equations = if c.nequation > 0 {
            format!("nparsec={} nequation={}", c.nparsec, c.nequation)
        } else {
            String::new()
        };
        let absparmax: Vec<String> = self
            .absparmax
            .iter()
            .map(|(n, v)| format!("absparmax({n})={v}"))
            .collect();
        let rows = [
            "pcf".to_string(),
            "* control data".to_string(),
            format!("{} {}", self.rstfle, self.pestmode),
            format!(
                "{:>10} {:>10} {:>10} {:>10} {:>10} {:>10} {:>10} {}",
                c.npar, c.nobs, c.npargp, 0, c.nobsgp, self.maxcompdim, self.derzerolim, equations
            ),
            format!(
                "{:>10} {:>10} {:>10} {:>10} {:>10} {:>10} {:>10} {:>10}",
                c.ntplfle, 1, self.precis, self.dpoint, self.numcom, self.jacfile, self.messfile, self.obsreref
            ),
            format!(
                "{:>10.6} {:>10.6} {:>10.6} {:>10.6} {:>10} {:>10} {:>10} {:>10}",
                self.rlambda1,
                self.rlamfac,
                self.phiratsuf,
                self.phiredlam,
                self.numlam,
                self.jacupdate,
                self.lamforgive,
                self.derforgive
            ),
            format!(
                "{:>10.6} {:>10.6} {:>10.6} {:>10} {:>10} {}",
                self.relparmax,
                self.facparmax,
                self.facorig,
                self.iboundstick,
                self.upvecbend,
                absparmax.join(" ")
            ),
            format!(
                "{:>10.6} {:>10} {:>10} {:>10} {:>10} {:>10}",
                self.phiredswh, self.noptswitch, self.splitswh, self.doaui, self.dosenreuse, self.boundscale
            ),
            format!(
                "{:>10} {:>10.6} {:>10} {:>10} {:>10.6} {:>10} {:>10} {:>10} {:>10}",
                self.noptmax,
                self.phiredstp,
                self.nphistp,
                self.nphinored,
                self.relparstp,
                self.nrelpar,
                self.phistopthresh,
                self.lastrun,
                self.phiabandon
            ),
            format!(
                "{:>10} {:>10} {:>10} {:>10} {:>10} {:>10} {:>10} {:>10} {:>10} {:>10}",
                self.icov,
                self.icor,
                self.ieig,
                self.ires,
                self.jcosave,
                self.verboserec,
                self.jcosaveitn,
                self.reisaveitn,
                self.parsaveitn,
                self.parsaverun
            ),
        ];
        let mut out: Vec<String> = rows.iter().map(|r| r.trim_end().to_string()).collect();

        if self.eigthresh > 0.0 {
            out.push("* singular value decomposition".to_string());
            out.push(format!("{:>10}", self.svdmode));
            out.push(format!(
                "{:>10} {:>15.6}",
                self.maxsing.unwrap_or(c.npar as i64),
                self.eigthresh
            ));
            out.push(format!("{:>10}", self.eigwrite));
        }
        out.push("* lsqr".to_string());
        out.push(format!("{:>10}", self.lsqrmode));
        out.push(format!(
            "{:>10} {:>10} {:>10} {:>10}",
            self.lsqr_atol,
            self.lsqr_btol,
            self.lsqr_conlim,
            self.lsqr_itnlim.unwrap_or(4 * c.npar as i64)
        ));
        out.push(format!("{:>10}", self.lsqrwrite));
        out.join("\n")
    }
}

// ============================================================================
// COMMAND
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct WritePestFiles {
    pub line: usize,
    pub control_file: String,
    pub instruction_file: String,
    pub templates: Vec<(String, String)>,
    pub parameter_group_file: String,
    pub parameter_data_file: String,
    pub pairs: Vec<WeightedPair>,
    pub model_command_line: String,
    pub control: ControlData,
}

/// Everything that goes into the control file, read and checked
struct Assembled {
    counts: ControlCounts,
    groups: ParameterGroups,
    data: ParameterData,
    observation_groups: Vec<String>,
    observations: Vec<String>,
}

impl WritePestFiles {
    fn require<'a>(params: &'a BlockParams, key: &str) -> TsResult<&'a str> {
        params.opt_text(key).ok_or_else(|| TsError::MissingArgument {
            command: params.command().to_string(),
            line: params.line(),
            missing: vec![key.to_uppercase()],
        })
    }

    fn assemble(&self, session: &Session, listing: &Listing) -> TsResult<Assembled> {
        let mut template_names = BTreeSet::new();
        for (tpl, _) in &self.templates {
            let path = session.resolve_path(tpl);
            template_names.extend(template_parameters(&read_file(&path)?, &path)?);
        }

        let group_path = session.resolve_path(&self.parameter_group_file);
        let groups = ParameterGroups::parse(&read_file(&group_path)?, &group_path)?;
        let data_path = session.resolve_path(&self.parameter_data_file);
        let data = ParameterData::parse(&read_file(&data_path)?, &data_path, &groups)?;

        let unknown: Vec<&String> = template_names
            .iter()
            .filter(|n| !data.names.contains(n) && !data.secondary.contains(*n))
            .collect();
        if !unknown.is_empty() {
            warn!(
                parameters = ?unknown,
                "template parameters missing from the parameter data file"
            );
        }

        let mut observation_groups: Vec<String> = Vec::new();
        let mut observations = Vec::new();
        for pair in &self.pairs {
            let group = pair.model.lower();
            if !observation_groups.contains(&group) {
                observation_groups.push(group);
            }
            observations.extend(pair.observation_lines(&session.store, listing)?);
        }
        debug!(
            parameters = data.count(),
            observations = observations.len(),
            templates = template_names.len(),
            "assembled PEST control file"
        );

        Ok(Assembled {
            counts: ControlCounts {
                npar: data.count(),
                nobs: observations.len(),
                npargp: groups.names.len(),
                nobsgp: observation_groups.len(),
                ntplfle: self.templates.len(),
                nparsec: data.secondary.len(),
                nequation: data.equations.len(),
            },
            groups,
            data,
            observation_groups,
            observations,
        })
    }

    fn render(&self, parts: &Assembled, listing_file: &Path) -> String {
        let mut out = self.control.render(&parts.counts);
        section(&mut out, "* parameter groups", &parts.groups.lines);
        let mut parameter_lines = parts.data.lines.clone();
        parameter_lines.extend(parts.data.equations.iter().cloned());
        parameter_lines.extend(
            parts
                .data
                .tied
                .iter()
                .map(|(child, parent)| format!("{child:<15} {parent:>10}")),
        );
        section(&mut out, "* parameter data", &parameter_lines);
        section(&mut out, "* observation groups", &parts.observation_groups);
        section(&mut out, "* observation data", &parts.observations);
        section(
            &mut out,
            "* model command line",
            std::slice::from_ref(&self.model_command_line),
        );
        let mut io: Vec<String> = self
            .templates
            .iter()
            .map(|(tpl, input)| format!("{tpl} {input}"))
            .collect();
        io.push(format!("{} {}", self.instruction_file, listing_file.display()));
        section(&mut out, "* model input/output", &io);
        out.push('\n');
        out
    }
}

fn section(out: &mut String, title: &str, lines: &[String]) {
    let _ = write!(out, "\n{title}");
    for line in lines {
        let _ = write!(out, "\n{line}");
    }
}

impl BlockCommand for WritePestFiles {
    fn from_params(params: &BlockParams, _dates: &DateFormat) -> TsResult<Self> {
        let templates = params.entries("template_file");
        let inputs = params.entries("model_input_file");
        if templates.is_empty() {
            return Err(TsError::Validation(
                "WRITE_PEST_FILES needs at least one TEMPLATE_FILE".into(),
            ));
        }
        if templates.len() != inputs.len() {
            return Err(TsError::Validation(format!(
                "{} TEMPLATE_FILE entries but {} MODEL_INPUT_FILE entries",
                templates.len(),
                inputs.len()
            )));
        }
        Ok(Self {
            line: params.line(),
            control_file: params.text("new_pest_control_file")?.to_string(),
            instruction_file: params.text("new_instruction_file")?.to_string(),
            templates: templates
                .into_iter()
                .zip(inputs)
                .map(|(t, i)| (t.to_string(), i.to_string()))
                .collect(),
            parameter_group_file: Self::require(params, "parameter_group_file")?.to_string(),
            parameter_data_file: Self::require(params, "parameter_data_file")?.to_string(),
            pairs: WeightedPair::collect(params)?,
            model_command_line: params
                .joined("model_command_line")
                .ok_or_else(|| TsError::MissingArgument {
                    command: params.command().to_string(),
                    line: params.line(),
                    missing: vec!["MODEL_COMMAND_LINE".into()],
                })?,
            control: ControlData::from_params(params)?,
        })
    }

    fn execute(self, session: &mut Session) -> TsResult<()> {
        let listing = session.last_listing.as_ref().ok_or_else(|| TsError::Ordering {
            line: self.line,
            message: "WRITE_PEST_FILES needs a LIST_OUTPUT block to run first".into(),
        })?;
        let parts = self.assemble(session, listing)?;
        let control = self.render(&parts, &listing.file);

        let ins_path: PathBuf = session.resolve_path(&self.instruction_file);
        std::fs::write(&ins_path, listing.instructions()).map_err(|e| TsError::io(&ins_path, e))?;
        let pcf_path = session.resolve_path(&self.control_file);
        std::fs::write(&pcf_path, control).map_err(|e| TsError::io(&pcf_path, e))?;

        info!(
            control = %pcf_path.display(),
            instructions = %ins_path.display(),
            parameters = parts.counts.npar,
            observations = parts.counts.nobs,
            "wrote PEST files"
        );
        Ok(())
    }
}
