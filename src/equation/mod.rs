//! Equation evaluation
//!
//! SERIES_EQUATION and the PEST weight equations are parsed once into an
//! [`Expr`] tree and evaluated against an [`EquationContext`]. Leaves are
//! numbers, entity names and a few `@_` specials; nothing is ever evaluated
//! as host code.
//!
//! Operand kinds combine as follows:
//!
//! | lhs \ rhs | Scalar | Series | Vector |
//! |-----------|--------|--------|--------|
//! | Scalar    | Scalar | Series | Vector |
//! | Series    | Series | Series (union index) | error |
//! | Vector    | Vector | error  | Vector (equal lengths) |

pub mod parser;

use std::collections::{BTreeSet, HashMap};

use chrono::{Datelike, NaiveDateTime};

use crate::error::{TsError, TsResult};
use crate::store::{EntityName, EntityStore, TimeSeries};

pub use parser::parse_equation;

// ============================================================================
// AST
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinOp {
    fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            BinOp::Add => a + b,
            BinOp::Sub => a - b,
            BinOp::Mul => a * b,
            BinOp::Div => a / b,
            BinOp::Pow => a.powf(b),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Func {
    Abs,
    Sqrt,
    Exp,
    Log,
    Log10,
    Sin,
    Cos,
    Tan,
}

impl Func {
    pub fn from_name(name: &str) -> Option<Func> {
        match name.to_lowercase().as_str() {
            "abs" => Some(Func::Abs),
            "sqrt" => Some(Func::Sqrt),
            "exp" => Some(Func::Exp),
            "log" | "ln" => Some(Func::Log),
            "log10" => Some(Func::Log10),
            "sin" => Some(Func::Sin),
            "cos" => Some(Func::Cos),
            "tan" => Some(Func::Tan),
            _ => None,
        }
    }

    fn apply(self, x: f64) -> f64 {
        match self {
            Func::Abs => x.abs(),
            Func::Sqrt => x.sqrt(),
            Func::Exp => x.exp(),
            Func::Log => x.ln(),
            Func::Log10 => x.log10(),
            Func::Sin => x.sin(),
            Func::Cos => x.cos(),
            Func::Tan => x.tan(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    /// Entity reference
    Name(String),
    /// `@_days_start_year`: day of year of each timestamp of the reference series
    DayOfYear,
    /// `@_days_"mm/dd/yyyy_hh:mm:ss"`: fractional days since a date
    DaysSince(NaiveDateTime),
    /// `@_abs_value`: absolute observation value in weight equations
    AbsValue,
    Neg(Box<Expr>),
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        func: Func,
        arg: Box<Expr>,
    },
}

impl Expr {
    /// Entity names in the order they appear
    pub fn names(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_names(&mut out);
        out
    }

    fn collect_names<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Name(n) => out.push(n),
            Expr::Neg(e) | Expr::Call { arg: e, .. } => e.collect_names(out),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.collect_names(out);
                rhs.collect_names(out);
            }
            _ => {}
        }
    }

    fn uses_dates(&self) -> bool {
        match self {
            Expr::DayOfYear | Expr::DaysSince(_) => true,
            Expr::Neg(e) | Expr::Call { arg: e, .. } => e.uses_dates(),
            Expr::Binary { lhs, rhs, .. } => lhs.uses_dates() || rhs.uses_dates(),
            _ => false,
        }
    }
}

// ============================================================================
// OPERANDS
// ============================================================================

/// Value of a sub-expression
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Scalar(f64),
    Series(TimeSeries),
    /// Values of a table column
    Vector(Vec<f64>),
}

impl Operand {
    fn kind(&self) -> &'static str {
        match self {
            Operand::Scalar(_) => "scalar",
            Operand::Series(_) => "series",
            Operand::Vector(_) => "table column",
        }
    }

    fn map(self, f: impl Fn(f64) -> f64) -> TsResult<Operand> {
        Ok(match self {
            Operand::Scalar(v) => Operand::Scalar(f(v)),
            Operand::Series(s) => Operand::Series(finite_only(s.iter().map(|(t, v)| (t, v.map(&f))))?),
            Operand::Vector(v) => Operand::Vector(v.into_iter().map(f).collect()),
        })
    }

    fn combine(self, op: BinOp, rhs: Operand) -> TsResult<Operand> {
        use Operand::*;
        match (self, rhs) {
            (Scalar(a), Scalar(b)) => Ok(Scalar(op.apply(a, b))),
            (Scalar(a), other) => other.map(|b| op.apply(a, b)),
            (other, Scalar(b)) => other.map(|a| op.apply(a, b)),
            (Series(a), Series(b)) => {
                let index: BTreeSet<NaiveDateTime> =
                    a.index().iter().chain(b.index().iter()).copied().collect();
                let points = index.into_iter().map(|t| {
                    let v = match (a.value_at(&t), b.value_at(&t)) {
                        (Some(x), Some(y)) => Some(op.apply(x, y)),
                        _ => None,
                    };
                    (t, v)
                });
                Ok(Series(finite_only(points)?))
            }
            (Vector(a), Vector(b)) => {
                if a.len() != b.len() {
                    return Err(TsError::Equation(format!(
                        "table columns have different lengths ({} and {})",
                        a.len(),
                        b.len()
                    )));
                }
                Ok(Vector(
                    a.into_iter().zip(b).map(|(x, y)| op.apply(x, y)).collect(),
                ))
            }
            (l, r) => Err(TsError::Equation(format!(
                "cannot combine a {} with a {}",
                l.kind(),
                r.kind()
            ))),
        }
    }
}

/// Non-finite results become missing values
fn finite_only(points: impl Iterator<Item = (NaiveDateTime, Option<f64>)>) -> TsResult<TimeSeries> {
    let (index, values): (Vec<_>, Vec<_>) = points
        .map(|(t, v)| (t, v.filter(|x| x.is_finite())))
        .unzip();
    TimeSeries::new(index, values)
}

// ============================================================================
// EVALUATION
// ============================================================================

/// Resolves entity names to operands
pub trait EquationContext {
    fn lookup(&self, name: &str) -> TsResult<Operand>;
}

impl EquationContext for EntityStore {
    /// Series first, then the table kinds; names are case-insensitive
    fn lookup(&self, name: &str) -> TsResult<Operand> {
        let key = EntityName::new(name);
        if self.has_series(&key) {
            return self.series(&key).map(Operand::Series);
        }
        if let Ok(t) = self.c_tables.get(&key) {
            return Ok(Operand::Vector(t.stats.values().copied().collect()));
        }
        if let Ok(t) = self.s_tables.get(&key) {
            return Ok(Operand::Vector(t.stats.values().copied().collect()));
        }
        if let Ok(t) = self.v_tables.get(&key) {
            return Ok(Operand::Vector(t.rows.iter().map(|r| r.volume).collect()));
        }
        if let Ok(t) = self.e_tables.get(&key) {
            return Ok(Operand::Vector(t.rows.iter().map(|r| r.duration).collect()));
        }
        if let Ok(t) = self.g_tables.get(&key) {
            return Ok(Operand::Vector(t.rows.iter().map(|(_, v)| *v).collect()));
        }
        Err(TsError::Equation(format!("'{name}' is not a named entity")))
    }
}

/// Fixed name bindings, used for weight equations and tests
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    values: HashMap<String, Operand>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: Operand) -> Self {
        self.values.insert(name.to_uppercase(), value);
        self
    }
}

impl EquationContext for Bindings {
    fn lookup(&self, name: &str) -> TsResult<Operand> {
        self.values
            .get(&name.to_uppercase())
            .cloned()
            .ok_or_else(|| TsError::Equation(format!("'{name}' is not defined")))
    }
}

/// Evaluates one parsed equation
pub struct Evaluator<'a, C: EquationContext + ?Sized> {
    context: &'a C,
    abs_value: Option<f64>,
    resolved: HashMap<String, Operand>,
    reference: Option<TimeSeries>,
}

impl<'a, C: EquationContext + ?Sized> Evaluator<'a, C> {
    pub fn new(context: &'a C) -> Self {
        Self {
            context,
            abs_value: None,
            resolved: HashMap::new(),
            reference: None,
        }
    }

    /// Value bound to `@_abs_value`
    pub fn with_abs_value(mut self, value: f64) -> Self {
        self.abs_value = Some(value);
        self
    }

    pub fn evaluate(mut self, expr: &Expr) -> TsResult<Operand> {
        for name in expr.names() {
            let key = name.to_uppercase();
            if self.resolved.contains_key(&key) {
                continue;
            }
            let operand = self.context.lookup(name)?;
            if self.reference.is_none() {
                if let Operand::Series(s) = &operand {
                    self.reference = Some(s.clone());
                }
            }
            self.resolved.insert(key, operand);
        }
        if expr.uses_dates() && self.reference.is_none() {
            return Err(TsError::Equation(
                "date specials need at least one series in the equation".to_string(),
            ));
        }
        self.eval(expr)
    }

    fn eval(&self, expr: &Expr) -> TsResult<Operand> {
        match expr {
            Expr::Number(v) => Ok(Operand::Scalar(*v)),
            Expr::Name(n) => self
                .resolved
                .get(&n.to_uppercase())
                .cloned()
                .ok_or_else(|| TsError::Equation(format!("'{n}' is not defined"))),
            Expr::AbsValue => self.abs_value.map(Operand::Scalar).ok_or_else(|| {
                TsError::Equation("@_abs_value is only valid in weight equations".to_string())
            }),
            Expr::DayOfYear => self.date_series(|t| f64::from(t.ordinal())),
            Expr::DaysSince(origin) => {
                let origin = *origin;
                self.date_series(move |t| (t - origin).num_seconds() as f64 / 86_400.0)
            }
            Expr::Neg(e) => self.eval(e)?.map(|v| -v),
            Expr::Call { func, arg } => {
                let func = *func;
                self.eval(arg)?.map(move |v| func.apply(v))
            }
            Expr::Binary { op, lhs, rhs } => self.eval(lhs)?.combine(*op, self.eval(rhs)?),
        }
    }

    fn date_series(&self, f: impl Fn(NaiveDateTime) -> f64) -> TsResult<Operand> {
        let Some(reference) = &self.reference else {
            return Err(TsError::Equation(
                "date specials need at least one series in the equation".to_string(),
            ));
        };
        let values = reference.index().iter().map(|t| Some(f(*t))).collect();
        reference.with_values(values).map(Operand::Series)
    }
}

/// Parse and evaluate in one step
pub fn evaluate_str<C: EquationContext + ?Sized>(source: &str, context: &C) -> TsResult<Operand> {
    let expr = parse_equation(source)?;
    Evaluator::new(context).evaluate(&expr)
}
