//! The five auxiliary table kinds and their metadata

use chrono::NaiveDateTime;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Comparison statistics between a simulated and an observed series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CTable {
    /// Statistic label to value, in computation order
    pub stats: IndexMap<String, f64>,
    pub obs_name: String,
    pub sim_name: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub num_terms: usize,
}

/// Summary statistics of one series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct STable {
    pub stats: IndexMap<String, f64>,
    pub source_name: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub log_transformed: bool,
    pub exponent: f64,
}

/// One integrated volume over `[start, end]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolumeRow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub volume: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VTable {
    pub rows: Vec<VolumeRow>,
    pub source_name: String,
}

/// Side of the threshold that counts as exceedance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Over,
    Under,
}

impl Direction {
    pub fn parse(text: &str) -> Option<Direction> {
        match text.trim().to_lowercase().as_str() {
            "over" | "above" => Some(Direction::Over),
            "under" | "below" => Some(Direction::Under),
            _ => None,
        }
    }

    /// Word used in report headers
    pub fn describe(&self) -> &'static str {
        match self {
            Direction::Over => "above",
            Direction::Under => "below",
        }
    }
}

/// One `(threshold, delay)` row: time spent past the threshold and the
/// fraction of the whole period that represents
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExceedanceRow {
    pub threshold: f64,
    pub delay: f64,
    pub duration: f64,
    pub fraction: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ETable {
    pub rows: Vec<ExceedanceRow>,
    pub source_name: String,
    pub units: String,
    pub direction: Direction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GTableKind {
    FlowDuration,
    HydrologicIndices,
}

/// Row key of a g_table: an exceedance probability (as a fraction) or an
/// index label such as `MA12`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GKey {
    Probability(f64),
    Label(String),
}

impl GKey {
    pub fn label(&self) -> String {
        match self {
            GKey::Probability(p) => format!("{:.2}%", p * 100.0),
            GKey::Label(l) => l.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GTable {
    pub rows: Vec<(GKey, f64)>,
    pub source_name: String,
    pub kind: GTableKind,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl GTable {
    pub fn get(&self, label: &str) -> Option<f64> {
        self.rows
            .iter()
            .find(|(k, _)| matches!(k, GKey::Label(l) if l.eq_ignore_ascii_case(label)))
            .map(|(_, v)| *v)
    }
}
