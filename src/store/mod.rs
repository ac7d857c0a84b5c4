//! Entity Store
//!
//! Owns every named entity produced during a run. Series sharing a sampling
//! frequency live together in one aligned [`FrequencyTable`]; each of the five
//! table kinds has its own [`Namespace`]. Names are normalized to uppercase
//! once, when an [`EntityName`] is built.
//!
//! A name can be created only once per namespace. Replacing an entity means
//! erasing it first (COPY/MOVE with OVERWRITE do exactly that).

pub mod series;
pub mod tables;

use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDateTime;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;
use ts_types::EntityKind;

use crate::error::{TsError, TsResult};

pub use series::{Frequency, TimeSeries};
pub use tables::{
    CTable, Direction, ETable, ExceedanceRow, GKey, GTable, GTableKind, STable, VTable, VolumeRow,
};

// ============================================================================
// NAMES
// ============================================================================

/// Uppercase-normalized entity name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityName(String);

impl EntityName {
    pub fn new(name: &str) -> Self {
        EntityName(name.trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn lower(&self) -> String {
        self.0.to_lowercase()
    }
}

impl fmt::Display for EntityName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityName {
    fn from(name: &str) -> Self {
        EntityName::new(name)
    }
}

// ============================================================================
// NAMESPACE
// ============================================================================

/// One uniqueness domain of named entities
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Namespace<T> {
    kind: EntityKind,
    entries: IndexMap<EntityName, T>,
}

impl<T: Clone> Namespace<T> {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            entries: IndexMap::new(),
        }
    }

    pub fn insert(&mut self, name: &EntityName, value: T) -> TsResult<()> {
        if self.entries.contains_key(name) {
            return Err(TsError::DuplicateEntity {
                kind: self.kind,
                name: name.to_string(),
            });
        }
        self.entries.insert(name.clone(), value);
        Ok(())
    }

    pub fn get(&self, name: &EntityName) -> TsResult<&T> {
        self.entries.get(name).ok_or_else(|| TsError::MissingEntity {
            kind: self.kind,
            name: name.to_string(),
        })
    }

    pub fn remove(&mut self, name: &EntityName) -> TsResult<T> {
        self.entries
            .shift_remove(name)
            .ok_or_else(|| TsError::MissingEntity {
                kind: self.kind,
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &EntityName) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &EntityName> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// SERIES TABLES
// ============================================================================

/// All series of one frequency, aligned on the union of their timestamps
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FrequencyTable {
    index: Vec<NaiveDateTime>,
    columns: IndexMap<EntityName, Vec<Option<f64>>>,
}

impl FrequencyTable {
    fn join(&mut self, name: &EntityName, series: &TimeSeries) {
        let union: BTreeSet<NaiveDateTime> = self
            .index
            .iter()
            .chain(series.index().iter())
            .copied()
            .collect();
        let union: Vec<NaiveDateTime> = union.into_iter().collect();
        if union.len() != self.index.len() {
            for column in self.columns.values_mut() {
                *column = realign(&self.index, column, &union);
            }
            self.index = union;
        }
        let column = realign(series.index(), series.values(), &self.index);
        self.columns.insert(name.clone(), column);
    }

    fn column(&self, name: &EntityName) -> Option<&Vec<Option<f64>>> {
        self.columns.get(name)
    }

    fn drop_column(&mut self, name: &EntityName) {
        self.columns.shift_remove(name);
        if self.columns.is_empty() {
            self.index.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

fn realign(
    from_index: &[NaiveDateTime],
    values: &[Option<f64>],
    to_index: &[NaiveDateTime],
) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(to_index.len());
    let mut j = 0;
    for ts in to_index {
        while j < from_index.len() && from_index[j] < *ts {
            j += 1;
        }
        if j < from_index.len() && from_index[j] == *ts {
            out.push(values[j]);
        } else {
            out.push(None);
        }
    }
    out
}

/// Per-series bookkeeping: which table it lives in and its validity range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesMeta {
    pub frequency: Frequency,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

// ============================================================================
// ENTITY STORE
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityStore {
    frames: IndexMap<String, FrequencyTable>,
    series: IndexMap<EntityName, SeriesMeta>,
    pub c_tables: Namespace<CTable>,
    pub s_tables: Namespace<STable>,
    pub v_tables: Namespace<VTable>,
    pub e_tables: Namespace<ETable>,
    pub g_tables: Namespace<GTable>,
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityStore {
    pub fn new() -> Self {
        Self {
            frames: IndexMap::new(),
            series: IndexMap::new(),
            c_tables: Namespace::new(EntityKind::CTable),
            s_tables: Namespace::new(EntityKind::STable),
            v_tables: Namespace::new(EntityKind::VTable),
            e_tables: Namespace::new(EntityKind::ETable),
            g_tables: Namespace::new(EntityKind::GTable),
        }
    }

    // ------------------------------------------------------------------------
    // Series
    // ------------------------------------------------------------------------

    /// Add a new series. Leading/trailing nulls are trimmed, the frequency is
    /// inferred and the series is aligned into its frequency's table.
    pub fn join_series(&mut self, name: &EntityName, series: TimeSeries) -> TsResult<()> {
        if self.series.contains_key(name) {
            return Err(TsError::DuplicateEntity {
                kind: EntityKind::Series,
                name: name.to_string(),
            });
        }
        let series = series.trimmed();
        let (Some(start), Some(end)) = (series.first_valid(), series.last_valid()) else {
            return Err(TsError::Validation(format!(
                "series {name} would have no values"
            )));
        };
        let frequency = series.frequency();
        let series = series.regularized(frequency);
        let code = frequency.code();
        debug!(series = %name, frequency = %code, points = series.len(), "joining series");
        self.frames
            .entry(code)
            .or_default()
            .join(name, &series);
        self.series.insert(
            name.clone(),
            SeriesMeta {
                frequency,
                start,
                end,
            },
        );
        Ok(())
    }

    /// The named series restricted to its validity range
    pub fn series(&self, name: &EntityName) -> TsResult<TimeSeries> {
        let meta = self.series_meta(name)?;
        let table = self.frames.get(&meta.frequency.code());
        let column = table.and_then(|t| t.column(name).map(|c| (t, c)));
        let Some((table, column)) = column else {
            return Err(TsError::MissingEntity {
                kind: EntityKind::Series,
                name: name.to_string(),
            });
        };
        let points = table
            .index
            .iter()
            .zip(column.iter())
            .filter(|(ts, _)| **ts >= meta.start && **ts <= meta.end)
            .map(|(ts, v)| (*ts, *v));
        let (index, values): (Vec<_>, Vec<_>) = if meta.frequency == Frequency::Irregular {
            points.filter(|(_, v)| v.is_some()).unzip()
        } else {
            points.unzip()
        };
        TimeSeries::new(index, values)
    }

    pub fn series_meta(&self, name: &EntityName) -> TsResult<&SeriesMeta> {
        self.series.get(name).ok_or_else(|| TsError::MissingEntity {
            kind: EntityKind::Series,
            name: name.to_string(),
        })
    }

    pub fn has_series(&self, name: &EntityName) -> bool {
        self.series.contains_key(name)
    }

    pub fn series_names(&self) -> impl Iterator<Item = &EntityName> {
        self.series.keys()
    }

    pub fn erase_series(&mut self, name: &EntityName) -> TsResult<()> {
        let meta = self
            .series
            .shift_remove(name)
            .ok_or_else(|| TsError::MissingEntity {
                kind: EntityKind::Series,
                name: name.to_string(),
            })?;
        let code = meta.frequency.code();
        if let Some(table) = self.frames.get_mut(&code) {
            table.drop_column(name);
            if table.is_empty() {
                self.frames.shift_remove(&code);
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Any kind
    // ------------------------------------------------------------------------

    pub fn contains(&self, kind: EntityKind, name: &EntityName) -> bool {
        match kind {
            EntityKind::Series => self.has_series(name),
            EntityKind::CTable => self.c_tables.contains(name),
            EntityKind::STable => self.s_tables.contains(name),
            EntityKind::VTable => self.v_tables.contains(name),
            EntityKind::ETable => self.e_tables.contains(name),
            EntityKind::GTable => self.g_tables.contains(name),
        }
    }

    pub fn erase(&mut self, kind: EntityKind, name: &EntityName) -> TsResult<()> {
        debug!(kind = %kind, name = %name, "erasing entity");
        match kind {
            EntityKind::Series => self.erase_series(name),
            EntityKind::CTable => self.c_tables.remove(name).map(drop),
            EntityKind::STable => self.s_tables.remove(name).map(drop),
            EntityKind::VTable => self.v_tables.remove(name).map(drop),
            EntityKind::ETable => self.e_tables.remove(name).map(drop),
            EntityKind::GTable => self.g_tables.remove(name).map(drop),
        }
    }

    /// Copy an entity under a new name. With `overwrite`, an existing target
    /// is erased first; otherwise an existing target is a duplicate error.
    pub fn copy(
        &mut self,
        kind: EntityKind,
        from: &EntityName,
        to: &EntityName,
        overwrite: bool,
    ) -> TsResult<()> {
        if !self.contains(kind, from) {
            return Err(TsError::MissingEntity {
                kind,
                name: from.to_string(),
            });
        }
        if overwrite && self.contains(kind, to) {
            self.erase(kind, to)?;
        }
        match kind {
            EntityKind::Series => {
                let series = self.series(from)?;
                self.join_series(to, series)
            }
            EntityKind::CTable => {
                let t = self.c_tables.get(from)?.clone();
                self.c_tables.insert(to, t)
            }
            EntityKind::STable => {
                let t = self.s_tables.get(from)?.clone();
                self.s_tables.insert(to, t)
            }
            EntityKind::VTable => {
                let t = self.v_tables.get(from)?.clone();
                self.v_tables.insert(to, t)
            }
            EntityKind::ETable => {
                let t = self.e_tables.get(from)?.clone();
                self.e_tables.insert(to, t)
            }
            EntityKind::GTable => {
                let t = self.g_tables.get(from)?.clone();
                self.g_tables.insert(to, t)
            }
        }
    }

    /// Copy then erase the source
    pub fn rename(
        &mut self,
        kind: EntityKind,
        from: &EntityName,
        to: &EntityName,
        overwrite: bool,
    ) -> TsResult<()> {
        if from == to {
            return self
                .contains(kind, from)
                .then_some(())
                .ok_or_else(|| TsError::MissingEntity {
                    kind,
                    name: from.to_string(),
                });
        }
        self.copy(kind, from, to, overwrite)?;
        self.erase(kind, from)
    }

    /// Names per kind, for run summaries
    pub fn summary(&self) -> StoreSummary {
        StoreSummary {
            series: self
                .series
                .iter()
                .map(|(name, meta)| SeriesSummary {
                    name: name.to_string(),
                    frequency: meta.frequency.code(),
                    start: meta.start,
                    end: meta.end,
                })
                .collect(),
            c_tables: self.c_tables.names().map(ToString::to_string).collect(),
            s_tables: self.s_tables.names().map(ToString::to_string).collect(),
            v_tables: self.v_tables.names().map(ToString::to_string).collect(),
            e_tables: self.e_tables.names().map(ToString::to_string).collect(),
            g_tables: self.g_tables.names().map(ToString::to_string).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesSummary {
    pub name: String,
    pub frequency: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// Serializable overview of the store contents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSummary {
    pub series: Vec<SeriesSummary>,
    pub c_tables: Vec<String>,
    pub s_tables: Vec<String>,
    pub v_tables: Vec<String>,
    pub e_tables: Vec<String>,
    pub g_tables: Vec<String>,
}
