//! COPY, MOVE and ERASE_ENTITY

use tracing::info;
use ts_types::EntityKind;

use crate::datetime::DateFormat;
use crate::engine::params::BlockParams;
use crate::error::{TsError, TsResult};
use crate::store::EntityName;

use super::{BlockCommand, Session};

/// The single `<kind>_NAME` keyword of a COPY/MOVE block
fn single_source(params: &BlockParams) -> TsResult<(EntityKind, EntityName)> {
    let named: Vec<(EntityKind, EntityName)> = EntityKind::all()
        .into_iter()
        .filter_map(|kind| params.opt_entity(kind.name_keyword()).map(|n| (kind, n)))
        .collect();
    match named.as_slice() {
        [one] => Ok(one.clone()),
        _ => Err(TsError::Validation(format!(
            "{} needs exactly one of SERIES_NAME, C_TABLE_NAME, S_TABLE_NAME, \
             V_TABLE_NAME, E_TABLE_NAME or G_TABLE_NAME (found {})",
            params.command(),
            named.len()
        ))),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CopyEntity {
    pub kind: EntityKind,
    pub source: EntityName,
    pub target: EntityName,
    pub overwrite: bool,
}

impl BlockCommand for CopyEntity {
    fn from_params(params: &BlockParams, _dates: &DateFormat) -> TsResult<Self> {
        let (kind, source) = single_source(params)?;
        Ok(Self {
            kind,
            source,
            target: params.entity("new_entity_name")?,
            overwrite: params.flag("overwrite")?,
        })
    }

    fn execute(self, session: &mut Session) -> TsResult<()> {
        info!(kind = %self.kind, from = %self.source, to = %self.target, "copy");
        session
            .store
            .copy(self.kind, &self.source, &self.target, self.overwrite)
    }
}

/// Copy, then erase the source
#[derive(Debug, Clone, PartialEq)]
pub struct MoveEntity(pub CopyEntity);

impl BlockCommand for MoveEntity {
    fn from_params(params: &BlockParams, dates: &DateFormat) -> TsResult<Self> {
        CopyEntity::from_params(params, dates).map(MoveEntity)
    }

    fn execute(self, session: &mut Session) -> TsResult<()> {
        let CopyEntity {
            kind,
            source,
            target,
            overwrite,
        } = self.0;
        info!(kind = %kind, from = %source, to = %target, "move");
        session.store.rename(kind, &source, &target, overwrite)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EraseEntity {
    pub targets: Vec<(EntityKind, EntityName)>,
}

impl BlockCommand for EraseEntity {
    fn from_params(params: &BlockParams, _dates: &DateFormat) -> TsResult<Self> {
        let targets: Vec<(EntityKind, EntityName)> = EntityKind::all()
            .into_iter()
            .flat_map(|kind| {
                params
                    .entities(kind.name_keyword())
                    .into_iter()
                    .map(move |n| (kind, n))
            })
            .collect();
        if targets.is_empty() {
            return Err(TsError::Validation(
                "ERASE_ENTITY needs at least one entity name".into(),
            ));
        }
        Ok(Self { targets })
    }

    fn execute(self, session: &mut Session) -> TsResult<()> {
        // all or nothing: a missing name leaves the store untouched
        if let Some((kind, name)) = self
            .targets
            .iter()
            .find(|(kind, name)| !session.store.contains(*kind, name))
        {
            return Err(TsError::MissingEntity {
                kind: *kind,
                name: name.to_string(),
            });
        }
        for (kind, name) in &self.targets {
            session.store.erase(*kind, name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{STable, TimeSeries};
    use chrono::NaiveDate;
    use indexmap::IndexMap;
    use ts_types::ParamValue;

    fn session_with_series() -> Session {
        let mut session = Session::new(".");
        let t0 = NaiveDate::from_ymd_opt(2020, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let series = TimeSeries::from_values(vec![(t0, 1.0)]).unwrap();
        session.store.join_series(&"FLOW".into(), series).unwrap();
        session
    }

    fn params(command: &str, pairs: &[(&str, &str)]) -> BlockParams {
        BlockParams::from_pairs(
            command,
            3,
            pairs.iter().map(|(k, v)| (*k, ParamValue::scalar(*v))),
        )
    }

    #[test]
    fn test_copy_needs_exactly_one_source() {
        let dates = DateFormat::default();
        let none = params("COPY", &[("new_entity_name", "x")]);
        assert!(CopyEntity::from_params(&none, &dates).is_err());
        let two = params(
            "COPY",
            &[
                ("new_entity_name", "x"),
                ("series_name", "a"),
                ("s_table_name", "b"),
            ],
        );
        assert!(CopyEntity::from_params(&two, &dates).is_err());
    }

    #[test]
    fn test_move_renames_series() {
        let mut session = session_with_series();
        let p = params("MOVE", &[("new_entity_name", "q"), ("series_name", "flow")]);
        MoveEntity::from_params(&p, &DateFormat::default())
            .unwrap()
            .execute(&mut session)
            .unwrap();
        assert!(session.store.has_series(&"Q".into()));
        assert!(!session.store.has_series(&"FLOW".into()));
    }

    #[test]
    fn test_copy_overwrite() {
        let mut session = session_with_series();
        let t0 = NaiveDate::from_ymd_opt(2020, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        session
            .store
            .join_series(&"OTHER".into(), TimeSeries::from_values(vec![(t0, 9.0)]).unwrap())
            .unwrap();
        let plain = params("COPY", &[("new_entity_name", "other"), ("series_name", "flow")]);
        let err = CopyEntity::from_params(&plain, &DateFormat::default())
            .unwrap()
            .execute(&mut session)
            .unwrap_err();
        assert!(matches!(err, TsError::DuplicateEntity { .. }));

        let forced = params(
            "COPY",
            &[
                ("new_entity_name", "other"),
                ("series_name", "flow"),
                ("overwrite", "yes"),
            ],
        );
        CopyEntity::from_params(&forced, &DateFormat::default())
            .unwrap()
            .execute(&mut session)
            .unwrap();
        assert_eq!(
            session.store.series(&"OTHER".into()).unwrap().valid_values(),
            vec![1.0]
        );
    }

    #[test]
    fn test_erase_tables_and_series() {
        let mut session = session_with_series();
        let t0 = NaiveDate::from_ymd_opt(2020, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        session
            .store
            .s_tables
            .insert(
                &"STATS".into(),
                STable {
                    stats: IndexMap::new(),
                    source_name: "FLOW".into(),
                    start: t0,
                    end: t0,
                    log_transformed: false,
                    exponent: 1.0,
                },
            )
            .unwrap();
        let p = params("ERASE_ENTITY", &[("series_name", "flow"), ("s_table_name", "stats")]);
        EraseEntity::from_params(&p, &DateFormat::default())
            .unwrap()
            .execute(&mut session)
            .unwrap();
        assert!(!session.store.has_series(&"FLOW".into()));
        assert!(!session.store.s_tables.contains(&"STATS".into()));
        assert!(EraseEntity::from_params(&params("ERASE_ENTITY", &[]), &DateFormat::default()).is_err());
    }

    #[test]
    fn test_erase_with_missing_target_keeps_everything() {
        let mut session = session_with_series();
        let p = params("ERASE_ENTITY", &[("series_name", "flow"), ("s_table_name", "nope")]);
        let err = EraseEntity::from_params(&p, &DateFormat::default())
            .unwrap()
            .execute(&mut session)
            .unwrap_err();
        match err {
            TsError::MissingEntity { kind, name } => {
                assert_eq!(kind, EntityKind::STable);
                assert_eq!(name, "NOPE");
            }
            other => panic!("expected a missing entity, got {other:?}"),
        }
        assert!(session.store.has_series(&"FLOW".into()));
    }
}
