//! End-to-end runs of control files written into a scratch directory

use std::fs;
use std::path::Path;

use pretty_assertions::assert_eq;
use tsblender::{Engine, NoticeKind, RunConfig, TsError};

const DATA: &str = "\
date,flow,stage
2020-01-01,1.0,10.0
2020-01-02,2.0,11.0
2020-01-03,3.0,
2020-01-04,4.0,13.0
";

fn write(dir: &Path, name: &str, text: &str) {
    fs::write(dir.join(name), text).unwrap();
}

const PIPELINE: &str = "\
START SETTINGS
 CONTEXT calib
END SETTINGS

START GET_SERIES_CSV
 CONTEXT all
 FILE data.csv
 USECOL flow
 NEW_SERIES_NAME q
END GET_SERIES_CSV

START SERIES_STATISTICS
 CONTEXT calib
 SERIES_NAME q
 NEW_S_TABLE_NAME q_stats
 MEAN yes
 MAXIMUM yes
END SERIES_STATISTICS

START SERIES_EQUATION
 CONTEXT pred
 NEW_SERIES_NAME q2
 EQUATION q * 2
END SERIES_EQUATION

START LIST_OUTPUT
 CONTEXT calib
 FILE report.txt
 SERIES_FORMAT long
 SERIES_NAME q
 S_TABLE_NAME q_stats
END LIST_OUTPUT
";

#[test]
fn test_read_summarize_and_list() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "data.csv", DATA);
    write(dir.path(), "tsproc.in", PIPELINE);

    let mut engine = Engine::new(".");
    let report = engine.run_file(dir.path().join("tsproc.in")).unwrap();

    assert_eq!(report.context, "calib");
    let executed: Vec<&str> = report.executed.iter().map(|o| o.command.as_str()).collect();
    assert_eq!(
        executed,
        vec!["SETTINGS", "GET_SERIES_CSV", "SERIES_STATISTICS", "LIST_OUTPUT"]
    );
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].command, "SERIES_EQUATION");

    let q = engine.session().store.series(&"Q".into()).unwrap();
    assert_eq!(q.valid_values(), vec![1.0, 2.0, 3.0, 4.0]);

    let listing = fs::read_to_string(dir.path().join("report.txt")).unwrap();
    assert!(listing.contains(" TIME_SERIES \"q\" ---->"));
    assert!(listing.contains(" S_TABLE \"q_stats\" ---->"));
    assert!(!engine.session().store.has_series(&"Q2".into()));
}

#[test]
fn test_explicit_context_selects_other_blocks() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "data.csv", DATA);
    write(dir.path(), "tsproc.in", PIPELINE);

    let config = RunConfig::default().with_overrides(Some("pred".into()), false);
    let mut engine = config.engine(dir.path());
    let report = engine.run_file(dir.path().join("tsproc.in")).unwrap();

    assert_eq!(report.context, "pred");
    let skipped: Vec<&str> = report.skipped.iter().map(|o| o.command.as_str()).collect();
    assert_eq!(skipped, vec!["SERIES_STATISTICS", "LIST_OUTPUT"]);
    let q2 = engine.session().store.series(&"Q2".into()).unwrap();
    assert_eq!(q2.valid_values(), vec![2.0, 4.0, 6.0, 8.0]);
    assert!(!dir.path().join("report.txt").exists());
}

#[test]
fn test_context_differing_in_case_selects_nothing() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "data.csv", DATA);
    write(dir.path(), "tsproc.in", PIPELINE);

    let report = tsblender::run(dir.path().join("tsproc.in"), Some("PRED".into())).unwrap();
    let executed: Vec<&str> = report.executed.iter().map(|o| o.command.as_str()).collect();
    assert_eq!(executed, vec!["SETTINGS", "GET_SERIES_CSV"]);
    assert_eq!(report.skipped.len(), 3);
}

#[test]
fn test_free_run_uses_settings_context() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "data.csv", DATA);
    write(dir.path(), "tsproc.in", PIPELINE);

    let report = tsblender::run(dir.path().join("tsproc.in"), None).unwrap();
    assert_eq!(report.context, "calib");
    assert_eq!(report.executed.len(), 4);
    assert!(dir.path().join("report.txt").exists());
}

#[test]
fn test_missing_data_file_names_block() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "tsproc.in", PIPELINE);

    let err = Engine::new(".")
        .run_file(dir.path().join("tsproc.in"))
        .unwrap_err();
    assert_eq!(err.line(), Some(5));
    assert!(matches!(err, TsError::Block { ref command, .. } if command == "GET_SERIES_CSV"));
    assert!(matches!(err.root_cause(), TsError::Io { .. }));
}

#[test]
fn test_missing_control_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = Engine::new(".")
        .run_file(dir.path().join("absent.in"))
        .unwrap_err();
    assert!(matches!(err, TsError::Io { .. }));
}

#[test]
fn test_truncated_block_fails_before_running() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "data.csv", DATA);
    let src = "\
START GET_SERIES_CSV
 CONTEXT all
 FILE data.csv
 USECOL flow
 NEW_SERIES_NAME q
";
    let mut engine = Engine::new(dir.path()).with_context(Some("calib".into()));
    let err = engine.run_str(src).unwrap_err();
    assert!(matches!(err, TsError::TruncatedBlock { line: 1, .. }));
    assert!(!engine.session().store.has_series(&"Q".into()));
}

#[test]
fn test_deprecated_alias_reported() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "obs.ssf",
        "s1 2020-01-01 00:00:00 1.5\ns1 2020-01-02 00:00:00 2.5\n",
    );
    let src = "\
START GET_MUL_SERIES_SSF
 CONTEXT all
 FILE obs.ssf
 SITE s1
 NEW_SERIES_NAME obs
END GET_MUL_SERIES_SSF
";
    let mut engine = Engine::new(dir.path()).with_context(Some("any".into()));
    let report = engine.run_str(src).unwrap();
    assert!(report
        .notices
        .iter()
        .any(|n| n.kind == NoticeKind::Deprecated && n.origin.line == 1));
    assert!(engine.session().store.has_series(&"OBS".into()));
}

#[test]
fn test_report_serializes_for_json_output() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "data.csv", DATA);
    write(dir.path(), "tsproc.in", PIPELINE);

    let report = Engine::new(".")
        .with_debug(true)
        .run_file(dir.path().join("tsproc.in"))
        .unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["context"], "calib");
    assert_eq!(json["executed"][1]["command"], "GET_SERIES_CSV");
    assert_eq!(json["store"]["series"][0]["name"], "Q");
    assert_eq!(json["store"]["s_tables"][0], "Q_STATS");
}

fn uniform(name: &str, value: &str) -> String {
    format!(
        "\
START NEW_SERIES_UNIFORM
 CONTEXT all
 NEW_SERIES_NAME {name}
 NEW_SERIES_VALUE {value}
 TIME_INTERVAL 1
 TIME_UNIT days
 DATE_1 2020-01-01
 TIME_1 00:00:00
 DATE_2 2020-01-05
 TIME_2 00:00:00
END NEW_SERIES_UNIFORM
"
    )
}

#[test]
fn test_uniform_series_round_trip() {
    let src = format!("START SETTINGS\n CONTEXT all\nEND SETTINGS\n{}", uniform("FLAT", "5.0"));
    let mut engine = Engine::new(".");
    engine.run_str(&src).unwrap();

    let flat = engine.session().store.series(&"flat".into()).unwrap();
    assert_eq!(flat.valid_values(), vec![5.0; 5]);
    let day = |d| {
        chrono::NaiveDate::from_ymd_opt(2020, 1, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    };
    assert_eq!(flat.first_valid(), Some(day(1)));
    assert_eq!(flat.last_valid(), Some(day(5)));
}

#[test]
fn test_series_names_are_unique() {
    let src = format!("{}{}", uniform("X", "1.0"), uniform("x", "2.0"));
    let err = Engine::new(".")
        .with_context(Some("c".into()))
        .run_str(&src)
        .unwrap_err();
    assert_eq!(err.line(), Some(12));
    assert!(matches!(err.root_cause(), TsError::DuplicateEntity { .. }));
}

#[test]
fn test_erase_then_rejoin_takes_new_data() {
    let src = format!(
        "{}START ERASE_ENTITY\n CONTEXT all\n SERIES_NAME x\nEND ERASE_ENTITY\n{}",
        uniform("X", "1.0"),
        uniform("X", "2.0")
    );
    let mut engine = Engine::new(".").with_context(Some("c".into()));
    engine.run_str(&src).unwrap();
    let x = engine.session().store.series(&"X".into()).unwrap();
    assert_eq!(x.valid_values(), vec![2.0; 5]);
}
