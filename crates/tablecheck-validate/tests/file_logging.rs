mod support;

use std::collections::BTreeSet;
use std::fs;
use std::sync::Arc;

use serde_json::Value;
use support::ScriptedSession;
use tablecheck_validate::{
    init_file_logging, Error, ExpectedConfig, TableExpected, ValidateOptions, Validator,
};

#[tokio::test]
async fn file_subscriber_records_run_events_as_json_lines() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("tablecheck.log");

    init_file_logging(&path).expect("install file subscriber");

    let session = Arc::new(ScriptedSession::new().with_rows("users", 2));
    let mut expected = ExpectedConfig::new();
    expected.insert("users", TableExpected::with_count(2));
    let report = Validator::new(session, ValidateOptions::default())
        .validate(&expected)
        .await
        .expect("validate");
    assert!(report.success());

    let contents = fs::read_to_string(&path).expect("read log file");
    let lines: Vec<Value> = contents
        .lines()
        .map(|line| serde_json::from_str(line).expect("json line"))
        .collect();
    assert!(!lines.is_empty());

    let events: BTreeSet<&str> = lines
        .iter()
        .filter_map(|line| line["fields"]["event"].as_str())
        .collect();
    for event in ["run_started", "existence_checked", "batch_counted", "run_finished"] {
        assert!(events.contains(event), "missing {event} in {events:?}");
    }

    let finished = lines
        .iter()
        .find(|line| line["fields"]["event"] == "run_finished")
        .expect("run_finished line");
    assert_eq!(finished["fields"]["status"], "success");
    assert!(finished["timestamp"].as_str().is_some_and(|ts| ts.ends_with('Z')));

    let err = init_file_logging(&path).unwrap_err();
    assert!(matches!(err, Error::Logging(_)));
}
