use std::fs;

use serde_json::json;
use tablecheck_core::{
    validate_document, ColumnExpectation, Error, ExpectedConfig, IdentifierKind,
};

const FIXTURE_JSON: &str = r#"{
  "users": {
    "count": 3,
    "sample": [
      {"id": 1, "email": "ada@example.com"},
      {"id": 2, "email": "grace@example.com"}
    ],
    "columns": {"status": {"one_of": ["active", "disabled"]}}
  },
  "orders": {"count": 0}
}"#;

#[test]
fn loads_json_and_toml_files_by_extension() {
    let dir = tempfile::tempdir().expect("tempdir");

    let json_path = dir.path().join("expected.json");
    fs::write(&json_path, FIXTURE_JSON).expect("write json");
    let from_json = ExpectedConfig::load(&json_path).expect("load json");

    let toml_path = dir.path().join("expected.toml");
    fs::write(
        &toml_path,
        r#"
[users]
count = 3

[[users.sample]]
id = 1
email = "ada@example.com"

[[users.sample]]
id = 2
email = "grace@example.com"

[users.columns.status]
one_of = ["active", "disabled"]

[orders]
count = 0
"#,
    )
    .expect("write toml");
    let from_toml = ExpectedConfig::load(&toml_path).expect("load toml");

    assert_eq!(from_json, from_toml);
    assert!(matches!(
        from_json.get("users").unwrap().columns.as_ref().unwrap()["status"],
        ColumnExpectation::Rule(_)
    ));
}

#[test]
fn rejects_unknown_extensions() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("expected.yaml");
    fs::write(&path, "users: {count: 1}").expect("write yaml");

    let err = ExpectedConfig::load(&path).unwrap_err();
    assert!(matches!(err, Error::InvalidExpectations(_)));
}

#[test]
fn schema_reports_every_structural_issue() {
    let document = json!({
        "users": {"count": "three"},
        "orders": {"count": 1, "sample": {"id": 1}}
    });

    let err = validate_document(&document).unwrap_err();
    let Error::InvalidExpectations(message) = err else {
        panic!("expected structural error");
    };
    assert!(message.contains("/users/count"), "{message}");
    assert!(message.contains("/orders/sample"), "{message}");
}

#[test]
fn document_identifiers_are_checked_separately_from_structure() {
    let config = ExpectedConfig::from_json_str(r#"{"users;drop": {"count": 1}}"#)
        .expect("structurally valid");
    let err = config.validate_identifiers().unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidIdentifier {
            kind: IdentifierKind::Table,
            ..
        }
    ));
}
