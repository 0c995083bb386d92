use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use jsonschema::JSONSchema;
use schemars::schema::RootSchema;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifier::{validate_identifier, IdentifierKind};

/// Expectations for every table under test, keyed by table name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ExpectedConfig {
    pub tables: BTreeMap<String, TableExpected>,
}

/// Expected state of a single table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct TableExpected {
    /// Exact number of rows the table must hold.
    pub count: u64,
    /// Rows that must be present, each matched on the listed columns only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample: Option<Vec<BTreeMap<String, Value>>>,
    /// Expectations over every value of a column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<BTreeMap<String, ColumnExpectation>>,
}

/// Expectation over the full set of values held by one column.
///
/// An array lists every value (unordered), an object with known keys is a
/// [`ColumnRule`], and anything else is a constant every row must hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum ColumnExpectation {
    Values(Vec<Value>),
    Rule(ColumnRule),
    Constant(Value),
}

/// Declarative rule applied to every value of a column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ColumnRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_null: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equals: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub one_of: Option<Vec<Value>>,
}

impl TableExpected {
    /// Expect `count` rows and nothing else.
    pub fn with_count(count: u64) -> Self {
        Self {
            count,
            ..Self::default()
        }
    }

    /// True when the table declares sample rows or column expectations.
    pub fn needs_detail(&self) -> bool {
        self.sample.as_ref().is_some_and(|rows| !rows.is_empty())
            || self.columns.as_ref().is_some_and(|cols| !cols.is_empty())
    }

    /// Every column named by `sample` rows or `columns`, sorted and deduplicated.
    pub fn referenced_columns(&self) -> Vec<String> {
        let mut names = BTreeSet::new();
        for row in self.sample.iter().flatten() {
            names.extend(row.keys().cloned());
        }
        for column in self.columns.iter().flat_map(|cols| cols.keys()) {
            names.insert(column.clone());
        }
        names.into_iter().collect()
    }
}

impl ExpectedConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the expectation for `table`.
    pub fn insert(&mut self, table: impl Into<String>, expected: TableExpected) {
        self.tables.insert(table.into(), expected);
    }

    pub fn get(&self, table: &str) -> Option<&TableExpected> {
        self.tables.get(table)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &TableExpected)> {
        self.tables.iter()
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    /// Check every table and referenced column name against the identifier allow-list.
    pub fn validate_identifiers(&self) -> Result<()> {
        for (table, expected) in &self.tables {
            validate_identifier(table, IdentifierKind::Table)?;
            for column in expected.referenced_columns() {
                validate_identifier(&column, IdentifierKind::Column)?;
            }
        }
        Ok(())
    }

    /// Parse a JSON expectation document, checking its structure first.
    pub fn from_json_str(input: &str) -> Result<Self> {
        let raw: Value = serde_json::from_str(input)?;
        validate_document(&raw)?;
        Ok(serde_json::from_value(raw)?)
    }

    /// Parse a TOML expectation document, applying the same structural checks as JSON.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let raw: Value = toml::from_str(input)?;
        validate_document(&raw)?;
        Ok(serde_json::from_value(raw)?)
    }

    /// Load an expectation document, choosing the format from the file extension.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&contents),
            Some("toml") => Self::from_toml_str(&contents),
            _ => Err(Error::InvalidExpectations(format!(
                "unsupported expectation file format: {}",
                path.display()
            ))),
        }
    }
}

/// Emit the JSON Schema for expectation documents.
pub fn expectations_json_schema() -> RootSchema {
    schema_for!(ExpectedConfig)
}

/// Validate a raw JSON expectation document against [`expectations_json_schema`].
///
/// All structural issues are reported together, one per line. Column
/// expectations that look like rules (an empty object, or one naming a rule
/// key) must deserialize as a [`ColumnRule`] rather than fall back to a
/// constant.
pub fn validate_document(document: &Value) -> Result<()> {
    let schema = serde_json::to_value(expectations_json_schema())?;
    let compiled =
        JSONSchema::compile(&schema).map_err(|err| Error::InvalidExpectations(err.to_string()))?;

    let mut issues: Vec<String> = match compiled.validate(document) {
        Ok(()) => Vec::new(),
        Err(errors) => errors
            .map(|error| {
                let path = error.instance_path.to_string();
                if path.is_empty() {
                    error.to_string()
                } else {
                    format!("{path}: {error}")
                }
            })
            .collect(),
    };
    issues.extend(column_rule_issues(document));

    if issues.is_empty() {
        Ok(())
    } else {
        Err(Error::InvalidExpectations(issues.join("\n")))
    }
}

const RULE_KEYS: &[&str] = &["not_null", "unique", "equals", "one_of"];

fn column_rule_issues(document: &Value) -> Vec<String> {
    let Some(tables) = document.as_object() else {
        return Vec::new();
    };

    let mut issues = Vec::new();
    for (table, expected) in tables {
        let Some(columns) = expected.get("columns").and_then(Value::as_object) else {
            continue;
        };
        for (column, expectation) in columns {
            let Value::Object(fields) = expectation else {
                continue;
            };
            let path = format!(
                "/{}/columns/{}",
                pointer_segment(table),
                pointer_segment(column)
            );

            if fields.is_empty() {
                issues.push(format!(
                    "{path}: empty rule object, set at least one of {}",
                    RULE_KEYS.join(", ")
                ));
            } else if fields.keys().any(|key| RULE_KEYS.contains(&key.as_str())) {
                if let Err(err) = serde_json::from_value::<ColumnRule>(expectation.clone()) {
                    issues.push(format!("{path}: invalid column rule: {err}"));
                }
            }
        }
    }
    issues
}

fn pointer_segment(raw: &str) -> String {
    raw.replace('~', "~0").replace('/', "~1")
}
