//! Comparison of fetched rows against sample rows and column expectations.

use std::collections::BTreeMap;

use serde_json::{Number, Value};
use tablecheck_core::{ColumnExpectation, ColumnRule};

use crate::session::JsonRow;

/// Largest number of offending values quoted in a single error message.
const MAX_EXAMPLES: usize = 3;

static NULL: Value = Value::Null;

/// Messages and errors produced by comparing one table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Comparison {
    pub messages: Vec<String>,
    pub errors: Vec<String>,
}

impl Comparison {
    fn pass(&mut self, message: String) {
        self.messages.push(message);
    }

    fn fail(&mut self, error: String) {
        self.errors.push(error);
    }
}

/// Compare an expected value with one fetched from the database.
///
/// Numbers compare numerically, and a string matches a number or boolean with
/// the same textual value, so fixtures may quote numeric columns. Two integers
/// compare exactly; floating point is used only when either side is a float.
pub fn values_match(expected: &Value, actual: &Value) -> bool {
    if expected == actual {
        return true;
    }

    match (expected, actual) {
        (Value::Number(left), Value::Number(right)) => numbers_equal(left, right),
        (Value::String(text), Value::Number(number))
        | (Value::Number(number), Value::String(text)) => {
            *text == number.to_string()
                || parse_number(text).is_some_and(|parsed| numbers_equal(&parsed, number))
        }
        (Value::String(text), Value::Bool(flag)) | (Value::Bool(flag), Value::String(text)) => {
            *text == flag.to_string()
        }
        (Value::Array(left), Value::Array(right)) => {
            left.len() == right.len()
                && left
                    .iter()
                    .zip(right)
                    .all(|(left, right)| values_match(left, right))
        }
        (Value::Object(left), Value::Object(right)) => {
            left.len() == right.len()
                && left.iter().all(|(key, value)| {
                    right
                        .get(key)
                        .is_some_and(|other| values_match(value, other))
                })
        }
        _ => false,
    }
}

fn numbers_equal(left: &Number, right: &Number) -> bool {
    match (exact_integer(left), exact_integer(right)) {
        (Some(left), Some(right)) => left == right,
        _ => left.as_f64() == right.as_f64(),
    }
}

fn exact_integer(number: &Number) -> Option<i128> {
    number
        .as_i64()
        .map(i128::from)
        .or_else(|| number.as_u64().map(i128::from))
}

fn parse_number(text: &str) -> Option<Number> {
    serde_json::from_str::<Number>(text.trim()).ok()
}

/// Grouping key for duplicate detection. Matching values share a bucket, so
/// only values within one bucket are compared pairwise.
fn match_bucket(value: &Value) -> String {
    let numeric = |number: &Number| match exact_integer(number) {
        Some(int) => format!("n:{int}"),
        None => match number.as_f64() {
            Some(float) if float.fract() == 0.0 && float.abs() < 1e36 => {
                format!("n:{}", float as i128)
            }
            Some(float) => format!("f:{float}"),
            None => format!("f:{number}"),
        },
    };

    match value {
        Value::Number(number) => numeric(number),
        Value::String(text) => match parse_number(text) {
            Some(number) => numeric(&number),
            None if text == "true" || text == "false" => format!("b:{text}"),
            None => format!("s:{text}"),
        },
        Value::Bool(flag) => format!("b:{flag}"),
        Value::Null => "null".to_string(),
        Value::Array(_) | Value::Object(_) => "composite".to_string(),
    }
}

/// Check that every sample row is matched by at least one fetched row.
///
/// A sample row matches when every column it lists matches; other columns are
/// ignored.
pub fn check_sample(sample: &[BTreeMap<String, Value>], rows: &[JsonRow], out: &mut Comparison) {
    for (idx, expected) in sample.iter().enumerate() {
        let position = idx + 1;
        let found = rows.iter().any(|row| {
            expected
                .iter()
                .all(|(column, value)| values_match(value, column_value(row, column)))
        });

        if found {
            out.pass(format!("Sample row {position} found"));
        } else {
            let rendered = serde_json::to_string(expected).unwrap_or_default();
            out.fail(format!("Sample row {position} not found: {rendered}"));
        }
    }
}

/// Check one column expectation against the column's values in every row.
pub fn check_column(
    column: &str,
    expectation: &ColumnExpectation,
    rows: &[JsonRow],
    out: &mut Comparison,
) {
    let actual: Vec<&Value> = rows.iter().map(|row| column_value(row, column)).collect();
    let errors_before = out.errors.len();

    match expectation {
        ColumnExpectation::Values(expected) => check_values(column, expected, &actual, out),
        ColumnExpectation::Rule(rule) => check_rule(column, rule, &actual, out),
        ColumnExpectation::Constant(expected) => check_equals(column, expected, &actual, out),
    }

    if out.errors.len() == errors_before {
        out.pass(format!("Column '{column}' matches expectation"));
    }
}

fn check_values(column: &str, expected: &[Value], actual: &[&Value], out: &mut Comparison) {
    if expected.len() != actual.len() {
        out.fail(format!(
            "Column '{column}' expected {} values but found {}",
            expected.len(),
            actual.len()
        ));
    }

    let mut remaining: Vec<&Value> = actual.to_vec();
    let mut missing = Vec::new();
    for value in expected {
        match remaining
            .iter()
            .position(|candidate| values_match(value, candidate))
        {
            Some(pos) => {
                remaining.swap_remove(pos);
            }
            None => missing.push(value),
        }
    }

    if !missing.is_empty() {
        out.fail(format!(
            "Column '{column}' is missing {} expected value(s): {}",
            missing.len(),
            examples(missing.iter().copied())
        ));
    }
    if !remaining.is_empty() {
        out.fail(format!(
            "Column '{column}' has {} unexpected value(s): {}",
            remaining.len(),
            examples(remaining.iter().copied())
        ));
    }
}

fn check_rule(column: &str, rule: &ColumnRule, actual: &[&Value], out: &mut Comparison) {
    if rule.not_null == Some(true) {
        let nulls = actual.iter().filter(|value| value.is_null()).count();
        if nulls > 0 {
            out.fail(format!("Column '{column}' has {nulls} null value(s)"));
        }
    }

    if rule.unique == Some(true) {
        let mut seen: BTreeMap<String, Vec<&Value>> = BTreeMap::new();
        let mut duplicates: Vec<&Value> = Vec::new();
        for value in actual.iter().copied().filter(|value| !value.is_null()) {
            let bucket = seen.entry(match_bucket(value)).or_default();
            if bucket.iter().any(|earlier| values_match(earlier, value)) {
                duplicates.push(value);
            } else {
                bucket.push(value);
            }
        }
        if !duplicates.is_empty() {
            out.fail(format!(
                "Column '{column}' has {} duplicate value(s): {}",
                duplicates.len(),
                examples(duplicates)
            ));
        }
    }

    if let Some(expected) = &rule.equals {
        check_equals(column, expected, actual, out);
    }

    if let Some(allowed) = &rule.one_of {
        let outside: Vec<&Value> = actual
            .iter()
            .copied()
            .filter(|value| !allowed.iter().any(|candidate| values_match(candidate, value)))
            .collect();
        if !outside.is_empty() {
            out.fail(format!(
                "Column '{column}' has {} value(s) outside the allowed set: {}",
                outside.len(),
                examples(outside)
            ));
        }
    }
}

fn check_equals(column: &str, expected: &Value, actual: &[&Value], out: &mut Comparison) {
    let mismatched: Vec<&Value> = actual
        .iter()
        .copied()
        .filter(|value| !values_match(expected, value))
        .collect();
    if !mismatched.is_empty() {
        out.fail(format!(
            "Column '{column}' has {} row(s) not equal to {expected}: {}",
            mismatched.len(),
            examples(mismatched)
        ));
    }
}

fn column_value<'a>(row: &'a JsonRow, column: &str) -> &'a Value {
    row.get(column).unwrap_or(&NULL)
}

fn examples<'a>(values: impl IntoIterator<Item = &'a Value>) -> String {
    let values: Vec<&Value> = values.into_iter().collect();
    let mut shown: Vec<String> = values
        .iter()
        .take(MAX_EXAMPLES)
        .map(|value| value.to_string())
        .collect();
    if values.len() > MAX_EXAMPLES {
        shown.push(format!("... ({} more)", values.len() - MAX_EXAMPLES));
    }
    shown.join(", ")
}
