use std::collections::{BTreeMap, BTreeSet};

use tablecheck_core::{ExpectedConfig, TableExpected, TableValidationResult};

use crate::detail::DetailOutcome;

pub const TABLE_NOT_FOUND: &str = "Table not found in database";

/// Merge existence, count and detail outcomes into one result per expected table.
///
/// A table succeeds when it exists, its row count equals the expected count
/// and its detail checks (if any ran) recorded no errors.
pub fn aggregate(
    expected: &ExpectedConfig,
    existing: &BTreeSet<String>,
    counts: &BTreeMap<String, i64>,
    mut details: BTreeMap<String, DetailOutcome>,
) -> BTreeMap<String, TableValidationResult> {
    expected
        .iter()
        .map(|(table, table_expected)| {
            let result = if existing.contains(table) {
                let row_count = counts.get(table).copied().unwrap_or(0);
                table_result(table, table_expected, row_count, details.remove(table))
            } else {
                missing_table_result(table, table_expected)
            };
            (table.clone(), result)
        })
        .collect()
}

fn missing_table_result(table: &str, expected: &TableExpected) -> TableValidationResult {
    let mut result = TableValidationResult::new(table);
    result.messages.push(format!(
        "Table '{table}' does not exist; expected {} rows",
        expected.count
    ));
    result.errors.push(TABLE_NOT_FOUND.to_string());
    result
}

fn table_result(
    table: &str,
    expected: &TableExpected,
    row_count: i64,
    detail: Option<DetailOutcome>,
) -> TableValidationResult {
    let mut result = TableValidationResult::new(table);
    result.row_count = row_count;

    if i64::try_from(expected.count).is_ok_and(|count| count == row_count) {
        result
            .messages
            .push(format!("Found {row_count} rows as expected"));
    } else {
        result.messages.push(format!(
            "Row count check failed: expected {}, found {row_count}",
            expected.count
        ));
        result.errors.push(format!(
            "Expected {} rows but found {row_count} rows",
            expected.count
        ));
    }

    match detail {
        Some(outcome) => {
            result.messages.extend(outcome.messages);
            result.errors.extend(outcome.errors);
        }
        None if expected.needs_detail() && row_count == 0 => {
            result
                .messages
                .push("Detail checks skipped: table is empty".to_string());
        }
        None => {}
    }

    result.success = result.errors.is_empty();
    result
}
