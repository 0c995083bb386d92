use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use uuid::Uuid;

use crate::error::Result;

/// Outcome of validating a single table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableValidationResult {
    pub table_name: String,
    pub success: bool,
    /// Actual number of rows found, `0` when the table does not exist.
    pub row_count: i64,
    /// Human-readable confirmations, emitted for passing and failing checks.
    pub messages: Vec<String>,
    /// Failure descriptions. A table succeeds only when this stays empty.
    pub errors: Vec<String>,
}

impl TableValidationResult {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            success: false,
            row_count: 0,
            messages: Vec::new(),
            errors: Vec::new(),
        }
    }
}

/// Round-trip and timing metrics for one validation call.
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceMetrics {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    /// Database round trips issued during the call.
    pub query_count: u64,
    /// Tables named by the expectation document.
    pub table_count: usize,
    /// Whether the batched count query was issued.
    pub batched: bool,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

impl PerformanceMetrics {
    /// Tables validated per second of wall-clock time.
    pub fn tables_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.table_count as f64 / secs
        } else {
            0.0
        }
    }
}

fn serialize_millis<S: Serializer>(
    value: &Duration,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
}

/// Aggregated report for a validation call.
///
/// `success` is derived from the per-table results and call-level errors when
/// the report is built. Both are read-only afterwards, so it never goes stale.
#[derive(Debug, Clone, Serialize)]
pub struct BatchValidationResult {
    pub database_id: String,
    success: bool,
    results: BTreeMap<String, TableValidationResult>,
    errors: Vec<String>,
    pub performance: PerformanceMetrics,
}

impl BatchValidationResult {
    pub fn new(
        database_id: impl Into<String>,
        results: BTreeMap<String, TableValidationResult>,
        errors: Vec<String>,
        performance: PerformanceMetrics,
    ) -> Self {
        let success = errors.is_empty() && results.values().all(|result| result.success);
        Self {
            database_id: database_id.into(),
            success,
            results,
            errors,
            performance,
        }
    }

    /// True when every table passed and no call-level error was recorded.
    pub fn success(&self) -> bool {
        self.success
    }

    /// Per-table results keyed by table name.
    pub fn results(&self) -> &BTreeMap<String, TableValidationResult> {
        &self.results
    }

    pub fn result(&self, table: &str) -> Option<&TableValidationResult> {
        self.results.get(table)
    }

    /// Call-level errors not tied to a single table.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Names of tables that failed validation, in table-name order.
    pub fn failed_tables(&self) -> Vec<&str> {
        self.results
            .values()
            .filter(|result| !result.success)
            .map(|result| result.table_name.as_str())
            .collect()
    }

    /// Total number of errors across the call and every table.
    pub fn total_errors(&self) -> usize {
        self.errors.len()
            + self
                .results
                .values()
                .map(|result| result.errors.len())
                .sum::<usize>()
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
