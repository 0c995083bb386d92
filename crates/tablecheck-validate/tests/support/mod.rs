#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tablecheck_validate::{CountQuery, Error, JsonRow, Result, RowQuery, Session};

/// Round trip observed by [`ScriptedSession`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Exists(Vec<String>),
    Count(String),
    Rows(String),
}

/// In-memory database double that records every round trip and the peak
/// number of concurrent row fetches.
#[derive(Default)]
pub struct ScriptedSession {
    tables: BTreeMap<String, Vec<JsonRow>>,
    fail_exists: bool,
    fail_count: bool,
    fail_rows: BTreeSet<String>,
    omit_counts: BTreeSet<String>,
    row_delay: Duration,
    calls: Mutex<Vec<Call>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table holding `rows`, each a JSON object.
    pub fn with_table(mut self, name: &str, rows: Vec<Value>) -> Self {
        let rows = rows
            .into_iter()
            .map(|row| match row {
                Value::Object(map) => map,
                other => panic!("row must be an object, got {other}"),
            })
            .collect();
        self.tables.insert(name.to_string(), rows);
        self
    }

    /// Add a table with `count` rows of the form `{"id": n}`.
    pub fn with_rows(self, name: &str, count: usize) -> Self {
        let rows = (1..=count).map(|id| serde_json::json!({ "id": id })).collect();
        self.with_table(name, rows)
    }

    pub fn failing_exists(mut self) -> Self {
        self.fail_exists = true;
        self
    }

    pub fn failing_count(mut self) -> Self {
        self.fail_count = true;
        self
    }

    /// Leave `table` out of the count response while still reporting it as existing.
    pub fn omitting_count(mut self, table: &str) -> Self {
        self.omit_counts.insert(table.to_string());
        self
    }

    pub fn failing_rows(mut self, table: &str) -> Self {
        self.fail_rows.insert(table.to_string());
        self
    }

    pub fn with_row_delay(mut self, delay: Duration) -> Self {
        self.row_delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn query_count(&self) -> usize {
        self.calls.lock().expect("calls lock").len()
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn record(&self, call: Call) {
        self.calls.lock().expect("calls lock").push(call);
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Session for ScriptedSession {
    fn engine(&self) -> &'static str {
        "scripted"
    }

    fn database_id(&self) -> String {
        "scripted/fixtures".to_string()
    }

    async fn existing_tables(&self, _schema: &str, tables: &[String]) -> Result<Vec<String>> {
        self.record(Call::Exists(tables.to_vec()));
        if self.fail_exists {
            return Err(Error::Db("connection refused".to_string()));
        }
        Ok(tables
            .iter()
            .filter(|table| self.tables.contains_key(*table))
            .cloned()
            .collect())
    }

    async fn count_rows(&self, query: &CountQuery) -> Result<Vec<(String, i64)>> {
        self.record(Call::Count(query.sql.clone()));
        if self.fail_count {
            return Err(Error::Db("relation does not exist".to_string()));
        }
        query
            .tables
            .iter()
            .filter(|table| !self.omit_counts.contains(*table))
            .map(|table| {
                let rows = self
                    .tables
                    .get(table)
                    .ok_or_else(|| Error::Db(format!("relation \"{table}\" does not exist")))?;
                Ok((table.clone(), rows.len() as i64))
            })
            .collect()
    }

    async fn fetch_rows(&self, query: &RowQuery) -> Result<Vec<JsonRow>> {
        self.record(Call::Rows(query.table.clone()));
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(&self.in_flight);
        self.peak.fetch_max(now, Ordering::SeqCst);

        if !self.row_delay.is_zero() {
            tokio::time::sleep(self.row_delay).await;
        }

        if self.fail_rows.contains(&query.table) {
            return Err(Error::Db("permission denied".to_string()));
        }

        let rows = self.tables.get(&query.table).cloned().unwrap_or_default();
        Ok(rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .filter(|(column, _)| query.columns.is_empty() || query.columns.contains(column))
                    .collect()
            })
            .collect())
    }
}
