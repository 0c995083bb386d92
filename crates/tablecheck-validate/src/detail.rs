use std::collections::BTreeMap;
use std::sync::Arc;

use tablecheck_core::{
    escape_identifier, qualify_table, validate_identifier, Error, IdentifierKind, Result,
    TableExpected,
};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::compare::{check_column, check_sample, Comparison};
use crate::session::{RowQuery, Session};

/// One table scheduled for sample and column checks.
#[derive(Debug, Clone)]
pub struct DetailJob {
    pub table: String,
    pub expected: TableExpected,
    pub query: RowQuery,
}

impl DetailJob {
    pub fn new(schema: &str, table: &str, expected: &TableExpected) -> Result<Self> {
        let query = build_row_query(schema, table, &expected.referenced_columns())?;
        Ok(Self {
            table: table.to_string(),
            expected: expected.clone(),
            query,
        })
    }
}

/// Messages and errors recorded by one table's detail checks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailOutcome {
    pub messages: Vec<String>,
    pub errors: Vec<String>,
    /// Whether the task issued its round trip.
    pub queried: bool,
}

impl DetailOutcome {
    fn failed(cause: &str, queried: bool) -> Self {
        Self {
            messages: Vec::new(),
            errors: vec![format!("Detail validation failed: {cause}")],
            queried,
        }
    }
}

/// Build the projection fetched for a table's detail checks.
///
/// Each row comes back as one JSON object. With no referenced columns every
/// column is fetched.
pub fn build_row_query(schema: &str, table: &str, columns: &[String]) -> Result<RowQuery> {
    let qualified = qualify_table(schema, table)?;

    let sql = if columns.is_empty() {
        format!("SELECT row_to_json(t)::text FROM {qualified} AS t")
    } else {
        let mut projection = Vec::with_capacity(columns.len());
        for column in columns {
            validate_identifier(column, IdentifierKind::Column)?;
            projection.push(escape_identifier(column));
        }
        format!(
            "SELECT row_to_json(t)::text FROM (SELECT {} FROM {qualified}) AS t",
            projection.join(", ")
        )
    };

    Ok(RowQuery {
        table: table.to_string(),
        columns: columns.to_vec(),
        sql,
    })
}

/// Run every job concurrently, at most `max_concurrency` round trips at a time.
///
/// Each task writes only its own table's slot in the shared result map. A
/// failing task records the failure in its slot and siblings keep running;
/// the phase returns once every task has finished. Cancellation aborts the
/// remaining tasks and returns [`Error::Cancelled`].
pub async fn run_detail_checks(
    session: Arc<dyn Session>,
    jobs: Vec<DetailJob>,
    max_concurrency: usize,
    cancel: &CancellationToken,
) -> Result<BTreeMap<String, DetailOutcome>> {
    let tables: Vec<String> = jobs.iter().map(|job| job.table.clone()).collect();
    let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let slots: Arc<Mutex<BTreeMap<String, DetailOutcome>>> =
        Arc::new(Mutex::new(BTreeMap::new()));

    tracing::info!(
        event = "detail_started",
        tables = tables.len(),
        max_concurrency = max_concurrency
    );

    let mut tasks = JoinSet::new();
    for job in jobs {
        let session = Arc::clone(&session);
        let semaphore = Arc::clone(&semaphore);
        let slots = Arc::clone(&slots);

        tasks.spawn(async move {
            let outcome = match semaphore.acquire_owned().await {
                Ok(permit) => {
                    let outcome = check_table(session.as_ref(), &job).await;
                    drop(permit);
                    outcome
                }
                Err(err) => DetailOutcome::failed(&err.to_string(), false),
            };

            tracing::debug!(
                event = "detail_checked",
                table = %job.table,
                errors = outcome.errors.len()
            );
            slots.lock().await.insert(job.table, outcome);
        });
    }

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::warn!(event = "detail_cancelled", pending = tasks.len());
                tasks.abort_all();
                return Err(Error::Cancelled);
            }
            joined = tasks.join_next() => match joined {
                Some(Ok(())) => {}
                Some(Err(err)) => {
                    tracing::error!(event = "detail_task_failed", error = %err);
                }
                None => break,
            },
        }
    }

    let mut outcomes = std::mem::take(&mut *slots.lock().await);
    for table in tables {
        outcomes
            .entry(table)
            .or_insert_with(|| DetailOutcome::failed("task ended without a result", false));
    }

    tracing::info!(event = "detail_finished", tables = outcomes.len());

    Ok(outcomes)
}

async fn check_table(session: &dyn Session, job: &DetailJob) -> DetailOutcome {
    let rows = match session.fetch_rows(&job.query).await {
        Ok(rows) => rows,
        Err(err) => {
            let cause = match err {
                Error::DetailValidation(cause) => cause,
                other => other.to_string(),
            };
            tracing::warn!(event = "detail_query_failed", table = %job.table, error = %cause);
            return DetailOutcome::failed(&cause, true);
        }
    };

    let mut comparison = Comparison::default();
    if let Some(sample) = &job.expected.sample {
        check_sample(sample, &rows, &mut comparison);
    }
    for (column, expectation) in job.expected.columns.iter().flatten() {
        check_column(column, expectation, &rows, &mut comparison);
    }

    DetailOutcome {
        messages: comparison.messages,
        errors: comparison.errors,
        queried: true,
    }
}
