use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::Arc;

use tablecheck_core::{BatchValidationResult, Error, ExpectedConfig, Result};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::aggregate::aggregate;
use crate::batch;
use crate::detail::{run_detail_checks, DetailJob};
use crate::options::ValidateOptions;
use crate::probe;
use crate::session::Session;
use crate::tracker::{PerformanceTracker, Phase};

/// Validates expectation documents against one database session.
#[derive(Clone)]
pub struct Validator {
    session: Arc<dyn Session>,
    options: ValidateOptions,
}

impl Validator {
    pub fn new(session: Arc<dyn Session>, options: ValidateOptions) -> Self {
        Self { session, options }
    }

    pub fn options(&self) -> &ValidateOptions {
        &self.options
    }

    /// Validate `expected` without a cancellation signal.
    pub async fn validate(&self, expected: &ExpectedConfig) -> Result<BatchValidationResult> {
        self.validate_with_cancel(expected, &CancellationToken::new())
            .await
    }

    /// Validate `expected`, aborting with [`Error::Cancelled`] once `cancel` fires.
    ///
    /// Identifier errors are returned before any query is issued. Failures of
    /// the existence probe or the count query end the call without a report;
    /// per-table mismatches and detail failures only show up in the report.
    pub async fn validate_with_cancel(
        &self,
        expected: &ExpectedConfig,
        cancel: &CancellationToken,
    ) -> Result<BatchValidationResult> {
        self.options.validate()?;
        expected.validate_identifiers()?;

        let tracker = PerformanceTracker::new(expected.len());
        let database_id = self.session.database_id();
        let span = tracing::info_span!(
            "validate",
            run_id = %tracker.run_id(),
            database_id = %database_id,
            engine = self.session.engine()
        );

        self.run(expected, tracker, database_id, cancel)
            .instrument(span)
            .await
    }

    async fn run(
        &self,
        expected: &ExpectedConfig,
        mut tracker: PerformanceTracker,
        database_id: String,
        cancel: &CancellationToken,
    ) -> Result<BatchValidationResult> {
        let schema = self.options.schema.as_str();
        tracing::info!(event = "run_started", tables = expected.len(), schema = %schema);

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        if expected.is_empty() {
            tracker.enter(Phase::Done);
            tracing::info!(event = "run_finished", status = "success", queries = 0);
            return Ok(BatchValidationResult::new(
                database_id,
                BTreeMap::new(),
                Vec::new(),
                tracker.finish(),
            ));
        }

        tracker.enter(Phase::ExistenceCheck);
        let names = expected.table_names();
        tracker.record_query();
        let existing = until_cancelled(
            cancel,
            probe::existing_tables(self.session.as_ref(), schema, &names),
        )
        .await
        .inspect_err(|err| {
            tracing::error!(event = "run_failed", phase = "existence_check", error = %err);
        })?;

        tracker.enter(Phase::BatchCount);
        if !existing.is_empty() {
            tracker.record_query();
            tracker.mark_batched();
        }
        let counts = until_cancelled(
            cancel,
            batch::count_existing(self.session.as_ref(), schema, &existing),
        )
        .await
        .inspect_err(|err| {
            tracing::error!(event = "run_failed", phase = "batch_count", error = %err);
        })?;

        let jobs = self.detail_jobs(expected, &existing, &counts)?;
        let details = if jobs.is_empty() {
            BTreeMap::new()
        } else {
            tracker.enter(Phase::ConcurrentDetail);
            let outcomes = run_detail_checks(
                Arc::clone(&self.session),
                jobs,
                self.options.max_concurrency,
                cancel,
            )
            .await?;
            let issued = outcomes.values().filter(|outcome| outcome.queried).count();
            tracker.record_queries(issued as u64);
            outcomes
        };

        tracker.enter(Phase::Aggregated);
        let results = aggregate(expected, &existing, &counts, details);
        let report = BatchValidationResult::new(database_id, results, Vec::new(), tracker.finish());

        tracker.enter(Phase::Done);
        let status = if report.success() { "success" } else { "failed" };
        tracing::info!(
            event = "run_finished",
            status = status,
            failed_tables = report.failed_tables().len(),
            queries = report.performance.query_count,
            duration_ms = report.performance.elapsed.as_millis() as u64
        );

        Ok(report)
    }

    fn detail_jobs(
        &self,
        expected: &ExpectedConfig,
        existing: &BTreeSet<String>,
        counts: &BTreeMap<String, i64>,
    ) -> Result<Vec<DetailJob>> {
        expected
            .iter()
            .filter(|(table, table_expected)| {
                existing.contains(*table)
                    && counts.get(*table).is_some_and(|count| *count > 0)
                    && table_expected.needs_detail()
            })
            .map(|(table, table_expected)| {
                DetailJob::new(&self.options.schema, table, table_expected)
            })
            .collect()
    }
}

/// Validate `expected` through `session` with the given options.
pub async fn validate_tables(
    session: Arc<dyn Session>,
    expected: &ExpectedConfig,
    options: ValidateOptions,
) -> Result<BatchValidationResult> {
    Validator::new(session, options).validate(expected).await
}

/// Like [`validate_tables`], aborting once `cancel` fires.
pub async fn validate_tables_with_cancel(
    session: Arc<dyn Session>,
    expected: &ExpectedConfig,
    options: ValidateOptions,
    cancel: &CancellationToken,
) -> Result<BatchValidationResult> {
    Validator::new(session, options)
        .validate_with_cancel(expected, cancel)
        .await
}

async fn until_cancelled<T>(
    cancel: &CancellationToken,
    work: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        result = work => result,
    }
}
