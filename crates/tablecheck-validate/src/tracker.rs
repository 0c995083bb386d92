use std::fmt;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tablecheck_core::PerformanceMetrics;
use uuid::Uuid;

/// Lifecycle of a single validation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Idle,
    ExistenceCheck,
    BatchCount,
    ConcurrentDetail,
    Aggregated,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Phase::Idle => "idle",
            Phase::ExistenceCheck => "existence_check",
            Phase::BatchCount => "batch_count",
            Phase::ConcurrentDetail => "concurrent_detail",
            Phase::Aggregated => "aggregated",
            Phase::Done => "done",
        };
        f.write_str(label)
    }
}

/// Counts round trips and times one validation call.
///
/// Owned by the orchestrating call; detail tasks never touch it.
#[derive(Debug)]
pub struct PerformanceTracker {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    timer: Instant,
    query_count: u64,
    table_count: usize,
    batched: bool,
    phase: Phase,
}

impl PerformanceTracker {
    pub fn new(table_count: usize) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            timer: Instant::now(),
            query_count: 0,
            table_count,
            batched: false,
            phase: Phase::Idle,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn query_count(&self) -> u64 {
        self.query_count
    }

    /// Move to `phase`. Phases only advance.
    pub fn enter(&mut self, phase: Phase) {
        debug_assert!(phase >= self.phase, "phase moved back from {} to {phase}", self.phase);
        tracing::debug!(
            event = "phase_entered",
            run_id = %self.run_id,
            from = %self.phase,
            to = %phase,
            queries = self.query_count
        );
        self.phase = phase;
    }

    pub fn record_query(&mut self) {
        self.record_queries(1);
    }

    pub fn record_queries(&mut self, count: u64) {
        self.query_count += count;
    }

    /// Note that the batched count query was issued.
    pub fn mark_batched(&mut self) {
        self.batched = true;
    }

    /// Snapshot the metrics for the report.
    pub fn finish(&self) -> PerformanceMetrics {
        PerformanceMetrics {
            run_id: self.run_id,
            started_at: self.started_at,
            query_count: self.query_count,
            table_count: self.table_count,
            batched: self.batched,
            elapsed: self.timer.elapsed(),
        }
    }
}
