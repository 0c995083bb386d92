//! Batched table validation against a live database.
//!
//! The engine checks an [`ExpectedConfig`] in a fixed number of round trips:
//! one existence probe, one `UNION ALL` count query, and one bounded-concurrency
//! detail query per table that declares sample rows or column expectations.

pub mod aggregate;
pub mod batch;
pub mod compare;
pub mod detail;
pub mod engine;
pub mod logging;
pub mod options;
pub mod postgres;
pub mod probe;
pub mod session;
pub mod tracker;

pub use engine::{validate_tables, validate_tables_with_cancel, Validator};
pub use logging::{init_file_logging, init_logging, LogFormat};
pub use options::{ValidateOptions, DEFAULT_MAX_CONCURRENCY, MAX_CONCURRENCY_LIMIT};
pub use postgres::{validate_postgres, PgSession};
pub use session::{CountQuery, JsonRow, RowQuery, Session};
pub use tracker::{PerformanceTracker, Phase};

pub use tablecheck_core::{
    BatchValidationResult, Error, ExpectedConfig, PerformanceMetrics, Result, TableExpected,
    TableValidationResult,
};
pub use tokio_util::sync::CancellationToken;
