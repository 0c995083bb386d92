use thiserror::Error;

use crate::identifier::IdentifierKind;

/// Core error type shared across tablecheck crates.
#[derive(Debug, Error)]
pub enum Error {
    /// A table, column or schema name failed the identifier allow-list.
    #[error("invalid {kind} identifier '{name}': {reason}")]
    InvalidIdentifier {
        kind: IdentifierKind,
        name: String,
        reason: String,
    },
    /// The table existence probe failed.
    #[error("metadata query failed: {0}")]
    MetadataQuery(String),
    /// The batched row count query failed.
    #[error("batch count query failed: {0}")]
    BatchCountQuery(String),
    /// A single table's detail check failed. Recorded per table, never fatal.
    #[error("detail validation failed: {0}")]
    DetailValidation(String),
    /// Database error or driver failure.
    #[error("database error: {0}")]
    Db(String),
    /// The caller cancelled the validation run.
    #[error("validation cancelled")]
    Cancelled,
    /// The expectation document is structurally invalid.
    #[error("invalid expectations: {0}")]
    InvalidExpectations(String),
    /// Options supplied by the caller are unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Installing the tracing subscriber failed.
    #[error("logging error: {0}")]
    Logging(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Convenience alias for results returned by tablecheck crates.
pub type Result<T> = std::result::Result<T, Error>;
