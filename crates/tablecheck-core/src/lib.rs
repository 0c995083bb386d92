//! Core contracts and helpers for tablecheck.
//!
//! This crate defines the expectation document model, the validation report
//! types, identifier validation, and utilities shared by the validation
//! engine and its callers.

pub mod error;
pub mod expectations;
pub mod identifier;
pub mod redaction;
pub mod report;

pub use error::{Error, Result};
pub use expectations::{
    expectations_json_schema, validate_document, ColumnExpectation, ColumnRule, ExpectedConfig,
    TableExpected,
};
pub use identifier::{
    escape_identifier, qualify_table, validate_identifier, IdentifierKind, MAX_IDENTIFIER_LENGTH,
};
pub use redaction::{redact_connection_string, RedactedConnection};
pub use report::{BatchValidationResult, PerformanceMetrics, TableValidationResult};
