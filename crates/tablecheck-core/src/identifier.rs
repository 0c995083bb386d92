//! Identifier allow-listing and quoting.
//!
//! Table and column names cannot be bound as parameters in identifier
//! position, so every name that ends up in generated SQL text must first pass
//! [`validate_identifier`]. Only then may it be quoted with
//! [`escape_identifier`] and concatenated into a query.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Maximum identifier length in bytes (the Postgres `NAMEDATALEN - 1` limit).
pub const MAX_IDENTIFIER_LENGTH: usize = 63;

/// What an identifier names. Only used for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierKind {
    Schema,
    Table,
    Column,
}

impl fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            IdentifierKind::Schema => "schema",
            IdentifierKind::Table => "table",
            IdentifierKind::Column => "column",
        };
        f.write_str(label)
    }
}

/// Validate a name against the `[A-Za-z0-9_]` allow-list.
///
/// Rejects empty names, names longer than [`MAX_IDENTIFIER_LENGTH`] bytes and
/// names containing any other character.
pub fn validate_identifier(name: &str, kind: IdentifierKind) -> Result<()> {
    let reject = |reason: String| Error::InvalidIdentifier {
        kind,
        name: name.to_string(),
        reason,
    };

    if name.is_empty() {
        return Err(reject("identifier cannot be empty".to_string()));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(reject(format!(
            "exceeds maximum length of {MAX_IDENTIFIER_LENGTH} bytes (got {})",
            name.len()
        )));
    }

    if let Some(bad) = name
        .chars()
        .find(|ch| !(ch.is_ascii_alphanumeric() || *ch == '_'))
    {
        return Err(reject(format!("contains disallowed character {bad:?}")));
    }

    Ok(())
}

/// Quote a validated identifier for literal inclusion in SQL.
///
/// Embedded double quotes are doubled, although a name that passed
/// [`validate_identifier`] never contains one.
pub fn escape_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Return `"schema"."table"` after validating both parts.
pub fn qualify_table(schema: &str, table: &str) -> Result<String> {
    validate_identifier(schema, IdentifierKind::Schema)?;
    validate_identifier(table, IdentifierKind::Table)?;
    Ok(format!(
        "{}.{}",
        escape_identifier(schema),
        escape_identifier(table)
    ))
}
