use std::collections::BTreeSet;

use tablecheck_core::{Error, Result};

use crate::session::Session;

/// Determine which of `tables` exist in `schema` with a single metadata query.
///
/// Table names travel as bound values, never as SQL text. Names the session
/// reports that were not asked for are ignored. Any failure other than
/// cancellation becomes [`Error::MetadataQuery`].
pub async fn existing_tables(
    session: &dyn Session,
    schema: &str,
    tables: &[String],
) -> Result<BTreeSet<String>> {
    let found = session
        .existing_tables(schema, tables)
        .await
        .map_err(|err| match err {
            Error::Cancelled | Error::MetadataQuery(_) => err,
            other => Error::MetadataQuery(other.to_string()),
        })?;

    let requested: BTreeSet<&str> = tables.iter().map(String::as_str).collect();
    let existing: BTreeSet<String> = found
        .into_iter()
        .filter(|name| requested.contains(name.as_str()))
        .collect();

    tracing::info!(
        event = "existence_checked",
        schema = %schema,
        expected = tables.len(),
        existing = existing.len()
    );

    Ok(existing)
}
