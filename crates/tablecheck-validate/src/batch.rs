use std::collections::{BTreeMap, BTreeSet};

use tablecheck_core::{qualify_table, validate_identifier, Error, IdentifierKind, Result};

use crate::session::{CountQuery, Session};

/// Build one `UNION ALL` query counting every table in `tables`.
///
/// Returns `None` when there is nothing to count. Table names appear both as
/// string literals and as quoted identifiers, so each is re-checked against the
/// allow-list here.
pub fn build_count_query(schema: &str, tables: &[String]) -> Result<Option<CountQuery>> {
    if tables.is_empty() {
        return Ok(None);
    }

    let mut selects = Vec::with_capacity(tables.len());
    for (idx, table) in tables.iter().enumerate() {
        validate_identifier(table, IdentifierKind::Table)?;
        let qualified = qualify_table(schema, table)?;
        let select = if idx == 0 {
            format!("SELECT '{table}'::text AS table_name, COUNT(*) AS row_count FROM {qualified}")
        } else {
            format!("SELECT '{table}'::text, COUNT(*) FROM {qualified}")
        };
        selects.push(select);
    }

    Ok(Some(CountQuery {
        sql: selects.join(" UNION ALL "),
        tables: tables.to_vec(),
    }))
}

/// Count the rows of every existing table in a single round trip.
///
/// With no existing tables no query is issued and the map is empty. A count
/// missing from the response fails the whole phase as
/// [`Error::BatchCountQuery`], like any driver error.
pub async fn count_existing(
    session: &dyn Session,
    schema: &str,
    existing: &BTreeSet<String>,
) -> Result<BTreeMap<String, i64>> {
    let tables: Vec<String> = existing.iter().cloned().collect();
    let Some(query) = build_count_query(schema, &tables)? else {
        return Ok(BTreeMap::new());
    };

    execute_count(session, &query).await
}

/// Run a prepared count query.
pub async fn execute_count(
    session: &dyn Session,
    query: &CountQuery,
) -> Result<BTreeMap<String, i64>> {
    let rows = session.count_rows(query).await.map_err(|err| match err {
        Error::Cancelled | Error::BatchCountQuery(_) => err,
        other => Error::BatchCountQuery(other.to_string()),
    })?;

    let counts: BTreeMap<String, i64> = rows.into_iter().collect();
    if let Some(missing) = query.tables.iter().find(|table| !counts.contains_key(*table)) {
        return Err(Error::BatchCountQuery(format!(
            "no row count returned for table '{missing}'"
        )));
    }

    tracing::info!(event = "batch_counted", tables = query.tables.len());

    Ok(counts)
}
