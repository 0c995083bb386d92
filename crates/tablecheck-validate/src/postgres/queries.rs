use sqlx::PgPool;
use tablecheck_core::{Error, Result};

use crate::session::JsonRow;

pub async fn fetch_database_name(pool: &PgPool) -> Result<String> {
    sqlx::query_scalar::<_, String>("select current_database()")
        .fetch_one(pool)
        .await
        .map_err(|err| Error::Db(err.to_string()))
}

pub async fn list_existing_tables(
    pool: &PgPool,
    schema: &str,
    tables: &[String],
) -> Result<Vec<String>> {
    sqlx::query_scalar::<_, String>(
        r#"
        select table_name::text
        from information_schema.tables
        where table_schema = $1
          and table_name = any($2::text[])
        order by table_name
        "#,
    )
    .bind(schema)
    .bind(tables)
    .fetch_all(pool)
    .await
    .map_err(|err| Error::MetadataQuery(err.to_string()))
}

pub async fn fetch_counts(pool: &PgPool, sql: &str) -> Result<Vec<(String, i64)>> {
    sqlx::query_as::<_, (String, i64)>(sql)
        .fetch_all(pool)
        .await
        .map_err(|err| Error::BatchCountQuery(err.to_string()))
}

pub async fn fetch_json_rows(pool: &PgPool, sql: &str) -> Result<Vec<JsonRow>> {
    let rows = sqlx::query_scalar::<_, String>(sql)
        .fetch_all(pool)
        .await
        .map_err(|err| Error::DetailValidation(err.to_string()))?;

    rows.iter()
        .map(|row| {
            serde_json::from_str::<JsonRow>(row)
                .map_err(|err| Error::DetailValidation(format!("undecodable row: {err}")))
        })
        .collect()
}
