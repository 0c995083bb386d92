use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tablecheck_core::{
    redact_connection_string, BatchValidationResult, Error, ExpectedConfig, Result,
};

use crate::engine::validate_tables;
use crate::options::ValidateOptions;
use crate::session::{CountQuery, JsonRow, RowQuery, Session};

mod queries;

/// Session backed by a PostgreSQL connection pool.
#[derive(Debug, Clone)]
pub struct PgSession {
    pool: PgPool,
    database_id: String,
}

impl PgSession {
    /// Create a session using a pre-configured pool.
    pub fn new(pool: PgPool, database_id: impl Into<String>) -> Self {
        Self {
            pool,
            database_id: database_id.into(),
        }
    }

    /// Connect a new pool sized by `options`.
    ///
    /// Only the redacted form of `conn` is logged or kept.
    pub async fn connect(conn: &str, options: &ValidateOptions) -> Result<Self> {
        let redacted = redact_connection_string(conn);
        tracing::info!(event = "connecting", connection = %redacted.redacted);

        let pool = PgPoolOptions::new()
            .max_connections(options.max_connections)
            .acquire_timeout(options.acquire_timeout())
            .connect(conn)
            .await
            .map_err(|err| Error::Db(err.to_string()))?;

        Ok(Self::new(pool, redacted.database_id()))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Session for PgSession {
    fn engine(&self) -> &'static str {
        "postgres"
    }

    fn database_id(&self) -> String {
        self.database_id.clone()
    }

    async fn existing_tables(&self, schema: &str, tables: &[String]) -> Result<Vec<String>> {
        queries::list_existing_tables(&self.pool, schema, tables).await
    }

    async fn count_rows(&self, query: &CountQuery) -> Result<Vec<(String, i64)>> {
        queries::fetch_counts(&self.pool, &query.sql).await
    }

    async fn fetch_rows(&self, query: &RowQuery) -> Result<Vec<JsonRow>> {
        queries::fetch_json_rows(&self.pool, &query.sql).await
    }
}

/// Validate `expected` against a Postgres pool.
pub async fn validate_postgres(
    pool: &PgPool,
    expected: &ExpectedConfig,
    options: ValidateOptions,
) -> Result<BatchValidationResult> {
    let database_id = queries::fetch_database_name(pool).await?;
    let session = Arc::new(PgSession::new(pool.clone(), database_id));
    validate_tables(session, expected, options).await
}
