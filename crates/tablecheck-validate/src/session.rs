use async_trait::async_trait;
use serde_json::{Map, Value};

use tablecheck_core::Result;

/// One database row decoded as a JSON object keyed by column name.
pub type JsonRow = Map<String, Value>;

/// A batched `UNION ALL` count query and the tables it covers, in query order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountQuery {
    pub sql: String,
    pub tables: Vec<String>,
}

/// A projection of selected columns of one table, returned row by row as JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowQuery {
    pub table: String,
    pub columns: Vec<String>,
    pub sql: String,
}

/// Database session the validation engine issues its round trips through.
///
/// Every method is exactly one request/response cycle. Query text handed to
/// implementations is built from allow-listed, quoted identifiers only; values
/// such as table names in the existence probe must be bound as parameters.
#[async_trait]
pub trait Session: Send + Sync {
    /// Returns the engine identifier (e.g. `postgres`).
    fn engine(&self) -> &'static str;

    /// Identifier of the database reported in validation results.
    fn database_id(&self) -> String;

    /// Return the subset of `tables` that exist in `schema`.
    async fn existing_tables(&self, schema: &str, tables: &[String]) -> Result<Vec<String>>;

    /// Execute a batched count query, returning `(table_name, row_count)` pairs.
    async fn count_rows(&self, query: &CountQuery) -> Result<Vec<(String, i64)>>;

    /// Fetch every row of a projection.
    async fn fetch_rows(&self, query: &RowQuery) -> Result<Vec<JsonRow>>;
}
