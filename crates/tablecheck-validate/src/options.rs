use std::time::Duration;

use serde::{Deserialize, Serialize};
use tablecheck_core::{validate_identifier, Error, IdentifierKind, Result};

/// Maximum number of detail queries in flight at once.
pub const DEFAULT_MAX_CONCURRENCY: usize = 5;

/// Largest accepted `max_concurrency`.
pub const MAX_CONCURRENCY_LIMIT: usize = 1024;

/// Options that control how validation behaves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidateOptions {
    /// Schema the expected tables live in.
    pub schema: String,
    /// Cap on concurrently running detail queries.
    pub max_concurrency: usize,
    /// Pool size used by [`crate::PgSession::connect`].
    pub max_connections: u32,
    /// Pool acquire timeout used by [`crate::PgSession::connect`].
    pub acquire_timeout_secs: u64,
}

impl Default for ValidateOptions {
    fn default() -> Self {
        Self {
            schema: "public".to_string(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            max_connections: 5,
            acquire_timeout_secs: 10,
        }
    }
}

impl ValidateOptions {
    /// Options targeting `schema`, everything else default.
    pub fn for_schema(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            ..Self::default()
        }
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    /// Reject options the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        validate_identifier(&self.schema, IdentifierKind::Schema)?;
        if self.max_concurrency == 0 {
            return Err(Error::InvalidConfig(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.max_concurrency > MAX_CONCURRENCY_LIMIT {
            return Err(Error::InvalidConfig(format!(
                "max_concurrency must be at most {MAX_CONCURRENCY_LIMIT}, got {}",
                self.max_concurrency
            )));
        }
        if self.max_connections == 0 {
            return Err(Error::InvalidConfig(
                "max_connections must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
