use std::path::Path;
use std::sync::Arc;
use std::{env, fs};

use anyhow::{Context, Result};
use sqlx::{postgres::PgPoolOptions, PgPool};
use tablecheck_validate::{validate_postgres, ExpectedConfig, PgSession, ValidateOptions, Validator};

const FIXTURE: &str = "tests/fixtures/001_schema.sql";
const SCHEMA: &str = "tablecheck_it";

fn database_url() -> Option<String> {
    env::var("TEST_DATABASE_URL")
        .or_else(|_| env::var("DATABASE_URL"))
        .ok()
}

async fn reset_fixtures(pool: &PgPool) -> Result<()> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join(FIXTURE);
    let script =
        fs::read_to_string(&path).with_context(|| format!("reading fixture {}", path.display()))?;

    for statement in script.split(';') {
        let sql = statement.trim();
        if sql.is_empty() {
            continue;
        }

        sqlx::query(sql)
            .execute(pool)
            .await
            .with_context(|| format!("executing fixture statement: {sql}"))?;
    }

    Ok(())
}

fn expectations() -> Result<ExpectedConfig> {
    let config = ExpectedConfig::from_json_str(
        r#"{
          "Users": {
            "count": 3,
            "sample": [
              {"id": 1, "email": "ada@example.com", "balance": "10.50"},
              {"id": 3, "status": "disabled"}
            ],
            "columns": {
              "status": {"one_of": ["active", "disabled"]},
              "id": {"unique": true, "not_null": true}
            }
          },
          "orders": {
            "count": 2,
            "columns": {"total": [19.99, 5]}
          },
          "audit_log": {"count": 0, "sample": [{"id": 1}]},
          "missing_table": {"count": 0}
        }"#,
    )?;
    Ok(config)
}

#[tokio::test]
async fn validates_fixture_database() -> Result<()> {
    let Some(db_url) = database_url() else {
        eprintln!("skipping: set TEST_DATABASE_URL or DATABASE_URL for integration tests");
        return Ok(());
    };

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(std::time::Duration::from_secs(10))
        .connect(&db_url)
        .await
        .context("connecting to Postgres")?;

    reset_fixtures(&pool).await?;

    let report =
        validate_postgres(&pool, &expectations()?, ValidateOptions::for_schema(SCHEMA)).await?;

    assert!(!report.success(), "missing_table must fail the run");
    assert_eq!(report.failed_tables(), vec!["missing_table"]);

    let users = &report.results()["Users"];
    assert!(users.success, "Users errors: {:?}", users.errors);
    assert_eq!(users.row_count, 3);

    let orders = &report.results()["orders"];
    assert!(orders.success, "orders errors: {:?}", orders.errors);

    let audit = &report.results()["audit_log"];
    assert!(audit.success);
    assert!(audit
        .messages
        .contains(&"Detail checks skipped: table is empty".to_string()));

    let missing = &report.results()["missing_table"];
    assert_eq!(missing.row_count, 0);
    assert_eq!(missing.errors, vec!["Table not found in database"]);

    // existence probe, batch count, Users and orders detail queries
    assert_eq!(report.performance.query_count, 4);
    assert!(report.performance.batched);

    Ok(())
}

#[tokio::test]
async fn connect_reports_redacted_database_id() -> Result<()> {
    let Some(db_url) = database_url() else {
        eprintln!("skipping: set TEST_DATABASE_URL or DATABASE_URL for integration tests");
        return Ok(());
    };

    let session = PgSession::connect(&db_url, &ValidateOptions::for_schema(SCHEMA)).await?;
    reset_fixtures(session.pool()).await?;

    let mut expected = ExpectedConfig::new();
    expected.insert("orders", tablecheck_validate::TableExpected::with_count(2));

    let report = Validator::new(Arc::new(session), ValidateOptions::for_schema(SCHEMA))
        .validate(&expected)
        .await?;

    assert!(report.success());
    assert!(!report.database_id.contains('@'), "{}", report.database_id);
    Ok(())
}
