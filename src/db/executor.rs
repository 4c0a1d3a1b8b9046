//! Query Executor
//!
//! Runs one accepted statement and reduces the result to a single
//! printable value. Failures never leave this module: they become the
//! default answer.

use crate::error::{BotError, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{Column, PgPool, Row, TypeInfo};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use uuid::Uuid;

/// Reply used whenever there is no value to show.
pub const DEFAULT_ANSWER: &str = "0";

// Extra time the client waits beyond the server-side statement timeout.
const CLIENT_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// First column of the first row, as the database rendered it.
    Scalar(String),
    /// No rows, NULL, or the statement failed.
    Default,
}

impl ExecutionOutcome {
    pub fn as_text(&self) -> &str {
        match self {
            ExecutionOutcome::Scalar(value) => value,
            ExecutionOutcome::Default => DEFAULT_ANSWER,
        }
    }
}

impl fmt::Display for ExecutionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_text())
    }
}

/// Narrow capability the executor needs from the database.
#[async_trait]
pub trait ScalarStore: Send + Sync {
    /// First column of the first row as text; `None` for no rows or NULL.
    async fn fetch_scalar(&self, sql: &str) -> Result<Option<String>>;
}

/// Postgres-backed store.
///
/// Every call checks a connection out of the pool, opens a `READ ONLY`
/// transaction with a local `statement_timeout`, reads one value and rolls
/// back. The transaction guard returns the connection to the pool on every
/// exit path, including cancellation.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    statement_timeout: Duration,
}

impl PgStore {
    pub fn new(pool: PgPool, statement_timeout: Duration) -> Self {
        Self {
            pool,
            statement_timeout,
        }
    }

    async fn read_once(&self, sql: &str) -> Result<Option<String>> {
        let mut tx = self.pool.begin().await?;

        let setup = format!(
            "SET TRANSACTION READ ONLY; SET LOCAL statement_timeout = {}",
            self.statement_timeout.as_millis()
        );
        sqlx::Executor::execute(&mut *tx, sqlx::raw_sql(&setup)).await?;

        // Prepared (extended protocol): Postgres refuses more than one
        // command, so nothing can end the read-only transaction early.
        let row = sqlx::query(sql)
            .persistent(false)
            .fetch_optional(&mut *tx)
            .await?;
        let value = match row {
            Some(row) if !row.is_empty() => render_first_column(&row)?,
            _ => None,
        };

        tx.rollback().await?;
        Ok(value)
    }
}

/// Column 0 as text, in the same shape the reply has always used
/// (`True`, `2025-11-28 10:00:00+00:00`, `1.0`). `None` for NULL.
fn render_first_column(row: &PgRow) -> Result<Option<String>> {
    let type_name = row.column(0).type_info().name().to_string();

    let value = match type_name.as_str() {
        "BOOL" => row
            .try_get::<Option<bool>, _>(0)?
            .map(|b| if b { "True" } else { "False" }.to_string()),
        "INT2" => row.try_get::<Option<i16>, _>(0)?.map(|v| v.to_string()),
        "INT4" => row.try_get::<Option<i32>, _>(0)?.map(|v| v.to_string()),
        "INT8" => row.try_get::<Option<i64>, _>(0)?.map(|v| v.to_string()),
        "FLOAT4" => row
            .try_get::<Option<f32>, _>(0)?
            .map(|v| render_float(f64::from(v))),
        "FLOAT8" => row.try_get::<Option<f64>, _>(0)?.map(render_float),
        "NUMERIC" => row.try_get::<Option<Decimal>, _>(0)?.map(|v| v.to_string()),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => row.try_get::<Option<String>, _>(0)?,
        "UUID" => row.try_get::<Option<Uuid>, _>(0)?.map(|v| v.to_string()),
        "DATE" => row
            .try_get::<Option<NaiveDate>, _>(0)?
            .map(|v| v.format("%Y-%m-%d").to_string()),
        "TIMESTAMP" => row
            .try_get::<Option<NaiveDateTime>, _>(0)?
            .map(|v| render_timestamp(&v, "")),
        "TIMESTAMPTZ" => row
            .try_get::<Option<DateTime<Utc>>, _>(0)?
            .map(|v| render_timestamp(&v.naive_utc(), "+00:00")),
        _ => return Err(BotError::UnsupportedColumn(type_name)),
    };
    Ok(value)
}

fn render_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

fn render_timestamp(value: &NaiveDateTime, offset: &str) -> String {
    let pattern = if value.nanosecond() == 0 {
        "%Y-%m-%d %H:%M:%S"
    } else {
        "%Y-%m-%d %H:%M:%S%.6f"
    };
    format!("{}{}", value.format(pattern), offset)
}

#[async_trait]
impl ScalarStore for PgStore {
    async fn fetch_scalar(&self, sql: &str) -> Result<Option<String>> {
        let limit = self.statement_timeout + CLIENT_GRACE;
        tokio::time::timeout(limit, self.read_once(sql))
            .await
            .map_err(|_| BotError::DatabaseTimeout(limit))?
    }
}

#[derive(Clone)]
pub struct QueryExecutor {
    store: Arc<dyn ScalarStore>,
}

impl QueryExecutor {
    pub fn new(store: Arc<dyn ScalarStore>) -> Self {
        Self { store }
    }

    /// Execute `statement`. Never fails: errors and empty results map to
    /// [`ExecutionOutcome::Default`].
    pub async fn execute(&self, statement: &str) -> ExecutionOutcome {
        let preview: String = statement.chars().take(200).collect();
        info!(sql = %preview, "Executing SQL");

        match self.store.fetch_scalar(statement).await {
            Ok(Some(value)) => {
                info!(value = %value, "Query result");
                ExecutionOutcome::Scalar(value)
            }
            Ok(None) => {
                info!("Query result: NULL or no rows");
                ExecutionOutcome::Default
            }
            Err(e) => {
                error!(error = %e, sql = %preview, "Query execution failed");
                ExecutionOutcome::Default
            }
        }
    }
}
