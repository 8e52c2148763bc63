//! Plan Executor
//!
//! Runs a plan against `PostgreSQL` inside exactly one transaction.
//!
//! # Guarantees
//! - All statements of a plan commit together or not at all; any failure
//!   returns before `COMMIT`, so the dropped transaction rolls back and no
//!   partial writes are observable.
//! - `SET LOCAL statement_timeout` bounds every statement; the configured
//!   connect timeout bounds the connection attempt. A stalled server cannot
//!   hang the process.
//! - Row data is fetched only for statements that return rows, detected
//!   from the prepared statement's column list.
//!
//! # Implementation Notes
//! - Uses `tokio-postgres` (async driver, requires tokio runtime)
//! - Timestamps are converted to RFC 3339 strings for output
//! - Connection errors are not logged to prevent credential leakage

use std::time::Duration;

use serde::Serialize;
use tokio_postgres::{NoTls, Row, Transaction};

use crate::error::{RadctlError, Result};
use crate::statement::Statement;

/// Connection descriptor resolved by the configuration layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// libpq-style DSN or `postgres://` URL; required to execute
    pub dsn: Option<String>,
    /// Bound on the connection attempt
    pub connect_timeout_seconds: u64,
    /// Per-statement bound, applied with `SET LOCAL statement_timeout`
    pub statement_timeout_seconds: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self { dsn: None, connect_timeout_seconds: 2, statement_timeout_seconds: 5 }
    }
}

/// Outcome of one executed statement
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecResult {
    /// Title of the statement this result belongs to
    pub title: String,
    /// Affected-row count, or fetched-row count for row-returning statements
    pub rowcount: u64,
    /// Row data, present only for statements that return rows
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<Vec<serde_json::Value>>>,
}

/// Executes plans over a `PostgreSQL` connection
pub struct PostgresExecutor {
    config: ConnectionConfig,
}

impl PostgresExecutor {
    #[must_use]
    pub fn new(config: ConnectionConfig) -> Self {
        Self { config }
    }

    /// Execute every statement of `plan` in one transaction
    ///
    /// Returns one [`ExecResult`] per statement, in plan order. On any
    /// failure the transaction is dropped without commit and the error is
    /// surfaced as [`RadctlError::ExecutionError`].
    pub async fn run(&self, plan: &[Statement]) -> Result<Vec<ExecResult>> {
        let dsn = self.config.dsn.as_deref().ok_or_else(|| {
            RadctlError::execution(
                "no database DSN configured (set postgres.dsn in the config file or RADCTL_PG_DSN)",
            )
        })?;

        let mut pg_config: tokio_postgres::Config = dsn
            .parse()
            .map_err(|e| RadctlError::execution(format!("invalid DSN: {e}")))?;
        pg_config.connect_timeout(Duration::from_secs(self.config.connect_timeout_seconds));

        let (mut client, connection) = pg_config
            .connect(NoTls)
            .await
            .map_err(|e| RadctlError::execution(format!("failed to connect: {e}")))?;

        // Drive the connection; errors surface through the client calls.
        tokio::spawn(async move {
            let _ = connection.await;
        });

        let transaction = client
            .transaction()
            .await
            .map_err(|e| RadctlError::execution(format!("failed to begin transaction: {e}")))?;

        let timeout_ms = self.config.statement_timeout_seconds.saturating_mul(1000);
        transaction
            .batch_execute(&format!("SET LOCAL statement_timeout = {timeout_ms}"))
            .await
            .map_err(|e| RadctlError::execution(format!("failed to set statement timeout: {e}")))?;

        let mut results = Vec::with_capacity(plan.len());
        for statement in plan {
            results.push(execute_statement(&transaction, statement).await?);
        }

        transaction
            .commit()
            .await
            .map_err(|e| RadctlError::execution(format!("failed to commit: {e}")))?;

        Ok(results)
    }
}

/// Execute one statement, fetching rows only when the statement returns any
async fn execute_statement(
    transaction: &Transaction<'_>,
    statement: &Statement,
) -> Result<ExecResult> {
    let prepared = transaction.prepare(statement.sql()).await.map_err(|e| {
        RadctlError::execution(format!("failed to prepare '{}': {e}", statement.title()))
    })?;

    let params = statement.sql_params();

    if prepared.columns().is_empty() {
        // INSERT/UPDATE/DELETE/DDL without RETURNING
        let rows_affected = transaction.execute(&prepared, &params).await.map_err(|e| {
            RadctlError::execution(format!("failed to execute '{}': {e}", statement.title()))
        })?;

        Ok(ExecResult { title: statement.title().to_string(), rowcount: rows_affected, rows: None })
    } else {
        let rows = transaction.query(&prepared, &params).await.map_err(|e| {
            RadctlError::execution(format!("failed to execute '{}': {e}", statement.title()))
        })?;

        let mut rows_data = Vec::with_capacity(rows.len());
        for row in &rows {
            rows_data.push(row_to_values(row)?);
        }

        Ok(ExecResult {
            title: statement.title().to_string(),
            rowcount: rows_data.len() as u64,
            rows: Some(rows_data),
        })
    }
}

/// Convert a `PostgreSQL` row to JSON-safe values
fn row_to_values(row: &Row) -> Result<Vec<serde_json::Value>> {
    let mut values = Vec::with_capacity(row.columns().len());
    for idx in 0..row.columns().len() {
        values.push(postgres_value_to_json(row, idx)?);
    }
    Ok(values)
}

/// Convert one `PostgreSQL` value to a JSON value
///
/// NULL detection goes through `Option<T>` of the column's own type;
/// fetching every column as text would misreport non-text NULLs.
fn postgres_value_to_json(row: &Row, idx: usize) -> Result<serde_json::Value> {
    use tokio_postgres::types::Type;

    let col_type = row.columns()[idx].type_();

    let fetch_err = |e: tokio_postgres::Error| {
        RadctlError::execution(format!("failed to read {} value: {e}", col_type.name()))
    };

    let value = match *col_type {
        Type::BOOL => match row.try_get::<_, Option<bool>>(idx).map_err(fetch_err)? {
            Some(v) => serde_json::Value::Bool(v),
            None => serde_json::Value::Null,
        },

        Type::INT2 => match row.try_get::<_, Option<i16>>(idx).map_err(fetch_err)? {
            Some(v) => serde_json::Value::Number(v.into()),
            None => serde_json::Value::Null,
        },
        Type::INT4 => match row.try_get::<_, Option<i32>>(idx).map_err(fetch_err)? {
            Some(v) => serde_json::Value::Number(v.into()),
            None => serde_json::Value::Null,
        },
        Type::INT8 => match row.try_get::<_, Option<i64>>(idx).map_err(fetch_err)? {
            Some(v) => serde_json::Value::Number(v.into()),
            None => serde_json::Value::Null,
        },

        Type::FLOAT4 => match row.try_get::<_, Option<f32>>(idx).map_err(fetch_err)? {
            // NaN/Infinity have no JSON number representation
            Some(v) => serde_json::Number::from_f64(f64::from(v))
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            None => serde_json::Value::Null,
        },
        Type::FLOAT8 => match row.try_get::<_, Option<f64>>(idx).map_err(fetch_err)? {
            Some(v) => serde_json::Number::from_f64(v)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            None => serde_json::Value::Null,
        },

        Type::VARCHAR | Type::TEXT | Type::BPCHAR | Type::NAME => {
            match row.try_get::<_, Option<String>>(idx).map_err(fetch_err)? {
                Some(v) => serde_json::Value::String(v),
                None => serde_json::Value::Null,
            }
        }

        Type::TIMESTAMP => {
            use chrono::NaiveDateTime;
            match row.try_get::<_, Option<NaiveDateTime>>(idx).map_err(fetch_err)? {
                Some(v) => serde_json::Value::String(v.format("%Y-%m-%dT%H:%M:%S").to_string()),
                None => serde_json::Value::Null,
            }
        }
        Type::TIMESTAMPTZ => {
            use chrono::{DateTime, Utc};
            match row.try_get::<_, Option<DateTime<Utc>>>(idx).map_err(fetch_err)? {
                Some(v) => serde_json::Value::String(v.to_rfc3339()),
                None => serde_json::Value::Null,
            }
        }

        // Default: try to get as string
        _ => match row.try_get::<_, Option<String>>(idx).map_err(|e| {
            RadctlError::execution(format!(
                "cannot convert PostgreSQL type '{}' for output: {e}",
                col_type.name()
            ))
        })? {
            Some(v) => serde_json::Value::String(v),
            None => serde_json::Value::Null,
        },
    };

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{build_plan, Intent, SchemaConfig};

    #[test]
    fn test_default_timeouts() {
        let config = ConnectionConfig::default();
        assert_eq!(config.dsn, None);
        assert_eq!(config.connect_timeout_seconds, 2);
        assert_eq!(config.statement_timeout_seconds, 5);
    }

    #[test]
    fn test_exec_result_serialization_omits_absent_rows() {
        let result = ExecResult { title: "t".to_string(), rowcount: 3, rows: None };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json, serde_json::json!({"title": "t", "rowcount": 3}));

        let result = ExecResult {
            title: "t".to_string(),
            rowcount: 1,
            rows: Some(vec![vec![serde_json::json!("a")]]),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["rows"], serde_json::json!([["a"]]));
    }

    #[tokio::test]
    async fn test_run_without_dsn_fails_fast() {
        let executor = PostgresExecutor::new(ConnectionConfig::default());
        let plan = build_plan(&SchemaConfig::default(), &Intent::ShowUsers).unwrap();

        let err = executor.run(&plan).await.unwrap_err();
        assert!(matches!(err, RadctlError::ExecutionError(_)));
        assert!(err.message().contains("DSN"));
    }

    #[tokio::test]
    async fn test_run_with_malformed_dsn_fails_fast() {
        let executor = PostgresExecutor::new(ConnectionConfig {
            dsn: Some("definitely not a dsn".to_string()),
            ..ConnectionConfig::default()
        });
        let plan = build_plan(&SchemaConfig::default(), &Intent::ShowUsers).unwrap();

        let err = executor.run(&plan).await.unwrap_err();
        assert!(err.message().contains("invalid DSN"));
    }

    #[tokio::test]
    #[ignore = "Requires running PostgreSQL instance"]
    async fn test_run_select_plan() {
        let executor = PostgresExecutor::new(ConnectionConfig {
            dsn: Some("host=localhost user=postgres password=postgres dbname=postgres".to_string()),
            ..ConnectionConfig::default()
        });

        let plan = vec![crate::statement::Statement::new(
            "probe",
            "SELECT 1 AS one, 'x' AS label;",
            vec![],
        )];
        let results = executor.run(&plan).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].rowcount, 1);
        assert_eq!(
            results[0].rows,
            Some(vec![vec![serde_json::json!(1), serde_json::json!("x")]])
        );
    }

    #[tokio::test]
    #[ignore = "Requires running PostgreSQL instance"]
    async fn test_failed_statement_rolls_back_whole_plan() {
        let dsn = "host=localhost user=postgres password=postgres dbname=postgres";
        let executor = PostgresExecutor::new(ConnectionConfig {
            dsn: Some(dsn.to_string()),
            ..ConnectionConfig::default()
        });

        let setup = vec![
            crate::statement::Statement::new(
                "create scratch table",
                "CREATE TABLE IF NOT EXISTS radctl_rollback_probe (id INT PRIMARY KEY);",
                vec![],
            ),
            crate::statement::Statement::new(
                "clear scratch table",
                "DELETE FROM radctl_rollback_probe;",
                vec![],
            ),
        ];
        executor.run(&setup).await.unwrap();

        // Second statement fails; the first must not survive.
        let doomed = vec![
            crate::statement::Statement::new(
                "insert probe row",
                "INSERT INTO radctl_rollback_probe (id) VALUES (1);",
                vec![],
            ),
            crate::statement::Statement::new("explode", "SELECT no_such_column FROM radctl_rollback_probe;", vec![]),
        ];
        assert!(executor.run(&doomed).await.is_err());

        let check = vec![crate::statement::Statement::new(
            "count probe rows",
            "SELECT COUNT(*) FROM radctl_rollback_probe;",
            vec![],
        )];
        let results = executor.run(&check).await.unwrap();
        assert_eq!(results[0].rows, Some(vec![vec![serde_json::json!(0)]]));
    }
}
