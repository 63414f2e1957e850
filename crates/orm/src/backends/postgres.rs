//! PostgreSQL backend over sqlx
//!
//! Renders compiled statements to parameterized SQL and executes them on
//! a caller-supplied pool. Constraint violations come back structured
//! through the `From<sqlx::Error>` conversion in `error.rs`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Number, Value};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::{Column, Row as SqlxRow, TypeInfo};
use tracing::debug;
use uuid::Uuid;

use crate::backends::core::{Backend, Row, StatementOutcome};
use crate::error::{OrmError, OrmResult};
use crate::query::{sql, Statement};

/// Row-decoding errors for the Postgres backend
#[derive(Debug, thiserror::Error)]
pub enum PgDecodeError {
    #[error("column '{column}' failed to decode: {source}")]
    Decode {
        column: String,
        #[source]
        source: sqlx::Error,
    },
}

impl From<PgDecodeError> for OrmError {
    fn from(err: PgDecodeError) -> Self {
        OrmError::Serialization(err.to_string())
    }
}

/// Backend executing statements against PostgreSQL
pub struct PostgresBackend {
    pool: PgPool,
}

impl PostgresBackend {
    /// Wrap an existing connection pool; pool configuration is the
    /// caller's responsibility
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Backend for PostgresBackend {
    async fn run(&self, statement: &Statement) -> OrmResult<StatementOutcome> {
        let (sql_text, params) = sql::render(statement);
        debug!(entity = statement.entity(), sql = %sql_text, "dispatching statement");

        let mut query = sqlx::query(&sql_text);
        for param in &params {
            query = bind_value(query, param);
        }

        if statement.returns_rows() {
            let pg_rows = query.fetch_all(&self.pool).await?;
            let mut rows = Vec::with_capacity(pg_rows.len());
            for pg_row in &pg_rows {
                rows.push(decode_row(pg_row)?);
            }
            Ok(StatementOutcome::rows(rows))
        } else {
            let result = query.execute(&self.pool).await?;
            Ok(StatementOutcome::affected(result.rows_affected()))
        }
    }
}

type PgQuery<'q> = sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>;

fn bind_value<'q>(query: PgQuery<'q>, value: &Value) -> PgQuery<'q> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(flag) => query.bind(*flag),
        Value::Number(number) => {
            if let Some(int) = number.as_i64() {
                query.bind(int)
            } else {
                query.bind(number.as_f64().unwrap_or_default())
            }
        }
        Value::String(text) => query.bind(text.clone()),
        other => query.bind(other.clone()),
    }
}

fn decode_row(row: &PgRow) -> OrmResult<Row> {
    let mut decoded = Row::new();
    for (index, column) in row.columns().iter().enumerate() {
        decoded.insert(column.name().to_string(), decode_column(row, index, column)?);
    }
    Ok(decoded)
}

fn decode_column(row: &PgRow, index: usize, column: &sqlx::postgres::PgColumn) -> OrmResult<Value> {
    let value = match column.type_info().name() {
        "BOOL" => row
            .try_get::<Option<bool>, _>(index)?
            .map(Value::Bool)
            .unwrap_or(Value::Null),
        "INT2" | "INT4" | "INT8" => row
            .try_get::<Option<i64>, _>(index)?
            .map(|v| Value::Number(Number::from(v)))
            .unwrap_or(Value::Null),
        "FLOAT4" | "FLOAT8" | "NUMERIC" => row
            .try_get::<Option<f64>, _>(index)?
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        "UUID" => row
            .try_get::<Option<Uuid>, _>(index)?
            .map(|v| Value::String(v.to_string()))
            .unwrap_or(Value::Null),
        "TIMESTAMP" | "TIMESTAMPTZ" => row
            .try_get::<Option<DateTime<Utc>>, _>(index)?
            .map(|v| Value::String(v.to_rfc3339()))
            .unwrap_or(Value::Null),
        "JSON" | "JSONB" => row
            .try_get::<Option<Value>, _>(index)?
            .unwrap_or(Value::Null),
        _ => row
            .try_get::<Option<String>, _>(index)
            .map_err(|source| PgDecodeError::Decode {
                column: column.name().to_string(),
                source,
            })?
            .map(Value::String)
            .unwrap_or(Value::Null),
    };
    Ok(value)
}
