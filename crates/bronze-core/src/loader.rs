use anyhow::{Context, Result};
use async_trait::async_trait;
use bronze_parser::coerce::{parse_day_first_date, parse_float, parse_integer};
use bronze_parser::{ColumnKind, TableBatch, TableSchema, Value};
use chrono::NaiveDate;
use serde::Serialize;
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::Postgres;
use tracing::{debug, info};

use crate::db::DbPool;

/// How a file's rows are written to its destination table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadPolicy {
    /// Insert every row; reprocessing the same file appends again.
    Append,
    /// Delete rows carrying the same `source_file`, then insert, atomically.
    ReplaceSource,
}

#[async_trait]
pub trait Database: Send + Sync {
    /// Writes one file's batch and returns the number of rows inserted.
    async fn load(&self, batch: &TableBatch, policy: LoadPolicy) -> Result<u64>;

    /// Removes every row of `table` loaded from `source_file`.
    async fn delete_source(&self, table: &str, source_file: &str) -> Result<u64>;
}

#[derive(Debug, Clone)]
pub struct PostgresDatabase {
    pool: DbPool,
}

impl PostgresDatabase {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl Database for PostgresDatabase {
    async fn load(&self, batch: &TableBatch, policy: LoadPolicy) -> Result<u64> {
        let table = batch.schema.table;
        let mut tx = self
            .pool
            .begin()
            .await
            .with_context(|| format!("failed to open load transaction for {table}"))?;

        if policy == LoadPolicy::ReplaceSource {
            let sql = delete_sql(table);
            let deleted = sqlx::query(&sql)
                .bind(&batch.source_file)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("failed to delete previous rows from {table}"))?
                .rows_affected();
            if deleted > 0 {
                info!(
                    table,
                    source_file = %batch.source_file,
                    deleted,
                    "Removed previous generation"
                );
            }
        }

        let written = if batch.is_empty() {
            0
        } else {
            let sql = insert_sql(&batch.schema);
            debug!(table, rows = batch.len(), "Inserting batch");
            bind_columns(sqlx::query(&sql), batch)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("failed to insert batch into {table}"))?
                .rows_affected()
        };

        tx.commit()
            .await
            .with_context(|| format!("failed to commit load into {table}"))?;
        Ok(written)
    }

    async fn delete_source(&self, table: &str, source_file: &str) -> Result<u64> {
        let sql = delete_sql(table);
        let result = sqlx::query(&sql)
            .bind(source_file)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to delete rows from {table}"))?;
        Ok(result.rows_affected())
    }
}

pub fn delete_sql(table: &str) -> String {
    format!("DELETE FROM {table} WHERE source_file = $1")
}

/// One set-oriented statement per batch: every column is bound as a single
/// array parameter and unnested back into rows.
pub fn insert_sql(schema: &TableSchema) -> String {
    let names = schema.column_names().join(", ");
    let selects: Vec<String> = schema
        .columns
        .iter()
        .map(|column| match column.kind {
            ColumnKind::Json => format!("batch.{}::jsonb", column.name),
            _ => format!("batch.{}", column.name),
        })
        .collect();
    let params: Vec<String> = schema
        .columns
        .iter()
        .enumerate()
        .map(|(idx, column)| format!("${}::{}", idx + 1, column.kind.array_type()))
        .collect();

    format!(
        "INSERT INTO {table} ({names}) SELECT {selects} FROM UNNEST({params}) AS batch({names})",
        table = schema.table,
        selects = selects.join(", "),
        params = params.join(", "),
    )
}

fn bind_columns<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    batch: &TableBatch,
) -> Query<'q, Postgres, PgArguments> {
    for (idx, column) in batch.schema.columns.iter().enumerate() {
        query = match column.kind {
            ColumnKind::Text | ColumnKind::Json => {
                query.bind(batch.column(idx).map(Value::to_text).collect::<Vec<_>>())
            }
            ColumnKind::Integer => query.bind(batch.column(idx).map(as_integer).collect::<Vec<_>>()),
            ColumnKind::Float => query.bind(batch.column(idx).map(as_float).collect::<Vec<_>>()),
            ColumnKind::Date => query.bind(batch.column(idx).map(as_date).collect::<Vec<_>>()),
        };
    }
    query
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Integer(value) => Some(*value),
        Value::Float(_) | Value::Text(_) => value.to_text().as_deref().and_then(parse_integer),
        _ => None,
    }
}

fn as_float(value: &Value) -> Option<f64> {
    match value {
        Value::Float(value) => Some(*value),
        Value::Integer(value) => Some(*value as f64),
        Value::Text(text) => parse_float(text),
        _ => None,
    }
}

fn as_date(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::Date(date) => Some(*date),
        Value::Text(text) => parse_day_first_date(text),
        _ => None,
    }
}
