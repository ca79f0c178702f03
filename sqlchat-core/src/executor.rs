//! Query executor: runs a generated statement and captures rows or the error text.
//!
//! Cells are decoded by Postgres type name into JSON values so results can be
//! rendered for prompts and returned over HTTP without a per-query schema.

use futures::StreamExt;
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::{Column, Executor, PgPool, Row, Statement, TypeInfo, ValueRef};

use crate::db::is_connection_error;
use crate::models::{QueryResult, ResultSet};

/// Execute `sql`, keeping at most `max_rows` rows.
///
/// Returns `Err` only for connection-level failures. Syntax errors, missing
/// tables, permission errors and the like become `QueryResult::Error`.
pub async fn execute(pool: &PgPool, sql: &str, max_rows: usize) -> Result<QueryResult, sqlx::Error> {
    let mut stream = sqlx::query(sql).fetch(pool);
    let mut set = ResultSet::default();

    while let Some(item) = stream.next().await {
        let row = match item {
            Ok(row) => row,
            Err(e) => return statement_error(e),
        };

        if set.columns.is_empty() {
            set.columns = row.columns().iter().map(|c| c.name().to_string()).collect();
        }
        if set.rows.len() >= max_rows {
            set.truncated = true;
            break;
        }
        set.rows.push(decode_row(&row));
    }

    if set.rows.is_empty() {
        set.columns = result_columns(pool, sql).await?;
    }

    tracing::debug!(rows = set.rows.len(), truncated = set.truncated, "Statement executed");
    Ok(QueryResult::Rows(set))
}

/// Column names of `sql` without running it, so an empty `SELECT` still reports
/// its shape. Statements that return nothing (DDL, plain DML) have no columns.
async fn result_columns(pool: &PgPool, sql: &str) -> Result<Vec<String>, sqlx::Error> {
    match pool.prepare(sql).await {
        Ok(statement) => Ok(statement
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect()),
        Err(e) if is_connection_error(&e) => Err(e),
        Err(e) => {
            tracing::debug!(error = %e, "Could not describe result columns");
            Ok(Vec::new())
        }
    }
}

fn statement_error(error: sqlx::Error) -> Result<QueryResult, sqlx::Error> {
    if is_connection_error(&error) {
        return Err(error);
    }
    let message = match &error {
        sqlx::Error::Database(db_err) => db_err.message().to_string(),
        other => other.to_string(),
    };
    tracing::info!(error = %message, "Generated statement failed");
    Ok(QueryResult::error(message))
}

pub(crate) fn decode_row(row: &PgRow) -> Vec<Value> {
    (0..row.columns().len()).map(|i| decode_cell(row, i)).collect()
}

fn decode_cell(row: &PgRow, index: usize) -> Value {
    let type_name = row.columns()[index].type_info().name().to_string();

    match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(_) => {}
        Err(_) => return Value::String(format!("<{}>", type_name)),
    }

    let decoded = match type_name.as_str() {
        "BOOL" => row.try_get::<bool, _>(index).map(Value::from),
        "INT2" => row.try_get::<i16, _>(index).map(Value::from),
        "INT4" => row.try_get::<i32, _>(index).map(Value::from),
        "INT8" => row.try_get::<i64, _>(index).map(Value::from),
        "FLOAT4" => row.try_get::<f32, _>(index).map(|v| float_value(v as f64)),
        "FLOAT8" => row.try_get::<f64, _>(index).map(float_value),
        "NUMERIC" => row
            .try_get::<sqlx::types::Decimal, _>(index)
            .map(|d| numeric_value(&d.to_string())),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "CITEXT" => {
            row.try_get::<String, _>(index).map(Value::from)
        }
        "UUID" => row
            .try_get::<sqlx::types::Uuid, _>(index)
            .map(|u| Value::from(u.to_string())),
        "JSON" | "JSONB" => row.try_get::<Value, _>(index),
        "TIMESTAMPTZ" => row
            .try_get::<chrono::DateTime<chrono::Utc>, _>(index)
            .map(|t| Value::from(t.to_rfc3339())),
        "TIMESTAMP" => row
            .try_get::<chrono::NaiveDateTime, _>(index)
            .map(|t| Value::from(t.to_string())),
        "DATE" => row
            .try_get::<chrono::NaiveDate, _>(index)
            .map(|d| Value::from(d.to_string())),
        "TIME" => row
            .try_get::<chrono::NaiveTime, _>(index)
            .map(|t| Value::from(t.to_string())),
        _ => return Value::String(format!("<{}>", type_name)),
    };

    decoded.unwrap_or_else(|e| {
        tracing::debug!(column = index, pg_type = %type_name, error = %e, "Cell decode failed");
        Value::String(format!("<{}>", type_name))
    })
}

fn float_value(v: f64) -> Value {
    serde_json::Number::from_f64(v)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(v.to_string()))
}

/// NUMERIC keeps its exact decimal text when it does not fit a JSON number.
fn numeric_value(text: &str) -> Value {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Number(n)) => Value::Number(n),
        _ => Value::String(text.to_string()),
    }
}
