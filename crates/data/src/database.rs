use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use regex::Regex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{Map, Value as JsonValue};
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Column as _, Decode, PgPool, Postgres, Row, Type, TypeInfo};
use std::collections::HashMap;
use std::path::Path;

use crate::frame::{ColumnData, Frame};
use crate::models::{quotes_from_frame, LoadStats, QuoteRecord};
use crate::template::render_sql_template;

const ROW_KEYWORDS: [&str; 6] = ["SELECT", "WITH", "SHOW", "VALUES", "TABLE", "EXPLAIN"];

/// A positional query parameter (`$1`, `$2`, ...).
#[derive(Debug, Clone, PartialEq)]
pub enum QueryParam {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    Null,
}

impl QueryParam {
    /// Infers the parameter type from its command-line spelling.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("null") {
            return Self::Null;
        }
        if let Ok(b) = trimmed.to_lowercase().parse::<bool>() {
            return Self::Bool(b);
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return Self::Int(i);
        }
        if let Ok(f) = trimmed.parse::<f64>() {
            return Self::Float(f);
        }
        Self::Text(raw.to_string())
    }
}

/// Result of a single statement.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    Rows(Vec<Map<String, JsonValue>>),
    Affected(u64),
}

pub struct DatabaseClient {
    pool: PgPool,
}

impl DatabaseClient {
    /// Creates a new database client connected to the specified `PostgreSQL` database.
    ///
    /// # Errors
    /// Returns an error if the database connection cannot be established.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to connect to PostgreSQL")?;
        Ok(Self { pool })
    }

    /// Runs one statement. Row-returning statements yield JSON objects keyed by
    /// column name, everything else the affected row count.
    ///
    /// # Errors
    /// Returns an error if the statement fails or a column cannot be decoded.
    pub async fn execute_query(&self, sql: &str, params: &[QueryParam]) -> Result<QueryOutcome> {
        let query = bind_params(sqlx::query(sql), params);

        if returns_rows(sql) {
            let rows = query.fetch_all(&self.pool).await.context("Query failed")?;
            let objects = rows.iter().map(row_to_json).collect::<Result<Vec<_>>>()?;
            tracing::debug!("Query returned {} rows", objects.len());
            Ok(QueryOutcome::Rows(objects))
        } else {
            let done = query.execute(&self.pool).await.context("Statement failed")?;
            tracing::debug!("Statement affected {} rows", done.rows_affected());
            Ok(QueryOutcome::Affected(done.rows_affected()))
        }
    }

    /// Reads a SQL file, renders its `{{ name }}` placeholders and executes it.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, a placeholder has no value
    /// or the statement fails.
    pub async fn execute_sql_file(
        &self,
        path: impl AsRef<Path>,
        params: &HashMap<String, String>,
    ) -> Result<QueryOutcome> {
        let path = path.as_ref();
        let template = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read SQL file: {}", path.display()))?;
        let sql = render_sql_template(&template, params)
            .with_context(|| format!("Failed to render SQL file: {}", path.display()))?;
        self.execute_query(&sql, &[]).await
    }

    /// Replaces `table` with the contents of `frame`.
    ///
    /// The drop, create and inserts run in one transaction.
    ///
    /// # Errors
    /// Returns an error for an invalid table name, a ragged frame or any failed
    /// statement.
    pub async fn write_frame(&self, table: &str, frame: &Frame) -> Result<()> {
        frame.check_shape()?;
        if frame.num_columns() == 0 {
            bail!("Cannot write a frame without columns to '{table}'");
        }
        let table_sql = quote_table_name(table)?;

        let definitions = frame
            .columns()
            .iter()
            .map(|c| format!("{} {}", quote_ident(&c.name), sql_type(&c.data)))
            .collect::<Vec<_>>()
            .join(", ");
        let names = frame
            .columns()
            .iter()
            .map(|c| quote_ident(&c.name))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (1..=frame.num_columns())
            .map(|i| format!("${i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let insert = format!("INSERT INTO {table_sql} ({names}) VALUES ({placeholders})");

        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!("DROP TABLE IF EXISTS {table_sql}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("CREATE TABLE {table_sql} ({definitions})"))
            .execute(&mut *tx)
            .await?;

        for row in 0..frame.num_rows() {
            let mut query = sqlx::query(&insert);
            for column in frame.columns() {
                query = match &column.data {
                    ColumnData::Int(v) => query.bind(v[row]),
                    ColumnData::Float(v) => query.bind(v[row]),
                    ColumnData::Text(v) => query.bind(v[row].clone()),
                    ColumnData::Timestamp(v) => query.bind(v[row]),
                };
            }
            query.execute(&mut *tx).await?;
        }

        tx.commit().await?;
        tracing::info!("Wrote {} rows to {}", frame.num_rows(), table);
        Ok(())
    }

    /// Reads a whole table into a [`Frame`].
    ///
    /// Column types come from the returned rows, so an empty table yields a
    /// frame without columns. Columns of unsupported types are skipped.
    ///
    /// # Errors
    /// Returns an error for an invalid table name or a failed query.
    pub async fn read_frame(&self, table: &str) -> Result<Frame> {
        let table_sql = quote_table_name(table)?;
        let rows = sqlx::query(&format!("SELECT * FROM {table_sql}"))
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to read table {table}"))?;

        let Some(first) = rows.first() else {
            tracing::warn!("Table {} is empty", table);
            return Ok(Frame::new());
        };

        let mut frame = Frame::new();
        for (idx, column) in first.columns().iter().enumerate() {
            let type_name = column.type_info().name();
            let Some(kind) = SqlKind::from_type_name(type_name) else {
                tracing::warn!(
                    "Skipping column '{}' with unsupported type {}",
                    column.name(),
                    type_name
                );
                continue;
            };
            frame = frame.with_column(column.name(), decode_column(&rows, idx, kind)?);
        }

        Ok(frame)
    }

    /// Reads a quote snapshot stored in `table`.
    ///
    /// # Errors
    /// Returns an error if the table cannot be read or lacks a required column.
    pub async fn read_quotes(&self, table: &str) -> Result<(Vec<QuoteRecord>, LoadStats)> {
        let frame = self.read_frame(table).await?;
        quotes_from_frame(&frame).with_context(|| format!("Invalid quote table: {table}"))
    }
}

fn bind_params<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &[QueryParam],
) -> Query<'q, Postgres, PgArguments> {
    for param in params {
        query = match param {
            QueryParam::Int(v) => query.bind(*v),
            QueryParam::Float(v) => query.bind(*v),
            QueryParam::Bool(v) => query.bind(*v),
            QueryParam::Text(v) => query.bind(v.clone()),
            QueryParam::Null => query.bind(None::<String>),
        };
    }
    query
}

/// Whether a statement produces a result set.
#[must_use]
pub fn returns_rows(sql: &str) -> bool {
    let body = strip_leading_comments(sql);
    let first = body
        .trim_start_matches('(')
        .split(|c: char| c.is_whitespace() || c == '(' || c == ';')
        .next()
        .unwrap_or_default()
        .to_uppercase();

    if ROW_KEYWORDS.contains(&first.as_str()) {
        return true;
    }
    Regex::new(r"(?i)\bRETURNING\b").is_ok_and(|re| re.is_match(body))
}

fn strip_leading_comments(sql: &str) -> &str {
    let mut rest = sql.trim_start();
    loop {
        if let Some(line) = rest.strip_prefix("--") {
            rest = line.split_once('\n').map_or("", |(_, tail)| tail).trim_start();
        } else if let Some(block) = rest.strip_prefix("/*") {
            rest = block.split_once("*/").map_or("", |(_, tail)| tail).trim_start();
        } else {
            return rest;
        }
    }
}

/// Validates a plain or schema-qualified table name and quotes each part.
///
/// # Errors
/// Returns an error if the name is not `ident` or `schema.ident`.
pub fn quote_table_name(table: &str) -> Result<String> {
    let valid = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$")?;
    if !valid.is_match(table) {
        bail!("Invalid table name '{table}'");
    }
    Ok(table.split('.').map(quote_ident).collect::<Vec<_>>().join("."))
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn sql_type(data: &ColumnData) -> &'static str {
    match data {
        ColumnData::Int(_) => "BIGINT",
        ColumnData::Float(_) => "DOUBLE PRECISION",
        ColumnData::Text(_) => "TEXT",
        ColumnData::Timestamp(_) => "TIMESTAMPTZ",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SqlKind {
    Int2,
    Int4,
    Int8,
    Float4,
    Float8,
    Numeric,
    Bool,
    Text,
    TimestampTz,
    Timestamp,
    Date,
    Json,
}

impl SqlKind {
    fn from_type_name(name: &str) -> Option<Self> {
        let kind = match name {
            "INT2" => Self::Int2,
            "INT4" => Self::Int4,
            "INT8" => Self::Int8,
            "FLOAT4" => Self::Float4,
            "FLOAT8" => Self::Float8,
            "NUMERIC" => Self::Numeric,
            "BOOL" => Self::Bool,
            "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => Self::Text,
            "TIMESTAMPTZ" => Self::TimestampTz,
            "TIMESTAMP" => Self::Timestamp,
            "DATE" => Self::Date,
            "JSON" | "JSONB" => Self::Json,
            _ => return None,
        };
        Some(kind)
    }
}

fn decode_all<T, U>(rows: &[PgRow], idx: usize, map: impl Fn(T) -> U) -> Result<Vec<Option<U>>>
where
    T: for<'r> Decode<'r, Postgres> + Type<Postgres>,
{
    rows.iter()
        .map(|row| -> Result<Option<U>> { Ok(row.try_get::<Option<T>, _>(idx)?.map(&map)) })
        .collect()
}

fn decode_column(rows: &[PgRow], idx: usize, kind: SqlKind) -> Result<ColumnData> {
    let data = match kind {
        SqlKind::Int2 => ColumnData::Int(decode_all(rows, idx, |v: i16| i64::from(v))?),
        SqlKind::Int4 => ColumnData::Int(decode_all(rows, idx, |v: i32| i64::from(v))?),
        SqlKind::Int8 => ColumnData::Int(decode_all(rows, idx, |v: i64| v)?),
        SqlKind::Bool => ColumnData::Int(decode_all(rows, idx, |v: bool| i64::from(v))?),
        SqlKind::Float4 => ColumnData::Float(decode_all(rows, idx, |v: f32| f64::from(v))?),
        SqlKind::Float8 => ColumnData::Float(decode_all(rows, idx, |v: f64| v)?),
        SqlKind::Numeric => ColumnData::Float(
            decode_all(rows, idx, |d: Decimal| d.to_f64())?
                .into_iter()
                .map(Option::flatten)
                .collect(),
        ),
        SqlKind::Text => ColumnData::Text(decode_all(rows, idx, |v: String| v)?),
        SqlKind::Json => ColumnData::Text(decode_all(rows, idx, |v: JsonValue| v.to_string())?),
        SqlKind::TimestampTz => {
            ColumnData::Timestamp(decode_all(rows, idx, |t: DateTime<Utc>| t)?)
        }
        SqlKind::Timestamp => {
            ColumnData::Timestamp(decode_all(rows, idx, |t: NaiveDateTime| t.and_utc())?)
        }
        SqlKind::Date => ColumnData::Timestamp(decode_all(rows, idx, |d: NaiveDate| {
            d.and_time(NaiveTime::MIN).and_utc()
        })?),
    };
    Ok(data)
}

fn row_to_json(row: &PgRow) -> Result<Map<String, JsonValue>> {
    let mut object = Map::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let type_name = column.type_info().name();
        let value = match SqlKind::from_type_name(type_name) {
            Some(SqlKind::Int2) => row.try_get::<Option<i16>, _>(idx)?.map(JsonValue::from),
            Some(SqlKind::Int4) => row.try_get::<Option<i32>, _>(idx)?.map(JsonValue::from),
            Some(SqlKind::Int8) => row.try_get::<Option<i64>, _>(idx)?.map(JsonValue::from),
            Some(SqlKind::Float4) => row.try_get::<Option<f32>, _>(idx)?.map(JsonValue::from),
            Some(SqlKind::Float8) => row.try_get::<Option<f64>, _>(idx)?.map(JsonValue::from),
            Some(SqlKind::Numeric) => {
                row.try_get::<Option<Decimal>, _>(idx)?
                    .and_then(|d| d.to_f64())
                    .map(JsonValue::from)
            }
            Some(SqlKind::Bool) => row.try_get::<Option<bool>, _>(idx)?.map(JsonValue::from),
            Some(SqlKind::Text) => row.try_get::<Option<String>, _>(idx)?.map(JsonValue::from),
            Some(SqlKind::Json) => row.try_get::<Option<JsonValue>, _>(idx)?,
            Some(SqlKind::TimestampTz) => row
                .try_get::<Option<DateTime<Utc>>, _>(idx)?
                .map(|t| JsonValue::from(t.to_rfc3339())),
            Some(SqlKind::Timestamp) => row
                .try_get::<Option<NaiveDateTime>, _>(idx)?
                .map(|t| JsonValue::from(t.to_string())),
            Some(SqlKind::Date) => row
                .try_get::<Option<NaiveDate>, _>(idx)?
                .map(|d| JsonValue::from(d.to_string())),
            None => {
                tracing::debug!(
                    "Column '{}' of type {} rendered as null",
                    column.name(),
                    type_name
                );
                None
            }
        };
        object.insert(column.name().to_string(), value.unwrap_or(JsonValue::Null));
    }
    Ok(object)
}
