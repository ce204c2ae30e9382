//! Column frames.
//!
//! A [`Frame`] is a small, typed, column-oriented table. Every result table the
//! research pipelines produce is converted into one before being written to
//! parquet, CSV or PostgreSQL, and quote snapshots are read through one.

use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Values of a single column. `None` is a null cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ColumnData {
    Int(Vec<Option<i64>>),
    Float(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
    Timestamp(Vec<Option<DateTime<Utc>>>),
}

impl ColumnData {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Int(v) => v.len(),
            Self::Float(v) => v.len(),
            Self::Text(v) => v.len(),
            Self::Timestamp(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Timestamp(_) => "timestamp",
        }
    }

    /// Renders one cell for text outputs; nulls become an empty string.
    #[must_use]
    pub fn display(&self, row: usize) -> String {
        match self {
            Self::Int(v) => v.get(row).copied().flatten().map(|x| x.to_string()),
            Self::Float(v) => v.get(row).copied().flatten().map(|x| x.to_string()),
            Self::Text(v) => v.get(row).cloned().flatten(),
            Self::Timestamp(v) => v.get(row).copied().flatten().map(|x| x.to_rfc3339()),
        }
        .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Frame {
    columns: Vec<Column>,
}

impl Frame {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_column(mut self, name: impl Into<String>, data: ColumnData) -> Self {
        self.columns.push(Column {
            name: name.into(),
            data,
        });
        self
    }

    #[must_use]
    pub fn with_int(self, name: &str, values: impl IntoIterator<Item = Option<i64>>) -> Self {
        self.with_column(name, ColumnData::Int(values.into_iter().collect()))
    }

    #[must_use]
    pub fn with_float(self, name: &str, values: impl IntoIterator<Item = Option<f64>>) -> Self {
        self.with_column(name, ColumnData::Float(values.into_iter().collect()))
    }

    #[must_use]
    pub fn with_text(self, name: &str, values: impl IntoIterator<Item = Option<String>>) -> Self {
        self.with_column(name, ColumnData::Text(values.into_iter().collect()))
    }

    #[must_use]
    pub fn with_timestamp(
        self,
        name: &str,
        values: impl IntoIterator<Item = Option<DateTime<Utc>>>,
    ) -> Self {
        self.with_column(name, ColumnData::Timestamp(values.into_iter().collect()))
    }

    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    #[must_use]
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.columns.first().map_or(0, |c| c.data.len())
    }

    /// Verifies that every column has the same length and names are unique.
    ///
    /// # Errors
    /// Returns an error describing the first offending column.
    pub fn check_shape(&self) -> Result<()> {
        let rows = self.num_rows();
        for (i, column) in self.columns.iter().enumerate() {
            if column.data.len() != rows {
                bail!(
                    "column '{}' has {} rows, expected {}",
                    column.name,
                    column.data.len(),
                    rows
                );
            }
            if self.columns[..i].iter().any(|c| c.name == column.name) {
                bail!("duplicate column '{}'", column.name);
            }
        }
        Ok(())
    }

    fn require(&self, name: &str) -> Result<&Column> {
        self.column(name)
            .ok_or_else(|| anyhow!("missing required column '{name}'"))
    }

    /// Numeric column as floats; integer columns are widened.
    ///
    /// # Errors
    /// Returns an error if the column is missing or not numeric.
    pub fn floats(&self, name: &str) -> Result<Vec<Option<f64>>> {
        match &self.require(name)?.data {
            ColumnData::Float(v) => Ok(v.clone()),
            #[allow(clippy::cast_precision_loss)]
            ColumnData::Int(v) => Ok(v.iter().map(|x| x.map(|x| x as f64)).collect()),
            other => bail!("column '{name}' is {}, expected a number", other.kind()),
        }
    }

    /// Like [`Frame::floats`] but yields `None` for a missing column.
    ///
    /// # Errors
    /// Returns an error if the column exists but is not numeric.
    pub fn optional_floats(&self, name: &str) -> Result<Option<Vec<Option<f64>>>> {
        if self.column(name).is_none() {
            return Ok(None);
        }
        self.floats(name).map(Some)
    }

    /// # Errors
    /// Returns an error if the column is missing or not text.
    pub fn texts(&self, name: &str) -> Result<&[Option<String>]> {
        match &self.require(name)?.data {
            ColumnData::Text(v) => Ok(v),
            other => bail!("column '{name}' is {}, expected text", other.kind()),
        }
    }

    /// # Errors
    /// Returns an error if the column is missing or not a timestamp.
    pub fn timestamps(&self, name: &str) -> Result<&[Option<DateTime<Utc>>]> {
        match &self.require(name)?.data {
            ColumnData::Timestamp(v) => Ok(v),
            other => bail!("column '{name}' is {}, expected a timestamp", other.kind()),
        }
    }
}

/// Conversion of a slice of result rows into a [`Frame`].
pub trait ToFrame: Sized {
    fn to_frame(rows: &[Self]) -> Frame;
}
