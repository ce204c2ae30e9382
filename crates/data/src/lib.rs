//! Data access for prediction-market research.
//!
//! This crate provides:
//! - Quote snapshot models and the parquet quote loader
//! - Column frames, the common unit of persistence for result tables
//! - Parquet and CSV storage utilities
//! - An async `PostgreSQL` client with SQL templating

pub mod csv_storage;
pub mod database;
pub mod frame;
pub mod models;
pub mod parquet_storage;
pub mod quotes;
pub mod template;

pub use csv_storage::CsvStorage;
pub use database::{quote_table_name, returns_rows, DatabaseClient, QueryOutcome, QueryParam};
pub use frame::{Column, ColumnData, Frame, ToFrame};
pub use parquet_storage::ParquetStorage;
pub use quotes::QuoteLoader;
pub use template::{parse_params, render_sql_template};

pub use models::{quotes_from_frame, quotes_to_frame, LoadStats, Outcome, QuoteRecord};
