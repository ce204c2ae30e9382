//! Result tables (text, HTML, CSV) and PNG charts for the research studies.

pub mod charts;
pub mod error;
pub mod rows;
pub mod tables;

pub use error::{ReportError, Result};
pub use rows::{
    coefficient_rows, display_rows, summary_rows, CalibrationBinRow, CalibrationSweepTableRow,
    CalibrationTimeRow, CoefficientRow, DailyReturnTableRow, MetricRow, PerformanceSweepTableRow,
    PerformanceTableRow, PnlTableRow, ProfitTableRow, TradeTableRow,
};
pub use tables::{
    format_csv_table, format_html_table, format_text_table, render_table, write_table, TableFormat,
};
