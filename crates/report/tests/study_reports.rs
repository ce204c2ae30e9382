//! Renders study results into every table format.

use chrono::{Duration, TimeZone, Utc};
use nt_research_backtest::{studies, PriceSource, Study};
use nt_research_data::{Outcome, QuoteRecord};
use nt_research_report::{
    display_rows, summary_rows, write_table, CalibrationBinRow, PerformanceTableRow, TableFormat,
    TradeTableRow,
};

fn quotes() -> Vec<QuoteRecord> {
    let start = Utc.with_ymd_and_hms(2025, 11, 9, 18, 0, 0).unwrap();
    [
        ("KXNBA-A", 95.0, Outcome::Yes),
        ("KXNBA-B", 93.0, Outcome::No),
        ("KXNBA-C", 97.0, Outcome::Yes),
        ("KXNBA-D", 42.0, Outcome::No),
    ]
    .into_iter()
    .map(|(ticker, ask, result)| {
        QuoteRecord::new(ticker, start, start - Duration::minutes(60), Some(ask), result)
    })
    .collect()
}

#[test]
fn calibration_table_in_every_format() {
    let study = studies::calibration(&quotes(), Study::Underdog, -60);
    let rows: Vec<CalibrationBinRow> = display_rows(&study.rows);
    let dir = tempfile::tempdir().unwrap();

    for format in [TableFormat::Text, TableFormat::Html, TableFormat::Csv] {
        let title = "Contract Calibration (t=-60)";
        let path = write_table(dir.path(), "calibration", &rows, title, format).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("(90, 99]"), "{format} output lacks the top bin");
        assert!(written.contains("Percent Won"));
    }
}

#[test]
fn performance_tables_list_lost_trades() {
    let study = studies::performance(
        &quotes(),
        Study::Underdog,
        -60,
        PriceSource::AskClose,
        Study::Underdog.top_bin(),
    );
    let dir = tempfile::tempdir().unwrap();

    let table: Vec<PerformanceTableRow> = display_rows(&study.table);
    let path =
        write_table(dir.path(), "performance", &table, "Performance", TableFormat::Csv).unwrap();
    let csv = std::fs::read_to_string(path).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[1].starts_with("Won,"));
    assert!(lines[3].starts_with("Total,"));

    let lost: Vec<TradeTableRow> = display_rows(&study.lost);
    let path =
        write_table(dir.path(), "lost_trades", &lost, "Lost Trades", TableFormat::Text).unwrap();
    let text = std::fs::read_to_string(path).unwrap();
    assert!(text.contains("KXNBA-B"));
    assert!(!text.contains("KXNBA-A"));
}

#[test]
fn empty_selection_writes_no_data() {
    let top_bin = Study::Merger.top_bin();
    let study = studies::performance(&[], Study::Merger, -30, PriceSource::Mid, top_bin);
    let dir = tempfile::tempdir().unwrap();

    let lost: Vec<TradeTableRow> = display_rows(&study.lost);
    let path =
        write_table(dir.path(), "lost_trades", &lost, "Lost Trades", TableFormat::Text).unwrap();

    assert!(std::fs::read_to_string(path).unwrap().contains("No data"));
}

#[test]
fn backtest_summary_as_metric_table() {
    let range = nt_research_backtest::PriceRange::new(90.0, 99.0);
    let (_, summary) = studies::backtest(&quotes(), -60, &range);
    let rows = summary_rows(&summary);
    let dir = tempfile::tempdir().unwrap();

    let path = write_table(dir.path(), "summary", &rows, &summary.name, TableFormat::Html).unwrap();
    let html = std::fs::read_to_string(path).unwrap();
    assert!(html.contains("<td>Trades</td><td>3</td>"));
}
