//! Table rendering in text, HTML and CSV.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::error::{ReportError, Result};

const NO_DATA: &str = "No data";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TableFormat {
    #[default]
    Text,
    Html,
    Csv,
}

impl TableFormat {
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            TableFormat::Text => "txt",
            TableFormat::Html => "html",
            TableFormat::Csv => "csv",
        }
    }
}

impl fmt::Display for TableFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableFormat::Text => write!(f, "text"),
            TableFormat::Html => write!(f, "html"),
            TableFormat::Csv => write!(f, "csv"),
        }
    }
}

impl FromStr for TableFormat {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(TableFormat::Text),
            "html" => Ok(TableFormat::Html),
            "csv" => Ok(TableFormat::Csv),
            _ => Err(ReportError::InvalidData(format!(
                "Invalid table format: '{s}'. Valid values: text, html, csv"
            ))),
        }
    }
}

/// ASCII table under an underlined title.
pub fn format_text_table<T: Tabled>(rows: &[T], title: &str) -> String {
    let underline = "=".repeat(title.chars().count());
    if rows.is_empty() {
        return format!("{title}\n{underline}\n{NO_DATA}");
    }

    let mut table = Table::new(rows);
    table.with(Style::ascii());
    format!("{title}\n{underline}\n{table}")
}

/// Standalone HTML page holding one captioned table.
pub fn format_html_table<T: Tabled>(rows: &[T], title: &str) -> String {
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str(&format!("<title>{}</title>\n", escape_html(title)));
    html.push_str(
        "<style>\n\
         table { border-collapse: collapse; font-family: sans-serif; font-size: 14px; }\n\
         caption { font-weight: bold; font-size: 16px; padding: 8px; }\n\
         th { background: #f0f0f0; border-bottom: 2px solid #444; padding: 4px 10px; }\n\
         td { border-bottom: 1px solid #ddd; padding: 4px 10px; text-align: right; }\n\
         td:first-child { text-align: left; }\n\
         </style>\n",
    );
    html.push_str("</head>\n<body>\n");

    if rows.is_empty() {
        html.push_str(&format!(
            "<h3>{}</h3>\n<p>{NO_DATA}</p>\n",
            escape_html(title)
        ));
    } else {
        html.push_str("<table>\n");
        html.push_str(&format!("<caption>{}</caption>\n<thead>\n<tr>", escape_html(title)));
        for header in T::headers() {
            html.push_str(&format!("<th>{}</th>", escape_html(&header)));
        }
        html.push_str("</tr>\n</thead>\n<tbody>\n");
        for row in rows {
            html.push_str("<tr>");
            for field in row.fields() {
                html.push_str(&format!("<td>{}</td>", escape_html(&field)));
            }
            html.push_str("</tr>\n");
        }
        html.push_str("</tbody>\n</table>\n");
    }

    html.push_str("</body>\n</html>\n");
    html
}

/// CSV with a header line; empty input yields only the header.
///
/// # Errors
/// Returns an error if the CSV writer fails.
pub fn format_csv_table<T: Tabled>(rows: &[T]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(T::headers().iter().map(|h| h.as_bytes()))?;
    for row in rows {
        writer.write_record(row.fields().iter().map(|f| f.as_bytes()))?;
    }
    let bytes = writer.into_inner().map_err(|e| ReportError::Io(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| ReportError::InvalidData(e.to_string()))
}

/// Renders rows in the requested format.
///
/// # Errors
/// Returns an error if CSV encoding fails.
pub fn render_table<T: Tabled>(rows: &[T], title: &str, format: TableFormat) -> Result<String> {
    match format {
        TableFormat::Text => Ok(format_text_table(rows, title)),
        TableFormat::Html => Ok(format_html_table(rows, title)),
        TableFormat::Csv => format_csv_table(rows),
    }
}

/// Writes `<dir>/<stem>.<ext>` and returns its path. Creates `dir` when missing.
///
/// # Errors
/// Returns an error if the directory or file cannot be written.
pub fn write_table<T: Tabled>(
    dir: &Path,
    stem: &str,
    rows: &[T],
    title: &str,
    format: TableFormat,
) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("{stem}.{}", format.extension()));
    let mut contents = render_table(rows, title, format)?;
    if !contents.ends_with('\n') {
        contents.push('\n');
    }
    fs::write(&path, contents)?;
    tracing::info!("Wrote {} rows to {}", rows.len(), path.display());
    Ok(path)
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Tabled)]
    struct Row {
        #[tabled(rename = "Bin")]
        bin: String,
        #[tabled(rename = "Count")]
        count: usize,
    }

    fn rows() -> Vec<Row> {
        vec![
            Row {
                bin: "(80, 90]".to_string(),
                count: 12,
            },
            Row {
                bin: "(90, 99]".to_string(),
                count: 40,
            },
        ]
    }

    // ============================================
    // Formats
    // ============================================

    #[test]
    fn format_names_parse() {
        assert_eq!("HTML".parse::<TableFormat>().unwrap(), TableFormat::Html);
        assert_eq!("txt".parse::<TableFormat>().unwrap(), TableFormat::Text);
        assert!("xlsx".parse::<TableFormat>().is_err());
        assert_eq!(TableFormat::Csv.extension(), "csv");
        assert_eq!(TableFormat::default().to_string(), "text");
    }

    #[test]
    fn text_table_has_title_and_rows() {
        let text = format_text_table(&rows(), "Calibration");
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("Calibration"));
        assert_eq!(lines.next(), Some("==========="));
        assert!(text.contains("(90, 99]"));
        assert!(text.contains("Count"));
        assert!(text.contains("40"));
    }

    #[test]
    fn empty_tables_say_no_data() {
        let empty: Vec<Row> = Vec::new();
        assert!(format_text_table(&empty, "Lost Trades").ends_with("No data"));
        assert!(format_html_table(&empty, "Lost Trades").contains("<p>No data</p>"));
        assert_eq!(format_csv_table(&empty).unwrap(), "Bin,Count\n");
    }

    #[test]
    fn html_table_escapes_and_captions() {
        let html = format_html_table(&rows(), "P&L <by bin>");
        assert!(html.contains("<caption>P&amp;L &lt;by bin&gt;</caption>"));
        assert!(html.contains("<th>Bin</th><th>Count</th>"));
        assert!(html.contains("<td>(90, 99]</td><td>40</td>"));
    }

    #[test]
    fn csv_table_quotes_fields_with_commas() {
        let csv = format_csv_table(&rows()).unwrap();
        assert_eq!(csv, "Bin,Count\n\"(80, 90]\",12\n\"(90, 99]\",40\n");
    }

    #[test]
    fn write_table_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("underdog").join("experiment_1");

        let path =
            write_table(&nested, "calibration", &rows(), "Calibration", TableFormat::Csv).unwrap();

        assert_eq!(path, nested.join("calibration.csv"));
        let written = std::fs::read_to_string(path).unwrap();
        assert!(written.starts_with("Bin,Count\n"));
    }
}
