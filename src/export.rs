//! File exports of the current result set.
use crate::error::{QueryError, QueryResult};
use crate::table::{display_value, ExportRow, COLUMNS};
use crate::util::escape_html;
use chrono::NaiveDate;
use rust_xlsxwriter::{ColNum, RowNum, Workbook, XlsxError};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const FILE_STEM: &str = "case-query-results";
const SHEET_TITLE: &str = "查詢結果";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
    Html,
    Xlsx,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
            ExportFormat::Html => "html",
            ExportFormat::Xlsx => "xlsx",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            "html" => Ok(ExportFormat::Html),
            "xlsx" | "excel" => Ok(ExportFormat::Xlsx),
            other => Err(format!("unknown export format '{other}'")),
        }
    }
}

/// `case-query-results_<YYYY-MM-DD>.<ext>`
pub fn export_file_name(format: ExportFormat, date: NaiveDate) -> String {
    format!(
        "{FILE_STEM}_{}.{}",
        date.format("%Y-%m-%d"),
        format.extension()
    )
}

/// Render rows in the requested format.
pub fn render(format: ExportFormat, rows: &[ExportRow]) -> QueryResult<Vec<u8>> {
    match format {
        ExportFormat::Csv => Ok(render_csv(rows).into_bytes()),
        ExportFormat::Json => render_json(rows).map(String::into_bytes),
        ExportFormat::Html => Ok(render_html(rows).into_bytes()),
        ExportFormat::Xlsx => {
            render_xlsx(rows).map_err(|err| QueryError::ExportLibraryUnavailable {
                format: "xlsx",
                reason: err.to_string(),
            })
        }
    }
}

/// Write one dated export file into `dir` and return its path.
pub fn write_export(
    format: ExportFormat,
    rows: &[ExportRow],
    dir: &Path,
    date: NaiveDate,
) -> QueryResult<PathBuf> {
    let bytes = render(format, rows)?;
    let path = dir.join(export_file_name(format, date));
    let storage_error = |reason: std::io::Error| QueryError::Storage {
        path: path.display().to_string(),
        reason: reason.to_string(),
    };
    fs::create_dir_all(dir).map_err(storage_error)?;
    fs::write(&path, bytes).map_err(storage_error)?;
    tracing::info!(path = %path.display(), rows = rows.len(), "export written");
    Ok(path)
}

fn csv_field(text: &str) -> String {
    if text.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text.to_string()
    }
}

fn render_csv(rows: &[ExportRow]) -> String {
    let mut out = String::new();
    let header: Vec<String> = COLUMNS.iter().map(|col| csv_field(col.label)).collect();
    out.push_str(&header.join(","));
    out.push_str("\r\n");
    for row in rows {
        let cells: Vec<String> = row
            .iter()
            .map(|(_, value)| csv_field(&display_value(value.as_ref())))
            .collect();
        out.push_str(&cells.join(","));
        out.push_str("\r\n");
    }
    out
}

struct OrderedRow<'a>(&'a ExportRow);

impl Serialize for OrderedRow<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (label, value) in self.0 {
            map.serialize_entry(label, value)?;
        }
        map.end()
    }
}

fn render_json(rows: &[ExportRow]) -> QueryResult<String> {
    let ordered: Vec<OrderedRow<'_>> = rows.iter().map(OrderedRow).collect();
    serde_json::to_string_pretty(&ordered).map_err(|err| QueryError::ExportLibraryUnavailable {
        format: "json",
        reason: err.to_string(),
    })
}

/// One worksheet named after the result view; numbers and booleans keep their
/// cell types, empty values leave the cell blank.
fn render_xlsx(rows: &[ExportRow]) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_TITLE)?;
    for (col, column) in COLUMNS.iter().enumerate() {
        sheet.write_string(0, col as ColNum, column.label)?;
    }
    for (index, row) in rows.iter().enumerate() {
        let line = index as RowNum + 1;
        for (col, (_, value)) in row.iter().enumerate() {
            let col = col as ColNum;
            match value {
                None | Some(Value::Null) => {}
                Some(Value::Number(number)) => match number.as_f64() {
                    Some(n) => {
                        sheet.write_number(line, col, n)?;
                    }
                    None => {
                        sheet.write_string(line, col, number.to_string())?;
                    }
                },
                Some(Value::Bool(flag)) => {
                    sheet.write_boolean(line, col, *flag)?;
                }
                Some(other) => {
                    sheet.write_string(line, col, display_value(Some(other)))?;
                }
            }
        }
    }
    workbook.save_to_buffer()
}

fn render_html(rows: &[ExportRow]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>{}</title></head><body>",
        escape_html(SHEET_TITLE)
    );
    out.push_str("<table>\n<thead><tr>");
    for col in COLUMNS {
        let _ = write!(out, "<th>{}</th>", escape_html(col.label));
    }
    out.push_str("</tr></thead>\n<tbody>\n");
    for row in rows {
        out.push_str("<tr>");
        for (_, value) in row {
            let _ = write!(out, "<td>{}</td>", escape_html(&display_value(value.as_ref())));
        }
        out.push_str("</tr>\n");
    }
    out.push_str("</tbody>\n</table>\n</body></html>\n");
    out
}
