//! Tabular view over a batch result set.
//!
//! Columns are an explicit ordered list of `(key, label)` pairs, so
//! projection, sorting and export never need to look a key up by its label.
use crate::batch::{QueryRecord, QUERIED_VALUE_KEY, SEQUENCE_KEY, STATUS_KEY};
use crate::error::{QueryError, QueryResult};
use crate::util::collapse_whitespace;
use serde_json::Value;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub key: &'static str,
    pub label: &'static str,
}

const fn column(key: &'static str, label: &'static str) -> Column {
    Column { key, label }
}

/// Display columns in their fixed order.
pub const COLUMNS: [Column; 12] = [
    column(SEQUENCE_KEY, "序號"),
    column(QUERIED_VALUE_KEY, "查詢值"),
    column("applyNumber", "受理號碼"),
    column("policyNumber", "保單號碼"),
    column("approvalNumber", "確認書編號"),
    column("receiptNumber", "送金單"),
    column("insuredId", "被保人ＩＤ"),
    column("statusCombined", "狀態"),
    column("uwApproverUnit", "分公司"),
    column("uwApprover", "核保員"),
    column("approvalUser", "覆核"),
    column(STATUS_KEY, "查詢結果"),
];

/// Find a column by key, or failing that by label.
pub fn find_column(name: &str) -> QueryResult<Column> {
    let name = name.trim();
    COLUMNS
        .iter()
        .find(|col| col.key == name)
        .or_else(|| COLUMNS.iter().find(|col| col.label == name))
        .copied()
        .ok_or_else(|| QueryError::UnknownColumn(name.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub key: &'static str,
    pub direction: SortDirection,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            key: SEQUENCE_KEY,
            direction: SortDirection::Ascending,
        }
    }
}

/// One export row: `(label, value)` pairs in column order.
pub type ExportRow = Vec<(&'static str, Option<Value>)>;

#[derive(Debug, Default)]
pub struct ResultTable {
    records: Vec<QueryRecord>,
    sort: SortSpec,
}

impl ResultTable {
    pub fn records(&self) -> &[QueryRecord] {
        &self.records
    }

    pub fn sort_spec(&self) -> SortSpec {
        self.sort
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Install a fresh result set; the sort resets to `NO` ascending.
    pub fn replace(&mut self, records: Vec<QueryRecord>) {
        self.records = records;
        self.sort = SortSpec::default();
    }

    /// Display values for one record, blank where the record lacks a column.
    pub fn project(record: &QueryRecord) -> Vec<String> {
        COLUMNS
            .iter()
            .map(|col| display_value(record.value(col.key).as_ref()))
            .collect()
    }

    pub fn rows(&self) -> Vec<Vec<String>> {
        self.records.iter().map(Self::project).collect()
    }

    /// Re-sort the whole result set. Ties keep their previous order.
    pub fn sort_by(&mut self, name: &str, direction: SortDirection) -> QueryResult<SortSpec> {
        let column = find_column(name)?;
        self.records.sort_by(|a, b| {
            let ordering = compare_values(a.value(column.key).as_ref(), b.value(column.key).as_ref());
            match direction {
                SortDirection::Ascending => ordering,
                SortDirection::Descending => ordering.reverse(),
            }
        });
        self.sort = SortSpec {
            key: column.key,
            direction,
        };
        tracing::debug!(key = column.key, ?direction, "result set sorted");
        Ok(self.sort)
    }

    /// Header-click semantics: the same ascending key flips to descending,
    /// anything else sorts ascending.
    pub fn toggle_sort(&mut self, name: &str) -> QueryResult<SortSpec> {
        let column = find_column(name)?;
        let direction = if self.sort.key == column.key
            && self.sort.direction == SortDirection::Ascending
        {
            SortDirection::Descending
        } else {
            SortDirection::Ascending
        };
        self.sort_by(column.key, direction)
    }

    /// Header plus one line per record, tab-separated, for the clipboard.
    pub fn to_tabular_text(&self) -> String {
        let header = COLUMNS
            .iter()
            .map(|col| col.label)
            .collect::<Vec<_>>()
            .join("\t");
        let mut lines = vec![header];
        for record in &self.records {
            let cells: Vec<String> = Self::project(record)
                .iter()
                .map(|cell| collapse_whitespace(cell))
                .collect();
            lines.push(cells.join("\t"));
        }
        lines.join("\n")
    }

    pub fn to_export_rows(&self) -> Vec<ExportRow> {
        self.records
            .iter()
            .map(|record| {
                COLUMNS
                    .iter()
                    .map(|col| (col.label, record.value(col.key)))
                    .collect()
            })
            .collect()
    }
}

/// Render a raw value the way the table shows it.
pub fn display_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(_)) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Object(_)) => 5,
    }
}

/// Total order over raw values: numbers numerically, strings lexically,
/// mixed types by a fixed type rank.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.total_cmp(&y)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(x @ Value::Array(_)), Some(y @ Value::Array(_)))
        | (Some(x @ Value::Object(_)), Some(y @ Value::Object(_))) => {
            x.to_string().cmp(&y.to_string())
        }
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}
