//! In-memory table model shared by every pipeline stage.
//!
//! A [`Table`] is an ordered set of column names plus rows of optional string
//! cells. `None` is an absent value, distinct from any present string. Stages
//! never mutate a table in place; each transformation returns a new one so
//! every stage stays independently testable.

use serde_json::{Map, Value as JsonValue};

use crate::error::ReconcileError;

/// A single field value: present text or absent.
pub type Cell = Option<String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Table {
            columns,
            rows: Vec::new(),
        }
    }

    /// Builds a table from pre-assembled rows; rows are padded or truncated
    /// to the column count.
    pub fn with_rows(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let mut table = Table::new(columns);
        for row in rows {
            table.push_row(row);
        }
        table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Names from `required` that this table does not carry.
    pub fn missing_columns<'a, I>(&self, required: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        required
            .into_iter()
            .filter(|name| !self.has_column(name))
            .map(|name| name.to_string())
            .collect()
    }

    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.columns.len(), None);
        self.rows.push(row);
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)?.as_deref()
    }

    /// Returns a new table restricted to `columns`, in that order.
    pub fn project(&self, columns: &[String]) -> Result<Table, ReconcileError> {
        let missing = self.missing_columns(columns.iter().map(String::as_str));
        if !missing.is_empty() {
            return Err(ReconcileError::schema_mismatch(missing));
        }
        let indices: Vec<usize> = columns
            .iter()
            .filter_map(|name| self.column_index(name))
            .collect();
        let rows = self
            .rows
            .iter()
            .map(|row| indices.iter().map(|idx| row[*idx].clone()).collect())
            .collect();
        Ok(Table {
            columns: columns.to_vec(),
            rows,
        })
    }

    /// Applies `f` to every cell, producing a new table with the same shape.
    /// `f` receives the column name and the current value.
    pub fn map_cells<F>(&self, mut f: F) -> Table
    where
        F: FnMut(&str, Option<&str>) -> Cell,
    {
        let rows = self
            .rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .zip(row.iter())
                    .map(|(name, cell)| f(name, cell.as_deref()))
                    .collect()
            })
            .collect();
        Table {
            columns: self.columns.clone(),
            rows,
        }
    }

    /// The row's count of present cells, the completeness measure used by
    /// duplicate collapsing.
    pub fn present_count(row: &[Cell]) -> usize {
        row.iter().filter(|cell| cell.is_some()).count()
    }

    /// Rows as ordered field->value JSON objects, absent cells as null.
    pub fn to_json_records(&self) -> Vec<JsonValue> {
        self.rows
            .iter()
            .map(|row| {
                let mut record = Map::with_capacity(self.columns.len());
                for (name, cell) in self.columns.iter().zip(row.iter()) {
                    let value = match cell {
                        Some(text) => JsonValue::String(text.clone()),
                        None => JsonValue::Null,
                    };
                    record.insert(name.clone(), value);
                }
                JsonValue::Object(record)
            })
            .collect()
    }

    /// Renders up to `limit` rows as an elastic-width ASCII table.
    pub fn render(&self, limit: usize) -> String {
        let shown = self.rows.iter().take(limit);
        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.chars().count()).collect();
        for row in shown.clone() {
            for (idx, cell) in row.iter().enumerate().take(widths.len()) {
                let len = cell.as_deref().unwrap_or("").chars().count();
                widths[idx] = widths[idx].max(len);
            }
        }

        let mut output = String::new();
        output.push_str(&render_line(
            self.columns.iter().map(String::as_str),
            &widths,
        ));
        let separators: Vec<String> = widths.iter().map(|w| "-".repeat((*w).max(3))).collect();
        output.push_str(&render_line(separators.iter().map(String::as_str), &widths));
        for row in shown {
            output.push_str(&render_line(
                row.iter().map(|cell| cell.as_deref().unwrap_or("")),
                &widths,
            ));
        }
        output
    }
}

fn render_line<'a, I>(cells: I, widths: &[usize]) -> String
where
    I: Iterator<Item = &'a str>,
{
    let mut parts = Vec::with_capacity(widths.len());
    for (idx, cell) in cells.enumerate() {
        let width = widths.get(idx).copied().unwrap_or(0).max(3);
        let sanitized: String = cell
            .chars()
            .map(|ch| if matches!(ch, '\n' | '\r' | '\t') { ' ' } else { ch })
            .collect();
        let padding = width.saturating_sub(sanitized.chars().count());
        parts.push(format!("{sanitized}{}", " ".repeat(padding)));
    }
    let mut line = parts.join("  ");
    while line.ends_with(' ') {
        line.pop();
    }
    line.push('\n');
    line
}
