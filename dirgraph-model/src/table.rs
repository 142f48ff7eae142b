//! Tabular form of a page of records.
//!
//! Columns are the union of keys across the records in first-seen order;
//! a record missing a column contributes `null` in that cell.

use crate::error::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Rows of JSON values under a shared set of named columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// A table with no columns and no rows.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Arranges JSON objects into rows.
    ///
    /// Fails if any record is not an object.
    pub fn from_records(records: &[Value]) -> ModelResult<Self> {
        let mut table = Self::empty();
        for (index, record) in records.iter().enumerate() {
            let object = record.as_object().ok_or_else(|| {
                ModelError::InvalidTable(format!("record {index} is not an object"))
            })?;
            table.push_object(object);
        }
        Ok(table)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell at `row` under column `name`.
    pub fn get(&self, row: usize, name: &str) -> Option<&Value> {
        let col = self.column_index(name)?;
        self.rows.get(row).and_then(|r| r.get(col))
    }

    /// All cells of column `name`, top to bottom.
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let col = self.column_index(name)?;
        Some(self.rows.iter().map(|r| &r[col]).collect())
    }

    /// Appends the rows of `other`, widening the column set as needed.
    pub fn append(&mut self, other: Table) {
        let mapping: Vec<usize> = other
            .columns
            .iter()
            .map(|name| self.ensure_column(name))
            .collect();

        let width = self.columns.len();
        for row in other.rows {
            let mut widened = vec![Value::Null; width];
            for (value, &col) in row.into_iter().zip(&mapping) {
                widened[col] = value;
            }
            self.rows.push(widened);
        }
    }

    /// Keeps the first `len` rows.
    pub fn truncate(&mut self, len: usize) {
        self.rows.truncate(len);
    }

    /// Converts rows back into JSON objects, skipping null cells.
    pub fn to_records(&self) -> Vec<Value> {
        self.rows
            .iter()
            .map(|row| {
                let object: Map<String, Value> = self
                    .columns
                    .iter()
                    .zip(row)
                    .filter(|(_, v)| !v.is_null())
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                Value::Object(object)
            })
            .collect()
    }

    fn push_object(&mut self, object: &Map<String, Value>) {
        let mut row = vec![Value::Null; self.columns.len()];
        for (key, value) in object {
            let col = self.ensure_column(key);
            if col >= row.len() {
                row.resize(col + 1, Value::Null);
            }
            row[col] = value.clone();
        }
        self.rows.push(row);
    }

    /// Index of `name`, adding the column (and padding existing rows) if new.
    fn ensure_column(&mut self, name: &str) -> usize {
        if let Some(col) = self.column_index(name) {
            return col;
        }
        self.columns.push(name.to_string());
        for row in &mut self.rows {
            row.push(Value::Null);
        }
        self.columns.len() - 1
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}
