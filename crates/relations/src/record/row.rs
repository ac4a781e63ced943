//! Row - Ordered column storage with identity (primary key) columns

use serde::{Deserialize, Serialize};

use super::value::Value;
use crate::error::{RelationResult, RelationshipError};

/// Persistence status of a row, driving what a mapper write does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowStatus {
    /// Created in memory, not yet inserted
    New,
    /// Loaded (or written) and unchanged since
    Clean,
    /// Loaded and modified since
    Dirty,
    /// Marked for deletion on the next write
    Trash,
    /// Deleted by a write
    Deleted,
}

/// A single row of column values belonging to one table/mapper
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    table: String,
    identity: Vec<String>,
    columns: Vec<(String, Value)>,
    status: RowStatus,
}

impl Row {
    /// Create a new row; identity columns are added as null when absent
    pub fn new(
        table: impl Into<String>,
        identity: Vec<String>,
        columns: Vec<(String, Value)>,
    ) -> Self {
        let mut row = Self {
            table: table.into(),
            identity,
            columns,
            status: RowStatus::New,
        };
        let missing: Vec<String> = row
            .identity
            .iter()
            .filter(|col| row.position(col).is_none())
            .cloned()
            .collect();
        for (offset, col) in missing.into_iter().enumerate() {
            row.columns.insert(offset, (col, Value::Null));
        }
        row
    }

    /// Create a row that was loaded from storage
    pub fn selected(
        table: impl Into<String>,
        identity: Vec<String>,
        columns: Vec<(String, Value)>,
    ) -> Self {
        let mut row = Self::new(table, identity, columns);
        row.status = RowStatus::Clean;
        row
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn identity_columns(&self) -> &[String] {
        &self.identity
    }

    pub fn status(&self) -> RowStatus {
        self.status
    }

    pub fn set_status(&mut self, status: RowStatus) {
        self.status = status;
    }

    /// Mark the row so the next write deletes it
    pub fn mark_for_deletion(&mut self) {
        self.status = RowStatus::Trash;
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn has_column(&self, col: &str) -> bool {
        self.position(col).is_some()
    }

    pub fn is_identity(&self, col: &str) -> bool {
        self.identity.iter().any(|c| c == col)
    }

    pub fn get(&self, col: &str) -> RelationResult<&Value> {
        self.position(col)
            .map(|pos| &self.columns[pos].1)
            .ok_or_else(|| RelationshipError::missing_column(&self.table, col))
    }

    /// True when the column exists and is not null
    pub fn has(&self, col: &str) -> bool {
        matches!(self.get(col), Ok(value) if !value.is_null())
    }

    pub fn set(&mut self, col: &str, value: impl Into<Value>) -> RelationResult<()> {
        let value = value.into();
        let pos = self
            .position(col)
            .ok_or_else(|| RelationshipError::missing_column(&self.table, col))?;

        let current = &self.columns[pos].1;
        if *current == value {
            return Ok(());
        }
        if self.is_identity(col) && !current.is_null() {
            return Err(self.immutable(col));
        }

        self.columns[pos].1 = value;
        if self.status == RowStatus::Clean {
            self.status = RowStatus::Dirty;
        }
        Ok(())
    }

    /// Null out a column; identity columns may only be unset while still null
    pub fn unset(&mut self, col: &str) -> RelationResult<()> {
        let pos = self
            .position(col)
            .ok_or_else(|| RelationshipError::missing_column(&self.table, col))?;

        if self.is_identity(col) {
            if self.columns[pos].1.is_null() {
                return Ok(());
            }
            return Err(self.immutable(col));
        }
        self.set(col, Value::Null)
    }

    /// Identity column values, in identity column order
    pub fn identity_values(&self) -> Vec<&Value> {
        self.identity
            .iter()
            .filter_map(|col| self.get(col).ok())
            .collect()
    }

    fn position(&self, col: &str) -> Option<usize> {
        self.columns.iter().position(|(name, _)| name == col)
    }

    fn immutable(&self, col: &str) -> RelationshipError {
        RelationshipError::ImmutableField {
            mapper: self.table.clone(),
            column: col.to_string(),
        }
    }
}
