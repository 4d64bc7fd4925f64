//! Per-column and per-row customization points.
//!
//! Every method has a no-op default, so an implementation overrides only the
//! hooks it needs. Column behaviors are attached when the schema is declared.

use crate::catalog::schema::Column;
use crate::catalog::types::{RowKey, Value};
use crate::commit::CommitReport;
use crate::row::Row;
use crate::store::{ChangeSet, RowData};

pub trait ColumnBehavior: Send + Sync {
    /// Runs on every `set` before the kind cast. An error is recorded on the
    /// cell and reported as an exception by validation.
    fn on_set(&self, _column: &Column, value: Value) -> Result<Value, String> {
        Ok(value)
    }

    /// Transforms the value handed out by `Row::get`.
    fn on_get(&self, _column: &Column, value: Value) -> Value {
        value
    }

    /// Transforms the value written when the row is first inserted.
    fn on_insert(&self, _column: &Column, value: Value) -> Value {
        value
    }

    /// Transforms the value written by an update commit.
    fn on_update(&self, _column: &Column, value: Value) -> Value {
        value
    }

    /// Transforms the value carried into a duplicated row.
    fn on_duplicate(&self, _column: &Column, value: Value) -> Value {
        value
    }

    /// Fires after a successful write for every cell that was dirty.
    fn on_committed(&self, _column: &Column, _key: RowKey, _value: &Value) {}

    /// Runs before a delete is issued; an error vetoes the delete.
    fn on_delete(&self, _column: &Column, _key: RowKey, _value: &Value) -> Result<(), String> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultBehavior;

impl ColumnBehavior for DefaultBehavior {}

/// The assembled row a write is about to submit.
#[derive(Debug, Clone)]
pub struct CandidateRow<'a> {
    pub table: &'a str,
    /// `None` for an insert.
    pub key: Option<RowKey>,
    /// Persisted values overlaid with the change set.
    pub values: RowData,
    pub changes: &'a ChangeSet,
}

pub trait RowHooks: Send + Sync {
    /// Whole-row gate run after per-cell validation; an error vetoes the write.
    fn final_validation(&self, _candidate: &CandidateRow<'_>) -> Result<(), String> {
        Ok(())
    }

    fn on_committed(&self, _row: &Row, _report: &CommitReport) {}

    fn on_deleted(&self, _table: &str, _key: RowKey, _values: &RowData) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoRowHooks;

impl RowHooks for NoRowHooks {}

/// Payload handed to a one-shot cell completion callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellCommitted {
    pub table: String,
    pub key: RowKey,
    pub column: String,
    pub value: Value,
}

pub type CellCallback = Box<dyn FnOnce(&CellCommitted) + Send>;
