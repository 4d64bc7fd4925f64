//! Row handles.
//!
//! A [`Row`] is a cheap clone of a shared handle; every clone observes the
//! same cells. Cells refer to their row and column by key and name only, and
//! the schema and collaborators are reached through the shared
//! [`TableContext`], so no ownership cycle exists between rows, cells and
//! columns.

pub mod collection;

use crate::catalog::schema::{Column, TableSchema};
use crate::catalog::types::{RowKey, Value};
use crate::cell::collection::CellCollection;
use crate::cell::{Cell, CellState};
use crate::commit::journal::Journal;
use crate::config::Settings;
use crate::error::OrmError;
use crate::hooks::{CellCommitted, RowHooks};
use crate::labels::Labels;
use crate::message::Message;
use crate::permission::Roles;
use crate::store::{RowData, Store};
use crate::validation::{CellInput, ValidationContext, ValidationReport, Verdict};
use parking_lot::{Mutex, MutexGuard};
use std::fmt;
use std::sync::Arc;

/// Everything rows of one table share: the schema, the collaborators and the
/// resolved settings. Immutable apart from the undo journal.
pub(crate) struct TableContext {
    pub(crate) schema: Arc<TableSchema>,
    pub(crate) store: Arc<dyn Store>,
    pub(crate) labels: Arc<dyn Labels>,
    pub(crate) roles: Arc<dyn Roles>,
    pub(crate) hooks: Arc<dyn RowHooks>,
    pub(crate) settings: Settings,
    pub(crate) journal: Mutex<Journal>,
}

impl TableContext {
    pub(crate) fn validation<'a>(
        &'a self,
        settings: &'a Settings,
        key: Option<RowKey>,
    ) -> ValidationContext<'a> {
        ValidationContext {
            schema: &self.schema,
            store: self.store.as_ref(),
            labels: self.labels.as_ref(),
            roles: self.roles.as_ref(),
            settings,
            key,
        }
    }

    pub(crate) fn table(&self) -> &str {
        self.schema.name()
    }

    /// Schema column for a write; the primary key is never writable.
    pub(crate) fn writable_column(&self, column: &str) -> Result<&Column, OrmError> {
        if self.schema.is_primary_key(column) {
            return Err(OrmError::PrimaryKeyWrite {
                table: self.table().to_string(),
                column: column.to_string(),
            });
        }
        self.schema.column_or_err(column)
    }
}

pub(crate) struct RowState {
    pub(crate) cells: CellCollection,
    pub(crate) terminated: bool,
    pub(crate) messages: Vec<Message>,
}

impl RowState {
    pub(crate) fn cell(&self, table: &str, column: &str) -> Result<&Cell, OrmError> {
        self.cells
            .get(column)
            .ok_or_else(|| OrmError::column_not_found(table, column))
    }

    pub(crate) fn cell_mut(&mut self, table: &str, column: &str) -> Result<&mut Cell, OrmError> {
        self.cells
            .get_mut(column)
            .ok_or_else(|| OrmError::column_not_found(table, column))
    }
}

struct RowInner {
    key: RowKey,
    ctx: Arc<TableContext>,
    state: Mutex<RowState>,
}

/// One loaded row. Obtained from a [`crate::Table`]; the table guarantees a
/// single handle identity per primary key while the row stays loaded.
#[derive(Clone)]
pub struct Row {
    inner: Arc<RowInner>,
}

impl fmt::Debug for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Row")
            .field("table", &self.table_name())
            .field("key", &self.inner.key)
            .field("terminated", &self.is_terminated())
            .finish()
    }
}

impl Row {
    pub(crate) fn load(
        ctx: Arc<TableContext>,
        key: RowKey,
        data: &RowData,
    ) -> Result<Self, OrmError> {
        let cells = CellCollection::from_row_data(&ctx.schema, key, data)?;
        Ok(Self {
            inner: Arc::new(RowInner {
                key,
                ctx,
                state: Mutex::new(RowState {
                    cells,
                    terminated: false,
                    messages: Vec::new(),
                }),
            }),
        })
    }

    pub fn key(&self) -> RowKey {
        self.inner.key
    }

    pub fn table_name(&self) -> &str {
        self.inner.ctx.table()
    }

    pub fn schema(&self) -> &TableSchema {
        &self.inner.ctx.schema
    }

    /// True when both handles refer to the same row object.
    pub fn ptr_eq(a: &Row, b: &Row) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    pub fn is_terminated(&self) -> bool {
        self.inner.state.lock().terminated
    }

    pub(crate) fn ctx(&self) -> &Arc<TableContext> {
        &self.inner.ctx
    }

    pub(crate) fn belongs_to(&self, ctx: &Arc<TableContext>) -> bool {
        Arc::ptr_eq(&self.inner.ctx, ctx)
    }

    /// Locks the row state, failing once the row is terminated.
    pub(crate) fn live(&self) -> Result<MutexGuard<'_, RowState>, OrmError> {
        let state = self.inner.state.lock();
        if state.terminated {
            return Err(OrmError::Terminated {
                table: self.table_name().to_string(),
                key: self.inner.key,
            });
        }
        Ok(state)
    }

    pub(crate) fn terminate(&self) {
        self.inner.state.lock().terminated = true;
    }

    pub(crate) fn record_message(&self, message: Message) {
        self.inner.state.lock().messages.push(message);
    }

    pub fn get(&self, column: &str) -> Result<Value, OrmError> {
        let value = self.raw(column)?;
        let schema_column = self.inner.ctx.schema.column_or_err(column)?;
        Ok(schema_column.hooks().on_get(schema_column, value))
    }

    /// Current value without the column's `on_get` transformation.
    pub fn raw(&self, column: &str) -> Result<Value, OrmError> {
        let state = self.live()?;
        Ok(state.cell(self.table_name(), column)?.value().clone())
    }

    pub fn initial(&self, column: &str) -> Result<Value, OrmError> {
        let state = self.live()?;
        Ok(state.cell(self.table_name(), column)?.initial().clone())
    }

    pub fn cell_state(&self, column: &str) -> Result<CellState, OrmError> {
        let state = self.live()?;
        Ok(state.cell(self.table_name(), column)?.state())
    }

    pub fn has_changed(&self, column: &str) -> Result<bool, OrmError> {
        let state = self.live()?;
        Ok(state.cell(self.table_name(), column)?.has_changed())
    }

    /// Pre-processing error recorded by the last `set` of `column`.
    pub fn error(&self, column: &str) -> Result<Option<String>, OrmError> {
        let state = self.live()?;
        Ok(state
            .cell(self.table_name(), column)?
            .error()
            .map(str::to_string))
    }

    pub fn is_dirty(&self) -> Result<bool, OrmError> {
        Ok(self.live()?.cells.has_changes())
    }

    pub fn changed_columns(&self) -> Result<Vec<String>, OrmError> {
        let state = self.live()?;
        Ok(state
            .cells
            .changed()
            .map(|c| c.column().to_string())
            .collect())
    }

    pub fn values(&self) -> Result<RowData, OrmError> {
        Ok(self.live()?.cells.values())
    }

    pub fn initial_values(&self) -> Result<RowData, OrmError> {
        Ok(self.live()?.cells.initial_values())
    }

    /// Read access to the cells, in column priority order.
    pub fn with_cells<R>(&self, f: impl FnOnce(&CellCollection) -> R) -> Result<R, OrmError> {
        let state = self.live()?;
        Ok(f(&state.cells))
    }

    pub fn set(&self, column: &str, value: impl Into<Value>) -> Result<(), OrmError> {
        let ctx = &self.inner.ctx;
        let schema_column = ctx.writable_column(column)?;
        let trim = ctx.settings.column(column).trim_on_set;
        let mut state = self.live()?;
        state
            .cell_mut(ctx.table(), column)?
            .set(schema_column, value.into(), trim);
        Ok(())
    }

    /// Sets several cells, applied in ascending set priority. Nothing is set
    /// unless every column is writable.
    pub fn set_many<I, K, V>(&self, values: I) -> Result<(), OrmError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let ctx = &self.inner.ctx;
        let mut staged = Vec::new();
        for (column, value) in values {
            staged.push((ctx.writable_column(column.as_ref())?, value.into()));
        }
        staged.sort_by_key(|(column, _)| column.set_priority);
        let mut state = self.live()?;
        for (column, value) in staged {
            let trim = ctx.settings.column(&column.name).trim_on_set;
            state
                .cell_mut(ctx.table(), &column.name)?
                .set(column, value, trim);
        }
        Ok(())
    }

    /// Sets `column` and registers a one-shot callback fired after the next
    /// successful commit that writes it. The cell counts as changed until
    /// then, even if `value` equals the persisted value.
    pub fn set_then<F>(&self, column: &str, value: impl Into<Value>, callback: F) -> Result<(), OrmError>
    where
        F: FnOnce(&CellCommitted) + Send + 'static,
    {
        let ctx = &self.inner.ctx;
        let schema_column = ctx.writable_column(column)?;
        let trim = ctx.settings.column(column).trim_on_set;
        let mut state = self.live()?;
        let cell = state.cell_mut(ctx.table(), column)?;
        cell.set(schema_column, value.into(), trim);
        cell.register_callback(Box::new(callback));
        Ok(())
    }

    pub fn reset(&self, column: &str) -> Result<(), OrmError> {
        let mut state = self.live()?;
        state.cell_mut(self.table_name(), column)?.reset();
        Ok(())
    }

    pub fn reset_all(&self) -> Result<(), OrmError> {
        self.live()?.cells.reset_all();
        Ok(())
    }

    pub fn unset(&self, column: &str) -> Result<(), OrmError> {
        let ctx = &self.inner.ctx;
        let schema_column = ctx.writable_column(column)?;
        let mut state = self.live()?;
        state.cell_mut(ctx.table(), column)?.unset(schema_column);
        Ok(())
    }

    pub fn validate_cell(&self, column: &str) -> Result<Verdict, OrmError> {
        let ctx = &self.inner.ctx;
        let state = self.live()?;
        let cell = state.cell(ctx.table(), column)?;
        let row = state.cells.values();
        ctx.validation(&ctx.settings, Some(self.key()))
            .complete_validation(CellInput::from_cell(cell), &row)
    }

    /// Validates every pending change of the row.
    pub fn validate(&self) -> Result<ValidationReport, OrmError> {
        let ctx = &self.inner.ctx;
        let state = self.live()?;
        let row = state.cells.values();
        ctx.validation(&ctx.settings, Some(self.key()))
            .validate_cells(state.cells.changed().map(CellInput::from_cell), &row)
    }

    /// Messages recorded by failed operations in communication mode.
    pub fn messages(&self) -> Vec<Message> {
        self.inner.state.lock().messages.clone()
    }

    pub fn take_messages(&self) -> Vec<Message> {
        std::mem::take(&mut self.inner.state.lock().messages)
    }

    /// Swaps in freshly loaded cells, discarding pending changes.
    pub(crate) fn replace_cells(&self, data: &RowData) -> Result<(), OrmError> {
        let mut state = self.live()?;
        let cells = state.cells.rebuilt(&self.inner.ctx.schema, data)?;
        state.cells = cells;
        Ok(())
    }
}
