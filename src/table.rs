//! Table-scoped identity map.
//!
//! A [`Table`] hands out at most one [`Row`] object per primary key while
//! that row stays loaded. Every lookup path (single key, key batch,
//! where-clause, insert) goes through the same insert-or-get step.

use crate::catalog::schema::TableSchema;
use crate::catalog::types::RowKey;
use crate::commit::journal::{Journal, UndoEntry};
use crate::config::{OrmConfig, Settings};
use crate::error::{OrmError, ResourceType};
use crate::hooks::{NoRowHooks, RowHooks};
use crate::labels::{Labels, NoLabels};
use crate::permission::{AllowAll, Roles};
use crate::query::plan::Expr;
use crate::row::collection::RowCollection;
use crate::row::{Row, TableContext};
use crate::store::{ChangeSet, RowData, Store};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Access-mode filter applied to a single-key lookup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LookupMode {
    /// Cached row if loaded, otherwise fetched and linked.
    #[default]
    Default,
    /// Like `Default`, but a cached row is re-read from the store first.
    Refresh,
    /// Only rows already loaded; never touches the store.
    In,
    /// Only rows not yet loaded; a cached key yields `None`.
    Out,
}

pub struct Table {
    pub(crate) ctx: Arc<TableContext>,
    pub(crate) rows: Mutex<RowCollection>,
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("name", &self.name())
            .field("loaded", &self.rows.lock().len())
            .field("settings", &self.ctx.settings)
            .finish_non_exhaustive()
    }
}

pub struct TableBuilder {
    schema: TableSchema,
    store: Arc<dyn Store>,
    labels: Arc<dyn Labels>,
    roles: Arc<dyn Roles>,
    hooks: Arc<dyn RowHooks>,
    config: OrmConfig,
}

impl TableBuilder {
    pub fn labels(mut self, labels: Arc<dyn Labels>) -> Self {
        self.labels = labels;
        self
    }

    pub fn roles(mut self, roles: Arc<dyn Roles>) -> Self {
        self.roles = roles;
        self
    }

    pub fn hooks(mut self, hooks: Arc<dyn RowHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn config(mut self, config: OrmConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<Table, OrmError> {
        self.config.validate()?;
        let settings = self.config.table_settings(self.schema.name());
        for column in self.config.tables.get(self.schema.name()).iter().flat_map(|t| t.columns.keys()) {
            self.schema.column_or_err(column)?;
        }
        info!(
            table = self.schema.name(),
            columns = self.schema.columns().len(),
            strict = settings.strict,
            communicate = settings.communicate,
            batch_fetch_limit = ?settings.batch_fetch_limit,
            "table: opened"
        );
        let ctx = Arc::new(TableContext {
            schema: Arc::new(self.schema),
            store: self.store,
            labels: self.labels,
            roles: self.roles,
            hooks: self.hooks,
            journal: Mutex::new(Journal::new(settings.journal_capacity)),
            settings,
        });
        Ok(Table {
            rows: Mutex::new(RowCollection::new(ctx.clone())),
            ctx,
        })
    }
}

impl Table {
    pub fn builder(schema: TableSchema, store: Arc<dyn Store>) -> TableBuilder {
        TableBuilder {
            schema,
            store,
            labels: Arc::new(NoLabels),
            roles: Arc::new(AllowAll),
            hooks: Arc::new(NoRowHooks),
            config: OrmConfig::default(),
        }
    }

    pub fn open(
        schema: TableSchema,
        store: Arc<dyn Store>,
        config: &OrmConfig,
    ) -> Result<Self, OrmError> {
        Self::builder(schema, store).config(config.clone()).build()
    }

    pub fn name(&self) -> &str {
        self.ctx.table()
    }

    pub fn schema(&self) -> &TableSchema {
        &self.ctx.schema
    }

    pub fn settings(&self) -> &Settings {
        &self.ctx.settings
    }

    pub fn row(&self, key: RowKey) -> Result<Option<Row>, OrmError> {
        self.row_with(key, LookupMode::Default)
    }

    pub fn row_refresh(&self, key: RowKey) -> Result<Option<Row>, OrmError> {
        self.row_with(key, LookupMode::Refresh)
    }

    pub fn row_in(&self, key: RowKey) -> Result<Option<Row>, OrmError> {
        self.row_with(key, LookupMode::In)
    }

    pub fn row_out(&self, key: RowKey) -> Result<Option<Row>, OrmError> {
        self.row_with(key, LookupMode::Out)
    }

    /// Looks up one row. A key the store does not know yields `None` and
    /// leaves nothing linked.
    pub fn row_with(&self, key: RowKey, mode: LookupMode) -> Result<Option<Row>, OrmError> {
        let cached = self.rows.lock().get(key).cloned();
        match (mode, cached) {
            (LookupMode::In, cached) => Ok(cached),
            (LookupMode::Out, Some(_)) => Ok(None),
            (LookupMode::Refresh, Some(row)) => Ok(self.refresh(&row)?.then_some(row)),
            (LookupMode::Default, Some(row)) => Ok(Some(row)),
            (_, None) => {
                let Some(data) = self.ctx.store.fetch_row(self.name(), key)? else {
                    debug!(table = self.name(), key, "lookup: row not found");
                    return Ok(None);
                };
                self.link(key, &data).map(Some)
            }
        }
    }

    /// Loads every key in `keys`, fetching only the ones not already linked.
    /// The missing keys go to the store in a single call unless
    /// `batch_fetch_limit` caps the chunk size. Keys the store does not know
    /// are absent from the result.
    pub fn rows<I>(&self, keys: I) -> Result<RowCollection, OrmError>
    where
        I: IntoIterator<Item = RowKey>,
    {
        let keys: Vec<RowKey> = keys.into_iter().collect();
        let missing: Vec<RowKey> = {
            let rows = self.rows.lock();
            let mut seen = BTreeSet::new();
            keys.iter()
                .copied()
                .filter(|k| !rows.contains(*k) && seen.insert(*k))
                .collect()
        };
        let chunk_size = self
            .ctx
            .settings
            .batch_fetch_limit
            .unwrap_or(missing.len())
            .max(1);
        for chunk in missing.chunks(chunk_size) {
            let fetched = self.ctx.store.fetch_rows(self.name(), chunk)?;
            debug!(
                table = self.name(),
                requested = chunk.len(),
                found = fetched.len(),
                "lookup: batch fetch"
            );
            for (key, data) in fetched {
                self.link(key, &data)?;
            }
        }

        let mut out = RowCollection::new(self.ctx.clone());
        let rows = self.rows.lock();
        for key in keys {
            if let Some(row) = rows.get(key)
                && !out.contains(key)
            {
                out.insert(row.clone())?;
            }
        }
        Ok(out)
    }

    /// Rows matching `predicate`. Rows already loaded are returned as they
    /// are in memory, pending changes included.
    pub fn rows_where(&self, predicate: &Expr) -> Result<RowCollection, OrmError> {
        predicate.validate_depth()?;
        for column in predicate.columns() {
            self.ctx.schema.column_or_err(column)?;
        }
        let fetched = self.ctx.store.fetch_where(self.name(), predicate)?;
        debug!(table = self.name(), found = fetched.len(), "lookup: where fetch");
        let mut out = RowCollection::new(self.ctx.clone());
        for (key, data) in fetched {
            out.insert(self.link(key, &data)?)?;
        }
        Ok(out)
    }

    /// Snapshot of the rows currently loaded.
    pub fn loaded(&self) -> RowCollection {
        self.rows.lock().clone()
    }

    pub fn is_loaded(&self, key: RowKey) -> bool {
        self.rows.lock().contains(key)
    }

    /// Evicts and terminates the row for `key`. Returns false if it was not
    /// loaded.
    pub fn unlink(&self, key: RowKey) -> bool {
        let removed = self.rows.lock().remove(key);
        match removed {
            Some(row) => {
                row.terminate();
                debug!(table = self.name(), key, "lookup: row unlinked");
                true
            }
            None => false,
        }
    }

    /// Re-reads `row` from the store, discarding pending changes. A row the
    /// store no longer has is unlinked and terminated; returns false then.
    pub fn refresh(&self, row: &Row) -> Result<bool, OrmError> {
        self.check_owner(row)?;
        let key = row.key();
        drop(row.live()?);
        match self.ctx.store.fetch_row(self.name(), key)? {
            Some(data) => {
                row.replace_cells(&data)?;
                debug!(table = self.name(), key, "lookup: row refreshed");
                Ok(true)
            }
            None => {
                if !self.unlink(key) {
                    row.terminate();
                }
                Ok(false)
            }
        }
    }

    /// Compensating statements recorded by successful writes, oldest first.
    pub fn undo_log(&self) -> Vec<UndoEntry> {
        self.ctx.journal.lock().entries()
    }

    pub fn clear_undo_log(&self) {
        self.ctx.journal.lock().clear();
    }

    /// Pops the newest undo entry and applies it. Returns the affected row
    /// count, or `None` when the log is empty.
    pub fn undo_last(&self) -> Result<Option<u64>, OrmError> {
        let entry = self.ctx.journal.lock().pop();
        match entry {
            Some(entry) => self.apply_undo(&entry).map(Some),
            None => Ok(None),
        }
    }

    /// Issues the compensating statement for `entry`. Loaded rows are
    /// refreshed or unlinked to match. Applying an entry is not journaled.
    pub fn apply_undo(&self, entry: &UndoEntry) -> Result<u64, OrmError> {
        if entry.table() != self.name() {
            return Err(OrmError::WrongOwner {
                resource_type: ResourceType::Table,
                resource_id: entry.table().to_string(),
                expected: self.name().to_string(),
                actual: entry.table().to_string(),
            });
        }
        let table = self.name();
        let affected = match entry {
            UndoEntry::Update { key, previous, .. } => {
                let affected = self.ctx.store.write(table, previous, *key)?;
                let cached = self.rows.lock().get(*key).cloned();
                if let Some(row) = cached {
                    self.refresh(&row)?;
                }
                affected
            }
            UndoEntry::Insert { key, .. } => {
                let affected = self.ctx.store.delete(table, *key)?;
                self.unlink(*key);
                affected
            }
            UndoEntry::Delete { values, .. } => {
                let changes = restore_changes(values);
                self.ctx.store.insert(table, &changes)?;
                1
            }
        };
        info!(table, key = entry.key(), affected, "undo: compensating statement applied");
        Ok(affected)
    }

    fn check_owner(&self, row: &Row) -> Result<(), OrmError> {
        if row.belongs_to(&self.ctx) {
            return Ok(());
        }
        Err(OrmError::WrongOwner {
            resource_type: ResourceType::Row,
            resource_id: row.key().to_string(),
            expected: self.name().to_string(),
            actual: row.table_name().to_string(),
        })
    }

    /// Insert-or-get: returns the linked row for `key`, constructing it from
    /// `data` only when none is loaded.
    fn link(&self, key: RowKey, data: &RowData) -> Result<Row, OrmError> {
        let mut rows = self.rows.lock();
        if let Some(row) = rows.get(key) {
            return Ok(row.clone());
        }
        let row = Row::load(Arc::clone(&self.ctx), key, data)?;
        rows.insert(row.clone())?;
        Ok(row)
    }
}

fn restore_changes(values: &RowData) -> ChangeSet {
    values
        .iter()
        .map(|(column, value)| (column.clone(), value.clone()))
        .collect()
}
