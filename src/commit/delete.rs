use crate::catalog::types::{RowKey, Value};
use crate::commit::communicate_failure;
use crate::commit::journal::UndoEntry;
use crate::config::CommitOptions;
use crate::error::{OrmError, ResourceType, StoreError};
use crate::message::Message;
use crate::row::Row;
use crate::store::RowData;
use crate::table::Table;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteOptions {
    /// Ignore the row's own reference to itself when checking self-relations.
    pub exclude_self_references: bool,
    pub communicate: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted { affected: u64 },
    /// Refused or rejected in communication mode; the row stays linked.
    Failed(Message),
}

impl DeleteOutcome {
    pub fn is_deleted(&self) -> bool {
        matches!(self, DeleteOutcome::Deleted { .. })
    }
}

impl Table {
    /// Deletes `row` from the store, then unlinks and terminates it.
    ///
    /// Refused while dependent rows reference it or a column's `on_delete`
    /// hook vetoes. On any failure the row stays linked and usable.
    pub fn delete(&self, row: &Row, options: DeleteOptions) -> Result<DeleteOutcome, OrmError> {
        let settings = self.ctx.settings.with_options(&CommitOptions {
            strict: None,
            communicate: options.communicate,
        });
        let table = self.name();
        let key = row.key();
        if !row.belongs_to(&self.ctx) {
            return Err(OrmError::WrongOwner {
                resource_type: ResourceType::Row,
                resource_id: key.to_string(),
                expected: table.to_string(),
                actual: row.table_name().to_string(),
            });
        }
        let values = row.initial_values()?;

        if let Err(err) = self.check_delete(key, &values, options) {
            info!(table, key, error = %err, "delete: refused");
            return communicate_failure(err, &settings, table, Some(key), Some(row))
                .map(DeleteOutcome::Failed);
        }

        let deleted = match self.ctx.store.delete(table, key) {
            Ok(0) => Err(OrmError::from(StoreError::Ineligible {
                table: table.to_string(),
                key,
            })),
            Ok(n) => Ok(n),
            Err(err) => Err(err.into()),
        };
        let affected = match deleted {
            Ok(n) => n,
            Err(err) => {
                warn!(table, key, error = %err, "delete: store rejected delete");
                return communicate_failure(err, &settings, table, Some(key), Some(row))
                    .map(DeleteOutcome::Failed);
            }
        };

        self.rows.lock().remove(key);
        row.terminate();
        self.ctx.journal.lock().record(UndoEntry::Delete {
            table: table.to_string(),
            key,
            values: values.clone(),
        });
        info!(table, key, affected, "delete: row deleted");
        self.ctx.hooks.on_deleted(table, key, &values);
        Ok(DeleteOutcome::Deleted { affected })
    }

    fn check_delete(
        &self,
        key: RowKey,
        values: &RowData,
        options: DeleteOptions,
    ) -> Result<(), OrmError> {
        let schema = &self.ctx.schema;
        let mut dependents = Vec::new();
        for relation in schema.relations() {
            let exclude = (relation.child_table == schema.name()
                && options.exclude_self_references)
                .then_some(key);
            let count = self.ctx.store.exists(
                &relation.child_table,
                &relation.child_column,
                &Value::Integer(key),
                exclude,
            )?;
            if count > 0 {
                dependents.push(relation.to_string());
            }
        }
        if !dependents.is_empty() {
            return Err(OrmError::HasDependents {
                table: schema.name().to_string(),
                key,
                dependents,
            });
        }

        for column in schema.columns() {
            let value = values.get(&column.name).cloned().unwrap_or(Value::Null);
            if let Err(reason) = column.hooks().on_delete(column, key, &value) {
                return Err(OrmError::DeleteVetoed {
                    table: schema.name().to_string(),
                    key,
                    column: column.name.clone(),
                    reason,
                });
            }
        }
        Ok(())
    }
}
