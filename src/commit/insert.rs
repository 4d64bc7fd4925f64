use crate::catalog::schema::Column;
use crate::catalog::types::{RowKey, Value};
use crate::cell::preprocess;
use crate::commit::journal::UndoEntry;
use crate::commit::{CommitReport, communicate_failure, final_reason, refuse};
use crate::config::{CommitOptions, Settings};
use crate::error::{OrmError, ResourceType};
use crate::hooks::CandidateRow;
use crate::message::Message;
use crate::row::Row;
use crate::store::{ChangeSet, RowData};
use crate::table::Table;
use crate::validation::{CellInput, ValidationReport};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub enum InsertOutcome {
    /// The new row, already loaded into the identity map.
    Inserted(Row),
    Invalid(ValidationReport),
    Failed(Message),
}

impl InsertOutcome {
    pub fn row(&self) -> Option<&Row> {
        match self {
            InsertOutcome::Inserted(row) => Some(row),
            _ => None,
        }
    }

    pub fn is_inserted(&self) -> bool {
        matches!(self, InsertOutcome::Inserted(_))
    }
}

struct Pending<'a> {
    column: &'a Column,
    value: Value,
    error: Option<String>,
}

impl Table {
    pub fn insert<I, K, V>(&self, values: I) -> Result<InsertOutcome, OrmError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        self.insert_with(values, &CommitOptions::default())
    }

    /// Inserts a new row. Columns not given start from their default; a
    /// primary-key entry requests that exact key. Every column is validated
    /// (editability does not apply to new rows) before the single insert.
    pub fn insert_with<I, K, V>(
        &self,
        values: I,
        options: &CommitOptions,
    ) -> Result<InsertOutcome, OrmError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let ctx = Arc::clone(&self.ctx);
        let schema = &ctx.schema;
        let settings = ctx.settings.with_options(options);

        let mut given = BTreeMap::new();
        for (column, value) in values {
            let column = schema.column_or_err(column.as_ref())?;
            let trim = settings.column(&column.name).trim_on_set;
            let processed = match preprocess(column, value.into(), trim) {
                Ok(value) => (value, None),
                Err((raw, reason)) => (raw, Some(reason)),
            };
            given.insert(column.name.as_str(), processed);
        }

        let mut requested_key = None;
        let mut key_report = ValidationReport::default();
        if let Some((value, error)) = given.remove(schema.primary_key()) {
            match (value, error) {
                (Value::Integer(key), None) => requested_key = Some(key),
                (Value::Null, None) => {}
                (value, error) => {
                    let error = error.unwrap_or_else(|| format!("not a key: {value}"));
                    let input = CellInput {
                        column: schema.primary_key(),
                        value: &value,
                        error: Some(error.as_str()),
                        changed: true,
                    };
                    if let Err(reasons) = ctx
                        .validation(&settings, None)
                        .complete_validation(input, &RowData::new())?
                    {
                        key_report.push(schema.primary_key(), reasons);
                    }
                }
            }
        }

        let pending = schema
            .commit_order()
            .into_iter()
            .map(|column| {
                let (value, error) = given
                    .remove(column.name.as_str())
                    .unwrap_or_else(|| (column.default.clone(), None));
                Pending {
                    column,
                    value: column.hooks().on_insert(column, value),
                    error,
                }
            })
            .collect();
        self.insert_pending(pending, requested_key, key_report, &settings)
    }

    /// Inserts a copy of `row`'s current values as a new row, passing each
    /// value through its column's `on_duplicate` hook.
    pub fn duplicate(&self, row: &Row) -> Result<InsertOutcome, OrmError> {
        if !row.belongs_to(&self.ctx) {
            return Err(OrmError::WrongOwner {
                resource_type: ResourceType::Row,
                resource_id: row.key().to_string(),
                expected: self.name().to_string(),
                actual: row.table_name().to_string(),
            });
        }
        let ctx = Arc::clone(&self.ctx);
        let mut values = row.values()?;
        let pending = ctx
            .schema
            .commit_order()
            .into_iter()
            .map(|column| {
                let value = values.remove(&column.name).unwrap_or(Value::Null);
                let value = column.hooks().on_duplicate(column, value);
                Pending {
                    column,
                    value: column.hooks().on_insert(column, value),
                    error: None,
                }
            })
            .collect();
        let outcome = self.insert_pending(
            pending,
            None,
            ValidationReport::default(),
            &ctx.settings,
        )?;
        if let InsertOutcome::Inserted(copy) = &outcome {
            debug!(table = self.name(), source = row.key(), key = copy.key(), "insert: row duplicated");
        }
        Ok(outcome)
    }

    fn insert_pending(
        &self,
        pending: Vec<Pending<'_>>,
        requested_key: Option<RowKey>,
        mut report: ValidationReport,
        settings: &Settings,
    ) -> Result<InsertOutcome, OrmError> {
        let ctx = &self.ctx;
        let table = self.name();

        let values: RowData = pending
            .iter()
            .map(|p| (p.column.name.clone(), p.value.clone()))
            .collect();
        let validation = ctx.validation(settings, None);
        for p in &pending {
            let input = CellInput {
                column: &p.column.name,
                value: &p.value,
                error: p.error.as_deref(),
                changed: true,
            };
            if let Err(reasons) = validation.complete_validation(input, &values)? {
                report.push(p.column.name.clone(), reasons);
            }
        }
        if !report.is_empty() {
            return refuse(table, None, report, settings).map(InsertOutcome::Invalid);
        }

        let mut changes = ChangeSet::new();
        if let Some(key) = requested_key {
            changes.push(ctx.schema.primary_key(), Value::Integer(key));
        }
        for p in &pending {
            changes.push(p.column.name.clone(), p.value.clone());
        }
        let verdict = ctx.hooks.final_validation(&CandidateRow {
            table,
            key: None,
            values,
            changes: &changes,
        });
        if let Err(reason) = verdict {
            report.push_row(final_reason(reason));
            return refuse(table, None, report, settings).map(InsertOutcome::Invalid);
        }

        let key = match ctx.store.insert(table, &changes) {
            Ok(key) => key,
            Err(err) => {
                warn!(table, error = %err, "insert: store rejected insert");
                return communicate_failure(err.into(), settings, table, requested_key, None)
                    .map(InsertOutcome::Failed);
            }
        };

        let mut data = changes.to_row_data();
        data.insert(ctx.schema.primary_key().to_string(), Value::Integer(key));
        let row = Row::load(Arc::clone(ctx), key, &data)?;
        {
            let mut rows = self.rows.lock();
            if let Some(stale) = rows.remove(key) {
                stale.terminate();
            }
            rows.insert(row.clone())?;
        }
        ctx.journal.lock().record(UndoEntry::Insert {
            table: table.to_string(),
            key,
        });
        debug!(table, key, cells = pending.len(), "insert: row inserted");

        for p in &pending {
            p.column.hooks().on_committed(p.column, key, &p.value);
        }
        let report = CommitReport {
            key,
            affected: 1,
            partial: false,
            written: pending.iter().map(|p| p.column.name.clone()).collect(),
            skipped: ValidationReport::default(),
        };
        ctx.hooks.on_committed(&row, &report);
        Ok(InsertOutcome::Inserted(row))
    }
}
