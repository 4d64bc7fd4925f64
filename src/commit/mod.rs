//! Row commit protocol.
//!
//! Every commit variant funnels into [`Row::commit`]: select the cells the
//! scope asks for, run `on_update` hooks, validate, run final validation,
//! then issue at most one write. Local state is refreshed from the submitted
//! values only after the store accepted the write.

pub mod delete;
pub mod insert;
pub mod journal;

use crate::catalog::schema::Column;
use crate::catalog::types::{RowKey, Value};
use crate::config::{CommitOptions, Settings};
use crate::error::{OrmError, ResourceType, StoreError};
use crate::hooks::{CandidateRow, CellCommitted};
use crate::message::Message;
use crate::row::Row;
use crate::row::collection::RowCollection;
use crate::store::ChangeSet;
use crate::table::Table;
use crate::validation::{CellInput, Reason, ReasonKind, ValidationReport};
use journal::UndoEntry;
use std::sync::Arc;
use tracing::{debug, warn};

/// Which cells a commit submits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitScope {
    /// Every non-key cell; any invalid cell aborts.
    All,
    /// Every non-key cell that passes validation.
    Valid,
    /// Changed cells; any invalid cell aborts.
    Changed,
    /// Changed cells that pass validation.
    ChangedValid,
    /// Changed cells plus the named ones; any invalid cell aborts.
    ChangedIncluded(Vec<String>),
    /// Changed cells plus the named ones, keeping only those that pass.
    ChangedIncludedValid(Vec<String>),
}

impl CommitScope {
    /// Lenient scopes drop invalid cells and report a partial commit.
    pub fn is_lenient(&self) -> bool {
        matches!(
            self,
            CommitScope::Valid | CommitScope::ChangedValid | CommitScope::ChangedIncludedValid(_)
        )
    }

    fn changed_only(&self) -> bool {
        !matches!(self, CommitScope::All | CommitScope::Valid)
    }

    fn included(&self) -> &[String] {
        match self {
            CommitScope::ChangedIncluded(columns) | CommitScope::ChangedIncludedValid(columns) => {
                columns
            }
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReport {
    pub key: RowKey,
    /// Rows the store reported as affected; 0 when nothing had changed.
    pub affected: u64,
    /// Some selected cells were dropped as invalid.
    pub partial: bool,
    /// Changed columns carried by the write, in set-priority order.
    pub written: Vec<String>,
    /// Why dropped cells were dropped.
    pub skipped: ValidationReport,
}

impl CommitReport {
    pub fn is_noop(&self) -> bool {
        self.affected == 0
    }

    /// More than one row changed for a single-key write.
    pub fn is_anomaly(&self) -> bool {
        self.affected > 1
    }
}

/// Result of a commit that did not raise an error.
#[derive(Debug, Clone, PartialEq)]
pub enum CommitOutcome {
    Committed(CommitReport),
    /// Validation or final validation refused the write; nothing was sent.
    Invalid(ValidationReport),
    /// The store refused the write, or (with `anomaly_is_error`) accepted
    /// it but reported more than one affected row. Communication mode only;
    /// the message is also recorded on the row. In the anomaly case the
    /// write did happen: the row holds the written values and the undo log
    /// has its compensating entry.
    Failed(Message),
}

impl CommitOutcome {
    pub fn report(&self) -> Option<&CommitReport> {
        match self {
            CommitOutcome::Committed(report) => Some(report),
            _ => None,
        }
    }

    pub fn affected(&self) -> Option<u64> {
        self.report().map(|r| r.affected)
    }

    pub fn is_committed(&self) -> bool {
        matches!(self, CommitOutcome::Committed(_))
    }

    pub fn is_partial(&self) -> bool {
        self.report().is_some_and(|r| r.partial)
    }
}

/// Per-row outcomes of [`Table::commit_many`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub outcomes: Vec<(RowKey, CommitOutcome)>,
}

impl BatchReport {
    pub fn affected(&self) -> u64 {
        self.outcomes.iter().filter_map(|(_, o)| o.affected()).sum()
    }

    /// Any row was refused, failed or only partially written.
    pub fn is_partial(&self) -> bool {
        self.outcomes
            .iter()
            .any(|(_, o)| !o.is_committed() || o.is_partial())
    }

    pub fn get(&self, key: RowKey) -> Option<&CommitOutcome> {
        self.outcomes.iter().find(|(k, _)| *k == key).map(|(_, o)| o)
    }
}

/// Routes a failure through communication mode: structural errors and
/// non-communicating settings raise, everything else becomes a message.
pub(crate) fn communicate_failure(
    err: OrmError,
    settings: &Settings,
    table: &str,
    key: Option<RowKey>,
    row: Option<&Row>,
) -> Result<Message, OrmError> {
    if !settings.communicate || err.is_structural() {
        return Err(err);
    }
    let message = Message::from_error(&err, table, key);
    if let Some(row) = row {
        row.record_message(message.clone());
    }
    Ok(message)
}

/// Validation refusal: raised in strict mode, returned otherwise.
pub(crate) fn refuse(
    table: &str,
    key: Option<RowKey>,
    report: ValidationReport,
    settings: &Settings,
) -> Result<ValidationReport, OrmError> {
    debug!(table, key = ?key, reasons = report.len(), "commit: refused by validation");
    if !settings.strict {
        return Ok(report);
    }
    if report.columns().next().is_none()
        && let [reason] = report.row_reasons()
    {
        return Err(OrmError::FinalValidation {
            table: table.to_string(),
            key,
            reason: reason.message.clone(),
        });
    }
    Err(OrmError::Validation {
        table: table.to_string(),
        key,
        report: Box::new(report),
    })
}

pub(crate) fn final_reason(message: String) -> Reason {
    Reason {
        kind: ReasonKind::Final,
        column: String::new(),
        message,
    }
}

struct Submitted<'a> {
    column: &'a Column,
    value: Value,
    changed: bool,
}

impl Row {
    pub fn update_all(&self) -> Result<CommitOutcome, OrmError> {
        self.commit(CommitScope::All, &CommitOptions::default())
    }

    pub fn update_valid(&self) -> Result<CommitOutcome, OrmError> {
        self.commit(CommitScope::Valid, &CommitOptions::default())
    }

    pub fn update_changed(&self) -> Result<CommitOutcome, OrmError> {
        self.commit(CommitScope::Changed, &CommitOptions::default())
    }

    pub fn update_changed_valid(&self) -> Result<CommitOutcome, OrmError> {
        self.commit(CommitScope::ChangedValid, &CommitOptions::default())
    }

    pub fn update_changed_included<I, S>(&self, include: I) -> Result<CommitOutcome, OrmError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns = include.into_iter().map(Into::into).collect();
        self.commit(CommitScope::ChangedIncluded(columns), &CommitOptions::default())
    }

    pub fn update_changed_included_valid<I, S>(
        &self,
        include: I,
    ) -> Result<CommitOutcome, OrmError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns = include.into_iter().map(Into::into).collect();
        self.commit(
            CommitScope::ChangedIncludedValid(columns),
            &CommitOptions::default(),
        )
    }

    /// Validates and writes the cells selected by `scope`.
    ///
    /// Returns `Committed` with `affected == 0` without touching the store
    /// when no selected cell has changed. Invalid cells abort the commit
    /// before any write unless the scope is lenient, in which case they are
    /// dropped and the report is marked partial; the survivors are then
    /// re-validated without the dropped values. After a store failure the
    /// row keeps its pending changes; an anomaly raised as an error happens
    /// after the write, so the row is already collapsed and journaled.
    pub fn commit(
        &self,
        scope: CommitScope,
        options: &CommitOptions,
    ) -> Result<CommitOutcome, OrmError> {
        let ctx = Arc::clone(self.ctx());
        let settings = ctx.settings.with_options(options);
        let table = ctx.table();
        let key = self.key();
        for column in scope.included() {
            ctx.writable_column(column)?;
        }

        let (submitted, skipped, candidate) = {
            let state = self.live()?;
            let mut submitted = Vec::new();
            for column in ctx.schema.commit_order() {
                let cell = state.cell(table, &column.name)?;
                let changed = cell.has_changed();
                if scope.changed_only()
                    && !changed
                    && !scope.included().contains(&column.name)
                {
                    continue;
                }
                let value = column.hooks().on_update(column, cell.value().clone());
                submitted.push(Submitted {
                    column,
                    value,
                    changed,
                });
            }

            // Lenient scopes re-check the survivors against a row without the
            // dropped values until nothing else drops.
            let initial = state.cells.initial_values();
            let validation = ctx.validation(&settings, Some(key));
            let mut skipped = ValidationReport::default();
            loop {
                let mut row = initial.clone();
                for s in &submitted {
                    row.insert(s.column.name.clone(), s.value.clone());
                }
                let mut failed = ValidationReport::default();
                for s in &submitted {
                    let cell = state.cell(table, &s.column.name)?;
                    let input = CellInput {
                        column: &s.column.name,
                        value: &s.value,
                        error: cell.error(),
                        changed: s.changed,
                    };
                    if let Err(reasons) = validation.complete_validation(input, &row)? {
                        failed.push(s.column.name.clone(), reasons);
                    }
                }
                if failed.is_empty() {
                    break;
                }
                if !scope.is_lenient() {
                    skipped.merge(failed);
                    break;
                }
                submitted.retain(|s| !failed.contains(&s.column.name));
                skipped.merge(failed);
            }
            (submitted, skipped, initial)
        };

        if !skipped.is_empty() && !scope.is_lenient() {
            return refuse(table, Some(key), skipped, &settings).map(CommitOutcome::Invalid);
        }
        let partial = !skipped.is_empty();

        let changes: ChangeSet = submitted
            .iter()
            .map(|s| (s.column.name.clone(), s.value.clone()))
            .collect();
        let mut values = candidate;
        for s in &submitted {
            values.insert(s.column.name.clone(), s.value.clone());
        }
        let verdict = ctx.hooks.final_validation(&CandidateRow {
            table,
            key: Some(key),
            values,
            changes: &changes,
        });
        if let Err(reason) = verdict {
            let mut report = skipped;
            report.push_row(final_reason(reason));
            return refuse(table, Some(key), report, &settings).map(CommitOutcome::Invalid);
        }

        if !submitted.iter().any(|s| s.changed) {
            return Ok(CommitOutcome::Committed(CommitReport {
                key,
                affected: 0,
                partial,
                written: Vec::new(),
                skipped,
            }));
        }

        let written = match ctx.store.write(table, &changes, key) {
            Ok(0) => Err(OrmError::from(StoreError::Ineligible {
                table: table.to_string(),
                key,
            })),
            Ok(n) => Ok(n),
            Err(err) => Err(err.into()),
        };
        let affected = match written {
            Ok(n) => n,
            Err(err) => {
                warn!(table, key, error = %err, "commit: write failed");
                return communicate_failure(err, &settings, table, Some(key), Some(self))
                    .map(CommitOutcome::Failed);
            }
        };
        let mut previous = ChangeSet::new();
        let mut committed = Vec::new();
        {
            let mut state = self.live()?;
            for s in submitted {
                let cell = state.cell_mut(table, &s.column.name)?;
                previous.push(s.column.name.clone(), cell.initial().clone());
                let callback = cell.take_callback();
                cell.set_initial(s.value.clone());
                if s.changed {
                    committed.push((s, callback));
                }
            }
        }
        ctx.journal.lock().record(UndoEntry::Update {
            table: table.to_string(),
            key,
            previous,
        });

        if affected > 1 {
            warn!(table, key, affected, "commit: write affected more than one row");
            if settings.anomaly_is_error {
                // The write landed: cells and journal already reflect it, and
                // commit callbacks are dropped.
                let err = OrmError::CommitAnomaly {
                    table: table.to_string(),
                    key,
                    affected,
                };
                return communicate_failure(err, &settings, table, Some(key), Some(self))
                    .map(CommitOutcome::Failed);
            }
        }

        let report = CommitReport {
            key,
            affected,
            partial,
            written: committed.iter().map(|(s, _)| s.column.name.clone()).collect(),
            skipped,
        };
        debug!(table, key, affected, cells = report.written.len(), partial, "commit: row written");
        if report.is_anomaly() && settings.communicate {
            self.record_message(Message::warning(
                OrmError::CommitAnomaly {
                    table: table.to_string(),
                    key,
                    affected,
                }
                .code_str(),
                table,
                Some(key),
                format!("write affected {affected} rows"),
            ));
        }

        for (s, callback) in committed {
            s.column.hooks().on_committed(s.column, key, &s.value);
            if let Some(callback) = callback {
                callback(&CellCommitted {
                    table: table.to_string(),
                    key,
                    column: s.column.name.clone(),
                    value: s.value,
                });
            }
        }
        ctx.hooks.on_committed(self, &report);
        Ok(CommitOutcome::Committed(report))
    }
}

impl Table {
    /// Commits every row of `rows` with one write per row. Errors abort the
    /// batch; rows committed before the error stay committed.
    pub fn commit_many(
        &self,
        rows: &RowCollection,
        scope: &CommitScope,
        options: &CommitOptions,
    ) -> Result<BatchReport, OrmError> {
        let mut report = BatchReport::default();
        for row in rows {
            if !row.belongs_to(&self.ctx) {
                return Err(OrmError::WrongOwner {
                    resource_type: ResourceType::Row,
                    resource_id: row.key().to_string(),
                    expected: self.name().to_string(),
                    actual: row.table_name().to_string(),
                });
            }
            let outcome = row.commit(scope.clone(), options)?;
            report.outcomes.push((row.key(), outcome));
        }
        debug!(
            table = self.name(),
            rows = report.outcomes.len(),
            affected = report.affected(),
            partial = report.is_partial(),
            "commit: batch finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::{BatchReport, CommitOutcome, CommitReport, CommitScope};
    use crate::validation::ValidationReport;

    fn committed(affected: u64, partial: bool) -> CommitOutcome {
        CommitOutcome::Committed(CommitReport {
            key: 1,
            affected,
            partial,
            written: Vec::new(),
            skipped: ValidationReport::default(),
        })
    }

    #[test]
    fn scope_flags() {
        assert!(!CommitScope::All.is_lenient());
        assert!(CommitScope::Valid.is_lenient());
        assert!(CommitScope::ChangedIncludedValid(vec![]).is_lenient());
        assert!(CommitScope::Changed.changed_only());
        assert!(!CommitScope::Valid.changed_only());
        assert_eq!(
            CommitScope::ChangedIncluded(vec!["a".into()]).included(),
            &["a".to_string()]
        );
    }

    #[test]
    fn batch_report_flags_partial_rows() {
        let mut report = BatchReport::default();
        report.outcomes.push((1, committed(1, false)));
        report.outcomes.push((2, committed(0, false)));
        assert!(!report.is_partial());
        assert_eq!(report.affected(), 1);
        report.outcomes.push((3, committed(1, true)));
        assert!(report.is_partial());
        report.outcomes.truncate(2);
        report
            .outcomes
            .push((4, CommitOutcome::Invalid(ValidationReport::default())));
        assert!(report.is_partial());
        assert!(report.get(4).is_some_and(|o| !o.is_committed()));
    }

    #[test]
    fn anomaly_means_more_than_one_row() {
        assert!(committed(2, false).report().is_some_and(CommitReport::is_anomaly));
        assert!(!committed(1, false).report().is_some_and(CommitReport::is_anomaly));
        assert!(committed(0, false).report().is_some_and(CommitReport::is_noop));
    }
}
