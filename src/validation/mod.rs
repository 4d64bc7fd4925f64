//! Per-cell validation stages and their aggregation into a verdict.
//!
//! Stages short-circuit in a fixed priority: a recorded exception, then
//! requiredness, then editability, then rule and comparison checks
//! (reported together), and uniqueness last because it hits the store.

pub mod rules;

use crate::catalog::schema::{Column, TableSchema};
use crate::catalog::types::{RowKey, Value};
use crate::cell::Cell;
use crate::config::Settings;
use crate::error::OrmError;
use crate::labels::{Labels, column_label};
use crate::permission::{AccessContext, Action, Roles};
use crate::store::{RowData, Store};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReasonKind {
    Exception,
    Required,
    NotEditable,
    Rule,
    Compare,
    Unique,
    /// Whole-row veto from final validation.
    Final,
}

impl ReasonKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ReasonKind::Exception => "exception",
            ReasonKind::Required => "required",
            ReasonKind::NotEditable => "not_editable",
            ReasonKind::Rule => "rule",
            ReasonKind::Compare => "compare",
            ReasonKind::Unique => "unique",
            ReasonKind::Final => "final",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reason {
    pub kind: ReasonKind,
    pub column: String,
    pub message: String,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Pass, or a non-empty ordered list of reasons.
pub type Verdict = Result<(), Vec<Reason>>;

/// Aggregated failures for a set of cells plus any whole-row reasons.
/// Empty means every cell passed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    cells: Vec<(String, Vec<Reason>)>,
    row: Vec<Reason>,
}

impl ValidationReport {
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty() && self.row.is_empty()
    }

    pub fn push(&mut self, column: impl Into<String>, reasons: Vec<Reason>) {
        if reasons.is_empty() {
            return;
        }
        let column = column.into();
        match self.cells.iter_mut().find(|(c, _)| *c == column) {
            Some((_, existing)) => existing.extend(reasons),
            None => self.cells.push((column, reasons)),
        }
    }

    /// Folds `other` into this report, keeping first-seen column order.
    pub fn merge(&mut self, other: ValidationReport) {
        for (column, reasons) in other.cells {
            self.push(column, reasons);
        }
        self.row.extend(other.row);
    }

    pub fn push_row(&mut self, reason: Reason) {
        self.row.push(reason);
    }

    pub fn contains(&self, column: &str) -> bool {
        self.cells.iter().any(|(c, _)| c == column)
    }

    pub fn reasons(&self, column: &str) -> &[Reason] {
        self.cells
            .iter()
            .find(|(c, _)| c == column)
            .map_or(&[], |(_, r)| r.as_slice())
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(c, _)| c.as_str())
    }

    pub fn row_reasons(&self) -> &[Reason] {
        &self.row
    }

    pub fn iter(&self) -> impl Iterator<Item = &Reason> {
        self.cells.iter().flat_map(|(_, r)| r.iter()).chain(self.row.iter())
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn into_result(self) -> Result<(), ValidationReport> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .cells
            .iter()
            .flat_map(|(c, reasons)| reasons.iter().map(move |r| format!("{c}: {r}")))
            .chain(self.row.iter().map(|r| format!("row: {r}")))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

/// Collaborators and settings a validation run needs.
pub struct ValidationContext<'a> {
    pub schema: &'a TableSchema,
    pub store: &'a dyn Store,
    pub labels: &'a dyn Labels,
    pub roles: &'a dyn Roles,
    pub settings: &'a Settings,
    /// `None` while the row is not yet persisted.
    pub key: Option<RowKey>,
}

/// The parts of a cell the pipeline looks at. Inserts validate values that
/// have no cell yet.
#[derive(Debug, Clone, Copy)]
pub struct CellInput<'a> {
    pub column: &'a str,
    pub value: &'a Value,
    pub error: Option<&'a str>,
    pub changed: bool,
}

impl<'a> CellInput<'a> {
    pub fn from_cell(cell: &'a Cell) -> Self {
        Self {
            column: cell.column(),
            value: cell.value(),
            error: cell.error(),
            changed: cell.has_changed(),
        }
    }
}

impl ValidationContext<'_> {
    fn reason(&self, kind: ReasonKind, column: &Column, text: &str) -> Reason {
        let label = column_label(self.labels, self.schema.name(), &column.name);
        Reason {
            kind,
            column: column.name.clone(),
            message: format!("{label} {text}"),
        }
    }

    pub fn required(&self, column: &Column, value: &Value) -> Option<Reason> {
        let trim = self.settings.column(&column.name).trim_required;
        (column.required && value.is_really_empty(trim))
            .then(|| self.reason(ReasonKind::Required, column, "is required"))
    }

    pub fn editable(&self, column: &Column, changed: bool) -> Option<Reason> {
        let key = self.key?;
        if !changed {
            return None;
        }
        let allowed = self.roles.allows(
            Action::Edit,
            &AccessContext {
                table: self.schema.name(),
                column: &column.name,
                key: Some(key),
            },
        );
        (!column.editable || !allowed)
            .then(|| self.reason(ReasonKind::NotEditable, column, "cannot be changed"))
    }

    /// Rule checks; skipped for the column default and for null in a
    /// nullable column.
    pub fn validate(&self, column: &Column, value: &Value, row: &RowData) -> Vec<Reason> {
        if *value == column.default && !column.default.is_null() {
            return Vec::new();
        }
        if value.is_null() {
            if column.nullable {
                return Vec::new();
            }
            return vec![self.reason(ReasonKind::Rule, column, "must not be empty")];
        }
        column
            .rules
            .iter()
            .filter_map(|rule| rules::check_rule(rule, value, row))
            .map(|text| self.reason(ReasonKind::Rule, column, &text))
            .collect()
    }

    pub fn compare(&self, column: &Column, value: &Value, row: &RowData) -> Vec<Reason> {
        let mut out = Vec::new();
        for rule in &column.compare {
            let Some(other) = row.get(&rule.other) else {
                continue;
            };
            let Some(ordering) = value.compare(other) else {
                continue;
            };
            if !rule.op.holds(ordering) {
                let other_label = column_label(self.labels, self.schema.name(), &rule.other);
                let text = format!("must be {} {other_label}", rule.op.symbol());
                out.push(self.reason(ReasonKind::Compare, column, &text));
            }
        }
        out
    }

    pub fn unique(&self, column: &Column, value: &Value) -> Result<Option<Reason>, OrmError> {
        if !column.unique || value.is_null() {
            return Ok(None);
        }
        let matches = self
            .store
            .exists(self.schema.name(), &column.name, value, self.key)?;
        Ok((matches > 0).then(|| {
            self.reason(
                ReasonKind::Unique,
                column,
                &format!("'{value}' is already in use"),
            )
        }))
    }

    /// Runs every stage for one cell in priority order.
    pub fn complete_validation(
        &self,
        input: CellInput<'_>,
        row: &RowData,
    ) -> Result<Verdict, OrmError> {
        let column = self.schema.column_or_err(input.column)?;
        if let Some(error) = input.error {
            return Ok(Err(vec![self.reason(
                ReasonKind::Exception,
                column,
                &format!("is invalid: {error}"),
            )]));
        }
        if let Some(reason) = self.required(column, input.value) {
            return Ok(Err(vec![reason]));
        }
        if let Some(reason) = self.editable(column, input.changed) {
            return Ok(Err(vec![reason]));
        }
        let mut reasons = self.validate(column, input.value, row);
        reasons.extend(self.compare(column, input.value, row));
        if !reasons.is_empty() {
            return Ok(Err(reasons));
        }
        match self.unique(column, input.value)? {
            Some(reason) => Ok(Err(vec![reason])),
            None => Ok(Ok(())),
        }
    }

    /// Validates several cells against the same row, collecting every
    /// failure.
    pub fn validate_cells<'c>(
        &self,
        inputs: impl IntoIterator<Item = CellInput<'c>>,
        row: &RowData,
    ) -> Result<ValidationReport, OrmError> {
        let mut report = ValidationReport::default();
        for input in inputs {
            if let Err(reasons) = self.complete_validation(input, row)? {
                report.push(input.column, reasons);
            }
        }
        Ok(report)
    }
}
