pub mod collection;

use crate::catalog::schema::Column;
use crate::catalog::types::{RowKey, Value};
use crate::hooks::CellCallback;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellState {
    /// No pending change, or the change equals the persisted value.
    Clean,
    /// The pending change differs from the persisted value.
    Dirty,
    /// A completion callback is registered and has not fired yet.
    PendingCallback,
}

/// Column pre-processing applied to every incoming value: optional trim,
/// the column's `on_set` hook, then the kind cast. A rejection hands back the
/// trimmed input together with the reason.
pub(crate) fn preprocess(
    column: &Column,
    value: Value,
    trim: bool,
) -> Result<Value, (Value, String)> {
    let value = match value {
        Value::Text(s) if trim && s.trim().len() != s.len() => Value::Text(s.trim().into()),
        other => other,
    };
    let raw = value.clone();
    column
        .hooks()
        .on_set(column, value)
        .and_then(|v| column.kind.cast(v))
        .map_err(|reason| (raw, reason))
}

/// One column's value for one row: the persisted `initial` value and an
/// optional pending `change`.
pub struct Cell {
    table: String,
    key: RowKey,
    column: String,
    initial: Value,
    change: Option<Value>,
    callback: Option<CellCallback>,
    error: Option<String>,
}

impl fmt::Debug for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cell")
            .field("table", &self.table)
            .field("key", &self.key)
            .field("column", &self.column)
            .field("initial", &self.initial)
            .field("change", &self.change)
            .field("callback", &self.callback.is_some())
            .field("error", &self.error)
            .finish()
    }
}

impl Cell {
    pub fn new(
        table: impl Into<String>,
        key: RowKey,
        column: impl Into<String>,
        initial: Value,
    ) -> Self {
        Self {
            table: table.into(),
            key,
            column: column.into(),
            initial,
            change: None,
            callback: None,
            error: None,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn key(&self) -> RowKey {
        self.key
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn initial(&self) -> &Value {
        &self.initial
    }

    pub fn change(&self) -> Option<&Value> {
        self.change.as_ref()
    }

    /// The pending change if any, otherwise the persisted value.
    pub fn value(&self) -> &Value {
        self.change.as_ref().unwrap_or(&self.initial)
    }

    /// Error recorded by the last `set`, if pre-processing rejected the value.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn state(&self) -> CellState {
        if self.callback.is_some() {
            CellState::PendingCallback
        } else if self.change.as_ref().is_some_and(|c| *c != self.initial) {
            CellState::Dirty
        } else {
            CellState::Clean
        }
    }

    pub fn has_changed(&self) -> bool {
        self.state() != CellState::Clean
    }

    /// Stores `value` as the pending change after column pre-processing.
    /// A rejected value is kept as typed and the reason recorded.
    pub(crate) fn set(&mut self, column: &Column, value: Value, trim: bool) {
        self.callback = None;
        self.error = None;
        match preprocess(column, value, trim) {
            Ok(v) => self.change = Some(v),
            Err((raw, reason)) => {
                self.change = Some(raw);
                self.error = Some(reason);
            }
        }
    }

    pub(crate) fn reset(&mut self) {
        self.change = None;
        self.callback = None;
        self.error = None;
    }

    pub(crate) fn unset(&mut self, column: &Column) {
        self.reset();
        if column.default != self.initial {
            self.change = Some(column.default.clone());
        }
    }

    /// Adopts a persisted value after a commit or refresh.
    pub(crate) fn set_initial(&mut self, value: Value) {
        self.initial = value;
        self.reset();
    }

    pub(crate) fn register_callback(&mut self, callback: CellCallback) {
        self.callback = Some(callback);
    }

    pub(crate) fn take_callback(&mut self) -> Option<CellCallback> {
        self.callback.take()
    }
}

#[cfg(test)]
mod tests {
    use super::{Cell, CellState};
    use crate::catalog::schema::Column;
    use crate::catalog::types::{ColumnKind, Value};
    use crate::hooks::ColumnBehavior;
    use proptest::prelude::*;
    use std::sync::Arc;

    fn age() -> Column {
        Column::new("age", ColumnKind::Integer).default_value(0)
    }

    fn cell(initial: i64) -> Cell {
        Cell::new("users", 7, "age", Value::Integer(initial))
    }

    #[test]
    fn set_casts_and_marks_dirty() {
        let mut c = cell(10);
        c.set(&age(), Value::from("11"), false);
        assert_eq!(c.value(), &Value::Integer(11));
        assert_eq!(c.state(), CellState::Dirty);
        assert_eq!(c.initial(), &Value::Integer(10));
    }

    #[test]
    fn setting_the_initial_value_stays_clean() {
        let mut c = cell(10);
        c.set(&age(), Value::Integer(10), false);
        assert_eq!(c.state(), CellState::Clean);
        assert!(!c.has_changed());
    }

    #[test]
    fn rejected_values_are_kept_with_an_error() {
        let mut c = cell(10);
        c.set(&age(), Value::from("ten"), false);
        assert_eq!(c.value(), &Value::from("ten"));
        assert!(c.error().is_some());
        c.set(&age(), Value::Integer(12), false);
        assert!(c.error().is_none());
    }

    #[test]
    fn unset_uses_default_unless_it_matches_initial() {
        let mut c = cell(10);
        c.unset(&age());
        assert_eq!(c.value(), &Value::Integer(0));
        assert!(c.has_changed());

        let mut c = cell(0);
        c.set(&age(), Value::Integer(5), false);
        c.unset(&age());
        assert_eq!(c.change(), None);
        assert!(!c.has_changed());
    }

    #[test]
    fn callback_forces_pending_state_until_set_or_reset() {
        let mut c = cell(10);
        c.register_callback(Box::new(|_| {}));
        assert_eq!(c.state(), CellState::PendingCallback);
        assert!(c.has_changed());
        c.set(&age(), Value::Integer(10), false);
        assert_eq!(c.state(), CellState::Clean);

        c.register_callback(Box::new(|_| {}));
        c.reset();
        assert_eq!(c.state(), CellState::Clean);
    }

    #[test]
    fn set_initial_discards_pending_state() {
        let mut c = cell(10);
        c.set(&age(), Value::Integer(11), false);
        c.register_callback(Box::new(|_| {}));
        c.set_initial(Value::Integer(11));
        assert_eq!(c.state(), CellState::Clean);
        assert_eq!(c.value(), &Value::Integer(11));
    }

    struct Upper;

    impl ColumnBehavior for Upper {
        fn on_set(&self, _column: &Column, value: Value) -> Result<Value, String> {
            match value {
                Value::Text(s) => Ok(Value::Text(s.to_uppercase().into())),
                other => Ok(other),
            }
        }
    }

    #[test]
    fn on_set_hook_and_trim_run_before_storing() {
        let column = Column::new("code", ColumnKind::Char { max_len: 3 }).behavior(Arc::new(Upper));
        let mut c = Cell::new("t", 1, "code", Value::from("AAA"));
        c.set(&column, Value::from("  abc "), true);
        assert_eq!(c.value(), &Value::from("ABC"));
    }

    proptest! {
        #[test]
        fn set_then_reset_restores_initial(initial in any::<i64>(), v in any::<i64>()) {
            let mut c = cell(initial);
            c.set(&age(), Value::Integer(v), false);
            c.reset();
            prop_assert_eq!(c.value(), &Value::Integer(initial));
            prop_assert!(!c.has_changed());
        }

        #[test]
        fn set_then_set_initial_collapses_change(initial in any::<i64>(), v in any::<i64>()) {
            let mut c = cell(initial);
            c.set(&age(), Value::Integer(v), false);
            let submitted = c.value().clone();
            c.set_initial(submitted);
            prop_assert_eq!(c.value(), &Value::Integer(v));
            prop_assert!(!c.has_changed());
        }
    }
}
