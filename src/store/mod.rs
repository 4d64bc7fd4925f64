//! Narrow interface to the external relational store.
//!
//! The core never speaks SQL or a wire protocol; every read and write goes
//! through [`Store`]. Calls block until the store answers.

pub mod memory;

use crate::catalog::types::{RowKey, Value};
use crate::error::StoreError;
use crate::query::plan::Expr;
use std::collections::BTreeMap;

/// Column name to value, as returned by a fetch.
pub type RowData = BTreeMap<String, Value>;

/// Ordered column assignments submitted in a single statement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    entries: Vec<(String, Value)>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an assignment, keeping first-insertion order.
    pub fn push(&mut self, column: impl Into<String>, value: Value) {
        let column = column.into();
        match self.entries.iter_mut().find(|(c, _)| *c == column) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((column, value)),
        }
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(column, value.into());
        self
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    pub fn remove(&mut self, column: &str) -> Option<Value> {
        let idx = self.entries.iter().position(|(c, _)| c == column)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(c, _)| c.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(c, v)| (c.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_row_data(&self) -> RowData {
        self.entries.iter().cloned().collect()
    }
}

impl FromIterator<(String, Value)> for ChangeSet {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut out = ChangeSet::new();
        for (c, v) in iter {
            out.push(c, v);
        }
        out
    }
}

pub trait Store: Send + Sync {
    fn fetch_row(&self, table: &str, key: RowKey) -> Result<Option<RowData>, StoreError>;

    /// Batched read. Keys without a row are simply absent from the result.
    fn fetch_rows(
        &self,
        table: &str,
        keys: &[RowKey],
    ) -> Result<BTreeMap<RowKey, RowData>, StoreError> {
        let mut out = BTreeMap::new();
        for &key in keys {
            if let Some(data) = self.fetch_row(table, key)? {
                out.insert(key, data);
            }
        }
        Ok(out)
    }

    fn fetch_where(
        &self,
        table: &str,
        predicate: &Expr,
    ) -> Result<BTreeMap<RowKey, RowData>, StoreError>;

    /// Single-statement update of one row. Returns the affected row count.
    fn write(&self, table: &str, changes: &ChangeSet, key: RowKey) -> Result<u64, StoreError>;

    /// Inserts a row and returns its key. A primary-key entry in `values`
    /// requests that exact key.
    fn insert(&self, table: &str, values: &ChangeSet) -> Result<RowKey, StoreError>;

    fn delete(&self, table: &str, key: RowKey) -> Result<u64, StoreError>;

    /// Counts rows of `table` whose `column` equals `value`, ignoring
    /// `exclude_key`.
    fn exists(
        &self,
        table: &str,
        column: &str,
        value: &Value,
        exclude_key: Option<RowKey>,
    ) -> Result<u64, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::ChangeSet;
    use crate::catalog::types::Value;

    #[test]
    fn change_set_replaces_in_place() {
        let mut set = ChangeSet::new().with("a", 1).with("b", "x");
        set.push("a", Value::Integer(2));
        let cols: Vec<_> = set.columns().collect();
        assert_eq!(cols, vec!["a", "b"]);
        assert_eq!(set.get("a"), Some(&Value::Integer(2)));
        assert_eq!(set.remove("b"), Some(Value::from("x")));
        assert_eq!(set.len(), 1);
    }
}
