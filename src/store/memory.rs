use crate::catalog::types::{RowKey, Value};
use crate::error::StoreError;
use crate::query::eval::eval_expr;
use crate::query::plan::Expr;
use crate::store::{ChangeSet, RowData, Store};
use parking_lot::Mutex;
use std::collections::BTreeMap;

/// Per-operation call counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCalls {
    pub fetch_row: usize,
    pub fetch_rows: usize,
    pub fetch_where: usize,
    pub write: usize,
    pub insert: usize,
    pub delete: usize,
    pub exists: usize,
}

#[derive(Debug, Default)]
struct MemTable {
    primary_key: String,
    rows: BTreeMap<RowKey, RowData>,
}

#[derive(Debug, Default)]
struct MemState {
    tables: BTreeMap<String, MemTable>,
    calls: StoreCalls,
    fetch_log: Vec<Vec<RowKey>>,
    fail_next_write: Option<StoreError>,
    fail_next_delete: Option<StoreError>,
    write_affected_override: Option<u64>,
}

/// In-process [`Store`] used by tests, benches and embedding applications
/// that want the row mirror without a database.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_table(&self, table: &str, primary_key: &str) {
        self.state.lock().tables.insert(
            table.to_string(),
            MemTable {
                primary_key: primary_key.to_string(),
                rows: BTreeMap::new(),
            },
        );
    }

    /// Inserts or replaces a row without counting it as a call.
    pub fn seed<I, K, V>(&self, table: &str, key: RowKey, values: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut state = self.state.lock();
        let Some(t) = state.tables.get_mut(table) else {
            return;
        };
        let mut data: RowData = values
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        data.insert(t.primary_key.clone(), Value::Integer(key));
        t.rows.insert(key, data);
    }

    /// Current stored values, bypassing call accounting.
    pub fn snapshot(&self, table: &str, key: RowKey) -> Option<RowData> {
        let state = self.state.lock();
        state.tables.get(table)?.rows.get(&key).cloned()
    }

    pub fn row_count(&self, table: &str) -> usize {
        let state = self.state.lock();
        state.tables.get(table).map_or(0, |t| t.rows.len())
    }

    pub fn calls(&self) -> StoreCalls {
        self.state.lock().calls
    }

    pub fn reset_calls(&self) {
        let mut state = self.state.lock();
        state.calls = StoreCalls::default();
        state.fetch_log.clear();
    }

    /// Key sets requested by each batched fetch, in call order.
    pub fn fetch_log(&self) -> Vec<Vec<RowKey>> {
        self.state.lock().fetch_log.clone()
    }

    pub fn fail_next_write(&self, err: StoreError) {
        self.state.lock().fail_next_write = Some(err);
    }

    pub fn fail_next_delete(&self, err: StoreError) {
        self.state.lock().fail_next_delete = Some(err);
    }

    /// Makes successful writes report `affected` rows instead of the real
    /// count.
    pub fn override_write_affected(&self, affected: Option<u64>) {
        self.state.lock().write_affected_override = affected;
    }
}

fn unknown_table(table: &str) -> StoreError {
    StoreError::Rejected(format!("unknown table '{table}'"))
}

impl Store for MemoryStore {
    fn fetch_row(&self, table: &str, key: RowKey) -> Result<Option<RowData>, StoreError> {
        let mut state = self.state.lock();
        state.calls.fetch_row += 1;
        let t = state.tables.get(table).ok_or_else(|| unknown_table(table))?;
        Ok(t.rows.get(&key).cloned())
    }

    fn fetch_rows(
        &self,
        table: &str,
        keys: &[RowKey],
    ) -> Result<BTreeMap<RowKey, RowData>, StoreError> {
        let mut state = self.state.lock();
        state.calls.fetch_rows += 1;
        state.fetch_log.push(keys.to_vec());
        let t = state.tables.get(table).ok_or_else(|| unknown_table(table))?;
        Ok(keys
            .iter()
            .filter_map(|k| t.rows.get(k).map(|data| (*k, data.clone())))
            .collect())
    }

    fn fetch_where(
        &self,
        table: &str,
        predicate: &Expr,
    ) -> Result<BTreeMap<RowKey, RowData>, StoreError> {
        let mut state = self.state.lock();
        state.calls.fetch_where += 1;
        let t = state.tables.get(table).ok_or_else(|| unknown_table(table))?;
        Ok(t.rows
            .iter()
            .filter(|(_, data)| eval_expr(predicate, data))
            .map(|(k, data)| (*k, data.clone()))
            .collect())
    }

    fn write(&self, table: &str, changes: &ChangeSet, key: RowKey) -> Result<u64, StoreError> {
        let mut state = self.state.lock();
        state.calls.write += 1;
        if let Some(err) = state.fail_next_write.take() {
            return Err(err);
        }
        let affected_override = state.write_affected_override;
        let t = state
            .tables
            .get_mut(table)
            .ok_or_else(|| unknown_table(table))?;
        if changes.contains(&t.primary_key) {
            return Err(StoreError::Rejected(format!(
                "primary key '{}' cannot be updated",
                t.primary_key
            )));
        }
        let Some(row) = t.rows.get_mut(&key) else {
            return Ok(0);
        };
        for (column, value) in changes.iter() {
            row.insert(column.to_string(), value.clone());
        }
        Ok(affected_override.unwrap_or(1))
    }

    fn insert(&self, table: &str, values: &ChangeSet) -> Result<RowKey, StoreError> {
        let mut state = self.state.lock();
        state.calls.insert += 1;
        let t = state
            .tables
            .get_mut(table)
            .ok_or_else(|| unknown_table(table))?;
        let key = match values.get(&t.primary_key) {
            Some(Value::Integer(k)) => {
                if t.rows.contains_key(k) {
                    return Err(StoreError::Rejected(format!(
                        "duplicate primary key {k} in table '{table}'"
                    )));
                }
                *k
            }
            Some(Value::Null) | None => t.rows.keys().next_back().map_or(1, |k| k + 1),
            Some(other) => {
                return Err(StoreError::Rejected(format!(
                    "primary key must be an integer, got {}",
                    other.type_name()
                )));
            }
        };
        let mut data = values.to_row_data();
        data.insert(t.primary_key.clone(), Value::Integer(key));
        t.rows.insert(key, data);
        Ok(key)
    }

    fn delete(&self, table: &str, key: RowKey) -> Result<u64, StoreError> {
        let mut state = self.state.lock();
        state.calls.delete += 1;
        if let Some(err) = state.fail_next_delete.take() {
            return Err(err);
        }
        let t = state
            .tables
            .get_mut(table)
            .ok_or_else(|| unknown_table(table))?;
        Ok(u64::from(t.rows.remove(&key).is_some()))
    }

    fn exists(
        &self,
        table: &str,
        column: &str,
        value: &Value,
        exclude_key: Option<RowKey>,
    ) -> Result<u64, StoreError> {
        let mut state = self.state.lock();
        state.calls.exists += 1;
        let t = state.tables.get(table).ok_or_else(|| unknown_table(table))?;
        let count = t
            .rows
            .iter()
            .filter(|(k, _)| Some(**k) != exclude_key)
            .filter(|(_, data)| data.get(column) == Some(value))
            .count();
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryStore;
    use crate::catalog::types::Value;
    use crate::error::StoreError;
    use crate::store::{ChangeSet, Store};

    fn store() -> MemoryStore {
        let store = MemoryStore::new();
        store.create_table("users", "id");
        store.seed("users", 1, [("name", Value::from("A"))]);
        store.seed("users", 2, [("name", Value::from("B"))]);
        store
    }

    #[test]
    fn exists_excludes_the_given_key() {
        let store = store();
        let a = Value::from("A");
        assert_eq!(store.exists("users", "name", &a, None).expect("exists"), 1);
        assert_eq!(store.exists("users", "name", &a, Some(1)).expect("exists"), 0);
        assert_eq!(store.calls().exists, 2);
    }

    #[test]
    fn write_to_missing_row_affects_nothing() {
        let store = store();
        let changes = ChangeSet::new().with("name", "Z");
        assert_eq!(store.write("users", &changes, 99).expect("write"), 0);
        assert_eq!(store.write("users", &changes, 1).expect("write"), 1);
        assert_eq!(
            store.snapshot("users", 1).expect("row").get("name"),
            Some(&Value::from("Z"))
        );
    }

    #[test]
    fn primary_key_updates_are_rejected() {
        let store = store();
        let changes = ChangeSet::new().with("id", 5);
        assert!(matches!(
            store.write("users", &changes, 1),
            Err(StoreError::Rejected(_))
        ));
    }

    #[test]
    fn insert_assigns_or_honours_keys() {
        let store = store();
        let key = store
            .insert("users", &ChangeSet::new().with("name", "C"))
            .expect("insert");
        assert_eq!(key, 3);
        let key = store
            .insert("users", &ChangeSet::new().with("id", 10).with("name", "D"))
            .expect("insert");
        assert_eq!(key, 10);
        assert!(
            store
                .insert("users", &ChangeSet::new().with("id", 10))
                .is_err()
        );
    }

    #[test]
    fn injected_failures_fire_once() {
        let store = store();
        store.fail_next_write(StoreError::ConnectionLost("gone".into()));
        let changes = ChangeSet::new().with("name", "Q");
        assert!(store.write("users", &changes, 1).is_err());
        assert_eq!(store.write("users", &changes, 1).expect("write"), 1);
    }
}
