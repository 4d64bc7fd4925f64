use crate::catalog::types::RowKey;
use crate::error::{OrmError, ResourceType};
use crate::row::{Row, TableContext};
use im::OrdMap;
use std::fmt;
use std::sync::Arc;

/// Rows of one table ordered by primary key. Cloning is cheap: the map is
/// persistent and shares structure with its clones.
#[derive(Clone)]
pub struct RowCollection {
    owner: Arc<TableContext>,
    rows: OrdMap<RowKey, Row>,
}

impl fmt::Debug for RowCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowCollection")
            .field("table", &self.table())
            .field("keys", &self.rows.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl RowCollection {
    pub(crate) fn new(owner: Arc<TableContext>) -> Self {
        Self {
            owner,
            rows: OrdMap::new(),
        }
    }

    pub fn table(&self) -> &str {
        self.owner.table()
    }

    /// Adds `row`, rejecting rows owned by another table instance and keys
    /// already present. Two tables opened under the same name are distinct
    /// owners.
    pub fn insert(&mut self, row: Row) -> Result<(), OrmError> {
        if !row.belongs_to(&self.owner) {
            return Err(OrmError::WrongOwner {
                resource_type: ResourceType::Row,
                resource_id: row.key().to_string(),
                expected: self.table().to_string(),
                actual: row.table_name().to_string(),
            });
        }
        if self.rows.contains_key(&row.key()) {
            return Err(OrmError::DuplicateMember {
                resource_type: ResourceType::Row,
                resource_id: row.key().to_string(),
                owner: self.table().to_string(),
            });
        }
        self.rows.insert(row.key(), row);
        Ok(())
    }

    pub fn get(&self, key: RowKey) -> Option<&Row> {
        self.rows.get(&key)
    }

    pub fn contains(&self, key: RowKey) -> bool {
        self.rows.contains_key(&key)
    }

    pub fn remove(&mut self, key: RowKey) -> Option<Row> {
        self.rows.remove(&key)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = RowKey> + '_ {
        self.rows.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Row> {
        self.rows.values()
    }
}

impl<'a> IntoIterator for &'a RowCollection {
    type Item = &'a Row;
    type IntoIter = im::ordmap::Values<'a, RowKey, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.values()
    }
}
