use crate::catalog::schema::TableSchema;
use crate::catalog::types::{RowKey, Value};
use crate::cell::Cell;
use crate::error::{OrmError, ResourceType};
use crate::store::RowData;

/// Cells of one row, ordered by column priority. Membership is fixed once
/// built; rebuilding goes through [`CellCollectionBuilder`] and a swap.
#[derive(Debug)]
pub struct CellCollection {
    table: String,
    key: RowKey,
    cells: Vec<Cell>,
}

/// Assembles a [`CellCollection`], rejecting foreign or duplicate cells as
/// they are added.
#[derive(Debug)]
pub struct CellCollectionBuilder {
    table: String,
    key: RowKey,
    cells: Vec<Cell>,
}

impl CellCollectionBuilder {
    pub fn new(table: impl Into<String>, key: RowKey) -> Self {
        Self {
            table: table.into(),
            key,
            cells: Vec::new(),
        }
    }

    pub fn push(&mut self, cell: Cell) -> Result<(), OrmError> {
        if cell.table() != self.table || cell.key() != self.key {
            return Err(OrmError::WrongOwner {
                resource_type: ResourceType::Cell,
                resource_id: cell.column().to_string(),
                expected: format!("{}#{}", self.table, self.key),
                actual: format!("{}#{}", cell.table(), cell.key()),
            });
        }
        if self.cells.iter().any(|c| c.column() == cell.column()) {
            return Err(OrmError::DuplicateMember {
                resource_type: ResourceType::Cell,
                resource_id: cell.column().to_string(),
                owner: format!("{}#{}", self.table, self.key),
            });
        }
        self.cells.push(cell);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Orders cells by the schema's column priority. Every cell must name a
    /// column of `schema`.
    pub fn build(mut self, schema: &TableSchema) -> Result<CellCollection, OrmError> {
        if schema.name() != self.table {
            return Err(OrmError::WrongOwner {
                resource_type: ResourceType::Table,
                resource_id: self.table.clone(),
                expected: self.table,
                actual: schema.name().to_string(),
            });
        }
        for cell in &self.cells {
            schema.column_or_err(cell.column())?;
        }
        self.cells
            .sort_by_key(|c| schema.position(c.column()).unwrap_or(usize::MAX));
        Ok(CellCollection {
            table: self.table,
            key: self.key,
            cells: self.cells,
        })
    }
}

impl CellCollection {
    /// One cell per schema column. Columns missing from `data` start from the
    /// column default so no cell lacks an initial value.
    pub fn from_row_data(
        schema: &TableSchema,
        key: RowKey,
        data: &RowData,
    ) -> Result<Self, OrmError> {
        let mut builder = CellCollectionBuilder::new(schema.name(), key);
        for column in schema.columns() {
            let initial = if schema.is_primary_key(&column.name) {
                Value::Integer(key)
            } else {
                data.get(&column.name)
                    .cloned()
                    .unwrap_or_else(|| column.default.clone())
            };
            builder.push(Cell::new(schema.name(), key, column.name.clone(), initial))?;
        }
        builder.build(schema)
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn key(&self) -> RowKey {
        self.key
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.cells.iter().find(|c| c.column() == column)
    }

    pub(crate) fn get_mut(&mut self, column: &str) -> Option<&mut Cell> {
        self.cells.iter_mut().find(|c| c.column() == column)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Cell> {
        self.cells.iter_mut()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(Cell::column)
    }

    pub fn changed(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter().filter(|c| c.has_changed())
    }

    pub fn has_changes(&self) -> bool {
        self.cells.iter().any(Cell::has_changed)
    }

    /// Current values (pending change or persisted).
    pub fn values(&self) -> RowData {
        self.cells
            .iter()
            .map(|c| (c.column().to_string(), c.value().clone()))
            .collect()
    }

    pub fn initial_values(&self) -> RowData {
        self.cells
            .iter()
            .map(|c| (c.column().to_string(), c.initial().clone()))
            .collect()
    }

    pub(crate) fn reset_all(&mut self) {
        for cell in &mut self.cells {
            cell.reset();
        }
    }

    /// Fresh collection with `data` as the persisted state, for swapping in
    /// after a refresh.
    pub(crate) fn rebuilt(&self, schema: &TableSchema, data: &RowData) -> Result<Self, OrmError> {
        Self::from_row_data(schema, self.key, data)
    }
}
