use crate::error::OrmError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Global runtime configuration. Table and column sections override the
/// global values; per-call [`CommitOptions`] override everything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OrmConfig {
    /// Raise validation failures as errors instead of returning them.
    pub strict: bool,
    /// Turn store failures into recorded messages instead of errors.
    pub communicate: bool,
    /// Trim whitespace before the requiredness check.
    pub trim_required: bool,
    /// Trim text values on `set`.
    pub trim_on_set: bool,
    /// Maximum keys per batched fetch. `None` fetches every missing key in
    /// one store call.
    pub batch_fetch_limit: Option<usize>,
    /// Undo entries retained per table; oldest are dropped first.
    pub journal_capacity: usize,
    /// Treat a write affecting more than one row as an error.
    pub anomaly_is_error: bool,
    pub tables: BTreeMap<String, TableConfig>,
}

impl Default for OrmConfig {
    fn default() -> Self {
        Self {
            strict: false,
            communicate: false,
            trim_required: true,
            trim_on_set: false,
            batch_fetch_limit: None,
            journal_capacity: 256,
            anomaly_is_error: false,
            tables: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TableConfig {
    pub strict: Option<bool>,
    pub communicate: Option<bool>,
    pub trim_required: Option<bool>,
    pub trim_on_set: Option<bool>,
    pub anomaly_is_error: Option<bool>,
    pub columns: BTreeMap<String, ColumnConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ColumnConfig {
    pub trim_required: Option<bool>,
    pub trim_on_set: Option<bool>,
}

/// Per-call overrides for commit and delete operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitOptions {
    pub strict: Option<bool>,
    pub communicate: Option<bool>,
}

impl CommitOptions {
    pub fn strict() -> Self {
        Self {
            strict: Some(true),
            ..Self::default()
        }
    }

    pub fn communicate() -> Self {
        Self {
            communicate: Some(true),
            ..Self::default()
        }
    }
}

/// Table-level settings after merging global and table configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub strict: bool,
    pub communicate: bool,
    pub trim_required: bool,
    pub trim_on_set: bool,
    pub batch_fetch_limit: Option<usize>,
    pub journal_capacity: usize,
    pub anomaly_is_error: bool,
    columns: BTreeMap<String, ColumnConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSettings {
    pub trim_required: bool,
    pub trim_on_set: bool,
}

impl OrmConfig {
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::default()
        }
    }

    pub fn communicating() -> Self {
        Self {
            communicate: true,
            ..Self::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, OrmError> {
        let config: OrmConfig =
            serde_json::from_str(json).map_err(|e| OrmError::Decode(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, OrmError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), OrmError> {
        if self.batch_fetch_limit == Some(0) {
            return Err(OrmError::InvalidConfig {
                message: "batch_fetch_limit must be positive".into(),
            });
        }
        Ok(())
    }

    pub fn with_table(mut self, table: impl Into<String>, config: TableConfig) -> Self {
        self.tables.insert(table.into(), config);
        self
    }

    pub fn table_settings(&self, table: &str) -> Settings {
        let t = self.tables.get(table).cloned().unwrap_or_default();
        Settings {
            strict: t.strict.unwrap_or(self.strict),
            communicate: t.communicate.unwrap_or(self.communicate),
            trim_required: t.trim_required.unwrap_or(self.trim_required),
            trim_on_set: t.trim_on_set.unwrap_or(self.trim_on_set),
            batch_fetch_limit: self.batch_fetch_limit,
            journal_capacity: self.journal_capacity,
            anomaly_is_error: t.anomaly_is_error.unwrap_or(self.anomaly_is_error),
            columns: t.columns,
        }
    }
}

impl Settings {
    pub fn column(&self, column: &str) -> ColumnSettings {
        let c = self.columns.get(column);
        ColumnSettings {
            trim_required: c
                .and_then(|c| c.trim_required)
                .unwrap_or(self.trim_required),
            trim_on_set: c.and_then(|c| c.trim_on_set).unwrap_or(self.trim_on_set),
        }
    }

    pub fn with_options(&self, options: &CommitOptions) -> Settings {
        Settings {
            strict: options.strict.unwrap_or(self.strict),
            communicate: options.communicate.unwrap_or(self.communicate),
            ..self.clone()
        }
    }
}
