use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LabelKind {
    Table,
    Column,
}

/// Label/translation collaborator. Only decorates messages.
pub trait Labels: Send + Sync {
    fn label_for(&self, kind: LabelKind, path: &str) -> Option<String>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoLabels;

impl Labels for NoLabels {
    fn label_for(&self, _kind: LabelKind, _path: &str) -> Option<String> {
        None
    }
}

/// Fixed lookup table keyed by `(kind, path)`; column paths are
/// `table.column`.
#[derive(Debug, Clone, Default)]
pub struct StaticLabels {
    entries: BTreeMap<(LabelKind, String), String>,
}

impl StaticLabels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, kind: LabelKind, path: impl Into<String>, text: impl Into<String>) -> Self {
        self.entries.insert((kind, path.into()), text.into());
        self
    }
}

impl Labels for StaticLabels {
    fn label_for(&self, kind: LabelKind, path: &str) -> Option<String> {
        self.entries.get(&(kind, path.to_string())).cloned()
    }
}

pub(crate) fn column_label(labels: &dyn Labels, table: &str, column: &str) -> String {
    labels
        .label_for(LabelKind::Column, &format!("{table}.{column}"))
        .unwrap_or_else(|| column.to_string())
}
