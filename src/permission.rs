use crate::catalog::types::RowKey;
use serde::{Deserialize, Serialize};

/// Actions the role collaborator is asked about. Only editability consults
/// roles; no core invariant depends on the answer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Action {
    Edit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessContext<'a> {
    pub table: &'a str,
    pub column: &'a str,
    /// `None` while the row is not yet persisted.
    pub key: Option<RowKey>,
}

pub trait Roles: Send + Sync {
    fn allows(&self, action: Action, context: &AccessContext<'_>) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Roles for AllowAll {
    fn allows(&self, _action: Action, _context: &AccessContext<'_>) -> bool {
        true
    }
}

/// Static deny list of `table.column` pairs, for applications without a
/// richer role model.
#[derive(Debug, Clone, Default)]
pub struct DenyColumns {
    denied: Vec<(String, String)>,
}

impl DenyColumns {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deny(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.denied.push((table.into(), column.into()));
        self
    }
}

impl Roles for DenyColumns {
    fn allows(&self, action: Action, context: &AccessContext<'_>) -> bool {
        match action {
            Action::Edit => !self
                .denied
                .iter()
                .any(|(t, c)| t == context.table && c == context.column),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AccessContext, Action, AllowAll, DenyColumns, Roles};

    #[test]
    fn deny_list_matches_exact_pairs() {
        let roles = DenyColumns::new().deny("users", "salary");
        let ctx = |column| AccessContext {
            table: "users",
            column,
            key: Some(1),
        };
        assert!(!roles.allows(Action::Edit, &ctx("salary")));
        assert!(roles.allows(Action::Edit, &ctx("name")));
        assert!(AllowAll.allows(Action::Edit, &ctx("salary")));
    }
}
