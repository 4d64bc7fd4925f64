pub mod schema;
pub mod types;

use crate::catalog::schema::{CompareRule, Rule};

/// Rules contributed for one column by an external schema/config source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    pub rules: Vec<Rule>,
    pub compare: Vec<CompareRule>,
}

impl RuleSet {
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty() && self.compare.is_empty()
    }
}

/// Schema/config collaborator consulted once per column when a table schema
/// is built.
pub trait RuleSource: Send + Sync {
    fn column_rules(&self, table: &str, column: &str) -> RuleSet;
}

/// Rule source that contributes nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRules;

impl RuleSource for NoRules {
    fn column_rules(&self, _table: &str, _column: &str) -> RuleSet {
        RuleSet::default()
    }
}
