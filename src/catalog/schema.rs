use crate::catalog::types::{ColumnKind, Value};
use crate::catalog::{RuleSet, RuleSource};
use crate::error::OrmError;
use crate::hooks::{ColumnBehavior, DefaultBehavior};
use crate::query::plan::Expr;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CompareOp {
    pub fn holds(self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering.is_eq(),
            CompareOp::Ne => !ordering.is_eq(),
            CompareOp::Gt => ordering.is_gt(),
            CompareOp::Gte => ordering.is_ge(),
            CompareOp::Lt => ordering.is_lt(),
            CompareOp::Lte => ordering.is_le(),
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
        }
    }
}

/// Single-value validation rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Rule {
    Min(Value),
    Max(Value),
    MinLength(usize),
    MaxLength(usize),
    OneOf(Vec<Value>),
    /// SQL-style pattern with `%` and `_` wildcards.
    Like(String),
    /// Predicate evaluated against the whole candidate row.
    Check { name: String, expr: Expr },
}

/// Cross-column relational rule: `this <op> other`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompareRule {
    pub op: CompareOp,
    pub other: String,
}

/// Inbound reference: rows of `child_table` point at this table through
/// `child_column`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Relation {
    pub child_table: String,
    pub child_column: String,
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.child_table, self.child_column)
    }
}

#[derive(Clone)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
    pub nullable: bool,
    pub default: Value,
    pub unique: bool,
    pub required: bool,
    pub editable: bool,
    pub rules: Vec<Rule>,
    pub compare: Vec<CompareRule>,
    /// Display and validation order; lower comes first.
    pub priority: i32,
    /// Commit ordering group inside a change set; lower is written first.
    pub set_priority: i32,
    behavior: Arc<dyn ColumnBehavior>,
}

impl fmt::Debug for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("nullable", &self.nullable)
            .field("default", &self.default)
            .field("unique", &self.unique)
            .field("required", &self.required)
            .field("editable", &self.editable)
            .field("rules", &self.rules)
            .field("compare", &self.compare)
            .field("priority", &self.priority)
            .field("set_priority", &self.set_priority)
            .finish_non_exhaustive()
    }
}

impl Column {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
            nullable: true,
            default: Value::Null,
            unique: false,
            required: false,
            editable: true,
            rules: Vec::new(),
            compare: Vec::new(),
            priority: 0,
            set_priority: 0,
            behavior: Arc::new(DefaultBehavior),
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = value.into();
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.editable = false;
        self
    }

    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn compare_with(mut self, op: CompareOp, other: impl Into<String>) -> Self {
        self.compare.push(CompareRule {
            op,
            other: other.into(),
        });
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn set_priority(mut self, set_priority: i32) -> Self {
        self.set_priority = set_priority;
        self
    }

    pub fn behavior(mut self, behavior: Arc<dyn ColumnBehavior>) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn hooks(&self) -> &dyn ColumnBehavior {
        self.behavior.as_ref()
    }

    fn merge_rules(&mut self, extra: RuleSet) {
        if extra.is_empty() {
            return;
        }
        for rule in extra.rules {
            if !self.rules.contains(&rule) {
                self.rules.push(rule);
            }
        }
        for rule in extra.compare {
            if !self.compare.contains(&rule) {
                self.compare.push(rule);
            }
        }
    }
}

/// Immutable column metadata for one table, ordered by column priority.
#[derive(Debug, Clone)]
pub struct TableSchema {
    name: String,
    primary_key: String,
    columns: Vec<Column>,
    relations: Vec<Relation>,
}

impl TableSchema {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_or_err(&self, name: &str) -> Result<&Column, OrmError> {
        self.column(name)
            .ok_or_else(|| OrmError::column_not_found(&self.name, name))
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn is_primary_key(&self, name: &str) -> bool {
        self.primary_key == name
    }

    /// Writable columns in commit order (set priority, then column priority).
    pub fn commit_order(&self) -> Vec<&Column> {
        let mut cols: Vec<&Column> = self
            .columns
            .iter()
            .filter(|c| c.name != self.primary_key)
            .collect();
        cols.sort_by_key(|c| c.set_priority);
        cols
    }
}

/// Declarative builder for a [`TableSchema`].
#[derive(Debug, Clone)]
pub struct TableSpec {
    pub table_name: String,
    pub primary_key: String,
    pub columns: Vec<Column>,
    pub relations: Vec<Relation>,
}

impl TableSpec {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            primary_key: "id".to_string(),
            columns: Vec::new(),
            relations: Vec::new(),
        }
    }

    pub fn primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = column.into();
        self
    }

    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    pub fn referenced_by(
        mut self,
        child_table: impl Into<String>,
        child_column: impl Into<String>,
    ) -> Self {
        self.relations.push(Relation {
            child_table: child_table.into(),
            child_column: child_column.into(),
        });
        self
    }

    pub fn build(self) -> Result<TableSchema, OrmError> {
        self.build_with(&crate::catalog::NoRules)
    }

    /// Builds the schema, merging rules supplied by an external rule source
    /// into each column's own rule set.
    pub fn build_with(self, source: &dyn RuleSource) -> Result<TableSchema, OrmError> {
        let table = self.table_name;
        let invalid = |message: String| OrmError::InvalidSchema {
            table: table.clone(),
            message,
        };
        if table.is_empty() {
            return Err(invalid("table name must not be empty".into()));
        }
        if self.columns.is_empty() {
            return Err(invalid("table must define at least one column".into()));
        }

        let mut seen = BTreeSet::new();
        for column in &self.columns {
            if column.name.is_empty() {
                return Err(invalid("column name must not be empty".into()));
            }
            if !seen.insert(column.name.clone()) {
                return Err(invalid(format!("duplicate column '{}'", column.name)));
            }
        }

        let Some(pk) = self.columns.iter().find(|c| c.name == self.primary_key) else {
            return Err(invalid(format!(
                "primary key column '{}' is not defined",
                self.primary_key
            )));
        };
        if pk.kind != ColumnKind::Integer {
            return Err(invalid(format!(
                "primary key column '{}' must be an integer column",
                pk.name
            )));
        }

        let mut columns = self.columns;
        for column in &mut columns {
            column.merge_rules(source.column_rules(&table, &column.name));
        }

        for column in &columns {
            if let ColumnKind::Char { max_len: 0 } = column.kind {
                return Err(invalid(format!(
                    "char column '{}' needs a positive length",
                    column.name
                )));
            }
            if !column.default.is_null() {
                column.kind.cast(column.default.clone()).map_err(|e| {
                    invalid(format!("default of column '{}': {e}", column.name))
                })?;
            }
            for rule in &column.compare {
                if !seen.contains(rule.other.as_str()) {
                    return Err(invalid(format!(
                        "column '{}' compares against unknown column '{}'",
                        column.name, rule.other
                    )));
                }
            }
            for rule in &column.rules {
                if let Rule::Check { name, expr } = rule {
                    expr.validate_depth().map_err(|e| {
                        invalid(format!("check '{name}' on '{}': {e}", column.name))
                    })?;
                }
            }
        }

        // Stable sort keeps declaration order inside one priority.
        columns.sort_by_key(|c| c.priority);

        Ok(TableSchema {
            name: table,
            primary_key: self.primary_key,
            columns,
            relations: self.relations,
        })
    }
}
