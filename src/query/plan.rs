use crate::catalog::types::Value;
use crate::error::OrmError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Maximum nesting depth for expressions to prevent stack overflow
const MAX_EXPR_DEPTH: usize = 32;

/// Where-clause over a single table's columns. Used for row lookups through
/// the store and for `Rule::Check` predicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expr {
    Eq(String, Value),
    Ne(String, Value),
    Lt(String, Value),
    Lte(String, Value),
    Gt(String, Value),
    Gte(String, Value),
    In(String, Vec<Value>),
    Between(String, Value, Value),
    IsNull(String),
    IsNotNull(String),
    Like(String, String),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

impl Expr {
    pub fn and(self, rhs: Expr) -> Expr {
        Expr::And(Box::new(self), Box::new(rhs))
    }

    pub fn or(self, rhs: Expr) -> Expr {
        Expr::Or(Box::new(self), Box::new(rhs))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Expr {
        Expr::Not(Box::new(self))
    }

    /// Calculates the maximum nesting depth of this expression tree.
    pub fn depth(&self) -> usize {
        match self {
            Expr::Eq(_, _)
            | Expr::Ne(_, _)
            | Expr::Lt(_, _)
            | Expr::Lte(_, _)
            | Expr::Gt(_, _)
            | Expr::Gte(_, _)
            | Expr::In(_, _)
            | Expr::Between(_, _, _)
            | Expr::IsNull(_)
            | Expr::IsNotNull(_)
            | Expr::Like(_, _) => 1,
            Expr::Not(inner) => 1 + inner.depth(),
            Expr::And(left, right) | Expr::Or(left, right) => 1 + left.depth().max(right.depth()),
        }
    }

    pub fn validate_depth(&self) -> Result<(), OrmError> {
        let depth = self.depth();
        if depth > MAX_EXPR_DEPTH {
            return Err(OrmError::InvalidQuery {
                message: format!(
                    "expression depth {depth} exceeds maximum allowed depth of {MAX_EXPR_DEPTH}"
                ),
            });
        }
        Ok(())
    }

    /// Column names mentioned anywhere in the expression.
    pub fn columns(&self) -> BTreeSet<&str> {
        let mut out = BTreeSet::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut BTreeSet<&'a str>) {
        match self {
            Expr::Eq(c, _)
            | Expr::Ne(c, _)
            | Expr::Lt(c, _)
            | Expr::Lte(c, _)
            | Expr::Gt(c, _)
            | Expr::Gte(c, _)
            | Expr::In(c, _)
            | Expr::Between(c, _, _)
            | Expr::IsNull(c)
            | Expr::IsNotNull(c)
            | Expr::Like(c, _) => {
                out.insert(c.as_str());
            }
            Expr::And(l, r) | Expr::Or(l, r) => {
                l.collect_columns(out);
                r.collect_columns(out);
            }
            Expr::Not(inner) => inner.collect_columns(out),
        }
    }
}

pub struct ColumnRef(String);

pub fn col(name: &str) -> ColumnRef {
    ColumnRef(name.to_string())
}

pub fn lit<T: Into<Value>>(value: T) -> Value {
    value.into()
}

impl ColumnRef {
    pub fn eq(self, value: Value) -> Expr {
        Expr::Eq(self.0, value)
    }

    pub fn neq(self, value: Value) -> Expr {
        Expr::Ne(self.0, value)
    }

    pub fn gt(self, value: Value) -> Expr {
        Expr::Gt(self.0, value)
    }

    pub fn gte(self, value: Value) -> Expr {
        Expr::Gte(self.0, value)
    }

    pub fn lt(self, value: Value) -> Expr {
        Expr::Lt(self.0, value)
    }

    pub fn lte(self, value: Value) -> Expr {
        Expr::Lte(self.0, value)
    }

    pub fn between(self, low: Value, high: Value) -> Expr {
        Expr::Between(self.0, low, high)
    }

    pub fn in_(self, values: Vec<Value>) -> Expr {
        Expr::In(self.0, values)
    }

    pub fn like(self, pattern: &str) -> Expr {
        Expr::Like(self.0, pattern.to_string())
    }

    pub fn is_null(self) -> Expr {
        Expr::IsNull(self.0)
    }

    pub fn is_not_null(self) -> Expr {
        Expr::IsNotNull(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::{col, lit};
    use crate::error::OrmErrorCode;

    #[test]
    fn depth_and_columns_follow_tree_shape() {
        let expr = col("age")
            .gte(lit(18))
            .and(col("name").like("A%").or(col("email").is_null()).not());
        assert_eq!(expr.depth(), 4);
        let cols: Vec<_> = expr.columns().into_iter().collect();
        assert_eq!(cols, vec!["age", "email", "name"]);
    }

    #[test]
    fn overly_deep_expressions_are_rejected() {
        let mut expr = col("a").eq(lit(1));
        for _ in 0..40 {
            expr = expr.not();
        }
        let err = expr.validate_depth().expect_err("too deep");
        assert_eq!(err.code(), OrmErrorCode::InvalidQuery);
        assert!(err.is_structural());
    }
}
