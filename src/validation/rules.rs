use crate::catalog::schema::Rule;
use crate::catalog::types::Value;
use crate::query::eval::{eval_expr, like_match};
use crate::store::RowData;

/// Evaluates one rule. Returns the failure text (without the column label)
/// or `None` when the value satisfies the rule.
pub fn check_rule(rule: &Rule, value: &Value, row: &RowData) -> Option<String> {
    match rule {
        Rule::Min(min) => match value.compare(min) {
            Some(ordering) if ordering.is_lt() => Some(format!("must be at least {min}")),
            Some(_) => None,
            None => Some(format!("must be comparable with {min}")),
        },
        Rule::Max(max) => match value.compare(max) {
            Some(ordering) if ordering.is_gt() => Some(format!("must be at most {max}")),
            Some(_) => None,
            None => Some(format!("must be comparable with {max}")),
        },
        Rule::MinLength(min) => {
            let len = value_len(value);
            (len < *min).then(|| format!("must be at least {min} characters"))
        }
        Rule::MaxLength(max) => {
            let len = value_len(value);
            (len > *max).then(|| format!("must be at most {max} characters"))
        }
        Rule::OneOf(allowed) => (!allowed.contains(value)).then(|| {
            let list: Vec<String> = allowed.iter().map(ToString::to_string).collect();
            format!("must be one of {}", list.join(", "))
        }),
        Rule::Like(pattern) => match value.as_str() {
            Some(text) if like_match(text, pattern) => None,
            _ => Some(format!("must match '{pattern}'")),
        },
        Rule::Check { name, expr } => (!eval_expr(expr, row)).then(|| format!("fails check '{name}'")),
    }
}

fn value_len(value: &Value) -> usize {
    match value {
        Value::Text(s) | Value::Json(s) => s.chars().count(),
        Value::Blob(b) => b.len(),
        Value::Null => 0,
        other => other.to_string().chars().count(),
    }
}
