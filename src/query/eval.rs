use crate::catalog::types::Value;
use crate::query::plan::Expr;
use crate::store::RowData;

/// Evaluates a predicate against a row's values. Missing columns and nulls
/// never satisfy a comparison.
pub fn eval_expr(expr: &Expr, row: &RowData) -> bool {
    match expr {
        Expr::Eq(c, v) => get_col(row, c).is_some_and(|rv| rv.compare(v).is_some_and(|o| o.is_eq())),
        Expr::Ne(c, v) => {
            get_col(row, c).is_some_and(|rv| rv.compare(v).is_some_and(|o| !o.is_eq()))
        }
        Expr::Lt(c, v) => get_col(row, c).is_some_and(|rv| rv.compare(v).is_some_and(|o| o.is_lt())),
        Expr::Lte(c, v) => {
            get_col(row, c).is_some_and(|rv| rv.compare(v).is_some_and(|o| o.is_le()))
        }
        Expr::Gt(c, v) => get_col(row, c).is_some_and(|rv| rv.compare(v).is_some_and(|o| o.is_gt())),
        Expr::Gte(c, v) => {
            get_col(row, c).is_some_and(|rv| rv.compare(v).is_some_and(|o| o.is_ge()))
        }
        Expr::In(c, values) => get_col(row, c).is_some_and(|rv| {
            values
                .iter()
                .any(|v| rv.compare(v).is_some_and(|o| o.is_eq()))
        }),
        Expr::Between(c, lo, hi) => get_col(row, c).is_some_and(|rv| {
            rv.compare(lo).is_some_and(|o| o.is_ge()) && rv.compare(hi).is_some_and(|o| o.is_le())
        }),
        Expr::IsNull(c) => get_col(row, c).is_none_or(Value::is_null),
        Expr::IsNotNull(c) => get_col(row, c).is_some_and(|rv| !rv.is_null()),
        Expr::Like(c, pattern) => get_col(row, c).is_some_and(|rv| match rv {
            Value::Text(s) => like_match(s, pattern),
            _ => false,
        }),
        Expr::And(a, b) => eval_expr(a, row) && eval_expr(b, row),
        Expr::Or(a, b) => eval_expr(a, row) || eval_expr(b, row),
        Expr::Not(inner) => !eval_expr(inner, row),
    }
}

fn get_col<'a>(row: &'a RowData, column: &str) -> Option<&'a Value> {
    row.get(column)
}

pub fn like_match(value: &str, pattern: &str) -> bool {
    let text = value.as_bytes();
    let pat = pattern.as_bytes();
    let mut ti = 0usize;
    let mut pi = 0usize;
    let mut star_pi: Option<usize> = None;
    let mut star_ti = 0usize;

    while ti < text.len() {
        if pi < pat.len() && (pat[pi] == b'_' || pat[pi] == text[ti]) {
            ti += 1;
            pi += 1;
            continue;
        }
        if pi < pat.len() && pat[pi] == b'%' {
            star_pi = Some(pi);
            pi += 1;
            star_ti = ti;
            continue;
        }
        if let Some(saved_pi) = star_pi {
            pi = saved_pi + 1;
            star_ti += 1;
            ti = star_ti;
            continue;
        }
        return false;
    }

    while pi < pat.len() && pat[pi] == b'%' {
        pi += 1;
    }

    pi == pat.len()
}
