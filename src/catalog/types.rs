use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Integer primary key identifying a row within its table.
pub type RowKey = i64;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Float,
    Boolean,
    /// Bounded text; values longer than `max_len` characters are rejected.
    Char { max_len: usize },
    Text,
    Timestamp,
    Blob,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    Text(CompactString),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Blob(Vec<u8>),
    Timestamp(i64),
    Json(CompactString),
    Null,
}

impl Value {
    fn kind_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Boolean(_) => 1,
            Value::Integer(_) => 2,
            Value::Timestamp(_) => 3,
            Value::Float(_) => 4,
            Value::Text(_) => 5,
            Value::Json(_) => 6,
            Value::Blob(_) => 7,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) | Value::Timestamp(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(v) | Value::Timestamp(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) | Value::Json(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Null, an empty blob, or text that is empty (after trimming when `trim`
    /// is set). Zero and `false` are values, not emptiness.
    pub fn is_really_empty(&self, trim: bool) -> bool {
        match self {
            Value::Null => true,
            Value::Text(s) | Value::Json(s) => {
                if trim {
                    s.trim().is_empty()
                } else {
                    s.is_empty()
                }
            }
            Value::Blob(b) => b.is_empty(),
            _ => false,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Text(_) => "text",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Boolean(_) => "boolean",
            Value::Blob(_) => "blob",
            Value::Timestamp(_) => "timestamp",
            Value::Json(_) => "json",
            Value::Null => "null",
        }
    }

    /// Ordering used by rule and comparison checks: numeric kinds compare by
    /// magnitude, null is incomparable.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::Integer(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Integer(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Timestamp(a), Value::Integer(b)) => a.partial_cmp(b),
            (Value::Integer(a), Value::Timestamp(b)) => a.partial_cmp(b),
            (Value::Timestamp(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Timestamp(b)) => a.partial_cmp(&(*b as f64)),
            _ => Some(self.cmp(other)),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) | Value::Json(s) => write!(f, "{s}"),
            Value::Integer(v) | Value::Timestamp(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Boolean(v) => write!(f, "{v}"),
            Value::Blob(b) => write!(f, "<{} bytes>", b.len()),
            Value::Null => write!(f, "NULL"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        let rank_cmp = self.kind_rank().cmp(&other.kind_rank());
        if rank_cmp != Ordering::Equal {
            return rank_cmp;
        }

        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Timestamp(a), Value::Timestamp(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Json(a), Value::Json(b)) => a.cmp(b),
            (Value::Blob(a), Value::Blob(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(value as i64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.into())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value.into())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl ColumnKind {
    pub fn name(&self) -> &'static str {
        match self {
            ColumnKind::Integer => "integer",
            ColumnKind::Float => "float",
            ColumnKind::Boolean => "boolean",
            ColumnKind::Char { .. } => "char",
            ColumnKind::Text => "text",
            ColumnKind::Timestamp => "timestamp",
            ColumnKind::Blob => "blob",
            ColumnKind::Json => "json",
        }
    }

    /// Coerces a candidate value into this kind. Null always passes through;
    /// nullability is a validation concern, not a cast concern.
    pub fn cast(&self, value: Value) -> Result<Value, String> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        let mismatch = |value: &Value| {
            format!("cannot convert {} to {}", value.type_name(), self.name())
        };
        match self {
            ColumnKind::Integer => match value {
                Value::Integer(_) => Ok(value),
                Value::Timestamp(v) => Ok(Value::Integer(v)),
                Value::Boolean(b) => Ok(Value::Integer(i64::from(b))),
                // i64::MAX as f64 rounds up to 2^63, hence the strict bound.
                Value::Float(f) if f.fract() == 0.0 && f.is_finite() => {
                    if f >= i64::MIN as f64 && f < i64::MAX as f64 {
                        Ok(Value::Integer(f as i64))
                    } else {
                        Err(format!("{f} is out of range for integer"))
                    }
                }
                Value::Text(ref s) => {
                    let trimmed = s.trim();
                    if trimmed.is_empty() {
                        return Ok(Value::Null);
                    }
                    trimmed
                        .parse::<i64>()
                        .map(Value::Integer)
                        .map_err(|_| format!("'{trimmed}' is not an integer"))
                }
                other => Err(mismatch(&other)),
            },
            ColumnKind::Float => match value {
                Value::Float(_) => Ok(value),
                Value::Integer(v) => Ok(Value::Float(v as f64)),
                Value::Text(ref s) => {
                    let trimmed = s.trim();
                    if trimmed.is_empty() {
                        return Ok(Value::Null);
                    }
                    trimmed
                        .parse::<f64>()
                        .map(Value::Float)
                        .map_err(|_| format!("'{trimmed}' is not a number"))
                }
                other => Err(mismatch(&other)),
            },
            ColumnKind::Boolean => match value {
                Value::Boolean(_) => Ok(value),
                Value::Integer(0) => Ok(Value::Boolean(false)),
                Value::Integer(1) => Ok(Value::Boolean(true)),
                Value::Text(ref s) => match s.trim().to_ascii_lowercase().as_str() {
                    "true" | "1" | "yes" | "on" => Ok(Value::Boolean(true)),
                    "false" | "0" | "no" | "off" => Ok(Value::Boolean(false)),
                    "" => Ok(Value::Null),
                    other => Err(format!("'{other}' is not a boolean")),
                },
                other => Err(mismatch(&other)),
            },
            ColumnKind::Char { max_len } => {
                let text = match value {
                    Value::Text(s) => s,
                    Value::Integer(v) => v.to_string().into(),
                    Value::Float(v) => v.to_string().into(),
                    other => return Err(mismatch(&other)),
                };
                let len = text.chars().count();
                if len > *max_len {
                    return Err(format!("length {len} exceeds maximum of {max_len}"));
                }
                Ok(Value::Text(text))
            }
            ColumnKind::Text => match value {
                Value::Text(_) => Ok(value),
                Value::Integer(v) => Ok(Value::Text(v.to_string().into())),
                Value::Float(v) => Ok(Value::Text(v.to_string().into())),
                Value::Boolean(v) => Ok(Value::Text(v.to_string().into())),
                other => Err(mismatch(&other)),
            },
            ColumnKind::Timestamp => match value {
                Value::Timestamp(_) => Ok(value),
                Value::Integer(v) => Ok(Value::Timestamp(v)),
                Value::Text(ref s) => s
                    .trim()
                    .parse::<i64>()
                    .map(Value::Timestamp)
                    .map_err(|_| format!("'{s}' is not a timestamp")),
                other => Err(mismatch(&other)),
            },
            ColumnKind::Blob => match value {
                Value::Blob(_) => Ok(value),
                Value::Text(s) => Ok(Value::Blob(s.as_bytes().to_vec())),
                other => Err(mismatch(&other)),
            },
            ColumnKind::Json => match value {
                Value::Json(_) => Ok(value),
                Value::Text(s) => serde_json::from_str::<serde_json::Value>(&s)
                    .map(|_| Value::Json(s))
                    .map_err(|e| format!("invalid json: {e}")),
                other => Err(mismatch(&other)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ColumnKind, Value};
    use proptest::prelude::*;
    use std::cmp::Ordering;

    #[test]
    fn integer_cast_accepts_numeric_text() {
        assert_eq!(
            ColumnKind::Integer.cast(Value::from(" 42 ")),
            Ok(Value::Integer(42))
        );
        assert_eq!(ColumnKind::Integer.cast(Value::from("")), Ok(Value::Null));
        assert!(ColumnKind::Integer.cast(Value::from("forty")).is_err());
        assert_eq!(
            ColumnKind::Integer.cast(Value::Float(3.0)),
            Ok(Value::Integer(3))
        );
        assert!(ColumnKind::Integer.cast(Value::Float(3.5)).is_err());
    }

    #[test]
    fn integer_cast_rejects_floats_outside_i64() {
        assert!(ColumnKind::Integer.cast(Value::Float(1e30)).is_err());
        assert!(ColumnKind::Integer.cast(Value::Float(-1e30)).is_err());
        assert!(ColumnKind::Integer.cast(Value::Float(9_223_372_036_854_775_808.0)).is_err());
        assert_eq!(
            ColumnKind::Integer.cast(Value::Float(-9_223_372_036_854_775_808.0)),
            Ok(Value::Integer(i64::MIN))
        );
        assert_eq!(
            ColumnKind::Integer.cast(Value::Float(4_611_686_018_427_387_904.0)),
            Ok(Value::Integer(1 << 62))
        );
    }

    #[test]
    fn char_cast_enforces_length() {
        let kind = ColumnKind::Char { max_len: 3 };
        assert_eq!(kind.cast(Value::from("abc")), Ok(Value::from("abc")));
        let err = kind.cast(Value::from("abcd")).expect_err("too long");
        assert!(err.contains("exceeds maximum of 3"), "{err}");
    }

    #[test]
    fn json_cast_rejects_malformed_text() {
        assert!(ColumnKind::Json.cast(Value::from("{\"a\":1}")).is_ok());
        assert!(ColumnKind::Json.cast(Value::from("{a:")).is_err());
    }

    #[test]
    fn really_empty_respects_trim() {
        assert!(Value::Null.is_really_empty(false));
        assert!(Value::from("   ").is_really_empty(true));
        assert!(!Value::from("   ").is_really_empty(false));
        assert!(!Value::Integer(0).is_really_empty(true));
        assert!(!Value::Boolean(false).is_really_empty(true));
    }

    #[test]
    fn accessors_only_match_their_kind() {
        assert_eq!(Value::Timestamp(5).as_i64(), Some(5));
        assert_eq!(Value::Integer(2).as_f64(), Some(2.0));
        assert_eq!(Value::from("x").as_i64(), None);
        assert_eq!(Value::Boolean(true).as_bool(), Some(true));
        assert_eq!(Value::Integer(1).as_bool(), None);
    }

    #[test]
    fn compare_mixes_numeric_kinds() {
        assert_eq!(
            Value::Integer(2).compare(&Value::Float(2.5)),
            Some(Ordering::Less)
        );
        assert_eq!(Value::Null.compare(&Value::Integer(1)), None);
    }

    proptest! {
        #[test]
        fn ordering_is_total_and_antisymmetric(a in any::<i64>(), b in any::<i64>()) {
            let (x, y) = (Value::Integer(a), Value::Integer(b));
            prop_assert_eq!(x.cmp(&y), y.cmp(&x).reverse());
        }

        #[test]
        fn integer_cast_is_idempotent(v in any::<i64>()) {
            let once = ColumnKind::Integer.cast(Value::Integer(v)).expect("cast");
            let twice = ColumnKind::Integer.cast(once.clone()).expect("cast");
            prop_assert_eq!(once, twice);
        }
    }
}
