use crate::catalog::types::RowKey;
use crate::error::OrmError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLevel {
    Warning,
    Error,
}

/// User-facing record of a failure handled in communication mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub level: MessageLevel,
    pub code: &'static str,
    pub table: String,
    pub key: Option<RowKey>,
    pub text: String,
}

impl Message {
    pub fn from_error(err: &OrmError, table: &str, key: Option<RowKey>) -> Self {
        Self {
            level: MessageLevel::Error,
            code: err.code_str(),
            table: table.to_string(),
            key,
            text: err.to_string(),
        }
    }

    pub fn warning(
        code: &'static str,
        table: &str,
        key: Option<RowKey>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            level: MessageLevel::Warning,
            code,
            table: table.to_string(),
            key,
            text: text.into(),
        }
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.key {
            Some(key) => write!(f, "[{}] {}#{}: {}", self.code, self.table, key, self.text),
            None => write!(f, "[{}] {}: {}", self.code, self.table, self.text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Message, MessageLevel};
    use crate::error::{OrmError, StoreError};

    #[test]
    fn store_errors_become_error_messages() {
        let err = OrmError::from(StoreError::ConnectionLost("reset by peer".into()));
        let message = Message::from_error(&err, "users", Some(7));
        assert_eq!(message.level, MessageLevel::Error);
        assert_eq!(message.code, "store");
        assert_eq!(message.to_string(), "[store] users#7: connection lost: reset by peer");
    }
}
