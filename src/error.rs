use crate::catalog::types::RowKey;
use crate::validation::ValidationReport;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceType {
    Table,
    Column,
    Row,
    Cell,
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceType::Table => write!(f, "table"),
            ResourceType::Column => write!(f, "column"),
            ResourceType::Row => write!(f, "row"),
            ResourceType::Cell => write!(f, "cell"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrmErrorCode {
    Io,
    Decode,
    InvalidConfig,
    InvalidSchema,
    InvalidQuery,
    WrongOwner,
    DuplicateMember,
    TableNotFound,
    ColumnNotFound,
    RowNotFound,
    CellNotFound,
    Terminated,
    PrimaryKeyWrite,
    Validation,
    FinalValidation,
    Store,
    CommitAnomaly,
    HasDependents,
    DeleteVetoed,
}

impl OrmErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            OrmErrorCode::Io => "io",
            OrmErrorCode::Decode => "decode",
            OrmErrorCode::InvalidConfig => "invalid_config",
            OrmErrorCode::InvalidSchema => "invalid_schema",
            OrmErrorCode::InvalidQuery => "invalid_query",
            OrmErrorCode::WrongOwner => "wrong_owner",
            OrmErrorCode::DuplicateMember => "duplicate_member",
            OrmErrorCode::TableNotFound => "table_not_found",
            OrmErrorCode::ColumnNotFound => "column_not_found",
            OrmErrorCode::RowNotFound => "row_not_found",
            OrmErrorCode::CellNotFound => "cell_not_found",
            OrmErrorCode::Terminated => "terminated",
            OrmErrorCode::PrimaryKeyWrite => "primary_key_write",
            OrmErrorCode::Validation => "validation",
            OrmErrorCode::FinalValidation => "final_validation",
            OrmErrorCode::Store => "store",
            OrmErrorCode::CommitAnomaly => "commit_anomaly",
            OrmErrorCode::HasDependents => "has_dependents",
            OrmErrorCode::DeleteVetoed => "delete_vetoed",
        }
    }
}

/// Errors raised by the external store collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("write rejected: {0}")]
    Rejected(String),
    #[error("connection lost: {0}")]
    ConnectionLost(String),
    #[error("row {key} in table '{table}' is no longer eligible for update")]
    Ineligible { table: String, key: RowKey },
    #[error("store error: {0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum OrmError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("invalid config: {message}")]
    InvalidConfig { message: String },
    #[error("invalid schema for table '{table}': {message}")]
    InvalidSchema { table: String, message: String },
    #[error("invalid query: {message}")]
    InvalidQuery { message: String },
    #[error("{resource_type} '{resource_id}' belongs to '{actual}', expected '{expected}'")]
    WrongOwner {
        resource_type: ResourceType,
        resource_id: String,
        expected: String,
        actual: String,
    },
    #[error("duplicate {resource_type} '{resource_id}' in collection owned by '{owner}'")]
    DuplicateMember {
        resource_type: ResourceType,
        resource_id: String,
        owner: String,
    },
    #[error("{resource_type} '{resource_id}' not found")]
    NotFound {
        resource_type: ResourceType,
        resource_id: String,
    },
    #[error("row {key} in table '{table}' has been terminated")]
    Terminated { table: String, key: RowKey },
    #[error("primary key column '{column}' of table '{table}' cannot be written")]
    PrimaryKeyWrite { table: String, column: String },
    #[error("validation failed for row {key:?} in table '{table}': {report}")]
    Validation {
        table: String,
        key: Option<RowKey>,
        report: Box<ValidationReport>,
    },
    #[error("final validation rejected row {key:?} in table '{table}': {reason}")]
    FinalValidation {
        table: String,
        key: Option<RowKey>,
        reason: String,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("commit of row {key} in table '{table}' affected {affected} rows")]
    CommitAnomaly {
        table: String,
        key: RowKey,
        affected: u64,
    },
    #[error("row {key} in table '{table}' has dependents: {}", dependents.join(", "))]
    HasDependents {
        table: String,
        key: RowKey,
        dependents: Vec<String>,
    },
    #[error("delete of row {key} in table '{table}' vetoed by column '{column}': {reason}")]
    DeleteVetoed {
        table: String,
        key: RowKey,
        column: String,
        reason: String,
    },
}

impl OrmError {
    pub fn code(&self) -> OrmErrorCode {
        match self {
            OrmError::Io(_) => OrmErrorCode::Io,
            OrmError::Decode(_) => OrmErrorCode::Decode,
            OrmError::InvalidConfig { .. } => OrmErrorCode::InvalidConfig,
            OrmError::InvalidSchema { .. } => OrmErrorCode::InvalidSchema,
            OrmError::InvalidQuery { .. } => OrmErrorCode::InvalidQuery,
            OrmError::WrongOwner { .. } => OrmErrorCode::WrongOwner,
            OrmError::DuplicateMember { .. } => OrmErrorCode::DuplicateMember,
            OrmError::NotFound { resource_type, .. } => match resource_type {
                ResourceType::Table => OrmErrorCode::TableNotFound,
                ResourceType::Column => OrmErrorCode::ColumnNotFound,
                ResourceType::Row => OrmErrorCode::RowNotFound,
                ResourceType::Cell => OrmErrorCode::CellNotFound,
            },
            OrmError::Terminated { .. } => OrmErrorCode::Terminated,
            OrmError::PrimaryKeyWrite { .. } => OrmErrorCode::PrimaryKeyWrite,
            OrmError::Validation { .. } => OrmErrorCode::Validation,
            OrmError::FinalValidation { .. } => OrmErrorCode::FinalValidation,
            OrmError::Store(_) => OrmErrorCode::Store,
            OrmError::CommitAnomaly { .. } => OrmErrorCode::CommitAnomaly,
            OrmError::HasDependents { .. } => OrmErrorCode::HasDependents,
            OrmError::DeleteVetoed { .. } => OrmErrorCode::DeleteVetoed,
        }
    }

    pub fn code_str(&self) -> &'static str {
        self.code().as_str()
    }

    /// Structural errors are programming or configuration mistakes and are
    /// never converted into user-facing messages.
    pub fn is_structural(&self) -> bool {
        matches!(
            self.code(),
            OrmErrorCode::InvalidSchema
                | OrmErrorCode::InvalidQuery
                | OrmErrorCode::WrongOwner
                | OrmErrorCode::DuplicateMember
                | OrmErrorCode::Terminated
                | OrmErrorCode::PrimaryKeyWrite
        )
    }

    pub(crate) fn column_not_found(table: &str, column: &str) -> Self {
        OrmError::NotFound {
            resource_type: ResourceType::Column,
            resource_id: format!("{table}.{column}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{OrmError, OrmErrorCode, ResourceType, StoreError};

    #[test]
    fn error_code_strings_are_stable() {
        assert_eq!(OrmErrorCode::ColumnNotFound.as_str(), "column_not_found");
        assert_eq!(OrmErrorCode::HasDependents.as_str(), "has_dependents");
        assert_eq!(OrmErrorCode::PrimaryKeyWrite.as_str(), "primary_key_write");
        assert_eq!(OrmErrorCode::InvalidQuery.as_str(), "invalid_query");
    }

    #[test]
    fn error_code_str_matches_variant_mapping() {
        let err = OrmError::NotFound {
            resource_type: ResourceType::Row,
            resource_id: "users.7".into(),
        };
        assert_eq!(err.code(), OrmErrorCode::RowNotFound);
        assert_eq!(err.code_str(), "row_not_found");
        assert!(!err.is_structural());
    }

    #[test]
    fn store_errors_convert_transparently() {
        let err: OrmError = StoreError::Rejected("deadlock".into()).into();
        assert_eq!(err.code(), OrmErrorCode::Store);
        assert_eq!(err.to_string(), "write rejected: deadlock");
    }

    #[test]
    fn dependents_are_listed_in_message() {
        let err = OrmError::HasDependents {
            table: "users".into(),
            key: 3,
            dependents: vec!["orders.user_id".into(), "notes.author_id".into()],
        };
        assert_eq!(
            err.to_string(),
            "row 3 in table 'users' has dependents: orders.user_id, notes.author_id"
        );
    }
}
