pub mod catalog;
pub mod cell;
pub mod commit;
pub mod config;
pub mod error;
pub mod hooks;
pub mod labels;
pub mod message;
pub mod permission;
pub mod query;
pub mod row;
pub mod store;
pub mod table;
pub mod validation;

pub use catalog::schema::{Column, CompareOp, Relation, Rule, TableSchema, TableSpec};
pub use catalog::types::{ColumnKind, RowKey, Value};
pub use cell::CellState;
pub use commit::delete::{DeleteOptions, DeleteOutcome};
pub use commit::insert::InsertOutcome;
pub use commit::journal::UndoEntry;
pub use commit::{BatchReport, CommitOutcome, CommitReport, CommitScope};
pub use config::{CommitOptions, OrmConfig};
pub use error::{OrmError, OrmErrorCode, StoreError};
pub use message::{Message, MessageLevel};
pub use query::plan::{Expr, col, lit};
pub use row::Row;
pub use row::collection::RowCollection;
pub use store::{ChangeSet, RowData, Store};
pub use table::{LookupMode, Table};
pub use validation::{Reason, ReasonKind, ValidationReport, Verdict};
