use parking_lot::Mutex;
use rowmirror::hooks::{ColumnBehavior, RowHooks};
use rowmirror::store::memory::MemoryStore;
use rowmirror::{
    Column, ColumnKind, CommitOptions, DeleteOptions, DeleteOutcome, InsertOutcome, OrmConfig,
    OrmErrorCode, Row, RowData, Store, StoreError, Table, TableSpec, UndoEntry, Value,
};
use std::sync::Arc;

fn store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.create_table("users", "id");
    store.create_table("orders", "id");
    for key in 1..=3 {
        store.seed("users", key, [("name", Value::from(format!("u{key}")))]);
    }
    store.seed("users", 4, [("name", Value::from("boss")), ("manager_id", Value::Integer(4))]);
    store.seed("users", 5, [("name", Value::from("report")), ("manager_id", Value::Integer(4))]);
    store.seed("orders", 100, [("user_id", Value::Integer(1))]);
    store
}

fn users(store: &Arc<MemoryStore>) -> Table {
    let schema = TableSpec::new("users")
        .column(Column::new("id", ColumnKind::Integer))
        .column(Column::new("name", ColumnKind::Text))
        .column(Column::new("manager_id", ColumnKind::Integer))
        .referenced_by("orders", "user_id")
        .referenced_by("users", "manager_id")
        .build()
        .expect("schema");
    let dyn_store: Arc<dyn Store> = store.clone();
    Table::open(schema, dyn_store, &OrmConfig::default()).expect("table")
}

#[test]
fn rows_with_dependents_are_not_deleted() {
    let store = store();
    let table = users(&store);
    let row = table.row(1).expect("lookup").expect("row");

    let err = table
        .delete(&row, DeleteOptions::default())
        .expect_err("dependents");
    assert_eq!(err.code(), OrmErrorCode::HasDependents);
    assert!(err.to_string().contains("orders.user_id"));
    assert_eq!(store.calls().delete, 0);
    assert!(table.is_loaded(1));
    assert_eq!(row.get("name").expect("still usable"), Value::from("u1"));
}

#[test]
fn delete_unlinks_and_terminates() {
    let store = store();
    let table = users(&store);
    let row = table.row(2).expect("lookup").expect("row");

    let outcome = table.delete(&row, DeleteOptions::default()).expect("delete");
    assert_eq!(outcome, DeleteOutcome::Deleted { affected: 1 });
    assert!(row.is_terminated());
    assert!(!table.is_loaded(2));
    assert!(store.snapshot("users", 2).is_none());
    assert!(table.row(2).expect("lookup").is_none());
    assert_eq!(
        row.set("name", "x").expect_err("terminated").code(),
        OrmErrorCode::Terminated
    );
    assert_eq!(
        table
            .delete(&row, DeleteOptions::default())
            .expect_err("twice")
            .code(),
        OrmErrorCode::Terminated
    );
}

#[test]
fn self_references_can_be_excluded() {
    let store = store();
    let table = users(&store);
    let boss = table.row(4).expect("lookup").expect("row");
    let report = table.row(5).expect("lookup").expect("row");

    let err = table
        .delete(&boss, DeleteOptions::default())
        .expect_err("self and report");
    assert_eq!(err.code(), OrmErrorCode::HasDependents);

    let exclude = DeleteOptions {
        exclude_self_references: true,
        ..DeleteOptions::default()
    };
    let err = table.delete(&boss, exclude).expect_err("report remains");
    assert_eq!(err.code(), OrmErrorCode::HasDependents);

    report.set("manager_id", Value::Null).expect("set");
    report.update_changed().expect("commit");
    assert!(table.delete(&boss, exclude).expect("delete").is_deleted());
}

struct Locked;

impl ColumnBehavior for Locked {
    fn on_delete(&self, _column: &Column, _key: i64, value: &Value) -> Result<(), String> {
        if value == &Value::from("locked") {
            return Err("row is locked".into());
        }
        Ok(())
    }
}

#[test]
fn column_hooks_can_veto_a_delete() {
    let store = store();
    let schema = TableSpec::new("users")
        .column(Column::new("id", ColumnKind::Integer))
        .column(Column::new("name", ColumnKind::Text).behavior(Arc::new(Locked)))
        .build()
        .expect("schema");
    store.seed("users", 9, [("name", Value::from("locked"))]);
    let dyn_store: Arc<dyn Store> = store.clone();
    let table = Table::open(schema, dyn_store, &OrmConfig::default()).expect("table");
    let row = table.row(9).expect("lookup").expect("row");

    let err = table
        .delete(&row, DeleteOptions::default())
        .expect_err("veto");
    assert_eq!(err.code(), OrmErrorCode::DeleteVetoed);
    assert!(!row.is_terminated());

    let outcome = table
        .delete(
            &row,
            DeleteOptions {
                communicate: Some(true),
                ..DeleteOptions::default()
            },
        )
        .expect("communicated");
    let DeleteOutcome::Failed(message) = outcome else {
        panic!("expected a message");
    };
    assert_eq!(message.code, "delete_vetoed");
    assert_eq!(row.messages().len(), 1);
}

#[test]
fn store_rejection_keeps_the_row_linked() {
    let store = store();
    let table = users(&store);
    let row = table.row(3).expect("lookup").expect("row");
    store.fail_next_delete(StoreError::Rejected("locked".into()));

    let err = table
        .delete(&row, DeleteOptions::default())
        .expect_err("rejected");
    assert_eq!(err.code(), OrmErrorCode::Store);
    assert!(table.is_loaded(3));
    assert!(!row.is_terminated());
}

#[derive(Default)]
struct DeletedLog(Mutex<Vec<(String, i64, RowData)>>);

impl RowHooks for DeletedLog {
    fn on_deleted(&self, table: &str, key: i64, values: &RowData) {
        self.0.lock().push((table.to_string(), key, values.clone()));
    }
}

#[test]
fn deletes_fire_hooks_and_can_be_undone() {
    let store = store();
    let log = Arc::new(DeletedLog::default());
    let dyn_store: Arc<dyn Store> = store.clone();
    let schema = TableSpec::new("users")
        .column(Column::new("id", ColumnKind::Integer))
        .column(Column::new("name", ColumnKind::Text))
        .build()
        .expect("schema");
    let table = Table::builder(schema, dyn_store)
        .hooks(log.clone())
        .build()
        .expect("table");
    let row = table.row(2).expect("lookup").expect("row");
    table.delete(&row, DeleteOptions::default()).expect("delete");

    let events = log.0.lock().clone();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].1, 2);
    assert_eq!(events[0].2.get("name"), Some(&Value::from("u2")));

    let entries = table.undo_log();
    assert!(matches!(entries.last(), Some(UndoEntry::Delete { key: 2, .. })));
    assert_eq!(table.undo_last().expect("undo"), Some(1));
    let restored = table.row(2).expect("lookup").expect("row");
    assert_eq!(restored.get("name").expect("name"), Value::from("u2"));
    assert!(!Row::ptr_eq(&restored, &row));
}

#[test]
fn insert_validates_and_links_the_new_row() {
    let store = store();
    let schema = TableSpec::new("users")
        .column(Column::new("id", ColumnKind::Integer))
        .column(Column::new("name", ColumnKind::Text).required().unique())
        .column(Column::new("age", ColumnKind::Integer).default_value(18))
        .build()
        .expect("schema");
    let dyn_store: Arc<dyn Store> = store.clone();
    let table = Table::open(schema, dyn_store, &OrmConfig::default()).expect("table");

    let outcome = table.insert([("name", Value::from("new"))]).expect("insert");
    assert!(outcome.is_inserted());
    let row = outcome.row().expect("inserted").clone();
    assert_eq!(row.key(), 6);
    assert_eq!(row.get("age").expect("age"), Value::Integer(18));
    assert!(!row.is_dirty().expect("clean"));
    let again = table.row(6).expect("lookup").expect("row");
    assert!(Row::ptr_eq(&row, &again));

    let InsertOutcome::Invalid(report) = table.insert([("name", Value::from("u1"))]).expect("insert")
    else {
        panic!("duplicate name must be refused");
    };
    assert!(report.contains("name"));

    let err = table
        .insert_with([("age", Value::Integer(3))], &CommitOptions::strict())
        .expect_err("name required");
    assert_eq!(err.code(), OrmErrorCode::Validation);
    assert_eq!(store.row_count("users"), 6);

    let explicit = table
        .insert([("id", Value::Integer(40)), ("name", Value::from("forty"))])
        .expect("insert");
    assert_eq!(explicit.row().map(Row::key), Some(40));
    assert!(matches!(table.undo_log().last(), Some(UndoEntry::Insert { key: 40, .. })));
    assert_eq!(table.undo_last().expect("undo"), Some(1));
    assert!(!table.is_loaded(40));
    assert!(explicit.row().is_some_and(Row::is_terminated));
}

struct Copyable;

impl ColumnBehavior for Copyable {
    fn on_duplicate(&self, _column: &Column, value: Value) -> Value {
        match value {
            Value::Text(s) => Value::from(format!("{s} (copy)")),
            other => other,
        }
    }
}

#[test]
fn duplicate_runs_column_hooks() {
    let store = store();
    let schema = TableSpec::new("users")
        .column(Column::new("id", ColumnKind::Integer))
        .column(Column::new("name", ColumnKind::Text).behavior(Arc::new(Copyable)))
        .build()
        .expect("schema");
    let dyn_store: Arc<dyn Store> = store.clone();
    let table = Table::open(schema, dyn_store, &OrmConfig::default()).expect("table");
    let source = table.row(3).expect("lookup").expect("row");

    let copy = table.duplicate(&source).expect("duplicate");
    let copy = copy.row().expect("inserted");
    assert_ne!(copy.key(), source.key());
    assert_eq!(copy.get("name").expect("name"), Value::from("u3 (copy)"));
}
