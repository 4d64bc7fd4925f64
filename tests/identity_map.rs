use proptest::prelude::*;
use rowmirror::store::memory::MemoryStore;
use rowmirror::{Column, ColumnKind, OrmConfig, Row, Store, Table, TableSpec, Value, col, lit};
use std::sync::Arc;

fn users(store: &Arc<MemoryStore>, config: &OrmConfig) -> Table {
    let schema = TableSpec::new("users")
        .column(Column::new("id", ColumnKind::Integer))
        .column(Column::new("name", ColumnKind::Text).required())
        .column(Column::new("age", ColumnKind::Integer).default_value(0))
        .build()
        .expect("schema");
    let dyn_store: Arc<dyn Store> = store.clone();
    Table::open(schema, dyn_store, config).expect("table")
}

fn seeded(rows: i64) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.create_table("users", "id");
    for key in 1..=rows {
        store.seed(
            "users",
            key,
            [
                ("name", Value::from(format!("user-{key}"))),
                ("age", Value::Integer(20 + key)),
            ],
        );
    }
    store
}

#[test]
fn repeated_lookups_return_the_same_row_object() {
    let store = seeded(3);
    let table = users(&store, &OrmConfig::default());

    let first = table.row(2).expect("lookup").expect("row");
    let second = table.row(2).expect("lookup").expect("row");
    assert!(Row::ptr_eq(&first, &second));
    assert_eq!(store.calls().fetch_row, 1);

    first.set("name", "renamed").expect("set");
    assert_eq!(second.get("name").expect("name"), Value::from("renamed"));
}

#[test]
fn batch_lookup_fetches_only_missing_keys_once() {
    let store = seeded(6);
    let table = users(&store, &OrmConfig::default());
    let cached = table.row(3).expect("lookup").expect("row");
    store.reset_calls();

    let rows = table.rows([1, 2, 3, 4, 42, 2]).expect("rows");
    assert_eq!(store.calls().fetch_rows, 1);
    assert_eq!(store.fetch_log(), vec![vec![1, 2, 4, 42]]);
    assert_eq!(rows.keys().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
    assert!(Row::ptr_eq(rows.get(3).expect("row 3"), &cached));
    assert!(!table.is_loaded(42));

    store.reset_calls();
    let again = table.rows([1, 2, 3, 4]).expect("rows");
    assert_eq!(store.calls().fetch_rows, 0);
    assert_eq!(again.len(), 4);
}

#[test]
fn large_batch_lookup_is_a_single_fetch() {
    let store = seeded(600);
    let table = users(&store, &OrmConfig::default());

    let rows = table.rows(1..=600).expect("rows");
    assert_eq!(rows.len(), 600);
    assert_eq!(store.calls().fetch_rows, 1);
    assert_eq!(store.fetch_log()[0].len(), 600);
}

#[test]
fn where_lookups_reuse_loaded_rows() {
    let store = seeded(5);
    let table = users(&store, &OrmConfig::default());
    let loaded = table.row(4).expect("lookup").expect("row");
    loaded.set("age", 99).expect("set");

    let rows = table
        .rows_where(&col("age").gte(lit(23)))
        .expect("rows_where");
    assert_eq!(rows.keys().collect::<Vec<_>>(), vec![3, 4, 5]);
    let four = rows.get(4).expect("row 4");
    assert!(Row::ptr_eq(four, &loaded));
    assert_eq!(four.get("age").expect("age"), Value::Integer(99));
    assert_eq!(table.loaded().len(), 3);
}

#[test]
fn where_lookups_reject_unknown_columns() {
    let store = seeded(1);
    let table = users(&store, &OrmConfig::default());
    let err = table
        .rows_where(&col("nickname").eq(lit("x")))
        .expect_err("unknown column");
    assert_eq!(err.code_str(), "column_not_found");
    assert_eq!(store.calls().fetch_where, 0);
}

#[test]
fn unlink_terminates_and_a_new_lookup_builds_a_fresh_row() {
    let store = seeded(2);
    let table = users(&store, &OrmConfig::default());
    let old = table.row(1).expect("lookup").expect("row");
    assert!(table.unlink(1));
    assert!(!table.unlink(1));
    assert!(old.is_terminated());

    let fresh = table.row(1).expect("lookup").expect("row");
    assert!(!Row::ptr_eq(&old, &fresh));
    assert_eq!(fresh.get("name").expect("name"), Value::from("user-1"));
}

#[test]
fn loaded_rows_iterate_in_key_order() {
    let store = seeded(4);
    let table = users(&store, &OrmConfig::default());
    for key in [4, 1, 3] {
        table.row(key).expect("lookup").expect("row");
    }
    let keys: Vec<_> = table.loaded().iter().map(Row::key).collect();
    assert_eq!(keys, vec![1, 3, 4]);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn any_lookup_sequence_keeps_one_object_per_key(
        keys in proptest::collection::vec(1i64..8, 1..24)
    ) {
        let store = seeded(5);
        let table = users(&store, &OrmConfig::default());
        let mut seen: Vec<Row> = Vec::new();
        let mut misses = 0;
        for key in keys {
            let found = table.row(key).expect("lookup");
            prop_assert_eq!(found.is_some(), key <= 5);
            if found.is_none() {
                misses += 1;
            }
            if let Some(row) = found {
                match seen.iter().find(|r| r.key() == key) {
                    Some(previous) => prop_assert!(Row::ptr_eq(previous, &row)),
                    None => seen.push(row),
                }
            }
        }
        prop_assert_eq!(store.calls().fetch_row, seen.len() + misses);
        prop_assert_eq!(table.loaded().len(), seen.len());
    }
}
