use rowmirror::store::memory::MemoryStore;
use rowmirror::{Column, ColumnKind, OrmConfig, OrmErrorCode, Store, Table, TableSpec, Value};
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

fn write_config(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(json.as_bytes()).expect("write");
    file
}

fn notes_table(config: &OrmConfig) -> Result<Table, rowmirror::OrmError> {
    let store = Arc::new(MemoryStore::new());
    store.create_table("notes", "id");
    store.seed("notes", 1, [("title", Value::from("first")), ("body", Value::from("x"))]);
    let schema = TableSpec::new("notes")
        .column(Column::new("id", ColumnKind::Integer))
        .column(Column::new("title", ColumnKind::Text).required())
        .column(Column::new("body", ColumnKind::Text).required())
        .build()
        .expect("schema");
    let dyn_store: Arc<dyn Store> = store;
    Table::open(schema, dyn_store, config)
}

#[test]
fn layered_settings_come_from_a_file() {
    let file = write_config(
        r#"{
            "strict": true,
            "trim_on_set": true,
            "tables": {
                "notes": {
                    "strict": false,
                    "columns": {
                        "body": { "trim_on_set": false, "trim_required": false }
                    }
                }
            }
        }"#,
    );
    let config = OrmConfig::load(file.path()).expect("load");
    assert!(config.strict);
    assert!(config.table_settings("other").strict);

    let table = notes_table(&config).expect("table");
    assert!(!table.settings().strict);
    let row = table.row(1).expect("lookup").expect("row");

    row.set("title", "  padded  ").expect("set");
    assert_eq!(row.get("title").expect("title"), Value::from("padded"));
    row.set("body", "  kept  ").expect("set");
    assert_eq!(row.get("body").expect("body"), Value::from("  kept  "));

    row.set("body", "   ").expect("set");
    assert!(row.validate_cell("body").expect("validate").is_ok());
    row.set("title", "   ").expect("set");
    assert!(row.validate_cell("title").expect("validate").is_err());
}

#[test]
fn malformed_files_are_rejected() {
    let file = write_config(r#"{ "strict": "yes" }"#);
    let err = OrmConfig::load(file.path()).expect_err("bad type");
    assert_eq!(err.code(), OrmErrorCode::Decode);

    let file = write_config(r#"{ "batch_fetch_limit": 0 }"#);
    let err = OrmConfig::load(file.path()).expect_err("zero batch");
    assert_eq!(err.code(), OrmErrorCode::InvalidConfig);

    let missing = tempfile::tempdir().expect("dir").path().join("absent.json");
    assert!(OrmConfig::load(&missing).is_err());
}

#[test]
fn column_sections_must_name_real_columns() {
    let config = OrmConfig::from_json_str(
        r#"{ "tables": { "notes": { "columns": { "summary": { "trim_on_set": true } } } } }"#,
    )
    .expect("config");
    let err = notes_table(&config).expect_err("unknown column");
    assert_eq!(err.code(), OrmErrorCode::ColumnNotFound);
}
