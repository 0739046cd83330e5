//! End-to-end tests: serialized plan → translation → in-memory execution
//!
//! The plan documents here are hand-built in the exact shape the source
//! engine serializes, so the translator is exercised against the external
//! format rather than against internal constructors.

use planlink_expr::{Backend, DataType, Field, Schema, TableExpr};
use planlink_mem::{DataTable, ExecutionError, MemBackend};
use planlink_plan::{translate, PlanSource};
use serde_json::{json, Value};

/// Base-relation node over the reference table
/// { ints, floats, strings, bools }
fn scan() -> Value {
    json!({
        "DataFrameScan": {
            "df": {"columns": []},
            "schema": {
                "fields": {
                    "ints": "Int64",
                    "floats": "Float64",
                    "strings": "String",
                    "bools": "Boolean"
                }
            },
            "output_schema": null,
            "projection": null,
            "selection": null
        }
    })
}

fn slice(input: Value, offset: i64, len: u64) -> Value {
    json!({"Slice": {"input": input, "offset": offset, "len": len}})
}

fn sort(input: Value, columns: &[&str]) -> Value {
    let by_column: Vec<Value> = columns.iter().map(|c| json!({"Column": c})).collect();
    let n = columns.len();
    json!({
        "Sort": {
            "input": input,
            "by_column": by_column,
            "slice": null,
            "sort_options": {
                "descending": vec![false; n],
                "nulls_last": vec![false; n],
                "multithreaded": true,
                "maintain_order": false,
                "limit": null
            }
        }
    })
}

fn stats(input: Value, kind: &str) -> Value {
    json!({"MapFunction": {"input": input, "function": {"Stats": kind}}})
}

fn source(root: Value) -> PlanSource {
    PlanSource::from_json(&root.to_string()).expect("plan document should decode")
}

fn fixture_schema() -> Schema {
    Schema::new(vec![
        Field::new("ints", DataType::Int64),
        Field::new("floats", DataType::Float64),
        Field::new("strings", DataType::String),
        Field::new("bools", DataType::Boolean),
    ])
}

/// Reference data registered in shuffled row order, so ordering results
/// come from the translated expression and not from insertion order.
fn backend() -> MemBackend {
    let table = DataTable::from_columns(
        fixture_schema(),
        vec![
            vec![json!(3), json!(1), json!(4), json!(2)],
            vec![json!(0.3), json!(0.1), json!(0.4), json!(0.2)],
            vec![json!("c"), json!("a"), json!("d"), json!("b")],
            vec![json!(false), json!(true), json!(false), json!(true)],
        ],
    )
    .unwrap();

    let mut backend = MemBackend::new();
    backend.register("frame", table);
    backend
}

#[test]
fn test_base_scan_round_trip_counts() {
    let expr = translate(&source(scan()), "frame").unwrap();
    let result = backend().execute(&expr).unwrap();

    assert_eq!(result.row_count, 4);
    assert_eq!(result.columns.len(), 4);
    assert_eq!(result.columns, vec!["ints", "floats", "strings", "bools"]);
}

#[test]
fn test_sort_then_slice_yields_first_two_rows() {
    let plan = slice(sort(scan(), &["ints"]), 0, 2);
    let expr = translate(&source(plan), "frame").unwrap();
    let result = backend().execute(&expr).unwrap();

    assert_eq!(result.row_count, 2);
    assert_eq!(
        result.rows[0],
        vec![json!(1), json!(0.1), json!("a"), json!(true)]
    );
    assert_eq!(
        result.rows[1],
        vec![json!(2), json!(0.2), json!("b"), json!(true)]
    );
}

#[test]
fn test_sort_two_keys_orders_all_rows() {
    let plan = sort(scan(), &["ints", "floats"]);
    let expr = translate(&source(plan), "frame").unwrap();
    let result = backend().execute(&expr).unwrap();

    assert_eq!(result.row_count, 4);
    let ints: Vec<&Value> = result.rows.iter().map(|r| &r[0]).collect();
    assert_eq!(ints, vec![&json!(1), &json!(2), &json!(3), &json!(4)]);
    let floats: Vec<&Value> = result.rows.iter().map(|r| &r[1]).collect();
    assert_eq!(
        floats,
        vec![&json!(0.1), &json!(0.2), &json!(0.3), &json!(0.4)]
    );
}

#[test]
fn test_second_sort_key_breaks_ties() {
    let table = DataTable::from_columns(
        Schema::new(vec![
            Field::new("ints", DataType::Int64),
            Field::new("floats", DataType::Float64),
        ]),
        vec![
            vec![json!(1), json!(1), json!(2), json!(2)],
            vec![json!(0.9), json!(0.2), json!(0.8), json!(0.1)],
        ],
    )
    .unwrap();
    let mut backend = MemBackend::new();
    backend.register("frame", table);

    let plan = json!({
        "Sort": {
            "input": {
                "DataFrameScan": {
                    "df": {"columns": []},
                    "schema": {"fields": {"ints": "Int64", "floats": "Float64"}},
                    "output_schema": null,
                    "projection": null,
                    "selection": null
                }
            },
            "by_column": [{"Column": "ints"}, {"Column": "floats"}],
            "slice": null,
            "sort_options": {
                "descending": [false, false],
                "nulls_last": [false, false],
                "multithreaded": true,
                "maintain_order": false,
                "limit": null
            }
        }
    });
    let expr = translate(&source(plan), "frame").unwrap();
    let result = backend.execute(&expr).unwrap();

    let rows: Vec<(&Value, &Value)> = result.rows.iter().map(|r| (&r[0], &r[1])).collect();
    assert_eq!(
        rows,
        vec![
            (&json!(1), &json!(0.2)),
            (&json!(1), &json!(0.9)),
            (&json!(2), &json!(0.1)),
            (&json!(2), &json!(0.8)),
        ]
    );
}

#[test]
fn test_max_yields_single_row_with_unwrapped_names() {
    let expr = translate(&source(stats(scan(), "Max")), "frame").unwrap();
    let result = backend().execute(&expr).unwrap();

    assert_eq!(result.row_count, 1);
    assert_eq!(result.columns, vec!["ints", "floats", "strings", "bools"]);
    assert_eq!(
        result.rows[0],
        vec![json!(4), json!(0.4), json!("d"), json!(true)]
    );
}

#[test]
fn test_min_per_column() {
    let expr = translate(&source(stats(scan(), "Min")), "frame").unwrap();
    let result = backend().execute(&expr).unwrap();

    assert_eq!(result.row_count, 1);
    assert_eq!(
        result.rows[0],
        vec![json!(1), json!(0.1), json!("a"), json!(false)]
    );
}

#[test]
fn test_mean_per_column() {
    let expr = translate(&source(stats(scan(), "Mean")), "frame").unwrap();
    let result = backend().execute(&expr).unwrap();

    assert_eq!(result.row_count, 1);
    // Strings have no mean; booleans average as 0/1
    assert_eq!(
        result.rows[0],
        vec![json!(2.5), json!(0.25), Value::Null, json!(0.5)]
    );
}

#[test]
fn test_records_are_ordered_mappings() {
    let plan = slice(sort(scan(), &["ints"]), 0, 1);
    let expr = translate(&source(plan), "frame").unwrap();
    let result = backend().execute(&expr).unwrap();

    let records = result.records();
    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0],
        vec![
            ("ints".to_string(), json!(1)),
            ("floats".to_string(), json!(0.1)),
            ("strings".to_string(), json!("a")),
            ("bools".to_string(), json!(true)),
        ]
    );
}

#[test]
fn test_schema_mapping_is_idempotent() {
    let a = translate(&source(scan()), "frame").unwrap();
    let b = translate(&source(scan()), "frame").unwrap();
    assert_eq!(a, b);

    match a {
        TableExpr::Table { ref name, ref schema } => {
            assert_eq!(name, "frame");
            assert_eq!(schema, &fixture_schema());
        }
        other => panic!("base plan should translate to an unbound table, got {}", other),
    }
}

#[test]
fn test_table_name_is_the_binding_contract() {
    let expr = translate(&source(scan()), "somewhere_else").unwrap();
    let err = backend().execute(&expr).unwrap_err();
    assert!(matches!(err, ExecutionError::TableNotFound(name) if name == "somewhere_else"));
}

#[test]
fn test_out_of_range_version_still_translates() {
    let source = source(scan()).with_source_version("99.0.0");
    let expr = translate(&source, "frame").unwrap();
    assert_eq!(backend().execute(&expr).unwrap().row_count, 4);
}
