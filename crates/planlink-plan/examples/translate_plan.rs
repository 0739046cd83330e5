//! Translate a serialized plan and run it on the in-memory backend.
//!
//! Run with: RUST_LOG=debug cargo run --example translate_plan

use planlink_expr::{Backend, DataType, Field, Schema};
use planlink_mem::{DataTable, MemBackend};
use planlink_plan::{translate, PlanSource};
use serde_json::json;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // "sort by ints, take the first 2 rows", as the source engine
    // serializes it
    let plan = json!({
        "Slice": {
            "input": {
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
                    "by_column": [{"Column": "ints"}],
                    "slice": null,
                    "sort_options": {
                        "descending": [false],
                        "nulls_last": [false],
                        "multithreaded": true,
                        "maintain_order": false,
                        "limit": null
                    }
                }
            },
            "offset": 0,
            "len": 2
        }
    });

    let source = match PlanSource::from_json(&plan.to_string()) {
        Ok(source) => source.with_source_version("1.9.0"),
        Err(e) => {
            eprintln!("Failed to decode plan: {}", e);
            return;
        }
    };
    println!("Plan fingerprint: {}", source.fingerprint());

    let expr = match translate(&source, "frame") {
        Ok(expr) => expr,
        Err(e) => {
            eprintln!("Translation failed: {}", e);
            return;
        }
    };
    println!("Target expression: {}", expr);

    let table = DataTable::from_columns(
        Schema::new(vec![
            Field::new("ints", DataType::Int64),
            Field::new("floats", DataType::Float64),
        ]),
        vec![
            vec![json!(3), json!(1), json!(4), json!(2)],
            vec![json!(0.3), json!(0.1), json!(0.4), json!(0.2)],
        ],
    )
    .expect("fixture columns are well formed");

    let mut backend = MemBackend::new();
    backend.register("frame", table);

    match backend.execute(&expr) {
        Ok(result) => {
            println!("Columns: {:?}", result.columns);
            for row in &result.rows {
                println!("  {:?}", row);
            }
        }
        Err(e) => eprintln!("Execution failed: {}", e),
    }
}
