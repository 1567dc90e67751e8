//! Cube registry loading and structural validation.

use std::fs;

use strata::{compile, CubeRegistry, StrataError};

const ORDERS_YML: &str = r#"
name: Orders
table: public.orders
measures:
  count:
    aggregation: count
dimensions:
  status:
    sql: status
    value_type: string
joins:
  - cube: Users
    keys:
      - left: user_id
        right: id
"#;

const USERS_YML: &str = r#"
name: Users
table: public.users
dimensions:
  country:
    sql: country
    value_type: string
"#;

#[test]
fn loads_cubes_from_directory_and_compiles() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("orders.yml"), ORDERS_YML).unwrap();
    fs::write(dir.path().join("users.yaml"), USERS_YML).unwrap();

    let registry = CubeRegistry::load_from_dir(dir.path()).unwrap();
    assert!(registry.get("Orders").is_some());
    assert!(registry.get("Users").is_some());

    let query = serde_json::from_value(serde_json::json!({
        "measures": ["Orders.count"],
        "dimensions": ["Users.country"]
    }))
    .unwrap();
    let compiled = compile(&registry, &query, "postgres").unwrap();
    assert!(compiled.sql.contains("LEFT JOIN \"public\".\"users\""));
}

#[test]
fn missing_directory_is_a_schema_error() {
    let err = CubeRegistry::load_from_dir("/nonexistent/cubes").unwrap_err();
    assert!(matches!(err, StrataError::Schema(_)));
}

#[test]
fn malformed_yaml_is_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("bad.yml"), "name: [unclosed").unwrap();
    let err = CubeRegistry::load_from_dir(dir.path()).unwrap_err();
    assert!(matches!(err, StrataError::Yaml(_)));
}

#[test]
fn join_to_unknown_cube_fails_validation() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("orders.yml"), ORDERS_YML).unwrap();
    // Users never defined: Orders declares a join to it
    let err = CubeRegistry::load_from_dir(dir.path()).unwrap_err();
    assert!(matches!(err, StrataError::Schema(_)));
}

#[test]
fn non_count_measure_without_sql_fails_validation() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("orders.yml"),
        r#"
name: Orders
table: orders
measures:
  revenue:
    aggregation: sum
"#,
    )
    .unwrap();
    let err = CubeRegistry::load_from_dir(dir.path()).unwrap_err();
    assert!(matches!(err, StrataError::Schema(_)));
}
