use super::*;
use pretty_assertions::assert_eq;

fn plan_row() -> Row {
    Row::new(
        vec!["ID".to_string(), "rows".to_string(), "Key".to_string()],
        vec![Value::Int64(1), Value::Int64(1), Value::String("PRIMARY".to_string())],
    )
}

#[test]
fn test_get_by_name_ignores_case() {
    let row = plan_row();
    assert_eq!(row.get_by_name("id"), Some(&Value::Int64(1)));
    assert_eq!(row.get_by_name("ROWS"), Some(&Value::Int64(1)));
    assert_eq!(row.get_by_name("key").and_then(|v| v.as_str()), Some("PRIMARY"));
}

#[test]
fn test_get_by_name_missing_column() {
    assert_eq!(plan_row().get_by_name("filtered"), None);
}

#[test]
fn test_as_f64_conversions() {
    assert_eq!(Value::Float64(33.33).as_f64(), Some(33.33));
    assert_eq!(Value::Decimal("100.00".to_string()).as_f64(), Some(100.0));
    assert_eq!(Value::Int64(4).as_f64(), Some(4.0));
    assert_eq!(Value::Null.as_f64(), None);
}
