//! Scanning `EXPLAIN` rows into plan records

use qdigest_core::{PlanRecord, QueryResult, Row, SamplingError, Value};

/// Columns every `EXPLAIN` row must carry
pub const REQUIRED_PLAN_COLUMNS: &[&str] = &["id", "rows"];

fn unreadable(column: &str, value: &Value, expected: &str) -> SamplingError {
    SamplingError::Scan {
        column: column.to_string(),
        reason: format!("expected {}, found {}", expected, value.type_name()),
    }
}

/// NULL scans as 0
fn scan_integer(row: &Row, name: &str) -> Result<i64, SamplingError> {
    let value = row.get_by_name(name).ok_or_else(|| SamplingError::Scan {
        column: name.to_string(),
        reason: "column missing from result".to_string(),
    })?;
    match value {
        Value::Null => Ok(0),
        v => v.as_i64().ok_or_else(|| unreadable(name, v, "integer")),
    }
}

fn scan_text(row: &Row, name: &str) -> Result<Option<String>, SamplingError> {
    match row.get_by_name(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bytes(_)) => Err(SamplingError::Scan {
            column: name.to_string(),
            reason: "value is not valid UTF-8".to_string(),
        }),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Ok(Some(other.to_string())),
    }
}

fn scan_float(row: &Row, name: &str) -> Result<Option<f64>, SamplingError> {
    match row.get_by_name(name) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_f64()
            .map(Some)
            .ok_or_else(|| unreadable(name, v, "number")),
    }
}

/// Scan one `EXPLAIN` row
pub fn scan_plan_row(row: &Row) -> Result<PlanRecord, SamplingError> {
    let mut plan = PlanRecord::new(scan_integer(row, "id")?, scan_integer(row, "rows")?);
    plan.select_type = scan_text(row, "select_type")?;
    plan.table = scan_text(row, "table")?;
    plan.partitions = scan_text(row, "partitions")?;
    plan.access_type = scan_text(row, "type")?;
    plan.possible_keys = scan_text(row, "possible_keys")?;
    plan.key = scan_text(row, "key")?;
    plan.key_len = scan_text(row, "key_len")?;
    plan.reference = scan_text(row, "ref")?;
    plan.filtered = scan_float(row, "filtered")?;
    plan.extra = scan_text(row, "extra")?;
    Ok(plan)
}

/// Scan a whole `EXPLAIN` result for `query`
pub fn scan_plan(result: &QueryResult, query: &str) -> Result<Vec<PlanRecord>, SamplingError> {
    if result.is_empty() {
        return Err(SamplingError::EmptyPlan(query.to_string()));
    }
    for required in REQUIRED_PLAN_COLUMNS {
        if !result.columns.iter().any(|c| c.name.eq_ignore_ascii_case(required)) {
            return Err(SamplingError::Scan {
                column: required.to_string(),
                reason: "column missing from result".to_string(),
            });
        }
    }
    result.rows.iter().map(scan_plan_row).collect()
}
