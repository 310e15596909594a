use crate::engine::{CellValue, QueryResult};
use serde::Serialize;
use serde_json::Value;

/// Transport shape of a tabular result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub row_count: usize,
}

/// Convert a QueryResult into its transport structure, preserving column and row order.
pub fn encode(result: &QueryResult) -> EncodedResult {
    let width = result.columns.len();
    let rows: Vec<Vec<Value>> = result
        .rows
        .iter()
        .map(|row| {
            debug_assert!(width == 0 || row.len() == width, "row width mismatch");
            row.iter().map(cell_to_json).collect()
        })
        .collect();

    EncodedResult {
        columns: result.columns.iter().map(|c| c.name.clone()).collect(),
        row_count: rows.len(),
        rows,
    }
}

pub fn cell_to_json(cell: &CellValue) -> Value {
    match cell {
        CellValue::Null => Value::Null,
        CellValue::Bool(b) => Value::Bool(*b),
        CellValue::Int(i) => Value::from(*i),
        // NaN and infinities have no JSON number form
        CellValue::Float(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(f.to_string())),
        CellValue::Text(s) => Value::String(s.clone()),
    }
}
