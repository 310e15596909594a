pub mod trino;

use crate::error::McpError;
use std::future::Future;

/// Metadata for a single result column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMeta {
    pub name: String,
    pub type_name: String,
}

impl ColumnMeta {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// A single transport-safe cell value.
///
/// Dates and timestamps arrive as ISO-8601 `Text`; decimals stay `Text` so no
/// precision is lost on the way out.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

/// The materialized output of a statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<ColumnMeta>,
    pub rows: Vec<Vec<CellValue>>,
    /// Set when the row limit cut the result short.
    pub truncated: bool,
}

impl QueryResult {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// A live session against the engine.
pub trait Session: Send + Sync + 'static {
    /// Run `sql`, pulling rows until the engine is done or `limit` rows are held.
    fn execute(
        &self,
        sql: &str,
        limit: Option<usize>,
    ) -> impl Future<Output = Result<QueryResult, McpError>> + Send;
}

/// Opens sessions. One connector per configured engine.
pub trait Connector: Send + Sync + 'static {
    type Session: Session;

    /// Perform the handshake and return a usable session.
    fn connect(&self) -> impl Future<Output = Result<Self::Session, McpError>> + Send;
}
