use crate::engine::{QueryResult, Session};
use crate::error::McpError;
use crate::verbose::Timer;
use std::time::Duration;

/// Run `sql` on `session` under a wall-clock ceiling.
///
/// The row limit is pushed down to the session so it stops pulling pages
/// once enough rows are held.
pub async fn execute<S: Session>(
    session: &S,
    sql: &str,
    limit: Option<usize>,
    query_timeout: Duration,
) -> Result<QueryResult, McpError> {
    tracing::debug!(sql, ?limit, "executing query");
    let timer = Timer::start();

    let result = tokio::time::timeout(query_timeout, session.execute(sql, limit))
        .await
        .map_err(|_| McpError::QueryTimeout {
            seconds: query_timeout.as_secs(),
        })??;

    tracing::info!(
        elapsed_ms = timer.elapsed_ms() as u64,
        rows = result.row_count(),
        truncated = result.truncated,
        "query complete"
    );
    Ok(result)
}

/// Quote an identifier, doubling embedded quotes.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quote a possibly qualified name (`catalog.schema`) part by part.
///
/// Parts that already carry surrounding quotes are taken as written.
pub fn quote_qualified(name: &str) -> String {
    split_qualified(name)
        .iter()
        .map(|part| quote_ident(part))
        .collect::<Vec<_>>()
        .join(".")
}

fn split_qualified(name: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = name.trim().chars().peekable();
    let mut quoted = false;

    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => quoted = !quoted,
            '.' if !quoted => parts.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    parts.push(current);
    parts
}

pub fn list_tables_sql(schema: &str) -> String {
    format!("SHOW TABLES FROM {}", quote_qualified(schema))
}

pub fn describe_table_sql(schema: &str, table: &str) -> String {
    format!("DESCRIBE {}.{}", quote_qualified(schema), quote_ident(table))
}

/// Round-trip used by the health probe.
pub const PROBE_SQL: &str = "SELECT 1";
