use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use trino_mcp::connection::ConnectionManager;
use trino_mcp::dispatcher::{DispatchSettings, Dispatcher};
use trino_mcp::engine::{CellValue, ColumnMeta, Connector, QueryResult, Session};
use trino_mcp::error::McpError;

/// What the fake engine does with a statement.
pub enum Reply {
    Rows(QueryResult),
    EngineError(String),
    TransportError(String),
    Hang,
}

type Handler = dyn Fn(&str) -> Reply + Send + Sync;

/// Shared, inspectable state of the fake engine.
pub struct FakeEngine {
    pub connects: AtomicUsize,
    pub executed: Mutex<Vec<String>>,
    pub refuse_connections: AtomicBool,
    pub connect_delay: Mutex<Duration>,
    handler: Box<Handler>,
}

impl FakeEngine {
    pub fn new(handler: impl Fn(&str) -> Reply + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            connects: AtomicUsize::new(0),
            executed: Mutex::new(Vec::new()),
            refuse_connections: AtomicBool::new(false),
            connect_delay: Mutex::new(Duration::ZERO),
            handler: Box::new(handler),
        })
    }

    /// Engine answering every statement with `rows` integer rows.
    pub fn with_rows(rows: usize) -> Arc<Self> {
        Self::new(move |_| Reply::Rows(numbered(rows)))
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    pub fn refuse(&self, refuse: bool) {
        self.refuse_connections.store(refuse, Ordering::SeqCst);
    }
}

pub struct FakeConnector {
    pub engine: Arc<FakeEngine>,
}

pub struct FakeSession {
    engine: Arc<FakeEngine>,
}

impl Connector for FakeConnector {
    type Session = FakeSession;

    async fn connect(&self) -> Result<FakeSession, McpError> {
        self.engine.connects.fetch_add(1, Ordering::SeqCst);
        let delay = *self.engine.connect_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.engine.refuse_connections.load(Ordering::SeqCst) {
            return Err(McpError::Connection {
                message: "connection refused".to_string(),
            });
        }
        Ok(FakeSession {
            engine: Arc::clone(&self.engine),
        })
    }
}

impl Session for FakeSession {
    async fn execute(&self, sql: &str, limit: Option<usize>) -> Result<QueryResult, McpError> {
        self.engine.executed.lock().unwrap().push(sql.to_string());
        match (self.engine.handler)(sql) {
            Reply::Rows(mut result) => {
                if let Some(lim) = limit
                    && result.rows.len() > lim
                {
                    result.rows.truncate(lim);
                    result.truncated = true;
                }
                Ok(result)
            }
            Reply::EngineError(message) => Err(McpError::QueryExecution { message }),
            Reply::TransportError(message) => Err(McpError::Connection { message }),
            Reply::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(QueryResult::default())
            }
        }
    }
}

/// `n` rows of `(id BIGINT, label VARCHAR)`.
pub fn numbered(n: usize) -> QueryResult {
    QueryResult {
        columns: vec![
            ColumnMeta::new("id", "bigint"),
            ColumnMeta::new("label", "varchar"),
        ],
        rows: (0..n)
            .map(|i| vec![CellValue::Int(i as i64), CellValue::Text(format!("row-{}", i))])
            .collect(),
        truncated: false,
    }
}

pub fn settings() -> DispatchSettings {
    DispatchSettings {
        default_schema: "default".to_string(),
        default_row_limit: None,
        query_timeout: Duration::from_secs(5),
    }
}

pub fn manager(engine: &Arc<FakeEngine>) -> Arc<ConnectionManager<FakeConnector>> {
    Arc::new(ConnectionManager::new(
        FakeConnector {
            engine: Arc::clone(engine),
        },
        Duration::from_secs(2),
    ))
}

pub fn dispatcher(engine: &Arc<FakeEngine>) -> Dispatcher<FakeConnector> {
    Dispatcher::new(manager(engine), settings())
}

pub fn params(pairs: &[(&str, serde_json::Value)]) -> serde_json::Map<String, serde_json::Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}
