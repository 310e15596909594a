//! Line-delimited JSON-RPC 2.0 over stdio, speaking the subset of the Model
//! Context Protocol that IDE assistants use to discover and call tools.

use crate::config::{AppConfig, ConnectionConfig};
use crate::connection::ConnectionManager;
use crate::dispatcher::{
    CommandRequest, DESCRIBE_TABLE, DispatchSettings, Dispatcher, EXECUTE_QUERY, HEALTH_CHECK,
    LIST_TABLES,
};
use crate::engine::Connector;
use crate::engine::trino::TrinoConnector;
use crate::error::McpError;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

pub const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";
pub const SERVER_NAME: &str = "trino-mcp";

const PARSE_ERROR: i64 = -32700;
const INVALID_REQUEST: i64 = -32600;
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;

/// The engine target advertised as an MCP resource. Never carries credentials.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceInfo {
    pub uri: String,
    pub host: String,
    pub port: u16,
    pub catalog: String,
    pub schema: String,
}

impl ResourceInfo {
    pub fn from_config(config: &ConnectionConfig) -> Self {
        Self {
            uri: format!("trino://{}:{}/{}", config.host, config.port, config.schema),
            host: config.host.clone(),
            port: config.port,
            catalog: config.catalog.clone(),
            schema: config.schema.clone(),
        }
    }

    fn describe(&self) -> Value {
        json!({
            "uri": self.uri,
            "name": format!("Trino Database ({})", self.schema),
            "description": "Trino SQL database connection",
            "mimeType": "application/json",
        })
    }

    fn contents(&self) -> Value {
        json!({
            "host": self.host,
            "port": self.port,
            "catalog": self.catalog,
            "schema": self.schema,
        })
    }
}

pub struct McpServer<C: Connector> {
    dispatcher: Dispatcher<C>,
    resource: ResourceInfo,
}

impl McpServer<TrinoConnector> {
    /// Wire a server against the configured coordinator. Nothing connects
    /// until the first command that needs the engine.
    pub fn from_config(app_config: AppConfig) -> Self {
        let settings = DispatchSettings::from_config(&app_config);
        let connection = Arc::new(app_config.connection);
        let resource = ResourceInfo::from_config(&connection);
        let manager = Arc::new(ConnectionManager::new(
            TrinoConnector::new(Arc::clone(&connection)),
            connection.connect_timeout(),
        ));
        Self::new(Dispatcher::new(manager, settings), resource)
    }
}

impl<C: Connector> McpServer<C> {
    pub fn new(dispatcher: Dispatcher<C>, resource: ResourceInfo) -> Self {
        Self {
            dispatcher,
            resource,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher<C> {
        &self.dispatcher
    }

    /// Serve until the reader hits EOF. Messages are handled one at a time.
    ///
    /// A frame that is not valid UTF-8 gets a parse error; only I/O failures
    /// on the streams themselves end the loop.
    pub async fn serve<R, W>(&self, mut reader: R, mut writer: W) -> Result<(), McpError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut frame = Vec::new();
        loop {
            frame.clear();
            if reader.read_until(b'\n', &mut frame).await? == 0 {
                break;
            }
            let response = match std::str::from_utf8(&frame) {
                Ok(line) if line.trim().is_empty() => continue,
                Ok(line) => self.handle_line(line.trim()).await,
                Err(e) => {
                    tracing::warn!(error = %e, "frame is not valid UTF-8");
                    Some(error_response(
                        Value::Null,
                        PARSE_ERROR,
                        &format!("parse error: {}", e),
                    ))
                }
            };
            if let Some(response) = response {
                let mut out = serde_json::to_vec(&response).map_err(|e| McpError::Protocol {
                    message: format!("cannot serialize response: {}", e),
                })?;
                out.push(b'\n');
                writer.write_all(&out).await?;
                writer.flush().await?;
            }
        }
        tracing::info!("input closed, shutting down");
        Ok(())
    }

    /// Handle one raw frame. Returns `None` for notifications.
    pub async fn handle_line(&self, line: &str) -> Option<Value> {
        let message: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "unparseable frame");
                return Some(error_response(Value::Null, PARSE_ERROR, &format!("parse error: {}", e)));
            }
        };
        self.handle_message(message).await
    }

    pub async fn handle_message(&self, message: Value) -> Option<Value> {
        let Value::Object(mut message) = message else {
            return Some(error_response(Value::Null, INVALID_REQUEST, "request must be an object"));
        };

        let id = message.remove("id");
        let Some(method) = message.get("method").and_then(Value::as_str).map(str::to_string)
        else {
            // Responses to server-initiated requests; this server never sends any.
            return id.map(|id| error_response(id, INVALID_REQUEST, "missing method"));
        };
        let params = match message.remove("params") {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };

        let Some(id) = id else {
            tracing::debug!(method = %method, "notification");
            return None;
        };

        tracing::debug!(method = %method, "request");
        let outcome = match method.as_str() {
            "initialize" => Ok(self.initialize(&params)),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": tool_definitions() })),
            "tools/call" => self.call_tool(params).await,
            "resources/list" => Ok(json!({ "resources": [self.resource.describe()] })),
            "resources/read" => self.read_resource(&params),
            other => Err((METHOD_NOT_FOUND, format!("method not found: {}", other))),
        };

        Some(match outcome {
            Ok(result) => json!({ "jsonrpc": "2.0", "id": id, "result": result }),
            Err((code, message)) => error_response(id, code, &message),
        })
    }

    fn initialize(&self, params: &Map<String, Value>) -> Value {
        let version = params
            .get("protocolVersion")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_PROTOCOL_VERSION);
        json!({
            "protocolVersion": version,
            "capabilities": {
                "tools": { "listChanged": false },
                "resources": { "listChanged": false },
            },
            "serverInfo": {
                "name": SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION"),
            },
        })
    }

    async fn call_tool(&self, mut params: Map<String, Value>) -> Result<Value, (i64, String)> {
        let Some(Value::String(name)) = params.remove("name") else {
            return Err((INVALID_PARAMS, "tools/call requires a tool name".to_string()));
        };
        let arguments = match params.remove("arguments") {
            Some(Value::Object(args)) => unwrap_params(args),
            None | Some(Value::Null) => Map::new(),
            Some(_) => {
                return Err((INVALID_PARAMS, "tool arguments must be an object".to_string()));
            }
        };

        let response = self
            .dispatcher
            .dispatch(&CommandRequest::new(name, arguments))
            .await;
        let envelope = response.to_json();
        Ok(json!({
            "content": [{ "type": "text", "text": envelope.to_string() }],
            "isError": !response.is_ok(),
        }))
    }

    fn read_resource(&self, params: &Map<String, Value>) -> Result<Value, (i64, String)> {
        let uri = params.get("uri").and_then(Value::as_str).unwrap_or_default();
        if uri != self.resource.uri {
            return Err((INVALID_PARAMS, format!("unknown resource: {}", uri)));
        }
        Ok(json!({
            "contents": [{
                "uri": self.resource.uri,
                "mimeType": "application/json",
                "text": self.resource.contents().to_string(),
            }]
        }))
    }
}

/// Accept arguments either flat or nested under a single `params` object.
fn unwrap_params(mut args: Map<String, Value>) -> Map<String, Value> {
    match args.remove("params") {
        Some(Value::Object(mut nested)) => {
            for (key, value) in args {
                nested.entry(key).or_insert(value);
            }
            nested
        }
        Some(other) => {
            args.insert("params".to_string(), other);
            args
        }
        None => args,
    }
}

fn error_response(id: Value, code: i64, message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": code, "message": message },
    })
}

/// Tool catalogue advertised through `tools/list`.
pub fn tool_definitions() -> Vec<Value> {
    let schema_prop = json!({
        "type": "string",
        "description": "Schema to inspect (defaults to the configured schema)",
    });
    vec![
        json!({
            "name": EXECUTE_QUERY,
            "description": "Execute SQL Query",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "SQL statement to execute" },
                    "limit": { "type": "integer", "minimum": 0, "description": "Maximum rows to return" },
                },
                "required": ["query"],
            },
            "annotations": { "title": "Execute SQL Query", "readOnlyHint": true },
        }),
        json!({
            "name": LIST_TABLES,
            "description": "List Database Tables",
            "inputSchema": {
                "type": "object",
                "properties": { "schema": schema_prop },
            },
            "annotations": { "title": "List Database Tables", "readOnlyHint": true },
        }),
        json!({
            "name": DESCRIBE_TABLE,
            "description": "Describe Table Structure",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "table": { "type": "string", "description": "Table name" },
                    "schema": schema_prop,
                },
                "required": ["table"],
            },
            "annotations": { "title": "Describe Table Structure", "readOnlyHint": true },
        }),
        json!({
            "name": HEALTH_CHECK,
            "description": "Health Check",
            "inputSchema": { "type": "object", "properties": {} },
            "annotations": { "title": "Health Check", "readOnlyHint": true },
        }),
    ]
}
