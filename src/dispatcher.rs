//! Command dispatch: name + parameter mapping in, uniform envelope out.
//!
//! Parameters are validated into a typed [`Command`] before the connection is
//! touched, and every engine-layer failure is turned into an `error` envelope
//! here. Nothing below this boundary reaches the transport as a raw error.

use crate::config::AppConfig;
use crate::connection::ConnectionManager;
use crate::encoder::{self, EncodedResult};
use crate::engine::{Connector, QueryResult};
use crate::error::McpError;
use crate::executor;
use crate::verbose::Timer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

pub const EXECUTE_QUERY: &str = "execute-query";
pub const LIST_TABLES: &str = "list-tables";
pub const DESCRIBE_TABLE: &str = "describe-table";
pub const HEALTH_CHECK: &str = "health-check";

/// All command names, in the order tools are advertised.
pub const COMMAND_NAMES: [&str; 4] = [EXECUTE_QUERY, LIST_TABLES, DESCRIBE_TABLE, HEALTH_CHECK];

/// Raw request as received from the transport.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommandRequest {
    pub name: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl CommandRequest {
    pub fn new(name: impl Into<String>, params: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }
}

/// A validated command. Optional schema defaults are resolved by the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    ExecuteQuery { query: String, limit: Option<usize> },
    ListTables { schema: Option<String> },
    DescribeTable { table: String, schema: Option<String> },
    HealthCheck,
}

impl Command {
    pub fn parse(name: &str, params: &Map<String, Value>) -> Result<Self, McpError> {
        match name {
            EXECUTE_QUERY => Ok(Command::ExecuteQuery {
                query: required_str(params, "query")?,
                limit: optional_limit(params, "limit")?,
            }),
            LIST_TABLES => Ok(Command::ListTables {
                schema: optional_str(params, "schema")?,
            }),
            DESCRIBE_TABLE => Ok(Command::DescribeTable {
                table: required_str(params, "table")?,
                schema: optional_str(params, "schema")?,
            }),
            HEALTH_CHECK => Ok(Command::HealthCheck),
            other => Err(McpError::invalid(format!(
                "unknown command '{}' (expected one of: {})",
                other,
                COMMAND_NAMES.join(", ")
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::ExecuteQuery { .. } => EXECUTE_QUERY,
            Command::ListTables { .. } => LIST_TABLES,
            Command::DescribeTable { .. } => DESCRIBE_TABLE,
            Command::HealthCheck => HEALTH_CHECK,
        }
    }
}

fn optional_str(params: &Map<String, Value>, key: &str) -> Result<Option<String>, McpError> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
        Some(_) => Err(McpError::invalid(format!("parameter '{}' must be a string", key))),
    }
}

fn required_str(params: &Map<String, Value>, key: &str) -> Result<String, McpError> {
    optional_str(params, key)?
        .ok_or_else(|| McpError::invalid(format!("missing required parameter '{}'", key)))
}

fn optional_limit(params: &Map<String, Value>, key: &str) -> Result<Option<usize>, McpError> {
    let invalid = || McpError::invalid(format!("parameter '{}' must be a non-negative integer", key));
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|v| usize::try_from(v).ok())
            .map(Some)
            .ok_or_else(invalid),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s.trim().parse::<usize>().map(Some).map_err(|_| invalid()),
        Some(_) => Err(invalid()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthSummary {
    pub healthy: bool,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResponseData {
    Table(EncodedResult),
    Health(HealthSummary),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorDetail {
    pub kind: String,
    pub message: String,
}

/// Uniform success/error envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandResponse {
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ResponseData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

impl CommandResponse {
    pub fn ok(data: ResponseData) -> Self {
        Self {
            status: Status::Ok,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(err: &McpError) -> Self {
        Self {
            status: Status::Error,
            data: None,
            error: Some(ErrorDetail {
                kind: err.kind().to_string(),
                message: err.message(),
            }),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    pub fn error_kind(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.kind.as_str())
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Settings the dispatcher needs from the resolved configuration.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub default_schema: String,
    pub default_row_limit: Option<usize>,
    pub query_timeout: Duration,
}

impl DispatchSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            default_schema: config.connection.schema.clone(),
            default_row_limit: config.default_row_limit,
            query_timeout: config.connection.query_timeout(),
        }
    }
}

pub struct Dispatcher<C: Connector> {
    connections: Arc<ConnectionManager<C>>,
    settings: DispatchSettings,
}

impl<C: Connector> Dispatcher<C> {
    pub fn new(connections: Arc<ConnectionManager<C>>, settings: DispatchSettings) -> Self {
        Self {
            connections,
            settings,
        }
    }

    pub fn connections(&self) -> &ConnectionManager<C> {
        &self.connections
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    /// Validate and run one command. Never fails: errors become envelopes.
    pub async fn dispatch(&self, request: &CommandRequest) -> CommandResponse {
        let command = match Command::parse(&request.name, &request.params) {
            Ok(command) => command,
            Err(e) => {
                tracing::info!(command = %request.name, error = %e, "rejected request");
                return CommandResponse::failure(&e);
            }
        };
        self.run(command).await
    }

    pub async fn run(&self, command: Command) -> CommandResponse {
        let name = command.name();
        let timer = Timer::start();

        let outcome = match command {
            Command::ExecuteQuery { query, limit } => {
                let limit = limit.or(self.settings.default_row_limit);
                self.tabular(&query, limit).await
            }
            Command::ListTables { schema } => {
                let schema = schema.unwrap_or_else(|| self.settings.default_schema.clone());
                self.tabular(&executor::list_tables_sql(&schema), None).await
            }
            Command::DescribeTable { table, schema } => {
                let schema = schema.unwrap_or_else(|| self.settings.default_schema.clone());
                self.tabular(&executor::describe_table_sql(&schema, &table), None)
                    .await
            }
            Command::HealthCheck => self.health().await,
        };

        match outcome {
            Ok(data) => {
                tracing::info!(command = name, elapsed_ms = timer.elapsed_ms() as u64, "ok");
                CommandResponse::ok(data)
            }
            Err(e) => {
                tracing::warn!(command = name, kind = e.kind(), error = %e, "command failed");
                CommandResponse::failure(&e)
            }
        }
    }

    async fn query(&self, sql: &str, limit: Option<usize>) -> Result<QueryResult, McpError> {
        let session = self.connections.acquire().await?;
        let result =
            executor::execute(session.as_ref(), sql, limit, self.settings.query_timeout).await;
        if let Err(e) = &result
            && e.breaks_session()
        {
            self.connections.mark_broken(&session).await;
        }
        result
    }

    async fn tabular(&self, sql: &str, limit: Option<usize>) -> Result<ResponseData, McpError> {
        let result = self.query(sql, limit).await?;
        Ok(ResponseData::Table(encoder::encode(&result)))
    }

    async fn health(&self) -> Result<ResponseData, McpError> {
        let timer = Timer::start();
        self.query(executor::PROBE_SQL, Some(1)).await?;
        Ok(ResponseData::Health(HealthSummary {
            healthy: true,
            detail: format!("engine reachable, round-trip {}ms", timer.elapsed_ms()),
        }))
    }
}
