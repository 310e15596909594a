use crate::config::{ConnectionConfig, Protocol};
use crate::engine::{CellValue, ColumnMeta, Connector, QueryResult, Session};
use crate::error::McpError;
use crate::masking::scrub;
use chrono::{NaiveDate, NaiveTime};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use secrecy::ExposeSecret;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

const HEADER_USER: &str = "x-trino-user";
const HEADER_CATALOG: &str = "x-trino-catalog";
const HEADER_SCHEMA: &str = "x-trino-schema";
const HEADER_SOURCE: &str = "x-trino-source";
const HEADER_CLIENT_TAGS: &str = "x-trino-client-tags";

/// Delay before re-polling when the coordinator answers 503.
const BUSY_BACKOFF: Duration = Duration::from_millis(100);

/// Opens sessions against a Trino (or Presto) coordinator over its HTTP client protocol.
pub struct TrinoConnector {
    config: Arc<ConnectionConfig>,
}

pub struct TrinoSession {
    client: Client,
    config: Arc<ConnectionConfig>,
    base_url: String,
    server_version: Option<String>,
}

// --- wire types ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryPage {
    pub id: Option<String>,
    pub next_uri: Option<String>,
    pub columns: Option<Vec<WireColumn>>,
    pub data: Option<Vec<Vec<serde_json::Value>>>,
    pub stats: Option<WireStats>,
    pub error: Option<WireError>,
}

#[derive(Debug, Deserialize)]
pub struct WireColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

#[derive(Debug, Deserialize)]
pub struct WireStats {
    pub state: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireError {
    pub message: Option<String>,
    pub error_name: Option<String>,
    pub error_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerInfo {
    node_version: Option<NodeVersion>,
    #[serde(default)]
    starting: bool,
}

#[derive(Debug, Deserialize)]
struct NodeVersion {
    version: Option<String>,
}

impl TrinoConnector {
    pub fn new(config: Arc<ConnectionConfig>) -> Self {
        Self { config }
    }

    /// HTTP client for the configured protocol only.
    fn build_client(&self) -> Result<Client, McpError> {
        let builder = Client::builder()
            .connect_timeout(self.config.connect_timeout())
            .default_headers(session_headers(&self.config)?)
            .user_agent(concat!("trino-mcp/", env!("CARGO_PKG_VERSION")));

        let builder = match self.config.protocol {
            Protocol::Https => builder.https_only(true),
            Protocol::Http => builder,
        };

        builder.build().map_err(|e| McpError::Connection {
            message: format!("cannot build {} client: {}", self.config.protocol, e),
        })
    }
}

impl Connector for TrinoConnector {
    type Session = TrinoSession;

    async fn connect(&self) -> Result<TrinoSession, McpError> {
        let client = self.build_client()?;
        let base_url = self.config.base_url();
        let url = format!("{}/v1/info", base_url);

        tracing::debug!(url = %url, "handshake");
        let resp = client
            .get(&url)
            .basic_auth(&self.config.username, Some(self.config.password.expose_secret()))
            .timeout(self.config.connect_timeout())
            .send()
            .await
            .map_err(|e| transport_error(&self.config, "handshake failed", e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = scrub(&body_text(resp).await, &self.config.password);
            return Err(map_http_error(status, &body));
        }

        let info: ServerInfo = resp.json().await.map_err(|e| McpError::Connection {
            message: format!("invalid handshake response: {}", e),
        })?;
        if info.starting {
            return Err(McpError::Connection {
                message: "coordinator is still starting".to_string(),
            });
        }

        let server_version = info.node_version.and_then(|v| v.version);
        tracing::info!(
            base_url = %base_url,
            version = server_version.as_deref().unwrap_or("unknown"),
            "connected"
        );

        Ok(TrinoSession {
            client,
            config: Arc::clone(&self.config),
            base_url,
            server_version,
        })
    }
}

impl TrinoSession {
    pub fn server_version(&self) -> Option<&str> {
        self.server_version.as_deref()
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.basic_auth(&self.config.username, Some(self.config.password.expose_secret()))
    }

    async fn submit(&self, sql: &str) -> Result<QueryPage, McpError> {
        let url = format!("{}/v1/statement", self.base_url);
        loop {
            let resp = self
                .authorized(self.client.post(&url))
                .header(reqwest::header::CONTENT_TYPE, "text/plain; charset=utf-8")
                .body(sql.to_string())
                .send()
                .await
                .map_err(|e| transport_error(&self.config, "failed to submit statement", e))?;

            if resp.status() == StatusCode::SERVICE_UNAVAILABLE {
                tokio::time::sleep(BUSY_BACKOFF).await;
                continue;
            }
            return self.read_page(resp).await;
        }
    }

    async fn advance(&self, next_uri: &str) -> Result<QueryPage, McpError> {
        loop {
            let resp = self
                .authorized(self.client.get(next_uri))
                .send()
                .await
                .map_err(|e| transport_error(&self.config, "failed to fetch results", e))?;

            if resp.status() == StatusCode::SERVICE_UNAVAILABLE {
                tokio::time::sleep(BUSY_BACKOFF).await;
                continue;
            }
            return self.read_page(resp).await;
        }
    }

    async fn read_page(&self, resp: Response) -> Result<QueryPage, McpError> {
        let status = resp.status();
        if !status.is_success() {
            let body = scrub(&body_text(resp).await, &self.config.password);
            return Err(map_http_error(status, &body));
        }
        resp.json().await.map_err(|e| McpError::Connection {
            message: format!("invalid statement response: {}", e),
        })
    }

    /// Best-effort release of a query we stopped reading.
    async fn abandon(&self, next_uri: &str) {
        if let Err(e) = self.authorized(self.client.delete(next_uri)).send().await {
            tracing::debug!(error = %e, "cancel request failed");
        }
    }
}

impl Session for TrinoSession {
    async fn execute(&self, sql: &str, limit: Option<usize>) -> Result<QueryResult, McpError> {
        let mut page = self.submit(sql).await?;
        let mut columns: Option<Vec<ColumnMeta>> = None;
        let mut rows: Vec<Vec<CellValue>> = Vec::new();
        let mut truncated = false;

        loop {
            if let Some(err) = page.error.take() {
                return Err(engine_error(err));
            }

            if columns.is_none()
                && let Some(wire) = page.columns.take()
            {
                columns = Some(
                    wire.into_iter()
                        .map(|c| ColumnMeta::new(c.name, c.type_name))
                        .collect(),
                );
            }

            if let Some(data) = page.data.take() {
                let cols = columns.as_deref().unwrap_or_default();
                for raw in data {
                    if limit.is_some_and(|lim| rows.len() >= lim) {
                        truncated = true;
                        break;
                    }
                    rows.push(decode_row(cols, raw));
                }
            }

            let limit_reached = limit.is_some_and(|lim| rows.len() >= lim);
            let Some(next_uri) = page.next_uri.take() else {
                break;
            };
            if limit_reached && columns.is_some() {
                tracing::debug!(query_id = page.id.as_deref().unwrap_or("?"), "row limit reached");
                truncated = true;
                self.abandon(&next_uri).await;
                break;
            }
            page = self.advance(&next_uri).await?;
        }

        if let Some(state) = page.stats.as_ref().and_then(|s| s.state.as_deref()) {
            tracing::debug!(state, rows = rows.len(), "statement finished");
        }

        Ok(QueryResult {
            columns: columns.unwrap_or_default(),
            rows,
            truncated,
        })
    }
}

/// Headers bound to every request of a session.
pub fn session_headers(config: &ConnectionConfig) -> Result<HeaderMap, McpError> {
    let mut headers = HeaderMap::new();
    let mut put = |name: &'static str, value: &str| -> Result<(), McpError> {
        let value = HeaderValue::from_str(value).map_err(|_| McpError::Config {
            message: format!("value for {} contains invalid header characters", name),
        })?;
        headers.insert(HeaderName::from_static(name), value);
        Ok(())
    };

    put(HEADER_USER, &config.username)?;
    put(HEADER_CATALOG, &config.catalog)?;
    put(HEADER_SCHEMA, &config.schema)?;
    put(HEADER_SOURCE, &config.source)?;
    if let Some(group) = config.resource_group.as_deref() {
        put(HEADER_CLIENT_TAGS, group)?;
    }
    Ok(headers)
}

fn engine_error(err: WireError) -> McpError {
    let message = err.message.unwrap_or_else(|| "unknown engine error".to_string());
    let message = match err.error_name {
        Some(name) => format!("{} ({})", message, name),
        None => message,
    };
    tracing::debug!(error_type = err.error_type.as_deref().unwrap_or("?"), "engine rejected statement");
    McpError::QueryExecution { message }
}

fn transport_error(config: &ConnectionConfig, context: &str, e: reqwest::Error) -> McpError {
    let detail = if e.is_timeout() {
        format!("timed out after {}s", config.connect_timeout_secs)
    } else {
        scrub(&e.to_string(), &config.password)
    };
    McpError::Connection {
        message: format!("{} ({}): {}", context, config.base_url(), detail),
    }
}

async fn body_text(resp: Response) -> String {
    resp.text().await.unwrap_or_default().trim().to_string()
}

/// Map a non-success HTTP status to an error kind.
pub fn map_http_error(status: StatusCode, body: &str) -> McpError {
    let detail = if body.is_empty() {
        String::new()
    } else {
        format!(": {}", body)
    };
    match status.as_u16() {
        401 => McpError::Connection {
            message: format!("authentication failed: credentials rejected{}", detail),
        },
        403 => McpError::Connection {
            message: format!("access denied{}", detail),
        },
        404 => McpError::QueryExecution {
            message: format!("query no longer exists on the coordinator{}", detail),
        },
        400 | 405..=499 => McpError::QueryExecution {
            message: format!("request rejected (HTTP {}){}", status.as_u16(), detail),
        },
        _ => McpError::Connection {
            message: format!("HTTP error: {}{}", status.as_u16(), detail),
        },
    }
}

fn decode_row(columns: &[ColumnMeta], raw: Vec<serde_json::Value>) -> Vec<CellValue> {
    let mut raw = raw.into_iter();
    if columns.is_empty() {
        return raw.map(|v| decode_cell("", v)).collect();
    }
    columns
        .iter()
        .map(|col| decode_cell(&col.type_name, raw.next().unwrap_or(serde_json::Value::Null)))
        .collect()
}

/// Coerce one wire value into a transport-safe cell, guided by the declared type.
pub fn decode_cell(type_name: &str, value: serde_json::Value) -> CellValue {
    use serde_json::Value;

    let normalized = type_name.trim().to_ascii_lowercase();
    let base = match normalized.find('(') {
        Some(pos) => normalized[..pos].trim(),
        None => normalized.as_str(),
    };

    match value {
        Value::Null => CellValue::Null,
        Value::Bool(b) => CellValue::Bool(b),
        Value::Number(n) => match base {
            "real" | "double" => n.as_f64().map(CellValue::Float).unwrap_or(CellValue::Null),
            "decimal" => CellValue::Text(n.to_string()),
            _ => n
                .as_i64()
                .map(CellValue::Int)
                .or_else(|| n.as_f64().map(CellValue::Float))
                .unwrap_or_else(|| CellValue::Text(n.to_string())),
        },
        Value::String(s) => {
            if base.starts_with("timestamp") {
                CellValue::Text(iso_timestamp(&s))
            } else {
                CellValue::Text(s)
            }
        }
        other @ (Value::Array(_) | Value::Object(_)) => CellValue::Text(other.to_string()),
    }
}

/// Render `YYYY-MM-DD HH:MM:SS[.fff][ zone]` as ISO-8601.
///
/// Named zones other than UTC are kept as an RFC 9557 `[Zone]` suffix.
/// Anything unrecognised is returned as-is.
pub fn iso_timestamp(raw: &str) -> String {
    let mut parts = raw.splitn(3, ' ');
    let (Some(date), Some(time)) = (parts.next(), parts.next()) else {
        return raw.to_string();
    };
    if NaiveDate::parse_from_str(date, "%Y-%m-%d").is_err()
        || NaiveTime::parse_from_str(time, "%H:%M:%S%.f").is_err()
    {
        return raw.to_string();
    }

    let zone = match parts.next() {
        None => String::new(),
        Some("UTC") | Some("Z") => "Z".to_string(),
        Some(offset) if offset.starts_with('+') || offset.starts_with('-') => offset.to_string(),
        Some(named) => format!("[{}]", named),
    };
    format!("{}T{}{}", date, time, zone)
}
