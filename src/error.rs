use thiserror::Error;

#[derive(Debug, Error)]
pub enum McpError {
    #[error("config: {message}")]
    Config { message: String },

    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("connection: {message}")]
    Connection { message: String },

    #[error("timeout: query timed out after {seconds}s")]
    QueryTimeout { seconds: u64 },

    #[error("query: {message}")]
    QueryExecution { message: String },

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol: {message}")]
    Protocol { message: String },
}

impl McpError {
    /// Stable error kind reported in command responses.
    pub fn kind(&self) -> &'static str {
        match self {
            McpError::Config { .. } => "ConfigurationError",
            McpError::InvalidRequest { .. } => "InvalidRequest",
            McpError::Connection { .. } => "ConnectionError",
            McpError::QueryTimeout { .. } => "QueryTimeoutError",
            McpError::QueryExecution { .. } => "QueryExecutionError",
            McpError::Io(_) => "IoError",
            McpError::Protocol { .. } => "ProtocolError",
        }
    }

    /// Message without the category prefix used by `Display`.
    pub fn message(&self) -> String {
        match self {
            McpError::Config { message }
            | McpError::InvalidRequest { message }
            | McpError::Connection { message }
            | McpError::QueryExecution { message }
            | McpError::Protocol { message } => message.clone(),
            McpError::QueryTimeout { seconds } => format!("query timed out after {seconds}s"),
            McpError::Io(e) => e.to_string(),
        }
    }

    /// Whether the session that produced this error should be discarded.
    pub fn breaks_session(&self) -> bool {
        matches!(self, McpError::Connection { .. } | McpError::QueryTimeout { .. })
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        McpError::InvalidRequest { message: message.into() }
    }
}
