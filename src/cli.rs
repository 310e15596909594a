use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Default)]
#[command(
    name = "trino-mcp",
    version,
    about = "MCP stdio server for Trino/Presto queries"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short = 'c', long, env = "TRINO_MCP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Config file profile name
    #[arg(short = 'P', long, env = "TRINO_MCP_PROFILE")]
    pub profile: Option<String>,

    /// Coordinator host (default: localhost)
    #[arg(long, env = "TRINO_MCP_HOST")]
    pub host: Option<String>,

    /// Coordinator port (default: 8080)
    #[arg(long, env = "TRINO_MCP_PORT")]
    pub port: Option<u16>,

    /// Protocol: http or https (default: https)
    #[arg(long, env = "TRINO_MCP_PROTOCOL")]
    pub protocol: Option<String>,

    /// Username (required)
    #[arg(short = 'u', long, env = "TRINO_MCP_USERNAME")]
    pub username: Option<String>,

    /// Password (required)
    #[arg(short = 'p', long, env = "TRINO_MCP_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Catalog (default: hive)
    #[arg(long, env = "TRINO_MCP_CATALOG")]
    pub catalog: Option<String>,

    /// Schema (default: default)
    #[arg(short = 's', long, env = "TRINO_MCP_SCHEMA")]
    pub schema: Option<String>,

    /// Source identifier shown in the engine UI; `{username}` is substituted
    #[arg(long, env = "TRINO_MCP_SOURCE")]
    pub source: Option<String>,

    /// Resource group (sent as a client tag)
    #[arg(long = "resource-group", env = "TRINO_MCP_RESOURCE_GROUP")]
    pub resource_group: Option<String>,

    /// Connection timeout in seconds (default: 10)
    #[arg(long = "connect-timeout", env = "TRINO_MCP_CONNECT_TIMEOUT")]
    pub connect_timeout: Option<u64>,

    /// Query timeout in seconds (default: 300)
    #[arg(long = "query-timeout", env = "TRINO_MCP_QUERY_TIMEOUT")]
    pub query_timeout: Option<u64>,

    /// Row limit applied when execute-query has no limit (default: none)
    #[arg(short = 'l', long = "row-limit", env = "TRINO_MCP_ROW_LIMIT")]
    pub row_limit: Option<usize>,

    /// Emit resolved configuration and timings to stderr
    #[arg(short = 'v', long, env = "TRINO_MCP_VERBOSE")]
    pub verbose: bool,

    /// Emit debug diagnostics to stderr
    #[arg(long, env = "TRINO_MCP_DEBUG")]
    pub debug: bool,
}
