use crate::cli::Cli;
use crate::engine::trino::session_headers;
use crate::error::McpError;
use crate::masking::REDACTED;
use directories::ProjectDirs;
use secrecy::SecretString;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Placeholder in `source` replaced with the resolved username.
pub const USERNAME_TOKEN: &str = "{username}";

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_CATALOG: &str = "hive";
pub const DEFAULT_SCHEMA: &str = "default";
pub const DEFAULT_SOURCE: &str = "trino-mcp";
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 300;

/// Wire protocol used to reach the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Http,
    Https,
}

impl Protocol {
    pub fn parse(value: &str) -> Result<Self, McpError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(Protocol::Http),
            "https" => Ok(Protocol::Https),
            other => Err(McpError::Config {
                message: format!("unknown protocol: '{}' (expected 'http' or 'https')", other),
            }),
        }
    }

    pub fn scheme(self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scheme())
    }
}

/// Everything needed to open a session against the engine.
#[derive(Debug)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub protocol: Protocol,
    pub username: String,
    pub password: SecretString,
    pub catalog: String,
    pub schema: String,
    pub source: String,
    pub resource_group: Option<String>,
    pub connect_timeout_secs: u64,
    pub query_timeout_secs: u64,
}

impl ConnectionConfig {
    /// Config with defaults for everything but the credentials.
    pub fn new(username: impl Into<String>, password: SecretString) -> Self {
        let username = username.into();
        Self {
            source: render_source(DEFAULT_SOURCE, &username),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            protocol: Protocol::Https,
            username,
            password,
            catalog: DEFAULT_CATALOG.to_string(),
            schema: DEFAULT_SCHEMA.to_string(),
            resource_group: None,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            query_timeout_secs: DEFAULT_QUERY_TIMEOUT_SECS,
        }
    }

    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    /// Human-readable configuration lines. The password is always masked.
    pub fn summary_lines(&self, verbose: bool) -> Vec<String> {
        let mut lines = vec![
            format!("host: {}", self.host),
            format!("port: {}", self.port),
            format!("protocol: {}", self.protocol),
            format!("username: {}", self.username),
            format!("catalog: {}", self.catalog),
            format!("schema: {}", self.schema),
        ];
        if verbose {
            lines.push(format!("connect timeout: {}s", self.connect_timeout_secs));
            lines.push(format!("query timeout: {}s", self.query_timeout_secs));
            lines.push(format!("source: {}", self.source));
            lines.push(format!(
                "resource group: {}",
                self.resource_group.as_deref().unwrap_or("(not set)")
            ));
            lines.push(format!("password: {}", REDACTED));
        }
        lines
    }
}

/// Top-level application configuration.
#[derive(Debug)]
pub struct AppConfig {
    pub connection: ConnectionConfig,
    pub default_row_limit: Option<usize>,
    pub verbose: bool,
    pub debug: bool,
}

/// Render a source template, substituting the username placeholder.
pub fn render_source(template: &str, username: &str) -> String {
    if template.contains(USERNAME_TOKEN) {
        template.replace(USERNAME_TOKEN, username)
    } else {
        template.to_string()
    }
}

// --- TOML config file structs ---

#[derive(Debug, Deserialize, Default)]
struct TomlConfig {
    #[serde(default)]
    defaults: TomlDefaults,
    #[serde(default)]
    profiles: HashMap<String, TomlProfile>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlDefaults {
    row_limit: Option<usize>,
    connect_timeout: Option<u64>,
    query_timeout: Option<u64>,
    verbose: Option<bool>,
}

#[derive(Debug, Deserialize, Default, Clone)]
struct TomlProfile {
    host: Option<String>,
    port: Option<u16>,
    protocol: Option<String>,
    username: Option<String>,
    password: Option<String>,
    password_env: Option<String>,
    catalog: Option<String>,
    schema: Option<String>,
    source: Option<String>,
    resource_group: Option<String>,
    connect_timeout: Option<u64>,
    query_timeout: Option<u64>,
}

struct ResolvedConfigPath {
    path: PathBuf,
    /// true if user explicitly specified via --config or TRINO_MCP_CONFIG
    explicit: bool,
}

/// Resolve the config file path: --config flag > env var > platform default.
fn resolve_config_path(cli_config: Option<&PathBuf>) -> Option<ResolvedConfigPath> {
    if let Some(path) = cli_config {
        return Some(ResolvedConfigPath { path: path.clone(), explicit: true });
    }
    ProjectDirs::from("", "", "trino-mcp").map(|dirs| ResolvedConfigPath {
        path: dirs.config_dir().join("config.toml"),
        explicit: false,
    })
}

fn load_toml_config(resolved: Option<&ResolvedConfigPath>) -> Result<TomlConfig, McpError> {
    let Some(resolved) = resolved else {
        return Ok(TomlConfig::default());
    };

    if !resolved.path.exists() {
        if resolved.explicit {
            return Err(McpError::Config {
                message: format!("config file not found: {}", resolved.path.display()),
            });
        }
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(&resolved.path).map_err(|e| McpError::Config {
        message: format!("cannot read config file {}: {}", resolved.path.display(), e),
    })?;

    toml::from_str(&content).map_err(|e| McpError::Config {
        message: format!("invalid config file {}: {}", resolved.path.display(), e),
    })
}

/// Treat empty strings as absent.
pub fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Password from CLI/env, then the profile's `password_env` indirection, then the profile itself.
fn resolve_password(direct: Option<&str>, profile: &TomlProfile) -> Option<SecretString> {
    if let Some(val) = non_empty(direct) {
        return Some(SecretString::from(val.to_string()));
    }
    if let Some(key) = profile.password_env.as_deref()
        && let Ok(val) = std::env::var(key)
        && !val.is_empty()
    {
        return Some(SecretString::from(val));
    }
    non_empty(profile.password.as_deref()).map(|p| SecretString::from(p.to_string()))
}

fn positive(name: &str, value: u64) -> Result<u64, McpError> {
    if value == 0 {
        return Err(McpError::Config {
            message: format!("{} must be at least 1 second", name),
        });
    }
    Ok(value)
}

/// Build the application config from parsed CLI arguments.
pub fn load(cli: &Cli) -> Result<AppConfig, McpError> {
    let resolved_path = resolve_config_path(cli.config.as_ref());
    let toml_config = load_toml_config(resolved_path.as_ref())?;

    let profile = cli
        .profile
        .as_ref()
        .map(|name| {
            toml_config.profiles.get(name).cloned().ok_or_else(|| McpError::Config {
                message: format!("profile '{}' not found in config file", name),
            })
        })
        .transpose()?
        .unwrap_or_default();

    let username = non_empty(cli.username.as_deref())
        .or(non_empty(profile.username.as_deref()))
        .ok_or_else(|| McpError::Config {
            message: "no username specified; use --username or TRINO_MCP_USERNAME".to_string(),
        })?
        .to_string();

    let password = resolve_password(cli.password.as_deref(), &profile).ok_or_else(|| {
        McpError::Config {
            message: "no password specified; use --password or TRINO_MCP_PASSWORD".to_string(),
        }
    })?;

    let protocol =
        non_empty(cli.protocol.as_deref()).or(non_empty(profile.protocol.as_deref()));
    let protocol = match protocol {
        Some(p) => Protocol::parse(p)?,
        None => Protocol::Https,
    };

    let pick = |cli_val: Option<&str>, profile_val: Option<&str>, default: &str| -> String {
        non_empty(cli_val)
            .or(non_empty(profile_val))
            .unwrap_or(default)
            .to_string()
    };

    let host = pick(cli.host.as_deref(), profile.host.as_deref(), DEFAULT_HOST);
    let catalog = pick(cli.catalog.as_deref(), profile.catalog.as_deref(), DEFAULT_CATALOG);
    let schema = pick(cli.schema.as_deref(), profile.schema.as_deref(), DEFAULT_SCHEMA);
    let source_template = pick(cli.source.as_deref(), profile.source.as_deref(), DEFAULT_SOURCE);
    let source = render_source(&source_template, &username);

    let resource_group = non_empty(cli.resource_group.as_deref())
        .or(non_empty(profile.resource_group.as_deref()))
        .map(|s| s.to_string());

    let port = cli.port.or(profile.port).unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(McpError::Config {
            message: "port must be between 1 and 65535".to_string(),
        });
    }

    // timeouts: CLI/ENV > profile > TOML defaults > built-in
    let connect_timeout_secs = positive(
        "connect timeout",
        cli.connect_timeout
            .or(profile.connect_timeout)
            .or(toml_config.defaults.connect_timeout)
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
    )?;
    let query_timeout_secs = positive(
        "query timeout",
        cli.query_timeout
            .or(profile.query_timeout)
            .or(toml_config.defaults.query_timeout)
            .unwrap_or(DEFAULT_QUERY_TIMEOUT_SECS),
    )?;

    let default_row_limit = cli.row_limit.or(toml_config.defaults.row_limit);
    let verbose = cli.verbose || toml_config.defaults.verbose.unwrap_or(false);

    let connection = ConnectionConfig {
        host,
        port,
        protocol,
        username,
        password,
        catalog,
        schema,
        source,
        resource_group,
        connect_timeout_secs,
        query_timeout_secs,
    };
    // values travel as request headers; reject what cannot be sent
    session_headers(&connection)?;

    Ok(AppConfig {
        connection,
        default_row_limit,
        verbose,
        debug: cli.debug,
    })
}
