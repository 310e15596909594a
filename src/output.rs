use crate::config::AppConfig;
use crate::error::McpError;
use crate::verbose::STARTUP_TARGET;

/// Print a fatal error to stderr in the contract format: error: <category>: <message>
pub fn print_error(err: &McpError) {
    eprintln!("error: {}", err);
}

/// Log the resolved, non-secret configuration.
pub fn log_config(config: &AppConfig) {
    for line in config.connection.summary_lines(config.verbose) {
        tracing::info!(target: STARTUP_TARGET, "{}", line);
    }
    match config.default_row_limit {
        Some(limit) => tracing::info!(target: STARTUP_TARGET, "default row limit: {}", limit),
        None => tracing::debug!(target: STARTUP_TARGET, "default row limit: none"),
    }
}
