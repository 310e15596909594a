use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Log target for the startup configuration summary, enabled at every verbosity.
pub const STARTUP_TARGET: &str = "trino_mcp::startup";

/// Default filter directive for the given flags.
pub fn filter_directive(verbose: bool, debug: bool) -> &'static str {
    if debug {
        "trino_mcp=debug,info"
    } else if verbose {
        "trino_mcp=info,warn"
    } else {
        "warn,trino_mcp::startup=info"
    }
}

/// Install the stderr subscriber. `RUST_LOG` wins over the flags.
///
/// Stdout carries protocol frames, so nothing may log there.
pub fn init_tracing(verbose: bool, debug: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(verbose, debug)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(debug)
        .with_ansi(false)
        .try_init();
}

/// A timer for measuring durations in diagnostics.
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.start.elapsed().as_millis()
    }
}
