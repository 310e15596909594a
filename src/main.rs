use clap::Parser;
use std::process;
use trino_mcp::cli::Cli;
use trino_mcp::server::McpServer;
use trino_mcp::{config, output, verbose};

#[tokio::main]
async fn main() {
    // Load .env file (optional, ignore if missing)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let app_config = match config::load(&cli) {
        Ok(c) => c,
        Err(err) => {
            output::print_error(&err);
            process::exit(1);
        }
    };
    // after load, so `[defaults] verbose` in the config file counts
    verbose::init_tracing(app_config.verbose, app_config.debug);

    if let Err(err) = run(app_config).await {
        tracing::error!(error = %err, "server stopped");
        process::exit(1);
    }
}

async fn run(app_config: config::AppConfig) -> anyhow::Result<()> {
    output::log_config(&app_config);

    let server = McpServer::from_config(app_config);
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    server.serve(stdin, tokio::io::stdout()).await?;
    Ok(())
}
