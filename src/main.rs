use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use ctgov_mcp::cli::{self, Cli, Commands};
use ctgov_mcp::config::Settings;
use ctgov_mcp::entities::fields;
use ctgov_mcp::mcp;

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ctgov_mcp=info"));
    // stdout carries MCP framing; logs always go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    fields::validate_schema()?;
    let settings = Settings::from_env()?;
    debug!(?settings, "loaded settings");

    match cli.command {
        Commands::Mcp | Commands::Serve => {
            let settings = settings
                .with_deadline_secs(cli.timeout)
                .with_cache_disabled(cli.no_cache);
            mcp::run_stdio(settings).await
        }
        _ => {
            let output = cli::run(cli, settings).await?;
            println!("{output}");
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}
