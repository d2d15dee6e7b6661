use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

mod cli;

use cli::Cli;
use workflow_graphs::config::Config;
use workflow_graphs::core::Engine;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Starting workflow-graphs v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load_or_default(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);

    // Create the core engine with configuration
    let engine = Engine::new(config)?;

    // Execute the requested command
    cli.execute(engine)
}
