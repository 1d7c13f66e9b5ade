mod cli;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Parse {
            path,
            config,
            model,
            compact,
        } => cli::parse::run(&path, config.as_deref(), model, compact).await,
        Commands::Detect { path } => cli::detect::run(&path),
        Commands::Text { path } => cli::text::run(&path),
    }
}
