mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Route {
            text,
            catalog,
            last_topic,
        } => commands::route::run(&text, catalog.as_deref(), last_topic.as_deref()),
        Commands::Config { catalog } => commands::config::run(catalog.as_deref()),
        Commands::Version => commands::version::run(),
    }
}
