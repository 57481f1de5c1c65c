use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "switchboard")]
#[command(version)]
#[command(about = "Multi-signal turn routing for conversational handlers")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Route one utterance and print the decision as JSON
    Route {
        /// Utterance to route
        #[arg(short, long)]
        text: String,

        /// Handler catalog JSON (built-in banking catalog if omitted)
        #[arg(short, long)]
        catalog: Option<PathBuf>,

        /// Topic of the session's last resolved task, for drift detection
        #[arg(long)]
        last_topic: Option<String>,
    },

    /// Print effective configuration and catalog
    Config {
        #[arg(short, long)]
        catalog: Option<PathBuf>,
    },

    /// Print version information
    Version,
}
