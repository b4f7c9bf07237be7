mod nodes;
mod run;
mod status;

pub use nodes::NodesCommand;
pub use run::RunCommand;
pub use status::StatusCommand;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// SyncWarden - heartbeat membership and sync-to-async failover for PostgreSQL
#[derive(Parser)]
#[command(name = "syncwarden")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Run the coordinator next to a local server.
    Run(RunCommand),

    /// Manage cluster membership through a running coordinator.
    Nodes(NodesCommand),

    /// Show coordinator status.
    Status(StatusCommand),
}

impl Cli {
    /// Execute the CLI command.
    pub async fn execute(self) -> Result<()> {
        // Load .env if present
        dotenvy::dotenv().ok();

        match self.command {
            Commands::Run(cmd) => cmd.execute().await,
            Commands::Nodes(cmd) => cmd.execute().await,
            Commands::Status(cmd) => cmd.execute().await,
        }
    }
}
