//! CLI commands.

mod apply;
mod assign;
mod render;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::output::OutputFormat;

/// fleetctl - reconcile and render the fleet's gitops repositories.
#[derive(Debug, Parser)]
#[command(name = "fleetctl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format (table or json).
    #[arg(long, global = true, default_value = "table")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Reconcile application assignments in the control-plane repository.
    Assign(assign::AssignCommand),

    /// Render application manifests into the cluster gitops repository.
    Render(render::RenderCommand),

    /// Materialize per-cluster directories in the gitops repository.
    Apply(apply::ApplyCommand),

    /// Show CLI version.
    Version,
}

impl Cli {
    /// Run the CLI command.
    pub async fn run(self) -> Result<()> {
        let format = match self.format.as_str() {
            "json" => OutputFormat::Json,
            _ => OutputFormat::Table,
        };

        match self.command {
            Commands::Assign(cmd) => cmd.run(format).await,
            Commands::Render(cmd) => cmd.run().await,
            Commands::Apply(cmd) => cmd.run().await,
            Commands::Version => {
                println!("fleetctl {}", env!("CARGO_PKG_VERSION"));
                Ok(())
            }
        }
    }
}
