//! CLI subcommands
//!
//! Thin wrappers over the lookup service and generator; results are
//! printed as JSON so the binary composes with shell tooling.

use anyhow::Result;
use clap::Subcommand;
use tracing::info;

use crate::ResolverState;

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Convert account identifiers to fingerprints
    Convert {
        /// One or more 64-bit account identifiers
        #[arg(required = true)]
        identifiers: Vec<u64>,
    },

    /// Reverse-lookup fingerprints against the generated index
    Lookup {
        /// One or more 32-character hex fingerprints
        #[arg(required = true)]
        fingerprints: Vec<String>,
    },

    /// Extend the generation target and run a generation pass
    Generate {
        /// Raise the target by this many identifiers
        #[arg(long, conflicts_with = "until")]
        amount: Option<u64>,

        /// Raise the target to this absolute identifier
        #[arg(long)]
        until: Option<u64>,
    },

    /// Show generator status and watermarks
    Status,
}

pub async fn execute_command(command: Commands, state: &ResolverState) -> Result<()> {
    match command {
        Commands::Convert { identifiers } => {
            let converted = state.service.forward_many(&identifiers);
            println!("{}", serde_json::to_string_pretty(&converted)?);
            Ok(())
        }
        Commands::Lookup { fingerprints } => {
            let resolved = state.service.lookup_many(&fingerprints).await?;
            println!("{}", serde_json::to_string_pretty(&resolved)?);
            Ok(())
        }
        Commands::Generate { amount, until } => {
            if let Some(amount) = amount {
                let target = state.generator.extend_by(amount).await?;
                info!(target, "generation target raised");
            }
            if let Some(until) = until {
                let target = state.generator.extend_to(until).await?;
                info!(target, "generation target raised");
            }
            state.generator.start().await?;
            let status = state.generator.status().await;
            println!("{}", serde_json::to_string_pretty(&status)?);
            Ok(())
        }
        Commands::Status => {
            let status = state.generator.status().await;
            println!("{}", serde_json::to_string_pretty(&status)?);
            Ok(())
        }
    }
}
