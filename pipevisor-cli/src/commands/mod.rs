//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod pipeline;
mod system;

pub use pipeline::PipelineCommands;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Pipeline management
    Pipeline {
        #[command(subcommand)]
        command: PipelineCommands,
    },
    /// Show the processing steps the agent's executable supports
    Capabilities {
        /// Print the raw JSON catalog
        #[arg(long)]
        json: bool,
    },
    /// Show host information and resource usage
    Info,
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Pipeline { command } => pipeline::handle_pipeline_command(command, config).await,
        Commands::Capabilities { json } => system::show_capabilities(config, json).await,
        Commands::Info => system::show_info(config).await,
    }
}
