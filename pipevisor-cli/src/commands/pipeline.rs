//! Pipeline command handlers
//!
//! Handles creation, listing, inspection, output retrieval and killing of
//! pipelines on an agent.

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;
use pipevisor_core::domain::pipeline::{PipelineInfo, PipelineStatus};
use pipevisor_core::dto::pipeline::CreatePipeline;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::Config;
use pipevisor_client::AgentClient;

/// Pipeline subcommands
#[derive(Subcommand)]
pub enum PipelineCommands {
    /// List all pipelines
    List,
    /// List running pipelines
    Running,
    /// Create and start a pipeline
    Create {
        /// Read the script from this file
        #[arg(short, long, conflicts_with = "inline", required_unless_present = "inline")]
        file: Option<PathBuf>,

        /// Script text given directly on the command line
        #[arg(short, long)]
        inline: Option<String>,

        /// Extra argument passed to the executable before the script (repeatable)
        #[arg(short, long, allow_hyphen_values = true)]
        param: Vec<String>,

        /// Wait this long for an early failure; 0 disables the wait
        #[arg(short, long)]
        delay_ms: Option<u64>,
    },
    /// Get pipeline details
    Get {
        /// Pipeline ID
        id: u64,
    },
    /// Print the output captured from a pipeline
    Output {
        /// Pipeline ID
        id: u64,
    },
    /// Kill a running pipeline
    Kill {
        /// Pipeline ID
        id: u64,
    },
}

/// Handle pipeline commands
pub async fn handle_pipeline_command(command: PipelineCommands, config: &Config) -> Result<()> {
    let client = AgentClient::new(&config.agent_url);

    match command {
        PipelineCommands::List => list_pipelines(&client).await,
        PipelineCommands::Running => list_running(&client).await,
        PipelineCommands::Create {
            file,
            inline,
            param,
            delay_ms,
        } => {
            let script = load_script(file.as_deref(), inline)?;
            create_pipeline(&client, script, param, delay_ms).await
        }
        PipelineCommands::Get { id } => get_pipeline(&client, id).await,
        PipelineCommands::Output { id } => print_output(&client, id).await,
        PipelineCommands::Kill { id } => kill_pipeline(&client, id).await,
    }
}

/// Picks the script from a file or the inline text
fn load_script(file: Option<&Path>, inline: Option<String>) -> Result<String> {
    match (file, inline) {
        (Some(path), _) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read script file: {}", path.display())),
        (None, Some(script)) => Ok(script),
        (None, None) => anyhow::bail!("Either --file or --inline must be given"),
    }
}

async fn list_pipelines(client: &AgentClient) -> Result<()> {
    let ids = client.list_pipelines().await?;

    if ids.is_empty() {
        println!("{}", "No pipelines found.".yellow());
        return Ok(());
    }

    println!("{}", format!("Found {} pipeline(s):", ids.len()).bold());
    println!();
    for id in ids {
        let pipeline = client.get_pipeline(id).await?;
        print_pipeline_summary(&pipeline);
    }

    Ok(())
}

async fn list_running(client: &AgentClient) -> Result<()> {
    let ids = client.list_running().await?;

    if ids.is_empty() {
        println!("{}", "No running pipelines.".yellow());
    } else {
        let ids: Vec<String> = ids.iter().map(u64::to_string).collect();
        println!("{} {}", "Running:".bold(), ids.join(", ").cyan());
    }

    Ok(())
}

async fn create_pipeline(
    client: &AgentClient,
    script: String,
    extra_params: Vec<String>,
    delay_ms: Option<u64>,
) -> Result<()> {
    let req = CreatePipeline {
        script,
        extra_params,
        delay_ms,
    };

    let pipeline = client
        .create_pipeline(&req)
        .await
        .context("Failed to create pipeline")?;

    println!("{}", "✓ Pipeline started successfully!".green().bold());
    println!("  ID:     {}", pipeline.id.to_string().cyan());
    println!("  Status: {}", colorize_status(pipeline.status));

    Ok(())
}

async fn get_pipeline(client: &AgentClient, id: u64) -> Result<()> {
    let pipeline = client.get_pipeline(id).await?;
    print_pipeline_details(&pipeline);
    Ok(())
}

async fn print_output(client: &AgentClient, id: u64) -> Result<()> {
    let output = client.get_output(id).await?;

    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(&output)
        .context("Failed to write pipeline output")?;
    stdout.flush()?;

    Ok(())
}

async fn kill_pipeline(client: &AgentClient, id: u64) -> Result<()> {
    let pipeline = client.kill_pipeline(id).await?;

    println!(
        "{}",
        format!("✓ Kill requested for pipeline {}", pipeline.id)
            .green()
            .bold()
    );
    println!("  Status: {}", colorize_status(pipeline.status));

    Ok(())
}

fn colorize_status(status: PipelineStatus) -> ColoredString {
    let text = status.to_string();
    match status {
        PipelineStatus::Created => text.dimmed(),
        PipelineStatus::Running => text.cyan(),
        PipelineStatus::Finished => text.green(),
        PipelineStatus::Failed => text.red(),
        PipelineStatus::Killing | PipelineStatus::Killed => text.yellow(),
    }
}

fn print_pipeline_summary(pipeline: &PipelineInfo) {
    println!(
        "  {} Pipeline {} {}",
        "▸".cyan(),
        pipeline.id.to_string().bold(),
        colorize_status(pipeline.status)
    );
    println!(
        "    Created: {}",
        pipeline
            .created_at
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
            .dimmed()
    );
    println!("    Script:  {}", first_line(&pipeline.script).dimmed());
    println!();
}

fn print_pipeline_details(pipeline: &PipelineInfo) {
    println!("{}", "Pipeline Details:".bold());
    println!("  ID:       {}", pipeline.id.to_string().cyan());
    println!("  Status:   {}", colorize_status(pipeline.status));
    println!(
        "  Created:  {}",
        pipeline.created_at.format("%Y-%m-%d %H:%M:%S")
    );
    if let Some(started) = pipeline.started_at {
        println!("  Started:  {}", started.format("%Y-%m-%d %H:%M:%S"));
    }
    if let Some(finished) = pipeline.finished_at {
        println!("  Finished: {}", finished.format("%Y-%m-%d %H:%M:%S"));
    }
    if !pipeline.extra_params.is_empty() {
        println!("  Params:   {}", pipeline.extra_params.join(" "));
    }

    println!("\n{}", "Script:".bold());
    println!("{}", "─".repeat(80).dimmed());
    println!("{}", pipeline.script);
    println!("{}", "─".repeat(80).dimmed());

    if !pipeline.errors.is_empty() {
        println!("\n{}", "Errors:".red().bold());
        println!("{}", pipeline.errors.trim_end());
    }
}

fn first_line(script: &str) -> &str {
    script.lines().next().unwrap_or_default()
}
