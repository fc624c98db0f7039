//! Pipevisor CLI
//!
//! Command-line interface for interacting with a pipevisor agent.

mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;

#[derive(Parser)]
#[command(name = "pipevisor")]
#[command(about = "Pipeline agent CLI", long_about = None)]
struct Cli {
    /// Agent URL
    #[arg(long, env = "PIPEVISOR_AGENT_URL", default_value = "http://localhost:8080")]
    agent_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config {
        agent_url: cli.agent_url,
    };

    handle_command(cli.command, &config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::PipelineCommands;

    #[test]
    fn test_parse_create() {
        let cli = Cli::try_parse_from([
            "pipevisor",
            "--agent-url",
            "http://agent:9000",
            "pipeline",
            "create",
            "--inline",
            "in -> avg -> out",
            "--param",
            "-v",
            "--param",
            "--fast",
            "--delay-ms",
            "0",
        ])
        .unwrap();

        assert_eq!(cli.agent_url, "http://agent:9000");
        let Commands::Pipeline {
            command:
                PipelineCommands::Create {
                    file,
                    inline,
                    param,
                    delay_ms,
                },
        } = cli.command
        else {
            panic!("expected pipeline create");
        };
        assert!(file.is_none());
        assert_eq!(inline.as_deref(), Some("in -> avg -> out"));
        assert_eq!(param, vec!["-v", "--fast"]);
        assert_eq!(delay_ms, Some(0));
    }

    #[test]
    fn test_create_requires_one_script_source() {
        assert!(Cli::try_parse_from(["pipevisor", "pipeline", "create"]).is_err());
        assert!(
            Cli::try_parse_from([
                "pipevisor",
                "pipeline",
                "create",
                "--file",
                "a.bf",
                "--inline",
                "a -> b",
            ])
            .is_err()
        );
    }

    #[test]
    fn test_parse_kill() {
        let cli = Cli::try_parse_from(["pipevisor", "pipeline", "kill", "7"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Pipeline {
                command: PipelineCommands::Kill { id: 7 }
            }
        ));
    }
}
