//! Capability discovery
//!
//! Asks the pipeline executable which processing steps it supports. This
//! runs once at startup; any failure here is fatal for the agent.

use pipevisor_core::domain::capabilities::Capabilities;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

/// Flag that makes the executable print its capability catalog
pub const CAPABILITIES_FLAG: &str = "-capabilities";

#[derive(Debug, Error)]
pub enum CapabilitiesError {
    #[error("failed to run {}: {source}", executable.display())]
    Spawn {
        executable: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} {} exited with {status}: {stderr}", executable.display(), CAPABILITIES_FLAG)]
    Exit {
        executable: PathBuf,
        status: ExitStatus,
        stderr: String,
    },

    #[error("failed to parse capabilities of {}: {source}", executable.display())]
    Parse {
        executable: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Runs `<executable> -capabilities` and parses its standard output
pub async fn load(executable: &Path) -> Result<Capabilities, CapabilitiesError> {
    info!("Loading capabilities of {}", executable.display());

    let output = Command::new(executable)
        .arg(CAPABILITIES_FLAG)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|source| CapabilitiesError::Spawn {
            executable: executable.to_path_buf(),
            source,
        })?;

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if !output.status.success() {
        return Err(CapabilitiesError::Exit {
            executable: executable.to_path_buf(),
            status: output.status,
            stderr,
        });
    }
    if !stderr.is_empty() {
        debug!("{} {} stderr: {}", executable.display(), CAPABILITIES_FLAG, stderr);
    }

    let capabilities: Capabilities =
        serde_json::from_slice(&output.stdout).map_err(|source| CapabilitiesError::Parse {
            executable: executable.to_path_buf(),
            source,
        })?;

    info!("Discovered {} processing steps", capabilities.len());
    Ok(capabilities)
}
