//! Manager notification
//!
//! Tells an external manager that the agent is up by issuing a single GET
//! request without payload.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::info;

/// Sends the startup notification to `url`
///
/// A transport error or a non-success status is returned as an error.
pub async fn notify_manager(url: &str, timeout: Duration) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP client")?;

    info!("Notifying manager at {}", url);
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Failed to notify manager at {}", url))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        anyhow::bail!("Manager at {} answered {}: {}", url, status, body.trim());
    }

    info!("Manager notified ({})", status);
    Ok(())
}
