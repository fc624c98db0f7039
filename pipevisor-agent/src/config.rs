//! Agent configuration
//!
//! Command line flags (with environment fallbacks) are parsed into
//! [`Args`] and then resolved and validated into a [`Config`].

use anyhow::{Context, Result};
use clap::Parser;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Executable searched in `$PATH` when none is configured
pub const DEFAULT_EXECUTABLE: &str = "bitflow-pipeline";

#[derive(Debug, Parser)]
#[command(name = "pipevisor-agent")]
#[command(about = "Supervises pipeline processes and serves their state over HTTP", long_about = None)]
pub struct Args {
    /// Pipeline executable. By default, search $PATH for bitflow-pipeline
    #[arg(short, long, env = "PIPEVISOR_EXECUTABLE")]
    pub executable: Option<PathBuf>,

    /// Address the REST API listens on
    #[arg(short, long, env = "PIPEVISOR_LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: String,

    /// Send one GET request to this URL once the REST API is reachable
    #[arg(short, long, env = "PIPEVISOR_MANAGER_URL")]
    pub manager_url: Option<String>,

    /// Additional key=value pairs served through GET /info
    #[arg(long = "tag", value_parser = parse_key_val)]
    pub tags: Vec<(String, String)>,

    /// Wait applied after starting a pipeline when the request sets none
    #[arg(long, env = "PIPEVISOR_DEFAULT_DELAY_MS", default_value = "200")]
    pub default_delay_ms: u64,

    /// Longest wait a request may ask for
    #[arg(long, env = "PIPEVISOR_MAX_DELAY_MS", default_value = "60000")]
    pub max_delay_ms: u64,

    /// CPU sampling interval
    #[arg(long, env = "PIPEVISOR_CPU_INTERVAL_MS", default_value = "1000")]
    pub cpu_interval_ms: u64,

    /// Timeout of the manager notification request
    #[arg(long, env = "PIPEVISOR_NOTIFY_TIMEOUT_MS", default_value = "2000")]
    pub notify_timeout_ms: u64,
}

/// Parse a single key=value pair
fn parse_key_val(s: &str) -> Result<(String, String)> {
    let pos = s
        .find('=')
        .ok_or_else(|| anyhow::anyhow!("invalid KEY=value: no `=` found in `{}`", s))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

/// Resolved agent configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Pipeline executable
    pub executable: PathBuf,

    /// REST API bind address (e.g., "0.0.0.0:8080")
    pub listen_addr: String,

    /// Manager to notify after startup
    pub manager_url: Option<String>,

    /// Static tags reported with host info
    pub tags: BTreeMap<String, String>,

    /// Creation delay when a request does not specify one
    pub default_delay: Duration,

    /// Upper bound on a requested creation delay
    pub max_delay: Duration,

    /// How often CPU counters are sampled
    pub cpu_interval: Duration,

    /// Timeout of the manager notification
    pub notify_timeout: Duration,
}

impl Config {
    /// Creates a configuration with defaults for everything but the
    /// executable
    pub fn new(executable: PathBuf) -> Self {
        Self {
            executable,
            listen_addr: "0.0.0.0:8080".to_string(),
            manager_url: None,
            tags: BTreeMap::new(),
            default_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(60),
            cpu_interval: Duration::from_secs(1),
            notify_timeout: Duration::from_secs(2),
        }
    }

    /// Builds the configuration from parsed flags, looking up the
    /// executable in `$PATH` when it was not given
    pub fn from_args(args: Args) -> Result<Self> {
        let executable = match args.executable {
            Some(executable) => executable,
            None => which::which(DEFAULT_EXECUTABLE)
                .with_context(|| format!("Failed to find {} in $PATH", DEFAULT_EXECUTABLE))?,
        };

        Ok(Self {
            executable,
            listen_addr: args.listen,
            manager_url: args.manager_url,
            tags: args.tags.into_iter().collect(),
            default_delay: Duration::from_millis(args.default_delay_ms),
            max_delay: Duration::from_millis(args.max_delay_ms),
            cpu_interval: Duration::from_millis(args.cpu_interval_ms),
            notify_timeout: Duration::from_millis(args.notify_timeout_ms),
        })
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if self.executable.as_os_str().is_empty() {
            anyhow::bail!("executable cannot be empty");
        }

        if self.listen_addr.is_empty() {
            anyhow::bail!("listen address cannot be empty");
        }

        if let Some(url) = &self.manager_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                anyhow::bail!("manager_url must start with http:// or https://");
            }
        }

        if self.cpu_interval.is_zero() {
            anyhow::bail!("cpu_interval must be greater than 0");
        }

        if self.notify_timeout.is_zero() {
            anyhow::bail!("notify_timeout must be greater than 0");
        }

        if self.default_delay > self.max_delay {
            anyhow::bail!("default_delay must not exceed max_delay");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::new(PathBuf::from("/usr/bin/pipeline"));
        assert_eq!(config.cpu_interval, Duration::from_secs(1));
        assert_eq!(config.default_delay, Duration::from_millis(200));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::new(PathBuf::from("/usr/bin/pipeline"));

        config.manager_url = Some("manager:9000".to_string());
        assert!(config.validate().is_err());

        config.manager_url = Some("http://manager:9000/register".to_string());
        assert!(config.validate().is_ok());

        config.cpu_interval = Duration::ZERO;
        assert!(config.validate().is_err());
        config.cpu_interval = Duration::from_secs(1);

        config.default_delay = Duration::from_secs(120);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_args() {
        let args = Args::try_parse_from([
            "pipevisor-agent",
            "-e",
            "/opt/pipeline",
            "--listen",
            "127.0.0.1:9000",
            "--tag",
            "zone=eu-1",
            "--tag",
            "rack=a=b",
            "--cpu-interval-ms",
            "500",
        ])
        .unwrap();

        let config = Config::from_args(args).unwrap();
        assert_eq!(config.executable, PathBuf::from("/opt/pipeline"));
        assert_eq!(config.listen_addr, "127.0.0.1:9000");
        assert_eq!(config.tags.get("zone").map(String::as_str), Some("eu-1"));
        assert_eq!(config.tags.get("rack").map(String::as_str), Some("a=b"));
        assert_eq!(config.cpu_interval, Duration::from_millis(500));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_tag_without_separator_is_rejected() {
        let result = Args::try_parse_from(["pipevisor-agent", "-e", "/opt/pipeline", "--tag", "zone"]);
        assert!(result.is_err());
    }
}
