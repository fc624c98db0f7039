//! Capability and host info commands

use anyhow::Result;
use colored::*;
use pipevisor_core::domain::host::HostInfo;

use crate::config::Config;
use pipevisor_client::AgentClient;

pub async fn show_capabilities(config: &Config, json: bool) -> Result<()> {
    let client = AgentClient::new(&config.agent_url);
    let capabilities = client.capabilities().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&capabilities)?);
        return Ok(());
    }

    if capabilities.is_empty() {
        println!("{}", "The executable reports no processing steps.".yellow());
        return Ok(());
    }

    println!(
        "{}",
        format!("{} processing step(s):", capabilities.len()).bold()
    );
    for step in &capabilities.steps {
        match &step.description {
            Some(description) if !description.is_empty() => println!(
                "  {} {} {}",
                "▸".cyan(),
                step.name.bold(),
                description.dimmed()
            ),
            _ => println!("  {} {}", "▸".cyan(), step.name.bold()),
        }
    }

    Ok(())
}

pub async fn show_info(config: &Config) -> Result<()> {
    let client = AgentClient::new(&config.agent_url);
    let info = client.host_info().await?;
    print_host_info(&info);
    Ok(())
}

fn print_host_info(info: &HostInfo) {
    println!("{}", "Host Info:".bold());
    println!(
        "  Hostname:  {}",
        info.hostname.as_deref().unwrap_or("unknown").cyan()
    );
    println!("  Cores:     {}", info.num_cores);
    println!("  CPU:       {:.1}%", info.used_cpu);
    if !info.used_cpu_cores.is_empty() {
        let cores: Vec<String> = info
            .used_cpu_cores
            .iter()
            .map(|usage| format!("{:.0}", usage))
            .collect();
        println!("  Per core:  {}", cores.join(" ").dimmed());
    }
    if let (Some(used), Some(total)) = (info.used_mem, info.total_mem) {
        println!("  Memory:    {} / {}", format_bytes(used), format_bytes(total));
    }
    if let Some(procs) = info.num_procs {
        println!("  Processes: {}", procs);
    }
    println!("  Pipelines: {}", info.num_pipelines);
    println!("  Tasks:     {}", info.active_tasks);
    if !info.tags.is_empty() {
        println!("  Tags:");
        for (key, value) in &info.tags {
            println!("    {} = {}", key.cyan(), value);
        }
    }
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
