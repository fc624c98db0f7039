//! Host info reporter
//!
//! Combines static host facts with live resource figures. Each operating
//! system query is best-effort: a failure is logged and the field left out
//! of the report.

use pipevisor_core::domain::host::HostInfo;
use std::collections::BTreeMap;
use sysinfo::System;
use tracing::warn;

/// Live figures the engine contributes to the report
#[derive(Debug, Clone, Copy)]
pub struct EngineFigures<'a> {
    pub cpu_usage: &'a [f64],
    pub active_tasks: usize,
    pub num_pipelines: usize,
}

pub fn report(tags: &BTreeMap<String, String>, figures: EngineFigures<'_>) -> HostInfo {
    let hostname = System::host_name();
    if hostname.is_none() {
        warn!("Failed to obtain the hostname");
    }

    let mut system = System::new();
    system.refresh_memory();
    let (total_mem, used_mem) = match system.total_memory() {
        0 => {
            warn!("Failed to obtain virtual memory info");
            (None, None)
        }
        total => (Some(total), Some(system.used_memory())),
    };

    system.refresh_processes();
    let num_procs = match system.processes().len() {
        0 => {
            warn!("Failed to obtain number of running processes");
            None
        }
        count => Some(count),
    };

    let num_cores = std::thread::available_parallelism()
        .map(|cores| cores.get())
        .unwrap_or_else(|e| {
            warn!("Failed to obtain the number of cores: {}", e);
            figures.cpu_usage.len()
        });

    HostInfo {
        hostname,
        tags: tags.clone(),
        num_cores,
        total_mem,
        used_cpu_cores: figures.cpu_usage.to_vec(),
        used_cpu: average(figures.cpu_usage),
        used_mem,
        num_procs,
        active_tasks: figures.active_tasks,
        num_pipelines: figures.num_pipelines,
    }
}

/// Mean of the per-core values, 0 before the first snapshot
fn average(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
