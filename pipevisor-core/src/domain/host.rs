//! Host report

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Static host facts combined with live resource usage
///
/// Optional fields are omitted when the operating system could not
/// provide them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    pub tags: BTreeMap<String, String>,

    /// Logical cores
    pub num_cores: usize,
    /// Bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_mem: Option<u64>,

    /// Percent, per core, as of the last CPU sample
    pub used_cpu_cores: Vec<f64>,
    /// Percent, average over all cores
    pub used_cpu: f64,
    /// Bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_mem: Option<u64>,
    /// Processes on the host
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_procs: Option<usize>,
    /// Background tasks currently alive inside the agent
    pub active_tasks: usize,
    /// Pipelines retained by the agent
    pub num_pipelines: usize,
}
