//! CPU counter sources
//!
//! The sampler reads counters through [`CpuTimesSource`] so tests can feed
//! it scripted samples. On Linux the counters come from `/proc/stat`.

use std::path::PathBuf;
use thiserror::Error;

use super::times::CpuTimes;

#[derive(Debug, Error)]
pub enum SampleError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed cpu line: {0:?}")]
    Parse(String),

    #[error("no per-core cpu lines found")]
    NoCores,
}

/// Provides one [`CpuTimes`] per core, in a stable order
pub trait CpuTimesSource: Send {
    fn per_core(&mut self) -> Result<Vec<CpuTimes>, SampleError>;
}

/// Reads per-core counters from a `/proc/stat` formatted file
#[derive(Debug, Clone)]
pub struct ProcStat {
    path: PathBuf,
}

impl ProcStat {
    pub fn new() -> Self {
        Self::with_path("/proc/stat")
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for ProcStat {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuTimesSource for ProcStat {
    fn per_core(&mut self) -> Result<Vec<CpuTimes>, SampleError> {
        let content = std::fs::read_to_string(&self.path).map_err(|source| SampleError::Io {
            path: self.path.display().to_string(),
            source,
        })?;
        parse_proc_stat(&content)
    }
}

/// Extracts the `cpuN` lines; the aggregate `cpu` line is ignored
pub fn parse_proc_stat(content: &str) -> Result<Vec<CpuTimes>, SampleError> {
    let cores: Vec<CpuTimes> = content
        .lines()
        .filter(|line| {
            line.strip_prefix("cpu")
                .is_some_and(|rest| rest.starts_with(|c: char| c.is_ascii_digit()))
        })
        .map(parse_cpu_line)
        .collect::<Result<_, _>>()?;

    if cores.is_empty() {
        return Err(SampleError::NoCores);
    }
    Ok(cores)
}

fn parse_cpu_line(line: &str) -> Result<CpuTimes, SampleError> {
    let values: Vec<f64> = line
        .split_whitespace()
        .skip(1)
        .map(|field| field.parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|_| SampleError::Parse(line.to_string()))?;

    // user nice system idle are always present; later columns were added
    // by newer kernels
    if values.len() < 4 {
        return Err(SampleError::Parse(line.to_string()));
    }
    let field = |index: usize| values.get(index).copied().unwrap_or(0.0);

    Ok(CpuTimes {
        user: field(0),
        nice: field(1),
        system: field(2),
        idle: field(3),
        iowait: field(4),
        irq: field(5),
        softirq: field(6),
        steal: field(7),
        guest: field(8),
        guest_nice: field(9),
    })
}
