//! Per-core CPU time counters and utilization math

/// Cumulative time a core spent in each state since boot
///
/// Units are whatever the source reports (clock ticks for `/proc/stat`);
/// only differences between two samples of the same source are meaningful.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CpuTimes {
    pub user: f64,
    pub nice: f64,
    pub system: f64,
    pub idle: f64,
    pub iowait: f64,
    pub irq: f64,
    pub softirq: f64,
    pub steal: f64,
    pub guest: f64,
    pub guest_nice: f64,
}

impl CpuTimes {
    /// Time spent doing work: everything except idle and iowait
    pub fn busy(&self) -> f64 {
        self.user
            + self.system
            + self.nice
            + self.irq
            + self.softirq
            + self.steal
            + self.guest
            + self.guest_nice
    }

    pub fn total(&self) -> f64 {
        self.busy() + self.idle + self.iowait
    }
}

/// Utilization in percent between two samples of the same core
///
/// A busy counter that did not advance yields 0. A total that did not
/// advance (counter reset or clock anomaly) yields 1, a floor rather than
/// a saturation value.
pub fn usage_percent(previous: &CpuTimes, current: &CpuTimes) -> f64 {
    let busy_delta = current.busy() - previous.busy();
    let total_delta = current.total() - previous.total();

    if busy_delta <= 0.0 {
        return 0.0;
    }
    if total_delta <= 0.0 {
        return 1.0;
    }
    busy_delta / total_delta * 100.0
}
