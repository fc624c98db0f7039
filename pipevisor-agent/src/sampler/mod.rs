//! CPU sampler
//!
//! Periodically reads per-core CPU counters, turns the difference to the
//! previous reading into utilization percentages and publishes them.
//!
//! Publication swaps a whole new vector into [`CpuUsage`]; readers load
//! the current `Arc` without taking a lock and never see a half-written
//! snapshot.

mod procfs;
mod times;

pub use procfs::{CpuTimesSource, ProcStat, SampleError};
pub use times::{CpuTimes, usage_percent};

use arc_swap::ArcSwap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, warn};

/// Latest published per-core utilization, in percent
#[derive(Debug, Clone)]
pub struct CpuUsage {
    current: Arc<ArcSwap<Vec<f64>>>,
}

impl CpuUsage {
    pub fn new() -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(Vec::new())),
        }
    }

    /// The current snapshot; empty until two samples have been taken
    pub fn load(&self) -> Arc<Vec<f64>> {
        self.current.load_full()
    }

    fn publish(&self, usage: Vec<f64>) {
        self.current.store(Arc::new(usage));
    }
}

impl Default for CpuUsage {
    fn default() -> Self {
        Self::new()
    }
}

/// What a single sampling tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// First successful reading, kept as the baseline
    Baseline,
    /// A new snapshot was published
    Published,
    /// Nothing changed, the reading failed or did not match the baseline
    Skipped,
}

pub struct CpuSampler<S> {
    source: S,
    baseline: Option<Vec<CpuTimes>>,
    usage: CpuUsage,
}

impl<S: CpuTimesSource> CpuSampler<S> {
    pub fn new(source: S, usage: CpuUsage) -> Self {
        Self {
            source,
            baseline: None,
            usage,
        }
    }

    /// Takes one reading and publishes a snapshot if possible
    pub fn tick(&mut self) -> TickOutcome {
        let current = match self.source.per_core() {
            Ok(current) => current,
            Err(e) => {
                warn!("Failed to read CPU times: {}", e);
                return TickOutcome::Skipped;
            }
        };

        let Some(previous) = &self.baseline else {
            self.baseline = Some(current);
            return TickOutcome::Baseline;
        };

        if previous.len() != current.len() {
            warn!(
                "The number of reported CPU times changed from {} to {}",
                previous.len(),
                current.len()
            );
            return TickOutcome::Skipped;
        }

        let usage = previous
            .iter()
            .zip(&current)
            .map(|(previous, current)| usage_percent(previous, current))
            .collect();
        self.usage.publish(usage);
        self.baseline = Some(current);
        TickOutcome::Published
    }

    /// Samples forever at `interval`
    pub async fn run(mut self, interval: Duration) {
        debug!("Starting CPU sampler (interval: {:?})", interval);
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.tick();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Replays prepared readings, one per tick
    struct Scripted(VecDeque<Result<Vec<CpuTimes>, SampleError>>);

    impl Scripted {
        fn new(readings: Vec<Vec<(f64, f64)>>) -> Self {
            Self(
                readings
                    .into_iter()
                    .map(|cores| Ok(cores.into_iter().map(|(b, t)| sample(b, t)).collect()))
                    .collect(),
            )
        }
    }

    impl CpuTimesSource for Scripted {
        fn per_core(&mut self) -> Result<Vec<CpuTimes>, SampleError> {
            self.0.pop_front().unwrap_or(Err(SampleError::NoCores))
        }
    }

    fn sample(busy: f64, total: f64) -> CpuTimes {
        CpuTimes {
            system: busy,
            idle: total - busy,
            ..CpuTimes::default()
        }
    }

    #[test]
    fn test_first_tick_only_records_baseline() {
        let usage = CpuUsage::new();
        let mut sampler = CpuSampler::new(Scripted::new(vec![vec![(10.0, 20.0)]]), usage.clone());

        assert_eq!(sampler.tick(), TickOutcome::Baseline);
        assert!(usage.load().is_empty());
    }

    #[test]
    fn test_publishes_per_core_usage() {
        let usage = CpuUsage::new();
        let source = Scripted::new(vec![
            vec![(100.0, 200.0), (100.0, 200.0)],
            vec![(150.0, 300.0), (90.0, 210.0)],
            vec![(250.0, 400.0), (90.0, 310.0)],
        ]);
        let mut sampler = CpuSampler::new(source, usage.clone());

        assert_eq!(sampler.tick(), TickOutcome::Baseline);
        assert_eq!(sampler.tick(), TickOutcome::Published);
        assert_eq!(*usage.load(), vec![50.0, 0.0]);

        assert_eq!(sampler.tick(), TickOutcome::Published);
        assert_eq!(*usage.load(), vec![100.0, 0.0]);
    }

    #[test]
    fn test_core_count_change_is_discarded() {
        let usage = CpuUsage::new();
        let source = Scripted::new(vec![
            vec![(100.0, 200.0)],
            vec![(150.0, 300.0)],
            vec![(160.0, 310.0), (1.0, 2.0)],
            vec![(250.0, 400.0)],
        ]);
        let mut sampler = CpuSampler::new(source, usage.clone());

        sampler.tick();
        assert_eq!(sampler.tick(), TickOutcome::Published);
        let before = usage.load();
        assert_eq!(*before, vec![50.0]);

        assert_eq!(sampler.tick(), TickOutcome::Skipped);
        assert!(Arc::ptr_eq(&before, &usage.load()));

        // Compared against (150, 300), not the mismatched reading
        assert_eq!(sampler.tick(), TickOutcome::Published);
        assert_eq!(*usage.load(), vec![100.0]);
    }

    #[test]
    fn test_read_error_keeps_state() {
        let usage = CpuUsage::new();
        let mut source = Scripted::new(vec![vec![(100.0, 200.0)]]);
        source.0.push_back(Err(SampleError::NoCores));
        source.0.push_back(Ok(vec![sample(150.0, 300.0)]));
        let mut sampler = CpuSampler::new(source, usage.clone());

        assert_eq!(sampler.tick(), TickOutcome::Baseline);
        assert_eq!(sampler.tick(), TickOutcome::Skipped);
        assert_eq!(sampler.tick(), TickOutcome::Published);
        assert_eq!(*usage.load(), vec![50.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_publishes_on_interval() {
        let usage = CpuUsage::new();
        let source = Scripted::new(vec![vec![(0.0, 10.0)], vec![(5.0, 20.0)]]);
        let handle = tokio::spawn(CpuSampler::new(source, usage.clone()).run(Duration::from_secs(1)));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(*usage.load(), vec![50.0]);

        handle.abort();
    }
}
