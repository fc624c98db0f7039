//! Supervision engine
//!
//! The engine is the single context object of the agent: it owns the
//! pipeline registry, the identifier allocator, the capability catalog and
//! the handle to the latest CPU snapshot. It is built once at startup and
//! shared by `Arc` with every request handler.
//!
//! Lock discipline: the allocator lock, the registry lock and each
//! pipeline's own lock are never held at the same time.

mod capabilities;
mod ids;
mod pipeline;
mod registry;
mod tasks;

pub use capabilities::CapabilitiesError;
pub use pipeline::{Pipeline, PipelineError};

use ids::IdAllocator;
use registry::Registry;
use tasks::TaskGauge;

use pipevisor_core::domain::capabilities::Capabilities;
use pipevisor_core::domain::host::HostInfo;
use pipevisor_core::domain::pipeline::{PipelineInfo, PipelineStatus};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::host_info::{self, EngineFigures};
use crate::sampler::{CpuSampler, CpuTimesSource, CpuUsage, ProcStat};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Capabilities(#[from] CapabilitiesError),

    #[error("pipeline does not exist: {0}")]
    NotFound(u64),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("error starting pipeline {}: {source}", pipeline.id)]
    Launch {
        pipeline: Box<PipelineInfo>,
        #[source]
        source: PipelineError,
    },

    #[error(
        "pipeline {} failed within {delay:?} with the following output:\n{output}",
        pipeline.id
    )]
    FailedEarly {
        pipeline: Box<PipelineInfo>,
        delay: Duration,
        output: String,
    },
}

pub struct Engine {
    executable: PathBuf,
    capabilities: Capabilities,
    tags: BTreeMap<String, String>,
    registry: Registry,
    ids: IdAllocator,
    cpu_usage: CpuUsage,
    tasks: TaskGauge,
}

impl Engine {
    /// Loads the capability catalog and starts the CPU sampler
    ///
    /// Fails if the executable cannot describe its capabilities; the agent
    /// cannot serve without them.
    pub async fn initialize(
        executable: PathBuf,
        tags: BTreeMap<String, String>,
        cpu_interval: Duration,
    ) -> Result<Arc<Self>, EngineError> {
        let capabilities = capabilities::load(&executable).await?;
        let engine = Arc::new(Self::with_capabilities(executable, capabilities, tags));
        engine.start_sampler(ProcStat::new(), cpu_interval);
        Ok(engine)
    }

    /// Builds an engine around an already known catalog, without sampling
    pub fn with_capabilities(
        executable: PathBuf,
        capabilities: Capabilities,
        tags: BTreeMap<String, String>,
    ) -> Self {
        Self {
            executable,
            capabilities,
            tags,
            registry: Registry::new(),
            ids: IdAllocator::new(),
            cpu_usage: CpuUsage::new(),
            tasks: TaskGauge::new(),
        }
    }

    /// Runs a sampler feeding this engine's CPU snapshot for as long as
    /// the runtime lives
    pub fn start_sampler<S>(&self, source: S, interval: Duration) -> JoinHandle<()>
    where
        S: CpuTimesSource + 'static,
    {
        let sampler = CpuSampler::new(source, self.cpu_usage.clone());
        self.tasks.spawn(sampler.run(interval))
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Registers and starts a new pipeline
    ///
    /// With a non-zero `delay` the call waits that long and reports a
    /// pipeline that has already failed as an error. The pipeline stays
    /// registered whatever the outcome.
    pub async fn create_pipeline(
        &self,
        script: String,
        extra_params: Vec<String>,
        delay: Duration,
    ) -> Result<Arc<Pipeline>, EngineError> {
        let id = self.ids.allocate();
        let pipeline = Pipeline::new(id, script, extra_params, self.tasks.clone());
        self.registry.insert(pipeline.clone());
        info!("Created pipeline {}", id);

        if let Err(source) = pipeline.start(&self.executable) {
            return Err(EngineError::Launch {
                pipeline: Box::new(pipeline.info()),
                source,
            });
        }

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
            if pipeline.status() == PipelineStatus::Failed {
                warn!("Pipeline {} failed within {:?}", id, delay);
                let output = pipeline.output().unwrap_or_default();
                return Err(EngineError::FailedEarly {
                    pipeline: Box::new(pipeline.info()),
                    delay,
                    output: String::from_utf8_lossy(&output).into_owned(),
                });
            }
        }

        Ok(pipeline)
    }

    /// Identifiers of all pipelines accepted by `filter`, ascending
    pub fn list_pipelines<F>(&self, filter: F) -> Vec<u64>
    where
        F: Fn(&Pipeline) -> bool,
    {
        let mut ids: Vec<u64> = self
            .registry
            .snapshot()
            .into_iter()
            .filter(|pipeline| filter(pipeline))
            .map(|pipeline| pipeline.id())
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn running_pipelines(&self) -> Vec<u64> {
        self.list_pipelines(|pipeline| pipeline.status() == PipelineStatus::Running)
    }

    pub fn get_pipeline(&self, id: u64) -> Result<Arc<Pipeline>, EngineError> {
        self.registry.get(id).ok_or(EngineError::NotFound(id))
    }

    pub async fn kill_pipeline(&self, id: u64) -> Result<Arc<Pipeline>, EngineError> {
        let pipeline = self.get_pipeline(id)?;
        pipeline.kill().await?;
        Ok(pipeline)
    }

    pub fn host_info(&self) -> HostInfo {
        let cpu_usage = self.cpu_usage.load();
        host_info::report(
            &self.tags,
            EngineFigures {
                cpu_usage: &cpu_usage,
                active_tasks: self.tasks.active(),
                num_pipelines: self.registry.len(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::{CpuTimes, SampleError};

    fn shell_engine() -> Engine {
        Engine::with_capabilities(
            PathBuf::from("/bin/sh"),
            Capabilities::default(),
            BTreeMap::from([("role".to_string(), "test".to_string())]),
        )
    }

    fn sh(script: &str) -> (String, Vec<String>) {
        (script.to_string(), vec!["-c".to_string()])
    }

    async fn wait_for(pipeline: &Pipeline, status: PipelineStatus) {
        for _ in 0..200 {
            if pipeline.status() == status {
                return;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        panic!(
            "pipeline {} stuck in {} waiting for {}",
            pipeline.id(),
            pipeline.status(),
            status
        );
    }

    #[tokio::test]
    async fn test_identifiers_increase() {
        let engine = shell_engine();
        let (script, params) = sh("true");
        let first = engine
            .create_pipeline(script.clone(), params.clone(), Duration::ZERO)
            .await
            .unwrap();
        let second = engine
            .create_pipeline(script, params, Duration::ZERO)
            .await
            .unwrap();

        assert_eq!(first.id(), 0);
        assert_eq!(second.id(), 1);
        assert_eq!(engine.list_pipelines(|_| true), vec![0, 1]);
    }

    #[tokio::test]
    async fn test_finished_pipeline_end_to_end() {
        let engine = shell_engine();
        let (script, params) = sh("echo processed 42 samples");
        let pipeline = engine
            .create_pipeline(script, params, Duration::ZERO)
            .await
            .unwrap();

        wait_for(&pipeline, PipelineStatus::Finished).await;
        let fetched = engine.get_pipeline(pipeline.id()).unwrap();
        let output = String::from_utf8(fetched.output().unwrap()).unwrap();
        assert!(output.contains("processed 42 samples"));
        assert!(fetched.info().errors.is_empty());
    }

    #[tokio::test]
    async fn test_failing_pipeline_end_to_end() {
        let engine = shell_engine();
        let (script, params) = sh("exit 2");
        let pipeline = engine
            .create_pipeline(script, params, Duration::ZERO)
            .await
            .unwrap();

        wait_for(&pipeline, PipelineStatus::Failed).await;
        assert!(!pipeline.info().errors.is_empty());
    }

    #[tokio::test]
    async fn test_kill_end_to_end() {
        let engine = shell_engine();
        let (script, params) = sh("exec sleep 30");
        let pipeline = engine
            .create_pipeline(script, params, Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(pipeline.status(), PipelineStatus::Running);
        assert_eq!(engine.running_pipelines(), vec![pipeline.id()]);

        engine.kill_pipeline(pipeline.id()).await.unwrap();
        assert_ne!(pipeline.status(), PipelineStatus::Running);

        wait_for(&pipeline, PipelineStatus::Killed).await;
        assert!(engine.running_pipelines().is_empty());

        let err = engine.kill_pipeline(pipeline.id()).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Pipeline(PipelineError::NotRunning { .. })
        ));
    }

    #[tokio::test]
    async fn test_failure_within_delay_is_reported() {
        let engine = shell_engine();
        let (script, params) = sh("echo bad script; exit 1");
        let err = engine
            .create_pipeline(script, params, Duration::from_millis(800))
            .await
            .unwrap_err();

        let EngineError::FailedEarly {
            pipeline, output, ..
        } = err
        else {
            panic!("expected a different error variant");
        };
        assert_eq!(pipeline.status, PipelineStatus::Failed);
        assert!(output.contains("bad script"));
        // Still registered for later inspection
        assert!(engine.get_pipeline(pipeline.id).is_ok());
    }

    #[tokio::test]
    async fn test_running_pipeline_passes_delay() {
        let engine = shell_engine();
        let (script, params) = sh("exec sleep 30");
        let pipeline = engine
            .create_pipeline(script, params, Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(pipeline.status(), PipelineStatus::Running);
        engine.kill_pipeline(pipeline.id()).await.unwrap();
    }

    #[tokio::test]
    async fn test_launch_failure_is_registered() {
        let engine = Engine::with_capabilities(
            PathBuf::from("/nonexistent/pipeline"),
            Capabilities::default(),
            BTreeMap::new(),
        );
        let err = engine
            .create_pipeline("a -> b".to_string(), Vec::new(), Duration::from_secs(5))
            .await
            .unwrap_err();

        let EngineError::Launch { pipeline, .. } = err else {
            panic!("expected a different error variant");
        };
        assert_eq!(pipeline.id, 0);
        assert_eq!(
            engine.get_pipeline(0).unwrap().status(),
            PipelineStatus::Failed
        );
    }

    #[test]
    fn test_unknown_pipeline() {
        let engine = shell_engine();
        assert!(matches!(
            engine.get_pipeline(17),
            Err(EngineError::NotFound(17))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_creation_yields_distinct_ids() {
        let engine = Arc::new(shell_engine());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move {
                let (script, params) = sh("true");
                engine
                    .create_pipeline(script, params, Duration::ZERO)
                    .await
                    .unwrap()
                    .id()
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        ids.sort_unstable();
        assert_eq!(ids, (0..16).collect::<Vec<u64>>());
        assert_eq!(engine.list_pipelines(|_| true), ids);
    }

    struct FixedCores(u64);

    impl CpuTimesSource for FixedCores {
        fn per_core(&mut self) -> Result<Vec<CpuTimes>, SampleError> {
            self.0 += 1;
            let times = CpuTimes {
                user: (self.0 * 10) as f64,
                idle: (self.0 * 30) as f64,
                ..CpuTimes::default()
            };
            Ok(vec![times; 2])
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_host_info_includes_cpu_snapshot() {
        let engine = shell_engine();
        assert!(engine.host_info().used_cpu_cores.is_empty());

        let sampler = engine.start_sampler(FixedCores(0), Duration::from_secs(1));
        tokio::time::sleep(Duration::from_millis(1500)).await;

        let info = engine.host_info();
        assert_eq!(info.used_cpu_cores, vec![25.0, 25.0]);
        assert_eq!(info.used_cpu, 25.0);
        assert_eq!(info.tags.get("role").map(String::as_str), Some("test"));
        assert!(info.active_tasks >= 1);

        sampler.abort();
    }
}
