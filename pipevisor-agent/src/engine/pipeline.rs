//! Pipeline instance
//!
//! One invocation of the pipeline executable. The instance owns its status,
//! error log and captured output behind a single lock; every transition
//! happens under that lock so start, kill and the completion watcher never
//! interleave.
//!
//! Once started, a dedicated watcher task owns the child process. It is the
//! only code that reaps the process, and it reports back exclusively by
//! mutating this instance's state.

use chrono::{DateTime, Utc};
use pipevisor_core::domain::pipeline::{PipelineInfo, PipelineStatus};
use std::fmt::Display;
use std::io;
use std::os::fd::OwnedFd;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::unix::pipe;
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::tasks::TaskGauge;

/// How long the watcher waits for output capture to drain after the
/// process exited before publishing the final status
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

const CAPTURE_CHUNK_SIZE: usize = 8 * 1024;

/// A kill request carries the channel the watcher answers on
type KillRequest = oneshot::Sender<io::Result<()>>;

/// Errors returned by pipeline operations
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("pipeline {id} has already been started")]
    AlreadyStarted { id: u64 },

    #[error("pipeline {id} is not running ({status})")]
    NotRunning { id: u64, status: PipelineStatus },

    #[error("pipeline {id} has not been started yet")]
    NotStarted { id: u64 },

    #[error("failed to launch process of pipeline {id}: {source}")]
    Spawn {
        id: u64,
        #[source]
        source: io::Error,
    },

    #[error("failed to kill process of pipeline {id}: {source}")]
    Kill {
        id: u64,
        #[source]
        source: io::Error,
    },
}

struct PipelineState {
    status: PipelineStatus,
    errors: String,
    output: Vec<u8>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    /// Present while the watcher is waiting on the process
    kill_tx: Option<oneshot::Sender<KillRequest>>,
}

impl PipelineState {
    fn transition(&mut self, id: u64, next: PipelineStatus) {
        if !self.status.can_transition_to(next) {
            warn!(
                "Refusing status change of pipeline {} from {} to {}",
                id, self.status, next
            );
            return;
        }
        debug!("Pipeline {} status {} -> {}", id, self.status, next);
        self.status = next;
        if next.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
    }

    fn record_error(&mut self, message: impl Display) {
        if !self.errors.is_empty() {
            self.errors.push('\n');
        }
        self.errors.push_str(&message.to_string());
    }
}

/// A supervised invocation of the pipeline executable
pub struct Pipeline {
    id: u64,
    script: String,
    extra_params: Vec<String>,
    created_at: DateTime<Utc>,
    state: Mutex<PipelineState>,
    tasks: TaskGauge,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("id", &self.id)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Creates a pipeline in `created` state; no process is spawned yet
    pub fn new(id: u64, script: String, extra_params: Vec<String>, tasks: TaskGauge) -> Arc<Self> {
        Arc::new(Self {
            id,
            script,
            extra_params,
            created_at: Utc::now(),
            state: Mutex::new(PipelineState {
                status: PipelineStatus::Created,
                errors: String::new(),
                output: Vec::new(),
                started_at: None,
                finished_at: None,
                kill_tx: None,
            }),
            tasks,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn status(&self) -> PipelineStatus {
        self.lock().status
    }

    /// Consistent snapshot of everything except the captured output
    pub fn info(&self) -> PipelineInfo {
        let state = self.lock();
        PipelineInfo {
            id: self.id,
            script: self.script.clone(),
            extra_params: self.extra_params.clone(),
            status: state.status,
            errors: state.errors.clone(),
            created_at: self.created_at,
            started_at: state.started_at,
            finished_at: state.finished_at,
        }
    }

    /// Output captured so far
    ///
    /// Successive calls return prefix-extensions of each other.
    pub fn output(&self) -> Result<Vec<u8>, PipelineError> {
        let state = self.lock();
        if state.status == PipelineStatus::Created {
            return Err(PipelineError::NotStarted { id: self.id });
        }
        Ok(state.output.clone())
    }

    /// Spawns the executable and hands the child to a completion watcher
    ///
    /// Must be called from within a Tokio runtime. A launch failure moves
    /// the pipeline to `failed` and is also returned.
    pub fn start(self: &Arc<Self>, executable: &Path) -> Result<(), PipelineError> {
        let mut state = self.lock();
        if state.status != PipelineStatus::Created {
            return Err(PipelineError::AlreadyStarted { id: self.id });
        }

        state.started_at = Some(Utc::now());
        let (child, output) = match self.spawn(executable) {
            Ok(spawned) => spawned,
            Err(source) => {
                warn!("Failed to launch pipeline {}: {}", self.id, source);
                state.record_error(&source);
                state.transition(self.id, PipelineStatus::Failed);
                return Err(PipelineError::Spawn { id: self.id, source });
            }
        };
        let capture = self.tasks.spawn(self.clone().capture(output));

        let (kill_tx, kill_rx) = oneshot::channel();
        state.kill_tx = Some(kill_tx);
        state.transition(self.id, PipelineStatus::Running);
        info!(
            "Started pipeline {} (pid {})",
            self.id,
            child.id().map_or_else(|| "unknown".to_string(), |pid| pid.to_string())
        );

        self.tasks.spawn(self.clone().watch(child, kill_rx, capture));
        Ok(())
    }

    /// Requests termination of the running process
    ///
    /// The pipeline moves to `killing` immediately; the watcher moves it to
    /// `killed` once the process has actually exited. If the termination
    /// request fails the error is recorded, the pipeline stays in `killing`
    /// and the failure is returned.
    pub async fn kill(&self) -> Result<(), PipelineError> {
        let kill_tx = {
            let mut state = self.lock();
            if state.status != PipelineStatus::Running {
                return Err(PipelineError::NotRunning {
                    id: self.id,
                    status: state.status,
                });
            }
            state.transition(self.id, PipelineStatus::Killing);
            state.kill_tx.take()
        };

        let Some(kill_tx) = kill_tx else {
            debug!("Pipeline {} has no watcher to signal", self.id);
            return Ok(());
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        if kill_tx.send(reply_tx).is_err() {
            debug!("Pipeline {} exited before the kill request arrived", self.id);
            return Ok(());
        }

        match reply_rx.await {
            Ok(Ok(())) => {
                info!("Kill signal sent to pipeline {}", self.id);
                Ok(())
            }
            Ok(Err(source)) => {
                warn!("Failed to kill pipeline {}: {}", self.id, source);
                self.lock()
                    .record_error(format!("failed to kill process: {source}"));
                Err(PipelineError::Kill { id: self.id, source })
            }
            // The watcher observed the exit first and dropped the request
            Err(_) => Ok(()),
        }
    }

    fn command(&self, executable: &Path) -> Command {
        let mut command = Command::new(executable);
        command
            .args(&self.extra_params)
            // The leading space keeps a script starting with '-' from being
            // parsed as a flag
            .arg(format!(" {}", self.script))
            .stdin(Stdio::null());
        command
    }

    /// Launches the process with stdout and stderr sharing one pipe, so the
    /// captured output keeps the order in which the process wrote it
    fn spawn(&self, executable: &Path) -> io::Result<(Child, pipe::Receiver)> {
        let (reader, writer) = io::pipe()?;
        let output = pipe::Receiver::from_owned_fd(OwnedFd::from(reader))?;

        let mut command = self.command(executable);
        command.stdout(writer.try_clone()?).stderr(writer);
        let child = command.spawn()?;
        // Our copies of the write end live in `command`; EOF needs them closed
        drop(command);

        Ok((child, output))
    }

    /// Appends everything read from `reader` to the output buffer
    async fn capture<R>(self: Arc<Self>, mut reader: R)
    where
        R: AsyncRead + Unpin,
    {
        let mut chunk = vec![0u8; CAPTURE_CHUNK_SIZE];
        loop {
            match reader.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => self.lock().output.extend_from_slice(&chunk[..n]),
                Err(e) => {
                    warn!("Failed to read output of pipeline {}: {}", self.id, e);
                    break;
                }
            }
        }
    }

    /// Waits for the process to exit, serving at most one kill request
    async fn watch(
        self: Arc<Self>,
        mut child: Child,
        mut kill_rx: oneshot::Receiver<KillRequest>,
        capture: JoinHandle<()>,
    ) {
        let result = tokio::select! {
            result = child.wait() => result,
            Ok(reply) = &mut kill_rx => {
                let _ = reply.send(child.start_kill());
                child.wait().await
            }
        };
        // Dropping the receiver answers a request that arrived too late
        drop(kill_rx);

        let drained = tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, capture).await;
        if drained.is_err() {
            debug!(
                "Output of pipeline {} still open after exit, finalizing anyway",
                self.id
            );
        }

        self.finish(result);
    }

    fn finish(&self, result: io::Result<ExitStatus>) {
        let mut state = self.lock();
        state.kill_tx = None;

        let failure = match &result {
            Ok(status) if status.success() => None,
            Ok(status) => Some(status.to_string()),
            Err(e) => Some(format!("failed to wait for process: {e}")),
        };

        let next = match (state.status, &failure) {
            (PipelineStatus::Killing, _) => PipelineStatus::Killed,
            (_, None) => PipelineStatus::Finished,
            (_, Some(_)) => PipelineStatus::Failed,
        };
        if let Some(failure) = failure {
            state.record_error(failure);
        }
        state.transition(self.id, next);

        info!("Pipeline {} {}", self.id, state.status);
    }

    fn lock(&self) -> MutexGuard<'_, PipelineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
