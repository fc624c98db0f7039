//! Background task accounting
//!
//! Every task the engine spawns goes through [`TaskGauge::spawn`] so the
//! number of in-flight tasks can be reported as a health signal.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::task::JoinHandle;

/// Counts tasks that are still alive
#[derive(Debug, Clone, Default)]
pub struct TaskGauge {
    active: Arc<AtomicUsize>,
}

impl TaskGauge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns `future` on the current runtime and tracks it until it
    /// completes or is dropped
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let guard = self.enter();
        tokio::spawn(async move {
            let _guard = guard;
            future.await
        })
    }

    /// Number of tracked tasks still alive
    pub fn active(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    fn enter(&self) -> TaskGuard {
        self.active.fetch_add(1, Ordering::Relaxed);
        TaskGuard {
            active: self.active.clone(),
        }
    }
}

struct TaskGuard {
    active: Arc<AtomicUsize>,
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::Relaxed);
    }
}
