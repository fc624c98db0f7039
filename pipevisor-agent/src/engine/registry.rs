//! Registry of supervised pipelines
//!
//! Entries are never removed: every pipeline stays inspectable for the
//! lifetime of the agent. An eviction policy (bounded size or TTL on
//! terminal pipelines) would be added here and nowhere else.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::pipeline::Pipeline;

#[derive(Debug, Default)]
pub struct Registry {
    pipelines: Mutex<HashMap<u64, Arc<Pipeline>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, pipeline: Arc<Pipeline>) {
        self.lock().insert(pipeline.id(), pipeline);
    }

    pub fn get(&self, id: u64) -> Option<Arc<Pipeline>> {
        self.lock().get(&id).cloned()
    }

    /// Clones out every entry so callers can inspect pipelines without
    /// holding the registry lock
    pub fn snapshot(&self) -> Vec<Arc<Pipeline>> {
        self.lock().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u64, Arc<Pipeline>>> {
        self.pipelines.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
