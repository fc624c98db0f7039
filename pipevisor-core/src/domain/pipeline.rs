//! Pipeline domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a supervised pipeline
///
/// ```text
/// created ──> running ──> finished | failed
///    │           └──────> killing ──> killed
///    └──> failed (launch error)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStatus {
    Created,
    Running,
    Finished,
    Failed,
    Killing,
    Killed,
}

impl PipelineStatus {
    /// Whether `next` is a legal successor of this status
    pub fn can_transition_to(self, next: PipelineStatus) -> bool {
        use PipelineStatus::*;
        matches!(
            (self, next),
            (Created, Running)
                | (Created, Failed)
                | (Running, Finished)
                | (Running, Failed)
                | (Running, Killing)
                | (Killing, Killed)
        )
    }

    /// Terminal statuses never change again
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PipelineStatus::Finished | PipelineStatus::Failed | PipelineStatus::Killed
        )
    }
}

impl std::fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PipelineStatus::Created => "created",
            PipelineStatus::Running => "running",
            PipelineStatus::Finished => "finished",
            PipelineStatus::Failed => "failed",
            PipelineStatus::Killing => "killing",
            PipelineStatus::Killed => "killed",
        };
        f.write_str(name)
    }
}

/// Point-in-time representation of a pipeline
///
/// Captured output is not part of this structure; it is served separately
/// as raw bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineInfo {
    pub id: u64,
    pub script: String,
    pub extra_params: Vec<String>,
    pub status: PipelineStatus,
    /// Newline separated error messages, empty if none were recorded
    pub errors: String,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}
