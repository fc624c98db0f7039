//! Pipeline DTOs

use serde::{Deserialize, Serialize};

/// Request to create and start a new pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePipeline {
    /// Script handed to the pipeline executable as its last argument
    pub script: String,

    /// Arguments placed before the script, in order
    #[serde(default)]
    pub extra_params: Vec<String>,

    /// How long the agent waits for an early failure before answering.
    /// `None` selects the agent's default, `Some(0)` disables the wait.
    #[serde(default)]
    pub delay_ms: Option<u64>,
}

impl CreatePipeline {
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            extra_params: Vec::new(),
            delay_ms: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_pipeline_defaults() {
        let req: CreatePipeline = serde_json::from_str(r#"{"script": "input -> output"}"#).unwrap();
        assert_eq!(req.script, "input -> output");
        assert!(req.extra_params.is_empty());
        assert_eq!(req.delay_ms, None);
    }

    #[test]
    fn test_create_pipeline_full() {
        let req: CreatePipeline = serde_json::from_str(
            r#"{"script": "a -> b", "extra_params": ["-v", "-q"], "delay_ms": 0}"#,
        )
        .unwrap();
        assert_eq!(req.extra_params, vec!["-v", "-q"]);
        assert_eq!(req.delay_ms, Some(0));
    }
}
