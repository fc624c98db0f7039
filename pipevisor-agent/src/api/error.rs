//! API Error Handling
//!
//! Unified error type and conversion of engine failures into responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use pipevisor_core::domain::pipeline::PipelineInfo;

use crate::engine::{EngineError, PipelineError};

/// API error type
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    InternalError(String),
    /// Creation failed after the pipeline was registered; the caller still
    /// gets its representation
    PipelineFailed {
        message: String,
        pipeline: Box<PipelineInfo>,
    },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, pipeline) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg, None),
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg, None)
            }
            ApiError::PipelineFailed { message, pipeline } => {
                (StatusCode::BAD_REQUEST, message, Some(pipeline))
            }
        };

        let body = match pipeline {
            Some(pipeline) => serde_json::json!({ "error": message, "pipeline": pipeline }),
            None => serde_json::json!({ "error": message }),
        };
        (status, Json(body)).into_response()
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::AlreadyStarted { .. }
            | PipelineError::NotRunning { .. }
            | PipelineError::NotStarted { .. } => ApiError::Conflict(err.to_string()),
            PipelineError::Spawn { .. } | PipelineError::Kill { .. } => {
                ApiError::InternalError(err.to_string())
            }
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        let message = err.to_string();
        match err {
            EngineError::NotFound(_) => ApiError::NotFound(message),
            EngineError::Pipeline(err) => err.into(),
            EngineError::Launch { pipeline, .. } | EngineError::FailedEarly { pipeline, .. } => {
                ApiError::PipelineFailed { message, pipeline }
            }
            EngineError::Capabilities(_) => ApiError::InternalError(message),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
