//! Pipeline API Handlers
//!
//! HTTP endpoints for creating, inspecting and killing pipelines.

use axum::{
    Json,
    extract::{Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use pipevisor_core::domain::pipeline::PipelineInfo;
use pipevisor_core::dto::pipeline::CreatePipeline;
use std::time::Duration;

use crate::api::AppState;
use crate::api::error::{ApiError, ApiResult};

fn parse_id(raw: &str) -> ApiResult<u64> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("Failed to parse pipeline id: {}", raw)))
}

/// GET /pipelines
pub async fn list_pipelines(State(state): State<AppState>) -> Json<Vec<u64>> {
    tracing::debug!("Listing all pipelines");
    Json(state.engine.list_pipelines(|_| true))
}

/// GET /running
pub async fn list_running(State(state): State<AppState>) -> Json<Vec<u64>> {
    tracing::debug!("Listing running pipelines");
    Json(state.engine.running_pipelines())
}

/// POST /pipeline
/// Create and start a pipeline, waiting `delay_ms` for an early failure
pub async fn create_pipeline(
    State(state): State<AppState>,
    Json(req): Json<CreatePipeline>,
) -> ApiResult<(StatusCode, Json<PipelineInfo>)> {
    if req.script.trim().is_empty() {
        return Err(ApiError::BadRequest("Missing pipeline script".to_string()));
    }

    let delay = match req.delay_ms {
        Some(ms) => Duration::from_millis(ms),
        None => state.default_delay,
    };
    if delay > state.max_delay {
        return Err(ApiError::BadRequest(format!(
            "Delay of {:?} exceeds the maximum of {:?}",
            delay, state.max_delay
        )));
    }

    tracing::info!("Creating pipeline (delay: {:?})", delay);

    let pipeline = state
        .engine
        .create_pipeline(req.script, req.extra_params, delay)
        .await?;

    Ok((StatusCode::CREATED, Json(pipeline.info())))
}

/// GET /pipeline/{id}
pub async fn get_pipeline(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<PipelineInfo>> {
    let id = parse_id(&id)?;
    tracing::debug!("Getting pipeline: {}", id);

    let pipeline = state.engine.get_pipeline(id)?;
    Ok(Json(pipeline.info()))
}

/// GET /pipeline/{id}/out
/// Raw bytes captured from the process so far
pub async fn get_output(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_id(&id)?;
    tracing::debug!("Getting output of pipeline: {}", id);

    let output = state.engine.get_pipeline(id)?.output()?;
    Ok(([(header::CONTENT_TYPE, "application/octet-stream")], output))
}

/// DELETE /pipeline/{id}
/// Kill a running pipeline
pub async fn kill_pipeline(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<PipelineInfo>> {
    let id = parse_id(&id)?;
    tracing::info!("Killing pipeline: {}", id);

    let pipeline = state.engine.kill_pipeline(id).await?;
    Ok(Json(pipeline.info()))
}
