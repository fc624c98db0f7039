//! API Module
//!
//! HTTP management surface of the agent. Each submodule handles endpoints
//! for a specific concern.

pub mod error;
pub mod health;
pub mod host;
pub mod pipeline;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

use crate::engine::Engine;

/// Shared state of every handler
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    /// Creation delay used when a request does not specify one
    pub default_delay: Duration,
    /// Longest creation delay a request may ask for
    pub max_delay: Duration,
}

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/capabilities", get(host::get_capabilities))
        .route("/info", get(host::get_info))
        // Pipeline endpoints
        .route("/pipelines", get(pipeline::list_pipelines))
        .route("/running", get(pipeline::list_running))
        .route("/pipeline", post(pipeline::create_pipeline))
        .route(
            "/pipeline/{id}",
            get(pipeline::get_pipeline).delete(pipeline::kill_pipeline),
        )
        .route("/pipeline/{id}/out", get(pipeline::get_output))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
