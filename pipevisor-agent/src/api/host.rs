//! Host API Handlers
//!
//! Capability catalog and host information.

use axum::{Json, extract::State};
use pipevisor_core::domain::capabilities::Capabilities;
use pipevisor_core::domain::host::HostInfo;

use crate::api::AppState;

/// GET /capabilities
pub async fn get_capabilities(State(state): State<AppState>) -> Json<Capabilities> {
    tracing::debug!("Reporting capabilities");
    Json(state.engine.capabilities().clone())
}

/// GET /info
pub async fn get_info(State(state): State<AppState>) -> Json<HostInfo> {
    tracing::debug!("Reporting host info");
    Json(state.engine.host_info())
}
