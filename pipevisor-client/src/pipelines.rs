//! Pipeline-related API endpoints

use crate::AgentClient;
use crate::error::Result;
use pipevisor_core::domain::pipeline::PipelineInfo;
use pipevisor_core::dto::pipeline::CreatePipeline;

impl AgentClient {
    // =============================================================================
    // Pipeline Management
    // =============================================================================

    /// Create and start a pipeline
    ///
    /// Fails with a 400 [`ApiError`](crate::ClientError::ApiError) if the
    /// pipeline could not be launched or failed within the requested delay.
    pub async fn create_pipeline(&self, req: &CreatePipeline) -> Result<PipelineInfo> {
        let url = format!("{}/pipeline", self.base_url);
        let response = self.client.post(&url).json(req).send().await?;

        self.handle_response(response).await
    }

    /// Identifiers of every known pipeline, ascending
    pub async fn list_pipelines(&self) -> Result<Vec<u64>> {
        let url = format!("{}/pipelines", self.base_url);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Identifiers of the running pipelines, ascending
    pub async fn list_running(&self) -> Result<Vec<u64>> {
        let url = format!("{}/running", self.base_url);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    pub async fn get_pipeline(&self, id: u64) -> Result<PipelineInfo> {
        let url = format!("{}/pipeline/{}", self.base_url, id);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Output captured from the pipeline so far
    pub async fn get_output(&self, id: u64) -> Result<Vec<u8>> {
        let url = format!("{}/pipeline/{}/out", self.base_url, id);
        let response = self.client.get(&url).send().await?;

        self.handle_bytes_response(response).await
    }

    /// Kill a running pipeline
    ///
    /// Returns the pipeline as of right after the request, normally in the
    /// `killing` state.
    pub async fn kill_pipeline(&self, id: u64) -> Result<PipelineInfo> {
        let url = format!("{}/pipeline/{}", self.base_url, id);
        let response = self.client.delete(&url).send().await?;

        self.handle_response(response).await
    }
}
