//! Host-related API endpoints

use crate::AgentClient;
use crate::error::Result;
use pipevisor_core::domain::capabilities::Capabilities;
use pipevisor_core::domain::host::HostInfo;

impl AgentClient {
    /// Processing steps supported by the agent's executable
    pub async fn capabilities(&self) -> Result<Capabilities> {
        let url = format!("{}/capabilities", self.base_url);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Host facts and current resource usage
    pub async fn host_info(&self) -> Result<HostInfo> {
        let url = format!("{}/info", self.base_url);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Whether the agent answers its health check
    pub async fn health(&self) -> Result<()> {
        let url = format!("{}/health", self.base_url);
        let response = self.client.get(&url).send().await?;

        self.handle_bytes_response(response).await.map(|_| ())
    }
}
