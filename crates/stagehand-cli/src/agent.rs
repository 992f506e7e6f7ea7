//! HTTP client for the in-cluster agent's rollout status endpoint.

use async_trait::async_trait;
use reqwest::Client;
use stagehand_core::status::{AgentStatusSource, DeploymentStatusReport};
use stagehand_core::{Result, StagehandError};
use std::time::Duration;
use tracing::debug;

const STATUS_PATH: &str = "/deployment-status";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct HttpStatusSource {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpStatusSource {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| StagehandError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    fn url(&self) -> String {
        format!("{}{STATUS_PATH}", self.base_url)
    }
}

#[async_trait]
impl AgentStatusSource for HttpStatusSource {
    async fn deployment_status(&self) -> Result<DeploymentStatusReport> {
        let url = self.url();
        debug!(url = %url, "fetching deployment status");

        let mut request = self.client.get(&url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|e| StagehandError::Poll(format!("GET {url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StagehandError::Poll(format!("GET {url}: HTTP {status}")));
        }
        response
            .json::<DeploymentStatusReport>()
            .await
            .map_err(|e| StagehandError::Poll(format!("GET {url}: invalid status body: {e}")))
    }
}
