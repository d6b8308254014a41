//! HTTP implementation of the console API.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use tracing::debug;

use super::models::{CreateDeploymentRequest, Deployment, OperationKind, Step};
use super::{OpsApi, StepStream};

/// Client for the console backend.
///
/// Long-running operations are started with a POST to the operation resource
/// and observed through a server-sent-events stream at the sibling
/// `/progress` endpoint.
#[derive(Clone)]
pub struct HttpOpsClient {
    http: Client,
    base_url: String,
    token: String,
}

impl HttpOpsClient {
    pub fn new(http: Client, base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            http,
            base_url,
            token: token.into(),
        }
    }

    /// Host provisioning lives under the server resource, deployment rollout
    /// under the deployment resource.
    fn operation_url(&self, target_id: &str, kind: OperationKind) -> String {
        match kind {
            OperationKind::Setup => {
                format!("{}/api/v1/servers/{}/setup", self.base_url, target_id)
            }
            OperationKind::Security => {
                format!("{}/api/v1/servers/{}/security", self.base_url, target_id)
            }
            OperationKind::Deploy => {
                format!("{}/api/v1/deployments/{}/deploy", self.base_url, target_id)
            }
        }
    }
}

/// Parse one server-sent-events line into a progress step, if it carries one.
/// Keep-alive comments (leading ':') and empty data lines are skipped.
fn parse_sse_line(line: &str) -> Option<Result<Step>> {
    let line = line.trim_end();
    let data = line
        .strip_prefix("data: ")
        .or_else(|| line.strip_prefix("data:"))?;
    if data.is_empty() {
        return None;
    }
    Some(serde_json::from_str::<Step>(data).context("Failed to parse progress step"))
}

#[async_trait]
impl OpsApi for HttpOpsClient {
    async fn start_operation(&self, target_id: &str, kind: OperationKind) -> Result<()> {
        let url = self.operation_url(target_id, kind);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .with_context(|| format!("Failed to start {} operation", kind))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            bail!(
                "Failed to start {} for '{}' ({}): {}",
                kind,
                target_id,
                status,
                error_text
            );
        }

        Ok(())
    }

    async fn subscribe_steps(&self, target_id: &str, kind: OperationKind) -> Result<StepStream> {
        let url = format!("{}/progress", self.operation_url(target_id, kind));
        debug!("Opening progress subscription: {}", url);

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .context("Failed to open progress subscription")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            bail!(
                "Failed to subscribe to progress ({}): {}",
                status,
                error_text
            );
        }

        let mut bytes = response.bytes_stream();
        let stream = async_stream::try_stream! {
            let mut buffer = String::new();
            while let Some(chunk) = bytes.next().await {
                let chunk = chunk.context("Progress stream error")?;
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(newline_pos) = buffer.find('\n') {
                    let line = buffer.drain(..=newline_pos).collect::<String>();
                    if let Some(step) = parse_sse_line(&line) {
                        yield step?;
                    }
                }
            }

            // Content left without a trailing newline when the stream closes.
            if !buffer.is_empty() {
                if let Some(step) = parse_sse_line(&buffer) {
                    yield step?;
                }
            }
        };

        Ok(stream.boxed())
    }

    async fn fetch_deployment(&self, id: &str) -> Result<Deployment> {
        let url = format!("{}/api/v1/deployments/{}", self.base_url, id);

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .context("Failed to fetch deployment")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            bail!("Failed to fetch deployment ({}): {}", status, error_text);
        }

        let deployment: Deployment = response
            .json()
            .await
            .context("Failed to parse deployment response")?;

        Ok(deployment)
    }

    async fn list_deployments(&self) -> Result<Vec<Deployment>> {
        let url = format!("{}/api/v1/deployments", self.base_url);

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .context("Failed to list deployments")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            bail!("Failed to list deployments ({}): {}", status, error_text);
        }

        let deployments: Vec<Deployment> = response
            .json()
            .await
            .context("Failed to parse deployments")?;

        Ok(deployments)
    }

    async fn create_deployment(&self, request: &CreateDeploymentRequest) -> Result<Deployment> {
        let url = format!("{}/api/v1/deployments", self.base_url);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(request)
            .send()
            .await
            .context("Failed to create deployment")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            bail!("Failed to create deployment ({}): {}", status, error_text);
        }

        let deployment: Deployment = response
            .json()
            .await
            .context("Failed to parse deployment response")?;

        Ok(deployment)
    }

    async fn delete_deployment(&self, id: &str) -> Result<()> {
        let url = format!("{}/api/v1/deployments/{}", self.base_url, id);

        let response = self
            .http
            .delete(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .context("Failed to delete deployment")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            bail!("Failed to delete deployment ({}): {}", status, error_text);
        }

        Ok(())
    }
}
