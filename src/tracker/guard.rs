//! Client-side duplicate-deployment prevention.
//!
//! The check scans a cached copy of the deployment list, so a concurrent
//! creation elsewhere can still slip through; the backend stays the final
//! authority and its rejection comes back as an ordinary creation error.

use std::sync::{Arc, Mutex};

use tracing::info;

use crate::api::models::{CreateDeploymentRequest, Deployment, DeploymentStatus};
use crate::api::OpsApi;
use crate::error::TrackerError;

/// Which versions of an app may receive a new deployment right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionAvailability {
    /// The app has no versions at all.
    NoVersions,
    /// Every version already has a pending or running deployment.
    AllPending,
    /// Versions currently eligible for a new deployment.
    Ready(Vec<String>),
}

pub struct DeploymentGuard {
    api: Arc<dyn OpsApi>,
    deployments: Mutex<Vec<Deployment>>,
}

impl DeploymentGuard {
    pub fn new(api: Arc<dyn OpsApi>) -> Self {
        Self {
            api,
            deployments: Mutex::new(Vec::new()),
        }
    }

    /// Re-fetch the authoritative deployment list into the cache. Call after
    /// create/delete/complete events; reads in between may be stale.
    pub async fn refresh(&self) -> Result<(), TrackerError> {
        let deployments = self.api.list_deployments().await?;
        *self.deployments.lock().unwrap() = deployments;
        Ok(())
    }

    /// Snapshot of the cached deployment list.
    pub fn deployments(&self) -> Vec<Deployment> {
        self.deployments.lock().unwrap().clone()
    }

    /// Whether the cached list holds a pending or running deployment for the
    /// app and version pair.
    pub fn has_pending_deployment(&self, app_id: &str, version_id: &str) -> bool {
        self.deployments.lock().unwrap().iter().any(|d| {
            d.app_id == app_id
                && d.version_id == version_id
                && matches!(
                    d.status,
                    DeploymentStatus::Pending | DeploymentStatus::Running
                )
        })
    }

    /// Filter `versions` down to those without a pending deployment,
    /// distinguishing "nothing to deploy" from "everything already queued".
    pub fn availability(&self, app_id: &str, versions: &[String]) -> VersionAvailability {
        if versions.is_empty() {
            return VersionAvailability::NoVersions;
        }
        let ready: Vec<String> = versions
            .iter()
            .filter(|v| !self.has_pending_deployment(app_id, v))
            .cloned()
            .collect();
        if ready.is_empty() {
            VersionAvailability::AllPending
        } else {
            VersionAvailability::Ready(ready)
        }
    }

    /// Create a deployment unless one is already pending for the pair.
    ///
    /// The pre-check fails fast with [`TrackerError::AlreadyPending`] and
    /// never issues a network call; a backend rejection of a racing
    /// duplicate surfaces as a transport error without touching the cache.
    pub async fn create_deployment(
        &self,
        app_id: &str,
        version_id: &str,
    ) -> Result<Deployment, TrackerError> {
        if self.has_pending_deployment(app_id, version_id) {
            return Err(TrackerError::AlreadyPending {
                app_id: app_id.to_string(),
                version_id: version_id.to_string(),
            });
        }

        let request = CreateDeploymentRequest {
            app_id: app_id.to_string(),
            version_id: version_id.to_string(),
        };
        let deployment = self.api.create_deployment(&request).await?;
        info!(
            "Created deployment '{}' for app '{}' version '{}'",
            deployment.id, app_id, version_id
        );

        self.deployments.lock().unwrap().push(deployment.clone());
        Ok(deployment)
    }

    pub async fn delete_deployment(&self, id: &str) -> Result<(), TrackerError> {
        self.api.delete_deployment(id).await?;
        self.deployments.lock().unwrap().retain(|d| d.id != id);
        info!("Deleted deployment '{}'", id);
        Ok(())
    }
}
