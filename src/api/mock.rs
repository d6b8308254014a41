//! Channel-driven in-memory transport for the tracker tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use tokio::sync::mpsc;

use super::models::{
    CreateDeploymentRequest, Deployment, DeploymentStatus, OperationKind, Step, StepStatus,
};
use super::{OpsApi, StepStream};

pub(crate) fn step(step: &str, status: StepStatus) -> Step {
    Step {
        step: step.to_string(),
        status,
        message: String::new(),
        details: None,
        progress_pct: None,
        timestamp: Utc::now(),
    }
}

pub(crate) fn deployment(
    id: &str,
    app_id: &str,
    version_id: &str,
    status: DeploymentStatus,
) -> Deployment {
    Deployment {
        id: id.to_string(),
        app_id: app_id.to_string(),
        version_id: version_id.to_string(),
        status,
        started_at: None,
        completed_at: None,
        logs: None,
    }
}

#[derive(Default)]
pub(crate) struct MockApi {
    /// Senders for open subscriptions, keyed by target id.
    subscriptions: Mutex<HashMap<String, mpsc::UnboundedSender<Step>>>,
    pub(crate) deployments: Mutex<Vec<Deployment>>,
    /// Scripted responses for `fetch_deployment`, consumed front to back.
    pub(crate) fetch_script: Mutex<VecDeque<Deployment>>,
    pub(crate) fetch_calls: AtomicUsize,
    pub(crate) create_calls: AtomicUsize,
    pub(crate) fail_start: AtomicBool,
    pub(crate) fail_create: AtomicBool,
}

impl MockApi {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Push a step into the open subscription for `target`. Dropped silently
    /// when nothing is subscribed, like a broker with no consumers.
    pub(crate) fn emit(&self, target: &str, s: Step) {
        if let Some(tx) = self.subscriptions.lock().unwrap().get(target) {
            let _ = tx.send(s);
        }
    }
}

#[async_trait]
impl OpsApi for MockApi {
    async fn start_operation(&self, target_id: &str, _kind: OperationKind) -> Result<()> {
        if self.fail_start.load(Ordering::SeqCst) {
            bail!("start rejected for '{}'", target_id);
        }
        Ok(())
    }

    async fn subscribe_steps(&self, target_id: &str, _kind: OperationKind) -> Result<StepStream> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscriptions
            .lock()
            .unwrap()
            .insert(target_id.to_string(), tx);
        let stream = futures::stream::unfold(rx, |mut rx| async move {
            let step = rx.recv().await?;
            Some((Ok::<_, anyhow::Error>(step), rx))
        });
        Ok(stream.boxed())
    }

    async fn fetch_deployment(&self, id: &str) -> Result<Deployment> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        match self.fetch_script.lock().unwrap().pop_front() {
            Some(d) => Ok(d),
            None => bail!("no scripted response for deployment '{}'", id),
        }
    }

    async fn list_deployments(&self) -> Result<Vec<Deployment>> {
        Ok(self.deployments.lock().unwrap().clone())
    }

    async fn create_deployment(&self, request: &CreateDeploymentRequest) -> Result<Deployment> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_create.load(Ordering::SeqCst) {
            bail!("backend rejected deployment for app '{}'", request.app_id);
        }
        Ok(deployment(
            "dep-new",
            &request.app_id,
            &request.version_id,
            DeploymentStatus::Pending,
        ))
    }

    async fn delete_deployment(&self, _id: &str) -> Result<()> {
        Ok(())
    }
}
