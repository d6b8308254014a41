//! Console API transport contract and HTTP client.
//!
//! The tracker talks to the backend only through [`OpsApi`], so tests and
//! alternative transports can stand in for the HTTP client.

pub mod models;

mod http;

#[cfg(test)]
pub(crate) mod mock;

pub use http::HttpOpsClient;

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;

use models::{CreateDeploymentRequest, Deployment, OperationKind, Step};

/// Stream of progress steps for one operation, delivered in emission order.
/// Dropping the stream is the unsubscribe: the backend sees the connection
/// close and stops emitting.
pub type StepStream = BoxStream<'static, Result<Step>>;

/// Remote operations the tracker needs from the console backend.
#[async_trait]
pub trait OpsApi: Send + Sync {
    /// Ask the backend to begin emitting steps for the operation. The
    /// progress subscription is opened separately via [`subscribe_steps`];
    /// open it first so no early step is missed.
    ///
    /// [`subscribe_steps`]: OpsApi::subscribe_steps
    async fn start_operation(&self, target_id: &str, kind: OperationKind) -> Result<()>;

    /// Open a progress subscription for the target.
    async fn subscribe_steps(&self, target_id: &str, kind: OperationKind) -> Result<StepStream>;

    async fn fetch_deployment(&self, id: &str) -> Result<Deployment>;

    async fn list_deployments(&self) -> Result<Vec<Deployment>>;

    async fn create_deployment(&self, request: &CreateDeploymentRequest) -> Result<Deployment>;

    async fn delete_deployment(&self, id: &str) -> Result<()>;
}
