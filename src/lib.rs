//! Progress tracking for the Opsdeck console.
//!
//! The console launches multi-step remote operations against its hosts:
//! initial server setup, security hardening, and deployment of versioned
//! application bundles. The backend performs the work and pushes discrete
//! progress steps; this crate subscribes to those steps, derives a live
//! running/failed/complete status purely from the accumulated history,
//! prevents duplicate concurrent operations against one target, follows
//! in-flight deployment records, and decides when an observing surface may
//! be dismissed.
//!
//! The backend is reached only through [`api::OpsApi`]; [`api::HttpOpsClient`]
//! is the stock HTTP implementation.

pub mod api;
pub mod error;
pub mod settings;
pub mod tracker;

pub use api::models::{
    CreateDeploymentRequest, Deployment, DeploymentStatus, OperationKind, Step, StepStatus,
};
pub use api::{HttpOpsClient, OpsApi, StepStream};
pub use error::TrackerError;
pub use settings::TrackerSettings;
pub use tracker::{
    CloseOutcome, DeploymentGuard, LogPoller, OperationFinished, OperationTracker, ProgressGate,
    StepLog, VersionAvailability,
};
