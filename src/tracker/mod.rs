//! Long-running-operation tracking.
//!
//! One tracked operation is a step log plus a progress subscription, keyed
//! by target. Status is always derived from the log, never stored. The
//! pieces: [`steps`] evaluates a log, [`registry`] owns the in-flight
//! operations, [`guard`] prevents duplicate deployments, [`poller`] follows
//! an in-flight deployment record, and [`gate`] decides whether a bound UI
//! surface may close.

pub mod gate;
pub mod guard;
pub mod poller;
pub mod registry;
pub mod steps;

pub use gate::{CloseOutcome, ProgressGate};
pub use guard::{DeploymentGuard, VersionAvailability};
pub use poller::LogPoller;
pub use registry::{OperationFinished, OperationTracker, Subscription};
pub use steps::StepLog;
