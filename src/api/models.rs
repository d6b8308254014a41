//! Shared API request/response types
//!
//! Mirrors of the entities exchanged with the console backend. The backend
//! owns these records; the tracker only reads them and reacts to their
//! status fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sentinel `step` identifier the backend emits as the final step of an
/// operation that ran to the end.
pub const COMPLETE_STEP: &str = "complete";

/// Status reported by a single progress step.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Running,
    Success,
    Failed,
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepStatus::Running => write!(f, "running"),
            StepStatus::Success => write!(f, "success"),
            StepStatus::Failed => write!(f, "failed"),
        }
    }
}

/// One reported unit of progress within a remote operation.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Step {
    /// Identifier of the phase (e.g. "connect", "install_packages").
    /// Opaque; compared by equality only.
    pub step: String,
    pub status: StepStatus,
    /// Short human-readable text.
    pub message: String,
    /// Optional long-form text (command output, stack traces).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// 0-100. Monotonic non-decreasing by convention, not enforced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_pct: Option<u8>,
    pub timestamp: DateTime<Utc>,
}

/// Kind of long-running remote operation the console can launch.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// Initial provisioning of a remote host.
    Setup,
    /// Security hardening of an already provisioned host.
    Security,
    /// Rollout of a versioned application bundle.
    Deploy,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationKind::Setup => write!(f, "setup"),
            OperationKind::Security => write!(f, "security"),
            OperationKind::Deploy => write!(f, "deploy"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    #[default]
    Pending,
    Running,
    Success,
    Failed,
}

impl DeploymentStatus {
    /// Terminal statuses allow no further transitions; polling stops here.
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeploymentStatus::Success | DeploymentStatus::Failed)
    }
}

impl std::fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeploymentStatus::Pending => write!(f, "pending"),
            DeploymentStatus::Running => write!(f, "running"),
            DeploymentStatus::Success => write!(f, "success"),
            DeploymentStatus::Failed => write!(f, "failed"),
        }
    }
}

/// A deployment record as the backend reports it.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Deployment {
    pub id: String,
    pub app_id: String,
    pub version_id: String,
    #[serde(default)]
    pub status: DeploymentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    /// Accumulated log text, refreshed on every fetch while the deployment
    /// is in flight.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logs: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CreateDeploymentRequest {
    pub app_id: String,
    pub version_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_round_trips_through_json() {
        let json = r#"{
            "step": "install_packages",
            "status": "running",
            "message": "Installing base packages",
            "progress_pct": 40,
            "timestamp": "2026-05-01T12:00:00Z"
        }"#;
        let step: Step = serde_json::from_str(json).unwrap();
        assert_eq!(step.step, "install_packages");
        assert_eq!(step.status, StepStatus::Running);
        assert_eq!(step.progress_pct, Some(40));
        assert!(step.details.is_none());
    }

    #[test]
    fn deployment_status_terminality() {
        assert!(DeploymentStatus::Success.is_terminal());
        assert!(DeploymentStatus::Failed.is_terminal());
        assert!(!DeploymentStatus::Pending.is_terminal());
        assert!(!DeploymentStatus::Running.is_terminal());
    }

    #[test]
    fn statuses_use_lowercase_wire_names() {
        assert_eq!(
            serde_json::to_string(&StepStatus::Failed).unwrap(),
            "\"failed\""
        );
        assert_eq!(
            serde_json::to_string(&DeploymentStatus::Running).unwrap(),
            "\"running\""
        );
        assert_eq!(
            serde_json::to_string(&OperationKind::Security).unwrap(),
            "\"security\""
        );
    }
}
