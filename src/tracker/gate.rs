//! Close gating for progress surfaces.
//!
//! A modal bound to a live operation must not be dismissed while the
//! operation is unresolved. On a permitted close the surface transitions
//! immediately, but the tracked step log is released only after a short
//! grace delay: the visual close precedes the data clear, so an exit
//! animation never renders against already-discarded state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::debug;

use crate::api::models::OperationKind;
use crate::settings::TrackerSettings;
use crate::tracker::registry::OperationTracker;
use crate::tracker::steps;

/// Outcome of a close request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// The surface may close; tracked data is released after the grace delay.
    Closed,
    /// The bound operation is still unresolved; the request is a no-op.
    Refused,
}

/// Governs whether a surface bound to one operation may be dismissed.
pub struct ProgressGate {
    tracker: OperationTracker,
    target_id: String,
    kind: OperationKind,
    /// True when the surface opened for a then-active operation. A surface
    /// opened passively to review a finished operation closes freely.
    auto_opened: bool,
    closed: AtomicBool,
    close_grace: Duration,
}

impl ProgressGate {
    /// Bind a surface to an operation. Whether the operation is active is
    /// sampled once, at open time.
    pub fn open(
        tracker: &OperationTracker,
        target_id: impl Into<String>,
        kind: OperationKind,
        settings: &TrackerSettings,
    ) -> Self {
        let target_id = target_id.into();
        let auto_opened = tracker.is_active(&target_id, kind);
        Self {
            tracker: tracker.clone(),
            target_id,
            kind,
            auto_opened,
            closed: AtomicBool::new(false),
            close_grace: settings.close_grace,
        }
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Whether a close request would currently be honored.
    pub fn may_close(&self) -> bool {
        if !self.auto_opened {
            return true;
        }
        match self.tracker.step_log(&self.target_id, self.kind) {
            Some(log) => steps::is_terminal_complete(&log) || steps::is_failed(&log),
            // Nothing tracked any more; nothing to hold the surface open for.
            None => true,
        }
    }

    /// Request dismissal. While the bound operation is unresolved the
    /// request is refused and nothing changes. On a permitted close the
    /// surface state flips immediately and the step log (plus any remaining
    /// subscription) is torn down after the grace delay. A second close of
    /// an already-closing gate schedules nothing further.
    pub fn try_close(&self) -> CloseOutcome {
        if !self.may_close() {
            debug!(
                "Refusing to close surface for '{}': {} operation unresolved",
                self.target_id, self.kind
            );
            return CloseOutcome::Refused;
        }
        if self.closed.swap(true, Ordering::SeqCst) {
            return CloseOutcome::Closed;
        }

        let tracker = self.tracker.clone();
        let target_id = self.target_id.clone();
        let kind = self.kind;
        let grace = self.close_grace;
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            tracker.teardown(&target_id, kind);
        });
        CloseOutcome::Closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::{step, MockApi};
    use crate::api::models::StepStatus::*;
    use crate::api::models::OperationKind::*;
    use std::sync::Arc;

    fn fast_settings() -> TrackerSettings {
        TrackerSettings {
            close_grace: Duration::from_millis(30),
            ..Default::default()
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn close_refused_while_operation_runs() {
        let api = Arc::new(MockApi::new());
        let (tracker, _events) = OperationTracker::new(api.clone());
        tracker.start("srv-1", Setup).await.unwrap();
        api.emit("srv-1", step("install", Running));
        settle().await;

        let gate = ProgressGate::open(&tracker, "srv-1", Setup, &fast_settings());
        assert!(!gate.may_close());
        assert_eq!(gate.try_close(), CloseOutcome::Refused);
        assert!(!gate.is_closed());
        // The refusal changed nothing: the operation is still tracked.
        assert!(tracker.is_active("srv-1", Setup));
    }

    #[tokio::test]
    async fn close_refused_during_start_window() {
        let api = Arc::new(MockApi::new());
        let (tracker, _events) = OperationTracker::new(api.clone());
        tracker.start("srv-1", Setup).await.unwrap();

        // No step yet; the operation is running on the explicit flag alone.
        let gate = ProgressGate::open(&tracker, "srv-1", Setup, &fast_settings());
        assert_eq!(gate.try_close(), CloseOutcome::Refused);
    }

    #[tokio::test]
    async fn close_permitted_on_terminal_failure() {
        let api = Arc::new(MockApi::new());
        let (tracker, _events) = OperationTracker::new(api.clone());
        tracker.start("srv-1", Security).await.unwrap();
        let gate = ProgressGate::open(&tracker, "srv-1", Security, &fast_settings());

        api.emit("srv-1", step("complete", Failed));
        settle().await;

        assert!(gate.may_close());
        assert_eq!(gate.try_close(), CloseOutcome::Closed);
    }

    #[tokio::test]
    async fn close_permitted_on_failure_anywhere() {
        let api = Arc::new(MockApi::new());
        let (tracker, _events) = OperationTracker::new(api.clone());
        tracker.start("srv-1", Setup).await.unwrap();
        let gate = ProgressGate::open(&tracker, "srv-1", Setup, &fast_settings());

        api.emit("srv-1", step("harden", Failed));
        settle().await;
        assert_eq!(gate.try_close(), CloseOutcome::Closed);
    }

    #[tokio::test]
    async fn passive_open_closes_freely() {
        let api = Arc::new(MockApi::new());
        let (tracker, _events) = OperationTracker::new(api.clone());

        // Nothing active for the target: the surface was opened to review.
        let gate = ProgressGate::open(&tracker, "srv-1", Setup, &fast_settings());
        assert_eq!(gate.try_close(), CloseOutcome::Closed);
    }

    #[tokio::test]
    async fn data_clears_after_grace_not_before() {
        let api = Arc::new(MockApi::new());
        let (tracker, _events) = OperationTracker::new(api.clone());
        tracker.start("srv-1", Setup).await.unwrap();
        let gate = ProgressGate::open(&tracker, "srv-1", Setup, &fast_settings());

        api.emit("srv-1", step("complete", Success));
        settle().await;

        assert_eq!(gate.try_close(), CloseOutcome::Closed);
        assert!(gate.is_closed());
        // Visual close first; the bound data survives the grace window.
        assert!(tracker.is_tracked("srv-1", Setup));

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(!tracker.is_tracked("srv-1", Setup));
    }

    #[tokio::test]
    async fn double_close_schedules_teardown_once() {
        let api = Arc::new(MockApi::new());
        let (tracker, _events) = OperationTracker::new(api.clone());
        tracker.start("srv-1", Setup).await.unwrap();
        let gate = ProgressGate::open(&tracker, "srv-1", Setup, &fast_settings());

        api.emit("srv-1", step("complete", Success));
        settle().await;

        assert_eq!(gate.try_close(), CloseOutcome::Closed);
        assert_eq!(gate.try_close(), CloseOutcome::Closed);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(!tracker.is_tracked("srv-1", Setup));
    }
}
