//! Active-operation registry.
//!
//! Owns the mapping from target to step log and progress subscription for
//! every in-flight operation, mediates start/ingest/teardown, and answers
//! status queries by evaluating the accumulated step history.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::models::{OperationKind, Step, StepStatus};
use crate::api::{OpsApi, StepStream};
use crate::error::TrackerError;
use crate::tracker::steps::{self, StepLog};

/// Cancellation handle for a progress subscription's reader task.
///
/// Cancelling twice, or cancelling after the reader has already finished, is
/// a no-op. Dropping the handle cancels, so removing a registry entry is
/// enough to stop its subscription.
#[derive(Debug)]
pub struct Subscription {
    handle: Option<JoinHandle<()>>,
}

impl Subscription {
    fn new(handle: JoinHandle<()>) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Release the handle without aborting. Used by the reader task itself
    /// once the log is terminal and the task is about to end anyway.
    fn disarm(&mut self) {
        self.handle.take();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Emitted when a tracked operation resolves, after its subscription has
/// been released. List owners re-fetch on receipt so externally visible
/// fields (setup flags, deployment status) reflect the outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationFinished {
    pub target_id: String,
    pub kind: OperationKind,
    pub failed: bool,
}

struct TrackedOperation {
    log: StepLog,
    subscription: Option<Subscription>,
    /// Start was requested but no step has arrived yet.
    starting: bool,
}

impl TrackedOperation {
    fn reserved() -> Self {
        Self {
            log: StepLog::new(),
            subscription: None,
            starting: true,
        }
    }

    fn is_running(&self) -> bool {
        steps::is_running(self.log.steps(), self.starting)
    }
}

type Key = (String, OperationKind);

struct Inner {
    active: Mutex<HashMap<Key, TrackedOperation>>,
    events: mpsc::UnboundedSender<OperationFinished>,
}

/// Registry of in-flight operations. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct OperationTracker {
    api: Arc<dyn OpsApi>,
    inner: Arc<Inner>,
}

impl OperationTracker {
    /// Returns the tracker and the receiving end of its finished-operation
    /// event channel.
    pub fn new(api: Arc<dyn OpsApi>) -> (Self, mpsc::UnboundedReceiver<OperationFinished>) {
        let (events, rx) = mpsc::unbounded_channel();
        let tracker = Self {
            api,
            inner: Arc::new(Inner {
                active: Mutex::new(HashMap::new()),
                events,
            }),
        };
        (tracker, rx)
    }

    /// Begin tracking an operation: register an empty step log, open the
    /// progress subscription, then ask the backend to start emitting steps.
    ///
    /// Rejects with [`TrackerError::AlreadyActive`] when the target already
    /// has a live entry of this kind. Any failure on the way rolls the
    /// registration back completely; no partial entry survives.
    pub async fn start(&self, target_id: &str, kind: OperationKind) -> Result<(), TrackerError> {
        let key = (target_id.to_string(), kind);

        {
            let mut active = self.inner.active.lock().unwrap();
            if let Some(entry) = active.get(&key) {
                if entry.is_running() {
                    return Err(TrackerError::AlreadyActive {
                        target: target_id.to_string(),
                        kind,
                    });
                }
                // A resolved entry may still be held for display; replace it.
                active.remove(&key);
            }
            active.insert(key.clone(), TrackedOperation::reserved());
        }

        let stream = match self.api.subscribe_steps(target_id, kind).await {
            Ok(stream) => stream,
            Err(e) => {
                self.remove(&key);
                return Err(TrackerError::Transport(e));
            }
        };

        let reader = tokio::spawn(Self::ingest_steps(self.inner.clone(), key.clone(), stream));
        {
            let mut active = self.inner.active.lock().unwrap();
            match active.get_mut(&key) {
                Some(entry) => entry.subscription = Some(Subscription::new(reader)),
                None => {
                    reader.abort();
                    return Err(TrackerError::TornDown {
                        target: target_id.to_string(),
                        kind,
                    });
                }
            }
        }

        if let Err(e) = self.api.start_operation(target_id, kind).await {
            self.remove(&key);
            return Err(TrackerError::Transport(e));
        }

        info!("Started {} operation for '{}'", kind, target_id);
        Ok(())
    }

    /// Reader task: apply each incoming step to the tracked entry. Every
    /// application re-checks that the entry still exists, so steps arriving
    /// after teardown are dropped instead of resurrecting state.
    async fn ingest_steps(inner: Arc<Inner>, key: Key, mut stream: StepStream) {
        while let Some(next) = stream.next().await {
            let step = match next {
                Ok(step) => step,
                Err(e) => {
                    warn!("Progress stream error for '{}': {:#}", key.0, e);
                    break;
                }
            };
            let failed_step = step.status == StepStatus::Failed;

            let resolution = {
                let mut active = inner.active.lock().unwrap();
                let Some(entry) = active.get_mut(&key) else {
                    debug!("Dropping step for '{}': no longer tracked", key.0);
                    return;
                };
                debug!("Step '{}' ({}) for '{}'", step.step, step.status, key.0);
                entry.starting = false;
                entry.log.push(step);

                let terminal = steps::is_terminal_complete(entry.log.steps()) || failed_step;
                if terminal {
                    if let Some(mut subscription) = entry.subscription.take() {
                        subscription.disarm();
                    }
                    Some(steps::is_failed(entry.log.steps()))
                } else {
                    None
                }
            };

            if let Some(failed) = resolution {
                // The owning list refreshes on this event; close the
                // subscription first so a late step cannot interleave with
                // that refresh.
                drop(stream);
                info!(
                    "{} operation for '{}' finished (failed: {})",
                    key.1, key.0, failed
                );
                let _ = inner.events.send(OperationFinished {
                    target_id: key.0.clone(),
                    kind: key.1,
                    failed,
                });
                return;
            }
        }

        // Stream ended without a terminal step. Stop holding the
        // subscription but keep the log for display until teardown.
        let mut active = inner.active.lock().unwrap();
        if let Some(entry) = active.get_mut(&key) {
            entry.starting = false;
            if let Some(mut subscription) = entry.subscription.take() {
                subscription.disarm();
                warn!("Progress stream for '{}' ended before a terminal step", key.0);
            }
        }
    }

    /// Whether the target has an entry that still evaluates as running.
    /// Stronger than "an entry exists": a resolved entry kept around for
    /// display does not count.
    pub fn is_active(&self, target_id: &str, kind: OperationKind) -> bool {
        self.query(target_id, kind, |entry| entry.is_running())
            .unwrap_or(false)
    }

    /// Whether the target is tracked at all, running or resolved.
    pub fn is_tracked(&self, target_id: &str, kind: OperationKind) -> bool {
        self.query(target_id, kind, |_| ()).is_some()
    }

    pub fn is_failed(&self, target_id: &str, kind: OperationKind) -> bool {
        self.query(target_id, kind, |entry| steps::is_failed(entry.log.steps()))
            .unwrap_or(false)
    }

    pub fn latest_step(&self, target_id: &str, kind: OperationKind) -> Option<Step> {
        self.query(target_id, kind, |entry| entry.log.last().cloned())
            .flatten()
    }

    pub fn progress_pct(&self, target_id: &str, kind: OperationKind) -> u8 {
        self.query(target_id, kind, |entry| {
            steps::overall_progress_pct(entry.log.steps())
        })
        .unwrap_or(0)
    }

    /// Immutable snapshot of the step history, for evaluation and rendering
    /// outside the registry lock. `None` when the target is not tracked.
    pub fn step_log(&self, target_id: &str, kind: OperationKind) -> Option<Vec<Step>> {
        self.query(target_id, kind, |entry| entry.log.snapshot())
    }

    /// Stop observing: cancel the subscription and drop the entry. Calling
    /// on an untracked target is a no-op. This never aborts the remote
    /// operation itself.
    pub fn teardown(&self, target_id: &str, kind: OperationKind) {
        self.remove(&(target_id.to_string(), kind));
    }

    /// Tear down every remaining entry. Call on whole-view disposal so no
    /// subscription keeps firing callbacks into a discarded view.
    pub fn teardown_all(&self) {
        let drained: Vec<TrackedOperation> = {
            let mut active = self.inner.active.lock().unwrap();
            active.drain().map(|(_, entry)| entry).collect()
        };
        if !drained.is_empty() {
            debug!("Tore down {} remaining operation(s)", drained.len());
        }
        // Subscriptions cancel on drop.
    }

    fn query<R>(
        &self,
        target_id: &str,
        kind: OperationKind,
        f: impl FnOnce(&TrackedOperation) -> R,
    ) -> Option<R> {
        let active = self.inner.active.lock().unwrap();
        active.get(&(target_id.to_string(), kind)).map(f)
    }

    fn remove(&self, key: &Key) {
        let removed = self.inner.active.lock().unwrap().remove(key);
        if removed.is_some() {
            debug!("Removed {} tracking for '{}'", key.1, key.0);
        }
    }
}
