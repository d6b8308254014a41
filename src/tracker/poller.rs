//! Live deployment record polling.
//!
//! While a deployment is pending or running, its record (status, log text)
//! is re-fetched on a fixed interval and republished to observers. The poll
//! stops itself on a terminal status, and on the first fetch error: a failed
//! fetch leaves the last known record displayed as stale rather than
//! retrying, trusting the next manual refresh.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::models::Deployment;
use crate::api::OpsApi;
use crate::settings::TrackerSettings;

struct PollEntry {
    generation: u64,
    task: JoinHandle<()>,
}

struct PollerState {
    timers: HashMap<String, PollEntry>,
    next_generation: u64,
}

pub struct LogPoller {
    api: Arc<dyn OpsApi>,
    interval: Duration,
    state: Arc<Mutex<PollerState>>,
}

impl LogPoller {
    pub fn new(api: Arc<dyn OpsApi>, settings: &TrackerSettings) -> Self {
        Self {
            api,
            interval: settings.poll_interval,
            state: Arc::new(Mutex::new(PollerState {
                timers: HashMap::new(),
                next_generation: 0,
            })),
        }
    }

    /// Start polling a deployment. At most one timer runs per id: an
    /// existing one is cancelled before the new one starts. Observers see
    /// each fetched record on the returned channel, `None` until the first
    /// fetch lands.
    pub fn start_polling(&self, deployment_id: &str) -> watch::Receiver<Option<Deployment>> {
        let (tx, rx) = watch::channel(None);

        let mut state = self.state.lock().unwrap();
        if let Some(previous) = state.timers.remove(deployment_id) {
            previous.task.abort();
            debug!("Replacing poll timer for deployment '{}'", deployment_id);
        }
        state.next_generation += 1;
        let generation = state.next_generation;

        let task = tokio::spawn(Self::poll_loop(
            self.api.clone(),
            self.state.clone(),
            deployment_id.to_string(),
            generation,
            self.interval,
            tx,
        ));
        state.timers.insert(
            deployment_id.to_string(),
            PollEntry { generation, task },
        );

        rx
    }

    /// Cancel the poll timer for a deployment. No-op when none is running.
    pub fn stop_polling(&self, deployment_id: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(entry) = state.timers.remove(deployment_id) {
            entry.task.abort();
            debug!("Stopped polling deployment '{}'", deployment_id);
        }
    }

    pub fn is_polling(&self, deployment_id: &str) -> bool {
        self.state.lock().unwrap().timers.contains_key(deployment_id)
    }

    async fn poll_loop(
        api: Arc<dyn OpsApi>,
        state: Arc<Mutex<PollerState>>,
        deployment_id: String,
        generation: u64,
        interval: Duration,
        tx: watch::Sender<Option<Deployment>>,
    ) {
        loop {
            match api.fetch_deployment(&deployment_id).await {
                Ok(deployment) => {
                    let status = deployment.status;
                    let _ = tx.send(Some(deployment));
                    if status.is_terminal() {
                        info!(
                            "Deployment '{}' reached {}; stopping poll",
                            deployment_id, status
                        );
                        break;
                    }
                }
                Err(e) => {
                    warn!(
                        "Poll fetch failed for deployment '{}', stopping: {:#}",
                        deployment_id, e
                    );
                    break;
                }
            }
            tokio::time::sleep(interval).await;
        }

        // Deregister, unless a newer timer already took the slot.
        let mut state = state.lock().unwrap();
        if state
            .timers
            .get(&deployment_id)
            .is_some_and(|entry| entry.generation == generation)
        {
            state.timers.remove(&deployment_id);
        }
    }
}
