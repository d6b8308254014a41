//! Tunables for polling cadence and surface close behavior.

use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct TrackerSettings {
    /// Interval between deployment record re-fetches while a deployment is
    /// pending or running.
    pub poll_interval: Duration,

    /// Delay between a permitted surface close and the release of its
    /// tracked data, so an exit animation finishes before the bound step log
    /// disappears.
    pub close_grace: Duration,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            close_grace: Duration::from_millis(250),
        }
    }
}
