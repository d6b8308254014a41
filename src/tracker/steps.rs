//! Step log and operation status evaluation.
//!
//! An operation's status is never stored; it is derived on demand from the
//! accumulated step history. Two signals stay distinct throughout: "the last
//! step is the terminal sentinel" and "some step anywhere has failed". A
//! later success does not erase an earlier failure, while user-facing
//! surfaces may still render the last step's own status.

use crate::api::models::{Step, StepStatus, COMPLETE_STEP};

/// Append-only history of progress steps for one operation instance.
#[derive(Debug, Clone, Default)]
pub struct StepLog {
    steps: Vec<Step>,
}

impl StepLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: Step) {
        self.steps.push(step);
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn last(&self) -> Option<&Step> {
        self.steps.last()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Clone of the history, for evaluation and rendering outside whatever
    /// lock guards the live log.
    pub fn snapshot(&self) -> Vec<Step> {
        self.steps.clone()
    }
}

/// True iff the last step is the terminal sentinel, whatever its status.
pub fn is_terminal_complete(log: &[Step]) -> bool {
    log.last().is_some_and(|s| s.step == COMPLETE_STEP)
}

/// True iff any step in the log reported failure, regardless of position.
pub fn is_failed(log: &[Step]) -> bool {
    log.iter().any(|s| s.status == StepStatus::Failed)
}

/// Whether the operation is still in flight. `explicit_flag` covers the
/// window between "start requested" and the first step arriving, when the
/// log cannot speak for itself.
pub fn is_running(log: &[Step], explicit_flag: bool) -> bool {
    explicit_flag || (!log.is_empty() && !is_terminal_complete(log) && !is_failed(log))
}

/// Progress of the last step, or 0 for an empty log.
pub fn overall_progress_pct(log: &[Step]) -> u8 {
    log.last().and_then(|s| s.progress_pct).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::step;
    use StepStatus::*;

    #[test]
    fn failure_anywhere_is_failure() {
        let log = vec![
            step("connect", Success),
            step("harden", Failed),
            step("verify", Success),
        ];
        assert!(is_failed(&log));

        let clean = vec![step("connect", Success), step("verify", Running)];
        assert!(!is_failed(&clean));
        assert!(!is_failed(&[]));
    }

    #[test]
    fn terminal_requires_complete_sentinel_last() {
        let done = vec![step("connect", Success), step("complete", Success)];
        assert!(is_terminal_complete(&done));

        // A "complete" step buried mid-log is not terminal.
        let reordered = vec![step("complete", Success), step("cleanup", Running)];
        assert!(!is_terminal_complete(&reordered));
        assert!(!is_terminal_complete(&[]));
    }

    #[test]
    fn running_truth_table() {
        // Empty log only runs when the explicit flag covers the start window.
        assert!(is_running(&[], true));
        assert!(!is_running(&[], false));

        let in_flight = vec![step("connect", Success), step("install", Running)];
        assert!(is_running(&in_flight, false));

        let failed = vec![step("connect", Success), step("install", Failed)];
        assert!(!is_running(&failed, false));

        let done = vec![step("connect", Success), step("complete", Success)];
        assert!(!is_running(&done, false));

        // The explicit flag wins even over a resolved log.
        assert!(is_running(&done, true));
    }

    #[test]
    fn progress_follows_last_step() {
        assert_eq!(overall_progress_pct(&[]), 0);

        let mut log = StepLog::new();
        let mut s = step("connect", Success);
        s.progress_pct = Some(25);
        log.push(s);
        assert_eq!(overall_progress_pct(log.steps()), 25);

        // A step without a percentage reads as 0, not "carry the previous".
        log.push(step("install", Running));
        assert_eq!(overall_progress_pct(log.steps()), 0);
    }

    #[test]
    fn failed_then_complete_keeps_both_signals() {
        let log = vec![
            step("connect", Success),
            step("harden", Failed),
            step("complete", Failed),
        ];
        assert!(is_failed(&log));
        assert!(is_terminal_complete(&log));
        assert!(!is_running(&log, false));
        // The last step's own status stays observable for display.
        assert_eq!(log.last().unwrap().status, Failed);
    }
}
