//! Restart supervision.
//!
//! Certain worker hangs poison the whole scraping window: a 60 s run
//! timeout on a file (or `/download`) URL is the observable signal. The
//! supervisor records exactly one pending restart request at a time; the
//! driver reacts by tearing the window and pool down, rebuilding them,
//! and re-driving every incomplete course from its preserved queue.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Lifecycle of the crawl as the supervisor sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Running,
    RestartRequested,
    TearingDown,
    Rebuilding,
    /// Terminal: user cancellation.
    Stopped,
}

/// One pending restart, recorded by the course task that hit the hang.
#[derive(Debug, Clone)]
pub struct RestartRequest {
    pub course_id: String,
    pub url: String,
    pub reason: String,
}

/// Typed restart state shared by reference with every course task.
#[derive(Debug)]
pub struct Supervisor {
    state: Mutex<SupervisorState>,
    pending: Mutex<Option<RestartRequest>>,
    // Fast-path flag checked at every scheduling point.
    restart_in_flight: AtomicBool,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl Supervisor {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SupervisorState::Running),
            pending: Mutex::new(None),
            restart_in_flight: AtomicBool::new(false),
        }
    }

    /// Record a restart request. Returns false when one is already in
    /// flight (the first request wins; the loser resumes from its queue
    /// like any sibling).
    pub fn request_restart(&self, request: RestartRequest) -> bool {
        let mut pending = match self.pending.lock() {
            Ok(p) => p,
            Err(poisoned) => poisoned.into_inner(),
        };
        if pending.is_some() {
            return false;
        }
        *pending = Some(request);
        self.restart_in_flight.store(true, Ordering::SeqCst);
        self.set_state(SupervisorState::RestartRequested);
        true
    }

    /// Cheap check for scheduling points.
    #[must_use]
    pub fn restart_in_flight(&self) -> bool {
        self.restart_in_flight.load(Ordering::SeqCst)
    }

    /// Consume the pending request at the start of a teardown round.
    pub fn take_request(&self) -> Option<RestartRequest> {
        let mut pending = match self.pending.lock() {
            Ok(p) => p,
            Err(poisoned) => poisoned.into_inner(),
        };
        let request = pending.take();
        self.restart_in_flight.store(false, Ordering::SeqCst);
        request
    }

    pub fn set_state(&self, state: SupervisorState) {
        if let Ok(mut s) = self.state.lock() {
            *s = state;
        }
    }

    #[must_use]
    pub fn state(&self) -> SupervisorState {
        self.state
            .lock()
            .map(|s| *s)
            .unwrap_or(SupervisorState::Running)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_restart_request_wins() {
        let supervisor = Supervisor::new();
        assert!(supervisor.request_restart(RestartRequest {
            course_id: "9".into(),
            url: "u1".into(),
            reason: "timeout".into(),
        }));
        assert!(!supervisor.request_restart(RestartRequest {
            course_id: "10".into(),
            url: "u2".into(),
            reason: "timeout".into(),
        }));
        assert!(supervisor.restart_in_flight());

        let taken = supervisor.take_request().expect("request");
        assert_eq!(taken.course_id, "9");
        assert!(!supervisor.restart_in_flight());
        assert!(supervisor.take_request().is_none());
    }
}
