//! Auto-Skip Watchdog.
//!
//! Decides what to do with a fatal playback failure. The caller owns the
//! cursor and the actual skip; the watchdog only keeps the retry budget and
//! the pending/halted guards.

use parking_lot::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogDecision {
    /// A skip is already pending, or auto-skip is halted.
    Ignore,
    /// Wait `delay`, advance the cursor by one and load.
    Skip { attempt: u32, delay: Duration },
    /// Give up until the candidate set changes.
    Halt { attempts: u32 },
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct WatchdogState {
    attempts: u32,
    pending: bool,
    halted: bool,
}

#[derive(Debug)]
pub struct AutoSkipWatchdog {
    max_attempts: u32,
    delay: Duration,
    state: Mutex<WatchdogState>,
}

impl AutoSkipWatchdog {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
            state: Mutex::new(WatchdogState::default()),
        }
    }

    /// React to a fatal failure in a set of `candidates` stations.
    pub fn on_failure(&self, candidates: usize) -> WatchdogDecision {
        let mut state = self.state.lock();
        if state.halted || state.pending {
            debug!(
                halted = state.halted,
                pending = state.pending,
                "Ignoring failure"
            );
            return WatchdogDecision::Ignore;
        }

        if candidates < 2 || state.attempts >= self.max_attempts {
            state.halted = true;
            warn!(
                attempts = state.attempts,
                candidates, "Auto-skip limit reached, halting"
            );
            return WatchdogDecision::Halt {
                attempts: state.attempts,
            };
        }

        state.attempts += 1;
        state.pending = true;
        debug!(attempt = state.attempts, "Auto-skip scheduled");
        WatchdogDecision::Skip {
            attempt: state.attempts,
            delay: self.delay,
        }
    }

    /// The scheduled skip ran (or was abandoned).
    pub fn skip_completed(&self) {
        self.state.lock().pending = false;
    }

    /// Playback reached `Playing`.
    pub fn on_playing(&self) {
        let mut state = self.state.lock();
        if state.attempts > 0 {
            debug!(attempts = state.attempts, "Playback recovered, clearing attempts");
        }
        state.attempts = 0;
    }

    /// New candidate set: forget everything.
    pub fn reset(&self) {
        *self.state.lock() = WatchdogState::default();
    }

    pub fn attempts(&self) -> u32 {
        self.state.lock().attempts
    }

    pub fn is_pending(&self) -> bool {
        self.state.lock().pending
    }

    pub fn is_halted(&self) -> bool {
        self.state.lock().halted
    }
}
