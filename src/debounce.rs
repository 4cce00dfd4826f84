//! Persistence debouncer.
//!
//! Turns a per-frame "target seen" signal into discrete triggers. The target must be seen in
//! every processed frame for at least `threshold`; a single miss discards the run. A
//! qualifying run triggers exactly once and returns the machine to idle, so a target that
//! stays in view triggers again only after another full `threshold`.
//!
//! Timestamps are monotonic offsets (`Duration` since an arbitrary origin) supplied by the
//! caller, which keeps the machine free of clocks.

use std::time::Duration;

/// Mutable state of the debouncer. `active_since` is set only while the target has been
/// observed in every frame since that instant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PersistenceState {
    pub active_since: Option<Duration>,
}

impl PersistenceState {
    pub fn is_active(&self) -> bool {
        self.active_since.is_some()
    }
}

/// Emitted when a run reaches the threshold.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Trigger {
    /// Timestamp of the tick that fired.
    pub at: Duration,
    /// How long the target had been continuously present.
    pub persisted: Duration,
}

#[derive(Clone, Debug)]
pub struct PersistenceDebouncer {
    threshold: Duration,
    state: PersistenceState,
}

impl PersistenceDebouncer {
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            state: PersistenceState::default(),
        }
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    pub fn state(&self) -> PersistenceState {
        self.state
    }

    /// Advance the machine by one processed frame.
    pub fn update(&mut self, saw_target: bool, now: Duration) -> Option<Trigger> {
        match (self.state.active_since, saw_target) {
            (None, false) => None,
            (None, true) => {
                self.state.active_since = Some(now);
                None
            }
            (Some(_), false) => {
                self.state.active_since = None;
                None
            }
            (Some(since), true) => {
                let persisted = now.saturating_sub(since);
                if persisted >= self.threshold {
                    self.state.active_since = None;
                    Some(Trigger { at: now, persisted })
                } else {
                    None
                }
            }
        }
    }

    /// Drop any accumulated persistence.
    pub fn reset(&mut self) {
        self.state = PersistenceState::default();
    }
}
