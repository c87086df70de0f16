//! Cooldown after permission-denied failures.
//!
//! Uses `tokio::time::Instant` so tests can drive it with a paused clock.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::warn;

use curator_core::Error;

/// Tracks the end of the current cooldown, if any.
#[derive(Debug)]
pub struct BackoffController {
    cooldown: Duration,
    until: Mutex<Option<Instant>>,
}

impl BackoffController {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            until: Mutex::new(None),
        }
    }

    fn with_until<T>(&self, f: impl FnOnce(&mut Option<Instant>) -> T) -> T {
        let mut guard = self.until.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Classify a cycle failure. Returns `true` when a cooldown was engaged.
    pub fn record_failure(&self, error: &Error) -> bool {
        if !error.is_permission_denied() {
            return false;
        }
        let until = Instant::now() + self.cooldown;
        self.with_until(|slot| *slot = Some(until));
        warn!(
            subsystem = "sync",
            component = "backoff",
            cooldown_secs = self.cooldown.as_secs(),
            "Permission denied by cloud, suspending sync"
        );
        true
    }

    /// Time left on the active cooldown. Clears an expired one.
    pub fn remaining(&self) -> Option<Duration> {
        let now = Instant::now();
        self.with_until(|slot| match *slot {
            Some(until) if until > now => Some(until - now),
            Some(_) => {
                *slot = None;
                None
            }
            None => None,
        })
    }

    pub fn is_active(&self) -> bool {
        self.remaining().is_some()
    }

    pub fn clear(&self) {
        self.with_until(|slot| *slot = None);
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }
}
