//! Persistent condition timer
//!
//! Tracks how long a condition (over-temperature, for instance) has held
//! continuously, across separate process invocations. The onset of the current
//! streak lives in a [`RecordStore`]; the record exists exactly while the
//! condition is true.
//!
//! # States
//!
//! - **Idle**: condition false, no record.
//! - **Breaching**: condition true, record holds the onset (epoch seconds).
//!
//! The onset is written once when a streak starts and never touched while the
//! streak continues. A missing, corrupt or future-dated record during a streak
//! re-anchors the onset to now. A failed delete leaves an empty tombstone
//! behind, which reads as "no onset", so an old streak can never be resumed.

use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::data::RecordStore;
use crate::error::Result;

/// Outcome of one evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerDecision {
    /// Condition is false
    Clear,
    /// Condition holds but not for long enough yet
    Pending { onset: u64, elapsed: u64 },
    /// Condition has held for at least the required duration
    Triggered { onset: u64, elapsed: u64 },
}

impl TriggerDecision {
    pub fn is_triggered(&self) -> bool {
        matches!(self, Self::Triggered { .. })
    }

    /// Seconds the condition has held so far, zero when clear
    pub fn elapsed(&self) -> u64 {
        match self {
            Self::Clear => 0,
            Self::Pending { elapsed, .. } | Self::Triggered { elapsed, .. } => *elapsed,
        }
    }
}

#[derive(Debug)]
pub struct PersistentConditionTimer<S> {
    store: S,
    key: String,
    required: u64,
}

impl<S: RecordStore> PersistentConditionTimer<S> {
    /// `required` is rounded down to whole seconds
    pub fn new(store: S, key: impl Into<String>, required: Duration) -> Self {
        Self {
            store,
            key: key.into(),
            required: required.as_secs(),
        }
    }

    pub fn required_secs(&self) -> u64 {
        self.required
    }

    /// Current onset, if a streak is being tracked
    pub fn onset(&self) -> Result<Option<u64>> {
        Ok(self.store.read(&self.key)?.as_deref().and_then(parse_onset))
    }

    /// Feed one observation taken at `now`
    ///
    /// Fails only when a new onset cannot be persisted, since the duration
    /// could not be measured afterwards.
    pub fn evaluate(&self, condition: bool, now: u64) -> Result<TriggerDecision> {
        let _lock = match self.store.lock(&self.key) {
            Ok(lock) => Some(lock),
            Err(e) if !condition => {
                warn!(key = %self.key, error = %e, "Could not lock onset record, clearing anyway");
                None
            }
            Err(e) => return Err(e),
        };

        if !condition {
            self.clear();
            return Ok(TriggerDecision::Clear);
        }

        let onset = self.resolve_onset(now)?;
        let elapsed = now - onset;

        if elapsed >= self.required {
            Ok(TriggerDecision::Triggered { onset, elapsed })
        } else {
            debug!(key = %self.key, onset, elapsed, required = self.required, "Condition holding");
            Ok(TriggerDecision::Pending { onset, elapsed })
        }
    }

    fn resolve_onset(&self, now: u64) -> Result<u64> {
        let raw = match self.store.read(&self.key) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key = %self.key, error = %e, "Onset record unreadable, re-anchoring");
                return self.anchor(now);
            }
        };

        let Some(raw) = raw else {
            return self.anchor(now);
        };

        let trimmed = raw.trim();
        if trimmed.is_empty() {
            // Tombstone left by a failed delete
            return self.anchor(now);
        }

        match parse_onset(trimmed) {
            Some(onset) if onset <= now => Ok(onset),
            Some(onset) => {
                warn!(key = %self.key, onset, now, "Onset record is in the future, re-anchoring");
                self.anchor(now)
            }
            None => {
                warn!(key = %self.key, record = %trimmed, "Onset record is corrupt, re-anchoring");
                self.anchor(now)
            }
        }
    }

    fn anchor(&self, now: u64) -> Result<u64> {
        self.store.write(&self.key, &format!("{}\n", now))?;
        info!(key = %self.key, onset = now, "Condition streak started");
        Ok(now)
    }

    fn clear(&self) {
        match self.store.remove(&self.key) {
            Ok(true) => info!(key = %self.key, "Condition cleared, onset record removed"),
            Ok(false) => {}
            Err(e) => {
                warn!(key = %self.key, error = %e, "Failed to remove onset record, writing tombstone");
                if let Err(e) = self.store.write(&self.key, "") {
                    error!(
                        key = %self.key,
                        error = %e,
                        "Failed to invalidate onset record; a stale onset may remain"
                    );
                }
            }
        }
    }
}

fn parse_onset(raw: &str) -> Option<u64> {
    raw.trim().parse().ok()
}
