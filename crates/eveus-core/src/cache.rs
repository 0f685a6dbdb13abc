// ── Last-known-good state cache ──

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use eveus_api::TelemetrySnapshot;

/// Holds the most recent successful snapshot with a freshness bound.
///
/// Nothing is ever evicted: `get` computes absence from the entry's age at
/// read time, and `set` overwrites unconditionally.
pub struct StateCache {
    ttl: Duration,
    entry: Mutex<Option<(TelemetrySnapshot, Instant)>>,
}

impl StateCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: Mutex::new(None),
        }
    }

    pub fn set(&self, snapshot: TelemetrySnapshot) {
        *self.entry.lock().unwrap_or_else(PoisonError::into_inner) = Some((snapshot, Instant::now()));
    }

    /// The cached snapshot if it is strictly younger than the TTL.
    pub fn get(&self) -> Option<TelemetrySnapshot> {
        let entry = self.entry.lock().unwrap_or_else(PoisonError::into_inner);
        entry
            .as_ref()
            .filter(|(_, stored)| stored.elapsed() < self.ttl)
            .map(|(snapshot, _)| snapshot.clone())
    }

    /// Age of the held entry, fresh or not.
    pub fn age(&self) -> Option<Duration> {
        self.entry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|(_, stored)| stored.elapsed())
    }
}
