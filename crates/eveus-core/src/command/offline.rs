// Commands that failed because the charger was unreachable, held for
// replay once polling succeeds again.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use super::Command;

struct Parked {
    command: Command,
    parked_at: Instant,
}

/// Bounded buffer of commands awaiting reconnection.
///
/// A newer command for the same field replaces the parked one, and the
/// oldest entry is dropped once the buffer is full.
pub struct OfflineBuffer {
    capacity: usize,
    max_age: Duration,
    entries: Mutex<Vec<Parked>>,
}

impl OfflineBuffer {
    pub fn new(capacity: usize, max_age: Duration) -> Self {
        Self {
            capacity,
            max_age,
            entries: Mutex::new(Vec::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Parked>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Park `command`; `parked_at` is kept across replays so a command
    /// that keeps failing still ages out.
    pub fn park(&self, command: Command, parked_at: Instant) {
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.lock();
        entries.retain(|p| p.command.name() != command.name());
        if entries.len() >= self.capacity {
            entries.remove(0);
        }
        entries.push(Parked { command, parked_at });
    }

    /// Empty the buffer, returning the still-fresh commands in replay order.
    pub fn take_replayable(&self) -> Vec<(Command, Instant)> {
        let mut fresh: Vec<(Command, Instant)> = self
            .lock()
            .drain(..)
            .filter(|p| p.parked_at.elapsed() < self.max_age)
            .map(|p| (p.command, p.parked_at))
            .collect();
        fresh.sort_by_key(|(command, _)| command.priority());
        fresh
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
