// ── Change subscribers ──
//
// Collaborators register a `Subscriber` and are called back whenever the
// poll loop publishes an update. Registration is typed: anything that
// cannot be notified cannot be registered.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::Serialize;
use tracing::warn;

use eveus_api::TelemetrySnapshot;

use crate::charger::ConnectionState;

/// What subscribers receive on every notification.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Update {
    /// Held snapshot; empty when no data is available at all.
    pub snapshot: TelemetrySnapshot,
    /// `true` only when the snapshot comes from a live, successful poll.
    pub available: bool,
    pub connection_state: ConnectionState,
}

/// Capability every registered collaborator provides.
pub trait Subscriber: Send + Sync + 'static {
    fn notify(&self, update: &Update);
}

impl<F> Subscriber for F
where
    F: Fn(&Update) + Send + Sync + 'static,
{
    fn notify(&self, update: &Update) {
        self(update);
    }
}

/// Handle returned by [`Charger::subscribe`](crate::Charger::subscribe).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
pub(crate) struct Subscribers {
    next_id: AtomicU64,
    entries: DashMap<SubscriptionId, Arc<dyn Subscriber>>,
}

impl Subscribers {
    pub fn add(&self, subscriber: Arc<dyn Subscriber>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.insert(id, subscriber);
        id
    }

    pub fn remove(&self, id: SubscriptionId) -> bool {
        self.entries.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Call every subscriber. The map is not locked during callbacks, so a
    /// subscriber may unsubscribe itself. A panicking subscriber is logged
    /// and skipped; it never takes the poll loop down with it.
    pub fn notify_all(&self, update: &Update) {
        let targets: Vec<(SubscriptionId, Arc<dyn Subscriber>)> = self
            .entries
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect();
        for (id, subscriber) in targets {
            if catch_unwind(AssertUnwindSafe(|| subscriber.notify(update))).is_err() {
                warn!(subscriber = id.0, "subscriber panicked during notification");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    #[test]
    fn add_notify_remove() {
        let subscribers = Subscribers::default();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        let id = subscribers.add(Arc::new(move |_: &Update| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(subscribers.len(), 1);

        subscribers.notify_all(&Update::default());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert!(subscribers.remove(id));
        assert!(!subscribers.remove(id));
        subscribers.notify_all(&Update::default());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_subscriber_does_not_stop_the_others() {
        let subscribers = Subscribers::default();
        let calls = Arc::new(AtomicUsize::new(0));

        subscribers.add(Arc::new(|_: &Update| panic!("subscriber bug")));
        let counter = Arc::clone(&calls);
        subscribers.add(Arc::new(move |_: &Update| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        subscribers.notify_all(&Update::default());
        subscribers.notify_all(&Update::default());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(subscribers.len(), 2);
    }

    #[test]
    fn ids_are_unique() {
        let subscribers = Subscribers::default();
        let a = subscribers.add(Arc::new(|_: &Update| {}));
        let b = subscribers.add(Arc::new(|_: &Update| {}));
        assert_ne!(a, b);
    }
}
