// Notification throttling: publish only when a significant field moves,
// or when subscribers have not heard anything for the quiet period.

use std::time::Duration;

use tokio::time::Instant;

use eveus_api::{TelemetrySnapshot, fields};

const SIGNIFICANT_FIELDS: &[&str] = &[
    fields::STATE,
    fields::POWER,
    fields::SESSION_ENERGY,
    fields::TOTAL_ENERGY,
    fields::VOLTAGE,
    fields::CURRENT,
];

pub(crate) struct ChangeDetector {
    quiet_period: Duration,
    baseline: Option<TelemetrySnapshot>,
    notified_at: Option<Instant>,
}

impl ChangeDetector {
    pub fn new(quiet_period: Duration) -> Self {
        Self {
            quiet_period,
            baseline: None,
            notified_at: None,
        }
    }

    /// Decide whether `snapshot` warrants a notification. `force` is set
    /// for availability changes, which always notify. The baseline moves
    /// only when a notification goes out.
    pub fn observe(&mut self, snapshot: &TelemetrySnapshot, force: bool) -> bool {
        let now = Instant::now();
        let changed = self.baseline.as_ref().is_none_or(|baseline| {
            SIGNIFICANT_FIELDS
                .iter()
                .any(|key| baseline.get(key) != snapshot.get(key))
        });
        let quiet_elapsed = self
            .notified_at
            .is_none_or(|at| now.duration_since(at) >= self.quiet_period);

        if force || changed || quiet_elapsed {
            self.baseline = Some(snapshot.clone());
            self.notified_at = Some(now);
            true
        } else {
            false
        }
    }
}
