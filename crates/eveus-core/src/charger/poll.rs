// ── Poll loop ──
//
// Fetch, record, cache, publish, sleep; forever, until cancelled. Fetch
// failures never escape this loop: they are classified, recorded, and
// turned into state transitions and cache fallbacks.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use eveus_api::{Error, TelemetrySnapshot};

use super::backoff::{failure_backoff, success_interval};
use super::notify::ChangeDetector;
use super::{Charger, ConnectionState};
use crate::classify::classify;
use crate::command::CommandEnvelope;
use crate::transport::ChargerTransport;

pub(super) struct PollLoop<T: ChargerTransport> {
    charger: Charger<T>,
    detector: ChangeDetector,
    /// Failures since the last success or the last session reset.
    short_term_failures: u32,
    /// Set once the charger is confirmed long-offline; cleared by a success.
    silent: bool,
    /// Set by the first failure of an outage; cleared by the recovery announcement.
    in_outage: bool,
    last_warning: Option<Instant>,
}

impl<T: ChargerTransport> PollLoop<T> {
    pub fn new(charger: Charger<T>) -> Self {
        let quiet_period = charger.inner.config.polling.quiet_period;
        Self {
            charger,
            detector: ChangeDetector::new(quiet_period),
            short_term_failures: 0,
            silent: false,
            in_outage: false,
            last_warning: None,
        }
    }

    pub async fn run(mut self) {
        let cancel = self.charger.inner.cancel.clone();
        let transport = Arc::clone(&self.charger.inner.transport);
        let mut delay = Duration::ZERO;

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }

            let started = Instant::now();
            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                result = transport.fetch_state() => result,
            };

            delay = match result {
                Ok(snapshot) => self.on_success(snapshot, started.elapsed()),
                Err(e) => self.on_failure(&e, started.elapsed()),
            };
            trace!(delay_ms = delay.as_millis(), "next poll scheduled");
        }

        debug!("poll loop stopped");
    }

    fn on_success(&mut self, snapshot: TelemetrySnapshot, latency: Duration) -> Duration {
        let inner = &self.charger.inner;

        inner.health.record(latency, true, None);
        inner.cache.set(snapshot.clone());
        inner.device_info.store(Some(Arc::new(snapshot.device_info())));
        inner.held.store(Arc::new(snapshot.clone()));

        let recovered = !inner.available.swap(true, Ordering::SeqCst);
        let previous = inner
            .connection_state
            .send_replace(ConnectionState::Connected);

        if self.in_outage {
            info!(host = %inner.config.url, "charger connection restored");
            self.in_outage = false;
        } else if previous != ConnectionState::Connected {
            debug!(host = %inner.config.url, "charger connected");
        }
        self.silent = false;
        self.short_term_failures = 0;
        self.last_warning = None;

        if self.detector.observe(&snapshot, recovered) {
            self.charger.publish();
        }

        if recovered {
            self.replay_parked_commands();
        }

        success_interval(&snapshot, &inner.config.polling)
    }

    fn on_failure(&mut self, err: &Error, latency: Duration) -> Duration {
        let inner = &self.charger.inner;
        let polling = &inner.config.polling;

        let error_type = err.error_type();
        let category = classify(error_type);
        inner.health.record(latency, false, Some(error_type));

        let consecutive = inner.health.consecutive_failures();
        let since_success = inner.health.since_last_success();
        let was_available = inner.available.swap(false, Ordering::SeqCst);
        self.in_outage = true;
        self.short_term_failures = self.short_term_failures.saturating_add(1);

        let offline = consecutive > polling.offline_failure_threshold
            && since_success > polling.offline_after;
        let state = if offline {
            ConnectionState::Offline
        } else {
            ConnectionState::Error
        };
        let previous = inner.connection_state.send_replace(state);

        if offline && !self.silent {
            warn!(
                host = %inner.config.url,
                consecutive_failures = consecutive,
                offline_secs = since_success.as_secs(),
                "charger appears to be offline; suppressing further failure logs"
            );
            self.silent = true;
        }

        // Fall back to the cache, or clear everything once it has expired.
        let held = inner.held.load_full();
        let data_changed = match inner.cache.get() {
            Some(cached) if *held != cached => {
                if !self.silent {
                    debug!("serving cached snapshot while the charger is unreachable");
                }
                inner.held.store(Arc::new(cached));
                true
            }
            Some(_) => false,
            None if !held.is_empty() => {
                if !self.silent {
                    debug!("cached snapshot expired; clearing held data");
                }
                inner.held.store(Arc::new(TelemetrySnapshot::default()));
                true
            }
            None => false,
        };

        log_failure(
            &mut self.last_warning,
            self.silent,
            polling.log_interval,
            err,
            category.into(),
            consecutive,
        );

        if self.short_term_failures >= polling.reconnect_after_failures {
            if self.silent {
                trace!(failures = self.short_term_failures, "recreating transport session");
            } else {
                debug!(
                    failures = self.short_term_failures,
                    "recreating transport session"
                );
            }
            inner.transport.reset_session();
            self.short_term_failures = 0;
        }

        if was_available || data_changed || previous != state {
            let held = inner.held.load_full();
            self.detector.observe(&held, true);
            self.charger.publish();
        }

        if offline {
            polling.offline_backoff
        } else {
            failure_backoff(consecutive, polling)
        }
    }

    fn replay_parked_commands(&self) {
        let inner = &self.charger.inner;
        if !inner.config.commands.replay_offline {
            return;
        }
        let parked = inner.offline.take_replayable();
        if parked.is_empty() {
            return;
        }

        info!(count = parked.len(), "replaying commands parked during the outage");
        for (command, parked_at) in parked {
            if let Err(e) = inner
                .command_tx
                .try_send(CommandEnvelope::replay(command, parked_at))
            {
                let envelope = e.into_inner();
                debug!(command = envelope.command.name(), "command queue full; keeping command parked");
                inner.offline.park(envelope.command, parked_at);
            }
        }
    }
}

/// Warn at most once per `interval`; nothing at all in silent mode.
fn log_failure(
    last_warning: &mut Option<Instant>,
    silent: bool,
    interval: Duration,
    err: &Error,
    category: &'static str,
    consecutive: u32,
) {
    if silent {
        trace!(error = %err, "poll failed (silent)");
        return;
    }
    let now = Instant::now();
    if last_warning.is_none_or(|at| now.duration_since(at) >= interval) {
        warn!(
            category,
            consecutive_failures = consecutive,
            error = %err,
            "charger poll failed"
        );
        *last_warning = Some(now);
    } else {
        debug!(
            category,
            consecutive_failures = consecutive,
            error = %err,
            "charger poll failed"
        );
    }
}
