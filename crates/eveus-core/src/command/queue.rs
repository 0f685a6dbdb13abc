// ── Command worker ──
//
// Drains the command channel strictly in FIFO order, one command at a
// time. Each command runs under the shared execution lock, waits out the
// minimum spacing since the previous dispatch, and is retried with
// exponential backoff. Every envelope is answered exactly once.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{Command, CommandEnvelope, CommandReceipt, OfflineBuffer};
use crate::config::CommandConfig;
use crate::error::CoreError;
use crate::health::HealthTracker;
use crate::transport::ChargerTransport;

pub(crate) struct CommandWorker<T> {
    pub transport: Arc<T>,
    pub health: Arc<HealthTracker>,
    pub offline: Arc<OfflineBuffer>,
    pub config: CommandConfig,
    pub exec_lock: Arc<Mutex<()>>,
    pub cancel: CancellationToken,
    /// Completion time of the most recent dispatch.
    pub last_dispatch: Option<Instant>,
}

impl<T: ChargerTransport> CommandWorker<T> {
    pub async fn run(mut self, mut rx: mpsc::Receiver<CommandEnvelope>) {
        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                envelope = rx.recv() => {
                    let Some(envelope) = envelope else { break };
                    self.process(envelope).await;
                }
            }
        }

        // Anything still queued resolves as cancelled rather than hanging.
        rx.close();
        let mut dropped = 0_usize;
        while let Ok(envelope) = rx.try_recv() {
            if let Some(tx) = envelope.response_tx {
                let _ = tx.send(Err(CoreError::Cancelled));
            }
            dropped += 1;
        }
        debug!(dropped, "command worker stopped");
    }

    async fn process(&mut self, envelope: CommandEnvelope) {
        let CommandEnvelope {
            id,
            command,
            enqueued_at,
            parked_at,
            mut response_tx,
        } = envelope;

        // The submitter already gave up (timed out); never dispatch late.
        if response_tx.as_ref().is_some_and(oneshot::Sender::is_closed) {
            debug!(%id, command = command.name(), "skipping abandoned command");
            return;
        }

        debug!(
            %id,
            command = command.name(),
            queued_ms = enqueued_at.elapsed().as_millis(),
            replay = parked_at.is_some(),
            "executing command"
        );

        // Stop retrying the moment the submitter stops waiting for an answer.
        let result = match response_tx.as_mut() {
            Some(tx) => tokio::select! {
                result = self.execute(id, &command) => Some(result),
                () = tx.closed() => None,
            },
            None => Some(self.execute(id, &command).await),
        };
        let Some(result) = result else {
            warn!(%id, command = command.name(), "submitter gave up; command abandoned");
            return;
        };
        let abandoned = response_tx.as_ref().is_some_and(oneshot::Sender::is_closed);

        match &result {
            Ok(receipt) => info!(
                command = command.name(),
                value = command.value(),
                attempts = receipt.attempts,
                "command applied"
            ),
            Err(e) => {
                warn!(command = command.name(), error = %e, "command failed");
                if self.config.replay_offline && e.is_transient() && !abandoned {
                    debug!(command = command.name(), "parking command until the charger is reachable");
                    self.offline
                        .park(command.clone(), parked_at.unwrap_or_else(Instant::now));
                }
            }
        }

        if let Some(tx) = response_tx {
            let _ = tx.send(result);
        }
    }

    async fn execute(&mut self, id: uuid::Uuid, command: &Command) -> Result<CommandReceipt, CoreError> {
        let exec_lock = Arc::clone(&self.exec_lock);
        let _exec = exec_lock.lock().await;

        let max_attempts = self.config.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                let delay = retry_delay(attempt - 1, &self.config);
                debug!(
                    command = command.name(),
                    attempt,
                    delay_ms = delay.as_millis(),
                    "retrying command"
                );
                self.sleep(delay).await?;
            }
            self.wait_for_spacing().await?;

            match self.attempt(command).await {
                Ok(response) => {
                    return Ok(CommandReceipt {
                        id,
                        command: command.name().to_owned(),
                        value: command.value().to_owned(),
                        attempts: attempt,
                        verified: command.verify(),
                        response,
                    });
                }
                Err(CoreError::Cancelled) => return Err(CoreError::Cancelled),
                Err(e) => {
                    debug!(command = command.name(), attempt, error = %e, "command attempt failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| CoreError::Internal("command was never attempted".into())))
    }

    /// One dispatch, plus the verification re-fetch when requested.
    async fn attempt(&mut self, command: &Command) -> Result<String, CoreError> {
        let started = Instant::now();
        // Counts from the start too, in case the dispatch is abandoned mid-flight.
        self.last_dispatch = Some(started);

        let dispatched = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Err(CoreError::Cancelled),
            result = self.transport.dispatch_command(command.name(), command.value()) => result,
        };
        self.last_dispatch = Some(Instant::now());

        let response = match dispatched {
            Ok(body) => body,
            Err(e) => {
                self.health
                    .record_command(started.elapsed(), false, Some(e.error_type()));
                return Err(e.into());
            }
        };

        if command.verify() {
            let fetched = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Err(CoreError::Cancelled),
                result = self.transport.fetch_state() => result,
            };
            let verified = match fetched {
                Ok(snapshot) => command.verify_against(&snapshot),
                Err(e) => {
                    self.health
                        .record_command(started.elapsed(), false, Some(e.error_type()));
                    return Err(e.into());
                }
            };
            if let Err(e) = verified {
                self.health
                    .record_command(started.elapsed(), false, Some(e.error_type()));
                return Err(e);
            }
        }

        self.health.record_command(started.elapsed(), true, None);
        Ok(response)
    }

    async fn wait_for_spacing(&self) -> Result<(), CoreError> {
        let Some(last) = self.last_dispatch else {
            return Ok(());
        };
        let ready_at = last + self.config.min_interval;
        if ready_at <= Instant::now() {
            return Ok(());
        }
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(CoreError::Cancelled),
            () = tokio::time::sleep_until(ready_at) => Ok(()),
        }
    }

    async fn sleep(&self, delay: Duration) -> Result<(), CoreError> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(CoreError::Cancelled),
            () = tokio::time::sleep(delay) => Ok(()),
        }
    }
}

/// Backoff before retry number `retry` (1-based): base doubling, capped.
fn retry_delay(retry: u32, config: &CommandConfig) -> Duration {
    let factor = 2_u32.saturating_pow(retry.saturating_sub(1));
    config
        .retry_base
        .saturating_mul(factor)
        .min(config.retry_max)
}
