// ── Charger facade ──
//
// One `Charger` per device. Owns the transport, health tracker, state
// cache, and offline buffer, spawns the poll loop and the command worker,
// and is the only surface hosts interact with.

mod backoff;
mod notify;
mod poll;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arc_swap::{ArcSwap, ArcSwapOption};
use futures_core::Stream;
use serde::Serialize;
use strum::Display;
use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use eveus_api::{ChargerClient, DeviceInfo, TelemetrySnapshot};

use crate::cache::StateCache;
use crate::command::queue::CommandWorker;
use crate::command::{Command, CommandEnvelope, CommandReceipt, OfflineBuffer};
use crate::config::ChargerConfig;
use crate::error::CoreError;
use crate::health::{HealthTracker, QualityReport};
use crate::subscriber::{Subscriber, Subscribers, SubscriptionId, Update};
use crate::transport::ChargerTransport;

use self::poll::PollLoop;

// ── ConnectionState ──────────────────────────────────────────────

/// Connection state observable by hosts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Connected,
    Connecting,
    #[default]
    Disconnected,
    Error,
    /// Long outage; failure logging is silenced and polling slows down.
    Offline,
}

// ── Charger ──────────────────────────────────────────────────────

/// The main entry point for hosts.
///
/// Cheaply cloneable via `Arc<ChargerInner>`. Create it, call
/// [`start()`](Self::start) to spawn the background tasks, and
/// [`shutdown()`](Self::shutdown) to tear everything down.
pub struct Charger<T: ChargerTransport = ChargerClient> {
    inner: Arc<ChargerInner<T>>,
}

impl<T: ChargerTransport> Clone for Charger<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct ChargerInner<T> {
    config: ChargerConfig,
    transport: Arc<T>,
    health: Arc<HealthTracker>,
    cache: StateCache,
    offline: Arc<OfflineBuffer>,
    subscribers: Subscribers,
    held: ArcSwap<TelemetrySnapshot>,
    available: AtomicBool,
    device_info: ArcSwapOption<DeviceInfo>,
    connection_state: watch::Sender<ConnectionState>,
    updates: watch::Sender<Update>,
    command_tx: mpsc::Sender<CommandEnvelope>,
    command_rx: Mutex<Option<mpsc::Receiver<CommandEnvelope>>>,
    exec_lock: Arc<Mutex<()>>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Charger<ChargerClient> {
    /// Create a charger backed by the HTTP client. Does NOT poll yet --
    /// call [`start()`](Self::start).
    pub fn new(config: ChargerConfig) -> Self {
        let client = ChargerClient::new(
            config.url.clone(),
            config.username.clone(),
            config.password.clone(),
            config.transport(),
        );
        Self::with_transport(config, client)
    }
}

impl<T: ChargerTransport> Charger<T> {
    /// Create a charger over any transport.
    pub fn with_transport(config: ChargerConfig, transport: T) -> Self {
        let (connection_state, _) = watch::channel(ConnectionState::Disconnected);
        let (updates, _) = watch::channel(Update::default());
        let (command_tx, command_rx) = mpsc::channel(config.commands.queue_capacity.max(1));

        Self {
            inner: Arc::new(ChargerInner {
                transport: Arc::new(transport),
                health: Arc::new(HealthTracker::new(config.health.clone())),
                cache: StateCache::new(config.cache_ttl),
                offline: Arc::new(OfflineBuffer::new(
                    config.commands.offline_capacity,
                    config.commands.offline_max_age,
                )),
                subscribers: Subscribers::default(),
                held: ArcSwap::from_pointee(TelemetrySnapshot::default()),
                available: AtomicBool::new(false),
                device_info: ArcSwapOption::empty(),
                connection_state,
                updates,
                command_tx,
                command_rx: Mutex::new(Some(command_rx)),
                exec_lock: Arc::new(Mutex::new(())),
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
                config,
            }),
        }
    }

    /// Access the charger configuration.
    pub fn config(&self) -> &ChargerConfig {
        &self.inner.config
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Spawn the poll loop and the command worker.
    ///
    /// The first poll runs immediately. Fails if the charger was already
    /// started or has been shut down.
    pub async fn start(&self) -> Result<(), CoreError> {
        if self.inner.cancel.is_cancelled() {
            return Err(CoreError::Cancelled);
        }
        let Some(rx) = self.inner.command_rx.lock().await.take() else {
            return Err(CoreError::Internal("charger already started".into()));
        };

        let _ = self
            .inner
            .connection_state
            .send_replace(ConnectionState::Connecting);

        let worker = CommandWorker {
            transport: Arc::clone(&self.inner.transport),
            health: Arc::clone(&self.inner.health),
            offline: Arc::clone(&self.inner.offline),
            config: self.inner.config.commands.clone(),
            exec_lock: Arc::clone(&self.inner.exec_lock),
            cancel: self.inner.cancel.clone(),
            last_dispatch: None,
        };

        let mut handles = self.inner.task_handles.lock().await;
        handles.push(tokio::spawn(worker.run(rx)));
        handles.push(tokio::spawn(PollLoop::new(self.clone()).run()));

        info!(host = %self.inner.config.url, "charger polling started");
        Ok(())
    }

    /// Stop both background tasks and release the transport.
    ///
    /// Each task gets the configured grace period before it is aborted.
    /// Queued and in-flight commands resolve as [`CoreError::Cancelled`].
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();

        let grace = self.inner.config.polling.shutdown_grace;
        let handles: Vec<JoinHandle<()>> = self.inner.task_handles.lock().await.drain(..).collect();
        for mut handle in handles {
            if tokio::time::timeout(grace, &mut handle).await.is_err() {
                warn!("background task did not stop within the grace period; aborting");
                handle.abort();
            }
        }

        self.inner.transport.close().await;
        self.inner.available.store(false, Ordering::SeqCst);
        let _ = self
            .inner
            .connection_state
            .send_replace(ConnectionState::Disconnected);
        debug!(host = %self.inner.config.url, "charger shut down");
    }

    // ── Reads ────────────────────────────────────────────────────

    /// The held snapshot. Never blocks; empty when nothing is known.
    pub fn get_snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot::clone(&self.inner.held.load())
    }

    /// Whether the held snapshot comes from a live, successful poll.
    pub fn is_available(&self) -> bool {
        self.inner.available.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.connection_state.borrow()
    }

    /// Subscribe to connection state changes.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection_state.subscribe()
    }

    /// Stream of published updates, starting with the next one.
    pub fn updates(&self) -> impl Stream<Item = Update> + Send + use<T> {
        WatchStream::from_changes(self.inner.updates.subscribe())
    }

    /// Health diagnostics for the host's diagnostics surface.
    pub fn quality_metrics(&self) -> QualityReport {
        self.inner.health.quality()
    }

    /// Identity fields from the most recent successful poll.
    pub fn device_info(&self) -> Option<Arc<DeviceInfo>> {
        self.inner.device_info.load_full()
    }

    /// Commands waiting for the charger to come back.
    pub fn parked_commands(&self) -> usize {
        self.inner.offline.len()
    }

    // ── Subscribers ──────────────────────────────────────────────

    pub fn subscribe(&self, subscriber: impl Subscriber) -> SubscriptionId {
        self.inner.subscribers.add(Arc::new(subscriber))
    }

    /// Returns `false` if `id` was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.subscribers.remove(id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    // ── Commands ─────────────────────────────────────────────────

    /// Queue a command and wait for it to resolve.
    ///
    /// Always resolves within the configured command timeout: success,
    /// the final attempt's failure, [`CoreError::CommandTimeout`], or
    /// [`CoreError::Cancelled`] during shutdown.
    pub async fn submit(&self, command: Command) -> Result<CommandReceipt, CoreError> {
        if self.inner.cancel.is_cancelled() {
            return Err(CoreError::Cancelled);
        }

        let timeout = self.inner.config.commands.timeout;
        let name = command.name().to_owned();
        let (tx, rx) = oneshot::channel();
        let envelope = CommandEnvelope::new(command, tx);

        let wait = async {
            self.inner
                .command_tx
                .send(envelope)
                .await
                .map_err(|_| CoreError::Cancelled)?;
            rx.await.map_err(|_| CoreError::Cancelled)?
        };

        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| CoreError::CommandTimeout {
                command: name,
                timeout_secs: timeout.as_secs(),
            })?
    }

    /// Raw form of [`submit`](Self::submit).
    pub async fn submit_command(
        &self,
        name: &str,
        value: &str,
        verify: bool,
    ) -> Result<CommandReceipt, CoreError> {
        self.submit(Command::new(name, value).with_verification(verify))
            .await
    }

    pub async fn enable_charging(&self, enabled: bool) -> Result<CommandReceipt, CoreError> {
        self.submit(Command::enable_charging(enabled)).await
    }

    /// Set the current limit, rejecting values outside the model's range
    /// before anything is queued.
    pub async fn set_current(&self, amps: u8) -> Result<CommandReceipt, CoreError> {
        self.inner.config.model.validate_current(amps)?;
        self.submit(Command::set_current(amps)).await
    }

    pub async fn one_charge(&self, enabled: bool) -> Result<CommandReceipt, CoreError> {
        self.submit(Command::one_charge(enabled)).await
    }

    pub async fn reset_counter_a(&self) -> Result<CommandReceipt, CoreError> {
        self.submit(Command::reset_counter_a()).await
    }

    // ── Publishing (poll loop only) ──────────────────────────────

    fn publish(&self) {
        let update = Update {
            snapshot: self.get_snapshot(),
            available: self.is_available(),
            connection_state: self.state(),
        };
        self.inner.updates.send_replace(update.clone());
        self.inner.subscribers.notify_all(&update);
    }
}
