//! Communication and resilience layer for Eveus EV chargers.
//!
//! This crate sits between `eveus-api` and whatever hosts the charger
//! (a home-automation bridge, the `eveus` CLI):
//!
//! - **[`Charger`]**: per-device facade. [`start()`](Charger::start) spawns
//!   the poll loop and the command worker; [`shutdown()`](Charger::shutdown)
//!   tears both down and releases the HTTP session.
//!
//! - **Poll loop**: adapts its cadence to charger activity, backs off
//!   exponentially on failure, falls back to a short-lived [`StateCache`],
//!   and goes quiet once the charger is confirmed offline.
//!
//! - **[`Command`]**: typed writes routed through an `mpsc` channel to a
//!   single worker that rate-limits, retries, and verifies them. Commands
//!   that fail while the charger is unreachable are parked in the
//!   [`OfflineBuffer`] and replayed on recovery.
//!
//! - **[`HealthTracker`]**: rolling outcome statistics, a 0-100 health
//!   score, and a recovery recommendation, with failures grouped by
//!   [`classify`].

pub mod cache;
pub mod charger;
pub mod classify;
pub mod command;
pub mod config;
pub mod error;
pub mod health;
pub mod subscriber;
pub mod transport;

// ── Primary re-exports ──────────────────────────────────────────────
pub use cache::StateCache;
pub use charger::{Charger, ConnectionState};
pub use classify::{ErrorCategory, classify};
pub use command::{Command, CommandReceipt, OfflineBuffer, VerifyRule};
pub use config::{ChargerConfig, ChargerModel, CommandConfig, HealthConfig, PollingConfig};
pub use error::CoreError;
pub use health::{HealthStatus, HealthTracker, QualityReport, RecoveryAction, Severity, Trend};
pub use subscriber::{Subscriber, SubscriptionId, Update};
pub use transport::ChargerTransport;

pub use eveus_api::{ChargerState, DeviceInfo, TelemetrySnapshot, TelemetryValue, fields};
