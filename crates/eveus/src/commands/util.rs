//! Shared helpers for command handlers.

use std::pin::pin;
use std::time::Duration;

use tokio_stream::StreamExt;

use eveus_core::{Charger, TelemetrySnapshot, Update, fields};

use crate::config::Target;
use crate::error::CliError;

/// A started charger that has completed its first poll.
pub struct Session {
    pub charger: Charger,
    pub profile: String,
    pub first: Update,
}

impl Session {
    /// Start polling and wait up to `wait` for the first result.
    ///
    /// A failed first poll is reported with the classified cause, and the
    /// charger is shut down before the error is returned.
    pub async fn open(target: Target, wait: Duration) -> Result<Self, CliError> {
        let Target { profile, config } = target;
        let url = config.url.to_string();
        let charger = Charger::new(config);
        let mut updates = pin!(charger.updates());

        charger.start().await?;

        let first = match tokio::time::timeout(wait, updates.next()).await {
            Ok(Some(update)) if update.available => Ok(update),
            Ok(Some(_)) => {
                let report = charger.quality_metrics();
                Err(CliError::from_poll_failure(
                    report.last_error_category,
                    report.last_error_type.as_deref(),
                    &url,
                    &profile,
                ))
            }
            Ok(None) => Err(CliError::Cancelled),
            Err(_) => Err(CliError::Timeout {
                seconds: wait.as_secs(),
            }),
        };

        match first {
            Ok(first) => Ok(Self {
                charger,
                profile,
                first,
            }),
            Err(e) => {
                charger.shutdown().await;
                Err(e)
            }
        }
    }

    pub async fn close(self) {
        self.charger.shutdown().await;
    }
}

// ── Telemetry formatting ─────────────────────────────────────────────

/// Render a field as text, `-` when absent.
pub fn field(snapshot: &TelemetrySnapshot, key: &str) -> String {
    snapshot
        .get(key)
        .map_or_else(|| "-".into(), ToString::to_string)
}

/// Render a numeric field with a unit and fixed precision.
pub fn measure(snapshot: &TelemetrySnapshot, key: &str, unit: &str, precision: usize) -> String {
    snapshot
        .f64(key)
        .map_or_else(|| "-".into(), |v| format!("{v:.precision$} {unit}"))
}

/// Charging state label, falling back to the raw code.
pub fn state_label(snapshot: &TelemetrySnapshot) -> String {
    snapshot.charger_state().map_or_else(
        || field(snapshot, fields::STATE),
        |state| state.to_string(),
    )
}

pub fn on_off(snapshot: &TelemetrySnapshot, key: &str) -> &'static str {
    match snapshot.bool(key) {
        Some(true) => "on",
        Some(false) => "off",
        None => "-",
    }
}
