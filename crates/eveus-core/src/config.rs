// ── Runtime charger configuration ──
//
// Describes *how* to talk to one charger and every tunable threshold of
// the poll loop, command queue, and health tracker. Never touches disk:
// `eveus-config` (or any other host) builds a `ChargerConfig` and hands it in.

use std::time::Duration;

use secrecy::SecretString;
use strum::{Display, EnumString};
use url::Url;

use eveus_api::TransportConfig;

use crate::error::CoreError;

/// Lowest charging current any Eveus model accepts, in amps.
pub const MIN_CURRENT_A: u8 = 8;

/// Hardware variant, which bounds the current setpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum ChargerModel {
    #[default]
    #[strum(to_string = "16A", serialize = "16")]
    Model16A,
    #[strum(to_string = "32A", serialize = "32")]
    Model32A,
}

impl ChargerModel {
    pub fn max_current(self) -> u8 {
        match self {
            Self::Model16A => 16,
            Self::Model32A => 32,
        }
    }

    /// Reject setpoints outside `MIN_CURRENT_A..=max_current()`.
    pub fn validate_current(self, amps: u8) -> Result<(), CoreError> {
        let max = self.max_current();
        if (MIN_CURRENT_A..=max).contains(&amps) {
            Ok(())
        } else {
            Err(CoreError::ValidationFailed {
                message: format!(
                    "current {amps}A is outside the {MIN_CURRENT_A}-{max}A range of the {self} model"
                ),
            })
        }
    }
}

// ── Poll loop ────────────────────────────────────────────────────────

/// Cadence, backoff, and offline detection for the poll loop.
#[derive(Debug, Clone)]
pub struct PollingConfig {
    /// Poll interval while the charger is charging or drawing power.
    pub active_interval: Duration,
    /// Poll interval while the charger is idle.
    pub idle_interval: Duration,
    /// Power draw above which the charger counts as active, in watts.
    pub active_power_threshold_w: f64,
    /// First failure backoff; doubles per consecutive failure.
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    /// Fraction of the backoff added as random jitter (0.0 disables it).
    pub jitter_ratio: f64,
    /// Fixed poll delay once the charger is considered offline.
    pub offline_backoff: Duration,
    /// Offline requires more than this many consecutive failures...
    pub offline_failure_threshold: u32,
    /// ...and more than this long since the last success.
    pub offline_after: Duration,
    /// Recreate the transport session after this many consecutive failures.
    pub reconnect_after_failures: u32,
    /// Notify subscribers at least this often even without significant changes.
    pub quiet_period: Duration,
    /// Minimum spacing between failure warnings in the log.
    pub log_interval: Duration,
    /// How long shutdown waits for each background task.
    pub shutdown_grace: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            active_interval: Duration::from_secs(10),
            idle_interval: Duration::from_secs(60),
            active_power_threshold_w: 100.0,
            backoff_base: Duration::from_secs(2),
            backoff_max: Duration::from_secs(60),
            jitter_ratio: 0.1,
            offline_backoff: Duration::from_secs(300),
            offline_failure_threshold: 10,
            offline_after: Duration::from_secs(600),
            reconnect_after_failures: 5,
            quiet_period: Duration::from_secs(60),
            log_interval: Duration::from_secs(60),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

// ── Command queue ────────────────────────────────────────────────────

/// Rate limiting, retries, and offline buffering for commands.
#[derive(Debug, Clone)]
pub struct CommandConfig {
    /// Minimum gap between the end of one dispatch and the start of the next.
    pub min_interval: Duration,
    pub max_attempts: u32,
    pub retry_base: Duration,
    pub retry_max: Duration,
    /// Upper bound on how long a caller waits for a command to resolve.
    pub timeout: Duration,
    pub queue_capacity: usize,
    /// Re-issue commands that failed for connectivity reasons once the
    /// charger comes back.
    pub replay_offline: bool,
    pub offline_max_age: Duration,
    pub offline_capacity: usize,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_secs(1),
            max_attempts: 3,
            retry_base: Duration::from_secs(1),
            retry_max: Duration::from_secs(10),
            timeout: Duration::from_secs(30),
            queue_capacity: 64,
            replay_offline: true,
            offline_max_age: Duration::from_secs(300),
            offline_capacity: 16,
        }
    }
}

// ── Health tracker ───────────────────────────────────────────────────

/// Window sizes and scoring thresholds for the health tracker.
#[derive(Debug, Clone)]
pub struct HealthConfig {
    pub latency_window: usize,
    pub outcome_window: usize,
    pub error_log_capacity: usize,
    /// Errors younger than this count as "recent".
    pub lookback: Duration,
    /// Consecutive failures that call for a power cycle.
    pub power_cycle_failures: u32,
    /// Recent connectivity or transient errors that point at the network.
    pub network_error_threshold: usize,
    /// Recent protocol errors that call for an integration restart.
    pub protocol_error_threshold: usize,
    /// Consecutive failures that call for retrying with backoff.
    pub backoff_failures: u32,
    /// Average latency at or below this earns the full latency score.
    pub latency_good: Duration,
    /// Average latency at or above this earns no latency score.
    pub latency_bad: Duration,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            latency_window: 20,
            outcome_window: 100,
            error_log_capacity: 10,
            lookback: Duration::from_secs(300),
            power_cycle_failures: 10,
            network_error_threshold: 3,
            protocol_error_threshold: 3,
            backoff_failures: 5,
            latency_good: Duration::from_millis(500),
            latency_bad: Duration::from_secs(5),
        }
    }
}

// ── ChargerConfig ────────────────────────────────────────────────────

/// Configuration for one charger.
///
/// Built by the host and passed to [`Charger`](crate::Charger); core never
/// reads config files.
#[derive(Debug, Clone)]
pub struct ChargerConfig {
    /// Charger base URL (e.g. `http://192.168.1.50`).
    pub url: Url,
    pub username: String,
    pub password: SecretString,
    pub model: ChargerModel,
    /// Per-request timeout.
    pub timeout: Duration,
    pub connect_timeout: Duration,
    /// Maximum age of the pooled HTTP session.
    pub session_ttl: Duration,
    /// How long a last-known-good snapshot may stand in for a failed poll.
    pub cache_ttl: Duration,
    pub polling: PollingConfig,
    pub commands: CommandConfig,
    pub health: HealthConfig,
}

impl ChargerConfig {
    /// Configuration with default tuning for the charger at `url`.
    pub fn new(url: Url, username: impl Into<String>, password: SecretString) -> Self {
        let transport = TransportConfig::default();
        Self {
            url,
            username: username.into(),
            password,
            model: ChargerModel::default(),
            timeout: transport.timeout,
            connect_timeout: transport.connect_timeout,
            session_ttl: transport.session_ttl,
            cache_ttl: Duration::from_secs(300),
            polling: PollingConfig::default(),
            commands: CommandConfig::default(),
            health: HealthConfig::default(),
        }
    }

    /// Build the configuration from a bare host name or address.
    pub fn for_host(
        host: &str,
        username: impl Into<String>,
        password: SecretString,
    ) -> Result<Self, CoreError> {
        let host = host.trim();
        if host.is_empty() {
            return Err(CoreError::Config {
                message: "charger host must not be empty".into(),
            });
        }
        let raw = if host.contains("://") {
            host.to_owned()
        } else {
            format!("http://{host}")
        };
        let url = Url::parse(&raw).map_err(|e| CoreError::Config {
            message: format!("invalid charger host '{host}': {e}"),
        })?;
        Ok(Self::new(url, username, password))
    }

    /// Transport settings for the HTTP client.
    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            timeout: self.timeout,
            connect_timeout: self.connect_timeout,
            session_ttl: self.session_ttl,
            ..TransportConfig::default()
        }
    }
}
