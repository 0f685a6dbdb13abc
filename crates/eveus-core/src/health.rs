// ── Connection health tracking ──
//
// Rolling statistics over poll and command outcomes, plus two derived
// views: a 0-100 health score and a rule-based recovery recommendation.
// Recording never fails; the tracker only observes and reports.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::Display;
use tokio::time::Instant;

use crate::classify::{ErrorCategory, classify};
use crate::config::HealthConfig;

/// Window used for `requests_per_minute`.
const RATE_WINDOW: Duration = Duration::from_secs(60);

// ── Report types ─────────────────────────────────────────────────────

/// Suggested operator action, in decreasing order of urgency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    PowerCycleDevice,
    CheckNetwork,
    RestartIntegration,
    RetryWithBackoff,
    Monitor,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
}

impl RecoveryAction {
    pub fn severity(self) -> Severity {
        match self {
            Self::PowerCycleDevice => Severity::High,
            Self::CheckNetwork | Self::RestartIntegration => Severity::Medium,
            Self::RetryWithBackoff | Self::Monitor => Severity::Low,
            Self::None => Severity::Info,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::PowerCycleDevice => "Charger has not answered for a long time; power-cycle it",
            Self::CheckNetwork => "Repeated network failures; check Wi-Fi signal and addressing",
            Self::RestartIntegration => "Repeated malformed responses; restart the integration",
            Self::RetryWithBackoff => "Several consecutive failures; retrying with backoff",
            Self::Monitor => "Occasional errors; keep monitoring",
            Self::None => "Connection healthy",
        }
    }
}

/// Qualitative label derived from the success rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
pub enum HealthStatus {
    Excellent,
    Good,
    Fair,
    Poor,
    Critical,
}

impl HealthStatus {
    fn from_success_rate(rate: f64) -> Self {
        if rate > 95.0 {
            Self::Excellent
        } else if rate > 80.0 {
            Self::Good
        } else if rate > 60.0 {
            Self::Fair
        } else if rate > 30.0 {
            Self::Poor
        } else {
            Self::Critical
        }
    }
}

/// Direction of the success rate over the last ten polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improving,
    Stable,
    Degrading,
}

/// One entry of the recent-error log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorRecord {
    pub at: DateTime<Utc>,
    pub error_type: String,
    pub category: ErrorCategory,
    pub description: &'static str,
}

/// Diagnostics view over the tracker, serializable for host surfaces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityReport {
    /// Percentage of successful outcomes in the rolling window.
    pub success_rate: f64,
    pub avg_latency_secs: f64,
    pub recent_error_count: usize,
    pub health_score: u8,
    pub consecutive_failures: u32,
    pub recommendation: RecoveryAction,
    pub severity: Severity,
    pub recommendation_message: &'static str,
    pub requests_per_minute: usize,
    pub status: HealthStatus,
    pub trend: Trend,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error_type: Option<String>,
    pub last_error_category: Option<ErrorCategory>,
    /// Lifetime failure counts keyed by category label.
    pub error_counts: BTreeMap<String, u64>,
    pub recent_errors: Vec<ErrorRecord>,
}

// ── HealthTracker ────────────────────────────────────────────────────

struct LoggedError {
    at: Instant,
    record: ErrorRecord,
}

struct HealthState {
    latencies: VecDeque<Duration>,
    outcomes: VecDeque<bool>,
    success_history: VecDeque<f64>,
    request_times: VecDeque<Instant>,
    consecutive_failures: u32,
    last_success: Option<Instant>,
    last_success_at: Option<DateTime<Utc>>,
    last_error: Option<(String, ErrorCategory)>,
    category_counts: BTreeMap<String, u64>,
    error_log: VecDeque<LoggedError>,
}

/// Thread-safe outcome accumulator shared by the poll loop and the
/// command queue.
pub struct HealthTracker {
    config: HealthConfig,
    created: Instant,
    state: Mutex<HealthState>,
}

impl HealthTracker {
    pub fn new(config: HealthConfig) -> Self {
        Self {
            state: Mutex::new(HealthState {
                latencies: VecDeque::with_capacity(config.latency_window),
                outcomes: VecDeque::with_capacity(config.outcome_window),
                success_history: VecDeque::with_capacity(config.outcome_window),
                request_times: VecDeque::new(),
                consecutive_failures: 0,
                last_success: None,
                last_success_at: None,
                last_error: None,
                category_counts: BTreeMap::new(),
                error_log: VecDeque::with_capacity(config.error_log_capacity),
            }),
            created: Instant::now(),
            config,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HealthState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the outcome of a poll.
    ///
    /// A success resets the consecutive-failure counter; a failure
    /// increments it by exactly one and is logged under its category.
    pub fn record(&self, latency: Duration, success: bool, error_type: Option<&str>) {
        let mut state = self.lock();
        state.push_outcome(&self.config, latency, success);

        if success {
            state.consecutive_failures = 0;
            state.last_success = Some(Instant::now());
            state.last_success_at = Some(Utc::now());
        } else {
            state.consecutive_failures = state.consecutive_failures.saturating_add(1);
            state.push_error(&self.config, error_type);
        }

        let rate = state.success_rate();
        push_bounded(&mut state.success_history, rate, self.config.outcome_window);
    }

    /// Record the outcome of a command dispatch.
    ///
    /// Commands feed the rolling windows and the error log but leave the
    /// consecutive-failure counter and last-success time to the poll loop.
    pub fn record_command(&self, latency: Duration, success: bool, error_type: Option<&str>) {
        let mut state = self.lock();
        state.push_outcome(&self.config, latency, success);
        if !success {
            state.push_error(&self.config, error_type);
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    /// Time since the last successful poll, or since the tracker was
    /// created if there has never been one.
    pub fn since_last_success(&self) -> Duration {
        self.lock().last_success.unwrap_or(self.created).elapsed()
    }

    pub fn recommendation(&self) -> RecoveryAction {
        let state = self.lock();
        let recent: Vec<&ErrorRecord> = state.recent_errors(self.config.lookback).collect();
        recommend(&recent, state.consecutive_failures, &self.config)
    }

    /// Derived diagnostics snapshot.
    pub fn quality(&self) -> QualityReport {
        let state = self.lock();
        let recent: Vec<&ErrorRecord> = state.recent_errors(self.config.lookback).collect();

        let success_rate = state.success_rate();
        let avg_latency = state.avg_latency();
        let recommendation = recommend(&recent, state.consecutive_failures, &self.config);
        let requests_per_minute = state
            .request_times
            .iter()
            .filter(|t| t.elapsed() < RATE_WINDOW)
            .count();

        QualityReport {
            success_rate,
            avg_latency_secs: avg_latency.as_secs_f64(),
            recent_error_count: recent.len(),
            health_score: health_score(
                success_rate,
                recent.len(),
                state.consecutive_failures,
                avg_latency,
                &self.config,
            ),
            consecutive_failures: state.consecutive_failures,
            recommendation,
            severity: recommendation.severity(),
            recommendation_message: recommendation.message(),
            requests_per_minute,
            status: HealthStatus::from_success_rate(success_rate),
            trend: trend(&state.success_history),
            last_success: state.last_success_at,
            last_error_type: state.last_error.as_ref().map(|(t, _)| t.clone()),
            last_error_category: state.last_error.as_ref().map(|(_, c)| *c),
            error_counts: state.category_counts.clone(),
            recent_errors: recent.into_iter().cloned().collect(),
        }
    }
}

impl HealthState {
    fn push_outcome(&mut self, config: &HealthConfig, latency: Duration, success: bool) {
        push_bounded(&mut self.latencies, latency, config.latency_window);
        push_bounded(&mut self.outcomes, success, config.outcome_window);

        let now = Instant::now();
        while self
            .request_times
            .front()
            .is_some_and(|t| now.duration_since(*t) >= RATE_WINDOW)
        {
            self.request_times.pop_front();
        }
        self.request_times.push_back(now);
    }

    fn push_error(&mut self, config: &HealthConfig, error_type: Option<&str>) {
        let error_type = error_type.unwrap_or("UnknownError");
        let category = classify(error_type);

        *self.category_counts.entry(category.to_string()).or_insert(0) += 1;
        self.last_error = Some((error_type.to_owned(), category));
        push_bounded(
            &mut self.error_log,
            LoggedError {
                at: Instant::now(),
                record: ErrorRecord {
                    at: Utc::now(),
                    error_type: error_type.to_owned(),
                    category,
                    description: category.description(),
                },
            },
            config.error_log_capacity,
        );
    }

    #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
    fn success_rate(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 100.0;
        }
        let successes = self.outcomes.iter().filter(|ok| **ok).count();
        successes as f64 * 100.0 / self.outcomes.len() as f64
    }

    fn avg_latency(&self) -> Duration {
        let count = u32::try_from(self.latencies.len()).unwrap_or(u32::MAX);
        if count == 0 {
            return Duration::ZERO;
        }
        self.latencies.iter().sum::<Duration>() / count
    }

    fn recent_errors(&self, lookback: Duration) -> impl Iterator<Item = &ErrorRecord> {
        self.error_log
            .iter()
            .filter(move |e| e.at.elapsed() < lookback)
            .map(|e| &e.record)
    }
}

fn push_bounded<T>(buf: &mut VecDeque<T>, item: T, capacity: usize) {
    if capacity == 0 {
        return;
    }
    while buf.len() >= capacity {
        buf.pop_front();
    }
    buf.push_back(item);
}

// ── Derived views ────────────────────────────────────────────────────

/// Weighted 0-100 score: success rate (50), recent errors (20),
/// consecutive failures (15), latency (15). Latency scores linearly
/// between `config.latency_good` and `config.latency_bad`.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::as_conversions
)]
pub fn health_score(
    success_rate: f64,
    recent_errors: usize,
    consecutive_failures: u32,
    avg_latency: Duration,
    config: &HealthConfig,
) -> u8 {
    let recent = f64::from(u32::try_from(recent_errors).unwrap_or(u32::MAX));

    let success = success_rate.clamp(0.0, 100.0) * 0.5;
    let errors = (20.0 - 4.0 * recent).max(0.0);
    let streak = (15.0 - 3.0 * f64::from(consecutive_failures)).max(0.0);
    let latency = latency_score(avg_latency, config.latency_good, config.latency_bad);

    (success + errors + streak + latency).clamp(0.0, 100.0).trunc() as u8
}

fn latency_score(avg: Duration, good: Duration, bad: Duration) -> f64 {
    if avg <= good {
        15.0
    } else if avg >= bad {
        0.0
    } else {
        let (avg, good, bad) = (avg.as_secs_f64(), good.as_secs_f64(), bad.as_secs_f64());
        15.0 * (bad - avg) / (bad - good)
    }
}

fn recommend(
    recent: &[&ErrorRecord],
    consecutive_failures: u32,
    config: &HealthConfig,
) -> RecoveryAction {
    let network = recent
        .iter()
        .filter(|e| {
            matches!(
                e.category,
                ErrorCategory::Connectivity | ErrorCategory::Transient
            )
        })
        .count();
    let protocol = recent
        .iter()
        .filter(|e| e.category == ErrorCategory::Protocol)
        .count();

    if consecutive_failures >= config.power_cycle_failures {
        RecoveryAction::PowerCycleDevice
    } else if network >= config.network_error_threshold {
        RecoveryAction::CheckNetwork
    } else if protocol >= config.protocol_error_threshold {
        RecoveryAction::RestartIntegration
    } else if consecutive_failures >= config.backoff_failures {
        RecoveryAction::RetryWithBackoff
    } else if !recent.is_empty() {
        RecoveryAction::Monitor
    } else {
        RecoveryAction::None
    }
}

fn trend(history: &VecDeque<f64>) -> Trend {
    let len = history.len();
    if len <= 10 {
        return Trend::Stable;
    }
    let recent = history.range(len - 5..).sum::<f64>() / 5.0;
    let earlier = history.range(len - 10..len - 5).sum::<f64>() / 5.0;
    if recent > earlier + 10.0 {
        Trend::Improving
    } else if recent < earlier - 10.0 {
        Trend::Degrading
    } else {
        Trend::Stable
    }
}
