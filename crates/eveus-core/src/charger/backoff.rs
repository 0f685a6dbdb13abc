// Poll cadence: activity-based intervals after a success, exponential
// backoff with jitter after a failure.

use std::time::Duration;

use eveus_api::TelemetrySnapshot;

use crate::config::PollingConfig;

/// Delay after a successful poll.
pub(crate) fn success_interval(snapshot: &TelemetrySnapshot, polling: &PollingConfig) -> Duration {
    let drawing_power = snapshot
        .power_w()
        .is_some_and(|w| w > polling.active_power_threshold_w);
    if snapshot.is_charging() || drawing_power {
        polling.active_interval
    } else {
        polling.idle_interval
    }
}

/// Delay after the `consecutive`-th failed poll in a row.
pub(crate) fn failure_backoff(consecutive: u32, polling: &PollingConfig) -> Duration {
    let exponent = consecutive.saturating_sub(1).min(31);
    let delay = polling
        .backoff_base
        .saturating_mul(2_u32.saturating_pow(exponent))
        .min(polling.backoff_max);
    with_jitter(delay, polling.jitter_ratio)
}

/// Add up to `ratio * delay` of random slack.
fn with_jitter(delay: Duration, ratio: f64) -> Duration {
    if !ratio.is_finite() || ratio <= 0.0 {
        return delay;
    }
    let extra = delay.as_secs_f64() * ratio * rand::random::<f64>();
    delay + Duration::try_from_secs_f64(extra).unwrap_or(Duration::ZERO)
}
