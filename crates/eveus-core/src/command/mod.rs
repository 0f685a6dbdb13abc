// ── Command API ──
//
// Every write to the charger is a `Command`: a form field name, its value,
// and how to confirm the charger applied it. Commands flow through an mpsc
// channel to a single worker (see `queue`) which rate-limits, retries, and
// verifies them.

pub mod offline;
pub(crate) mod queue;

use serde::Serialize;
use tokio::sync::oneshot;
use tokio::time::Instant;
use uuid::Uuid;

use eveus_api::{TelemetrySnapshot, TelemetryValue, fields};

use crate::error::CoreError;

pub use offline::OfflineBuffer;

/// Command field that resets the "A" energy counter.
pub const RESET_COUNTER_A: &str = "rstEM1";

/// How a command's effect is confirmed against a fresh snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyRule {
    /// The field, read as a 0/1 flag, equals the commanded flag.
    Flag,
    /// The field, read as a number, equals the commanded number.
    Numeric,
    /// The field's textual form equals the commanded value.
    Exact,
    /// Nothing to compare against (counter resets).
    Trivial,
}

impl VerifyRule {
    /// Rule for a raw field name.
    pub fn for_field(name: &str) -> Self {
        match name {
            fields::ENABLED | fields::ONE_CHARGE => Self::Flag,
            fields::CURRENT_SET => Self::Numeric,
            RESET_COUNTER_A => Self::Trivial,
            _ => Self::Exact,
        }
    }
}

/// A write request for the charger.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    name: String,
    value: String,
    verify: bool,
    rule: VerifyRule,
}

impl Command {
    /// Raw command. Verification is on, with the rule implied by `name`.
    pub fn new(name: impl Into<String>, value: impl ToString) -> Self {
        let name = name.into();
        Self {
            rule: VerifyRule::for_field(&name),
            name,
            value: value.to_string(),
            verify: true,
        }
    }

    // ── Typed constructors ───────────────────────────────────────────

    pub fn enable_charging(enabled: bool) -> Self {
        Self::new(fields::ENABLED, u8::from(enabled))
    }

    /// Current setpoint in amps. Range checks against the charger model
    /// happen in [`Charger::set_current`](crate::Charger::set_current).
    pub fn set_current(amps: u8) -> Self {
        Self::new(fields::CURRENT_SET, amps)
    }

    pub fn one_charge(enabled: bool) -> Self {
        Self::new(fields::ONE_CHARGE, u8::from(enabled))
    }

    pub fn reset_counter_a() -> Self {
        Self::new(RESET_COUNTER_A, 0)
    }

    /// Toggle post-dispatch verification.
    pub fn with_verification(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn verify(&self) -> bool {
        self.verify
    }

    pub fn rule(&self) -> VerifyRule {
        self.rule
    }

    /// Replay order after an outage; lower goes first.
    pub fn priority(&self) -> u8 {
        match self.name.as_str() {
            fields::ENABLED => 1,
            fields::CURRENT_SET => 2,
            fields::ONE_CHARGE => 3,
            RESET_COUNTER_A => 4,
            _ => 10,
        }
    }

    /// Check that `snapshot` reflects this command.
    pub fn verify_against(&self, snapshot: &TelemetrySnapshot) -> Result<(), CoreError> {
        let actual = snapshot.get(&self.name);
        let applied = match self.rule {
            VerifyRule::Trivial => true,
            VerifyRule::Flag => {
                let expected = TelemetryValue::from(self.value.as_str()).as_bool();
                expected.is_some() && actual.and_then(TelemetryValue::as_bool) == expected
            }
            VerifyRule::Numeric => {
                match (
                    actual.and_then(TelemetryValue::as_f64),
                    self.value.trim().parse::<f64>().ok(),
                ) {
                    (Some(actual), Some(expected)) => (actual - expected).abs() < f64::EPSILON,
                    _ => false,
                }
            }
            VerifyRule::Exact => actual.is_some_and(|v| v.to_string() == self.value),
        };

        if applied {
            Ok(())
        } else {
            Err(CoreError::VerificationFailed {
                command: self.name.clone(),
                expected: self.value.clone(),
                actual: actual.map(ToString::to_string),
            })
        }
    }
}

/// Successful resolution of a submitted command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandReceipt {
    pub id: Uuid,
    pub command: String,
    pub value: String,
    /// Dispatch attempts it took, including the successful one.
    pub attempts: u32,
    pub verified: bool,
    /// Raw response text from the charger.
    pub response: String,
}

/// A command envelope sent through the command channel.
pub(crate) struct CommandEnvelope {
    pub id: Uuid,
    pub command: Command,
    pub enqueued_at: Instant,
    /// Set when the command is a replay of an offline-parked one.
    pub parked_at: Option<Instant>,
    /// `None` for replays, which nobody awaits.
    pub response_tx: Option<oneshot::Sender<Result<CommandReceipt, CoreError>>>,
}

impl CommandEnvelope {
    pub fn new(
        command: Command,
        response_tx: oneshot::Sender<Result<CommandReceipt, CoreError>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            command,
            enqueued_at: Instant::now(),
            parked_at: None,
            response_tx: Some(response_tx),
        }
    }

    pub fn replay(command: Command, parked_at: Instant) -> Self {
        Self {
            id: Uuid::new_v4(),
            command,
            enqueued_at: Instant::now(),
            parked_at: Some(parked_at),
            response_tx: None,
        }
    }
}
