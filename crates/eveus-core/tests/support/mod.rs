// Scripted in-memory charger shared by the integration tests.
#![allow(dead_code, clippy::unwrap_used)]

use std::collections::VecDeque;
use std::future::{Future, ready};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;
use url::Url;

use eveus_api::{Error, TelemetrySnapshot, TelemetryValue};
use eveus_core::{ChargerConfig, ChargerTransport};

/// Failure modes the fake can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Connect,
    Timeout,
    Unauthorized,
    ServerError,
    Malformed,
    Rejected,
}

impl Fault {
    fn error(self, command: &str) -> Error {
        match self {
            Self::Connect => Error::Connectivity {
                url: "http://charger.test/main".into(),
                reason: "connection refused".into(),
            },
            Self::Timeout => Error::Timeout { timeout_secs: 20 },
            Self::Unauthorized => Error::Authentication {
                message: "charger rejected the configured credentials".into(),
            },
            Self::ServerError => Error::Status {
                status: 503,
                endpoint: "main",
            },
            Self::Malformed => Error::Protocol {
                message: "expected a JSON object".into(),
                body: "<html>".into(),
            },
            Self::Rejected => Error::Command {
                command: command.to_owned(),
                response: "error".into(),
            },
        }
    }
}

type Reply = Result<TelemetrySnapshot, Fault>;

#[derive(Default)]
struct State {
    plan: Mutex<VecDeque<Reply>>,
    fallback: Mutex<Option<Reply>>,
    dispatch_fault: Mutex<Option<Fault>>,
    dispatch_delay: Mutex<Option<Duration>>,
    apply_dispatch: AtomicBool,
    dispatches: Mutex<Vec<(String, String, Instant)>>,
    fetches: AtomicUsize,
    resets: AtomicUsize,
    closed: AtomicBool,
}

/// Cloneable handle; the charger owns one clone, the test keeps another.
#[derive(Clone, Default)]
pub struct FakeCharger(Arc<State>);

impl FakeCharger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one fetch reply, consumed before the fallback.
    pub fn push_fetch(&self, reply: Reply) {
        self.0.plan.lock().unwrap().push_back(reply);
    }

    /// Reply for every fetch once the plan is exhausted.
    pub fn set_fallback(&self, reply: Reply) {
        *self.0.fallback.lock().unwrap() = Some(reply);
    }

    pub fn fail_dispatch(&self, fault: Option<Fault>) {
        *self.0.dispatch_fault.lock().unwrap() = fault;
    }

    /// Hold every dispatch reply back for `delay`, like a charger that
    /// accepts the connection and then stalls.
    pub fn delay_dispatch(&self, delay: Option<Duration>) {
        *self.0.dispatch_delay.lock().unwrap() = delay;
    }

    /// When set, a successful dispatch writes its value into the fallback
    /// snapshot, the way the real charger applies a command.
    pub fn apply_dispatches(&self, apply: bool) {
        self.0.apply_dispatch.store(apply, Ordering::SeqCst);
    }

    pub fn fetches(&self) -> usize {
        self.0.fetches.load(Ordering::SeqCst)
    }

    pub fn resets(&self) -> usize {
        self.0.resets.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.0.closed.load(Ordering::SeqCst)
    }

    pub fn dispatches(&self) -> Vec<(String, String, Instant)> {
        self.0.dispatches.lock().unwrap().clone()
    }

    fn next_fetch(&self) -> Result<TelemetrySnapshot, Error> {
        self.0.fetches.fetch_add(1, Ordering::SeqCst);
        let planned = self.0.plan.lock().unwrap().pop_front();
        let reply = planned
            .or_else(|| self.0.fallback.lock().unwrap().clone())
            .unwrap_or(Err(Fault::Connect));
        reply.map_err(|fault| fault.error(""))
    }

    fn dispatch(&self, name: &str, value: &str) -> Result<String, Error> {
        self.0
            .dispatches
            .lock()
            .unwrap()
            .push((name.to_owned(), value.to_owned(), Instant::now()));

        if let Some(fault) = *self.0.dispatch_fault.lock().unwrap() {
            return Err(fault.error(name));
        }

        if self.0.apply_dispatch.load(Ordering::SeqCst) {
            let mut fallback = self.0.fallback.lock().unwrap();
            if let Some(Ok(snapshot)) = fallback.as_ref() {
                let parsed: TelemetryValue = value
                    .parse::<i64>()
                    .map_or_else(|_| value.into(), TelemetryValue::Int);
                let updated: TelemetrySnapshot = snapshot
                    .iter()
                    .map(|(k, v)| (k.to_owned(), v.clone()))
                    .filter(|(k, _)| k != name)
                    .chain([(name.to_owned(), parsed)])
                    .collect();
                *fallback = Some(Ok(updated));
            }
        }
        Ok("OK".into())
    }
}

impl ChargerTransport for FakeCharger {
    fn fetch_state(&self) -> impl Future<Output = Result<TelemetrySnapshot, Error>> + Send {
        ready(self.next_fetch())
    }

    fn dispatch_command(
        &self,
        name: &str,
        value: &str,
    ) -> impl Future<Output = Result<String, Error>> + Send {
        let result = self.dispatch(name, value);
        let delay = *self.0.dispatch_delay.lock().unwrap();
        async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            result
        }
    }

    fn reset_session(&self) {
        self.0.resets.fetch_add(1, Ordering::SeqCst);
    }

    fn close(&self) -> impl Future<Output = ()> + Send {
        self.0.closed.store(true, Ordering::SeqCst);
        ready(())
    }
}

// ── Fixtures ────────────────────────────────────────────────────────

/// Idle charger telemetry.
pub fn idle(current_set: i64) -> TelemetrySnapshot {
    [
        ("state", TelemetryValue::Int(2)),
        ("powerMeas", TelemetryValue::Int(0)),
        ("currentSet", TelemetryValue::Int(current_set)),
        ("evseEnabled", TelemetryValue::Int(1)),
        ("verFWMain", TelemetryValue::Text("3.0.2".into())),
    ]
    .into_iter()
    .collect()
}

/// Charger telemetry while charging at `power` watts.
pub fn charging(power: i64) -> TelemetrySnapshot {
    [
        ("state", TelemetryValue::Int(4)),
        ("powerMeas", TelemetryValue::Int(power)),
        ("currentSet", TelemetryValue::Int(16)),
        ("evseEnabled", TelemetryValue::Int(1)),
    ]
    .into_iter()
    .collect()
}

/// Default configuration with jitter disabled so timings are exact.
pub fn config() -> ChargerConfig {
    let mut config = ChargerConfig::new(
        Url::parse("http://charger.test").unwrap(),
        "admin",
        "secret".to_string().into(),
    );
    config.polling.jitter_ratio = 0.0;
    config
}

/// Sleep until `secs` seconds after `origin`.
pub async fn at(origin: Instant, secs: u64) {
    tokio::time::sleep_until(origin + Duration::from_secs(secs)).await;
}
