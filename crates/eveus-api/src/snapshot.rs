// ── Telemetry wire types ──
//
// The `/main` endpoint answers with one flat JSON object. It is kept as an
// ordered key/value map rather than a typed struct: firmware revisions add
// and drop fields freely, and consumers only ever look up a handful of keys.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;
use strum::{Display, FromRepr};

use crate::error::Error;

/// Telemetry field names reported by the charger.
pub mod fields {
    pub const STATE: &str = "state";
    pub const SUB_STATE: &str = "subState";
    pub const POWER: &str = "powerMeas";
    pub const VOLTAGE: &str = "voltMeas1";
    pub const CURRENT: &str = "curMeas1";
    pub const CURRENT_SET: &str = "currentSet";
    pub const SESSION_ENERGY: &str = "sessionEnergy";
    pub const TOTAL_ENERGY: &str = "totalEnergy";
    pub const SESSION_TIME: &str = "sessionTime";
    pub const SYSTEM_TIME: &str = "systemTime";
    pub const COUNTER_A_ENERGY: &str = "IEM1";
    pub const COUNTER_B_ENERGY: &str = "IEM2";
    pub const COUNTER_A_COST: &str = "IEM1_money";
    pub const COUNTER_B_COST: &str = "IEM2_money";
    pub const TEMPERATURE_BOX: &str = "temperature1";
    pub const TEMPERATURE_PLUG: &str = "temperature2";
    pub const BATTERY_VOLTAGE: &str = "vBat";
    pub const GROUND: &str = "ground";
    pub const ENABLED: &str = "evseEnabled";
    pub const ONE_CHARGE: &str = "oneCharge";
    pub const FIRMWARE_VERSION: &str = "verFWMain";
    pub const STATION_ID: &str = "stationId";
    pub const SERIAL_NUMBER: &str = "serialNum";
}

// ── TelemetryValue ───────────────────────────────────────────────────

/// A single scalar reported by the charger.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TelemetryValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl TelemetryValue {
    /// Numeric view. Booleans map to 0/1, numeric strings are parsed.
    #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }

    /// Integer view. Floats are accepted only when they have no fraction.
    #[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Bool(b) => Some(i64::from(*b)),
            Self::Int(i) => Some(*i),
            Self::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            Self::Float(_) => None,
            Self::Text(s) => s.trim().parse().ok(),
        }
    }

    /// Boolean view. The charger reports flags as 0/1 integers.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Int(i) => Some(*i != 0),
            Self::Float(f) => Some(*f != 0.0),
            Self::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "on" => Some(true),
                "0" | "false" | "off" => Some(false),
                _ => None,
            },
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    fn from_json(value: serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(b) => Some(Self::Bool(b)),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float)),
            serde_json::Value::String(s) => Some(Self::Text(s)),
            serde_json::Value::Null
            | serde_json::Value::Array(_)
            | serde_json::Value::Object(_) => None,
        }
    }
}

impl fmt::Display for TelemetryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for TelemetryValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for TelemetryValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for TelemetryValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for TelemetryValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for TelemetryValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<String> for TelemetryValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

// ── ChargerState ─────────────────────────────────────────────────────

/// Charging state machine reported in the `state` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, FromRepr, Serialize)]
#[repr(u8)]
pub enum ChargerState {
    Startup = 0,
    #[strum(serialize = "System Test")]
    SystemTest = 1,
    Standby = 2,
    Connected = 3,
    Charging = 4,
    #[strum(serialize = "Charge Complete")]
    ChargeComplete = 5,
    Paused = 6,
    Error = 7,
}

// ── TelemetrySnapshot ────────────────────────────────────────────────

/// One complete telemetry read from the charger, keyed by field name.
///
/// Immutable once built and cheap to clone: the map lives behind an `Arc`.
/// A newer read supersedes it wholesale; there is no partial merge.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TelemetrySnapshot(Arc<IndexMap<String, TelemetryValue>>);

impl TelemetrySnapshot {
    /// Parse a `/main` response body.
    ///
    /// Anything other than a JSON object is a protocol error. Nulls and
    /// nested values are not telemetry scalars and are skipped.
    pub fn from_json(body: &str) -> Result<Self, Error> {
        let value: serde_json::Value =
            serde_json::from_str(body).map_err(|e| Error::Protocol {
                message: e.to_string(),
                body: body.to_owned(),
            })?;

        let serde_json::Value::Object(map) = value else {
            return Err(Error::Protocol {
                message: "expected a JSON object".into(),
                body: body.to_owned(),
            });
        };

        let fields = map
            .into_iter()
            .filter_map(|(key, value)| TelemetryValue::from_json(value).map(|v| (key, v)))
            .collect();

        Ok(Self(Arc::new(fields)))
    }

    pub fn get(&self, key: &str) -> Option<&TelemetryValue> {
        self.0.get(key)
    }

    pub fn f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(TelemetryValue::as_f64)
    }

    pub fn i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(TelemetryValue::as_i64)
    }

    pub fn bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(TelemetryValue::as_bool)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(TelemetryValue::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TelemetryValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn charger_state(&self) -> Option<ChargerState> {
        self.i64(fields::STATE)
            .and_then(|v| u8::try_from(v).ok())
            .and_then(ChargerState::from_repr)
    }

    /// Instantaneous power draw in watts.
    pub fn power_w(&self) -> Option<f64> {
        self.f64(fields::POWER)
    }

    pub fn is_charging(&self) -> bool {
        self.charger_state() == Some(ChargerState::Charging)
    }

    /// Identity fields, present on most firmware revisions.
    pub fn device_info(&self) -> DeviceInfo {
        let trimmed = |key: &str| {
            self.get(key)
                .map(|v| v.to_string().trim().to_owned())
                .filter(|s| !s.is_empty())
        };
        DeviceInfo {
            firmware_version: trimmed(fields::FIRMWARE_VERSION),
            station_id: trimmed(fields::STATION_ID),
            serial_number: trimmed(fields::SERIAL_NUMBER),
        }
    }
}

impl<K: Into<String>, V: Into<TelemetryValue>> FromIterator<(K, V)> for TelemetrySnapshot {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(Arc::new(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        ))
    }
}

/// Identity of the charger, extracted from telemetry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub firmware_version: Option<String>,
    pub station_id: Option<String>,
    pub serial_number: Option<String>,
}
