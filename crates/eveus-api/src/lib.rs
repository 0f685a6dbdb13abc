// eveus-api: Async Rust client for the Eveus EV charger's embedded HTTP API

pub mod client;
pub mod error;
pub mod snapshot;
pub mod transport;

pub use client::ChargerClient;
pub use error::Error;
pub use snapshot::{ChargerState, DeviceInfo, TelemetrySnapshot, TelemetryValue, fields};
pub use transport::TransportConfig;
