// ── Transport seam ──
//
// The poll loop and command queue talk to the charger through this trait
// so they can run against the real HTTP client or an in-memory double.

use std::future::Future;

use eveus_api::{ChargerClient, Error, TelemetrySnapshot};

/// Request surface of a charger connection.
///
/// Implementations must serialize concurrent requests themselves: the
/// poll task and the command worker call in from separate tasks.
pub trait ChargerTransport: Send + Sync + 'static {
    /// Read the current telemetry.
    fn fetch_state(&self) -> impl Future<Output = Result<TelemetrySnapshot, Error>> + Send;

    /// Send `name=value` and return the raw response text.
    fn dispatch_command(
        &self,
        name: &str,
        value: &str,
    ) -> impl Future<Output = Result<String, Error>> + Send;

    /// Drop pooled connections so the next request reconnects.
    fn reset_session(&self);

    /// Release connection resources for good.
    fn close(&self) -> impl Future<Output = ()> + Send;
}

impl ChargerTransport for ChargerClient {
    fn fetch_state(&self) -> impl Future<Output = Result<TelemetrySnapshot, Error>> + Send {
        ChargerClient::fetch_state(self)
    }

    fn dispatch_command(
        &self,
        name: &str,
        value: &str,
    ) -> impl Future<Output = Result<String, Error>> + Send {
        ChargerClient::dispatch_command(self, name, value)
    }

    fn reset_session(&self) {
        ChargerClient::reset_session(self);
    }

    fn close(&self) -> impl Future<Output = ()> + Send {
        ChargerClient::close(self)
    }
}
