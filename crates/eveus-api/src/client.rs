// Charger HTTP client
//
// Wraps `reqwest::Client` with the charger's two endpoints, Basic Auth,
// and the response taxonomy. No retries happen here: retry policy lives
// with the poll loop and the command queue in `eveus-core`.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::snapshot::TelemetrySnapshot;
use crate::transport::TransportConfig;

const STATE_ENDPOINT: &str = "main";
const COMMAND_ENDPOINT: &str = "pageEvent";

/// Marker the firmware puts in a command response body when it refuses it.
const ERROR_MARKER: &str = "error";

/// A built `reqwest::Client` plus its birth time, for TTL-based recycling.
struct Session {
    http: reqwest::Client,
    created: Instant,
}

/// Raw HTTP client for the charger's embedded API.
///
/// The underlying `reqwest::Client` is created lazily, rebuilt once it
/// outlives `session_ttl` or after [`reset_session`](Self::reset_session),
/// and dropped by [`close`](Self::close). Requests are serialized through
/// a gate so the single pooled connection is never used by two requests
/// at once.
pub struct ChargerClient {
    base_url: Url,
    username: String,
    password: SecretString,
    transport: TransportConfig,
    session: ArcSwapOption<Session>,
    request_gate: Mutex<()>,
}

impl ChargerClient {
    /// Create a client for the charger at `base_url` (e.g. `http://192.168.1.50`).
    ///
    /// No connection is opened until the first request.
    pub fn new(
        base_url: Url,
        username: impl Into<String>,
        password: SecretString,
        transport: TransportConfig,
    ) -> Self {
        Self {
            base_url,
            username: username.into(),
            password,
            transport,
            session: ArcSwapOption::empty(),
            request_gate: Mutex::new(()),
        }
    }

    /// The charger base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Whether a pooled session currently exists.
    pub fn has_session(&self) -> bool {
        self.session.load().is_some()
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// `POST /main` and parse the telemetry object.
    pub async fn fetch_state(&self) -> Result<TelemetrySnapshot, Error> {
        let body = self.post(STATE_ENDPOINT, None).await?;
        TelemetrySnapshot::from_json(&body)
    }

    /// `POST /pageEvent` with `pageevent=<name>&<name>=<value>`.
    ///
    /// Returns the raw response text. A 200 whose body mentions an error
    /// is still a failure.
    pub async fn dispatch_command(&self, name: &str, value: &str) -> Result<String, Error> {
        let form = [("pageevent", name), (name, value)];
        let body = self.post(COMMAND_ENDPOINT, Some(&form)).await?;

        if body.to_ascii_lowercase().contains(ERROR_MARKER) {
            return Err(Error::Command {
                command: name.to_owned(),
                response: body,
            });
        }

        Ok(body)
    }

    // ── Session lifecycle ────────────────────────────────────────────

    /// Drop the pooled session so the next request opens a fresh connection.
    pub fn reset_session(&self) {
        if self.session.swap(None).is_some() {
            debug!(host = %self.base_url, "pooled session discarded");
        }
    }

    /// Release the pooled session, waiting for any in-flight request first.
    pub async fn close(&self) {
        let _gate = self.request_gate.lock().await;
        self.session.store(None);
        debug!(host = %self.base_url, "charger client closed");
    }

    fn session(&self) -> Result<Arc<Session>, Error> {
        if let Some(session) = self.session.load_full() {
            if session.created.elapsed() < self.transport.session_ttl {
                return Ok(session);
            }
            debug!(host = %self.base_url, "session exceeded TTL, rebuilding");
        }

        let session = Arc::new(Session {
            http: self.transport.build_client()?,
            created: Instant::now(),
        });
        self.session.store(Some(Arc::clone(&session)));
        Ok(session)
    }

    fn endpoint_url(&self, endpoint: &str) -> Result<Url, Error> {
        let full = format!("{}/{endpoint}", self.base_url.as_str().trim_end_matches('/'));
        Ok(Url::parse(&full)?)
    }

    // ── Request helper ───────────────────────────────────────────────

    async fn post(
        &self,
        endpoint: &'static str,
        form: Option<&[(&str, &str)]>,
    ) -> Result<String, Error> {
        let url = self.endpoint_url(endpoint)?;
        let timeout_secs = self.transport.timeout_secs();

        let _gate = self.request_gate.lock().await;
        let session = self.session()?;
        debug!("POST {}", url);

        let mut request = session
            .http
            .post(url)
            .basic_auth(&self.username, Some(self.password.expose_secret()));
        if let Some(form) = form {
            request = request.form(form);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| Error::from_reqwest(e, timeout_secs))?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(Error::Authentication {
                message: "charger rejected the configured credentials".into(),
            });
        }
        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                endpoint,
            });
        }

        resp.text()
            .await
            .map_err(|e| Error::from_reqwest(e, timeout_secs))
    }
}
