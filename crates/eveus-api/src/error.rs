use thiserror::Error;

/// Top-level error type for the `eveus-api` crate.
///
/// Covers every failure mode of the two device endpoints: authentication,
/// transport, HTTP status, response parsing, and device-reported command
/// errors. `eveus-core` classifies these into recovery categories and maps
/// them into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The charger rejected the Basic Auth credentials (HTTP 401).
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// Connection refused, DNS failure, reset, or similar.
    #[error("Cannot connect to charger at {url}: {reason}")]
    Connectivity { url: String, reason: String },

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// Any other HTTP transport failure reqwest reports.
    #[error("HTTP transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Building the HTTP client failed (TLS backend, proxy settings, ...).
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Device ──────────────────────────────────────────────────────
    /// Non-success HTTP status other than 401.
    #[error("Charger returned HTTP {status} for {endpoint}")]
    Status { status: u16, endpoint: &'static str },

    /// The device accepted the request but reported an error in the body.
    #[error("Charger rejected command {command}: {response}")]
    Command { command: String, response: String },

    // ── Data ────────────────────────────────────────────────────────
    /// Body was not a JSON object, with the raw body for debugging.
    #[error("Malformed response: {message}")]
    Protocol { message: String, body: String },
}

impl Error {
    /// Stable type identifier used by the error classifier.
    ///
    /// Names are kept coarse on purpose: the classifier matches exact
    /// names first and then suffixes (`...TimeoutError`, `...ConnectionError`).
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Authentication { .. } => "AuthenticationError",
            Self::Connectivity { .. } => "ConnectionError",
            Self::Timeout { .. } => "TimeoutError",
            Self::Transport(e) if e.is_request() => "ClientRequestError",
            Self::Transport(_) => "ClientError",
            Self::InvalidUrl(_) => "InvalidUrlError",
            Self::Tls(_) => "TlsConfigError",
            Self::Status { status, .. } if *status >= 500 => "ServerDisconnectedError",
            Self::Status { .. } => "HttpStatusError",
            Self::Command { .. } => "CommandError",
            Self::Protocol { .. } => "ProtocolError",
        }
    }

    /// Returns `true` if this error indicates the credentials are wrong.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Connectivity { .. } | Self::Timeout { .. } => true,
            Self::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Translate a reqwest failure into the charger taxonomy.
    pub(crate) fn from_reqwest(err: reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            Self::Timeout { timeout_secs }
        } else if err.is_connect() {
            Self::Connectivity {
                url: err
                    .url()
                    .map_or_else(|| "<unknown>".into(), ToString::to_string),
                reason: err.to_string(),
            }
        } else if err.is_decode() || err.is_body() {
            Self::Protocol {
                message: err.to_string(),
                body: String::new(),
            }
        } else {
            Self::Transport(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_types_are_stable() {
        let auth = Error::Authentication {
            message: "bad".into(),
        };
        assert_eq!(auth.error_type(), "AuthenticationError");
        assert!(auth.is_auth());

        let timeout = Error::Timeout { timeout_secs: 5 };
        assert_eq!(timeout.error_type(), "TimeoutError");
        assert!(timeout.is_transient());

        let server = Error::Status {
            status: 503,
            endpoint: "/main",
        };
        assert_eq!(server.error_type(), "ServerDisconnectedError");
        assert!(server.is_transient());

        let not_found = Error::Status {
            status: 404,
            endpoint: "/main",
        };
        assert_eq!(not_found.error_type(), "HttpStatusError");
        assert!(!not_found.is_transient());
    }

    #[test]
    fn protocol_and_command_are_not_transient() {
        let proto = Error::Protocol {
            message: "not an object".into(),
            body: "[]".into(),
        };
        assert!(!proto.is_transient());

        let cmd = Error::Command {
            command: "currentSet".into(),
            response: "error".into(),
        };
        assert_eq!(cmd.error_type(), "CommandError");
        assert!(!cmd.is_transient());
    }
}
