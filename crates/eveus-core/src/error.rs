// ── Core error types ──
//
// Errors surfaced to hosts of eveus-core. Transport failures never leave
// the poll loop; these reach callers only through command resolution and
// construction-time validation. The `From<eveus_api::Error>` impl folds
// the transport taxonomy into these variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to charger at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Charger request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Charger returned HTTP {status} for {endpoint}")]
    Http { status: u16, endpoint: String },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Malformed charger response: {message}")]
    Protocol { message: String },

    // ── Command errors ───────────────────────────────────────────────
    #[error("Charger rejected {command}: {message}")]
    CommandRejected { command: String, message: String },

    #[error("Command {command} not applied: expected {expected}, charger reports {}", actual.as_deref().unwrap_or("nothing"))]
    VerificationFailed {
        command: String,
        expected: String,
        actual: Option<String>,
    },

    #[error("Command {command} did not complete within {timeout_secs}s")]
    CommandTimeout { command: String, timeout_secs: u64 },

    #[error("Charger is shutting down")]
    Cancelled,

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Type identifier fed to the error classifier.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::ConnectionFailed { .. } => "ConnectionError",
            Self::AuthenticationFailed { .. } => "AuthenticationError",
            Self::Timeout { .. } => "TimeoutError",
            Self::Http { status, .. } if *status >= 500 => "ServerDisconnectedError",
            Self::Http { .. } => "HttpStatusError",
            Self::Protocol { .. } => "ProtocolError",
            Self::CommandRejected { .. } => "CommandError",
            Self::VerificationFailed { .. } => "VerificationError",
            Self::CommandTimeout { .. } => "CommandTimeoutError",
            Self::Cancelled => "CancelledError",
            Self::ValidationFailed { .. } => "ValidationError",
            Self::Config { .. } => "ConfigError",
            Self::Internal(_) => "InternalError",
        }
    }

    /// Whether the failure points at the network or an unreachable device
    /// rather than at the request itself.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ConnectionFailed { .. } | Self::Timeout { .. } => true,
            Self::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<eveus_api::Error> for CoreError {
    fn from(err: eveus_api::Error) -> Self {
        match err {
            eveus_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            eveus_api::Error::Connectivity { url, reason } => {
                CoreError::ConnectionFailed { url, reason }
            }
            eveus_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            eveus_api::Error::Transport(ref e) => CoreError::ConnectionFailed {
                url: e
                    .url()
                    .map_or_else(|| "<unknown>".into(), ToString::to_string),
                reason: e.to_string(),
            },
            eveus_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            eveus_api::Error::Tls(msg) => CoreError::Config {
                message: format!("HTTP client setup failed: {msg}"),
            },
            eveus_api::Error::Status { status, endpoint } => CoreError::Http {
                status,
                endpoint: endpoint.to_owned(),
            },
            eveus_api::Error::Command { command, response } => CoreError::CommandRejected {
                command,
                message: response,
            },
            eveus_api::Error::Protocol { message, body: _ } => CoreError::Protocol { message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_keep_their_type() {
        let err: CoreError = eveus_api::Error::Timeout { timeout_secs: 20 }.into();
        assert!(matches!(err, CoreError::Timeout { timeout_secs: 20 }));
        assert_eq!(err.error_type(), "TimeoutError");
        assert!(err.is_transient());

        let err: CoreError = eveus_api::Error::Status {
            status: 502,
            endpoint: "main",
        }
        .into();
        assert_eq!(err.error_type(), "ServerDisconnectedError");
        assert!(err.is_transient());
    }

    #[test]
    fn command_errors_are_not_transient() {
        let err: CoreError = eveus_api::Error::Command {
            command: "evseEnabled".into(),
            response: "error".into(),
        }
        .into();
        assert!(matches!(err, CoreError::CommandRejected { .. }));
        assert!(!err.is_transient());

        let err = CoreError::VerificationFailed {
            command: "currentSet".into(),
            expected: "16".into(),
            actual: Some("10".into()),
        };
        assert_eq!(
            err.to_string(),
            "Command currentSet not applied: expected 16, charger reports 10"
        );
    }
}
