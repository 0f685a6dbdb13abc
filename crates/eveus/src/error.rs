//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use eveus_config::ConfigError;
use eveus_core::{CoreError, ErrorCategory};

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const DEVICE: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not reach the charger at {url}")]
    #[diagnostic(
        code(eveus::connection_failed),
        help(
            "Check that the charger is powered and on the same network.\n\
             Reason: {reason}"
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("No answer from the charger within {seconds}s")]
    #[diagnostic(
        code(eveus::timeout),
        help("Increase --wait or --timeout, or check the charger's Wi-Fi signal.")
    )]
    Timeout { seconds: u64 },

    // ── Authentication ───────────────────────────────────────────────

    #[error("The charger rejected the credentials for profile '{profile}'")]
    #[diagnostic(
        code(eveus::auth_failed),
        help("Update the password with: eveus config set-password --name {profile}")
    )]
    AuthFailed { profile: String },

    #[error("No password configured for profile '{profile}'")]
    #[diagnostic(
        code(eveus::no_credentials),
        help(
            "Store one with: eveus config set-password --name {profile}\n\
             Or pass --password / set EVEUS_PASSWORD."
        )
    )]
    NoCredentials { profile: String },

    // ── Device ───────────────────────────────────────────────────────

    #[error("Charger rejected '{command}': {message}")]
    #[diagnostic(code(eveus::command_rejected))]
    CommandRejected { command: String, message: String },

    #[error("'{command}' was sent but the charger still reports {actual} (expected {expected})")]
    #[diagnostic(
        code(eveus::verification_failed),
        help("The charger may apply changes slowly; retry, or pass --no-verify.")
    )]
    VerificationFailed {
        command: String,
        expected: String,
        actual: String,
    },

    #[error("Charger error: {message}")]
    #[diagnostic(code(eveus::device))]
    Device { message: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(eveus::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(eveus::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: eveus config init --name {name} --host <HOST>"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No charger configured")]
    #[diagnostic(
        code(eveus::no_config),
        help(
            "Create a profile with: eveus config init --host <HOST>\n\
             Or pass --host / set EVEUS_HOST.\n\
             Expected config at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error("Configuration error: {message}")]
    #[diagnostic(code(eveus::config))]
    Config { message: String },

    // ── Misc ─────────────────────────────────────────────────────────

    #[error("Interrupted")]
    #[diagnostic(code(eveus::cancelled))]
    Cancelled,

    #[error("Internal error: {message}")]
    #[diagnostic(code(eveus::internal))]
    Internal { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render JSON: {0}")]
    #[diagnostic(code(eveus::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::CommandRejected { .. } | Self::VerificationFailed { .. } | Self::Device { .. } => {
                exit_code::DEVICE
            }
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }

    /// Error for a poll that failed with the given classified type.
    pub fn from_poll_failure(
        category: Option<ErrorCategory>,
        error_type: Option<&str>,
        url: &str,
        profile: &str,
    ) -> Self {
        match category {
            Some(ErrorCategory::Authentication) => Self::AuthFailed {
                profile: profile.into(),
            },
            Some(ErrorCategory::Connectivity | ErrorCategory::Transient) => Self::ConnectionFailed {
                url: url.into(),
                reason: error_type.unwrap_or("unreachable").into(),
            },
            Some(category) => Self::Device {
                message: format!(
                    "{} ({})",
                    category.description(),
                    error_type.unwrap_or("unknown")
                ),
            },
            None => Self::Internal {
                message: "poll failed without a recorded error".into(),
            },
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => Self::ConnectionFailed { url, reason },
            CoreError::AuthenticationFailed { .. } => Self::AuthFailed {
                profile: "current".into(),
            },
            CoreError::Timeout { timeout_secs } | CoreError::CommandTimeout { timeout_secs, .. } => {
                Self::Timeout {
                    seconds: timeout_secs,
                }
            }
            CoreError::Http { status, endpoint } => Self::Device {
                message: format!("HTTP {status} from /{endpoint}"),
            },
            CoreError::Protocol { message } => Self::Device { message },
            CoreError::CommandRejected { command, message } => {
                Self::CommandRejected { command, message }
            }
            CoreError::VerificationFailed {
                command,
                expected,
                actual,
            } => Self::VerificationFailed {
                command,
                expected,
                actual: actual.unwrap_or_else(|| "nothing".into()),
            },
            CoreError::ValidationFailed { message } => Self::Validation {
                field: "input".into(),
                reason: message,
            },
            CoreError::Config { message } => Self::Config { message },
            CoreError::Cancelled => Self::Cancelled,
            CoreError::Internal(message) => Self::Internal { message },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile } => Self::NoCredentials { profile },
            ConfigError::ProfileNotFound { name, available } => Self::ProfileNotFound {
                name,
                available: if available.is_empty() {
                    "(none)".into()
                } else {
                    available.join(", ")
                },
            },
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::Io(e) => Self::Io(e),
            other => Self::Config {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_map_to_exit_codes() {
        let cases = [
            (
                CoreError::ConnectionFailed {
                    url: "http://charger".into(),
                    reason: "refused".into(),
                },
                exit_code::CONNECTION,
            ),
            (
                CoreError::AuthenticationFailed {
                    message: "401".into(),
                },
                exit_code::AUTH,
            ),
            (
                CoreError::CommandTimeout {
                    command: "evseEnabled".into(),
                    timeout_secs: 30,
                },
                exit_code::TIMEOUT,
            ),
            (
                CoreError::ValidationFailed {
                    message: "out of range".into(),
                },
                exit_code::USAGE,
            ),
            (
                CoreError::VerificationFailed {
                    command: "currentSet".into(),
                    expected: "16".into(),
                    actual: None,
                },
                exit_code::DEVICE,
            ),
            (CoreError::Cancelled, exit_code::GENERAL),
        ];

        for (core, code) in cases {
            let label = core.to_string();
            assert_eq!(CliError::from(core).exit_code(), code, "{label}");
        }
    }

    #[test]
    fn poll_failure_uses_category() {
        let err = CliError::from_poll_failure(
            Some(ErrorCategory::Authentication),
            Some("AuthenticationError"),
            "http://charger",
            "garage",
        );
        assert!(matches!(err, CliError::AuthFailed { ref profile } if profile == "garage"));

        let err = CliError::from_poll_failure(
            Some(ErrorCategory::Transient),
            Some("TimeoutError"),
            "http://charger",
            "garage",
        );
        assert_eq!(err.exit_code(), exit_code::CONNECTION);
    }
}
