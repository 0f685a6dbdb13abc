// ── Error classification ──
//
// Maps an error type identifier to the coarse category that drives health
// scoring and recovery recommendations. Exact names are checked first,
// then name suffixes, and anything unmatched is `Unknown`.

use serde::Serialize;
use strum::{Display, IntoStaticStr};

/// Recovery-oriented error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Transient,
    Connectivity,
    Authentication,
    Device,
    Protocol,
    Internal,
    Critical,
    Unknown,
}

impl ErrorCategory {
    /// Human-readable explanation for diagnostics.
    pub fn description(self) -> &'static str {
        match self {
            Self::Transient => "Temporary failure, likely to clear on retry",
            Self::Connectivity => "Charger unreachable over the network",
            Self::Authentication => "Charger rejected the configured credentials",
            Self::Device => "Charger reported an error or refused the request",
            Self::Protocol => "Charger sent a response that could not be understood",
            Self::Internal => "Unexpected failure inside the integration",
            Self::Critical => "Unrecoverable failure requiring attention",
            Self::Unknown => "Unclassified failure",
        }
    }
}

const EXACT: &[(&str, ErrorCategory)] = &[
    ("TimeoutError", ErrorCategory::Transient),
    ("ServerDisconnectedError", ErrorCategory::Transient),
    ("ClientRequestError", ErrorCategory::Transient),
    ("ConnectionError", ErrorCategory::Connectivity),
    ("ClientConnectorError", ErrorCategory::Connectivity),
    ("ClientError", ErrorCategory::Connectivity),
    ("AuthenticationError", ErrorCategory::Authentication),
    ("HttpStatusError", ErrorCategory::Device),
    ("CommandError", ErrorCategory::Device),
    ("VerificationError", ErrorCategory::Device),
    ("ProtocolError", ErrorCategory::Protocol),
    ("JSONDecodeError", ErrorCategory::Protocol),
    ("InvalidUrlError", ErrorCategory::Critical),
    ("TlsConfigError", ErrorCategory::Critical),
    ("ConfigError", ErrorCategory::Critical),
    ("ValidationError", ErrorCategory::Internal),
    ("CancelledError", ErrorCategory::Internal),
    ("InternalError", ErrorCategory::Internal),
];

/// Checked in order; the first matching suffix wins.
const SUFFIXES: &[(&str, ErrorCategory)] = &[
    ("TimeoutError", ErrorCategory::Transient),
    ("ConnectionError", ErrorCategory::Connectivity),
    ("ConnectorError", ErrorCategory::Connectivity),
    ("AuthError", ErrorCategory::Authentication),
    ("AuthenticationError", ErrorCategory::Authentication),
    ("DecodeError", ErrorCategory::Protocol),
    ("ProtocolError", ErrorCategory::Protocol),
    ("CommandError", ErrorCategory::Device),
];

/// Classify an error type identifier.
pub fn classify(error_type: &str) -> ErrorCategory {
    if let Some((_, category)) = EXACT.iter().find(|(name, _)| *name == error_type) {
        return *category;
    }
    SUFFIXES
        .iter()
        .find(|(suffix, _)| error_type.ends_with(suffix))
        .map_or(ErrorCategory::Unknown, |(_, category)| *category)
}
