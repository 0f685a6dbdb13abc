//! Shared configuration for the Eveus tools.
//!
//! TOML profiles (one per charger), `EVEUS_*` environment overrides,
//! password resolution (env var, keyring, plaintext), and translation to
//! `eveus_core::ChargerConfig`. The core crate never reads files; hosts
//! go through this crate and hand it a ready-made config.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use eveus_core::{ChargerConfig, ChargerModel};

/// Keyring service name; entries are keyed `<profile>/password`.
pub const KEYRING_SERVICE: &str = "eveus";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no password configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("profile '{name}' not found")]
    ProfileNotFound { name: String, available: Vec<String> },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level `config.toml`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is named explicitly.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named charger profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Look up `name`, listing the known profiles on failure.
    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::ProfileNotFound {
                name: name.into(),
                available: self.profiles.keys().cloned().collect(),
            })
    }

    /// Explicit name, else `default_profile`, else `"default"`.
    pub fn active_profile_name(&self, explicit: Option<&str>) -> String {
        explicit
            .map(str::to_owned)
            .or_else(|| self.default_profile.clone())
            .unwrap_or_else(|| "default".into())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    20
}

/// One charger.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Profile {
    /// Host name, IP address, or full base URL.
    pub host: String,

    #[serde(default = "default_username")]
    pub username: String,

    /// Plaintext password; prefer the keyring or `password_env`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Environment variable holding the password.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_env: Option<String>,

    /// "16A" or "32A".
    #[serde(default = "default_model")]
    pub model: String,

    /// Per-profile request timeout override, in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    /// Poll interval overrides, in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_interval: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idle_interval: Option<u64>,

    /// Replay commands that failed while the charger was unreachable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replay_offline_commands: Option<bool>,
}

impl Profile {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            username: default_username(),
            password: None,
            password_env: None,
            model: default_model(),
            timeout: None,
            active_interval: None,
            idle_interval: None,
            replay_offline_commands: None,
        }
    }
}

fn default_username() -> String {
    "admin".into()
}
fn default_model() -> String {
    ChargerModel::default().to_string()
}

// ── Config file path ────────────────────────────────────────────────

/// Platform config file location (XDG on Linux).
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "eveus", "eveus").map_or_else(
        || {
            let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
            p.push(".config");
            p.push("eveus");
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

// ── Loading ─────────────────────────────────────────────────────────

/// Load from the canonical path, merged with `EVEUS_*` env vars.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path`. A missing file yields the defaults.
///
/// Nested keys use a double underscore in env vars, e.g.
/// `EVEUS_DEFAULTS__TIMEOUT=30`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let config = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("EVEUS_").split("__"))
        .extract()?;
    Ok(config)
}

pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Saving ──────────────────────────────────────────────────────────

pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

/// Write `cfg` as pretty TOML, creating parent directories.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, toml::to_string_pretty(cfg)?)?;
    Ok(())
}

// ── Credentials ─────────────────────────────────────────────────────

fn keyring_entry(profile_name: &str) -> Result<keyring::Entry, ConfigError> {
    Ok(keyring::Entry::new(
        KEYRING_SERVICE,
        &format!("{profile_name}/password"),
    )?)
}

/// Resolve the password: `password_env`, then the keyring, then plaintext.
pub fn resolve_password(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    if let Some(value) = profile
        .password_env
        .as_deref()
        .and_then(|name| std::env::var(name).ok())
    {
        return Ok(SecretString::from(value));
    }

    if let Ok(secret) = keyring_entry(profile_name).and_then(|e| e.get_password().map_err(ConfigError::from)) {
        return Ok(SecretString::from(secret));
    }

    profile
        .password
        .clone()
        .map(SecretString::from)
        .ok_or_else(|| ConfigError::NoCredentials {
            profile: profile_name.into(),
        })
}

/// Store a password in the system keyring for `profile_name`.
pub fn store_password(profile_name: &str, password: &str) -> Result<(), ConfigError> {
    keyring_entry(profile_name)?.set_password(password)?;
    Ok(())
}

// ── Translation ─────────────────────────────────────────────────────

/// Build a `ChargerConfig` from a profile, resolving its password.
pub fn profile_to_charger_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<ChargerConfig, ConfigError> {
    let password = resolve_password(profile, profile_name)?;
    build_charger_config(profile, password, defaults)
}

/// Same as [`profile_to_charger_config`] with an already-known password.
pub fn build_charger_config(
    profile: &Profile,
    password: SecretString,
    defaults: &Defaults,
) -> Result<ChargerConfig, ConfigError> {
    let model: ChargerModel = profile.model.parse().map_err(|_| ConfigError::Validation {
        field: "model".into(),
        reason: format!("expected '16A' or '32A', got '{}'", profile.model),
    })?;

    let mut config = ChargerConfig::for_host(&profile.host, profile.username.clone(), password)
        .map_err(|e| ConfigError::Validation {
            field: "host".into(),
            reason: e.to_string(),
        })?;

    config.model = model;
    config.timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    if let Some(secs) = profile.active_interval {
        config.polling.active_interval = Duration::from_secs(secs);
    }
    if let Some(secs) = profile.idle_interval {
        config.polling.idle_interval = Duration::from_secs(secs);
    }
    if let Some(replay) = profile.replay_offline_commands {
        config.commands.replay_offline = replay;
    }
    Ok(config)
}
