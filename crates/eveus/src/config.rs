//! CLI configuration: a thin wrapper around `eveus_config` that lets
//! global flags (--host, --password, ...) override the active profile.

use secrecy::SecretString;

use eveus_core::ChargerConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use eveus_config::{
    Config, Profile, config_path, load_config_or_default, save_config, store_password,
};

/// A resolved charger plus the profile name it came from.
pub struct Target {
    pub profile: String,
    pub config: ChargerConfig,
}

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    config.active_profile_name(global.profile.as_deref())
}

/// Build the `ChargerConfig` for this invocation.
///
/// Flags take priority over the profile. Without a matching profile the
/// charger is described by flags alone, which then must include `--host`.
pub fn resolve_target(global: &GlobalOpts) -> Result<Target, CliError> {
    let cfg = load_config_or_default();
    let name = active_profile_name(global, &cfg);

    let mut profile = match (cfg.profiles.get(&name), global.host.as_deref()) {
        (Some(profile), _) => profile.clone(),
        (None, Some(host)) => Profile::new(host),
        // An explicit --profile that doesn't exist is an error, not a fallback
        (None, None) if global.profile.is_some() => cfg.profile(&name)?.clone(),
        (None, None) => {
            return Err(CliError::NoConfig {
                path: config_path().display().to_string(),
            });
        }
    };

    if let Some(ref host) = global.host {
        profile.host.clone_from(host);
    }
    if let Some(ref username) = global.username {
        profile.username.clone_from(username);
    }
    if let Some(ref model) = global.model {
        profile.model.clone_from(model);
    }
    if let Some(timeout) = global.timeout {
        profile.timeout = Some(timeout);
    }

    let password = match global.password {
        Some(ref password) => SecretString::from(password.clone()),
        None => eveus_config::resolve_password(&profile, &name)?,
    };

    let config = eveus_config::build_charger_config(&profile, password, &cfg.defaults)?;

    Ok(Target {
        profile: name,
        config,
    })
}
