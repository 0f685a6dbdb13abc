//! Config subcommand handlers.

use std::fmt::Write as _;

use serde::Serialize;
use tabled::Tabled;

use eveus_core::ChargerModel;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config, Profile};
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

/// Format config for display, masking passwords.
fn format_config_redacted(cfg: &Config) -> String {
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "color = \"{}\"", cfg.defaults.color);
    let _ = writeln!(out, "timeout = {}", cfg.defaults.timeout);

    for (name, p) in &cfg.profiles {
        let _ = writeln!(out);
        let _ = writeln!(out, "[profiles.{name}]");
        let _ = writeln!(out, "host = \"{}\"", p.host);
        let _ = writeln!(out, "username = \"{}\"", p.username);
        let _ = writeln!(out, "model = \"{}\"", p.model);
        if p.password.is_some() {
            let _ = writeln!(out, "password = \"****\"");
        }
        if let Some(ref env) = p.password_env {
            let _ = writeln!(out, "password_env = \"{env}\"");
        }
        if let Some(timeout) = p.timeout {
            let _ = writeln!(out, "timeout = {timeout}");
        }
        if let Some(secs) = p.active_interval {
            let _ = writeln!(out, "active_interval = {secs}");
        }
        if let Some(secs) = p.idle_interval {
            let _ = writeln!(out, "idle_interval = {secs}");
        }
        if let Some(replay) = p.replay_offline_commands {
            let _ = writeln!(out, "replay_offline_commands = {replay}");
        }
    }

    out.trim_end().to_owned()
}

/// Structured output gets the same masking as the text view.
fn redacted(cfg: &Config) -> Config {
    let mut cfg = cfg.clone();
    for profile in cfg.profiles.values_mut() {
        if profile.password.is_some() {
            profile.password = Some("****".into());
        }
    }
    cfg
}

#[derive(Serialize)]
struct ProfileEntry {
    name: String,
    host: String,
    model: String,
    default: bool,
}

#[derive(Tabled)]
struct ProfileRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Host")]
    host: String,
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Default")]
    default: String,
}

impl From<&ProfileEntry> for ProfileRow {
    fn from(e: &ProfileEntry) -> Self {
        Self {
            name: e.name.clone(),
            host: e.host.clone(),
            model: e.model.clone(),
            default: if e.default { "*".into() } else { String::new() },
        }
    }
}

fn validate_model(model: &str) -> Result<(), CliError> {
    model
        .parse::<ChargerModel>()
        .map(|_| ())
        .map_err(|_| CliError::Validation {
            field: "model".into(),
            reason: format!("expected '16A' or '32A', got '{model}'"),
        })
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init {
            name,
            host,
            username,
            model,
            password_env,
            default,
        } => {
            validate_model(&model)?;
            if host.trim().is_empty() {
                return Err(CliError::Validation {
                    field: "host".into(),
                    reason: "must not be empty".into(),
                });
            }

            let mut cfg = config::load_config_or_default();
            let mut profile = Profile::new(host);
            profile.username = username;
            profile.model = model;
            profile.password_env = password_env;
            let needs_password = profile.password_env.is_none();

            let replaced = cfg.profiles.insert(name.clone(), profile).is_some();
            if default || cfg.profiles.len() == 1 {
                cfg.default_profile = Some(name.clone());
            }
            config::save_config(&cfg)?;

            if !global.quiet {
                let verb = if replaced { "Updated" } else { "Created" };
                eprintln!("✓ {verb} profile '{name}' in {}", config::config_path().display());
                if needs_password {
                    eprintln!("  Store its password with: eveus config set-password --name {name}");
                }
            }
            Ok(())
        }

        // ── Show ────────────────────────────────────────────────────
        ConfigCommand::Show => {
            let cfg = redacted(&config::load_config_or_default());
            let out = output::render_single(global.output, &cfg, format_config_redacted, |_| {
                config::config_path().display().to_string()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        // ── Profiles ────────────────────────────────────────────────
        ConfigCommand::Profiles => {
            let cfg = config::load_config_or_default();
            let active = config::active_profile_name(global, &cfg);
            let entries: Vec<ProfileEntry> = cfg
                .profiles
                .iter()
                .map(|(name, p)| ProfileEntry {
                    name: name.clone(),
                    host: p.host.clone(),
                    model: p.model.clone(),
                    default: *name == active,
                })
                .collect();
            let out = output::render_list(
                global.output,
                &entries,
                |e| ProfileRow::from(e),
                |e| e.name.clone(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        // ── Set password ────────────────────────────────────────────
        ConfigCommand::SetPassword { name, password } => {
            let cfg = config::load_config_or_default();
            let name = name.unwrap_or_else(|| config::active_profile_name(global, &cfg));
            cfg.profile(&name)?;
            config::store_password(&name, &password)?;
            if !global.quiet {
                eprintln!("✓ Password for '{name}' stored in the system keyring");
            }
            Ok(())
        }

        // ── Path ────────────────────────────────────────────────────
        ConfigCommand::Path => {
            println!("{}", config::config_path().display());
            Ok(())
        }
    }
}
