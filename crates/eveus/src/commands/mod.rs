//! Command dispatch: bridges CLI args -> charger operations -> output.

pub mod config_cmd;
pub mod control;
pub mod health;
pub mod status;
pub mod util;
pub mod watch;

use crate::cli::{Command, GlobalOpts};
use crate::config::Target;
use crate::error::CliError;

/// Dispatch a charger-bound command to its handler.
pub async fn dispatch(cmd: Command, target: Target, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Status(args) => status::handle(target, &args, global).await,
        Command::Watch(args) => watch::handle(target, &args, global).await,
        Command::Health => health::handle(target, global).await,
        Command::Enable(args) => control::enable(target, true, &args, global).await,
        Command::Disable(args) => control::enable(target, false, &args, global).await,
        Command::SetCurrent(args) => control::set_current(target, &args, global).await,
        Command::OneCharge(args) => control::one_charge(target, &args, global).await,
        Command::ResetCounter(args) => control::reset_counter(target, &args, global).await,
        Command::Config(_) | Command::Completions(_) => Err(CliError::Internal {
            message: "config and completions are handled before dispatch".into(),
        }),
    }
}
