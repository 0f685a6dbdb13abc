//! Write commands: enable/disable, current limit, one-charge, counter reset.

use owo_colors::OwoColorize;

use eveus_core::{Command, CommandReceipt};

use crate::cli::{GlobalOpts, OneChargeArgs, SetCurrentArgs, WriteArgs};
use crate::config::Target;
use crate::error::CliError;
use crate::output;

use super::util::Session;

fn detail(receipt: &CommandReceipt, color: bool) -> String {
    let mark = if color {
        "✓".green().to_string()
    } else {
        "✓".into()
    };
    let verified = if receipt.verified { "verified" } else { "unverified" };
    let attempts = if receipt.attempts == 1 { "attempt" } else { "attempts" };
    format!(
        "{mark} {} = {} ({verified}, {} {attempts})",
        receipt.command, receipt.value, receipt.attempts
    )
}

async fn run(target: Target, command: Command, global: &GlobalOpts) -> Result<(), CliError> {
    let session = Session::open(target, global.wait).await?;
    let result = session.charger.submit(command).await;
    let profile = session.profile.clone();
    session.close().await;

    let receipt = result.map_err(|e| match CliError::from(e) {
        CliError::AuthFailed { .. } => CliError::AuthFailed { profile },
        other => other,
    })?;

    let color = output::should_color(global.color);
    let rendered = output::render_single(
        global.output,
        &receipt,
        |r| detail(r, color),
        |r| r.id.to_string(),
    )?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}

pub async fn enable(
    target: Target,
    enabled: bool,
    args: &WriteArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let command = Command::enable_charging(enabled).with_verification(!args.no_verify);
    run(target, command, global).await
}

pub async fn set_current(
    target: Target,
    args: &SetCurrentArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    // Out-of-range values never reach the charger.
    target.config.model.validate_current(args.amps)?;
    let command = Command::set_current(args.amps).with_verification(!args.write.no_verify);
    run(target, command, global).await
}

pub async fn one_charge(
    target: Target,
    args: &OneChargeArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let command =
        Command::one_charge(args.state.enabled()).with_verification(!args.write.no_verify);
    run(target, command, global).await
}

pub async fn reset_counter(
    target: Target,
    args: &WriteArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let command = Command::reset_counter_a().with_verification(!args.no_verify);
    run(target, command, global).await
}
