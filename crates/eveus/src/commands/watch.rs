//! `eveus watch`: stream updates until interrupted.

use std::pin::pin;

use chrono::Local;
use tokio_stream::StreamExt;

use eveus_core::{Update, fields};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::config::Target;
use crate::error::CliError;
use crate::output;

use super::util::{self, Session};

fn line(update: &Update, color: bool) -> String {
    let t = &update.snapshot;
    let stamp = output::dim(&Local::now().format("%H:%M:%S").to_string(), color);
    let stale = if update.available { "" } else { " (cached)" };
    format!(
        "{stamp} {:<12} {:<16} {:>8} {:>6} {:>10}{stale}",
        output::paint_state(update.connection_state, color),
        util::state_label(t),
        util::measure(t, fields::POWER, "W", 0),
        util::measure(t, fields::CURRENT_SET, "A", 0),
        util::measure(t, fields::SESSION_ENERGY, "kWh", 2),
    )
}

fn render(update: &Update, format: OutputFormat, color: bool) -> Result<String, CliError> {
    match format {
        OutputFormat::Table => Ok(line(update, color)),
        OutputFormat::Json | OutputFormat::JsonCompact => Ok(serde_json::to_string(update)?),
        OutputFormat::Plain => Ok(util::state_label(&update.snapshot)),
    }
}

pub async fn handle(target: Target, args: &WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let session = Session::open(target, global.wait).await?;
    let color = output::should_color(global.color);
    let limit = args.count.unwrap_or(usize::MAX);

    let mut updates = pin!(session.charger.updates());
    let mut seen = 1;
    output::print_output(&render(&session.first, global.output, color)?, global.quiet);

    let result = loop {
        if seen >= limit {
            break Ok(());
        }
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break Ok(()),
            update = updates.next() => {
                let Some(update) = update else { break Err(CliError::Cancelled) };
                match render(&update, global.output, color) {
                    Ok(rendered) => output::print_output(&rendered, global.quiet),
                    Err(e) => break Err(e),
                }
                seen += 1;
            }
        }
    };

    session.close().await;
    result
}
