//! `eveus status`: one poll, rendered.

use serde::Serialize;
use tabled::Tabled;

use eveus_core::{ConnectionState, DeviceInfo, TelemetrySnapshot, fields};

use crate::cli::{GlobalOpts, OutputFormat, StatusArgs};
use crate::config::Target;
use crate::error::CliError;
use crate::output;

use super::util::{self, Session};

#[derive(Serialize)]
struct StatusView {
    connection_state: ConnectionState,
    device: DeviceInfo,
    telemetry: TelemetrySnapshot,
}

#[derive(Tabled)]
struct FieldRow {
    #[tabled(rename = "Field")]
    key: String,
    #[tabled(rename = "Value")]
    value: String,
}

fn detail(view: &StatusView, color: bool) -> String {
    let t = &view.telemetry;
    [
        format!(
            "Connection:     {}",
            output::paint_state(view.connection_state, color)
        ),
        format!("State:          {}", util::state_label(t)),
        format!("Charging:       {}", util::on_off(t, fields::ENABLED)),
        format!("One charge:     {}", util::on_off(t, fields::ONE_CHARGE)),
        format!("Current limit:  {}", util::measure(t, fields::CURRENT_SET, "A", 0)),
        format!("Power:          {}", util::measure(t, fields::POWER, "W", 0)),
        format!("Current:        {}", util::measure(t, fields::CURRENT, "A", 1)),
        format!("Voltage:        {}", util::measure(t, fields::VOLTAGE, "V", 0)),
        format!("Session energy: {}", util::measure(t, fields::SESSION_ENERGY, "kWh", 2)),
        format!("Total energy:   {}", util::measure(t, fields::TOTAL_ENERGY, "kWh", 1)),
        format!("Counter A:      {}", util::measure(t, fields::COUNTER_A_ENERGY, "kWh", 2)),
        format!("Box temp:       {}", util::measure(t, fields::TEMPERATURE_BOX, "°C", 0)),
        format!("Plug temp:      {}", util::measure(t, fields::TEMPERATURE_PLUG, "°C", 0)),
        format!(
            "Firmware:       {}",
            view.device.firmware_version.as_deref().unwrap_or("-")
        ),
    ]
    .join("\n")
}

pub async fn handle(target: Target, args: &StatusArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let session = Session::open(target, global.wait).await?;
    let view = StatusView {
        connection_state: session.charger.state(),
        device: session
            .charger
            .device_info()
            .as_deref()
            .cloned()
            .unwrap_or_default(),
        telemetry: session.first.snapshot.clone(),
    };
    session.close().await;

    let color = output::should_color(global.color);
    let rendered = if args.all && matches!(global.output, OutputFormat::Table | OutputFormat::Plain)
    {
        let rows: Vec<(String, String)> = view
            .telemetry
            .iter()
            .map(|(key, value)| (key.to_owned(), value.to_string()))
            .collect();
        output::render_list(
            global.output,
            &rows,
            |(key, value)| FieldRow {
                key: key.clone(),
                value: value.clone(),
            },
            |(key, value)| format!("{key}={value}"),
        )?
    } else {
        output::render_single(
            global.output,
            &view,
            |v| detail(v, color),
            |v| util::state_label(&v.telemetry),
        )?
    };

    output::print_output(&rendered, global.quiet);
    Ok(())
}
