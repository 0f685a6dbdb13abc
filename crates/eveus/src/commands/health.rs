//! `eveus health`: connection quality report after the first poll.

use eveus_core::QualityReport;

use crate::cli::GlobalOpts;
use crate::config::Target;
use crate::error::CliError;
use crate::output;

use super::util::Session;

fn detail(report: &QualityReport, color: bool) -> String {
    let mut lines = vec![
        format!(
            "Health score:   {} ({})",
            output::paint_score(report.health_score, color),
            report.status
        ),
        format!("Success rate:   {:.1}%", report.success_rate),
        format!("Avg latency:    {:.3}s", report.avg_latency_secs),
        format!("Requests/min:   {}", report.requests_per_minute),
        format!("Trend:          {}", report.trend),
        format!("Consecutive:    {} failures", report.consecutive_failures),
        format!("Recent errors:  {}", report.recent_error_count),
        format!(
            "Last success:   {}",
            report
                .last_success
                .map_or_else(|| "never".into(), |at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        ),
        format!(
            "Recommendation: {} [{}]",
            report.recommendation_message, report.severity
        ),
    ];
    for record in &report.recent_errors {
        lines.push(format!(
            "  {} {} ({}): {}",
            output::dim(&record.at.format("%H:%M:%S").to_string(), color),
            record.error_type,
            record.category,
            record.description
        ));
    }
    lines.join("\n")
}

pub async fn handle(target: Target, global: &GlobalOpts) -> Result<(), CliError> {
    let session = Session::open(target, global.wait).await?;
    let report = session.charger.quality_metrics();
    session.close().await;

    let color = output::should_color(global.color);
    let rendered = output::render_single(
        global.output,
        &report,
        |r| detail(r, color),
        |r| r.health_score.to_string(),
    )?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}
