//! Output formatting helpers for CLI commands

use crate::metrics::MetricsSnapshot;
use crate::network::{ConnectionState, NetworkReport};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use std::fmt::Write;

/// Get status icon for a connection state
pub fn status_icon(status: ConnectionState) -> &'static str {
    match status {
        ConnectionState::Connected => "✓",
        ConnectionState::Disconnected => "✗",
        ConnectionState::Unknown => "?",
        ConnectionState::InvalidUrl => "!",
    }
}

fn colored_status(status: ConnectionState) -> String {
    let text = format!("{} {}", status_icon(status), status);
    match status {
        ConnectionState::Connected => text.green().to_string(),
        ConnectionState::Disconnected => text.red().to_string(),
        ConnectionState::Unknown => text.yellow().to_string(),
        ConnectionState::InvalidUrl => text.magenta().to_string(),
    }
}

/// Format a network report as a table
pub fn format_network_table(report: &NetworkReport) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Service", "Status", "Host", "Ping", "Uptime", "Errors", "Last Error"]);

    for service in &report.services {
        let status = &service.status;
        let ping = status
            .ping_time
            .map(|ms| format!("{:.1}ms", ms))
            .unwrap_or_else(|| "-".to_string());

        table.add_row(vec![
            Cell::new(service.service.as_str()),
            Cell::new(colored_status(status.status)),
            Cell::new(status.ip.as_deref().unwrap_or("-")),
            Cell::new(ping),
            Cell::new(format!("{:.0}%", service.stats.uptime_percent)),
            Cell::new(status.error_count),
            Cell::new(status.last_error.as_deref().unwrap_or("")),
        ]);
    }

    table.to_string()
}

/// Format a network report as JSON
pub fn format_network_json(report: &NetworkReport) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(report)
}

/// Format duration in a human-readable way
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

/// End-of-run summary printed after the control loop stops.
pub fn format_run_summary(metrics: &MetricsSnapshot) -> String {
    let mut output = String::new();
    let _ = writeln!(
        output,
        "Run time: {}",
        format_duration(metrics.run_time_seconds as u64)
    );
    let _ = writeln!(
        output,
        "Pieces: {} analyzed ({} passed, {} ejected), {} skipped, {} missed",
        metrics.processed_count,
        metrics.passed_count.to_string().green(),
        metrics.ejected_count.to_string().yellow(),
        metrics.skipped_count,
        metrics.missed_count
    );

    let errors = format!(
        "Errors: {} processing, {} total",
        metrics.error_count, metrics.total_errors
    );
    if metrics.total_errors > 0 {
        let _ = writeln!(output, "{}", errors.red());
    } else {
        let _ = writeln!(output, "{}", errors);
    }

    if let Some(last) = metrics.last_process_time {
        let _ = writeln!(output, "Last process time: {:.2}s", last);
    }
    if let Some(error) = &metrics.last_error {
        let _ = writeln!(output, "Last error: {}", error);
    }

    output
}
