//! Network command implementation

use crate::cli::output::{format_network_json, format_network_table};
use crate::cli::run::load_config;
use crate::cli::NetworkArgs;
use crate::network::{NetworkMonitor, CONNECTIVITY_ISSUE_MESSAGE};
use colored::Colorize;

/// Handle `inspector network`: one probe cycle, then print and exit.
///
/// Returns an error when any service is unreachable so scripts can check
/// the exit status.
pub async fn handle_network(args: &NetworkArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&args.config)?;
    let monitor = NetworkMonitor::new(&config);
    let report = monitor.check_all().await;

    if args.json {
        println!("{}", format_network_json(&report)?);
    } else {
        println!("{}", format_network_table(&report));
    }

    if report.has_issues() {
        if !args.json {
            eprintln!("{}", CONNECTIVITY_ISSUE_MESSAGE.yellow());
        }
        return Err(CONNECTIVITY_ISSUE_MESSAGE.into());
    }
    Ok(())
}
