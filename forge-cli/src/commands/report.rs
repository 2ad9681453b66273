//! Report command handlers
//!
//! `get` and `delete` print JSON on stdout; `list` prints a table.

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;
use forge_core::domain::test_report::{TestReport, TestStatus};
use forge_orchestrator::Config;
use forge_orchestrator::repository::ArtifactStore;
use forge_orchestrator::service::report::{delete_report, get_report, list_reports};

use super::print_json;

/// Report subcommands
#[derive(Subcommand)]
pub enum ReportCommands {
    /// Print one test report as JSON
    Get {
        /// Report id
        id: String,
    },
    /// List test reports, newest first
    List {
        /// Only list reports of this stage
        #[arg(long)]
        stage: Option<String>,
    },
    /// Delete a test report and its artifact files
    Delete {
        /// Report id
        id: String,
    },
}

/// Handle report commands
pub fn handle_report_command(command: ReportCommands, config: &Config) -> Result<()> {
    let store = ArtifactStore::from_config(config);

    match command {
        ReportCommands::Get { id } => {
            let report = get_report(&store, &id)
                .with_context(|| format!("Failed to get test report '{}'", id))?;
            print_json(&report)
        }
        ReportCommands::List { stage } => list(&store, stage.as_deref()),
        ReportCommands::Delete { id } => {
            let outcome = delete_report(&store, &id)
                .with_context(|| format!("Failed to delete test report '{}'", id))?;
            if outcome.partially_deleted {
                eprintln!("{} {}", "warning:".yellow().bold(), outcome.message);
            }
            print_json(&outcome)
        }
    }
}

fn list(store: &ArtifactStore, stage: Option<&str>) -> Result<()> {
    let reports = list_reports(store, stage).context("Failed to list test reports")?;

    if reports.is_empty() {
        match stage {
            Some(stage) => println!("{}", format!("No test reports for stage {}.", stage).yellow()),
            None => println!("{}", "No test reports found.".yellow()),
        }
        return Ok(());
    }

    println!("{}", format!("Found {} test report(s):", reports.len()).bold());
    println!();
    for report in &reports {
        print_report_row(report);
    }

    Ok(())
}

fn print_report_row(report: &TestReport) {
    println!(
        "  {} {:<36} {:<12} {:<8} {:>3}/{:<3} {:>6.1}%  {}",
        "▸".cyan(),
        report.id,
        report.stage,
        colorize_status(report.status),
        report.test_stats.passed,
        report.test_stats.total,
        report.coverage.percentage,
        report
            .start_time
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
            .dimmed()
    );
}

fn colorize_status(status: TestStatus) -> ColoredString {
    let text = status.to_string();
    match status {
        TestStatus::Passed => text.green(),
        TestStatus::Failed => text.red(),
    }
}
