//! SQL Server connection tester.
//!
//! Exits zero once every selected server has been tried, whatever the
//! individual outcomes; a non-zero exit means the tool itself could not run.

use clap::Parser;
use sqlprobe::{
    cli::Cli,
    probe::{ProbeOutcome, TiberiusProber},
    report::ProbeReport,
    runner::run_probes,
    source::EnvSource,
};
use sqlprobe_core::{Result, init_logging};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.global.verbose, cli.global.quiet)?;

    let source = EnvSource::with_env_file(&cli.env_file)?;
    let prober =
        TiberiusProber::new(cli.connect_timeout()).with_query_timeout(cli.query_timeout());

    info!("SQL Server Connection Tester");

    let report = run_probes(&source, &prober, cli.selection()).await;

    if cli.json {
        println!("{}", report.to_json()?);
    } else {
        print_summary(&report);
    }

    Ok(())
}

fn print_summary(report: &ProbeReport) {
    for server in &report.servers {
        let status = match &server.outcome {
            None => "not configured".to_string(),
            Some(ProbeOutcome::Success(_)) => "ok".to_string(),
            Some(ProbeOutcome::Failure { stage, message }) => {
                format!("failed ({stage:?}): {message}")
            }
        };
        println!("[{}] {}: {status}", server.index, server.name);
    }

    let summary = report.summary();
    println!(
        "{} succeeded, {} failed, {} not configured",
        summary.succeeded, summary.failed, summary.not_configured
    );
}
