//! experiment-audit - Main Entry Point
//!
//! Reads the tracking server address from the environment (or `.env`),
//! audits every experiment, and writes `experiment_metrics_summary.xlsx`.
//! Takes no arguments.

use std::process::ExitCode;

use anyhow::Context;
use experiment_audit::client::HttpTrackingClient;
use experiment_audit::{run_audit, AuditConfig, AuditOutcome};
use tracing::{info, warn};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "experiment_audit=info".into()),
        )
        .init();

    match try_main() {
        Ok(outcome) => {
            info!(
                path = %outcome.output_path.display(),
                experiments = outcome.experiments,
                runs = outcome.runs,
                samples = outcome.samples,
                "audit complete"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn try_main() -> anyhow::Result<AuditOutcome> {
    if let Err(err) = dotenvy::dotenv() {
        if !err.not_found() {
            warn!(error = %err, "ignoring unreadable .env file");
        }
    }

    let config = AuditConfig::from_env().context("config stage failed")?;
    let client = HttpTrackingClient::new(&config).context("fetch stage failed")?;
    info!(tracking_uri = client.base_url(), "starting audit");

    run_audit(&config, &client).map_err(|err| {
        let stage = err.stage();
        anyhow::Error::new(err).context(format!("{stage} stage failed"))
    })
}
