//! End-to-end audit: fetch → aggregate → write.

use std::path::PathBuf;

use tracing::{info, warn};

use crate::aggregate::{build_model_rows, Aggregator, AuditTables, ModelVersionRow};
use crate::client::TrackingClient;
use crate::config::AuditConfig;
use crate::report::Report;
use crate::{Error, Result};

/// Everything fetched from the tracking server, flattened into rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditData {
    /// Experiments listed.
    pub experiments: usize,
    /// Summary and raw-metrics tables.
    pub tables: AuditTables,
    /// Model version rows, when the models sheet was requested.
    pub models: Option<Vec<ModelVersionRow>>,
}

impl AuditData {
    /// Assemble the workbook contents.
    #[must_use]
    pub fn report(&self) -> Report {
        let report = Report::new(&self.tables.summary, &self.tables.raw_metrics);
        match &self.models {
            Some(rows) => report.with_models(rows),
            None => report,
        }
    }
}

/// What one audit produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditOutcome {
    /// Experiments listed.
    pub experiments: usize,
    /// Summary rows written (one per run).
    pub runs: usize,
    /// Raw metric rows written.
    pub samples: usize,
    /// `(run, metric)` pairs skipped for lack of history.
    pub skipped_metrics: usize,
    /// Model versions written, when the models sheet was requested.
    pub model_versions: Option<usize>,
    /// Where the workbook was written.
    pub output_path: PathBuf,
}

/// Fetch everything from the tracking server and build the report rows.
///
/// # Errors
///
/// Any fatal fetch error (connection, auth, unexpected response).
pub fn collect<C: TrackingClient + ?Sized>(config: &AuditConfig, client: &C) -> Result<AuditData> {
    let experiments = client.list_experiments()?;
    info!(experiments = experiments.len(), "listed experiments");

    let tables = Aggregator::from_config(client, config).build_tables(&experiments)?;

    let models = if config.include_models() {
        Some(collect_models(client)?)
    } else {
        None
    };

    Ok(AuditData {
        experiments: experiments.len(),
        tables,
        models,
    })
}

fn collect_models<C: TrackingClient + ?Sized>(client: &C) -> Result<Vec<ModelVersionRow>> {
    let models = match client.list_registered_models() {
        Ok(models) => models,
        Err(err) if err.is_not_found() || matches!(err, Error::Api { .. }) => {
            warn!(error = %err, "model registry unavailable; registered models sheet left empty");
            Vec::new()
        }
        Err(err) => return Err(err),
    };

    let (rows, summary) = build_model_rows(&models);
    info!(
        registered_models = summary.models,
        versions = summary.versions,
        linked_to_git_commit = summary.versions_with_git_commit,
        "model registry summary"
    );
    Ok(rows)
}

/// Run a complete audit and write the workbook to the configured path.
///
/// # Errors
///
/// Fatal fetch errors, or `Error::Write` if the workbook cannot be saved.
/// Nothing is written when fetching fails.
pub fn run_audit<C: TrackingClient + ?Sized>(
    config: &AuditConfig,
    client: &C,
) -> Result<AuditOutcome> {
    let data = collect(config, client)?;
    data.report().save(config.output_path())?;

    Ok(AuditOutcome {
        experiments: data.experiments,
        runs: data.tables.summary.len(),
        samples: data.tables.raw_metrics.len(),
        skipped_metrics: data.tables.skipped_metrics,
        model_versions: data.models.as_ref().map(Vec::len),
        output_path: config.output_path().clone(),
    })
}
