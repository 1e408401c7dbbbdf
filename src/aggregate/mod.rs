//! Aggregator: experiments → runs → utilization histories → rows
//!
//! Rows keep the iteration order experiment → run → metric → sample. Nothing
//! is sorted or deduplicated. A `NotFound` while fetching one metric history
//! skips that metric for that run; every other error aborts the audit.
//!
//! With `fetch_workers > 1` the per-run fetches of one experiment run on a
//! fixed-size rayon pool. Results are collected positionally, so the output
//! is identical to the sequential order.

mod rows;

pub use rows::{
    ModelRegistrySummary, ModelVersionRow, RawMetricRow, SummaryRow, UtilizationStats,
    GIT_COMMIT_TAG, LOG_MODEL_HISTORY_TAG, SOURCE_TAG, SYSTEM_TAG_PREFIX, USER_TAG,
};

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, info, warn};

use crate::client::TrackingClient;
use crate::config::AuditConfig;
use crate::experiment::{Artifact, Experiment, MetricSample, RegisteredModel, Run};
use crate::Result;

/// The two tables of the report, plus bookkeeping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditTables {
    /// One row per run.
    pub summary: Vec<SummaryRow>,
    /// One row per utilization sample.
    pub raw_metrics: Vec<RawMetricRow>,
    /// `(run, metric)` pairs skipped because the server had no such history.
    pub skipped_metrics: usize,
}

/// What one run's fetches produced.
#[derive(Debug, Default)]
struct RunFetch {
    histories: Vec<(String, Vec<MetricSample>)>,
    artifacts: Vec<Artifact>,
    skipped: usize,
}

/// Builds report tables from a [`TrackingClient`].
pub struct Aggregator<'a, C: TrackingClient + ?Sized> {
    client: &'a C,
    utilization_metrics: Vec<String>,
    pool: Option<ThreadPool>,
}

impl<'a, C: TrackingClient + ?Sized> Aggregator<'a, C> {
    /// Create a sequential aggregator probing the given metric names.
    #[must_use]
    pub fn new(client: &'a C, utilization_metrics: Vec<String>) -> Self {
        Self {
            client,
            utilization_metrics,
            pool: None,
        }
    }

    /// Create an aggregator using the configured metric set and pool size.
    #[must_use]
    pub fn from_config(client: &'a C, config: &AuditConfig) -> Self {
        Self::new(client, config.utilization_metrics().to_vec())
            .with_fetch_workers(config.fetch_workers())
    }

    /// Fetch per-run data on a pool of `workers` threads.
    ///
    /// `workers <= 1` keeps the aggregator strictly sequential. If the pool
    /// cannot be created the aggregator stays sequential.
    #[must_use]
    pub fn with_fetch_workers(mut self, workers: usize) -> Self {
        self.pool = if workers > 1 {
            match ThreadPoolBuilder::new()
                .num_threads(workers)
                .thread_name(|i| format!("audit-fetch-{i}"))
                .build()
            {
                Ok(pool) => Some(pool),
                Err(e) => {
                    warn!(workers, error = %e, "fetch pool unavailable; fetching sequentially");
                    None
                }
            }
        } else {
            None
        };
        self
    }

    /// Metric names whose history is fetched for every run.
    #[must_use]
    pub fn utilization_metrics(&self) -> &[String] {
        &self.utilization_metrics
    }

    /// Build the summary and raw-metrics tables for the given experiments.
    ///
    /// # Errors
    ///
    /// Any client error other than a per-metric `NotFound`.
    pub fn build_tables(&self, experiments: &[Experiment]) -> Result<AuditTables> {
        let mut tables = AuditTables::default();

        for experiment in experiments {
            let runs = self.client.list_runs(experiment.experiment_id())?;
            info!(
                experiment = experiment.name(),
                experiment_id = experiment.experiment_id(),
                runs = runs.len(),
                "aggregating experiment"
            );

            let fetched = self.fetch_runs(&runs)?;
            for (run, fetch) in runs.iter().zip(fetched) {
                tables.summary.push(SummaryRow::new(
                    experiment,
                    run,
                    &fetch.histories,
                    &fetch.artifacts,
                ));
                tables.raw_metrics.extend(
                    fetch
                        .histories
                        .iter()
                        .flat_map(|(_, samples)| samples.iter().map(RawMetricRow::from)),
                );
                tables.skipped_metrics += fetch.skipped;
            }
        }

        info!(
            runs = tables.summary.len(),
            samples = tables.raw_metrics.len(),
            skipped_metrics = tables.skipped_metrics,
            "aggregation complete"
        );
        Ok(tables)
    }

    fn fetch_runs(&self, runs: &[Run]) -> Result<Vec<RunFetch>> {
        match &self.pool {
            Some(pool) if runs.len() > 1 => {
                pool.install(|| runs.par_iter().map(|run| self.fetch_run(run)).collect())
            }
            _ => runs.iter().map(|run| self.fetch_run(run)).collect(),
        }
    }

    fn fetch_run(&self, run: &Run) -> Result<RunFetch> {
        let mut fetch = RunFetch::default();

        for metric in &self.utilization_metrics {
            match self.client.fetch_metric_history(run.run_id(), metric) {
                Ok(samples) => fetch.histories.push((metric.clone(), samples)),
                Err(err) if err.is_not_found() => {
                    debug!(run_id = run.run_id(), metric = %metric, error = %err, "skipping metric");
                    fetch.skipped += 1;
                }
                Err(err) => return Err(err),
            }
        }

        fetch.artifacts = match self.client.list_artifacts(run.run_id()) {
            Ok(artifacts) => artifacts,
            Err(err) if err.is_not_found() => {
                debug!(run_id = run.run_id(), error = %err, "no artifact listing");
                Vec::new()
            }
            Err(err) => return Err(err),
        };

        Ok(fetch)
    }
}

/// Flatten every model version and compute registry totals.
#[must_use]
pub fn build_model_rows(models: &[RegisteredModel]) -> (Vec<ModelVersionRow>, ModelRegistrySummary) {
    let rows: Vec<ModelVersionRow> = models
        .iter()
        .flat_map(|model| {
            model
                .versions()
                .values()
                .map(move |version| ModelVersionRow::new(model, version))
        })
        .collect();

    let summary = ModelRegistrySummary {
        models: models.len(),
        versions: rows.len(),
        versions_with_git_commit: rows.iter().filter(|row| row.git_commit.is_some()).count(),
    };
    (rows, summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MemoryTrackingClient;
    use crate::experiment::{ModelVersion, RunStatus};
    use chrono::DateTime;

    fn client_with_samples() -> MemoryTrackingClient {
        let mut client = MemoryTrackingClient::new();
        client.add_experiment(Experiment::new("1", "exp"));
        for id in ["r1", "r2", "r3"] {
            client.add_run(Run::builder(id, "1", RunStatus::Finished).build());
            for step in 0..3 {
                let ts = DateTime::from_timestamp_millis(step * 1000).unwrap();
                client.add_metric_sample(MetricSample::new(id, "cpu", ts, step, 10.0));
            }
        }
        client
    }

    #[test]
    fn test_build_tables_counts() {
        let client = client_with_samples();
        let experiments = client.list_experiments().unwrap();
        let tables = Aggregator::new(&client, vec!["cpu".into(), "gpu".into()])
            .build_tables(&experiments)
            .unwrap();

        assert_eq!(tables.summary.len(), 3);
        assert_eq!(tables.raw_metrics.len(), 9);
        assert_eq!(tables.skipped_metrics, 3);
    }

    #[test]
    fn test_pool_matches_sequential_order() {
        let client = client_with_samples();
        let experiments = client.list_experiments().unwrap();
        let metrics = vec!["cpu".to_string()];

        let sequential = Aggregator::new(&client, metrics.clone())
            .build_tables(&experiments)
            .unwrap();
        let pooled = Aggregator::new(&client, metrics)
            .with_fetch_workers(4)
            .build_tables(&experiments)
            .unwrap();

        assert_eq!(sequential, pooled);
    }

    #[test]
    fn test_build_model_rows() {
        let models = vec![
            RegisteredModel::new("a")
                .with_version(ModelVersion::new(1, "None", "s").with_tag(GIT_COMMIT_TAG, "abc"))
                .with_version(ModelVersion::new(2, "Production", "s")),
            RegisteredModel::new("b"),
        ];
        let (rows, summary) = build_model_rows(&models);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].version, 1);
        assert_eq!(
            summary,
            ModelRegistrySummary {
                models: 2,
                versions: 2,
                versions_with_git_commit: 1
            }
        );
    }
}
