//! In-memory tracking client.
//!
//! Serves a fixed snapshot of experiments, runs, metric histories, models,
//! and artifacts. Listings come back in insertion order, which makes it the
//! reference backend for aggregation tests and offline demos.

use std::collections::HashMap;

use super::TrackingClient;
use crate::experiment::{Artifact, Experiment, MetricSample, RegisteredModel, Run};
use crate::{Error, Result};

/// In-memory [`TrackingClient`].
///
/// ## Design
///
/// Experiments and runs are kept in vectors so listings preserve insertion
/// order; metric histories are keyed by `(run_id, metric)` for O(1) lookup.
#[derive(Debug, Default)]
pub struct MemoryTrackingClient {
    experiments: Vec<Experiment>,
    runs: Vec<Run>,
    histories: HashMap<(String, String), Vec<MetricSample>>,
    models: Vec<RegisteredModel>,
    artifacts: HashMap<String, Vec<Artifact>>,
}

impl MemoryTrackingClient {
    /// Create a new empty client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the client holds no experiments, runs, or samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.experiments.is_empty() && self.runs.is_empty() && self.histories.is_empty()
    }

    /// Get the number of experiments.
    #[must_use]
    pub fn experiment_count(&self) -> usize {
        self.experiments.len()
    }

    /// Get the number of runs across all experiments.
    #[must_use]
    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    /// Get the number of metric samples across all histories.
    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.histories.values().map(Vec::len).sum()
    }

    /// Add an experiment.
    pub fn add_experiment(&mut self, experiment: Experiment) {
        self.experiments.push(experiment);
    }

    /// Add a run.
    pub fn add_run(&mut self, run: Run) {
        self.runs.push(run);
    }

    /// Append a sample to its `(run, metric)` history.
    pub fn add_metric_sample(&mut self, sample: MetricSample) {
        self.histories
            .entry((sample.run_id().to_string(), sample.key().to_string()))
            .or_default()
            .push(sample);
    }

    /// Add a registered model.
    pub fn add_registered_model(&mut self, model: RegisteredModel) {
        self.models.push(model);
    }

    /// Add a top-level artifact to a run.
    pub fn add_artifact(&mut self, run_id: impl Into<String>, artifact: Artifact) {
        self.artifacts.entry(run_id.into()).or_default().push(artifact);
    }

    fn has_run(&self, run_id: &str) -> bool {
        self.runs.iter().any(|run| run.run_id() == run_id)
    }
}

impl TrackingClient for MemoryTrackingClient {
    fn list_experiments(&self) -> Result<Vec<Experiment>> {
        Ok(self.experiments.clone())
    }

    fn list_runs(&self, experiment_id: &str) -> Result<Vec<Run>> {
        Ok(self
            .runs
            .iter()
            .filter(|run| run.experiment_id() == experiment_id)
            .cloned()
            .collect())
    }

    fn fetch_metric_history(&self, run_id: &str, metric_name: &str) -> Result<Vec<MetricSample>> {
        if !self.has_run(run_id) {
            return Err(Error::NotFound(format!("run {run_id}")));
        }
        self.histories
            .get(&(run_id.to_string(), metric_name.to_string()))
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("metric {metric_name} for run {run_id}")))
    }

    fn list_registered_models(&self) -> Result<Vec<RegisteredModel>> {
        Ok(self.models.clone())
    }

    fn list_artifacts(&self, run_id: &str) -> Result<Vec<Artifact>> {
        if !self.has_run(run_id) {
            return Err(Error::NotFound(format!("run {run_id}")));
        }
        Ok(self.artifacts.get(run_id).cloned().unwrap_or_default())
    }
}
