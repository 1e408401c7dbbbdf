//! Run - one execution attempt within an experiment

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a run as reported by the tracking server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
    /// Run is currently executing.
    Running,
    /// Run is queued but not yet started.
    Scheduled,
    /// Run completed successfully.
    Finished,
    /// Run failed with an error.
    Failed,
    /// Run was killed by user or system.
    Killed,
}

impl RunStatus {
    /// Parse the server's upper-case status name.
    #[must_use]
    pub fn parse(status: &str) -> Option<Self> {
        match status {
            "RUNNING" => Some(Self::Running),
            "SCHEDULED" => Some(Self::Scheduled),
            "FINISHED" => Some(Self::Finished),
            "FAILED" => Some(Self::Failed),
            "KILLED" => Some(Self::Killed),
            _ => None,
        }
    }

    /// The server's upper-case status name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "RUNNING",
            Self::Scheduled => "SCHEDULED",
            Self::Finished => "FINISHED",
            Self::Failed => "FAILED",
            Self::Killed => "KILLED",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Run represents a single execution of an experiment.
///
/// Immutable snapshot of the server state at fetch time. Parameter, metric,
/// and tag mappings are ordered by name so every projection of a run is
/// deterministic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Run {
    run_id: String,
    experiment_id: String,
    run_name: Option<String>,
    status: RunStatus,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    params: BTreeMap<String, String>,
    metrics: BTreeMap<String, f64>,
    tags: BTreeMap<String, String>,
}

impl Run {
    /// Create a builder for a run.
    ///
    /// # Arguments
    ///
    /// * `run_id` - Unique identifier for the run
    /// * `experiment_id` - ID of the parent experiment
    /// * `status` - Status at fetch time
    #[must_use]
    pub fn builder(
        run_id: impl Into<String>,
        experiment_id: impl Into<String>,
        status: RunStatus,
    ) -> RunBuilder {
        RunBuilder::new(run_id, experiment_id, status)
    }

    /// Get the run ID.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Get the parent experiment ID.
    #[must_use]
    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    /// Get the display name, if one was set.
    #[must_use]
    pub fn run_name(&self) -> Option<&str> {
        self.run_name.as_deref()
    }

    /// Get the run status.
    #[must_use]
    pub const fn status(&self) -> RunStatus {
        self.status
    }

    /// Get the start timestamp, if the run has started.
    #[must_use]
    pub const fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Get the end timestamp, if the run has ended.
    #[must_use]
    pub const fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// Wall-clock duration in seconds.
    ///
    /// `None` until the run has both a start and an end time.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duration_secs(&self) -> Option<f64> {
        let (start, end) = (self.started_at?, self.ended_at?);
        Some((end - start).num_milliseconds() as f64 / 1000.0)
    }

    /// Get the logged parameters.
    #[must_use]
    pub const fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    /// Get the final value of every logged metric.
    #[must_use]
    pub const fn metrics(&self) -> &BTreeMap<String, f64> {
        &self.metrics
    }

    /// Get the run tags.
    #[must_use]
    pub const fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    /// Look up a single tag.
    #[must_use]
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

/// Builder for `Run`.
#[derive(Debug)]
pub struct RunBuilder {
    run: Run,
}

impl RunBuilder {
    /// Create a new builder with required fields.
    #[must_use]
    pub fn new(
        run_id: impl Into<String>,
        experiment_id: impl Into<String>,
        status: RunStatus,
    ) -> Self {
        Self {
            run: Run {
                run_id: run_id.into(),
                experiment_id: experiment_id.into(),
                run_name: None,
                status,
                started_at: None,
                ended_at: None,
                params: BTreeMap::new(),
                metrics: BTreeMap::new(),
                tags: BTreeMap::new(),
            },
        }
    }

    /// Set the display name.
    #[must_use]
    pub fn run_name(mut self, run_name: impl Into<String>) -> Self {
        self.run.run_name = Some(run_name.into());
        self
    }

    /// Set the start timestamp.
    #[must_use]
    pub const fn started_at(mut self, started_at: DateTime<Utc>) -> Self {
        self.run.started_at = Some(started_at);
        self
    }

    /// Set the end timestamp.
    #[must_use]
    pub const fn ended_at(mut self, ended_at: DateTime<Utc>) -> Self {
        self.run.ended_at = Some(ended_at);
        self
    }

    /// Record a parameter. Later values for the same key win.
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.run.params.insert(key.into(), value.into());
        self
    }

    /// Record the final value of a metric.
    #[must_use]
    pub fn metric(mut self, key: impl Into<String>, value: f64) -> Self {
        self.run.metrics.insert(key.into(), value);
        self
    }

    /// Record a tag.
    #[must_use]
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.run.tags.insert(key.into(), value.into());
        self
    }

    /// Build the `Run`.
    #[must_use]
    pub fn build(self) -> Run {
        self.run
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_parse() {
        assert_eq!(RunStatus::parse("FINISHED"), Some(RunStatus::Finished));
        assert_eq!(RunStatus::parse("KILLED"), Some(RunStatus::Killed));
        assert_eq!(RunStatus::parse("finished"), None);
        assert_eq!(RunStatus::Scheduled.to_string(), "SCHEDULED");
    }

    #[test]
    fn test_run_duration() {
        let start = DateTime::from_timestamp_millis(1_000).unwrap();
        let end = DateTime::from_timestamp_millis(91_500).unwrap();
        let run = Run::builder("run-1", "exp-1", RunStatus::Finished)
            .started_at(start)
            .ended_at(end)
            .build();
        assert_eq!(run.duration_secs(), Some(90.5));
    }

    #[test]
    fn test_run_duration_absent_while_running() {
        let start = DateTime::from_timestamp_millis(1_000).unwrap();
        let run = Run::builder("run-1", "exp-1", RunStatus::Running)
            .started_at(start)
            .build();
        assert!(run.duration_secs().is_none());
    }

    #[test]
    fn test_run_builder_mappings() {
        let run = Run::builder("run-1", "exp-1", RunStatus::Finished)
            .param("lr", "0.01")
            .metric("accuracy", 0.9)
            .tag("mlflow.user", "ada")
            .build();
        assert_eq!(run.params().get("lr").map(String::as_str), Some("0.01"));
        assert_eq!(run.metrics().get("accuracy"), Some(&0.9));
        assert_eq!(run.tag("mlflow.user"), Some("ada"));
        assert!(run.run_name().is_none());
    }
}
