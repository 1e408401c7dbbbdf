//! Row projections written to the report.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::experiment::{
    Artifact, Experiment, MetricSample, ModelVersion, RegisteredModel, Run, RunStatus,
};

/// Tag holding the user that launched a run.
pub const USER_TAG: &str = "mlflow.user";
/// Tag holding the entry point / notebook that launched a run.
pub const SOURCE_TAG: &str = "mlflow.source.name";
/// Tag holding the JSON history of models logged by a run.
pub const LOG_MODEL_HISTORY_TAG: &str = "mlflow.log-model.history";
/// Tag holding the git commit a model version was built from.
pub const GIT_COMMIT_TAG: &str = "mlflow.source.git.commit";
/// Prefix of tags the tracking server sets itself.
pub const SYSTEM_TAG_PREFIX: &str = "mlflow.";

/// Summary statistics of one utilization metric history.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UtilizationStats {
    /// Number of samples.
    pub samples: usize,
    /// Arithmetic mean of the finite sample values.
    pub mean: f64,
    /// Largest finite sample value.
    pub peak: f64,
}

impl UtilizationStats {
    /// Summarize a history. `None` when it has no finite values.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_samples(samples: &[MetricSample]) -> Option<Self> {
        let finite: Vec<f64> = samples
            .iter()
            .map(MetricSample::value)
            .filter(|v| v.is_finite())
            .collect();
        if finite.is_empty() {
            return None;
        }
        let mean = finite.iter().sum::<f64>() / finite.len() as f64;
        let peak = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Some(Self {
            samples: samples.len(),
            mean,
            peak,
        })
    }
}

/// One row of the "Summary" sheet: a flattened run.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    /// Run identifier.
    pub run_id: String,
    /// Parent experiment identifier.
    pub experiment_id: String,
    /// Parent experiment name.
    pub experiment_name: String,
    /// Run display name.
    pub run_name: Option<String>,
    /// Status at fetch time.
    pub status: RunStatus,
    /// Start time.
    pub started_at: Option<DateTime<Utc>>,
    /// End time.
    pub ended_at: Option<DateTime<Utc>>,
    /// Wall-clock duration in seconds.
    pub duration_secs: Option<f64>,
    /// `mlflow.user` tag.
    pub user: Option<String>,
    /// `mlflow.source.name` tag.
    pub source: Option<String>,
    /// Top-level artifact paths.
    pub logged_models: Vec<String>,
    /// Artifact paths recorded in `mlflow.log-model.history`.
    pub registered_models: Option<String>,
    /// Parameters, exactly as fetched.
    pub params: BTreeMap<String, String>,
    /// Final metric values, exactly as fetched.
    pub metrics: BTreeMap<String, f64>,
    /// Tags outside the `mlflow.` namespace.
    pub tags: BTreeMap<String, String>,
    /// Utilization statistics per metric that had samples.
    pub utilization: BTreeMap<String, UtilizationStats>,
}

impl SummaryRow {
    /// Flatten a run and the per-run fetch results into a row.
    #[must_use]
    pub fn new(
        experiment: &Experiment,
        run: &Run,
        histories: &[(String, Vec<MetricSample>)],
        artifacts: &[Artifact],
    ) -> Self {
        let tags = run
            .tags()
            .iter()
            .filter(|(key, _)| !key.starts_with(SYSTEM_TAG_PREFIX))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        let utilization = histories
            .iter()
            .filter_map(|(metric, samples)| {
                UtilizationStats::from_samples(samples).map(|stats| (metric.clone(), stats))
            })
            .collect();

        Self {
            run_id: run.run_id().to_string(),
            experiment_id: experiment.experiment_id().to_string(),
            experiment_name: experiment.name().to_string(),
            run_name: run.run_name().map(String::from),
            status: run.status(),
            started_at: run.started_at(),
            ended_at: run.ended_at(),
            duration_secs: run.duration_secs(),
            user: run.tag(USER_TAG).map(String::from),
            source: run.tag(SOURCE_TAG).map(String::from),
            logged_models: artifacts.iter().map(|a| a.path().to_string()).collect(),
            registered_models: run.tag(LOG_MODEL_HISTORY_TAG).map(summarize_log_model_history),
            params: run.params().clone(),
            metrics: run.metrics().clone(),
            tags,
            utilization,
        }
    }
}

/// Reduce the `mlflow.log-model.history` JSON to its artifact paths.
///
/// Falls back to the raw tag value when it is not the expected JSON shape.
fn summarize_log_model_history(raw: &str) -> String {
    let Ok(serde_json::Value::Array(entries)) = serde_json::from_str::<serde_json::Value>(raw)
    else {
        return raw.to_string();
    };
    let paths: Vec<&str> = entries
        .iter()
        .filter_map(|entry| entry.get("artifact_path").and_then(serde_json::Value::as_str))
        .collect();
    if paths.is_empty() {
        raw.to_string()
    } else {
        paths.join(", ")
    }
}

/// One row of the "Raw Metrics" sheet: a single utilization sample.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMetricRow {
    /// Run identifier.
    pub run_id: String,
    /// Metric name.
    pub metric: String,
    /// Sample timestamp.
    pub timestamp: DateTime<Utc>,
    /// Step index.
    pub step: i64,
    /// Sample value.
    pub value: f64,
}

impl From<&MetricSample> for RawMetricRow {
    fn from(sample: &MetricSample) -> Self {
        Self {
            run_id: sample.run_id().to_string(),
            metric: sample.key().to_string(),
            timestamp: sample.timestamp(),
            step: sample.step(),
            value: sample.value(),
        }
    }
}

/// One row of the "Registered Models" sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelVersionRow {
    /// Registered model name.
    pub model_name: String,
    /// Version number.
    pub version: u64,
    /// Registry stage.
    pub stage: String,
    /// Source artifact URI.
    pub source: String,
    /// Run that produced the version.
    pub run_id: Option<String>,
    /// `mlflow.source.git.commit` tag.
    pub git_commit: Option<String>,
    /// Registration time.
    pub created_at: Option<DateTime<Utc>>,
}

impl ModelVersionRow {
    /// Flatten one model version.
    #[must_use]
    pub fn new(model: &RegisteredModel, version: &ModelVersion) -> Self {
        Self {
            model_name: model.name().to_string(),
            version: version.version(),
            stage: version.stage().to_string(),
            source: version.source().to_string(),
            run_id: version.run_id().map(String::from),
            git_commit: version.tag(GIT_COMMIT_TAG).map(String::from),
            created_at: version.created_at(),
        }
    }
}

/// Registry-wide totals logged alongside the "Registered Models" sheet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModelRegistrySummary {
    /// Distinct registered models.
    pub models: usize,
    /// Model versions listed.
    pub versions: usize,
    /// Versions carrying a git commit tag.
    pub versions_with_git_commit: usize,
}
