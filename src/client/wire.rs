//! MLflow REST wire format
//!
//! Private mirror of the server's JSON responses. Conversion into the
//! `experiment` types happens here so nothing downstream sees untyped data.
//! Proto3 JSON omits empty repeated fields and may encode int64 as strings,
//! so every list defaults to empty and every integer accepts both forms.

use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};

use crate::experiment::{
    Artifact, Experiment, MetricSample, ModelVersion, RegisteredModel, Run, RunStatus,
};
use crate::{Error, Result};

/// MLflow error code for a missing run, experiment, or model.
pub const RESOURCE_DOES_NOT_EXIST: &str = "RESOURCE_DOES_NOT_EXIST";

/// Tag MLflow uses for the run name on servers that predate `info.run_name`.
const RUN_NAME_TAG: &str = "mlflow.runName";

#[derive(Deserialize)]
#[serde(untagged)]
enum Int64Repr {
    Int(i64),
    Str(String),
}

impl Int64Repr {
    fn into_i64<E: serde::de::Error>(self) -> std::result::Result<i64, E> {
        match self {
            Self::Int(value) => Ok(value),
            Self::Str(raw) => raw.trim().parse().map_err(E::custom),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FloatRepr {
    Float(f64),
    Str(String),
}

fn int64<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<i64, D::Error> {
    Int64Repr::deserialize(deserializer)?.into_i64()
}

fn opt_int64<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<i64>, D::Error> {
    Option::<Int64Repr>::deserialize(deserializer)?
        .map(Int64Repr::into_i64)
        .transpose()
}

/// Metric values may arrive as `"NaN"` / `"Infinity"` strings.
fn float<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<f64, D::Error> {
    match FloatRepr::deserialize(deserializer)? {
        FloatRepr::Float(value) => Ok(value),
        FloatRepr::Str(raw) => raw.trim().parse().map_err(D::Error::custom),
    }
}

/// Convert epoch milliseconds to a UTC timestamp.
///
/// # Errors
///
/// `Error::Decode` if the value is outside chrono's representable range.
pub fn millis_to_datetime(field: &str, millis: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| Error::Decode(format!("{field} out of range: {millis}")))
}

fn opt_millis(field: &str, millis: Option<i64>) -> Result<Option<DateTime<Utc>>> {
    millis.map(|ms| millis_to_datetime(field, ms)).transpose()
}

/// Error body returned with non-success responses.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Tag {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

/// One page of a paginated listing.
#[derive(Debug)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_page_token: Option<String>,
}

// =============================================================================
// experiments/search
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct SearchExperimentsResponse {
    #[serde(default)]
    experiments: Vec<WireExperiment>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireExperiment {
    experiment_id: String,
    name: String,
    #[serde(default, deserialize_with = "opt_int64")]
    creation_time: Option<i64>,
    #[serde(default)]
    tags: Vec<Tag>,
}

impl SearchExperimentsResponse {
    pub fn into_page(self) -> Result<Page<Experiment>> {
        let items = self
            .experiments
            .into_iter()
            .map(|wire| {
                let mut builder = Experiment::builder(wire.experiment_id, wire.name);
                if let Some(created) = opt_millis("experiment.creation_time", wire.creation_time)? {
                    builder = builder.created_at(created);
                }
                for tag in wire.tags {
                    builder = builder.tag(tag.key, tag.value);
                }
                Ok(builder.build())
            })
            .collect::<Result<_>>()?;
        Ok(Page {
            items,
            next_page_token: self.next_page_token,
        })
    }
}

// =============================================================================
// runs/search
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct SearchRunsResponse {
    #[serde(default)]
    runs: Vec<WireRun>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireRun {
    info: WireRunInfo,
    #[serde(default)]
    data: WireRunData,
}

#[derive(Debug, Deserialize)]
struct WireRunInfo {
    #[serde(alias = "run_uuid")]
    run_id: String,
    experiment_id: String,
    #[serde(default)]
    run_name: Option<String>,
    status: String,
    #[serde(default, deserialize_with = "opt_int64")]
    start_time: Option<i64>,
    #[serde(default, deserialize_with = "opt_int64")]
    end_time: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct WireRunData {
    #[serde(default)]
    metrics: Vec<WireMetric>,
    #[serde(default)]
    params: Vec<Tag>,
    #[serde(default)]
    tags: Vec<Tag>,
}

#[derive(Debug, Deserialize)]
struct WireMetric {
    key: String,
    #[serde(deserialize_with = "float")]
    value: f64,
    #[serde(default, deserialize_with = "opt_int64")]
    timestamp: Option<i64>,
    #[serde(default, deserialize_with = "opt_int64")]
    step: Option<i64>,
}

impl WireRun {
    fn into_run(self) -> Result<Run> {
        let WireRun { info, data } = self;
        let status = RunStatus::parse(&info.status).ok_or_else(|| {
            Error::Decode(format!("run {} has unknown status '{}'", info.run_id, info.status))
        })?;

        let run_name = info.run_name.filter(|name| !name.is_empty()).or_else(|| {
            data.tags
                .iter()
                .find(|tag| tag.key == RUN_NAME_TAG)
                .map(|tag| tag.value.clone())
        });

        let mut builder = Run::builder(info.run_id, info.experiment_id, status);
        if let Some(name) = run_name {
            builder = builder.run_name(name);
        }
        if let Some(started) = opt_millis("run.start_time", info.start_time)? {
            builder = builder.started_at(started);
        }
        if let Some(ended) = opt_millis("run.end_time", info.end_time)? {
            builder = builder.ended_at(ended);
        }
        for param in data.params {
            builder = builder.param(param.key, param.value);
        }
        for metric in data.metrics {
            builder = builder.metric(metric.key, metric.value);
        }
        for tag in data.tags {
            builder = builder.tag(tag.key, tag.value);
        }
        Ok(builder.build())
    }
}

impl SearchRunsResponse {
    pub fn into_page(self) -> Result<Page<Run>> {
        let items = self
            .runs
            .into_iter()
            .map(WireRun::into_run)
            .collect::<Result<_>>()?;
        Ok(Page {
            items,
            next_page_token: self.next_page_token,
        })
    }
}

// =============================================================================
// metrics/get-history
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct MetricHistoryResponse {
    #[serde(default)]
    metrics: Vec<WireMetric>,
    #[serde(default)]
    next_page_token: Option<String>,
}

impl MetricHistoryResponse {
    pub fn into_page(self, run_id: &str) -> Result<Page<MetricSample>> {
        let items = self
            .metrics
            .into_iter()
            .map(|wire| {
                let millis = wire.timestamp.ok_or_else(|| {
                    Error::Decode(format!("sample of {} for run {run_id} has no timestamp", wire.key))
                })?;
                let timestamp = millis_to_datetime("metric.timestamp", millis)?;
                Ok(MetricSample::new(
                    run_id,
                    wire.key,
                    timestamp,
                    wire.step.unwrap_or(0),
                    wire.value,
                ))
            })
            .collect::<Result<_>>()?;
        Ok(Page {
            items,
            next_page_token: self.next_page_token,
        })
    }
}

// =============================================================================
// registered-models/search
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct SearchRegisteredModelsResponse {
    #[serde(default)]
    registered_models: Vec<WireRegisteredModel>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireRegisteredModel {
    name: String,
    #[serde(default, deserialize_with = "opt_int64")]
    creation_timestamp: Option<i64>,
    #[serde(default)]
    latest_versions: Vec<WireModelVersion>,
}

#[derive(Debug, Deserialize)]
struct WireModelVersion {
    #[serde(deserialize_with = "int64")]
    version: i64,
    #[serde(default)]
    current_stage: Option<String>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    run_id: Option<String>,
    #[serde(default, deserialize_with = "opt_int64")]
    creation_timestamp: Option<i64>,
    #[serde(default)]
    tags: Vec<Tag>,
}

impl WireModelVersion {
    fn into_version(self, model: &str) -> Result<ModelVersion> {
        let number = u64::try_from(self.version).map_err(|_| {
            Error::Decode(format!("model {model} has negative version {}", self.version))
        })?;
        let mut version = ModelVersion::new(
            number,
            self.current_stage.unwrap_or_else(|| "None".to_string()),
            self.source.unwrap_or_default(),
        );
        if let Some(run_id) = self.run_id.filter(|id| !id.is_empty()) {
            version = version.with_run_id(run_id);
        }
        if let Some(created) = opt_millis("model_version.creation_timestamp", self.creation_timestamp)? {
            version = version.with_created_at(created);
        }
        for tag in self.tags {
            version = version.with_tag(tag.key, tag.value);
        }
        Ok(version)
    }
}

impl SearchRegisteredModelsResponse {
    pub fn into_page(self) -> Result<Page<RegisteredModel>> {
        let items = self
            .registered_models
            .into_iter()
            .map(|wire| {
                let mut model = RegisteredModel::new(&wire.name);
                if let Some(created) =
                    opt_millis("registered_model.creation_timestamp", wire.creation_timestamp)?
                {
                    model = model.with_created_at(created);
                }
                for version in wire.latest_versions {
                    model = model.with_version(version.into_version(&wire.name)?);
                }
                Ok(model)
            })
            .collect::<Result<_>>()?;
        Ok(Page {
            items,
            next_page_token: self.next_page_token,
        })
    }
}

// =============================================================================
// artifacts/list
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ListArtifactsResponse {
    #[serde(default)]
    files: Vec<WireFileInfo>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireFileInfo {
    path: String,
    #[serde(default)]
    is_dir: bool,
    #[serde(default, deserialize_with = "opt_int64")]
    file_size: Option<i64>,
}

impl ListArtifactsResponse {
    pub fn into_page(self) -> Page<Artifact> {
        let items = self
            .files
            .into_iter()
            .map(|wire| {
                let size = wire.file_size.and_then(|size| u64::try_from(size).ok());
                Artifact::new(wire.path, wire.is_dir, size)
            })
            .collect();
        Page {
            items,
            next_page_token: self.next_page_token,
        }
    }
}
