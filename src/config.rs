//! Audit configuration
//!
//! Built once at startup from the environment and passed by reference to
//! every stage. Nothing else in the crate reads environment variables.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::{Error, Result};

/// Tracking server base address (required).
pub const ENV_TRACKING_URI: &str = "MLFLOW_TRACKING_URI";
/// Bearer token passed through to the tracking server.
pub const ENV_TRACKING_TOKEN: &str = "MLFLOW_TRACKING_TOKEN";
/// Basic-auth username passed through to the tracking server.
pub const ENV_TRACKING_USERNAME: &str = "MLFLOW_TRACKING_USERNAME";
/// Basic-auth password passed through to the tracking server.
pub const ENV_TRACKING_PASSWORD: &str = "MLFLOW_TRACKING_PASSWORD";
/// Output workbook path.
pub const ENV_OUTPUT_PATH: &str = "AUDIT_OUTPUT_PATH";
/// `max_results` sent with every paginated request.
pub const ENV_PAGE_SIZE: &str = "AUDIT_PAGE_SIZE";
/// Cap on pages fetched per listing.
pub const ENV_MAX_PAGES: &str = "AUDIT_MAX_PAGES";
/// Number of GPU slots queried for utilization history.
pub const ENV_GPU_SLOTS: &str = "AUDIT_GPU_SLOTS";
/// Comma-separated override of the utilization metric set.
pub const ENV_UTILIZATION_METRICS: &str = "AUDIT_UTILIZATION_METRICS";
/// Size of the per-run fetch pool.
pub const ENV_FETCH_WORKERS: &str = "AUDIT_FETCH_WORKERS";
/// Whether to add the "Registered Models" sheet.
pub const ENV_INCLUDE_MODELS: &str = "AUDIT_INCLUDE_MODELS";

/// Default output workbook path.
pub const DEFAULT_OUTPUT_PATH: &str = "experiment_metrics_summary.xlsx";
/// Default `max_results` per request.
pub const DEFAULT_PAGE_SIZE: u32 = 1000;
/// Default number of GPU slots queried (matches MLflow system-metrics naming `gpu_0..gpu_11`).
pub const DEFAULT_GPU_SLOTS: usize = 12;
/// Largest `AUDIT_GPU_SLOTS` accepted.
pub const MAX_GPU_SLOTS: usize = 4096;

/// Credentials forwarded to the tracking server unchanged.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// `Authorization: Bearer <token>`
    Bearer(String),
    /// `Authorization: Basic ...`
    Basic {
        /// Username
        username: String,
        /// Password, if any
        password: Option<String>,
    },
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bearer(_) => f.write_str("Bearer(<redacted>)"),
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .finish_non_exhaustive(),
        }
    }
}

/// Explicit configuration for one audit invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditConfig {
    tracking_uri: String,
    credentials: Option<Credentials>,
    output_path: PathBuf,
    page_size: u32,
    max_pages: Option<usize>,
    utilization_metrics: Vec<String>,
    fetch_workers: usize,
    include_models: bool,
}

impl AuditConfig {
    /// Create a configuration for the given tracking address with defaults
    /// for everything else.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the address is blank or not http(s).
    pub fn new(tracking_uri: impl AsRef<str>) -> Result<Self> {
        Ok(Self {
            tracking_uri: validate_tracking_uri(tracking_uri.as_ref())?,
            credentials: None,
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: None,
            utilization_metrics: default_utilization_metrics(DEFAULT_GPU_SLOTS),
            fetch_workers: 1,
            include_models: false,
        })
    }

    /// Load the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if `MLFLOW_TRACKING_URI` is unset or any
    /// optional variable holds an unparseable value.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load the configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`AuditConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let uri = get(ENV_TRACKING_URI)
            .ok_or_else(|| Error::Config(format!("{ENV_TRACKING_URI} is not set")))?;
        let mut config = Self::new(uri)?;

        config.credentials = match (get(ENV_TRACKING_TOKEN), get(ENV_TRACKING_USERNAME)) {
            (Some(token), _) => Some(Credentials::Bearer(token)),
            (None, Some(username)) => Some(Credentials::Basic {
                username,
                password: get(ENV_TRACKING_PASSWORD),
            }),
            (None, None) => None,
        };

        if let Some(path) = get(ENV_OUTPUT_PATH) {
            config.output_path = PathBuf::from(path);
        }
        if let Some(raw) = get(ENV_PAGE_SIZE) {
            config.page_size = parse_positive(ENV_PAGE_SIZE, &raw)?;
        }
        if let Some(raw) = get(ENV_MAX_PAGES) {
            config.max_pages = Some(parse_positive(ENV_MAX_PAGES, &raw)?);
        }
        if let Some(raw) = get(ENV_FETCH_WORKERS) {
            config.fetch_workers = parse_positive(ENV_FETCH_WORKERS, &raw)?;
        }
        if let Some(raw) = get(ENV_INCLUDE_MODELS) {
            config.include_models = parse_bool(ENV_INCLUDE_MODELS, &raw)?;
        }

        if let Some(raw) = get(ENV_UTILIZATION_METRICS) {
            let metrics: Vec<String> = raw
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(String::from)
                .collect();
            if metrics.is_empty() {
                return Err(Error::Config(format!(
                    "{ENV_UTILIZATION_METRICS} lists no metric names"
                )));
            }
            config.utilization_metrics = metrics;
        } else if let Some(raw) = get(ENV_GPU_SLOTS) {
            let slots: usize = parse_number(ENV_GPU_SLOTS, &raw)?;
            if slots > MAX_GPU_SLOTS {
                return Err(Error::Config(format!(
                    "{ENV_GPU_SLOTS} must be at most {MAX_GPU_SLOTS}, got {slots}"
                )));
            }
            config.utilization_metrics = default_utilization_metrics(slots);
        }

        Ok(config)
    }

    /// Set the credentials.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Set the output workbook path.
    #[must_use]
    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = path.into();
        self
    }

    /// Set `max_results` per request (clamped to at least 1).
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Cap the number of pages fetched per listing.
    #[must_use]
    pub const fn with_max_pages(mut self, max_pages: Option<usize>) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Replace the utilization metric set.
    #[must_use]
    pub fn with_utilization_metrics<I, S>(mut self, metrics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.utilization_metrics = metrics.into_iter().map(Into::into).collect();
        self
    }

    /// Set the per-run fetch pool size (clamped to at least 1).
    #[must_use]
    pub fn with_fetch_workers(mut self, workers: usize) -> Self {
        self.fetch_workers = workers.max(1);
        self
    }

    /// Enable or disable the "Registered Models" sheet.
    #[must_use]
    pub const fn with_include_models(mut self, include: bool) -> Self {
        self.include_models = include;
        self
    }

    /// Tracking server base address, without a trailing slash.
    #[must_use]
    pub fn tracking_uri(&self) -> &str {
        &self.tracking_uri
    }

    /// Credentials, if configured.
    #[must_use]
    pub const fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// Output workbook path.
    #[must_use]
    pub const fn output_path(&self) -> &PathBuf {
        &self.output_path
    }

    /// `max_results` per request.
    #[must_use]
    pub const fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Page cap per listing; `None` fetches every page.
    #[must_use]
    pub const fn max_pages(&self) -> Option<usize> {
        self.max_pages
    }

    /// Metric names whose full history is fetched for every run.
    #[must_use]
    pub fn utilization_metrics(&self) -> &[String] {
        &self.utilization_metrics
    }

    /// Per-run fetch pool size; 1 means strictly sequential.
    #[must_use]
    pub const fn fetch_workers(&self) -> usize {
        self.fetch_workers
    }

    /// Whether the "Registered Models" sheet is produced.
    #[must_use]
    pub const fn include_models(&self) -> bool {
        self.include_models
    }
}

/// MLflow system-metric names for CPU plus `gpu_slots` GPUs.
///
/// `gpu_slots` is capped at [`MAX_GPU_SLOTS`].
#[must_use]
pub fn default_utilization_metrics(gpu_slots: usize) -> Vec<String> {
    let gpu_slots = gpu_slots.min(MAX_GPU_SLOTS);
    let mut metrics = Vec::with_capacity(1 + gpu_slots * 2);
    metrics.push("system/cpu_utilization_percentage".to_string());
    for slot in 0..gpu_slots {
        metrics.push(format!("system/gpu_{slot}_utilization_percentage"));
        metrics.push(format!("system/gpu_{slot}_memory_usage_percentage"));
    }
    metrics
}

fn validate_tracking_uri(raw: &str) -> Result<String> {
    let uri = raw.trim().trim_end_matches('/');
    if uri.is_empty() {
        return Err(Error::Config(format!("{ENV_TRACKING_URI} is empty")));
    }
    if !(uri.starts_with("http://") || uri.starts_with("https://")) {
        return Err(Error::Config(format!(
            "{ENV_TRACKING_URI} must be an http:// or https:// address, got '{uri}'"
        )));
    }
    Ok(uri.to_string())
}

fn parse_number<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| Error::Config(format!("{key} must be a non-negative integer, got '{raw}'")))
}

fn parse_positive<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr + PartialEq + Default,
{
    let value: T = parse_number(key, raw)?;
    if value == T::default() {
        return Err(Error::Config(format!("{key} must be at least 1")));
    }
    Ok(value)
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Config(format!("{key} must be true or false, got '{raw}'"))),
    }
}
