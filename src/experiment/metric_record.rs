//! Metric Sample - one point of a run's metric history

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metric Sample represents a single metric data point.
///
/// Many samples exist per (run, metric) pair. Their order is whatever the
/// tracking server returned; nothing here re-sorts them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricSample {
    run_id: String,
    key: String,
    timestamp: DateTime<Utc>,
    step: i64,
    value: f64,
}

impl MetricSample {
    /// Create a new metric sample.
    ///
    /// # Arguments
    ///
    /// * `run_id` - ID of the parent run
    /// * `key` - Metric name (e.g., `system/gpu_0_utilization_percentage`)
    /// * `timestamp` - Wall-clock time the value was logged
    /// * `step` - Step index
    /// * `value` - Metric value
    #[must_use]
    pub fn new(
        run_id: impl Into<String>,
        key: impl Into<String>,
        timestamp: DateTime<Utc>,
        step: i64,
        value: f64,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            key: key.into(),
            timestamp,
            step,
            value,
        }
    }

    /// Get the run ID.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Get the metric key/name.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Get the timestamp when the metric was recorded.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Get the step index.
    #[must_use]
    pub const fn step(&self) -> i64 {
        self.step
    }

    /// Get the metric value.
    #[must_use]
    pub const fn value(&self) -> f64 {
        self.value
    }
}
