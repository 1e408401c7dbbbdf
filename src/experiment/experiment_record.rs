//! Experiment - root entity returned by the tracking server

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Experiment represents a named grouping of runs on the tracking server.
///
/// Read-only from the audit's perspective: fetched once per invocation and
/// never mutated locally.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Experiment {
    experiment_id: String,
    name: String,
    created_at: Option<DateTime<Utc>>,
    tags: BTreeMap<String, String>,
}

impl Experiment {
    /// Create a new experiment with the given ID and name.
    ///
    /// # Arguments
    ///
    /// * `experiment_id` - Server-assigned identifier
    /// * `name` - Human-readable name for the experiment
    #[must_use]
    pub fn new(experiment_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            experiment_id: experiment_id.into(),
            name: name.into(),
            created_at: None,
            tags: BTreeMap::new(),
        }
    }

    /// Create a builder for constructing an experiment with optional fields.
    #[must_use]
    pub fn builder(experiment_id: impl Into<String>, name: impl Into<String>) -> ExperimentBuilder {
        ExperimentBuilder::new(experiment_id, name)
    }

    /// Get the experiment ID.
    #[must_use]
    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    /// Get the experiment name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the creation timestamp, if the server reported one.
    #[must_use]
    pub const fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    /// Get the experiment tags.
    #[must_use]
    pub const fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }
}

/// Builder for `Experiment`.
#[derive(Debug)]
pub struct ExperimentBuilder {
    experiment: Experiment,
}

impl ExperimentBuilder {
    /// Create a new builder with required fields.
    #[must_use]
    pub fn new(experiment_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            experiment: Experiment::new(experiment_id, name),
        }
    }

    /// Set the creation timestamp.
    #[must_use]
    pub const fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.experiment.created_at = Some(created_at);
        self
    }

    /// Add a tag.
    #[must_use]
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.experiment.tags.insert(key.into(), value.into());
        self
    }

    /// Build the `Experiment`.
    #[must_use]
    pub fn build(self) -> Experiment {
        self.experiment
    }
}
