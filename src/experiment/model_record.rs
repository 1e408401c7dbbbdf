//! Registered Model - a named, versioned model in the model registry

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One version of a registered model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelVersion {
    version: u64,
    stage: String,
    source: String,
    run_id: Option<String>,
    created_at: Option<DateTime<Utc>>,
    tags: BTreeMap<String, String>,
}

impl ModelVersion {
    /// Create a new model version.
    ///
    /// # Arguments
    ///
    /// * `version` - Version number within the model
    /// * `stage` - Registry stage (`None`, `Staging`, `Production`, `Archived`)
    /// * `source` - Artifact URI the version was registered from
    #[must_use]
    pub fn new(version: u64, stage: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            version,
            stage: stage.into(),
            source: source.into(),
            run_id: None,
            created_at: None,
            tags: BTreeMap::new(),
        }
    }

    /// Set the run that produced this version.
    #[must_use]
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    /// Set the registration timestamp.
    #[must_use]
    pub const fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Add a version tag.
    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Get the version number.
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// Get the registry stage.
    #[must_use]
    pub fn stage(&self) -> &str {
        &self.stage
    }

    /// Get the source artifact URI.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Get the source run ID, if the version was registered from a run.
    #[must_use]
    pub fn run_id(&self) -> Option<&str> {
        self.run_id.as_deref()
    }

    /// Get the registration timestamp.
    #[must_use]
    pub const fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    /// Look up a single version tag.
    #[must_use]
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

/// Registered Model tracked independently of any single run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegisteredModel {
    name: String,
    created_at: Option<DateTime<Utc>>,
    versions: BTreeMap<u64, ModelVersion>,
}

impl RegisteredModel {
    /// Create a registered model with no versions.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            created_at: None,
            versions: BTreeMap::new(),
        }
    }

    /// Set the registration timestamp.
    #[must_use]
    pub const fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Add a version, replacing any existing entry with the same number.
    #[must_use]
    pub fn with_version(mut self, version: ModelVersion) -> Self {
        self.versions.insert(version.version(), version);
        self
    }

    /// Get the model name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the registration timestamp.
    #[must_use]
    pub const fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    /// Versions keyed by version number, ascending.
    #[must_use]
    pub const fn versions(&self) -> &BTreeMap<u64, ModelVersion> {
        &self.versions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registered_model_versions_ordered() {
        let model = RegisteredModel::new("churn")
            .with_version(ModelVersion::new(3, "Production", "runs:/c/model"))
            .with_version(ModelVersion::new(1, "Archived", "runs:/a/model"));

        let numbers: Vec<u64> = model.versions().keys().copied().collect();
        assert_eq!(numbers, vec![1, 3]);
        assert_eq!(model.versions()[&3].stage(), "Production");
    }

    #[test]
    fn test_model_version_optional_fields() {
        let version = ModelVersion::new(1, "None", "s3://bucket/model")
            .with_run_id("run-9")
            .with_tag("mlflow.source.git.commit", "abc123");
        assert_eq!(version.run_id(), Some("run-9"));
        assert_eq!(version.tag("mlflow.source.git.commit"), Some("abc123"));
        assert!(version.created_at().is_none());
    }
}
