//! Artifact - a file or directory logged under a run's artifact root

use serde::{Deserialize, Serialize};

/// Artifact represents one top-level entry of a run's artifact listing.
///
/// Logged models show up here as directories (e.g. `model/`), which is how
/// the report fills its "Logged Models" column.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Artifact {
    path: String,
    is_dir: bool,
    size_bytes: Option<u64>,
}

impl Artifact {
    /// Create a new artifact entry.
    ///
    /// # Arguments
    ///
    /// * `path` - Path relative to the run's artifact root
    /// * `is_dir` - Whether the entry is a directory
    /// * `size_bytes` - File size, absent for directories
    #[must_use]
    pub fn new(path: impl Into<String>, is_dir: bool, size_bytes: Option<u64>) -> Self {
        Self {
            path: path.into(),
            is_dir,
            size_bytes,
        }
    }

    /// Get the artifact path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether the artifact is a directory.
    #[must_use]
    pub const fn is_dir(&self) -> bool {
        self.is_dir
    }

    /// Get the artifact size in bytes, if known.
    #[must_use]
    pub const fn size_bytes(&self) -> Option<u64> {
        self.size_bytes
    }
}
