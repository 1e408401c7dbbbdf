//! Error types for experiment-audit
//!
//! Toyota Way: Clear error messages with actionable guidance (Respect for People)

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline stage an error belongs to.
///
/// Used by the binary to produce a single diagnostic naming the failing stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Reading the environment configuration
    Config,
    /// Talking to the tracking server
    Fetch,
    /// Writing the report workbook
    Write,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Config => "config",
            Self::Fetch => "fetch",
            Self::Write => "write",
        };
        f.write_str(name)
    }
}

/// experiment-audit error types
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or invalid configuration (fatal, raised before any network call)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Tracking server unreachable
    #[error("Connection to tracking server at {url} failed: {message}")]
    Connection {
        /// Address that was being contacted
        url: String,
        /// Transport failure description
        message: String,
    },

    /// Credentials rejected by the tracking server
    #[error("Tracking server rejected credentials (HTTP {status}): {message}\nCheck MLFLOW_TRACKING_TOKEN or MLFLOW_TRACKING_USERNAME/MLFLOW_TRACKING_PASSWORD")]
    Auth {
        /// HTTP status code (401 or 403)
        status: u16,
        /// Server-provided message
        message: String,
    },

    /// Run, metric, or endpoint does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unexpected non-success response from the tracking server
    #[error("Tracking server returned HTTP {status}: {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Server-provided message
        message: String,
    },

    /// Response body could not be decoded into the expected shape
    #[error("Malformed tracking server response: {0}")]
    Decode(String),

    /// Report workbook could not be written
    #[error("Failed to write report to {}: {message}", path.display())]
    Write {
        /// Attempted output path
        path: PathBuf,
        /// Underlying failure
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// The pipeline stage this error aborts.
    #[must_use]
    pub const fn stage(&self) -> Stage {
        match self {
            Self::Config(_) => Stage::Config,
            Self::Connection { .. }
            | Self::Auth { .. }
            | Self::NotFound(_)
            | Self::Api { .. }
            | Self::Decode(_) => Stage::Fetch,
            Self::Write { .. } | Self::Io(_) => Stage::Write,
        }
    }

    /// Whether the aggregator may recover from this error by skipping one metric.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
