//! Tracking Client Adapter
//!
//! Read-only access to an experiment-tracking server. Every call is a
//! synchronous point query that either succeeds or returns its error; there
//! is no batching, caching, or retry behind this trait.
//!
//! # Example
//!
//! ```rust
//! use experiment_audit::client::{MemoryTrackingClient, TrackingClient};
//! use experiment_audit::experiment::{Experiment, Run, RunStatus};
//!
//! # fn example() -> experiment_audit::Result<()> {
//! let mut client = MemoryTrackingClient::new();
//! client.add_experiment(Experiment::new("1", "baseline"));
//! client.add_run(Run::builder("run-a", "1", RunStatus::Finished).build());
//!
//! let experiments = client.list_experiments()?;
//! let runs = client.list_runs(experiments[0].experiment_id())?;
//! assert_eq!(runs.len(), 1);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

mod http;
mod memory;
mod wire;

pub use http::HttpTrackingClient;
pub use memory::MemoryTrackingClient;

use crate::experiment::{Artifact, Experiment, MetricSample, RegisteredModel, Run};
use crate::Result;

/// Read operations the audit needs from a tracking server.
///
/// Implementations must be `Send + Sync` so the aggregator can share one
/// client across its fetch pool.
pub trait TrackingClient: Send + Sync {
    /// List every experiment.
    ///
    /// # Errors
    ///
    /// `Error::Connection` if the server is unreachable, `Error::Auth` if
    /// credentials are rejected.
    fn list_experiments(&self) -> Result<Vec<Experiment>>;

    /// List the runs of one experiment.
    ///
    /// An experiment without runs yields an empty vector, not an error.
    ///
    /// # Errors
    ///
    /// Transport, authentication, or decoding failures.
    fn list_runs(&self, experiment_id: &str) -> Result<Vec<Run>>;

    /// Fetch the full history of one metric of one run, in server order.
    ///
    /// # Errors
    ///
    /// `Error::NotFound` if the run does not exist or never logged the metric.
    fn fetch_metric_history(&self, run_id: &str, metric_name: &str) -> Result<Vec<MetricSample>>;

    /// List every registered model with its versions.
    ///
    /// # Errors
    ///
    /// `Error::NotFound` when the server has no model registry; transport,
    /// authentication, or decoding failures otherwise.
    fn list_registered_models(&self) -> Result<Vec<RegisteredModel>>;

    /// List the top-level artifacts of a run.
    ///
    /// # Errors
    ///
    /// `Error::NotFound` if the run does not exist.
    fn list_artifacts(&self, run_id: &str) -> Result<Vec<Artifact>>;
}
