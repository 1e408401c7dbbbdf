//! Experiment Tracking Data Model
//!
//! Typed snapshots of what the tracking server returns. The client adapter
//! converts wire responses into these types, so everything downstream works
//! with validated, explicitly optional fields.
//!
//! ## Schema Overview
//!
//! ```text
//! Experiment (1) ──< Run (N)
//!                      │
//!                      ├──< MetricSample (N) [time-series]
//!                      └──< Artifact (N)
//!
//! RegisteredModel (1) ──< ModelVersion (N) ──> Run (0..1)
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use experiment_audit::experiment::{Experiment, Run, RunStatus};
//!
//! let experiment = Experiment::new("1", "My Experiment");
//!
//! let run = Run::builder("run-001", experiment.experiment_id(), RunStatus::Finished)
//!     .param("lr", "0.01")
//!     .metric("accuracy", 0.9)
//!     .build();
//!
//! assert_eq!(run.params().len(), 1);
//! ```

mod artifact_record;
mod experiment_record;
mod metric_record;
mod model_record;
mod run_record;

pub use artifact_record::Artifact;
pub use experiment_record::{Experiment, ExperimentBuilder};
pub use metric_record::MetricSample;
pub use model_record::{ModelVersion, RegisteredModel};
pub use run_record::{Run, RunBuilder, RunStatus};
