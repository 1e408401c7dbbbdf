//! # experiment-audit: Compute-Utilization Audit for MLflow
//!
//! Pulls experiments, runs, utilization metric histories, and model registry
//! entries from an MLflow tracking server and compiles them into an Excel
//! workbook summarizing compute utilization and experimentation cadence.
//!
//! ## Pipeline
//!
//! ```text
//! AuditConfig ──> TrackingClient ──> Aggregator ──> Report (.xlsx)
//!   (env)          (REST, sync)      (rows)         (Summary / Raw Metrics)
//! ```
//!
//! Every invocation re-fetches everything; nothing is cached between runs.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use experiment_audit::client::HttpTrackingClient;
//! use experiment_audit::{run_audit, AuditConfig};
//!
//! let config = AuditConfig::new("http://localhost:5000")?
//!     .with_output_path("audit.xlsx");
//! let client = HttpTrackingClient::new(&config)?;
//!
//! let outcome = run_audit(&config, &client)?;
//! println!("{} runs, {} samples", outcome.runs, outcome.samples);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod aggregate;
pub mod audit;
pub mod client;
pub mod config;
pub mod error;
pub mod experiment;
pub mod report;

pub use audit::{collect, run_audit, AuditData, AuditOutcome};
pub use config::AuditConfig;
pub use error::{Error, Result, Stage};
